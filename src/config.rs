use anyhow::Result;
use dotenvy::dotenv;
use serde::Deserialize;
use std::env;

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub api_base: String,
    pub sse_path: String,
    pub charge_path: String,
    pub sse_max_retries: u32,
    pub sse_cooldown_secs: u64,
    pub history_file: String,
    pub log_level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        let api_base =
            env::var("API_BASE").unwrap_or_else(|_| "http://localhost:8080".to_string());
        let sse_path = env::var("SSE_PATH").unwrap_or_else(|_| "/alerts/stream".to_string());
        let charge_path = env::var("CHARGE_PATH").unwrap_or_else(|_| "/pix/charges".to_string());
        let sse_max_retries = env::var("SSE_MAX_RETRIES")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        let sse_cooldown_secs = env::var("SSE_CIRCUIT_BREAKER_COOLDOWN")
            .unwrap_or_else(|_| "300".to_string())
            .parse()
            .unwrap_or(300);
        let history_file =
            env::var("HISTORY_FILE").unwrap_or_else(|_| "pix-history.json".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            api_base,
            sse_path,
            charge_path,
            sse_max_retries,
            sse_cooldown_secs,
            history_file,
            log_level,
        })
    }
}
