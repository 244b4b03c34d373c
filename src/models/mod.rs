pub mod charge;
pub mod event;
pub mod status;
