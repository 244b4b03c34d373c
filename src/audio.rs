use std::time::Duration;

use anyhow::Result;
use tokio::time::Instant;
use tracing::debug;

/// Minimum spacing between playback attempts; closer calls are dropped.
pub const SOUND_THROTTLE_MS: u64 = 450;

const BLOCKED_HINT: &str = "Sound blocked by the output device. One user gesture unlocks it.";
const PENDING_HINT: &str = "Sound blocked. Unlock with a user gesture to play the next alerts.";

/// Boundary to the playback device. One reusable handle bound to one fixed
/// sound resource; volume and mute are the implementation's concern.
pub trait SoundSink: Send {
    /// Muted zero-volume trial play/pause cycle used to verify autoplay.
    fn probe(&mut self) -> Result<()>;
    /// Rewind, unmute, full volume, play.
    fn play(&mut self) -> Result<()>;
}

/// Always-available stub used when no real audio output is wired.
pub struct NullSink;

impl SoundSink for NullSink {
    fn probe(&mut self) -> Result<()> {
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        debug!("alert sound played");
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    /// Not yet attempted.
    Init,
    /// Autoplay verified.
    Ready,
    /// An unlock attempt failed with no sound owed.
    Blocked,
    /// A real alert sound failed and is owed once unlocked.
    Pending,
}

/// Reconciles "play a sound on every alert" with autoplay restrictions
/// that block unsolicited playback until a user gesture occurs.
///
/// Playback failures never surface as errors; they are absorbed into the
/// state plus a human-readable hint. The consumer retries `try_unlock` on
/// startup, on user gestures and on visibility-regained until `Ready`.
pub struct AudioGate {
    sink: Box<dyn SoundSink>,
    state: AudioState,
    pending: bool,
    last_play: Option<Instant>,
    hint: Option<String>,
}

impl AudioGate {
    pub fn new(sink: impl SoundSink + 'static) -> Self {
        AudioGate {
            sink: Box::new(sink),
            state: AudioState::Init,
            pending: false,
            last_play: None,
            hint: None,
        }
    }

    pub fn state(&self) -> AudioState {
        self.state
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    /// Attempts a muted trial playback. On success any owed sound plays
    /// immediately. Returns whether the device is unlocked.
    pub fn try_unlock(&mut self) -> bool {
        match self.sink.probe() {
            Ok(()) => {
                self.state = AudioState::Ready;
                self.hint = None;
                if self.pending {
                    self.pending = false;
                    self.play_alert_sound();
                }
                true
            }
            Err(e) => {
                debug!("audio unlock failed: {}", e);
                if self.state != AudioState::Pending {
                    self.state = AudioState::Blocked;
                }
                if self.hint.is_none() {
                    self.hint = Some(BLOCKED_HINT.to_string());
                }
                false
            }
        }
    }

    /// Plays the notification sound, throttled to one attempt per
    /// `SOUND_THROTTLE_MS`. Calls inside the window are dropped silently.
    pub fn play_alert_sound(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_play {
            if now.duration_since(last) < Duration::from_millis(SOUND_THROTTLE_MS) {
                return;
            }
        }
        // The attempt itself arms the throttle, successful or not.
        self.last_play = Some(now);

        match self.sink.play() {
            Ok(()) => {
                self.state = AudioState::Ready;
                self.hint = None;
            }
            Err(e) => {
                debug!("alert sound blocked: {}", e);
                self.pending = true;
                self.state = AudioState::Pending;
                self.hint = Some(PENDING_HINT.to_string());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted sink: fails while locked, counting play attempts. The lock
    /// flag is shared so a test can flip it after the gate owns the sink.
    struct MockSink {
        unlocked: Arc<AtomicBool>,
        probes: Arc<AtomicUsize>,
        plays: Arc<AtomicUsize>,
    }

    impl MockSink {
        fn new(unlocked: bool) -> (Self, Arc<AtomicBool>, Arc<AtomicUsize>) {
            let unlocked = Arc::new(AtomicBool::new(unlocked));
            let plays = Arc::new(AtomicUsize::new(0));
            (
                MockSink {
                    unlocked: unlocked.clone(),
                    probes: Arc::new(AtomicUsize::new(0)),
                    plays: plays.clone(),
                },
                unlocked,
                plays,
            )
        }
    }

    impl SoundSink for MockSink {
        fn probe(&mut self) -> Result<()> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            if self.unlocked.load(Ordering::SeqCst) {
                Ok(())
            } else {
                bail!("autoplay blocked")
            }
        }

        fn play(&mut self) -> Result<()> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            if self.unlocked.load(Ordering::SeqCst) {
                Ok(())
            } else {
                bail!("autoplay blocked")
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn unlock_success_reaches_ready() {
        let (sink, _, _) = MockSink::new(true);
        let mut gate = AudioGate::new(sink);
        assert_eq!(gate.state(), AudioState::Init);
        assert!(gate.try_unlock());
        assert_eq!(gate.state(), AudioState::Ready);
        assert!(gate.hint().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unlock_failure_blocks_with_hint() {
        let (sink, _, _) = MockSink::new(false);
        let mut gate = AudioGate::new(sink);
        assert!(!gate.try_unlock());
        assert_eq!(gate.state(), AudioState::Blocked);
        assert!(gate.hint().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn throttle_drops_back_to_back_plays() {
        let (sink, _, plays) = MockSink::new(true);
        let mut gate = AudioGate::new(sink);

        gate.play_alert_sound();
        gate.play_alert_sound();
        assert_eq!(plays.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(SOUND_THROTTLE_MS - 10)).await;
        gate.play_alert_sound();
        assert_eq!(plays.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        gate.play_alert_sound();
        assert_eq!(plays.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn blocked_play_goes_pending_and_stays_pending_on_failed_unlock() {
        let (sink, _, _) = MockSink::new(false);
        let mut gate = AudioGate::new(sink);

        gate.play_alert_sound();
        assert_eq!(gate.state(), AudioState::Pending);
        assert!(gate.hint().is_some());

        // A failed unlock must not demote Pending to Blocked.
        assert!(!gate.try_unlock());
        assert_eq!(gate.state(), AudioState::Pending);
    }

    #[tokio::test(start_paused = true)]
    async fn owed_sound_plays_once_on_unlock() {
        let (sink, unlocked, plays) = MockSink::new(false);
        let mut gate = AudioGate::new(sink);

        gate.play_alert_sound();
        assert_eq!(gate.state(), AudioState::Pending);
        assert_eq!(plays.load(Ordering::SeqCst), 1);

        // User gesture makes the device available.
        unlocked.store(true, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(SOUND_THROTTLE_MS + 10)).await;

        assert!(gate.try_unlock());
        assert_eq!(gate.state(), AudioState::Ready);
        assert!(gate.hint().is_none());
        // The owed sound played exactly once.
        assert_eq!(plays.load(Ordering::SeqCst), 2);

        // No sound owed anymore: another unlock plays nothing.
        tokio::time::sleep(Duration::from_millis(SOUND_THROTTLE_MS + 10)).await;
        assert!(gate.try_unlock());
        assert_eq!(plays.load(Ordering::SeqCst), 2);
    }
}
