use skr_core::UnitId;
use std::time::Duration;
use tokio::time::Instant;

/// Identifies the deadline currently armed: (round, unit, action marker).
/// Player deadlines use marker 0 so mid-turn actions never reset the
/// 15-second budget; AI pacing keys on history length so every applied
/// action re-arms the next tick.
pub type ClockKey = (u32, UnitId, u64);

/// Pausable deadline tracking for one session.
///
/// While paused the remaining time is preserved, not reset; resuming
/// re-arms the deadline with exactly what was left.
#[derive(Debug, Default)]
pub struct TurnClock {
    paused: bool,
    key: Option<ClockKey>,
    deadline: Option<Instant>,
    remaining: Option<Duration>,
}

impl TurnClock {
    pub fn new() -> Self {
        Self::default()
    }
    /// Arm a deadline `d` from now under `key`, replacing whatever was
    /// armed. While paused the duration is frozen instead.
    pub fn arm(&mut self, key: ClockKey, d: Duration) {
        self.key = Some(key);
        if self.paused {
            self.deadline = None;
            self.remaining = Some(d);
        } else {
            self.deadline = Some(Instant::now() + d);
            self.remaining = None;
        }
    }
    /// Arm only when `key` differs from the armed one. Keeps a running
    /// turn deadline intact across mid-turn actions.
    pub fn arm_if_new(&mut self, key: ClockKey, d: Duration) {
        if self.key.as_ref() != Some(&key) {
            self.arm(key, d);
        }
    }
    pub fn clear(&mut self) {
        self.key = None;
        self.deadline = None;
        self.remaining = None;
    }
    /// Toggle pause; returns the new paused state.
    pub fn toggle(&mut self) -> bool {
        if self.paused {
            self.paused = false;
            if let Some(rest) = self.remaining.take() {
                self.deadline = Some(Instant::now() + rest);
            }
        } else {
            self.paused = true;
            if let Some(at) = self.deadline.take() {
                self.remaining = Some(at.saturating_duration_since(Instant::now()));
            }
        }
        self.paused
    }
    pub fn paused(&self) -> bool {
        self.paused
    }
    /// The instant the armed deadline fires; `None` while paused or idle.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }
    /// `remaining <= 0` counts as expired.
    pub fn expired(&self) -> bool {
        self.deadline.map(|d| Instant::now() >= d).unwrap_or(false)
    }
}
