//! Alert debounce.
//!
//! Collapses the per-frame motion boolean into one discrete alert per motion
//! episode: a raise fires on the rising edge, the falling edge returns to
//! idle silently, and the next raise requires a fresh falling-then-rising
//! edge. The visible alert expires after a fixed delay even while motion
//! continues; the machine does not re-raise for an ongoing episode.
//!
//! Driven by a single writer (the frame pump) in frame order.

use std::time::{Duration, Instant};

/// Lifetime of a raised alert before it auto-expires.
pub const ALERT_EXPIRY: Duration = Duration::from_millis(3000);

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AlertState {
    #[default]
    Idle,
    Alerting,
}

#[derive(Debug, Default)]
pub struct AlertStateMachine {
    state: AlertState,
    raised_at: Option<Instant>,
}

impl AlertStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the motion boolean for the next frame.
    ///
    /// Returns `true` exactly when a new alert is raised (a rising edge).
    pub fn observe(&mut self, motion: bool, now: Instant) -> bool {
        match (self.state, motion) {
            (AlertState::Idle, true) => {
                self.state = AlertState::Alerting;
                self.raised_at = Some(now);
                true
            }
            (AlertState::Alerting, false) => {
                self.state = AlertState::Idle;
                false
            }
            _ => false,
        }
    }

    /// Whether the most recent alert is still within its visible lifetime.
    ///
    /// Expiry does not change the machine state: motion that continues past
    /// the expiry keeps the machine in `Alerting` without a new raise.
    pub fn alert_active(&self, now: Instant) -> bool {
        self.state == AlertState::Alerting
            && self
                .raised_at
                .is_some_and(|raised| now.duration_since(raised) < ALERT_EXPIRY)
    }

    pub fn state(&self) -> AlertState {
        self.state
    }

    /// Return to the initial state. Called when a session finalizes.
    pub fn reset(&mut self) {
        self.state = AlertState::Idle;
        self.raised_at = None;
    }
}
