//! Per-submission state machine.
//!
//! ```text
//! Idle → Validating → Rejected
//!                   → Sending → Succeeded | TimedOut | ServerFailed | NetworkFailed
//! ```
//!
//! Every outcome state is terminal. A new submission starts a new
//! `Lifecycle` at `Idle`; instances are never reused.

use std::fmt;
use std::time::Instant;

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionState {
    Idle,
    Validating,
    Rejected,
    Sending,
    Succeeded,
    TimedOut,
    ServerFailed,
    NetworkFailed,
}

impl SubmissionState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Rejected | Self::Succeeded | Self::TimedOut | Self::ServerFailed | Self::NetworkFailed
        )
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_advance_to(self, next: SubmissionState) -> bool {
        use SubmissionState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Rejected)
                | (Validating, Sending)
                | (Sending, Succeeded)
                | (Sending, TimedOut)
                | (Sending, ServerFailed)
                | (Sending, NetworkFailed)
        )
    }
}

impl fmt::Display for SubmissionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Validating => "validating",
            Self::Rejected => "rejected",
            Self::Sending => "sending",
            Self::Succeeded => "succeeded",
            Self::TimedOut => "timed out",
            Self::ServerFailed => "server failed",
            Self::NetworkFailed => "network failed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("illegal submission transition {from} -> {to}")]
pub struct InvalidTransition {
    pub from: SubmissionState,
    pub to: SubmissionState,
}

/// Tracks one submission through its states.
#[derive(Debug)]
pub struct Lifecycle {
    id: Uuid,
    state: SubmissionState,
    started: Instant,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            state: SubmissionState::Idle,
            started: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SubmissionState {
        self.state
    }

    pub fn advance(&mut self, next: SubmissionState) -> Result<(), InvalidTransition> {
        if !self.state.can_advance_to(next) {
            return Err(InvalidTransition {
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(
            submission_id = %self.id,
            from = %self.state,
            to = %next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "Submission state change"
        );
        self.state = next;
        Ok(())
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
