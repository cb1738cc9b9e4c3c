pub mod types;
pub mod submission;
pub mod lifecycle;
pub mod client;

pub use types::*;
pub use submission::*;
pub use lifecycle::*;
pub use client::*;

use thiserror::Error;

/// Local precondition failures. None of these ever reach the network.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("image missing")]
    ImageMissing,

    #[error("invalid image type")]
    InvalidImageType,

    #[error("image too large ({size} bytes, limit {limit})")]
    ImageTooLarge { size: u64, limit: u64 },

    #[error("symptoms too short")]
    SymptomsTooShort,
}

/// Every way a single analysis submission can fail.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Analysis timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Analysis service returned error (status {status}): {body}")]
    Server { status: u16, body: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Could not read image file: {0}")]
    Io(#[from] std::io::Error),
}

impl AnalysisError {
    /// The terminal lifecycle state this failure ends a submission in.
    pub fn terminal_state(&self) -> SubmissionState {
        match self {
            Self::Validation(_) | Self::Io(_) => SubmissionState::Rejected,
            Self::Timeout(_) => SubmissionState::TimedOut,
            Self::Server { .. } => SubmissionState::ServerFailed,
            Self::Network(_) => SubmissionState::NetworkFailed,
        }
    }

    /// Short machine-friendly name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Io(_) => "io",
            Self::Timeout(_) => "timeout",
            Self::Server { .. } => "server",
            Self::Network(_) => "network",
        }
    }
}
