//! Error types for flowlimits

use thiserror::Error;

/// Errors that abort the analysis of a recording
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("No breaths detected in waveform")]
    NoBreathsDetected,

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to decode EDF recording: {0}")]
    EdfParse(String),

    #[error("Missing signal: {0}")]
    MissingSignal(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),
}
