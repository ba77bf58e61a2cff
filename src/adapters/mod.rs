//! Waveform source adapters
//!
//! This module provides adapters that decode raw recordings into the sampled
//! flow waveform the analysis pipeline consumes.

mod edf;
mod ndjson;

pub use edf::{EdfAdapter, EdfHeader, EdfSignal};
pub use ndjson::NdjsonAdapter;

use crate::error::AnalysisError;
use crate::types::Waveform;

/// Trait for recording format adapters
pub trait WaveformAdapter {
    /// Decode raw bytes into a flow waveform
    fn parse(&self, raw: &[u8]) -> Result<Waveform, AnalysisError>;
}
