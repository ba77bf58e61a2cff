//! Newline-delimited JSON adapter
//!
//! Each non-empty line is one `{"timestamp": <RFC 3339>, "value": <flow>}`
//! reading. The sampling interval is taken from the first two timestamps.

use super::WaveformAdapter;
use crate::error::AnalysisError;
use crate::types::{Sample, Waveform};
use log::debug;

/// NDJSON flow sample adapter
pub struct NdjsonAdapter;

impl NdjsonAdapter {
    /// Parse one sample per line
    pub fn parse_samples(ndjson: &str) -> Result<Vec<Sample>, AnalysisError> {
        let mut samples = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Sample>(trimmed) {
                Ok(sample) => samples.push(sample),
                Err(e) => {
                    return Err(AnalysisError::MalformedInput(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(samples)
    }
}

impl WaveformAdapter for NdjsonAdapter {
    fn parse(&self, raw: &[u8]) -> Result<Waveform, AnalysisError> {
        let text = std::str::from_utf8(raw)
            .map_err(|e| AnalysisError::MalformedInput(format!("input is not UTF-8: {}", e)))?;
        let samples = Self::parse_samples(text)?;

        let (first, second) = match samples.as_slice() {
            [first, second, ..] => (first, second),
            _ => {
                return Err(AnalysisError::MalformedInput(format!(
                    "{} samples cannot define a sampling interval",
                    samples.len()
                )))
            }
        };

        let interval_ms = (second.timestamp - first.timestamp)
            .num_microseconds()
            .map(|us| us as f64 / 1000.0)
            .unwrap_or(f64::NAN);
        if !interval_ms.is_finite() || interval_ms <= 0.0 {
            return Err(AnalysisError::MalformedInput(format!(
                "timestamps do not increase ({} then {})",
                first.timestamp, second.timestamp
            )));
        }

        debug!(
            "Parsed {} NDJSON samples at {} ms",
            samples.len(),
            interval_ms
        );

        Ok(Waveform {
            start_time: first.timestamp,
            interval_ms,
            samples,
        })
    }
}
