//! flowlimits - Breath segmentation and flow-limitation indices for CPAP airflow
//!
//! flowlimits turns a sampled airflow waveform into per-breath shape flags and
//! population-level indices through a deterministic pipeline: minima
//! detection → inspiration detection → cycle linking → amplitude variability
//! → flow balance → indices aggregation.
//!
//! ## Modules
//!
//! - **Pipeline**: [`analyze`], [`analyze_edf`] and the configurable [`FlowAnalyzer`]
//! - **Adapters**: decode EDF recordings and NDJSON sample streams into a [`Waveform`]
//! - **Encoder**: serialise results into a JSON [`AnalysisReport`]

pub mod adapters;
pub mod amplitude;
pub mod balance;
pub mod config;
pub mod cycle;
pub mod encoder;
pub mod error;
pub mod ideal;
pub mod indices;
pub mod inspiration;
pub mod minima;
pub mod pipeline;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use adapters::{EdfAdapter, NdjsonAdapter, WaveformAdapter};
pub use config::{AnalysisConfig, IndexThresholds};
pub use encoder::ReportEncoder;
pub use error::AnalysisError;
pub use ideal::ideal_flow;
pub use pipeline::{analyze, analyze_edf, FlowAnalyzer};
pub use types::{
    Analysis, AnalysisReport, BreathIndices, CumulativeIndices, FlowZone, Inspiration, Sample,
    Waveform,
};

/// flowlimits version embedded in all reports
pub const FLOWLIMITS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "flowlimits";
