//! flowlimits CLI - Command-line interface for flowlimits
//!
//! Commands:
//! - analyze: Analyse one recording and write a JSON report
//! - scan: Summarise every BRP recording below a directory
//! - config: Print the default analysis configuration

use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use walkdir::WalkDir;

use flowlimits::adapters::{EdfAdapter, NdjsonAdapter, WaveformAdapter};
use flowlimits::encoder::ReportEncoder;
use flowlimits::types::CumulativeIndices;
use flowlimits::{AnalysisConfig, AnalysisError, FlowAnalyzer, FLOWLIMITS_VERSION};

/// flowlimits - Flow-limitation indices for CPAP airflow recordings
#[derive(Parser)]
#[command(name = "flowlimits")]
#[command(version = FLOWLIMITS_VERSION)]
#[command(about = "Score CPAP airflow breaths for flow limitation", long_about = None)]
struct Cli {
    /// Default log filter, overridden by RUST_LOG
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyse one recording and write a JSON report
    Analyze {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "edf")]
        format: InputFormat,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "json-pretty")]
        output_format: OutputFormat,

        /// JSON file overriding analysis settings
        #[arg(long)]
        config: Option<PathBuf>,

        /// Include the idealised parabolic flow in the report
        #[arg(long)]
        ideal: bool,
    },

    /// Summarise every *_BRP.edf recording below a directory
    Scan {
        /// Directory to search recursively
        dir: PathBuf,

        /// JSON file overriding analysis settings
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Print the default analysis configuration
    Config,
}

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// European Data Format recording
    Edf,
    /// Newline-delimited JSON (one sample per line)
    Ndjson,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), FlowCliError> {
    match cli.command {
        Commands::Analyze {
            input,
            format,
            output,
            output_format,
            config,
            ideal,
        } => cmd_analyze(
            &input,
            format,
            &output,
            output_format,
            config.as_deref(),
            ideal,
        ),

        Commands::Scan { dir, config } => cmd_scan(&dir, config.as_deref()),

        Commands::Config => {
            println!("{}", AnalysisConfig::default().to_json()?);
            Ok(())
        }
    }
}

fn cmd_analyze(
    input: &Path,
    format: InputFormat,
    output: &Path,
    output_format: OutputFormat,
    config: Option<&Path>,
    ideal: bool,
) -> Result<(), FlowCliError> {
    let raw = if input.to_string_lossy() == "-" {
        let mut buffer = Vec::new();
        io::stdin().read_to_end(&mut buffer)?;
        buffer
    } else {
        fs::read(input)?
    };

    let adapter: &dyn WaveformAdapter = match format {
        InputFormat::Edf => &EdfAdapter,
        InputFormat::Ndjson => &NdjsonAdapter,
    };

    let analyzer = load_analyzer(config)?
        .with_encoder(ReportEncoder::new().with_ideal_flow(ideal));
    let report = analyzer.process_with_adapter(adapter, &raw)?;
    info!(
        "{}: {} breaths, overall {:.2}",
        input.display(),
        report.summary.breath_count,
        report.summary.cumulative.overall
    );

    let output_data = match output_format {
        OutputFormat::Json => serde_json::to_string(&report)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&report)?,
    };

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

const SCAN_HEADERS: [&str; 11] = [
    "date",
    "overall",
    "skew",
    "flatTop",
    "spike",
    "topHeavy",
    "multiPeak",
    "noPause",
    "inspirRate",
    "multiBreath",
    "ampVar",
];

fn cmd_scan(dir: &Path, config: Option<&Path>) -> Result<(), FlowCliError> {
    let analyzer = load_analyzer(config)?;

    let files: Vec<PathBuf> = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Skipping unreadable entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .file_name()
                .to_string_lossy()
                .to_lowercase()
                .ends_with("_brp.edf")
        })
        .map(|entry| entry.into_path())
        .collect();

    if files.is_empty() {
        println!("No EDF files found in {}", dir.display());
        return Ok(());
    }

    let widths: Vec<usize> = SCAN_HEADERS.iter().map(|h| h.len()).collect();
    print_row(&SCAN_HEADERS.map(String::from), &widths);
    print_row(&widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>(), &widths);

    for file in files {
        match summarise_recording(&analyzer, &file) {
            Ok(row) => print_row(&row, &widths),
            Err(e) => warn!("Failed to process {}: {}", file.display(), e),
        }
    }

    Ok(())
}

fn summarise_recording(analyzer: &FlowAnalyzer, path: &Path) -> Result<Vec<String>, FlowCliError> {
    let raw = fs::read(path)?;
    let waveform = EdfAdapter.parse(&raw)?;
    let analysis = analyzer.analyze(&waveform)?;
    let c: CumulativeIndices = analysis.cumulative;

    let mut row = vec![waveform.start_time.format("%Y-%m-%d").to_string()];
    row.extend(
        [
            c.overall,
            c.skew,
            c.flat_top,
            c.spike,
            c.top_heavy,
            c.multi_peak,
            c.no_pause,
            c.inspir_rate,
            c.multi_breath,
            c.amp_var,
        ]
        .iter()
        .map(|v| v.to_string()),
    );
    Ok(row)
}

fn print_row(cells: &[String], widths: &[usize]) {
    let line: Vec<String> = cells
        .iter()
        .zip(widths)
        .map(|(cell, width)| format!("{:<width$}", cell, width = width))
        .collect();
    println!("{}", line.join("  "));
}

fn load_analyzer(config: Option<&Path>) -> Result<FlowAnalyzer, FlowCliError> {
    let config = match config {
        Some(path) => AnalysisConfig::from_json(&fs::read_to_string(path)?)?,
        None => AnalysisConfig::default(),
    };
    Ok(FlowAnalyzer::new(config)?)
}

// Error types

#[derive(Debug)]
enum FlowCliError {
    Io(io::Error),
    Analysis(AnalysisError),
    Json(serde_json::Error),
}

impl From<io::Error> for FlowCliError {
    fn from(e: io::Error) -> Self {
        FlowCliError::Io(e)
    }
}

impl From<AnalysisError> for FlowCliError {
    fn from(e: AnalysisError) -> Self {
        FlowCliError::Analysis(e)
    }
}

impl From<serde_json::Error> for FlowCliError {
    fn from(e: serde_json::Error) -> Self {
        FlowCliError::Json(e)
    }
}

impl std::fmt::Display for FlowCliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlowCliError::Io(e) => write!(f, "{}", e),
            FlowCliError::Analysis(e) => write!(f, "{}", e),
            FlowCliError::Json(e) => write!(f, "{}", e),
        }
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FlowCliError> for CliError {
    fn from(e: FlowCliError) -> Self {
        match e {
            FlowCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FlowCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: None,
            },
            FlowCliError::Analysis(e) => {
                let (code, hint) = match &e {
                    AnalysisError::MalformedInput(_) => (
                        "MALFORMED_INPUT",
                        Some("The recording is empty or shorter than two seconds"),
                    ),
                    AnalysisError::NoBreathsDetected => (
                        "NO_BREATHS",
                        Some("Check that the input carries airflow, not pressure"),
                    ),
                    AnalysisError::InvalidConfig(_) => (
                        "INVALID_CONFIG",
                        Some("Run 'flowlimits config' to see valid settings"),
                    ),
                    AnalysisError::EdfParse(_) => (
                        "EDF_ERROR",
                        Some("Ensure the file is a complete EDF recording"),
                    ),
                    AnalysisError::MissingSignal(_) => (
                        "MISSING_SIGNAL",
                        Some("Use the *_BRP.edf file, which holds the flow channel"),
                    ),
                    AnalysisError::JsonError(_) => ("JSON_ERROR", Some("Check JSON syntax")),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: hint.map(String::from),
                }
            }
        }
    }
}
