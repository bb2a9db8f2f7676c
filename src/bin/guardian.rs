//! Guardian CLI - Command-line interface for the guardian scoring core
//!
//! Commands:
//! - assess: Score raw signal bundles into risk assessments (batch mode)
//! - bias: Analyze content feature vectors for cultural bias
//! - check-config: Validate an engine configuration file

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use guardian_core::notify::{CrisisNotification, ParentNotifier};
use guardian_core::types::{ChildContext, ContentFeatures, CulturalContext, RiskAssessment};
use guardian_core::{EngineConfig, EngineError, RiskEngine, VERSION};

/// Guardian - Risk scoring and bias analysis for child digital safety
#[derive(Parser)]
#[command(name = "guardian")]
#[command(version = VERSION)]
#[command(about = "Score safety signals into auditable risk assessments", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score raw signal bundles into risk assessments (batch mode)
    Assess {
        /// Input file path, NDJSON of signal bundles (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Engine configuration file (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Child context file, JSON array of child records
        #[arg(long)]
        children: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Analyze content feature vectors for cultural bias
    Bias {
        /// Input file path, NDJSON of content records (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long)]
        output: PathBuf,

        /// Engine configuration file (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Validate an engine configuration file
    CheckConfig {
        /// Configuration file path
        #[arg(short, long)]
        config: PathBuf,

        /// Output the validation report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

/// One bias-analysis request line
#[derive(Deserialize)]
struct ContentRecord {
    content_id: String,
    cultural_context: CulturalContext,
    features: ContentFeatures,
}

/// Notifier that surfaces escalations on stderr; a deployment wires a real
/// delivery channel instead
struct StderrNotifier;

impl ParentNotifier for StderrNotifier {
    fn deliver(&self, notification: &CrisisNotification) -> Result<(), String> {
        eprintln!(
            "CRISIS ESCALATION child={} trigger={} level={} intervention={}",
            notification.child_id,
            notification.trigger_type.as_str(),
            notification.escalation_level.as_str(),
            notification.intervention_id,
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct CliErrorReport {
    error: String,
    detail: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let report = CliErrorReport {
                error: e.kind().to_string(),
                detail: e.to_string(),
            };
            eprintln!(
                "{}",
                serde_json::to_string(&report).unwrap_or_else(|_| report.detail.clone())
            );
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), GuardianCliError> {
    match cli.command {
        Commands::Assess {
            input,
            output,
            config,
            children,
            output_format,
        } => cmd_assess(
            &input,
            &output,
            config.as_deref(),
            children.as_deref(),
            output_format,
        ),

        Commands::Bias {
            input,
            output,
            config,
            output_format,
        } => cmd_bias(&input, &output, config.as_deref(), output_format),

        Commands::CheckConfig { config, json } => cmd_check_config(&config, json),
    }
}

fn cmd_assess(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    children: Option<&Path>,
    output_format: OutputFormat,
) -> Result<(), GuardianCliError> {
    let engine = build_engine(config)?;

    if let Some(children_path) = children {
        let contexts: Vec<ChildContext> = serde_json::from_str(&fs::read_to_string(children_path)?)?;
        for context in contexts {
            engine.upsert_child(context);
        }
    }

    let input_data = read_input(input)?;

    let mut assessments: Vec<RiskAssessment> = Vec::new();
    for (idx, line) in input_data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let bundle = serde_json::from_str(line).map_err(|e| {
            GuardianCliError::ParseError(format!("line {}: {}", idx + 1, e))
        })?;
        assessments.push(engine.assess_risk(&bundle)?);
    }

    if assessments.is_empty() {
        return Err(GuardianCliError::NoRecords);
    }

    write_output(output, &format_records(&assessments, &output_format)?)
}

fn cmd_bias(
    input: &Path,
    output: &Path,
    config: Option<&Path>,
    output_format: OutputFormat,
) -> Result<(), GuardianCliError> {
    let engine = build_engine(config)?;
    let input_data = read_input(input)?;

    let mut analyses = Vec::new();
    for (idx, line) in input_data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let record: ContentRecord = serde_json::from_str(line).map_err(|e| {
            GuardianCliError::ParseError(format!("line {}: {}", idx + 1, e))
        })?;
        analyses.push(engine.analyze_bias(
            &record.content_id,
            record.cultural_context,
            &record.features,
        )?);
    }

    if analyses.is_empty() {
        return Err(GuardianCliError::NoRecords);
    }

    write_output(output, &format_records(&analyses, &output_format)?)
}

fn cmd_check_config(config: &Path, json: bool) -> Result<(), GuardianCliError> {
    let raw = fs::read_to_string(config)?;
    let outcome = EngineConfig::from_json(&raw);

    match outcome {
        Ok(validated) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({
                        "valid": true,
                        "version": validated.version,
                        "weights": validated.weights,
                        "crisis_window_secs": validated.crisis.window_secs,
                    })
                );
            } else {
                println!("Configuration OK (version {})", validated.version);
            }
            Ok(())
        }
        Err(e) => {
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "valid": false, "reason": e.to_string() })
                );
            } else {
                println!("Configuration invalid: {}", e);
            }
            Err(GuardianCliError::ConfigInvalid)
        }
    }
}

fn build_engine(config: Option<&Path>) -> Result<RiskEngine, GuardianCliError> {
    let config = match config {
        Some(path) => EngineConfig::from_json(&fs::read_to_string(path)?)?,
        None => EngineConfig::default(),
    };
    Ok(RiskEngine::new(config, Arc::new(StderrNotifier))?)
}

fn read_input(input: &Path) -> Result<String, GuardianCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), GuardianCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
        Ok(())
    } else {
        Ok(fs::write(output, data)?)
    }
}

fn format_records<T: Serialize>(
    records: &[T],
    format: &OutputFormat,
) -> Result<String, GuardianCliError> {
    match format {
        OutputFormat::Ndjson => {
            let mut out = String::new();
            for record in records {
                out.push_str(&serde_json::to_string(record)?);
                out.push('\n');
            }
            Ok(out)
        }
        OutputFormat::Json => Ok(serde_json::to_string(records)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(records)?),
    }
}

#[derive(Debug)]
enum GuardianCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    ParseError(String),
    NoRecords,
    ConfigInvalid,
}

impl GuardianCliError {
    fn kind(&self) -> &'static str {
        match self {
            GuardianCliError::Io(_) => "io",
            GuardianCliError::Engine(_) => "engine",
            GuardianCliError::Json(_) => "json",
            GuardianCliError::ParseError(_) => "parse",
            GuardianCliError::NoRecords => "no_records",
            GuardianCliError::ConfigInvalid => "config_invalid",
        }
    }
}

impl std::fmt::Display for GuardianCliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GuardianCliError::Io(e) => write!(f, "io error: {}", e),
            GuardianCliError::Engine(e) => write!(f, "engine error: {}", e),
            GuardianCliError::Json(e) => write!(f, "json error: {}", e),
            GuardianCliError::ParseError(detail) => write!(f, "parse error: {}", detail),
            GuardianCliError::NoRecords => write!(f, "no records in input"),
            GuardianCliError::ConfigInvalid => write!(f, "configuration failed validation"),
        }
    }
}

impl From<io::Error> for GuardianCliError {
    fn from(e: io::Error) -> Self {
        GuardianCliError::Io(e)
    }
}

impl From<EngineError> for GuardianCliError {
    fn from(e: EngineError) -> Self {
        GuardianCliError::Engine(e)
    }
}

impl From<serde_json::Error> for GuardianCliError {
    fn from(e: serde_json::Error) -> Self {
        GuardianCliError::Json(e)
    }
}
