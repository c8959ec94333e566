//! integrity-scan - command-line entry point
//!
//! Reads a document from a file or stdin, runs detection against every
//! configured provider and prints the aggregate result as JSON on stdout.

use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing::info;

use integrity_scan_lib::services::config_store::{AppConfig, ConfigStore};
use integrity_scan_lib::{init_logging, DetectionEngine};

#[derive(Parser, Debug)]
#[command(name = "integrity-scan")]
#[command(about = "Score a document for plagiarism and AI-generated content")]
#[command(version)]
struct Args {
    /// Text file to analyze, or `-` for stdin
    #[arg(default_value = "-")]
    input: PathBuf,

    /// Directory holding config.json
    #[arg(long, env = "INTEGRITY_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Maximum evidence records in the report
    #[arg(long)]
    evidence_cap: Option<usize>,

    /// Deadline in seconds for each provider call
    #[arg(long)]
    timeout: Option<u64>,

    /// Pretty-print the JSON report
    #[arg(long)]
    pretty: bool,

    /// Log to the console only
    #[arg(long)]
    no_file_log: bool,
}

fn read_input(input: &Path) -> Result<String> {
    if input.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read document from stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read document {}", input.display()))
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let dir = match &args.config_dir {
        Some(dir) => Some(dir.clone()),
        None => ConfigStore::default_config_dir(),
    };
    let mut config = match dir {
        Some(dir) => {
            let store = ConfigStore::new(dir);
            info!(path = %store.config_file().display(), "[CLI] loading config");
            store.load().map_err(anyhow::Error::msg)?
        }
        None => AppConfig::default(),
    };

    if let Some(cap) = args.evidence_cap {
        config.detection.evidence_cap = cap;
    }
    if let Some(secs) = args.timeout {
        if secs == 0 {
            bail!("--timeout must be at least 1 second");
        }
        config.detection.overall_timeout_secs = secs;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.no_file_log);

    let config = load_config(&args)?;
    let text = read_input(&args.input)?;

    let engine = DetectionEngine::from_config(&config).context("Failed to initialize detection engine")?;
    let result = engine.run_detection(&text).await;

    let json = if args.pretty {
        serde_json::to_string_pretty(&result)
    } else {
        serde_json::to_string(&result)
    }
    .context("Failed to serialize report")?;
    println!("{}", json);

    Ok(())
}
