//! Fleet-Insight - industrial fleet telemetry analysis.
//!
//! # Usage
//!
//! ```bash
//! # Analyze a telemetry batch
//! fleet-insight analyze --data machine_data.csv --api-key YOUR_KEY
//!
//! # Generate a sample batch for testing
//! fleet-insight sample
//!
//! # Serve the JSON API
//! fleet-insight web
//!
//! # Fast mode: skip the enrichment stages
//! fleet-insight analyze --data data.csv --no-reasoning --no-debate --no-planning
//! ```
//!
//! # Environment Variables
//!
//! - `GEMINI_API_KEY`: text-generation API key (fallback mode without it)
//! - `FLEET_CONFIG`: path to a TOML config overriding built-in thresholds
//! - `RUST_LOG`: logging filter (default: info)

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fleet_insight::api::{self, ApiState};
use fleet_insight::config::{self, AnalysisConfig};
use fleet_insight::llm::{GeminiClient, TextGenerator};
use fleet_insight::pipeline::{PipelineCoordinator, PipelineOptions};
use fleet_insight::{acquisition, RunStatus};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "fleet-insight")]
#[command(about = "Industrial fleet telemetry analysis pipeline")]
#[command(version)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the analysis pipeline on a telemetry batch
    Analyze {
        /// Path to the CSV data file
        #[arg(long, short = 'd')]
        data: PathBuf,

        /// Text-generation API key (fallback narrative without it)
        #[arg(long, short = 'k', env = "GEMINI_API_KEY")]
        api_key: Option<String>,

        /// Disable the root-cause reasoning stage
        #[arg(long)]
        no_reasoning: bool,

        /// Disable the multi-perspective debate stage
        #[arg(long)]
        no_debate: bool,

        /// Disable the action-planning stage
        #[arg(long)]
        no_planning: bool,

        /// Suppress progress output
        #[arg(long, short = 'q')]
        quiet: bool,
    },

    /// Generate a sample telemetry batch for testing
    Sample {
        /// Output CSV path
        #[arg(long, default_value = "sample_fleet_data.csv")]
        out: PathBuf,

        /// Number of machines to generate
        #[arg(long, default_value_t = 75)]
        machines: usize,

        /// Random seed
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },

    /// Serve the JSON analysis API
    Web {
        /// Bind address (default from config)
        #[arg(long)]
        addr: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    let default_filter = match &args.command {
        Command::Analyze { quiet: true, .. } => "warn",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    config::init(AnalysisConfig::load());

    match args.command {
        Command::Analyze {
            data,
            api_key,
            no_reasoning,
            no_debate,
            no_planning,
            quiet,
        } => {
            analyze(data, api_key, no_reasoning, no_debate, no_planning, quiet).await?;
        }
        Command::Sample { out, machines, seed } => {
            acquisition::sample::write_csv(&out, machines, seed)
                .with_context(|| format!("failed to write sample batch to {}", out.display()))?;
            println!("Sample batch written to {} ({machines} machines)", out.display());
        }
        Command::Web { addr } => {
            let generator = build_generator(std::env::var("GEMINI_API_KEY").ok());
            let addr = addr.unwrap_or_else(|| config::get().server.addr.clone());
            api::serve(&addr, ApiState::new(generator)).await?;
        }
    }

    Ok(())
}

fn build_generator(api_key: Option<String>) -> Option<Arc<dyn TextGenerator>> {
    let key = api_key.filter(|k| !k.trim().is_empty())?;
    match GeminiClient::new(key, config::get().llm.clone()) {
        Ok(client) => Some(Arc::new(client)),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to initialize generation backend — fallback mode");
            None
        }
    }
}

async fn analyze(
    data: PathBuf,
    api_key: Option<String>,
    no_reasoning: bool,
    no_debate: bool,
    no_planning: bool,
    quiet: bool,
) -> anyhow::Result<()> {
    if !data.exists() {
        eprintln!("Error: file not found: {}", data.display());
        std::process::exit(1);
    }

    let generator = build_generator(api_key);
    if !quiet {
        println!("============================================================");
        println!("  FLEET-INSIGHT ANALYSIS");
        println!("============================================================");
        println!("  Data: {}", data.display());
        println!(
            "  Generation backend: {}",
            if generator.is_some() { "configured" } else { "fallback mode" }
        );
        println!("------------------------------------------------------------");
    }

    let options = PipelineOptions {
        enable_reasoning: !no_reasoning,
        enable_debate: !no_debate,
        enable_planning: !no_planning,
        ..Default::default()
    };
    let mut coordinator = PipelineCoordinator::with_options(generator, options);
    let result = coordinator.run_file(&data).await;

    match result.status {
        RunStatus::Success => {
            if !quiet {
                println!("\nANALYSIS COMPLETED");
                println!("  Machines analyzed:  {}", result.row_count);
                if let Some(anomalies) = &result.anomalies {
                    println!("  Anomalies detected: {}", anomalies.total_flagged());
                }
                if let Some(decisions) = &result.decisions {
                    println!("  Decisions:          {}", decisions.decisions.len());
                    println!("  Overall priority:   {}", decisions.overall_priority);
                }
                let vsummary = result.validation_history.summary();
                println!(
                    "  Validations:        {} ({} passed, {} failed)",
                    vsummary.total, vsummary.passed, vsummary.failed
                );
            }

            if let Some(report) = &result.report {
                let report_path =
                    format!("report_{}.txt", Utc::now().format("%Y%m%d_%H%M%S"));
                std::fs::write(&report_path, report)
                    .with_context(|| format!("failed to write report to {report_path}"))?;
                info!(path = %report_path, "Report saved");
                if !quiet {
                    println!("\nReport saved to: {report_path}");
                }
            }
            Ok(())
        }
        RunStatus::Failed | RunStatus::Error => {
            eprintln!("\nANALYSIS FAILED");
            for failure in &result.errors {
                eprintln!("  [{}] {}", failure.stage, failure.message);
                for issue in &failure.issues {
                    eprintln!("    - {issue}");
                }
            }
            std::process::exit(1);
        }
    }
}
