//! RAGVue CLI: evaluate RAG outputs with an LLM judge from the terminal or a
//! local dashboard.

mod commands;
mod dashboard;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// RAGVue: LLM-judged evaluation of Retrieval-Augmented Generation
#[derive(Parser, Debug)]
#[command(name = "ragvue", version, about, long_about = None)]
struct Cli {
    /// Judge model to use (overrides configuration)
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// Workspace directory (holds `.ragvue/config.toml` and saved reports)
    #[arg(short, long, default_value = ".", global = true)]
    workspace: PathBuf,

    /// Number of items evaluated at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// List available metrics
    ListMetrics,
    /// Evaluate only the first item and print the JSON report
    DebugMetrics {
        /// JSONL file with question/answer/context records
        #[arg(long, alias = "inputs")]
        questions: PathBuf,
        /// Metrics to run, e.g. `--metrics clarity,retrieval_coverage`
        #[arg(long, required = true, num_args = 1.., value_delimiter = ',')]
        metrics: Vec<String>,
    },
    /// Manual evaluation with explicitly chosen metrics
    Eval {
        /// JSONL file with question/answer/context records
        #[arg(long, alias = "input")]
        inputs: PathBuf,
        /// Metrics to run (all when omitted)
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        metrics: Vec<String>,
        /// Output path without extension
        #[arg(long, default_value = "report_manual")]
        out_base: PathBuf,
        /// Comma-separated formats: json, md, csv, html, items-csv
        #[arg(long)]
        formats: Option<String>,
        /// Write one report per item instead of a single report
        #[arg(long)]
        per_item: bool,
    },
    /// Agentic evaluation: metrics are chosen per item
    Agentic {
        /// JSONL file with question/answer/context records
        #[arg(long, alias = "input")]
        inputs: PathBuf,
        /// Output path without extension
        #[arg(long, default_value = "report_agentic")]
        out_base: PathBuf,
        /// Comma-separated formats: json, md, csv, html, items-csv
        #[arg(long)]
        formats: Option<String>,
        /// Evaluate at most this many items (0 = all)
        #[arg(long, default_value_t = 0)]
        max_items: usize,
        /// Write one report per item instead of a single report
        #[arg(long)]
        per_item: bool,
    },
    /// Run manual and agentic evaluation back to back and print the summaries
    Run {
        /// JSONL file with question/answer/context records
        #[arg(long, alias = "input")]
        inputs: PathBuf,
        /// Metrics for the manual pass (all when omitted)
        #[arg(long, num_args = 1.., value_delimiter = ',')]
        metrics: Vec<String>,
        /// Output path for the manual report, without extension
        #[arg(long, default_value = "report_manual")]
        out_base: PathBuf,
        /// Output path for the agentic report, without extension
        #[arg(long, default_value = "report_agentic")]
        agentic_out: PathBuf,
        /// Comma-separated formats: json, md, csv, html, items-csv
        #[arg(long)]
        formats: Option<String>,
        /// Skip the manual pass
        #[arg(long)]
        skip_manual: bool,
        /// Skip the agentic pass
        #[arg(long)]
        skip_agentic: bool,
    },
    /// Start the interactive dashboard
    Serve {
        /// Address to bind (defaults to server.host)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on (defaults to server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(clap::Subcommand, Debug)]
enum ConfigAction {
    /// Create default configuration file
    Init,
    /// Show current configuration
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Set up tracing: human-readable stderr + JSON file logging
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::new(filter));

    let log_dir = directories::ProjectDirs::from("dev", "ragvue", "ragvue")
        .map(|d| d.data_dir().join("logs"))
        .unwrap_or_else(|| PathBuf::from("."));
    let _ = std::fs::create_dir_all(&log_dir);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "ragvue.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking)
        .with_filter(EnvFilter::new("debug"));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let workspace = cli
        .workspace
        .canonicalize()
        .unwrap_or_else(|_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));

    let overrides = ragvue_core::ConfigOverrides {
        model: cli.model,
        base_url: None,
        concurrency: cli.concurrency,
    };

    commands::handle_command(cli.command, &workspace, &overrides).await
}
