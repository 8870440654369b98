//! CLI subcommand handlers.

use crate::Commands;
use crate::ConfigAction;
use crate::dashboard;
use anyhow::Context;
use ragvue_core::config::{load_config, workspace_config_path, write_workspace_config};
use ragvue_core::dataset::load_items;
use ragvue_core::{
    AgenticOrchestrator, ConfigOverrides, EvalReport, Evaluator, Judge, MetricRegistry,
    RagvueConfig, ReportFormat, SaveMode, parse_formats, save_report,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Handle a CLI subcommand.
pub async fn handle_command(
    command: Commands,
    workspace: &Path,
    overrides: &ConfigOverrides,
) -> anyhow::Result<()> {
    match command {
        Commands::ListMetrics => handle_list_metrics(workspace, overrides),
        Commands::DebugMetrics { questions, metrics } => {
            handle_debug_metrics(&questions, &metrics, workspace, overrides).await
        }
        Commands::Eval {
            inputs,
            metrics,
            out_base,
            formats,
            per_item,
        } => {
            let config = load(workspace, overrides)?;
            let formats = resolve_formats(formats.as_deref(), &config)?;
            let evaluator = Evaluator::new(build_judge(&config)?, &config)?;
            let items = load_items(&inputs)
                .with_context(|| format!("Failed to load items from {}", inputs.display()))?;
            let report = evaluator.evaluate(items, metrics.as_slice()).await?;
            let written = save(&report, &out_base, &formats, per_item)?;
            print_written(&written);
            log_usage(evaluator.context().judge());
            Ok(())
        }
        Commands::Agentic {
            inputs,
            out_base,
            formats,
            max_items,
            per_item,
        } => {
            let config = load(workspace, overrides)?;
            let formats = resolve_formats(formats.as_deref(), &config)?;
            let orchestrator = AgenticOrchestrator::new(build_judge(&config)?, &config)?;
            let items = load_items(&inputs)
                .with_context(|| format!("Failed to load items from {}", inputs.display()))?;
            let report = orchestrator.run(items, max_items).await;
            let written = save(&report, &out_base, &formats, per_item)?;
            print_written(&written);
            log_usage(orchestrator.evaluator().context().judge());
            Ok(())
        }
        Commands::Run {
            inputs,
            metrics,
            out_base,
            agentic_out,
            formats,
            skip_manual,
            skip_agentic,
        } => {
            let plan = RunPlan {
                inputs,
                metrics,
                out_base,
                agentic_out,
                formats,
                skip_manual,
                skip_agentic,
            };
            handle_run(plan, workspace, overrides).await
        }
        Commands::Serve { host, port } => {
            let config = load(workspace, overrides)?;
            let host = host.unwrap_or_else(|| config.server.host.clone());
            let port = port.unwrap_or(config.server.port);
            let state = dashboard::AppState::new(build_judge(&config)?, &config, workspace)?;
            dashboard::serve(state, &host, port).await
        }
        Commands::Config { action } => handle_config(action, workspace, overrides),
    }
}

/// Load configuration and surface validation warnings.
fn load(workspace: &Path, overrides: &ConfigOverrides) -> anyhow::Result<RagvueConfig> {
    let config = load_config(Some(workspace), Some(overrides))
        .map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    for warning in config.validate() {
        warn!("{warning}");
    }
    Ok(config)
}

fn build_judge(config: &RagvueConfig) -> anyhow::Result<Judge> {
    Judge::from_config(&config.judge).context("Failed to create judge client")
}

fn resolve_formats(
    requested: Option<&str>,
    config: &RagvueConfig,
) -> anyhow::Result<Vec<ReportFormat>> {
    let list = requested
        .map(str::to_string)
        .unwrap_or_else(|| config.report.formats_string());
    Ok(parse_formats(&list)?)
}

fn save(
    report: &EvalReport,
    out_base: &Path,
    formats: &[ReportFormat],
    per_item: bool,
) -> anyhow::Result<Vec<PathBuf>> {
    let mode = if per_item {
        SaveMode::PerItem { dir: None }
    } else {
        SaveMode::Single
    };
    save_report(report, out_base, formats, &mode)
        .with_context(|| format!("Failed to write reports for {}", out_base.display()))
}

fn print_written(paths: &[PathBuf]) {
    if paths.is_empty() {
        println!("No report files written.");
        return;
    }
    println!("Saved:");
    for path in paths {
        println!("  {}", path.display());
    }
}

fn log_usage(judge: &Judge) {
    let usage = judge.usage();
    info!(
        calls = usage.calls,
        input_tokens = usage.tokens.input_tokens,
        output_tokens = usage.tokens.output_tokens,
        "Judge usage"
    );
}

fn handle_list_metrics(workspace: &Path, overrides: &ConfigOverrides) -> anyhow::Result<()> {
    let config = load(workspace, overrides)?;
    let registry = MetricRegistry::with_defaults(&config)?;
    let width = registry.names().iter().map(String::len).max().unwrap_or(0);
    for (name, description) in registry.describe() {
        println!("{name:<width$}  {description}");
    }
    Ok(())
}

async fn handle_debug_metrics(
    questions: &Path,
    metrics: &[String],
    workspace: &Path,
    overrides: &ConfigOverrides,
) -> anyhow::Result<()> {
    let config = load(workspace, overrides)?;
    let evaluator = Evaluator::new(build_judge(&config)?, &config)?;
    let mut items = load_items(questions)
        .with_context(|| format!("Failed to load items from {}", questions.display()))?;
    items.truncate(1);
    let report = evaluator.evaluate(items, metrics).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Arguments of `ragvue run`.
struct RunPlan {
    inputs: PathBuf,
    metrics: Vec<String>,
    out_base: PathBuf,
    agentic_out: PathBuf,
    formats: Option<String>,
    skip_manual: bool,
    skip_agentic: bool,
}

async fn handle_run(
    plan: RunPlan,
    workspace: &Path,
    overrides: &ConfigOverrides,
) -> anyhow::Result<()> {
    let config = load(workspace, overrides)?;
    let formats = resolve_formats(plan.formats.as_deref(), &config)?;
    let items = load_items(&plan.inputs)
        .with_context(|| format!("Failed to load items from {}", plan.inputs.display()))?;
    println!("Loaded {} item(s) from {}", items.len(), plan.inputs.display());

    let orchestrator = AgenticOrchestrator::new(build_judge(&config)?, &config)?;

    if !plan.skip_manual {
        let report = orchestrator
            .evaluator()
            .evaluate(items.clone(), plan.metrics.as_slice())
            .await?;
        let written = save(&report, &plan.out_base, &formats, false)?;
        println!("\nManual summary:");
        print_summary(&report);
        print_written(&written);
    }

    if !plan.skip_agentic {
        let report = orchestrator.run(items, 0).await;
        let written = save(&report, &plan.agentic_out, &formats, false)?;
        println!("\nAgentic summary:");
        print_summary(&report);
        print_written(&written);
    }

    log_usage(orchestrator.evaluator().context().judge());
    Ok(())
}

fn print_summary(report: &EvalReport) {
    if report.summary.is_empty() {
        println!("  (no metric scores)");
    }
    for (name, score) in &report.summary {
        println!("  {name}: {}", round3(*score));
    }
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

fn handle_config(
    action: ConfigAction,
    workspace: &Path,
    overrides: &ConfigOverrides,
) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_path = workspace_config_path(workspace);
            if config_path.exists() {
                println!(
                    "Configuration file already exists at: {}",
                    config_path.display()
                );
                return Ok(());
            }
            let path = write_workspace_config(workspace, &RagvueConfig::default())?;
            println!("Created default configuration at: {}", path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load(workspace, overrides)?;
            let toml_str = toml::to_string_pretty(&config)?;
            println!("{}", toml_str);
            Ok(())
        }
    }
}
