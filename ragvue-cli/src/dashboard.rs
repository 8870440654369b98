//! Interactive evaluation dashboard built on axum.
//!
//! Paste JSONL, pick a mode and metrics, and browse the rendered report. The
//! latest report stays in memory and can be downloaded in every export format
//! or saved to the workspace.

use anyhow::Context;
use axum::{
    Form, Json, Router,
    extract::{Path as UrlPath, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use ragvue_core::dataset::{load_report, parse_jsonl, save_report_json};
use ragvue_core::report::html::{REPORT_CSS, escape_html, render_body};
use ragvue_core::{
    AgenticOrchestrator, EvalItem, EvalMode, EvalReport, Judge, RagvueConfig, ReportFormat,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// File name used by the save/load endpoints, relative to the workspace.
pub const SAVED_REPORT_FILE: &str = "saved_report.json";

/// Shared dashboard state.
#[derive(Clone)]
pub struct AppState {
    orchestrator: Arc<AgenticOrchestrator>,
    latest: Arc<RwLock<Option<EvalReport>>>,
    workspace: PathBuf,
}

impl AppState {
    pub fn new(judge: Judge, config: &RagvueConfig, workspace: &Path) -> anyhow::Result<Self> {
        let orchestrator =
            AgenticOrchestrator::new(judge, config).context("Failed to build metric registry")?;
        Ok(Self {
            orchestrator: Arc::new(orchestrator),
            latest: Arc::new(RwLock::new(None)),
            workspace: workspace.to_path_buf(),
        })
    }

    fn saved_report_path(&self) -> PathBuf {
        self.workspace.join(SAVED_REPORT_FILE)
    }
}

/// Body of `POST /api/evaluate`; the form on `/` maps onto it too.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluateRequest {
    pub items: Vec<EvalItem>,
    #[serde(default = "default_mode")]
    pub mode: EvalMode,
    #[serde(default)]
    pub metrics: Vec<String>,
    /// 0 evaluates every item.
    #[serde(default)]
    pub max_items: usize,
    #[serde(default)]
    pub min_item_score: f64,
}

fn default_mode() -> EvalMode {
    EvalMode::Manual
}

#[derive(Debug, Serialize)]
struct MetricInfo {
    name: String,
    description: String,
}

/// Error returned by the dashboard handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

/// Build the dashboard router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/evaluate", post(evaluate_form_handler))
        .route("/api/evaluate", post(evaluate_api_handler))
        .route("/api/metrics", get(metrics_handler))
        .route("/api/report", get(report_handler))
        .route("/api/report/save", post(save_handler))
        .route("/api/report/load", post(load_handler))
        .route("/report/{file}", get(download_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the dashboard on `host:port`. Runs until cancelled.
pub async fn serve(state: AppState, host: &str, port: u16) -> anyhow::Result<()> {
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "Dashboard listening");
    println!("RAGVue dashboard running at http://{addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Run the requested evaluation and remember the full report as the latest one.
async fn run_evaluation(state: &AppState, request: EvaluateRequest) -> Result<EvalReport, ApiError> {
    if request.items.is_empty() {
        return Err(ApiError::bad_request("No items to evaluate"));
    }
    let report = match request.mode {
        EvalMode::Agentic => state.orchestrator.run(request.items, request.max_items).await,
        EvalMode::Manual => {
            let mut items = request.items;
            if request.max_items > 0 {
                items.truncate(request.max_items);
            }
            state
                .orchestrator
                .evaluator()
                .evaluate(items, request.metrics.as_slice())
                .await
                .map_err(|e| ApiError::bad_request(e.to_string()))?
        }
    };
    *state.latest.write().await = Some(report.clone());
    Ok(report)
}

async fn index_handler(State(state): State<AppState>) -> Html<String> {
    let latest = state.latest.read().await;
    let body = latest
        .as_ref()
        .map(|report| report_section(report, 0.0))
        .unwrap_or_default();
    Html(page(&state, "", &body))
}

async fn evaluate_form_handler(
    State(state): State<AppState>,
    Form(fields): Form<Vec<(String, String)>>,
) -> Response {
    let jsonl = form_value(&fields, "jsonl").unwrap_or_default();
    let request = parse_form(&fields).and_then(|(mode, metrics, max_items, min_item_score)| {
        let items = parse_jsonl(&jsonl).map_err(|e| ApiError::bad_request(e.to_string()))?;
        Ok(EvaluateRequest {
            items,
            mode,
            metrics,
            max_items,
            min_item_score,
        })
    });

    let outcome = match request {
        Ok(request) => {
            let min_score = request.min_item_score;
            run_evaluation(&state, request)
                .await
                .map(|report| report_section(&report, min_score))
        }
        Err(e) => Err(e),
    };

    match outcome {
        Ok(body) => Html(page(&state, &jsonl, &body)).into_response(),
        Err(e) => {
            warn!(error = %e.message, "Dashboard evaluation failed");
            let body = format!("<div class='card error'>{}</div>", escape_html(&e.message));
            (e.status, Html(page(&state, &jsonl, &body))).into_response()
        }
    }
}

async fn evaluate_api_handler(
    State(state): State<AppState>,
    Json(request): Json<EvaluateRequest>,
) -> Result<Json<EvalReport>, ApiError> {
    let min_score = request.min_item_score;
    let report = run_evaluation(&state, request).await?;
    Ok(Json(report.filter_min_score(min_score)))
}

async fn metrics_handler(State(state): State<AppState>) -> Json<Vec<MetricInfo>> {
    let metrics = state
        .orchestrator
        .evaluator()
        .registry()
        .describe()
        .into_iter()
        .map(|(name, description)| MetricInfo { name, description })
        .collect();
    Json(metrics)
}

async fn report_handler(State(state): State<AppState>) -> Result<Json<EvalReport>, ApiError> {
    state
        .latest
        .read()
        .await
        .clone()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("No report yet"))
}

/// `GET /report/latest.<ext>` for json, md, csv, items.csv and html.
async fn download_handler(
    State(state): State<AppState>,
    UrlPath(file): UrlPath<String>,
) -> Result<Response, ApiError> {
    let format = download_format(&file)
        .ok_or_else(|| ApiError::not_found(format!("Unknown download: {file}")))?;
    let latest = state.latest.read().await;
    let report = latest
        .as_ref()
        .ok_or_else(|| ApiError::not_found("No report yet"))?;
    let body = format
        .render(report)
        .map_err(|e| ApiError::internal(e.to_string()))?;
    let disposition = format!("attachment; filename=\"ragvue_report_{}\"", file_suffix(&file));
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

async fn save_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let latest = state.latest.read().await;
    let report = latest
        .as_ref()
        .ok_or_else(|| ApiError::not_found("No report to save"))?;
    let path = state.saved_report_path();
    save_report_json(&path, report).map_err(|e| ApiError::internal(e.to_string()))?;
    info!(path = %path.display(), "Saved dashboard report");
    Ok(Json(serde_json::json!({
        "saved": path.display().to_string(),
        "items": report.results.len(),
    })))
}

async fn load_handler(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    let path = state.saved_report_path();
    if !path.exists() {
        return Err(ApiError::not_found(format!(
            "No saved report at {}",
            path.display()
        )));
    }
    let report = load_report(&path).map_err(|e| ApiError::bad_request(e.to_string()))?;
    let stats = report.stats();
    *state.latest.write().await = Some(report);
    info!(path = %path.display(), items = stats.items, "Loaded saved report");
    Ok(Json(serde_json::json!({
        "loaded": path.display().to_string(),
        "stats": stats,
    })))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let has_report = state.latest.read().await.is_some();
    Json(serde_json::json!({
        "status": "ok",
        "metrics": state.orchestrator.evaluator().registry().len(),
        "has_report": has_report,
    }))
}

fn download_format(file: &str) -> Option<ReportFormat> {
    match file {
        "latest.json" => Some(ReportFormat::Json),
        "latest.md" => Some(ReportFormat::Markdown),
        "latest.csv" => Some(ReportFormat::Csv),
        "latest.items.csv" => Some(ReportFormat::ItemsCsv),
        "latest.html" => Some(ReportFormat::Html),
        _ => None,
    }
}

fn file_suffix(file: &str) -> &str {
    file.strip_prefix("latest.").unwrap_or(file)
}

fn form_value(fields: &[(String, String)], key: &str) -> Option<String> {
    fields
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.clone())
}

/// Mode, metrics, max items and minimum score from the submitted form.
fn parse_form(fields: &[(String, String)]) -> Result<(EvalMode, Vec<String>, usize, f64), ApiError> {
    let mode = match form_value(fields, "mode") {
        Some(m) if !m.trim().is_empty() => m.parse::<EvalMode>().map_err(ApiError::bad_request)?,
        _ => EvalMode::Manual,
    };
    let metrics = fields
        .iter()
        .filter(|(k, v)| k == "metrics" && !v.trim().is_empty())
        .map(|(_, v)| v.trim().to_string())
        .collect();
    let max_items = match form_value(fields, "max_items").filter(|v| !v.trim().is_empty()) {
        Some(v) => v
            .trim()
            .parse::<usize>()
            .map_err(|_| ApiError::bad_request(format!("Invalid max items: {v}")))?,
        None => 0,
    };
    let min_item_score = match form_value(fields, "min_item_score").filter(|v| !v.trim().is_empty()) {
        Some(v) => v
            .trim()
            .parse::<f64>()
            .map_err(|_| ApiError::bad_request(format!("Invalid minimum score: {v}")))?,
        None => 0.0,
    };
    Ok((mode, metrics, max_items, min_item_score))
}

/// Stats, download links and the filtered report body.
fn report_section(report: &EvalReport, min_item_score: f64) -> String {
    let filtered = report.filter_min_score(min_item_score);
    let stats = filtered.stats();
    let fmt = |v: Option<f64>, unit: &str| {
        v.map(|x| format!("{x:.2}{unit}"))
            .unwrap_or_else(|| "n/a".to_string())
    };

    let mut html = String::from("<h2>Statistics</h2><div class='summary'>");
    html.push_str(&format!(
        "<div class='card metric'><div>Items shown</div><div class='pill'>{} of {}</div></div>",
        stats.items,
        report.results.len()
    ));
    html.push_str(&format!(
        "<div class='card metric'><div>Overall mean</div><div class='pill'>{}</div></div>",
        fmt(stats.overall_mean, "")
    ));
    html.push_str(&format!(
        "<div class='card metric'><div>Mean eval time</div><div class='pill'>{}</div></div>",
        fmt(stats.mean_eval_time, " s")
    ));
    html.push_str("</div><p>Download: ");
    let links: Vec<String> = ["json", "md", "csv", "items.csv", "html"]
        .iter()
        .map(|ext| format!("<a href='/report/latest.{ext}'>{ext}</a>"))
        .collect();
    html.push_str(&links.join(" | "));
    html.push_str("</p>");
    html.push_str(&render_body(&filtered));
    html
}

fn page(state: &AppState, jsonl: &str, body: &str) -> String {
    let options: String = state
        .orchestrator
        .evaluator()
        .registry()
        .describe()
        .iter()
        .map(|(name, description)| {
            format!(
                "<option value='{0}' title='{1}'>{0}</option>",
                escape_html(name),
                escape_html(description)
            )
        })
        .collect();

    format!(
        "<!doctype html><meta charset='utf-8'><title>RAGVue</title>{REPORT_CSS}<body>\
<h1>RAGVue</h1>\
<form method='post' action='/evaluate' class='card'>\
<div><label>JSONL items (one object per line)<br>\
<textarea name='jsonl' rows='10' style='width:100%' class='mono'>{jsonl}</textarea></label></div>\
<div class='grid'>\
<label>Mode <select name='mode'><option value='manual'>manual</option><option value='agentic'>agentic</option></select></label>\
<label>Metrics (manual mode; none selects all)<br><select name='metrics' multiple size='8'>{options}</select></label>\
<label>Max items (0 = all) <input type='number' name='max_items' min='0' value='0'></label>\
<label>Minimum item score <input type='number' name='min_item_score' min='0' max='1' step='0.05' value='0'></label>\
</div>\
<button type='submit'>Evaluate</button>\
</form>\
<form method='post' action='/api/report/save' style='display:inline'><button>Save report</button></form> \
<form method='post' action='/api/report/load' style='display:inline'><button>Load saved report</button></form>\
{body}</body>",
        jsonl = escape_html(jsonl),
    )
}
