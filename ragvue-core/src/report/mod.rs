//! Report rendering and export.
//!
//! A report can be written as pretty JSON, Markdown, a self-contained HTML page,
//! a per-metric CSV, or a flat per-item CSV.

pub mod csv;
pub mod html;
pub mod markdown;

use crate::dataset::write_creating_parent;
use crate::error::ReportError;
use crate::types::EvalReport;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportFormat {
    Json,
    Markdown,
    Csv,
    Html,
    ItemsCsv,
}

/// Used when no format is requested.
pub const DEFAULT_FORMATS: [ReportFormat; 1] = [ReportFormat::Markdown];

impl ReportFormat {
    pub const ALL: [ReportFormat; 5] = [
        ReportFormat::Json,
        ReportFormat::Markdown,
        ReportFormat::Csv,
        ReportFormat::Html,
        ReportFormat::ItemsCsv,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
            ReportFormat::Csv => "csv",
            ReportFormat::Html => "html",
            ReportFormat::ItemsCsv => "items-csv",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            ReportFormat::Json => "application/json",
            ReportFormat::Markdown => "text/markdown; charset=utf-8",
            ReportFormat::Csv | ReportFormat::ItemsCsv => "text/csv; charset=utf-8",
            ReportFormat::Html => "text/html; charset=utf-8",
        }
    }

    /// Output path for this format next to `out_base`.
    pub fn path_for(&self, out_base: &Path) -> PathBuf {
        match self {
            ReportFormat::Json => out_base.with_extension("json"),
            ReportFormat::Markdown => out_base.with_extension("md"),
            ReportFormat::Csv => out_base.with_extension("csv"),
            ReportFormat::Html => out_base.with_extension("html"),
            ReportFormat::ItemsCsv => {
                let stem = out_base.with_extension("");
                let name = stem
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "report".to_string());
                stem.with_file_name(format!("{name}_items.csv"))
            }
        }
    }

    pub fn render(&self, report: &EvalReport) -> Result<String, ReportError> {
        match self {
            ReportFormat::Json => to_json(report),
            ReportFormat::Markdown => Ok(markdown::render(report)),
            ReportFormat::Csv => csv::metrics_csv(report),
            ReportFormat::Html => Ok(html::render(report)),
            ReportFormat::ItemsCsv => csv::items_csv(report),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(ReportFormat::Json),
            "md" | "markdown" => Ok(ReportFormat::Markdown),
            "csv" => Ok(ReportFormat::Csv),
            "html" => Ok(ReportFormat::Html),
            "items-csv" | "items_csv" => Ok(ReportFormat::ItemsCsv),
            _ => Err(ReportError::UnknownFormat {
                format: s.trim().to_string(),
            }),
        }
    }
}

/// Parse a comma-separated format list such as `"json, md"`.
///
/// Entries are case-insensitive and empty entries are ignored; a list with no
/// entries yields [`DEFAULT_FORMATS`]. Duplicates are dropped.
pub fn parse_formats(list: &str) -> Result<Vec<ReportFormat>, ReportError> {
    let mut formats = Vec::new();
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let format = entry.parse::<ReportFormat>()?;
        if !formats.contains(&format) {
            formats.push(format);
        }
    }
    if formats.is_empty() {
        formats.extend(DEFAULT_FORMATS);
    }
    Ok(formats)
}

/// How [`save_report`] lays out its output.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// One report covering every item.
    #[default]
    Single,
    /// One report per item, in `dir` or `<out_base>_items/`.
    PerItem { dir: Option<PathBuf> },
}

/// Write `report` once per format next to `out_base`. Returns the written paths.
pub fn save_all_formats(
    report: &EvalReport,
    out_base: &Path,
    formats: &[ReportFormat],
) -> Result<Vec<PathBuf>, ReportError> {
    let mut written = Vec::with_capacity(formats.len());
    for format in formats {
        let path = format.path_for(out_base);
        let body = format.render(report)?;
        write_creating_parent(&path, body.as_bytes()).map_err(|source| ReportError::Io {
            path: path.clone(),
            source,
        })?;
        info!(format = %format, path = %path.display(), "Wrote report");
        written.push(path);
    }
    Ok(written)
}

pub fn save_report(
    report: &EvalReport,
    out_base: &Path,
    formats: &[ReportFormat],
    mode: &SaveMode,
) -> Result<Vec<PathBuf>, ReportError> {
    let dir = match mode {
        SaveMode::Single => return save_all_formats(report, out_base, formats),
        SaveMode::PerItem { dir } => dir.clone().unwrap_or_else(|| per_item_dir(out_base)),
    };

    if report.results.is_empty() {
        warn!("No results found in report; nothing written");
        return Ok(Vec::new());
    }

    let mut written = Vec::new();
    for (idx, result) in report.results.iter().enumerate() {
        let sub_report = EvalReport {
            results: vec![result.clone()],
            summary: Default::default(),
            meta: report.meta.clone(),
        };
        let base = dir.join(format!("item_{:04}", idx + 1));
        written.extend(save_all_formats(&sub_report, &base, formats)?);
    }
    Ok(written)
}

fn per_item_dir(out_base: &Path) -> PathBuf {
    let stem = out_base.with_extension("");
    let name = stem
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "report".to_string());
    stem.with_file_name(format!("{name}_items"))
}

pub fn to_json(report: &EvalReport) -> Result<String, ReportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Two-decimal rendering used by the text reports.
pub(crate) fn fmt2(value: f64) -> String {
    format!("{value:.2}")
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::types::{EvalItem, EvalReport, ItemEvaluation, MetricResult};
    use serde_json::json;

    pub fn sample_report() -> EvalReport {
        EvalReport::from_results(vec![
            ItemEvaluation {
                item: EvalItem::new("Who wrote 1984?")
                    .with_answer("George Orwell")
                    .with_contexts(["1984 is a novel by George Orwell.", "Orwell was English."]),
                metrics: vec![
                    MetricResult::new("clarity", 0.9).with_explanation("Clear.\nConcise."),
                    MetricResult::new("retrieval_relevance", 0.5)
                        .with_explanation("1 of 2 chunks ≥ 0.70 relevance.")
                        .with_detail("per_chunk", json!([{"chunk_id": 1, "relevance": 1.0}]))
                        .with_raw(json!({"model": "gpt-4o-mini"})),
                ],
                aggregate: Some(0.7),
                eval_time_sec: Some(1.234),
            },
            ItemEvaluation {
                item: EvalItem::new("Is <b>this</b> & that \"quoted\"?"),
                metrics: vec![MetricResult::failed("clarity", "LLM error: timeout")],
                aggregate: Some(0.0),
                eval_time_sec: None,
            },
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::sample_report;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_formats() {
        assert_eq!(
            parse_formats("JSON, md,,html ").unwrap(),
            vec![ReportFormat::Json, ReportFormat::Markdown, ReportFormat::Html]
        );
        assert_eq!(parse_formats("").unwrap(), vec![ReportFormat::Markdown]);
        assert_eq!(parse_formats("csv,csv").unwrap(), vec![ReportFormat::Csv]);
    }

    #[test]
    fn test_parse_formats_rejects_unknown() {
        let err = parse_formats("json,pdf").unwrap_err();
        assert!(matches!(err, ReportError::UnknownFormat { ref format } if format == "pdf"));
    }

    #[test]
    fn test_paths_for_formats() {
        let base = Path::new("runs/report_manual");
        assert_eq!(
            ReportFormat::Markdown.path_for(base),
            PathBuf::from("runs/report_manual.md")
        );
        assert_eq!(
            ReportFormat::ItemsCsv.path_for(base),
            PathBuf::from("runs/report_manual_items.csv")
        );
        assert_eq!(
            per_item_dir(Path::new("out/report.json")),
            PathBuf::from("out/report_items")
        );
    }

    #[test]
    fn test_save_all_formats_creates_parents() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("nested/run/report");
        let written =
            save_all_formats(&sample_report(), &base, &ReportFormat::ALL).unwrap();
        assert_eq!(written.len(), 5);
        for path in &written {
            assert!(path.exists(), "{} missing", path.display());
        }
        let json = std::fs::read_to_string(base.with_extension("json")).unwrap();
        let parsed: EvalReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, sample_report());
    }

    #[test]
    fn test_save_report_per_item() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("report");
        let written = save_report(
            &sample_report(),
            &base,
            &[ReportFormat::Markdown, ReportFormat::Json],
            &SaveMode::PerItem { dir: None },
        )
        .unwrap();
        assert_eq!(written.len(), 4);
        assert!(dir.path().join("report_items/item_0002.md").exists());

        let second = std::fs::read_to_string(dir.path().join("report_items/item_0002.json")).unwrap();
        let parsed: EvalReport = serde_json::from_str(&second).unwrap();
        assert_eq!(parsed.results.len(), 1);
        assert!(parsed.summary.is_empty());
    }

    #[test]
    fn test_save_report_per_item_without_results() {
        let dir = TempDir::new().unwrap();
        let written = save_report(
            &EvalReport::default(),
            &dir.path().join("report"),
            &[ReportFormat::Markdown],
            &SaveMode::PerItem {
                dir: Some(dir.path().join("custom")),
            },
        )
        .unwrap();
        assert!(written.is_empty());
        assert!(!dir.path().join("custom").exists());
    }
}
