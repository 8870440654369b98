//! JSONL datasets and saved reports.

use crate::error::{DatasetError, RagvueError, ReportError};
use crate::types::{EvalItem, EvalReport};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Parse one JSON object per line. Blank lines are skipped.
pub fn parse_jsonl(text: &str) -> Result<Vec<EvalItem>, DatasetError> {
    let mut items = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let item = serde_json::from_str::<EvalItem>(line).map_err(|e| DatasetError::Parse {
            line: idx + 1,
            message: e.to_string(),
        })?;
        items.push(item);
    }
    Ok(items)
}

pub fn read_jsonl(path: &Path) -> Result<Vec<EvalItem>, DatasetError> {
    let text = fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let items = parse_jsonl(&text)?;
    debug!(path = %path.display(), items = items.len(), "Loaded dataset");
    Ok(items)
}

/// Like [`read_jsonl`], but a file without items is an error.
pub fn load_items(path: &Path) -> Result<Vec<EvalItem>, DatasetError> {
    let items = read_jsonl(path)?;
    if items.is_empty() {
        return Err(DatasetError::Empty {
            path: path.to_path_buf(),
        });
    }
    Ok(items)
}

pub fn write_jsonl(path: &Path, items: &[EvalItem]) -> Result<(), RagvueError> {
    let mut out = String::new();
    for item in items {
        out.push_str(&serde_json::to_string(item)?);
        out.push('\n');
    }
    write_creating_parent(path, out.as_bytes()).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

pub fn load_report(path: &Path) -> Result<EvalReport, RagvueError> {
    let text = fs::read_to_string(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

pub fn save_report_json(path: &Path, report: &EvalReport) -> Result<(), ReportError> {
    let json = serde_json::to_string_pretty(report)?;
    write_creating_parent(path, json.as_bytes()).map_err(|source| ReportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn write_creating_parent(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)
}
