//! # RAGVue Core
//!
//! Core library for RAGVue, an LLM-judged evaluator for Retrieval-Augmented
//! Generation outputs. Provides the judge client, the metric registry, manual
//! and agentic evaluation, dataset I/O, and report rendering.

pub mod agentic;
pub mod aspects;
pub mod config;
pub mod dataset;
pub mod error;
pub mod evaluator;
pub mod judge;
pub mod metrics;
pub mod parse;
pub mod providers;
pub mod report;
pub mod types;

// Re-export commonly used types at the crate root.
pub use agentic::{AgenticOrchestrator, ItemProfile, evaluate_agentic};
pub use config::{ConfigOverrides, RagvueConfig, load_config};
pub use error::{
    ConfigError, DatasetError, LlmError, MetricError, RagvueError, ReportError, Result,
};
pub use evaluator::{Evaluator, evaluate};
pub use judge::{Judge, JudgeUsage, LlmProvider, MockLlmProvider};
pub use metrics::{Metric, MetricContext, MetricRegistry};
pub use report::{ReportFormat, SaveMode, parse_formats, save_all_formats, save_report};
pub use types::{
    CompletionRequest, CompletionResponse, EvalItem, EvalMode, EvalReport, ItemEvaluation,
    Message, MetricResult, ReportMeta, ReportStats, Role, TokenUsage,
};
