//! Manual evaluation: run a caller-chosen set of metrics over every item.

use crate::config::RagvueConfig;
use crate::error::RagvueError;
use crate::judge::Judge;
use crate::metrics::{Metric, MetricContext, MetricRegistry, run_metric};
use crate::types::{EvalItem, EvalMode, EvalReport, ItemEvaluation, ReportMeta, mean};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Runs metrics from a registry against items with bounded concurrency.
pub struct Evaluator {
    registry: Arc<MetricRegistry>,
    ctx: MetricContext,
    concurrency: usize,
}

impl Evaluator {
    /// Evaluator over the default registry for `config`.
    pub fn new(judge: Judge, config: &RagvueConfig) -> Result<Self, RagvueError> {
        let registry = MetricRegistry::with_defaults(config)?;
        Ok(Self::with_registry(
            Arc::new(registry),
            MetricContext::new(judge, config),
            config.eval.concurrency,
        ))
    }

    pub fn with_registry(
        registry: Arc<MetricRegistry>,
        ctx: MetricContext,
        concurrency: usize,
    ) -> Self {
        Self {
            registry,
            ctx,
            concurrency: concurrency.max(1),
        }
    }

    pub fn registry(&self) -> &MetricRegistry {
        &self.registry
    }

    pub fn context(&self) -> &MetricContext {
        &self.ctx
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Evaluate `items` with the named metrics; an empty list selects all of them.
    pub async fn evaluate<S: AsRef<str>>(
        &self,
        items: Vec<EvalItem>,
        metric_names: &[S],
    ) -> Result<EvalReport, RagvueError> {
        let metrics = self.registry.select(metric_names)?;
        info!(
            items = items.len(),
            metrics = metrics.len(),
            concurrency = self.concurrency,
            "Starting manual evaluation"
        );

        let results = stream::iter(items.into_iter().enumerate())
            .map(|(index, item)| {
                let metrics = &metrics;
                async move { self.evaluate_item(index, item, metrics).await }
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(EvalReport::from_results(results)
            .with_meta(ReportMeta::new(EvalMode::Manual, self.ctx.default_model())))
    }

    /// Run `metrics` on one item in order. Failures become score-0 results.
    pub async fn evaluate_item(
        &self,
        index: usize,
        item: EvalItem,
        metrics: &[Arc<dyn Metric>],
    ) -> ItemEvaluation {
        let started = Instant::now();
        let mut results = Vec::with_capacity(metrics.len());
        for metric in metrics {
            results.push(run_metric(metric.as_ref(), &self.ctx, &item).await);
        }
        let aggregate = mean(results.iter().map(|r| r.score));
        let elapsed = started.elapsed().as_secs_f64();

        info!(
            item = index + 1,
            metrics = results.len(),
            aggregate = aggregate.unwrap_or(0.0),
            elapsed_secs = elapsed,
            "Evaluated item"
        );

        ItemEvaluation {
            item,
            metrics: results,
            aggregate,
            eval_time_sec: Some(elapsed),
        }
    }
}

/// Evaluate `items` with a fresh evaluator built from `config`.
pub async fn evaluate<S: AsRef<str>>(
    judge: Judge,
    config: &RagvueConfig,
    items: Vec<EvalItem>,
    metrics: &[S],
) -> Result<EvalReport, RagvueError> {
    Evaluator::new(judge, config)?.evaluate(items, metrics).await
}
