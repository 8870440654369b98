use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ragvue_core::agentic::{ItemProfile, choose_metrics, synthesize_answer_overall};
use ragvue_core::aspects::{fallback_aspects, parse_aspect_lines};
use ragvue_core::parse::{coerce_score, parse_json_object};
use ragvue_core::report::{csv, html, markdown};
use ragvue_core::{EvalItem, EvalReport, ItemEvaluation, MetricRegistry, MetricResult, RagvueConfig};
use serde_json::json;

fn sample_report(items: usize) -> EvalReport {
    let results = (0..items)
        .map(|i| ItemEvaluation {
            item: EvalItem::new(format!("Which city hosted event number {i}?"))
                .with_answer("It was held in Lisbon.")
                .with_contexts([
                    "The event took place in Lisbon in 2019.",
                    "Lisbon is the capital of Portugal.",
                ]),
            metrics: vec![
                MetricResult::new("retrieval_relevance", 0.5)
                    .with_explanation("1 of 2 chunks ≥ 0.70 relevance.")
                    .with_detail("per_chunk", json!([{"chunk_id": 1, "relevance": 1.0}])),
                MetricResult::new("clarity", 0.9).with_explanation("Short and direct."),
            ],
            aggregate: Some(0.7),
            eval_time_sec: Some(0.42),
        })
        .collect();
    EvalReport::from_results(results)
}

fn bench_verdict_parsing(c: &mut Criterion) {
    c.bench_function("parse_json_plain", |b| {
        b.iter(|| parse_json_object(black_box(r#"{"score": 0.8, "justification": "ok"}"#)))
    });

    c.bench_function("parse_json_fenced_with_prose", |b| {
        b.iter(|| {
            parse_json_object(black_box(
                "Here is my verdict:\n```json\n{\"per_chunk\": [{\"chunk_id\": 1, \"relevance\": 0.9,},],}\n```",
            ))
        })
    });

    c.bench_function("coerce_score_string", |b| {
        let value = json!("Score: 0.75 out of 1");
        b.iter(|| coerce_score(black_box(&value)))
    });
}

fn bench_aspects(c: &mut Criterion) {
    c.bench_function("fallback_aspects", |b| {
        b.iter(|| {
            fallback_aspects(
                black_box("Compare the economic and environmental impact of both policies"),
                6,
            )
        })
    });

    c.bench_function("parse_aspect_lines", |b| {
        b.iter(|| parse_aspect_lines(black_box("1. the date\n2. the location\n- the organizer\n"), 5))
    });
}

fn bench_agentic_selection(c: &mut Criterion) {
    let registry = MetricRegistry::with_defaults(&RagvueConfig::default()).unwrap();
    let item = EvalItem::new("What were the causes of both world wars?")
        .with_answer("Nationalism and alliances.")
        .with_contexts(["context one", "context two"]);

    c.bench_function("choose_metrics", |b| {
        b.iter(|| choose_metrics(black_box(&ItemProfile::of(&item)), &registry))
    });

    let metrics = vec![
        MetricResult::new("strict_faithfulness", 0.8),
        MetricResult::new("answer_relevance", 0.9),
        MetricResult::new("clarity", 1.0),
    ];
    c.bench_function("synthesize_answer_overall", |b| {
        b.iter(|| synthesize_answer_overall(black_box(&metrics)))
    });
}

fn bench_report_rendering(c: &mut Criterion) {
    let report = sample_report(50);

    c.bench_function("render_markdown_50", |b| {
        b.iter(|| markdown::render(black_box(&report)))
    });

    c.bench_function("render_html_50", |b| b.iter(|| html::render(black_box(&report))));

    c.bench_function("render_items_csv_50", |b| {
        b.iter(|| csv::items_csv(black_box(&report)))
    });
}

criterion_group!(
    benches,
    bench_verdict_parsing,
    bench_aspects,
    bench_agentic_selection,
    bench_report_rendering,
);
criterion_main!(benches);
