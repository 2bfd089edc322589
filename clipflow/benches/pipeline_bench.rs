//! Benchmarks for the provider response decoders.

use clipflow::poller::shape::{decode_result, extract_status};
use clipflow::poller::ProviderDialect;
use clipflow::stages::{parse_idea, parse_scenes};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

const IDEA: &str = "```json\n[{\"Caption\": \"Slicing a glass kiwi #asmr\", \"Idea\": \"Glass kiwi sliced on marble\", \"Environment\": \"Dark studio, macro lens\", \"Sound\": \"Crisp glassy crunch\", \"Status\": \"for production\"}]\n```";

fn decoder_benchmark(c: &mut Criterion) {
    let prediction = json!({"data": {"id": "p1", "status": "completed", "outputs": ["https://cdn/p1.mp4"]}});
    let queue = json!({"status": "COMPLETED", "output": {"video": {"url": "https://cdn/q1.mp4"}}});
    let script: String = (1..=6)
        .map(|n| format!("Scene {n}: \"A slow macro shot number {n}\"\n"))
        .collect();

    c.bench_function("decode_prediction_result", |b| {
        b.iter(|| decode_result(black_box(&prediction), ProviderDialect::Prediction.result_shapes()))
    });
    c.bench_function("decode_queue_nested_result", |b| {
        b.iter(|| decode_result(black_box(&queue), ProviderDialect::Queue.result_shapes()))
    });
    c.bench_function("extract_status", |b| {
        b.iter(|| extract_status(black_box(&prediction)).map(str::len))
    });
    c.bench_function("parse_idea", |b| b.iter(|| parse_idea(black_box(IDEA))));
    c.bench_function("parse_scenes", |b| b.iter(|| parse_scenes(black_box(&script))));
}

criterion_group!(benches, decoder_benchmark);
criterion_main!(benches);
