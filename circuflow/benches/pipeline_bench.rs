//! Benchmarks for pipeline execution.

use circuflow::prelude::*;
use circuflow::testing::noop_standard_stages;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use serde_json::json;

fn orchestrator() -> anyhow::Result<PipelineOrchestrator> {
    let pipeline = standard_pipeline(noop_standard_stages(), None)?;
    Ok(PipelineOrchestrator::new(pipeline, OrchestratorConfig::default())?)
}

fn pipeline_benchmark(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().expect("runtime");
    let orchestrator = orchestrator().expect("orchestrator");

    c.bench_function("standard_pipeline_noop_run", |b| {
        b.iter(|| {
            let input = PipelineContext::from_value(json!({"material": "steel"})).expect("input");
            let outcome = runtime.block_on(orchestrator.run(input)).expect("run");
            black_box(outcome)
        });
    });

    c.bench_function("envelope_parse_fenced", |b| {
        let reply = "```json\n{\"status\": \"success\", \"data\": {\"gwp\": 1800}, \"confidence\": 0.9}\n```";
        b.iter(|| black_box(ResponseEnvelope::parse(black_box(reply))));
    });
}

criterion_group!(benches, pipeline_benchmark);
criterion_main!(benches);
