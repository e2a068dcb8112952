//! End-to-end benchmarks for the User-Agent analyzer.
//!
//! These benchmarks measure the complete pipeline from repairing and
//! parsing the input through flattening and hash dispatch to matcher
//! evaluation, using the rule fixture shared with the integration tests.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use useragent_engine::{AnalyzerConfig, RuleSet, UserAgentAnalyzer};

const RULES: &str = include_str!("../tests/fixtures/browsers.yaml");

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64; rv:120.0) Gecko/20100101 Firefox/120.0",
    "Mozilla/5.0 (Linux; Android 13; SM-S911B) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/116.0.0.0 Mobile Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; WOW64; Trident/7.0; rv:11.0) like Gecko",
    "curl/8.4.0",
];

fn setup_analyzer(config: AnalyzerConfig) -> anyhow::Result<UserAgentAnalyzer> {
    let rules: RuleSet = serde_yaml::from_str(RULES)?;
    Ok(UserAgentAnalyzer::builder()
        .with_config(config)
        .with_rule_set(rules)
        .build()?)
}

fn bench_build(c: &mut Criterion) {
    c.bench_function("analyzer_build", |b| {
        b.iter(|| setup_analyzer(black_box(AnalyzerConfig::testing())).unwrap())
    });
}

fn bench_single_parse(c: &mut Criterion) {
    let mut analyzer = setup_analyzer(AnalyzerConfig::testing()).unwrap();

    for (index, user_agent) in USER_AGENTS.iter().enumerate() {
        c.bench_with_input(
            BenchmarkId::new("parse_uncached", index),
            user_agent,
            |b, user_agent| b.iter(|| analyzer.parse(black_box(user_agent))),
        );
    }
}

fn bench_cached_parse(c: &mut Criterion) {
    let mut analyzer = setup_analyzer(AnalyzerConfig::new()).unwrap();

    c.bench_function("parse_cached", |b| {
        b.iter(|| {
            for user_agent in USER_AGENTS {
                black_box(analyzer.parse(user_agent));
            }
        })
    });
}

fn bench_flatten_only(c: &mut Criterion) {
    let analyzer = setup_analyzer(AnalyzerConfig::testing()).unwrap();

    c.bench_function("flatten_only", |b| {
        b.iter(|| analyzer.flatten(black_box(USER_AGENTS[0])))
    });
}

fn bench_batch(c: &mut Criterion) {
    let analyzer = setup_analyzer(AnalyzerConfig::testing().with_min_batch_size_for_parallelism(64)).unwrap();

    for batch_size in [10, 100, 1000].iter() {
        let batch: Vec<&str> = USER_AGENTS.iter().cycle().take(*batch_size).copied().collect();
        c.bench_with_input(
            BenchmarkId::new("parse_batch", batch_size),
            &batch,
            |b, batch| b.iter(|| analyzer.parse_batch(black_box(batch))),
        );
    }
}

criterion_group!(
    benches,
    bench_build,
    bench_single_parse,
    bench_cached_parse,
    bench_flatten_only,
    bench_batch
);
criterion_main!(benches);
