//! Performance benchmarks for the SMTP probe
//!
//! Covers the per-attempt hot paths: recording outcomes, taking snapshots,
//! parsing replies and encoding message bodies.

use chrono::Utc;
use clap::Parser;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use smtp_probe::{
    cli::Cli,
    client::{encode_data, MessageBuilder, Response},
    config::ConfigParser,
    models::{AttemptOutcome, OutcomeKind, SuccessThreshold},
    output::{FormattingOptions, OutputFormatter, PlainFormatter},
    stats::{Aggregator, LatencyHistogram},
    types::SmtpStage,
};
use std::time::{Duration, Instant};

/// Outcomes with a 10% failure rate spread over the failure kinds
fn create_sample_outcomes(count: u64) -> Vec<AttemptOutcome> {
    let started = Utc::now();
    (0..count)
        .map(|seq| {
            let duration = Duration::from_micros(2_000 + seq % 5_000);
            let kind = match seq % 20 {
                0 => OutcomeKind::ConnectFailure { message: "connection refused".to_string() },
                10 => OutcomeKind::ProtocolFailure {
                    stage: SmtpStage::RcptTo,
                    code: 550,
                    message: "mailbox unavailable".to_string(),
                },
                _ => OutcomeKind::Success,
            };
            AttemptOutcome::new(seq, (seq % 8) as usize, started, duration, kind)
        })
        .collect()
}

fn aggregated(outcomes: &[AttemptOutcome]) -> Aggregator {
    let aggregator = Aggregator::new("mx.example.com:25");
    aggregator.start(Instant::now());
    for outcome in outcomes {
        aggregator.record(outcome);
    }
    aggregator
}

/// Benchmark outcome aggregation
fn benchmark_aggregation(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregation");

    for size in [100u64, 1_000, 10_000].iter() {
        let outcomes = create_sample_outcomes(*size);

        group.bench_with_input(BenchmarkId::new("record", size), size, |b, _| {
            b.iter(|| {
                let aggregator = aggregated(black_box(&outcomes));
                black_box(aggregator);
            });
        });

        let aggregator = aggregated(&outcomes);
        group.bench_with_input(BenchmarkId::new("snapshot", size), size, |b, _| {
            b.iter(|| black_box(aggregator.snapshot()));
        });
    }

    group.finish();
}

/// Benchmark the latency histogram
fn benchmark_histogram(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram");

    group.bench_function("record_10k", |b| {
        b.iter(|| {
            let mut histogram = LatencyHistogram::new();
            for i in 0..10_000u64 {
                histogram.record(Duration::from_micros(black_box(100 + i * 37)));
            }
            black_box(histogram);
        });
    });

    let mut histogram = LatencyHistogram::new();
    for i in 0..10_000u64 {
        histogram.record(Duration::from_micros(100 + i * 37));
    }
    group.bench_function("percentiles", |b| {
        b.iter(|| {
            let p = [50.0, 90.0, 99.0].map(|p| histogram.percentile(black_box(p)));
            black_box(p);
        });
    });

    group.finish();
}

/// Benchmark the SMTP wire layer
fn benchmark_wire(c: &mut Criterion) {
    let mut group = c.benchmark_group("wire");

    let ehlo_reply = b"250-mx.example.com greets you\r\n250-PIPELINING\r\n250-SIZE 35882577\r\n250-8BITMIME\r\n250 SMTPUTF8\r\n";
    group.bench_function("parse_multiline_reply", |b| {
        b.iter(|| {
            let parsed = Response::parse_response(black_box(ehlo_reply));
            black_box(parsed.ok());
        });
    });

    let message = MessageBuilder::new("probe@example.com", "sink@example.com")
        .subject("smtp probe 1")
        .body(".leading dot\nline two\n".repeat(200))
        .date(Utc::now())
        .build();
    group.bench_function("encode_data", |b| {
        b.iter(|| black_box(encode_data(black_box(&message))));
    });

    group.finish();
}

/// Benchmark configuration loading and summary rendering
fn benchmark_application_workflow(c: &mut Criterion) {
    let mut group = c.benchmark_group("application_workflow");
    group.sample_size(20);

    let dir = std::env::temp_dir().join("smtp-probe-bench-missing-env");
    group.bench_function("config_loading_pipeline", |b| {
        let args = ["probe", "--host", "mx.example.com", "--count", "50", "--concurrency", "5", "--no-color"];
        b.iter(|| {
            let cli = Cli::parse_from(black_box(args));
            let config = ConfigParser::new(cli).with_env_file(dir.join(".env")).parse();
            black_box(config.ok());
        });
    });

    let summary = aggregated(&create_sample_outcomes(1_000)).snapshot();
    let formatter = PlainFormatter::new(FormattingOptions::default());
    group.bench_function("format_summary", |b| {
        b.iter(|| {
            let rendered = formatter.format_summary(black_box(&summary), &SuccessThreshold::default());
            black_box(rendered.ok());
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_aggregation,
    benchmark_histogram,
    benchmark_wire,
    benchmark_application_workflow
);

criterion_main!(benches);
