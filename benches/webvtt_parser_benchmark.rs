use std::hint::black_box;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use webvtt_processor::{WebvttParsingOptions, parse_webvtt};

const SAMPLE_VTT: &str = include_str!("../tests/test_data/real_world.vtt");

fn benchmark_parse_webvtt(c: &mut Criterion) {
    let mut group = c.benchmark_group("WebVTT Parsing");

    group.measurement_time(Duration::from_secs(20));
    group.sample_size(200);

    let default_options = WebvttParsingOptions::default();

    group.bench_function("parse_normal_webvtt", |b| {
        b.iter(|| {
            let parsed_data = parse_webvtt(black_box(SAMPLE_VTT), black_box(&default_options));
            assert!(parsed_data.diagnostics.is_empty(), "样本解析产生了诊断");

            black_box(parsed_data);
        });
    });

    group.finish();
}

criterion_group!(benches, benchmark_parse_webvtt);

criterion_main!(benches);
