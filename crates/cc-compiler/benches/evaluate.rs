//! Benchmarks for compiling lists and classifying requests.

use std::hint::black_box;

use cc_compiler::compile;
use cc_core::{ClassificationRequest, Matcher, ResourceType};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};

fn synthetic_list(hosts: usize) -> Vec<String> {
    let mut lines: Vec<String> = (0..hosts).map(|i| format!("||tracker{i}.example^")).collect();
    lines.extend((0..hosts / 10).map(|i| format!("/pixel{i}.gif")));
    lines.extend((0..hosts / 100).map(|i| format!("@@||tracker{i}.example/allowed^")));
    lines.push("||cdn.example^$important".to_string());
    lines
}

fn bench_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("compile");
    for size in [1_000usize, 10_000, 50_000] {
        let lines = synthetic_list(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &lines, |b, lines| {
            b.iter(|| compile(black_box(lines)))
        });
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let Ok(engine) = compile(synthetic_list(50_000)) else {
        return;
    };
    let matcher = Matcher::new(&engine);

    let requests = [
        ("host_hit", "https://a.tracker42.example/script.js", "tracker42.example"),
        ("exception", "https://tracker7.example/allowed/x", "tracker7.example"),
        ("token_hit", "https://img.example/p/pixel123.gif", "img.example"),
        ("miss", "https://static.unrelated.example/app/main.js?v=3", "unrelated.example"),
    ];

    let mut group = c.benchmark_group("evaluate");
    for (name, url, site) in requests {
        let req = ClassificationRequest::new(url, site, "news.example", ResourceType::Script, true);
        group.bench_function(name, |b| b.iter(|| matcher.evaluate(black_box(&req))));
    }
    group.finish();
}

criterion_group!(benches, bench_compile, bench_evaluate);
criterion_main!(benches);
