use std::time::Instant;

use cc_core::psl::SiteResolver;
use cc_core::{ClassificationRequest, CompiledEngine};
use cc_service::{split_rules, EngineGeneration, ListFetcher, Purpose};

use crate::requests::{read_requests, RequestRecord};

pub struct BenchOptions {
    pub lists: Vec<String>,
    pub requests_path: Option<String>,
    pub iterations: usize,
}

/// Requests used when no request file is given.
fn synthetic_requests() -> Vec<RequestRecord> {
    let hosts = [
        "cdn.tracker.example",
        "static.news.example",
        "ads.doubleclick.net",
        "www.google-analytics.com",
        "img.shop.example",
        "connect.facebook.net",
    ];
    let paths = ["/js/analytics.js", "/pixel.gif?id=42", "/ads/banner.png", "/app/main.css", "/"];
    let types = ["script", "image", "image", "stylesheet", "subdocument"];

    hosts
        .iter()
        .flat_map(|host| {
            paths.iter().zip(types).map(move |(path, ty)| RequestRecord {
                url: format!("https://{host}{path}"),
                source_url: Some("https://www.news.example/article".to_string()),
                resource_type: Some(ty.to_string()),
                third_party: None,
            })
        })
        .collect()
}

pub async fn run(opts: BenchOptions, fetcher: &dyn ListFetcher, resolver: &dyn SiteResolver) -> Result<(), String> {
    if opts.lists.is_empty() {
        return Err("No filter lists specified".to_string());
    }

    let compile_start = Instant::now();
    let mut engines: Vec<CompiledEngine> = Vec::with_capacity(opts.lists.len());
    let mut rules = 0usize;
    for url in &opts.lists {
        let body = fetcher
            .fetch(url)
            .await
            .map_err(|e| format!("Failed to fetch '{}': {}", url, e))?;
        let engine = cc_compiler::compile(split_rules(&body))
            .map_err(|e| format!("Failed to compile '{}': {}", url, e))?;
        rules += engine.rule_count();
        engines.push(engine);
    }
    let compile_ms = compile_start.elapsed().as_secs_f64() * 1000.0;

    let records = match &opts.requests_path {
        Some(path) => read_requests(path)?,
        None => synthetic_requests(),
    };
    if records.is_empty() {
        return Err("No requests to benchmark".to_string());
    }
    let requests: Vec<ClassificationRequest> = records.iter().map(|r| r.to_request(resolver)).collect();

    let generation = EngineGeneration::new(1, engines, Vec::new());

    // Warm up and count hits once.
    let hits = requests
        .iter()
        .filter(|req| generation.classify(Purpose::Block, req).hit())
        .count();

    let iterations = opts.iterations.max(1);
    let start = Instant::now();
    for _ in 0..iterations {
        for req in &requests {
            std::hint::black_box(generation.classify(Purpose::Block, std::hint::black_box(req)));
        }
    }
    let elapsed = start.elapsed();

    let ops = (iterations * requests.len()) as f64;
    let ns_per_op = elapsed.as_nanos() as f64 / ops;

    println!("============================================================");
    println!("Lists:       {} ({} rules, compiled in {:.1}ms)", opts.lists.len(), rules, compile_ms);
    println!("Requests:    {} ({} hits)", requests.len(), hits);
    println!("Iterations:  {}", iterations);
    println!("Time:        {:.1}ms", elapsed.as_secs_f64() * 1000.0);
    println!("Per request: {:.0}ns ({:.0} ops/s)", ns_per_op, 1e9 / ns_per_op);
    println!("============================================================");

    Ok(())
}
