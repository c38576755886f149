//! Content Classifier CLI
//!
//! Compile filter lists, classify requests and benchmark the matcher.

mod bench;
mod fetch;
mod requests;

use std::fs;
use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand};

use cc_core::psl::{HeuristicSiteResolver, PublicSuffixResolver, SiteResolver};
use cc_service::{split_rules, ClassificationService, ListFetcher, ServiceConfig};

use crate::fetch::CliFetcher;
use crate::requests::{read_requests, ClassifiedRecord, RequestRecord};

#[derive(Parser)]
#[command(name = "cc-cli")]
#[command(about = "Content classifier filter list compiler and tools")]
struct Cli {
    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile filter lists and report what each line became
    Compile {
        /// Filter list paths or URLs
        #[arg(short, long, required = true)]
        input: Vec<String>,
    },

    /// Classify requests for blocking and annotation
    Classify {
        /// Service config file (JSON); list flags are ignored when given
        #[arg(short, long)]
        config: Option<String>,

        /// Block list paths or URLs, in priority order
        #[arg(short = 'b', long = "block-list")]
        block_lists: Vec<String>,

        /// Annotation list paths or URLs, in priority order
        #[arg(short = 'a', long = "annotation-list")]
        annotation_lists: Vec<String>,

        /// Request URL to classify
        #[arg(short, long, conflicts_with = "requests")]
        url: Option<String>,

        /// URL of the document that initiated the request
        #[arg(short, long)]
        source_url: Option<String>,

        /// Resource type tag (script, image, ...)
        #[arg(short = 't', long = "type", default_value = "other")]
        resource_type: String,

        /// JSON-lines request file
        #[arg(short, long)]
        requests: Option<String>,

        /// public_suffix_list.dat for site resolution
        #[arg(long)]
        psl: Option<String>,
    },

    /// Measure classification throughput
    Bench {
        /// Block list paths or URLs
        #[arg(short = 'b', long = "block-list", required = true)]
        block_lists: Vec<String>,

        /// JSON-lines request file (synthetic requests when omitted)
        #[arg(short, long)]
        requests: Option<String>,

        /// Passes over the request set
        #[arg(short, long, default_value_t = 10_000)]
        iterations: usize,

        /// public_suffix_list.dat for site resolution
        #[arg(long)]
        psl: Option<String>,
    },
}

fn setup_logging(verbose: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if verbose { "debug" } else { "warn" })
    });

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let result = match cli.command {
        Commands::Compile { input } => cmd_compile(&input, cli.verbose).await,
        Commands::Classify {
            config,
            block_lists,
            annotation_lists,
            url,
            source_url,
            resource_type,
            requests,
            psl,
        } => {
            let records = match (url, requests) {
                (Some(url), _) => Ok(vec![RequestRecord {
                    url,
                    source_url,
                    resource_type: Some(resource_type),
                    third_party: None,
                }]),
                (None, Some(path)) => read_requests(&path),
                (None, None) => Err("Either --url or --requests is required".to_string()),
            };
            match records {
                Ok(records) => cmd_classify(config, block_lists, annotation_lists, &records, psl.as_deref()).await,
                Err(e) => Err(e),
            }
        }
        Commands::Bench {
            block_lists,
            requests,
            iterations,
            psl,
        } => cmd_bench(block_lists, requests, iterations, psl.as_deref()).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_resolver(psl: Option<&str>) -> Result<Box<dyn SiteResolver>, String> {
    match psl {
        Some(path) => {
            let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
            let resolver = PublicSuffixResolver::from_text(&text).map_err(|e| format!("'{}': {}", path, e))?;
            Ok(Box::new(resolver))
        }
        None => Ok(Box::new(HeuristicSiteResolver)),
    }
}

async fn cmd_compile(inputs: &[String], verbose: bool) -> Result<(), String> {
    let fetcher = CliFetcher::new()?;
    let start = Instant::now();
    let mut total_rules = 0usize;

    for (list_id, input) in inputs.iter().enumerate() {
        let list_start = Instant::now();
        let body = fetcher
            .fetch(input)
            .await
            .map_err(|e| format!("Failed to load '{}': {}", input, e))?;
        let lines = split_rules(&body);
        let (engine, report) = cc_compiler::compile_with_report(&lines)
            .map_err(|e| format!("Failed to compile '{}': {}", input, e))?;
        total_rules += report.rules;

        println!("[{}] {}", list_id, input);
        println!("  Lines:    {} ({} comments, {} skipped)", report.lines, report.comments, report.skipped);
        println!(
            "  Rules:    {} (dedupe removed {}, badfilter {} removing {})",
            report.rules, report.deduped, report.badfilter_rules, report.badfiltered_rules
        );
        if verbose {
            let stats = engine.stats();
            println!(
                "  Index:    {} hosts, {} tokens, {} untokenized",
                stats.hosts, stats.tokens, stats.untokenized
            );
        }
        println!("  Time:     {:.1}ms", list_start.elapsed().as_secs_f64() * 1000.0);
    }

    println!(
        "Compiled {} filter lists: {} rules in {:.1}ms",
        inputs.len(),
        total_rules,
        start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(())
}

async fn cmd_classify(
    config_path: Option<String>,
    block_lists: Vec<String>,
    annotation_lists: Vec<String>,
    records: &[RequestRecord],
    psl: Option<&str>,
) -> Result<(), String> {
    let resolver = load_resolver(psl)?;
    let config = match config_path {
        Some(path) => ServiceConfig::load(&path).map_err(|e| e.to_string())?,
        None => ServiceConfig {
            protection_enabled: !block_lists.is_empty(),
            annotation_enabled: !annotation_lists.is_empty(),
            block_list_urls: block_lists,
            annotation_list_urls: annotation_lists,
        },
    };

    let service = ClassificationService::new(config, Arc::new(CliFetcher::new()?));
    let summary = service.start().await.map_err(|e| e.to_string())?;
    log::info!(
        "loaded {}/{} block lists, {}/{} annotation lists",
        summary.block.loaded,
        summary.block.configured,
        summary.annotate.loaded,
        summary.annotate.configured
    );

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for record in records {
        let request = record.to_request(resolver.as_ref());
        let line = ClassifiedRecord {
            url: request.url(),
            site: request.schemeless_site(),
            source_site: request.source_schemeless_site(),
            third_party: request.is_third_party(),
            block: service.classify_for_block(&request).into(),
            annotate: service.classify_for_annotate(&request).into(),
        };
        let json = serde_json::to_string(&line).map_err(|e| format!("Failed to encode result: {}", e))?;
        writeln!(out, "{}", json).map_err(|e| format!("Failed to write output: {}", e))?;
    }

    service.shutdown();
    Ok(())
}

async fn cmd_bench(
    block_lists: Vec<String>,
    requests_path: Option<String>,
    iterations: usize,
    psl: Option<&str>,
) -> Result<(), String> {
    let resolver = load_resolver(psl)?;
    let fetcher = CliFetcher::new()?;
    bench::run(
        bench::BenchOptions {
            lists: block_lists,
            requests_path,
            iterations,
        },
        &fetcher,
        resolver.as_ref(),
    )
    .await
}
