use anyhow::{Context, Result};
use clap::Parser;
use pulso::cli::{Cli, OutputFormat};
use pulso::config::ProfilerConfig;
use pulso::csv_output;
use pulso::json_output::JsonReport;
use pulso::provenance::ComponentResolver;
use pulso::replay::{self, ReplayOutcome};
use pulso::sampler::SampleGate;
use pulso::storage::{MemoryStore, SampleStore};
use std::io::Read;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn load_config(cli: &Cli) -> Result<ProfilerConfig> {
    let mut config = match &cli.config {
        Some(path) => ProfilerConfig::load(path)?,
        None => ProfilerConfig::default(),
    };
    if cli.hooks {
        config.profile_hooks = true;
    }
    if let Some(rate) = cli.sample_rate {
        config.sampling_rate_percent = rate;
    }
    if let Some(n) = cli.slowest {
        config.slow_query_limit = n;
    }
    Ok(config)
}

fn read_trace(cli: &Cli) -> Result<String> {
    match &cli.trace {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read trace: {}", path.display())),
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read trace from stdin")?;
            Ok(raw)
        }
    }
}

fn print_text_report(outcome: &ReplayOutcome, config: &ProfilerConfig, store: &MemoryStore) {
    let summary = &outcome.summary;
    let profiler = &outcome.profiler;

    println!("Request report for {}", profiler.page_url());
    println!();
    println!("Total time:    {:.3} ms", summary.total_time * 1000.0);
    println!("Queries:       {}", summary.query_count);
    println!("Query time:    {:.3} ms", summary.query_time * 1000.0);
    println!("Peak memory:   {} bytes", summary.memory_usage);
    let persisted = if !store.is_empty() {
        "yes"
    } else if !config.tracking_enabled {
        "no (tracking disabled)"
    } else {
        "no (sampled out)"
    };
    println!("Persisted:     {persisted}");
    println!();

    profiler.phases().print_summary(summary.total_time);
    println!();
    profiler.queries().print_summary(config.slow_query_limit);

    if let Some(hooks) = profiler.hook_profiler() {
        println!();
        hooks.print_summary();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = load_config(&cli)?;
    let raw = read_trace(&cli)?;
    let events = replay::parse_events(&raw)?;

    let resolver = Arc::new(ComponentResolver::new(config.roots.clone()));
    let mut store = MemoryStore::new();
    let mut gate = match cli.seed {
        Some(seed) => SampleGate::seeded(seed),
        None => SampleGate::new(),
    };

    let outcome = replay::replay(
        &events,
        config.clone(),
        resolver,
        &cli.page_url,
        &mut store,
        &mut gate,
    );

    match cli.format {
        OutputFormat::Text => print_text_report(&outcome, &config, &store),
        OutputFormat::Json => {
            let report = JsonReport::from_profiler(&outcome.profiler, outcome.summary.clone());
            println!("{}", report.to_pretty()?);
        }
        OutputFormat::Csv => {
            print!("{}", csv_output::samples_to_csv(&store.recent(usize::MAX)));
        }
    }

    Ok(())
}
