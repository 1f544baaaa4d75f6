use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use gridseek_core::config::{Config, DataSettings};
use gridseek_core::data_processor::DataProcessor;
use gridseek_core::error::Error;
use gridseek_core::predicate::Predicate;
use gridseek_core::traits::Embedder;
use gridseek_embed::{get_default_embedder, EmbedSettings};
use gridseek_hybrid::{RetrievalSession, RetrievalSettings};
use gridseek_vector::StrategyPolicy;

const USAGE: &str = "Usage:
  gridseek ingest [input_dir] [--force]
  gridseek query \"<text>\" [--k N] [--filter <json>] [--min-score X]
  gridseek aggregate \"<text>\" <group_by> [--sum <attr>] [--k N]
  gridseek stats";

struct App {
    session: RetrievalSession,
    data: DataSettings,
    base: PathBuf,
}

impl App {
    fn from_config(config: &Config) -> anyhow::Result<Self> {
        let data: DataSettings = config.get_or_default("data")?;
        let embed: EmbedSettings = config.get_or_default("embedding")?;
        let policy: StrategyPolicy = config.get_or_default("index")?;
        let retrieval: RetrievalSettings = config.get_or_default("retrieval")?;
        let embedder: Arc<dyn Embedder> = Arc::from(get_default_embedder(&embed)?);
        Ok(Self { session: RetrievalSession::new(embedder, policy, retrieval), data, base: env::current_dir()? })
    }

    fn index_dir(&self) -> PathBuf { self.data.index_path(&self.base) }

    fn open(&self) -> anyhow::Result<()> {
        match self.session.load(&self.index_dir()) {
            Err(Error::NotFound(_)) => anyhow::bail!("no index at {}; run `gridseek ingest` first", self.index_dir().display()),
            other => Ok(other?),
        }
    }
}

fn usage_exit() -> ! {
    eprintln!("{}", USAGE);
    std::process::exit(1)
}

/// Value following a `--flag`, exiting with usage on a missing or unparsable value.
fn flag_value<T: std::str::FromStr>(args: &[String], i: &mut usize, flag: &str) -> T {
    *i += 1;
    match args.get(*i).map(|s| s.parse::<T>()) {
        Some(Ok(v)) => v,
        _ => { eprintln!("Error: {} requires a value", flag); usage_exit() }
    }
}

fn ingest(app: &App, args: &[String]) -> anyhow::Result<()> {
    let mut input = None;
    let mut force = false;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--force" | "-f" => force = true,
            a if !a.starts_with('-') => input = Some(PathBuf::from(a)),
            other => { eprintln!("Unknown option: {}", other); usage_exit() }
        }
        i += 1;
    }
    let input = input.unwrap_or_else(|| app.data.input_path(&app.base));
    let index_dir = app.index_dir();
    if !force && gridseek_vector::persist::manifest_exists(&index_dir) {
        println!("Index already present at {} (use --force to rebuild)", index_dir.display());
        return Ok(());
    }
    println!("Ingesting from {}", input.display());
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message("loading, embedding and indexing records");
    let stats = app.session.ingest_from(&DataProcessor::new(&input))?;
    pb.set_message("persisting index");
    let manifest = app.session.persist(&index_dir)?;
    pb.finish_with_message("done");
    println!("Indexed {} records (strategy: {}, dimension: {})", stats.record_count, stats.strategy.kind().as_str(), stats.dimension);
    if let Some(p) = stats.effective_partitions { println!("Partitions: {}", p); }
    println!("Index written to {} ({})", index_dir.display(), manifest.created_at);
    Ok(())
}

fn query(app: &App, args: &[String]) -> anyhow::Result<()> {
    let mut text = None;
    let mut k = app.session.settings().top_k;
    let mut predicate = None;
    let mut min_score = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--k" | "-k" => k = flag_value(args, &mut i, "--k"),
            "--filter" => {
                let raw: String = flag_value(args, &mut i, "--filter");
                predicate = Some(Predicate::from_json(&raw).map_err(|e| anyhow::anyhow!("invalid --filter: {}", e))?);
            }
            "--min-score" => min_score = Some(flag_value::<f32>(args, &mut i, "--min-score")),
            a if !a.starts_with('-') && text.is_none() => text = Some(a.to_string()),
            other => { eprintln!("Unknown option: {}", other); usage_exit() }
        }
        i += 1;
    }
    let text = text.unwrap_or_else(|| usage_exit());
    app.open()?;
    let results = app.session.retrieve(&text, k, predicate.as_ref(), min_score)?;
    println!("Found {} results for: \"{}\"", results.len(), text);
    for r in &results {
        let boosted = r.boosted_score.map(|b| format!(" boosted={:.4}", b)).unwrap_or_default();
        println!("\n  {}. score={:.4}{} distance={:.4} id={}", r.rank, r.similarity_score, boosted, r.raw_distance, r.record_id);
        println!("     {}", r.display_text());
        println!("     source: {}", r.provenance());
    }
    Ok(())
}

fn aggregate(app: &App, args: &[String]) -> anyhow::Result<()> {
    let mut positional = Vec::new();
    let mut sum_attribute = "power_installed".to_string();
    let mut k = app.session.settings().top_k;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--sum" => sum_attribute = flag_value(args, &mut i, "--sum"),
            "--k" | "-k" => k = flag_value(args, &mut i, "--k"),
            a if !a.starts_with('-') => positional.push(a.to_string()),
            other => { eprintln!("Unknown option: {}", other); usage_exit() }
        }
        i += 1;
    }
    let [text, group_by] = positional.as_slice() else { usage_exit() };
    app.open()?;
    let groups = app.session.aggregate(text, k, None, group_by, &sum_attribute)?;
    println!("{} groups by '{}' (sum of '{}') over top {} results:", groups.len(), group_by, sum_attribute, k);
    for (group, summary) in &groups {
        println!("  {}: count={} sum={} mean_score={:.4} ids={:?}", group, summary.count, summary.sum, summary.mean_score, summary.ids);
    }
    Ok(())
}

fn stats(app: &App) -> anyhow::Result<()> {
    app.open()?;
    let stats = app.session.statistics()?;
    println!("Index: {}", app.index_dir().display());
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let config = Config::load().map_err(|e| { eprintln!("Error loading config: {}", e); e })?;
    let mut args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() { usage_exit(); }
    let cmd = args.remove(0);
    let app = App::from_config(&config)?;
    match cmd.as_str() {
        "ingest" => ingest(&app, &args),
        "query" => query(&app, &args),
        "aggregate" => aggregate(&app, &args),
        "stats" => stats(&app),
        "--help" | "-h" | "help" => { println!("{}", USAGE); Ok(()) }
        _ => { eprintln!("Unknown command: {}", cmd); usage_exit() }
    }
}
