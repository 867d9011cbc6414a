use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use callfinder::audio::DecodingLoader;
use callfinder::config::RuntimeConfig;
use callfinder::extractor::{Embedder, SpectralEmbedder};
use callfinder::index::{Metric, TemplateIndex};
use callfinder::pipeline::BatchPipeline;
use callfinder::scoring::{self, AggregationPolicy};
use callfinder::store::{self, Precision};
use callfinder::{report, QuerySet, TemplateSet};

/// callfinder - template-based detection of a target vocalization
///
/// Embeds audio recordings window by window, then ranks windows by their
/// distance to a handful of confirmed examples of the target sound.
#[derive(Parser, Debug)]
#[command(name = "callfinder")]
#[command(version = "0.1.0")]
#[command(about = "Embedding similarity search for rare vocalizations", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Embed audio files and write one artifact per file.
    Embed(EmbedArgs),
    /// Score query embeddings against template embeddings.
    Search(SearchArgs),
}

#[derive(Args, Debug, Clone, Default)]
struct ConfigArgs {
    /// Path to JSON configuration
    #[arg(long, value_name = "PATH", conflicts_with = "config_json")]
    config: Option<PathBuf>,

    /// Inline JSON configuration
    #[arg(long, value_name = "JSON", conflicts_with = "config")]
    config_json: Option<String>,
}

impl ConfigArgs {
    fn load(&self) -> Result<RuntimeConfig> {
        RuntimeConfig::from_sources(self.config.as_deref(), self.config_json.as_deref())
            .context("Failed to load configuration")
    }
}

#[derive(Args, Debug, Clone)]
struct EmbedArgs {
    /// Input audio files (MP3, OGG, FLAC, WAV, ...)
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// Directory receiving the embedding artifacts
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Windows per embedder invocation
    #[arg(long)]
    batch_size: Option<usize>,

    /// Worker threads the embedder may use
    #[arg(long)]
    num_workers: Option<usize>,

    /// Sub-window length in seconds (whole clip when omitted)
    #[arg(long, value_name = "SECONDS")]
    window_length: Option<f64>,

    /// Hop between sub-windows in seconds
    #[arg(long, value_name = "SECONDS")]
    window_stride: Option<f64>,

    /// Stored precision in bits (16 or 32)
    #[arg(long, value_name = "BITS")]
    precision: Option<u8>,

    /// Run summary location (defaults to OUTPUT_DIR/run_summary.json)
    #[arg(long, value_name = "PATH")]
    summary: Option<PathBuf>,
}

impl EmbedArgs {
    fn validate(&self) -> Result<()> {
        if self.output_dir.exists() && !self.output_dir.is_dir() {
            anyhow::bail!("Output path must be a directory: {:?}", self.output_dir);
        }
        Ok(())
    }

    fn runtime_config(&self) -> Result<RuntimeConfig> {
        let mut config = self.config.load()?;
        let batch = &mut config.batch;
        if let Some(size) = self.batch_size {
            batch.batch_size = size;
        }
        if let Some(workers) = self.num_workers {
            batch.num_workers = workers;
        }
        if self.window_length.is_some() {
            batch.window_length = self.window_length;
        }
        if self.window_stride.is_some() {
            batch.window_stride = self.window_stride;
        }
        if let Some(bits) = self.precision {
            batch.output_precision = Precision::try_from(bits).map_err(anyhow::Error::msg)?;
        }
        batch.output_dir = Some(self.output_dir.clone());
        config.validate()?;
        Ok(config)
    }
}

#[derive(Args, Debug, Clone)]
struct SearchArgs {
    /// Template artifact file or directory of artifacts
    #[arg(long, value_name = "PATH")]
    templates: PathBuf,

    /// Query artifact file or directory of artifacts
    #[arg(long, value_name = "PATH")]
    queries: PathBuf,

    #[command(flatten)]
    config: ConfigArgs,

    /// Nearest templates per query window
    #[arg(long)]
    k: Option<usize>,

    #[arg(long, value_enum)]
    metric: Option<Metric>,

    #[arg(long, value_enum)]
    aggregation: Option<AggregationPolicy>,

    /// Score cutoff for candidate detections
    #[arg(long)]
    threshold: Option<f32>,

    /// Where to write the ranked neighbor table
    #[arg(long, value_name = "PATH")]
    results: Option<PathBuf>,

    /// Where to write the aggregated scores
    #[arg(long, value_name = "PATH")]
    scores: Option<PathBuf>,

    /// Number of top windows to print
    #[arg(long, default_value_t = 10)]
    top: usize,
}

impl SearchArgs {
    fn runtime_config(&self) -> Result<RuntimeConfig> {
        let mut config = self.config.load()?;
        let search = &mut config.search;
        if let Some(k) = self.k {
            search.k = k;
        }
        if let Some(metric) = self.metric {
            search.metric = metric;
        }
        if let Some(aggregation) = self.aggregation {
            search.aggregation = aggregation;
        }
        if self.threshold.is_some() {
            search.threshold = self.threshold;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Embed(args) => handle_embed(&args),
        Command::Search(args) => handle_search(&args),
    }
}

fn handle_embed(args: &EmbedArgs) -> Result<()> {
    args.validate()
        .context("Failed to validate command-line arguments")?;
    let config = args.runtime_config()?;

    println!("callfinder v0.1.0 - batch embedding");
    println!("Files:  {}", args.files.len());
    println!("Output dir: {:?}", args.output_dir);

    let embedder = SpectralEmbedder::new();
    let loader = DecodingLoader::new(embedder.sample_rate());
    println!(
        "Embedder: {} ({} dimensions @ {} Hz)",
        embedder.name(),
        embedder.dimension(),
        embedder.sample_rate()
    );
    let pipeline = BatchPipeline::new(loader, embedder, config.batch)?;

    println!("\n1. Embedding files...");
    let run = pipeline.run_with_progress(&args.files, |progress| {
        let marker = if progress.succeeded { "ok" } else { "FAILED" };
        println!(
            "   [{}/{}] {} {}",
            progress.completed, progress.total, progress.source_id, marker
        );
    });

    let summary_path = args
        .summary
        .clone()
        .unwrap_or_else(|| args.output_dir.join("run_summary.json"));
    run.summary
        .write_json(&summary_path)
        .with_context(|| format!("Failed to write run summary {:?}", summary_path))?;

    println!("\n2. Summary");
    println!(
        "   {} succeeded, {} failed, {} records in {:.2}s",
        run.summary.successes(),
        run.summary.failures(),
        run.collection.len(),
        run.elapsed().as_secs_f64()
    );
    for outcome in run.summary.failed() {
        println!("   {}: {}", outcome.source_id, outcome.status);
    }
    println!("   Wrote summary to {:?}", summary_path);
    Ok(())
}

fn handle_search(args: &SearchArgs) -> Result<()> {
    let config = args.runtime_config()?;
    let search = &config.search;

    println!("callfinder v0.1.0 - template search");
    println!("\n1. Loading embeddings...");
    let templates = load_embeddings(&args.templates, "templates")?;
    let templates = TemplateSet::new(templates).context("Template set is unusable")?;
    let queries = QuerySet::new(load_embeddings(&args.queries, "queries")?);
    println!(
        "   {} template windows, {} query windows",
        templates.len(),
        queries.len()
    );

    println!("\n2. Searching (metric {:?}, k = {})...", search.metric, search.k);
    let index = TemplateIndex::build(&templates, search.metric)?;
    let results = index.query(&queries, search.k)?;
    if let Some(path) = &args.results {
        report::write_results(path, &results)?;
        println!("   Wrote {} neighbor rows to {:?}", results.len(), path);
    }

    println!("\n3. Scoring ({:?})...", search.aggregation);
    let scores = scoring::score(&results, search.aggregation);
    if let Some(path) = &args.scores {
        report::write_scores(path, &scores)?;
        println!("   Wrote {} scores to {:?}", scores.len(), path);
    }
    for (rank, score) in scores.iter().take(args.top).enumerate() {
        println!(
            "   {:>3}. {} @ {:.2}s  score {:.4}  (nearest {})",
            rank + 1,
            score.query_source_id,
            score.query_window_start_time,
            score.score,
            score.best_template_id
        );
    }

    let recordings = scoring::rank_sources(&scores);
    if let Some(best) = recordings.first() {
        println!(
            "   Best recording: {} (score {:.4} at {:.2}s)",
            best.source_id, best.score, best.best_window_start_time
        );
    }

    if let Some(cutoff) = search.threshold {
        let split = scoring::threshold(scores, cutoff)?;
        println!(
            "\n4. Threshold {:.4}: {} candidate detections, {} rejected",
            cutoff,
            split.candidates.len(),
            split.rejected.len()
        );
    }
    Ok(())
}

fn load_embeddings(path: &Path, label: &str) -> Result<callfinder::EmbeddingCollection> {
    let collection = store::load_any(path)
        .with_context(|| format!("Failed to load {} from {:?}", label, path))?;
    ensure!(
        !collection.is_empty(),
        "No {} embeddings found at {:?}",
        label,
        path
    );
    Ok(collection)
}
