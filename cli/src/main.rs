//! Rostergraph CLI: similarity, ego-network and statistics runs over a player graph
//!
//! Settings come from an optional YAML file and are overridden by flags.
//! Logs go to stderr (`RUST_LOG`, default `info`); results go to files in the
//! output directory, summaries to stdout.

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use rostergraph::algo::GraphStats;
use rostergraph::export::{export_json, load_similarity_results, top_pairs};
use rostergraph::{Analysis, AnalysisConfig, CancelToken, RunSummary, StorageStrategy};
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rostergraph", version, about = "Player graph similarity and ego-network analytics")]
struct Cli {
    /// YAML config file
    #[arg(long, global = true, env = "ROSTERGRAPH_CONFIG")]
    config: Option<PathBuf>,

    #[command(flatten)]
    overrides: Overrides,

    /// Output format for summaries
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

/// Flags that override config file values
#[derive(Args)]
struct Overrides {
    /// Node table
    #[arg(long, global = true)]
    nodes: Option<PathBuf>,

    /// Weighted edge table
    #[arg(long, global = true)]
    edges: Option<PathBuf>,

    /// Candidate id list (default: every node)
    #[arg(long, global = true)]
    candidates: Option<PathBuf>,

    /// Directory for results and checkpoint logs
    #[arg(long, global = true, env = "ROSTERGRAPH_OUTPUT_DIR")]
    output_dir: Option<PathBuf>,

    /// Adjacency storage layout
    #[arg(long, global = true)]
    storage: Option<StorageArg>,

    /// Worker threads
    #[arg(long, global = true, env = "ROSTERGRAPH_WORKERS")]
    workers: Option<usize>,

    /// Requeue a chunk that makes no progress for this many seconds
    #[arg(long, global = true)]
    chunk_timeout_secs: Option<u64>,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum StorageArg {
    Dense,
    Sparse,
    Auto,
}

impl From<StorageArg> for StorageStrategy {
    fn from(arg: StorageArg) -> Self {
        match arg {
            StorageArg::Dense => StorageStrategy::Dense,
            StorageArg::Sparse => StorageStrategy::Sparse,
            StorageArg::Auto => StorageStrategy::Auto,
        }
    }
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// Top-K most similar unconnected players for every candidate
    Similar {
        /// Pairs kept per player
        #[arg(long)]
        top_k: Option<usize>,

        /// Minimum weighted degree for a player to be searched
        #[arg(long)]
        degree_threshold: Option<u64>,
    },
    /// Fraction of the graph reachable within 1..=K hops of every candidate
    Ego {
        /// Largest hop count
        #[arg(long)]
        max_hops: Option<usize>,
    },
    /// Degree and edge weight statistics
    Stats,
    /// Collapse a raw co-occurrence edge file into a weighted edge table
    Combine {
        /// Raw `source,target` file, one row per shared season
        #[arg(long)]
        input: PathBuf,

        /// Weighted `source,target,weight,type` table to write
        #[arg(long)]
        output: PathBuf,
    },
    /// Write similarities.json and nodes.json for the web front end
    Export {
        /// Similarity results (default: the output directory's)
        #[arg(long)]
        results: Option<PathBuf>,

        /// Directory for the JSON files
        #[arg(long, default_value = "app")]
        out_dir: PathBuf,
    },
    /// Print the highest-scoring similarity pairs
    Top {
        /// Number of pairs
        #[arg(short = 'n', long, default_value_t = 20)]
        count: usize,

        /// Similarity results (default: the output directory's)
        #[arg(long)]
        results: Option<PathBuf>,
    },
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Attach the failing pipeline stage to a library error
fn staged<T>(result: rostergraph::Result<T>) -> anyhow::Result<T> {
    result.map_err(|e| {
        let stage = e.stage();
        anyhow::Error::new(e).context(format!("{} stage failed", stage))
    })
}

fn load_config(cli: &Cli) -> anyhow::Result<AnalysisConfig> {
    let mut config = match &cli.config {
        Some(path) => staged(AnalysisConfig::load(path).map_err(Into::into))?,
        None => AnalysisConfig::default(),
    };

    let o = &cli.overrides;
    if let Some(nodes) = &o.nodes {
        config.nodes = nodes.clone();
    }
    if let Some(edges) = &o.edges {
        config.edges = edges.clone();
    }
    if let Some(candidates) = &o.candidates {
        config.candidates = Some(candidates.clone());
    }
    if let Some(output_dir) = &o.output_dir {
        config.output_dir = output_dir.clone();
    }
    if let Some(storage) = o.storage {
        config.storage = storage.into();
    }
    if let Some(workers) = o.workers {
        config.workers = workers;
    }
    if let Some(secs) = o.chunk_timeout_secs {
        config.chunk_timeout_secs = Some(secs);
    }

    match &cli.command {
        Commands::Similar { top_k, degree_threshold } => {
            if let Some(k) = top_k {
                config.top_k = *k;
            }
            if let Some(threshold) = degree_threshold {
                config.degree_threshold = *threshold;
            }
        }
        Commands::Ego { max_hops } => {
            if let Some(hops) = max_hops {
                config.max_hops = *hops;
            }
        }
        _ => {}
    }

    Ok(config)
}

fn run(cli: Cli) -> anyhow::Result<()> {
    if let Commands::Combine { input, output } = &cli.command {
        let summary = staged(rostergraph::combine_raw_edges(input, output).map_err(Into::into))?;
        println!(
            "Combined {} rows into {} edges: {}",
            summary.observations,
            summary.edges,
            output.display()
        );
        return Ok(());
    }

    let config = load_config(&cli)?;
    let analysis = staged(Analysis::load(config))?;

    match &cli.command {
        Commands::Similar { .. } => {
            let cancel = cancel_on_ctrl_c()?;
            let summary = staged(analysis.run_similarity(&cancel))?;
            print_summary("similarity", &summary, &cli.format)?;
            check_complete(&summary)
        }
        Commands::Ego { .. } => {
            let cancel = cancel_on_ctrl_c()?;
            let summary = staged(analysis.run_ego(&cancel))?;
            print_summary("ego", &summary, &cli.format)?;
            check_complete(&summary)
        }
        Commands::Stats => print_stats(&GraphStats::compute(analysis.store()), &cli.format),
        Commands::Export { results, out_dir } => {
            let results = results
                .clone()
                .unwrap_or_else(|| analysis.config().similarity_results());
            let summary = staged(export_json(analysis.store(), &results, out_dir).map_err(Into::into))?;
            println!(
                "Exported {} pairs for {} players to {}",
                summary.pairs,
                summary.sources,
                out_dir.display()
            );
            Ok(())
        }
        Commands::Top { count, results } => {
            let results = results
                .clone()
                .unwrap_or_else(|| analysis.config().similarity_results());
            let rows = staged(load_similarity_results(&results, analysis.store()).map_err(Into::into))?;
            let store = analysis.store();
            for row in top_pairs(&rows, *count) {
                let a = store.label(row.source).context("result names an unknown node")?;
                let b = store.label(row.target).context("result names an unknown node")?;
                println!("{},{},{:.2}", a, b, row.score);
            }
            Ok(())
        }
        Commands::Combine { .. } => Ok(()),
    }
}

/// Cancel the run on the first Ctrl-C. Finished results are kept; the run
/// resumes from the checkpoint next time.
fn cancel_on_ctrl_c() -> anyhow::Result<CancelToken> {
    let cancel = CancelToken::new();
    let token = cancel.clone();
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start signal handler")?;

    std::thread::Builder::new()
        .name("rostergraph-signals".to_string())
        .spawn(move || {
            runtime.block_on(async {
                if tokio::signal::ctrl_c().await.is_ok() {
                    warn!("Interrupted, stopping after in-flight results");
                    token.cancel();
                }
            })
        })
        .context("failed to start signal handler")?;

    Ok(cancel)
}

fn check_complete(summary: &RunSummary) -> anyhow::Result<()> {
    if summary.cancelled {
        return Err(anyhow!("compute stage interrupted; rerun to resume from the checkpoint"));
    }
    if !summary.failed.is_empty() || !summary.abandoned.is_empty() {
        return Err(anyhow!(
            "compute stage incomplete: {} failed, {} abandoned; rerun to retry them",
            summary.failed.len(),
            summary.abandoned.len()
        ));
    }
    Ok(())
}

fn summary_rows(summary: &RunSummary) -> Vec<(&'static str, String)> {
    vec![
        ("already done", summary.already_done.to_string()),
        ("submitted", summary.submitted.to_string()),
        ("written", summary.written.to_string()),
        ("empty", summary.empty.to_string()),
        ("failed", summary.failed.len().to_string()),
        ("abandoned", summary.abandoned.len().to_string()),
        ("cancelled", summary.cancelled.to_string()),
    ]
}

fn print_summary(name: &str, summary: &RunSummary, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "run": name,
                "already_done": summary.already_done,
                "submitted": summary.submitted,
                "written": summary.written,
                "empty": summary.empty,
                "failed": summary.failed,
                "abandoned": summary.abandoned,
                "cancelled": summary.cancelled,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Csv => {
            println!("metric,value");
            for (metric, value) in summary_rows(summary) {
                println!("{},{}", metric, value);
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec![format!("{} run", name), String::new()]);
            for (metric, value) in summary_rows(summary) {
                table.add_row(vec![metric.to_string(), value]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}

fn stats_rows(stats: &GraphStats) -> Vec<(String, String)> {
    let mut rows = vec![
        ("nodes".to_string(), stats.nodes.to_string()),
        ("edges".to_string(), stats.edges.to_string()),
        ("storage".to_string(), format!("{:?}", stats.storage).to_lowercase()),
        ("mean edge weight".to_string(), format!("{:.4}", stats.mean_edge_weight)),
    ];
    if let Some(d) = &stats.degree {
        rows.push(("degree min/max/mean".to_string(), format!("{}/{}/{:.2}", d.min, d.max, d.mean)));
        rows.push(("isolated nodes".to_string(), d.isolated.to_string()));
    }
    if let Some(d) = &stats.weighted_degree {
        rows.push((
            "weighted degree min/max/mean".to_string(),
            format!("{}/{}/{:.2}", d.min, d.max, d.mean),
        ));
    }
    for (weight, count) in &stats.weight_histogram {
        rows.push((format!("edges with weight {}", weight), count.to_string()));
    }
    rows
}

fn print_stats(stats: &GraphStats, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(stats)?),
        OutputFormat::Csv => {
            println!("metric,value");
            for (metric, value) in stats_rows(stats) {
                println!("{},{}", metric, value.replace(',', ";"));
            }
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["metric", "value"]);
            for (metric, value) in stats_rows(stats) {
                table.add_row(vec![metric, value]);
            }
            println!("{}", table);
        }
    }
    Ok(())
}
