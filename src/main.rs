use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use simplegraph::io::{BamWriter, FastqReads, GirafWriter, SamWriter};
use simplegraph::kmer::DEFAULT_MAX_SPANNING;
use simplegraph::{
    AlignMode, AlignerConfig, Graph, GraphAligner, KmerIndex, Pipeline, PipelineConfig,
    PipelineSummary, ScoreMatrix,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "simplegraph", version, about = "Align reads against a reference graph")]
struct Cli {
    /// Raise the default log level to debug.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Align FASTQ reads against a graph.
    Align(AlignArgs),
    /// Print node, edge and index statistics for a graph.
    Stats {
        /// Graph file.
        graph: PathBuf,
        /// K-mer length of the index to summarise.
        #[arg(short, long, default_value_t = 32)]
        k: usize,
        /// Stride between indexed graph windows.
        #[arg(long, default_value_t = 32)]
        step: usize,
        /// Edge-spanning index keys kept per graph position.
        #[arg(long, default_value_t = DEFAULT_MAX_SPANNING)]
        max_spanning_keys: usize,
    },
}

#[derive(clap::Args, Debug)]
struct AlignArgs {
    /// Graph file.
    graph: PathBuf,
    /// FASTQ reads.
    reads: PathBuf,
    /// Output file (stdout when omitted; required for BAM).
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Giraf)]
    format: Format,
    /// Worker threads (defaults to available parallelism).
    #[arg(short, long)]
    threads: Option<usize>,
    /// Capacity of the read and record channels.
    #[arg(long, default_value_t = 1024)]
    queue: usize,
    /// K-mer length for the seed index.
    #[arg(short, long, default_value_t = 32)]
    k: usize,
    /// Stride between indexed graph windows.
    #[arg(long, default_value_t = 32)]
    step: usize,
    /// Match score.
    #[arg(long = "match", default_value_t = 2)]
    match_score: i64,
    /// Mismatch score.
    #[arg(long, default_value_t = -3, allow_hyphen_values = true)]
    mismatch: i64,
    /// Gap score.
    #[arg(long, default_value_t = -5, allow_hyphen_values = true)]
    gap: i64,
    /// Alignment mode: local or global.
    #[arg(long, default_value = "local")]
    mode: AlignMode,
    /// Reads scoring below this are reported unmapped.
    #[arg(long, default_value_t = 20)]
    min_score: i64,
    /// DP band half-width.
    #[arg(long, default_value_t = 32)]
    band: usize,
    /// Extra graph bases gathered beyond the unaligned read length.
    #[arg(long, default_value_t = 16)]
    target_slack: usize,
    /// Graph paths evaluated per extension.
    #[arg(long, default_value_t = 64)]
    max_branches: usize,
    /// Chains produced per seed hit.
    #[arg(long, default_value_t = 64)]
    max_seed_branches: usize,
    /// Edge-spanning index keys kept per graph position.
    #[arg(long, default_value_t = DEFAULT_MAX_SPANNING)]
    max_spanning_keys: usize,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Giraf,
    Sam,
    Bam,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Align(args) => run_align(args)?,
        Commands::Stats {
            graph,
            k,
            step,
            max_spanning_keys,
        } => run_stats(&graph, k, step, max_spanning_keys)?,
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_graph(path: &Path) -> Result<Graph> {
    let graph = Graph::from_path(path)
        .with_context(|| format!("failed to load graph from {}", path.display()))?;
    info!(
        path = %path.display(),
        nodes = graph.len(),
        edges = graph.edge_count(),
        bases = graph.total_bases(),
        fingerprint = %graph.fingerprint(),
        "graph loaded"
    );
    Ok(graph)
}

fn run_align(args: AlignArgs) -> Result<()> {
    let config = AlignerConfig::default()
        .with_kmer_len(args.k)
        .with_step(args.step)
        .with_scoring(ScoreMatrix::uniform(args.match_score, args.mismatch, args.gap))
        .with_mode(args.mode)
        .with_min_score(args.min_score)
        .with_band(args.band)
        .with_target_slack(args.target_slack)
        .with_max_branches(args.max_branches)
        .with_max_seed_branches(args.max_seed_branches)
        .with_max_spanning_keys(args.max_spanning_keys);
    config.validate().context("invalid alignment parameters")?;

    let graph = Arc::new(load_graph(&args.graph)?);
    let index = KmerIndex::build_with_limit(
        &graph,
        config.kmer_len,
        config.step,
        config.max_spanning_keys,
    )
    .context("failed to build k-mer index")?;
    let aligner = GraphAligner::with_index(Arc::clone(&graph), Arc::new(index), config)
        .context("failed to initialise aligner")?;

    let mut pipeline_config = PipelineConfig::default().with_capacity(args.queue);
    if let Some(threads) = args.threads {
        pipeline_config = pipeline_config.with_workers(threads);
    }
    let pipeline = Pipeline::new(Arc::new(aligner), pipeline_config);

    let reads = FastqReads::from_path(&args.reads)
        .with_context(|| format!("failed to open reads {}", args.reads.display()))?;

    let summary = match args.format {
        Format::Giraf => {
            let mut sink = GirafWriter::new(open_output(args.output.as_deref())?);
            pipeline.run(reads, &mut sink)
        }
        Format::Sam => {
            let mut sink = SamWriter::new(open_output(args.output.as_deref())?, &graph)
                .context("failed to write SAM header")?;
            pipeline.run(reads, &mut sink)
        }
        Format::Bam => {
            let Some(path) = args.output.as_deref() else {
                bail!("BAM output requires --output");
            };
            let mut sink = BamWriter::from_path(path, &graph)
                .with_context(|| format!("failed to create {}", path.display()))?;
            pipeline.run(reads, &mut sink)
        }
    }
    .context("alignment failed")?;

    report(&summary);
    Ok(())
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    Ok(match path {
        Some(path) => Box::new(BufWriter::new(
            File::create(path).with_context(|| format!("failed to create {}", path.display()))?,
        )),
        None => Box::new(BufWriter::new(io::stdout().lock())),
    })
}

fn report(summary: &PipelineSummary) {
    if summary.failed > 0 {
        warn!(failed = summary.failed, "some reads failed to align and were reported unmapped");
    }
    eprintln!(
        "reads={}\tmapped={}\tunmapped={}\tfailed={}",
        summary.reads, summary.mapped, summary.unmapped, summary.failed
    );
}

fn run_stats(path: &Path, k: usize, step: usize, max_spanning: usize) -> Result<()> {
    let graph = load_graph(path)?;
    let index = KmerIndex::build_with_limit(&graph, k, step, max_spanning)
        .context("failed to build k-mer index")?;
    let stats = index.stats();

    println!("nodes\t{}", graph.len());
    println!("edges\t{}", graph.edge_count());
    println!("bases\t{}", graph.total_bases());
    println!("fingerprint\t{}", graph.fingerprint());
    println!("k\t{}", stats.k);
    println!("step\t{}", stats.step);
    println!("keys\t{}", stats.keys);
    println!("locations\t{}", stats.locations);
    println!("spanning\t{}", stats.spanning);
    println!("capped\t{}", stats.capped);
    Ok(())
}
