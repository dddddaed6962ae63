use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{debug, error, info, Level};
use simple_logger::init_with_level;

use gene_tiler::model::ProcessingSet;
use gene_tiler::numerify::write_chunks;
use gene_tiler::{
    count_mers_all, numerify_all, AnnotationBuilder, ClassGranularity, FeatureGraph, IdNameKeys,
    NumerifyError, NumerifyOptions, SliceController, SliceOptions,
};

/// Re-tile gene annotations into fixed windows and numerify them per base.
#[derive(Parser, Debug)]
#[command(name = "gene-tiler")]
#[command(author, version, about)]
struct Cli {
    /// Debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import a GTF/GFF3 annotation, tile it into windows and write the sliced graph
    Slice(SliceArgs),

    /// Turn the windows of a sliced graph into per-base arrays
    Numerify(NumerifyArgs),

    /// Count canonical k-mers over the sequences of a graph
    Mers(MersArgs),

    /// Load a graph from disk and print summary stats
    Stats(StatsArgs),
}

#[derive(Args, Debug)]
struct SliceArgs {
    /// Input annotation file (.gtf/.gff/.gff3, optionally .gz)
    #[arg(long, short)]
    annotation: PathBuf,

    /// Species / genome name stored with every window
    #[arg(long, short)]
    species: String,

    /// Window length in base pairs
    #[arg(long, short, default_value_t = 2_000_000)]
    window: u32,

    #[arg(long, default_value_t = 0.8)]
    train_ratio: f64,

    #[arg(long, default_value_t = 0.1)]
    dev_ratio: f64,

    /// Seed for the train/dev/test assignment
    #[arg(long, default_value = "puma")]
    seed: String,

    /// Output serialized graph file
    #[arg(long, short)]
    output: PathBuf,

    /// Worker threads (0 = all cores)
    #[arg(long, short, default_value_t = 0)]
    threads: usize,

    /// Attribute keys to use for gene ID (repeatable, replaces the defaults)
    #[arg(long = "gene-id-key", value_name = "KEY", num_args = 1..)]
    gene_id_keys: Vec<String>,

    /// Attribute keys to use for transcript ID (repeatable, replaces the defaults)
    #[arg(long = "transcript-id-key", value_name = "KEY", num_args = 1..)]
    transcript_id_keys: Vec<String>,

    /// GFF3 child -> parent linkage keys (repeatable, replaces the defaults)
    #[arg(long = "parent-key", value_name = "KEY", num_args = 1..)]
    parent_keys: Vec<String>,

    /// Feature types marking unreliable regions (repeatable, replaces the defaults)
    #[arg(long = "error-feature-type", value_name = "TYPE", num_args = 1..)]
    error_feature_types: Vec<String>,
}

impl SliceArgs {
    fn keys(&self) -> IdNameKeys {
        let mut keys = IdNameKeys::default();
        let replace = |target: &mut Vec<String>, given: &Vec<String>| {
            if !given.is_empty() {
                *target = given.clone();
            }
        };
        replace(&mut keys.gene_id_keys, &self.gene_id_keys);
        replace(&mut keys.transcript_id_keys, &self.transcript_id_keys);
        replace(&mut keys.parent_keys, &self.parent_keys);
        replace(&mut keys.error_feature_types, &self.error_feature_types);
        keys
    }
}

#[derive(Args, Debug)]
struct NumerifyArgs {
    /// Sliced graph written by `slice`
    #[arg(long, short)]
    graph: PathBuf,

    /// Rows per output chunk
    #[arg(long, short, default_value_t = 20_000)]
    chunk_size: u32,

    /// Class layout: one-hot or raw
    #[arg(long, default_value = "one-hot")]
    classes: ClassGranularity,

    /// Pad the last chunk of each strand to the full chunk size
    #[arg(long)]
    pad: bool,

    /// Emit all-intergenic chunks for strands without annotation
    #[arg(long)]
    keep_unannotated: bool,

    /// Only numerify windows of this processing set (train, dev or test)
    #[arg(long)]
    set: Option<ProcessingSet>,

    /// Output chunk file
    #[arg(long, short)]
    output: PathBuf,

    /// Worker threads (0 = all cores)
    #[arg(long, short, default_value_t = 0)]
    threads: usize,
}

#[derive(Args, Debug)]
struct MersArgs {
    /// Graph written by `slice`
    #[arg(long, short)]
    graph: PathBuf,

    #[arg(long, default_value_t = 1)]
    min_k: usize,

    #[arg(long, default_value_t = 6)]
    max_k: usize,

    /// Only count windows of this processing set (train, dev or test)
    #[arg(long)]
    set: Option<ProcessingSet>,

    /// Worker threads (0 = all cores)
    #[arg(long, short, default_value_t = 0)]
    threads: usize,
}

#[derive(Args, Debug)]
struct StatsArgs {
    /// Serialized graph file
    #[arg(long, short)]
    graph: PathBuf,
}

fn init_threads(threads: usize) -> Result<()> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .context("configuring the worker pool")
}

/// Tiled windows if the graph was sliced, otherwise every coordinate.
fn target_coordinates(graph: &FeatureGraph, set: Option<ProcessingSet>) -> Vec<usize> {
    if graph.processing_sets.is_empty() {
        (0..graph.coordinates.len()).collect()
    } else {
        graph
            .processing_sets
            .iter()
            .filter(|&(_, &tag)| set.map_or(true, |want| want == tag))
            .map(|(&c, _)| c)
            .collect()
    }
}

fn slice(args: SliceArgs) -> Result<()> {
    init_threads(args.threads)?;
    if args.train_ratio + args.dev_ratio > 1.0 {
        bail!(
            "train ratio {} + dev ratio {} exceed 1.0",
            args.train_ratio,
            args.dev_ratio
        );
    }
    if args.window == 0 {
        bail!("window must be > 0");
    }

    let builder = AnnotationBuilder {
        genome: args.species.clone(),
        keys: args.keys(),
    };
    let mut graph = builder
        .build_from_path(&args.annotation)
        .with_context(|| format!("reading annotation {}", args.annotation.display()))?;

    let controller = SliceController::new(SliceOptions {
        window: args.window,
        train_ratio: args.train_ratio,
        dev_ratio: args.dev_ratio,
        seed: args.seed.clone(),
    });
    let (windows, report) = controller.run(&mut graph);

    for (locus, err) in &report.loci_failed {
        error!("Super-locus {} was not sliced: {}", locus, err);
    }
    info!(
        "{} windows; {} loci committed, {} failed, {} splits",
        windows.len(),
        report.loci_committed,
        report.loci_failed.len(),
        report.splits
    );
    println!("{graph}");

    graph
        .save(&args.output)
        .with_context(|| format!("writing graph to {}", args.output.display()))?;
    eprintln!("Graph written to {}", args.output.display());
    Ok(())
}

fn numerify(args: NumerifyArgs) -> Result<()> {
    init_threads(args.threads)?;
    if args.chunk_size == 0 {
        bail!("chunk size must be > 0");
    }

    let graph = FeatureGraph::load(&args.graph)
        .with_context(|| format!("reading graph {}", args.graph.display()))?;
    let coords = target_coordinates(&graph, args.set);

    let opts = NumerifyOptions {
        chunk_size: args.chunk_size,
        granularity: args.classes,
        pad_final_chunk: args.pad,
        keep_unannotated: args.keep_unannotated,
    };

    let mut chunks = Vec::new();
    let (mut empty, mut failed) = (0usize, 0usize);
    for (coord, result) in numerify_all(&graph, &coords, opts) {
        match result {
            Ok(c) => {
                debug!("{c}");
                chunks.push(c);
            }
            Err(e @ NumerifyError::NoFeaturesInSlice { .. }) => {
                debug!("Skipping coordinate {coord}: {e}");
                empty += 1;
            }
            Err(e) => {
                error!("Coordinate {coord} failed: {e}");
                failed += 1;
            }
        }
    }

    let n_chunks: usize = chunks.iter().map(|c| c.len()).sum();
    info!(
        "Numerified {} of {} coordinates into {} chunks ({} without annotation, {} failed)",
        chunks.len(),
        coords.len(),
        n_chunks,
        empty,
        failed
    );

    write_chunks(&args.output, &chunks)
        .with_context(|| format!("writing chunks to {}", args.output.display()))?;
    eprintln!("Chunks written to {}", args.output.display());
    Ok(())
}

fn mers(args: MersArgs) -> Result<()> {
    init_threads(args.threads)?;
    if args.min_k == 0 || args.min_k > args.max_k {
        bail!("need 0 < min-k <= max-k, got {}..={}", args.min_k, args.max_k);
    }

    let graph = FeatureGraph::load(&args.graph)
        .with_context(|| format!("reading graph {}", args.graph.display()))?;
    let coords = target_coordinates(&graph, args.set);

    for counter in count_mers_all(&graph, &coords, args.min_k, args.max_k) {
        if counter.skipped() > 0 {
            info!("k={}: {} windows with ambiguous bases skipped", counter.k(), counter.skipped());
        }
        for (mer, n) in counter.export() {
            println!("{}\t{}\t{}", counter.k(), mer, n);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::Debug } else { Level::Info };
    init_with_level(level).context("initialising the logger")?;

    match cli.cmd {
        Command::Slice(args) => slice(args)?,
        Command::Numerify(args) => numerify(args)?,
        Command::Mers(args) => mers(args)?,
        Command::Stats(args) => {
            let graph = FeatureGraph::load(&args.graph)
                .with_context(|| format!("reading graph {}", args.graph.display()))?;
            println!("{graph}");
        }
    }

    Ok(())
}
