//! CLI entry point for utrevo.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::time::Instant;

use utrevo::config::RunConfig;
use utrevo::expression::{parse_expression_matrix, parse_mature_table};
use utrevo::fold::PairingFold;
use utrevo::genes::GeneRegistry;
use utrevo::output::{write_front_table, write_history_csv};
use utrevo::run::{design_utr3, run};
use utrevo::sequence::clean_sequence;
use utrevo::{oracle, RunOutcome};

/// Cell-type-selective mRNA 5'UTR design.
///
/// Evolves 5'UTR candidates for a fixed CDS under four objectives and
/// reports a Pareto front of designs.
#[derive(Parser, Debug)]
#[command(name = "utrevo")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Gene symbol, resolved against the gene registry table
    #[arg(long = "gene")]
    gene: Option<String>,

    /// CDS sequence given directly (RNA or DNA); overrides --gene
    #[arg(long = "cds")]
    cds: Option<String>,

    /// Target cell type (expression-matrix naming, e.g. Fibroblast)
    #[arg(short = 't', long = "target")]
    target: String,

    /// Minimum 5'UTR length
    #[arg(long = "utr5-min", default_value = "20")]
    utr5_min: usize,

    /// Maximum 5'UTR length
    #[arg(long = "utr5-max", default_value = "200")]
    utr5_max: usize,

    /// Initial 5'UTR length (Gaussian prior centre); omit for uniform
    #[arg(long = "utr5-init")]
    utr5_init: Option<usize>,

    /// Population size
    #[arg(short = 'p', long = "pop-size", default_value = "128")]
    pop_size: usize,

    /// Number of generations
    #[arg(short = 'n', long = "n-gen", default_value = "50")]
    n_gen: i64,

    /// Per-position mutation probability
    #[arg(short = 'm', long = "mutation-rate", default_value = "0.01")]
    mutation_rate: f64,

    /// Largest single step of the length random walk
    #[arg(long = "max-length-delta", default_value = "10")]
    max_length_delta: i64,

    /// Random seed for reproducibility
    #[arg(short = 's', long = "seed", default_value = "0")]
    seed: u64,

    /// Warm-start from the empirical TE dataset (default)
    #[arg(long = "seed-from-data", overrides_with = "no_seed_from_data")]
    seed_from_data: bool,

    /// Disable the empirical warm-start
    #[arg(long = "no-seed-from-data")]
    no_seed_from_data: bool,

    /// Gradient-ascent steps per restart for oracle-designed seeds
    /// (0 disables gradient seeding)
    #[arg(long = "gradient-seed-steps", default_value = "0")]
    gradient_seed_steps: usize,

    /// miRNA expression matrix CSV (required)
    #[arg(long = "expression")]
    expression: PathBuf,

    /// miRBase mature-sequence table (required)
    #[arg(long = "mirna-table")]
    mirna_table: PathBuf,

    /// Empirical TE dataset (TSV) for warm-start seeds
    #[arg(long = "te-data")]
    te_data: Option<PathBuf>,

    /// Gene registry table (symbol<TAB>cds); required with --gene
    #[arg(long = "gene-table")]
    gene_table: Option<PathBuf>,

    /// Oracle weights directory (required)
    #[arg(long = "oracle-dir")]
    oracle_dir: PathBuf,

    /// Max mean RPM in the target for a sponge miRNA candidate
    #[arg(long = "target-thresh", default_value = "10")]
    target_thresh: f64,

    /// Min mean RPM in a non-target cell type to count as covered
    #[arg(long = "cover-thresh", default_value = "1000")]
    cover_thresh: f64,

    /// Maximum number of sponge miRNAs to select
    #[arg(long = "max-mirnas", default_value = "20")]
    max_mirnas: usize,

    /// Sponge site repeats in the generated 3'UTR
    #[arg(long = "num-sites", default_value = "16")]
    num_sites: usize,

    /// History CSV output file (omit to skip writing the history)
    #[arg(short = 'o', long = "history")]
    history: Option<PathBuf>,

    /// Number of worker threads for CPU scoring (0 = auto-detect)
    #[arg(short = 'j', long = "threads", default_value = "0")]
    threads: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Validate inputs
    if args.n_gen < 0 {
        bail!("The number of generations cannot be negative.");
    }
    if !args.expression.exists() {
        bail!("Expression matrix not found: {}", args.expression.display());
    }
    if !args.mirna_table.exists() {
        bail!("miRNA table not found: {}", args.mirna_table.display());
    }

    // Resolve the CDS
    let cds = match (&args.cds, &args.gene) {
        (Some(cds), _) => clean_sequence(cds)?,
        (None, Some(gene)) => {
            let table = args
                .gene_table
                .as_ref()
                .context("--gene requires --gene-table")?;
            let registry = GeneRegistry::load(table)?;
            clean_sequence(registry.canonical_cds(gene)?)?
        }
        (None, None) => bail!("Provide a coding sequence via --cds or --gene."),
    };

    // Worker pool for CPU scoring
    let num_threads = if args.threads == 0 {
        num_cpus::get()
    } else {
        args.threads
    };
    rayon::ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .build_global()
        .context("Failed to create thread pool")?;

    let config = RunConfig {
        utr5_min: args.utr5_min,
        utr5_max: args.utr5_max,
        initial_length: args.utr5_init,
        pop_size: args.pop_size,
        n_gen: args.n_gen as usize,
        mutation_rate: args.mutation_rate,
        max_length_delta: args.max_length_delta,
        seed: args.seed,
        target_cell_type: args.target.clone(),
        seed_from_data: args.seed_from_data || !args.no_seed_from_data,
        gradient_seed_steps: args.gradient_seed_steps,
        target_threshold: args.target_thresh,
        cover_threshold: args.cover_thresh,
        max_mirnas: args.max_mirnas,
        num_sponge_sites: args.num_sites,
        ..RunConfig::default()
    };
    config.validate()?;

    // Build the 3'UTR sponge cassette
    eprintln!("Parsing expression matrix: {}", args.expression.display());
    let matrix = parse_expression_matrix(&args.expression)?;
    let mature = parse_mature_table(&args.mirna_table)?;

    let design = design_utr3(&matrix, &mature, &config)?;
    eprintln!(
        "Sponge design: {} miRNA(s) selected ({}), 3'UTR {} nt",
        design.cover.selected.len(),
        design.cover.selected.join(", "),
        design.sponge.utr3.len()
    );

    // Load the oracle once; it stays resident for the whole process.
    eprintln!("Loading TE oracle: {}", args.oracle_dir.display());
    let ensemble = oracle::load_ensemble(&args.oracle_dir)?;
    eprintln!(
        "Oracle ready: {} model(s), {} tissue(s)",
        ensemble.num_models(),
        ensemble.tissues().len()
    );
    let ensemble = oracle::install(ensemble);

    // Run the optimiser
    let start = Instant::now();
    let outcome = run(
        &config,
        &cds,
        &design.sponge.utr3,
        &PairingFold,
        &ensemble,
        args.te_data.as_deref(),
        |generation, best| {
            eprintln!("generation {:>3}  best overall {:.4}", generation, best);
        },
    )?;
    eprintln!(
        "Finished in {:.1}s: {} Pareto-front design(s)",
        start.elapsed().as_secs_f64(),
        outcome.front_sequences.len()
    );

    write_outputs(&args, &outcome)?;

    eprintln!("Done!");
    Ok(())
}

/// Write the front to stdout and, when requested, the history CSV.
fn write_outputs(args: &Args, outcome: &RunOutcome) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    write_front_table(&mut out, outcome)?;
    out.flush()?;

    if let Some(path) = &args.history {
        let file = File::create(path).context("Failed to create history file")?;
        let mut writer = BufWriter::new(file);
        write_history_csv(&mut writer, &outcome.history)?;
        writer.flush()?;
        eprintln!(
            "History written to: {} ({} rows)",
            path.display(),
            outcome.history.len()
        );
    }

    Ok(())
}
