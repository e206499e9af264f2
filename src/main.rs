//! Kohonen CLI - Self-Organizing Map Engine
//!
//! Command-line interface for training maps on JSON records.

use clap::{Parser, Subcommand};
use indicatif::{HumanDuration, ProgressBar, ProgressStyle};
use kohonen::{
    feature_variance, low_influence_features, read_records, CancellationToken, Config,
    DatasetLoader, IterationProgress, LatticeGuard, Result, SomGrid, Topology, TrainingEngine,
};
use log::error;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "kohonen")]
#[command(author = "Kohonen Contributors")]
#[command(version)]
#[command(about = "Self-Organizing Map Engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a map on a JSON array of records
    Train {
        /// Input records file (JSON array of flat objects)
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Grid width (overrides the configuration)
        #[arg(long)]
        width: Option<usize>,

        /// Grid height (overrides the configuration)
        #[arg(long)]
        height: Option<usize>,

        /// Random seed for reproducibility
        #[arg(short, long)]
        seed: Option<i64>,

        /// Number of training iterations
        #[arg(short = 'n', long)]
        iterations: Option<usize>,

        /// Initial learning rate
        #[arg(short, long)]
        learning_rate: Option<f64>,

        /// Grid topology (square, hexagonal)
        #[arg(short, long)]
        topology: Option<Topology>,

        /// Clamp degenerate lattices instead of refusing them
        #[arg(long)]
        clamp_lattice: bool,

        /// Run the BMU search on all cores
        #[arg(long)]
        parallel_bmu: bool,

        /// Print the categorical text to code mappings
        #[arg(long)]
        text_mappings: bool,
    },

    /// Show the columns and codebooks detected in a records file
    Inspect {
        /// Input records file (JSON array of flat objects)
        #[arg(short, long)]
        input: PathBuf,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

struct TrainOptions {
    input: PathBuf,
    config: Option<PathBuf>,
    width: Option<usize>,
    height: Option<usize>,
    seed: Option<i64>,
    iterations: Option<usize>,
    learning_rate: Option<f64>,
    topology: Option<Topology>,
    clamp_lattice: bool,
    parallel_bmu: bool,
    text_mappings: bool,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    }

    let result = match cli.command {
        Commands::Train {
            input,
            config,
            width,
            height,
            seed,
            iterations,
            learning_rate,
            topology,
            clamp_lattice,
            parallel_bmu,
            text_mappings,
        } => train_map(TrainOptions {
            input,
            config,
            width,
            height,
            seed,
            iterations,
            learning_rate,
            topology,
            clamp_lattice,
            parallel_bmu,
            text_mappings,
        }),

        Commands::Inspect { input, config } => inspect_records(input, config),
    };

    if let Err(e) = result {
        error!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::from_file(path),
        None => Ok(Config::default()),
    }
}

fn train_map(opts: TrainOptions) -> Result<()> {
    let start_time = Instant::now();

    let mut config = load_config(opts.config.as_ref())?;
    let som = &mut config.som;
    if let Some(width) = opts.width {
        som.width = width;
    }
    if let Some(height) = opts.height {
        som.height = height;
    }
    if let Some(iterations) = opts.iterations {
        som.iterations = iterations;
    }
    if let Some(learning_rate) = opts.learning_rate {
        som.learning_rate_start = learning_rate;
    }
    if let Some(topology) = opts.topology {
        som.topology = topology;
    }
    if opts.clamp_lattice {
        som.lattice_guard = LatticeGuard::Clamp;
    }
    if opts.parallel_bmu {
        som.parallel_bmu = true;
    }
    // Resolve once so the printed seed is the one used.
    let seed = opts.seed.unwrap_or_else(|| som.resolve_seed());
    som.seed = Some(seed);

    println!("Kohonen Self-Organizing Map Engine");
    println!("   Training map from: {}", opts.input.display());
    println!();

    let records = read_records(BufReader::new(File::open(&opts.input)?))?;
    let dataset = DatasetLoader::new(config.loader.clone()).load(&records)?;
    println!(
        "✓ Loaded {} records ({} features, {} categorical)",
        format_number(dataset.training_set.len()),
        dataset.training_set.depth(),
        dataset.encoder.len()
    );

    let engine = TrainingEngine::new(config.som.clone())?;
    let set = Arc::new(dataset.training_set.clone());
    let mut grid = engine.initialize(set.clone(), &dataset.keys())?;
    grid.set_categories(dataset.encoder.clone());
    println!(
        "✓ Initialized SOM ({}x{} = {} nodes, seed {})",
        grid.width(),
        grid.height(),
        grid.len(),
        grid.seed()
    );

    println!();
    println!("Training SOM...");

    let bar_style = ProgressStyle::default_bar()
        .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) ETA: {eta}")
        .unwrap()
        .progress_chars("█▓▒░  ");
    let pb = ProgressBar::new(config.som.iterations as u64);
    pb.set_style(bar_style);

    let mut observer = |p: &IterationProgress, _: &SomGrid| {
        pb.set_position((p.iteration + 1) as u64);
        pb.set_message(format!(
            "lr {:.5}  radius {:.3}",
            p.next_learning_rate, p.neighborhood_radius
        ));
    };
    let report = engine.train_with(&mut grid, &set, &mut observer, &CancellationToken::new())?;
    pb.finish_and_clear();
    println!(
        "✓ Trained {} iterations in {}",
        report.iterations_completed,
        HumanDuration(report.elapsed)
    );

    print_summary(&grid, &dataset.training_set)?;

    if opts.text_mappings {
        println!();
        println!("Text mappings:");
        for m in grid.categories().text_mappings() {
            println!("  {:<20} {:>5}  {}", m.feature, m.code, m.text);
        }
    }

    println!();
    println!("Done in {}", HumanDuration(start_time.elapsed()));

    Ok(())
}

fn print_summary(grid: &SomGrid, set: &kohonen::TrainingSet) -> Result<()> {
    let hits = grid.map_vectors(set)?;
    let mut occupancy: HashMap<(usize, usize), usize> = HashMap::new();
    for cell in hits {
        *occupancy.entry(cell).or_default() += 1;
    }
    let busiest = occupancy.iter().max_by_key(|(cell, count)| (**count, std::cmp::Reverse(**cell)));

    println!();
    println!("Grid: {}x{} ({} nodes, {:?})", grid.width(), grid.height(), grid.len(), grid.topology());
    println!("   Occupied cells: {}", occupancy.len());
    if let Some(((x, y), count)) = busiest {
        println!("   Busiest cell: ({}, {}) with {} records", x, y, count);
    }

    let variances = feature_variance(grid);
    println!();
    println!("Feature variance:");
    for v in &variances {
        println!("  {:<20} mean {:>12.4}  variance {:>12.6}", v.key, v.mean, v.variance);
    }

    let low = low_influence_features(&variances);
    println!();
    println!("Low-influence features: {}", low.join(", "));

    Ok(())
}

fn inspect_records(input: PathBuf, config: Option<PathBuf>) -> Result<()> {
    let config = load_config(config.as_ref())?;
    let records = read_records(BufReader::new(File::open(&input)?))?;
    let dataset = DatasetLoader::new(config.loader).load(&records)?;

    println!("Records: {:?}", input);
    println!("  Records: {}", format_number(records.len()));
    println!("  Columns: {}", dataset.columns.len());
    for column in &dataset.columns {
        let kind = match dataset.encoder.codebook(&column.key) {
            Some(book) => format!("categorical ({} values)", book.len()),
            None => "numeric".to_string(),
        };
        if column.source == column.key {
            println!("    {:<20} {}", column.key, kind);
        } else {
            println!("    {:<20} {} (from '{}')", column.key, kind, column.source);
        }
    }

    let mappings = dataset.encoder.text_mappings();
    if !mappings.is_empty() {
        println!();
        println!("Codebooks:");
        for m in mappings {
            println!("  {:<20} {:>5}  {}", m.feature, m.code, m.text);
        }
    }

    Ok(())
}

/// Format large numbers with commas for readability
fn format_number(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
