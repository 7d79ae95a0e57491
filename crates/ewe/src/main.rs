use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

mod commands;

#[derive(Parser)]
#[command(name = "ewe")]
#[command(about = "Prepare the ewe plant and recipe datasets.

Loads the plant and recipe tables, joins them, and enriches plants with GBIF
images. Also exports botanical formulas and their geographic coexistence.
")]
#[command(version)]
struct Cli {
  /// Configuration file (defaults to .ewe.json, ewe.json or .ewe/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  /// Directory for the image and occurrence caches
  #[arg(long, global = true, env = "EWE_CACHE_DIR")]
  cache_dir: Option<PathBuf>,

  /// Enable verbose logging
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Load, join and enrich both tables, writing the dataset as JSON
  Load {
    /// Plants table location (URL or path)
    #[arg(long)]
    plants: Option<String>,
    /// Recipes table location (URL or path)
    #[arg(long)]
    recipes: Option<String>,
    /// Image lookups in flight at once
    #[arg(long, short = 'j')]
    concurrency: Option<usize>,
    /// Output file (stdout when omitted)
    #[arg(long, short)]
    out: Option<PathBuf>,
  },
  /// Reduce every recipe to the botanical names it uses
  Formulas {
    /// Output file (stdout when omitted)
    #[arg(long, short)]
    out: Option<PathBuf>,
  },
  /// Compute where the species of each formula occur together
  Coexistence {
    /// Formulas JSON file (built from the tables when omitted)
    formulas: Option<PathBuf>,
    /// Grid cell size in degrees
    #[arg(long)]
    cell_size: Option<f64>,
    /// Species required for a relaxed cell
    #[arg(long)]
    min_relaxed: Option<usize>,
    /// Output file (stdout when omitted)
    #[arg(long, short)]
    out: Option<PathBuf>,
  },
}

#[tokio::main]
async fn main() -> Result<()> {
  let cli = Cli::parse();

  // Logs go to stderr so JSON on stdout stays clean
  let filter = if cli.verbose {
    EnvFilter::new("info")
  } else {
    EnvFilter::new("ewe=info,ewe_data=info,warn")
  };
  tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

  let config = match commands::resolve_config(cli.config.as_deref(), cli.cache_dir.as_deref()) {
    Ok(config) => config,
    Err(err) => {
      eprintln!("Error: {err:#}");
      process::exit(1);
    }
  };

  let result = match cli.command {
    Commands::Load { plants, recipes, concurrency, out } => {
      let options = commands::load::LoadOptions { plants, recipes, concurrency, out };
      commands::load::execute(config, options).await
    }
    Commands::Formulas { out } => commands::formulas::execute(&config, out.as_deref()).await,
    Commands::Coexistence { formulas, cell_size, min_relaxed, out } => {
      let options =
        commands::coexistence::CoexistenceOptions { formulas, cell_size, min_relaxed, out };
      commands::coexistence::execute(config, options).await
    }
  };

  if let Err(err) = result {
    eprintln!("Error: {err:#}");
    process::exit(1);
  }

  Ok(())
}
