use clap::Parser;
use miette::{IntoDiagnostic, Result};
use purchase_coordinator::config::CoordinatorConfig;
use purchase_coordinator::infrastructure::storefront::CatalogEntry;
use purchase_coordinator::interfaces::csv::scenario_reader::ScenarioReader;
use purchase_coordinator::interfaces::scenario::ScenarioRunner;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario CSV file (`action, product, transaction, detail`)
    input: PathBuf,

    /// Coordinator configuration (JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Products listed by the simulated storefront (JSON array)
    #[arg(long)]
    catalog: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let config = match cli.config {
        Some(path) => CoordinatorConfig::from_path(path).into_diagnostic()?,
        None => CoordinatorConfig::default(),
    };
    let catalog: Vec<CatalogEntry> = match cli.catalog {
        Some(path) => {
            let file = File::open(path).into_diagnostic()?;
            serde_json::from_reader(file).into_diagnostic()?
        }
        None => Vec::new(),
    };

    let stdout = io::stdout();
    let mut runner = ScenarioRunner::new(config, catalog, stdout.lock());

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = ScenarioReader::new(file);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = runner.execute(command).await {
                    eprintln!("Error executing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    runner.finish().into_diagnostic()?;

    Ok(())
}
