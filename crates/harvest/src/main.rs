use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info};

use harvest::catalog::{CatalogApi, CkanClient, MemoryCatalog};
use harvest::logging::init_logging;
use harvest::sanitize::redact_url;
use harvest::{load_config, resolve_api_key, Pipeline, PipelineConfig, RunReport};

#[derive(Debug, Parser)]
#[command(name = "harvest")]
#[command(
    about = "Crawl a directory tree, extract file metadata and publish it to a CKAN catalog",
    long_about = None
)]
struct Cli {
    /// Path to the JSON or YAML config file
    #[arg(short, long, env = "HARVEST_CONFIG")]
    config: PathBuf,

    /// Publish into an in-memory catalog instead of the configured one
    #[arg(long)]
    dry_run: bool,

    /// Default log filter when RUST_LOG is not set
    #[arg(long, default_value = "info", env = "HARVEST_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,

    /// Print the run report as JSON
    #[arg(long)]
    report_json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.json_logs);

    match run(&cli) {
        Ok(report) => {
            if cli.report_json {
                match serde_json::to_string_pretty(&report) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize report: {}", e);
                        println!("{}", report);
                    }
                }
            } else {
                println!("{}", report);
            }
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> harvest::Result<RunReport> {
    let mut config = load_config(&cli.config)?;
    if cli.dry_run {
        config.catalog.dry_run = true;
    }

    let pipeline_config = Arc::new(PipelineConfig::from_config(&config));

    let catalog: Box<dyn CatalogApi> = if config.catalog.dry_run {
        info!("Dry run: publishing into an in-memory catalog");
        Box::new(MemoryCatalog::new())
    } else {
        let api_key = resolve_api_key(&config.catalog)?;
        if api_key.is_none() {
            info!("No API key configured, catalog writes will be rejected");
        }
        info!(url = %redact_url(&config.catalog.url), "Publishing to catalog");
        Box::new(CkanClient::new(
            &config.catalog.url,
            api_key,
            Duration::from_secs(config.catalog.timeout_secs),
        )?)
    };

    let pipeline = Pipeline::from_config(pipeline_config, catalog);
    Ok(pipeline.run()?)
}
