//! sqlsheet - run SQL query files and export the results as CSV or XLSX.

mod cli;
mod logging;

use cli::Cli;
use sqlsheet::batch::BatchOrchestrator;
use sqlsheet::config::{Config, ConnectionConfig};
use sqlsheet::db::PostgresExecutor;
use sqlsheet::error::{Result, SqlSheetError};
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();

    match &cli.log_file {
        Some(path) => logging::init_file_logging(path, cli.verbose),
        None => logging::init_stderr_logging(cli.verbose),
    }

    match run(&cli).await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}: {}", e.category(), e);
            std::process::exit(1);
        }
    }
}

/// Runs the batch. Returns whether every job succeeded.
async fn run(cli: &Cli) -> Result<bool> {
    let config_path = cli.config_path();
    debug!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let export = cli.to_export_config(&config.export)?;
    let source = cli.query_source(&config.export);

    let settings = resolve_connection(cli, &config)?
        .into_settings(cli.query_timeout(&config.export))?;
    info!("Connection: {}", settings.display_string());
    info!(
        "Output: {} ({:?}, encoding {})",
        export.output_dir.display(),
        export.format,
        export.encoding
    );

    let executor = PostgresExecutor::new(settings);
    let report = BatchOrchestrator::new(&executor, &export)
        .run(&source)
        .await?;

    Ok(report.is_success())
}

/// Resolves the final connection configuration with precedence:
/// 1. CLI arguments (highest)
/// 2. Profile from the config file (`default` unless --profile is given)
/// 3. Environment variables
fn resolve_connection(cli: &Cli, config: &Config) -> Result<ConnectionConfig> {
    let mut connection = cli.to_connection_config()?;

    match cli.profile_name() {
        Some(name) => {
            let profile = config.get_connection(Some(name)).ok_or_else(|| {
                SqlSheetError::config(format!("Profile '{name}' not found in config file"))
            })?;
            connection.merge_defaults(profile);
        }
        None => {
            if let Some(profile) = config.get_connection(None) {
                connection.merge_defaults(profile);
            }
        }
    }

    connection.apply_env_defaults();
    Ok(connection)
}
