use std::{process::ExitCode, sync::Arc};

use clack_collab::{DatabaseError, MemoryDatabase, SharedStore, SqliteDatabase};
use clack_server::{run_server, ConfigError, ServerConfig, ServerContext};
use log::{error, info};
use thiserror::Error;

mod logging;

#[derive(Debug, Error)]
enum ClackError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error("Server stopped: {0}")]
    Server(#[from] std::io::Error),
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = logging::init_logger() {
        eprintln!("Could not set up logging: {e}");
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), ClackError> {
    let config = ServerConfig::from_env()?;

    info!("Connecting to database...");
    let store = open_store(&config).await?;

    let context = ServerContext::new(store, &config);

    info!("Starting server on port {}...", config.port);
    run_server(context, config.port).await?;

    Ok(())
}

async fn open_store(config: &ServerConfig) -> Result<SharedStore, DatabaseError> {
    match &config.database_url {
        Some(url) => {
            let database = SqliteDatabase::new(url).await?;
            info!("Using sqlite database at {url}");

            Ok(Arc::new(database))
        }
        None => {
            info!("No database configured, state is kept in memory");
            Ok(Arc::new(MemoryDatabase::new()))
        }
    }
}
