//! farmnet - Sustainable Farming Network API server

use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};

use farmnet::{config::Args, db::MongoClient, logging, server, store::Stores, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();
    logging::init(&args);

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  farmnet - Sustainable Farming Network");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("MongoDB: {}", args.mongodb_uri);
    info!("Uploads: {}", args.upload_dir.display());
    if let Some(dir) = &args.static_dir {
        info!("Static files: {}", dir.display());
    }
    info!("======================================");

    // MongoDB is optional in dev mode; the in-memory store stands in
    let stores = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Stores::mongo(&client).await?
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                Stores::memory()
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let state = match AppState::new(args, stores) {
        Ok(state) => state,
        Err(e) => {
            error!("Startup failed: {}", e);
            std::process::exit(1);
        }
    };

    server::run(Arc::new(state)).await?;
    Ok(())
}
