//! agrosystem - crop, irrigation and supply management service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use agrosystem::{
    config::Args,
    db::{
        schemas::{
            ActivityDoc, CropDoc, SoilRecordDoc, SupplyDoc, TrackingDoc, UserDoc,
            ACTIVITY_COLLECTION, CROP_COLLECTION, SOIL_COLLECTION, SUPPLY_COLLECTION,
            TRACKING_COLLECTION, USER_COLLECTION,
        },
        DocumentStore, MemoryStore, MongoClient,
    },
    server::{self, AppState},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("agrosystem={},info", args.log_level).into());
    let registry = tracing_subscriber::registry().with(filter);
    if args.json_logs() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  agrosystem");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    if !args.in_memory {
        info!("MongoDB: {} (db: {})", args.mongodb_uri, args.mongodb_db);
    }
    info!("======================================");

    let store = open_store(&args).await;
    let state = Arc::new(AppState::new(args, store));

    server::run(state).await?;

    Ok(())
}

/// Pick the backing store. MongoDB unless told otherwise; dev mode falls
/// back to memory when the server cannot be reached.
async fn open_store(args: &Args) -> Arc<dyn DocumentStore> {
    if args.in_memory {
        warn!("Using in-memory store; data is lost on exit");
        return Arc::new(MemoryStore::new());
    }

    match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            ensure_indexes(&client).await;
            Arc::new(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using in-memory store): {}", e);
                Arc::new(MemoryStore::new())
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    }
}

async fn ensure_indexes(client: &MongoClient) {
    let results = [
        (USER_COLLECTION, client.apply_indexes::<UserDoc>(USER_COLLECTION).await),
        (SUPPLY_COLLECTION, client.apply_indexes::<SupplyDoc>(SUPPLY_COLLECTION).await),
        (CROP_COLLECTION, client.apply_indexes::<CropDoc>(CROP_COLLECTION).await),
        (TRACKING_COLLECTION, client.apply_indexes::<TrackingDoc>(TRACKING_COLLECTION).await),
        (SOIL_COLLECTION, client.apply_indexes::<SoilRecordDoc>(SOIL_COLLECTION).await),
        (ACTIVITY_COLLECTION, client.apply_indexes::<ActivityDoc>(ACTIVITY_COLLECTION).await),
    ];
    for (collection, result) in results {
        if let Err(e) = result {
            warn!("Index creation on '{}' failed: {}", collection, e);
        }
    }
}
