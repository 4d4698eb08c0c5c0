//! Podium - creator leaderboard and reward payout snapshot service

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use podium::{
    cache::TagCache,
    config::Args,
    db::MongoClient,
    leaderboard::SystemClock,
    server::{self, AppState},
    store::{
        HttpScoreSource, MemoryPreferenceStore, MemorySnapshotStore, MongoPreferenceStore, MongoSnapshotStore,
        PreferenceStore, ScoreSource, SnapshotStore, StaticScoreSource,
    },
    Podium, Stores,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("podium={},info", args.log_level).into());
    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    let program = args.program_config();

    info!("======================================");
    info!("  Podium - Creator Rewards Leaderboard");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    info!("Program: {}", program.program_id);
    info!("Deadline: {}", program.deadline.to_rfc3339());
    info!("Pool: {} across {} slots", program.pool_total, program.reward_slots);
    info!("Score source: {}", args.score_source_url.as_deref().unwrap_or("(static)"));
    info!("MongoDB: {}", args.mongodb_uri);
    info!("======================================");

    let scores: Arc<dyn ScoreSource> = match args.score_source_url.as_deref() {
        Some(url) => Arc::new(HttpScoreSource::new(
            url,
            args.score_page_size,
            args.score_max_pages,
            args.upstream_timeout(),
        )?),
        None => {
            warn!("No SCORE_SOURCE_URL (dev mode) - serving an empty static score source");
            Arc::new(StaticScoreSource::default())
        }
    };

    // MongoDB is optional in dev mode
    let (preferences, snapshots): (Arc<dyn PreferenceStore>, Arc<dyn SnapshotStore>) =
        match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
            Ok(client) => {
                info!("MongoDB connected successfully");
                (
                    Arc::new(MongoPreferenceStore::new(&client).await?),
                    Arc::new(MongoSnapshotStore::new(&client, &program.program_id).await?),
                )
            }
            Err(e) if args.dev_mode => {
                warn!("MongoDB connection failed (dev mode, using in-memory stores): {}", e);
                (Arc::new(MemoryPreferenceStore::new()), Arc::new(MemorySnapshotStore::new()))
            }
            Err(e) => {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        };

    let cache = Arc::new(TagCache::new(args.cache_config()));
    let podium = Arc::new(Podium::new(
        program,
        Stores {
            scores,
            preferences,
            snapshots,
        },
        Arc::clone(&cache),
        Arc::new(SystemClock),
        args.upstream_timeout(),
    ));

    let state = Arc::new(AppState::new(args, podium, cache));
    server::run(state).await?;

    Ok(())
}
