use chrono::TimeDelta;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{Config, StoreBackend};
use crate::store::seed::QuizSeed;
use crate::store::{GraphStore, MemoryGraph, MongoGraph};

pub mod delivery_engine;
pub mod notification_service;
pub mod question_pool;
pub mod session_cache;
pub mod session_loader;

pub use delivery_engine::QuizEngine;
use notification_service::{notifier_from_config, Notifier};
use session_cache::SessionCache;

/// Quiz defaults applied when a quiz node does not carry its own.
#[derive(Debug, Clone)]
pub struct QuizSettings {
    pub quiz_duration: TimeDelta,
    pub default_threshold: f64,
    /// Base URL used to build report links in completion notices.
    pub public_url: String,
}

impl QuizSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            quiz_duration: TimeDelta::minutes(config.quiz_duration_minutes),
            default_threshold: config.default_threshold,
            public_url: config.public_url.clone(),
        }
    }
}

pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn GraphStore>,
    pub engine: Arc<QuizEngine>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store: Arc<dyn GraphStore> = match config.store_backend {
            StoreBackend::Memory => Arc::new(seeded_memory_graph(&config).await?),
            StoreBackend::Mongo => Arc::new(connect_mongo(&config).await?),
        };
        let notifier = notifier_from_config(&config);
        Ok(Self::with_store(config, store, notifier))
    }

    /// Wires the engine over an already prepared store.
    pub fn with_store(
        config: Config,
        store: Arc<dyn GraphStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let engine = QuizEngine::new(
            store.clone(),
            Arc::new(SessionCache::new()),
            notifier,
            QuizSettings::from_config(&config),
        );
        Self {
            config,
            store,
            engine: Arc::new(engine),
        }
    }
}

async fn seeded_memory_graph(config: &Config) -> anyhow::Result<MemoryGraph> {
    let seed = match &config.seed_file {
        Some(path) => {
            tracing::info!("Loading quiz seed from {}", path);
            let raw = tokio::fs::read_to_string(path).await?;
            serde_json::from_str::<QuizSeed>(&raw)?
        }
        None => {
            tracing::info!("No SEED_FILE configured, loading the demo quiz");
            QuizSeed::demo()
        }
    };

    let graph = MemoryGraph::new();
    let seeded = seed.apply(&graph).await?;
    for (key, uid) in &seeded.candidates {
        tracing::info!("Seeded candidate {} as {}", key, uid);
    }
    Ok(graph)
}

async fn connect_mongo(config: &Config) -> anyhow::Result<MongoGraph> {
    tracing::info!("Connecting to MongoDB...");

    let client = tokio::time::timeout(
        Duration::from_secs(30),
        mongodb::Client::with_uri_str(&config.mongo_uri),
    )
    .await
    .map_err(|_| anyhow::anyhow!("MongoDB connection timeout after 30s"))??;

    let graph = MongoGraph::new(client.database(&config.mongo_database));

    tokio::time::timeout(Duration::from_secs(5), graph.ping())
        .await
        .map_err(|_| anyhow::anyhow!("MongoDB ping timeout after 5s"))??;
    graph.ensure_indexes().await?;

    tracing::info!("MongoDB connection established successfully");
    Ok(graph)
}
