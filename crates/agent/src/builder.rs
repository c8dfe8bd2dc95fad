//! Wiring the engine from configuration.

use std::sync::Arc;
use std::time::Duration;

use pitchscout_config::AppConfig;
use pitchscout_core::Error;
use pitchscout_core::provider::Provider;
use pitchscout_core::retrieval::StoreConnector;
use pitchscout_memory::{
    ChromaConnector, InMemoryConnector, InMemoryVectorStore, ProviderEmbedder, SessionLimits,
    SessionStore, SummaryBufferFactory,
};
use pitchscout_providers::router::{ProviderRouter, build_from_config};
use tracing::info;

use crate::engine::{AnswerEngine, EngineSettings};
use crate::roster::Roster;

fn lookup(router: &ProviderRouter, name: &str) -> Result<Arc<dyn Provider>, Error> {
    router.get(name).ok_or_else(|| Error::Config {
        message: format!("Provider '{name}' is not configured"),
    })
}

/// The vector store connector named by `[vector_store]`.
pub fn build_connector(
    config: &AppConfig,
    router: &ProviderRouter,
) -> Result<Arc<dyn StoreConnector>, Error> {
    let vs = &config.vector_store;
    let embedder = ProviderEmbedder::new(
        lookup(router, &vs.embedding_provider)?,
        vs.embedding_model.clone(),
    );

    let connector: Arc<dyn StoreConnector> = match vs.backend.as_str() {
        "chroma" => Arc::new(ChromaConnector::new(&vs.url, &vs.collection, embedder)),
        "in_memory" => Arc::new(InMemoryConnector::new(Arc::new(InMemoryVectorStore::new(
            embedder,
        )))),
        other => {
            return Err(Error::Config {
                message: format!("Unknown vector store backend '{other}'"),
            });
        }
    };
    Ok(connector)
}

/// Build a ready-to-serve engine from configuration.
pub fn build_engine(config: &AppConfig) -> Result<AnswerEngine, Error> {
    let router = build_from_config(config);
    let provider = lookup(&router, &config.default_provider)?;

    let roster = Roster::new(config.roster.iter().cloned()).map_err(|e| Error::Config {
        message: e.to_string(),
    })?;

    let factory = Arc::new(SummaryBufferFactory::new(
        provider.clone(),
        config.summary_model(),
        config.memory.summary_max_tokens,
    ));
    let sessions = Arc::new(SessionStore::new(
        factory,
        SessionLimits {
            max_sessions: config.sessions.max_sessions,
            idle_ttl: Duration::from_secs(config.sessions.idle_ttl_secs),
        },
    ));

    let connector = build_connector(config, &router)?;

    info!(
        provider = %config.default_provider,
        model = %config.default_model,
        store = %connector.describe(),
        players = roster.len(),
        "Answer engine ready"
    );

    Ok(AnswerEngine::new(
        provider,
        connector,
        sessions,
        roster,
        EngineSettings::from_config(config),
    ))
}
