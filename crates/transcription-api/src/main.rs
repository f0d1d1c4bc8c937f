//! Transcription API - job-oriented transcription and categorization service
//!
//! Accepts audio submissions, processes them in the background and lets
//! clients poll job status. Transcripts, categorizations and per-user LLM
//! preferences are cached in memory with per-cache TTLs.

mod capabilities;
mod categorization;
mod config;
mod error;
mod jobs;
mod orchestrator;
mod server;
mod service;
mod types;
mod users;

use crate::capabilities::{Capabilities, Latency, SimulatedPreferenceStore, SimulatedTranscriber};
use crate::categorization::LlmCategorizer;
use crate::config::Config;
use crate::error::Result;
use crate::server::{start_server, ServerState, SharedState};
use crate::service::TranscriptionService;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let env_filter =
        EnvFilter::from_default_env().add_directive("transcription_api=info".parse()?);

    // Use JSON format for GCP Cloud Logging when LOG_FORMAT=json
    if std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false)
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_stackdriver::layer())
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    };

    info!("Starting Transcription API...");

    let config = Config::from_env();
    info!("Port: {}", config.port);
    info!("API version: {}", config.api_version);
    info!(
        "Cache TTLs: transcription {}s, category {}s, preference {}s",
        config.transcription_cache_ttl.as_secs(),
        config.category_cache_ttl.as_secs(),
        config.preference_cache_ttl.as_secs()
    );
    if config.openai_api_key.is_none() && config.anthropic_api_key.is_none() {
        warn!("No LLM API keys configured, jobs will complete without a category");
    }

    let capabilities = build_capabilities(&config)?;
    let service = TranscriptionService::from_config(&config, capabilities);

    let state: SharedState = Arc::new(ServerState::new(service, config.cors_origins.clone()));

    // Start HTTP server (blocking)
    start_server(state, config.port).await?;

    Ok(())
}

fn build_capabilities(config: &Config) -> Result<Capabilities> {
    let (transcriber, preferences) = if config.simulate_latency {
        (
            SimulatedTranscriber::default(),
            SimulatedPreferenceStore::default(),
        )
    } else {
        info!("Simulated latency disabled");
        (
            SimulatedTranscriber::new(Latency::NONE),
            SimulatedPreferenceStore::new(Latency::NONE),
        )
    };

    Ok(Capabilities {
        content: Arc::new(transcriber),
        preference: Arc::new(preferences),
        categorizer: Arc::new(LlmCategorizer::new(config)?),
    })
}
