//! Atelier CLI.
//!
//! Asks the local worker for an image and attaches it to a fresh
//! conversation.
//!
//! # Usage
//!
//! ```bash
//! atelier [prompt...]
//! ```
//!
//! The worker is configured with `ATELIER_WORKER_URL` and
//! `ATELIER_WORKER_API_KEY`; set `ATELIER_CATALOG_URL` to also sync the model
//! catalog from a remote feed. Both may live in a `.env` file.

use atelier_core::TracingConfig;
use atelier_jobs::AccessRequest;
use atelier_model_providers::{HttpCatalogSource, WorkerAdapter, WorkerConfig};
use atelier_models::{Dispatcher, GenerationRequest, ModelRegistry, default_catalog};
use atelier_persistence::MemoryStore;
use atelier_studio::Studio;
use atelier_sync::{StaticSource, SyncConfig, SyncScheduler};
use atelier_tree::Role;
use std::sync::Arc;

const CATALOG_URL_ENV: &str = "ATELIER_CATALOG_URL";
const DEFAULT_PROMPT: &str = "a lighthouse at dusk, oil painting";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    TracingConfig::from_env().init();

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    let prompt = if prompt.trim().is_empty() {
        DEFAULT_PROMPT.to_string()
    } else {
        prompt
    };

    // Every backend in the catalog is served by the same local worker.
    let registry = Arc::new(ModelRegistry::seeded(default_catalog())?);
    let adapter = Arc::new(WorkerAdapter::new(WorkerConfig::from_env()));
    let mut dispatcher = Dispatcher::new(Arc::clone(&registry));
    for model in registry.list() {
        if !dispatcher.has_adapter(model.backend()) {
            dispatcher.register_adapter(model.backend(), Arc::clone(&adapter));
        }
    }

    let studio = Studio::builder(Arc::new(dispatcher))
        .with_store(Arc::new(MemoryStore::new()))
        .build();

    let mut scheduler = SyncScheduler::new(registry, SyncConfig::default())
        .with_tracker(studio.tracker().clone())
        .with_source(Arc::new(StaticSource::new("built-in", default_catalog())));
    if let Ok(url) = std::env::var(CATALOG_URL_ENV) {
        scheduler = scheduler.with_source(Arc::new(HttpCatalogSource::new("remote", url)));
    }
    let sync = scheduler.spawn();

    let conversations = studio.conversations();
    let conversation = conversations.create();
    let node = conversations.add_message(&conversation, Role::User, prompt.as_str())?;

    let generation = studio
        .request_generation(
            &conversation,
            &node,
            &AccessRequest::anonymous(),
            GenerationRequest::image(prompt),
            None,
        )
        .await?;
    tracing::info!(job_id = %generation.job_id(), "waiting for the worker");

    let outcome = generation.finished().await?;
    match outcome.job.error() {
        Some(error) => tracing::error!(job_id = %outcome.job.id(), %error, "generation failed"),
        None => tracing::info!(
            job_id = %outcome.job.id(),
            model = outcome.job.model_id(),
            attachments = outcome.attachments.len(),
            "generation completed"
        ),
    }

    for message in studio.context_for(&conversation)? {
        tracing::info!(role = ?message.role, content = %message.content, images = ?message.images, "context");
    }

    sync.shutdown().await;
    Ok(())
}
