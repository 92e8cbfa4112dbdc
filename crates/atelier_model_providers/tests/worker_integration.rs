//! Integration tests for the local worker adapter.
//!
//! These tests are ignored by default because they require:
//! - A running worker at `ATELIER_WORKER_URL` (or in `.env` file)
//! - `ATELIER_CATALOG_URL` for the catalog test
//! - The worker may spend real GPU time
//!
//! To run these tests:
//! ```sh
//! cargo test -p atelier_model_providers --test worker_integration -- --ignored
//! ```

mod common;

use atelier_model_providers::{HttpCatalogSource, WorkerAdapter, WorkerConfig};
use atelier_models::{
    GenerationAdapter, GenerationRequest, Invocation, ModelRegistry, PendingHandle, StatusUpdate,
    default_catalog,
};
use atelier_sync::CatalogSource;
use common::init_env;
use std::time::Duration;

fn adapter() -> WorkerAdapter {
    init_env();
    WorkerAdapter::new(WorkerConfig::from_env())
}

#[tokio::test]
#[ignore = "requires ATELIER_WORKER_URL"]
async fn image_generation_reaches_a_terminal_state() {
    let adapter = adapter();
    let registry = ModelRegistry::seeded(default_catalog()).expect("default catalog is valid");
    let model = registry.get("sdxl-turbo").expect("sdxl-turbo is seeded");

    let invocation = adapter
        .invoke(&model, &GenerationRequest::image("a lighthouse at dusk"), None)
        .await
        .expect("worker should accept the job");

    let handle = match invocation {
        Invocation::Immediate(result) => {
            assert!(!result.media().is_empty(), "image result should carry media");
            return;
        }
        Invocation::Pending(handle) => handle,
    };

    for _ in 0..120 {
        match adapter.poll_status(&handle, None).await.expect("poll should succeed") {
            StatusUpdate::Completed(result) => {
                assert!(!result.media().is_empty(), "image result should carry media");
                return;
            }
            StatusUpdate::Failed(message) => panic!("worker failed the job: {message}"),
            StatusUpdate::Queued | StatusUpdate::Processing { .. } => {
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
        }
    }
    panic!("job did not finish within two minutes");
}

#[tokio::test]
#[ignore = "requires ATELIER_WORKER_URL"]
async fn unknown_job_is_a_provider_error() {
    let result = adapter()
        .poll_status(&PendingHandle::new("does-not-exist"), None)
        .await;

    assert!(result.is_err(), "unknown job should fail: {result:?}");
}

#[tokio::test]
#[ignore = "requires ATELIER_CATALOG_URL"]
async fn remote_catalog_is_accepted_by_the_registry() {
    init_env();
    let url = std::env::var("ATELIER_CATALOG_URL").expect("ATELIER_CATALOG_URL should be set");
    let models = HttpCatalogSource::new("remote", url)
        .fetch()
        .await
        .expect("catalog should be reachable");

    let registry = ModelRegistry::new();
    registry.refresh(models).expect("remote catalog should be valid");
    assert!(!registry.is_empty());
}
