//! Generations requested from conversation messages, end to end.

use atelier_jobs::{AccessRequest, JobError, JobStatus, SlidingWindowGate};
use atelier_models::testing::MockAdapter;
use atelier_models::{Dispatcher, GenerationRequest, GenerationResult, ModelRegistry, StatusUpdate, default_catalog};
use atelier_persistence::{MemoryStore, Store};
use atelier_studio::{Studio, StudioConfig, StudioError};
use atelier_tree::{ConversationError, ConversationId, MediaKind, NodeId, Role, TreeError};
use core::time::Duration;
use std::sync::Arc;

fn dispatcher_with(backend: &str, adapter: Arc<MockAdapter>) -> Arc<Dispatcher> {
    let mut dispatcher = Dispatcher::new(Arc::new(ModelRegistry::seeded(default_catalog()).unwrap()));
    dispatcher.register_adapter(backend, adapter);
    Arc::new(dispatcher)
}

fn image_result() -> GenerationResult {
    GenerationResult::ImageGen {
        image_urls: vec!["https://cdn.example/fox-1.png".into(), "https://cdn.example/fox-2.png".into()],
    }
}

fn open_conversation(studio: &Studio, prompt: &str) -> (ConversationId, NodeId) {
    let conversations = studio.conversations();
    let conversation = conversations.create();
    let node = conversations.add_message(&conversation, Role::User, prompt).unwrap();
    (conversation, node)
}

#[tokio::test]
async fn completed_image_is_attached_to_the_originating_node() {
    let studio = Studio::builder(dispatcher_with("sdxl-turbo", Arc::new(MockAdapter::immediate(image_result())))).build();
    let (conversation, node) = open_conversation(&studio, "a fox in the snow");
    // A later reply must not receive the media.
    let reply = studio
        .conversations()
        .add_message(&conversation, Role::Assistant, "Generating...")
        .unwrap();

    let generation = studio
        .request_generation(
            &conversation,
            &node,
            &AccessRequest::anonymous(),
            GenerationRequest::image("a fox in the snow"),
            Some("sdxl-turbo"),
        )
        .await
        .unwrap();
    let job_id = generation.job_id().clone();
    let outcome = generation.finished().await.unwrap();

    assert_eq!(outcome.job.id(), &job_id);
    assert_eq!(outcome.job.status(), JobStatus::Completed);
    assert_eq!(outcome.attachments.len(), 2);

    let (attached, on_reply) = studio
        .conversations()
        .with_tree(&conversation, |tree| {
            (
                tree.get(&node).unwrap().attachments().to_vec(),
                tree.get(&reply).unwrap().attachments().len(),
            )
        })
        .unwrap();
    assert_eq!(on_reply, 0);
    assert_eq!(attached.len(), 2);
    assert!(attached.iter().all(|a| a.kind == MediaKind::Image));
    assert!(attached.iter().all(|a| a.prompt.as_deref() == Some("a fox in the snow")));
    assert_eq!(attached[0].url, "https://cdn.example/fox-1.png");

    let context = studio.context_for(&conversation).unwrap();
    assert_eq!(context.len(), 2);
    assert_eq!(context[0].images.len(), 2);
    assert!(context[1].images.is_empty());
}

#[tokio::test(start_paused = true)]
async fn pending_video_is_polled_and_attached_with_thumbnail() {
    let adapter = Arc::new(MockAdapter::pending("runway-1").with_updates([
        StatusUpdate::Processing { progress: Some(50) },
        StatusUpdate::Completed(GenerationResult::VideoGen {
            video_url: "https://cdn.example/comet.mp4".into(),
            thumbnail_url: Some("https://cdn.example/comet.jpg".into()),
        }),
    ]));
    let studio = Studio::builder(dispatcher_with("runway-gen2", adapter.clone())).build();
    let (conversation, node) = open_conversation(&studio, "a comet over the sea");

    let outcome = studio
        .request_generation(
            &conversation,
            &node,
            &AccessRequest::anonymous(),
            GenerationRequest::video("a comet over the sea"),
            Some("runway-gen2"),
        )
        .await
        .unwrap()
        .finished()
        .await
        .unwrap();

    assert_eq!(outcome.job.status(), JobStatus::Completed);
    assert!(adapter.polls() >= 2);

    let attachment = studio
        .conversations()
        .with_tree(&conversation, |tree| tree.get(&node).unwrap().attachments()[0].clone())
        .unwrap();
    assert_eq!(attachment.kind, MediaKind::Video);
    assert_eq!(attachment.thumbnail_url.as_deref(), Some("https://cdn.example/comet.jpg"));
}

#[tokio::test]
async fn audio_results_attach_nothing() {
    let adapter = Arc::new(MockAdapter::immediate(GenerationResult::AudioTts {
        audio_url: "https://cdn.example/hello.mp3".into(),
    }));
    let studio = Studio::builder(dispatcher_with("elevenlabs", adapter)).build();
    let (conversation, node) = open_conversation(&studio, "say hello");

    let outcome = studio
        .request_generation(&conversation, &node, &AccessRequest::anonymous(), GenerationRequest::speech("hello"), None)
        .await
        .unwrap()
        .finished()
        .await
        .unwrap();

    assert_eq!(outcome.job.status(), JobStatus::Completed);
    assert!(outcome.attachments.is_empty());
}

#[tokio::test]
async fn failed_job_leaves_the_node_untouched() {
    let studio = Studio::builder(dispatcher_with("sdxl-turbo", Arc::new(MockAdapter::failing("CUDA out of memory")))).build();
    let (conversation, node) = open_conversation(&studio, "a fox");

    let outcome = studio
        .request_generation(&conversation, &node, &AccessRequest::anonymous(), GenerationRequest::image("a fox"), Some("sdxl-turbo"))
        .await
        .unwrap()
        .finished()
        .await
        .unwrap();

    assert_eq!(outcome.job.status(), JobStatus::Failed);
    assert!(outcome.job.error().unwrap().contains("CUDA out of memory"));
    let attached = studio
        .conversations()
        .with_tree(&conversation, |tree| tree.get(&node).unwrap().attachments().len())
        .unwrap();
    assert_eq!(attached, 0);
}

#[tokio::test]
async fn unknown_node_creates_no_job() {
    let adapter = Arc::new(MockAdapter::immediate(image_result()));
    let studio = Studio::builder(dispatcher_with("sdxl-turbo", adapter.clone())).build();
    let (conversation, _) = open_conversation(&studio, "a fox");
    let (_, elsewhere) = open_conversation(&studio, "another thread");

    let result = studio
        .request_generation(&conversation, &elsewhere, &AccessRequest::anonymous(), GenerationRequest::image("a fox"), None)
        .await;

    assert!(matches!(
        result,
        Err(StudioError::Conversation(ConversationError::Tree(TreeError::NotFound(id)))) if id == elsewhere
    ));
    assert!(studio.tracker().is_empty());
    assert_eq!(adapter.invocations(), 0);
}

#[tokio::test]
async fn rejected_caller_creates_no_job() {
    let studio = Studio::builder(dispatcher_with("sdxl-turbo", Arc::new(MockAdapter::immediate(image_result()))))
        .with_gate(Arc::new(SlidingWindowGate::new()))
        .build();
    let (conversation, node) = open_conversation(&studio, "a fox");

    let result = studio
        .request_generation(&conversation, &node, &AccessRequest::anonymous(), GenerationRequest::image("a fox"), None)
        .await;

    assert!(matches!(result, Err(StudioError::Job(JobError::Unauthorized(_)))));
    assert!(studio.tracker().is_empty());
}

#[tokio::test(start_paused = true)]
async fn watcher_gives_up_but_job_keeps_running() {
    let studio = Studio::builder(dispatcher_with("runway-gen2", Arc::new(MockAdapter::pending("slow"))))
        .with_config(
            StudioConfig::default()
                .with_poll_interval(Duration::from_secs(2))
                .with_watch_timeout(Duration::from_secs(10)),
        )
        .build();
    let (conversation, node) = open_conversation(&studio, "a comet");

    let generation = studio
        .request_generation(&conversation, &node, &AccessRequest::anonymous(), GenerationRequest::video("a comet"), None)
        .await
        .unwrap();
    let job_id = generation.job_id().clone();

    let result = generation.finished().await;
    assert!(matches!(result, Err(StudioError::WatchTimeout { job_id: id, .. }) if id == job_id));
    assert_eq!(studio.tracker().get(&job_id).unwrap().status(), JobStatus::Processing);
}

#[tokio::test]
async fn restore_brings_back_conversations_and_jobs() {
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let dispatcher = dispatcher_with("sdxl-turbo", Arc::new(MockAdapter::immediate(image_result())));

    let first = Studio::builder(Arc::clone(&dispatcher)).with_store(Arc::clone(&store)).build();
    let (conversation, node) = open_conversation(&first, "a fox");
    let job_id = first
        .request_generation(&conversation, &node, &AccessRequest::anonymous(), GenerationRequest::image("a fox"), Some("sdxl-turbo"))
        .await
        .unwrap()
        .finished()
        .await
        .unwrap()
        .job
        .id()
        .clone();

    let second = Studio::builder(dispatcher).with_store(store).build();
    let restored = second.restore().unwrap();

    assert_eq!(restored.conversations, 1);
    assert_eq!(restored.jobs, 1);
    assert_eq!(second.tracker().get(&job_id).unwrap().status(), JobStatus::Completed);
    let context = second.context_for(&conversation).unwrap();
    assert_eq!(context[0].images, ["https://cdn.example/fox-1.png", "https://cdn.example/fox-2.png"]);
}
