//! Selection and invocation through the [`Dispatcher`].

use atelier_models::testing::MockAdapter;
use atelier_models::{
    DispatchError, Dispatcher, GenerationRequest, GenerationResult, Invocation, ModelDefinition,
    ModelKind, ModelProvider, ModelRegistry, PendingHandle, RequestType, StatusUpdate,
    default_catalog,
};
use std::sync::Arc;

fn registry() -> Arc<ModelRegistry> {
    Arc::new(ModelRegistry::seeded(default_catalog()).unwrap())
}

fn speech_result() -> GenerationResult {
    GenerationResult::AudioTts {
        audio_url: "https://cdn.example/speech.mp3".into(),
    }
}

#[test]
fn explicit_model_routes_to_its_backend() {
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher.register_adapter("elevenlabs", Arc::new(MockAdapter::immediate(speech_result())));

    let selection = dispatcher
        .select(RequestType::AudioTts, Some("eleven-rachel"))
        .unwrap();

    assert_eq!(selection.model().id, "eleven-rachel");
    assert_eq!(selection.backend(), "elevenlabs");
}

#[test]
fn unknown_model_is_rejected() {
    let dispatcher = Dispatcher::new(registry());
    let err = dispatcher
        .select(RequestType::ImageGen, Some("does-not-exist"))
        .unwrap_err();
    assert!(matches!(err, DispatchError::ModelNotFound(id) if id == "does-not-exist"));
}

#[test]
fn disabled_model_is_rejected() {
    let registry = registry();
    registry.set_enabled("sdxl-turbo", false).unwrap();

    let mut dispatcher = Dispatcher::new(registry);
    dispatcher.register_adapter("sdxl-turbo", Arc::new(MockAdapter::pending("t")));

    let err = dispatcher
        .select(RequestType::ImageGen, Some("sdxl-turbo"))
        .unwrap_err();
    assert!(matches!(err, DispatchError::ModelDisabled(id) if id == "sdxl-turbo"));
}

#[test]
fn model_without_adapter_is_rejected() {
    let dispatcher = Dispatcher::new(registry());
    let err = dispatcher
        .select(RequestType::ImageGen, Some("dalle-3"))
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::AdapterNotRegistered { model, backend } if model == "dalle-3" && backend == "dalle-3"
    ));
}

#[test]
fn capability_routing_skips_models_without_adapters() {
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher.register_adapter("midjourney-v6", Arc::new(MockAdapter::pending("t")));

    let selection = dispatcher.select(RequestType::ImageGen, None).unwrap();
    assert_eq!(selection.model().id, "midjourney-v6");
}

#[test]
fn capability_routing_ignores_model_kind() {
    let registry = Arc::new(ModelRegistry::new());
    registry.upsert(
        ModelDefinition::new("chatty-voice", "Chatty", ModelKind::Text, ModelProvider::Custom)
            .with_capability("TTS"),
    );
    let mut dispatcher = Dispatcher::new(registry);
    dispatcher.register_adapter("chatty-voice", Arc::new(MockAdapter::immediate(speech_result())));

    let selection = dispatcher.select(RequestType::AudioTts, None).unwrap();
    assert_eq!(selection.model().id, "chatty-voice");
    assert_eq!(selection.request_type(), RequestType::AudioTts);
}

#[test]
fn resume_ignores_the_enabled_flag() {
    let registry = registry();
    registry.set_enabled("runway-gen2", false).unwrap();
    let mut dispatcher = Dispatcher::new(registry);
    dispatcher.register_adapter("runway-gen2", Arc::new(MockAdapter::pending("t")));

    let selection = dispatcher
        .resume("runway-gen2", "runway-gen2", RequestType::VideoGen)
        .unwrap();
    assert_eq!(selection.model().id, "runway-gen2");
    assert!(!selection.model().enabled);
    assert_eq!(selection.backend(), "runway-gen2");
}

#[test]
fn resume_stands_in_for_a_dropped_model() {
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher.register_adapter("worker", Arc::new(MockAdapter::pending("t")));

    let selection = dispatcher
        .resume("worker", "retired-model", RequestType::Depth)
        .unwrap();
    assert_eq!(selection.model().id, "retired-model");
    assert_eq!(selection.model().kind, ModelKind::Image);
    assert_eq!(selection.backend(), "worker");

    let err = dispatcher
        .resume("gone", "retired-model", RequestType::Depth)
        .unwrap_err();
    assert!(matches!(err, DispatchError::AdapterNotRegistered { backend, .. } if backend == "gone"));
}

#[test]
#[should_panic(expected = "already registered")]
fn duplicate_adapter_registration_panics() {
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher.register_adapter("w", Arc::new(MockAdapter::pending("a")));
    dispatcher.register_adapter("w", Arc::new(MockAdapter::pending("b")));
}

#[tokio::test]
async fn invoke_returns_immediate_result() {
    let adapter = Arc::new(MockAdapter::immediate(speech_result()));
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher.register_adapter("bark-s4", Arc::clone(&adapter));

    let request = GenerationRequest::speech("hello there");
    let selection = dispatcher
        .select(request.request_type(), Some("bark-s4"))
        .unwrap();
    let invocation = dispatcher.invoke(&selection, &request).await.unwrap();

    assert_eq!(invocation, Invocation::Immediate(speech_result()));
    assert_eq!(adapter.invocations(), 1);
}

#[tokio::test]
async fn mismatched_result_type_is_a_provider_error() {
    let image = GenerationResult::ImageGen {
        image_urls: vec!["a.png".into()],
    };
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher.register_adapter("bark-s4", Arc::new(MockAdapter::immediate(image)));

    let request = GenerationRequest::speech("hello");
    let selection = dispatcher
        .select(request.request_type(), Some("bark-s4"))
        .unwrap();
    let err = dispatcher.invoke(&selection, &request).await.unwrap_err();

    assert!(matches!(err, DispatchError::Provider { backend, .. } if backend == "bark-s4"));
}

#[tokio::test]
async fn adapter_failure_carries_backend_name() {
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher.register_adapter("runway-gen2", Arc::new(MockAdapter::failing("quota exceeded")));

    let request = GenerationRequest::video("a lighthouse at dusk");
    let selection = dispatcher.select(request.request_type(), None).unwrap();
    let err = dispatcher.invoke(&selection, &request).await.unwrap_err();

    match err {
        DispatchError::Provider { backend, message } => {
            assert_eq!(backend, "runway-gen2");
            assert!(message.contains("quota exceeded"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn poll_and_cancel_forward_to_adapter() {
    let video = GenerationResult::VideoGen {
        video_url: "clip.mp4".into(),
        thumbnail_url: None,
    };
    let adapter = Arc::new(
        MockAdapter::pending("remote-1")
            .with_updates([StatusUpdate::Processing { progress: Some(10) }, StatusUpdate::Completed(video.clone())])
            .without_cancel(),
    );
    let mut dispatcher = Dispatcher::new(registry());
    dispatcher.register_adapter("runway-gen2", Arc::clone(&adapter));

    let selection = dispatcher
        .select(RequestType::VideoGen, Some("runway-gen2"))
        .unwrap();
    let handle = PendingHandle::new("remote-1");

    assert_eq!(
        dispatcher.poll(&selection, &handle).await.unwrap(),
        StatusUpdate::Processing { progress: Some(10) }
    );
    assert_eq!(
        dispatcher.poll(&selection, &handle).await.unwrap(),
        StatusUpdate::Completed(video)
    );

    let err = dispatcher.cancel(&selection, &handle).await.unwrap_err();
    assert!(matches!(err, DispatchError::Unsupported { operation: "cancel", .. }));
    assert_eq!(adapter.polls(), 2);
}
