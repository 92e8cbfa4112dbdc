//! Routing of generation requests to provider adapters.

use crate::adapter::{Credentials, GenerationAdapter, Invocation, PendingHandle, StatusUpdate};
use crate::error::DispatchError;
use crate::model::{ModelDefinition, ModelProvider};
use crate::registry::ModelRegistry;
use crate::request::{GenerationRequest, RequestType};
use std::collections::HashMap;
use std::sync::Arc;

/// A model chosen for a request, together with the adapter that serves it.
#[derive(Clone)]
pub struct Selection {
    model: ModelDefinition,
    request_type: RequestType,
    adapter: Arc<dyn GenerationAdapter>,
}

impl core::fmt::Debug for Selection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Selection")
            .field("model", &self.model.id)
            .field("backend", &self.backend())
            .field("request_type", &self.request_type)
            .finish_non_exhaustive()
    }
}

impl Selection {
    /// The selected model.
    #[must_use]
    pub fn model(&self) -> &ModelDefinition {
        &self.model
    }

    /// The backend serving the model.
    #[must_use]
    pub fn backend(&self) -> &str {
        self.model.backend()
    }

    /// The request type this selection was made for.
    #[must_use]
    pub fn request_type(&self) -> RequestType {
        self.request_type
    }
}

/// Routes requests to adapters through the [`ModelRegistry`].
///
/// Adapters are registered by backend name while the dispatcher is being
/// assembled; afterwards it is shared immutably (typically in an `Arc`).
///
/// ```
/// use atelier_models::{
///     AdapterError, Credentials, Dispatcher, GenerationAdapter, GenerationRequest,
///     GenerationResult, Invocation, ModelDefinition, ModelKind, ModelProvider, ModelRegistry,
/// };
/// use async_trait::async_trait;
/// use std::sync::Arc;
///
/// struct Echo;
///
/// #[async_trait]
/// impl GenerationAdapter for Echo {
///     async fn invoke(
///         &self,
///         _model: &ModelDefinition,
///         _request: &GenerationRequest,
///         _credentials: Option<&Credentials>,
///     ) -> Result<Invocation, AdapterError> {
///         Ok(Invocation::Immediate(GenerationResult::AudioTts {
///             audio_url: "speech.mp3".into(),
///         }))
///     }
/// }
///
/// let registry = Arc::new(ModelRegistry::new());
/// registry.upsert(
///     ModelDefinition::new("bark-s4", "Bark", ModelKind::Audio, ModelProvider::Local)
///         .with_capability("tts"),
/// );
///
/// let mut dispatcher = Dispatcher::new(registry);
/// dispatcher.register_adapter("bark-s4", Arc::new(Echo));
///
/// let selection = dispatcher
///     .select(GenerationRequest::speech("hi").request_type(), None)
///     .unwrap();
/// assert_eq!(selection.model().id, "bark-s4");
/// ```
pub struct Dispatcher {
    registry: Arc<ModelRegistry>,
    adapters: HashMap<String, Arc<dyn GenerationAdapter>>,
    credentials: HashMap<String, Credentials>,
}

impl core::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("backends", &self.backend_names())
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Creates a dispatcher with no adapters.
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            adapters: HashMap::new(),
            credentials: HashMap::new(),
        }
    }

    /// Returns the registry used for selection.
    #[must_use]
    pub fn registry(&self) -> &Arc<ModelRegistry> {
        &self.registry
    }

    /// Registers the adapter for a backend.
    ///
    /// # Panics
    ///
    /// Panics if an adapter is already registered under the same name.
    pub fn register_adapter<A: GenerationAdapter>(&mut self, backend: impl Into<String>, adapter: Arc<A>) {
        let backend = backend.into();
        assert!(
            !self.adapters.contains_key(&backend),
            "adapter for backend '{backend}' is already registered"
        );
        tracing::debug!(backend = %backend, "registered generation adapter");
        self.adapters
            .insert(backend, adapter as Arc<dyn GenerationAdapter>);
    }

    /// Sets credentials passed to a backend's adapter on every call.
    pub fn set_credentials(&mut self, backend: impl Into<String>, credentials: Credentials) {
        self.credentials.insert(backend.into(), credentials);
    }

    /// Checks if an adapter is registered for a backend.
    #[must_use]
    pub fn has_adapter(&self, backend: &str) -> bool {
        self.adapters.contains_key(backend)
    }

    /// Lists registered backend names.
    #[must_use]
    pub fn backend_names(&self) -> Vec<String> {
        self.adapters.keys().cloned().collect()
    }

    /// Picks the model and adapter that will serve a request.
    ///
    /// With a `model_id`, that model is used if it exists, is enabled and its
    /// backend has an adapter. Without one, the first enabled model declaring
    /// the request type's capability whose backend has an adapter is used,
    /// whatever its model kind.
    ///
    /// # Errors
    ///
    /// - [`DispatchError::ModelNotFound`] if `model_id` is unknown
    /// - [`DispatchError::ModelDisabled`] if `model_id` is disabled
    /// - [`DispatchError::AdapterNotRegistered`] if the model's backend has no adapter
    /// - [`DispatchError::NoProviderAvailable`] if no model can serve the request
    pub fn select(&self, request_type: RequestType, model_id: Option<&str>) -> Result<Selection, DispatchError> {
        let capability = request_type.capability();

        let Some(model_id) = model_id else {
            let candidates = self
                .registry
                .list_by_capability(capability, None);
            return candidates
                .into_iter()
                .find_map(|model| {
                    let adapter = self.adapters.get(model.backend())?.clone();
                    Some(Selection {
                        model,
                        request_type,
                        adapter,
                    })
                })
                .ok_or(DispatchError::NoProviderAvailable {
                    request_type,
                    capability,
                });
        };

        let model = self
            .registry
            .get(model_id)
            .map_err(|_| DispatchError::ModelNotFound(model_id.to_string()))?;
        if !model.enabled {
            return Err(DispatchError::ModelDisabled(model.id));
        }
        let adapter = self
            .adapters
            .get(model.backend())
            .cloned()
            .ok_or_else(|| DispatchError::AdapterNotRegistered {
                model: model.id.clone(),
                backend: model.backend().to_string(),
            })?;

        Ok(Selection {
            model,
            request_type,
            adapter,
        })
    }

    /// Rebuilds the selection for work already accepted by `backend`.
    ///
    /// Submission rules do not apply: the model may since have been disabled
    /// or dropped from the catalog. A dropped model is stood in for by a
    /// disabled definition carrying `model_id`, so its pending work can still
    /// be polled and cancelled.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::AdapterNotRegistered`] if `backend` has no adapter.
    pub fn resume(&self, backend: &str, model_id: &str, request_type: RequestType) -> Result<Selection, DispatchError> {
        let adapter = self
            .adapters
            .get(backend)
            .cloned()
            .ok_or_else(|| DispatchError::AdapterNotRegistered {
                model: model_id.to_string(),
                backend: backend.to_string(),
            })?;
        let model = self.registry.get(model_id).unwrap_or_else(|_| {
            tracing::debug!(model = model_id, backend, "resuming work for a model no longer in the catalog");
            ModelDefinition::new(model_id, model_id, request_type.model_kind(), ModelProvider::Custom)
                .with_enabled(false)
        });

        Ok(Selection {
            model: model.with_backend(backend),
            request_type,
            adapter,
        })
    }

    /// Invokes the selected adapter. No retries are attempted.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Provider`] if the adapter fails or returns a
    /// result of the wrong type.
    pub async fn invoke(&self, selection: &Selection, request: &GenerationRequest) -> Result<Invocation, DispatchError> {
        let backend = selection.backend();
        tracing::debug!(model = %selection.model.id, backend, request_type = %request.request_type(), "invoking adapter");

        let invocation = selection
            .adapter
            .invoke(&selection.model, request, self.credentials.get(backend))
            .await
            .map_err(|err| DispatchError::from_adapter(backend, err))?;

        if let Invocation::Immediate(result) = &invocation {
            check_result_type(backend, request.request_type(), result.request_type())?;
        }
        Ok(invocation)
    }

    /// Queries the status of pending work.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Unsupported`] if the adapter cannot poll, or
    /// [`DispatchError::Provider`] if the poll fails.
    pub async fn poll(&self, selection: &Selection, handle: &PendingHandle) -> Result<StatusUpdate, DispatchError> {
        let backend = selection.backend();
        let update = selection
            .adapter
            .poll_status(handle, self.credentials.get(backend))
            .await
            .map_err(|err| DispatchError::from_adapter(backend, err))?;

        if let StatusUpdate::Completed(result) = &update {
            check_result_type(backend, selection.request_type, result.request_type())?;
        }
        Ok(update)
    }

    /// Asks the provider to stop pending work.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Unsupported`] if the adapter cannot cancel, or
    /// [`DispatchError::Provider`] if the call fails.
    pub async fn cancel(&self, selection: &Selection, handle: &PendingHandle) -> Result<(), DispatchError> {
        let backend = selection.backend();
        selection
            .adapter
            .cancel(handle, self.credentials.get(backend))
            .await
            .map_err(|err| DispatchError::from_adapter(backend, err))
    }
}

fn check_result_type(backend: &str, expected: RequestType, actual: RequestType) -> Result<(), DispatchError> {
    if expected == actual {
        Ok(())
    } else {
        Err(DispatchError::Provider {
            backend: backend.to_string(),
            message: format!("returned a {actual} result for a {expected} request"),
        })
    }
}
