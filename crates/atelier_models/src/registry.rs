//! Model registry.

use crate::catalog::Catalog;
use crate::error::RegistryError;
use crate::model::{ModelDefinition, ModelKind};
use atelier_core::{Clock, Timestamp};
use indexmap::IndexMap;
use indexmap::map::Entry;
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;

/// Registry of the models available for generation.
///
/// # For Consumers
///
/// Look models up by id with [`get`](Self::get), or route by capability with
/// [`list_by_capability`](Self::list_by_capability). Results are owned clones;
/// callers never hold a lock.
///
/// # Concurrency
///
/// The catalog is an [`Arc<Catalog>`] behind a read-write lock. Readers clone
/// the `Arc` and work on that snapshot. Writers build a fresh catalog and swap
/// the pointer, serialized by a separate writer lock so concurrent upserts
/// never lose updates. A reader therefore sees either the catalog before a
/// [`refresh`](Self::refresh) or the catalog after it, never a mix.
///
/// ```
/// use atelier_models::{ModelDefinition, ModelKind, ModelProvider, ModelRegistry};
///
/// let registry = ModelRegistry::new();
/// registry.upsert(
///     ModelDefinition::new("bark-s4", "Bark", ModelKind::Audio, ModelProvider::Local)
///         .with_capability("TTS"),
/// );
///
/// let voices = registry.list_by_capability("tts", Some(ModelKind::Audio));
/// assert_eq!(voices.len(), 1);
/// ```
pub struct ModelRegistry {
    catalog: RwLock<Arc<Catalog>>,
    // Serializes writers; readers only take `catalog`.
    writer: Mutex<()>,
    clock: Clock,
}

impl core::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let catalog = self.snapshot();
        f.debug_struct("ModelRegistry")
            .field("models", &catalog.iter().map(|m| &m.id).collect::<Vec<_>>())
            .field("updated_at", &catalog.updated_at())
            .finish()
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ModelRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Clock::default())
    }

    /// Creates an empty registry that timestamps writes with `clock`.
    #[must_use]
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            catalog: RwLock::new(Arc::new(Catalog::default())),
            writer: Mutex::new(()),
            clock,
        }
    }

    /// Creates a registry seeded with the given models.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidState`] if two models share an id.
    pub fn seeded(models: Vec<ModelDefinition>) -> Result<Self, RegistryError> {
        let registry = Self::new();
        registry.refresh(models)?;
        Ok(registry)
    }

    /// Returns the current catalog snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Catalog> {
        Arc::clone(&self.catalog.read())
    }

    /// Applies `f` to a private copy of the catalog and publishes the result.
    fn write<R>(&self, f: impl FnOnce(&mut Catalog) -> Result<R, RegistryError>) -> Result<R, RegistryError> {
        let _writer = self.writer.lock();
        let mut next = Catalog::clone(&self.snapshot());
        let out = f(&mut next)?;
        next.touch(self.clock.now());
        *self.catalog.write() = Arc::new(next);
        Ok(out)
    }

    /// Inserts or replaces a model by id.
    ///
    /// Returns `true` if an existing definition was replaced. Upserting the
    /// same definition twice leaves the registry unchanged.
    pub fn upsert(&self, model: ModelDefinition) -> bool {
        let model = model.normalized();
        tracing::debug!(model = %model.id, backend = model.backend(), "upserting model");
        self.write(|catalog| Ok(catalog.models_mut().insert(model.id.clone(), model).is_some()))
            .unwrap_or(false)
    }

    /// Returns a model by id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no model has this id.
    pub fn get(&self, model_id: &str) -> Result<ModelDefinition, RegistryError> {
        self.snapshot()
            .get(model_id)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(model_id.to_string()))
    }

    /// Returns `true` if a model with this id is registered.
    #[must_use]
    pub fn contains(&self, model_id: &str) -> bool {
        self.snapshot().get(model_id).is_some()
    }

    /// Lists enabled models declaring `capability`, optionally of one kind.
    ///
    /// The capability is matched case-insensitively. Order follows catalog
    /// insertion but callers should not depend on it.
    #[must_use]
    pub fn list_by_capability(&self, capability: &str, kind: Option<ModelKind>) -> Vec<ModelDefinition> {
        self.snapshot()
            .by_capability(capability, kind)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Lists enabled models of one kind.
    #[must_use]
    pub fn list_by_kind(&self, kind: ModelKind) -> Vec<ModelDefinition> {
        self.snapshot().by_kind(kind).into_iter().cloned().collect()
    }

    /// Lists every model, enabled or not.
    #[must_use]
    pub fn list(&self) -> Vec<ModelDefinition> {
        self.snapshot().iter().cloned().collect()
    }

    /// Sets a model's enabled flag.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no model has this id.
    pub fn set_enabled(&self, model_id: &str, enabled: bool) -> Result<(), RegistryError> {
        self.write(|catalog| {
            let model = catalog
                .models_mut()
                .get_mut(model_id)
                .ok_or_else(|| RegistryError::NotFound(model_id.to_string()))?;
            model.enabled = enabled;
            Ok(())
        })?;
        tracing::info!(model = model_id, enabled, "model availability changed");
        Ok(())
    }

    /// Flips a model's enabled flag, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NotFound`] if no model has this id.
    pub fn toggle(&self, model_id: &str) -> Result<bool, RegistryError> {
        self.write(|catalog| {
            let model = catalog
                .models_mut()
                .get_mut(model_id)
                .ok_or_else(|| RegistryError::NotFound(model_id.to_string()))?;
            model.enabled = !model.enabled;
            Ok(model.enabled)
        })
    }

    /// Replaces the whole catalog.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidState`] if the snapshot contains
    /// duplicate ids. The existing catalog is left untouched.
    pub fn refresh(&self, models: Vec<ModelDefinition>) -> Result<(), RegistryError> {
        let mut next = IndexMap::with_capacity(models.len());
        for model in models {
            match next.entry(model.id.clone()) {
                Entry::Occupied(entry) => {
                    tracing::warn!(model = %entry.key(), "rejecting catalog with duplicate id");
                    return Err(RegistryError::InvalidState(format!(
                        "duplicate model id '{}' in snapshot",
                        entry.key()
                    )));
                }
                Entry::Vacant(entry) => {
                    entry.insert(model.normalized());
                }
            }
        }

        let count = next.len();
        let _writer = self.writer.lock();
        *self.catalog.write() = Arc::new(Catalog::with_models(next, self.clock.now()));
        tracing::info!(models = count, "model catalog refreshed");
        Ok(())
    }

    /// Returns when the catalog was last written.
    #[must_use]
    pub fn last_updated(&self) -> Option<Timestamp> {
        self.snapshot().updated_at()
    }

    /// Returns the number of models, enabled or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Returns `true` if no models are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }
}
