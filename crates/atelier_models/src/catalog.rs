//! Immutable catalog snapshots and the seeded default catalog.

use crate::model::{ModelDefinition, ModelKind, ModelProvider, normalize_capability};
use atelier_core::Timestamp;
use indexmap::IndexMap;

/// An immutable set of model definitions keyed by id.
///
/// Iteration follows insertion order. The registry never mutates a catalog
/// that readers can see; it builds a new one and swaps it in.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    models: IndexMap<String, ModelDefinition>,
    updated_at: Option<Timestamp>,
}

impl Catalog {
    pub(crate) fn with_models(
        models: IndexMap<String, ModelDefinition>,
        updated_at: Timestamp,
    ) -> Self {
        Self {
            models,
            updated_at: Some(updated_at),
        }
    }

    pub(crate) fn models_mut(&mut self) -> &mut IndexMap<String, ModelDefinition> {
        &mut self.models
    }

    pub(crate) fn touch(&mut self, at: Timestamp) {
        self.updated_at = Some(at);
    }

    /// Returns a definition by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&ModelDefinition> {
        self.models.get(id)
    }

    /// Iterates over every definition, enabled or not.
    pub fn iter(&self) -> impl Iterator<Item = &ModelDefinition> {
        self.models.values()
    }

    /// Returns the number of definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    /// Returns `true` if the catalog is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Returns when this catalog was last written, if ever.
    #[must_use]
    pub fn updated_at(&self) -> Option<Timestamp> {
        self.updated_at
    }

    /// Enabled definitions declaring `capability`, optionally of one kind.
    #[must_use]
    pub fn by_capability(&self, capability: &str, kind: Option<ModelKind>) -> Vec<&ModelDefinition> {
        let capability = normalize_capability(capability);
        self.models
            .values()
            .filter(|m| m.enabled)
            .filter(|m| kind.is_none_or(|k| m.kind == k))
            .filter(|m| m.capabilities.contains(&capability))
            .collect()
    }

    /// Enabled definitions of one kind.
    #[must_use]
    pub fn by_kind(&self, kind: ModelKind) -> Vec<&ModelDefinition> {
        self.models
            .values()
            .filter(|m| m.enabled && m.kind == kind)
            .collect()
    }
}

/// The catalog Atelier ships with before the first remote refresh.
#[must_use]
pub fn default_catalog() -> Vec<ModelDefinition> {
    use ModelKind::{Audio, Image, Video};
    use ModelProvider::{Cloud, Local};

    vec![
        ModelDefinition::new("sdxl-turbo", "SDXL Turbo", Image, Local)
            .with_description("Fast single-step image generation")
            .with_version("1.0")
            .with_capability("txt2img")
            .with_capability("img2img")
            .with_tag("fast")
            .with_tag("local"),
        ModelDefinition::new("dalle-3", "DALL-E 3", Image, Cloud)
            .with_description("Prompt-faithful image generation")
            .with_capability("txt2img")
            .with_tag("quality"),
        ModelDefinition::new("midjourney-v6", "Midjourney v6", Image, Cloud)
            .with_description("Stylized artistic image generation")
            .with_version("6.0")
            .with_capability("txt2img")
            .with_tag("artistic"),
        ModelDefinition::new("eleven-adam", "ElevenLabs Adam", Audio, Cloud)
            .with_description("Deep narrative male voice")
            .with_capability("tts")
            .with_tag("voice")
            .with_backend("elevenlabs"),
        ModelDefinition::new("eleven-rachel", "ElevenLabs Rachel", Audio, Cloud)
            .with_description("Calm conversational female voice")
            .with_capability("tts")
            .with_tag("voice")
            .with_backend("elevenlabs"),
        ModelDefinition::new("coqui-xtts", "Coqui XTTS v2", Audio, Local)
            .with_description("Multilingual voice cloning")
            .with_version("2.0")
            .with_capability("tts")
            .with_capability("voice-cloning")
            .with_tag("local"),
        ModelDefinition::new("bark-s4", "Bark", Audio, Local)
            .with_description("Expressive speech with non-verbal sounds")
            .with_capability("tts")
            .with_tag("local"),
        ModelDefinition::new("svd-xt", "Stable Video Diffusion XT", Video, Local)
            .with_description("Image-to-video animation")
            .with_version("1.1")
            .with_capability("img2vid")
            .with_tag("local"),
        ModelDefinition::new("runway-gen2", "Runway Gen-2", Video, Cloud)
            .with_description("Text and image to video")
            .with_capability("txt2vid")
            .with_capability("img2vid")
            .with_tag("quality"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_catalog_ids_are_unique() {
        let models = default_catalog();
        let mut ids: Vec<_> = models.iter().map(|m| m.id.as_str()).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), models.len());
    }

    #[test]
    fn by_capability_skips_disabled_and_other_kinds() {
        let mut models = IndexMap::new();
        for model in default_catalog() {
            models.insert(model.id.clone(), model);
        }
        if let Some(model) = models.get_mut("dalle-3") {
            model.enabled = false;
        }
        let catalog = Catalog::with_models(models, atelier_core::Clock::system().now());

        let ids: Vec<_> = catalog
            .by_capability("TXT2IMG", Some(ModelKind::Image))
            .into_iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(ids, vec!["sdxl-turbo", "midjourney-v6"]);

        assert!(catalog.by_capability("img2vid", Some(ModelKind::Image)).is_empty());
        assert_eq!(catalog.by_capability("img2vid", None).len(), 2);
    }
}
