//! Model definitions held by the registry.

use serde::{Deserialize, Serialize};

/// The kind of media a model produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Still images, icons, depth maps and other raster output.
    Image,
    /// Video clips.
    Video,
    /// Speech, stems and mastered audio.
    Audio,
    /// Text generation.
    Text,
}

/// Where a model runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    /// A worker on the local machine or network.
    Local,
    /// A hosted third-party API.
    Cloud,
    /// A user-supplied backend.
    Custom,
}

/// Normalizes a capability key for storage and lookup.
#[must_use]
pub fn normalize_capability(capability: &str) -> String {
    capability.trim().to_lowercase()
}

/// A single entry in the model catalog.
///
/// Capabilities are stored lowercase. Definitions that arrive through
/// deserialization are normalized by the registry before they are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelDefinition {
    /// Unique identifier (e.g., `"sdxl-turbo"`).
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Media kind produced.
    #[serde(rename = "type")]
    pub kind: ModelKind,
    /// Where the model runs.
    pub provider: ModelProvider,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Optional version string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    /// Ordered capability keys used for routing.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Free-form UI tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Whether the model may be selected.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Name of the adapter serving this model. Defaults to the model id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl ModelDefinition {
    /// Creates an enabled definition with no capabilities.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: ModelKind,
        provider: ModelProvider,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            provider,
            description: None,
            version: None,
            capabilities: Vec::new(),
            tags: Vec::new(),
            enabled: true,
            backend: None,
        }
    }

    /// Adds a capability key (normalized to lowercase).
    #[must_use]
    pub fn with_capability(mut self, capability: &str) -> Self {
        let capability = normalize_capability(capability);
        if !self.capabilities.contains(&capability) {
            self.capabilities.push(capability);
        }
        self
    }

    /// Adds a UI tag.
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the version.
    #[must_use]
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// Sets the backend that serves this model.
    #[must_use]
    pub fn with_backend(mut self, backend: impl Into<String>) -> Self {
        self.backend = Some(backend.into());
        self
    }

    /// Sets the enabled flag.
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Returns the backend name, falling back to the model id.
    #[must_use]
    pub fn backend(&self) -> &str {
        self.backend.as_deref().unwrap_or(&self.id)
    }

    /// Returns `true` if the model declares the capability (case-insensitive).
    #[must_use]
    pub fn has_capability(&self, capability: &str) -> bool {
        let capability = normalize_capability(capability);
        self.capabilities.iter().any(|c| *c == capability)
    }

    /// Returns the definition with capabilities lowercased and deduplicated.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        let mut seen = Vec::with_capacity(self.capabilities.len());
        for capability in self.capabilities.drain(..) {
            let capability = normalize_capability(&capability);
            if !seen.contains(&capability) {
                seen.push(capability);
            }
        }
        self.capabilities = seen;
        self
    }
}
