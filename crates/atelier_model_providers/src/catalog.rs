//! Catalog feed served over HTTP.

use async_trait::async_trait;
use atelier_models::ModelDefinition;
use atelier_sync::{CatalogSource, SyncError};
use serde::Deserialize;

/// Body of the catalog endpoint.
#[derive(Debug, Deserialize)]
struct CatalogResponse {
    models: Vec<ModelDefinition>,
}

/// A [`CatalogSource`] that reads `{ "models": [...] }` from a URL.
///
/// Any transport error, non-success status or malformed body fails the
/// fetch, so the scheduler keeps the current catalog.
#[derive(Debug, Clone)]
pub struct HttpCatalogSource {
    client: reqwest::Client,
    name: String,
    url: String,
}

impl HttpCatalogSource {
    /// Creates a source named `name` reading from `url`.
    #[must_use]
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            name: name.into(),
            url: url.into(),
        }
    }

    /// Returns the endpoint URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    fn parse(&self, body: &str) -> Result<Vec<ModelDefinition>, SyncError> {
        serde_json::from_str::<CatalogResponse>(body)
            .map(|response| response.models)
            .map_err(|err| SyncError::fetch(&self.name, format!("Failed to parse catalog: {err}")))
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<Vec<ModelDefinition>, SyncError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| SyncError::fetch(&self.name, err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::fetch(&self.name, format!("HTTP {status}")));
        }

        let body = response
            .text()
            .await
            .map_err(|err| SyncError::fetch(&self.name, err.to_string()))?;
        let models = self.parse(&body)?;
        tracing::debug!(source = %self.name, url = %self.url, models = models.len(), "fetched remote catalog");
        Ok(models)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use atelier_models::{ModelKind, ModelProvider};

    #[test]
    fn parses_models_envelope() {
        let source = HttpCatalogSource::new("remote", "http://catalog/models");
        let models = source
            .parse(
                r#"{ "models": [
                    { "id": "flux-dev", "name": "FLUX dev", "type": "image", "provider": "local",
                      "capabilities": ["txt2img"], "enabled": true }
                ] }"#,
            )
            .unwrap();

        assert_eq!(models.len(), 1);
        assert_eq!(models[0].id, "flux-dev");
        assert_eq!(models[0].kind, ModelKind::Image);
        assert_eq!(models[0].provider, ModelProvider::Local);
    }

    #[test]
    fn malformed_body_names_the_source() {
        let source = HttpCatalogSource::new("remote", "http://catalog/models");
        let err = source.parse(r#"{ "items": [] }"#).unwrap_err();
        assert!(err.to_string().contains("remote"));
    }
}
