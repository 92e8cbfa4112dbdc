//! Worker connection settings.

/// Environment variable holding the worker base URL.
pub const WORKER_URL_ENV: &str = "ATELIER_WORKER_URL";

/// Environment variable holding the optional worker API key.
pub const WORKER_API_KEY_ENV: &str = "ATELIER_WORKER_API_KEY";

/// Base URL used when none is configured.
pub const DEFAULT_WORKER_URL: &str = "http://127.0.0.1:8188";

/// Where the worker lives and how to authenticate with it.
#[derive(Clone)]
pub struct WorkerConfig {
    base_url: String,
    api_key: Option<String>,
}

impl WorkerConfig {
    /// Creates a config for the worker at `base_url`.
    ///
    /// A trailing `/` is ignored.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Reads [`WORKER_URL_ENV`] and [`WORKER_API_KEY_ENV`].
    ///
    /// Falls back to [`DEFAULT_WORKER_URL`] when the URL is unset. Empty
    /// values count as unset.
    #[must_use]
    pub fn from_env() -> Self {
        let read = |name: &str| std::env::var(name).ok().filter(|value| !value.trim().is_empty());

        let config = Self::new(read(WORKER_URL_ENV).unwrap_or_else(|| DEFAULT_WORKER_URL.to_string()));
        match read(WORKER_API_KEY_ENV) {
            Some(key) => config.with_api_key(key),
            None => config,
        }
    }

    /// Sends `key` as a bearer token on every request.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Returns the base URL without a trailing `/`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the API key, if any.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self::new(DEFAULT_WORKER_URL)
    }
}

impl core::fmt::Debug for WorkerConfig {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WorkerConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}
