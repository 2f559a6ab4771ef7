use std::fmt;

use traffic_model::ConfigurationError;
use url::Url;

/// A fully resolved URL a task sends its GET to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub url: Url,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.url)
    }
}

/// The host every virtual user talks to, bound once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    base: Url,
}

impl Target {
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    /// Appends `path` to the base URL, keeping any path prefix the base has.
    pub fn endpoint(&self, path: &str) -> Result<Endpoint, ConfigurationError> {
        let base = self.base.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let raw = format!("{}/{}", base, path);
        let url = Url::parse(&raw).map_err(|e| ConfigurationError::invalid_setting("endpoint", &raw, e))?;
        Ok(Endpoint { url })
    }
}
