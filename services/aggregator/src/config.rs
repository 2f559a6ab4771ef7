use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub service_a_url: String,
    pub fortunes_path: String,
    pub downstream_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port = lookup("PORT")
            .unwrap_or_else(|| "8080".to_string())
            .parse()
            .context("PORT must be a valid port number")?;

        let service_a_url = lookup("SERVICE_A_URL")
            .unwrap_or_else(|| "http://service-a.canary-playground.svc.cluster.local".to_string());
        Url::parse(&service_a_url)
            .with_context(|| format!("SERVICE_A_URL is not a valid URL: {}", service_a_url))?;

        let fortunes_path = lookup("SERVICE_A_FORTUNES_PATH").unwrap_or_else(|| "/fortunes".to_string());

        let timeout_ms: u64 = lookup("SERVICE_A_TIMEOUT_MS")
            .unwrap_or_else(|| "1500".to_string())
            .parse()
            .context("SERVICE_A_TIMEOUT_MS must be a number of milliseconds")?;
        if timeout_ms == 0 {
            return Err(anyhow!("SERVICE_A_TIMEOUT_MS must be greater than zero"));
        }

        Ok(Self {
            port,
            service_a_url,
            fortunes_path,
            downstream_timeout: Duration::from_millis(timeout_ms),
        })
    }
}
