//! Discovery client configuration.
//!
//! Values come from an optional JSON file shaped
//! `{"discovery": {"url": ..., "interval": <ms>, "token": ...}}`, then from the
//! environment, which wins over the file.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ApiError, Result};

pub const URL_ENV: &str = "STRAP_DISCOVERY_URL";
pub const TOKEN_ENV: &str = "STRAP_TOKEN";
pub const INTERVAL_ENV: &str = "STRAP_DISCOVERY_INTERVAL_MS";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientConfig {
    /// Discovery endpoint; relative descriptor URIs resolve against it.
    pub url: String,
    pub token: Option<String>,
    /// Re-run discovery this often once started. `None` runs it once.
    pub interval: Option<Duration>,
}

#[derive(Deserialize)]
struct ConfigFile {
    discovery: DiscoverySection,
}

#[derive(Deserialize)]
struct DiscoverySection {
    url: String,
    #[serde(default)]
    interval: Option<u64>,
    #[serde(default)]
    token: Option<String>,
}

impl ClientConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = Some(interval);
        self
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let file: ConfigFile =
            serde_json::from_str(raw).map_err(|e| ApiError::Config(format!("invalid config: {e}")))?;
        let section = file.discovery;
        Ok(Self {
            url: section.url,
            token: section.token.filter(|t| !t.is_empty()),
            interval: millis(section.interval),
        })
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ApiError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json_str(&raw)
    }

    /// Overlay `STRAP_DISCOVERY_URL`, `STRAP_TOKEN` and
    /// `STRAP_DISCOVERY_INTERVAL_MS`.
    pub fn apply_env(self) -> Result<Self> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// File (if any) first, environment on top. The result must name a URL.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let base = match path {
            Some(p) => Self::from_json_file(p)?,
            None => Self::default(),
        };
        let config = base.apply_env()?;
        if config.url.is_empty() {
            return Err(ApiError::Config(format!("no discovery URL configured (set {URL_ENV})")));
        }
        Ok(config)
    }

    fn apply_vars(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = lookup(URL_ENV).filter(|v| !v.is_empty()) {
            self.url = url;
        }
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.token = Some(token);
        }
        if let Some(raw) = lookup(INTERVAL_ENV) {
            let ms = raw
                .trim()
                .parse::<u64>()
                .map_err(|e| ApiError::Config(format!("{INTERVAL_ENV}={raw}: {e}")))?;
            self.interval = millis(Some(ms));
        }
        Ok(self)
    }
}

/// Zero disables the periodic refresh.
fn millis(ms: Option<u64>) -> Option<Duration> {
    ms.filter(|&ms| ms > 0).map(Duration::from_millis)
}
