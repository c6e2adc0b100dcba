//! Configuration for nutriscan-scanner

use crate::error::ScanError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "NUTRISCAN_API_URL";

/// Scanner configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Base URL of the analysis API, without trailing slash
    pub api_base_url: String,
    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,
    /// Period between live frames handed to the recognition worker
    pub sample_interval_ms: u64,
    /// Edge length of the square RGBA frame sent to the worker
    pub inference_size: u32,
    /// Quiet period before a search query is looked up
    pub search_debounce_ms: u64,
    /// Shortest query that triggers a lookup
    pub min_query_len: usize,
    /// Interval between counting ticks of the reveal
    pub reveal_tick_ms: u64,
    /// Number of counting ticks before the score settles
    pub reveal_counting_ticks: u32,
    /// How long the category label is shown before the reveal completes
    pub reveal_flash_ms: u64,
    /// Lifetime of the healthy-tier celebration effect
    pub celebration_ms: u64,
    /// JPEG quality (1-100) for frames captured from the camera
    pub capture_quality: u8,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8000".to_string(),
            request_timeout_secs: 30,
            sample_interval_ms: 500,
            inference_size: 224,
            search_debounce_ms: 500,
            min_query_len: 3,
            reveal_tick_ms: 60,
            reveal_counting_ticks: 26,
            reveal_flash_ms: 1500,
            celebration_ms: 4500,
            capture_quality: 85,
        }
    }
}

impl ScannerConfig {
    /// `~/.nutriscan/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|mut p| {
            p.push(".nutriscan");
            p.push("config.toml");
            p
        })
    }

    /// Parse a TOML configuration file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ScanError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: ScannerConfig = toml::from_str(&raw)
            .map_err(|e| ScanError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.api_base_url = normalize_base_url(&config.api_base_url);
        debug!("Loaded scanner config from {:?}", path);
        Ok(config)
    }

    /// Defaults, then the given (or default-located) file if it exists, then
    /// the environment override. The result is validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ScanError> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None => match Self::default_path() {
                Some(p) if p.exists() => Self::from_file(&p)?,
                _ => Self::default(),
            },
        };
        config.apply_api_url_override(std::env::var(API_URL_ENV).ok());
        config.validate().map_err(ScanError::Config)?;
        info!("Scanner configured against {}", config.api_base_url);
        Ok(config)
    }

    /// Replace the base URL when an override is present and non-empty
    pub fn apply_api_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.filter(|v| !v.trim().is_empty()) {
            self.api_base_url = normalize_base_url(&url);
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let parsed = url::Url::parse(&self.api_base_url)
            .map_err(|e| format!("Invalid API base URL {}: {}", self.api_base_url, e))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err("API base URL must use http or https".to_string());
        }

        if self.request_timeout_secs == 0 {
            return Err("Request timeout must be non-zero".to_string());
        }

        if self.sample_interval_ms == 0 || self.search_debounce_ms == 0 || self.reveal_tick_ms == 0 {
            return Err("Timer periods must be non-zero".to_string());
        }

        if self.inference_size == 0 || self.inference_size > 4096 {
            return Err("Inference frame size must be between 1 and 4096".to_string());
        }

        if self.min_query_len == 0 {
            return Err("Minimum query length must be at least 1".to_string());
        }

        if self.capture_quality == 0 || self.capture_quality > 100 {
            return Err("Capture quality must be between 1 and 100".to_string());
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn reveal_tick(&self) -> Duration {
        Duration::from_millis(self.reveal_tick_ms)
    }

    pub fn reveal_flash(&self) -> Duration {
        Duration::from_millis(self.reveal_flash_ms)
    }

    pub fn celebration(&self) -> Duration {
        Duration::from_millis(self.celebration_ms)
    }
}

fn normalize_base_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
