use crate::error::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Traffic-light health tier returned by the analysis service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HealthCategory {
    Red,
    #[default]
    Yellow,
    Green,
}

impl HealthCategory {
    /// Parse a category leniently. Anything unrecognized is treated as the
    /// middle tier, including the `*_RISK` suffixed tiers some servers emit.
    pub fn parse_lenient(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase();
        match normalized.trim_end_matches("_RISK") {
            "RED" | "HIGH" => HealthCategory::Red,
            "GREEN" | "LOW" => HealthCategory::Green,
            _ => HealthCategory::Yellow,
        }
    }

    /// Digit shown when the server did not send a numeric score
    pub fn default_digit(&self) -> u8 {
        match self {
            HealthCategory::Red => 2,
            HealthCategory::Yellow => 5,
            HealthCategory::Green => 9,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            HealthCategory::Red => "HARMFUL",
            HealthCategory::Yellow => "MODERATE",
            HealthCategory::Green => "HEALTHY",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            HealthCategory::Red => "🚨",
            HealthCategory::Yellow => "⚠️",
            HealthCategory::Green => "✅",
        }
    }

    /// Whether this is the healthiest tier
    pub fn is_healthiest(&self) -> bool {
        matches!(self, HealthCategory::Green)
    }
}

impl fmt::Display for HealthCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HealthCategory::Red => "RED",
            HealthCategory::Yellow => "YELLOW",
            HealthCategory::Green => "GREEN",
        };
        write!(f, "{}", name)
    }
}

impl<'de> Deserialize<'de> for HealthCategory {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(HealthCategory::parse_lenient).unwrap_or_default())
    }
}

/// Risk level attached to a detected additive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Red,
    Orange,
    Yellow,
    Green,
    #[serde(other)]
    Unknown,
}

impl Default for RiskLevel {
    fn default() -> Self {
        RiskLevel::Unknown
    }
}

/// Where a still image came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImageSource {
    DeviceCapture,
    FileUpload,
}

/// An encoded still image. Cloning shares the underlying buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBlob {
    data: Bytes,
    mime: String,
    source: ImageSource,
}

impl ImageBlob {
    pub fn new(data: impl Into<Bytes>, mime: impl Into<String>, source: ImageSource) -> Result<Self> {
        let data = data.into();
        let mime = mime.into();
        if data.is_empty() {
            return Err(Error::InvalidImage("image data is empty".to_string()));
        }
        if !mime.starts_with("image/") {
            return Err(Error::InvalidImage(format!("unsupported mime type {}", mime)));
        }
        Ok(Self { data, mime, source })
    }

    pub fn data(&self) -> &Bytes {
        &self.data
    }

    pub fn mime(&self) -> &str {
        &self.mime
    }

    pub fn source(&self) -> ImageSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// `data:<mime>;base64,<payload>` form used by the analyze endpoint
    pub fn to_data_uri(&self) -> String {
        format!("data:{};base64,{}", self.mime, STANDARD.encode(&self.data))
    }
}
