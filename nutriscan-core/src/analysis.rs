//! Analysis result returned by `POST /analyze`
//!
//! Decoding is lenient: a response missing fields still yields a usable
//! result (middle tier, placeholder name, empty collections) instead of an
//! error, since the reveal and results views must always have something to
//! show once the server answered.

use crate::error::Result;
use crate::types::{HealthCategory, RiskLevel};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

pub const UNKNOWN_PRODUCT: &str = "Unknown product";

/// Highest score the display can show
pub const MAX_SCORE: u8 = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Additive {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub risk_level: RiskLevel,
    #[serde(default, deserialize_with = "null_as_default")]
    pub reason: String,
}

/// Per-feature contributions explaining the score. Entries whose value is
/// not a number are dropped.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Explanation {
    #[serde(default, deserialize_with = "numeric_entries")]
    pub shap_impacts: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default = "unknown_product", deserialize_with = "product_name_or_placeholder")]
    pub product_name: String,
    #[serde(default)]
    pub health_score: HealthCategory,
    #[serde(default, deserialize_with = "lenient_score")]
    pub score_value: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub nutrition: BTreeMap<String, serde_json::Value>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub additives: Vec<Additive>,
    #[serde(default)]
    pub xai: Option<Explanation>,
    #[serde(default)]
    pub healthy_alternative: Option<String>,
}

impl AnalysisResult {
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Digit the reveal settles on. An explicit score always wins over the
    /// category default.
    pub fn display_digit(&self) -> u8 {
        score_digit(self.health_score, self.score_value)
    }

    /// Additives whose risk level is the worst tier
    pub fn high_risk_additives(&self) -> impl Iterator<Item = &Additive> {
        self.additives.iter().filter(|a| a.risk_level == RiskLevel::Red)
    }
}

/// Map a category and an optional explicit score to the displayed digit
pub fn score_digit(category: HealthCategory, explicit: Option<f64>) -> u8 {
    match explicit {
        Some(score) if score.is_finite() => score.round().clamp(0.0, MAX_SCORE as f64) as u8,
        _ => category.default_digit(),
    }
}

fn unknown_product() -> String {
    UNKNOWN_PRODUCT.to_string()
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn numeric_entries<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<BTreeMap<String, f64>, D::Error> {
    let raw = Option::<BTreeMap<String, serde_json::Value>>::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(feature, value)| value.as_f64().map(|impact| (feature, impact)))
        .collect())
}

fn product_name_or_placeholder<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    let name = Option::<String>::deserialize(deserializer)?;
    Ok(match name {
        Some(n) if !n.trim().is_empty() => n,
        _ => unknown_product(),
    })
}

fn lenient_score<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<f64>, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}
