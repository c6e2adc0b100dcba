//! Dashboard, search and preference payloads

use crate::error::{Error, Result};
use crate::types::HealthCategory;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Dietary preferences synced with the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub vegan: bool,
    pub no_sugar: bool,
    pub low_sodium: bool,
    pub gluten_free: bool,
}

/// A single toggleable preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Preference {
    Vegan,
    NoSugar,
    LowSodium,
    GlutenFree,
}

impl Preference {
    pub const ALL: [Preference; 4] = [
        Preference::Vegan,
        Preference::NoSugar,
        Preference::LowSodium,
        Preference::GlutenFree,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Preference::Vegan => "vegan",
            Preference::NoSugar => "no-sugar",
            Preference::LowSodium => "low-sodium",
            Preference::GlutenFree => "gluten-free",
        }
    }
}

impl fmt::Display for Preference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Preference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "vegan" => Ok(Preference::Vegan),
            "no-sugar" => Ok(Preference::NoSugar),
            "low-sodium" => Ok(Preference::LowSodium),
            "gluten-free" => Ok(Preference::GlutenFree),
            other => Err(Error::UnknownPreference(other.to_string())),
        }
    }
}

impl Preferences {
    pub fn get(&self, pref: Preference) -> bool {
        match pref {
            Preference::Vegan => self.vegan,
            Preference::NoSugar => self.no_sugar,
            Preference::LowSodium => self.low_sodium,
            Preference::GlutenFree => self.gluten_free,
        }
    }

    pub fn set(&mut self, pref: Preference, value: bool) {
        match pref {
            Preference::Vegan => self.vegan = value,
            Preference::NoSugar => self.no_sugar = value,
            Preference::LowSodium => self.low_sodium = value,
            Preference::GlutenFree => self.gluten_free = value,
        }
    }

    /// Flip one preference and return the new value
    pub fn toggle(&mut self, pref: Preference) -> bool {
        let value = !self.get(pref);
        self.set(pref, value);
        value
    }
}

/// One past scan shown on the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub health_score: HealthCategory,
    #[serde(default)]
    pub score_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdditiveCount {
    pub name: String,
    #[serde(default)]
    pub count: u32,
}

/// Aggregates for the trends view
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Analytics {
    pub avg_score: f64,
    pub history_trend: Vec<f64>,
    pub top_additives: Vec<AdditiveCount>,
}

/// Search suggestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub name: String,
    #[serde(default)]
    pub health_score: Option<HealthCategory>,
}
