//! nutriscan-core: shared data model for the NutriScan label scanner
//!
//! Wire types exchanged with the analysis API and the value types handed
//! between the scan pipeline stages.

pub mod types;
pub mod error;
pub mod analysis;
pub mod catalog;

pub use error::{Error, Result};
pub use types::{HealthCategory, ImageBlob, ImageSource, RiskLevel};
pub use analysis::{Additive, AnalysisResult, Explanation};
pub use catalog::{Analytics, AdditiveCount, HistoryEntry, Preference, Preferences, Suggestion};
