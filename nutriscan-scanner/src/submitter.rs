//! Sends captured label photos for server-side analysis

use crate::api::LabelApi;
use crate::error::ScanError;
use nutriscan_core::{AnalysisResult, ImageBlob};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

pub struct AnalysisSubmitter {
    api: Arc<dyn LabelApi>,
    in_flight: AtomicBool,
}

struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl AnalysisSubmitter {
    pub fn new(api: Arc<dyn LabelApi>) -> Self {
        Self {
            api,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Analyze both label photos. Failures are returned as-is so the caller
    /// can offer a retry; nothing is retried here.
    pub async fn submit(&self, ingredients: &ImageBlob, nutrition: Option<&ImageBlob>) -> Result<AnalysisResult, ScanError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ScanError::SubmissionInFlight);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let started = Instant::now();
        match self.api.analyze(ingredients, nutrition).await {
            Ok(result) => {
                info!(
                    "Analysis of {:?} finished in {:?}: {} ({})",
                    result.product_name,
                    started.elapsed(),
                    result.health_score,
                    result.display_digit()
                );
                Ok(result)
            }
            Err(e) => {
                warn!("Analysis failed after {:?}: {}", started.elapsed(), e);
                Err(e)
            }
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use nutriscan_core::{Analytics, HistoryEntry, ImageSource, Preferences, Suggestion};
    use tokio::sync::Notify;

    struct GatedApi {
        gate: Notify,
    }

    #[async_trait]
    impl LabelApi for GatedApi {
        async fn analyze(&self, _: &ImageBlob, _: Option<&ImageBlob>) -> Result<AnalysisResult, ScanError> {
            self.gate.notified().await;
            Ok(AnalysisResult::from_json(r#"{"health_score":"RED"}"#)?)
        }

        async fn search(&self, _: &str) -> Result<Vec<Suggestion>, ScanError> {
            Ok(Vec::new())
        }

        async fn history(&self) -> Result<Vec<HistoryEntry>, ScanError> {
            Ok(Vec::new())
        }

        async fn analytics(&self) -> Result<Analytics, ScanError> {
            Ok(Analytics::default())
        }

        async fn preferences(&self) -> Result<Preferences, ScanError> {
            Ok(Preferences::default())
        }

        async fn save_preferences(&self, _: &Preferences) -> Result<(), ScanError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_submit_is_rejected() {
        let api = Arc::new(GatedApi { gate: Notify::new() });
        let submitter = Arc::new(AnalysisSubmitter::new(api.clone()));
        let blob = ImageBlob::new(Bytes::from_static(b"\xff\xd8"), "image/jpeg", ImageSource::DeviceCapture).unwrap();

        let first = {
            let submitter = submitter.clone();
            let blob = blob.clone();
            tokio::spawn(async move { submitter.submit(&blob, None).await })
        };
        while !submitter.is_in_flight() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(submitter.submit(&blob, None).await, Err(ScanError::SubmissionInFlight)));

        api.gate.notify_one();
        let result = first.await.unwrap().unwrap();
        assert_eq!(result.display_digit(), 2);
        assert!(!submitter.is_in_flight());
    }
}
