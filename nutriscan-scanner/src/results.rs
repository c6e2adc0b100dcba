//! Results view host and the healthy-result celebration

use crate::reveal::RevealOutcome;
use crate::wizard::ScanOutcome;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Time-boxed decorative effect for healthiest-tier results.
///
/// Starting it while it is already running restarts the timer.
pub struct Celebration {
    duration: Duration,
    active: Arc<AtomicBool>,
    triggered: AtomicU64,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Celebration {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            active: Arc::new(AtomicBool::new(false)),
            triggered: AtomicU64::new(0),
            task: Mutex::new(None),
        }
    }

    pub fn trigger(&self) {
        self.triggered.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);

        let active = self.active.clone();
        let duration = self.duration;
        let task = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            active.store(false, Ordering::SeqCst);
            debug!("Celebration finished");
        });
        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// How many times the effect has been started
    pub fn triggered(&self) -> u64 {
        self.triggered.load(Ordering::SeqCst)
    }

    pub fn cancel(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.active.store(false, Ordering::SeqCst);
    }
}

impl Drop for Celebration {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

/// Holds the latest scan outcome; hidden until its reveal has finished
pub struct ResultsView {
    current: Option<ScanOutcome>,
    visible: bool,
    celebrated: bool,
    celebration: Celebration,
}

impl ResultsView {
    pub fn new(celebration: Duration) -> Self {
        Self {
            current: None,
            visible: false,
            celebrated: false,
            celebration: Celebration::new(celebration),
        }
    }

    /// Replace the shown result with a new one, gated behind its reveal
    pub fn present(&mut self, outcome: ScanOutcome) {
        debug!("Results pending reveal for {:?}", outcome.result.product_name);
        self.current = Some(outcome);
        self.visible = false;
        self.celebrated = false;
        self.celebration.cancel();
    }

    /// Reveal finished: show the result, celebrating at most once
    pub fn on_reveal_done(&mut self, reveal: &RevealOutcome) {
        if self.current.is_none() {
            return;
        }
        self.visible = true;
        if reveal.celebrate && !self.celebrated {
            self.celebrated = true;
            info!("Healthy choice, celebrating");
            self.celebration.trigger();
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// The outcome, once revealed
    pub fn outcome(&self) -> Option<&ScanOutcome> {
        if self.visible {
            self.current.as_ref()
        } else {
            None
        }
    }

    pub fn celebration(&self) -> &Celebration {
        &self.celebration
    }

    pub fn clear(&mut self) {
        self.current = None;
        self.visible = false;
        self.celebrated = false;
        self.celebration.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use nutriscan_core::{AnalysisResult, HealthCategory, ImageBlob, ImageSource};

    fn outcome(category: &str) -> ScanOutcome {
        let blob = ImageBlob::new(Bytes::from_static(b"\xff\xd8\xff"), "image/jpeg", ImageSource::FileUpload).unwrap();
        let json = format!(r#"{{"product_name":"Oat bar","health_score":"{}"}}"#, category);
        ScanOutcome {
            result: AnalysisResult::from_json(&json).unwrap(),
            ingredients_image: blob.clone(),
            nutrition_image: blob,
        }
    }

    fn reveal(category: HealthCategory, celebrate: bool) -> RevealOutcome {
        RevealOutcome {
            category,
            digit: category.default_digit(),
            celebrate,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_hidden_until_reveal_done() {
        let mut view = ResultsView::new(Duration::from_millis(4500));
        view.present(outcome("YELLOW"));
        assert!(!view.is_visible());
        assert!(view.outcome().is_none());

        view.on_reveal_done(&reveal(HealthCategory::Yellow, false));
        assert!(view.is_visible());
        assert_eq!(view.outcome().unwrap().result.product_name, "Oat bar");
        assert_eq!(view.celebration().triggered(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_celebrates_once_and_self_terminates() {
        let mut view = ResultsView::new(Duration::from_millis(4500));
        view.present(outcome("GREEN"));
        view.on_reveal_done(&reveal(HealthCategory::Green, true));
        view.on_reveal_done(&reveal(HealthCategory::Green, true));
        assert_eq!(view.celebration().triggered(), 1);
        assert!(view.celebration().is_active());

        tokio::time::sleep(Duration::from_millis(4600)).await;
        assert!(!view.celebration().is_active());
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_result_replaces_old() {
        let mut view = ResultsView::new(Duration::from_millis(4500));
        view.present(outcome("GREEN"));
        view.on_reveal_done(&reveal(HealthCategory::Green, true));

        view.present(outcome("RED"));
        assert!(!view.is_visible());
        assert!(!view.celebration().is_active());
        view.on_reveal_done(&reveal(HealthCategory::Red, false));
        assert_eq!(view.outcome().unwrap().result.health_score, HealthCategory::Red);
        assert_eq!(view.celebration().triggered(), 1);
    }
}
