//! Application context: owns the process-wide worker, camera and preferences

use crate::api::LabelApi;
use crate::camera::{CameraDevice, MediaStreamManager};
use crate::config::ScannerConfig;
use crate::error::ScanError;
use crate::preferences::PreferenceStore;
use crate::results::ResultsView;
use crate::reveal::{RevealSequencer, RevealTiming};
use crate::search::SuggestionSearch;
use crate::submitter::AnalysisSubmitter;
use crate::wizard::{ScanOutcome, ScanWizard};
use crate::worker::{InferenceWorkerChannel, TextRecognizer};
use nutriscan_core::{Analytics, HistoryEntry};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Created once at startup, torn down once by [`AppContext::shutdown`].
///
/// Components that need shared state get it from here; nothing is global.
pub struct AppContext {
    config: Arc<ScannerConfig>,
    api: Arc<dyn LabelApi>,
    cameras: Arc<MediaStreamManager>,
    worker: InferenceWorkerChannel,
    submitter: Arc<AnalysisSubmitter>,
    preferences: PreferenceStore,
    shut_down: AtomicBool,
}

impl AppContext {
    /// Spawn the recognition worker, start loading its model and read the
    /// remote preferences. A model that fails to load only disables the
    /// live overlay.
    pub async fn start(
        config: ScannerConfig,
        camera: Arc<dyn CameraDevice>,
        recognizer: Box<dyn TextRecognizer>,
        api: Arc<dyn LabelApi>,
    ) -> Result<Self, ScanError> {
        config.validate().map_err(ScanError::Config)?;
        info!("Starting scanner against {}", config.api_base_url);

        let worker = InferenceWorkerChannel::spawn(recognizer)?;
        if let Err(e) = worker.load() {
            warn!("Recognition model not loaded, live overlay disabled: {}", e);
        }

        let preferences = PreferenceStore::fetch(api.clone()).await;

        Ok(Self {
            config: Arc::new(config),
            cameras: Arc::new(MediaStreamManager::new(camera)),
            submitter: Arc::new(AnalysisSubmitter::new(api.clone())),
            api,
            worker,
            preferences,
            shut_down: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn cameras(&self) -> &Arc<MediaStreamManager> {
        &self.cameras
    }

    pub fn worker(&self) -> &InferenceWorkerChannel {
        &self.worker
    }

    pub fn preferences(&self) -> &PreferenceStore {
        &self.preferences
    }

    pub fn api(&self) -> &Arc<dyn LabelApi> {
        &self.api
    }

    /// A scanner wizard sharing this context's camera, worker and submitter
    pub fn scanner(&self) -> ScanWizard {
        ScanWizard::new(
            self.cameras.clone(),
            self.worker.clone(),
            self.submitter.clone(),
            self.config.clone(),
        )
    }

    pub fn search(&self) -> SuggestionSearch {
        SuggestionSearch::new(self.api.clone(), self.config.search_debounce(), self.config.min_query_len)
    }

    pub fn results_view(&self) -> ResultsView {
        ResultsView::new(self.config.celebration())
    }

    pub fn reveal_for(&self, outcome: &ScanOutcome) -> RevealSequencer {
        RevealSequencer::new(&outcome.result, RevealTiming::from(self.config.as_ref()))
    }

    /// Past scans, newest data from the server; empty when unavailable
    pub async fn history(&self) -> Vec<HistoryEntry> {
        match self.api.history().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Failed to load history: {}", e);
                Vec::new()
            }
        }
    }

    /// Trend aggregates; `None` when unavailable
    pub async fn analytics(&self) -> Option<Analytics> {
        match self.api.analytics().await {
            Ok(analytics) => Some(analytics),
            Err(e) => {
                warn!("Failed to load analytics: {}", e);
                None
            }
        }
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    /// Close any open stream, finish pending preference pushes and terminate
    /// the worker. Later calls do nothing.
    pub async fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::SeqCst) {
            return;
        }
        info!("Shutting down scanner");
        self.cameras.shutdown();
        self.preferences.flush().await;
        self.worker.shutdown().await;
    }
}
