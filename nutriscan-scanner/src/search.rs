//! Debounced product suggestion lookup

use crate::api::LabelApi;
use nutriscan_core::Suggestion;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub suggestions: Vec<Suggestion>,
    pub loading: bool,
}

/// Issues one lookup per settled query.
///
/// Each change cancels the pending delayed lookup and schedules a new one;
/// a lookup whose query has since changed never touches the state.
pub struct SuggestionSearch {
    api: Arc<dyn LabelApi>,
    debounce: Duration,
    min_len: usize,
    state: Arc<RwLock<SearchState>>,
    pending: Mutex<Option<JoinHandle<()>>>,
    generation: Arc<AtomicU64>,
    lookups: Arc<AtomicU64>,
}

impl SuggestionSearch {
    pub fn new(api: Arc<dyn LabelApi>, debounce: Duration, min_len: usize) -> Self {
        Self {
            api,
            debounce,
            min_len,
            state: Arc::new(RwLock::new(SearchState::default())),
            pending: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
            lookups: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn on_query_change(&self, text: &str) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(task) = self.pending.lock().take() {
            task.abort();
        }

        {
            let mut state = self.state.write();
            state.query = text.to_string();
            state.loading = false;
            if text.chars().count() < self.min_len {
                state.suggestions.clear();
                return;
            }
        }

        let query = text.to_string();
        let api = self.api.clone();
        let debounce = self.debounce;
        let state = self.state.clone();
        let current = self.generation.clone();
        let lookups = self.lookups.clone();

        let task = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            state.write().loading = true;
            lookups.fetch_add(1, Ordering::SeqCst);
            debug!("Looking up suggestions for {:?}", query);

            let found = api.search(&query).await;
            if current.load(Ordering::SeqCst) != generation {
                return;
            }
            let mut state = state.write();
            match found {
                Ok(products) => state.suggestions = products,
                Err(e) => {
                    warn!("Suggestion lookup failed: {}", e);
                    state.suggestions.clear();
                }
            }
            state.loading = false;
        });
        *self.pending.lock() = Some(task);
    }

    pub fn snapshot(&self) -> SearchState {
        self.state.read().clone()
    }

    /// Lookups issued so far
    pub fn lookups(&self) -> u64 {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Wait for the pending lookup, if any, to finish
    pub async fn settled(&self) {
        let task = self.pending.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
    }
}

impl Drop for SuggestionSearch {
    fn drop(&mut self) {
        if let Some(task) = self.pending.get_mut().take() {
            task.abort();
        }
    }
}
