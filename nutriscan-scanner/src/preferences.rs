//! Process-wide dietary preferences, applied locally first and pushed remotely

use crate::api::LabelApi;
use nutriscan_core::{Preference, Preferences};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

enum PushCmd {
    Save(Preferences),
    Flush(oneshot::Sender<()>),
}

/// Local copy of the user's preferences.
///
/// Every change is visible immediately; remote pushes run one at a time in
/// the order the changes were made. A failed push is logged and not rolled
/// back or retried.
pub struct PreferenceStore {
    current: Arc<RwLock<Preferences>>,
    pushes: mpsc::UnboundedSender<PushCmd>,
    pusher: Mutex<Option<JoinHandle<()>>>,
}

impl PreferenceStore {
    pub fn new(api: Arc<dyn LabelApi>, initial: Preferences) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<PushCmd>();
        let pusher = tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    PushCmd::Save(prefs) => match api.save_preferences(&prefs).await {
                        Ok(()) => debug!("Preferences saved: {:?}", prefs),
                        Err(e) => warn!("Failed to save preferences, keeping local copy: {}", e),
                    },
                    PushCmd::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self {
            current: Arc::new(RwLock::new(initial)),
            pushes: tx,
            pusher: Mutex::new(Some(pusher)),
        }
    }

    /// Read the remote preferences once, falling back to defaults
    pub async fn fetch(api: Arc<dyn LabelApi>) -> Self {
        let initial = match api.preferences().await {
            Ok(prefs) => {
                info!("Loaded preferences: {:?}", prefs);
                prefs
            }
            Err(e) => {
                warn!("Could not load preferences, using defaults: {}", e);
                Preferences::default()
            }
        };
        Self::new(api, initial)
    }

    pub fn get(&self) -> Preferences {
        *self.current.read()
    }

    /// Flip one preference and push the result; returns the new value
    pub fn toggle(&self, pref: Preference) -> bool {
        let (value, snapshot) = {
            let mut current = self.current.write();
            let value = current.toggle(pref);
            (value, *current)
        };
        debug!("Toggled {} to {}", pref, value);
        self.push(snapshot);
        value
    }

    /// Replace all preferences and push them
    pub fn update(&self, prefs: Preferences) {
        *self.current.write() = prefs;
        self.push(prefs);
    }

    fn push(&self, prefs: Preferences) {
        if self.pushes.send(PushCmd::Save(prefs)).is_err() {
            warn!("Preference pusher stopped, change kept locally only");
        }
    }

    /// Wait until every push issued so far has completed
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.pushes.send(PushCmd::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

impl Drop for PreferenceStore {
    fn drop(&mut self) {
        if let Some(task) = self.pusher.get_mut().take() {
            task.abort();
        }
    }
}
