//! Host side of the recognition worker

use crate::error::ScanError;
use crate::frame::PixelBuffer;
use crate::worker::protocol::{WorkerEvent, WorkerRequest};
use crate::worker::recognizer::TextRecognizer;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Lifecycle of the worker session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerState {
    Unloaded,
    Loading,
    Ready,
    Error(String),
    /// Shut down by the host; never comes back
    Terminated,
}

impl WorkerState {
    fn is_settled(&self) -> bool {
        !matches!(self, WorkerState::Unloaded | WorkerState::Loading)
    }
}

/// Latest text read from the live feed
#[derive(Debug, Clone, PartialEq)]
pub struct InferenceResult {
    pub text: String,
    pub confidence: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerStats {
    /// INFER requests handed to the worker
    pub sent: u64,
    /// INFER requests dropped because the session was not ready
    pub dropped: u64,
    /// INFERENCE_RESULT messages received
    pub results: u64,
}

/// State shared with the event pump. Holds no request sender, so the pump
/// never keeps the worker thread alive.
struct Shared {
    state: watch::Sender<WorkerState>,
    overlay: watch::Sender<Option<InferenceResult>>,
    sent: AtomicU64,
    dropped: AtomicU64,
    results: AtomicU64,
}

impl Shared {
    fn set_state(&self, state: WorkerState) {
        self.state.send_replace(state);
    }

    fn apply(&self, event: WorkerEvent) {
        debug!("Worker event {}", event.kind());
        match event {
            WorkerEvent::Loaded => {
                info!("Recognition model ready");
                self.set_state(WorkerState::Ready);
            }
            WorkerEvent::Error { error } => {
                warn!("Recognition model failed: {}", error);
                self.set_state(WorkerState::Error(error));
            }
            WorkerEvent::InferenceResult { text, confidence } => {
                self.results.fetch_add(1, Ordering::Relaxed);
                self.overlay.send_replace(Some(InferenceResult { text, confidence }));
            }
        }
    }
}

struct Inner {
    requests: mpsc::UnboundedSender<WorkerRequest>,
    shared: Arc<Shared>,
    thread: Mutex<Option<std::thread::JoinHandle<()>>>,
    pump: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        let _ = self.requests.send(WorkerRequest::Shutdown);
    }
}

/// Request/response channel to the single recognition worker.
/// Cloning yields another handle to the same worker.
#[derive(Clone)]
pub struct InferenceWorkerChannel {
    inner: Arc<Inner>,
}

impl InferenceWorkerChannel {
    /// Start the worker thread. Must be called from within a tokio runtime.
    pub fn spawn(recognizer: Box<dyn TextRecognizer>) -> Result<Self, ScanError> {
        let (request_tx, request_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(WorkerState::Unloaded);
        let (overlay, _) = watch::channel(None);

        let shared = Arc::new(Shared {
            state,
            overlay,
            sent: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            results: AtomicU64::new(0),
        });

        let model_name = recognizer.name().to_string();
        let thread = std::thread::Builder::new()
            .name("nutriscan-ocr".to_string())
            .spawn(move || run_worker(recognizer, request_rx, event_tx))?;

        let pump_shared = shared.clone();
        let pump = tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                pump_shared.apply(event);
            }
            // Event sender gone: the worker thread has exited
            let current = pump_shared.state.borrow().clone();
            if current != WorkerState::Terminated {
                error!("Recognition worker terminated unexpectedly");
                pump_shared.set_state(WorkerState::Error("worker terminated".to_string()));
            }
        });

        info!("Recognition worker started with model {}", model_name);
        Ok(Self {
            inner: Arc::new(Inner {
                requests: request_tx,
                shared,
                thread: Mutex::new(Some(thread)),
                pump: Mutex::new(Some(pump)),
            }),
        })
    }

    /// Ask the worker to load its model. A no-op while loading or ready;
    /// from `Error` this retries.
    pub fn load(&self) -> Result<(), ScanError> {
        match self.state() {
            WorkerState::Loading | WorkerState::Ready => return Ok(()),
            WorkerState::Terminated => return Err(ScanError::WorkerUnavailable),
            WorkerState::Unloaded | WorkerState::Error(_) => {}
        }
        self.inner.shared.set_state(WorkerState::Loading);
        if self.inner.requests.send(WorkerRequest::Load).is_err() {
            self.inner.shared.set_state(WorkerState::Error("worker terminated".to_string()));
            return Err(ScanError::WorkerUnavailable);
        }
        Ok(())
    }

    /// Hand a frame to the worker. Returns whether it was sent; frames are
    /// dropped, not queued, unless the session is ready.
    pub fn infer(&self, frame: PixelBuffer) -> bool {
        if !self.is_ready() {
            self.inner.shared.dropped.fetch_add(1, Ordering::Relaxed);
            debug!("Dropping frame, worker is {:?}", self.state());
            return false;
        }
        match self.inner.requests.send(WorkerRequest::Infer { image_data: frame }) {
            Ok(()) => {
                self.inner.shared.sent.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(_) => {
                self.inner.shared.dropped.fetch_add(1, Ordering::Relaxed);
                self.inner.shared.set_state(WorkerState::Error("worker terminated".to_string()));
                false
            }
        }
    }

    pub fn state(&self) -> WorkerState {
        self.inner.shared.state.borrow().clone()
    }

    pub fn is_ready(&self) -> bool {
        *self.inner.shared.state.borrow() == WorkerState::Ready
    }

    /// Most recently delivered reading, if any
    pub fn latest(&self) -> Option<InferenceResult> {
        self.inner.shared.overlay.borrow().clone()
    }

    /// Watch the live overlay text
    pub fn subscribe(&self) -> watch::Receiver<Option<InferenceResult>> {
        self.inner.shared.overlay.subscribe()
    }

    /// Wait until the session leaves `Unloaded`/`Loading`
    pub async fn settled(&self) -> WorkerState {
        let mut rx = self.inner.shared.state.subscribe();
        let settled = match rx.wait_for(|s| s.is_settled()).await {
            Ok(state) => state.clone(),
            Err(_) => self.state(),
        };
        settled
    }

    pub fn stats(&self) -> WorkerStats {
        let shared = &self.inner.shared;
        WorkerStats {
            sent: shared.sent.load(Ordering::Relaxed),
            dropped: shared.dropped.load(Ordering::Relaxed),
            results: shared.results.load(Ordering::Relaxed),
        }
    }

    /// Terminate the worker. Later calls are no-ops.
    pub async fn shutdown(&self) {
        if self.state() == WorkerState::Terminated {
            return;
        }
        self.inner.shared.set_state(WorkerState::Terminated);
        let _ = self.inner.requests.send(WorkerRequest::Shutdown);

        let thread = self.inner.thread.lock().take();
        if let Some(thread) = thread {
            match tokio::task::spawn_blocking(move || thread.join()).await {
                Ok(Ok(())) => {}
                Ok(Err(_)) => warn!("Recognition worker panicked before shutdown"),
                Err(e) => warn!("Failed to join recognition worker: {}", e),
            }
        }
        let pump = self.inner.pump.lock().take();
        if let Some(pump) = pump {
            let _ = pump.await;
        }
        info!("Recognition worker shut down");
    }
}

fn run_worker(
    mut recognizer: Box<dyn TextRecognizer>,
    mut requests: mpsc::UnboundedReceiver<WorkerRequest>,
    events: mpsc::UnboundedSender<WorkerEvent>,
) {
    let mut loaded = false;
    let mut pending: Option<WorkerRequest> = None;

    loop {
        let request = match pending.take() {
            Some(request) => request,
            None => match requests.blocking_recv() {
                Some(request) => request,
                None => break,
            },
        };

        match request {
            WorkerRequest::Shutdown => break,
            WorkerRequest::Load => {
                let event = match recognizer.load() {
                    Ok(()) => {
                        loaded = true;
                        WorkerEvent::Loaded
                    }
                    Err(e) => {
                        loaded = false;
                        WorkerEvent::Error { error: e.to_string() }
                    }
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            WorkerRequest::Infer { mut image_data } => {
                if !loaded {
                    continue;
                }
                // Only the newest queued frame is worth reading
                while let Ok(next) = requests.try_recv() {
                    match next {
                        WorkerRequest::Infer { image_data: newer } => image_data = newer,
                        other => {
                            pending = Some(other);
                            break;
                        }
                    }
                }
                match recognizer.recognize(&image_data) {
                    Ok(reading) => {
                        let event = WorkerEvent::InferenceResult {
                            text: reading.text,
                            confidence: reading.confidence,
                        };
                        if events.send(event).is_err() {
                            break;
                        }
                    }
                    Err(e) => debug!("Recognition failed: {}", e),
                }
            }
        }
    }
    debug!("Recognition worker loop exited");
}
