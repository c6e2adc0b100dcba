//! Camera acquisition and the single live media stream

use crate::error::ScanError;
use async_trait::async_trait;
use image::RgbaImage;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacingMode {
    /// Rear-facing camera, pointed away from the user
    Environment,
    User,
}

/// What to ask the device for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamConstraints {
    pub facing: FacingMode,
    pub audio: bool,
}

impl StreamConstraints {
    /// Label scanning wants the rear camera and no microphone
    pub fn rear_video_only() -> Self {
        Self {
            facing: FacingMode::Environment,
            audio: false,
        }
    }
}

/// A live video track produced by a camera device
pub trait VideoTrack: Send + Sync {
    /// Current frame of the feed
    fn grab_frame(&self) -> Result<RgbaImage, ScanError>;

    /// Stop the underlying track. Must be idempotent.
    fn stop(&self);

    fn is_live(&self) -> bool;
}

/// Source of live video. Acquisition may wait on a permission prompt.
#[async_trait]
pub trait CameraDevice: Send + Sync {
    async fn acquire(&self, constraints: StreamConstraints) -> Result<Arc<dyn VideoTrack>, ScanError>;

    fn name(&self) -> &str;
}

/// The one open stream. Cloning shares the same track.
#[derive(Clone)]
pub struct CameraHandle {
    id: u64,
    track: Arc<dyn VideoTrack>,
}

impl CameraHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn grab_frame(&self) -> Result<RgbaImage, ScanError> {
        if !self.track.is_live() {
            return Err(ScanError::DeviceUnavailable(format!("stream {} is stopped", self.id)));
        }
        self.track.grab_frame()
    }

    pub fn is_live(&self) -> bool {
        self.track.is_live()
    }
}

impl std::fmt::Debug for CameraHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraHandle")
            .field("id", &self.id)
            .field("live", &self.track.is_live())
            .finish()
    }
}

/// Owns at most one open camera stream at a time
pub struct MediaStreamManager {
    device: Arc<dyn CameraDevice>,
    active: Mutex<Option<CameraHandle>>,
    opening: AtomicBool,
    next_id: AtomicU64,
    /// Bumped by every `close_active`; an acquisition that straddles a bump is discarded
    close_epoch: AtomicU64,
    closed: AtomicBool,
}

/// Clears the pending-acquisition flag even if `open` is cancelled
struct OpeningGuard<'a>(&'a AtomicBool);

impl Drop for OpeningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl MediaStreamManager {
    pub fn new(device: Arc<dyn CameraDevice>) -> Self {
        Self {
            device,
            active: Mutex::new(None),
            opening: AtomicBool::new(false),
            next_id: AtomicU64::new(1),
            close_epoch: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// Open the rear camera. Opening while a stream is open (or being
    /// opened) is a caller error.
    pub async fn open(&self) -> Result<CameraHandle, ScanError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ScanError::DeviceUnavailable("camera shut down".to_string()));
        }
        if self.active.lock().is_some() {
            return Err(ScanError::StreamAlreadyOpen);
        }
        if self
            .opening
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ScanError::StreamAlreadyOpen);
        }
        let _guard = OpeningGuard(&self.opening);
        let epoch = self.close_epoch.load(Ordering::SeqCst);

        let track = match self.device.acquire(StreamConstraints::rear_video_only()).await {
            Ok(track) => track,
            Err(ScanError::DeviceUnavailable(reason)) => {
                warn!("Camera {} unavailable: {}", self.device.name(), reason);
                return Err(ScanError::DeviceUnavailable(reason));
            }
            Err(e) => {
                warn!("Camera {} failed to open: {}", self.device.name(), e);
                return Err(ScanError::DeviceUnavailable(e.to_string()));
            }
        };

        let mut active = self.active.lock();
        if self.closed.load(Ordering::SeqCst) || self.close_epoch.load(Ordering::SeqCst) != epoch {
            drop(active);
            track.stop();
            info!("Camera {} closed while acquiring, track released", self.device.name());
            return Err(ScanError::DeviceUnavailable("camera closed while opening".to_string()));
        }
        let handle = CameraHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            track,
        };
        *active = Some(handle.clone());
        drop(active);
        info!("Camera stream {} opened on {}", handle.id, self.device.name());
        Ok(handle)
    }

    /// Stop the given stream. Closing twice, or closing a stale handle, is a no-op.
    pub fn close(&self, handle: &CameraHandle) {
        let mut active = self.active.lock();
        if active.as_ref().map(|h| h.id) == Some(handle.id) {
            *active = None;
        }
        drop(active);
        if handle.track.is_live() {
            handle.track.stop();
            debug!("Camera stream {} closed", handle.id);
        }
    }

    /// Stop whatever stream is open, including one still being acquired
    pub fn close_active(&self) {
        let handle = {
            let mut active = self.active.lock();
            self.close_epoch.fetch_add(1, Ordering::SeqCst);
            active.take()
        };
        if let Some(handle) = handle {
            handle.track.stop();
            debug!("Camera stream {} closed", handle.id);
        }
    }

    /// Close for good: the open stream is stopped and later opens fail
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.close_active();
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn is_open(&self) -> bool {
        self.active.lock().is_some()
    }

    pub fn active(&self) -> Option<CameraHandle> {
        self.active.lock().clone()
    }

    pub fn device_name(&self) -> &str {
        self.device.name()
    }
}

impl Drop for MediaStreamManager {
    fn drop(&mut self) {
        self.close_active();
    }
}

/// Serves a single still image as a live feed
pub struct StillImageCamera {
    name: String,
    frame: Arc<RgbaImage>,
}

impl StillImageCamera {
    pub fn new(name: impl Into<String>, frame: RgbaImage) -> Self {
        Self {
            name: name.into(),
            frame: Arc::new(frame),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ScanError> {
        let frame = image::open(path)?.to_rgba8();
        info!("Still image feed {:?} loaded ({}x{})", path, frame.width(), frame.height());
        Ok(Self::new(path.display().to_string(), frame))
    }
}

struct StillImageTrack {
    frame: Arc<RgbaImage>,
    live: AtomicBool,
}

impl VideoTrack for StillImageTrack {
    fn grab_frame(&self) -> Result<RgbaImage, ScanError> {
        if !self.is_live() {
            return Err(ScanError::DeviceUnavailable("track stopped".to_string()));
        }
        Ok(self.frame.as_ref().clone())
    }

    fn stop(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraDevice for StillImageCamera {
    async fn acquire(&self, constraints: StreamConstraints) -> Result<Arc<dyn VideoTrack>, ScanError> {
        debug!("Acquiring still feed with {:?}", constraints);
        Ok(Arc::new(StillImageTrack {
            frame: self.frame.clone(),
            live: AtomicBool::new(true),
        }))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A host without any camera. Scans fall back to file uploads.
#[derive(Debug, Default)]
pub struct NoCamera;

#[async_trait]
impl CameraDevice for NoCamera {
    async fn acquire(&self, _constraints: StreamConstraints) -> Result<Arc<dyn VideoTrack>, ScanError> {
        Err(ScanError::DeviceUnavailable("no camera device present".to_string()))
    }

    fn name(&self) -> &str {
        "none"
    }
}
