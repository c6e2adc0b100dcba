//! Shared fakes for the scanner integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use image::{Rgba, RgbaImage};
use nutriscan_core::{AnalysisResult, Analytics, HistoryEntry, ImageBlob, Preferences, Suggestion};
use nutriscan_scanner::camera::StreamConstraints;
use nutriscan_scanner::{CameraDevice, InferenceWorkerChannel, FixedTextRecognizer, LabelApi, ScanError, VideoTrack};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-memory `LabelApi` with canned answers and a call log
#[derive(Default)]
pub struct FakeApi {
    pub analysis: Mutex<Option<String>>,
    pub fail_analyze: AtomicBool,
    pub fail_search: AtomicBool,
    pub fail_preferences: AtomicBool,
    pub fail_save: AtomicBool,
    pub suggestions: Mutex<Vec<Suggestion>>,
    pub stored_preferences: Mutex<Preferences>,
    pub history: Mutex<Vec<HistoryEntry>>,
    pub queries: Mutex<Vec<String>>,
    pub saved: Mutex<Vec<Preferences>>,
    pub analyze_calls: AtomicUsize,
    pub last_nutrition_present: AtomicBool,
    pub search_latency: Mutex<Duration>,
    pub analyze_latency: Mutex<Duration>,
}

impl FakeApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_analysis(json: &str) -> Arc<Self> {
        let api = Self::default();
        *api.analysis.lock() = Some(json.to_string());
        Arc::new(api)
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

fn unavailable() -> ScanError {
    ScanError::Server {
        status: 503,
        message: "unavailable".to_string(),
    }
}

#[async_trait]
impl LabelApi for FakeApi {
    async fn analyze(&self, _ingredients: &ImageBlob, nutrition: Option<&ImageBlob>) -> Result<AnalysisResult, ScanError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        self.last_nutrition_present.store(nutrition.is_some(), Ordering::SeqCst);
        let latency = *self.analyze_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.fail_analyze.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        let body = self
            .analysis
            .lock()
            .clone()
            .unwrap_or_else(|| r#"{"product_name":"Test","health_score":"YELLOW"}"#.to_string());
        AnalysisResult::from_json(&body).map_err(|e| ScanError::MalformedResult(e.to_string()))
    }

    async fn search(&self, query: &str) -> Result<Vec<Suggestion>, ScanError> {
        self.queries.lock().push(query.to_string());
        let latency = *self.search_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        if self.fail_search.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(self.suggestions.lock().clone())
    }

    async fn history(&self) -> Result<Vec<HistoryEntry>, ScanError> {
        Ok(self.history.lock().clone())
    }

    async fn analytics(&self) -> Result<Analytics, ScanError> {
        Err(unavailable())
    }

    async fn preferences(&self) -> Result<Preferences, ScanError> {
        if self.fail_preferences.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        Ok(*self.stored_preferences.lock())
    }

    async fn save_preferences(&self, preferences: &Preferences) -> Result<(), ScanError> {
        self.saved.lock().push(*preferences);
        if self.fail_save.load(Ordering::SeqCst) {
            return Err(unavailable());
        }
        *self.stored_preferences.lock() = *preferences;
        Ok(())
    }
}

/// Camera that counts how many of its tracks are still live
pub struct FakeCamera {
    pub available: AtomicBool,
    pub acquired: AtomicUsize,
    pub acquire_latency: Mutex<Duration>,
    live: Arc<AtomicUsize>,
}

impl FakeCamera {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            available: AtomicBool::new(true),
            acquired: AtomicUsize::new(0),
            acquire_latency: Mutex::new(Duration::ZERO),
            live: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn unavailable() -> Arc<Self> {
        let camera = Self::new();
        camera.available.store(false, Ordering::SeqCst);
        camera
    }

    pub fn live_tracks(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

struct FakeTrack {
    live: AtomicBool,
    counter: Arc<AtomicUsize>,
}

impl VideoTrack for FakeTrack {
    fn grab_frame(&self) -> Result<RgbaImage, ScanError> {
        if !self.is_live() {
            return Err(ScanError::DeviceUnavailable("track stopped".to_string()));
        }
        Ok(RgbaImage::from_pixel(32, 24, Rgba([200, 200, 200, 255])))
    }

    fn stop(&self) {
        if self.live.swap(false, Ordering::SeqCst) {
            self.counter.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CameraDevice for FakeCamera {
    async fn acquire(&self, _constraints: StreamConstraints) -> Result<Arc<dyn VideoTrack>, ScanError> {
        if !self.available.load(Ordering::SeqCst) {
            return Err(ScanError::DeviceUnavailable("permission denied".to_string()));
        }
        let latency = *self.acquire_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FakeTrack {
            live: AtomicBool::new(true),
            counter: self.live.clone(),
        }))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub fn worker() -> InferenceWorkerChannel {
    let model = FixedTextRecognizer::new("SUGAR, SALT").with_latency(Duration::ZERO);
    InferenceWorkerChannel::spawn(Box::new(model)).expect("worker spawn")
}

/// A tiny valid PNG for upload tests
pub fn png_bytes() -> Vec<u8> {
    let img = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Png).expect("encode png");
    out.into_inner()
}
