//! Recognition model contract

use crate::error::ScanError;
use crate::frame::PixelBuffer;
use std::time::Duration;
use tracing::info;

/// Text read from one frame
#[derive(Debug, Clone, PartialEq)]
pub struct Recognition {
    pub text: String,
    pub confidence: f32,
}

/// A recognition model. Runs exclusively on the worker thread, so it may
/// block and needs no internal synchronization.
pub trait TextRecognizer: Send + 'static {
    fn load(&mut self) -> Result<(), ScanError>;

    fn recognize(&mut self, frame: &PixelBuffer) -> Result<Recognition, ScanError>;

    fn name(&self) -> &str;
}

/// Frames darker than this are treated as a covered lens
const DARK_FRAME_LUMA: f32 = 0.05;

/// Placeholder model that reports a fixed reading after a simulated delay
pub struct FixedTextRecognizer {
    text: String,
    confidence: f32,
    latency: Duration,
    loaded: bool,
}

impl FixedTextRecognizer {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: 0.95,
            latency: Duration::from_millis(100),
            loaded: false,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl TextRecognizer for FixedTextRecognizer {
    fn load(&mut self) -> Result<(), ScanError> {
        self.loaded = true;
        info!("Recognizer {} loaded", self.name());
        Ok(())
    }

    fn recognize(&mut self, frame: &PixelBuffer) -> Result<Recognition, ScanError> {
        if !self.loaded {
            return Err(ScanError::WorkerUnavailable);
        }
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if frame.mean_luma() < DARK_FRAME_LUMA {
            return Ok(Recognition { text: String::new(), confidence: 0.0 });
        }
        Ok(Recognition {
            text: self.text.clone(),
            confidence: self.confidence,
        })
    }

    fn name(&self) -> &str {
        "fixed-text"
    }
}
