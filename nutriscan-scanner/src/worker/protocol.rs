//! Messages exchanged with the recognition worker

use crate::frame::PixelBuffer;

/// Host to worker
#[derive(Debug)]
pub enum WorkerRequest {
    /// Load the recognition model. Answered with `Loaded` or `Error`.
    Load,
    /// Recognize text in a frame. The buffer now belongs to the worker.
    Infer { image_data: PixelBuffer },
    /// Stop the worker thread
    Shutdown,
}

impl WorkerRequest {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerRequest::Load => "LOAD",
            WorkerRequest::Infer { .. } => "INFER",
            WorkerRequest::Shutdown => "SHUTDOWN",
        }
    }
}

/// Worker to host
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    Loaded,
    Error { error: String },
    InferenceResult { text: String, confidence: f32 },
}

impl WorkerEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerEvent::Loaded => "LOADED",
            WorkerEvent::Error { .. } => "ERROR",
            WorkerEvent::InferenceResult { .. } => "INFERENCE_RESULT",
        }
    }
}
