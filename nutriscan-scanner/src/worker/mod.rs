//! On-device text recognition worker
//!
//! One background thread hosts the recognition model for the whole process.
//! The host talks to it only through [`protocol`] messages; frame buffers are
//! moved into requests, never shared.

pub mod channel;
pub mod protocol;
pub mod recognizer;

pub use channel::{InferenceResult, InferenceWorkerChannel, WorkerState, WorkerStats};
pub use protocol::{WorkerEvent, WorkerRequest};
pub use recognizer::{FixedTextRecognizer, Recognition, TextRecognizer};
