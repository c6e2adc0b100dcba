//! nutriscan-scanner: capture-and-inference orchestration for label scans
//!
//! Drives the live camera feed, feeds downscaled frames to the on-device
//! text recognition worker, walks the two-step capture wizard (ingredients,
//! then nutrition facts), submits both photos for analysis and gates the
//! result behind the timed reveal sequence.

pub mod api;
pub mod camera;
pub mod config;
pub mod context;
pub mod error;
pub mod frame;
pub mod preferences;
pub mod results;
pub mod reveal;
pub mod sampler;
pub mod search;
pub mod submitter;
pub mod wizard;
pub mod worker;

pub use api::{HttpLabelApi, LabelApi};
pub use camera::{CameraDevice, CameraHandle, MediaStreamManager, NoCamera, StillImageCamera, VideoTrack};
pub use config::ScannerConfig;
pub use context::AppContext;
pub use error::ScanError;
pub use preferences::PreferenceStore;
pub use results::{Celebration, ResultsView};
pub use reveal::{RevealFrame, RevealOutcome, RevealPhase, RevealSequencer, RevealTiming};
pub use search::{SearchState, SuggestionSearch};
pub use submitter::AnalysisSubmitter;
pub use wizard::{ScanOutcome, ScanStep, ScanWizard, StreamStatus, WizardState};
pub use worker::{FixedTextRecognizer, InferenceResult, InferenceWorkerChannel, TextRecognizer, WorkerState};
