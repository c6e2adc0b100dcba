//! Two-step label capture: ingredient list, then nutrition facts
//!
//! The wizard owns the camera stream and the frame sampler while a step is
//! live and releases both as soon as the step has a photo, on every exit
//! path. Transitions are strictly sequential; anything not allowed from the
//! current state is rejected with [`ScanError::InvalidTransition`].

use crate::camera::{CameraHandle, MediaStreamManager};
use crate::config::ScannerConfig;
use crate::error::ScanError;
use crate::frame::{blob_from_upload, encode_capture};
use crate::sampler::FrameSampler;
use crate::submitter::AnalysisSubmitter;
use crate::worker::{InferenceResult, InferenceWorkerChannel};
use nutriscan_core::{AnalysisResult, ImageBlob};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanStep {
    /// Step one: the ingredient list
    Ingredients,
    /// Step two: the nutrition facts panel
    Nutrition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    /// Scanner view not entered
    Idle,
    Step1Live,
    Step1Captured,
    Step2Live,
    Step2Captured,
    Submitting,
    /// Analysis succeeded and the result was handed off
    Completed,
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WizardState::Idle => "IDLE",
            WizardState::Step1Live => "STEP1_LIVE",
            WizardState::Step1Captured => "STEP1_CAPTURED",
            WizardState::Step2Live => "STEP2_LIVE",
            WizardState::Step2Captured => "STEP2_CAPTURED",
            WizardState::Submitting => "SUBMITTING",
            WizardState::Completed => "COMPLETED",
        };
        f.write_str(name)
    }
}

/// Outcome of bringing a step live
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamStatus {
    Live,
    /// No camera; the step can still be filled by a file upload
    Unavailable(String),
}

/// Photos collected during one pass through the scanner
#[derive(Debug, Clone)]
pub struct ScanSession {
    pub id: Uuid,
    pub step: ScanStep,
    pub ingredients_image: Option<ImageBlob>,
    pub nutrition_image: Option<ImageBlob>,
    pub analyzing: bool,
}

impl ScanSession {
    fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            step: ScanStep::Ingredients,
            ingredients_image: None,
            nutrition_image: None,
            analyzing: false,
        }
    }

    fn slot(&self) -> &Option<ImageBlob> {
        match self.step {
            ScanStep::Ingredients => &self.ingredients_image,
            ScanStep::Nutrition => &self.nutrition_image,
        }
    }

    fn slot_mut(&mut self) -> &mut Option<ImageBlob> {
        match self.step {
            ScanStep::Ingredients => &mut self.ingredients_image,
            ScanStep::Nutrition => &mut self.nutrition_image,
        }
    }
}

/// Both photos of a submission, cloned out of the session
#[derive(Debug, Clone)]
pub struct Submission {
    pub ingredients_image: ImageBlob,
    pub nutrition_image: ImageBlob,
}

/// What the wizard hands to the reveal and results view on success
#[derive(Debug, Clone)]
pub struct ScanOutcome {
    pub result: AnalysisResult,
    pub ingredients_image: ImageBlob,
    pub nutrition_image: ImageBlob,
}

pub struct ScanWizard {
    cameras: Arc<MediaStreamManager>,
    worker: InferenceWorkerChannel,
    submitter: Arc<AnalysisSubmitter>,
    config: Arc<ScannerConfig>,
    session: ScanSession,
    entered: bool,
    completed: bool,
    stream: Option<CameraHandle>,
    sampler: Option<FrameSampler>,
}

impl ScanWizard {
    pub fn new(
        cameras: Arc<MediaStreamManager>,
        worker: InferenceWorkerChannel,
        submitter: Arc<AnalysisSubmitter>,
        config: Arc<ScannerConfig>,
    ) -> Self {
        Self {
            cameras,
            worker,
            submitter,
            config,
            session: ScanSession::new(),
            entered: false,
            completed: false,
            stream: None,
            sampler: None,
        }
    }

    pub fn state(&self) -> WizardState {
        if !self.entered {
            return WizardState::Idle;
        }
        if self.completed {
            return WizardState::Completed;
        }
        if self.session.analyzing {
            return WizardState::Submitting;
        }
        match (self.session.step, self.session.slot().is_some()) {
            (ScanStep::Ingredients, false) => WizardState::Step1Live,
            (ScanStep::Ingredients, true) => WizardState::Step1Captured,
            (ScanStep::Nutrition, false) => WizardState::Step2Live,
            (ScanStep::Nutrition, true) => WizardState::Step2Captured,
        }
    }

    pub fn session(&self) -> &ScanSession {
        &self.session
    }

    pub fn step(&self) -> ScanStep {
        self.session.step
    }

    /// Whether this wizard currently holds an open camera stream
    pub fn has_live_stream(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether live frames are being fed to the recognition worker
    pub fn is_sampling(&self) -> bool {
        self.sampler.as_ref().map(FrameSampler::is_running).unwrap_or(false)
    }

    /// Latest live text reading, best effort
    pub fn overlay_text(&self) -> Option<InferenceResult> {
        self.worker.latest()
    }

    /// Enter the scanner view with a fresh session at step one
    pub async fn enter(&mut self) -> StreamStatus {
        self.release_stream();
        self.session = ScanSession::new();
        self.entered = true;
        self.completed = false;
        info!(session = %self.session.id, "Scanner entered");
        self.go_live().await
    }

    /// Freeze the current live frame into the active step
    pub fn capture(&mut self) -> Result<(), ScanError> {
        self.expect_live("capture")?;
        let stream = self
            .stream
            .as_ref()
            .ok_or_else(|| ScanError::DeviceUnavailable("no live stream to capture from".to_string()))?;
        let frame = stream.grab_frame()?;
        let blob = encode_capture(&frame, self.config.capture_quality)?;
        self.store(blob);
        Ok(())
    }

    /// Fill the active step from a user-selected file
    pub fn upload(&mut self, bytes: Vec<u8>) -> Result<(), ScanError> {
        self.expect_live("upload")?;
        let blob = blob_from_upload(bytes)?;
        self.store(blob);
        Ok(())
    }

    /// Discard the active step's photo and go live again
    pub async fn retake(&mut self) -> Result<StreamStatus, ScanError> {
        match self.state() {
            WizardState::Step1Captured | WizardState::Step2Captured => {}
            state => return Err(invalid(state, "retake")),
        }
        *self.session.slot_mut() = None;
        debug!(session = %self.session.id, "Retaking {:?}", self.session.step);
        Ok(self.go_live().await)
    }

    /// Move from a captured ingredient list to the nutrition step
    pub async fn advance(&mut self) -> Result<StreamStatus, ScanError> {
        let state = self.state();
        if state != WizardState::Step1Captured || self.session.ingredients_image.is_none() {
            return Err(invalid(state, "advance"));
        }
        self.session.step = ScanStep::Nutrition;
        debug!(session = %self.session.id, "Advanced to nutrition step");
        Ok(self.go_live().await)
    }

    /// Return to the captured ingredient list, discarding the nutrition photo
    pub fn back(&mut self) -> Result<(), ScanError> {
        match self.state() {
            WizardState::Step2Live | WizardState::Step2Captured => {}
            state => return Err(invalid(state, "go back")),
        }
        self.release_stream();
        self.session.nutrition_image = None;
        self.session.step = ScanStep::Ingredients;
        debug!(session = %self.session.id, "Back to ingredients step");
        Ok(())
    }

    /// Mark the session as submitting and take copies of both photos.
    /// A second call before [`finish_submit`](Self::finish_submit) is rejected.
    pub fn begin_submit(&mut self) -> Result<Submission, ScanError> {
        let state = self.state();
        if state == WizardState::Submitting {
            return Err(ScanError::SubmissionInFlight);
        }
        if state != WizardState::Step2Captured {
            return Err(invalid(state, "submit"));
        }
        let (ingredients_image, nutrition_image) =
            match (&self.session.ingredients_image, &self.session.nutrition_image) {
                (Some(i), Some(n)) => (i.clone(), n.clone()),
                _ => return Err(invalid(state, "submit")),
            };
        self.session.analyzing = true;
        info!(session = %self.session.id, "Submitting label photos for analysis");
        Ok(Submission {
            ingredients_image,
            nutrition_image,
        })
    }

    /// Settle a submission. Success hands the result off and completes the
    /// wizard; failure returns to `STEP2_CAPTURED` so the user can retry.
    pub fn finish_submit(&mut self, outcome: Result<AnalysisResult, ScanError>) -> Result<ScanOutcome, ScanError> {
        let state = self.state();
        if state != WizardState::Submitting {
            return Err(invalid(state, "finish a submission"));
        }
        self.session.analyzing = false;
        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(session = %self.session.id, "Submission failed, photos kept for retry: {}", e);
                return Err(e);
            }
        };
        match (self.session.ingredients_image.take(), self.session.nutrition_image.take()) {
            (Some(ingredients_image), Some(nutrition_image)) => {
                self.completed = true;
                info!(session = %self.session.id, "Scan completed");
                Ok(ScanOutcome {
                    result,
                    ingredients_image,
                    nutrition_image,
                })
            }
            (ingredients, nutrition) => {
                self.session.ingredients_image = ingredients;
                self.session.nutrition_image = nutrition;
                Err(invalid(WizardState::Submitting, "finish a submission"))
            }
        }
    }

    /// Submit both photos and wait for the analysis
    pub async fn submit(&mut self) -> Result<ScanOutcome, ScanError> {
        let submission = self.begin_submit()?;
        let session = self.session.id;
        let outcome = {
            // Dropping this future mid-request lands back in STEP2_CAPTURED
            let mut pending = PendingSubmit {
                analyzing: &mut self.session.analyzing,
                session,
                armed: true,
            };
            let outcome = self
                .submitter
                .submit(&submission.ingredients_image, Some(&submission.nutrition_image))
                .await;
            pending.armed = false;
            outcome
        };
        self.finish_submit(outcome)
    }

    /// Leave the scanner view: stop the stream and sampler, drop the session
    pub fn exit(&mut self) {
        self.release_stream();
        if self.entered {
            info!(session = %self.session.id, "Scanner exited in {}", self.state());
        }
        self.session = ScanSession::new();
        self.entered = false;
        self.completed = false;
    }

    fn expect_live(&self, action: &'static str) -> Result<(), ScanError> {
        match self.state() {
            WizardState::Step1Live | WizardState::Step2Live => Ok(()),
            state => Err(invalid(state, action)),
        }
    }

    fn store(&mut self, blob: ImageBlob) {
        debug!(
            session = %self.session.id,
            "Stored {} byte {:?} photo for {:?}",
            blob.len(),
            blob.source(),
            self.session.step
        );
        *self.session.slot_mut() = Some(blob);
        self.release_stream();
    }

    async fn go_live(&mut self) -> StreamStatus {
        self.release_stream();
        match self.cameras.open().await {
            Ok(handle) => {
                let sampler = FrameSampler::start(
                    handle.clone(),
                    self.worker.clone(),
                    self.config.sample_interval(),
                    self.config.inference_size,
                );
                self.stream = Some(handle);
                self.sampler = Some(sampler);
                StreamStatus::Live
            }
            Err(e) => {
                warn!(session = %self.session.id, "Live view unavailable, use file upload: {}", e);
                StreamStatus::Unavailable(e.to_string())
            }
        }
    }

    fn release_stream(&mut self) {
        if let Some(mut sampler) = self.sampler.take() {
            sampler.stop();
        }
        if let Some(handle) = self.stream.take() {
            self.cameras.close(&handle);
        }
    }
}

struct PendingSubmit<'a> {
    analyzing: &'a mut bool,
    session: Uuid,
    armed: bool,
}

impl Drop for PendingSubmit<'_> {
    fn drop(&mut self) {
        if self.armed {
            *self.analyzing = false;
            warn!(session = %self.session, "Submission cancelled, photos kept for retry");
        }
    }
}

impl Drop for ScanWizard {
    fn drop(&mut self) {
        self.release_stream();
    }
}

fn invalid(state: WizardState, action: &'static str) -> ScanError {
    ScanError::InvalidTransition {
        state: state.to_string(),
        action,
    }
}
