//! Periodic live-frame sampling for the recognition overlay

use crate::camera::CameraHandle;
use crate::frame::downscale_frame;
use crate::worker::{InferenceWorkerChannel, WorkerState};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// Hands a downscaled frame of the live stream to the worker once per period.
///
/// Requests are fire-and-forget, so a slow recognition never delays the next
/// tick. Dropping the sampler cancels its timer.
pub struct FrameSampler {
    task: Option<JoinHandle<()>>,
    submitted: Arc<AtomicU64>,
}

impl FrameSampler {
    /// Start sampling `camera` into `worker`. The first frame is taken one
    /// period after start. Sampling ends by itself once the stream stops or
    /// the worker fails or terminates.
    pub fn start(camera: CameraHandle, worker: InferenceWorkerChannel, period: Duration, size: u32) -> Self {
        let submitted = Arc::new(AtomicU64::new(0));
        let counter = submitted.clone();
        let stream_id = camera.id();

        let task = tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;

            loop {
                interval.tick().await;
                if !camera.is_live() {
                    debug!("Stream {} stopped, frame sampler exiting", stream_id);
                    break;
                }
                match worker.state() {
                    WorkerState::Ready => {}
                    WorkerState::Unloaded | WorkerState::Loading => {
                        trace!("Worker not ready, skipping frame");
                        continue;
                    }
                    state @ (WorkerState::Error(_) | WorkerState::Terminated) => {
                        debug!("Worker {:?}, frame sampler exiting", state);
                        break;
                    }
                }
                let frame = match camera.grab_frame() {
                    Ok(frame) => frame,
                    Err(e) => {
                        debug!("Frame grab failed: {}", e);
                        continue;
                    }
                };
                match downscale_frame(&frame, size) {
                    Ok(buffer) => {
                        if worker.infer(buffer) {
                            counter.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    Err(e) => debug!("Frame downscale failed: {}", e),
                }
            }
        });

        debug!("Frame sampler started on stream {} every {:?}", stream_id, period);
        Self {
            task: Some(task),
            submitted,
        }
    }

    /// Cancel the timer. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Frame sampler stopped after {} frames", self.submitted());
        }
    }

    pub fn is_running(&self) -> bool {
        self.task.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Frames handed to the worker so far
    pub fn submitted(&self) -> u64 {
        self.submitted.load(Ordering::Relaxed)
    }
}

impl Drop for FrameSampler {
    fn drop(&mut self) {
        self.stop();
    }
}
