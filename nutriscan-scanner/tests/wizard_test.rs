//! Tests for the two-step capture wizard

mod common;

use common::{png_bytes, worker, FakeApi, FakeCamera};
use nutriscan_core::{HealthCategory, ImageSource};
use nutriscan_scanner::{
    AnalysisSubmitter, LabelApi, MediaStreamManager, ScanError, ScanStep, ScanWizard, ScannerConfig, StreamStatus,
    WizardState,
};
use proptest::prelude::*;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio_test::{assert_err, assert_ok};

fn wizard(camera: Arc<FakeCamera>, api: Arc<FakeApi>) -> ScanWizard {
    let api: Arc<dyn LabelApi> = api;
    ScanWizard::new(
        Arc::new(MediaStreamManager::new(camera)),
        worker(),
        Arc::new(AnalysisSubmitter::new(api)),
        Arc::new(ScannerConfig::default()),
    )
}

#[tokio::test]
async fn test_full_capture_flow() {
    let camera = FakeCamera::new();
    let api = FakeApi::new();
    let mut wizard = wizard(camera.clone(), api.clone());
    assert_eq!(wizard.state(), WizardState::Idle);

    assert_eq!(wizard.enter().await, StreamStatus::Live);
    assert_eq!(wizard.state(), WizardState::Step1Live);
    assert!(wizard.has_live_stream());
    assert!(wizard.is_sampling());
    assert_eq!(camera.live_tracks(), 1);

    wizard.capture().unwrap();
    assert_eq!(wizard.state(), WizardState::Step1Captured);
    assert!(!wizard.has_live_stream());
    assert!(!wizard.is_sampling());
    assert_eq!(camera.live_tracks(), 0);
    let photo = wizard.session().ingredients_image.clone().unwrap();
    assert_eq!(photo.mime(), "image/jpeg");
    assert_eq!(photo.source(), ImageSource::DeviceCapture);

    assert_eq!(wizard.advance().await.unwrap(), StreamStatus::Live);
    assert_eq!(wizard.state(), WizardState::Step2Live);
    assert_eq!(wizard.step(), ScanStep::Nutrition);
    assert_eq!(camera.live_tracks(), 1);

    wizard.capture().unwrap();
    assert_eq!(wizard.state(), WizardState::Step2Captured);
    assert_eq!(camera.live_tracks(), 0);

    let outcome = wizard.submit().await.unwrap();
    assert_eq!(wizard.state(), WizardState::Completed);
    assert_eq!(outcome.result.health_score, HealthCategory::Yellow);
    assert!(api.last_nutrition_present.load(Ordering::SeqCst));
    assert_eq!(camera.acquired.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_retake_then_advance_is_rejected() {
    let camera = FakeCamera::new();
    let mut wizard = wizard(camera.clone(), FakeApi::new());
    wizard.enter().await;
    wizard.capture().unwrap();

    wizard.retake().await.unwrap();
    assert_eq!(wizard.state(), WizardState::Step1Live);
    assert!(wizard.session().ingredients_image.is_none());

    let err = wizard.advance().await.unwrap_err();
    assert!(matches!(err, ScanError::InvalidTransition { .. }));
    assert_eq!(wizard.state(), WizardState::Step1Live);
    assert_eq!(wizard.step(), ScanStep::Ingredients);
    assert_eq!(camera.live_tracks(), 1);
}

#[tokio::test]
async fn test_actions_rejected_outside_their_states() {
    let mut wizard = wizard(FakeCamera::new(), FakeApi::new());
    assert_err!(wizard.capture());
    assert_err!(wizard.back());

    wizard.enter().await;
    assert_err!(wizard.retake().await);
    assert_err!(wizard.back());
    assert!(matches!(wizard.submit().await, Err(ScanError::InvalidTransition { .. })));

    assert_ok!(wizard.capture());
    assert_err!(wizard.capture());
    assert_err!(wizard.upload(png_bytes()));
}

#[tokio::test]
async fn test_back_discards_nutrition_photo() {
    let camera = FakeCamera::new();
    let mut wizard = wizard(camera.clone(), FakeApi::new());
    wizard.enter().await;
    wizard.capture().unwrap();
    wizard.advance().await.unwrap();
    wizard.capture().unwrap();

    wizard.back().unwrap();
    assert_eq!(wizard.state(), WizardState::Step1Captured);
    assert!(wizard.session().nutrition_image.is_none());
    assert!(wizard.session().ingredients_image.is_some());
    assert_eq!(camera.live_tracks(), 0);

    // Back from a live nutrition step releases the stream
    wizard.advance().await.unwrap();
    assert_eq!(camera.live_tracks(), 1);
    wizard.back().unwrap();
    assert_eq!(wizard.state(), WizardState::Step1Captured);
    assert_eq!(camera.live_tracks(), 0);
}

#[tokio::test]
async fn test_upload_without_camera() {
    let camera = FakeCamera::unavailable();
    let mut wizard = wizard(camera.clone(), FakeApi::new());

    match wizard.enter().await {
        StreamStatus::Unavailable(reason) => assert!(reason.contains("permission denied")),
        StreamStatus::Live => panic!("camera should be unavailable"),
    }
    assert_eq!(wizard.state(), WizardState::Step1Live);
    assert!(!wizard.has_live_stream());
    assert!(wizard.capture().is_err());

    wizard.upload(png_bytes()).unwrap();
    let photo = wizard.session().ingredients_image.clone().unwrap();
    assert_eq!(photo.mime(), "image/png");
    assert_eq!(photo.source(), ImageSource::FileUpload);

    assert!(matches!(wizard.advance().await.unwrap(), StreamStatus::Unavailable(_)));
    wizard.upload(png_bytes()).unwrap();
    assert_eq!(wizard.state(), WizardState::Step2Captured);
}

#[tokio::test]
async fn test_upload_rejects_non_images() {
    let mut wizard = wizard(FakeCamera::new(), FakeApi::new());
    wizard.enter().await;
    assert!(wizard.upload(b"not an image".to_vec()).is_err());
    assert_eq!(wizard.state(), WizardState::Step1Live);
}

#[tokio::test]
async fn test_failed_submit_keeps_photos() {
    let api = FakeApi::new();
    api.fail_analyze.store(true, Ordering::SeqCst);
    let mut wizard = wizard(FakeCamera::new(), api.clone());
    wizard.enter().await;
    wizard.capture().unwrap();
    wizard.advance().await.unwrap();
    wizard.capture().unwrap();

    let err = wizard.submit().await.unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(wizard.state(), WizardState::Step2Captured);
    assert!(wizard.session().ingredients_image.is_some());
    assert!(wizard.session().nutrition_image.is_some());

    api.fail_analyze.store(false, Ordering::SeqCst);
    wizard.submit().await.unwrap();
    assert_eq!(wizard.state(), WizardState::Completed);
    assert_eq!(api.analyze_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_second_submit_while_submitting_is_rejected() {
    let mut wizard = wizard(FakeCamera::new(), FakeApi::new());
    wizard.enter().await;
    wizard.capture().unwrap();
    wizard.advance().await.unwrap();
    wizard.capture().unwrap();

    let submission = wizard.begin_submit().unwrap();
    assert_eq!(wizard.state(), WizardState::Submitting);
    assert!(matches!(wizard.begin_submit(), Err(ScanError::SubmissionInFlight)));
    assert!(wizard.back().is_err());
    assert_eq!(submission.ingredients_image.mime(), "image/jpeg");
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_submit_can_be_retried() {
    let api = FakeApi::new();
    *api.analyze_latency.lock() = Duration::from_secs(30);
    let mut wizard = wizard(FakeCamera::new(), api.clone());
    wizard.enter().await;
    wizard.capture().unwrap();
    wizard.advance().await.unwrap();
    wizard.capture().unwrap();

    let abandoned = tokio::time::timeout(Duration::from_secs(1), wizard.submit()).await;
    assert!(abandoned.is_err());
    assert_eq!(wizard.state(), WizardState::Step2Captured);
    assert!(wizard.session().ingredients_image.is_some());
    assert!(wizard.session().nutrition_image.is_some());

    *api.analyze_latency.lock() = Duration::ZERO;
    wizard.submit().await.unwrap();
    assert_eq!(wizard.state(), WizardState::Completed);
    assert_eq!(api.analyze_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_exit_releases_stream() {
    let camera = FakeCamera::new();
    let mut wizard = wizard(camera.clone(), FakeApi::new());
    wizard.enter().await;
    assert_eq!(camera.live_tracks(), 1);

    wizard.exit();
    assert_eq!(wizard.state(), WizardState::Idle);
    assert_eq!(camera.live_tracks(), 0);
    assert!(!wizard.is_sampling());
}

#[tokio::test]
async fn test_drop_releases_stream() {
    let camera = FakeCamera::new();
    {
        let mut wizard = wizard(camera.clone(), FakeApi::new());
        wizard.enter().await;
        assert_eq!(camera.live_tracks(), 1);
    }
    assert_eq!(camera.live_tracks(), 0);
}

#[derive(Debug, Clone)]
enum Action {
    Enter,
    Capture,
    Upload,
    Retake,
    Advance,
    Back,
    Submit,
}

fn action() -> impl Strategy<Value = Action> {
    prop_oneof![
        Just(Action::Enter),
        Just(Action::Capture),
        Just(Action::Upload),
        Just(Action::Retake),
        Just(Action::Advance),
        Just(Action::Back),
        Just(Action::Submit),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_at_most_one_stream_and_none_after_exit(actions in prop::collection::vec(action(), 1..40)) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let (max_live, after_exit) = runtime.block_on(async {
            let camera = FakeCamera::new();
            let mut wizard = wizard(camera.clone(), FakeApi::new());
            let mut max_live = 0;
            for action in actions {
                match action {
                    Action::Enter => { wizard.enter().await; }
                    Action::Capture => { let _ = wizard.capture(); }
                    Action::Upload => { let _ = wizard.upload(png_bytes()); }
                    Action::Retake => { let _ = wizard.retake().await; }
                    Action::Advance => { let _ = wizard.advance().await; }
                    Action::Back => { let _ = wizard.back(); }
                    Action::Submit => { let _ = wizard.submit().await; }
                }
                max_live = max_live.max(camera.live_tracks());
            }
            wizard.exit();
            (max_live, camera.live_tracks())
        });
        prop_assert!(max_live <= 1);
        prop_assert_eq!(after_exit, 0);
    }
}
