//! Lifecycle tests for `InferenceService` against a stub backend.

use std::{io::Write, sync::Arc, time::Duration};

use politeness_guard::{
    BackendError, DeviceDescriptor, InferenceService, ModelArtefact, Phase, PolitenessLevel,
    ServiceConfig, ServiceError,
    level::NO_TEXT_DESCRIPTION,
    service::stage,
    tests::support::StubBackend,
};
use rstest::{fixture, rstest};
use tempfile::NamedTempFile;

#[fixture]
fn config() -> ServiceConfig {
    ServiceConfig::new(ModelArtefact::new("polite-guard.onnx"))
}

fn drain(receiver: &mut tokio::sync::broadcast::Receiver<String>) -> Vec<String> {
    std::iter::from_fn(|| receiver.try_recv().ok()).collect()
}

#[rstest]
#[tokio::test]
async fn empty_text_skips_the_backend(config: ServiceConfig) {
    let backend = StubBackend::default();
    let calls = backend.calls();
    let service = InferenceService::new(backend, config);

    for text in ["", "   ", "\n\t"] {
        let result = service
            .analyze(text)
            .await
            .unwrap_or_else(|e| panic!("empty text failed: {e}"));
        assert_eq!(result.level, PolitenessLevel::Neutral);
        assert_eq!(result.description, NO_TEXT_DESCRIPTION);
        assert_eq!(result.elapsed_ms(), 0);
    }
    assert_eq!((calls.enumerate(), calls.bind(), calls.run()), (0, 0, 0));
    assert_eq!(service.phase(), Phase::Uninitialized);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_calls_initialize_once(config: ServiceConfig) {
    let backend = StubBackend::default().with_bind_delay(Duration::from_millis(50));
    let calls = backend.calls();
    let service = InferenceService::new(backend, config);

    let (first, second) = tokio::join!(
        service.analyze("thank you kindly"),
        service.analyze("please help me")
    );
    for result in [first, second] {
        let result = result.unwrap_or_else(|e| panic!("analysis failed: {e}"));
        assert_eq!(result.level, PolitenessLevel::Polite);
    }
    assert_eq!(calls.enumerate(), 1);
    assert_eq!(calls.bind(), 1);
    assert_eq!(calls.run(), 2);
    assert_eq!(service.phase(), Phase::SessionBound);
}

#[rstest]
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn analysis_waits_for_rebind_in_flight(config: ServiceConfig) {
    let backend = StubBackend::default().with_bind_delay(Duration::from_millis(100));
    let calls = backend.calls();
    let service = Arc::new(InferenceService::new(backend, config));
    service
        .initialize()
        .await
        .unwrap_or_else(|e| panic!("initialize failed: {e}"));

    let rebinding = tokio::spawn({
        let service = Arc::clone(&service);
        async move { service.select_device("cpu").await }
    });
    let started = tokio::time::timeout(Duration::from_secs(5), async {
        while calls.bind() < 2 {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    })
    .await;
    assert!(started.is_ok(), "rebind never started");

    let result = service
        .analyze("thank you so much")
        .await
        .unwrap_or_else(|e| panic!("analysis during rebind failed: {e}"));
    assert_eq!(result.level, PolitenessLevel::Polite);
    rebinding
        .await
        .unwrap_or_else(|e| panic!("rebind task panicked: {e}"))
        .unwrap_or_else(|e| panic!("select failed: {e}"));

    assert_eq!(calls.run_devices(), vec!["cpu".to_owned()]);
    assert_eq!(calls.peak_sessions(), 1);
    assert_eq!(calls.bind(), 2);
}

#[rstest]
#[tokio::test]
async fn initialization_reports_stages_in_order(config: ServiceConfig) {
    let service = InferenceService::new(StubBackend::default(), config);
    let mut status = service.subscribe_status();

    service
        .initialize()
        .await
        .unwrap_or_else(|e| panic!("initialize failed: {e}"));

    assert_eq!(
        drain(&mut status),
        vec![
            stage::ENUMERATING_DEVICES.to_owned(),
            stage::READY_FOR_DEVICE_SELECTION.to_owned(),
            "Loading model with Stub GPU...".to_owned(),
            stage::MODEL_READY.to_owned(),
        ]
    );
    assert_eq!(
        service.current_device().await.map(|device| device.id),
        Some("gpu".to_owned())
    );
}

#[rstest]
#[tokio::test]
async fn preferred_device_is_bound_by_default(mut config: ServiceConfig) {
    config.preferred_device = Some("cpu".into());
    let service = InferenceService::new(StubBackend::default(), config);

    service
        .initialize()
        .await
        .unwrap_or_else(|e| panic!("initialize failed: {e}"));
    assert_eq!(
        service.current_device().await,
        Some(DeviceDescriptor::new("cpu", "Stub CPU"))
    );
}

#[rstest]
#[tokio::test]
async fn missing_preferred_device_is_unavailable(mut config: ServiceConfig) {
    config.preferred_device = Some("tpu".into());
    let backend = StubBackend::default();
    let calls = backend.calls();
    let service = InferenceService::new(backend, config);
    let mut status = service.subscribe_status();

    let error = service.analyze("hello there").await;
    assert!(matches!(
        error,
        Err(ServiceError::Backend(BackendError::BackendUnavailable { ref device })) if device == "tpu"
    ));
    assert_eq!(calls.bind(), 0);
    assert_eq!(service.phase(), Phase::Uninitialized);
    assert_eq!(
        drain(&mut status).last().map(String::as_str),
        Some(stage::INITIALIZATION_FAILED)
    );
}

#[rstest]
#[tokio::test]
async fn no_devices_means_no_default(config: ServiceConfig) {
    let service = InferenceService::new(StubBackend::new(Vec::new()), config);
    assert!(matches!(
        service.initialize().await,
        Err(ServiceError::Backend(BackendError::BackendUnavailable { .. }))
    ));
}

#[rstest]
#[tokio::test]
async fn failed_enumeration_can_be_retried(config: ServiceConfig) {
    let backend = StubBackend::default().failing_enumeration();
    let calls = backend.calls();
    let service = InferenceService::new(backend, config);

    for _ in 0..2 {
        assert!(matches!(
            service.available_devices().await,
            Err(ServiceError::Backend(BackendError::Enumeration(_)))
        ));
        assert_eq!(service.phase(), Phase::Uninitialized);
    }
    assert_eq!(calls.enumerate(), 2);
}

#[rstest]
#[tokio::test]
async fn device_selection_reuses_enumeration(config: ServiceConfig) {
    let backend = StubBackend::default();
    let calls = backend.calls();
    let service = InferenceService::new(backend, config);

    service
        .initialize()
        .await
        .unwrap_or_else(|e| panic!("initialize failed: {e}"));
    service
        .select_device("cpu")
        .await
        .unwrap_or_else(|e| panic!("select failed: {e}"));

    assert_eq!(calls.enumerate(), 1);
    assert_eq!(calls.bind(), 2);
    assert_eq!(
        service.current_device().await.map(|device| device.id),
        Some("cpu".to_owned())
    );
    assert_eq!(service.phase(), Phase::SessionBound);
}

#[rstest]
#[tokio::test]
async fn unknown_device_leaves_session_untouched(config: ServiceConfig) {
    let backend = StubBackend::default();
    let calls = backend.calls();
    let service = InferenceService::new(backend, config);
    service
        .initialize()
        .await
        .unwrap_or_else(|e| panic!("initialize failed: {e}"));

    assert!(matches!(
        service.select_device("tpu").await,
        Err(ServiceError::Backend(BackendError::BackendUnavailable { .. }))
    ));
    assert_eq!(calls.bind(), 1);
    assert_eq!(
        service.current_device().await.map(|device| device.id),
        Some("gpu".to_owned())
    );
}

#[rstest]
#[tokio::test]
async fn failed_rebind_rolls_back(config: ServiceConfig) {
    let backend = StubBackend::default().failing_bind("cpu");
    let calls = backend.calls();
    let service = InferenceService::new(backend, config);
    service
        .initialize()
        .await
        .unwrap_or_else(|e| panic!("initialize failed: {e}"));

    assert!(matches!(
        service.select_device("cpu").await,
        Err(ServiceError::Backend(BackendError::ModelLoadFailure { .. }))
    ));
    assert_eq!(calls.bind(), 3);
    assert_eq!(service.phase(), Phase::SessionBound);
    assert_eq!(
        service.current_device().await.map(|device| device.id),
        Some("gpu".to_owned())
    );
    let result = service
        .analyze("still working?")
        .await
        .unwrap_or_else(|e| panic!("analysis after rollback failed: {e}"));
    assert_eq!(result.level, PolitenessLevel::Polite);
}

#[rstest]
#[tokio::test]
async fn failed_rollback_returns_to_uninitialized(config: ServiceConfig) {
    let backend = StubBackend::default().with_bind_limit(1);
    let calls = backend.calls();
    let service = InferenceService::new(backend, config);
    service
        .initialize()
        .await
        .unwrap_or_else(|e| panic!("initialize failed: {e}"));

    assert!(service.select_device("cpu").await.is_err());
    assert_eq!(service.phase(), Phase::Uninitialized);
    assert_eq!(service.current_device().await, None);

    // The device list survives; only binding is retried.
    assert!(service.analyze("hello").await.is_err());
    assert_eq!(calls.enumerate(), 1);
    assert_eq!(calls.bind(), 4);
}

#[rstest]
#[tokio::test]
async fn checksum_mismatch_is_a_load_failure() {
    let mut file = NamedTempFile::new().unwrap_or_else(|e| panic!("create temp file: {e}"));
    writeln!(file, "not really a model").unwrap_or_else(|e| panic!("write model: {e}"));
    let model = ModelArtefact::new(file.path()).with_sha256("00".repeat(32));
    let service = InferenceService::new(
        StubBackend::default().checking_artefact(),
        ServiceConfig::new(model),
    );

    assert!(matches!(
        service.analyze("hello").await,
        Err(ServiceError::Backend(BackendError::ModelLoadFailure { .. }))
    ));
    assert_eq!(service.phase(), Phase::Uninitialized);
}

#[rstest]
#[tokio::test]
async fn malformed_scores_surface_as_errors(config: ServiceConfig) {
    let service = InferenceService::new(
        StubBackend::default().with_scores(vec![0.1, 0.2, 0.7]),
        config,
    );
    assert!(matches!(
        service.analyze("hello").await,
        Err(ServiceError::Backend(BackendError::UnexpectedScoreCount { actual: 3, .. }))
    ));
}

#[rstest]
#[case(vec![-3.0, 3.0], PolitenessLevel::Impolite)]
#[case(vec![0.0, 0.5], PolitenessLevel::Neutral)]
#[case(vec![0.5, 0.0], PolitenessLevel::SomewhatPolite)]
#[tokio::test]
async fn scores_drive_the_reported_level(
    config: ServiceConfig,
    #[case] scores: Vec<f32>,
    #[case] expected: PolitenessLevel,
) {
    let service = InferenceService::new(StubBackend::default().with_scores(scores), config);
    let result = service
        .analyze("some reply")
        .await
        .unwrap_or_else(|e| panic!("analysis failed: {e}"));
    assert_eq!(result.level, expected);
    assert_eq!(result.description, expected.description());
}
