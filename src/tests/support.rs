//! Test doubles for the backend and analyzer seams.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        Arc, Mutex, PoisonError,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    backend::{BackendError, ClassifierBackend, ClassifierSession, DeviceDescriptor, ModelArtefact},
    encoder::EncodedInput,
    level::{ClassificationResult, PolitenessLevel},
    service::{PolitenessAnalyzer, ServiceError},
};

#[expect(clippy::float_arithmetic, reason = "tolerance comparison")]
#[must_use]
pub fn approx_eq(a: f32, b: f32, tol: f32) -> bool {
    (a - b).abs() < tol
}

/// Number of times each backend entry point was invoked.
#[derive(Debug, Default)]
pub struct CallCounts {
    enumerate: AtomicUsize,
    bind: AtomicUsize,
    run: AtomicUsize,
    live_sessions: AtomicUsize,
    peak_sessions: AtomicUsize,
    run_devices: Mutex<Vec<String>>,
}

impl CallCounts {
    #[must_use]
    pub fn enumerate(&self) -> usize {
        self.enumerate.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn bind(&self) -> usize {
        self.bind.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn run(&self) -> usize {
        self.run.load(Ordering::SeqCst)
    }

    /// Most sessions alive at the same time.
    #[must_use]
    pub fn peak_sessions(&self) -> usize {
        self.peak_sessions.load(Ordering::SeqCst)
    }

    /// Device id of the session behind each forward pass, in call order.
    #[must_use]
    pub fn run_devices(&self) -> Vec<String> {
        self.run_devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn session_opened(&self) {
        let live = self.live_sessions.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_sessions.fetch_max(live, Ordering::SeqCst);
    }
}

/// Backend returning fixed scores, with injectable failures.
#[derive(Debug)]
pub struct StubBackend {
    devices: Vec<DeviceDescriptor>,
    scores: Vec<f32>,
    failing_devices: HashSet<String>,
    fail_enumeration: bool,
    check_artefact: bool,
    bind_delay: Duration,
    bind_limit: Option<usize>,
    calls: Arc<CallCounts>,
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new(vec![
            DeviceDescriptor::new("gpu", "Stub GPU"),
            DeviceDescriptor::new("cpu", "Stub CPU"),
        ])
    }
}

impl StubBackend {
    /// Backend exposing `devices` whose sessions score text as polite.
    #[must_use]
    pub fn new(devices: Vec<DeviceDescriptor>) -> Self {
        Self {
            devices,
            scores: vec![3.0, -3.0],
            failing_devices: HashSet::new(),
            fail_enumeration: false,
            check_artefact: false,
            bind_delay: Duration::ZERO,
            bind_limit: None,
            calls: Arc::new(CallCounts::default()),
        }
    }

    #[must_use]
    pub fn with_scores(mut self, scores: Vec<f32>) -> Self {
        self.scores = scores;
        self
    }

    /// Binding `id` fails with `ModelLoadFailure`.
    #[must_use]
    pub fn failing_bind(mut self, id: &str) -> Self {
        self.failing_devices.insert(id.to_owned());
        self
    }

    #[must_use]
    pub fn failing_enumeration(mut self) -> Self {
        self.fail_enumeration = true;
        self
    }

    /// Binding verifies the model artefact first.
    #[must_use]
    pub fn checking_artefact(mut self) -> Self {
        self.check_artefact = true;
        self
    }

    /// Blocks each bind for `delay`.
    #[must_use]
    pub fn with_bind_delay(mut self, delay: Duration) -> Self {
        self.bind_delay = delay;
        self
    }

    /// Every bind after the first `limit` fails with `ModelLoadFailure`.
    #[must_use]
    pub fn with_bind_limit(mut self, limit: usize) -> Self {
        self.bind_limit = Some(limit);
        self
    }

    /// Shared handle to the call counters.
    #[must_use]
    pub fn calls(&self) -> Arc<CallCounts> {
        Arc::clone(&self.calls)
    }
}

impl ClassifierBackend for StubBackend {
    type Session = StubSession;

    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, BackendError> {
        self.calls.enumerate.fetch_add(1, Ordering::SeqCst);
        if self.fail_enumeration {
            return Err(BackendError::Enumeration("stub enumeration failed".into()));
        }
        Ok(self.devices.clone())
    }

    fn bind(
        &self,
        device: &DeviceDescriptor,
        model: &ModelArtefact,
    ) -> Result<Self::Session, BackendError> {
        let attempt = self.calls.bind.fetch_add(1, Ordering::SeqCst) + 1;
        if !self.bind_delay.is_zero() {
            std::thread::sleep(self.bind_delay);
        }
        if !self.devices.contains(device) {
            return Err(BackendError::BackendUnavailable {
                device: device.id.clone(),
            });
        }
        if self.check_artefact {
            model.verify()?;
        }
        let exhausted = self.bind_limit.is_some_and(|limit| attempt > limit);
        if exhausted || self.failing_devices.contains(&device.id) {
            return Err(BackendError::ModelLoadFailure {
                path: model.path.clone(),
                source: format!("stub refused device {}", device.id).into(),
            });
        }
        self.calls.session_opened();
        Ok(StubSession {
            device: device.clone(),
            scores: self.scores.clone(),
            calls: Arc::clone(&self.calls),
        })
    }
}

/// Session bound by [`StubBackend`].
#[derive(Debug)]
pub struct StubSession {
    device: DeviceDescriptor,
    scores: Vec<f32>,
    calls: Arc<CallCounts>,
}

impl StubSession {
    #[must_use]
    pub fn device(&self) -> &DeviceDescriptor {
        &self.device
    }
}

impl ClassifierSession for StubSession {
    fn run(&self, _input: &EncodedInput) -> Result<Vec<f32>, BackendError> {
        self.calls.run.fetch_add(1, Ordering::SeqCst);
        self.calls
            .run_devices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(self.device.id.clone());
        Ok(self.scores.clone())
    }
}

impl Drop for StubSession {
    fn drop(&mut self) {
        self.calls.live_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug, Clone, Copy)]
struct Script {
    delay: Duration,
    level: Option<PolitenessLevel>,
}

/// Analyzer answering from a per-text script after a per-text delay.
///
/// Unscripted text resolves immediately to [`PolitenessLevel::Neutral`].
#[derive(Debug, Default)]
pub struct ScriptedAnalyzer {
    scripts: HashMap<String, Script>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAnalyzer {
    /// Answers `text` with `level` after `delay`.
    #[must_use]
    pub fn respond(mut self, text: &str, level: PolitenessLevel, delay: Duration) -> Self {
        self.scripts.insert(
            text.to_owned(),
            Script {
                delay,
                level: Some(level),
            },
        );
        self
    }

    /// Fails `text` after `delay`.
    #[must_use]
    pub fn fail(mut self, text: &str, delay: Duration) -> Self {
        self.scripts
            .insert(text.to_owned(), Script { delay, level: None });
        self
    }

    /// Texts analysed so far, in call order.
    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PolitenessAnalyzer for ScriptedAnalyzer {
    async fn analyze(&self, text: &str) -> Result<ClassificationResult, ServiceError> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_owned());
        let script = self.scripts.get(text).copied().unwrap_or(Script {
            delay: Duration::ZERO,
            level: Some(PolitenessLevel::Neutral),
        });
        if !script.delay.is_zero() {
            tokio::time::sleep(script.delay).await;
        }
        match script.level {
            Some(level) => Ok(ClassificationResult::new(level, script.delay)),
            None => Err(BackendError::Inference("scripted failure".into()).into()),
        }
    }
}
