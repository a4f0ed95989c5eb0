//! Debounced, latest-wins scheduling of classification requests.
//!
//! Every text change starts a new generation. The previous generation's
//! token is cancelled and replaced under one lock before the new generation
//! begins waiting, so at most one quiet-period timer is ever live. A
//! generation publishes only while it is still the latest one; results from
//! superseded generations are dropped without touching the published state.

use std::{
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use serde::Serialize;
use tokio::{
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::{
    level::ClassificationResult,
    service::{PolitenessAnalyzer, ServiceError, stage},
};

/// Quiet period used when none is configured.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(800);

pub const RUNNING_INFERENCE: &str = "Running inference...";
pub const ANALYSIS_ERROR: &str = "Analysis error";

/// Externally visible analysis state.
///
/// Serialises as `{"status": .., "level": .., "elapsedMs": ..}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisState {
    pub status: String,
    pub level: String,
    pub elapsed_ms: String,
}

impl AnalysisState {
    /// Nothing to show: empty status, level and timing.
    #[must_use]
    pub fn cleared() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_status(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_result(result: &ClassificationResult) -> Self {
        Self {
            status: String::new(),
            level: result.level.label().to_owned(),
            elapsed_ms: format!("{} ms", result.elapsed_ms()),
        }
    }
}

/// How a generation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Published,
    Superseded,
}

#[derive(Debug, Default)]
struct Generation {
    id: u64,
    token: CancellationToken,
    task: Option<JoinHandle<Outcome>>,
}

struct Shared {
    analyzer: Arc<dyn PolitenessAnalyzer>,
    quiet_period: Duration,
    generation: Mutex<Generation>,
    state: watch::Sender<AnalysisState>,
}

impl Shared {
    fn generation(&self) -> MutexGuard<'_, Generation> {
        // Every critical section leaves the generation consistent.
        self.generation
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes `state` only if `id` is still the live generation.
    fn publish_if_current(&self, id: u64, state: AnalysisState) -> Outcome {
        let generation = self.generation();
        if generation.id != id || generation.token.is_cancelled() {
            tracing::debug!(generation = id, "dropping superseded state");
            return Outcome::Superseded;
        }
        self.state.send_replace(state);
        Outcome::Published
    }

    async fn run(self: Arc<Self>, id: u64, token: CancellationToken, text: String) -> Outcome {
        if text.trim().is_empty() {
            return self.publish_if_current(id, AnalysisState::cleared());
        }

        tokio::select! {
            biased;
            () = token.cancelled() => {
                tracing::debug!(generation = id, "debounce abandoned");
                return Outcome::Superseded;
            }
            () = tokio::time::sleep(self.quiet_period) => {}
        }

        if self.publish_if_current(id, AnalysisState::with_status(RUNNING_INFERENCE))
            == Outcome::Superseded
        {
            return Outcome::Superseded;
        }
        tracing::debug!(generation = id, "running inference");

        let state = match self.analyzer.analyze(&text).await {
            Ok(result) => AnalysisState::from_result(&result),
            Err(error) => {
                if !token.is_cancelled() {
                    tracing::warn!(generation = id, %error, "analysis failed");
                }
                AnalysisState::with_status(ANALYSIS_ERROR)
            }
        };
        self.publish_if_current(id, state)
    }
}

/// Turns a stream of text changes into debounced classification requests.
///
/// ```
/// use std::{sync::Arc, time::Duration};
/// use politeness_guard::{
///     Orchestrator,
///     tests::support::ScriptedAnalyzer,
/// };
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let analyzer = Arc::new(ScriptedAnalyzer::default());
/// let orchestrator = Orchestrator::new(analyzer, Duration::from_millis(5));
/// orchestrator.on_text_changed("");
/// orchestrator.wait_idle().await;
/// assert_eq!(orchestrator.state().level, "");
/// # }
/// ```
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    #[must_use]
    pub fn new(analyzer: Arc<dyn PolitenessAnalyzer>, quiet_period: Duration) -> Self {
        Self {
            shared: Arc::new(Shared {
                analyzer,
                quiet_period,
                generation: Mutex::new(Generation::default()),
                state: watch::Sender::new(AnalysisState::cleared()),
            }),
        }
    }

    #[must_use]
    pub fn quiet_period(&self) -> Duration {
        self.shared.quiet_period
    }

    /// Most recently published state.
    #[must_use]
    pub fn state(&self) -> AnalysisState {
        self.shared.state.borrow().clone()
    }

    /// Receiver observing every published state.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<AnalysisState> {
        self.shared.state.subscribe()
    }

    /// Id of the latest generation; `0` before the first event.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.generation().id
    }

    /// Records a text change and schedules its classification.
    ///
    /// Returns immediately with the new generation id. Must be called from
    /// within a Tokio runtime.
    pub fn on_text_changed(&self, text: impl Into<String>) -> u64 {
        let text = text.into();
        let mut generation = self.shared.generation();
        generation.token.cancel();
        generation.id += 1;
        generation.token = CancellationToken::new();

        let id = generation.id;
        let task = Arc::clone(&self.shared).run(id, generation.token.clone(), text);
        generation.task = Some(tokio::spawn(task));
        tracing::debug!(generation = id, "scheduled analysis");
        id
    }

    /// Waits for the latest generation to finish.
    ///
    /// Returns `None` if there is nothing to wait for or the task panicked.
    pub async fn wait_idle(&self) -> Option<Outcome> {
        let task = self.shared.generation().task.take()?;
        task.await.ok()
    }

    /// Eagerly initializes the analyzer.
    ///
    /// # Errors
    ///
    /// Returns the initialization error after publishing
    /// `"Initialization failed"`.
    pub async fn initialize(&self) -> Result<(), ServiceError> {
        let result = self.shared.analyzer.initialize().await;
        if let Err(error) = &result {
            tracing::warn!(%error, "analyzer initialization failed");
            self.shared
                .state
                .send_replace(AnalysisState::with_status(stage::INITIALIZATION_FAILED));
        }
        result
    }

    /// Forwards initialization stage strings into the published status.
    pub fn follow_initialization(&self, mut stages: broadcast::Receiver<String>) -> JoinHandle<()> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            loop {
                match stages.recv().await {
                    Ok(stage) => shared.state.send_modify(|state| state.status = stage),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "status forwarding lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shared.generation().token.cancel();
    }
}
