//! Lazily initialised inference service.
//!
//! [`InferenceService`] owns the backend, the device list, and the single
//! bound session. Initialization runs at most once even under concurrent
//! first calls: device enumeration is guarded by a [`OnceCell`] and session
//! binding happens under the write half of a [`RwLock`]. Forward passes hold
//! the read half, so a rebind waits for in-flight runs and blocks new ones.
//!
//! Stage strings describing initialization progress are broadcast on a
//! status channel for presentation code to display.

use std::{sync::Arc, time::Instant};

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{OnceCell, RwLock, RwLockReadGuard, broadcast, watch};

use crate::{
    backend::{self, BackendError, ClassifierBackend, DeviceDescriptor, ModelArtefact},
    encoder::{DEFAULT_MAX_SEQUENCE_LENGTH, Encoder},
    level::ClassificationResult,
};

/// Initialization stage strings published on the status channel.
pub mod stage {
    use crate::backend::DeviceDescriptor;

    pub const ENUMERATING_DEVICES: &str = "Enumerating devices...";
    pub const READY_FOR_DEVICE_SELECTION: &str = "Ready for device selection";
    pub const MODEL_READY: &str = "Model ready";
    pub const INITIALIZATION_FAILED: &str = "Initialization failed";

    #[must_use]
    pub fn loading_model(device: &DeviceDescriptor) -> String {
        format!("Loading model with {}...", device.name)
    }
}

const STATUS_CHANNEL_CAPACITY: usize = 32;

/// Device id reported when no default device can be chosen.
const DEFAULT_DEVICE: &str = "default";

/// Lifecycle of an [`InferenceService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    PreInitializing,
    DeviceReady,
    SessionBound,
}

/// Errors returned by [`InferenceService`].
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("background inference task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Settings for [`InferenceService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub model: ModelArtefact,
    pub max_sequence_length: usize,
    /// Device id bound by default; the first enumerated device when `None`.
    pub preferred_device: Option<String>,
}

impl ServiceConfig {
    #[must_use]
    pub fn new(model: ModelArtefact) -> Self {
        Self {
            model,
            max_sequence_length: DEFAULT_MAX_SEQUENCE_LENGTH,
            preferred_device: None,
        }
    }
}

/// Asynchronous text classifier consumed by the orchestrator.
#[async_trait]
pub trait PolitenessAnalyzer: Send + Sync {
    /// Classifies `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization or inference fails.
    async fn analyze(&self, text: &str) -> Result<ClassificationResult, ServiceError>;

    /// Eagerly performs any deferred initialization.
    ///
    /// # Errors
    ///
    /// Returns an error if initialization fails.
    async fn initialize(&self) -> Result<(), ServiceError> {
        Ok(())
    }
}

struct Binding<S> {
    device: DeviceDescriptor,
    session: Arc<S>,
}

/// Classification service with lazy, once-only initialization.
pub struct InferenceService<B: ClassifierBackend> {
    backend: Arc<B>,
    model: ModelArtefact,
    encoder: Encoder,
    preferred_device: Option<String>,
    devices: OnceCell<Arc<[DeviceDescriptor]>>,
    binding: RwLock<Option<Binding<B::Session>>>,
    phase: watch::Sender<Phase>,
    status: broadcast::Sender<String>,
}

impl<B: ClassifierBackend> InferenceService<B> {
    #[must_use]
    pub fn new(backend: B, config: ServiceConfig) -> Self {
        let (status, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            backend: Arc::new(backend),
            model: config.model,
            encoder: Encoder::new(config.max_sequence_length),
            preferred_device: config.preferred_device,
            devices: OnceCell::new(),
            binding: RwLock::new(None),
            phase: watch::Sender::new(Phase::Uninitialized),
            status,
        }
    }

    /// Current lifecycle phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    /// Receiver that observes every phase change.
    #[must_use]
    pub fn watch_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    /// Receiver for initialization stage strings sent after this call.
    #[must_use]
    pub fn subscribe_status(&self) -> broadcast::Receiver<String> {
        self.status.subscribe()
    }

    /// Device the session is currently bound to.
    pub async fn current_device(&self) -> Option<DeviceDescriptor> {
        self.binding
            .read()
            .await
            .as_ref()
            .map(|binding| binding.device.clone())
    }

    /// Enumerates devices once and caches the result.
    ///
    /// # Errors
    ///
    /// Returns `Enumeration` if the backend cannot list its devices. A failed
    /// enumeration is not cached and may be retried.
    pub async fn available_devices(&self) -> Result<Arc<[DeviceDescriptor]>, ServiceError> {
        self.devices
            .get_or_try_init(|| self.enumerate_devices())
            .await
            .map(Arc::clone)
    }

    /// Binds the default device unless a session is already bound.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` when no default device exists and
    /// `ModelLoadFailure` when the model cannot be loaded.
    pub async fn initialize(&self) -> Result<(), ServiceError> {
        let devices = self.available_devices().await?;
        let mut binding = self.binding.write().await;
        if binding.is_some() {
            return Ok(());
        }
        let device = match self.default_device(&devices) {
            Ok(device) => device,
            Err(error) => {
                self.phase.send_replace(Phase::Uninitialized);
                self.report(stage::INITIALIZATION_FAILED);
                return Err(error.into());
            }
        };
        self.bind_locked(&mut binding, device).await
    }

    /// Rebinds the session to the enumerated device with `id`.
    ///
    /// The previous session is released before the new one is built. If the
    /// new binding fails the previous device is bound again; should that also
    /// fail the service returns to [`Phase::Uninitialized`].
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` for unknown ids, leaving the current
    /// session untouched, and the binding error otherwise.
    pub async fn select_device(&self, id: &str) -> Result<(), ServiceError> {
        let devices = self.available_devices().await?;
        let device = devices
            .iter()
            .find(|device| device.id == id)
            .cloned()
            .ok_or_else(|| BackendError::BackendUnavailable {
                device: id.to_owned(),
            })?;
        let mut binding = self.binding.write().await;
        if binding
            .as_ref()
            .is_some_and(|current| current.device == device)
        {
            return Ok(());
        }
        self.bind_locked(&mut binding, device).await
    }

    /// Classifies `text`, initializing first if needed.
    ///
    /// Empty or whitespace-only text returns [`ClassificationResult::empty`]
    /// without touching the backend. The reported duration covers the
    /// forward pass only.
    ///
    /// # Errors
    ///
    /// Returns initialization errors, `NotInitialized` if the session was
    /// unbound by a failed rebind, and inference errors.
    pub async fn analyze(&self, text: &str) -> Result<ClassificationResult, ServiceError> {
        if text.trim().is_empty() {
            return Ok(ClassificationResult::empty());
        }
        let binding = self.bound().await?;
        let session = binding
            .as_ref()
            .map(|binding| Arc::clone(&binding.session))
            .ok_or(BackendError::NotInitialized)?;
        let input = self.encoder.encode(text);

        let started = Instant::now();
        let prediction =
            tokio::task::spawn_blocking(move || backend::classify(session.as_ref(), &input))
                .await??;
        let elapsed = started.elapsed();
        drop(binding);

        let result = ClassificationResult::new(prediction.level(), elapsed);
        tracing::debug!(
            level = %result.level,
            confidence = prediction.confidence,
            elapsed_ms = result.elapsed_ms(),
            "classified text"
        );
        Ok(result)
    }

    async fn bound(&self) -> Result<RwLockReadGuard<'_, Option<Binding<B::Session>>>, ServiceError> {
        let binding = self.binding.read().await;
        if binding.is_some() {
            return Ok(binding);
        }
        drop(binding);
        self.initialize().await?;
        Ok(self.binding.read().await)
    }

    async fn enumerate_devices(&self) -> Result<Arc<[DeviceDescriptor]>, ServiceError> {
        self.phase.send_replace(Phase::PreInitializing);
        self.report(stage::ENUMERATING_DEVICES);
        let backend = Arc::clone(&self.backend);
        let enumerated = match tokio::task::spawn_blocking(move || backend.enumerate_devices()).await
        {
            Ok(Ok(devices)) => devices,
            Ok(Err(error)) => return Err(self.fail_pre_initialization(error.into())),
            Err(error) => return Err(self.fail_pre_initialization(error.into())),
        };
        tracing::info!(count = enumerated.len(), "enumerated compute devices");
        self.phase.send_replace(Phase::DeviceReady);
        self.report(stage::READY_FOR_DEVICE_SELECTION);
        Ok(enumerated.into())
    }

    fn fail_pre_initialization(&self, error: ServiceError) -> ServiceError {
        tracing::warn!(%error, "device enumeration failed");
        self.phase.send_replace(Phase::Uninitialized);
        self.report(stage::INITIALIZATION_FAILED);
        error
    }

    fn default_device(&self, devices: &[DeviceDescriptor]) -> Result<DeviceDescriptor, BackendError> {
        match &self.preferred_device {
            Some(id) => devices
                .iter()
                .find(|device| &device.id == id)
                .cloned()
                .ok_or_else(|| BackendError::BackendUnavailable { device: id.clone() }),
            None => devices
                .first()
                .cloned()
                .ok_or_else(|| BackendError::BackendUnavailable {
                    device: DEFAULT_DEVICE.to_owned(),
                }),
        }
    }

    async fn bind_locked(
        &self,
        slot: &mut Option<Binding<B::Session>>,
        device: DeviceDescriptor,
    ) -> Result<(), ServiceError> {
        self.phase.send_replace(Phase::DeviceReady);
        self.report(stage::loading_model(&device));
        // Release before building so two sessions never hold the model.
        let previous = slot.take().map(|released| released.device);

        let error = match self.load_session(device.clone()).await {
            Ok(session) => {
                tracing::info!(device = %device, "classification session bound");
                *slot = Some(Binding { device, session });
                self.phase.send_replace(Phase::SessionBound);
                self.report(stage::MODEL_READY);
                return Ok(());
            }
            Err(error) => error,
        };
        tracing::warn!(device = %device, %error, "failed to bind classification session");

        if let Some(previous) = previous {
            match self.load_session(previous.clone()).await {
                Ok(session) => {
                    tracing::info!(device = %previous, "restored previous classification session");
                    *slot = Some(Binding {
                        device: previous,
                        session,
                    });
                }
                Err(restore_error) => {
                    tracing::warn!(device = %previous, error = %restore_error, "failed to restore previous session");
                }
            }
        }
        let phase = if slot.is_some() {
            Phase::SessionBound
        } else {
            Phase::Uninitialized
        };
        self.phase.send_replace(phase);
        self.report(stage::INITIALIZATION_FAILED);
        Err(error)
    }

    async fn load_session(&self, device: DeviceDescriptor) -> Result<Arc<B::Session>, ServiceError> {
        let backend = Arc::clone(&self.backend);
        let model = self.model.clone();
        let session = tokio::task::spawn_blocking(move || backend.bind(&device, &model)).await??;
        Ok(Arc::new(session))
    }

    fn report(&self, stage: impl Into<String>) {
        let stage = stage.into();
        tracing::info!(stage = %stage, "initialization progress");
        // No subscribers is fine; status is advisory.
        let _ = self.status.send(stage);
    }
}

#[async_trait]
impl<B: ClassifierBackend> PolitenessAnalyzer for InferenceService<B> {
    async fn analyze(&self, text: &str) -> Result<ClassificationResult, ServiceError> {
        InferenceService::analyze(self, text).await
    }

    async fn initialize(&self) -> Result<(), ServiceError> {
        InferenceService::initialize(self).await
    }
}
