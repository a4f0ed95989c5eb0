//! ONNX Runtime backend for the polite-guard classifier.
//!
//! Execution providers compiled into `ort` and usable on this machine are
//! exposed as devices; binding a device creates a session with only that
//! provider registered.
mod config;
mod devices;
mod errors;
mod session;

pub use config::{InputNames, OnnxBackendConfig};
pub use devices::ExecutionTarget;
pub use errors::OnnxBackendError;
pub use session::OnnxSession;

use crate::backend::{BackendError, ClassifierBackend, DeviceDescriptor, ModelArtefact};

/// Backend running the classifier through ONNX Runtime.
///
/// # Examples
/// ```no_run
/// use politeness_guard::backend::{ClassifierBackend, ModelArtefact, onnx::OnnxBackend};
///
/// # fn main() -> Result<(), politeness_guard::backend::BackendError> {
/// let backend = OnnxBackend::default();
/// let devices = backend.enumerate_devices()?;
/// let session = backend.bind(&devices[0], &ModelArtefact::new("/models/polite-guard/model.onnx"))?;
/// # let _ = session;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct OnnxBackend {
    config: OnnxBackendConfig,
}

impl OnnxBackend {
    #[must_use]
    pub fn new(config: OnnxBackendConfig) -> Self {
        Self { config }
    }
}

impl ClassifierBackend for OnnxBackend {
    type Session = OnnxSession;

    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, BackendError> {
        let targets = devices::available_targets()?;
        Ok(targets.into_iter().map(ExecutionTarget::descriptor).collect())
    }

    fn bind(
        &self,
        device: &DeviceDescriptor,
        model: &ModelArtefact,
    ) -> Result<Self::Session, BackendError> {
        let target =
            ExecutionTarget::from_id(&device.id).ok_or_else(|| BackendError::BackendUnavailable {
                device: device.id.clone(),
            })?;
        model.verify()?;
        OnnxSession::load(model, target, &self.config).map_err(|error| {
            BackendError::ModelLoadFailure {
                path: model.path.clone(),
                source: Box::new(error),
            }
        })
    }
}
