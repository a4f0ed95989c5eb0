//! Execution providers exposed as compute devices.

use ort::{
    execution_providers::{
        CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider,
        DirectMLExecutionProvider, ExecutionProvider,
    },
    session::builder::SessionBuilder,
};

use super::errors::OnnxBackendError;
use crate::backend::DeviceDescriptor;

/// Execution providers queried during enumeration, in preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionTarget {
    Cuda,
    DirectMl,
    CoreMl,
    Cpu,
}

impl ExecutionTarget {
    pub const ALL: [Self; 4] = [Self::Cuda, Self::DirectMl, Self::CoreMl, Self::Cpu];

    #[must_use]
    pub fn id(self) -> &'static str {
        match self {
            Self::Cuda => "cuda",
            Self::DirectMl => "directml",
            Self::CoreMl => "coreml",
            Self::Cpu => "cpu",
        }
    }

    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Cuda => "CUDA",
            Self::DirectMl => "DirectML",
            Self::CoreMl => "CoreML",
            Self::Cpu => "CPU",
        }
    }

    #[must_use]
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|target| target.id() == id)
    }

    #[must_use]
    pub fn descriptor(self) -> DeviceDescriptor {
        DeviceDescriptor::new(self.id(), self.display_name())
    }

    /// Asks the runtime whether this provider can be used in this process.
    ///
    /// # Errors
    ///
    /// Returns `QueryProvider` when the runtime cannot answer.
    pub fn is_available(self) -> Result<bool, OnnxBackendError> {
        let answer = match self {
            Self::Cuda => CUDAExecutionProvider::default().is_available(),
            Self::DirectMl => DirectMLExecutionProvider::default().is_available(),
            Self::CoreMl => CoreMLExecutionProvider::default().is_available(),
            Self::Cpu => CPUExecutionProvider::default().is_available(),
        };
        answer.map_err(|source| OnnxBackendError::QueryProvider {
            provider: self.display_name(),
            source,
        })
    }

    /// Registers this provider, and only this provider, on `builder`.
    ///
    /// # Errors
    ///
    /// Returns `RegisterProvider` if the runtime refuses the provider.
    pub fn register(self, builder: SessionBuilder) -> Result<SessionBuilder, OnnxBackendError> {
        let provider = match self {
            Self::Cuda => CUDAExecutionProvider::default().build(),
            Self::DirectMl => DirectMLExecutionProvider::default().build(),
            Self::CoreMl => CoreMLExecutionProvider::default().build(),
            Self::Cpu => CPUExecutionProvider::default().build(),
        };
        let registered = builder.with_execution_providers([provider.error_on_failure()]);
        registered.map_err(|source| OnnxBackendError::RegisterProvider {
            provider: self.display_name(),
            source,
        })
    }
}

/// Queries every known provider and returns those that are available.
///
/// Providers the runtime cannot answer for are logged and skipped; an error
/// is returned only when no provider gave an answer at all.
///
/// # Errors
///
/// Returns the first query error if every query failed.
pub fn available_targets() -> Result<Vec<ExecutionTarget>, OnnxBackendError> {
    let mut available = Vec::new();
    let mut first_error = None;
    let mut answered = false;
    for target in ExecutionTarget::ALL {
        match target.is_available() {
            Ok(true) => {
                answered = true;
                available.push(target);
            }
            Ok(false) => answered = true,
            Err(error) => {
                tracing::warn!(provider = target.display_name(), %error, "execution provider query failed");
                first_error.get_or_insert(error);
            }
        }
    }
    match (answered, first_error) {
        (false, Some(error)) => Err(error),
        _ => Ok(available),
    }
}
