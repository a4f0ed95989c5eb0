use thiserror::Error;

use crate::backend::BackendError;

/// Errors produced by the ONNX Runtime backend.
#[derive(Debug, Error)]
pub enum OnnxBackendError {
    #[error("failed to query execution provider {provider}: {source}")]
    QueryProvider {
        provider: &'static str,
        #[source]
        source: ort::Error,
    },
    #[error("failed to construct ONNX session builder: {0}")]
    CreateSessionBuilder(#[source] ort::Error),
    #[error("failed to register execution provider {provider}: {source}")]
    RegisterProvider {
        provider: &'static str,
        #[source]
        source: ort::Error,
    },
    #[error("failed to create ONNX session: {0}")]
    CreateSession(#[source] ort::Error),
    #[error("failed to convert encoded text into tensor: {0}")]
    EncodeTensor(#[source] ort::Error),
    #[error("session mutex was poisoned by a previous panic")]
    SessionPoisoned,
    #[error("failed to run inference: {0}")]
    Inference(#[source] ort::Error),
    #[error("ONNX output \"{name}\" missing from session results")]
    OutputMissing { name: String },
}

impl From<OnnxBackendError> for BackendError {
    fn from(error: OnnxBackendError) -> Self {
        match error {
            OnnxBackendError::QueryProvider { .. } => Self::Enumeration(Box::new(error)),
            other => Self::Inference(Box::new(other)),
        }
    }
}
