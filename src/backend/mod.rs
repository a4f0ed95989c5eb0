//! Classification backends.
//!
//! A backend enumerates the compute devices it can run on and binds a
//! [`ClassifierSession`] for one of them. Sessions run the forward pass and
//! return raw per-class scores; [`classify`] turns those scores into a
//! [`Prediction`].

pub mod artefact;
pub mod decision;
#[cfg(feature = "onnx")]
pub mod onnx;

use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use artefact::{ArtefactError, ModelArtefact};
pub use decision::{Prediction, PredictedClass};

use crate::encoder::EncodedInput;

/// Boxed error carried across the backend seam.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by backends and by session binding.
#[derive(Debug, Error)]
pub enum BackendError {
    /// The requested device (or a default one) is not among the enumerated
    /// devices.
    #[error("compute device \"{device}\" is not available")]
    BackendUnavailable { device: String },
    /// The model artefact is missing, corrupt, or rejected by the runtime.
    #[error("failed to load model from {path}: {source}")]
    ModelLoadFailure {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
    /// A forward pass was requested before any session was bound.
    #[error("no classification session is bound")]
    NotInitialized,
    #[error("failed to enumerate compute devices: {0}")]
    Enumeration(#[source] BoxError),
    #[error("failed to run inference: {0}")]
    Inference(#[source] BoxError),
    #[error("model returned {actual} scores but expected {expected}")]
    UnexpectedScoreCount { expected: usize, actual: usize },
}

impl From<ArtefactError> for BackendError {
    fn from(error: ArtefactError) -> Self {
        let path = match &error {
            ArtefactError::Io { path, .. } | ArtefactError::ChecksumMismatch { path, .. } => {
                path.clone()
            }
        };
        Self::ModelLoadFailure {
            path,
            source: Box::new(error),
        }
    }
}

/// A compute device a backend can bind sessions to.
///
/// `id` is opaque to everything but the backend that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    pub id: String,
    pub name: String,
}

impl DeviceDescriptor {
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// Runtime that can host classification sessions.
pub trait ClassifierBackend: Send + Sync + 'static {
    /// Session type produced by [`ClassifierBackend::bind`].
    type Session: ClassifierSession;

    /// Lists the devices available in the current environment.
    ///
    /// Implementations must be side-effect free so repeated calls are safe.
    ///
    /// # Errors
    ///
    /// Returns `Enumeration` if the runtime cannot be queried.
    fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>, BackendError>;

    /// Builds a session for `model` on `device`.
    ///
    /// # Errors
    ///
    /// Returns `BackendUnavailable` if the backend does not recognise
    /// `device` and `ModelLoadFailure` if the model cannot be loaded.
    fn bind(
        &self,
        device: &DeviceDescriptor,
        model: &ModelArtefact,
    ) -> Result<Self::Session, BackendError>;
}

/// A bound model ready to run forward passes.
pub trait ClassifierSession: Send + Sync + 'static {
    /// Runs one forward pass and returns the raw per-class scores.
    ///
    /// # Errors
    ///
    /// Returns `Inference` when the runtime fails.
    fn run(&self, input: &EncodedInput) -> Result<Vec<f32>, BackendError>;
}

/// Runs `session` on `input` and applies the decision rule.
///
/// # Errors
///
/// Propagates session failures and `UnexpectedScoreCount`.
pub fn classify<S>(session: &S, input: &EncodedInput) -> Result<Prediction, BackendError>
where
    S: ClassifierSession + ?Sized,
{
    let scores = session.run(input)?;
    Prediction::from_scores(&scores)
}
