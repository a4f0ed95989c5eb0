//! Core library entry point.
//! Re-exports public types and traits.
//!
//! Text flows from [`Orchestrator::on_text_changed`] through a debounce to
//! [`InferenceService::analyze`], which encodes it with [`Encoder`] and runs
//! the bound backend session.

pub mod backend;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod encoder;
pub mod level;
pub mod orchestrator;
pub mod responses;
pub mod service;

pub use backend::{BackendError, ClassifierBackend, ClassifierSession, DeviceDescriptor, ModelArtefact};
#[cfg(feature = "cli")]
pub use cli::PoliteArgs;
pub use config::GuardConfig;
pub use encoder::{EncodedInput, Encoder};
pub use level::{ClassificationResult, PolitenessLevel};
pub use orchestrator::{AnalysisState, Orchestrator};
pub use responses::ResponseCursor;
pub use service::{InferenceService, Phase, PolitenessAnalyzer, ServiceConfig, ServiceError};

pub mod tests;
