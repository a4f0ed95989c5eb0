use std::sync::Mutex;

use ort::{session::Session, value::TensorRef};

use super::{config::OnnxBackendConfig, devices::ExecutionTarget, errors::OnnxBackendError};
use crate::{
    backend::{BackendError, ClassifierSession, ModelArtefact},
    encoder::EncodedInput,
};

/// ONNX Runtime session bound to one execution provider.
#[derive(Debug)]
pub struct OnnxSession {
    session: Mutex<Session>,
    target: ExecutionTarget,
    config: OnnxBackendConfig,
}

impl OnnxSession {
    /// Loads `model` with only `target` registered.
    ///
    /// # Errors
    ///
    /// Returns builder, provider registration, or session creation errors.
    pub fn load(
        model: &ModelArtefact,
        target: ExecutionTarget,
        config: &OnnxBackendConfig,
    ) -> Result<Self, OnnxBackendError> {
        let mut builder = Session::builder().map_err(OnnxBackendError::CreateSessionBuilder)?;
        if let Some(threads) = config.intra_threads {
            builder = builder
                .with_intra_threads(threads)
                .map_err(OnnxBackendError::CreateSessionBuilder)?;
        }
        let session = target
            .register(builder)?
            .commit_from_file(&model.path)
            .map_err(OnnxBackendError::CreateSession)?;
        Ok(Self {
            session: Mutex::new(session),
            target,
            config: config.clone(),
        })
    }

    #[must_use]
    pub fn target(&self) -> ExecutionTarget {
        self.target
    }

    fn forward(&self, input: &EncodedInput) -> Result<Vec<f32>, OnnxBackendError> {
        let shape = [1_usize, input.len()];
        let ids = TensorRef::from_array_view((shape, input.input_ids.as_slice()))
            .map_err(OnnxBackendError::EncodeTensor)?;
        let attention = TensorRef::from_array_view((shape, input.attention_mask.as_slice()))
            .map_err(OnnxBackendError::EncodeTensor)?;
        let token_types = TensorRef::from_array_view((shape, input.token_type_ids.as_slice()))
            .map_err(OnnxBackendError::EncodeTensor)?;

        let mut session = self
            .session
            .lock()
            .map_err(|_| OnnxBackendError::SessionPoisoned)?;
        let names = &self.config.input_names;
        let outputs = session
            .run(ort::inputs! {
                names.input_ids.as_str() => ids,
                names.attention_mask.as_str() => attention,
                names.token_type_ids.as_str() => token_types,
            })
            .map_err(OnnxBackendError::Inference)?;

        let output_name = self.config.output_name.as_str();
        let logits = outputs
            .get(output_name)
            .ok_or_else(|| OnnxBackendError::OutputMissing {
                name: output_name.to_owned(),
            })?;
        let (_, scores) = logits
            .try_extract_tensor::<f32>()
            .map_err(OnnxBackendError::Inference)?;
        Ok(scores.to_vec())
    }
}

impl ClassifierSession for OnnxSession {
    fn run(&self, input: &EncodedInput) -> Result<Vec<f32>, BackendError> {
        self.forward(input).map_err(BackendError::from)
    }
}
