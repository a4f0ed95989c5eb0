//! Configuration for the ONNX Runtime backend.

use serde::{Deserialize, Serialize};

/// Graph input names, in the order the encoder produces them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputNames {
    pub input_ids: String,
    pub attention_mask: String,
    pub token_type_ids: String,
}

impl Default for InputNames {
    fn default() -> Self {
        Self {
            input_ids: "input_ids".into(),
            attention_mask: "attention_mask".into(),
            token_type_ids: "token_type_ids".into(),
        }
    }
}

/// Configuration for [`super::OnnxBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OnnxBackendConfig {
    pub input_names: InputNames,
    /// Output holding the two class logits.
    pub output_name: String,
    /// Intra-op thread count; `None` leaves the runtime default.
    pub intra_threads: Option<usize>,
}

impl Default for OnnxBackendConfig {
    fn default() -> Self {
        Self {
            input_names: InputNames::default(),
            output_name: "logits".into(),
            intra_threads: None,
        }
    }
}
