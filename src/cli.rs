//! CLI argument types and layered configuration for the `polite` binary.
//! Loads from CLI args, environment (prefix `POLITE_`), and optional config
//! files.

use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use ortho_config::OrthoError;
use serde::Deserialize;
use std::path::PathBuf;

use crate::{
    backend::ModelArtefact,
    config::GuardConfig,
    encoder::DEFAULT_MAX_SEQUENCE_LENGTH,
};

const ENV_PREFIX: &str = "POLITE_";

fn default_debounce_ms() -> u64 {
    GuardConfig::default().debounce_ms
}

fn default_max_sequence_length() -> usize {
    DEFAULT_MAX_SEQUENCE_LENGTH
}

/// Command-line arguments for the `polite` binary.
///
/// Values are loaded from command line arguments, environment variables
/// (prefixed with `POLITE_`), and an optional configuration file.
///
/// # Examples
///
/// Parse flags directly:
/// ```
/// use politeness_guard::cli::PoliteArgs;
/// use ortho_config::OrthoConfig;
///
/// let args = PoliteArgs::load_from_iter(["polite", "--list-devices=true"])
///     .expect("load args from CLI iterator");
/// assert!(args.list_devices);
/// ```
///
/// Load from a configuration file:
/// ```
/// use politeness_guard::cli::PoliteArgs;
/// use ortho_config::OrthoConfig;
/// use std::io::Write;
/// use tempfile::NamedTempFile;
///
/// let mut file = NamedTempFile::new().expect("create temp file");
/// writeln!(file, "debounce_ms = 250").expect("write config");
/// let path = file.path().to_str().expect("path str");
/// let args = PoliteArgs::load_from_iter(["polite", "--config-path", path])
///     .expect("load args from config path");
/// assert_eq!(args.debounce_ms, 250);
/// ```
#[derive(Debug, Deserialize, ortho_config::OrthoConfig)]
#[ortho_config(prefix = "POLITE")]
pub struct PoliteArgs {
    /// Path to the ONNX classification model.
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Expected SHA-256 of the model file.
    #[serde(default)]
    pub model_sha256: Option<String>,

    /// Device id to bind instead of the first available one.
    #[serde(default)]
    pub device: Option<String>,

    /// Quiet period in milliseconds before a line is classified.
    #[ortho_config(default = 800)]
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Encoded sequence length, including the framing tokens.
    #[ortho_config(default = 512)]
    #[serde(default = "default_max_sequence_length")]
    pub max_sequence_length: usize,

    /// Print the available devices and exit.
    #[ortho_config(default = false)]
    #[serde(default)]
    pub list_devices: bool,

    /// Optional path to a configuration file.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl PoliteArgs {
    /// Load configuration solely from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if any variable cannot be parsed.
    pub fn load_from_env() -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if the file cannot be read or parsed.
    pub fn load_from_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .extract()
            .map_err(Into::into)
    }

    /// Load configuration from environment variables and a file path.
    ///
    /// # Errors
    ///
    /// Returns an [`OrthoError`] if either source contains invalid values.
    pub fn load_from_env_and_config(path: &str) -> Result<Self, OrthoError> {
        Figment::new()
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(Into::into)
    }

    /// Guard settings derived from these arguments, validated.
    ///
    /// # Errors
    ///
    /// Returns a message when a value is out of range.
    pub fn guard_config(&self) -> Result<GuardConfig, String> {
        GuardConfig {
            max_sequence_length: self.max_sequence_length,
            debounce_ms: self.debounce_ms,
            preferred_device: self.device.clone(),
        }
        .validate()
    }

    /// Model locator, if a path was given.
    #[must_use]
    pub fn model(&self) -> Option<ModelArtefact> {
        let model = ModelArtefact::new(self.model_path.clone()?);
        Some(match &self.model_sha256 {
            Some(sha256) => model.with_sha256(sha256.clone()),
            None => model,
        })
    }
}
