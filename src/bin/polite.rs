use ortho_config::{OrthoConfig, OrthoError};
use politeness_guard::{
    AnalysisState, InferenceService, Orchestrator, ServiceError,
    backend::{BackendError, ClassifierBackend, onnx::OnnxBackend},
    cli::PoliteArgs,
};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Args(#[from] Arc<OrthoError>),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("no model given; pass --model-path or set POLITE_MODEL_PATH")]
    MissingModel,
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn print_state(state: &AnalysisState) -> Result<(), CliError> {
    println!("{}", serde_json::to_string(state)?);
    Ok(())
}

#[tokio::main]
#[expect(
    clippy::result_large_err,
    reason = "OrthoError originates from external crate and is acceptable here"
)]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("politeness_guard=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = PoliteArgs::load()?;
    let backend = OnnxBackend::default();
    if args.list_devices {
        for device in backend.enumerate_devices()? {
            println!("{}\t{}", device.id, device.name);
        }
        return Ok(());
    }

    let config = args.guard_config().map_err(CliError::Config)?;
    let model = args.model().ok_or(CliError::MissingModel)?;
    let service = Arc::new(InferenceService::new(backend, config.service_config(model)));
    let orchestrator = Orchestrator::new(service.clone(), config.quiet_period());
    let forwarding = orchestrator.follow_initialization(service.subscribe_status());

    let mut states = orchestrator.subscribe();
    let initialized = orchestrator.initialize().await;
    print_state(&states.borrow_and_update())?;
    initialized?;

    // Each stdin line replaces the whole text being written.
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(text) => {
                    orchestrator.on_text_changed(text);
                }
                None => break,
            },
            changed = states.changed() => {
                if changed.is_err() {
                    break;
                }
                print_state(&states.borrow_and_update())?;
            }
        }
    }

    orchestrator.wait_idle().await;
    if states.has_changed().unwrap_or(false) {
        print_state(&states.borrow_and_update())?;
    }
    forwarding.abort();
    Ok(())
}
