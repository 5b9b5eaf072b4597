use std::path::Path;

use ort::execution_providers::{CPUExecutionProvider, CUDAExecutionProvider};
use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;

/// Registers the execution provider for every session created afterwards.
/// Returns the provider name, for logging.
pub fn init_runtime(cuda: bool) -> ort::Result<&'static str> {
    let (ep, ep_name) = if cuda {
        (CUDAExecutionProvider::default().build(), "cuda")
    } else {
        (CPUExecutionProvider::default().build(), "cpu")
    };
    ort::init().with_execution_providers([ep]).commit()?;
    Ok(ep_name)
}

/// Loads an onnx graph for inference only.
pub fn load_session(model: &Path) -> ort::Result<Session> {
    let session = SessionBuilder::new()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .commit_from_file(model)?;
    log::debug!("{session:?}");
    Ok(session)
}
