use std::path::PathBuf;

use crate::model::ModelVariant;

/// Everything that can go wrong while colorizing a single run.
#[derive(Debug, thiserror::Error)]
pub enum ColorizeError {
    #[error("model {0} is already the active model")]
    ModelAlreadyActive(ModelVariant),
    #[error("failed to load {variant} model: {reason}")]
    ModelLoad { variant: ModelVariant, reason: String },
    #[error("unsupported format: {}", .0.display())]
    UnsupportedFormat(PathBuf),
    #[error("no files were uploaded")]
    EmptyUpload,
    #[error("video contains no decodable frames")]
    EmptyVideo,
    #[error("decode error: {0}")]
    Decode(String),
    #[error("encode error: {0}")]
    Encode(String),
    #[error("audio mux error: {0}")]
    Mux(String),
    #[error("inference error: {0}")]
    Inference(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("progress overflow: frame {completed} recorded but only {total} expected")]
    ProgressOverflow { completed: u64, total: u64 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Archive(#[from] zip::result::ZipError),
}

/// Coarse classification used by the CLI to decide how to surface a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Selecting the model that is already active.
    Configuration,
    /// Bad or missing user input; reported as a warning.
    InputValidation,
    /// Corrupt media, failed encode, inference failure. Fatal to the run.
    Io,
    /// Remote fetch failed.
    Network,
}

impl ColorizeError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ColorizeError::ModelAlreadyActive(_) => ErrorClass::Configuration,
            ColorizeError::UnsupportedFormat(_) | ColorizeError::EmptyUpload => {
                ErrorClass::InputValidation
            }
            ColorizeError::Network(_) => ErrorClass::Network,
            _ => ErrorClass::Io,
        }
    }
}
