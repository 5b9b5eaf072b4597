//! Which pretrained colorization network is active for the current session.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ColorizeError;

/// The two pretrained colorization networks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModelVariant {
    /// Zhang et al. 2016. Fast, lower fidelity.
    Eccv16,
    /// Zhang et al. 2017. Slower, higher fidelity.
    Siggraph17,
}

impl ModelVariant {
    pub const ALL: [ModelVariant; 2] = [ModelVariant::Eccv16, ModelVariant::Siggraph17];

    pub fn name(self) -> &'static str {
        match self {
            ModelVariant::Eccv16 => "ECCV16",
            ModelVariant::Siggraph17 => "SIGGRAPH17",
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ModelVariant::Eccv16 => "eccv16.onnx",
            ModelVariant::Siggraph17 => "siggraph17.onnx",
        }
    }

    /// Location of the exported onnx graph inside `models_dir`.
    pub fn model_path(self, models_dir: &Path) -> PathBuf {
        models_dir.join(self.file_name())
    }
}

impl fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type Loader<C> = Box<dyn FnMut(ModelVariant) -> Result<C, ColorizeError>>;

/// Session-scoped model state. Holds at most one loaded model at a time and
/// swaps it only through [`ModelSession::switch_model`].
pub struct ModelSession<C> {
    current: Option<(ModelVariant, C)>,
    loader: Loader<C>,
}

impl<C> ModelSession<C> {
    pub fn new(loader: impl FnMut(ModelVariant) -> Result<C, ColorizeError> + 'static) -> Self {
        Self {
            current: None,
            loader: Box::new(loader),
        }
    }

    /// Loads `variant` and makes it current.
    ///
    /// Asking for the variant that is already current is an error and leaves
    /// the loaded model untouched, as does a failed load.
    pub fn switch_model(&mut self, variant: ModelVariant) -> Result<(), ColorizeError> {
        if self.current() == Some(variant) {
            return Err(ColorizeError::ModelAlreadyActive(variant));
        }
        let model = (self.loader)(variant)?;
        log::info!("Model is now {variant}");
        self.current = Some((variant, model));
        Ok(())
    }

    pub fn current(&self) -> Option<ModelVariant> {
        self.current.as_ref().map(|(variant, _)| *variant)
    }

    pub fn model(&self) -> Option<&C> {
        self.current.as_ref().map(|(_, model)| model)
    }

    pub fn model_mut(&mut self) -> Option<&mut C> {
        self.current.as_mut().map(|(_, model)| model)
    }
}

impl<C> fmt::Debug for ModelSession<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelSession")
            .field("current", &self.current())
            .finish_non_exhaustive()
    }
}
