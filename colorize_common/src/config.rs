//! Per-run configuration shared by every input kind.

use serde::{Deserialize, Serialize};

use crate::model::ModelVariant;

/// Where the frames of a run come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    /// A local video file.
    File,
    /// A video fetched from a YouTube link.
    Youtube,
    /// One or more independent still images.
    Batch,
}

/// How much of the run is shown while it happens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DisplayMode {
    /// Progress bar, plus a before/after comparison for every image.
    #[default]
    Live,
    /// Log lines only.
    Quiet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub source_kind: SourceKind,
    pub model_variant: ModelVariant,
    pub display_mode: DisplayMode,
}
