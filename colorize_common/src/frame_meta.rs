use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Per-frame record of a colorized video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FrameMeta {
    /// Zero-based position in decode order.
    pub index: u64,
    /// Time spent inside the colorizer for this frame.
    pub colorize_time: Duration,
}
