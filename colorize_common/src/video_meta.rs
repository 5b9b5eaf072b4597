use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::frame_meta::FrameMeta;
use crate::model::ModelVariant;
use crate::pipeline::Stage;

/// Metadata corresponding to a colorized video.
#[derive(Debug, Deserialize, Serialize)]
pub struct VideoMeta {
    /// Path to original input video file.
    pub input_file: PathBuf,
    /// Path to the colorized output video file.
    pub output_file: PathBuf,
    pub model: Option<ModelVariant>,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    /// Frame count claimed by the container, which may overstate the real one.
    pub frames_advertised: u64,
    /// Set when decoding ran out before `frames_advertised` was reached.
    pub early_stop: bool,
    pub audio_muxed: bool,
    /// Stages the run went through, in order.
    pub stages: Vec<Stage>,
    pub total_time: Duration,
    /// Per-frame colorization timings.
    pub frames: Vec<FrameMeta>,
}

impl VideoMeta {
    pub fn new(input_file: PathBuf, output_file: PathBuf, fps: f64, frames_advertised: u64) -> Self {
        Self {
            input_file,
            output_file,
            model: None,
            width: 0,
            height: 0,
            fps,
            frames_advertised,
            early_stop: false,
            audio_muxed: false,
            stages: Vec::new(),
            total_time: Duration::ZERO,
            frames: Vec::new(),
        }
    }

    pub fn push(&mut self, frame: FrameMeta) {
        self.frames.push(frame);
    }

    /// Average colorize time, ignoring the first (warm-up) frame when asked.
    pub fn avg_colorize_time(&self, skip_first: bool) -> Option<Duration> {
        let skip = usize::from(skip_first && self.frames.len() > 1);
        let frames = &self.frames[skip..];
        if frames.is_empty() {
            return None;
        }
        let sum: Duration = frames.iter().map(|f| f.colorize_time).sum();
        Some(sum / frames.len() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_skips_warmup_frame() {
        let mut meta = VideoMeta::new("in.mp4".into(), "out.mp4".into(), 25.0, 3);
        assert_eq!(meta.avg_colorize_time(true), None);

        for (index, ms) in [(0, 900), (1, 100), (2, 300)] {
            meta.push(FrameMeta {
                index,
                colorize_time: Duration::from_millis(ms),
            });
        }
        assert_eq!(meta.avg_colorize_time(true), Some(Duration::from_millis(200)));
        assert_eq!(meta.avg_colorize_time(false), Some(Duration::from_millis(433) + Duration::from_nanos(333_333)));
    }
}
