//! Decode -> colorize every frame -> encode -> re-attach audio.

use std::path::{Path, PathBuf};
use std::time::Instant;

use image::RgbImage;
use serde::{Deserialize, Serialize};

use crate::colorizer::Colorizer;
use crate::error::ColorizeError;
use crate::frame_meta::FrameMeta;
use crate::model::ModelVariant;
use crate::progress::{ProgressSink, ProgressState};
use crate::video_meta::VideoMeta;

/// Stages of a video run. A run moves strictly forward through them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    Idle,
    Decoding,
    PerFrame,
    /// Decoding ran dry before the advertised frame count. Not an error: the
    /// run carries on with the frames it got.
    Aborted,
    Encoding,
    AudioMux,
    Done,
}

/// What the container says about a video before any frame is decoded.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceInfo {
    pub fps: f64,
    /// Advisory only, containers may overstate it. `None` if unknown.
    pub frame_count: Option<u64>,
    pub has_audio: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameDims {
    pub width: u32,
    pub height: u32,
}

impl FrameDims {
    pub fn of(image: &RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self { width, height }
    }
}

/// Sequential frame decoder.
pub trait FrameSource {
    fn info(&self) -> SourceInfo;
    /// Next decoded frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<RgbImage>, ColorizeError>;
}

/// Writes a silent video from in-memory frames.
pub trait VideoEncoder {
    fn encode(
        &mut self,
        frames: &[RgbImage],
        fps: f64,
        dims: FrameDims,
        output: &Path,
    ) -> Result<(), ColorizeError>;
}

/// Combines the video stream of `video` with the audio stream of `source`.
pub trait AudioMuxer {
    fn mux(&mut self, source: &Path, video: &Path, output: &Path) -> Result<(), ColorizeError>;
}

#[derive(Debug, Clone)]
pub struct VideoRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub model: Option<ModelVariant>,
}

fn enter(stage: Stage, meta: &mut VideoMeta, progress: &mut impl ProgressSink) {
    log::debug!("Entering stage {stage:?}");
    meta.stages.push(stage);
    progress.on_stage(stage);
}

/// Colorizes a whole video. Any decode, inference, encode or mux failure is
/// fatal to the run; nothing is retried or resumed.
#[tracing::instrument(skip_all, fields(input = %request.input.display()))]
pub fn run_video(
    source: &mut impl FrameSource,
    colorizer: &mut impl Colorizer,
    encoder: &mut impl VideoEncoder,
    muxer: &mut impl AudioMuxer,
    progress: &mut impl ProgressSink,
    request: &VideoRequest,
) -> Result<VideoMeta, ColorizeError> {
    let started = Instant::now();
    let info = source.info();
    let mut meta = VideoMeta::new(
        request.input.clone(),
        request.output.clone(),
        info.fps,
        info.frame_count.unwrap_or(0),
    );
    meta.model = request.model;
    meta.stages.push(Stage::Idle);

    enter(Stage::Decoding, &mut meta, progress);
    log::info!(
        "Source: {:.3} fps, {} frames advertised, audio: {}",
        info.fps,
        info.frame_count.map_or_else(|| "unknown".to_string(), |n| n.to_string()),
        info.has_audio
    );

    let mut state = ProgressState::new(info.frame_count.unwrap_or(0));
    progress.on_start(state.frames_total);

    enter(Stage::PerFrame, &mut meta, progress);
    let frames = colorize_frames(source, colorizer, progress, &mut state, &mut meta, &info)?;

    if !state.is_complete() {
        log::warn!(
            "Decoding stopped after {} of {} advertised frames",
            state.frames_completed,
            state.frames_total
        );
        meta.early_stop = true;
        enter(Stage::Aborted, &mut meta, progress);
        state.rebase_total();
        progress.on_frame(&state);
    }

    enter(Stage::Encoding, &mut meta, progress);
    // Output size follows the content, never a fixed resolution.
    let dims = FrameDims::of(&frames[0]);
    meta.width = dims.width;
    meta.height = dims.height;

    let output_dir = request
        .output
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    std::fs::create_dir_all(output_dir)?;
    let workdir = tempfile::Builder::new()
        .prefix(".colorize-")
        .tempdir_in(output_dir)?;
    let silent = workdir.path().join(silent_file_name(&request.output));

    log::info!(
        "Encoding {} frames at {}x{} to {silent:?}",
        frames.len(),
        dims.width,
        dims.height
    );
    encoder.encode(&frames, info.fps, dims, &silent)?;
    drop(frames);

    if info.has_audio {
        enter(Stage::AudioMux, &mut meta, progress);
        muxer.mux(&request.input, &silent, &request.output)?;
        meta.audio_muxed = true;
    } else {
        log::info!("Source has no audio track, output will be silent");
        std::fs::rename(&silent, &request.output)?;
    }

    enter(Stage::Done, &mut meta, progress);
    progress.on_finish();
    meta.total_time = started.elapsed();
    log::info!(
        "Wrote {:?} ({} frames) in {:?}",
        request.output,
        meta.frames.len(),
        meta.total_time
    );
    Ok(meta)
}

/// The per-frame loop. Runs until the source is exhausted; the advertised
/// count only sizes the progress total and grows when the source outlasts it.
fn colorize_frames(
    source: &mut impl FrameSource,
    colorizer: &mut impl Colorizer,
    progress: &mut impl ProgressSink,
    state: &mut ProgressState,
    meta: &mut VideoMeta,
    info: &SourceInfo,
) -> Result<Vec<RgbImage>, ColorizeError> {
    let mut frames: Vec<RgbImage> = Vec::new();
    let start = Instant::now();

    while let Some(frame) = source.next_frame()? {
        if let Some(first) = frames.first() {
            if first.dimensions() != frame.dimensions() {
                return Err(ColorizeError::Decode(format!(
                    "frame {} is {:?}, expected {:?}",
                    frames.len(),
                    frame.dimensions(),
                    first.dimensions()
                )));
            }
        }

        let colorize_start = Instant::now();
        let colorized = colorizer.colorize(&frame)?;
        if colorized.dimensions() != frame.dimensions() {
            return Err(ColorizeError::Inference(format!(
                "colorizer returned {:?} for a {:?} frame",
                colorized.dimensions(),
                frame.dimensions()
            )));
        }
        meta.push(FrameMeta {
            index: frames.len() as u64,
            colorize_time: colorize_start.elapsed(),
        });
        frames.push(colorized);

        if state.is_complete() {
            if info.frame_count == Some(state.frames_completed) {
                log::warn!(
                    "Source has more than its advertised {} frames",
                    state.frames_completed
                );
            }
            state.extend_total(state.frames_completed + 1);
        }
        state.record_frame(start.elapsed())?;
        progress.on_frame(state);
    }

    if frames.is_empty() {
        return Err(ColorizeError::EmptyVideo);
    }
    Ok(frames)
}

fn silent_file_name(output: &Path) -> String {
    let ext = output
        .extension()
        .and_then(|os_str| os_str.to_str())
        .unwrap_or("mp4");
    format!("silent.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_file_keeps_container() {
        assert_eq!(silent_file_name(Path::new("out/video.mkv")), "silent.mkv");
        assert_eq!(silent_file_name(Path::new("video")), "silent.mp4");
    }

    #[test]
    fn dims_of_image() {
        let image = RgbImage::new(640, 480);
        assert_eq!(
            FrameDims::of(&image),
            FrameDims {
                width: 640,
                height: 480
            }
        );
    }
}
