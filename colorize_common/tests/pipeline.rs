use std::path::{Path, PathBuf};

use colorize_common::colorizer::Colorizer;
use colorize_common::model::ModelVariant;
use colorize_common::pipeline::{
    run_video, AudioMuxer, FrameDims, FrameSource, SourceInfo, Stage, VideoEncoder, VideoRequest,
};
use colorize_common::progress::{ProgressSink, ProgressState};
use colorize_common::ColorizeError;
use image::{Rgb, RgbImage};

/// Yields `actual` gray frames while claiming `advertised` in its metadata.
struct FakeSource {
    width: u32,
    height: u32,
    actual: u64,
    advertised: Option<u64>,
    has_audio: bool,
    produced: u64,
}

impl FakeSource {
    fn new(width: u32, height: u32, actual: u64, advertised: Option<u64>) -> Self {
        Self {
            width,
            height,
            actual,
            advertised,
            has_audio: false,
            produced: 0,
        }
    }
}

impl FrameSource for FakeSource {
    fn info(&self) -> SourceInfo {
        SourceInfo {
            fps: 24.0,
            frame_count: self.advertised,
            has_audio: self.has_audio,
        }
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, ColorizeError> {
        if self.produced == self.actual {
            return Ok(None);
        }
        let level = (self.produced % 256) as u8;
        self.produced += 1;
        Ok(Some(RgbImage::from_pixel(self.width, self.height, Rgb([level; 3]))))
    }
}

/// Tints every frame; counts calls.
#[derive(Default)]
struct Tint {
    calls: usize,
}

impl Colorizer for Tint {
    fn colorize(&mut self, frame: &RgbImage) -> Result<RgbImage, ColorizeError> {
        self.calls += 1;
        let mut out = frame.clone();
        for px in out.pixels_mut() {
            px.0[0] = px.0[0].saturating_add(30);
        }
        Ok(out)
    }
}

#[derive(Default)]
struct RecordingEncoder {
    frames: usize,
    dims: Option<FrameDims>,
    fps: f64,
}

impl VideoEncoder for RecordingEncoder {
    fn encode(
        &mut self,
        frames: &[RgbImage],
        fps: f64,
        dims: FrameDims,
        output: &Path,
    ) -> Result<(), ColorizeError> {
        self.frames = frames.len();
        self.dims = Some(dims);
        self.fps = fps;
        std::fs::write(output, b"silent video")?;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingMuxer {
    calls: Vec<(PathBuf, PathBuf)>,
}

impl AudioMuxer for RecordingMuxer {
    fn mux(&mut self, source: &Path, video: &Path, output: &Path) -> Result<(), ColorizeError> {
        self.calls.push((source.to_path_buf(), output.to_path_buf()));
        let mut bytes = std::fs::read(video)?;
        bytes.extend_from_slice(b" + audio");
        std::fs::write(output, bytes)?;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingProgress {
    started_with: Option<u64>,
    states: Vec<ProgressState>,
    stages: Vec<Stage>,
    finished: bool,
}

impl ProgressSink for RecordingProgress {
    fn on_stage(&mut self, stage: Stage) {
        self.stages.push(stage);
    }
    fn on_start(&mut self, total: u64) {
        self.started_with = Some(total);
    }
    fn on_frame(&mut self, state: &ProgressState) {
        self.states.push(*state);
    }
    fn on_finish(&mut self) {
        self.finished = true;
    }
}

fn request(dir: &Path) -> VideoRequest {
    VideoRequest {
        input: dir.join("input.mp4"),
        output: dir.join("out").join("colorized.mp4"),
        model: Some(ModelVariant::Eccv16),
    }
}

#[test]
fn stops_when_decode_runs_dry_before_advertised_count() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = FakeSource::new(32, 16, 5, Some(8));
    let mut colorizer = Tint::default();
    let mut encoder = RecordingEncoder::default();
    let mut muxer = RecordingMuxer::default();
    let mut progress = RecordingProgress::default();

    let meta = run_video(
        &mut source,
        &mut colorizer,
        &mut encoder,
        &mut muxer,
        &mut progress,
        &request(dir.path()),
    )
    .unwrap();

    assert_eq!(colorizer.calls, 5);
    assert_eq!(encoder.frames, 5);
    assert_eq!(meta.frames.len(), 5);
    assert_eq!(meta.frames_advertised, 8);
    assert!(meta.early_stop);
    assert_eq!(
        meta.stages,
        [
            Stage::Idle,
            Stage::Decoding,
            Stage::PerFrame,
            Stage::Aborted,
            Stage::Encoding,
            Stage::Done
        ]
    );

    // The bar is re-based so it still ends full.
    let last = progress.states.last().unwrap();
    assert!(last.is_complete());
    assert_eq!(last.frames_total, 5);
    assert!(progress.finished);
}

#[test]
fn reads_past_understated_frame_count() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = FakeSource::new(8, 8, 10, Some(4));
    let mut colorizer = Tint::default();
    let mut encoder = RecordingEncoder::default();
    let mut progress = RecordingProgress::default();

    let meta = run_video(
        &mut source,
        &mut colorizer,
        &mut encoder,
        &mut RecordingMuxer::default(),
        &mut progress,
        &request(dir.path()),
    )
    .unwrap();

    assert_eq!(source.produced, 10);
    assert_eq!(colorizer.calls, 10);
    assert_eq!(encoder.frames, 10);
    assert_eq!(meta.frames.len(), 10);
    assert_eq!(meta.frames_advertised, 4);
    assert!(!meta.early_stop);
    assert!(!meta.stages.contains(&Stage::Aborted));

    assert_eq!(progress.started_with, Some(4));
    assert!(progress
        .states
        .iter()
        .all(|s| s.frames_completed <= s.frames_total));
    let last = progress.states.last().unwrap();
    assert_eq!((last.frames_completed, last.frames_total), (10, 10));
}

#[test]
fn unknown_frame_count_reads_until_exhausted() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = FakeSource::new(8, 8, 7, None);
    let mut encoder = RecordingEncoder::default();
    let mut progress = RecordingProgress::default();

    let meta = run_video(
        &mut source,
        &mut Tint::default(),
        &mut encoder,
        &mut RecordingMuxer::default(),
        &mut progress,
        &request(dir.path()),
    )
    .unwrap();

    assert_eq!(encoder.frames, 7);
    assert!(!meta.early_stop);
    assert_eq!(progress.started_with, Some(0));
    assert!(progress
        .states
        .iter()
        .all(|s| s.frames_completed <= s.frames_total));
}

#[test]
fn output_dimensions_follow_first_frame() {
    for (width, height) in [(640, 480), (1920, 1080)] {
        let dir = tempfile::tempdir().unwrap();
        let mut source = FakeSource::new(width, height, 2, Some(2));
        let mut encoder = RecordingEncoder::default();

        let meta = run_video(
            &mut source,
            &mut Tint::default(),
            &mut encoder,
            &mut RecordingMuxer::default(),
            &mut RecordingProgress::default(),
            &request(dir.path()),
        )
        .unwrap();

        assert_eq!(encoder.dims, Some(FrameDims { width, height }));
        assert_eq!(encoder.fps, 24.0);
        assert_eq!((meta.width, meta.height), (width, height));
    }
}

#[test]
fn audio_is_reattached_when_present() {
    let dir = tempfile::tempdir().unwrap();
    let mut source = FakeSource::new(4, 4, 3, Some(3));
    source.has_audio = true;
    let mut muxer = RecordingMuxer::default();
    let req = request(dir.path());

    let meta = run_video(
        &mut source,
        &mut Tint::default(),
        &mut RecordingEncoder::default(),
        &mut muxer,
        &mut RecordingProgress::default(),
        &req,
    )
    .unwrap();

    assert!(meta.audio_muxed);
    assert_eq!(muxer.calls, [(req.input.clone(), req.output.clone())]);
    assert_eq!(std::fs::read(&req.output).unwrap(), b"silent video + audio");
    assert!(meta.stages.contains(&Stage::AudioMux));
}

#[test]
fn silent_source_skips_mux_and_keeps_encode() {
    let dir = tempfile::tempdir().unwrap();
    let mut muxer = RecordingMuxer::default();
    let req = request(dir.path());

    let meta = run_video(
        &mut FakeSource::new(4, 4, 2, Some(2)),
        &mut Tint::default(),
        &mut RecordingEncoder::default(),
        &mut muxer,
        &mut RecordingProgress::default(),
        &req,
    )
    .unwrap();

    assert!(!meta.audio_muxed);
    assert!(muxer.calls.is_empty());
    assert_eq!(std::fs::read(&req.output).unwrap(), b"silent video");

    // Temporary work directory is gone, only the deliverable is left.
    let leftovers: Vec<_> = std::fs::read_dir(req.output.parent().unwrap())
        .unwrap()
        .map(|e| e.unwrap().file_name())
        .collect();
    assert_eq!(leftovers, [std::ffi::OsString::from("colorized.mp4")]);
}

#[test]
fn empty_video_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut encoder = RecordingEncoder::default();
    let err = run_video(
        &mut FakeSource::new(4, 4, 0, Some(10)),
        &mut Tint::default(),
        &mut encoder,
        &mut RecordingMuxer::default(),
        &mut RecordingProgress::default(),
        &request(dir.path()),
    )
    .unwrap_err();

    assert!(matches!(err, ColorizeError::EmptyVideo));
    assert!(encoder.dims.is_none());
}

#[test]
fn encoder_failure_is_fatal() {
    struct Failing;
    impl VideoEncoder for Failing {
        fn encode(&mut self, _: &[RgbImage], _: f64, _: FrameDims, _: &Path) -> Result<(), ColorizeError> {
            Err(ColorizeError::Encode("no encoder".into()))
        }
    }

    let dir = tempfile::tempdir().unwrap();
    let req = request(dir.path());
    let err = run_video(
        &mut FakeSource::new(4, 4, 2, Some(2)),
        &mut Tint::default(),
        &mut Failing,
        &mut RecordingMuxer::default(),
        &mut RecordingProgress::default(),
        &req,
    )
    .unwrap_err();

    assert!(matches!(err, ColorizeError::Encode(_)));
    assert!(!req.output.exists());
}

#[test]
fn progress_reaches_zero_remaining_on_last_frame() {
    let dir = tempfile::tempdir().unwrap();
    let mut progress = RecordingProgress::default();
    run_video(
        &mut FakeSource::new(4, 4, 6, Some(6)),
        &mut Tint::default(),
        &mut RecordingEncoder::default(),
        &mut RecordingMuxer::default(),
        &mut progress,
        &request(dir.path()),
    )
    .unwrap();

    assert_eq!(progress.started_with, Some(6));
    let completed: Vec<u64> = progress.states.iter().map(|s| s.frames_completed).collect();
    assert_eq!(completed, [1, 2, 3, 4, 5, 6]);
    for state in &progress.states {
        assert!(state.eta().is_some());
    }
    assert_eq!(progress.states.last().unwrap().remaining_text(), None);
}
