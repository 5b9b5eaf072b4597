extern crate ffmpeg_next as ffmpeg;

mod decode;
mod encode;
mod mux;
mod progress_bar;
mod youtube;

use std::fs::File;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use colorize_common::batch::{run_batch, BatchOptions};
use colorize_common::config::{DisplayMode, PipelineConfig, SourceKind};
use colorize_common::media::MediaKind;
use colorize_common::model::{ModelSession, ModelVariant};
use colorize_common::pipeline::{run_video, VideoRequest};
use colorize_common::progress::{NoProgress, ProgressSink};
use colorize_common::{ColorizeError, ErrorClass};
use ort_colorize::OrtColorizer;
use tracing_subscriber::prelude::*;

use crate::decode::FfmpegSource;
use crate::encode::FfmpegEncoder;
use crate::mux::FfmpegMuxer;
use crate::progress_bar::TerminalProgress;
use crate::youtube::YoutubeDownloader;

#[derive(Debug, Parser)]
pub struct Args {
    /// Whether to attempt to use `cuda` hw acceleration.
    /// This may silently fail and fallback to cpu acceleration presently.
    #[arg(long, action, default_value = "false", global = true)]
    cuda: bool,
    /// Colorization model to use.
    #[arg(long, short, value_enum, default_value_t = ModelVariant::Eccv16, global = true)]
    model: ModelVariant,
    /// Directory holding `eccv16.onnx` and `siggraph17.onnx`.
    #[arg(long, default_value = "_models", global = true)]
    models_dir: PathBuf,
    /// Log only: no progress bar and no before/after images.
    #[arg(long, short, action, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Colorize a video file (.mp4/.mov/.avi/.mkv).
    Video {
        input: PathBuf,
        /// Defaults to `<input>.colorized.mp4`.
        #[arg(long, short)]
        output: Option<PathBuf>,
        #[arg(long, default_value = "libx264")]
        encoder: String,
    },
    /// Colorize one or more images (.jpg/.jpeg/.png).
    Images {
        inputs: Vec<PathBuf>,
        #[arg(long, short, default_value = "colorized")]
        output_dir: PathBuf,
    },
    /// Download a YouTube video and colorize it.
    Youtube {
        url: String,
        #[arg(long, short, default_value = "colorized_video.mp4")]
        output: PathBuf,
        #[arg(long, default_value = "libx264")]
        encoder: String,
        /// Where downloads are kept between runs.
        #[arg(long, default_value = "_downloads")]
        cache_dir: PathBuf,
    },
}

impl Args {
    fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            source_kind: match self.command {
                Command::Video { .. } => SourceKind::File,
                Command::Images { .. } => SourceKind::Batch,
                Command::Youtube { .. } => SourceKind::Youtube,
            },
            model_variant: self.model,
            display_mode: if self.quiet {
                DisplayMode::Quiet
            } else {
                DisplayMode::Live
            },
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize logging.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "warn,ffmpeg_colorize=info,colorize_common=info,ort_colorize=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let config = args.pipeline_config();

    match run(&args, config) {
        Err(err) if is_input_error(&err) => {
            // Bad uploads are reported, not crashed on.
            log::warn!("{err}");
            Ok(())
        }
        other => other,
    }
}

fn is_input_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ColorizeError>()
        .is_some_and(|e| e.class() == ErrorClass::InputValidation)
}

fn run(args: &Args, config: PipelineConfig) -> anyhow::Result<()> {
    log::info!("Starting {:?} run: {config:?}", config.source_kind);

    let ep_name = ort_colorize::session::init_runtime(args.cuda)?;
    log::info!("Using ort {ep_name} execution provider");

    let models_dir = args.models_dir.clone();
    let mut models = ModelSession::new(move |variant| OrtColorizer::load(variant, &models_dir));
    models.switch_model(config.model_variant)?;
    let colorizer = models.model_mut().context("no colorization model loaded")?;

    match &args.command {
        Command::Video {
            input,
            output,
            encoder,
        } => {
            MediaKind::expect(input, MediaKind::Video)?;
            let output = output
                .clone()
                .unwrap_or_else(|| input.with_extension("colorized.mp4"));
            colorize_video(input, &output, encoder, colorizer, config)
        }
        Command::Youtube {
            url,
            output,
            encoder,
            cache_dir,
        } => {
            let input = YoutubeDownloader::new(cache_dir.clone()).fetch(url)?;
            colorize_video(&input, output, encoder, colorizer, config)
        }
        Command::Images { inputs, output_dir } => {
            colorize_images(inputs, output_dir, colorizer, config)
        }
    }
}

fn progress_sink(display_mode: DisplayMode, prefix: &'static str) -> Box<dyn ProgressSink> {
    match display_mode {
        DisplayMode::Live => Box::new(TerminalProgress::new(prefix)),
        DisplayMode::Quiet => Box::new(NoProgress),
    }
}

fn colorize_video(
    input: &Path,
    output: &Path,
    encoder_name: &str,
    colorizer: &mut OrtColorizer,
    config: PipelineConfig,
) -> anyhow::Result<()> {
    // Initialize ffmpeg and open video.
    ffmpeg::init()?;
    ffmpeg::util::log::set_level(ffmpeg::util::log::Level::Error);

    let mut source = FfmpegSource::open(input)
        .map_err(|e| ColorizeError::Decode(format!("{input:?}: {e}")))?;
    let mut encoder = FfmpegEncoder::new(encoder_name);
    let mut muxer = FfmpegMuxer;
    let request = VideoRequest {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        model: Some(config.model_variant),
    };

    let mut progress = progress_sink(config.display_mode, "Decoding");
    let meta = run_video(
        &mut source,
        colorizer,
        &mut encoder,
        &mut muxer,
        &mut progress,
        &request,
    )?;

    if let Some(avg) = meta.avg_colorize_time(true) {
        log::info!("Average colorize time per frame: {avg:?}");
    }
    let meta_path = output.with_extension("json");
    serde_json::to_writer_pretty(File::create(&meta_path)?, &meta)?;
    log::info!("Run metadata written to {meta_path:?}");

    println!("{}", output.display());
    Ok(())
}

#[tracing::instrument(skip_all, fields(count = inputs.len()))]
fn colorize_images(
    inputs: &[PathBuf],
    output_dir: &Path,
    colorizer: &mut OrtColorizer,
    config: PipelineConfig,
) -> anyhow::Result<()> {
    let options = BatchOptions {
        output_dir: output_dir.to_path_buf(),
        display_mode: config.display_mode,
    };
    let mut progress = progress_sink(config.display_mode, "Colorizing");
    let report = run_batch(inputs, colorizer, &mut progress, &options)?;

    for failure in &report.failures {
        log::warn!("{:?} was not colorized: {}", failure.input, failure.error);
    }
    match report.deliverable() {
        Some(path) => println!("{}", path.display()),
        None => log::warn!("None of the {} images could be colorized", inputs.len()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn video_defaults() {
        let args = Args::parse_from(["ffmpeg_colorize", "video", "clip.mov"]);
        let config = args.pipeline_config();
        assert_eq!(config.source_kind, SourceKind::File);
        assert_eq!(config.model_variant, ModelVariant::Eccv16);
        assert_eq!(config.display_mode, DisplayMode::Live);
        assert!(matches!(
            args.command,
            Command::Video { ref output, ref encoder, .. } if output.is_none() && encoder == "libx264"
        ));
    }

    #[test]
    fn global_flags_after_subcommand() {
        let args = Args::parse_from([
            "ffmpeg_colorize",
            "images",
            "a.png",
            "b.jpg",
            "--model",
            "siggraph17",
            "--quiet",
        ]);
        let config = args.pipeline_config();
        assert_eq!(config.source_kind, SourceKind::Batch);
        assert_eq!(config.model_variant, ModelVariant::Siggraph17);
        assert_eq!(config.display_mode, DisplayMode::Quiet);
    }

    #[test]
    fn youtube_output_default() {
        let args = Args::parse_from(["ffmpeg_colorize", "youtube", "https://youtu.be/abc"]);
        assert_eq!(args.pipeline_config().source_kind, SourceKind::Youtube);
        assert!(matches!(
            args.command,
            Command::Youtube { ref output, .. } if output == Path::new("colorized_video.mp4")
        ));
    }

    #[test]
    fn only_input_errors_are_downgraded() {
        let input: anyhow::Error = ColorizeError::EmptyUpload.into();
        let fatal: anyhow::Error = ColorizeError::EmptyVideo.into();
        assert!(is_input_error(&input));
        assert!(!is_input_error(&fatal));
        assert!(!is_input_error(&anyhow::anyhow!("other")));
    }
}
