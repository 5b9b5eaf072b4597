//! Colorizes independently uploaded images and bundles the results.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Instant;

use image::RgbImage;

use crate::colorizer::{to_rgb, Colorizer};
use crate::config::DisplayMode;
use crate::error::ColorizeError;
use crate::media::MediaKind;
use crate::progress::{ProgressSink, ProgressState};

/// File name of the archive produced when more than one image succeeds.
pub const ARCHIVE_NAME: &str = "colorized_images.zip";

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub output_dir: PathBuf,
    pub display_mode: DisplayMode,
}

/// One successfully colorized image.
#[derive(Debug, Clone)]
pub struct BatchItem {
    pub input: PathBuf,
    pub output: PathBuf,
    /// Side-by-side before/after image, written in [`DisplayMode::Live`].
    pub comparison: Option<PathBuf>,
}

#[derive(Debug)]
pub struct BatchFailure {
    pub input: PathBuf,
    pub error: ColorizeError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub outputs: Vec<BatchItem>,
    pub failures: Vec<BatchFailure>,
    pub archive: Option<PathBuf>,
}

impl BatchReport {
    /// The single file handed back to the user: the archive when several
    /// images succeeded, otherwise the lone output.
    pub fn deliverable(&self) -> Option<&Path> {
        match (&self.archive, self.outputs.as_slice()) {
            (Some(archive), _) => Some(archive),
            (None, [single]) => Some(&single.output),
            _ => None,
        }
    }
}

/// Name of the `n`-th (1-based) output image.
pub fn output_name(n: usize) -> String {
    format!("IMG_{n}.jpg")
}

fn comparison_name(n: usize) -> String {
    format!("IMG_{n}.compare.jpg")
}

/// Decodes an image file into 3 channels, dropping any alpha channel.
pub fn load_rgb(path: &Path) -> Result<RgbImage, ColorizeError> {
    MediaKind::expect(path, MediaKind::Image)?;
    Ok(to_rgb(image::open(path)?))
}

/// Places `before` and `after` next to each other on one canvas.
pub fn side_by_side(before: &RgbImage, after: &RgbImage) -> RgbImage {
    let width = before.width() + after.width();
    let height = before.height().max(after.height());
    let mut canvas = RgbImage::new(width, height);
    image::imageops::replace(&mut canvas, before, 0, 0);
    image::imageops::replace(&mut canvas, after, i64::from(before.width()), 0);
    canvas
}

fn colorize_one(
    n: usize,
    input: &Path,
    colorizer: &mut impl Colorizer,
    options: &BatchOptions,
) -> Result<BatchItem, ColorizeError> {
    let before = load_rgb(input)?;
    let after = colorizer.colorize(&before)?;

    let output = options.output_dir.join(output_name(n));
    after.save(&output)?;

    let comparison = match options.display_mode {
        DisplayMode::Live => {
            let path = options.output_dir.join(comparison_name(n));
            side_by_side(&before, &after).save(&path)?;
            log::info!("{input:?}: before/after written to {path:?}");
            Some(path)
        }
        DisplayMode::Quiet => None,
    };

    Ok(BatchItem {
        input: input.to_path_buf(),
        output,
        comparison,
    })
}

/// Colorizes every input on its own. A failing image is recorded in the
/// report and does not stop the rest of the batch.
pub fn run_batch(
    inputs: &[PathBuf],
    colorizer: &mut impl Colorizer,
    progress: &mut impl ProgressSink,
    options: &BatchOptions,
) -> Result<BatchReport, ColorizeError> {
    if inputs.is_empty() {
        return Err(ColorizeError::EmptyUpload);
    }
    std::fs::create_dir_all(&options.output_dir)?;

    let mut report = BatchReport::default();
    let mut state = ProgressState::new(inputs.len() as u64);
    progress.on_start(state.frames_total);
    let start = Instant::now();

    for (i, input) in inputs.iter().enumerate() {
        match colorize_one(i + 1, input, colorizer, options) {
            Ok(item) => {
                log::info!("Colorized {input:?} -> {:?}", item.output);
                report.outputs.push(item);
            }
            Err(error) => {
                log::warn!("Skipping {input:?}: {error}");
                report.failures.push(BatchFailure {
                    input: input.clone(),
                    error,
                });
            }
        }
        state.record_frame(start.elapsed())?;
        progress.on_frame(&state);
    }

    if report.outputs.len() > 1 {
        let archive = options.output_dir.join(ARCHIVE_NAME);
        let files: Vec<&Path> = report.outputs.iter().map(|item| item.output.as_path()).collect();
        write_archive(&archive, &files)?;
        log::info!("Bundled {} images into {archive:?}", files.len());
        report.archive = Some(archive);
    }

    progress.on_finish();
    Ok(report)
}

/// Zips `files`, storing each under its own file name.
pub fn write_archive(archive: &Path, files: &[&Path]) -> Result<(), ColorizeError> {
    let mut zip = zip::ZipWriter::new(File::create(archive)?);
    let options = zip::write::SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated);

    for file in files {
        let name = file
            .file_name()
            .and_then(|os_str| os_str.to_str())
            .ok_or_else(|| ColorizeError::UnsupportedFormat(file.to_path_buf()))?;
        zip.start_file(name, options)?;
        io::copy(&mut File::open(file)?, &mut zip)?;
    }
    zip.finish()?;
    Ok(())
}
