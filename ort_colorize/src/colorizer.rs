//! The frame colorizer: RGB frame -> L channel -> network -> a*b* -> RGB frame.

use std::path::Path;

use colorize_common::colorizer::Colorizer;
use colorize_common::lab::{lab_to_rgb8, rgb_to_l};
use colorize_common::model::ModelVariant;
use colorize_common::ColorizeError;
use fast_image_resize::images::{Image, ImageRef};
use fast_image_resize::{FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer};
use image::{Rgb, RgbImage};
use ndarray::{s, Array2, Array4, ArrayView2, ArrayView4, CowArray};
use ort::session::Session;
use ort::value::TensorRef;

use crate::session::load_session;

/// Both networks take a fixed 256x256 luminance input.
pub const MODEL_INPUT_SIZE: u32 = 256;

fn inference_error(err: impl std::fmt::Display) -> ColorizeError {
    ColorizeError::Inference(err.to_string())
}

/// Colorizes frames with one of the pretrained networks exported to onnx.
pub struct OrtColorizer {
    session: Session,
    variant: ModelVariant,
}

impl OrtColorizer {
    /// Loads `variant` from `models_dir`.
    pub fn load(variant: ModelVariant, models_dir: &Path) -> Result<Self, ColorizeError> {
        let path = variant.model_path(models_dir);
        if !path.exists() {
            return Err(ColorizeError::ModelLoad {
                variant,
                reason: format!("{path:?} does not exist"),
            });
        }
        let session = load_session(&path).map_err(|e| ColorizeError::ModelLoad {
            variant,
            reason: e.to_string(),
        })?;
        log::info!("Prepared ort session for {variant} with model: {path:?}");
        Ok(Self::from_session(session, variant))
    }

    pub fn from_session(session: Session, variant: ModelVariant) -> Self {
        Self { session, variant }
    }

    pub fn variant(&self) -> ModelVariant {
        self.variant
    }

    /// Runs the network on a `[1, 1, H, W]` L tensor, returning `[1, 2, H', W']` a*b*.
    fn infer(&mut self, input: Array4<f32>) -> Result<Array4<f32>, ColorizeError> {
        let input_dyn = CowArray::from(input).into_dyn();
        let inputs = ort::inputs![TensorRef::from_array_view(&input_dyn).map_err(inference_error)?];
        let outputs = self.session.run(inputs).map_err(inference_error)?;
        let (shape, data) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(inference_error)?;

        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        match dims.as_slice() {
            &[1, 2, h, w] if h > 0 && w > 0 => {
                Array4::from_shape_vec((1, 2, h, w), data.to_vec()).map_err(inference_error)
            }
            other => Err(ColorizeError::Inference(format!(
                "unexpected output shape {other:?}, expected [1, 2, H, W]"
            ))),
        }
    }
}

impl Colorizer for OrtColorizer {
    fn colorize(&mut self, frame: &RgbImage) -> Result<RgbImage, ColorizeError> {
        let l_orig = luminance_plane(frame);
        let input = preprocess(frame)?;
        let ab = self.infer(input)?;
        postprocess(&l_orig, ab.view())
    }
}

/// Bicubic resize of the frame to the network input size.
fn resize_for_model(frame: &RgbImage) -> Result<RgbImage, ColorizeError> {
    let src = ImageRef::new(frame.width(), frame.height(), frame.as_raw(), PixelType::U8x3)
        .map_err(inference_error)?;
    let mut dst = Image::new(MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, PixelType::U8x3);

    let options = ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::CatmullRom));
    Resizer::new()
        .resize(&src, &mut dst, &options)
        .map_err(inference_error)?;

    RgbImage::from_raw(MODEL_INPUT_SIZE, MODEL_INPUT_SIZE, dst.buffer().to_vec())
        .ok_or_else(|| ColorizeError::Inference("resized buffer has the wrong size".into()))
}

/// L channel of every pixel, shaped `(height, width)`.
pub fn luminance_plane(image: &RgbImage) -> Array2<f32> {
    let (w, h) = image.dimensions();
    Array2::from_shape_fn((h as usize, w as usize), |(y, x)| {
        rgb_to_l(image.get_pixel(x as u32, y as u32).0)
    })
}

/// Network input for `frame`: the L channel at 256x256, shaped `[1, 1, 256, 256]`.
pub fn preprocess(frame: &RgbImage) -> Result<Array4<f32>, ColorizeError> {
    if frame.width() == 0 || frame.height() == 0 {
        return Err(ColorizeError::Decode("frame has no pixels".into()));
    }
    let resized = resize_for_model(frame)?;
    let plane = luminance_plane(&resized);
    let (h, w) = plane.dim();
    plane
        .into_shape_with_order((1, 1, h, w))
        .map_err(inference_error)
}

/// Bilinear resize of a single plane, sampling at pixel centres.
pub fn upsample_bilinear(src: ArrayView2<f32>, out_h: usize, out_w: usize) -> Array2<f32> {
    let (in_h, in_w) = src.dim();
    let scale_y = in_h as f32 / out_h as f32;
    let scale_x = in_w as f32 / out_w as f32;

    let sample = |pos: usize, scale: f32, len: usize| {
        let s = ((pos as f32 + 0.5) * scale - 0.5).max(0.0);
        let i0 = (s as usize).min(len - 1);
        let i1 = (i0 + 1).min(len - 1);
        (i0, i1, s - i0 as f32)
    };

    Array2::from_shape_fn((out_h, out_w), |(y, x)| {
        let (y0, y1, fy) = sample(y, scale_y, in_h);
        let (x0, x1, fx) = sample(x, scale_x, in_w);
        let fx = fx.min(1.0);
        let fy = fy.min(1.0);
        let top = src[[y0, x0]] * (1.0 - fx) + src[[y0, x1]] * fx;
        let bottom = src[[y1, x0]] * (1.0 - fx) + src[[y1, x1]] * fx;
        top * (1.0 - fy) + bottom * fy
    })
}

/// Recombines the full resolution L plane with predicted a*b* and converts
/// back to 8-bit RGB.
pub fn postprocess(l_orig: &Array2<f32>, ab: ArrayView4<f32>) -> Result<RgbImage, ColorizeError> {
    let (h, w) = l_orig.dim();
    if ab.shape()[..2] != [1, 2] {
        return Err(ColorizeError::Inference(format!(
            "a*b* tensor has shape {:?}",
            ab.shape()
        )));
    }
    let a = upsample_bilinear(ab.slice(s![0, 0, .., ..]), h, w);
    let b = upsample_bilinear(ab.slice(s![0, 1, .., ..]), h, w);

    let mut out = RgbImage::new(w as u32, h as u32);
    for (x, y, px) in out.enumerate_pixels_mut() {
        let idx = [y as usize, x as usize];
        *px = Rgb(lab_to_rgb8([l_orig[idx], a[idx], b[idx]]));
    }
    Ok(out)
}
