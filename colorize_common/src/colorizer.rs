use image::{DynamicImage, RgbImage};

use crate::error::ColorizeError;

/// Turns one black & white RGB frame into a colorized frame of the same size.
pub trait Colorizer {
    fn colorize(&mut self, frame: &RgbImage) -> Result<RgbImage, ColorizeError>;
}

impl<C: Colorizer + ?Sized> Colorizer for &mut C {
    fn colorize(&mut self, frame: &RgbImage) -> Result<RgbImage, ColorizeError> {
        (**self).colorize(frame)
    }
}

impl<C: Colorizer + ?Sized> Colorizer for Box<C> {
    fn colorize(&mut self, frame: &RgbImage) -> Result<RgbImage, ColorizeError> {
        (**self).colorize(frame)
    }
}

/// Brings any decoded image to 3 channels: alpha is dropped silently and
/// grayscale is expanded.
pub fn to_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => {
            if other.color().has_alpha() {
                log::debug!("Dropping alpha channel of {:?} input", other.color());
            }
            other.to_rgb8()
        }
    }
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, Luma, Rgba, RgbaImage};

    use super::*;

    #[test]
    fn drops_alpha() {
        let rgba = RgbaImage::from_pixel(4, 3, Rgba([10, 20, 30, 0]));
        let rgb = to_rgb(DynamicImage::ImageRgba8(rgba));
        assert_eq!(rgb.dimensions(), (4, 3));
        assert_eq!(rgb.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn expands_grayscale() {
        let gray = GrayImage::from_pixel(2, 2, Luma([77]));
        let rgb = to_rgb(DynamicImage::ImageLuma8(gray));
        assert_eq!(rgb.get_pixel(1, 1).0, [77, 77, 77]);
    }
}
