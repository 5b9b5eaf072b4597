use std::path::Path;

use colorize_common::pipeline::{FrameSource, SourceInfo};
use colorize_common::ColorizeError;
use ffmpeg::format::{context::Input, input, Pixel};
use ffmpeg::media::Type;
use ffmpeg::software::scaling::{context::Context, flag::Flags};
use ffmpeg::util::frame::video::Video;
use image::RgbImage;

/// Used when the container reports no usable frame rate.
const FALLBACK_FPS: f64 = 25.0;

/// Pulls RGB frames out of a video file one at a time.
pub struct FfmpegSource {
    ictx: Input,
    decoder: ffmpeg::decoder::Video,
    scaler: Context,
    video_stream_index: usize,
    info: SourceInfo,
    eof_sent: bool,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self, ffmpeg::Error> {
        let ictx = input(path)?;

        let stream = ictx
            .streams()
            .best(Type::Video)
            .ok_or(ffmpeg::Error::StreamNotFound)?;
        let video_stream_index = stream.index();

        let context_decoder = ffmpeg::codec::context::Context::from_parameters(stream.parameters())?;
        let decoder = context_decoder.decoder().video()?;

        let mut rate = stream.avg_frame_rate();
        if rate.numerator() <= 0 || rate.denominator() <= 0 {
            rate = stream.rate();
        }
        let fps = if rate.numerator() > 0 && rate.denominator() > 0 {
            f64::from(rate)
        } else {
            log::warn!("{path:?} has no usable frame rate, assuming {FALLBACK_FPS}");
            FALLBACK_FPS
        };

        let frame_count = match stream.frames() {
            n if n > 0 => Some(n as u64),
            _ => frames_from_duration(ictx.duration(), fps),
        };
        let has_audio = ictx.streams().best(Type::Audio).is_some();

        let scaler = Context::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            Flags::BILINEAR,
        )?;

        log::info!(
            "Opened {path:?}: {}x{} {:?}, stream #{video_stream_index}",
            decoder.width(),
            decoder.height(),
            decoder.format()
        );

        Ok(Self {
            ictx,
            decoder,
            scaler,
            video_stream_index,
            info: SourceInfo {
                fps,
                frame_count,
                has_audio,
            },
            eof_sent: false,
        })
    }

    fn decode_next(&mut self) -> Result<Option<RgbImage>, ffmpeg::Error> {
        let mut decoded = Video::empty();
        loop {
            if self.decoder.receive_frame(&mut decoded).is_ok() {
                let mut rgb_frame = Video::empty();
                self.scaler.run(&decoded, &mut rgb_frame)?;
                return frame_to_image(&rgb_frame)
                    .map(Some)
                    .ok_or(ffmpeg::Error::InvalidData);
            }
            if self.eof_sent {
                return Ok(None);
            }

            let mut packet = ffmpeg::Packet::empty();
            match packet.read(&mut self.ictx) {
                Ok(()) => {
                    if packet.stream() == self.video_stream_index {
                        self.decoder.send_packet(&packet)?;
                    }
                }
                Err(ffmpeg::Error::Eof) => {
                    self.decoder.send_eof()?;
                    self.eof_sent = true;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> SourceInfo {
        self.info
    }

    fn next_frame(&mut self) -> Result<Option<RgbImage>, ColorizeError> {
        self.decode_next()
            .map_err(|e| ColorizeError::Decode(e.to_string()))
    }
}

/// Container duration is in `AV_TIME_BASE` (microsecond) units.
fn frames_from_duration(duration: i64, fps: f64) -> Option<u64> {
    if duration <= 0 {
        return None;
    }
    let frames = (duration as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE) * fps).round();
    (frames >= 1.0).then_some(frames as u64)
}

/// Copies a packed RGB24 frame into an image, skipping row padding.
pub fn frame_to_image(frame: &Video) -> Option<RgbImage> {
    let (width, height) = (frame.width(), frame.height());
    let row = width as usize * 3;
    let stride = frame.stride(0);
    let data = frame.data(0);

    let mut buf = Vec::with_capacity(row * height as usize);
    for y in 0..height as usize {
        buf.extend_from_slice(data.get(y * stride..y * stride + row)?);
    }
    RgbImage::from_raw(width, height, buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_from_duration() {
        assert_eq!(frames_from_duration(2_000_000, 25.0), Some(50));
        assert_eq!(frames_from_duration(0, 25.0), None);
        assert_eq!(frames_from_duration(-5, 25.0), None);
    }

    #[test]
    fn padded_rows_are_skipped() {
        let mut frame = Video::new(Pixel::RGB24, 3, 2);
        let stride = frame.stride(0);
        let data = frame.data_mut(0);
        for y in 0..2 {
            for x in 0..9 {
                data[y * stride + x] = (y * 10 + x) as u8;
            }
        }

        let image = frame_to_image(&frame).unwrap();
        assert_eq!(image.dimensions(), (3, 2));
        assert_eq!(image.get_pixel(0, 0).0, [0, 1, 2]);
        assert_eq!(image.get_pixel(2, 1).0, [16, 17, 18]);
    }
}
