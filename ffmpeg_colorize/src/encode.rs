use std::path::Path;

use colorize_common::pipeline::{FrameDims, VideoEncoder};
use colorize_common::ColorizeError;
use ffmpeg::format::{context::Output, Pixel};
use ffmpeg::software::scaling::{context::Context, flag::Flags};
use ffmpeg::util::frame::video::Video;
use ffmpeg::Rational;
use image::RgbImage;

/// Encodes colorized frames into a silent video file.
pub struct FfmpegEncoder {
    codec_name: String,
}

impl FfmpegEncoder {
    pub fn new(codec_name: impl Into<String>) -> Self {
        Self {
            codec_name: codec_name.into(),
        }
    }

    fn write(
        &self,
        frames: &[RgbImage],
        fps: f64,
        dims: FrameDims,
        output: &Path,
    ) -> Result<(), ffmpeg::Error> {
        let codec = ffmpeg::encoder::find_by_name(&self.codec_name)
            .or_else(|| {
                log::warn!("Encoder {} not available, falling back to mpeg4", self.codec_name);
                ffmpeg::encoder::find(ffmpeg::codec::Id::MPEG4)
            })
            .ok_or(ffmpeg::Error::EncoderNotFound)?;

        let mut octx = ffmpeg::format::output(output)?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let pixel_format = output_pixel_format(dims);
        let frame_rate = Rational::from(fps);
        let encoder_time_base = frame_rate.invert();

        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()?;
        encoder.set_width(dims.width);
        encoder.set_height(dims.height);
        encoder.set_format(pixel_format);
        encoder.set_frame_rate(Some(frame_rate));
        encoder.set_time_base(encoder_time_base);
        if global_header {
            encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }

        let mut opts = ffmpeg::Dictionary::new();
        if codec.name() == "libx264" {
            opts.set("preset", "medium");
            opts.set("crf", "18");
        }
        let mut encoder = encoder.open_with(opts)?;

        let mut ost = octx.add_stream(codec)?;
        ost.set_parameters(&encoder);
        ost.set_time_base(encoder_time_base);

        octx.write_header()?;
        // The muxer may have picked its own time base.
        let stream_time_base = octx
            .stream(0)
            .ok_or(ffmpeg::Error::StreamNotFound)?
            .time_base();

        log::debug!(
            "Encoding with {} as {pixel_format:?}, {fps:.3} fps",
            codec.name()
        );

        let mut scaler = Context::get(
            Pixel::RGB24,
            dims.width,
            dims.height,
            pixel_format,
            dims.width,
            dims.height,
            Flags::BILINEAR,
        )?;

        for (i, image) in frames.iter().enumerate() {
            let rgb_frame = image_to_frame(image);
            let mut yuv_frame = Video::empty();
            scaler.run(&rgb_frame, &mut yuv_frame)?;
            yuv_frame.set_pts(Some(i as i64));

            encoder.send_frame(&yuv_frame)?;
            write_packets(&mut encoder, &mut octx, encoder_time_base, stream_time_base)?;
        }

        encoder.send_eof()?;
        write_packets(&mut encoder, &mut octx, encoder_time_base, stream_time_base)?;
        octx.write_trailer()?;
        Ok(())
    }
}

impl VideoEncoder for FfmpegEncoder {
    fn encode(
        &mut self,
        frames: &[RgbImage],
        fps: f64,
        dims: FrameDims,
        output: &Path,
    ) -> Result<(), ColorizeError> {
        self.write(frames, fps, dims, output)
            .map_err(|e| ColorizeError::Encode(format!("{output:?}: {e}")))
    }
}

fn write_packets(
    encoder: &mut ffmpeg::encoder::Video,
    octx: &mut Output,
    encoder_time_base: Rational,
    stream_time_base: Rational,
) -> Result<(), ffmpeg::Error> {
    let mut encoded = ffmpeg::Packet::empty();
    while encoder.receive_packet(&mut encoded).is_ok() {
        encoded.set_stream(0);
        encoded.rescale_ts(encoder_time_base, stream_time_base);
        encoded.write_interleaved(octx)?;
    }
    Ok(())
}

/// 4:2:0 needs even dimensions, odd sized frames keep full chroma.
fn output_pixel_format(dims: FrameDims) -> Pixel {
    if dims.width % 2 == 0 && dims.height % 2 == 0 {
        Pixel::YUV420P
    } else {
        Pixel::YUV444P
    }
}

/// Copies an image into a packed RGB24 frame, honouring the frame's stride.
pub fn image_to_frame(image: &RgbImage) -> Video {
    let (width, height) = image.dimensions();
    let mut frame = Video::new(Pixel::RGB24, width, height);
    let row = width as usize * 3;
    let stride = frame.stride(0);
    let data = frame.data_mut(0);
    for (y, src) in image.as_raw().chunks_exact(row).enumerate() {
        data[y * stride..y * stride + row].copy_from_slice(src);
    }
    frame
}
