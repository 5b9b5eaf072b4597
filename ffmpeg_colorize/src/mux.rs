use std::path::Path;

use colorize_common::pipeline::AudioMuxer;
use colorize_common::ColorizeError;
use ffmpeg::codec::capabilities::Capabilities;
use ffmpeg::format::context::{Input, Output};
use ffmpeg::format::input;
use ffmpeg::media::Type;
use ffmpeg::util::frame::audio::Audio;
use ffmpeg::{filter, Rational};

/// Bit rate of the AAC track written when the source audio can't be copied.
const AAC_BIT_RATE: usize = 192_000;

/// Puts the colorized video and the source audio into one file. The video is
/// always stream-copied; the audio is copied when the output container can
/// hold its codec and re-encoded to AAC otherwise.
#[derive(Debug, Default)]
pub struct FfmpegMuxer;

impl AudioMuxer for FfmpegMuxer {
    fn mux(&mut self, source: &Path, video: &Path, output: &Path) -> Result<(), ColorizeError> {
        log::info!("Adding audio from {source:?}");
        remux(source, video, output).map_err(|e| ColorizeError::Mux(format!("{output:?}: {e}")))
    }
}

fn remux(source: &Path, video: &Path, output: &Path) -> Result<(), ffmpeg::Error> {
    let mut video_in = input(video)?;
    let mut audio_in = input(source)?;
    let mut octx = ffmpeg::format::output(output)?;

    let video_index = add_copy_stream(&video_in, &mut octx, Type::Video)?;

    let audio_stream = audio_in
        .streams()
        .best(Type::Audio)
        .ok_or(ffmpeg::Error::StreamNotFound)?;
    let audio_codec = audio_stream.parameters().id();
    let mut transcoder = if accepts_codec(&octx, audio_codec) {
        add_copy_stream(&audio_in, &mut octx, Type::Audio)?;
        None
    } else {
        log::info!("{audio_codec:?} audio can't be copied into {output:?}, re-encoding to AAC");
        Some(AudioTranscoder::new(&audio_in, &mut octx, 1)?)
    };
    let audio_index = audio_stream.index();

    octx.write_header()?;
    let video_time_base = output_time_base(&octx, 0)?;
    let audio_time_base = output_time_base(&octx, 1)?;

    copy_packets(&mut video_in, video_index, 0, video_time_base, &mut octx)?;
    match transcoder.as_mut() {
        Some(transcoder) => {
            for (stream, packet) in audio_in.packets() {
                if stream.index() == audio_index {
                    transcoder.send_packet(&packet, audio_time_base, &mut octx)?;
                }
            }
            transcoder.finish(audio_time_base, &mut octx)?;
        }
        None => copy_packets(&mut audio_in, audio_index, 1, audio_time_base, &mut octx)?,
    }

    octx.write_trailer()?;
    Ok(())
}

/// Whether the output container can store `codec` without re-encoding.
fn accepts_codec(octx: &Output, codec: ffmpeg::codec::Id) -> bool {
    // 1 = supported, 0 = not supported, negative = unknown.
    let supported = unsafe { ffmpeg::ffi::avformat_query_codec(octx.format().as_ptr(), codec.into(), 0) };
    supported > 0
}

/// Adds an output stream mirroring the best `kind` stream of `ictx` and
/// returns that input stream's index.
fn add_copy_stream(ictx: &Input, octx: &mut Output, kind: Type) -> Result<usize, ffmpeg::Error> {
    let ist = ictx
        .streams()
        .best(kind)
        .ok_or(ffmpeg::Error::StreamNotFound)?;
    let mut ost = octx.add_stream(ffmpeg::encoder::find(ffmpeg::codec::Id::None))?;
    ost.set_parameters(ist.parameters());
    // Let the output container choose its own tag for the copied codec.
    unsafe {
        (*ost.parameters().as_mut_ptr()).codec_tag = 0;
    }
    Ok(ist.index())
}

fn output_time_base(octx: &Output, index: usize) -> Result<Rational, ffmpeg::Error> {
    Ok(octx
        .stream(index)
        .ok_or(ffmpeg::Error::StreamNotFound)?
        .time_base())
}

fn copy_packets(
    ictx: &mut Input,
    stream_index: usize,
    out_index: usize,
    out_time_base: Rational,
    octx: &mut Output,
) -> Result<(), ffmpeg::Error> {
    for (stream, mut packet) in ictx.packets() {
        if stream.index() != stream_index {
            continue;
        }
        packet.rescale_ts(stream.time_base(), out_time_base);
        packet.set_position(-1);
        packet.set_stream(out_index);
        packet.write_interleaved(octx)?;
    }
    Ok(())
}

/// Decodes the source audio and re-encodes it as AAC. Timestamps are rebuilt
/// from the sample count, so the track starts at zero like the encoded video.
struct AudioTranscoder {
    decoder: ffmpeg::decoder::Audio,
    encoder: ffmpeg::encoder::Audio,
    filter: filter::Graph,
    /// `1 / sample_rate`, the unit of every pts below.
    time_base: Rational,
    out_index: usize,
    decoded_samples: i64,
    filtered_samples: i64,
}

impl AudioTranscoder {
    fn new(ictx: &Input, octx: &mut Output, out_index: usize) -> Result<Self, ffmpeg::Error> {
        let ist = ictx
            .streams()
            .best(Type::Audio)
            .ok_or(ffmpeg::Error::StreamNotFound)?;
        let decoder = ffmpeg::codec::context::Context::from_parameters(ist.parameters())?
            .decoder()
            .audio()?;

        let codec = ffmpeg::encoder::find(ffmpeg::codec::Id::AAC)
            .ok_or(ffmpeg::Error::EncoderNotFound)?
            .audio()?;
        let global_header = octx
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER);

        let rate = decoder.rate() as i32;
        let time_base = Rational::new(1, rate);
        let channel_layout = codec
            .channel_layouts()
            .map(|layouts| layouts.best(decoder.channel_layout().channels()))
            .unwrap_or(ffmpeg::channel_layout::ChannelLayout::STEREO);
        let sample_format = codec
            .formats()
            .and_then(|mut formats| formats.next())
            .unwrap_or(ffmpeg::format::Sample::F32(ffmpeg::format::sample::Type::Planar));

        let mut ost = octx.add_stream(codec)?;
        let mut encoder = ffmpeg::codec::context::Context::from_parameters(ost.parameters())?
            .encoder()
            .audio()?;
        if global_header {
            encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }
        encoder.set_rate(rate);
        encoder.set_channel_layout(channel_layout);
        encoder.set_format(sample_format);
        encoder.set_bit_rate(AAC_BIT_RATE);
        encoder.set_time_base(time_base);
        ost.set_time_base(time_base);

        let encoder = encoder.open_as(codec)?;
        ost.set_parameters(&encoder);

        let filter = resample_graph(&decoder, &encoder, time_base)?;
        Ok(Self {
            decoder,
            encoder,
            filter,
            time_base,
            out_index,
            decoded_samples: 0,
            filtered_samples: 0,
        })
    }

    fn send_packet(
        &mut self,
        packet: &ffmpeg::Packet,
        out_time_base: Rational,
        octx: &mut Output,
    ) -> Result<(), ffmpeg::Error> {
        self.decoder.send_packet(packet)?;
        self.drain_decoder(out_time_base, octx)
    }

    fn finish(&mut self, out_time_base: Rational, octx: &mut Output) -> Result<(), ffmpeg::Error> {
        self.decoder.send_eof()?;
        self.drain_decoder(out_time_base, octx)?;
        graph_node(&mut self.filter, "in")?.source().flush()?;
        self.drain_filter(out_time_base, octx)?;
        self.encoder.send_eof()?;
        self.drain_encoder(out_time_base, octx)
    }

    fn drain_decoder(&mut self, out_time_base: Rational, octx: &mut Output) -> Result<(), ffmpeg::Error> {
        let mut decoded = Audio::empty();
        while self.decoder.receive_frame(&mut decoded).is_ok() {
            decoded.set_pts(Some(self.decoded_samples));
            self.decoded_samples += decoded.samples() as i64;
            graph_node(&mut self.filter, "in")?.source().add(&decoded)?;
            self.drain_filter(out_time_base, octx)?;
        }
        Ok(())
    }

    fn drain_filter(&mut self, out_time_base: Rational, octx: &mut Output) -> Result<(), ffmpeg::Error> {
        let mut filtered = Audio::empty();
        while graph_node(&mut self.filter, "out")?
            .sink()
            .frame(&mut filtered)
            .is_ok()
        {
            filtered.set_pts(Some(self.filtered_samples));
            self.filtered_samples += filtered.samples() as i64;
            self.encoder.send_frame(&filtered)?;
            self.drain_encoder(out_time_base, octx)?;
        }
        Ok(())
    }

    fn drain_encoder(&mut self, out_time_base: Rational, octx: &mut Output) -> Result<(), ffmpeg::Error> {
        let mut encoded = ffmpeg::Packet::empty();
        while self.encoder.receive_packet(&mut encoded).is_ok() {
            encoded.set_stream(self.out_index);
            encoded.rescale_ts(self.time_base, out_time_base);
            encoded.write_interleaved(octx)?;
        }
        Ok(())
    }
}

fn graph_node<'a>(graph: &'a mut filter::Graph, name: &str) -> Result<filter::Context<'a>, ffmpeg::Error> {
    graph.get(name).ok_or(ffmpeg::Error::FilterNotFound)
}

/// `abuffer -> abuffersink` graph converting the decoder's samples to the
/// encoder's format, rate, layout and frame size.
fn resample_graph(
    decoder: &ffmpeg::decoder::Audio,
    encoder: &ffmpeg::encoder::Audio,
    time_base: Rational,
) -> Result<filter::Graph, ffmpeg::Error> {
    let mut graph = filter::Graph::new();

    let mut in_layout = decoder.channel_layout();
    if in_layout.bits() == 0 {
        in_layout = ffmpeg::channel_layout::ChannelLayout::default(decoder.channels() as i32);
    }
    let args = format!(
        "time_base={}/{}:sample_rate={}:sample_fmt={}:channel_layout=0x{:x}",
        time_base.numerator(),
        time_base.denominator(),
        decoder.rate(),
        decoder.format().name(),
        in_layout.bits()
    );
    let abuffer = filter::find("abuffer").ok_or(ffmpeg::Error::FilterNotFound)?;
    let abuffersink = filter::find("abuffersink").ok_or(ffmpeg::Error::FilterNotFound)?;
    graph.add(&abuffer, "in", &args)?;
    graph.add(&abuffersink, "out", "")?;

    {
        let mut out = graph_node(&mut graph, "out")?;
        out.set_sample_format(encoder.format());
        out.set_channel_layout(encoder.channel_layout());
        out.set_sample_rate(encoder.rate());
    }

    graph.output("in", 0)?.input("out", 0)?.parse("anull")?;
    graph.validate()?;

    let fixed_frame_size = encoder
        .codec()
        .is_some_and(|codec| !codec.capabilities().contains(Capabilities::VARIABLE_FRAME_SIZE));
    if fixed_frame_size {
        graph_node(&mut graph, "out")?
            .sink()
            .set_frame_size(encoder.frame_size());
    }
    Ok(graph)
}
