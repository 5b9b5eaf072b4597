//! Shared building blocks for colorizing black & white images and videos.
//!
//! Nothing in here touches ffmpeg or onnxruntime directly: decoders, encoders,
//! muxers and the neural network itself are reached through the traits in
//! [`colorizer`] and [`pipeline`], so the drivers can be exercised with fakes.

pub mod batch;
pub mod colorizer;
pub mod config;
pub mod error;
pub mod frame_meta;
pub mod lab;
pub mod media;
pub mod model;
pub mod pipeline;
pub mod progress;
pub mod time_format;
pub mod video_meta;

pub use error::{ColorizeError, ErrorClass};
