//! onnxruntime backed colorization.

pub mod colorizer;
pub mod session;

pub use colorizer::OrtColorizer;
