//! Core primitives for the box-sum convolution export.
//!
//! This crate builds a fixed 2-D convolution operator with deterministic
//! parameters, traces one forward pass over it, and serializes the traced
//! graph (parameters included) to an ONNX file via `tract-onnx`'s protobuf
//! types.

/// The 2-D convolution operator and its configuration.
pub mod conv;
/// ONNX model construction and file export.
pub mod onnx;
/// CPU `f32` tensors.
pub mod tensor;
/// Forward-pass tracing into a serializable graph description.
pub mod trace;

pub use conv::{Conv2d, Conv2dChannels, Conv2dConfig, SpatialDims};
pub use onnx::{build_model_proto, export_model, DEFAULT_OPSET, MAX_OPSET, MIN_OPSET};
pub use tensor::{Tensor, TensorShape};
pub use trace::{trace_forward, ConvAttributes, GraphTrace, ValueDesc, INPUT_NAME, OUTPUT_NAME};

/// Returns the crate version for diagnostics.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
