//! Command-line argument definitions for the boxconv exporter.

use clap::Parser;
use std::path::PathBuf;

/// Export the fixed 3x3 box-sum convolution as an ONNX graph.
///
/// With no flags the run reproduces the reference behavior exactly: an
/// unseeded random `(1, 1, 5, 5)` input traces one forward pass and the
/// graph lands in `Conv.onnx` in the current directory, targeting opset 10.
#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct ExportArgs {
    /// Output path for the exported ONNX artifact.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Target ONNX opset revision.
    #[arg(long)]
    pub opset: Option<i64>,

    /// Seed for the random input tensor. Omit for a fresh unseeded input;
    /// set it when deterministic fixtures are needed.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Override input height (pixels).
    #[arg(long)]
    pub height: Option<usize>,

    /// Override input width (pixels).
    #[arg(long)]
    pub width: Option<usize>,

    /// Optional settings JSON (defaults to built-in export parameters).
    #[arg(long)]
    pub config: Option<PathBuf>,
}
