use anyhow::Result;

use crate::conv::Conv2d;
use crate::tensor::Tensor;

/// Logical name assigned to the traced graph input.
pub const INPUT_NAME: &str = "x";
/// Logical name assigned to the traced graph output.
pub const OUTPUT_NAME: &str = "y";

/// Name and concrete dimensions of a traced graph edge.
#[derive(Debug, Clone)]
pub struct ValueDesc {
    pub name: String,
    pub dims: Vec<usize>,
}

/// ONNX `Conv` attribute set captured from the operator configuration.
///
/// `pads` follows the ONNX begin/end order: `[top, left, bottom, right]`.
#[derive(Debug, Clone)]
pub struct ConvAttributes {
    pub kernel_shape: [i64; 2],
    pub strides: [i64; 2],
    pub pads: [i64; 4],
    pub dilations: [i64; 2],
    pub group: i64,
}

/// Record of one traced convolution invocation: the input and output edges as
/// observed during the forward pass, plus parameter snapshots and the ONNX
/// attribute set needed to serialize the node.
#[derive(Debug, Clone)]
pub struct GraphTrace {
    pub input: ValueDesc,
    pub output: ValueDesc,
    pub weight: Tensor,
    pub bias: Tensor,
    pub attributes: ConvAttributes,
}

/// Run one forward pass and record the invocation.
///
/// The operator must be in inference mode first; tracing a training-mode
/// operator is rejected so training-only behavior can never leak into the
/// recorded graph.
pub fn trace_forward(conv: &Conv2d, input: &Tensor) -> Result<(Tensor, GraphTrace)> {
    anyhow::ensure!(
        !conv.is_training(),
        "cannot trace a forward pass in training mode; call eval() first"
    );

    let output = conv.forward(input)?;

    let config = conv.config();
    let attributes = ConvAttributes {
        kernel_shape: [config.kernel.height as i64, config.kernel.width as i64],
        strides: [config.stride.height as i64, config.stride.width as i64],
        pads: [
            config.padding.height as i64,
            config.padding.width as i64,
            config.padding.height as i64,
            config.padding.width as i64,
        ],
        dilations: [1, 1],
        group: 1,
    };

    let trace = GraphTrace {
        input: ValueDesc {
            name: INPUT_NAME.to_string(),
            dims: input.dims().to_vec(),
        },
        output: ValueDesc {
            name: OUTPUT_NAME.to_string(),
            dims: output.dims().to_vec(),
        },
        weight: conv.weight().clone(),
        bias: conv.bias().clone(),
        attributes,
    };

    Ok((output, trace))
}
