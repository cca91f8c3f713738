use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use bytemuck::cast_slice;
use log::debug;
use prost::Message;
use tract_onnx::pb;

use crate::tensor::Tensor;
use crate::trace::GraphTrace;

/// Opset revision targeted by default.
pub const DEFAULT_OPSET: i64 = 10;
/// Oldest opset this exporter emits a valid attribute layout for.
pub const MIN_OPSET: i64 = 7;
/// Newest opset revision the exporter has been verified against.
pub const MAX_OPSET: i64 = 18;

const WEIGHT_NAME: &str = "weight";
const BIAS_NAME: &str = "bias";
const GRAPH_NAME: &str = "boxconv";

/// Minimum ONNX IR version able to carry models of the given opset,
/// per the published ONNX release table.
fn ir_version_for_opset(opset: i64) -> i64 {
    match opset {
        ..=8 => 3,
        9 => 4,
        10 => 5,
        11 => 6,
        12..=14 => 7,
        _ => 8,
    }
}

fn check_opset(opset: i64) -> Result<()> {
    anyhow::ensure!(
        opset >= MIN_OPSET,
        "opset {opset} is too old to express this convolution (minimum supported is {MIN_OPSET})"
    );
    anyhow::ensure!(
        opset <= MAX_OPSET,
        "opset {opset} is not supported (maximum is {MAX_OPSET})"
    );
    Ok(())
}

fn tensor_to_proto(name: &str, tensor: &Tensor) -> pb::TensorProto {
    pb::TensorProto {
        name: name.to_string(),
        dims: tensor.dims().iter().map(|&d| d as i64).collect(),
        data_type: pb::tensor_proto::DataType::Float as i32,
        raw_data: cast_slice::<f32, u8>(tensor.data()).to_vec(),
        ..Default::default()
    }
}

fn value_info(name: &str, dims: &[usize]) -> pb::ValueInfoProto {
    let shape = pb::TensorShapeProto {
        dim: dims
            .iter()
            .map(|&d| pb::tensor_shape_proto::Dimension {
                value: Some(pb::tensor_shape_proto::dimension::Value::DimValue(d as i64)),
                ..Default::default()
            })
            .collect(),
        ..Default::default()
    };
    pb::ValueInfoProto {
        name: name.to_string(),
        r#type: Some(pb::TypeProto {
            value: Some(pb::type_proto::Value::TensorType(pb::type_proto::Tensor {
                elem_type: pb::tensor_proto::DataType::Float as i32,
                shape: Some(shape),
            })),
            ..Default::default()
        }),
        ..Default::default()
    }
}

fn ints_attribute(name: &str, values: &[i64]) -> pb::AttributeProto {
    pb::AttributeProto {
        name: name.to_string(),
        r#type: pb::attribute_proto::AttributeType::Ints as i32,
        ints: values.to_vec(),
        ..Default::default()
    }
}

fn int_attribute(name: &str, value: i64) -> pb::AttributeProto {
    pb::AttributeProto {
        name: name.to_string(),
        r#type: pb::attribute_proto::AttributeType::Int as i32,
        i: value,
        ..Default::default()
    }
}

/// Build the ONNX model for a traced convolution: one `Conv` node, its
/// weight and bias baked in as initializers, and the traced input/output
/// declared as the graph interface.
pub fn build_model_proto(trace: &GraphTrace, opset: i64) -> Result<pb::ModelProto> {
    check_opset(opset)?;

    let attrs = &trace.attributes;
    let node = pb::NodeProto {
        name: "Conv_0".to_string(),
        op_type: "Conv".to_string(),
        input: vec![
            trace.input.name.clone(),
            WEIGHT_NAME.to_string(),
            BIAS_NAME.to_string(),
        ],
        output: vec![trace.output.name.clone()],
        attribute: vec![
            ints_attribute("dilations", &attrs.dilations),
            int_attribute("group", attrs.group),
            ints_attribute("kernel_shape", &attrs.kernel_shape),
            ints_attribute("pads", &attrs.pads),
            ints_attribute("strides", &attrs.strides),
        ],
        ..Default::default()
    };

    let graph = pb::GraphProto {
        name: GRAPH_NAME.to_string(),
        node: vec![node],
        initializer: vec![
            tensor_to_proto(WEIGHT_NAME, &trace.weight),
            tensor_to_proto(BIAS_NAME, &trace.bias),
        ],
        input: vec![value_info(&trace.input.name, &trace.input.dims)],
        output: vec![value_info(&trace.output.name, &trace.output.dims)],
        ..Default::default()
    };

    Ok(pb::ModelProto {
        ir_version: ir_version_for_opset(opset),
        producer_name: "boxconv".to_string(),
        producer_version: crate::version().to_string(),
        opset_import: vec![pb::OperatorSetIdProto {
            domain: String::new(),
            version: opset,
        }],
        graph: Some(graph),
        ..Default::default()
    })
}

/// Serialize the traced graph to `path`.
///
/// The encoded model is written to a sibling temporary file and renamed into
/// place, so a failed export never leaves a partial artifact at `path`.
pub fn export_model<P: AsRef<Path>>(trace: &GraphTrace, path: P, opset: i64) -> Result<()> {
    let path = path.as_ref();
    let model = build_model_proto(trace, opset)?;
    let payload = model.encode_to_vec();
    debug!(
        "encoded ONNX model for {} ({} bytes, opset {opset})",
        path.display(),
        payload.len()
    );

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("invalid export path {}", path.display()))?;
    let tmp_path = path.with_file_name(format!("{file_name}.tmp"));

    fs::write(&tmp_path, &payload)
        .with_context(|| format!("failed to write {}", tmp_path.display()))?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("failed to move artifact into {}", path.display()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conv::Conv2d;
    use crate::trace::trace_forward;

    fn box_sum_trace() -> GraphTrace {
        let mut conv = Conv2d::box_sum_3x3().unwrap();
        conv.eval();
        let input = Tensor::ones([1usize, 1, 5, 5]).unwrap();
        let (_, trace) = trace_forward(&conv, &input).unwrap();
        trace
    }

    #[test]
    fn ir_version_follows_the_release_table() {
        assert_eq!(ir_version_for_opset(7), 3);
        assert_eq!(ir_version_for_opset(9), 4);
        assert_eq!(ir_version_for_opset(10), 5);
        assert_eq!(ir_version_for_opset(11), 6);
        assert_eq!(ir_version_for_opset(13), 7);
        assert_eq!(ir_version_for_opset(18), 8);
    }

    #[test]
    fn opset_out_of_range_is_rejected() {
        let trace = box_sum_trace();
        let err = build_model_proto(&trace, 3).unwrap_err();
        assert!(err.to_string().contains("too old"));
        assert!(build_model_proto(&trace, MAX_OPSET + 1).is_err());
    }

    #[test]
    fn model_carries_one_conv_node_with_fixed_io_names() {
        let model = build_model_proto(&box_sum_trace(), DEFAULT_OPSET).unwrap();
        assert_eq!(model.ir_version, 5);
        assert_eq!(model.opset_import.len(), 1);
        assert_eq!(model.opset_import[0].version, DEFAULT_OPSET);

        let graph = model.graph.expect("graph present");
        assert_eq!(graph.node.len(), 1);
        let node = &graph.node[0];
        assert_eq!(node.op_type, "Conv");
        assert_eq!(node.input, vec!["x", "weight", "bias"]);
        assert_eq!(node.output, vec!["y"]);

        assert_eq!(graph.input.len(), 1);
        assert_eq!(graph.input[0].name, "x");
        assert_eq!(graph.output.len(), 1);
        assert_eq!(graph.output[0].name, "y");
    }

    #[test]
    fn initializers_hold_the_fixed_parameters() {
        let model = build_model_proto(&box_sum_trace(), DEFAULT_OPSET).unwrap();
        let graph = model.graph.expect("graph present");
        assert_eq!(graph.initializer.len(), 2);

        let weight = &graph.initializer[0];
        assert_eq!(weight.name, "weight");
        assert_eq!(weight.dims, vec![1, 1, 3, 3]);
        assert_eq!(weight.data_type, pb::tensor_proto::DataType::Float as i32);
        assert_eq!(cast_slice::<u8, f32>(&weight.raw_data), &[1.0f32; 9]);

        let bias = &graph.initializer[1];
        assert_eq!(bias.name, "bias");
        assert_eq!(bias.dims, vec![1]);
        assert_eq!(cast_slice::<u8, f32>(&bias.raw_data), &[0.0f32]);
    }

    #[test]
    fn conv_attributes_are_serialized() {
        let model = build_model_proto(&box_sum_trace(), DEFAULT_OPSET).unwrap();
        let node = &model.graph.expect("graph present").node[0];
        let find = |name: &str| {
            node.attribute
                .iter()
                .find(|attr| attr.name == name)
                .unwrap_or_else(|| panic!("attribute {name} missing"))
                .clone()
        };
        assert_eq!(find("kernel_shape").ints, vec![3, 3]);
        assert_eq!(find("strides").ints, vec![1, 1]);
        assert_eq!(find("pads").ints, vec![1, 1, 1, 1]);
        assert_eq!(find("dilations").ints, vec![1, 1]);
        assert_eq!(find("group").i, 1);
    }
}
