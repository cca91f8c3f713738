use anyhow::{Context, Result};

use crate::tensor::Tensor;

/// Input/output channel counts for a convolution.
#[derive(Debug, Clone, Copy)]
pub struct Conv2dChannels {
    pub input: u32,
    pub output: u32,
}

impl Conv2dChannels {
    pub const fn new(input: u32, output: u32) -> Self {
        Self { input, output }
    }
}

/// Width/height pair used for kernel, stride, and padding geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialDims {
    pub width: u32,
    pub height: u32,
}

impl SpatialDims {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for SpatialDims {
    fn from(value: (u32, u32)) -> Self {
        Self {
            width: value.0,
            height: value.1,
        }
    }
}

/// Geometry for a convolution operator.
///
/// Unlike a compiled kernel pipeline, the config is not bound to one input
/// size; output spatial dimensions are computed per forward pass.
#[derive(Debug, Clone)]
pub struct Conv2dConfig {
    pub input_channels: u32,
    pub output_channels: u32,
    pub kernel: SpatialDims,
    pub stride: SpatialDims,
    pub padding: SpatialDims,
}

impl Conv2dConfig {
    /// Create a validated convolution configuration.
    pub fn new(
        channels: Conv2dChannels,
        kernel: SpatialDims,
        stride: SpatialDims,
        padding: SpatialDims,
    ) -> Result<Self> {
        let Conv2dChannels {
            input: input_channels,
            output: output_channels,
        } = channels;
        anyhow::ensure!(input_channels > 0, "input channels must be > 0");
        anyhow::ensure!(output_channels > 0, "output channels must be > 0");
        anyhow::ensure!(
            kernel.width > 0 && kernel.height > 0,
            "kernel must be non-zero"
        );
        anyhow::ensure!(
            stride.width > 0 && stride.height > 0,
            "stride must be non-zero"
        );

        Ok(Self {
            input_channels,
            output_channels,
            kernel,
            stride,
            padding,
        })
    }

    /// Expected weight tensor dimensions `(out, in, kh, kw)`.
    pub fn weight_shape_dims(&self) -> [usize; 4] {
        [
            self.output_channels as usize,
            self.input_channels as usize,
            self.kernel.height as usize,
            self.kernel.width as usize,
        ]
    }

    /// Expected bias tensor dimensions `(out,)`.
    pub fn bias_shape_dims(&self) -> [usize; 1] {
        [self.output_channels as usize]
    }

    /// Output spatial dimensions for an input of the provided size.
    pub fn output_spatial_dims(&self, input: SpatialDims) -> Result<SpatialDims> {
        let width = compute_output_dim(
            input.width,
            self.padding.width,
            self.kernel.width,
            self.stride.width,
        )
        .context("invalid convolution width configuration")?;
        let height = compute_output_dim(
            input.height,
            self.padding.height,
            self.kernel.height,
            self.stride.height,
        )
        .context("invalid convolution height configuration")?;
        Ok(SpatialDims::new(width, height))
    }
}

fn compute_output_dim(input: u32, pad: u32, kernel: u32, stride: u32) -> Option<u32> {
    let padded = input.checked_add(pad.checked_mul(2)?)?;
    let span = padded.checked_sub(kernel)?;
    Some(span / stride + 1)
}

/// A 2-D convolution operator with owned weight and bias parameters.
///
/// Parameters are zero-initialized at construction and overwritten through
/// [`Conv2d::set_weight`] and [`Conv2d::set_bias`]. The operator starts in
/// training mode and must be switched to inference mode with
/// [`Conv2d::eval`] before its forward pass can be traced.
#[derive(Debug, Clone)]
pub struct Conv2d {
    config: Conv2dConfig,
    weight: Tensor,
    bias: Tensor,
    training: bool,
}

impl Conv2d {
    /// Create the operator with zero-initialized parameters.
    pub fn new(config: Conv2dConfig) -> Result<Self> {
        let weight = Tensor::zeros(config.weight_shape_dims())?;
        let bias = Tensor::zeros(config.bias_shape_dims())?;
        Ok(Self {
            config,
            weight,
            bias,
            training: true,
        })
    }

    /// The fixed box-sum filter: 1 input channel, 1 output channel, a 3x3
    /// kernel of ones, stride 1, padding 1, zero bias. Each output pixel is
    /// the sum of the 3x3 neighborhood around it, with zero padding at the
    /// edges, so output spatial size always equals input spatial size.
    pub fn box_sum_3x3() -> Result<Self> {
        let config = Conv2dConfig::new(
            Conv2dChannels::new(1, 1),
            SpatialDims::new(3, 3),
            SpatialDims::new(1, 1),
            SpatialDims::new(1, 1),
        )?;
        let mut conv = Self::new(config)?;
        conv.set_weight(Tensor::ones([1usize, 1, 3, 3])?)?;
        conv.set_bias(Tensor::zeros([1usize])?)?;
        Ok(conv)
    }

    /// Overwrite the weight parameter. The tensor shape must match the
    /// configured `(out, in, kh, kw)` layout.
    pub fn set_weight(&mut self, weight: Tensor) -> Result<()> {
        let expected = self.config.weight_shape_dims();
        anyhow::ensure!(
            weight.dims() == expected,
            "weight tensor expected shape {:?}, got {:?}",
            expected,
            weight.dims()
        );
        self.weight = weight;
        Ok(())
    }

    /// Overwrite the bias parameter. One value per output channel.
    pub fn set_bias(&mut self, bias: Tensor) -> Result<()> {
        let expected = self.config.bias_shape_dims();
        anyhow::ensure!(
            bias.dims() == expected,
            "bias tensor expected shape {:?}, got {:?}",
            expected,
            bias.dims()
        );
        self.bias = bias;
        Ok(())
    }

    /// Switch to training mode.
    pub fn train(&mut self) {
        self.training = true;
    }

    /// Switch to inference mode, disabling training-only behavior.
    pub fn eval(&mut self) {
        self.training = false;
    }

    /// Returns `true` while the operator is in training mode.
    pub fn is_training(&self) -> bool {
        self.training
    }

    pub fn config(&self) -> &Conv2dConfig {
        &self.config
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    /// Run the convolution over a `(batch, channels, height, width)` input,
    /// zero-padding out-of-bounds positions.
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let dims = input.dims();
        anyhow::ensure!(
            dims.len() == 4,
            "conv input must be rank 4 (batch, channels, height, width), got rank {}",
            dims.len()
        );
        let (batch, channels, in_h, in_w) = (dims[0], dims[1], dims[2], dims[3]);
        anyhow::ensure!(
            channels == self.config.input_channels as usize,
            "conv input expected {} channel(s), got {channels}",
            self.config.input_channels
        );

        let in_size = SpatialDims::new(in_w as u32, in_h as u32);
        let out_size = self.config.output_spatial_dims(in_size)?;
        let (out_h, out_w) = (out_size.height as usize, out_size.width as usize);
        let out_channels = self.config.output_channels as usize;
        let (kernel_h, kernel_w) = (
            self.config.kernel.height as usize,
            self.config.kernel.width as usize,
        );
        let (stride_h, stride_w) = (
            self.config.stride.height as usize,
            self.config.stride.width as usize,
        );
        let (pad_h, pad_w) = (
            self.config.padding.height as isize,
            self.config.padding.width as isize,
        );

        let x = input.data();
        let w = self.weight.data();
        let b = self.bias.data();
        let mut out = vec![0.0f32; batch * out_channels * out_h * out_w];

        for n in 0..batch {
            for oc in 0..out_channels {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let mut acc = b[oc];
                        for ic in 0..channels {
                            for kh in 0..kernel_h {
                                let ih = (oh * stride_h + kh) as isize - pad_h;
                                if ih < 0 || ih >= in_h as isize {
                                    continue;
                                }
                                for kw in 0..kernel_w {
                                    let iw = (ow * stride_w + kw) as isize - pad_w;
                                    if iw < 0 || iw >= in_w as isize {
                                        continue;
                                    }
                                    let x_idx = ((n * channels + ic) * in_h + ih as usize) * in_w
                                        + iw as usize;
                                    let w_idx =
                                        ((oc * channels + ic) * kernel_h + kh) * kernel_w + kw;
                                    acc += x[x_idx] * w[w_idx];
                                }
                            }
                        }
                        let out_idx = ((n * out_channels + oc) * out_h + oh) * out_w + ow;
                        out[out_idx] = acc;
                    }
                }
            }
        }

        Tensor::from_slice([batch, out_channels, out_h, out_w], &out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_rejects_zero_kernel() {
        let result = Conv2dConfig::new(
            Conv2dChannels::new(1, 1),
            SpatialDims::new(0, 3),
            SpatialDims::new(1, 1),
            SpatialDims::new(1, 1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn box_sum_preserves_spatial_size() {
        let conv = Conv2d::box_sum_3x3().unwrap();
        let input = Tensor::ones([1usize, 1, 5, 5]).unwrap();
        let output = conv.forward(&input).unwrap();
        assert_eq!(output.dims(), &[1, 1, 5, 5]);

        let input = Tensor::ones([1usize, 1, 8, 11]).unwrap();
        let output = conv.forward(&input).unwrap();
        assert_eq!(output.dims(), &[1, 1, 8, 11]);
    }

    #[test]
    fn box_sum_parameters_are_fixed() {
        let conv = Conv2d::box_sum_3x3().unwrap();
        assert_eq!(conv.weight().dims(), &[1, 1, 3, 3]);
        assert_eq!(conv.weight().data(), &[1.0f32; 9]);
        assert_eq!(conv.bias().data(), &[0.0f32]);
    }

    #[test]
    fn impulse_response_is_a_3x3_block() {
        let conv = Conv2d::box_sum_3x3().unwrap();
        let mut impulse = vec![0.0f32; 25];
        impulse[2 * 5 + 2] = 1.0;
        let input = Tensor::from_slice([1usize, 1, 5, 5], &impulse).unwrap();

        let output = conv.forward(&input).unwrap();
        for row in 0..5 {
            for col in 0..5 {
                let expected = if (1..=3).contains(&row) && (1..=3).contains(&col) {
                    1.0
                } else {
                    0.0
                };
                assert_eq!(
                    output.data()[row * 5 + col],
                    expected,
                    "unexpected value at ({row}, {col})"
                );
            }
        }
    }

    #[test]
    fn corner_sums_cover_only_in_bounds_neighbors() {
        let conv = Conv2d::box_sum_3x3().unwrap();
        let input = Tensor::ones([1usize, 1, 5, 5]).unwrap();
        let output = conv.forward(&input).unwrap();
        // 4 in-bounds neighbors at corners, 6 along edges, 9 in the interior.
        assert_eq!(output.data()[0], 4.0);
        assert_eq!(output.data()[2], 6.0);
        assert_eq!(output.data()[2 * 5 + 2], 9.0);
    }

    #[test]
    fn set_weight_rejects_wrong_shape() {
        let mut conv = Conv2d::box_sum_3x3().unwrap();
        let bad = Tensor::ones([1usize, 1, 2, 2]).unwrap();
        assert!(conv.set_weight(bad).is_err());
    }

    #[test]
    fn forward_rejects_channel_mismatch() {
        let conv = Conv2d::box_sum_3x3().unwrap();
        let input = Tensor::ones([1usize, 3, 5, 5]).unwrap();
        assert!(conv.forward(&input).is_err());
    }

    #[test]
    fn eval_clears_training_mode() {
        let mut conv = Conv2d::box_sum_3x3().unwrap();
        assert!(conv.is_training());
        conv.eval();
        assert!(!conv.is_training());
        conv.train();
        assert!(conv.is_training());
    }
}
