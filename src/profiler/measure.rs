//! Per-kind operation and parameter formulas
//!
//! Operation counts are synthetic multiply-accumulate estimates derived from
//! a layer's attributes and the shape of the input it actually receives.

use crate::layers::{Layer, Tensor};

/// Cost contributed by a single layer invocation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerCost {
    pub ops: u64,
    pub params: u64,
}

// Truncating floor formula; spatial sizes never go below zero here even when
// the kernel does not fit, the forward pass reports that case instead.
fn floor_output_dim(input: usize, padding: usize, dilation: usize, kernel: usize, stride: usize) -> u64 {
    let numerator = (input + 2 * padding) as i64 - (dilation * kernel.saturating_sub(1)) as i64 - 1;
    let out = numerator / stride.max(1) as i64 + 1;
    out.max(0) as u64
}

fn spatial(input: &Tensor) -> (usize, usize) {
    match input.shape() {
        [_, _, h, w, ..] => (*h, *w),
        _ => (0, 0),
    }
}

#[allow(clippy::too_many_arguments)]
fn conv_ops(
    input: &Tensor,
    in_channels: usize,
    out_channels: usize,
    kernel_size: (usize, usize),
    stride: (usize, usize),
    padding: (usize, usize),
    dilation: (usize, usize),
    groups: usize,
) -> u64 {
    let (in_h, in_w) = spatial(input);
    let out_h = floor_output_dim(in_h, padding.0, dilation.0, kernel_size.0, stride.0);
    let out_w = floor_output_dim(in_w, padding.1, dilation.1, kernel_size.1, stride.1);
    (in_channels * out_channels * kernel_size.0 * kernel_size.1) as u64 * out_h * out_w
        / groups.max(1) as u64
}

/// Cost of running `layer` on `input`.
///
/// Kinds without a formula (max pooling, flatten, identity) cost nothing.
pub fn measure_layer(layer: &Layer, input: &Tensor) -> LayerCost {
    let params = layer.num_parameters() as u64;

    match layer {
        Layer::Conv2d(conv) => LayerCost {
            ops: conv_ops(
                input,
                conv.in_channels,
                conv.out_channels,
                conv.kernel_size,
                conv.stride,
                conv.padding,
                conv.dilation,
                conv.groups,
            ),
            params,
        },

        // Counted with the forward-convolution output size
        Layer::ConvTranspose2d(conv) => LayerCost {
            ops: conv_ops(
                input,
                conv.in_channels,
                conv.out_channels,
                conv.kernel_size,
                conv.stride,
                conv.padding,
                conv.dilation,
                conv.groups,
            ),
            params,
        },

        Layer::Relu(_) | Layer::PRelu(_) => LayerCost {
            ops: input.len() as u64,
            params,
        },

        Layer::AvgPool2d(pool) => {
            let (batch, channels) = match input.shape() {
                [n, c, ..] => (*n as u64, *c as u64),
                _ => (0, 0),
            };
            // Square kernel: both output sides are taken from the input height
            let (in_h, _) = spatial(input);
            let out_h = floor_output_dim(in_h, pool.padding, 1, pool.kernel_size, pool.stride);
            let out_w = out_h;
            let kernel_ops = (pool.kernel_size * pool.kernel_size) as u64;
            LayerCost {
                ops: batch * channels * out_h * out_w * kernel_ops,
                params,
            }
        }

        Layer::AdaptiveAvgPool2d(_) => LayerCost {
            ops: input.len() as u64,
            params: 0,
        },

        Layer::Linear(linear) => {
            let batch = input.shape().first().copied().unwrap_or(0) as u64;
            let weight_ops = linear.weight.len() as u64;
            let bias_ops = linear.bias.as_ref().map_or(0, |b| b.len()) as u64;
            LayerCost {
                ops: batch * (weight_ops + bias_ops),
                params,
            }
        }

        Layer::Dropout(_) => LayerCost { ops: 0, params },

        // Parameter count doubles as a rough operation count
        Layer::BatchNorm2d(_) => LayerCost { ops: params, params },

        Layer::MaxPool2d(_) | Layer::Flatten | Layer::Identity => LayerCost::default(),
    }
}
