//! Convolutional layers for processing spatial data
//!
//! Provides 2D convolution and 2D transposed convolution over NCHW tensors,
//! with stride, padding, dilation and grouped channels.

use ndarray::{Array1, Array4, Ix4};
use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use crate::layers::initialization::WeightInit;
use super::Tensor;

/// Output length of a convolution along one spatial axis.
///
/// `floor((input + 2*padding - dilation*(kernel-1) - 1) / stride) + 1`, or `None`
/// when the dilated kernel does not fit inside the padded input.
pub fn conv_output_dim(
    input: usize,
    padding: usize,
    dilation: usize,
    kernel: usize,
    stride: usize,
) -> Option<usize> {
    let padded = input + 2 * padding;
    let span = dilation * kernel.saturating_sub(1) + 1;
    if padded < span || stride == 0 {
        return None;
    }
    Some((padded - span) / stride + 1)
}

fn check_groups(in_channels: usize, out_channels: usize, groups: usize) -> Result<()> {
    if groups == 0 || in_channels % groups != 0 || out_channels % groups != 0 {
        return Err(Error::invalid_parameter(
            "groups".to_string(),
            format!(
                "{} groups must divide in_channels {} and out_channels {}",
                groups, in_channels, out_channels
            ),
        ));
    }
    Ok(())
}

fn check_input_channels(input: &Tensor, in_channels: usize, layer: &str) -> Result<()> {
    if input.ndim() != 4 || input.shape()[1] != in_channels {
        return Err(Error::dimension_mismatch(
            format!("{} input [N, {}, H, W]", layer, in_channels),
            format!("{:?}", input.shape()),
        ));
    }
    Ok(())
}

/// 2D Convolutional Layer
///
/// Applies 2D convolution over an input signal composed of several input planes.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Conv2d {
    /// Convolution kernels `[out_channels, in_channels / groups, kernel_h, kernel_w]`
    pub weight: Array4<f32>,

    /// Bias term for each output channel
    pub bias: Option<Array1<f32>>,

    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: (usize, usize),
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    pub dilation: (usize, usize),
    pub groups: usize,

    /// Pruning mask, same shape as `weight`
    pub mask: Option<Array4<f32>>,
}

impl Conv2d {
    /// Create a new 2D convolutional layer with He-normal kernels and zero bias
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        stride: (usize, usize),
        padding: (usize, usize),
    ) -> Self {
        let fan_in = in_channels * kernel_size.0 * kernel_size.1;
        let fan_out = out_channels * kernel_size.0 * kernel_size.1;
        let weight = WeightInit::HeNormal.initialize_conv_weights(
            (out_channels, in_channels, kernel_size.0, kernel_size.1),
            fan_in,
            fan_out,
        );

        Conv2d {
            weight,
            bias: Some(Array1::zeros(out_channels)),
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
            dilation: (1, 1),
            groups: 1,
            mask: None,
        }
    }

    /// Attach a pruning mask; masked-out weights contribute nothing in forward
    pub fn with_mask(mut self, mask: Array4<f32>) -> Result<Self> {
        if mask.dim() != self.weight.dim() {
            return Err(Error::dimension_mismatch(
                format!("mask {:?}", self.weight.dim()),
                format!("{:?}", mask.dim()),
            ));
        }
        self.mask = Some(mask);
        Ok(self)
    }

    /// Number of learnable elements (kernels plus bias)
    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.as_ref().map_or(0, |b| b.len())
    }

    /// Spatial output size for an `in_h x in_w` input
    pub fn output_size(&self, in_h: usize, in_w: usize) -> Result<(usize, usize)> {
        let out_h = conv_output_dim(in_h, self.padding.0, self.dilation.0, self.kernel_size.0, self.stride.0);
        let out_w = conv_output_dim(in_w, self.padding.1, self.dilation.1, self.kernel_size.1, self.stride.1);
        match (out_h, out_w) {
            (Some(h), Some(w)) if h > 0 && w > 0 => Ok((h, w)),
            _ => Err(Error::dimension_mismatch(
                format!("spatial size covering kernel {:?}", self.kernel_size),
                format!("{}x{}", in_h, in_w),
            )),
        }
    }

    fn effective_weight(&self) -> Array4<f32> {
        match &self.mask {
            Some(mask) => &self.weight * mask,
            None => self.weight.clone(),
        }
    }

    /// Forward pass for a batch of images `[batch, channels, height, width]`
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        check_groups(self.in_channels, self.out_channels, self.groups)?;
        check_input_channels(input, self.in_channels, "Conv2d")?;
        let input = input.view().into_dimensionality::<Ix4>()?;
        let (batch_size, _, in_h, in_w) = input.dim();
        let (out_h, out_w) = self.output_size(in_h, in_w)?;

        let weight = self.effective_weight();
        let in_per_group = self.in_channels / self.groups;
        let out_per_group = self.out_channels / self.groups;
        let mut output = Array4::zeros((batch_size, self.out_channels, out_h, out_w));

        for b in 0..batch_size {
            for oc in 0..self.out_channels {
                let group = oc / out_per_group;
                let bias = self.bias.as_ref().map_or(0.0, |bias| bias[oc]);

                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let mut sum = bias;

                        for icg in 0..in_per_group {
                            let ic = group * in_per_group + icg;
                            for kh in 0..self.kernel_size.0 {
                                let ih = (oh * self.stride.0 + kh * self.dilation.0) as isize
                                    - self.padding.0 as isize;
                                if ih < 0 || ih >= in_h as isize {
                                    continue;
                                }
                                for kw in 0..self.kernel_size.1 {
                                    let iw = (ow * self.stride.1 + kw * self.dilation.1) as isize
                                        - self.padding.1 as isize;
                                    if iw < 0 || iw >= in_w as isize {
                                        continue;
                                    }
                                    sum += input[[b, ic, ih as usize, iw as usize]]
                                        * weight[[oc, icg, kh, kw]];
                                }
                            }
                        }

                        output[[b, oc, oh, ow]] = sum;
                    }
                }
            }
        }

        Ok(output.into_dyn())
    }
}

/// 2D Transposed Convolutional Layer
///
/// The gradient of `Conv2d` with respect to its input, used for upsampling.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct ConvTranspose2d {
    /// Kernels `[in_channels, out_channels / groups, kernel_h, kernel_w]`
    pub weight: Array4<f32>,
    pub bias: Option<Array1<f32>>,
    pub in_channels: usize,
    pub out_channels: usize,
    pub kernel_size: (usize, usize),
    pub stride: (usize, usize),
    pub padding: (usize, usize),
    pub output_padding: (usize, usize),
    pub dilation: (usize, usize),
    pub groups: usize,
}

impl ConvTranspose2d {
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: (usize, usize),
        stride: (usize, usize),
        padding: (usize, usize),
    ) -> Self {
        let fan_in = out_channels * kernel_size.0 * kernel_size.1;
        let fan_out = in_channels * kernel_size.0 * kernel_size.1;
        let weight = WeightInit::HeNormal.initialize_conv_weights(
            (in_channels, out_channels, kernel_size.0, kernel_size.1),
            fan_in,
            fan_out,
        );

        ConvTranspose2d {
            weight,
            bias: Some(Array1::zeros(out_channels)),
            in_channels,
            out_channels,
            kernel_size,
            stride,
            padding,
            output_padding: (0, 0),
            dilation: (1, 1),
            groups: 1,
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.as_ref().map_or(0, |b| b.len())
    }

    /// `(in - 1) * stride - 2 * padding + dilation * (kernel - 1) + output_padding + 1`
    pub fn output_size(&self, in_h: usize, in_w: usize) -> Result<(usize, usize)> {
        let dim = |input: usize, stride: usize, padding: usize, dilation: usize, kernel: usize, extra: usize| {
            let full = input.saturating_sub(1) * stride + dilation * kernel.saturating_sub(1) + extra + 1;
            full.checked_sub(2 * padding).filter(|&d| d > 0)
        };
        let out_h = dim(in_h, self.stride.0, self.padding.0, self.dilation.0, self.kernel_size.0, self.output_padding.0);
        let out_w = dim(in_w, self.stride.1, self.padding.1, self.dilation.1, self.kernel_size.1, self.output_padding.1);
        match (out_h, out_w) {
            (Some(h), Some(w)) if in_h > 0 && in_w > 0 => Ok((h, w)),
            _ => Err(Error::dimension_mismatch(
                format!("input larger than padding {:?}", self.padding),
                format!("{}x{}", in_h, in_w),
            )),
        }
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        check_groups(self.in_channels, self.out_channels, self.groups)?;
        check_input_channels(input, self.in_channels, "ConvTranspose2d")?;
        let input = input.view().into_dimensionality::<Ix4>()?;
        let (batch_size, _, in_h, in_w) = input.dim();
        let (out_h, out_w) = self.output_size(in_h, in_w)?;

        let in_per_group = self.in_channels / self.groups;
        let out_per_group = self.out_channels / self.groups;
        let mut output = Array4::zeros((batch_size, self.out_channels, out_h, out_w));

        // Scatter every input element through the kernel
        for b in 0..batch_size {
            for ic in 0..self.in_channels {
                let group = ic / in_per_group;
                for ih in 0..in_h {
                    for iw in 0..in_w {
                        let value = input[[b, ic, ih, iw]];
                        for ocg in 0..out_per_group {
                            let oc = group * out_per_group + ocg;
                            for kh in 0..self.kernel_size.0 {
                                let oh = (ih * self.stride.0 + kh * self.dilation.0) as isize
                                    - self.padding.0 as isize;
                                if oh < 0 || oh >= out_h as isize {
                                    continue;
                                }
                                for kw in 0..self.kernel_size.1 {
                                    let ow = (iw * self.stride.1 + kw * self.dilation.1) as isize
                                        - self.padding.1 as isize;
                                    if ow < 0 || ow >= out_w as isize {
                                        continue;
                                    }
                                    output[[b, oc, oh as usize, ow as usize]] +=
                                        value * self.weight[[ic, ocg, kh, kw]];
                                }
                            }
                        }
                    }
                }
            }
        }

        if let Some(bias) = &self.bias {
            for b in 0..batch_size {
                for oc in 0..self.out_channels {
                    output
                        .slice_mut(ndarray::s![b, oc, .., ..])
                        .mapv_inplace(|v| v + bias[oc]);
                }
            }
        }

        Ok(output.into_dyn())
    }
}

/// Builder for Conv2d layers
pub struct Conv2dBuilder {
    in_channels: Option<usize>,
    out_channels: Option<usize>,
    kernel_size: Option<(usize, usize)>,
    stride: (usize, usize),
    padding: (usize, usize),
    dilation: (usize, usize),
    groups: usize,
    bias: bool,
    weight_init: WeightInit,
}

impl Default for Conv2dBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Conv2dBuilder {
    pub fn new() -> Self {
        Conv2dBuilder {
            in_channels: None,
            out_channels: None,
            kernel_size: None,
            stride: (1, 1),
            padding: (0, 0),
            dilation: (1, 1),
            groups: 1,
            bias: true,
            weight_init: WeightInit::HeNormal,
        }
    }

    pub fn in_channels(mut self, channels: usize) -> Self {
        self.in_channels = Some(channels);
        self
    }

    pub fn out_channels(mut self, channels: usize) -> Self {
        self.out_channels = Some(channels);
        self
    }

    pub fn kernel_size(mut self, size: (usize, usize)) -> Self {
        self.kernel_size = Some(size);
        self
    }

    pub fn stride(mut self, stride: (usize, usize)) -> Self {
        self.stride = stride;
        self
    }

    pub fn padding(mut self, padding: (usize, usize)) -> Self {
        self.padding = padding;
        self
    }

    pub fn dilation(mut self, dilation: (usize, usize)) -> Self {
        self.dilation = dilation;
        self
    }

    pub fn groups(mut self, groups: usize) -> Self {
        self.groups = groups;
        self
    }

    pub fn bias(mut self, bias: bool) -> Self {
        self.bias = bias;
        self
    }

    pub fn weight_init(mut self, init: WeightInit) -> Self {
        self.weight_init = init;
        self
    }

    pub fn build(self) -> Result<Conv2d> {
        let in_channels = self.in_channels.ok_or_else(|| {
            Error::invalid_parameter("in_channels", "in_channels is required for Conv2d")
        })?;
        let out_channels = self.out_channels.ok_or_else(|| {
            Error::invalid_parameter("out_channels", "out_channels is required for Conv2d")
        })?;
        let kernel_size = self.kernel_size.ok_or_else(|| {
            Error::invalid_parameter("kernel_size", "kernel_size is required for Conv2d")
        })?;
        if self.stride.0 == 0 || self.stride.1 == 0 {
            return Err(Error::invalid_parameter("stride", "stride must be positive"));
        }
        check_groups(in_channels, out_channels, self.groups)?;

        let in_per_group = in_channels / self.groups;
        let fan_in = in_per_group * kernel_size.0 * kernel_size.1;
        let fan_out = out_channels * kernel_size.0 * kernel_size.1 / self.groups;
        let weight = self.weight_init.initialize_conv_weights(
            (out_channels, in_per_group, kernel_size.0, kernel_size.1),
            fan_in,
            fan_out,
        );

        Ok(Conv2d {
            weight,
            bias: if self.bias { Some(Array1::zeros(out_channels)) } else { None },
            in_channels,
            out_channels,
            kernel_size,
            stride: self.stride,
            padding: self.padding,
            dilation: self.dilation,
            groups: self.groups,
            mask: None,
        })
    }
}
