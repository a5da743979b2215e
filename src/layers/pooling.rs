//! Pooling layers for downsampling spatial data
//!
//! Average, adaptive average and max pooling over NCHW tensors.

use ndarray::{Array4, Ix4};
use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use super::Tensor;

fn as_nchw<'a>(input: &'a Tensor, layer: &str) -> Result<ndarray::ArrayView4<'a, f32>> {
    if input.ndim() != 4 {
        return Err(Error::dimension_mismatch(
            format!("{} input [N, C, H, W]", layer),
            format!("{:?}", input.shape()),
        ));
    }
    Ok(input.view().into_dimensionality::<Ix4>()?)
}

fn pooled_dim(input: usize, padding: usize, kernel: usize, stride: usize) -> Result<usize> {
    let padded = input + 2 * padding;
    if stride == 0 || kernel == 0 || padded < kernel {
        return Err(Error::dimension_mismatch(
            format!("spatial size >= kernel {} (padding {})", kernel, padding),
            input.to_string(),
        ));
    }
    Ok((padded - kernel) / stride + 1)
}

/// 2D Average Pooling Layer
///
/// Square window; zero padding is counted in the divisor.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AvgPool2d {
    pub kernel_size: usize,
    pub stride: usize,
    pub padding: usize,
}

impl AvgPool2d {
    /// Create a new average pooling layer; the stride defaults to the kernel size
    pub fn new(kernel_size: usize, stride: Option<usize>, padding: usize) -> Self {
        AvgPool2d {
            kernel_size,
            stride: stride.unwrap_or(kernel_size),
            padding,
        }
    }

    pub fn output_size(&self, in_h: usize, in_w: usize) -> Result<(usize, usize)> {
        Ok((
            pooled_dim(in_h, self.padding, self.kernel_size, self.stride)?,
            pooled_dim(in_w, self.padding, self.kernel_size, self.stride)?,
        ))
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let input = as_nchw(input, "AvgPool2d")?;
        let (batch_size, channels, in_h, in_w) = input.dim();
        let (out_h, out_w) = self.output_size(in_h, in_w)?;
        let area = (self.kernel_size * self.kernel_size) as f32;
        let pad = self.padding as isize;

        let mut output = Array4::zeros((batch_size, channels, out_h, out_w));
        for b in 0..batch_size {
            for c in 0..channels {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let h_start = (oh * self.stride) as isize - pad;
                        let w_start = (ow * self.stride) as isize - pad;

                        let mut sum = 0.0;
                        for h in h_start..h_start + self.kernel_size as isize {
                            for w in w_start..w_start + self.kernel_size as isize {
                                if h >= 0 && w >= 0 && (h as usize) < in_h && (w as usize) < in_w {
                                    sum += input[[b, c, h as usize, w as usize]];
                                }
                            }
                        }

                        output[[b, c, oh, ow]] = sum / area;
                    }
                }
            }
        }

        Ok(output.into_dyn())
    }
}

/// 2D Adaptive Average Pooling Layer
///
/// Pools any spatial size down to a fixed `output_size`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AdaptiveAvgPool2d {
    pub output_size: (usize, usize),
}

impl AdaptiveAvgPool2d {
    pub fn new(output_size: (usize, usize)) -> Self {
        AdaptiveAvgPool2d { output_size }
    }

    /// Global average pooling
    pub fn global() -> Self {
        Self::new((1, 1))
    }

    // Bin i covers floor(i*in/out) .. ceil((i+1)*in/out)
    fn bin(index: usize, input: usize, output: usize) -> (usize, usize) {
        let start = index * input / output;
        let end = ((index + 1) * input + output - 1) / output;
        (start, end)
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let input = as_nchw(input, "AdaptiveAvgPool2d")?;
        let (batch_size, channels, in_h, in_w) = input.dim();
        let (out_h, out_w) = self.output_size;
        if out_h == 0 || out_w == 0 || in_h == 0 || in_w == 0 {
            return Err(Error::invalid_parameter(
                "output_size".to_string(),
                format!("cannot pool {}x{} into {}x{}", in_h, in_w, out_h, out_w),
            ));
        }

        let mut output = Array4::zeros((batch_size, channels, out_h, out_w));
        for oh in 0..out_h {
            let (h_start, h_end) = Self::bin(oh, in_h, out_h);
            for ow in 0..out_w {
                let (w_start, w_end) = Self::bin(ow, in_w, out_w);
                let count = ((h_end - h_start) * (w_end - w_start)) as f32;

                for b in 0..batch_size {
                    for c in 0..channels {
                        let window = input.slice(ndarray::s![b, c, h_start..h_end, w_start..w_end]);
                        output[[b, c, oh, ow]] = window.sum() / count;
                    }
                }
            }
        }

        Ok(output.into_dyn())
    }
}

/// 2D Max Pooling Layer
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct MaxPool2d {
    pub pool_size: (usize, usize),
    pub stride: (usize, usize),
}

impl MaxPool2d {
    /// Create a new max pooling layer; the stride defaults to the pool size
    pub fn new(pool_size: (usize, usize), stride: Option<(usize, usize)>) -> Self {
        MaxPool2d {
            pool_size,
            stride: stride.unwrap_or(pool_size),
        }
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let input = as_nchw(input, "MaxPool2d")?;
        let (batch_size, channels, in_h, in_w) = input.dim();
        let out_h = pooled_dim(in_h, 0, self.pool_size.0, self.stride.0)?;
        let out_w = pooled_dim(in_w, 0, self.pool_size.1, self.stride.1)?;

        let mut output = Array4::zeros((batch_size, channels, out_h, out_w));
        for b in 0..batch_size {
            for c in 0..channels {
                for oh in 0..out_h {
                    for ow in 0..out_w {
                        let h_start = oh * self.stride.0;
                        let w_start = ow * self.stride.1;
                        let window = input.slice(ndarray::s![
                            b,
                            c,
                            h_start..h_start + self.pool_size.0,
                            w_start..w_start + self.pool_size.1
                        ]);
                        output[[b, c, oh, ow]] = window.fold(f32::NEG_INFINITY, |acc, &v| acc.max(v));
                    }
                }
            }
        }

        Ok(output.into_dyn())
    }
}
