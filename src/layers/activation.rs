//! Rectified-linear activations
//!
//! `Relu` has no parameters; `PRelu` learns one negative slope, either shared
//! or per channel (axis 1).

use ndarray::Array1;
use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use super::Tensor;

#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Relu;

impl Relu {
    pub fn new() -> Self {
        Relu
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        Ok(input.mapv(|x| x.max(0.0)))
    }
}

/// Parametric ReLU: `x` for positive inputs, `a * x` otherwise
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct PRelu {
    pub weight: Array1<f32>,
}

impl PRelu {
    /// `num_parameters` is 1 for a shared slope or the channel count
    pub fn new(num_parameters: usize, init: f32) -> Self {
        PRelu {
            weight: Array1::from_elem(num_parameters.max(1), init),
        }
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len()
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        let shared = self.weight.len() == 1;
        if !shared && (input.ndim() < 2 || input.shape()[1] != self.weight.len()) {
            return Err(Error::dimension_mismatch(
                format!("PRelu input with {} channels", self.weight.len()),
                format!("{:?}", input.shape()),
            ));
        }

        let mut output = input.clone();
        for (index, value) in output.indexed_iter_mut() {
            if *value < 0.0 {
                let slope = if shared { self.weight[0] } else { self.weight[index[1]] };
                *value *= slope;
            }
        }
        Ok(output)
    }
}
