use ndarray::{Array1, Array2, Axis, Ix2};
use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use crate::layers::initialization::WeightInit;
use super::Tensor;

/// A fully connected (linear) layer: `y = x W^T + b`
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Linear {
    /// `[out_features, in_features]`
    pub weight: Array2<f32>,
    pub bias: Option<Array1<f32>>,

    /// Pruning mask, same shape as `weight`
    pub mask: Option<Array2<f32>>,
}

impl Linear {
    /// Create a new linear layer with Xavier-uniform weights and zero bias.
    pub fn new(in_features: usize, out_features: usize) -> Self {
        Linear {
            weight: WeightInit::XavierUniform.initialize_linear_weights((out_features, in_features)),
            bias: Some(Array1::zeros(out_features)),
            mask: None,
        }
    }

    pub fn without_bias(mut self) -> Self {
        self.bias = None;
        self
    }

    pub fn with_weights(mut self, weight: Array2<f32>) -> Result<Self> {
        if weight.dim() != self.weight.dim() {
            return Err(Error::dimension_mismatch(
                format!("{:?}", self.weight.dim()),
                format!("{:?}", weight.dim()),
            ));
        }
        self.weight = weight;
        Ok(self)
    }

    pub fn with_mask(mut self, mask: Array2<f32>) -> Result<Self> {
        if mask.dim() != self.weight.dim() {
            return Err(Error::dimension_mismatch(
                format!("mask {:?}", self.weight.dim()),
                format!("{:?}", mask.dim()),
            ));
        }
        self.mask = Some(mask);
        Ok(self)
    }

    pub fn in_features(&self) -> usize {
        self.weight.shape()[1]
    }

    pub fn out_features(&self) -> usize {
        self.weight.shape()[0]
    }

    pub fn num_parameters(&self) -> usize {
        self.weight.len() + self.bias.as_ref().map_or(0, |b| b.len())
    }

    /// Forward pass for a batch `[batch, in_features]`
    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        if input.ndim() != 2 || input.shape()[1] != self.in_features() {
            return Err(Error::dimension_mismatch(
                format!("Linear input [N, {}]", self.in_features()),
                format!("{:?}", input.shape()),
            ));
        }
        let input = input.view().into_dimensionality::<Ix2>()?;

        let mut output = match &self.mask {
            Some(mask) => input.dot(&(&self.weight * mask).t()),
            None => input.dot(&self.weight.t()),
        };
        if let Some(bias) = &self.bias {
            output += &bias.view().insert_axis(Axis(0));
        }
        Ok(output.into_dyn())
    }
}
