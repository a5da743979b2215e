use ndarray::{Array1, Ix4};
use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use super::Tensor;

/// Batch Normalization Layer over `[N, C, H, W]`
///
/// Normalizes each channel with the running statistics, then scales and
/// shifts using learnable parameters gamma and beta.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct BatchNorm2d {
    /// Scale parameter (gamma)
    pub gamma: Array1<f32>,

    /// Shift parameter (beta)
    pub beta: Array1<f32>,

    /// Running mean for inference
    pub running_mean: Array1<f32>,

    /// Running variance for inference
    pub running_var: Array1<f32>,

    /// Small constant for numerical stability
    pub epsilon: f32,
}

impl BatchNorm2d {
    pub fn new(num_features: usize) -> Self {
        Self::with_epsilon(num_features, 1e-5)
    }

    pub fn with_epsilon(num_features: usize, epsilon: f32) -> Self {
        BatchNorm2d {
            gamma: Array1::ones(num_features),
            beta: Array1::zeros(num_features),
            running_mean: Array1::zeros(num_features),
            running_var: Array1::ones(num_features),
            epsilon,
        }
    }

    pub fn num_features(&self) -> usize {
        self.gamma.len()
    }

    /// Learnable elements only; running statistics are buffers
    pub fn num_parameters(&self) -> usize {
        self.gamma.len() + self.beta.len()
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        if input.ndim() != 4 || input.shape()[1] != self.num_features() {
            return Err(Error::dimension_mismatch(
                format!("BatchNorm2d input [N, {}, H, W]", self.num_features()),
                format!("{:?}", input.shape()),
            ));
        }
        let mut output = input.clone().into_dimensionality::<Ix4>()?;

        for (c, mut channel) in output.axis_iter_mut(ndarray::Axis(1)).enumerate() {
            let std = (self.running_var[c] + self.epsilon).sqrt();
            let (mean, gamma, beta) = (self.running_mean[c], self.gamma[c], self.beta[c]);
            channel.mapv_inplace(|x| gamma * (x - mean) / std + beta);
        }

        Ok(output.into_dyn())
    }
}
