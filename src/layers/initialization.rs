use ndarray::{Array2, Array4};
use ndarray_rand::RandomExt;
use rand_distr::{Normal, Uniform};

/// Weight initialization strategies
#[derive(Debug, Clone, PartialEq)]
pub enum WeightInit {
    /// Xavier/Glorot uniform initialization
    XavierUniform,

    /// He/Kaiming uniform initialization (for ReLU)
    HeUniform,

    /// He/Kaiming normal initialization (for ReLU)
    HeNormal,

    /// Every element set to the same value
    Constant(f32),

    /// All zeros
    Zeros,
}

impl WeightInit {
    /// Initialize a linear weight matrix `[out_features, in_features]`
    pub fn initialize_linear_weights(&self, shape: (usize, usize)) -> Array2<f32> {
        let (fan_out, fan_in) = shape;
        match self {
            WeightInit::Constant(value) => Array2::from_elem(shape, *value),
            WeightInit::Zeros => Array2::zeros(shape),
            _ => {
                let flat = self.sample(shape.0 * shape.1, fan_in, fan_out);
                Array2::from_shape_vec(shape, flat).unwrap_or_else(|_| Array2::zeros(shape))
            }
        }
    }

    /// Initialize convolution kernels `[d0, d1, kernel_h, kernel_w]`
    pub fn initialize_conv_weights(
        &self,
        shape: (usize, usize, usize, usize),
        fan_in: usize,
        fan_out: usize,
    ) -> Array4<f32> {
        match self {
            WeightInit::Constant(value) => Array4::from_elem(shape, *value),
            WeightInit::Zeros => Array4::zeros(shape),
            _ => {
                let len = shape.0 * shape.1 * shape.2 * shape.3;
                let flat = self.sample(len, fan_in, fan_out);
                Array4::from_shape_vec(shape, flat).unwrap_or_else(|_| Array4::zeros(shape))
            }
        }
    }

    fn sample(&self, len: usize, fan_in: usize, fan_out: usize) -> Vec<f32> {
        let fan_in = fan_in.max(1) as f32;
        let fan_out = fan_out.max(1) as f32;

        let values = match self {
            WeightInit::XavierUniform => {
                let limit = (6.0 / (fan_in + fan_out)).sqrt();
                ndarray::Array1::random(len, Uniform::new(-limit, limit))
            }
            WeightInit::HeUniform => {
                let limit = (6.0 / fan_in).sqrt();
                ndarray::Array1::random(len, Uniform::new(-limit, limit))
            }
            WeightInit::HeNormal => {
                let std = (2.0 / fan_in).sqrt();
                match Normal::new(0.0, std) {
                    Ok(dist) => ndarray::Array1::random(len, dist),
                    Err(_) => ndarray::Array1::zeros(len),
                }
            }
            WeightInit::Constant(value) => ndarray::Array1::from_elem(len, *value),
            WeightInit::Zeros => ndarray::Array1::zeros(len),
        };
        values.to_vec()
    }
}
