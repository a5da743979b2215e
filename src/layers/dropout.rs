use ndarray::{ArrayD, IxDyn};
use rand::Rng;
use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use super::Tensor;

/// Which elements a dropout layer zeroes together
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropoutKind {
    /// Independent elements
    Dropout,
    /// Whole feature maps of a `[N, C, H, W]` tensor
    Dropout2d,
    /// Whole channels of any tensor with a channel axis
    DropChannel,
}

/// Dropout Layer
///
/// Identity in evaluation mode. In training mode, randomly zeroes units with
/// probability `p` and scales the survivors by `1 / (1 - p)`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Dropout {
    pub kind: DropoutKind,

    /// Dropout probability (probability of dropping a unit)
    pub p: f32,

    /// Whether we're in training mode
    pub training: bool,
}

impl Dropout {
    /// Create a new dropout layer in evaluation mode
    pub fn new(kind: DropoutKind, p: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(Error::invalid_parameter(
                "p".to_string(),
                format!("dropout rate {} must be in [0, 1)", p),
            ));
        }
        Ok(Dropout { kind, p, training: false })
    }

    /// Set training mode
    pub fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        if !self.training || self.p == 0.0 {
            return Ok(input.clone());
        }

        let mut rng = rand::thread_rng();
        let scale = 1.0 / (1.0 - self.p);

        let mask = match self.kind {
            DropoutKind::Dropout => ArrayD::from_shape_fn(input.raw_dim(), |_| {
                if rng.gen::<f32>() > self.p { scale } else { 0.0 }
            }),
            DropoutKind::Dropout2d | DropoutKind::DropChannel => {
                if input.ndim() < 2 {
                    return Err(Error::dimension_mismatch(
                        "input with a channel axis".to_string(),
                        format!("{:?}", input.shape()),
                    ));
                }
                let (batch, channels) = (input.shape()[0], input.shape()[1]);
                let keep: Vec<f32> = (0..batch * channels)
                    .map(|_| if rng.gen::<f32>() > self.p { scale } else { 0.0 })
                    .collect();
                ArrayD::from_shape_fn(input.raw_dim(), |index: IxDyn| keep[index[0] * channels + index[1]])
            }
        };

        Ok(input * &mask)
    }
}
