//! # Layers Module
//!
//! The closed set of layer kinds a [`Module`](crate::model::Module) tree is built from.
//! Every layer runs inference on an NCHW [`Tensor`] (or `[N, features]` for
//! [`Linear`]) and reports its learnable element count.
//!
//! ## Available Layers
//!
//! - **Conv2d / ConvTranspose2d**: strided, padded, dilated, grouped convolutions
//! - **Relu / PRelu**: rectified-linear activations
//! - **AvgPool2d / AdaptiveAvgPool2d / MaxPool2d**: spatial pooling
//! - **Linear**: fully connected layer
//! - **Dropout**: element, 2D and channel dropout
//! - **BatchNorm2d**: per-channel normalization
//! - **Flatten / Identity**: shape plumbing

pub mod activation;
pub mod batch_norm;
pub mod conv;
pub mod dense;
pub mod dropout;
pub mod initialization;
pub mod pooling;

use ndarray::{ArrayD, IxDyn};
use serde::{Serialize, Deserialize};
use crate::error::Result;

pub use activation::{PRelu, Relu};
pub use batch_norm::BatchNorm2d;
pub use conv::{conv_output_dim, Conv2d, Conv2dBuilder, ConvTranspose2d};
pub use dense::Linear;
pub use dropout::{Dropout, DropoutKind};
pub use initialization::WeightInit;
pub use pooling::{AdaptiveAvgPool2d, AvgPool2d, MaxPool2d};

/// Dense n-dimensional activation tensor
pub type Tensor = ArrayD<f32>;

/// Zero-filled `[batch, channels, height, width]` tensor
pub fn zeros_nchw(batch: usize, channels: usize, height: usize, width: usize) -> Tensor {
    ArrayD::zeros(IxDyn(&[batch, channels, height, width]))
}

/// A leaf layer of a model
#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum Layer {
    Conv2d(Conv2d),
    ConvTranspose2d(ConvTranspose2d),
    Relu(Relu),
    PRelu(PRelu),
    AvgPool2d(AvgPool2d),
    AdaptiveAvgPool2d(AdaptiveAvgPool2d),
    MaxPool2d(MaxPool2d),
    Linear(Linear),
    Dropout(Dropout),
    BatchNorm2d(BatchNorm2d),
    /// Collapse everything after the batch axis: `[N, ...] -> [N, prod(...)]`
    Flatten,
    Identity,
}

impl Layer {
    /// Name of the layer kind, as shown in reports
    pub fn kind_name(&self) -> &'static str {
        match self {
            Layer::Conv2d(_) => "Conv2d",
            Layer::ConvTranspose2d(_) => "ConvTranspose2d",
            Layer::Relu(_) => "ReLU",
            Layer::PRelu(_) => "PReLU",
            Layer::AvgPool2d(_) => "AvgPool2d",
            Layer::AdaptiveAvgPool2d(_) => "AdaptiveAvgPool2d",
            Layer::MaxPool2d(_) => "MaxPool2d",
            Layer::Linear(_) => "Linear",
            Layer::Dropout(d) => match d.kind {
                DropoutKind::Dropout => "Dropout",
                DropoutKind::Dropout2d => "Dropout2d",
                DropoutKind::DropChannel => "DropChannel",
            },
            Layer::BatchNorm2d(_) => "BatchNorm2d",
            Layer::Flatten => "Flatten",
            Layer::Identity => "Identity",
        }
    }

    /// Number of learnable elements
    pub fn num_parameters(&self) -> usize {
        match self {
            Layer::Conv2d(l) => l.num_parameters(),
            Layer::ConvTranspose2d(l) => l.num_parameters(),
            Layer::PRelu(l) => l.num_parameters(),
            Layer::Linear(l) => l.num_parameters(),
            Layer::BatchNorm2d(l) => l.num_parameters(),
            Layer::Relu(_)
            | Layer::AvgPool2d(_)
            | Layer::AdaptiveAvgPool2d(_)
            | Layer::MaxPool2d(_)
            | Layer::Dropout(_)
            | Layer::Flatten
            | Layer::Identity => 0,
        }
    }

    /// Whether the layer carries a pruning mask
    pub fn is_pruned(&self) -> bool {
        match self {
            Layer::Conv2d(l) => l.mask.is_some(),
            Layer::Linear(l) => l.mask.is_some(),
            _ => false,
        }
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        match self {
            Layer::Conv2d(l) => l.forward(input),
            Layer::ConvTranspose2d(l) => l.forward(input),
            Layer::Relu(l) => l.forward(input),
            Layer::PRelu(l) => l.forward(input),
            Layer::AvgPool2d(l) => l.forward(input),
            Layer::AdaptiveAvgPool2d(l) => l.forward(input),
            Layer::MaxPool2d(l) => l.forward(input),
            Layer::Linear(l) => l.forward(input),
            Layer::Dropout(l) => l.forward(input),
            Layer::BatchNorm2d(l) => l.forward(input),
            Layer::Flatten => {
                let batch = input.shape().first().copied().unwrap_or(1);
                let features = input.len() / batch.max(1);
                Ok(input.to_shape(IxDyn(&[batch, features]))?.into_owned())
            }
            Layer::Identity => Ok(input.clone()),
        }
    }
}

macro_rules! impl_from_layer {
    ($($kind:ident),*) => {
        $(
            impl From<$kind> for Layer {
                fn from(layer: $kind) -> Self {
                    Layer::$kind(layer)
                }
            }

            impl From<$kind> for crate::model::Module {
                fn from(layer: $kind) -> Self {
                    crate::model::Module::Layer(Layer::$kind(layer))
                }
            }
        )*
    };
}

impl_from_layer!(
    Conv2d,
    ConvTranspose2d,
    Relu,
    PRelu,
    AvgPool2d,
    AdaptiveAvgPool2d,
    MaxPool2d,
    Linear,
    Dropout,
    BatchNorm2d
);
