//! # nnmeter - Model Complexity and Learning-Rate Schedules
//!
//! nnmeter bundles two small utilities for convolutional network training
//! workflows: a complexity profiler that estimates per-layer operation and
//! parameter counts from one forward pass, and a family of epoch-driven
//! learning-rate schedules.
//!
//! ## Key Features
//!
//! - **Layers**: an inference-only set of convolution, pooling, activation,
//!   linear, dropout and batch-norm layers on `ndarray` tensors
//! - **Models**: hierarchical module trees (sequential and residual blocks)
//! - **Profiler**: per-layer multiply-accumulate and parameter estimates
//! - **Schedules**: multi-step, step, poly, warmup-poly and cyclic warmup-poly
//!
//! ## Quick Start
//!
//! ```rust
//! use nnmeter::layers::{AdaptiveAvgPool2d, BatchNorm2d, Conv2d, Layer, Linear, Relu};
//! use nnmeter::model::Module;
//! use nnmeter::optimizer::{get_scheduler, SchedulePolicy, SchedulerConfig, SGD};
//! use nnmeter::profiler::Profiler;
//! use nnmeter::sequential;
//!
//! let model: Module = sequential![
//!     Conv2d::new(3, 16, (3, 3), (1, 1), (1, 1)),
//!     BatchNorm2d::new(16),
//!     Relu::new(),
//!     AdaptiveAvgPool2d::global(),
//!     Layer::Flatten,
//!     Linear::new(16, 10),
//! ].into();
//!
//! let report = Profiler::new().profile(&model, 32, 32).unwrap();
//! println!("{}", report);
//!
//! let config = SchedulerConfig::new(SchedulePolicy::WarmPoly, 100, 0.1);
//! let mut scheduler = get_scheduler(&config).unwrap();
//! let mut optimizer = SGD::new(0.1);
//! for epoch in 0..100 {
//!     scheduler.apply(epoch, &mut optimizer).unwrap();
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`error`] - Error types and result handling
//! - [`layers`] - Leaf layers and weight initialization
//! - [`model`] - Module trees and hooked forward passes
//! - [`optimizer`] - Optimizer seam and learning-rate schedules
//! - [`profiler`] - Operation and parameter counting

#[macro_use]
pub mod macros;

pub mod error;
pub mod layers;
pub mod model;
pub mod optimizer;
pub mod profiler;

pub use error::{Error, Result};

#[cfg(test)]
mod tests;
