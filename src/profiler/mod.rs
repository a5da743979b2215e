//! # Complexity Profiler
//!
//! Estimates multiply-accumulate operations and learnable parameters of a
//! [`Module`] by running one forward pass on a zero-filled `(1, 3, H, W)`
//! input and measuring every leaf layer on the activation it actually
//! receives.
//!
//! Measurement is a [`LayerHook`] threaded through the forward pass. The model
//! is only borrowed, so profiling never changes its weights or behavior and
//! there is no instrumentation to undo when the forward pass fails.
//!
//! ```rust
//! use nnmeter::layers::{AdaptiveAvgPool2d, Conv2d, Relu};
//! use nnmeter::model::Module;
//! use nnmeter::profiler::measure_model;
//! use nnmeter::sequential;
//!
//! let model: Module = sequential![
//!     Conv2d::new(3, 8, (3, 3), (1, 1), (1, 1)),
//!     Relu::new(),
//!     AdaptiveAvgPool2d::global(),
//! ].into();
//!
//! let (ops, params) = measure_model(&model, 32, 32).unwrap();
//! assert_eq!(params, 8 * 3 * 9 + 8);
//! assert!(ops > 0);
//! ```

pub mod measure;

use std::fmt;
use log::{debug, info};
use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use crate::layers::{zeros_nchw, Layer, Tensor};
use crate::model::{LayerHook, Module};

pub use measure::{measure_layer, LayerCost};

/// Batch size of the synthetic profiling input
pub const PROFILE_BATCH: usize = 1;

/// Channel count of the synthetic profiling input
pub const PROFILE_CHANNELS: usize = 3;

/// Cost of one layer invocation during profiling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerComplexity {
    /// Dotted path of the layer inside the model
    pub path: String,
    pub kind: String,
    pub input_shape: Vec<usize>,
    pub ops: u64,
    pub params: u64,
    /// Layer carries a weight mask; it is still measured at full size
    #[serde(default)]
    pub pruned: bool,
}

/// Totals of one profiling run plus the per-layer breakdown
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityReport {
    pub ops: u64,
    pub params: u64,
    pub layers: Vec<LayerComplexity>,
}

impl ComplexityReport {
    /// `(ops, params)`
    pub fn totals(&self) -> (u64, u64) {
        (self.ops, self.params)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl fmt::Display for ComplexityReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<32} {:<18} {:>12} {:>12}", "Layer", "Kind", "Ops", "Params")?;
        writeln!(f, "{}", "-".repeat(77))?;
        for layer in &self.layers {
            let kind = if layer.pruned {
                format!("{} (pruned)", layer.kind)
            } else {
                layer.kind.clone()
            };
            writeln!(
                f,
                "{:<32} {:<18} {:>12} {:>12}",
                layer.path,
                kind,
                format_count(layer.ops),
                format_count(layer.params)
            )?;
        }
        writeln!(f, "{}", "-".repeat(77))?;
        write!(
            f,
            "{:<51} {:>12} {:>12}",
            "Total",
            format_count(self.ops),
            format_count(self.params)
        )
    }
}

/// Render a count with a K/M/G suffix, e.g. `1.23M`
pub fn format_count(count: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1_000_000_000, "G"), (1_000_000, "M"), (1_000, "K")];
    for (scale, suffix) in UNITS {
        if count >= scale {
            return format!("{:.2}{}", count as f64 / scale as f64, suffix);
        }
    }
    count.to_string()
}

/// Running totals for one profiling invocation
struct Accumulator {
    report: ComplexityReport,
}

impl LayerHook for Accumulator {
    fn before_layer(&mut self, path: &str, layer: &Layer, input: &Tensor) -> Result<()> {
        let cost = measure_layer(layer, input);
        debug!(
            "{} ({}{}): input {:?}, ops {}, params {}",
            path,
            layer.kind_name(),
            if layer.is_pruned() { ", pruned" } else { "" },
            input.shape(),
            cost.ops,
            cost.params
        );

        self.report.ops += cost.ops;
        self.report.params += cost.params;
        self.report.layers.push(LayerComplexity {
            path: path.to_string(),
            kind: layer.kind_name().to_string(),
            input_shape: input.shape().to_vec(),
            ops: cost.ops,
            params: cost.params,
            pruned: layer.is_pruned(),
        });
        Ok(())
    }
}

/// Model complexity profiler
#[derive(Debug, Clone, Copy)]
pub struct Profiler {
    channels: usize,
}

impl Default for Profiler {
    fn default() -> Self {
        Self::new()
    }
}

impl Profiler {
    pub fn new() -> Self {
        Profiler { channels: PROFILE_CHANNELS }
    }

    /// Channel count of the synthetic input, for models that do not take RGB
    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    /// Profile `model` on a zero-filled `(1, C, height, width)` input
    pub fn profile(&self, model: &Module, height: usize, width: usize) -> Result<ComplexityReport> {
        if height == 0 || width == 0 || self.channels == 0 {
            return Err(Error::invalid_parameter(
                "input size".to_string(),
                format!("{}x{}x{} must be positive", self.channels, height, width),
            ));
        }
        let input = zeros_nchw(PROFILE_BATCH, self.channels, height, width);
        self.profile_input(model, &input)
    }

    /// Profile `model` on a caller-supplied input
    pub fn profile_input(&self, model: &Module, input: &Tensor) -> Result<ComplexityReport> {
        let mut acc = Accumulator {
            report: ComplexityReport::default(),
        };
        model.forward_with_hook(input, &mut acc)?;

        info!(
            "profiled {} layers on input {:?}: {} ops, {} params",
            acc.report.layers.len(),
            input.shape(),
            format_count(acc.report.ops),
            format_count(acc.report.params)
        );
        Ok(acc.report)
    }
}

/// Total `(ops, params)` of `model` for a `height x width` RGB input
pub fn measure_model(model: &Module, height: usize, width: usize) -> Result<(u64, u64)> {
    Ok(Profiler::new().profile(model, height, width)?.totals())
}
