//! Hierarchical models built from [`Layer`] leaves
//!
//! A [`Module`] is either a leaf layer or a structural container. Containers
//! only route activations; all computation happens in the leaves.

use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};
use crate::layers::{Layer, Tensor};

/// Observer invoked right before each measured layer runs.
///
/// `path` is the dotted name of the layer inside the model (`"features.0"`),
/// `input` is the activation the layer is about to receive.
pub trait LayerHook {
    fn before_layer(&mut self, path: &str, layer: &Layer, input: &Tensor) -> Result<()>;
}

/// Hook that does nothing; used by the plain forward pass
pub struct NoHook;

impl LayerHook for NoHook {
    fn before_layer(&mut self, _path: &str, _layer: &Layer, _input: &Tensor) -> Result<()> {
        Ok(())
    }
}

/// A node in the model tree
#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum Module {
    Layer(Layer),
    Sequential(Sequential),
    Residual(Residual),
}

/// Children run one after another, each consuming the previous output
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
pub struct Sequential {
    children: Vec<(String, Module)>,
}

impl Sequential {
    pub fn new() -> Self {
        Sequential { children: Vec::new() }
    }

    /// Append a child named by its position ("0", "1", ...)
    pub fn add<M: Into<Module>>(mut self, module: M) -> Self {
        let name = self.children.len().to_string();
        self.children.push((name, module.into()));
        self
    }

    /// Append a named child
    pub fn add_named<S: Into<String>, M: Into<Module>>(mut self, name: S, module: M) -> Self {
        self.children.push((name.into(), module.into()));
        self
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }
}

/// `body(x) + shortcut(x)`; the shortcut defaults to the identity
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Residual {
    body: Box<Module>,
    shortcut: Option<Box<Module>>,
}

impl Residual {
    pub fn new<M: Into<Module>>(body: M) -> Self {
        Residual {
            body: Box::new(body.into()),
            shortcut: None,
        }
    }

    /// Projection applied to the skip branch (e.g. a strided 1x1 conv)
    pub fn with_shortcut<M: Into<Module>>(mut self, shortcut: M) -> Self {
        self.shortcut = Some(Box::new(shortcut.into()));
        self
    }
}

impl From<Layer> for Module {
    fn from(layer: Layer) -> Self {
        Module::Layer(layer)
    }
}

impl From<Sequential> for Module {
    fn from(sequential: Sequential) -> Self {
        Module::Sequential(sequential)
    }
}

impl From<Residual> for Module {
    fn from(residual: Residual) -> Self {
        Module::Residual(residual)
    }
}

fn child_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", prefix, name)
    }
}

impl Module {
    /// Immediate children with their names
    pub fn children(&self) -> Vec<(&str, &Module)> {
        match self {
            Module::Layer(_) => Vec::new(),
            Module::Sequential(seq) => seq
                .children
                .iter()
                .map(|(name, child)| (name.as_str(), child))
                .collect(),
            Module::Residual(res) => {
                let mut children = vec![("body", res.body.as_ref())];
                if let Some(shortcut) = &res.shortcut {
                    children.push(("shortcut", shortcut.as_ref()));
                }
                children
            }
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children().is_empty()
    }

    /// All leaf layers in forward order, with their dotted paths
    pub fn leaves(&self) -> Vec<(String, &Layer)> {
        let mut out = Vec::new();
        self.collect_leaves("", &mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, prefix: &str, out: &mut Vec<(String, &'a Layer)>) {
        match self {
            Module::Layer(layer) => out.push((prefix.to_string(), layer)),
            _ => {
                for (name, child) in self.children() {
                    child.collect_leaves(&child_path(prefix, name), out);
                }
            }
        }
    }

    /// Total learnable elements across every leaf
    pub fn num_parameters(&self) -> usize {
        self.leaves().iter().map(|(_, layer)| layer.num_parameters()).sum()
    }

    pub fn forward(&self, input: &Tensor) -> Result<Tensor> {
        self.forward_with_hook(input, &mut NoHook)
    }

    /// Forward pass that reports every leaf to `hook` before it runs.
    ///
    /// The model is only borrowed; hooks observe, they never replace a
    /// layer's computation.
    pub fn forward_with_hook(&self, input: &Tensor, hook: &mut dyn LayerHook) -> Result<Tensor> {
        self.forward_at("", input, hook)
    }

    fn forward_at(&self, path: &str, input: &Tensor, hook: &mut dyn LayerHook) -> Result<Tensor> {
        match self {
            Module::Layer(layer) => {
                hook.before_layer(path, layer, input)?;
                layer.forward(input)
            }
            Module::Sequential(seq) => {
                let mut current = input.clone();
                for (name, child) in &seq.children {
                    current = child.forward_at(&child_path(path, name), &current, hook)?;
                }
                Ok(current)
            }
            Module::Residual(res) => {
                let body = res.body.forward_at(&child_path(path, "body"), input, hook)?;
                let skip = match &res.shortcut {
                    Some(shortcut) => shortcut.forward_at(&child_path(path, "shortcut"), input, hook)?,
                    None => input.clone(),
                };
                if body.shape() != skip.shape() {
                    return Err(Error::dimension_mismatch(
                        format!("residual branch {:?}", body.shape()),
                        format!("{:?}", skip.shape()),
                    ));
                }
                Ok(body + skip)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::{zeros_nchw, BatchNorm2d, Conv2d, Relu};

    struct PathRecorder(Vec<String>);

    impl LayerHook for PathRecorder {
        fn before_layer(&mut self, path: &str, _layer: &Layer, _input: &Tensor) -> Result<()> {
            self.0.push(path.to_string());
            Ok(())
        }
    }

    fn block() -> Module {
        Sequential::new()
            .add_named("stem", Layer::from(Conv2d::new(3, 4, (3, 3), (1, 1), (1, 1))))
            .add_named(
                "res",
                Residual::new(
                    Sequential::new()
                        .add(Layer::from(BatchNorm2d::new(4)))
                        .add(Layer::from(Relu::new())),
                ),
            )
            .into()
    }

    #[test]
    fn test_leaf_paths() {
        let model = block();
        let paths: Vec<String> = model.leaves().into_iter().map(|(p, _)| p).collect();
        assert_eq!(paths, vec!["stem", "res.body.0", "res.body.1"]);
        assert!(!model.is_leaf());
        assert_eq!(model.num_parameters(), 4 * 3 * 9 + 4 + 8);
    }

    #[test]
    fn test_hook_sees_layers_in_forward_order() {
        let model = block();
        let mut recorder = PathRecorder(Vec::new());
        let output = model.forward_with_hook(&zeros_nchw(1, 3, 6, 6), &mut recorder).unwrap();
        assert_eq!(output.shape(), &[1, 4, 6, 6]);
        assert_eq!(recorder.0, vec!["stem", "res.body.0", "res.body.1"]);
    }

    #[test]
    fn test_residual_shape_mismatch() {
        let model: Module = Residual::new(Layer::from(Conv2d::new(3, 3, (3, 3), (1, 1), (0, 0)))).into();
        assert!(model.forward(&zeros_nchw(1, 3, 5, 5)).is_err());
    }
}
