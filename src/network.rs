use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayView2, ArrayViewD, Axis};
use rand::Rng;
use serde::{Serialize, Deserialize};

use crate::activations::Activation;
use crate::error::{DqnError, Result};
use crate::layers::{BatchNormLayer, DenseLayer, DropoutLayer, Layer, Mode};
use crate::optimizer::OptimizerWrapper;

/// Architecture of an action-value network.
///
/// Fully determines the set of tensors a [`QNetwork`] holds, so two networks
/// built from the same config can always exchange parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub state_size: usize,
    pub action_size: usize,
    pub hidden_widths: Vec<usize>,
    pub use_normalization: bool,
    pub dropout_prob: f32,
}

impl NetworkConfig {
    pub fn new(state_size: usize, action_size: usize, hidden_widths: Vec<usize>) -> Self {
        NetworkConfig {
            state_size,
            action_size,
            hidden_widths,
            use_normalization: false,
            dropout_prob: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.state_size == 0 {
            return Err(DqnError::invalid_parameter("state_size", "must be positive"));
        }
        if self.action_size == 0 {
            return Err(DqnError::invalid_parameter("action_size", "must be positive"));
        }
        if let Some(pos) = self.hidden_widths.iter().position(|&w| w == 0) {
            return Err(DqnError::invalid_parameter(
                "hidden_widths".to_string(),
                format!("hidden layer {} has width 0", pos),
            ));
        }
        if !(0.0..1.0).contains(&self.dropout_prob) {
            return Err(DqnError::invalid_parameter(
                "dropout_prob".to_string(),
                format!("must be in [0, 1), got {}", self.dropout_prob),
            ));
        }
        Ok(())
    }
}

/// One hidden stage: linear → optional batch norm → activation → optional dropout
#[derive(Clone, Debug)]
struct HiddenBlock {
    linear: DenseLayer,
    norm: Option<BatchNormLayer>,
    activation: Activation,
    dropout: Option<DropoutLayer>,
    pre_activation: Option<Array2<f32>>,
}

impl HiddenBlock {
    fn forward(&mut self, inputs: ArrayView2<f32>, mode: Mode) -> Array2<f32> {
        let mut x = self.linear.forward_batch(inputs, mode);
        if let Some(norm) = self.norm.as_mut() {
            x = norm.forward_batch(x.view(), mode);
        }
        self.pre_activation = match mode {
            Mode::Train => Some(x.clone()),
            Mode::Eval => None,
        };
        self.activation.apply_batch(&mut x);
        if let Some(dropout) = self.dropout.as_mut() {
            x = dropout.forward_batch(x.view(), mode);
        }
        x
    }

    fn backward(&mut self, output_errors: ArrayView2<f32>) -> Result<Array2<f32>> {
        let mut grad = match self.dropout.as_mut() {
            Some(dropout) => dropout.backward_batch(output_errors)?,
            None => output_errors.to_owned(),
        };
        let pre_activation = self.pre_activation.as_ref().ok_or_else(|| {
            DqnError::NumericalError("backward called without a training-mode forward pass".to_string())
        })?;
        grad = grad * &self.activation.derivative_batch(pre_activation.view());
        if let Some(norm) = self.norm.as_mut() {
            grad = norm.backward_batch(grad.view())?;
        }
        self.linear.backward_batch(grad.view())
    }

    fn layers(&self) -> Vec<(&'static str, &dyn Layer)> {
        let linear: &dyn Layer = &self.linear;
        let mut layers = vec![("linear", linear)];
        if let Some(norm) = &self.norm {
            layers.push(("norm", norm as &dyn Layer));
        }
        layers
    }

    fn layers_mut(&mut self) -> Vec<(&'static str, &mut dyn Layer)> {
        let linear: &mut dyn Layer = &mut self.linear;
        let mut layers = vec![("linear", linear)];
        if let Some(norm) = self.norm.as_mut() {
            layers.push(("norm", norm as &mut dyn Layer));
        }
        layers
    }
}

/// Serializable copy of every tensor of a network, keyed by tensor name
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSnapshot {
    pub config: NetworkConfig,
    pub tensors: BTreeMap<String, ArrayD<f32>>,
}

/// Action-value network: maps a state vector to one value estimate per action.
#[derive(Clone, Debug)]
pub struct QNetwork {
    config: NetworkConfig,
    hidden: Vec<HiddenBlock>,
    output: DenseLayer,
}

impl QNetwork {
    /// Build a network for `config`, drawing initial parameters (and dropout
    /// seeds) from `rng`.
    pub fn new<R: Rng + ?Sized>(config: NetworkConfig, rng: &mut R) -> Result<Self> {
        config.validate()?;

        let mut hidden = Vec::with_capacity(config.hidden_widths.len());
        let mut fan_in = config.state_size;
        for &width in &config.hidden_widths {
            let linear = DenseLayer::new(fan_in, width, rng);
            let norm = config
                .use_normalization
                .then(|| BatchNormLayer::with_defaults(width));
            let dropout = if config.dropout_prob > 0.0 {
                Some(DropoutLayer::new(width, config.dropout_prob, rng.gen())?)
            } else {
                None
            };
            hidden.push(HiddenBlock {
                linear,
                norm,
                activation: Activation::Relu,
                dropout,
                pre_activation: None,
            });
            fan_in = width;
        }
        let output = DenseLayer::new(fan_in, config.action_size, rng);

        Ok(QNetwork { config, hidden, output })
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    pub fn state_size(&self) -> usize {
        self.config.state_size
    }

    pub fn action_size(&self) -> usize {
        self.config.action_size
    }

    /// Evaluate a single state
    pub fn forward(&mut self, state: ArrayView1<f32>, mode: Mode) -> Result<Array1<f32>> {
        let outputs = self.forward_batch(state.insert_axis(Axis(0)), mode)?;
        Ok(outputs.index_axis_move(Axis(0), 0))
    }

    /// Evaluate a batch of states, one per row
    pub fn forward_batch(&mut self, states: ArrayView2<f32>, mode: Mode) -> Result<Array2<f32>> {
        if states.ncols() != self.config.state_size {
            return Err(DqnError::dimension_mismatch(
                format!("{} state features", self.config.state_size),
                format!("{}", states.ncols()),
            ));
        }

        let mut x = states.to_owned();
        for block in &mut self.hidden {
            x = block.forward(x.view(), mode);
        }
        Ok(self.output.forward_batch(x.view(), mode))
    }

    /// Backpropagate the error on the outputs of the last training-mode forward pass
    pub fn backward(&mut self, output_errors: ArrayView2<f32>) -> Result<()> {
        let mut grad = self.output.backward_batch(output_errors)?;
        for block in self.hidden.iter_mut().rev() {
            grad = block.backward(grad.view())?;
        }
        Ok(())
    }

    /// Apply the gradients stored by [`QNetwork::backward`]
    pub fn apply_gradients(&mut self, optimizer: &mut OptimizerWrapper, learning_rate: f32) {
        let mut slot = 0;
        for block in &mut self.hidden {
            for (_, layer) in block.layers_mut() {
                layer.apply_gradients(optimizer, &mut slot, learning_rate);
            }
        }
        self.output.apply_gradients(optimizer, &mut slot, learning_rate);
    }

    /// Every tensor of the network with its identifier, in a stable order
    pub fn named_parameters(&self) -> Vec<(String, ArrayViewD<'_, f32>)> {
        let mut params = Vec::new();
        for (i, block) in self.hidden.iter().enumerate() {
            for (layer_name, layer) in block.layers() {
                for (name, tensor) in layer.parameters() {
                    params.push((format!("hidden.{}.{}.{}", i, layer_name, name), tensor));
                }
            }
        }
        for (name, tensor) in self.output.parameters() {
            params.push((format!("output.{}", name), tensor));
        }
        params
    }

    /// Look up one tensor by identifier
    pub fn parameter(&self, name: &str) -> Option<ArrayD<f32>> {
        self.named_parameters()
            .into_iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| t.to_owned())
    }

    /// Visit every tensor mutably, in the order of [`QNetwork::named_parameters`]
    fn for_each_parameter_mut<F>(&mut self, mut f: F) -> Result<()>
    where
        F: FnMut(&str, ndarray::ArrayViewMutD<'_, f32>) -> Result<()>,
    {
        for (i, block) in self.hidden.iter_mut().enumerate() {
            for (layer_name, layer) in block.layers_mut() {
                for (name, tensor) in layer.parameters_mut() {
                    f(&format!("hidden.{}.{}.{}", i, layer_name, name), tensor)?;
                }
            }
        }
        for (name, tensor) in self.output.parameters_mut() {
            f(&format!("output.{}", name), tensor)?;
        }
        Ok(())
    }

    fn ensure_same_architecture(&self, other: &QNetwork) -> Result<()> {
        if self.config != other.config {
            return Err(DqnError::dimension_mismatch(
                format!("{:?}", self.config),
                format!("{:?}", other.config),
            ));
        }
        Ok(())
    }

    /// Polyak update: `self = tau * source + (1 - tau) * self`, for every tensor
    pub fn soft_update_from(&mut self, source: &QNetwork, tau: f32) -> Result<()> {
        self.ensure_same_architecture(source)?;
        let mut sources = source.named_parameters().into_iter();
        self.for_each_parameter_mut(|name, mut target| {
            let (source_name, source_tensor) = sources
                .next()
                .ok_or_else(|| DqnError::dimension_mismatch(name.to_string(), "<missing>".to_string()))?;
            if source_name != name {
                return Err(DqnError::dimension_mismatch(name.to_string(), source_name));
            }
            target.zip_mut_with(&source_tensor, |t, &s| *t = tau * s + (1.0 - tau) * *t);
            Ok(())
        })
    }

    /// Overwrite every tensor with the values held by `source`
    pub fn copy_from(&mut self, source: &QNetwork) -> Result<()> {
        self.soft_update_from(source, 1.0)
    }

    /// Copy out every tensor
    pub fn snapshot(&self) -> ParameterSnapshot {
        let tensors = self
            .named_parameters()
            .into_iter()
            .map(|(name, tensor)| (name, tensor.to_owned()))
            .collect();
        ParameterSnapshot {
            config: self.config.clone(),
            tensors,
        }
    }

    /// Rebuild a network from a snapshot; dropout masks are reseeded from `rng`
    pub fn from_snapshot<R: Rng + ?Sized>(snapshot: &ParameterSnapshot, rng: &mut R) -> Result<Self> {
        let mut network = QNetwork::new(snapshot.config.clone(), rng)?;
        network.for_each_parameter_mut(|name, mut tensor| {
            let stored = snapshot.tensors.get(name).ok_or_else(|| {
                DqnError::SerializationError(format!("snapshot is missing tensor '{}'", name))
            })?;
            if stored.shape() != tensor.shape() {
                return Err(DqnError::dimension_mismatch(
                    format!("{} with shape {:?}", name, tensor.shape()),
                    format!("shape {:?}", stored.shape()),
                ));
            }
            tensor.assign(stored);
            Ok(())
        })?;
        Ok(network)
    }

    /// Save all parameters (bincode-encoded [`ParameterSnapshot`])
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let serialized = bincode::serialize(&self.snapshot())?;
        fs::write(path, serialized)?;
        Ok(())
    }

    /// Load a network saved with [`QNetwork::save`]
    pub fn load<P: AsRef<Path>, R: Rng + ?Sized>(path: P, rng: &mut R) -> Result<Self> {
        let data = fs::read(path)?;
        let snapshot: ParameterSnapshot = bincode::deserialize(&data)?;
        Self::from_snapshot(&snapshot, rng)
    }
}
