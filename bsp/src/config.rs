use model::{Activation, Cost, LayeredModel, ModelErr};
use serde::{Deserialize, Serialize};

use crate::Result;

/// One layer of the configured topology: its unit count (bias excluded) and
/// its activation function by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerSpec {
    pub size: usize,
    pub activation: String,
}

/// Everything a training run consumes, as already-parsed scalars and
/// strings. Function names are resolved against the closed registry in
/// [`build_model`](Self::build_model), so a typo fails before any worker
/// thread starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    pub learning_rate: f64,
    #[serde(default)]
    pub momentum_weight: f64,
    #[serde(default)]
    pub regularization_weight: f64,
    pub batch_size: usize,
    pub max_iterations: u64,
    pub convergence_check_interval: u64,
    pub layers: Vec<LayerSpec>,
    pub cost: String,
    pub model_path: String,
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_workers() -> usize {
    2
}

impl TrainingConfig {
    /// Assembles and validates the model this configuration describes.
    pub fn build_model(&self) -> Result<LayeredModel> {
        if self.batch_size == 0 {
            return Err(invalid("batch size must be larger than 0"));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max iterations must be larger than 0"));
        }
        if self.convergence_check_interval == 0 {
            return Err(invalid("convergence check interval must be larger than 0"));
        }
        if self.workers == 0 {
            return Err(invalid("a training run needs at least one worker"));
        }
        if self.layers.len() < 2 {
            return Err(invalid("the topology needs an input and an output layer"));
        }

        let cost: Cost = self.cost.parse()?;
        let mut model = LayeredModel::new(cost);
        model.set_learning_rate(self.learning_rate)?;
        model.set_momentum(self.momentum_weight)?;
        model.set_regularization(self.regularization_weight)?;
        for (i, layer) in self.layers.iter().enumerate() {
            let activation: Activation = layer.activation.parse()?;
            model.add_layer(layer.size, activation, i + 1 == self.layers.len())?;
        }
        Ok(model)
    }

    /// Checks the configuration without keeping the assembled model.
    pub fn validate(&self) -> Result<()> {
        self.build_model().map(drop)
    }
}

fn invalid(reason: &str) -> crate::TrainErr {
    ModelErr::InvalidConfiguration {
        reason: reason.into(),
    }
    .into()
}
