//! Regression models as fixed two-layer instances of [`LayeredModel`].

use math::Vector;

use crate::{Activation, Cost, LayeredModel, Result};

/// Linear regression: identity output over a squared-error cost.
#[derive(Debug, Clone)]
pub struct LinearRegression {
    model: LayeredModel,
}

impl LinearRegression {
    /// Creates a model over `dimension` input features.
    pub fn new(dimension: usize) -> Result<Self> {
        let mut model = LayeredModel::new(Cost::SquaredError);
        model.add_layer(dimension, Activation::Identity, false)?;
        model.add_layer(1, Activation::Identity, true)?;
        Ok(Self { model })
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) -> Result<()> {
        self.model.set_learning_rate(learning_rate)
    }

    /// Trains on one instance (features then target); returns its error.
    pub fn train_online(&mut self, instance: &Vector) -> Result<f64> {
        self.model.train_online(instance)
    }

    pub fn output(&self, features: &Vector) -> Result<f64> {
        Ok(self.model.output(features)?.get(0))
    }

    /// The learned coefficients: bias weight first, one slot per feature.
    pub fn weights(&self) -> Vector {
        self.model.weights()[0].row(0)
    }

    pub fn model(&self) -> &LayeredModel {
        &self.model
    }
}

/// Logistic regression: sigmoid output over a cross-entropy cost.
#[derive(Debug, Clone)]
pub struct LogisticRegression {
    model: LayeredModel,
}

impl LogisticRegression {
    /// Creates a model over `dimension` input features.
    pub fn new(dimension: usize) -> Result<Self> {
        let mut model = LayeredModel::new(Cost::CrossEntropy);
        model.add_layer(dimension, Activation::Sigmoid, false)?;
        model.add_layer(1, Activation::Sigmoid, true)?;
        Ok(Self { model })
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) -> Result<()> {
        self.model.set_learning_rate(learning_rate)
    }

    /// Trains on one instance (features then 0/1 label); returns its error.
    pub fn train_online(&mut self, instance: &Vector) -> Result<f64> {
        self.model.train_online(instance)
    }

    /// The estimated probability of the positive class.
    pub fn output(&self, features: &Vector) -> Result<f64> {
        Ok(self.model.output(features)?.get(0))
    }

    pub fn model(&self) -> &LayeredModel {
        &self.model
    }
}
