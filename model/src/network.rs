use math::{Matrix, Vector};
use ndarray::Zip;

use crate::{Activation, Cost, ModelErr, Result};

/// Per-instance (or per-batch) result of backpropagation: one raw gradient
/// matrix per weight matrix, plus the cost summed over the output layer.
#[derive(Debug, Clone)]
pub struct Gradient {
    pub matrices: Vec<Matrix>,
    pub error: f64,
}

/// A layered feed-forward model: linear and logistic regression, multilayer
/// perceptrons and autoencoders are all instances of this one type with
/// different layer and function choices.
///
/// Every non-output layer carries one bias unit at slot 0, injected with a
/// constant 1.0 during the forward pass. The weight matrix between layers
/// `i` and `i + 1` has one row per unit of layer `i + 1` (bias excluded) and
/// one column per unit of layer `i` (bias included).
#[derive(Debug, Clone)]
pub struct LayeredModel {
    pub(crate) layer_sizes: Vec<usize>,
    pub(crate) weights: Vec<Matrix>,
    pub(crate) prev_updates: Vec<Matrix>,
    /// One entry per weight matrix: the function squashing that matrix's
    /// product, i.e. the receiving layer's activation.
    pub(crate) activations: Vec<Activation>,
    pub(crate) cost: Cost,
    pub(crate) learning_rate: f64,
    pub(crate) momentum: f64,
    pub(crate) regularization: f64,
    pub(crate) output_added: bool,
}

impl LayeredModel {
    /// Creates an empty model bound to `cost`. Layers are appended with
    /// [`add_layer`](Self::add_layer); hyperparameters default to a learning
    /// rate of 0.5 with no momentum and no regularization.
    pub fn new(cost: Cost) -> Self {
        Self {
            layer_sizes: Vec::new(),
            weights: Vec::new(),
            prev_updates: Vec::new(),
            activations: Vec::new(),
            cost,
            learning_rate: 0.5,
            momentum: 0.0,
            regularization: 0.0,
            output_added: false,
        }
    }

    pub fn set_learning_rate(&mut self, learning_rate: f64) -> Result<()> {
        if learning_rate <= 0.0 || !learning_rate.is_finite() {
            return Err(invalid(format!(
                "learning rate must be larger than 0, got {learning_rate}"
            )));
        }
        self.learning_rate = learning_rate;
        Ok(())
    }

    pub fn set_momentum(&mut self, momentum: f64) -> Result<()> {
        if !(0.0..1.0).contains(&momentum) {
            return Err(invalid(format!(
                "momentum weight must be in [0, 1), got {momentum}"
            )));
        }
        self.momentum = momentum;
        Ok(())
    }

    pub fn set_regularization(&mut self, regularization: f64) -> Result<()> {
        if !(0.0..1.0).contains(&regularization) {
            return Err(invalid(format!(
                "regularization weight must be in [0, 1), got {regularization}"
            )));
        }
        self.regularization = regularization;
        Ok(())
    }

    /// Appends a layer of neurons. Past the input layer, a uniformly
    /// initialized weight matrix towards the previous layer is allocated.
    /// Every non-output layer gets one extra bias unit.
    ///
    /// # Arguments
    /// * `size` - The number of units in the layer, bias excluded.
    /// * `activation` - The function squashing this layer's net input;
    ///   ignored on the input layer.
    /// * `is_output` - Whether this is the final layer. Adding it seals the
    ///   topology and validates the cost pairing.
    ///
    /// # Returns
    /// The index of the new layer, starting at 0.
    pub fn add_layer(&mut self, size: usize, activation: Activation, is_output: bool) -> Result<usize> {
        if size == 0 {
            return Err(invalid("size of layer must be larger than 0".into()));
        }
        if self.output_added {
            return Err(invalid("cannot add a layer after the output layer".into()));
        }
        if is_output {
            if self.layer_sizes.is_empty() {
                return Err(invalid(
                    "the output layer needs at least an input layer before it".into(),
                ));
            }
            if !self.cost.supports(activation) {
                return Err(invalid(format!(
                    "cost '{}' does not pair with output activation '{}'",
                    self.cost.name(),
                    activation.name()
                )));
            }
        }

        self.layer_sizes
            .push(if is_output { size } else { size + 1 });
        let index = self.layer_sizes.len() - 1;
        if index > 0 {
            let cols = self.layer_sizes[index - 1];
            self.weights.push(Matrix::random(size, cols));
            self.prev_updates.push(Matrix::zeros(size, cols));
            self.activations.push(activation);
        }
        if is_output {
            self.output_added = true;
        }
        Ok(index)
    }

    /// Number of feature slots an instance must supply (input layer minus
    /// its bias unit).
    ///
    /// # Panics
    /// If no layer has been added yet.
    pub fn input_dimension(&self) -> usize {
        self.layer_sizes[0] - 1
    }

    /// Number of target slots an instance must supply.
    ///
    /// # Panics
    /// If no layer has been added yet.
    pub fn output_dimension(&self) -> usize {
        self.layer_sizes[self.layer_sizes.len() - 1]
    }

    pub fn layer_sizes(&self) -> &[usize] {
        &self.layer_sizes
    }

    pub fn cost(&self) -> Cost {
        self.cost
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    pub fn momentum(&self) -> f64 {
        self.momentum
    }

    pub fn regularization(&self) -> f64 {
        self.regularization
    }

    pub fn weights(&self) -> &[Matrix] {
        &self.weights
    }

    pub fn prev_updates(&self) -> &[Matrix] {
        &self.prev_updates
    }

    /// Replaces every weight matrix, e.g. with the matrices broadcast by the
    /// training aggregator.
    pub fn set_weights(&mut self, weights: Vec<Matrix>) -> Result<()> {
        self.check_topology(&weights, "weight matrices")?;
        self.weights = weights;
        Ok(())
    }

    /// Replaces the recorded previous updates driving the momentum term.
    pub fn set_prev_updates(&mut self, updates: Vec<Matrix>) -> Result<()> {
        self.check_topology(&updates, "previous update matrices")?;
        self.prev_updates = updates;
        Ok(())
    }

    /// Evaluates the model on a feature vector, returning the output layer
    /// (no bias slot).
    pub fn output(&self, features: &Vector) -> Result<Vector> {
        self.ensure_assembled()?;
        self.check_features(features)?;
        let mut out = prepend_bias(features);
        let last = self.weights.len() - 1;
        for (i, (weight, activation)) in self.weights.iter().zip(&self.activations).enumerate() {
            out = activation.activate(weight.mul_vec(&out));
            if i < last {
                out = prepend_bias(&out);
            }
        }
        Ok(out)
    }

    /// Backpropagation for a single `(features, target)` pair: forward pass
    /// with every layer's activated output cached, output residual from the
    /// cost/activation pairing, then one raw gradient matrix per weight
    /// matrix. The bias slot's contribution is excluded when a delta is
    /// pushed to an earlier layer.
    pub fn gradient(&self, features: &Vector, target: &Vector) -> Result<Gradient> {
        self.ensure_assembled()?;
        self.check_features(features)?;
        if target.dimension() != self.output_dimension() {
            return Err(ModelErr::DimensionMismatch {
                what: "target vector",
                got: target.dimension(),
                expected: self.output_dimension(),
            });
        }

        let cache = self.forward_cached(features);
        let output = &cache[cache.len() - 1];
        let output_activation = self.activations[self.activations.len() - 1];

        let mut error = 0.0;
        let mut delta = Vector::dense(output.dimension());
        for (j, y) in output.iter() {
            let t = target.get(j);
            error += self.cost.value(t, y);
            delta.set(j, output_residual(self.cost, output_activation, t, y));
        }

        let mut matrices: Vec<Matrix> = Vec::with_capacity(self.weights.len());
        for layer in (0..self.weights.len()).rev() {
            matrices.push(Matrix::outer(&delta, &cache[layer]));
            if layer > 0 {
                // back through the weights; slot 0 belongs to the bias unit
                // and does not propagate further
                let back = self.weights[layer].t_mul_vec(&delta);
                let activation = self.activations[layer - 1];
                let mut next = Vector::dense(back.dimension() - 1);
                for i in 0..next.dimension() {
                    next.set(i, back.get(i + 1) * activation.derivative(cache[layer].get(i + 1)));
                }
                delta = next;
            }
        }
        matrices.reverse();
        Ok(Gradient { matrices, error })
    }

    /// Backpropagation for a combined training instance: leading slots are
    /// features, trailing slots are the target.
    pub fn gradient_instance(&self, instance: &Vector) -> Result<Gradient> {
        self.ensure_assembled()?;
        let features = self.input_dimension();
        let expected = features + self.output_dimension();
        if instance.dimension() != expected {
            return Err(ModelErr::DimensionMismatch {
                what: "training instance",
                got: instance.dimension(),
                expected,
            });
        }
        self.gradient(
            &instance.slice_to(features),
            &instance.slice(features, instance.dimension()),
        )
    }

    /// Applies one gradient step in place. Per weight matrix the step is
    /// `-learning_rate * (gradient + regularization * weight)` plus
    /// `momentum * previous_update`, with the bias column exempt from the
    /// regularization term; the applied step is recorded as the new
    /// previous update.
    pub fn apply_update(&mut self, gradients: &[Matrix]) -> Result<()> {
        self.check_topology(gradients, "gradient matrices")?;
        let lr = self.learning_rate;
        let reg = self.regularization;
        let mu = self.momentum;
        for (i, gradient) in gradients.iter().enumerate() {
            let mut step = gradient.zeros_like();
            Zip::indexed(step.view_mut())
                .and(gradient.view())
                .and(self.weights[i].view())
                .and(self.prev_updates[i].view())
                .for_each(|(_, col), s, g, w, p| {
                    let penalty = if col == 0 { 0.0 } else { reg * w };
                    *s = -lr * (g + penalty) + mu * p;
                });
            self.weights[i].add_assign(&step);
            self.prev_updates[i] = step;
        }
        Ok(())
    }

    /// Single-instance online training: `gradient_instance` followed by
    /// `apply_update` against the model's own update history. Returns the
    /// instance's training error.
    pub fn train_online(&mut self, instance: &Vector) -> Result<f64> {
        let gradient = self.gradient_instance(instance)?;
        self.apply_update(&gradient.matrices)?;
        Ok(gradient.error)
    }

    /// Forward pass keeping every layer's activated output, bias slots
    /// included on the non-final layers. `cache[0]` is the biased input.
    fn forward_cached(&self, features: &Vector) -> Vec<Vector> {
        let mut cache = Vec::with_capacity(self.layer_sizes.len());
        cache.push(prepend_bias(features));
        let last = self.weights.len() - 1;
        for (i, (weight, activation)) in self.weights.iter().zip(&self.activations).enumerate() {
            let mut out = activation.activate(weight.mul_vec(&cache[i]));
            if i < last {
                out = prepend_bias(&out);
            }
            cache.push(out);
        }
        cache
    }

    fn ensure_assembled(&self) -> Result<()> {
        if !self.output_added {
            return Err(invalid("the model has no output layer yet".into()));
        }
        Ok(())
    }

    fn check_features(&self, features: &Vector) -> Result<()> {
        if features.dimension() != self.input_dimension() {
            return Err(ModelErr::DimensionMismatch {
                what: "input features",
                got: features.dimension(),
                expected: self.input_dimension(),
            });
        }
        Ok(())
    }

    fn check_topology(&self, matrices: &[Matrix], what: &'static str) -> Result<()> {
        if matrices.len() != self.weights.len() {
            return Err(invalid(format!(
                "{what}: got {} matrices, the model has {}",
                matrices.len(),
                self.weights.len()
            )));
        }
        for (i, (m, w)) in matrices.iter().zip(&self.weights).enumerate() {
            if m.rows() != w.rows() || m.cols() != w.cols() {
                return Err(invalid(format!(
                    "{what}: matrix {i} is {}x{}, the model expects {}x{}",
                    m.rows(),
                    m.cols(),
                    w.rows(),
                    w.cols()
                )));
            }
        }
        Ok(())
    }
}

/// Error at one output unit with respect to its net input. For the
/// cross-entropy pairings (sigmoid, softmax) the cost and activation
/// derivatives cancel algebraically to `actual - target`; squared error
/// keeps the activation derivative factor.
fn output_residual(cost: Cost, activation: Activation, target: f64, actual: f64) -> f64 {
    match cost {
        Cost::CrossEntropy => actual - target,
        Cost::SquaredError => cost.derivative(target, actual) * activation.derivative(actual),
    }
}

fn prepend_bias(v: &Vector) -> Vector {
    let mut out = Vec::with_capacity(v.dimension() + 1);
    out.push(1.0);
    out.extend(v.iter().map(|(_, x)| x));
    Vector::from(out)
}

fn invalid(reason: String) -> ModelErr {
    ModelErr::InvalidConfiguration { reason }
}
