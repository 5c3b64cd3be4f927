use std::str::FromStr;

use math::Vector;

use crate::ModelErr;

/// The closed set of layer activation functions, keyed by name in
/// configuration and in the stored model format. Unknown names are rejected
/// when the name is parsed, never at use time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Identity,
    Sigmoid,
    Tanh,
    Softmax,
}

impl Activation {
    pub fn name(self) -> &'static str {
        match self {
            Activation::Identity => "identity",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Softmax => "softmax",
        }
    }

    /// Squashes a layer's net input. Identity, sigmoid and tanh act slot by
    /// slot; softmax normalizes over the whole layer.
    pub fn activate(self, net: Vector) -> Vector {
        match self {
            Activation::Identity => net,
            Activation::Sigmoid => net.map(|x| 1.0 / (1.0 + (-x).exp())),
            Activation::Tanh => net.map(f64::tanh),
            Activation::Softmax => {
                let max = net
                    .iter()
                    .map(|(_, v)| v)
                    .fold(f64::NEG_INFINITY, f64::max);
                let exps: Vec<f64> = net.iter().map(|(_, v)| (v - max).exp()).collect();
                let total: f64 = exps.iter().sum();
                Vector::from(exps.into_iter().map(|e| e / total).collect::<Vec<_>>())
            }
        }
    }

    /// Derivative with respect to the net input, expressed in terms of the
    /// activated output `y` (which is what the backpropagation cache holds).
    pub fn derivative(self, y: f64) -> f64 {
        match self {
            Activation::Identity => 1.0,
            Activation::Sigmoid => y * (1.0 - y),
            Activation::Tanh => 1.0 - y * y,
            // The pairing rules only admit softmax together with
            // cross-entropy, whose output residual never consults this.
            Activation::Softmax => unreachable!("softmax has no per-slot derivative"),
        }
    }
}

impl FromStr for Activation {
    type Err = ModelErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "identity" => Ok(Activation::Identity),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            "softmax" => Ok(Activation::Softmax),
            _ => Err(ModelErr::UnknownFunction { name: s.into() }),
        }
    }
}

/// The closed set of output-layer cost functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cost {
    SquaredError,
    CrossEntropy,
}

impl Cost {
    pub fn name(self) -> &'static str {
        match self {
            Cost::SquaredError => "squared_error",
            Cost::CrossEntropy => "cross_entropy",
        }
    }

    /// Cost contributed by one output unit.
    pub fn value(self, target: f64, actual: f64) -> f64 {
        match self {
            Cost::SquaredError => 0.5 * (actual - target) * (actual - target),
            Cost::CrossEntropy => {
                let t = clamp_unit(target);
                let y = clamp_unit(actual);
                -t * y.ln() - (1.0 - t) * (1.0 - y).ln()
            }
        }
    }

    /// Partial derivative of the cost with respect to one output unit.
    pub fn derivative(self, target: f64, actual: f64) -> f64 {
        match self {
            Cost::SquaredError => actual - target,
            Cost::CrossEntropy => {
                let t = clamp_unit(target);
                let y = clamp_unit(actual);
                -t / y + (1.0 - t) / (1.0 - y)
            }
        }
    }

    /// Whether this cost pairs with `activation` on the output layer. The
    /// gradient only implements the combinations whose output residual is
    /// well defined slot by slot; everything else is rejected when the model
    /// is assembled.
    pub fn supports(self, activation: Activation) -> bool {
        match self {
            Cost::SquaredError => matches!(
                activation,
                Activation::Identity | Activation::Sigmoid | Activation::Tanh
            ),
            Cost::CrossEntropy => {
                matches!(activation, Activation::Sigmoid | Activation::Softmax)
            }
        }
    }
}

impl FromStr for Cost {
    type Err = ModelErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "squared_error" => Ok(Cost::SquaredError),
            "cross_entropy" => Ok(Cost::CrossEntropy),
            _ => Err(ModelErr::UnknownFunction { name: s.into() }),
        }
    }
}

// Keeps the logarithmic cost and its derivative finite at the interval ends.
fn clamp_unit(x: f64) -> f64 {
    x.clamp(0.001, 0.999)
}
