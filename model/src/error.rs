use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

/// The result type used in the entire model module.
pub type Result<T> = std::result::Result<T, ModelErr>;

/// The model module's error type.
#[derive(Debug)]
pub enum ModelErr {
    InvalidConfiguration {
        reason: String,
    },
    DimensionMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    UnknownFunction {
        name: String,
    },
    CorruptModel {
        reason: String,
    },
    Io(io::Error),
}

impl Display for ModelErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelErr::InvalidConfiguration { reason } => {
                write!(f, "invalid model configuration: {reason}")
            }
            ModelErr::DimensionMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "dimension mismatch for {what}: got {got}, expected {expected}"
            ),
            ModelErr::UnknownFunction { name } => {
                write!(f, "unknown function name '{name}'")
            }
            ModelErr::CorruptModel { reason } => write!(f, "corrupt model: {reason}"),
            ModelErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for ModelErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ModelErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ModelErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
