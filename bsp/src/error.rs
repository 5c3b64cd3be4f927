use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use model::ModelErr;

/// The result type used in the entire training module.
pub type Result<T> = std::result::Result<T, TrainErr>;

/// Training runtime failures.
#[derive(Debug)]
pub enum TrainErr {
    Model(ModelErr),
    Io(io::Error),
    EmptySource {
        worker: usize,
    },
    WorkerPanicked {
        worker: usize,
    },
}

impl Display for TrainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainErr::Model(e) => write!(f, "model error: {e}"),
            TrainErr::Io(e) => write!(f, "io error: {e}"),
            TrainErr::EmptySource { worker } => {
                write!(f, "worker {worker} has no training records to read")
            }
            TrainErr::WorkerPanicked { worker } => {
                write!(f, "worker {worker} panicked during training")
            }
        }
    }
}

impl Error for TrainErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainErr::Model(e) => Some(e),
            TrainErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ModelErr> for TrainErr {
    fn from(value: ModelErr) -> Self {
        Self::Model(value)
    }
}

impl From<io::Error> for TrainErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
