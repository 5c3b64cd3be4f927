pub mod cluster;
pub mod config;
mod error;
mod message;
pub mod peer;
pub mod source;
pub mod state;
pub mod store;
mod trainer;

pub use cluster::train_local;
pub use config::{LayerSpec, TrainingConfig};
pub use error::{Result, TrainErr};
pub use message::TrainingMessage;
pub use peer::{LocalPeer, Peer, local_cluster};
pub use source::{MemorySource, RecordSource};
pub use state::TrainingState;
pub use store::{FsStore, ModelStore};
pub use trainer::{BspTrainer, TrainingReport};
