use std::thread;

use log::info;

use math::Vector;
use model::ModelErr;

use crate::{
    BspTrainer, FsStore, MemorySource, ModelStore, Result, TrainErr, TrainingConfig,
    peer::local_cluster, trainer::TrainingReport,
};

/// Trains `config`'s model over `instances` with a pool of
/// `config.workers` lockstep threads, each worker holding a round-robin
/// shard of the input. Worker 0 writes the canonical model to
/// `config.model_path` and its report is returned.
///
/// A model already stored at `config.model_path` is loaded and trained
/// further, hyperparameters included; otherwise a fresh model is assembled
/// from the configuration.
pub fn train_local(config: &TrainingConfig, instances: &[Vector]) -> Result<TrainingReport> {
    let model = match FsStore.open(&config.model_path) {
        Ok(mut stored) => {
            config.validate()?;
            info!("resuming from the model stored at {}", config.model_path);
            model::codec::read_model(&mut stored)?
        }
        Err(_) => config.build_model()?,
    };
    let workers = config.workers;
    if instances.len() < workers {
        return Err(TrainErr::Model(ModelErr::InvalidConfiguration {
            reason: format!(
                "{} training instances cannot feed {workers} workers",
                instances.len()
            ),
        }));
    }
    // a malformed instance failing mid-superstep would leave the other
    // workers parked on the barrier, so the width check happens up front
    let width = model.input_dimension() + model.output_dimension();
    for instance in instances {
        if instance.dimension() != width {
            return Err(TrainErr::Model(ModelErr::DimensionMismatch {
                what: "training instance",
                got: instance.dimension(),
                expected: width,
            }));
        }
    }

    let mut shards: Vec<Vec<Vector>> = (0..workers).map(|_| Vec::new()).collect();
    for (i, instance) in instances.iter().enumerate() {
        shards[i % workers].push(instance.clone());
    }

    info!(
        "local training: {workers} workers over {} instances",
        instances.len()
    );

    let mut peers = local_cluster(workers).into_iter();
    let leader_peer = peers.next().expect("the cluster has at least one worker");
    let mut shards = shards.into_iter();
    let leader_shard = shards.next().expect("one shard per worker");

    thread::scope(|scope| {
        let handles: Vec<_> = peers
            .zip(shards)
            .map(|(peer, shard)| {
                let model = model.clone();
                scope.spawn(move || {
                    BspTrainer::new(model, MemorySource::new(shard), config).run(&peer, &FsStore)
                })
            })
            .collect();

        let report = BspTrainer::new(model.clone(), MemorySource::new(leader_shard), config)
            .run(&leader_peer, &FsStore)?;

        for (i, handle) in handles.into_iter().enumerate() {
            handle
                .join()
                .map_err(|_| TrainErr::WorkerPanicked { worker: i + 1 })??;
        }

        Ok(report.expect("worker 0 always produces the training report"))
    })
}
