use log::{debug, info};

use math::Matrix;
use model::{Gradient, LayeredModel, codec};

use crate::{
    Peer, RecordSource, Result, TrainErr, TrainingConfig, TrainingMessage, TrainingState,
    store::ModelStore,
};

/// Summary the aggregator hands back at the end of a run.
#[derive(Debug)]
pub struct TrainingReport {
    pub model: LayeredModel,
    pub supersteps: u64,
    pub converged: bool,
}

/// One worker replica of the bulk-synchronous training loop. The worker at
/// index 0 doubles as the aggregator and owns the canonical model; everyone
/// else holds a read-only replica refreshed by broadcast once per superstep.
///
/// Each superstep: compute and send the local batch gradient, barrier,
/// aggregate on worker 0, barrier. The aggregator only mutates the
/// canonical model between the two barriers, when no other worker reads it,
/// so the replicas need no locking at all.
pub struct BspTrainer<S> {
    model: LayeredModel,
    source: S,
    batch_size: usize,
    state: TrainingState,
    model_path: String,
}

impl<S: RecordSource> BspTrainer<S> {
    pub fn new(model: LayeredModel, source: S, config: &TrainingConfig) -> Self {
        Self {
            model,
            source,
            batch_size: config.batch_size,
            state: TrainingState::new(config.max_iterations, config.convergence_check_interval),
            model_path: config.model_path.clone(),
        }
    }

    /// Runs supersteps until the aggregator announced convergence or the
    /// iteration budget is spent. Worker 0 persists the canonical model
    /// through `store` and returns the report; other workers discard their
    /// replicas and return `None`.
    pub fn run<P: Peer, M: ModelStore>(
        mut self,
        peer: &P,
        store: &M,
    ) -> Result<Option<TrainingReport>> {
        let index = peer.self_index();
        let leader = index == 0;
        info!("worker {index} begins training");

        let mut terminated = false;
        while self.state.next_superstep() {
            // adopt the model broadcast at the end of the previous superstep
            if let Some(message) = peer.drain_messages().pop() {
                terminated = message.terminated;
                self.model.set_weights(message.matrices)?;
                if let Some(prev) = message.prev_matrices {
                    self.model.set_prev_updates(prev)?;
                }
            }

            if !terminated {
                let (gradients, error) = self.batch_gradients(index)?;
                peer.send(
                    0,
                    TrainingMessage {
                        sender: index,
                        terminated: false,
                        error,
                        matrices: gradients,
                        prev_matrices: Some(self.model.prev_updates().to_vec()),
                    },
                );
            }
            peer.sync();

            if leader && !terminated {
                self.merge_updates(peer)?;
            }
            peer.sync();

            if terminated {
                break;
            }
        }

        if !leader {
            return Ok(None);
        }
        info!(
            "end of training after {} supersteps, writing the model to {}",
            self.state.iterations(),
            self.model_path
        );
        let mut out = store.create(&self.model_path)?;
        codec::write_model(&self.model, &mut out)?;
        Ok(Some(TrainingReport {
            supersteps: self.state.iterations(),
            converged: self.state.converged(),
            model: self.model,
        }))
    }

    /// Reads up to `batch_size` instances, wrapping to the start of the
    /// input when it runs out, and averages their gradients and errors.
    fn batch_gradients(&mut self, index: usize) -> Result<(Vec<Matrix>, f64)> {
        let mut sums: Vec<Matrix> = self.model.weights().iter().map(Matrix::zeros_like).collect();
        let mut error = 0.0;
        for _ in 0..self.batch_size {
            let instance = match self.source.read_next() {
                Some(instance) => instance,
                None => {
                    self.source.reopen();
                    self.source
                        .read_next()
                        .ok_or(TrainErr::EmptySource { worker: index })?
                }
            };
            let Gradient { matrices, error: e } = self.model.gradient_instance(&instance)?;
            matrices_add(&mut sums, &matrices);
            error += e / self.batch_size as f64;
        }
        for sum in &mut sums {
            sum.div_assign(self.batch_size as f64);
        }
        Ok((sums, error))
    }

    /// Aggregator half of a superstep: average the workers' batch
    /// gradients, apply them to the canonical model, track the error
    /// window, and broadcast the refreshed weights with the convergence
    /// flag to every worker (this one included).
    fn merge_updates<P: Peer>(&mut self, peer: &P) -> Result<()> {
        let messages = peer.drain_messages();
        if messages.is_empty() {
            // a dropped message is indistinguishable from every worker
            // having finished, and counts as convergence
            self.state.mark_converged();
        } else {
            let senders = messages.len() as f64;
            let mut gradients: Vec<Matrix> = Vec::new();
            let mut prevs: Vec<Matrix> = Vec::new();
            let mut error = 0.0;
            for message in messages {
                error += message.error / senders;
                if gradients.is_empty() {
                    gradients = message.matrices;
                    prevs = message.prev_matrices.unwrap_or_default();
                } else {
                    matrices_add(&mut gradients, &message.matrices);
                    if let Some(prev) = message.prev_matrices {
                        matrices_add(&mut prevs, &prev);
                    }
                }
            }
            for gradient in &mut gradients {
                gradient.div_assign(senders);
            }
            if !prevs.is_empty() {
                for prev in &mut prevs {
                    prev.div_assign(senders);
                }
                self.model.set_prev_updates(prevs)?;
            }
            self.model.apply_update(&gradients)?;
            self.state.record_error(error);
            debug!(superstep = self.state.iterations(); "merged worker updates, avg error {error}");
        }

        for target in 0..peer.peer_count() {
            peer.send(
                target,
                TrainingMessage {
                    sender: peer.self_index(),
                    terminated: self.state.converged(),
                    error: 0.0,
                    matrices: self.model.weights().to_vec(),
                    prev_matrices: Some(self.model.prev_updates().to_vec()),
                },
            );
        }
        Ok(())
    }
}

/// Adds each source matrix onto the matching destination matrix.
fn matrices_add(dst: &mut [Matrix], src: &[Matrix]) {
    for (d, s) in dst.iter_mut().zip(src) {
        d.add_assign(s);
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::MemorySource;

    /// A peer whose inbox is scripted and whose outbox just records; sync
    /// is a no-op since there is only this member.
    struct ScriptedPeer {
        inbox: Mutex<Vec<TrainingMessage>>,
        sent: Mutex<Vec<TrainingMessage>>,
    }

    impl ScriptedPeer {
        fn new(inbox: Vec<TrainingMessage>) -> Self {
            Self {
                inbox: Mutex::new(inbox),
                sent: Mutex::new(Vec::new()),
            }
        }
    }

    impl Peer for ScriptedPeer {
        fn self_index(&self) -> usize {
            0
        }

        fn peer_count(&self) -> usize {
            1
        }

        fn send(&self, _target: usize, message: TrainingMessage) {
            self.sent.lock().push(message);
        }

        fn sync(&self) {}

        fn drain_messages(&self) -> Vec<TrainingMessage> {
            std::mem::take(&mut *self.inbox.lock())
        }
    }

    fn config() -> TrainingConfig {
        TrainingConfig {
            learning_rate: 0.1,
            momentum_weight: 0.0,
            regularization_weight: 0.0,
            batch_size: 1,
            max_iterations: 10,
            convergence_check_interval: 5,
            layers: vec![
                crate::LayerSpec {
                    size: 1,
                    activation: "identity".into(),
                },
                crate::LayerSpec {
                    size: 1,
                    activation: "identity".into(),
                },
            ],
            cost: "squared_error".into(),
            model_path: "unused".into(),
            workers: 1,
        }
    }

    fn worker_message(sender: usize, gradient: Matrix) -> TrainingMessage {
        TrainingMessage {
            sender,
            terminated: false,
            error: 0.5,
            matrices: vec![gradient],
            prev_matrices: Some(vec![Matrix::zeros(1, 2)]),
        }
    }

    #[test]
    fn merge_applies_the_exact_mean_of_worker_gradients() {
        let cfg = config();
        let mut model = cfg.build_model().unwrap();
        model.set_weights(vec![Matrix::filled(1, 2, 1.0)]).unwrap();

        let peer = ScriptedPeer::new(vec![
            worker_message(0, Matrix::filled(1, 2, 3.0)),
            worker_message(1, Matrix::filled(1, 2, 6.0)),
            worker_message(2, Matrix::filled(1, 2, 0.0)),
        ]);

        let mut trainer = BspTrainer::new(model, MemorySource::new(Vec::new()), &cfg);
        trainer.state.next_superstep();
        trainer.merge_updates(&peer).unwrap();

        // mean gradient is 3.0, so each weight moves by -0.1 * 3.0
        let weights = &trainer.model.weights()[0];
        assert_eq!(weights.get(0, 0), 1.0 - 0.1 * 3.0);
        assert_eq!(weights.get(0, 1), 1.0 - 0.1 * 3.0);

        // the refreshed model was broadcast to every worker
        let sent = peer.sent.lock();
        assert_eq!(sent.len(), 1);
        assert_eq!(&sent[0].matrices[0], weights);
        assert!(!sent[0].terminated);
    }

    #[test]
    fn a_silent_round_counts_as_convergence() {
        let cfg = config();
        let model = cfg.build_model().unwrap();
        let peer = ScriptedPeer::new(Vec::new());

        let mut trainer = BspTrainer::new(model, MemorySource::new(Vec::new()), &cfg);
        trainer.state.next_superstep();
        trainer.merge_updates(&peer).unwrap();

        assert!(trainer.state.converged());
        let sent = peer.sent.lock();
        assert!(sent[0].terminated);
    }

    #[test]
    fn run_stops_at_the_iteration_budget_when_broadcasts_vanish() {
        // the scripted peer drops everything it is sent, so the trainer
        // never hears a convergence flag and must stop on the budget
        let cfg = config();
        let mut model = cfg.build_model().unwrap();
        model.set_weights(vec![Matrix::filled(1, 2, 0.1)]).unwrap();

        struct DroppingPeer;
        impl Peer for DroppingPeer {
            fn self_index(&self) -> usize {
                1
            }
            fn peer_count(&self) -> usize {
                2
            }
            fn send(&self, _target: usize, _message: TrainingMessage) {}
            fn sync(&self) {}
            fn drain_messages(&self) -> Vec<TrainingMessage> {
                Vec::new()
            }
        }

        let source = MemorySource::new(vec![math::Vector::from(vec![0.5, 1.0])]);
        let trainer = BspTrainer::new(model, source, &cfg);
        let report = trainer.run(&DroppingPeer, &crate::FsStore).unwrap();
        assert!(report.is_none());
    }
}
