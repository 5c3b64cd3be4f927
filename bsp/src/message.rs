use math::Matrix;

/// One superstep's payload between a worker and the aggregator.
///
/// Workers send their batch-averaged gradient matrices (plus the update
/// history feeding the momentum term); the aggregator broadcasts the
/// refreshed canonical weight matrices with the convergence flag. Messages
/// live for exactly one superstep and are never persisted.
#[derive(Debug, Clone)]
pub struct TrainingMessage {
    pub sender: usize,
    pub terminated: bool,
    pub error: f64,
    pub matrices: Vec<Matrix>,
    pub prev_matrices: Option<Vec<Matrix>>,
}
