/// Superstep accounting owned exclusively by the aggregator: the iteration
/// budget and the sliding error window deciding convergence. Created once
/// per training run and never shared or reset.
#[derive(Debug)]
pub struct TrainingState {
    iterations: u64,
    max_iterations: u64,
    check_interval: u64,
    current_window: f64,
    previous_window: f64,
    converged: bool,
}

impl TrainingState {
    pub fn new(max_iterations: u64, check_interval: u64) -> Self {
        Self {
            iterations: 0,
            max_iterations,
            check_interval,
            current_window: 0.0,
            previous_window: f64::MAX,
            converged: false,
        }
    }

    /// Advances to the next superstep; `false` once the iteration budget is
    /// spent.
    pub fn next_superstep(&mut self) -> bool {
        if self.iterations >= self.max_iterations {
            return false;
        }
        self.iterations += 1;
        true
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn mark_converged(&mut self) {
        self.converged = true;
    }

    /// Folds one superstep's averaged training error into the running
    /// window. Every `check_interval` supersteps the window is closed and
    /// compared against the previous one; a window that failed to lower the
    /// error marks the run as converged.
    pub fn record_error(&mut self, error: f64) {
        if self.iterations % self.check_interval == 0 {
            if self.current_window >= self.previous_window {
                self.converged = true;
            }
            self.previous_window = self.current_window;
            self.current_window = 0.0;
        }
        self.current_window += error / self.check_interval as f64;
    }
}
