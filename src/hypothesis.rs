//! One candidate depth estimate at one node, and the scalar Kalman
//! arithmetic that evolves it.
//!
//! A predict/update split over a scalar depth state: the node tracker is a
//! 1-D random-walk Kalman filter, not a motion model over a vector state.

/// One candidate depth + variance at one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypothesis {
    pub current_mean: f64,
    pub current_variance: f64,
    pub predicted_mean: f64,
    pub predicted_variance: f64,
    pub cumulative_score: f64,
    pub n_updates: u32,
}

impl Hypothesis {
    /// Creates a fresh hypothesis seeded directly from an observation, per
    /// node-tracker step 1 (and the "start a new hypothesis" branches of
    /// steps 3 and 5).
    pub fn seed(observed_depth: f64, observed_variance: f64, weight: f64) -> Self {
        let current_variance = observed_variance / weight;
        Self {
            current_mean: observed_depth,
            current_variance,
            predicted_mean: observed_depth,
            predicted_variance: current_variance,
            cumulative_score: 0.0,
            n_updates: 1,
        }
    }

    /// Predicted innovation `v = observed_depth - predicted_mean` and
    /// innovation variance `S = predicted_variance + observed_variance /
    /// weight`, per node-tracker step 2.
    pub fn innovation(&self, observed_depth: f64, observed_variance: f64, weight: f64) -> (f64, f64) {
        let v = observed_depth - self.predicted_mean;
        let s = self.predicted_variance + observed_variance / weight;
        (v, s)
    }

    /// Normalised squared innovation `d^2 = v^2 / S`, the gating statistic
    /// of node-tracker step 2/3.
    pub fn normalised_squared_innovation(&self, v: f64, s: f64) -> f64 {
        v * v / s
    }

    /// Kalman update of the matched hypothesis (step 4). `v`/`s` are the
    /// innovation and innovation variance already computed via
    /// [`Hypothesis::innovation`] for the winning candidate.
    pub fn kalman_update(&mut self, v: f64, s: f64) {
        let gain = self.predicted_variance / s;
        self.current_mean = self.predicted_mean + gain * v;
        self.current_variance = (1.0 - gain) * self.predicted_variance;
        self.n_updates += 1;
    }

    /// Random-walk prediction step (step 6): `predicted_mean =
    /// current_mean`, `predicted_variance = current_variance + q`.
    pub fn predict(&mut self, process_noise_q: f64) {
        self.predicted_mean = self.current_mean;
        self.predicted_variance = self.current_variance + process_noise_q;
    }
}
