//! Per-node hypothesis set, monitor queue, and the update algorithm that
//! evolves them.
//!
//! Association follows a gate-then-fuse shape: find the closest candidate
//! by normalised squared innovation, gate it against a match threshold,
//! then fuse the observation into the winner in place. Augmented with a
//! CUSUM-based intervention detector over a per-node monitor queue.

use std::collections::VecDeque;

use crate::config::CubeParams;
use crate::hypothesis::Hypothesis;

/// The estimation state at one grid intersection.
#[derive(Debug, Clone, Default)]
pub struct Node {
    pub hypotheses: Vec<Hypothesis>,
    monitor_queue: VecDeque<f64>,
    cusum_state: f64,
    pub nominal_depth: Option<f64>,
}

impl Node {
    pub fn new() -> Self {
        Self::default()
    }

    /// True iff this node has ever been updated (invariant: non-empty
    /// `hypotheses` iff touched).
    pub fn is_touched(&self) -> bool {
        !self.hypotheses.is_empty()
    }

    fn push_residual(&mut self, e: f64, params: &CubeParams) -> f64 {
        if self.monitor_queue.len() >= params.monitor_queue_len {
            self.monitor_queue.pop_front();
        }
        self.monitor_queue.push_back(e);

        // c_t = max(0, c_{t-1} + e_t - delta); cumulative score is the
        // running max of |c_t| over the queue's lifetime.
        self.cusum_state = (self.cusum_state + e - params.delta).max(0.0);
        self.cusum_state.abs()
    }

    fn reset_monitor(&mut self) {
        self.monitor_queue.clear();
        self.cusum_state = 0.0;
    }

    #[cfg(test)]
    pub(crate) fn monitor_queue_len(&self) -> usize {
        self.monitor_queue.len()
    }

    /// Oldest-first snapshot of the monitor queue, for persistence.
    pub fn monitor_queue_snapshot(&self) -> Vec<f64> {
        self.monitor_queue.iter().copied().collect()
    }

    /// The running CUSUM statistic, for persistence. Accumulates across
    /// every update since the last intervention reset, not just the entries
    /// currently held in the monitor queue.
    pub fn cusum_state(&self) -> f64 {
        self.cusum_state
    }

    /// Rebuilds a `Node` from persisted hypotheses, a persisted oldest-first
    /// monitor queue, and the persisted CUSUM statistic.
    pub fn restore(hypotheses: Vec<Hypothesis>, queue: VecDeque<f64>, cusum_state: f64) -> Self {
        Self {
            hypotheses,
            monitor_queue: queue,
            cusum_state,
            nominal_depth: None,
        }
    }
}

/// Stateless driver for [`Node::update`].
pub struct NodeTracker;

impl NodeTracker {
    /// No error return: a hypothesis allocation failure is a fatal
    /// condition handled by the caller (the assimilator), not by this
    /// function returning `Result`.
    pub fn update(
        node: &mut Node,
        observed_depth: f64,
        observed_variance: f64,
        weight: f64,
        params: &CubeParams,
    ) {
        debug_assert!(weight > 0.0 && weight <= 1.0);

        // Step 1: no existing hypotheses -> seed the first one.
        if node.hypotheses.is_empty() {
            node.hypotheses
                .push(Hypothesis::seed(observed_depth, observed_variance, weight));
            return;
        }

        // Step 2/3: find the best-matching hypothesis by normalised squared
        // innovation. Ties break on insertion order (lower index wins):
        // a strict `<` comparison keeps the first minimum seen, and the
        // vector is iterated in insertion order.
        let mut best_index = 0usize;
        let mut best_d2 = f64::INFINITY;
        let mut best_v = 0.0;
        let mut best_s = 0.0;
        for (i, h) in node.hypotheses.iter().enumerate() {
            let (v, s) = h.innovation(observed_depth, observed_variance, weight);
            let d2 = h.normalised_squared_innovation(v, s);
            if d2 < best_d2 {
                best_d2 = d2;
                best_index = i;
                best_v = v;
                best_s = s;
            }
        }

        if best_d2 > params.t_match * params.t_match {
            node.hypotheses
                .push(Hypothesis::seed(observed_depth, observed_variance, weight));
            return;
        }

        // Step 4: Kalman update of the matched hypothesis.
        node.hypotheses[best_index].kalman_update(best_v, best_s);

        // Step 5: intervention (change-point) detection over the monitor
        // queue. `e` is the *signed* normalised innovation, computed before
        // the Kalman update overwrote `current_mean`. `best_v`/`best_s`
        // are exactly the pre-update innovation/innovation-variance.
        let e = best_v / best_s.sqrt();
        let cumulative_score = node.push_residual(e, params);
        node.hypotheses[best_index].cumulative_score = cumulative_score;

        if cumulative_score > params.t_intervention {
            // The matched hypothesis is frozen (left in place, untouched
            // further this update) and a new hypothesis is created from
            // the observation that triggered the change-point.
            node.hypotheses
                .push(Hypothesis::seed(observed_depth, observed_variance, weight));
            node.reset_monitor();
            return;
        }

        // Step 6: random-walk prediction for next time.
        node.hypotheses[best_index].predict(params.process_noise_q);
    }
}
