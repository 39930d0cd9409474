//! Reduces each node's hypothesis set to one value at readback time, and
//! renders the four output surfaces.
//!
//! The scoring-and-ranking shape is the same across all four policies:
//! compute a per-candidate score, pick the max, then report a strength by
//! normalising the winner against the full candidate set.

use crate::config::{CubeParams, DisambiguationPolicy};
use crate::node::Node;
use crate::sentinel::{COUNT_NODATA, DEPTH_NODATA};
use crate::tile_cache::TileCache;

const CONFIDENCE_Z: f64 = 1.96;

/// Which rectangular surface to render at readback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Depth,
    Uncertainty,
    HypothesisCount,
    HypothesisStrength,
}

/// The four readback values for one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeReadback {
    pub depth: f32,
    pub uncertainty: f32,
    pub n_hypotheses: u32,
    pub hypothesis_strength: f32,
}

impl NodeReadback {
    fn no_data() -> Self {
        Self {
            depth: DEPTH_NODATA,
            uncertainty: DEPTH_NODATA,
            n_hypotheses: COUNT_NODATA,
            hypothesis_strength: DEPTH_NODATA,
        }
    }
}

/// Per-hypothesis posterior-style score `n_updates / current_variance`,
/// used both by the Posterior policy and by the hypothesis_strength
/// surface (which is defined independently of which policy chose the
/// winner).
fn posterior_score(node: &Node, index: usize) -> f64 {
    let h = &node.hypotheses[index];
    h.n_updates as f64 / h.current_variance
}

fn prior_weight(node: &Node, index: usize, prior_variance: f64) -> f64 {
    let h = &node.hypotheses[index];
    match node.nominal_depth {
        Some(nominal) => {
            let d = h.current_mean - nominal;
            (-(d * d) / (2.0 * prior_variance)).exp()
        }
        None => 1.0,
    }
}

/// Selects the winning hypothesis index for `node` under `policy`, or
/// `None` if `node` has never been touched. Ties break on insertion order
/// (lower index wins): iterating forward and requiring a *strict*
/// improvement to replace the incumbent gives exactly that behaviour.
pub fn select_hypothesis(node: &Node, params: &CubeParams) -> Option<usize> {
    if node.hypotheses.is_empty() {
        return None;
    }

    let score = |i: usize| -> f64 {
        match params.disambiguation_policy {
            DisambiguationPolicy::PriorProximity => {
                let h = &node.hypotheses[i];
                let nominal = node.nominal_depth.unwrap_or(h.current_mean);
                // Smaller distance is better; negate so "larger score wins"
                // holds uniformly across policies.
                -(h.current_mean - nominal).abs()
            }
            DisambiguationPolicy::Likelihood => node.hypotheses[i].n_updates as f64,
            DisambiguationPolicy::Posterior => posterior_score(node, i),
            DisambiguationPolicy::PriorWeightedPosterior => {
                posterior_score(node, i) * prior_weight(node, i, params.prior_variance)
            }
        }
    };

    let mut best_index = 0usize;
    let mut best_score = score(0);
    for i in 1..node.hypotheses.len() {
        let s = score(i);
        if s > best_score {
            best_score = s;
            best_index = i;
        }
    }
    Some(best_index)
}

/// Produces the full readback tuple for one node.
pub fn readback_node(node: &Node, params: &CubeParams) -> NodeReadback {
    let Some(winner) = select_hypothesis(node, params) else {
        return NodeReadback::no_data();
    };

    let h = &node.hypotheses[winner];
    let depth = h.current_mean as f32;
    let uncertainty = (CONFIDENCE_Z * h.current_variance.sqrt()) as f32;
    let n_hypotheses = node.hypotheses.len() as u32;

    let winner_posterior = posterior_score(node, winner);
    let total_posterior: f64 = (0..node.hypotheses.len()).map(|i| posterior_score(node, i)).sum();
    let hypothesis_strength = if total_posterior > 0.0 {
        (winner_posterior / total_posterior) as f32
    } else {
        0.0
    };

    NodeReadback {
        depth,
        uncertainty,
        n_hypotheses,
        hypothesis_strength,
    }
}

/// Renders one requested surface over the whole grid, row-major, reading
/// (not writing) every node. This necessarily touches every tile at least
/// once, which may itself drive eviction traffic on a grid much larger
/// than the cache.
pub fn read_surface(cache: &mut TileCache, surface: Surface, params: &CubeParams) -> Vec<f32> {
    let rows = cache.rows();
    let cols = cache.cols();
    let mut out = Vec::with_capacity(rows * cols);

    for row in 0..rows {
        for col in 0..cols {
            let node = cache.get_node(row, col).expect("read_surface row/col in range");
            let readback = readback_node(node, params);
            let value = match surface {
                Surface::Depth => readback.depth,
                Surface::Uncertainty => readback.uncertainty,
                Surface::HypothesisCount => readback.n_hypotheses as f32,
                Surface::HypothesisStrength => readback.hypothesis_strength,
            };
            out.push(value);
        }
    }
    out
}
