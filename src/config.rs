//! Grid configuration and tunable algorithm parameters.
//!
//! Plain `Debug + Clone` structs with a `Default` impl and explicit
//! validation rather than panicking on bad input. Per-survey parameter
//! file parsing is an external collaborator's job, not this crate's.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::CubeError;

/// One-time grid geometry and storage descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridConfig {
    /// Ground easting of node (0, 0), meters.
    pub origin_east: f64,
    /// Ground northing of node (0, 0), meters.
    pub origin_north: f64,
    /// Node spacing, meters, equal in both axes.
    pub node_spacing: f64,
    /// Number of grid rows.
    pub rows: usize,
    /// Number of grid columns.
    pub cols: usize,
    /// Tile side length in nodes. Must be a power of two.
    pub tile_side: usize,
    /// Maximum number of resident tiles the cache may hold at once.
    pub cache_capacity_tiles: usize,
    /// Directory backing persisted tiles.
    pub backing_store_dir: PathBuf,
}

impl GridConfig {
    /// Checks the configuration-error conditions: non-positive spacing,
    /// tile size not a power of two, empty extents, zero cache capacity.
    /// Called by [`crate::grid::Grid::new`] before any grid state is built.
    pub fn validate(&self) -> Result<(), CubeError> {
        if self.node_spacing <= 0.0 || !self.node_spacing.is_finite() {
            return Err(CubeError::Configuration(format!(
                "node_spacing must be positive and finite, got {}",
                self.node_spacing
            )));
        }
        if self.rows == 0 || self.cols == 0 {
            return Err(CubeError::Configuration(
                "grid extents (rows, cols) must be non-zero".to_string(),
            ));
        }
        if self.tile_side == 0 || !self.tile_side.is_power_of_two() {
            return Err(CubeError::Configuration(format!(
                "tile_side must be a power of two, got {}",
                self.tile_side
            )));
        }
        if self.cache_capacity_tiles == 0 {
            return Err(CubeError::Configuration(
                "cache_capacity_tiles must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            origin_east: 0.0,
            origin_north: 0.0,
            node_spacing: 1.0,
            rows: 256,
            cols: 256,
            tile_side: 256,
            cache_capacity_tiles: 16,
            backing_store_dir: PathBuf::from("./cube_store"),
        }
    }
}

/// Which hypothesis readback policy to apply at disambiguation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisambiguationPolicy {
    /// Closest `current_mean` to the node's `nominal_depth`.
    PriorProximity,
    /// Largest `n_updates`.
    Likelihood,
    /// Largest `n_updates / current_variance`.
    Posterior,
    /// Posterior weighted by a Gaussian prior centred on `nominal_depth`.
    PriorWeightedPosterior,
}

impl Default for DisambiguationPolicy {
    fn default() -> Self {
        DisambiguationPolicy::Posterior
    }
}

/// Tunable parameters of the node tracker and footprint propagator.
///
/// None of these are compile-time constants; they are explicit runtime
/// configuration (see DESIGN.md for the rationale).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CubeParams {
    /// Mahalanobis-distance match threshold (squared-innovation gate is
    /// compared against `t_match * t_match`).
    pub t_match: f64,
    /// Intervention (change-point) threshold on the CUSUM statistic.
    pub t_intervention: f64,
    /// CUSUM bias term.
    pub delta: f64,
    /// Footprint radius multiplier (`R = k * hz_uncert`).
    pub footprint_k: f64,
    /// Assumed local slope used to inflate observed variance with distance.
    pub slope: f64,
    /// Process noise added to predicted variance each step.
    pub process_noise_q: f64,
    /// Monitor queue length (K).
    pub monitor_queue_len: usize,
    /// Readback disambiguation policy.
    pub disambiguation_policy: DisambiguationPolicy,
    /// Prior variance for the prior-weighted-posterior policy.
    pub prior_variance: f64,
}

impl Default for CubeParams {
    fn default() -> Self {
        Self {
            t_match: 2.0,
            t_intervention: 3.0,
            delta: 0.5,
            footprint_k: 2.5,
            slope: 0.01,
            process_noise_q: 0.0,
            monitor_queue_len: 5,
            disambiguation_policy: DisambiguationPolicy::default(),
            prior_variance: 4.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        assert!(GridConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_non_positive_spacing() {
        let mut cfg = GridConfig::default();
        cfg.node_spacing = 0.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_non_power_of_two_tile_side() {
        let mut cfg = GridConfig::default();
        cfg.tile_side = 200;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_empty_extents() {
        let mut cfg = GridConfig::default();
        cfg.rows = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_zero_cache_capacity() {
        let mut cfg = GridConfig::default();
        cfg.cache_capacity_tiles = 0;
        assert!(cfg.validate().is_err());
    }
}
