//! Translates one sounding into a weighted set of per-node updates.
//!
//! The geometry (planar distance, Gaussian distance weighting) uses
//! `nalgebra::Vector2`.

use nalgebra::Vector2;

use crate::config::CubeParams;
use crate::grid::Grid;
use crate::sounding::Sounding;

/// One weighted contribution of a sounding to one node, ready to be handed
/// to [`crate::node::NodeTracker::update`].
#[derive(Debug, Clone, PartialEq)]
pub struct NodeUpdate {
    pub row: usize,
    pub col: usize,
    pub weight: f64,
    pub observed_depth: f64,
    pub observed_variance: f64,
}

/// Converts soundings into node updates via an elliptical-footprint
/// weighting scheme.
pub struct FootprintPropagator;

impl FootprintPropagator {
    /// Returns the node updates for `sounding` against `grid`, or an empty
    /// vector if the footprint lies entirely outside the grid (silent).
    /// Caller is responsible for having already validated
    /// `sounding.is_well_formed()`; this function assumes a well-formed
    /// input.
    pub fn propagate(grid: &Grid, sounding: &Sounding, params: &CubeParams) -> Vec<NodeUpdate> {
        let radius = params.footprint_k * sounding.hz_uncert as f64;
        let center = Vector2::new(sounding.east, sounding.north);

        let (center_row, center_col) = grid.ground_to_index(sounding.east, sounding.north);
        let cell_radius = (radius / grid.node_spacing()).ceil() as i64;

        let row_lo = (center_row.floor() as i64 - cell_radius).max(0);
        let row_hi = (center_row.ceil() as i64 + cell_radius).min(grid.rows() as i64 - 1);
        let col_lo = (center_col.floor() as i64 - cell_radius).max(0);
        let col_hi = (center_col.ceil() as i64 + cell_radius).min(grid.cols() as i64 - 1);

        if row_lo > row_hi || col_lo > col_hi {
            return Vec::new();
        }

        // First pass: collect raw (unnormalised) weights for every node
        // inside both the grid and the footprint radius.
        let mut candidates: Vec<(usize, usize, f64, f64)> = Vec::new(); // (row, col, r, raw_weight)
        for row in row_lo..=row_hi {
            for col in col_lo..=col_hi {
                let Some((east, north)) = grid.node_at(row, col) else {
                    continue;
                };
                let r = (Vector2::new(east, north) - center).norm();
                if r > radius {
                    continue;
                }
                let raw_weight = (-(r * r) / (2.0 * (sounding.hz_uncert as f64).powi(2))).exp();
                candidates.push((row as usize, col as usize, r, raw_weight));
            }
        }

        let weight_sum: f64 = candidates.iter().map(|(_, _, _, w)| w).sum();
        if weight_sum <= 0.0 {
            return Vec::new();
        }

        candidates
            .into_iter()
            .map(|(row, col, r, raw_weight)| {
                let weight = raw_weight / weight_sum;
                let observed_variance =
                    (sounding.vt_uncert as f64).powi(2) + (r * params.slope).powi(2);
                NodeUpdate {
                    row,
                    col,
                    weight,
                    observed_depth: sounding.depth,
                    observed_variance,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;

    fn grid_10x10() -> Grid {
        Grid::new(&GridConfig {
            rows: 10,
            cols: 10,
            node_spacing: 1.0,
            ..GridConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn single_node_footprint_gets_weight_one() {
        let grid = grid_10x10();
        let sounding = Sounding::new(5.0, 5.0, -20.0, 0.1, 0.5);
        let params = CubeParams::default();
        let updates = FootprintPropagator::propagate(&grid, &sounding, &params);

        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].row, 5);
        assert_eq!(updates[0].col, 5);
        assert!((updates[0].weight - 1.0).abs() < 1e-12);
        assert_eq!(updates[0].observed_depth, -20.0);
    }

    #[test]
    fn weights_sum_to_one_for_a_fully_interior_footprint() {
        let grid = Grid::new(&GridConfig {
            rows: 100,
            cols: 100,
            node_spacing: 1.0,
            ..GridConfig::default()
        })
        .unwrap();
        let sounding = Sounding::new(50.0, 50.0, -20.0, 2.5, 0.5);
        let params = CubeParams::default();
        let updates = FootprintPropagator::propagate(&grid, &sounding, &params);

        let sum: f64 = updates.iter().map(|u| u.weight).sum();
        assert!((sum - 1.0).abs() < 1e-9, "weights summed to {sum}");
        // k = 2.5, radius = 6.25m: exactly 121 integer-offset grid points
        // satisfy dx^2 + dy^2 <= 6.25^2 (verified by direct enumeration).
        assert_eq!(updates.len(), 121);
    }

    #[test]
    fn footprint_entirely_outside_grid_emits_nothing() {
        let grid = grid_10x10();
        let sounding = Sounding::new(-500.0, -500.0, -20.0, 0.1, 0.5);
        let params = CubeParams::default();
        let updates = FootprintPropagator::propagate(&grid, &sounding, &params);
        assert!(updates.is_empty());
    }
}
