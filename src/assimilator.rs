//! Drives a batch of soundings through the propagator, tile cache, and
//! node tracker.
//!
//! Per-sounding failures are either fatal (bubble immediately) or
//! input-domain (silently counted) rather than returned per-item.

use tracing::{error, info, warn};

use crate::config::CubeParams;
use crate::error::CubeError;
use crate::grid::Grid;
use crate::node::NodeTracker;
use crate::propagator::FootprintPropagator;
use crate::sounding::Sounding;
use crate::tile_cache::TileCache;

/// Outcome of one [`Assimilator::assimilate`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssimilateReport {
    /// Soundings that produced at least one node update.
    pub n_assimilated: usize,
    /// Soundings skipped for input-domain reasons (non-finite depth,
    /// non-positive uncertainty, or a footprint entirely outside the
    /// grid). Never raised as an error, only counted.
    pub n_skipped_input_domain: usize,
    /// Total node-update operations performed across the whole batch.
    pub n_node_updates: usize,
}

/// Drives batches of soundings into a [`TileCache`] via the propagator and
/// node tracker.
pub struct Assimilator;

impl Assimilator {
    /// Processes `batch` in order against `grid`/`cache`. Per-sounding
    /// order is preserved for any single node (required for deterministic
    /// change-point detection); soundings that don't share a node may be
    /// interleaved freely by an implementation, but this one simply
    /// processes the batch sequentially, which trivially preserves order
    /// everywhere.
    ///
    /// On the first fatal error (I/O or allocation failure from the tile
    /// cache), flushes the cache so partial progress is durable, then
    /// returns the error.
    pub fn assimilate(
        grid: &Grid,
        cache: &mut TileCache,
        params: &CubeParams,
        batch: &[Sounding],
    ) -> Result<AssimilateReport, CubeError> {
        let mut report = AssimilateReport::default();

        for sounding in batch {
            if !sounding.is_well_formed() {
                report.n_skipped_input_domain += 1;
                continue;
            }

            let updates = FootprintPropagator::propagate(grid, sounding, params);
            if updates.is_empty() {
                // Entirely outside the grid. Silent, but still an input
                // the core could not use.
                report.n_skipped_input_domain += 1;
                continue;
            }

            for update in &updates {
                let node = match cache.get_node_mut(update.row, update.col) {
                    Ok(node) => node,
                    Err(e) => {
                        error!(error = %e, "fatal error acquiring node for write, flushing cache");
                        let _ = cache.flush();
                        return Err(e);
                    }
                };
                NodeTracker::update(
                    node,
                    update.observed_depth,
                    update.observed_variance,
                    update.weight,
                    params,
                );
                report.n_node_updates += 1;
            }
            report.n_assimilated += 1;
        }

        if let Err(e) = cache.flush() {
            error!(error = %e, "fatal error flushing cache at end of batch");
            return Err(e);
        }

        if report.n_skipped_input_domain > 0 {
            warn!(
                n_skipped = report.n_skipped_input_domain,
                "skipped input-domain-invalid soundings this batch"
            );
        }
        info!(
            n_assimilated = report.n_assimilated,
            n_skipped = report.n_skipped_input_domain,
            n_node_updates = report.n_node_updates,
            "batch assimilation complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GridConfig;

    fn fresh_cache(dir: &std::path::Path, rows: usize, cols: usize) -> (Grid, TileCache) {
        let config = GridConfig {
            rows,
            cols,
            node_spacing: 1.0,
            tile_side: 16,
            cache_capacity_tiles: 8,
            backing_store_dir: dir.to_path_buf(),
            ..GridConfig::default()
        };
        let grid = Grid::new(&config).unwrap();
        let cache = TileCache::new(&config).unwrap();
        (grid, cache)
    }

    #[test]
    fn single_sounding_identity() {
        let dir = tempfile::tempdir().unwrap();
        let (grid, mut cache) = fresh_cache(dir.path(), 10, 10);
        let params = CubeParams::default();

        let batch = vec![Sounding::new(5.0, 5.0, -20.0, 0.1, 0.5)];
        let report = Assimilator::assimilate(&grid, &mut cache, &params, &batch).unwrap();

        assert_eq!(report.n_assimilated, 1);
        assert_eq!(report.n_skipped_input_domain, 0);

        let node = cache.get_node(5, 5).unwrap();
        assert_eq!(node.hypotheses.len(), 1);
        assert_eq!(node.hypotheses[0].current_mean, -20.0);
    }

    #[test]
    fn input_domain_errors_are_counted_not_raised() {
        let dir = tempfile::tempdir().unwrap();
        let (grid, mut cache) = fresh_cache(dir.path(), 10, 10);
        let params = CubeParams::default();

        let batch = vec![
            Sounding::new(5.0, 5.0, -20.0, 0.1, 0.5),
            Sounding::new(5.0, 5.0, f64::NAN, 0.1, 0.5),
            Sounding::new(-1000.0, -1000.0, -20.0, 0.1, 0.5),
        ];
        let report = Assimilator::assimilate(&grid, &mut cache, &params, &batch).unwrap();

        assert_eq!(report.n_assimilated, 1);
        assert_eq!(report.n_skipped_input_domain, 2);
    }

    #[test]
    fn order_independence_across_disjoint_nodes() {
        let dir_a = tempfile::tempdir().unwrap();
        let dir_b = tempfile::tempdir().unwrap();
        let (grid_a, mut cache_a) = fresh_cache(dir_a.path(), 20, 20);
        let (grid_b, mut cache_b) = fresh_cache(dir_b.path(), 20, 20);
        let params = CubeParams::default();

        let batch_forward = vec![
            Sounding::new(1.0, 1.0, -10.0, 0.1, 0.5),
            Sounding::new(15.0, 15.0, -30.0, 0.1, 0.5),
        ];
        let batch_reversed = vec![batch_forward[1].clone(), batch_forward[0].clone()];

        Assimilator::assimilate(&grid_a, &mut cache_a, &params, &batch_forward).unwrap();
        Assimilator::assimilate(&grid_b, &mut cache_b, &params, &batch_reversed).unwrap();

        let node_a1 = cache_a.get_node(1, 1).unwrap();
        let node_b1 = cache_b.get_node(1, 1).unwrap();
        assert_eq!(node_a1.hypotheses[0].current_mean, node_b1.hypotheses[0].current_mean);

        let node_a2 = cache_a.get_node(15, 15).unwrap();
        let node_b2 = cache_b.get_node(15, 15).unwrap();
        assert_eq!(node_a2.hypotheses[0].current_mean, node_b2.hypotheses[0].current_mean);
    }
}
