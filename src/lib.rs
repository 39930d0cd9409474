//! CUBE (Combined Uncertainty and Bathymetry Estimator) core
//!
//! Fuses irregularly located, uncertainty-bearing sonar soundings into a
//! regular grid of depth estimates via per-node competing Kalman-style
//! hypotheses, with change-point detection and multi-policy readback
//! disambiguation. Four tightly-coupled subsystems:
//!
//! 1. **Node tracker** ([`node`]): per-node hypothesis list, Kalman
//!    update, intervention (change-point) detection, monitoring queue.
//! 2. **Propagation layer** ([`propagator`]): maps a sounding's
//!    uncertainty footprint onto a weighted set of grid-node updates.
//! 3. **Tiled container** ([`tile`], [`tile_cache`], [`backing_store`]):
//!    a disk-backed, bounded-RAM grid of nodes.
//! 4. **Readback / disambiguation layer** ([`disambiguator`]): collapses
//!    the multi-hypothesis state to one depth surface at read time.
//!
//! Command-line front-ends, navigation/positioning pre-processing,
//! external grid output formats, per-survey parameter file parsing, and
//! coordinate projection are external collaborators, not part of this
//! crate.

pub mod assimilator;
pub mod backing_store;
pub mod config;
pub mod disambiguator;
pub mod error;
pub mod grid;
pub mod hypothesis;
pub mod node;
pub mod propagator;
pub mod sentinel;
pub mod sounding;
pub mod tile;
pub mod tile_cache;

pub use assimilator::{Assimilator, AssimilateReport};
pub use config::{CubeParams, DisambiguationPolicy, GridConfig};
pub use disambiguator::{NodeReadback, Surface};
pub use error::CubeError;
pub use grid::Grid;
pub use sounding::Sounding;
pub use tile_cache::TileCache;

/// Facade over the four operations an external wrapper (CLI, batch
/// importer, ...) needs: construct-grid, assimilate-batch, read-surface,
/// finalise.
pub struct CubeGrid {
    grid: Grid,
    cache: TileCache,
    params: CubeParams,
}

impl CubeGrid {
    /// `construct-grid`: validates `config`, creates (or truncates) the
    /// backing store, and builds a fresh, empty grid. Returns a
    /// [`CubeError::Configuration`] without creating anything if `config`
    /// is invalid.
    pub fn new(config: &GridConfig, params: CubeParams) -> Result<Self, CubeError> {
        let grid = Grid::new(config)?;
        let cache = TileCache::new(config)?;
        Ok(Self { grid, cache, params })
    }

    /// Reopens a grid whose backing store already holds a prior
    /// [`CubeGrid::finalise`]'d state, resuming from disk rather than
    /// starting empty.
    pub fn reopen(config: &GridConfig, params: CubeParams) -> Result<Self, CubeError> {
        let grid = Grid::new(config)?;
        let cache = TileCache::reopen(config)?;
        Ok(Self { grid, cache, params })
    }

    /// `assimilate-batch`: processes `batch` in order, honouring the
    /// tile cache, and returns input-domain-skip counters alongside the
    /// assimilated count.
    pub fn assimilate(&mut self, batch: &[Sounding]) -> Result<AssimilateReport, CubeError> {
        Assimilator::assimilate(&self.grid, &mut self.cache, &self.params, batch)
    }

    /// `read-surface`: renders one requested surface over the whole grid,
    /// row-major, `rows() * cols()` long.
    pub fn read_surface(&mut self, surface: Surface) -> Vec<f32> {
        disambiguator::read_surface(&mut self.cache, surface, &self.params)
    }

    /// `finalise`: flush plus closing the backing store. Consumes `self`;
    /// no further operations are possible without [`CubeGrid::reopen`].
    pub fn finalise(self) -> Result<(), CubeError> {
        self.cache.finalise()
    }

    pub fn rows(&self) -> usize {
        self.grid.rows()
    }

    pub fn cols(&self) -> usize {
        self.grid.cols()
    }

    pub fn params(&self) -> &CubeParams {
        &self.params
    }
}
