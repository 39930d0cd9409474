//! Global grid geometry: pure ground-coordinate <-> node-index conversion.
//!
//! No mutable state, no I/O. The leaf of the module dependency order.
//! Coordinate projection itself (geodetic to the projected east/north plane
//! this grid operates in) is an external collaborator's job; the grid only
//! ever sees meters in a single projected plane.

use crate::config::GridConfig;
use crate::error::CubeError;

/// Global grid geometry, immutable after construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    rows: usize,
    cols: usize,
    node_spacing: f64,
    origin_east: f64,
    origin_north: f64,
}

impl Grid {
    /// Validates `config` and builds the grid geometry. Returns a
    /// [`CubeError::Configuration`] for non-positive spacing, a
    /// non-power-of-two tile size, or empty extents. No grid is
    /// constructed on error.
    pub fn new(config: &GridConfig) -> Result<Self, CubeError> {
        config.validate()?;
        Ok(Self {
            rows: config.rows,
            cols: config.cols,
            node_spacing: config.node_spacing,
            origin_east: config.origin_east,
            origin_north: config.origin_north,
        })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn node_spacing(&self) -> f64 {
        self.node_spacing
    }

    /// True if `(row, col)` is a valid node index in this grid.
    #[inline]
    pub fn contains(&self, row: i64, col: i64) -> bool {
        row >= 0 && col >= 0 && (row as usize) < self.rows && (col as usize) < self.cols
    }

    /// Ground position of node `(row, col)`, or `None` if out of range.
    pub fn node_at(&self, row: i64, col: i64) -> Option<(f64, f64)> {
        if !self.contains(row, col) {
            return None;
        }
        let east = self.origin_east + col as f64 * self.node_spacing;
        let north = self.origin_north + row as f64 * self.node_spacing;
        Some((east, north))
    }

    /// Converts a ground position to fractional (row, col) grid
    /// coordinates. The caller rounds/enumerates as needed (see
    /// `propagator::footprint_nodes`); this is the exact inverse of
    /// [`Grid::node_at`] up to floating point round-trip.
    pub fn ground_to_index(&self, east: f64, north: f64) -> (f64, f64) {
        let col = (east - self.origin_east) / self.node_spacing;
        let row = (north - self.origin_north) / self.node_spacing;
        (row, col)
    }
}
