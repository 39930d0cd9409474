//! The sounding input contract.
//!
//! A `Sounding` is the wire-shaped unit the core accepts from upstream.
//! Positioning/trust decisions already made, projection already applied.
//! Derives `Serialize`/`Deserialize` since this is the crate's one
//! externally-facing data record.

use serde::{Deserialize, Serialize};

/// A single depth measurement at a positioned point, with its associated
/// horizontal and vertical uncertainty. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sounding {
    /// Ground easting, meters, in the grid's projected coordinate system.
    pub east: f64,
    /// Ground northing, meters.
    pub north: f64,
    /// Depth, meters, negative downward.
    pub depth: f64,
    /// 1-sigma horizontal uncertainty, meters.
    pub hz_uncert: f32,
    /// 1-sigma vertical uncertainty, meters.
    pub vt_uncert: f32,
    /// Opaque metadata (beam number, file id, flags, ...) forwarded
    /// verbatim to any downstream dump; unused by the core.
    pub metadata: Option<Vec<u8>>,
}

impl Sounding {
    pub fn new(east: f64, north: f64, depth: f64, hz_uncert: f32, vt_uncert: f32) -> Self {
        Self {
            east,
            north,
            depth,
            hz_uncert,
            vt_uncert,
            metadata: None,
        }
    }

    /// True if this sounding satisfies the input-domain requirements:
    /// finite depth, positive uncertainties. Coordinate range-checking
    /// against a specific grid happens in the propagator, which has the
    /// grid geometry; this check only covers what's knowable from the
    /// sounding alone.
    pub fn is_well_formed(&self) -> bool {
        self.depth.is_finite()
            && self.east.is_finite()
            && self.north.is_finite()
            && self.hz_uncert > 0.0
            && self.hz_uncert.is_finite()
            && self.vt_uncert > 0.0
            && self.vt_uncert.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_sounding_passes() {
        let s = Sounding::new(5.0, 5.0, -20.0, 0.1, 0.5);
        assert!(s.is_well_formed());
    }

    #[test]
    fn non_finite_depth_fails() {
        let s = Sounding::new(5.0, 5.0, f64::NAN, 0.1, 0.5);
        assert!(!s.is_well_formed());
    }

    #[test]
    fn non_positive_uncertainty_fails() {
        let s = Sounding::new(5.0, 5.0, -20.0, 0.0, 0.5);
        assert!(!s.is_well_formed());
    }
}
