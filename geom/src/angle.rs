use std::{f64, fmt};

use serde::{Deserialize, Serialize};

/// An angle, stored in radians.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Angle(f64);

impl Angle {
    pub const ZERO: Angle = Angle(0.0);

    pub(crate) fn new_rads(rads: f64) -> Angle {
        // Retain more precision for angles than distances
        Angle((rads * 10_000_000.0).round() / 10_000_000.0)
    }

    /// Create an angle in degrees.
    pub fn degrees(degs: f64) -> Angle {
        Angle::new_rads(degs.to_radians())
    }

    /// Returns the angle rotated by some degrees.
    pub fn rotate_degs(self, degrees: f64) -> Angle {
        Angle::new_rads(self.0 + degrees.to_radians())
    }

    /// Returns the angle pointing the opposite direction.
    pub fn opposite(self) -> Angle {
        Angle::new_rads(self.0 + f64::consts::PI)
    }

    /// Returns the angle in the range [0, 2pi).
    pub fn normalized_radians(self) -> f64 {
        if self.0 < 0.0 {
            // TODO Be more careful about how we store the angle. I think this breaks if
            // the angle below -2pi
            self.0 + (2.0 * f64::consts::PI)
        } else if self.0 >= 2.0 * f64::consts::PI {
            self.0 - (2.0 * f64::consts::PI)
        } else {
            self.0
        }
    }

    /// Returns the angle in the range [0, 360).
    pub fn normalized_degrees(self) -> f64 {
        self.normalized_radians().to_degrees()
    }

    /// The absolute difference between two angles, in degrees, in the range [0, 180].
    pub fn approx_diff_degrees(self, other: Angle) -> f64 {
        let raw = (self.normalized_degrees() - other.normalized_degrees()).abs();
        if raw > 180.0 {
            360.0 - raw
        } else {
            raw
        }
    }

    /// True if the two angles are within some degrees of each other, accounting for wraparound.
    pub fn approx_eq(self, other: Angle, within_degrees: f64) -> bool {
        self.approx_diff_degrees(other) < within_degrees
    }
}

impl fmt::Display for Angle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Angle({} degrees)", self.normalized_degrees())
    }
}
