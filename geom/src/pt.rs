use std::fmt;

use ordered_float::NotNan;
use serde::{Deserialize, Serialize};

use crate::{deserialize_f64, serialize_f64, trim_f64, Angle, Distance};

/// This represents world-space in meters.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Pt2D {
    #[serde(serialize_with = "serialize_f64", deserialize_with = "deserialize_f64")]
    x: f64,
    #[serde(serialize_with = "serialize_f64", deserialize_with = "deserialize_f64")]
    y: f64,
}

impl Pt2D {
    pub fn new(x: f64, y: f64) -> Pt2D {
        if !x.is_finite() || !y.is_finite() {
            panic!("Bad Pt2D {}, {}", x, y);
        }

        // Trim to fixed precision, so that equality is meaningful and serialization idempotent.
        Pt2D {
            x: trim_f64(x),
            y: trim_f64(y),
        }
    }

    pub fn x(self) -> f64 {
        self.x
    }

    pub fn y(self) -> f64 {
        self.y
    }

    pub fn dist_to(self, to: Pt2D) -> Distance {
        Distance::meters(((self.x - to.x).powi(2) + (self.y - to.y).powi(2)).sqrt())
    }

    pub fn angle_to(self, to: Pt2D) -> Angle {
        // DON'T invert y here
        Angle::new_rads((to.y - self.y).atan2(to.x - self.x))
    }

    /// The point at some distance along the given angle from this one.
    pub fn project_away(self, dist: Distance, theta: Angle) -> Pt2D {
        let (sin, cos) = theta.normalized_radians().sin_cos();
        Pt2D::new(
            self.x + dist.inner_meters() * cos,
            self.y + dist.inner_meters() * sin,
        )
    }

    pub fn offset(self, dx: f64, dy: f64) -> Pt2D {
        Pt2D::new(self.x + dx, self.y + dy)
    }

    /// The average of some points.
    pub fn center(pts: &[Pt2D]) -> Pt2D {
        if pts.is_empty() {
            panic!("Can't find center of 0 points");
        }
        let mut x = 0.0;
        let mut y = 0.0;
        for pt in pts {
            x += pt.x;
            y += pt.y;
        }
        let len = pts.len() as f64;
        Pt2D::new(x / len, y / len)
    }

    pub fn approx_eq(self, other: Pt2D, threshold: Distance) -> bool {
        self.dist_to(other) <= threshold
    }

    pub fn to_hashable(self) -> HashablePt2D {
        HashablePt2D {
            x_nan: NotNan::new(self.x).unwrap(),
            y_nan: NotNan::new(self.y).unwrap(),
        }
    }
}

impl fmt::Display for Pt2D {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Pt2D({0}, {1})", self.x(), self.y())
    }
}

impl From<Pt2D> for geo::Point {
    fn from(pt: Pt2D) -> Self {
        geo::Point::new(pt.x(), pt.y())
    }
}

impl From<Pt2D> for geo::Coordinate {
    fn from(pt: Pt2D) -> Self {
        geo::Coordinate {
            x: pt.x(),
            y: pt.y(),
        }
    }
}

/// This represents world space, NOT LonLat.
// TODO So rename it HashablePair or something
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HashablePt2D {
    x_nan: NotNan<f64>,
    y_nan: NotNan<f64>,
}

impl HashablePt2D {
    pub fn to_pt2d(self) -> Pt2D {
        Pt2D::new(self.x_nan.into_inner(), self.y_nan.into_inner())
    }
}

impl From<Pt2D> for HashablePt2D {
    fn from(pt: Pt2D) -> Self {
        pt.to_hashable()
    }
}
