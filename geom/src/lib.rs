//! 2D geometry for world-space maps: points, polylines with offsetting, rings, polygons with
//! earcut triangulation. Everything is in meters, with y growing south (screen-style), so that
//! geographic north is up after projection.

#[macro_use]
extern crate anyhow;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub use crate::angle::Angle;
pub use crate::bounds::{Bounds, GPSBounds};
pub use crate::distance::Distance;
pub use crate::gps::LonLat;
pub use crate::line::{line_intersection, Line};
pub use crate::polygon::Polygon;
pub use crate::polyline::{OffsetChain, PolyLine};
pub use crate::pt::{HashablePt2D, Pt2D};
pub use crate::ring::Ring;
pub use crate::tessellation::{downsize, Tessellation, Triangle};

mod angle;
mod bounds;
mod distance;
mod gps;
mod line;
mod polygon;
mod polyline;
mod pt;
mod ring;
mod tessellation;

/// Two coordinates closer than this are considered the same position.
pub const EPSILON_DIST: Distance = Distance::const_meters(0.0001);

/// Reduce the precision of an f64. This helps ensure serialization is idempotent (everything is
/// exactly equal before and after saving/loading).
pub fn trim_f64(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}

pub fn serialize_f64<S: Serializer>(x: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(*x)
}

pub fn deserialize_f64<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
    <f64>::deserialize(d)
}
