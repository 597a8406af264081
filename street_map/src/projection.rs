//! Flattens geodetic coordinates into a local planar frame.

use serde::{Deserialize, Serialize};

use geom::{LonLat, Pt2D};

/// Meters per degree of latitude, from the Earth's equatorial circumference.
/// <https://en.wikipedia.org/wiki/Equator#Exact_length>
pub const METERS_PER_DEGREE: f64 = 40_075_036.0 / 360.0;

/// An equirectangular projection anchored at the average of all input coordinates, with
/// longitude scaled by the cosine of each point's latitude. Good enough at city scale; the
/// error grows noticeably past roughly 50km from the origin, which is an accepted
/// approximation for this kind of map. y grows southward, so north is up on screen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub origin: LonLat,
}

impl Projection {
    /// The origin is the mean of the input points. Callers must pass nodes in ascending ID
    /// order; floating-point summation then produces a bit-identical origin every time the same
    /// document is imported.
    pub fn new<I: Iterator<Item = LonLat>>(pts: I) -> Projection {
        let mut lon = 0.0;
        let mut lat = 0.0;
        let mut count = 0;
        for pt in pts {
            lon += pt.longitude;
            lat += pt.latitude;
            count += 1;
        }
        let origin = if count == 0 {
            LonLat::new(0.0, 0.0)
        } else {
            LonLat::new(lon / (count as f64), lat / (count as f64))
        };
        Projection { origin }
    }

    pub fn project(&self, pt: LonLat) -> Pt2D {
        let x = (pt.longitude - self.origin.longitude)
            * METERS_PER_DEGREE
            * pt.latitude.to_radians().cos();
        let y = (self.origin.latitude - pt.latitude) * METERS_PER_DEGREE;
        Pt2D::new(x, y)
    }

    pub fn unproject(&self, pt: Pt2D) -> LonLat {
        let latitude = self.origin.latitude - pt.y() / METERS_PER_DEGREE;
        let mut longitude = self.origin.longitude;
        let cos = latitude.to_radians().cos();
        if cos > 0.0 {
            longitude += pt.x() / METERS_PER_DEGREE / cos;
        }
        LonLat::new(longitude, latitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_origin() {
        let pts = vec![
            LonLat::new(-122.33, 47.61),
            LonLat::new(-122.32, 47.62),
            LonLat::new(-122.31, 47.605),
        ];
        let p1 = Projection::new(pts.iter().copied());
        let p2 = Projection::new(pts.iter().copied());
        assert_eq!(p1.origin, p2.origin);
    }

    #[test]
    fn axes_point_east_and_south() {
        let proj = Projection::new(vec![LonLat::new(-122.3, 47.6)].into_iter());
        let east = proj.project(LonLat::new(-122.29, 47.6));
        assert!(east.x() > 0.0 && east.y().abs() < 0.001);
        let south = proj.project(LonLat::new(-122.3, 47.59));
        assert!(south.y() > 0.0 && south.x().abs() < 0.001);
    }

    #[test]
    fn roundtrip() {
        let proj = Projection::new(vec![LonLat::new(-122.3, 47.6)].into_iter());
        let orig = LonLat::new(-122.305, 47.612);
        let back = proj.unproject(proj.project(orig));
        assert!((back.longitude - orig.longitude).abs() < 1e-6);
        assert!((back.latitude - orig.latitude).abs() < 1e-6);
    }

    #[test]
    fn scale_matches_haversine_at_city_scale() {
        let a = LonLat::new(-122.3, 47.6);
        let b = LonLat::new(-122.29, 47.61);
        let proj = Projection::new(vec![a, b].into_iter());
        let planar = proj.project(a).dist_to(proj.project(b));
        let geodetic = a.gps_dist(b);
        let error = (planar - geodetic).abs().inner_meters();
        assert!(error < 5.0, "error {}m over ~1.3km", error);
    }
}
