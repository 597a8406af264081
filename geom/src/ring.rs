use std::collections::HashSet;
use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{Bounds, Line, Polygon, Pt2D, EPSILON_DIST};

/// Maybe a misnomer, but like a PolyLine, but closed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ring {
    // first equals last
    pts: Vec<Pt2D>,
}

impl Ring {
    pub fn new(mut pts: Vec<Pt2D>) -> Result<Ring> {
        // Close rings that're almost closed; callers pass in surveyed data
        if let (Some(first), Some(last)) = (pts.first().copied(), pts.last().copied()) {
            if first != last && first.dist_to(last) <= EPSILON_DIST {
                pts.pop();
                pts.push(first);
            }
        }
        if pts.len() < 4 {
            bail!("Can't make a ring with < 3 distinct points");
        }
        if pts[0] != *pts.last().unwrap() {
            bail!("Can't make a ring with mismatching first/last points");
        }

        if pts.windows(2).any(|pair| pair[0] == pair[1]) {
            bail!("Ring has duplicate adjacent points");
        }

        let result = Ring { pts };

        let mut seen_pts = HashSet::new();
        for pt in result.pts.iter().skip(1) {
            if !seen_pts.insert(pt.to_hashable()) {
                bail!("Ring has repeat non-adjacent points");
            }
        }

        Ok(result)
    }

    /// Equivalent to `Ring::new(pts).unwrap()`. Use this to effectively document an assertion at
    /// the call-site.
    pub fn must_new(pts: Vec<Pt2D>) -> Ring {
        Ring::new(pts).unwrap()
    }

    /// First and last point match.
    pub fn points(&self) -> &Vec<Pt2D> {
        &self.pts
    }

    pub fn into_points(self) -> Vec<Pt2D> {
        self.pts
    }

    /// Twice the signed area of the ring, by the shoelace formula. Positive when the ring is
    /// wound counter-clockwise in (x right, y up) axes.
    fn double_signed_area(&self) -> f64 {
        let mut sum = 0.0;
        for pair in self.pts.windows(2) {
            sum += pair[0].x() * pair[1].y() - pair[1].x() * pair[0].y();
        }
        sum
    }

    pub fn area(&self) -> f64 {
        self.double_signed_area().abs() / 2.0
    }

    pub fn is_counter_clockwise(&self) -> bool {
        self.double_signed_area() > 0.0
    }

    pub fn reversed(self) -> Ring {
        let mut pts = self.pts;
        pts.reverse();
        Ring { pts }
    }

    /// True if any two non-adjacent edges of the ring cross each other.
    pub fn self_crossing(&self) -> bool {
        let lines: Vec<Line> = self
            .pts
            .windows(2)
            .map(|pair| Line::must_new(pair[0], pair[1]))
            .collect();
        for i in 0..lines.len() {
            for j in (i + 2)..lines.len() {
                // The last edge wraps around to touch the first
                if i == 0 && j == lines.len() - 1 {
                    continue;
                }
                if lines[i].crosses(&lines[j]) {
                    return true;
                }
            }
        }
        false
    }

    pub fn into_polygon(self) -> Polygon {
        Polygon::with_holes(self, Vec::new())
    }

    pub fn get_bounds(&self) -> Bounds {
        Bounds::from(&self.pts)
    }
}

impl fmt::Display for Ring {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "Ring::new(vec![")?;
        for pt in &self.pts {
            writeln!(f, "  Pt2D::new({}, {}),", pt.x(), pt.y())?;
        }
        write!(f, "])")
    }
}

impl From<Ring> for geo::LineString {
    fn from(ring: Ring) -> Self {
        geo::LineString(ring.pts.into_iter().map(geo::Coordinate::from).collect())
    }
}
