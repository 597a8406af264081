use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{Angle, Distance, Pt2D, EPSILON_DIST};

/// A line segment.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Line(Pt2D, Pt2D);

impl Line {
    /// Creates a line segment between two points, which must not be the same.
    pub fn new(pt1: Pt2D, pt2: Pt2D) -> Result<Line> {
        if pt1.dist_to(pt2) <= EPSILON_DIST {
            bail!("Line from {} to {} too small", pt1, pt2);
        }
        Ok(Line(pt1, pt2))
    }

    /// Equivalent to `Line::new(pt1, pt2).unwrap()`. Use this to effectively document an assertion
    /// at the call-site.
    pub fn must_new(pt1: Pt2D, pt2: Pt2D) -> Line {
        Line::new(pt1, pt2).unwrap()
    }

    pub fn pt1(&self) -> Pt2D {
        self.0
    }

    pub fn pt2(&self) -> Pt2D {
        self.1
    }

    /// Length of the line segment.
    pub fn length(&self) -> Distance {
        self.pt1().dist_to(self.pt2())
    }

    /// The angle of the line segment, from the first to the second point.
    pub fn angle(&self) -> Angle {
        self.pt1().angle_to(self.pt2())
    }

    /// Returns a point along the line segment, unless the distance exceeds the segment's length.
    pub fn dist_along(&self, dist: Distance) -> Result<Pt2D> {
        let len = self.length();
        if dist < Distance::ZERO || dist > len + EPSILON_DIST {
            bail!("dist_along({}) of a length {} line", dist, len);
        }
        Ok(self.percent_along(dist / len))
    }

    /// Returns a point along the infinite line containing this segment.
    pub fn unbounded_dist_along(&self, dist: Distance) -> Pt2D {
        self.percent_along(dist / self.length())
    }

    fn percent_along(&self, percent: f64) -> Pt2D {
        Pt2D::new(
            self.pt1().x() + percent * (self.pt2().x() - self.pt1().x()),
            self.pt1().y() + percent * (self.pt2().y() - self.pt1().y()),
        )
    }

    pub fn middle(&self) -> Pt2D {
        self.percent_along(0.5)
    }

    /// Perpendicularly shifts the line to the right if positive or left if negative.
    pub fn shift_either_direction(&self, width: Distance) -> Line {
        if width >= Distance::ZERO {
            let angle = self.angle().rotate_degs(90.0);
            Line(
                self.pt1().project_away(width, angle),
                self.pt2().project_away(width, angle),
            )
        } else {
            let angle = self.angle().rotate_degs(-90.0);
            Line(
                self.pt1().project_away(-width, angle),
                self.pt2().project_away(-width, angle),
            )
        }
    }

    /// True if the two line segments intersect.
    pub fn crosses(&self, other: &Line) -> bool {
        // From http://bryceboe.com/2006/10/23/line-segment-intersection-algorithm/
        fn ccw(a: Pt2D, b: Pt2D, c: Pt2D) -> bool {
            (c.y() - a.y()) * (b.x() - a.x()) > (b.y() - a.y()) * (c.x() - a.x())
        }
        ccw(self.pt1(), other.pt1(), other.pt2()) != ccw(self.pt2(), other.pt1(), other.pt2())
            && ccw(self.pt1(), self.pt2(), other.pt1()) != ccw(self.pt1(), self.pt2(), other.pt2())
    }

    /// If the two line segments intersect, where?
    pub fn intersection(&self, other: &Line) -> Option<Pt2D> {
        if !self.crosses(other) {
            return None;
        }
        line_intersection(self, other)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Line({} to {})", self.pt1(), self.pt2())
    }
}

/// Where do the infinite lines through these two segments intersect? Returns None for (nearly)
/// parallel lines.
pub fn line_intersection(l1: &Line, l2: &Line) -> Option<Pt2D> {
    let (x1, y1) = (l1.pt1().x(), l1.pt1().y());
    let (x2, y2) = (l1.pt2().x(), l1.pt2().y());
    let (x3, y3) = (l2.pt1().x(), l2.pt1().y());
    let (x4, y4) = (l2.pt2().x(), l2.pt2().y());

    let denom = (x1 - x2) * (y3 - y4) - (y1 - y2) * (x3 - x4);
    if denom.abs() < 1e-9 {
        return None;
    }
    let numer_x = (x1 * y2 - y1 * x2) * (x3 - x4) - (x1 - x2) * (x3 * y4 - y3 * x4);
    let numer_y = (x1 * y2 - y1 * x2) * (y3 - y4) - (y1 - y2) * (x3 * y4 - y3 * x4);
    Some(Pt2D::new(numer_x / denom, numer_y / denom))
}
