use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::{line_intersection, Angle, Bounds, Distance, Line, Pt2D, EPSILON_DIST};

/// An ordered list of distinct points, forming a path at least two points long.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolyLine {
    pts: Vec<Pt2D>,
    length: Distance,
}

/// One side of an offset polyline. `dist_along[i]` is the arc-length along the ORIGINAL
/// centerline of the vertex that produced `pts[i]`; a bevel produces two points with the same
/// arc-length. The two sides of a thickened path are stitched together by merging on these.
#[derive(Clone, Debug)]
pub struct OffsetChain {
    pub pts: Vec<Pt2D>,
    pub dist_along: Vec<Distance>,
}

impl PolyLine {
    pub fn new(pts: Vec<Pt2D>) -> Result<PolyLine> {
        let pts = collapse_duplicates(pts);
        if pts.len() < 2 {
            bail!("PolyLine needs at least 2 distinct points");
        }
        let length = pts
            .windows(2)
            .map(|pair| pair[0].dist_to(pair[1]))
            .sum::<Distance>();
        Ok(PolyLine { pts, length })
    }

    /// Equivalent to `PolyLine::new(pts).unwrap()`. Use this to effectively document an assertion
    /// at the call-site.
    pub fn must_new(pts: Vec<Pt2D>) -> PolyLine {
        PolyLine::new(pts).unwrap()
    }

    pub fn points(&self) -> &Vec<Pt2D> {
        &self.pts
    }

    pub fn into_points(self) -> Vec<Pt2D> {
        self.pts
    }

    // Makes a copy :\
    pub fn lines(&self) -> Vec<Line> {
        self.pts
            .windows(2)
            .map(|pair| Line::must_new(pair[0], pair[1]))
            .collect()
    }

    pub fn length(&self) -> Distance {
        self.length
    }

    pub fn first_pt(&self) -> Pt2D {
        self.pts[0]
    }

    pub fn last_pt(&self) -> Pt2D {
        *self.pts.last().unwrap()
    }

    pub fn first_line(&self) -> Line {
        Line::must_new(self.pts[0], self.pts[1])
    }

    pub fn last_line(&self) -> Line {
        Line::must_new(self.pts[self.pts.len() - 2], self.pts[self.pts.len() - 1])
    }

    pub fn reversed(&self) -> PolyLine {
        let mut pts = self.pts.clone();
        pts.reverse();
        PolyLine::must_new(pts)
    }

    /// Returns the point and angle some distance along the path.
    pub fn dist_along(&self, dist_along: Distance) -> Result<(Pt2D, Angle)> {
        if dist_along < Distance::ZERO {
            bail!("dist_along {} is negative", dist_along);
        }
        let mut dist_left = dist_along;
        let lines = self.lines();
        let last_idx = lines.len() - 1;
        for (idx, l) in lines.into_iter().enumerate() {
            let length = l.length();
            // Numerical tolerance at the very end of the path
            let epsilon = if idx == last_idx {
                EPSILON_DIST
            } else {
                Distance::ZERO
            };
            if dist_left <= length + epsilon {
                return Ok((l.dist_along(dist_left.min(length))?, l.angle()));
            }
            dist_left -= length;
        }
        bail!(
            "dist_along {} is longer than the path ({})",
            dist_along,
            self.length
        );
    }

    pub fn middle(&self) -> Result<Pt2D> {
        Ok(self.dist_along(self.length / 2.0)?.0)
    }

    /// Returns the subset of the path between two distances along it.
    pub fn maybe_exact_slice(&self, start: Distance, end: Distance) -> Result<PolyLine> {
        if start < Distance::ZERO || end < start {
            bail!("Can't get a polyline slice [{}, {}]", start, end);
        }
        if end > self.length + EPSILON_DIST {
            bail!(
                "Can't get a polyline slice [{}, {}] of a length {} path",
                start,
                end,
                self.length
            );
        }

        let mut result: Vec<Pt2D> = Vec::new();
        let mut dist_so_far = Distance::ZERO;

        for line in self.lines() {
            let length = line.length();

            // Does this line contain the first point of the slice?
            if result.is_empty() && dist_so_far + length >= start {
                result.push(line.dist_along((start - dist_so_far).min(length))?);
            }

            // Does this line contain the last point of the slice?
            if dist_so_far + length >= end {
                result.push(line.dist_along((end - dist_so_far).min(length))?);
                return PolyLine::new(result);
            }

            // If we're in the middle, just collect the endpoint.
            if !result.is_empty() {
                result.push(line.pt2());
            }

            dist_so_far += length;
        }

        if result.is_empty() {
            bail!(
                "Slice [{}, {}] has a start too big for a path of length {}",
                start,
                end,
                self.length
            );
        }
        // end barely exceeded the total length
        result.push(self.last_pt());
        PolyLine::new(result)
    }

    /// `maybe_exact_slice`, but panics on failure. Use when the slice bounds are known-good.
    pub fn exact_slice(&self, start: Distance, end: Distance) -> PolyLine {
        self.maybe_exact_slice(start, end).unwrap()
    }

    /// True if any two non-adjacent segments of the path cross each other.
    pub fn self_crossing(&self) -> bool {
        let lines = self.lines();
        for i in 0..lines.len() {
            for j in (i + 2)..lines.len() {
                if lines[i].crosses(&lines[j]) {
                    return true;
                }
            }
        }
        false
    }

    /// Offsets the path perpendicularly by `width` (to the right if positive, left if negative)
    /// with a miter join at each vertex. Miters longer than `miter_limit * width.abs()` fall back
    /// to a bevel: a straight cut with one offset point per adjacent segment. The bevel leaves a
    /// small notch relative to the true parallel curve, but never spikes off to infinity at sharp
    /// turns.
    pub fn shift_with_bevels(&self, width: Distance, miter_limit: f64) -> OffsetChain {
        let mut chain = OffsetChain {
            pts: Vec::new(),
            dist_along: Vec::new(),
        };

        if self.pts.len() == 2 {
            let l = self.first_line().shift_either_direction(width);
            chain.pts = vec![l.pt1(), l.pt2()];
            chain.dist_along = vec![Distance::ZERO, self.length];
            return chain;
        }

        let max_miter = miter_limit * width.abs();
        let mut cumulative = Distance::ZERO;

        for idx in 0..self.pts.len() {
            if idx == 0 {
                let l = self.first_line().shift_either_direction(width);
                chain.pts.push(l.pt1());
                chain.dist_along.push(Distance::ZERO);
                continue;
            }
            cumulative += self.pts[idx - 1].dist_to(self.pts[idx]);
            if idx == self.pts.len() - 1 {
                let l = self.last_line().shift_either_direction(width);
                chain.pts.push(l.pt2());
                chain.dist_along.push(cumulative);
                continue;
            }

            let l1 =
                Line::must_new(self.pts[idx - 1], self.pts[idx]).shift_either_direction(width);
            let l2 =
                Line::must_new(self.pts[idx], self.pts[idx + 1]).shift_either_direction(width);
            match line_intersection(&l1, &l2) {
                Some(miter) if miter.dist_to(self.pts[idx]) <= max_miter => {
                    chain.pts.push(miter);
                    chain.dist_along.push(cumulative);
                }
                Some(_) => {
                    // Too spiky; bevel instead
                    chain.pts.push(l1.pt2());
                    chain.dist_along.push(cumulative);
                    chain.pts.push(l2.pt1());
                    chain.dist_along.push(cumulative);
                }
                None => {
                    // The segments are parallel, so the two shifted endpoints coincide
                    chain.pts.push(l1.pt2());
                    chain.dist_along.push(cumulative);
                }
            }
        }

        chain
    }

    pub fn get_bounds(&self) -> Bounds {
        Bounds::from(&self.pts)
    }
}

impl fmt::Display for PolyLine {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "PolyLine::new(vec![")?;
        for pt in &self.pts {
            writeln!(f, "  Pt2D::new({}, {}),", pt.x(), pt.y())?;
        }
        write!(f, "])")
    }
}

fn collapse_duplicates(pts: Vec<Pt2D>) -> Vec<Pt2D> {
    let mut result: Vec<Pt2D> = Vec::new();
    for pt in pts {
        if let Some(last) = result.last() {
            if last.dist_to(pt) <= EPSILON_DIST {
                continue;
            }
        }
        result.push(pt);
    }
    result
}
