use std::fmt;

use geo::{Area, Contains};
use serde::{Deserialize, Serialize};

use crate::{Bounds, Pt2D, Ring, Tessellation, Triangle};

/// A triangulated polygon, possibly with holes.
#[derive(PartialEq, Serialize, Deserialize, Clone, Debug)]
pub struct Polygon {
    pub(crate) points: Vec<Pt2D>,
    /// Groups of three indices make up the triangles
    pub(crate) indices: Vec<u16>,

    /// If the polygon has holes, explicitly store all the rings (the one outer and all of the
    /// inner) so they can later be used to generate outlines and such. If the polygon has no
    /// holes, then this will just be None, since the points form a ring.
    rings: Option<Vec<Ring>>,
}

impl Polygon {
    /// Triangulates a polygon with holes, using earcut. The outer ring comes first.
    pub fn with_holes(outer: Ring, mut inner: Vec<Ring>) -> Polygon {
        inner.insert(0, outer);
        let geojson_style: Vec<Vec<Vec<f64>>> = inner
            .iter()
            .map(|ring| {
                ring.points()
                    .iter()
                    .map(|pt| vec![pt.x(), pt.y()])
                    .collect()
            })
            .collect();
        let (vertices, holes, dims) = earcutr::flatten(&geojson_style);
        let indices = crate::downsize(earcutr::earcut(&vertices, &holes, dims));

        Polygon {
            points: vertices
                .chunks(2)
                .map(|pair| Pt2D::new(pair[0], pair[1]))
                .collect(),
            indices,
            rings: if inner.len() == 1 { None } else { Some(inner) },
        }
    }

    pub fn from_rings(mut rings: Vec<Ring>) -> Polygon {
        assert!(!rings.is_empty());
        let outer = rings.remove(0);
        Polygon::with_holes(outer, rings)
    }

    pub fn triangles(&self) -> Vec<Triangle> {
        Tessellation::from(self.clone()).triangles()
    }

    /// Does this polygon contain the point in its interior?
    pub fn contains_pt(&self, pt: Pt2D) -> bool {
        self.to_geo().contains(&geo::Point::from(pt))
    }

    /// The order of these points depends on the constructor! The first and last point may or may
    /// not match.
    pub fn points(&self) -> &Vec<Pt2D> {
        if let Some(ref rings) = self.rings {
            rings[0].points()
        } else {
            &self.points
        }
    }

    /// Get the outer ring of this polygon. This should usually succeed.
    pub fn get_outer_ring(&self) -> Option<Ring> {
        if let Some(ref rings) = self.rings {
            Some(rings[0].clone())
        } else {
            Ring::new(self.points.clone()).ok()
        }
    }

    /// The holes of this polygon, if any.
    pub fn get_holes(&self) -> Vec<Ring> {
        match self.rings {
            Some(ref rings) => rings[1..].to_vec(),
            None => Vec::new(),
        }
    }

    pub fn center(&self) -> Pt2D {
        // TODO dedupe just out of fear of the first/last point being repeated
        let mut pts: Vec<_> = self.points.iter().map(|pt| pt.to_hashable()).collect();
        pts.sort();
        pts.dedup();
        Pt2D::center(&pts.iter().map(|pt| pt.to_pt2d()).collect::<Vec<_>>())
    }

    pub fn get_bounds(&self) -> Bounds {
        Bounds::from(&self.points)
    }

    /// Usually m^2, unless the polygon is in screen-space
    pub fn area(&self) -> f64 {
        // Don't use signed_area, since we may work with polygons that have different orientations
        self.to_geo().unsigned_area()
    }

    // A less verbose way of invoking the From/Into impl. Note this hides a potentially expensive
    // clone.
    fn to_geo(&self) -> geo::Polygon {
        self.clone().into()
    }
}

impl fmt::Display for Polygon {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Polygon with {} points and {} triangles",
            self.points.len(),
            self.indices.len() / 3
        )
    }
}

impl From<Polygon> for geo::Polygon {
    fn from(poly: Polygon) -> Self {
        if let Some(mut rings) = poly.rings {
            let exterior = rings.remove(0);
            let interiors: Vec<geo::LineString> =
                rings.into_iter().map(geo::LineString::from).collect();
            Self::new(exterior.into(), interiors)
        } else {
            let exterior_coords = poly
                .points
                .into_iter()
                .map(geo::Coordinate::from)
                .collect::<Vec<_>>();
            let exterior = geo::LineString(exterior_coords);
            Self::new(exterior, Vec::new())
        }
    }
}
