//! The aggregate produced by an import: the street graph, generated meshes, projection
//! parameters, and a spatial index over everything an editor might want to pick. Immutable
//! once built; edits go through `rebuild`, and consumers see whole models swapped atomically
//! via `Published`.

use std::fmt;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use serde::{Deserialize, Serialize};

use geom::{Bounds, Distance, GPSBounds, Polygon, Pt2D, Ring};

use crate::extract::{AreaClass, RawStreets};
use crate::graph::{Intersection, IntersectionID, Road, RoadID, StreetGraph};
use crate::mesh::{self, BuildingMesh, JoinMesh, RoadMesh};
use crate::osm::{NodeID, OsmID, Tags};
use crate::projection::Projection;
use crate::report::{ImportError, ImportReport};
use crate::spatial_index::SpatialIndex;
use crate::Options;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct BuildingID(pub usize);

impl fmt::Display for BuildingID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Building #{}", self.0)
    }
}

/// A building with a validated footprint: closed, non-self-intersecting outer ring (wound
/// counter-clockwise), holes wound clockwise.
#[derive(Clone, Debug, Serialize)]
pub struct Building {
    pub id: BuildingID,
    pub osm_id: OsmID,
    pub footprint: Polygon,
    pub height: Distance,
    pub name: Option<String>,
    pub tags: Tags,
}

impl Building {
    pub fn center(&self) -> Pt2D {
        self.footprint.center()
    }
}

/// A non-road, non-building feature: water or a tagged point-of-interest area.
#[derive(Clone, Debug, Serialize)]
pub struct Area {
    pub osm_id: OsmID,
    pub class: AreaClass,
    pub polygon: Polygon,
    pub tags: Tags,
}

#[derive(Clone, Debug, Serialize)]
pub struct PointOfInterest {
    pub osm_node: NodeID,
    pub position: Pt2D,
    pub name: String,
    pub amenity: String,
}

/// What the spatial index points at.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum IndexedObject {
    Intersection(IntersectionID),
    Building(BuildingID),
}

#[derive(Clone, Serialize)]
pub struct StreetMap {
    pub intersections: Vec<Intersection>,
    pub roads: Vec<Road>,
    pub buildings: Vec<Building>,
    pub areas: Vec<Area>,
    pub pois: Vec<PointOfInterest>,

    pub road_meshes: Vec<RoadMesh>,
    pub join_meshes: Vec<JoinMesh>,
    pub building_meshes: Vec<BuildingMesh>,

    /// How the source document was flattened into world space. The host needs this to align
    /// the map with other world content.
    pub projection: Projection,
    pub gps_bounds: GPSBounds,
    pub bounds: Bounds,

    #[serde(skip)]
    index: SpatialIndex<IndexedObject>,

    /// The classified source data, kept so a rebuild can re-run graph construction and meshing
    /// without re-parsing the document.
    pub raw: RawStreets,
}

impl StreetMap {
    pub(crate) fn build(
        raw: RawStreets,
        projection: Projection,
        gps_bounds: GPSBounds,
        opts: &Options,
        report: &mut ImportReport,
    ) -> StreetMap {
        let graph = StreetGraph::build(&raw, opts, report);
        let (road_meshes, join_meshes) = mesh::roads::generate(&graph, opts, report);

        let buildings = make_buildings(&raw, report);
        let building_meshes = if opts.generate_buildings {
            mesh::buildings::generate(&buildings)
        } else {
            Vec::new()
        };

        let mut areas = Vec::new();
        for raw_area in &raw.areas {
            match Ring::new(raw_area.pts.clone()) {
                Ok(ring) => {
                    areas.push(Area {
                        osm_id: raw_area.id,
                        class: raw_area.class,
                        polygon: ring.into_polygon(),
                        tags: raw_area.tags.clone(),
                    });
                }
                Err(err) => {
                    debug!("Skipping area {}: {}", raw_area.id, err);
                }
            }
        }

        let pois: Vec<PointOfInterest> = raw
            .pois
            .iter()
            .map(|poi| PointOfInterest {
                osm_node: poi.id,
                position: poi.position,
                name: poi.name.clone(),
                amenity: poi.amenity.clone(),
            })
            .collect();

        let mut bounds = Bounds::new();
        for i in &graph.intersections {
            bounds.update(i.point);
        }
        for r in &graph.roads {
            bounds.union(r.center.get_bounds());
        }
        for b in &buildings {
            bounds.union(b.footprint.get_bounds());
        }
        for a in &areas {
            bounds.union(a.polygon.get_bounds());
        }

        let mut index = SpatialIndex::new(opts.index_cell_size);
        for i in &graph.intersections {
            index.insert(IndexedObject::Intersection(i.id), i.point);
        }
        for b in &buildings {
            index.insert(IndexedObject::Building(b.id), b.center());
        }

        StreetMap {
            intersections: graph.intersections,
            roads: graph.roads,
            buildings,
            areas,
            pois,
            road_meshes,
            join_meshes,
            building_meshes,
            projection,
            gps_bounds,
            bounds,
            index,
            raw,
        }
    }

    /// Re-runs graph construction and mesh generation from the retained source data,
    /// producing a fresh model. The old model stays untouched; publish the result through
    /// `Published` when it should become visible.
    pub fn rebuild(&self, opts: &Options) -> Result<(StreetMap, ImportReport)> {
        opts.validate()?;
        let mut report = ImportReport::new();
        let map = StreetMap::build(
            self.raw.clone(),
            self.projection.clone(),
            self.gps_bounds.clone(),
            opts,
            &mut report,
        );
        Ok((map, report))
    }

    pub fn road(&self, id: RoadID) -> &Road {
        &self.roads[id.0]
    }

    pub fn intersection(&self, id: IntersectionID) -> &Intersection {
        &self.intersections[id.0]
    }

    pub fn building(&self, id: BuildingID) -> &Building {
        &self.buildings[id.0]
    }

    /// Candidate intersections and buildings in cells overlapping the box; callers filter
    /// precisely.
    pub fn query_bbox(&self, bounds: &Bounds) -> Vec<IndexedObject> {
        self.index.query_bbox(bounds)
    }

    /// The closest indexed intersection or building within max_dist.
    pub fn nearest(&self, pt: Pt2D, max_dist: Distance) -> Option<(IndexedObject, Pt2D, Distance)> {
        self.index.nearest(pt, max_dist)
    }
}

fn make_buildings(raw: &RawStreets, report: &mut ImportReport) -> Vec<Building> {
    let mut buildings = Vec::new();
    for raw_bldg in &raw.buildings {
        let outer = match Ring::new(raw_bldg.outer.clone()) {
            Ok(ring) => ring,
            Err(err) => {
                report.record(ImportError::DegenerateGeometry {
                    id: raw_bldg.id,
                    reason: format!("bad footprint: {}", err),
                });
                continue;
            }
        };
        if outer.self_crossing() {
            report.record(ImportError::DegenerateGeometry {
                id: raw_bldg.id,
                reason: "self-intersecting footprint".to_string(),
            });
            continue;
        }
        let outer = if outer.is_counter_clockwise() {
            outer
        } else {
            outer.reversed()
        };

        // A bad hole doesn't sink the whole building
        let mut holes = Vec::new();
        for hole_pts in &raw_bldg.holes {
            match Ring::new(hole_pts.clone()) {
                Ok(hole) if !hole.self_crossing() => {
                    holes.push(if hole.is_counter_clockwise() {
                        hole.reversed()
                    } else {
                        hole
                    });
                }
                _ => {
                    report.record(ImportError::DegenerateGeometry {
                        id: raw_bldg.id,
                        reason: "dropped a degenerate inner ring".to_string(),
                    });
                }
            }
        }

        buildings.push(Building {
            id: BuildingID(buildings.len()),
            osm_id: raw_bldg.id,
            footprint: Polygon::with_holes(outer, holes),
            height: raw_bldg.height,
            name: raw_bldg.name.clone(),
            tags: raw_bldg.tags.clone(),
        });
    }
    buildings
}

/// The handle collaborators read the current model through. Publishing swaps the whole model
/// atomically; readers keep whatever snapshot they already took, so nobody ever observes a
/// partially-rebuilt map.
pub struct Published {
    current: Mutex<Arc<StreetMap>>,
}

impl Published {
    pub fn new(map: StreetMap) -> Published {
        Published {
            current: Mutex::new(Arc::new(map)),
        }
    }

    pub fn publish(&self, map: StreetMap) {
        *self.current.lock().unwrap() = Arc::new(map);
    }

    pub fn snapshot(&self) -> Arc<StreetMap> {
        self.current.lock().unwrap().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geom::LonLat;

    #[test]
    fn published_swap_is_atomic_to_readers() {
        let empty = |origin: f64| {
            let mut report = ImportReport::new();
            StreetMap::build(
                RawStreets::default(),
                Projection::new(vec![LonLat::new(origin, origin)].into_iter()),
                GPSBounds::new(),
                &Options::default(),
                &mut report,
            )
        };

        let published = Published::new(empty(1.0));
        let before = published.snapshot();
        published.publish(empty(2.0));
        // The old snapshot is still alive and unchanged
        assert_eq!(before.projection.origin, LonLat::new(1.0, 1.0));
        assert_eq!(
            published.snapshot().projection.origin,
            LonLat::new(2.0, 2.0)
        );
    }
}
