//! Classifies parsed ways by their tags and projects them into world space. The output is the
//! classified source data that the graph builder and mesh generators consume; it's retained in
//! the final model so a rebuild can re-run those stages without re-parsing XML.

use serde::{Deserialize, Serialize};

use geom::{Distance, Pt2D, Ring};

use crate::osm::{self, NodeID, OsmID, Tags, WayID};
use crate::projection::Projection;
use crate::reader::Document;
use crate::report::{ImportError, ImportReport};
use crate::Options;

#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub enum RoadClass {
    Motorway,
    Primary,
    Secondary,
    Residential,
    Path,
    Unknown,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AreaClass {
    Water,
    Poi,
}

/// What one tagged way means for the street map, decided by a priority-ordered rule table.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WayClass {
    Road(RoadClass),
    Building,
    Area(AreaClass),
}

/// First matching rule wins. Ways with no actionable tag are None and get discarded.
pub fn classify(tags: &Tags) -> Option<WayClass> {
    if let Some(hwy) = tags.get(osm::HIGHWAY) {
        let class = match hwy.as_ref() {
            "motorway" | "motorway_link" | "trunk" | "trunk_link" => RoadClass::Motorway,
            "primary" | "primary_link" => RoadClass::Primary,
            "secondary" | "secondary_link" | "tertiary" | "tertiary_link" => RoadClass::Secondary,
            "residential" | "unclassified" | "service" | "living_street" | "road" => {
                RoadClass::Residential
            }
            "footway" | "path" | "pedestrian" | "cycleway" | "track" | "steps" | "bridleway" => {
                RoadClass::Path
            }
            // Other values are still roads of some sort; render them with a default width
            _ => RoadClass::Unknown,
        };
        return Some(WayClass::Road(class));
    }
    if tags.contains_key(osm::BUILDING) {
        return Some(WayClass::Building);
    }
    if tags.is("natural", "water")
        || tags.contains_key("waterway")
        || tags.is("landuse", "reservoir")
    {
        return Some(WayClass::Area(AreaClass::Water));
    }
    if tags.contains_key("leisure")
        || tags.contains_key("landuse")
        || (tags.contains_key(osm::AMENITY) && tags.is("area", "yes"))
    {
        return Some(WayClass::Area(AreaClass::Poi));
    }
    None
}

/// An unsplit road way. The graph builder turns these into edges between intersections.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawRoad {
    pub id: WayID,
    pub nodes: Vec<NodeID>,
    pub pts: Vec<Pt2D>,
    pub class: RoadClass,
    pub width: Distance,
    pub one_way: bool,
    pub name: Option<String>,
    pub tags: Tags,
}

/// A closed building footprint, possibly with holes from multipolygon inner rings. Not yet
/// validated; the model builder checks the rings and skips broken ones.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawBuilding {
    pub id: OsmID,
    pub outer: Vec<Pt2D>,
    pub holes: Vec<Vec<Pt2D>>,
    pub height: Distance,
    pub name: Option<String>,
    pub tags: Tags,
}

/// A closed non-road, non-building feature: water or a tagged point-of-interest area.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawArea {
    pub id: OsmID,
    pub class: AreaClass,
    pub pts: Vec<Pt2D>,
    pub tags: Tags,
}

/// A point of interest: a tagged, named node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RawPoi {
    pub id: NodeID,
    pub position: Pt2D,
    pub name: String,
    pub amenity: String,
}

/// Classified, projected source data for one map.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RawStreets {
    pub roads: Vec<RawRoad>,
    pub buildings: Vec<RawBuilding>,
    pub areas: Vec<RawArea>,
    pub pois: Vec<RawPoi>,
}

pub fn extract(
    doc: &Document,
    projection: &Projection,
    opts: &Options,
    report: &mut ImportReport,
) -> RawStreets {
    let mut out = RawStreets::default();

    for (id, node) in &doc.nodes {
        if let Some(amenity) = node.tags.get(osm::AMENITY) {
            if let Some(name) = node.tags.get(osm::NAME) {
                out.pois.push(RawPoi {
                    id: *id,
                    position: projection.project(node.lon_lat),
                    name: name.clone(),
                    amenity: amenity.clone(),
                });
            }
        }
    }

    for (id, way) in &doc.ways {
        let class = match classify(&way.tags) {
            Some(c) => c,
            None => {
                continue;
            }
        };
        let pts: Vec<Pt2D> = way
            .nodes
            .iter()
            .map(|n| projection.project(doc.nodes[n].lon_lat))
            .collect();

        match class {
            WayClass::Road(road_class) => {
                out.roads.push(RawRoad {
                    id: *id,
                    nodes: way.nodes.clone(),
                    pts,
                    class: road_class,
                    width: road_width(&way.tags, road_class, opts),
                    one_way: way.tags.is_any(osm::ONEWAY, vec!["yes", "true", "1"]),
                    name: name_or_ref(&way.tags),
                    tags: way.tags.clone(),
                });
            }
            WayClass::Building => {
                if way.nodes.first() != way.nodes.last() {
                    report.record(ImportError::DegenerateGeometry {
                        id: OsmID::Way(*id),
                        reason: "unclosed building footprint".to_string(),
                    });
                    continue;
                }
                out.buildings.push(RawBuilding {
                    id: OsmID::Way(*id),
                    outer: pts,
                    holes: Vec::new(),
                    height: building_height(&way.tags, opts),
                    name: name_or_ref(&way.tags),
                    tags: way.tags.clone(),
                });
            }
            WayClass::Area(area_class) => {
                // Linear features tagged like areas (riverbanks, tree rows) aren't closed; we
                // only keep the closed ones.
                if way.nodes.first() != way.nodes.last() || pts.len() < 4 {
                    debug!("Skipping unclosed area {}", id);
                    continue;
                }
                out.areas.push(RawArea {
                    id: OsmID::Way(*id),
                    class: area_class,
                    pts,
                    tags: way.tags.clone(),
                });
            }
        }
    }

    for (id, rel) in &doc.relations {
        if !rel.tags.is("type", "multipolygon") {
            continue;
        }
        let class = match classify(&rel.tags) {
            Some(c) => c,
            None => {
                continue;
            }
        };

        let mut outer_pts: Vec<Vec<Pt2D>> = Vec::new();
        let mut inner_pts: Vec<Vec<Pt2D>> = Vec::new();
        for (role, member) in &rel.members {
            if let OsmID::Way(w) = member {
                let way = &doc.ways[w];
                let pts: Vec<Pt2D> = way
                    .nodes
                    .iter()
                    .map(|n| projection.project(doc.nodes[n].lon_lat))
                    .collect();
                if role == "outer" {
                    outer_pts.push(pts);
                } else if role == "inner" {
                    inner_pts.push(pts);
                } else {
                    debug!("{} has unhandled member role {}, ignoring it", id, role);
                }
            }
        }

        let outers = glue_rings(outer_pts);
        let inners = glue_rings(inner_pts);
        if outers.is_empty() {
            report.record(ImportError::DegenerateGeometry {
                id: OsmID::Relation(*id),
                reason: "multipolygon outer rings don't close".to_string(),
            });
            continue;
        }

        match class {
            WayClass::Building => {
                for outer in outers {
                    let holes = holes_within(&outer, &inners);
                    out.buildings.push(RawBuilding {
                        id: OsmID::Relation(*id),
                        outer,
                        holes,
                        height: building_height(&rel.tags, opts),
                        name: name_or_ref(&rel.tags),
                        tags: rel.tags.clone(),
                    });
                }
            }
            WayClass::Area(area_class) => {
                for outer in outers {
                    out.areas.push(RawArea {
                        id: OsmID::Relation(*id),
                        class: area_class,
                        pts: outer,
                        tags: rel.tags.clone(),
                    });
                }
            }
            WayClass::Road(_) => {}
        }
    }

    info!(
        "Extracted {} road ways, {} buildings, {} areas, {} POIs",
        out.roads.len(),
        out.buildings.len(),
        out.areas.len(),
        out.pois.len()
    );
    out
}

/// An explicit width tag wins when it's a plain positive number of meters; anything fancier
/// (unit suffixes, ranges) falls back to the per-class default table.
fn road_width(tags: &Tags, class: RoadClass, opts: &Options) -> Distance {
    if let Some(raw) = tags.get(osm::WIDTH) {
        if let Ok(meters) = raw.parse::<f64>() {
            if meters > 0.0 && meters.is_finite() {
                return Distance::meters(meters);
            }
        }
    }
    opts.road_widths.for_class(class)
}

/// height tag (plain meters), else building:levels times the configured level height, else the
/// configured default.
fn building_height(tags: &Tags, opts: &Options) -> Distance {
    if let Some(raw) = tags.get(osm::HEIGHT) {
        if let Ok(meters) = raw.parse::<f64>() {
            if meters > 0.0 && meters.is_finite() {
                return Distance::meters(meters);
            }
        }
    }
    if let Some(raw) = tags.get(osm::BUILDING_LEVELS) {
        if let Ok(levels) = raw.parse::<f64>() {
            if levels > 0.0 && levels.is_finite() {
                return levels * opts.level_height;
            }
        }
    }
    opts.default_building_height
}

fn name_or_ref(tags: &Tags) -> Option<String> {
    tags.get(osm::NAME)
        .or_else(|| tags.get("ref"))
        .map(|x| x.to_string())
}

/// Glues multipolygon member ways into closed rings by matching endpoints. Chunks that can't be
/// closed are dropped.
fn glue_rings(mut pts_per_way: Vec<Vec<Pt2D>>) -> Vec<Vec<Pt2D>> {
    let mut rings: Vec<Vec<Pt2D>> = Vec::new();

    // First deal with all of the closed loops.
    pts_per_way.retain(|pts| {
        if pts.len() >= 4 && pts[0] == *pts.last().unwrap() {
            rings.push(pts.clone());
            false
        } else {
            true
        }
    });

    while !pts_per_way.is_empty() {
        let mut result = pts_per_way.pop().unwrap();
        let mut reversed = false;
        loop {
            if result.len() >= 4 && result[0] == *result.last().unwrap() {
                rings.push(result);
                break;
            }
            let glue_pt = *result.last().unwrap();
            if let Some(idx) = pts_per_way
                .iter()
                .position(|pts| pts[0] == glue_pt || *pts.last().unwrap() == glue_pt)
            {
                let mut append = pts_per_way.remove(idx);
                if append[0] != glue_pt {
                    append.reverse();
                }
                result.pop();
                result.extend(append);
            } else if !reversed {
                reversed = true;
                result.reverse();
                // Try again!
            } else {
                debug!("Throwing away an unclosable multipolygon chunk");
                break;
            }
        }
    }

    rings
}

/// Assigns each hole ring to the outer ring containing it.
fn holes_within(outer: &[Pt2D], holes: &[Vec<Pt2D>]) -> Vec<Vec<Pt2D>> {
    let outer_polygon = match Ring::new(outer.to_vec()).map(Ring::into_polygon) {
        Ok(p) => p,
        Err(_) => {
            return Vec::new();
        }
    };
    holes
        .iter()
        .filter(|hole| {
            hole.first()
                .map(|pt| outer_polygon.contains_pt(*pt))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}
