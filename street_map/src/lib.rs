//! Imports OpenStreetMap XML into a renderable street network: a typed graph of roads,
//! buildings, and points of interest, plus triangulated meshes (road ribbons, intersection
//! joins, extruded building footprints) ready for GPU upload.
//!
//! The pipeline: `reader` scrapes the document, `projection` flattens coordinates into a local
//! planar frame, `extract` classifies ways by tag, `graph` builds deduplicated intersections
//! and road segments, and `mesh` turns those into geometry. `model::StreetMap` is the
//! resulting immutable aggregate. Broken elements get skipped and reported, never aborting the
//! import; see `report`.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

use anyhow::Result;

use geom::Distance;

pub use crate::extract::{AreaClass, RawStreets, RoadClass, WayClass};
pub use crate::graph::{Intersection, IntersectionID, Road, RoadID, StreetGraph};
pub use crate::mesh::{BuildingMesh, JoinMesh, Mesh, MeshVertex, RoadMesh};
pub use crate::model::{
    Area, Building, BuildingID, IndexedObject, PointOfInterest, Published, StreetMap,
};
pub use crate::projection::Projection;
pub use crate::report::{ImportError, ImportReport};
pub use crate::spatial_index::SpatialIndex;

pub mod extract;
pub mod graph;
pub mod mesh;
pub mod model;
pub mod osm;
pub mod projection;
pub mod reader;
pub mod report;
pub mod spatial_index;

/// Default road width per class, used when a way has no usable width tag.
#[derive(Clone, Debug, PartialEq)]
pub struct RoadWidths {
    pub motorway: Distance,
    pub primary: Distance,
    pub secondary: Distance,
    pub residential: Distance,
    pub path: Distance,
    pub unknown: Distance,
}

impl RoadWidths {
    pub fn for_class(&self, class: RoadClass) -> Distance {
        match class {
            RoadClass::Motorway => self.motorway,
            RoadClass::Primary => self.primary,
            RoadClass::Secondary => self.secondary,
            RoadClass::Residential => self.residential,
            RoadClass::Path => self.path,
            RoadClass::Unknown => self.unknown,
        }
    }
}

impl Default for RoadWidths {
    fn default() -> RoadWidths {
        RoadWidths {
            motorway: Distance::meters(14.0),
            primary: Distance::meters(10.0),
            secondary: Distance::meters(8.0),
            residential: Distance::meters(6.0),
            path: Distance::meters(2.0),
            unknown: Distance::meters(5.0),
        }
    }
}

/// Configures an import. Every option affects exactly one pipeline stage.
#[derive(Clone, Debug)]
pub struct Options {
    /// Graph nodes closer than this unify into one intersection. Absorbs duplicated survey
    /// points without collapsing genuinely distinct junctions.
    pub merge_tolerance: Distance,
    pub road_widths: RoadWidths,
    /// Maximum length of a miter join at a centerline vertex, as a multiple of half the road
    /// width. Sharper turns get a bevel instead.
    pub miter_limit: f64,
    /// Two roads meeting end-to-end within this many degrees of straight skip join geometry
    /// and meet directly.
    pub collinear_skip_degrees: f64,
    /// Building height when neither a height nor a building:levels tag is usable.
    pub default_building_height: Distance,
    /// Height of one building level, for footprints tagged building:levels.
    pub level_height: Distance,
    /// Generate building meshes at all?
    pub generate_buildings: bool,
    /// Cell size of the spatial index grid. A few times typical road spacing works well.
    pub index_cell_size: Distance,
}

impl Default for Options {
    fn default() -> Options {
        Options {
            merge_tolerance: Distance::meters(0.5),
            road_widths: RoadWidths::default(),
            miter_limit: 2.0,
            collinear_skip_degrees: 15.0,
            default_building_height: Distance::meters(10.0),
            level_height: Distance::meters(3.0),
            generate_buildings: true,
            index_cell_size: Distance::meters(50.0),
        }
    }
}

impl Options {
    /// Surfaces bad configuration before any parsing happens.
    pub fn validate(&self) -> Result<()> {
        if self.merge_tolerance <= Distance::ZERO {
            bail!("invalid option: merge_tolerance must be positive");
        }
        for class in [
            RoadClass::Motorway,
            RoadClass::Primary,
            RoadClass::Secondary,
            RoadClass::Residential,
            RoadClass::Path,
            RoadClass::Unknown,
        ] {
            if self.road_widths.for_class(class) <= Distance::ZERO {
                bail!("invalid option: road width for {:?} must be positive", class);
            }
        }
        if self.miter_limit < 1.0 {
            bail!("invalid option: miter_limit must be at least 1");
        }
        if !(0.0..90.0).contains(&self.collinear_skip_degrees) {
            bail!("invalid option: collinear_skip_degrees must be in [0, 90)");
        }
        if self.default_building_height <= Distance::ZERO
            || self.level_height <= Distance::ZERO
        {
            bail!("invalid option: building heights must be positive");
        }
        if self.index_cell_size <= Distance::ZERO {
            bail!("invalid option: index_cell_size must be positive");
        }
        Ok(())
    }
}

/// Imports one OSM XML document. Always yields a model (possibly empty or partial) plus a
/// report of skipped elements; only an unreadable document or invalid configuration fail the
/// whole import.
pub fn import(raw_osm_xml: &str, opts: &Options) -> Result<(StreetMap, ImportReport)> {
    opts.validate()?;
    let mut report = ImportReport::new();

    let doc = reader::read(raw_osm_xml, &mut report)?;
    // BTreeMap iteration is in ascending NodeID order, which pins down the floating-point sum
    // behind the origin
    let projection = Projection::new(doc.nodes.values().map(|n| n.lon_lat));
    let raw = extract::extract(&doc, &projection, opts, &mut report);
    let map = model::StreetMap::build(raw, projection, doc.gps_bounds.clone(), opts, &mut report);

    info!(
        "Imported {} intersections, {} roads, {} buildings, {} areas ({} elements skipped)",
        map.intersections.len(),
        map.roads.len(),
        map.buildings.len(),
        map.areas.len(),
        report.len()
    );
    Ok((map, report))
}
