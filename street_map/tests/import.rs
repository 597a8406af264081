//! End-to-end imports of small hand-written documents.

use geom::Distance;

use street_map::osm::NodeID;
use street_map::projection::METERS_PER_DEGREE;
use street_map::{import, ImportError, Options, RoadClass};

const LAT0: f64 = 47.6;
const LON0: f64 = -122.3;

/// A node at some offset in meters east/south of a fixed anchor.
fn node(id: i64, east: f64, south: f64) -> String {
    let lat = LAT0 - south / METERS_PER_DEGREE;
    let lon = LON0 + east / (METERS_PER_DEGREE * LAT0.to_radians().cos());
    format!(r#"<node id="{}" lon="{}" lat="{}"/>"#, id, lon, lat)
}

fn way(id: i64, nodes: &[i64], tags: &[(&str, &str)]) -> String {
    let mut out = format!(r#"<way id="{}">"#, id);
    for n in nodes {
        out.push_str(&format!(r#"<nd ref="{}"/>"#, n));
    }
    for (k, v) in tags {
        out.push_str(&format!(r#"<tag k="{}" v="{}"/>"#, k, v));
    }
    out.push_str("</way>");
    out
}

fn osm(body: Vec<String>) -> String {
    format!("<osm>{}</osm>", body.concat())
}

#[test]
fn straight_residential_road() {
    let doc = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 100.0, 0.0),
        way(10, &[1, 2], &[("highway", "residential")]),
    ]);
    let (map, report) = import(&doc, &Options::default()).unwrap();
    assert!(report.is_empty());

    assert_eq!(map.intersections.len(), 2);
    assert_eq!(map.roads.len(), 1);
    assert_eq!(map.road_meshes.len(), 1);
    assert!(map.join_meshes.is_empty());

    let road = &map.roads[0];
    assert_eq!(road.class, RoadClass::Residential);
    assert_eq!(road.width, Distance::meters(6.0));
    assert!(!road.one_way);

    let node_dist = map.intersections[0]
        .point
        .dist_to(map.intersections[1].point);
    assert!((node_dist.inner_meters() - 100.0).abs() < 0.5);

    // The ribbon is a rectangle: width 6, length matching the node distance
    let mesh = &map.road_meshes[0].mesh;
    assert_eq!(mesh.vertices.len(), 4);
    assert_eq!(mesh.num_triangles(), 2);
    for end in [0.0, node_dist.inner_meters()] {
        let cross: Vec<_> = mesh
            .vertices
            .iter()
            .filter(|v| (v.uv[1] - end).abs() < 0.01)
            .collect();
        assert_eq!(cross.len(), 2);
        let dx = cross[0].position[0] - cross[1].position[0];
        let dy = cross[0].position[1] - cross[1].position[1];
        let width = (dx * dx + dy * dy).sqrt();
        assert!((width - 6.0).abs() < 0.01, "cross-section width {}", width);
    }
}

#[test]
fn interior_points_stay_inside_one_edge() {
    let doc = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 50.0, 0.0),
        node(3, 100.0, 0.0),
        way(10, &[1, 2, 3], &[("highway", "residential")]),
    ]);
    let (map, _) = import(&doc, &Options::default()).unwrap();
    // Node 2 belongs to only one way and isn't an endpoint, so it's a polyline vertex, not a
    // graph node
    assert_eq!(map.intersections.len(), 2);
    assert_eq!(map.roads.len(), 1);
    assert_eq!(map.roads[0].center.points().len(), 3);
}

#[test]
fn four_way_intersection() {
    let doc = osm(vec![
        node(100, 0.0, 0.0),
        node(1, 100.0, 0.0),
        node(2, 0.0, 100.0),
        node(3, -100.0, 0.0),
        node(4, 0.0, -100.0),
        way(10, &[100, 1], &[("highway", "residential")]),
        way(11, &[100, 2], &[("highway", "residential")]),
        way(12, &[100, 3], &[("highway", "residential")]),
        way(13, &[100, 4], &[("highway", "residential")]),
    ]);
    let (map, report) = import(&doc, &Options::default()).unwrap();
    assert!(report.is_empty());

    assert_eq!(map.roads.len(), 4);
    let hubs: Vec<_> = map
        .intersections
        .iter()
        .filter(|i| i.degree() == 4)
        .collect();
    assert_eq!(hubs.len(), 1);
    assert_eq!(hubs[0].osm_node, Some(NodeID(100)));

    // One join polygon covers the gap among the 4 ribbons; fanned triangles, no overlap, so
    // their areas sum to the 6x6 gap
    assert_eq!(map.join_meshes.len(), 1);
    let join = &map.join_meshes[0].mesh;
    let mut area = 0.0;
    for tri in join.indices.chunks_exact(3) {
        let a = join.vertices[tri[0] as usize].position;
        let b = join.vertices[tri[1] as usize].position;
        let c = join.vertices[tri[2] as usize].position;
        area += ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])).abs() / 2.0;
    }
    assert!((area - 36.0).abs() < 0.5, "join area {}", area);
}

#[test]
fn dangling_reference_drops_only_that_way() {
    let doc = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 100.0, 0.0),
        way(10, &[1, 999], &[("highway", "residential")]),
    ]);
    let (map, report) = import(&doc, &Options::default()).unwrap();

    assert!(map.roads.is_empty());
    assert_eq!(report.len(), 1);
    assert!(matches!(
        report.errors[0],
        ImportError::DanglingReference { .. }
    ));
}

#[test]
fn reimport_is_deterministic() {
    let doc = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 100.0, 0.0),
        node(3, 50.0, 80.0),
        way(10, &[1, 2], &[("highway", "primary")]),
        way(11, &[2, 3], &[("highway", "footway")]),
        way(
            12,
            &[3, 1],
            &[("highway", "residential"), ("oneway", "yes")],
        ),
    ]);
    let (map1, _) = import(&doc, &Options::default()).unwrap();
    let (map2, _) = import(&doc, &Options::default()).unwrap();

    assert_eq!(map1.projection.origin, map2.projection.origin);
    assert_eq!(map1.intersections.len(), map2.intersections.len());
    assert_eq!(map1.roads.len(), map2.roads.len());
    for (r1, r2) in map1.roads.iter().zip(map2.roads.iter()) {
        assert_eq!(r1.class, r2.class);
        assert_eq!(r1.one_way, r2.one_way);
        assert_eq!(r1.center, r2.center);
    }
}

#[test]
fn merge_tolerance_boundary() {
    // Distinct nodes 0.3m apart merge under the default 0.5m tolerance
    let close = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 100.0, 0.0),
        node(3, 100.3, 0.0),
        node(4, 200.0, 0.0),
        way(10, &[1, 2], &[("highway", "residential")]),
        way(11, &[3, 4], &[("highway", "residential")]),
    ]);
    let (map, _) = import(&close, &Options::default()).unwrap();
    assert_eq!(map.intersections.len(), 3);

    // 1.0m apart stays distinct
    let apart = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 100.0, 0.0),
        node(3, 101.0, 0.0),
        node(4, 200.0, 0.0),
        way(10, &[1, 2], &[("highway", "residential")]),
        way(11, &[3, 4], &[("highway", "residential")]),
    ]);
    let (map, _) = import(&apart, &Options::default()).unwrap();
    assert_eq!(map.intersections.len(), 4);
}

#[test]
fn building_with_height_tag() {
    let doc = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 10.0, 0.0),
        node(3, 10.0, 8.0),
        node(4, 0.0, 8.0),
        way(
            20,
            &[1, 2, 3, 4, 1],
            &[("building", "yes"), ("height", "12")],
        ),
    ]);
    let (map, report) = import(&doc, &Options::default()).unwrap();
    assert!(report.is_empty());

    assert_eq!(map.buildings.len(), 1);
    assert_eq!(map.buildings[0].height, Distance::meters(12.0));
    assert_eq!(map.building_meshes.len(), 1);

    let mesh = &map.building_meshes[0].mesh;
    // 4 footprint vertices: 2 roof triangles plus 2 per wall
    assert_eq!(mesh.num_triangles(), 10);
    let max_z = mesh
        .vertices
        .iter()
        .map(|v| v.position[2])
        .fold(f64::MIN, f64::max);
    assert!((max_z - 12.0).abs() < 0.01);
}

#[test]
fn building_height_from_levels() {
    let doc = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 10.0, 0.0),
        node(3, 10.0, 8.0),
        node(4, 0.0, 8.0),
        way(
            20,
            &[1, 2, 3, 4, 1],
            &[("building", "yes"), ("building:levels", "2")],
        ),
    ]);
    let (map, _) = import(&doc, &Options::default()).unwrap();
    assert_eq!(map.buildings[0].height, Distance::meters(6.0));

    // And no tags at all uses the global default
    let doc = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 10.0, 0.0),
        node(3, 10.0, 8.0),
        node(4, 0.0, 8.0),
        way(20, &[1, 2, 3, 4, 1], &[("building", "yes")]),
    ]);
    let (map, _) = import(&doc, &Options::default()).unwrap();
    assert_eq!(map.buildings[0].height, Distance::meters(10.0));
}

#[test]
fn skipping_building_meshes() {
    let doc = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 10.0, 0.0),
        node(3, 10.0, 8.0),
        node(4, 0.0, 8.0),
        way(20, &[1, 2, 3, 4, 1], &[("building", "yes")]),
    ]);
    let mut opts = Options::default();
    opts.generate_buildings = false;
    let (map, _) = import(&doc, &opts).unwrap();
    // The building is still in the model for queries; only the mesh is skipped
    assert_eq!(map.buildings.len(), 1);
    assert!(map.building_meshes.is_empty());
}

#[test]
fn self_intersecting_footprint_skipped() {
    let doc = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 10.0, 10.0),
        node(3, 10.0, 0.0),
        node(4, 0.0, 10.0),
        way(20, &[1, 2, 3, 4, 1], &[("building", "yes")]),
    ]);
    let (map, report) = import(&doc, &Options::default()).unwrap();
    assert!(map.buildings.is_empty());
    assert_eq!(report.degenerate_geometry(), 1);
}

#[test]
fn multipolygon_building_with_hole() {
    let doc = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 20.0, 0.0),
        node(3, 20.0, 20.0),
        node(4, 0.0, 20.0),
        node(5, 5.0, 5.0),
        node(6, 15.0, 5.0),
        node(7, 15.0, 15.0),
        node(8, 5.0, 15.0),
        way(20, &[1, 2, 3, 4, 1], &[]),
        way(21, &[5, 6, 7, 8, 5], &[]),
        r#"<relation id="30">
             <member type="way" ref="20" role="outer"/>
             <member type="way" ref="21" role="inner"/>
             <tag k="type" v="multipolygon"/>
             <tag k="building" v="yes"/>
           </relation>"#
            .to_string(),
    ]);
    let (map, report) = import(&doc, &Options::default()).unwrap();
    assert!(report.is_empty());

    assert_eq!(map.buildings.len(), 1);
    let b = &map.buildings[0];
    assert_eq!(b.footprint.get_holes().len(), 1);
    // The courtyard is a hole, the ring around it is solid
    assert!(!b.footprint.contains_pt(map.buildings[0].footprint.get_bounds().center()));

    assert_eq!(map.building_meshes.len(), 1);
    assert!(!map.building_meshes[0].mesh.is_empty());
}

#[test]
fn loop_way_splits_into_two_edges() {
    let doc = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 100.0, 0.0),
        node(3, 100.0, 100.0),
        node(4, 0.0, 100.0),
        way(10, &[1, 2, 3, 4, 1], &[("highway", "residential")]),
    ]);
    let (map, _) = import(&doc, &Options::default()).unwrap();

    assert_eq!(map.roads.len(), 2);
    assert_eq!(map.intersections.len(), 2);
    assert!(map.intersections.iter().any(|i| i.osm_node.is_none()));
    for r in &map.roads {
        assert_ne!(r.src_i, r.dst_i);
    }
}

#[test]
fn water_and_poi_areas() {
    let doc = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 30.0, 0.0),
        node(3, 30.0, 30.0),
        node(4, 0.0, 30.0),
        node(5, 100.0, 0.0),
        node(6, 130.0, 0.0),
        node(7, 130.0, 30.0),
        node(8, 100.0, 30.0),
        way(20, &[1, 2, 3, 4, 1], &[("natural", "water")]),
        way(21, &[5, 6, 7, 8, 5], &[("leisure", "park")]),
    ]);
    let (map, _) = import(&doc, &Options::default()).unwrap();
    assert_eq!(map.areas.len(), 2);
    assert_eq!(
        map.areas
            .iter()
            .filter(|a| a.class == street_map::AreaClass::Water)
            .count(),
        1
    );
}

#[test]
fn invalid_config_fails_fast() {
    let mut opts = Options::default();
    opts.merge_tolerance = Distance::meters(-1.0);
    assert!(import("<osm></osm>", &opts).is_err());

    let mut opts = Options::default();
    opts.miter_limit = 0.5;
    assert!(import("<osm></osm>", &opts).is_err());
}

#[test]
fn empty_document_yields_empty_model() {
    let (map, report) = import("<osm></osm>", &Options::default()).unwrap();
    assert!(report.is_empty());
    assert!(map.intersections.is_empty());
    assert!(map.roads.is_empty());
    assert!(map.buildings.is_empty());
}

#[test]
fn spatial_queries_on_the_model() {
    let doc = osm(vec![
        node(1, 0.0, 0.0),
        node(2, 100.0, 0.0),
        way(10, &[1, 2], &[("highway", "residential")]),
    ]);
    let (map, _) = import(&doc, &Options::default()).unwrap();

    let i0 = &map.intersections[0];
    let hit = map.nearest(i0.point, Distance::meters(5.0)).unwrap();
    assert_eq!(
        hit.0,
        street_map::IndexedObject::Intersection(i0.id)
    );

    let candidates = map.query_bbox(&map.bounds);
    assert_eq!(candidates.len(), 2);
}
