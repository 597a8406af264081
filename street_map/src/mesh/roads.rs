//! Turns each road into a closed ribbon and each intersection into a join polygon filling the
//! gap between all the incident ribbons.
//!
//! The steps, roughly:
//!
//! 1) offset each centerline by half the road's width to get the ribbon's left and right edges
//! 2) find where the edges of different roads meeting at an intersection cross
//! 3) trim the centerlines back, so ribbons stop overlapping each other
//! 4) produce a polygon covering the intersection itself, fanned around its center
//!
//! The offsets use miter joins clamped to a maximum length, falling back to a bevel at sharp
//! turns; unclamped miter points can land arbitrarily far away on real-world survey data.

use geom::{Angle, Distance, PolyLine, Pt2D};
use serde::{Deserialize, Serialize};

use crate::graph::{Intersection, IntersectionID, Road, RoadID, StreetGraph};
use crate::mesh::{Mesh, MeshBuilder};
use crate::osm::OsmID;
use crate::report::{ImportError, ImportReport};
use crate::Options;

/// The ribbon for one road, trimmed back at junctions. Corner vertices coincide exactly with
/// the join polygons alongside, so the surface is watertight.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RoadMesh {
    pub road: RoadID,
    pub mesh: Mesh,
}

/// The join polygon for one intersection. Only intersections that need one get a mesh; dead
/// ends are capped flat by their ribbon, and two roads continuing straight through a node meet
/// directly.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JoinMesh {
    pub intersection: IntersectionID,
    pub mesh: Mesh,
}

/// One road's arrival at an intersection: its outgoing direction and half-width there.
struct End {
    road: usize,
    at_src: bool,
    dir: Angle,
    half_width: Distance,
}

struct JoinInput {
    /// Sorted by polar angle around the intersection
    ends: Vec<End>,
    /// corners[k] is where the facing ribbon borders of ends[k] and ends[k + 1] cross, when
    /// they do
    corners: Vec<Option<Pt2D>>,
}

pub fn generate(
    graph: &StreetGraph,
    opts: &Options,
    report: &mut ImportReport,
) -> (Vec<RoadMesh>, Vec<JoinMesh>) {
    let min_len = Distance::meters(0.01);
    let mut skip = vec![false; graph.roads.len()];
    for (idx, r) in graph.roads.iter().enumerate() {
        if r.width <= Distance::ZERO {
            skip[idx] = true;
            report.record(ImportError::DegenerateGeometry {
                id: OsmID::Way(r.osm_way),
                reason: "non-positive road width".to_string(),
            });
        } else if r.center.length() < min_len {
            skip[idx] = true;
            report.record(ImportError::DegenerateGeometry {
                id: OsmID::Way(r.osm_way),
                reason: "zero-length centerline".to_string(),
            });
        }
    }

    // Pass 1: per intersection, order the incident ribbons and find how far each one must pull
    // back
    let mut setbacks: Vec<[Distance; 2]> =
        vec![[Distance::ZERO, Distance::ZERO]; graph.roads.len()];
    let mut join_inputs: Vec<Option<JoinInput>> = Vec::with_capacity(graph.intersections.len());
    for i in &graph.intersections {
        join_inputs.push(plan_join(graph, i, &skip, &mut setbacks, opts));
    }

    // Never consume more than 40% of a road per end; severely squished roads stay visible
    for (idx, r) in graph.roads.iter().enumerate() {
        let max_trim = 0.4 * r.center.length();
        setbacks[idx][0] = setbacks[idx][0].min(max_trim);
        setbacks[idx][1] = setbacks[idx][1].min(max_trim);
    }

    // Pass 2: ribbons from the trimmed centerlines
    let mut trimmed: Vec<Option<PolyLine>> = vec![None; graph.roads.len()];
    let mut road_meshes = Vec::new();
    for (idx, r) in graph.roads.iter().enumerate() {
        if skip[idx] {
            continue;
        }
        let pl = match r
            .center
            .maybe_exact_slice(setbacks[idx][0], r.center.length() - setbacks[idx][1])
        {
            Ok(pl) => pl,
            Err(_) => r.center.clone(),
        };
        road_meshes.push(build_ribbon(r, &pl, opts));
        trimmed[idx] = Some(pl);
    }

    // Pass 3: join polygons, reading the trimmed ribbon ends
    let mut join_meshes = Vec::new();
    for (i, input) in graph.intersections.iter().zip(join_inputs.into_iter()) {
        if let Some(input) = input {
            if let Some(mesh) = build_join(i.point, &input, &trimmed) {
                join_meshes.push(JoinMesh {
                    intersection: i.id,
                    mesh,
                });
            }
        }
    }

    (road_meshes, join_meshes)
}

fn plan_join(
    graph: &StreetGraph,
    i: &Intersection,
    skip: &[bool],
    setbacks: &mut [[Distance; 2]],
    opts: &Options,
) -> Option<JoinInput> {
    let mut ends = Vec::new();
    for r in &i.roads {
        if skip[r.0] {
            continue;
        }
        let road = &graph.roads[r.0];
        let at_src = road.src_i == i.id;
        let dir = if at_src {
            road.center.first_line().angle()
        } else {
            road.center.last_line().angle().opposite()
        };
        ends.push(End {
            road: r.0,
            at_src,
            dir,
            half_width: road.width / 2.0,
        });
    }

    // Dead ends get a flat cap from the ribbon itself
    if ends.len() < 2 {
        return None;
    }
    // Two roads continuing roughly straight through the node: skip the join and let the ribbons
    // meet directly, instead of wasting geometry on every vertex of a simple curve
    if ends.len() == 2 && ends[0].dir.approx_eq(ends[1].dir.opposite(), opts.collinear_skip_degrees)
    {
        return None;
    }

    ends.sort_by(|a, b| {
        a.dir
            .normalized_radians()
            .partial_cmp(&b.dir.normalized_radians())
            .unwrap()
    });

    let n = ends.len();
    let mut corners = vec![None; n];
    for k in 0..n {
        let a = &ends[k];
        let b = &ends[(k + 1) % n];
        // a's border on its increasing-angle side faces b; b's border on its decreasing-angle
        // side faces a. Where those cross, both ribbons must pull back.
        let a_origin = i.point.project_away(a.half_width, a.dir.rotate_degs(90.0));
        let b_origin = i.point.project_away(b.half_width, b.dir.rotate_degs(-90.0));
        if let Some((ta, tb)) = ray_hit(a_origin, a.dir, b_origin, b.dir) {
            // Nearly-parallel neighbors put the crossing absurdly far away; past this cap the
            // ribbons barely overlap anyway, so leave them untrimmed
            let cap = 10.0 * (a.half_width + b.half_width).inner_meters();
            if ta > 0.0 && tb > 0.0 && ta < cap && tb < cap {
                corners[k] = Some(a_origin.project_away(Distance::meters(ta), a.dir));
                let slot_a = if a.at_src { 0 } else { 1 };
                setbacks[a.road][slot_a] = setbacks[a.road][slot_a].max(Distance::meters(ta));
                let slot_b = if b.at_src { 0 } else { 1 };
                setbacks[b.road][slot_b] = setbacks[b.road][slot_b].max(Distance::meters(tb));
            }
            // A crossing behind the node is the outer corner of a bend; the join ring cuts
            // straight across it instead
        }
        // Parallel borders mean a collinear continuation; nothing to trim there
    }

    Some(JoinInput { ends, corners })
}

/// Where do two rays cross? Returns the signed parameter (in meters) along each ray, or None
/// when they're (nearly) parallel.
fn ray_hit(o1: Pt2D, d1: Angle, o2: Pt2D, d2: Angle) -> Option<(f64, f64)> {
    let (s1, c1) = d1.normalized_radians().sin_cos();
    let (s2, c2) = d2.normalized_radians().sin_cos();
    let denom = c1 * s2 - s1 * c2;
    if denom.abs() < 1e-9 {
        return None;
    }
    let dx = o2.x() - o1.x();
    let dy = o2.y() - o1.y();
    let t1 = (dx * s2 - dy * c2) / denom;
    let t2 = (dx * s1 - dy * c1) / denom;
    Some((t1, t2))
}

fn build_ribbon(road: &Road, center: &PolyLine, opts: &Options) -> RoadMesh {
    let half = road.width / 2.0;
    let left = center.shift_with_bevels(-half, opts.miter_limit);
    let right = center.shift_with_bevels(half, opts.miter_limit);

    let mut b = MeshBuilder::new();
    let up = [0.0, 0.0, 1.0];
    // u crosses the road, v runs along it in meters
    let lv: Vec<u32> = left
        .pts
        .iter()
        .zip(&left.dist_along)
        .map(|(pt, d)| b.vertex([pt.x(), pt.y(), 0.0], up, [0.0, d.inner_meters()]))
        .collect();
    let rv: Vec<u32> = right
        .pts
        .iter()
        .zip(&right.dist_along)
        .map(|(pt, d)| b.vertex([pt.x(), pt.y(), 0.0], up, [1.0, d.inner_meters()]))
        .collect();

    // Stitch the two sides into a triangle strip, advancing whichever side's next point comes
    // sooner along the centerline. Bevels make the sides different lengths, so a plain
    // quad-per-segment walk doesn't work.
    let mut i = 0;
    let mut j = 0;
    while i + 1 < lv.len() || j + 1 < rv.len() {
        let advance_left = if j + 1 == rv.len() {
            true
        } else if i + 1 == lv.len() {
            false
        } else {
            left.dist_along[i + 1] <= right.dist_along[j + 1]
        };
        if advance_left {
            b.triangle(lv[i], rv[j], lv[i + 1]);
            i += 1;
        } else {
            b.triangle(lv[i], rv[j], rv[j + 1]);
            j += 1;
        }
    }

    RoadMesh {
        road: road.id,
        mesh: b.build(),
    }
}

fn build_join(center: Pt2D, input: &JoinInput, trimmed: &[Option<PolyLine>]) -> Option<Mesh> {
    let near = Distance::meters(0.001);

    let mut ring: Vec<Pt2D> = Vec::new();
    let mut max_half = Distance::ZERO;
    for (k, e) in input.ends.iter().enumerate() {
        let pl = trimmed[e.road].as_ref()?;
        let (end_pt, out_dir) = if e.at_src {
            (pl.first_pt(), pl.first_line().angle())
        } else {
            (pl.last_pt(), pl.last_line().angle().opposite())
        };
        // The ribbon end's two corners, in increasing-angle order, then the crossing point
        // toward the next ribbon
        ring.push(end_pt.project_away(e.half_width, out_dir.rotate_degs(-90.0)));
        ring.push(end_pt.project_away(e.half_width, out_dir.rotate_degs(90.0)));
        if let Some(c) = input.corners[k] {
            ring.push(c);
        }
        max_half = max_half.max(e.half_width);
    }

    ring.dedup_by(|a, b| a.dist_to(*b) < near);
    while ring.len() > 1 && ring[0].dist_to(*ring.last().unwrap()) < near {
        ring.pop();
    }
    if ring.len() < 3 {
        return None;
    }

    // Fan from the intersection's center. The ring can be non-convex for high degrees or very
    // uneven widths; minor overdraw there is accepted.
    let mut b = MeshBuilder::new();
    let up = [0.0, 0.0, 1.0];
    let scale = (4.0 * max_half.inner_meters()).max(0.1);
    let uv_of = |pt: Pt2D| {
        [
            (pt.x() - center.x()) / scale + 0.5,
            (pt.y() - center.y()) / scale + 0.5,
        ]
    };
    let c = b.vertex([center.x(), center.y(), 0.0], up, [0.5, 0.5]);
    let ring_v: Vec<u32> = ring
        .iter()
        .map(|pt| b.vertex([pt.x(), pt.y(), 0.0], up, uv_of(*pt)))
        .collect();
    for k in 0..ring_v.len() {
        b.triangle(c, ring_v[k], ring_v[(k + 1) % ring_v.len()]);
    }
    Some(b.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{RawRoad, RawStreets, RoadClass};
    use crate::osm::{NodeID, Tags, WayID};

    fn graph_of(roads: Vec<(i64, Vec<(i64, f64, f64)>)>) -> (StreetGraph, ImportReport) {
        let raw = RawStreets {
            roads: roads
                .into_iter()
                .map(|(id, nodes)| RawRoad {
                    id: WayID(id),
                    nodes: nodes.iter().map(|(n, _, _)| NodeID(*n)).collect(),
                    pts: nodes.iter().map(|(_, x, y)| Pt2D::new(*x, *y)).collect(),
                    class: RoadClass::Residential,
                    width: Distance::meters(6.0),
                    one_way: false,
                    name: None,
                    tags: Tags::empty(),
                })
                .collect(),
            ..Default::default()
        };
        let mut report = ImportReport::new();
        let graph = StreetGraph::build(&raw, &Options::default(), &mut report);
        (graph, report)
    }

    #[test]
    fn straight_ribbon_is_a_rectangle() {
        let (graph, _) = graph_of(vec![(1, vec![(10, 0.0, 0.0), (11, 50.0, 0.0)])]);
        let mut report = ImportReport::new();
        let (roads, joins) = generate(&graph, &Options::default(), &mut report);
        assert!(report.is_empty());
        assert!(joins.is_empty());
        assert_eq!(roads.len(), 1);

        let mesh = &roads[0].mesh;
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.num_triangles(), 2);
        for v in &mesh.vertices {
            assert!(v.position[1].abs() == 3.0);
            assert!(v.position[0] == 0.0 || v.position[0] == 50.0);
            assert_eq!(v.normal, [0.0, 0.0, 1.0]);
        }
    }

    #[test]
    fn four_way_gets_one_join_and_trimmed_ribbons() {
        let (graph, _) = graph_of(vec![
            (1, vec![(100, 0.0, 0.0), (1, 50.0, 0.0)]),
            (2, vec![(100, 0.0, 0.0), (2, 0.0, 50.0)]),
            (3, vec![(100, 0.0, 0.0), (3, -50.0, 0.0)]),
            (4, vec![(100, 0.0, 0.0), (4, 0.0, -50.0)]),
        ]);
        let mut report = ImportReport::new();
        let (roads, joins) = generate(&graph, &Options::default(), &mut report);
        assert_eq!(roads.len(), 4);
        assert_eq!(joins.len(), 1);

        // Every ribbon pulls back 3m (the neighbors' half-width) from the shared node
        for rm in &roads {
            for v in &rm.mesh.vertices {
                let dist = (v.position[0].powi(2) + v.position[1].powi(2)).sqrt();
                assert!(dist >= 3.0 - 0.01, "ribbon vertex too close: {:?}", v.position);
            }
        }

        // The join polygon is the 6x6 square gap, fanned from the center with no overlap
        let join = &joins[0].mesh;
        let mut area = 0.0;
        for tri in join.indices.chunks_exact(3) {
            let a = join.vertices[tri[0] as usize].position;
            let b = join.vertices[tri[1] as usize].position;
            let c = join.vertices[tri[2] as usize].position;
            area += ((b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])).abs() / 2.0;
        }
        assert!((area - 36.0).abs() < 0.1, "join area {}", area);
    }

    #[test]
    fn collinear_degree_two_meets_directly() {
        let (graph, _) = graph_of(vec![
            (1, vec![(10, 0.0, 0.0), (11, 50.0, 0.0)]),
            (2, vec![(11, 50.0, 0.0), (12, 100.0, 0.0)]),
        ]);
        let mut report = ImportReport::new();
        let (roads, joins) = generate(&graph, &Options::default(), &mut report);
        assert_eq!(roads.len(), 2);
        assert!(joins.is_empty());
        // No trimming; the ribbons share the boundary at x=50
        let max_x: f64 = roads[0]
            .mesh
            .vertices
            .iter()
            .map(|v| v.position[0])
            .fold(f64::MIN, f64::max);
        assert_eq!(max_x, 50.0);
    }

    #[test]
    fn right_angle_elbow_trims_both() {
        let (graph, _) = graph_of(vec![
            (1, vec![(10, -50.0, 0.0), (11, 0.0, 0.0)]),
            (2, vec![(11, 0.0, 0.0), (12, 0.0, 50.0)]),
        ]);
        let mut report = ImportReport::new();
        let (roads, joins) = generate(&graph, &Options::default(), &mut report);
        assert_eq!(roads.len(), 2);
        assert_eq!(joins.len(), 1);
    }
}
