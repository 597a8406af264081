//! Builds the street graph from classified road ways: intersections (graph nodes) and road
//! segments (graph edges), with deduplicated nodes.
//!
//! A node becomes an intersection if it's the endpoint of any road way or shared by at least
//! two. Nodes closer together than the merge tolerance unify into one intersection; this
//! absorbs duplicated survey points without collapsing genuinely distinct junctions. Ways
//! passing through interior nodes keep them as polyline vertices inside one edge.

use std::collections::HashMap;

use geom::{Distance, PolyLine, Pt2D};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::extract::{RawRoad, RawStreets, RoadClass};
use crate::osm::{NodeID, OsmID, Tags, WayID};
use crate::report::{ImportError, ImportReport};
use crate::spatial_index::SpatialIndex;
use crate::Options;

#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct IntersectionID(pub usize);
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct RoadID(pub usize);

impl fmt::Display for IntersectionID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Intersection #{}", self.0)
    }
}
impl fmt::Display for RoadID {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Road #{}", self.0)
    }
}

/// A graph node: a junction, dead end, or synthetic split point.
#[derive(Clone, Debug, Serialize)]
pub struct Intersection {
    pub id: IntersectionID,
    pub point: Pt2D,
    /// The source OSM node, unless this intersection was synthesized (splitting a loop road).
    pub osm_node: Option<NodeID>,
    /// Roads incident to this intersection, in the order they were created.
    pub roads: Vec<RoadID>,
}

impl Intersection {
    pub fn degree(&self) -> usize {
        self.roads.len()
    }

    pub fn is_dead_end(&self) -> bool {
        self.roads.len() == 1
    }
}

/// A graph edge: the road segment between two distinct intersections, carrying the centerline
/// polyline and the metadata the mesh generator needs.
#[derive(Clone, Debug, Serialize)]
pub struct Road {
    pub id: RoadID,
    pub src_i: IntersectionID,
    pub dst_i: IntersectionID,
    pub center: PolyLine,
    pub class: RoadClass,
    pub width: Distance,
    pub one_way: bool,
    pub osm_way: WayID,
    pub name: Option<String>,
    pub tags: Tags,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct StreetGraph {
    pub intersections: Vec<Intersection>,
    pub roads: Vec<Road>,
}

impl StreetGraph {
    pub fn build(raw: &RawStreets, opts: &Options, report: &mut ImportReport) -> StreetGraph {
        let mut g = StreetGraph::default();
        let mut index: SpatialIndex<IntersectionID> = SpatialIndex::new(opts.index_cell_size);
        let mut node_to_intersection: HashMap<NodeID, IntersectionID> = HashMap::new();

        // How many times road ways reference each node; seeing a node twice makes it a junction
        let mut counts_per_node: HashMap<NodeID, usize> = HashMap::new();
        for r in &raw.roads {
            for n in &r.nodes {
                *counts_per_node.entry(*n).or_insert(0) += 1;
            }
        }

        for r in &raw.roads {
            let last_idx = r.nodes.len() - 1;
            let mut pts: Vec<Pt2D> = Vec::new();
            let mut src_i: Option<IntersectionID> = None;

            for (idx, (n, pt)) in r.nodes.iter().zip(r.pts.iter()).enumerate() {
                let is_junction =
                    idx == 0 || idx == last_idx || counts_per_node[n] >= 2;
                if !is_junction {
                    pts.push(*pt);
                    continue;
                }

                let i = g.intersection_for(&mut index, &mut node_to_intersection, opts, *n, *pt);
                // Snap the endpoint to the (possibly merged) intersection position, so ribbons
                // stay watertight
                let snapped = g.intersections[i.0].point;
                match src_i {
                    None => {
                        src_i = Some(i);
                        pts = vec![snapped];
                    }
                    Some(src) => {
                        pts.push(snapped);
                        g.add_road(r, src, i, std::mem::take(&mut pts), report);
                        src_i = Some(i);
                        pts = vec![snapped];
                    }
                }
            }
        }

        info!(
            "Built graph with {} intersections and {} roads",
            g.intersections.len(),
            g.roads.len()
        );
        g
    }

    /// Finds the intersection for this node: by identity if the node was seen before, by
    /// proximity if another intersection sits within the merge tolerance, else a new one.
    fn intersection_for(
        &mut self,
        index: &mut SpatialIndex<IntersectionID>,
        node_to_intersection: &mut HashMap<NodeID, IntersectionID>,
        opts: &Options,
        n: NodeID,
        pt: Pt2D,
    ) -> IntersectionID {
        if let Some(i) = node_to_intersection.get(&n) {
            return *i;
        }
        if let Some((i, _, _)) = index.nearest(pt, opts.merge_tolerance) {
            node_to_intersection.insert(n, i);
            return i;
        }
        let id = IntersectionID(self.intersections.len());
        self.intersections.push(Intersection {
            id,
            point: pt,
            osm_node: Some(n),
            roads: Vec::new(),
        });
        index.insert(id, pt);
        node_to_intersection.insert(n, id);
        id
    }

    fn add_road(
        &mut self,
        raw: &RawRoad,
        src_i: IntersectionID,
        dst_i: IntersectionID,
        pts: Vec<Pt2D>,
        report: &mut ImportReport,
    ) {
        let center = match PolyLine::new(pts) {
            Ok(pl) => pl,
            Err(_) => {
                // All the points collapsed into the merged intersections
                report.record(ImportError::DegenerateGeometry {
                    id: OsmID::Way(raw.id),
                    reason: "road segment has no length after node dedup".to_string(),
                });
                return;
            }
        };

        let center = if center.self_crossing() {
            report.record(ImportError::DegenerateGeometry {
                id: OsmID::Way(raw.id),
                reason: "self-intersecting centerline, straightened".to_string(),
            });
            match PolyLine::new(vec![center.first_pt(), center.last_pt()]) {
                Ok(pl) => pl,
                Err(_) => {
                    return;
                }
            }
        } else {
            center
        };

        if src_i == dst_i {
            self.split_loop(raw, src_i, center, report);
            return;
        }
        self.push_road(raw, src_i, dst_i, center);
    }

    /// A road starting and ending at the same intersection breaks the two-distinct-endpoints
    /// invariant; split it at its midpoint around a synthetic intersection.
    fn split_loop(
        &mut self,
        raw: &RawRoad,
        i: IntersectionID,
        center: PolyLine,
        report: &mut ImportReport,
    ) {
        let half = center.length() / 2.0;
        let (first, second) = match (
            center.maybe_exact_slice(Distance::ZERO, half),
            center.maybe_exact_slice(half, center.length()),
        ) {
            (Ok(a), Ok(b)) => (a, b),
            _ => {
                report.record(ImportError::DegenerateGeometry {
                    id: OsmID::Way(raw.id),
                    reason: "loop road too short to split".to_string(),
                });
                return;
            }
        };

        let mid = IntersectionID(self.intersections.len());
        self.intersections.push(Intersection {
            id: mid,
            point: first.last_pt(),
            osm_node: None,
            roads: Vec::new(),
        });

        self.push_road(raw, i, mid, first);
        self.push_road(raw, mid, i, second);
    }

    fn push_road(
        &mut self,
        raw: &RawRoad,
        src_i: IntersectionID,
        dst_i: IntersectionID,
        center: PolyLine,
    ) {
        let id = RoadID(self.roads.len());
        self.roads.push(Road {
            id,
            src_i,
            dst_i,
            center,
            class: raw.class,
            width: raw.width,
            one_way: raw.one_way,
            osm_way: raw.id,
            name: raw.name.clone(),
            tags: raw.tags.clone(),
        });
        self.intersections[src_i.0].roads.push(id);
        self.intersections[dst_i.0].roads.push(id);
    }

    pub fn road(&self, id: RoadID) -> &Road {
        &self.roads[id.0]
    }

    pub fn intersection(&self, id: IntersectionID) -> &Intersection {
        &self.intersections[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_road(id: i64, nodes: Vec<i64>, pts: Vec<Pt2D>) -> RawRoad {
        RawRoad {
            id: WayID(id),
            nodes: nodes.into_iter().map(NodeID).collect(),
            pts,
            class: RoadClass::Residential,
            width: Distance::meters(6.0),
            one_way: false,
            name: None,
            tags: Tags::empty(),
        }
    }

    fn build(roads: Vec<RawRoad>) -> (StreetGraph, ImportReport) {
        let raw = RawStreets {
            roads,
            ..Default::default()
        };
        let mut report = ImportReport::new();
        let g = StreetGraph::build(&raw, &Options::default(), &mut report);
        (g, report)
    }

    #[test]
    fn interior_shared_node_splits_ways() {
        // Two ways crossing at a shared interior node
        let (g, report) = build(vec![
            raw_road(
                1,
                vec![10, 11, 12],
                vec![
                    Pt2D::new(0.0, 0.0),
                    Pt2D::new(50.0, 0.0),
                    Pt2D::new(100.0, 0.0),
                ],
            ),
            raw_road(
                2,
                vec![20, 11, 21],
                vec![
                    Pt2D::new(50.0, -50.0),
                    Pt2D::new(50.0, 0.0),
                    Pt2D::new(50.0, 50.0),
                ],
            ),
        ]);
        assert!(report.is_empty());
        assert_eq!(g.intersections.len(), 5);
        assert_eq!(g.roads.len(), 4);
        let center = g
            .intersections
            .iter()
            .find(|i| i.osm_node == Some(NodeID(11)))
            .unwrap();
        assert_eq!(center.degree(), 4);
    }

    #[test]
    fn merge_tolerance_unifies_nearby_nodes() {
        // Two ways ending at distinct nodes 0.3m apart; default tolerance is 0.5m
        let (g, _) = build(vec![
            raw_road(
                1,
                vec![10, 11],
                vec![Pt2D::new(0.0, 0.0), Pt2D::new(100.0, 0.0)],
            ),
            raw_road(
                2,
                vec![20, 21],
                vec![Pt2D::new(100.3, 0.0), Pt2D::new(200.0, 0.0)],
            ),
        ]);
        assert_eq!(g.intersections.len(), 3);

        // And 0.7m apart stays distinct
        let (g, _) = build(vec![
            raw_road(
                1,
                vec![10, 11],
                vec![Pt2D::new(0.0, 0.0), Pt2D::new(100.0, 0.0)],
            ),
            raw_road(
                2,
                vec![20, 21],
                vec![Pt2D::new(100.7, 0.0), Pt2D::new(200.0, 0.0)],
            ),
        ]);
        assert_eq!(g.intersections.len(), 4);
    }

    #[test]
    fn loop_road_splits_at_midpoint() {
        let (g, report) = build(vec![raw_road(
            1,
            vec![10, 11, 12, 13, 10],
            vec![
                Pt2D::new(0.0, 0.0),
                Pt2D::new(100.0, 0.0),
                Pt2D::new(100.0, 100.0),
                Pt2D::new(0.0, 100.0),
                Pt2D::new(0.0, 0.0),
            ],
        )]);
        assert!(report.is_empty());
        assert_eq!(g.roads.len(), 2);
        assert_eq!(g.intersections.len(), 2);
        let synthetic = g.intersections.iter().find(|i| i.osm_node.is_none()).unwrap();
        assert_eq!(synthetic.degree(), 2);
        for r in &g.roads {
            assert_ne!(r.src_i, r.dst_i);
            assert_eq!(r.center.length(), Distance::meters(200.0));
        }
    }

    #[test]
    fn collapsed_segment_reported() {
        // Both nodes merge into one intersection, leaving a zero-length road
        let (g, report) = build(vec![raw_road(
            1,
            vec![10, 11],
            vec![Pt2D::new(0.0, 0.0), Pt2D::new(0.2, 0.0)],
        )]);
        assert_eq!(g.roads.len(), 0);
        assert_eq!(report.degenerate_geometry(), 1);
    }
}
