//! Extrudes validated building footprints into simple 3D meshes: an earcut roof cap at the
//! building's height and one quad per footprint edge for the walls. Walls keep their own
//! corner vertices so each face gets a proper normal; there's no bottom cap, since buildings
//! sit on the ground plane.

use geom::{Pt2D, Ring, Tessellation};
use serde::{Deserialize, Serialize};

use crate::mesh::{Mesh, MeshBuilder};
use crate::model::{Building, BuildingID};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildingMesh {
    pub building: BuildingID,
    pub mesh: Mesh,
}

pub fn generate(buildings: &[Building]) -> Vec<BuildingMesh> {
    buildings
        .iter()
        .map(|b| BuildingMesh {
            building: b.id,
            mesh: extrude(b),
        })
        .collect()
}

fn extrude(b: &Building) -> Mesh {
    let height = b.height.inner_meters();
    let bounds = b.footprint.get_bounds();
    let mut builder = MeshBuilder::new();

    // Roof cap
    let up = [0.0, 0.0, 1.0];
    let (pts, indices) = Tessellation::from(b.footprint.clone()).consume();
    let roof: Vec<u32> = pts
        .iter()
        .map(|pt| {
            builder.vertex(
                [pt.x(), pt.y(), height],
                up,
                [
                    (pt.x() - bounds.min_x) / bounds.width().max(0.1),
                    (pt.y() - bounds.min_y) / bounds.height().max(0.1),
                ],
            )
        })
        .collect();
    for tri in indices.chunks_exact(3) {
        builder.triangle(
            roof[tri[0] as usize],
            roof[tri[1] as usize],
            roof[tri[2] as usize],
        );
    }

    // Walls, for the outer ring and around any holes. The model builder normalized windings
    // (outer counter-clockwise, holes clockwise), so the same edge rotation always faces the
    // normal away from the solid.
    if let Some(outer) = b.footprint.get_outer_ring() {
        walls(&mut builder, &outer, height);
    }
    for hole in b.footprint.get_holes() {
        walls(&mut builder, &hole, height);
    }

    builder.build()
}

fn walls(builder: &mut MeshBuilder, ring: &Ring, height: f64) {
    let mut wall_u = 0.0;
    for pair in ring.points().windows(2) {
        let (p1, p2): (Pt2D, Pt2D) = (pair[0], pair[1]);
        let len = p1.dist_to(p2).inner_meters();
        let dx = (p2.x() - p1.x()) / len;
        let dy = (p2.y() - p1.y()) / len;
        let normal = [dy, -dx, 0.0];

        let b1 = builder.vertex([p1.x(), p1.y(), 0.0], normal, [wall_u, 0.0]);
        let b2 = builder.vertex([p2.x(), p2.y(), 0.0], normal, [wall_u + len, 0.0]);
        let t2 = builder.vertex([p2.x(), p2.y(), height], normal, [wall_u + len, height]);
        let t1 = builder.vertex([p1.x(), p1.y(), height], normal, [wall_u, height]);

        builder.triangle(b1, b2, t2);
        builder.triangle(b1, t2, t1);

        wall_u += len;
    }
}
