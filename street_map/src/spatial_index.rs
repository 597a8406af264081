//! A uniform grid of buckets over world-space points, filled incrementally while the graph
//! builder runs and queried for bounding-box and nearest-neighbor lookups. Queries return a
//! candidate set; callers needing exactness filter it themselves.

use std::collections::HashMap;

use geom::{Bounds, Distance, Pt2D};

#[derive(Clone, Debug)]
pub struct SpatialIndex<K> {
    cell_size: f64,
    cells: HashMap<(i32, i32), Vec<(K, Pt2D)>>,
    len: usize,
}

impl<K: Copy> SpatialIndex<K> {
    pub fn new(cell_size: Distance) -> SpatialIndex<K> {
        assert!(cell_size > Distance::ZERO);
        SpatialIndex {
            cell_size: cell_size.inner_meters(),
            cells: HashMap::new(),
            len: 0,
        }
    }

    fn cell(&self, x: f64, y: f64) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    pub fn insert(&mut self, key: K, pt: Pt2D) {
        let cell = self.cell(pt.x(), pt.y());
        self.cells.entry(cell).or_insert_with(Vec::new).push((key, pt));
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// All keys in cells overlapping the bounding box. This is a candidate set; entries near the
    /// box's edge may be slightly outside it.
    pub fn query_bbox(&self, bounds: &Bounds) -> Vec<K> {
        let (x1, y1) = self.cell(bounds.min_x, bounds.min_y);
        let (x2, y2) = self.cell(bounds.max_x, bounds.max_y);
        let mut results = Vec::new();
        for cx in x1..=x2 {
            for cy in y1..=y2 {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    results.extend(bucket.iter().map(|(k, _)| *k));
                }
            }
        }
        results
    }

    /// The closest entry within max_dist of the query point, if any.
    pub fn nearest(&self, query: Pt2D, max_dist: Distance) -> Option<(K, Pt2D, Distance)> {
        let r = max_dist.inner_meters();
        let (x1, y1) = self.cell(query.x() - r, query.y() - r);
        let (x2, y2) = self.cell(query.x() + r, query.y() + r);

        let mut best: Option<(K, Pt2D, Distance)> = None;
        for cx in x1..=x2 {
            for cy in y1..=y2 {
                if let Some(bucket) = self.cells.get(&(cx, cy)) {
                    for (key, pt) in bucket {
                        let dist = query.dist_to(*pt);
                        if dist <= max_dist
                            && best.as_ref().map_or(true, |(_, _, d)| dist < *d)
                        {
                            best = Some((*key, *pt, dist));
                        }
                    }
                }
            }
        }
        best
    }
}
