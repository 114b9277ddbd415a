use rstar::{primitives::GeomWithData, RTree, AABB};

use crate::attributes::Sounding;
use crate::mesh::TriMesh;

/// Collect the immutable sounding set from a freshly loaded mesh: one
/// sounding per vertex, with the vertex's own tolerance as its uncertainty.
pub fn collect_soundings(mesh: &TriMesh) -> Vec<Sounding> {
    mesh.vertices()
        .map(|vertex| Sounding {
            position: mesh.point(vertex),
            uncertainty: mesh.attributes(vertex).z_offset,
        })
        .collect()
}

type IndexedPoint = GeomWithData<[f64; 2], usize>;

/// Bulk-built R-tree over the sounding positions.
///
/// Rebuilt at the start of every simplification iteration and queried
/// read-only while candidates are processed, so queries always answer
/// against the original survey rather than any derived set.
pub struct SoundingIndex {
    tree: RTree<IndexedPoint>,
}

impl SoundingIndex {
    pub fn build(soundings: &[Sounding]) -> Self {
        let entries = soundings
            .iter()
            .enumerate()
            .map(|(i, s)| GeomWithData::new([s.position.x, s.position.y], i))
            .collect();
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Indices of the soundings inside the rectangle (borders included),
    /// ascending. This is only the coarse stage; callers still run the
    /// exact polygon test on each hit.
    pub fn query_envelope(&self, rect: &geo::Rect<f64>) -> Vec<usize> {
        let envelope = AABB::from_corners(
            [rect.min().x, rect.min().y],
            [rect.max().x, rect.max().y],
        );
        let mut hits: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&envelope)
            .map(|entry| entry.data)
            .collect();
        hits.sort_unstable();
        hits
    }
}
