pub mod gr3;
pub mod vtk;
pub mod xyz;

use ahash::AHashMap;
use log::warn;

use crate::geometry::signed_area_xy;
use crate::mesh::{FaceHandle, TriMesh, VertexHandle};

/// Corners of a face reordered counter-clockwise in xy for emission.
/// Degenerate faces come back in stored order.
pub(crate) fn ccw_face(mesh: &TriMesh, face: FaceHandle) -> [VertexHandle; 3] {
    let [a, b, c] = mesh.face_vertices(face);
    let area = signed_area_xy(&mesh.point(a), &mesh.point(b), &mesh.point(c));
    if area < 0.0 {
        [c, b, a]
    } else {
        if area == 0.0 {
            warn!("face {:?} is collinear", face);
        }
        [a, b, c]
    }
}

/// Dense 0-based ids for the live vertices, in handle order. This is how the
/// writers renumber a mesh that may not have been compacted yet.
pub(crate) fn dense_vertex_ids(mesh: &TriMesh) -> AHashMap<VertexHandle, usize> {
    mesh.vertices()
        .enumerate()
        .map(|(i, vertex)| (vertex, i))
        .collect()
}
