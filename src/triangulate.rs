use ahash::AHashMap;
use anyhow::{anyhow, bail, Result};
use geo::{Centroid, Contains, Coord, LineString, Polygon, Triangle};
use itertools::Itertools;
use spade::{ConstrainedDelaunayTriangulation, Point2, Triangulation};

/// Constrained Delaunay triangulation of a simple ring polygon, with every
/// ring edge as a constraint and no added vertices.
///
/// The ring is the link of a removal candidate, so it is small and the
/// result must close the hole exactly: `ring.len() - 2` triangles, each a
/// triple of indices into `ring`. Self-touching or non-simple rings are
/// errors, which the caller treats as a rejection of the candidate.
pub fn triangulate_ring(ring: &[(f64, f64)]) -> Result<Vec<[usize; 3]>> {
    if ring.len() < 3 {
        bail!("ring polygon has {} vertices, need at least 3", ring.len());
    }
    let polygon = Polygon::new(LineString::from(ring.to_vec()), vec![]);

    let mut cdt = ConstrainedDelaunayTriangulation::<Point2<f64>>::new();
    let mut handles = Vec::with_capacity(ring.len());
    let mut ring_index: AHashMap<usize, usize> = AHashMap::with_capacity(ring.len());
    for (i, &(x, y)) in ring.iter().enumerate() {
        let handle = cdt
            .insert(Point2::new(x, y))
            .map_err(|e| anyhow!("ring vertex {} rejected: {:?}", i, e))?;
        if ring_index.insert(handle.index(), i).is_some() {
            // spade merged two insertions, so the polygon touches itself
            bail!("ring polygon repeats vertex {}", i);
        }
        handles.push(handle);
    }

    for (a, b) in handles.iter().copied().circular_tuple_windows() {
        if !cdt.can_add_constraint(a, b) {
            bail!("ring polygon is not simple");
        }
        cdt.add_constraint(a, b);
    }

    // the CDT covers the convex hull of the ring; keep the faces whose
    // centroid falls inside the polygon
    let mut triangles = Vec::with_capacity(ring.len() - 2);
    for face in cdt.inner_faces() {
        let vertices = face.vertices();
        let corners = vertices.map(|v| {
            let position = v.position();
            Coord {
                x: position.x,
                y: position.y,
            }
        });
        let centroid = Triangle::new(corners[0], corners[1], corners[2]).centroid();
        if polygon.contains(&centroid) {
            triangles.push([
                ring_index[&vertices[0].fix().index()],
                ring_index[&vertices[1].fix().index()],
                ring_index[&vertices[2].fix().index()],
            ]);
        }
    }

    if triangles.len() != ring.len() - 2 {
        bail!(
            "retriangulation produced {} triangles for a {}-gon",
            triangles.len(),
            ring.len()
        );
    }
    Ok(triangles)
}
