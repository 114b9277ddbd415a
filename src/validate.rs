use geo::{Coord, Intersects, Point, Triangle};
use nalgebra::Point3;
use rayon::prelude::*;
use rstar::{
    primitives::{GeomWithData, Rectangle},
    RTree,
};

use crate::attributes::Sounding;
use crate::geometry::interpolate_within_tolerance;
use crate::mesh::TriMesh;

/// Re-check every sounding against the simplified mesh.
///
/// Each sounding must be covered by a triangle that interpolates its depth to
/// within the sounding's own uncertainty; the positions of the soundings that
/// are not are returned in input order. A sounding no triangle covers counts
/// as a violation.
///
/// The sweep is read-only over the mesh, so it runs in parallel.
pub fn validate_mesh(mesh: &TriMesh, soundings: &[Sounding]) -> Vec<Point3<f64>> {
    let triangles: Vec<[Point3<f64>; 3]> = mesh
        .faces()
        .map(|face| mesh.face_vertices(face).map(|vertex| mesh.point(vertex)))
        .collect();

    let entries: Vec<GeomWithData<Rectangle<[f64; 2]>, usize>> = triangles
        .iter()
        .enumerate()
        .map(|(i, t)| {
            let min = [
                t[0].x.min(t[1].x).min(t[2].x),
                t[0].y.min(t[1].y).min(t[2].y),
            ];
            let max = [
                t[0].x.max(t[1].x).max(t[2].x),
                t[0].y.max(t[1].y).max(t[2].y),
            ];
            GeomWithData::new(Rectangle::from_corners(min, max), i)
        })
        .collect();
    let tree = RTree::bulk_load(entries);

    soundings
        .par_iter()
        .filter_map(|sounding| {
            let location = Point::new(sounding.position.x, sounding.position.y);
            // bbox candidates from the tree, then the exact coverage test;
            // take the lowest face index so the answer is deterministic
            let covering = tree
                .locate_all_at_point(&[sounding.position.x, sounding.position.y])
                .map(|entry| entry.data)
                .filter(|&i| {
                    let t = &triangles[i];
                    Triangle::new(
                        Coord { x: t[0].x, y: t[0].y },
                        Coord { x: t[1].x, y: t[1].y },
                        Coord { x: t[2].x, y: t[2].y },
                    )
                    .intersects(&location)
                })
                .min();

            match covering {
                Some(i) => {
                    let t = &triangles[i];
                    if interpolate_within_tolerance(
                        &t[0],
                        &t[1],
                        &t[2],
                        &sounding.position,
                        sounding.uncertainty,
                    ) {
                        None
                    } else {
                        Some(sounding.position)
                    }
                }
                None => Some(sounding.position),
            }
        })
        .collect()
}
