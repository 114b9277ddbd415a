use ahash::AHashSet;
use anyhow::Result;
use geo::{BoundingRect, Coord, Intersects, LineString, Point, Polygon, Triangle};
use log::{debug, info};

use crate::attributes::{Omit, Sounding};
use crate::geometry::{interpolate_within_tolerance, signed_area_xy, triangle_aspect, Compass};
use crate::index::SoundingIndex;
use crate::mesh::{TriMesh, VertexHandle};
use crate::triangulate::triangulate_ring;

/// Knobs for a simplification run.
#[derive(Debug, Clone, Copy, Default)]
pub struct SimplifyOptions {
    /// Largest xy area an accepted removal may leave behind in any new
    /// triangle. A value `<= 0` disables the check.
    pub max_triangle_area: f64,
    /// Require removals to preserve the compass aspect of the faces around
    /// the candidate.
    pub aspect_constraint: bool,
}

/// Counts reported after each simplification iteration.
#[derive(Debug, Clone, Copy)]
pub struct IterationReport {
    pub iteration: u32,
    pub vertices_before: usize,
    pub vertices_after: usize,
    pub faces_before: usize,
    pub faces_after: usize,
    /// Vertices skipped by the eligibility guards this iteration.
    pub omitted: usize,
}

/// Iteratively remove vertices until the mesh stops shrinking.
///
/// Each iteration rebuilds the sounding index, walks the live vertices from
/// shallow to deep attempting an atomic remove-and-retriangulate on each
/// eligible one, and compacts the mesh. `per_iteration` runs after every
/// compaction (the binary writes the iteration's output files there); its
/// error aborts the run.
pub fn simplify<F>(
    mesh: &mut TriMesh,
    soundings: &[Sounding],
    options: &SimplifyOptions,
    mut per_iteration: F,
) -> Result<Vec<IterationReport>>
where
    F: FnMut(u32, &TriMesh) -> Result<()>,
{
    let mut reports = Vec::new();
    let mut iteration = 1u32;
    loop {
        let vertices_before = mesh.n_vertices();
        let faces_before = mesh.n_faces();
        info!("iteration {}", iteration);
        info!("  vertices before: {}", vertices_before);
        info!("  triangles before: {}", faces_before);
        info!("  average depth before: {}", mesh.average_depth());

        let index = SoundingIndex::build(soundings);

        // snapshot the ordering once per iteration: shallow vertices first,
        // ties by handle order (the sort is stable)
        let mut order: Vec<VertexHandle> = mesh.vertices().collect();
        order.sort_by(|a, b| mesh.point(*a).z.total_cmp(&mesh.point(*b).z));

        let mut omitted = 0usize;
        for vertex in order {
            if !mesh.is_live_vertex(vertex) {
                continue;
            }
            let attributes = *mesh.attributes(vertex);
            if attributes.omit != Omit::Eligible {
                omitted += 1;
            } else if attributes.z_offset > mesh.point(vertex).z {
                // shallower than its own tolerance, keep it
                omitted += 1;
            } else {
                vertex_removal(mesh, vertex, &index, soundings, options);
            }
        }

        mesh.garbage_collection();

        let vertices_after = mesh.n_vertices();
        let faces_after = mesh.n_faces();
        info!("  vertices after: {}", vertices_after);
        info!("  triangles after: {}", faces_after);
        info!("  average depth after: {}", mesh.average_depth());
        info!("  omitted vertices: {}", omitted);

        reports.push(IterationReport {
            iteration,
            vertices_before,
            vertices_after,
            faces_before,
            faces_after,
            omitted,
        });
        per_iteration(iteration, mesh)?;

        if vertices_after == vertices_before {
            break;
        }
        iteration += 1;
    }
    Ok(reports)
}

/// Attempt to remove one candidate vertex, retriangulating its hole.
///
/// The removal happens only if the retriangulation preserves aspect (when
/// asked), respects the triangle area cap (when asked), and interpolates
/// every sounding inside the hole to within the candidate's own tolerance.
/// Any failure leaves the mesh untouched. Returns whether the vertex was
/// removed.
pub fn vertex_removal(
    mesh: &mut TriMesh,
    vertex: VertexHandle,
    index: &SoundingIndex,
    soundings: &[Sounding],
    options: &SimplifyOptions,
) -> bool {
    let ring = match mesh.one_ring(vertex) {
        Ok(ring) => ring,
        Err(e) => {
            debug!("candidate {:?} rejected: {}", vertex, e);
            return false;
        }
    };
    let z_offset = mesh.attributes(vertex).z_offset;

    // aspect of every face currently around the candidate; a star that
    // already spans several octants carries no single aspect to preserve,
    // so the aspect test is skipped for it
    let mut aspects_before: AHashSet<Compass> = AHashSet::new();
    let mut aspect_applicable = false;
    if options.aspect_constraint {
        for face in mesh.vertex_faces(vertex) {
            let [a, b, c] = mesh.face_vertices(face);
            aspects_before.insert(triangle_aspect(
                &mesh.point(a),
                &mesh.point(b),
                &mesh.point(c),
            ));
        }
        aspect_applicable = aspects_before.len() <= 1;
    }

    let ring_xy: Vec<(f64, f64)> = ring
        .iter()
        .map(|&r| {
            let p = mesh.point(r);
            (p.x, p.y)
        })
        .collect();
    let triangles = match triangulate_ring(&ring_xy) {
        Ok(triangles) => triangles,
        Err(e) => {
            debug!("candidate {:?} rejected: {}", vertex, e);
            return false;
        }
    };

    if options.aspect_constraint && aspect_applicable {
        let aspects_after: AHashSet<Compass> = triangles
            .iter()
            .map(|t| {
                triangle_aspect(
                    &mesh.point(ring[t[0]]),
                    &mesh.point(ring[t[1]]),
                    &mesh.point(ring[t[2]]),
                )
            })
            .collect();
        if aspects_before != aspects_after {
            return false;
        }
    }

    if options.max_triangle_area > 0.0 {
        let largest = triangles
            .iter()
            .map(|t| {
                signed_area_xy(
                    &mesh.point(ring[t[0]]),
                    &mesh.point(ring[t[1]]),
                    &mesh.point(ring[t[2]]),
                )
                .abs()
            })
            .fold(0.0_f64, f64::max);
        if largest > options.max_triangle_area {
            return false;
        }
    }

    // soundings that might fall inside the hole: coarse bbox candidates
    // from the index, then the exact polygon test on each
    let hole = Polygon::new(LineString::from(ring_xy), vec![]);
    let Some(bbox) = hole.bounding_rect() else {
        return false;
    };
    let mut checked = false;
    for si in index.query_envelope(&bbox) {
        let sounding = &soundings[si];
        let location = Point::new(sounding.position.x, sounding.position.y);
        if !hole.intersects(&location) {
            continue;
        }
        let Some(containing) = triangles.iter().find(|t| {
            let (a, b, c) = (
                mesh.point(ring[t[0]]),
                mesh.point(ring[t[1]]),
                mesh.point(ring[t[2]]),
            );
            Triangle::new(
                Coord { x: a.x, y: a.y },
                Coord { x: b.x, y: b.y },
                Coord { x: c.x, y: c.y },
            )
            .intersects(&location)
        }) else {
            // inside the hole polygon but outside every replacement
            // triangle; numerically unsafe, keep the vertex
            debug!("candidate {:?} rejected: sounding {} uncovered", vertex, si);
            return false;
        };
        if !interpolate_within_tolerance(
            &mesh.point(ring[containing[0]]),
            &mesh.point(ring[containing[1]]),
            &mesh.point(ring[containing[2]]),
            &sounding.position,
            z_offset,
        ) {
            return false;
        }
        checked = true;
    }
    if !checked {
        // no sounding anchors the hole, so there is no evidence the
        // removal is safe
        return false;
    }

    // all gates passed: swap the star for the retriangulated hole
    mesh.delete_vertex(vertex, false);
    for t in &triangles {
        mesh.add_face(ring[t[0]], ring[t[1]], ring[t[2]]);
    }
    true
}

#[cfg(test)]
mod tests {

    use super::*;
    use nalgebra::Point3;

    // center vertex in a four-vertex ring, depths positive-down
    fn star_mesh(center_z: f64, center_z_offset: f64, ring_z: [f64; 4]) -> TriMesh {
        let mut mesh = TriMesh::new();
        let center = mesh.add_vertex(Point3::new(0.0, 0.0, center_z));
        let ring = [
            mesh.add_vertex(Point3::new(1.0, 0.0, ring_z[0])),
            mesh.add_vertex(Point3::new(0.0, 1.0, ring_z[1])),
            mesh.add_vertex(Point3::new(-1.0, 0.0, ring_z[2])),
            mesh.add_vertex(Point3::new(0.0, -1.0, ring_z[3])),
        ];
        for i in 0..4 {
            mesh.add_face(center, ring[i], ring[(i + 1) % 4]);
        }
        // only the center carries a usable tolerance; the ring keeps the
        // default zero so no ring vertex can certify its own removal
        mesh.attributes_mut(center).z_offset = center_z_offset;
        mesh
    }

    fn sounding(x: f64, y: f64, z: f64, uncertainty: f64) -> Sounding {
        Sounding {
            position: Point3::new(x, y, z),
            uncertainty,
        }
    }

    fn run(
        mesh: &mut TriMesh,
        soundings: &[Sounding],
        options: &SimplifyOptions,
    ) -> Vec<IterationReport> {
        simplify(mesh, soundings, options, |_, _| Ok(())).unwrap()
    }

    #[test]
    fn test_center_removed_within_tolerance() {
        let mut mesh = star_mesh(5.0, 0.5, [4.0; 4]);
        let soundings = vec![sounding(0.1, 0.1, 4.1, 0.2)];

        let reports = run(&mut mesh, &soundings, &SimplifyOptions::default());

        assert_eq!(mesh.n_vertices(), 4);
        assert_eq!(mesh.n_faces(), 2);
        assert_eq!(reports.first().unwrap().vertices_before, 5);
        assert_eq!(reports.last().unwrap().vertices_after, 4);
    }

    #[test]
    fn test_boundary_center_is_protected() {
        let mut mesh = star_mesh(5.0, 0.5, [4.0; 4]);
        let center: VertexHandle = mesh.vertices().next().unwrap();
        mesh.attributes_mut(center).omit = Omit::Boundary;
        let soundings = vec![sounding(0.1, 0.1, 4.1, 0.2)];

        let reports = run(&mut mesh, &soundings, &SimplifyOptions::default());

        // nothing is removable, so the run terminates after one iteration
        assert_eq!(reports.len(), 1);
        assert_eq!(mesh.n_vertices(), 5);
        assert_eq!(mesh.n_faces(), 4);
        assert!(reports[0].omitted >= 1);
    }

    #[test]
    fn test_tolerance_rejection() {
        let mut mesh = star_mesh(5.0, 0.01, [4.0; 4]);
        let soundings = vec![sounding(0.1, 0.1, 4.1, 0.2)];

        run(&mut mesh, &soundings, &SimplifyOptions::default());

        // the sounding misses the flat hole by 0.1, over the 0.01 tolerance
        assert_eq!(mesh.n_vertices(), 5);
        assert_eq!(mesh.n_faces(), 4);
    }

    #[test]
    fn test_area_cap_rejection() {
        let mut mesh = star_mesh(5.0, 0.5, [4.0; 4]);
        let soundings = vec![sounding(0.1, 0.1, 4.1, 0.2)];
        let options = SimplifyOptions {
            max_triangle_area: 0.5,
            aspect_constraint: false,
        };

        run(&mut mesh, &soundings, &options);

        // the hole closes with two unit-area triangles, over the cap
        assert_eq!(mesh.n_vertices(), 5);
        assert_eq!(mesh.n_faces(), 4);
    }

    #[test]
    fn test_mixed_aspect_star_skips_aspect_test() {
        // the four faces slope in different directions, so no single aspect
        // is preserved and the constraint must not block the removal
        let mut mesh = star_mesh(5.0, 0.5, [4.0, 4.2, 4.0, 3.8]);
        let center: VertexHandle = mesh.vertices().next().unwrap();
        let star_aspects: AHashSet<Compass> = mesh
            .vertex_faces(center)
            .into_iter()
            .map(|face| {
                let [a, b, c] = mesh.face_vertices(face);
                triangle_aspect(&mesh.point(a), &mesh.point(b), &mesh.point(c))
            })
            .collect();
        assert!(star_aspects.len() > 1);

        let soundings = vec![sounding(0.1, 0.1, 4.0, 0.2)];
        let options = SimplifyOptions {
            max_triangle_area: 0.0,
            aspect_constraint: true,
        };
        run(&mut mesh, &soundings, &options);

        assert_eq!(mesh.n_vertices(), 4);
        assert_eq!(mesh.n_faces(), 2);
    }

    #[test]
    fn test_uniform_aspect_star_is_preserved_and_removed() {
        // every face lies on the plane z = 4 + x/2, one aspect before and after
        let mut mesh = star_mesh(4.0, 0.5, [4.5, 4.0, 3.5, 4.0]);
        let center: VertexHandle = mesh.vertices().next().unwrap();
        let star_aspects: AHashSet<Compass> = mesh
            .vertex_faces(center)
            .into_iter()
            .map(|face| {
                let [a, b, c] = mesh.face_vertices(face);
                triangle_aspect(&mesh.point(a), &mesh.point(b), &mesh.point(c))
            })
            .collect();
        assert_eq!(star_aspects.len(), 1);

        let soundings = vec![sounding(0.1, 0.1, 4.06, 0.2)];
        let options = SimplifyOptions {
            max_triangle_area: 0.0,
            aspect_constraint: true,
        };
        run(&mut mesh, &soundings, &options);

        assert_eq!(mesh.n_vertices(), 4);
        assert_eq!(mesh.n_faces(), 2);
    }

    #[test]
    fn test_empty_hole_keeps_vertex() {
        // no sounding falls inside the ring, so nothing certifies the removal
        let mut mesh = star_mesh(5.0, 0.5, [4.0; 4]);
        let soundings = vec![sounding(50.0, 50.0, 4.0, 0.2)];

        run(&mut mesh, &soundings, &SimplifyOptions::default());

        assert_eq!(mesh.n_vertices(), 5);
    }

    #[test]
    fn test_multi_iteration_fixed_point() {
        // a 5x5 grid over a gentle dome; the rim is pinned as boundary and
        // the interior collapses over a few iterations
        let mut mesh = TriMesh::new();
        let n = 5usize;
        let mut grid = Vec::new();
        for j in 0..n {
            for i in 0..n {
                let (x, y) = (i as f64, j as f64);
                let dx = x - 2.0;
                let dy = y - 2.0;
                let z = 10.0 - 0.05 * (dx * dx + dy * dy);
                let vertex = mesh.add_vertex(Point3::new(x, y, z));
                mesh.attributes_mut(vertex).z_offset = 1.0;
                grid.push(vertex);
            }
        }
        for j in 0..n - 1 {
            for i in 0..n - 1 {
                let v00 = grid[j * n + i];
                let v10 = grid[j * n + i + 1];
                let v01 = grid[(j + 1) * n + i];
                let v11 = grid[(j + 1) * n + i + 1];
                mesh.add_face(v00, v10, v11);
                mesh.add_face(v00, v11, v01);
            }
        }
        for j in 0..n {
            for i in 0..n {
                if i == 0 || j == 0 || i == n - 1 || j == n - 1 {
                    mesh.attributes_mut(grid[j * n + i]).omit = Omit::Boundary;
                }
            }
        }
        let soundings = crate::index::collect_soundings(&mesh);

        let reports = run(&mut mesh, &soundings, &SimplifyOptions::default());

        // strictly decreasing until the terminating iteration
        for report in &reports[..reports.len() - 1] {
            assert!(report.vertices_after < report.vertices_before);
        }
        let last = reports.last().unwrap();
        assert_eq!(last.vertices_after, last.vertices_before);

        // the rim survives untouched
        assert_eq!(mesh.n_vertices(), 16);
        let rim: Vec<Point3<f64>> = mesh.vertices().map(|v| mesh.point(v)).collect();
        assert!(rim.iter().all(|p| {
            p.x == 0.0 || p.y == 0.0 || p.x == (n - 1) as f64 || p.y == (n - 1) as f64
        }));

        // every sounding is still interpolated within its uncertainty
        assert!(crate::validate::validate_mesh(&mesh, &soundings).is_empty());
    }

    #[test]
    fn test_deep_vertices_processed_last() {
        // ordering is by ascending depth; with two nested stars only the
        // shallow center is certified, which exercises the snapshot order
        let mut mesh = star_mesh(5.0, 0.5, [4.0; 4]);
        let soundings = vec![sounding(0.1, 0.1, 4.1, 0.2)];
        let order_before: Vec<f64> = {
            let mut o: Vec<VertexHandle> = mesh.vertices().collect();
            o.sort_by(|a, b| mesh.point(*a).z.total_cmp(&mesh.point(*b).z));
            o.iter().map(|v| mesh.point(*v).z).collect()
        };
        assert_eq!(order_before, vec![4.0, 4.0, 4.0, 4.0, 5.0]);

        run(&mut mesh, &soundings, &SimplifyOptions::default());
        assert_eq!(mesh.n_vertices(), 4);
    }
}
