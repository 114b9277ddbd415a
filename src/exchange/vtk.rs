/// vtk.rs
/// -----------
/// Legacy ASCII VTK writer for quick inspection of a mesh in ParaView and
/// friends: an `UNSTRUCTURED_GRID` with the triangle cells and a point
/// scalar field carrying the depth. The exact byte shape (cell type value,
/// leading-space cell lines, the `fieldvalue` field block) is kept
/// compatible with the files downstream tooling already consumes.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::exchange::{ccw_face, dense_vertex_ids};
use crate::mesh::TriMesh;

/// Write a mesh as legacy ASCII VTK. With `negative_down` the emitted z is
/// negated back to the input storage convention, mirroring the gr3 writer.
pub fn write_mesh_vtk(mesh: &TriMesh, path: &Path, negative_down: bool) -> Result<()> {
    use std::fmt::Write as _;

    let ids = dense_vertex_ids(mesh);
    let mut out = String::new();

    out.push_str("# vtk DataFile Version 2.0\n\n");
    out.push_str("ASCII\n");
    out.push_str("DATASET UNSTRUCTURED_GRID\n");

    writeln!(out, "POINTS {} float", mesh.n_vertices())?;
    for vertex in mesh.vertices() {
        let p = mesh.point(vertex);
        let z = if negative_down { -p.z } else { p.z };
        writeln!(out, "{} {} {}", p.x, p.y, z)?;
    }

    writeln!(out, "CELLS {} {}", mesh.n_faces(), mesh.n_faces() * 4)?;
    for face in mesh.faces() {
        let [a, b, c] = ccw_face(mesh, face);
        writeln!(out, " 3 {} {} {}", ids[&a], ids[&b], ids[&c])?;
    }

    writeln!(out, "CELL_TYPES {}", mesh.n_faces())?;
    for _ in 0..mesh.n_faces() {
        out.push_str("6 ");
    }
    out.push('\n');

    writeln!(out, "POINT_DATA {}", mesh.n_vertices())?;
    out.push_str("FIELD FieldData 1 \n\n");
    writeln!(out, "fieldvalue 1 {} float ", mesh.n_vertices())?;
    for vertex in mesh.vertices() {
        let z = mesh.point(vertex).z;
        write!(out, "{} ", if negative_down { -z } else { z })?;
    }
    out.push('\n');

    fs::write(path, out).with_context(|| format!("could not write {}", path.display()))?;
    Ok(())
}
