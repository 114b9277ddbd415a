/// gr3.rs
/// -----------
/// Read and write the `gr3` mesh format used by the SCHISM/SELFE community:
/// a title line, a `<faces> <vertices>` counts line, 1-based vertex records
/// `<idx> <x> <y> <z>` and 1-based triangle records `<idx> 3 <v1> <v2> <v3>`.
/// Loading also applies everything the simplifier needs to know per vertex:
/// the vertical tolerance, the boundary/land eligibility class, and the
/// positive-down depth normalization.
use std::fs;
use std::path::{Path, PathBuf};

use ahash::AHashSet;
use anyhow::{bail, Context, Result};
use nalgebra::Point3;

use crate::attributes::{Omit, VertexAttributes};
use crate::exchange::{ccw_face, dense_vertex_ids};
use crate::mesh::TriMesh;

/// How the per-vertex vertical tolerance is supplied.
#[derive(Debug, Clone)]
pub enum ToleranceSpec {
    /// One tolerance shared by every vertex.
    Global(f64),
    /// A per-vertex table with the gr3 vertex layout, column 4 read as the
    /// tolerance of the same-row vertex.
    PerVertex(PathBuf),
}

/// The raw contents of a gr3 file, before any interpretation.
#[derive(Debug, Clone, PartialEq)]
pub struct Gr3 {
    pub title: String,
    /// (x, y, z) exactly as stored in the file.
    pub vertices: Vec<(f64, f64, f64)>,
    /// 0-based corner indices.
    pub faces: Vec<(usize, usize, usize)>,
}

impl Gr3 {
    pub fn from_string(data: &str) -> Result<Self> {
        let mut lines = data.lines();
        let title = lines.next().context("gr3 data is empty")?.trim().to_string();

        let counts = lines.next().context("gr3 data is missing the counts line")?;
        let mut fields = counts.split_whitespace();
        let num_faces: usize = fields
            .next()
            .context("gr3 counts line is empty")?
            .parse()
            .context("gr3 face count is not an integer")?;
        let num_vertices: usize = fields
            .next()
            .context("gr3 counts line is missing the vertex count")?
            .parse()
            .context("gr3 vertex count is not an integer")?;

        let mut vertices = Vec::with_capacity(num_vertices);
        for i in 0..num_vertices {
            let line = lines
                .next()
                .with_context(|| format!("gr3 vertex {} is missing", i + 1))?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 4 {
                bail!("gr3 vertex {} has {} fields, expected 4", i + 1, fields.len());
            }
            // fields[0] is the 1-based row index; the layout is positional
            let x: f64 = fields[1]
                .parse()
                .with_context(|| format!("gr3 vertex {}: bad x", i + 1))?;
            let y: f64 = fields[2]
                .parse()
                .with_context(|| format!("gr3 vertex {}: bad y", i + 1))?;
            let z: f64 = fields[3]
                .parse()
                .with_context(|| format!("gr3 vertex {}: bad z", i + 1))?;
            vertices.push((x, y, z));
        }

        let mut faces = Vec::with_capacity(num_faces);
        for i in 0..num_faces {
            let line = lines
                .next()
                .with_context(|| format!("gr3 face {} is missing", i + 1))?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                bail!("gr3 face {} has {} fields, expected 5", i + 1, fields.len());
            }
            let corners: usize = fields[1]
                .parse()
                .with_context(|| format!("gr3 face {}: bad corner count", i + 1))?;
            if corners != 3 {
                bail!("gr3 face {} has {} corners, only triangles are supported", i + 1, corners);
            }
            let mut triple = [0usize; 3];
            for (slot, field) in triple.iter_mut().zip(&fields[2..5]) {
                let idx: usize = field
                    .parse()
                    .with_context(|| format!("gr3 face {}: bad vertex index", i + 1))?;
                if idx == 0 || idx > num_vertices {
                    bail!("gr3 face {} references vertex {} of {}", i + 1, idx, num_vertices);
                }
                *slot = idx - 1;
            }
            faces.push((triple[0], triple[1], triple[2]));
        }

        Ok(Gr3 {
            title,
            vertices,
            faces,
        })
    }
}

/// Read the boundary file: one 1-based vertex index per line.
pub fn read_boundary_indices(path: &Path) -> Result<AHashSet<usize>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("could not read boundary file {}", path.display()))?;
    let mut indices = AHashSet::new();
    for (n, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let idx: usize = line
            .parse()
            .with_context(|| format!("boundary line {} is not a vertex index", n + 1))?;
        indices.insert(idx);
    }
    Ok(indices)
}

/// Read a per-vertex tolerance table: gr3 vertex layout, column 4 is the
/// tolerance. Anything after the vertex block is ignored, so a full mesh
/// file works as a table.
pub fn read_tolerance_table(path: &Path, num_vertices: usize) -> Result<Vec<f64>> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("could not read tolerance file {}", path.display()))?;
    let mut lines = data.lines();
    lines.next().context("tolerance table is empty")?;
    let counts = lines.next().context("tolerance table is missing the counts line")?;
    let declared: usize = counts
        .split_whitespace()
        .nth(1)
        .context("tolerance table counts line is missing the vertex count")?
        .parse()
        .context("tolerance table vertex count is not an integer")?;
    if declared < num_vertices {
        bail!("tolerance table covers {} vertices, mesh has {}", declared, num_vertices);
    }

    let mut tolerances = Vec::with_capacity(num_vertices);
    for i in 0..num_vertices {
        let line = lines
            .next()
            .with_context(|| format!("tolerance table row {} is missing", i + 1))?;
        let field = line
            .split_whitespace()
            .nth(3)
            .with_context(|| format!("tolerance table row {} has no column 4", i + 1))?;
        let tolerance: f64 = field
            .parse()
            .with_context(|| format!("tolerance table row {}: bad tolerance", i + 1))?;
        tolerances.push(tolerance);
    }
    Ok(tolerances)
}

/// Load a gr3 mesh and attach the per-vertex attributes.
///
/// Depths are normalized positive-down in memory: with `negative_down` set
/// the stored z is negated on ingest (and the writers negate back). A vertex
/// is land when its normalized depth is negative; land and boundary
/// membership decide the `omit` class.
pub fn read_gr3_mesh(
    path: &Path,
    tolerance: &ToleranceSpec,
    boundary: &AHashSet<usize>,
    negative_down: bool,
) -> Result<TriMesh> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("could not read mesh file {}", path.display()))?;
    let gr3 = Gr3::from_string(&data)
        .with_context(|| format!("could not parse mesh file {}", path.display()))?;

    let tolerances = match tolerance {
        ToleranceSpec::Global(value) => vec![*value; gr3.vertices.len()],
        ToleranceSpec::PerVertex(table_path) => {
            read_tolerance_table(table_path, gr3.vertices.len())?
        }
    };

    let mut mesh = TriMesh::new();
    let mut handles = Vec::with_capacity(gr3.vertices.len());
    for (i, &(x, y, z)) in gr3.vertices.iter().enumerate() {
        let depth = if negative_down { -z } else { z };
        let vertex = mesh.add_vertex(Point3::new(x, y, depth));

        let z_offset = tolerances[i];
        let land = depth < 0.0;
        let omit = match (boundary.contains(&(i + 1)), land) {
            (true, true) => Omit::BoundaryLand,
            (true, false) => Omit::Boundary,
            (false, true) => Omit::Land,
            (false, false) => Omit::Eligible,
        };
        *mesh.attributes_mut(vertex) = VertexAttributes { z_offset, omit };
        handles.push(vertex);
    }
    for &(a, b, c) in &gr3.faces {
        mesh.add_face(handles[a], handles[b], handles[c]);
    }
    Ok(mesh)
}

/// Write a mesh as gr3. Live vertices are renumbered densely 1-based in
/// handle order; faces are reoriented counter-clockwise in xy.
pub fn write_gr3_mesh(mesh: &TriMesh, path: &Path, negative_down: bool) -> Result<()> {
    use std::fmt::Write as _;

    let ids = dense_vertex_ids(mesh);
    let mut out = String::new();
    writeln!(out, "hgrid.gr3")?;
    writeln!(out, "{} {}", mesh.n_faces(), mesh.n_vertices())?;
    for (i, vertex) in mesh.vertices().enumerate() {
        let p = mesh.point(vertex);
        let z = if negative_down { -p.z } else { p.z };
        writeln!(out, "{} {} {} {}", i + 1, p.x, p.y, z)?;
    }
    for (i, face) in mesh.faces().enumerate() {
        let [a, b, c] = ccw_face(mesh, face);
        writeln!(out, "{} 3 {} {} {}", i + 1, ids[&a] + 1, ids[&b] + 1, ids[&c] + 1)?;
    }
    fs::write(path, out).with_context(|| format!("could not write {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {

    use super::*;
    use approx::relative_eq;

    const BASIN: &str = "\
basin test grid
2 4
1 0.0 0.0 5.0
2 10.0 0.0 6.0
3 10.0 10.0 7.0
4 0.0 10.0 -1.5
1 3 1 2 3
2 3 1 3 4
";

    fn write_temp(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_parse_gr3() {
        let gr3 = Gr3::from_string(BASIN).unwrap();
        assert_eq!(gr3.title, "basin test grid");
        assert_eq!(gr3.vertices.len(), 4);
        assert_eq!(gr3.faces.len(), 2);
        assert_eq!(gr3.vertices[1], (10.0, 0.0, 6.0));
        assert_eq!(gr3.faces[1], (0, 2, 3));
    }

    #[test]
    fn test_parse_rejects_truncated_and_non_triangles() {
        assert!(Gr3::from_string("title\n1 3\n1 0 0 1\n2 1 0 1\n").is_err());
        let quad = "title\n1 4\n1 0 0 1\n2 1 0 1\n3 1 1 1\n4 0 1 1\n1 4 1 2 3 4\n";
        assert!(Gr3::from_string(quad).is_err());
        let out_of_range = "title\n1 3\n1 0 0 1\n2 1 0 1\n3 1 1 1\n1 3 1 2 9\n";
        assert!(Gr3::from_string(out_of_range).is_err());
    }

    #[test]
    fn test_load_classifies_vertices() {
        let path = write_temp("bathymesh_gr3_classify.gr3", BASIN);
        let mut boundary = AHashSet::new();
        boundary.insert(1);
        boundary.insert(4);

        let mesh =
            read_gr3_mesh(&path, &ToleranceSpec::Global(0.5), &boundary, false).unwrap();
        assert_eq!(mesh.n_vertices(), 4);
        assert_eq!(mesh.n_faces(), 2);

        let omits: Vec<Omit> = mesh.vertices().map(|v| mesh.attributes(v).omit).collect();
        // vertex 1: boundary, submerged; vertex 4: boundary and land
        assert_eq!(
            omits,
            vec![Omit::Boundary, Omit::Eligible, Omit::Eligible, Omit::BoundaryLand]
        );
        assert!(mesh
            .vertices()
            .all(|v| relative_eq!(mesh.attributes(v).z_offset, 0.5)));
    }

    #[test]
    fn test_negative_down_normalizes_depths() {
        let flipped = BASIN.replace("5.0", "-5.0").replace("6.0", "-6.0").replace("7.0", "-7.0").replace("-1.5", "1.5");
        let path = write_temp("bathymesh_gr3_negdown.gr3", &flipped);
        let boundary = AHashSet::new();

        let mesh = read_gr3_mesh(&path, &ToleranceSpec::Global(0.5), &boundary, true).unwrap();
        let depths: Vec<f64> = mesh.vertices().map(|v| mesh.point(v).z).collect();
        assert_eq!(depths, vec![5.0, 6.0, 7.0, -1.5]);
        // the raised vertex is land under either storage convention
        let last = mesh.vertices().last().unwrap();
        assert_eq!(mesh.attributes(last).omit, Omit::Land);

        // writing negates back to the input convention
        let out = std::env::temp_dir().join("bathymesh_gr3_negdown_out.gr3");
        write_gr3_mesh(&mesh, &out, true).unwrap();
        let emitted = Gr3::from_string(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(emitted.vertices[0].2, -5.0);
        assert_eq!(emitted.vertices[3].2, 1.5);
    }

    #[test]
    fn test_per_vertex_tolerance_table() {
        let table = "\
tolerances
2 4
1 0.0 0.0 0.1
2 10.0 0.0 0.2
3 10.0 10.0 0.3
4 0.0 10.0 0.4
";
        let mesh_path = write_temp("bathymesh_gr3_table_mesh.gr3", BASIN);
        let table_path = write_temp("bathymesh_gr3_table.gr3", table);
        let boundary = AHashSet::new();

        let mesh = read_gr3_mesh(
            &mesh_path,
            &ToleranceSpec::PerVertex(table_path),
            &boundary,
            false,
        )
        .unwrap();
        let offsets: Vec<f64> = mesh.vertices().map(|v| mesh.attributes(v).z_offset).collect();
        assert_eq!(offsets, vec![0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_round_trip_preserves_vertices_and_faces() {
        let path = write_temp("bathymesh_gr3_roundtrip_in.gr3", BASIN);
        let boundary = AHashSet::new();
        let mesh = read_gr3_mesh(&path, &ToleranceSpec::Global(0.5), &boundary, false).unwrap();

        let out = std::env::temp_dir().join("bathymesh_gr3_roundtrip_out.gr3");
        write_gr3_mesh(&mesh, &out, false).unwrap();
        let emitted = Gr3::from_string(&fs::read_to_string(&out).unwrap()).unwrap();
        let original = Gr3::from_string(BASIN).unwrap();

        assert_eq!(emitted.vertices, original.vertices);
        // face corner sets are preserved; orderings may differ by the ccw
        // reorientation
        let normalize = |faces: &[(usize, usize, usize)]| -> Vec<[usize; 3]> {
            faces
                .iter()
                .map(|&(a, b, c)| {
                    let mut f = [a, b, c];
                    f.sort_unstable();
                    f
                })
                .collect()
        };
        assert_eq!(normalize(&emitted.faces), normalize(&original.faces));
    }
}
