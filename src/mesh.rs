use ahash::AHashMap;
use anyhow::{bail, Result};
use nalgebra::Point3;

use crate::attributes::VertexAttributes;

/// Index of a vertex slot. Handles are stable across insertions and
/// deletions; `garbage_collection` invalidates them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VertexHandle(u32);

impl VertexHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a face slot, with the same lifetime rules as [`VertexHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FaceHandle(u32);

impl FaceHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A triangle mesh stored as parallel arrays: positions and attributes per
/// vertex, corner triples per face, and a maintained incident-face list per
/// vertex so one-ring queries don't rescan the face table.
///
/// Deletion tombstones slots instead of shifting them, so handles held by a
/// caller stay meaningful until the next `garbage_collection` pass.
#[derive(Debug, Default)]
pub struct TriMesh {
    positions: Vec<Point3<f64>>,
    attributes: Vec<VertexAttributes>,
    vertex_alive: Vec<bool>,
    // live faces around each vertex, in face insertion order
    incident: Vec<Vec<u32>>,

    faces: Vec<[u32; 3]>,
    face_alive: Vec<bool>,

    live_vertices: usize,
    live_faces: usize,
}

impl TriMesh {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a vertex with default attributes.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> VertexHandle {
        let handle = VertexHandle(self.positions.len() as u32);
        self.positions.push(position);
        self.attributes.push(VertexAttributes::default());
        self.vertex_alive.push(true);
        self.incident.push(Vec::new());
        self.live_vertices += 1;
        handle
    }

    /// Insert a face. The corner order is kept as given; the writers reorient
    /// on emission.
    pub fn add_face(&mut self, a: VertexHandle, b: VertexHandle, c: VertexHandle) -> FaceHandle {
        debug_assert!(self.is_live_vertex(a) && self.is_live_vertex(b) && self.is_live_vertex(c));
        debug_assert!(a != b && b != c && a != c);

        let handle = FaceHandle(self.faces.len() as u32);
        self.faces.push([a.0, b.0, c.0]);
        self.face_alive.push(true);
        for corner in [a, b, c] {
            self.incident[corner.index()].push(handle.0);
        }
        self.live_faces += 1;
        handle
    }

    pub fn n_vertices(&self) -> usize {
        self.live_vertices
    }

    pub fn n_faces(&self) -> usize {
        self.live_faces
    }

    pub fn is_live_vertex(&self, vertex: VertexHandle) -> bool {
        self.vertex_alive
            .get(vertex.index())
            .copied()
            .unwrap_or(false)
    }

    pub fn point(&self, vertex: VertexHandle) -> Point3<f64> {
        self.positions[vertex.index()]
    }

    pub fn attributes(&self, vertex: VertexHandle) -> &VertexAttributes {
        &self.attributes[vertex.index()]
    }

    pub fn attributes_mut(&mut self, vertex: VertexHandle) -> &mut VertexAttributes {
        &mut self.attributes[vertex.index()]
    }

    /// Live vertices in handle order.
    pub fn vertices(&self) -> impl Iterator<Item = VertexHandle> + '_ {
        self.vertex_alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(i, _)| VertexHandle(i as u32))
    }

    /// Live faces in handle order.
    pub fn faces(&self) -> impl Iterator<Item = FaceHandle> + '_ {
        self.face_alive
            .iter()
            .enumerate()
            .filter(|(_, alive)| **alive)
            .map(|(i, _)| FaceHandle(i as u32))
    }

    /// The three corners of a face.
    pub fn face_vertices(&self, face: FaceHandle) -> [VertexHandle; 3] {
        let [a, b, c] = self.faces[face.index()];
        [VertexHandle(a), VertexHandle(b), VertexHandle(c)]
    }

    /// Live faces incident to a vertex.
    pub fn vertex_faces(&self, vertex: VertexHandle) -> Vec<FaceHandle> {
        self.incident[vertex.index()]
            .iter()
            .map(|&f| FaceHandle(f))
            .collect()
    }

    /// One-ring neighbors of a vertex in counter-clockwise order.
    ///
    /// Interior vertices yield a closed ring (without repeating the first
    /// neighbor); boundary vertices yield an open path. The walk starts at
    /// the smallest neighbor handle so the result is deterministic. Errors
    /// when the incident faces don't chain into a single fan.
    pub fn one_ring(&self, vertex: VertexHandle) -> Result<Vec<VertexHandle>> {
        let star = &self.incident[vertex.index()];
        if star.is_empty() {
            bail!("vertex {:?} has no incident faces", vertex);
        }

        // each incident face contributes the ring edge opposite the vertex
        let mut adjacency: AHashMap<u32, Vec<u32>> = AHashMap::with_capacity(star.len() + 1);
        for &face in star {
            let corners = self.faces[face as usize];
            let mut opposite = corners.iter().filter(|&&c| c != vertex.0);
            match (opposite.next(), opposite.next()) {
                (Some(&p), Some(&q)) => {
                    adjacency.entry(p).or_default().push(q);
                    adjacency.entry(q).or_default().push(p);
                }
                _ => bail!("face {} repeats vertex {:?}", face, vertex),
            }
        }
        if adjacency.values().any(|n| n.len() > 2) {
            bail!("star of vertex {:?} is not a fan", vertex);
        }

        let endpoints: Vec<u32> = adjacency
            .iter()
            .filter(|(_, neighbors)| neighbors.len() == 1)
            .map(|(&v, _)| v)
            .collect();
        let closed = endpoints.is_empty();
        if !closed && endpoints.len() != 2 {
            bail!("star of vertex {:?} is not a single fan", vertex);
        }

        let start = if closed {
            *adjacency.keys().min().expect("adjacency is non-empty")
        } else {
            *endpoints.iter().min().expect("two endpoints")
        };

        let mut ring: Vec<u32> = Vec::with_capacity(adjacency.len());
        let mut previous: Option<u32> = None;
        let mut current = start;
        loop {
            ring.push(current);
            if ring.len() > adjacency.len() {
                bail!("star of vertex {:?} does not chain", vertex);
            }
            let next = adjacency[&current]
                .iter()
                .copied()
                .find(|&n| Some(n) != previous);
            match next {
                Some(n) if closed && n == start => break,
                Some(n) => {
                    previous = Some(current);
                    current = n;
                }
                None if !closed => break,
                None => bail!("star of vertex {:?} does not close", vertex),
            }
        }
        if ring.len() != adjacency.len() {
            bail!("star of vertex {:?} is disconnected", vertex);
        }

        // closed rings are returned counter-clockwise; the start stays fixed
        if closed && self.ring_signed_area(&ring) < 0.0 {
            ring[1..].reverse();
        }

        Ok(ring.into_iter().map(VertexHandle).collect())
    }

    fn ring_signed_area(&self, ring: &[u32]) -> f64 {
        let mut doubled = 0.0;
        for (i, &a) in ring.iter().enumerate() {
            let b = ring[(i + 1) % ring.len()];
            let pa = self.positions[a as usize];
            let pb = self.positions[b as usize];
            doubled += pa.x * pb.y - pb.x * pa.y;
        }
        0.5 * doubled
    }

    /// Tombstone a vertex. Unless `keep_faces` is set, every incident face
    /// is tombstoned too and unlinked from its other corners.
    pub fn delete_vertex(&mut self, vertex: VertexHandle, keep_faces: bool) {
        if !self.is_live_vertex(vertex) {
            return;
        }
        if !keep_faces {
            let star: Vec<u32> = self.incident[vertex.index()].clone();
            for face in star {
                self.delete_face(FaceHandle(face));
            }
        }
        self.vertex_alive[vertex.index()] = false;
        self.incident[vertex.index()].clear();
        self.live_vertices -= 1;
    }

    fn delete_face(&mut self, face: FaceHandle) {
        if !self.face_alive[face.index()] {
            return;
        }
        self.face_alive[face.index()] = false;
        for corner in self.faces[face.index()] {
            self.incident[corner as usize].retain(|&f| f != face.0);
        }
        self.live_faces -= 1;
    }

    /// Compact both pools, dropping tombstoned slots and renumbering the
    /// survivors densely in their current order. Previously held handles are
    /// invalid afterwards. Running it twice in a row is a no-op.
    pub fn garbage_collection(&mut self) {
        let mut remap = vec![u32::MAX; self.positions.len()];
        let mut positions = Vec::with_capacity(self.live_vertices);
        let mut attributes = Vec::with_capacity(self.live_vertices);
        for (old, alive) in self.vertex_alive.iter().enumerate() {
            if *alive {
                remap[old] = positions.len() as u32;
                positions.push(self.positions[old]);
                attributes.push(self.attributes[old]);
            }
        }

        let mut faces = Vec::with_capacity(self.live_faces);
        let mut incident = vec![Vec::new(); positions.len()];
        for (old, alive) in self.face_alive.iter().enumerate() {
            if *alive {
                let [a, b, c] = self.faces[old];
                let mapped = [remap[a as usize], remap[b as usize], remap[c as usize]];
                let handle = faces.len() as u32;
                for corner in mapped {
                    incident[corner as usize].push(handle);
                }
                faces.push(mapped);
            }
        }

        self.vertex_alive = vec![true; positions.len()];
        self.face_alive = vec![true; faces.len()];
        self.positions = positions;
        self.attributes = attributes;
        self.faces = faces;
        self.incident = incident;
    }

    /// Mean depth over the submerged vertices (z > 0); land vertices carry
    /// negative depth and are excluded. Zero for a mesh with no submerged
    /// vertices.
    pub fn average_depth(&self) -> f64 {
        let mut total = 0.0;
        let mut count = 0usize;
        for vertex in self.vertices() {
            let z = self.point(vertex).z;
            if z > 0.0 {
                total += z;
                count += 1;
            }
        }
        if count == 0 {
            0.0
        } else {
            total / count as f64
        }
    }
}
