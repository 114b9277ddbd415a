pub mod attributes;
pub mod exchange;
pub mod geometry;
pub mod index;
pub mod mesh;
pub mod simplify;
pub mod triangulate;
pub mod validate;

pub use attributes::{Omit, Sounding, VertexAttributes};
pub use mesh::{FaceHandle, TriMesh, VertexHandle};
pub use simplify::{simplify, SimplifyOptions};
