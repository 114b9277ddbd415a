use nalgebra::Point3;

// Removal eligibility of a mesh vertex, decided once at load time.
// Anything other than `Eligible` is pinned for the life of the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Omit {
    // interior water vertex, a candidate for removal
    #[default]
    Eligible,
    // on the mesh boundary and above the waterline
    BoundaryLand,
    // on the mesh boundary
    Boundary,
    // above the waterline
    Land,
}

/// Per-vertex attributes carried by the mesh next to the positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct VertexAttributes {
    /// Vertical tolerance: removing this vertex may not perturb the surface
    /// above any sounding in its hole by more than this amount.
    pub z_offset: f64,
    pub omit: Omit,
}

/// An original surveyed point. Soundings are collected once from the freshly
/// loaded mesh and stay immutable while the mesh shrinks around them.
#[derive(Debug, Clone, Copy)]
pub struct Sounding {
    /// Position with depth stored positive-down.
    pub position: Point3<f64>,
    /// Vertical uncertainty, used by the validation pass.
    pub uncertainty: f64,
}
