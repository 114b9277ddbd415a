use nalgebra::Point3;

/// Signed area of a triangle projected to the xy plane.
///
/// Positive for counter-clockwise winding, which is the orientation the
/// writers emit.
pub fn signed_area_xy(p1: &Point3<f64>, p2: &Point3<f64>, p3: &Point3<f64>) -> f64 {
    0.5 * ((p2.x - p1.x) * (p3.y - p1.y) - (p3.x - p1.x) * (p2.y - p1.y))
}

/// Barycentric interpolation of the triangle's z at `(qx, qy)`.
///
/// Returns `None` when the triangle is collinear in xy, detected with an
/// epsilon scaled to the squared magnitude of the triangle's coordinates.
pub fn interpolate_z(
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
    qx: f64,
    qy: f64,
) -> Option<f64> {
    let den = (p2.y - p3.y) * (p1.x - p3.x) + (p3.x - p2.x) * (p1.y - p3.y);
    let scale = [p1.x, p2.x, p3.x, p1.y, p2.y, p3.y]
        .iter()
        .fold(0.0_f64, |acc, c| acc.max(c.abs()));
    if den.abs() <= 1e-12 * scale * scale {
        return None;
    }

    let w1 = ((p2.y - p3.y) * (qx - p3.x) + (p3.x - p2.x) * (qy - p3.y)) / den;
    let w2 = ((p3.y - p1.y) * (qx - p3.x) + (p1.x - p3.x) * (qy - p3.y)) / den;
    let w3 = 1.0 - w1 - w2;

    Some(w1 * p1.z + w2 * p2.z + w3 * p3.z)
}

/// Does the triangle interpolate the query point's z to within `tolerance`?
///
/// Collinear triangles never pass.
pub fn interpolate_within_tolerance(
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    p3: &Point3<f64>,
    query: &Point3<f64>,
    tolerance: f64,
) -> bool {
    match interpolate_z(p1, p2, p3, query.x, query.y) {
        Some(z) => (z - query.z).abs() <= tolerance,
        None => false,
    }
}

/// Compass octant of a terrain aspect angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Compass {
    N,
    NE,
    E,
    SE,
    S,
    SW,
    W,
    NW,
}

// Bucket edges in degrees; each bucket is half-open on the low side so the
// mapping is total and monotone over [0, 360).
const COMPASS_BREAKS: [f64; 8] = [22.5, 67.5, 112.5, 157.5, 202.5, 247.5, 292.5, 337.5];

const COMPASS_LABELS: [Compass; 9] = [
    Compass::N,
    Compass::NE,
    Compass::E,
    Compass::SE,
    Compass::S,
    Compass::SW,
    Compass::W,
    Compass::NW,
    Compass::N,
];

/// Bucket an azimuth in `[0, 360)` degrees to its compass octant.
pub fn compass_direction(degrees: f64) -> Compass {
    let idx = COMPASS_BREAKS.partition_point(|&b| b < degrees);
    COMPASS_LABELS[idx]
}

/// Compass aspect of a triangle: the azimuth of its upward surface normal
/// projected onto the xy plane.
///
/// The triangle is reoriented counter-clockwise in xy first so the normal
/// points to the same side regardless of the stored winding.
pub fn triangle_aspect(p1: &Point3<f64>, p2: &Point3<f64>, p3: &Point3<f64>) -> Compass {
    let (a, b, c) = if signed_area_xy(p1, p2, p3) < 0.0 {
        (p1, p3, p2)
    } else {
        (p1, p2, p3)
    };

    let ab = b - a;
    let ac = c - a;
    let normal = ab.cross(&ac);

    let degrees = normal.x.atan2(normal.y).to_degrees().rem_euclid(360.0);
    compass_direction(degrees)
}
