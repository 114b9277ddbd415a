use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use nalgebra::Point3;

/// Write the validation violations as CSV: an `x,y,z` header and one line
/// per sounding that missed its tolerance.
pub fn write_violations_xyz(violations: &[Point3<f64>], path: &Path) -> Result<()> {
    use std::fmt::Write as _;

    let mut out = String::from("x,y,z\n");
    for v in violations {
        writeln!(out, "{},{},{}", v.x, v.y, v.z)?;
    }
    fs::write(path, out).with_context(|| format!("could not write {}", path.display()))?;
    Ok(())
}
