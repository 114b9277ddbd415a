use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::{Arg, ArgAction, Command};
use log::info;

use bathymesh::exchange::gr3::{
    read_boundary_indices, read_gr3_mesh, write_gr3_mesh, ToleranceSpec,
};
use bathymesh::exchange::vtk::write_mesh_vtk;
use bathymesh::exchange::xyz::write_violations_xyz;
use bathymesh::index::collect_soundings;
use bathymesh::simplify::{simplify, SimplifyOptions};
use bathymesh::validate::validate_mesh;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let matches = Command::new("bathymesh")
        .about("Bathymetric mesh simplification")
        .arg(
            Arg::new("input")
                .short('i')
                .value_name("FILE")
                .required(true)
                .help("Input gr3 mesh"),
        )
        .arg(
            Arg::new("boundary")
                .short('b')
                .value_name("FILE")
                .required(true)
                .help("Newline-delimited 1-based boundary vertex indices"),
        )
        .arg(
            Arg::new("negative-down")
                .short('n')
                .action(ArgAction::SetTrue)
                .help("Depths in the input are stored negative-down"),
        )
        .arg(
            Arg::new("validate")
                .short('v')
                .action(ArgAction::SetTrue)
                .help("Re-validate every sounding after each iteration"),
        )
        .arg(
            Arg::new("z-offset")
                .short('z')
                .value_name("VALUE_OR_FILE")
                .required(true)
                .help("Global vertical tolerance, or a per-vertex tolerance table"),
        )
        .arg(
            Arg::new("max-area")
                .short('t')
                .value_name("AREA")
                .value_parser(clap::value_parser!(f64))
                .help("Reject removals creating triangles larger than this; <= 0 disables"),
        )
        .arg(
            Arg::new("aspect")
                .short('a')
                .action(ArgAction::SetTrue)
                .help("Preserve the compass aspect of the faces around a removal"),
        )
        .get_matches();

    let input = PathBuf::from(matches.get_one::<String>("input").unwrap());
    let boundary_path = PathBuf::from(matches.get_one::<String>("boundary").unwrap());
    let negative_down = matches.get_flag("negative-down");
    let validate = matches.get_flag("validate");
    let tolerance = parse_tolerance(matches.get_one::<String>("z-offset").unwrap())?;
    let max_triangle_area = matches.get_one::<f64>("max-area").copied().unwrap_or(0.0);
    let aspect_constraint = matches.get_flag("aspect");

    info!(
        "input: {}, boundary: {}, negative-down: {}, validate: {}, tolerance: {:?}, \
         max triangle area: {}, aspect constraint: {}",
        input.display(),
        boundary_path.display(),
        negative_down,
        validate,
        tolerance,
        max_triangle_area,
        aspect_constraint
    );
    if max_triangle_area <= 0.0 {
        info!("triangle area is unconstrained");
    }

    info!("reading boundary vertex indices");
    let boundary = read_boundary_indices(&boundary_path)?;
    info!("reading mesh");
    let mut mesh = read_gr3_mesh(&input, &tolerance, &boundary, negative_down)?;
    let soundings = collect_soundings(&mesh);

    info!("writing initial mesh files");
    write_gr3_mesh(&mesh, Path::new("Input_Mesh.gr3"), negative_down)?;
    write_mesh_vtk(&mesh, Path::new("Input_Mesh.vtk"), negative_down)?;

    info!("simplifying mesh");
    let options = SimplifyOptions {
        max_triangle_area,
        aspect_constraint,
    };
    simplify(&mut mesh, &soundings, &options, |iteration, mesh| {
        if validate {
            info!("validating iteration {}", iteration);
            let violations = validate_mesh(mesh, &soundings);
            info!("  violations: {}", violations.len());
            write_violations_xyz(
                &violations,
                Path::new(&format!("Violations_{}_xyz.txt", iteration)),
            )?;
        }
        info!("writing iteration {} output files", iteration);
        let stem = format!("Simplified_Mesh_Iteration_{}", iteration);
        write_mesh_vtk(mesh, Path::new(&format!("{}.vtk", stem)), negative_down)?;
        write_gr3_mesh(mesh, Path::new(&format!("{}.gr3", stem)), negative_down)?;
        Ok(())
    })?;

    Ok(())
}

/// A `-z` argument is either a positive global tolerance or a path to a
/// per-vertex tolerance table.
fn parse_tolerance(raw: &str) -> Result<ToleranceSpec> {
    match raw.parse::<f64>() {
        Ok(value) => {
            if value <= 0.0 {
                bail!("vertical tolerance must be greater than zero, got {}", value);
            }
            Ok(ToleranceSpec::Global(value))
        }
        Err(_) => Ok(ToleranceSpec::PerVertex(PathBuf::from(raw))),
    }
}
