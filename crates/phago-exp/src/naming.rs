use std::collections::HashMap;
use std::path::{Path, PathBuf};

use phago_core::errors::{ErrorInfo, SweepError};

use crate::grid::{Axis, RunPoint};

/// Filesystem names derived for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunNaming {
    /// Parameter file written for the run.
    pub artifact: PathBuf,
    /// Directory handed to the simulator for its output.
    pub output_dir: PathBuf,
}

/// Directory segment for one value, e.g. `1.17ummin-1frags`.
pub fn dir_segment(axis: &Axis, rendered: &str) -> String {
    let segment = sanitize(&format!("{rendered}{}", axis.suffix));
    if segment == "." || segment == ".." {
        format!("_{segment}")
    } else {
        segment
    }
}

/// Replaces characters that are unsafe in a single path component.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .map(|ch| match ch {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            ch if ch.is_control() => '_',
            ch => ch,
        })
        .collect()
}

/// Derives the artifact path and output directory of a point.
///
/// Directories nest one `{value}{suffix}` segment per encoded axis under
/// `output_root`. Filenames join `{tag}-{value}` pairs for the same axes
/// behind `prefix`, e.g. `abm_dia-14-macmot-0-run-run1.xml`.
pub fn name_run(
    axes: &[Axis],
    point: &RunPoint,
    prefix: &str,
    parameters_dir: &Path,
    output_root: &Path,
) -> RunNaming {
    let mut output_dir = output_root.to_path_buf();
    let mut pairs = Vec::new();
    for axis in axes.iter().filter(|axis| axis.encode) {
        let Some(value) = point.values.get(&axis.name) else {
            continue;
        };
        let rendered = value.render();
        output_dir.push(dir_segment(axis, &rendered));
        pairs.push(format!("{}-{}", axis.tag(), rendered));
    }
    let stem = if pairs.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}_{}", pairs.join("-"))
    };
    RunNaming {
        artifact: parameters_dir.join(format!("{}.xml", sanitize(&stem))),
        output_dir,
    }
}

/// Names every point and rejects grids where two points share a parameter
/// file or an output directory.
pub fn name_runs(
    axes: &[Axis],
    points: &[RunPoint],
    prefix: &str,
    parameters_dir: &Path,
    output_root: &Path,
) -> Result<Vec<RunNaming>, SweepError> {
    let mut artifacts: HashMap<PathBuf, usize> = HashMap::with_capacity(points.len());
    let mut outputs: HashMap<PathBuf, usize> = HashMap::with_capacity(points.len());
    let mut names = Vec::with_capacity(points.len());
    for point in points {
        let naming = name_run(axes, point, prefix, parameters_dir, output_root);
        if let Some(first) = artifacts.insert(naming.artifact.clone(), point.index) {
            return Err(collision("artifact", &naming.artifact, first, point.index));
        }
        if let Some(first) = outputs.insert(naming.output_dir.clone(), point.index) {
            return Err(collision("output_dir", &naming.output_dir, first, point.index));
        }
        names.push(naming);
    }
    Ok(names)
}

fn collision(kind: &str, path: &Path, first: usize, second: usize) -> SweepError {
    SweepError::InvalidPlan(
        ErrorInfo::new("name_collision", format!("two runs share the same {kind}"))
            .with_context("path", path.display().to_string())
            .with_context("first_run", first.to_string())
            .with_context("second_run", second.to_string())
            .with_hint("make axis values distinct and encode every varying axis"),
    )
}
