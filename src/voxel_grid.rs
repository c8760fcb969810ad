//! Lattice scan: evaluates a voxel script over every cell and meshes the result.
//!
//! The lattice spans `-extent..=extent` on each axis and is visited with `x`
//! outermost and `z` innermost. The first evaluation error aborts the scan;
//! no partial geometry is returned.

use std::fmt;
use std::time::Instant;

use crate::mesh::MeshSet;
use crate::palette::ColorCode;
use crate::script_diagnostics::ScriptDiagnostic;
use crate::script_log::reset_scan_log_count;
use crate::scripting::VoxelScript;

/// Number of cells in a lattice of the given extent. Negative extents are empty.
pub fn cell_count(extent: i32) -> usize {
    if extent < 0 {
        return 0;
    }
    let side = 2 * extent as usize + 1;
    side.saturating_mul(side).saturating_mul(side)
}

/// An evaluation failure at a specific cell.
#[derive(Debug, Clone)]
pub struct ScanError {
    pub x: i32,
    pub y: i32,
    pub z: i32,
    pub t: i32,
    pub diagnostic: ScriptDiagnostic,
}

impl fmt::Display for ScanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "script failed at cell ({}, {}, {}) t={}: {}",
            self.x, self.y, self.z, self.t, self.diagnostic
        )
    }
}

impl std::error::Error for ScanError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.diagnostic)
    }
}

/// Evaluate every lattice cell at time `t` and group cubes by color.
///
/// With no evaluator, or a negative extent, this is a no-op that returns an
/// empty set.
pub fn scan(
    evaluator: Option<&dyn VoxelScript>,
    extent: i32,
    t: i32,
) -> Result<MeshSet, ScanError> {
    let mut meshes = MeshSet::new();
    let Some(evaluator) = evaluator else {
        return Ok(meshes);
    };
    // Checked before building the range: `-i32::MIN` overflows.
    if extent < 0 {
        return Ok(meshes);
    }

    reset_scan_log_count();
    let started = Instant::now();

    for x in -extent..=extent {
        for y in -extent..=extent {
            for z in -extent..=extent {
                let code: ColorCode = evaluator
                    .eval(x, y, z, t, extent)
                    .map_err(|diagnostic| ScanError { x, y, z, t, diagnostic })?;
                if code == 0 {
                    continue;
                }
                meshes.batch_mut(code).push_cube(x, y, z);
            }
        }
    }

    log::debug!(
        "Scanned {} cells (extent {}, t {}) into {} batches / {} cubes in {:.2?}",
        cell_count(extent),
        extent,
        t,
        meshes.len(),
        meshes.cube_count(),
        started.elapsed()
    );

    Ok(meshes)
}
