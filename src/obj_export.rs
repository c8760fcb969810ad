//! Wavefront OBJ export of rendered scenes.
//!
//! Each presented scene becomes `frame_NNNNN.obj` with a sibling `.mtl`
//! holding one material per color code. Every batch is written as its own
//! object so the per-color grouping survives the round trip.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::scene::{RenderSink, Scene, SceneStats};

fn material_name(code: i64) -> String {
    if code < 0 {
        format!("color_neg{}", code.unsigned_abs())
    } else {
        format!("color_{code}")
    }
}

/// Write the OBJ body of a scene, referencing `mtl_file` for materials.
pub fn write_obj(out: &mut impl fmt::Write, scene: &Scene<'_>, mtl_file: &str) -> fmt::Result {
    writeln!(out, "# cubeviewer frame {:?}", scene.frame)?;
    writeln!(out, "mtllib {mtl_file}")?;

    // OBJ indices are 1-based and global across objects.
    let mut offset = 1u64;
    for batch in &scene.batches {
        let name = material_name(batch.code);
        writeln!(out, "o {name}")?;
        writeln!(out, "usemtl {name}")?;
        for v in &batch.mesh.vertices {
            let [x, y, z] = v.position;
            writeln!(out, "v {x} {y} {z}")?;
        }
        for tri in batch.mesh.indices.chunks_exact(3) {
            writeln!(
                out,
                "f {} {} {}",
                offset + tri[0] as u64,
                offset + tri[1] as u64,
                offset + tri[2] as u64
            )?;
        }
        offset += batch.mesh.vertices.len() as u64;
    }
    Ok(())
}

/// Write the MTL body: one diffuse material per batch, plus the ambient term.
pub fn write_mtl(out: &mut impl fmt::Write, scene: &Scene<'_>) -> fmt::Result {
    let ambient = scene.light.ambient;
    for batch in &scene.batches {
        let [r, g, b] = batch.color.to_rgb_f32();
        writeln!(out, "newmtl {}", material_name(batch.code))?;
        writeln!(out, "# {} {}", batch.color.name, batch.color.hex())?;
        writeln!(out, "Ka {} {} {}", r * ambient, g * ambient, b * ambient)?;
        writeln!(out, "Kd {r} {g} {b}")?;
        writeln!(out)?;
    }
    Ok(())
}

/// Sink writing numbered OBJ/MTL pairs into a directory.
#[derive(Debug)]
pub struct ObjExporter {
    out_dir: PathBuf,
    written: Vec<(PathBuf, SceneStats)>,
}

impl ObjExporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Result<Self> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir)
            .with_context(|| format!("Failed to create output directory {:?}", out_dir))?;
        Ok(Self {
            out_dir,
            written: Vec::new(),
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Files written so far, with the stats of the scene each one holds.
    pub fn written(&self) -> &[(PathBuf, SceneStats)] {
        &self.written
    }
}

impl RenderSink for ObjExporter {
    fn present(&mut self, scene: &Scene<'_>) -> Result<()> {
        let stem = format!("frame_{:05}", scene.frame.unwrap_or(0));
        let obj_path = self.out_dir.join(format!("{stem}.obj"));
        let mtl_name = format!("{stem}.mtl");
        let mtl_path = self.out_dir.join(&mtl_name);

        let mut mtl = String::new();
        write_mtl(&mut mtl, scene)?;
        let mut obj = String::new();
        write_obj(&mut obj, scene, &mtl_name)?;

        fs::write(&mtl_path, mtl).with_context(|| format!("Failed to write {:?}", mtl_path))?;
        fs::write(&obj_path, obj).with_context(|| format!("Failed to write {:?}", obj_path))?;

        log::debug!("Wrote {:?}", obj_path);
        self.written.push((obj_path, scene.stats()));
        Ok(())
    }
}
