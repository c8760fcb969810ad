//! Scene hand-off to an external renderer.
//!
//! The viewer never rasterizes. Each render produces a [`Scene`]: the fixed
//! sun light plus one `(geometry, color)` pair per mesh batch, passed to a
//! [`RenderSink`].

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::mesh::{MeshBatch, MeshSet};
use crate::palette::{color_of, Color, ColorCode};

/// Directional light with an ambient term. Present in every scene.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SunLight {
    /// Normalized direction the light travels (from the sun toward the scene).
    pub direction: [f32; 3],
    pub color: [f32; 3],
    pub intensity: f32,
    /// Ambient light intensity added to all surfaces equally.
    pub ambient: f32,
}

impl Default for SunLight {
    fn default() -> Self {
        // Upper-left-front key light.
        let direction = Vec3::new(-0.3, -1.0, -0.5).normalize();
        Self {
            direction: direction.to_array(),
            color: [1.0, 1.0, 1.0],
            intensity: 1.0,
            ambient: 0.3,
        }
    }
}

/// One batch with its resolved display color.
#[derive(Debug, Clone, Copy)]
pub struct SceneBatch<'a> {
    pub code: ColorCode,
    pub color: Color,
    pub mesh: &'a MeshBatch,
}

/// Everything handed to the renderer for one frame.
#[derive(Debug, Clone)]
pub struct Scene<'a> {
    pub light: SunLight,
    /// Playback frame this scene was taken from, `None` for still rendering.
    pub frame: Option<usize>,
    pub batches: Vec<SceneBatch<'a>>,
}

impl<'a> Scene<'a> {
    /// A scene with only the light.
    pub fn empty(light: SunLight, frame: Option<usize>) -> Self {
        Self {
            light,
            frame,
            batches: Vec::new(),
        }
    }

    pub fn from_meshes(light: SunLight, frame: Option<usize>, meshes: &'a MeshSet) -> Self {
        let batches = meshes
            .batches()
            .iter()
            .map(|mesh| SceneBatch {
                code: mesh.color,
                color: color_of(mesh.color),
                mesh,
            })
            .collect();
        Self {
            light,
            frame,
            batches,
        }
    }

    pub fn stats(&self) -> SceneStats {
        SceneStats {
            frame: self.frame,
            batches: self.batches.len(),
            cubes: self.batches.iter().map(|b| b.mesh.cube_count()).sum(),
            vertices: self.batches.iter().map(|b| b.mesh.vertices.len()).sum(),
            triangles: self.batches.iter().map(|b| b.mesh.triangle_count()).sum(),
            buffer_bytes: self
                .batches
                .iter()
                .map(|b| b.mesh.vertex_bytes().len() + b.mesh.index_bytes().len())
                .sum(),
        }
    }
}

/// Size summary of a scene, for logs and render metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneStats {
    pub frame: Option<usize>,
    pub batches: usize,
    pub cubes: usize,
    pub vertices: usize,
    pub triangles: usize,
    /// Vertex plus index buffer size a renderer would upload.
    #[serde(default)]
    pub buffer_bytes: usize,
}

/// Consumer of rendered scenes.
pub trait RenderSink {
    fn present(&mut self, scene: &Scene<'_>) -> anyhow::Result<()>;
}

/// Sink that only logs scene sizes.
#[derive(Debug, Default)]
pub struct LogSink {
    pub presented: usize,
}

impl RenderSink for LogSink {
    fn present(&mut self, scene: &Scene<'_>) -> anyhow::Result<()> {
        self.presented += 1;
        let stats = scene.stats();
        log::info!(
            "frame {:?}: {} batches, {} cubes, {} triangles, {} buffer bytes",
            stats.frame,
            stats.batches,
            stats.cubes,
            stats.triangles,
            stats.buffer_bytes
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_light_is_normalized() {
        let light = SunLight::default();
        let len = Vec3::from_array(light.direction).length();
        assert!((len - 1.0).abs() < 1e-5);
        assert!(light.ambient > 0.0);
    }

    #[test]
    fn test_scene_resolves_palette_colors() {
        let mut meshes = MeshSet::new();
        meshes.batch_mut(7).push_cube(0, 0, 0);
        meshes.batch_mut(42).push_cube(1, 0, 0);

        let scene = Scene::from_meshes(SunLight::default(), None, &meshes);
        assert_eq!(scene.batches.len(), 2);
        assert_eq!(scene.batches[0].color.name, "Red");
        assert_eq!(scene.batches[1].color, crate::palette::DEFAULT_COLOR);

        let stats = scene.stats();
        assert_eq!(stats.cubes, 2);
        assert_eq!(stats.vertices, 16);
        assert_eq!(stats.triangles, 24);
        // 16 vertices of 12 bytes plus 72 indices of 4 bytes.
        assert_eq!(stats.buffer_bytes, 16 * 12 + 72 * 4);
    }

    #[test]
    fn test_empty_scene_keeps_light() {
        let scene = Scene::empty(SunLight::default(), Some(0));
        assert!(scene.batches.is_empty());
        assert_eq!(scene.light, SunLight::default());
        assert_eq!(scene.stats().frame, Some(0));
    }
}
