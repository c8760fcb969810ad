//! Voxel cube geometry and per-color mesh batches.

use std::collections::HashMap;

use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::palette::ColorCode;

/// Edge length of an emitted cube. Smaller than the lattice spacing so
/// neighbouring voxels stay visually separated.
pub const CUBE_EDGE: f32 = 0.8;

/// Vertices emitted per cube. Corners are never shared between cubes.
pub const VERTICES_PER_CUBE: usize = 8;

/// Triangles emitted per cube (two per face).
pub const TRIANGLES_PER_CUBE: usize = 12;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
}

impl Vertex {
    const fn new(position: [f32; 3]) -> Self {
        Self { position }
    }
}

/// Unit corner offsets, scaled by [`CUBE_EDGE`].
///
/// ```text
///      7-------6
///     /|      /|      y
///    3-------2 |      |
///    | 4-----|-5      +-- x
///    |/      |/      /
///    0-------1      z
/// ```
const CORNERS: [Vec3; 8] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(1.0, 0.0, 0.0),
    Vec3::new(1.0, 1.0, 0.0),
    Vec3::new(0.0, 1.0, 0.0),
    Vec3::new(0.0, 0.0, 1.0),
    Vec3::new(1.0, 0.0, 1.0),
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(0.0, 1.0, 1.0),
];

/// Counter-clockwise when seen from outside, so normals face outward.
const CUBE_INDICES: [u32; TRIANGLES_PER_CUBE * 3] = [
    0, 2, 1, 0, 3, 2, // Front (Z-)
    4, 5, 6, 4, 6, 7, // Back (Z+)
    0, 7, 3, 0, 4, 7, // Left (X-)
    1, 2, 6, 1, 6, 5, // Right (X+)
    3, 6, 2, 3, 7, 6, // Top (Y+)
    0, 1, 5, 0, 5, 4, // Bottom (Y-)
];

/// Geometry for every voxel sharing one color code in a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshBatch {
    pub color: ColorCode,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl MeshBatch {
    pub fn new(color: ColorCode) -> Self {
        Self {
            color,
            vertices: Vec::new(),
            indices: Vec::new(),
        }
    }

    /// Append one cube whose minimum corner sits on the lattice point.
    pub fn push_cube(&mut self, x: i32, y: i32, z: i32) {
        let base = self.vertices.len() as u32;
        let origin = Vec3::new(x as f32, y as f32, z as f32);

        self.vertices.extend(
            CORNERS
                .iter()
                .map(|corner| Vertex::new((origin + *corner * CUBE_EDGE).to_array())),
        );
        self.indices.extend(CUBE_INDICES.iter().map(|i| base + i));
    }

    pub fn cube_count(&self) -> usize {
        self.vertices.len() / VERTICES_PER_CUBE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertex data as raw bytes, laid out for a GPU vertex buffer.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Index data as raw bytes (`u32` per index).
    pub fn index_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.indices)
    }
}

/// All batches of one scan, one per distinct nonzero color, in the order
/// each color was first seen.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshSet {
    batches: Vec<MeshBatch>,
    lookup: HashMap<ColorCode, usize>,
}

impl MeshSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch for `color`, created on first use.
    pub fn batch_mut(&mut self, color: ColorCode) -> &mut MeshBatch {
        let index = match self.lookup.get(&color) {
            Some(&index) => index,
            None => {
                self.batches.push(MeshBatch::new(color));
                let index = self.batches.len() - 1;
                self.lookup.insert(color, index);
                index
            }
        };
        &mut self.batches[index]
    }

    pub fn get(&self, color: ColorCode) -> Option<&MeshBatch> {
        self.lookup.get(&color).map(|&i| &self.batches[i])
    }

    pub fn batches(&self) -> &[MeshBatch] {
        &self.batches
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn cube_count(&self) -> usize {
        self.batches.iter().map(MeshBatch::cube_count).sum()
    }

    pub fn vertex_count(&self) -> usize {
        self.batches.iter().map(|b| b.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.batches.iter().map(MeshBatch::triangle_count).sum()
    }
}
