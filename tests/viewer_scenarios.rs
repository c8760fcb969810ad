//! End-to-end viewer scenarios: compile, scan, animate and present.

use std::cell::Cell;

use cubeviewer::mesh::{CUBE_EDGE, TRIANGLES_PER_CUBE, VERTICES_PER_CUBE};
use cubeviewer::palette::ColorCode;
use cubeviewer::scene::{RenderSink, Scene, SceneStats};
use cubeviewer::scripting::ScriptCompiler;
use cubeviewer::viewer::{ViewerConfig, VoxelViewer};
use cubeviewer::voxel_grid::{cell_count, scan};

const ORIGIN_ONLY: &str = "if x == 0 && y == 0 && z == 0 { return 1; } return 0;";

#[derive(Default)]
struct Recorder {
    scenes: Vec<SceneStats>,
}

impl RenderSink for Recorder {
    fn present(&mut self, scene: &Scene<'_>) -> anyhow::Result<()> {
        self.scenes.push(scene.stats());
        Ok(())
    }
}

fn viewer_with_extent(extent: i32) -> VoxelViewer {
    VoxelViewer::new(ViewerConfig {
        extent,
        ..ViewerConfig::default()
    })
}

#[test]
fn constant_script_fills_lattice_with_one_batch() {
    let evaluator = ScriptCompiler::new().compile("return 7;").unwrap();
    let meshes = scan(Some(&evaluator), 1, 0).unwrap();

    assert_eq!(meshes.len(), 1);
    let batch = meshes.get(7).unwrap();
    assert_eq!(batch.cube_count(), 27);
    assert_eq!(batch.vertices.len(), 27 * VERTICES_PER_CUBE);
    assert_eq!(batch.vertices.len(), 216);
    assert_eq!(batch.triangle_count(), 324);
    assert_eq!(batch.indices.len(), 324 * 3);
    assert_eq!(27 * TRIANGLES_PER_CUBE, 324);
}

#[test]
fn origin_script_at_extent_zero_gives_single_cube() {
    let evaluator = ScriptCompiler::new().compile(ORIGIN_ONLY).unwrap();
    let meshes = scan(Some(&evaluator), 0, 0).unwrap();

    assert_eq!(meshes.len(), 1);
    let batch = meshes.get(1).unwrap();
    assert_eq!(batch.cube_count(), 1);

    let max = batch
        .vertices
        .iter()
        .flat_map(|v| v.position)
        .fold(f32::MIN, f32::max);
    let min = batch
        .vertices
        .iter()
        .flat_map(|v| v.position)
        .fold(f32::MAX, f32::min);
    assert_eq!(min, 0.0);
    assert!((max - CUBE_EDGE).abs() < 1e-6);
}

#[test]
fn every_cell_is_evaluated_exactly_once() {
    let calls = Cell::new(0usize);
    let counting = |_x: i32, _y: i32, _z: i32, _t: i32, _extent: i32| -> ColorCode {
        calls.set(calls.get() + 1);
        0
    };

    let meshes = scan(Some(&counting), 2, 0).unwrap();
    assert!(meshes.is_empty());
    assert_eq!(calls.get(), 125);
    assert_eq!(calls.get(), cell_count(2));
}

#[test]
fn all_zero_script_presents_light_only() {
    let mut viewer = viewer_with_extent(3);
    let mut sink = Recorder::default();

    assert!(viewer.set_script("return 0;"));
    assert!(viewer.render(&mut sink).unwrap());
    assert_eq!(sink.scenes.len(), 1);
    assert_eq!(sink.scenes[0].batches, 0);
    assert_eq!(sink.scenes[0].cubes, 0);
}

#[test]
fn toggling_animation_rebuilds_and_resets_playback() {
    let mut viewer = viewer_with_extent(1);
    viewer.set_script(ORIGIN_ONLY);

    viewer.set_animation_enabled(true);
    assert_eq!(viewer.frames().len(), 20);
    assert_eq!(viewer.frames().indices().collect::<Vec<_>>(), (1..=20).collect::<Vec<_>>());

    let mut sink = Recorder::default();
    viewer.tick(&mut sink).unwrap();
    viewer.tick(&mut sink).unwrap();
    assert_eq!(viewer.playback_frame(), 2);

    viewer.set_animation_enabled(false);
    assert!(viewer.frames().is_empty());
    assert_eq!(viewer.playback_frame(), 0);

    viewer.set_animation_enabled(true);
    assert_eq!(viewer.rebuild_count(), 2);
    assert_eq!(viewer.playback_frame(), 0);
    assert_eq!(viewer.frames().len(), 20);
}

#[test]
fn playback_cycles_through_cached_frames() {
    let mut viewer = viewer_with_extent(0);
    viewer.set_script("return t;");
    viewer.set_animation_enabled(true);

    let mut sink = Recorder::default();
    for _ in 0..21 {
        assert!(viewer.tick(&mut sink).unwrap());
    }

    let shown: Vec<Option<usize>> = sink.scenes.iter().map(|s| s.frame).collect();
    let mut expected: Vec<Option<usize>> = (1..=20).map(Some).collect();
    expected.push(Some(1));
    assert_eq!(shown, expected);
    assert!(sink.scenes.iter().all(|s| s.cubes == 1));

    // Ticks never rescan.
    assert_eq!(viewer.rebuild_count(), 1);
}

#[test]
fn frame_zero_has_no_cached_geometry() {
    let mut viewer = viewer_with_extent(1);
    viewer.set_script("return 1;");
    viewer.set_animation_enabled(true);

    let mut sink = Recorder::default();
    assert!(viewer.render(&mut sink).unwrap());
    assert_eq!(sink.scenes[0].frame, Some(0));
    assert_eq!(sink.scenes[0].batches, 0);
}

#[test]
fn failed_compile_then_fixed_script_recovers() {
    let mut viewer = viewer_with_extent(1);
    let mut sink = Recorder::default();

    assert!(!viewer.set_script("return missing_name;"));
    assert!(!viewer.compile_error().is_empty());
    assert!(!viewer.render(&mut sink).unwrap());
    assert!(sink.scenes.is_empty());

    assert!(viewer.set_script("return 5;"));
    assert!(viewer.compile_error().is_empty());
    assert!(viewer.render(&mut sink).unwrap());
    assert_eq!(sink.scenes[0].cubes, 27);
}

#[test]
fn animation_build_failure_leaves_cache_empty() {
    let mut viewer = viewer_with_extent(1);
    viewer.set_script("return 1 / (t - 3);");
    viewer.set_animation_enabled(true);

    assert!(viewer.frames().is_empty());
    let err = viewer.evaluation_error().unwrap();
    assert_eq!(err.t, 3);
}

#[test]
fn extent_can_go_negative_while_animating() {
    let mut viewer = viewer_with_extent(1);
    viewer.set_script(ORIGIN_ONLY);
    viewer.set_animation_enabled(true);
    assert_eq!(viewer.frames().get(1).unwrap().cube_count(), 1);

    let mut sink = Recorder::default();
    for extent in [i32::MIN, -1] {
        viewer.set_extent(extent);
        assert_eq!(viewer.frames().len(), 20);
        assert!(viewer.tick(&mut sink).unwrap());
    }
    assert!(sink.scenes.iter().all(|s| s.cubes == 0));

    viewer.set_animation_enabled(false);
    assert!(viewer.render(&mut sink).unwrap());
    assert_eq!(sink.scenes.last().unwrap().batches, 0);
}
