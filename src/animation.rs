//! Precomputed animation frames and playback position.
//!
//! Frames are built eagerly, all at once, so that clock ticks only look up
//! geometry. Frame keys run `1..=frame_count` and each is scanned with
//! `t` equal to its key. Playback advances before rendering and wraps after
//! reaching `frame_count`, so index 0 is never built; a render at index 0
//! finds no frame.

use std::collections::BTreeMap;
use std::time::Instant;

use crate::mesh::MeshSet;
use crate::scripting::VoxelScript;
use crate::voxel_grid::{scan, ScanError};

/// Number of frames built when animation is enabled.
pub const DEFAULT_FRAME_COUNT: usize = 20;

/// Frame index → mesh set.
#[derive(Debug, Default)]
pub struct FrameCache {
    frames: BTreeMap<usize, MeshSet>,
}

impl FrameCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard all frames and build `1..=frame_count` from scratch.
    ///
    /// On an evaluation error the cache is left empty.
    pub fn rebuild(
        &mut self,
        evaluator: Option<&dyn VoxelScript>,
        extent: i32,
        frame_count: usize,
    ) -> Result<(), ScanError> {
        self.clear();
        let started = Instant::now();

        for index in 1..=frame_count {
            match scan(evaluator, extent, index as i32) {
                Ok(meshes) => {
                    self.frames.insert(index, meshes);
                }
                Err(e) => {
                    self.clear();
                    return Err(e);
                }
            }
        }

        log::info!(
            "Built {} animation frames (extent {}) in {:.2?}",
            self.frames.len(),
            extent,
            started.elapsed()
        );
        Ok(())
    }

    pub fn clear(&mut self) {
        self.frames.clear();
    }

    pub fn get(&self, index: usize) -> Option<&MeshSet> {
        self.frames.get(&index)
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Built frame keys in ascending order.
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.frames.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &MeshSet)> {
        self.frames.iter().map(|(i, m)| (*i, m))
    }
}

/// Current playback frame.
#[derive(Debug, Clone)]
pub struct Playback {
    frame: usize,
    frame_count: usize,
}

impl Playback {
    pub fn new(frame_count: usize) -> Self {
        Self {
            frame: 0,
            frame_count,
        }
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    pub fn reset(&mut self) {
        self.frame = 0;
    }

    /// Step forward for a clock tick and return the frame to render.
    pub fn advance(&mut self) -> usize {
        self.frame += 1;
        self.frame
    }

    /// Wrap to 0 once the last frame has been shown. Called after rendering.
    pub fn finish_tick(&mut self) {
        if self.frame >= self.frame_count {
            self.frame = 0;
        }
    }
}

impl Default for Playback {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_COUNT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::palette::ColorCode;
    use crate::script_diagnostics::{ScriptDiagnostic, ScriptPhase};

    fn frame_as_color(_x: i32, _y: i32, _z: i32, t: i32, _e: i32) -> ColorCode {
        t as ColorCode
    }

    #[test]
    fn test_rebuild_builds_one_to_frame_count() {
        let mut cache = FrameCache::new();
        cache
            .rebuild(Some(&frame_as_color), 0, DEFAULT_FRAME_COUNT)
            .unwrap();

        assert_eq!(cache.len(), 20);
        assert_eq!(cache.indices().collect::<Vec<_>>(), (1..=20).collect::<Vec<_>>());
        assert!(cache.get(0).is_none());
        // Each frame is scanned with t equal to its key.
        for (index, meshes) in cache.iter() {
            assert!(meshes.get(index as ColorCode).is_some());
        }
    }

    #[test]
    fn test_rebuild_discards_previous_frames() {
        let mut cache = FrameCache::new();
        cache.rebuild(Some(&frame_as_color), 0, 20).unwrap();
        cache.rebuild(Some(&frame_as_color), 0, 5).unwrap();

        assert_eq!(cache.len(), 5);
        assert!(cache.get(6).is_none());

        for _ in 0..3 {
            cache.rebuild(Some(&frame_as_color), 0, 20).unwrap();
            assert!(cache.len() <= 20);
        }
    }

    struct FailsAtFrame(i32);

    impl VoxelScript for FailsAtFrame {
        fn eval(&self, _x: i32, _y: i32, _z: i32, t: i32, _e: i32) -> Result<ColorCode, ScriptDiagnostic> {
            if t == self.0 {
                Err(ScriptDiagnostic::host(ScriptPhase::Evaluate, "frame failed"))
            } else {
                Ok(1)
            }
        }
    }

    #[test]
    fn test_rebuild_error_leaves_cache_empty() {
        let mut cache = FrameCache::new();
        cache.rebuild(Some(&frame_as_color), 0, 20).unwrap();
        let err = cache.rebuild(Some(&FailsAtFrame(3)), 0, 20).unwrap_err();

        assert_eq!(err.t, 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_rebuild_without_evaluator_stores_empty_frames() {
        let mut cache = FrameCache::new();
        cache.rebuild(None, 3, 4).unwrap();

        assert_eq!(cache.len(), 4);
        assert!(cache.iter().all(|(_, m)| m.is_empty()));
    }

    #[test]
    fn test_playback_shows_one_to_frame_count() {
        let mut playback = Playback::new(20);
        let mut shown = Vec::new();
        for _ in 0..40 {
            shown.push(playback.advance());
            playback.finish_tick();
        }

        let expected: Vec<usize> = (1..=20).chain(1..=20).collect();
        assert_eq!(shown, expected);
        assert_eq!(playback.frame(), 0);
    }

    #[test]
    fn test_playback_reset() {
        let mut playback = Playback::default();
        playback.advance();
        playback.finish_tick();
        playback.advance();
        playback.finish_tick();
        assert_eq!(playback.frame(), 2);

        playback.reset();
        assert_eq!(playback.frame(), 0);
    }
}
