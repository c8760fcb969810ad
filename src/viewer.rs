//! Viewer state: configuration, compiled script, animation frames and playback.
//!
//! All mutation goes through three setters (`set_script`, `set_extent`,
//! `set_animation_enabled`). Each one recompiles and/or rebuilds eagerly, so
//! `render` and `tick` never compile and `tick` never scans.

use serde::{Deserialize, Serialize};

use crate::animation::{FrameCache, Playback, DEFAULT_FRAME_COUNT};
use crate::scene::{RenderSink, Scene, SunLight};
use crate::script_diagnostics::ScriptDiagnostic;
use crate::scripting::{CompiledEvaluator, ScriptCompiler, ScriptLimits, VoxelScript};
use crate::voxel_grid::{scan, ScanError};

fn default_extent() -> i32 {
    10
}

fn default_frame_count() -> usize {
    DEFAULT_FRAME_COUNT
}

fn default_tick_interval_ms() -> u64 {
    40
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerConfig {
    /// Lattice half-size; cells span `-extent..=extent` per axis.
    #[serde(default = "default_extent")]
    pub extent: i32,
    /// Frames built when animation is enabled.
    #[serde(default = "default_frame_count")]
    pub frame_count: usize,
    /// Playback clock period.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    #[serde(default)]
    pub limits: ScriptLimits,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            extent: default_extent(),
            frame_count: default_frame_count(),
            tick_interval_ms: default_tick_interval_ms(),
            limits: ScriptLimits::default(),
        }
    }
}

pub struct VoxelViewer {
    compiler: ScriptCompiler,
    config: ViewerConfig,
    light: SunLight,
    script: Option<String>,
    evaluator: Option<CompiledEvaluator>,
    compile_error: String,
    compile_diagnostics: Vec<ScriptDiagnostic>,
    evaluation_error: Option<ScanError>,
    animation_enabled: bool,
    frames: FrameCache,
    playback: Playback,
    rebuild_count: usize,
}

impl VoxelViewer {
    pub fn new(config: ViewerConfig) -> Self {
        let compiler = ScriptCompiler::with_limits(&config.limits);
        let playback = Playback::new(config.frame_count);
        Self {
            compiler,
            config,
            light: SunLight::default(),
            script: None,
            evaluator: None,
            compile_error: String::new(),
            compile_diagnostics: Vec::new(),
            evaluation_error: None,
            animation_enabled: false,
            frames: FrameCache::new(),
            playback,
            rebuild_count: 0,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn extent(&self) -> i32 {
        self.config.extent
    }

    pub fn light(&self) -> SunLight {
        self.light
    }

    pub fn script(&self) -> Option<&str> {
        self.script.as_deref()
    }

    pub fn is_animation_enabled(&self) -> bool {
        self.animation_enabled
    }

    /// Diagnostics of the last compile, newline-joined. Empty after success.
    pub fn compile_error(&self) -> &str {
        &self.compile_error
    }

    pub fn compile_diagnostics(&self) -> &[ScriptDiagnostic] {
        &self.compile_diagnostics
    }

    /// The evaluation failure of the last scan or frame build, if any.
    pub fn evaluation_error(&self) -> Option<&ScanError> {
        self.evaluation_error.as_ref()
    }

    pub fn has_evaluator(&self) -> bool {
        self.evaluator.is_some()
    }

    pub fn frames(&self) -> &FrameCache {
        &self.frames
    }

    pub fn playback_frame(&self) -> usize {
        self.playback.frame()
    }

    /// How many times the frame cache has been rebuilt.
    pub fn rebuild_count(&self) -> usize {
        self.rebuild_count
    }

    /// Replace the script. Unchanged text is ignored.
    ///
    /// Returns whether an evaluator is installed afterwards.
    pub fn set_script(&mut self, source: impl Into<String>) -> bool {
        let source = source.into();
        if self.script.as_deref() == Some(source.as_str()) {
            return self.evaluator.is_some();
        }
        self.script = Some(source);
        self.compile();
        self.reset();
        self.evaluator.is_some()
    }

    pub fn set_extent(&mut self, extent: i32) {
        if self.config.extent == extent {
            return;
        }
        self.config.extent = extent;
        self.reset();
    }

    pub fn set_animation_enabled(&mut self, enabled: bool) {
        if self.animation_enabled == enabled {
            return;
        }
        self.animation_enabled = enabled;
        self.playback.reset();
        self.frames.clear();
        if enabled {
            self.build_frames();
        }
    }

    fn compile(&mut self) {
        // The previous evaluator never survives a compile attempt.
        self.evaluator = None;
        self.compile_diagnostics.clear();
        self.compile_error.clear();

        let Some(source) = self.script.as_deref() else {
            return;
        };

        match self.compiler.compile(source) {
            Ok(evaluator) => {
                self.evaluator = Some(evaluator);
            }
            Err(diag) => {
                self.compile_error = diag.text();
                self.compile_diagnostics = diag.diagnostics;
            }
        }
    }

    fn reset(&mut self) {
        self.playback.reset();
        self.frames.clear();
        self.evaluation_error = None;
        if self.animation_enabled {
            self.build_frames();
        }
    }

    fn build_frames(&mut self) {
        self.rebuild_count += 1;
        let evaluator = self.evaluator.as_ref().map(|e| e as &dyn VoxelScript);
        match self.frames.rebuild(evaluator, self.config.extent, self.config.frame_count) {
            Ok(()) => self.evaluation_error = None,
            Err(e) => {
                log::warn!("Animation build failed: {}", e);
                self.evaluation_error = Some(e);
            }
        }
    }

    /// Hand the current scene to `sink`.
    ///
    /// Without an evaluator nothing is presented and `false` is returned.
    /// With animation on, the cached frame at the playback position is shown
    /// (light only when that frame was never built); otherwise the lattice is
    /// scanned at `t = 0`.
    pub fn render(&mut self, sink: &mut dyn RenderSink) -> anyhow::Result<bool> {
        let Some(evaluator) = self.evaluator.as_ref() else {
            return Ok(false);
        };

        if self.animation_enabled {
            let frame = self.playback.frame();
            let scene = match self.frames.get(frame) {
                Some(meshes) => Scene::from_meshes(self.light, Some(frame), meshes),
                None => Scene::empty(self.light, Some(frame)),
            };
            sink.present(&scene)?;
            return Ok(true);
        }

        match scan(Some(evaluator), self.config.extent, 0) {
            Ok(meshes) => {
                self.evaluation_error = None;
                sink.present(&Scene::from_meshes(self.light, None, &meshes))?;
            }
            Err(e) => {
                log::warn!("Scan failed: {}", e);
                self.evaluation_error = Some(e);
                sink.present(&Scene::empty(self.light, None))?;
            }
        }
        Ok(true)
    }

    /// Clock tick: advance playback and render the new frame.
    /// Does nothing while animation is off.
    pub fn tick(&mut self, sink: &mut dyn RenderSink) -> anyhow::Result<bool> {
        if !self.animation_enabled {
            return Ok(false);
        }
        self.playback.advance();
        let rendered = self.render(sink);
        self.playback.finish_tick();
        rendered
    }
}

impl Default for VoxelViewer {
    fn default() -> Self {
        Self::new(ViewerConfig::default())
    }
}
