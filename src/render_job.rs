//! Render job specification and metadata.
//!
//! A job names a script file, an output directory and the lattice settings.
//! Running it writes OBJ frames plus a `metadata.json` describing the run.

use std::path::{Path, PathBuf};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::obj_export::ObjExporter;
use crate::scene::{RenderSink, Scene, SceneStats};
use crate::scripting::ScriptCompiler;
use crate::viewer::{ViewerConfig, VoxelViewer};

fn default_extent() -> i32 {
    10
}

fn default_frame_count() -> usize {
    crate::animation::DEFAULT_FRAME_COUNT
}

/// Specification for a single render job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderJobSpec {
    /// Path to the voxel script (a Rhai statement sequence).
    pub script_path: PathBuf,

    /// Output directory for frames and metadata.
    pub output_dir: PathBuf,

    /// Lattice half-size.
    #[serde(default = "default_extent")]
    pub extent: i32,

    /// Build and export every animation frame instead of a single still.
    #[serde(default)]
    pub animate: bool,

    /// Frames built when `animate` is set.
    #[serde(default = "default_frame_count")]
    pub frame_count: usize,

    /// Optional name recorded in metadata.
    #[serde(default)]
    pub preset_name: Option<String>,
}

impl RenderJobSpec {
    pub fn new(script_path: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            script_path,
            output_dir,
            extent: default_extent(),
            animate: false,
            frame_count: default_frame_count(),
            preset_name: None,
        }
    }

    /// Load a job spec from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read job file {:?}: {}", path, e))?;
        serde_json::from_str(&content)
            .map_err(|e| format!("Failed to parse job file {:?}: {}", path, e))
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.script_path.exists() {
            return Err(format!("Script file not found: {:?}", self.script_path));
        }
        if self.animate && self.frame_count == 0 {
            return Err("Frame count must be positive when animating".to_string());
        }
        Ok(())
    }
}

/// Metadata for a completed render, written as metadata.json.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderMetadata {
    pub job: RenderJobSpec,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,

    pub render_duration_secs: f64,

    /// Scenes written.
    pub frame_count: usize,

    /// Size of every written scene, in output order.
    pub frames: Vec<SceneStats>,

    /// SHA-256 of the script text.
    pub script_hash: String,

    pub cubeviewer_version: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl RenderMetadata {
    pub fn hash_script(source: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(source.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn save(&self, path: &Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize metadata: {}", e))?;
        std::fs::write(path, json).map_err(|e| format!("Failed to write metadata: {}", e))
    }
}

/// Render phase for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPhase {
    ScriptLoading,
    Compile,
    Evaluate,
    Export,
    MetadataSave,
}

impl std::fmt::Display for RenderPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RenderPhase::ScriptLoading => write!(f, "Script Loading"),
            RenderPhase::Compile => write!(f, "Compile"),
            RenderPhase::Evaluate => write!(f, "Evaluate"),
            RenderPhase::Export => write!(f, "Export"),
            RenderPhase::MetadataSave => write!(f, "Metadata Save"),
        }
    }
}

/// Structured error for render failures.
#[derive(Debug)]
pub struct RenderError {
    pub phase: RenderPhase,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.phase, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

impl RenderError {
    pub fn new(phase: RenderPhase, message: impl Into<String>) -> Self {
        Self {
            phase,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        phase: RenderPhase,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            phase,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Run a job to completion: compile, build, export, then save metadata.
///
/// Unlike the interactive viewer, any evaluation failure aborts the job.
pub fn run_render_job(spec: &RenderJobSpec) -> Result<RenderMetadata, RenderError> {
    let started_at = Utc::now();
    let start = Instant::now();

    spec.validate()
        .map_err(|e| RenderError::new(RenderPhase::ScriptLoading, e))?;
    let source = std::fs::read_to_string(&spec.script_path).map_err(|e| {
        RenderError::with_source(
            RenderPhase::ScriptLoading,
            format!("Failed to read {:?}", spec.script_path),
            e,
        )
    })?;

    let config = ViewerConfig {
        extent: spec.extent,
        frame_count: spec.frame_count,
        ..ViewerConfig::default()
    };

    // Compile once up front so failures carry the full diagnostic list.
    ScriptCompiler::with_limits(&config.limits)
        .compile(&source)
        .map_err(|e| RenderError::with_source(RenderPhase::Compile, "Script failed to compile", e))?;

    let mut viewer = VoxelViewer::new(config);
    viewer.set_script(source.as_str());

    let mut exporter = ObjExporter::new(&spec.output_dir)
        .map_err(|e| RenderError::new(RenderPhase::Export, format!("{:#}", e)))?;

    if spec.animate {
        viewer.set_animation_enabled(true);
        if let Some(err) = viewer.evaluation_error() {
            return Err(RenderError::with_source(
                RenderPhase::Evaluate,
                "Animation build failed",
                err.clone(),
            ));
        }
        let light = viewer.light();
        for (index, meshes) in viewer.frames().iter() {
            exporter
                .present(&Scene::from_meshes(light, Some(index), meshes))
                .map_err(|e| RenderError::new(RenderPhase::Export, format!("{:#}", e)))?;
        }
    } else {
        viewer
            .render(&mut exporter)
            .map_err(|e| RenderError::new(RenderPhase::Export, format!("{:#}", e)))?;
        if let Some(err) = viewer.evaluation_error() {
            return Err(RenderError::with_source(
                RenderPhase::Evaluate,
                "Scan failed",
                err.clone(),
            ));
        }
    }

    let frames: Vec<SceneStats> = exporter.written().iter().map(|(_, stats)| *stats).collect();
    let mut warnings = Vec::new();
    if frames.iter().all(|f| f.cubes == 0) {
        warnings.push("Script produced no visible cubes".to_string());
    }

    let metadata = RenderMetadata {
        job: spec.clone(),
        started_at,
        completed_at: Utc::now(),
        render_duration_secs: start.elapsed().as_secs_f64(),
        frame_count: frames.len(),
        frames,
        script_hash: RenderMetadata::hash_script(&source),
        cubeviewer_version: env!("CARGO_PKG_VERSION").to_string(),
        warnings,
    };

    metadata
        .save(&spec.output_dir.join("metadata.json"))
        .map_err(|e| RenderError::new(RenderPhase::MetadataSave, e))?;

    log::info!(
        "Render job finished: {} frame(s) in {:.2}s",
        metadata.frame_count,
        metadata.render_duration_secs
    );
    Ok(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job_with_script(dir: &Path, source: &str) -> RenderJobSpec {
        let script = dir.join("voxels.rhai");
        std::fs::write(&script, source).unwrap();
        let mut spec = RenderJobSpec::new(script, dir.join("out"));
        spec.extent = 1;
        spec
    }

    #[test]
    fn test_still_job_writes_frame_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let spec = job_with_script(dir.path(), "return 7;");

        let metadata = run_render_job(&spec).unwrap();
        assert_eq!(metadata.frame_count, 1);
        assert_eq!(metadata.frames[0].cubes, 27);
        assert!(metadata.warnings.is_empty());
        assert!(spec.output_dir.join("frame_00000.obj").exists());
        assert!(spec.output_dir.join("metadata.json").exists());
    }

    #[test]
    fn test_animated_job_writes_every_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut spec = job_with_script(dir.path(), "if x == 0 && y == 0 && z == 0 { return t; } return 0;");
        spec.animate = true;
        spec.frame_count = 3;

        let metadata = run_render_job(&spec).unwrap();
        assert_eq!(metadata.frame_count, 3);
        assert_eq!(metadata.frames[0].frame, Some(1));
        assert!(spec.output_dir.join("frame_00003.obj").exists());
    }

    #[test]
    fn test_compile_failure_is_reported_by_phase() {
        let dir = tempfile::tempdir().unwrap();
        let spec = job_with_script(dir.path(), "return ((;");

        let err = run_render_job(&spec).unwrap_err();
        assert_eq!(err.phase, RenderPhase::Compile);
    }

    #[test]
    fn test_evaluation_failure_aborts_job() {
        let dir = tempfile::tempdir().unwrap();
        let spec = job_with_script(dir.path(), "return 1 / x;");

        let err = run_render_job(&spec).unwrap_err();
        assert_eq!(err.phase, RenderPhase::Evaluate);
        assert!(!spec.output_dir.join("metadata.json").exists());
    }

    #[test]
    fn test_empty_result_warns() {
        let dir = tempfile::tempdir().unwrap();
        let spec = job_with_script(dir.path(), "return 0;");

        let metadata = run_render_job(&spec).unwrap();
        assert_eq!(metadata.warnings.len(), 1);
    }

    #[test]
    fn test_render_job_spec_validation() {
        let spec = RenderJobSpec::new(
            PathBuf::from("/nonexistent/script.rhai"),
            PathBuf::from("/output"),
        );
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_render_job_spec_defaults() {
        let spec: RenderJobSpec =
            serde_json::from_str(r#"{ "scriptPath": "a.rhai", "outputDir": "out" }"#).unwrap();

        assert_eq!(spec.extent, 10);
        assert!(!spec.animate);
        assert_eq!(spec.frame_count, 20);
        assert!(spec.preset_name.is_none());
    }

    #[test]
    fn test_zero_frames_rejected_when_animating() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("s.rhai");
        std::fs::write(&script, "return 1;").unwrap();

        let mut spec = RenderJobSpec::new(script, dir.path().join("out"));
        assert!(spec.validate().is_ok());

        spec.animate = true;
        spec.frame_count = 0;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn test_script_hash_is_stable() {
        let a = RenderMetadata::hash_script("return 7;");
        assert_eq!(a.len(), 64);
        assert_eq!(a, RenderMetadata::hash_script("return 7;"));
        assert_ne!(a, RenderMetadata::hash_script("return 8;"));
    }

    #[test]
    fn test_render_error_display() {
        let err = RenderError::new(RenderPhase::Compile, "bad script");
        assert_eq!(err.to_string(), "[Compile] bad script");
    }
}
