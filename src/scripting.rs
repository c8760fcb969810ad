//! Rhai compilation of voxel scripts.
//!
//! A voxel script is a statement sequence, not a full program. It is wrapped
//! into a fixed entry point before compilation:
//!
//! ```text
//! fn voxel(x, y, z, t, extent) {
//!     <user snippet>
//! }
//! ```
//!
//! Available inside the snippet:
//! - `x`, `y`, `z` - lattice cell, each in `-extent..=extent`
//! - `t` - frame index (0 for still rendering, `1..=frame_count` when animating)
//! - `extent` - half-size of the lattice
//! - `print(v)`, `debug(v)`, `log_info(v)`, `log_warn(v)`, `log_error(v)` - rate-limited output
//!
//! The snippet must produce an integer color code: `0` leaves the cell empty,
//! `1..=16` select palette colors, anything else renders in the default color.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use rhai::{CallFnOptions, Dynamic, Engine, Scope, AST, INT};
use serde::{Deserialize, Serialize};

use crate::palette::ColorCode;
use crate::script_diagnostics::{
    from_eval_error, from_parse_error, join_diagnostics, ScriptDiagnostic, ScriptPhase,
};
use crate::script_log::register_log_api;

/// Name of the generated entry point.
pub const ENTRY_POINT: &str = "voxel";

/// Parameter list of the entry point, in call order.
pub const ENTRY_PARAMS: [&str; 5] = ["x", "y", "z", "t", "extent"];

const TEMPLATE_HEADER: &str = "fn voxel(x, y, z, t, extent) {\n";
const TEMPLATE_FOOTER: &str = "\n}\n";

/// Sandbox limits applied to the script engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptLimits {
    /// Operations allowed per entry-point call. Stops runaway loops.
    pub max_operations: u64,
    pub max_expr_depth: usize,
    pub max_call_levels: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: 100_000,
            max_expr_depth: 64,
            max_call_levels: 64,
            max_string_size: 10_000,
            max_array_size: 1_000,
            max_map_size: 500,
        }
    }
}

/// Anything that can color a lattice cell.
///
/// Compiled scripts implement this, and so does any plain
/// `Fn(x, y, z, t, extent) -> ColorCode`, which keeps the mesher usable
/// without a script engine.
pub trait VoxelScript {
    fn eval(&self, x: i32, y: i32, z: i32, t: i32, extent: i32)
        -> Result<ColorCode, ScriptDiagnostic>;
}

impl<F> VoxelScript for F
where
    F: Fn(i32, i32, i32, i32, i32) -> ColorCode,
{
    fn eval(
        &self,
        x: i32,
        y: i32,
        z: i32,
        t: i32,
        extent: i32,
    ) -> Result<ColorCode, ScriptDiagnostic> {
        Ok(self(x, y, z, t, extent))
    }
}

/// All diagnostics produced by one failed compile attempt.
#[derive(Debug, Clone)]
pub struct CompileDiagnostic {
    pub diagnostics: Vec<ScriptDiagnostic>,
}

impl CompileDiagnostic {
    fn single(diag: ScriptDiagnostic) -> Self {
        Self {
            diagnostics: vec![diag],
        }
    }

    /// Newline-joined display text. Never empty for a real failure.
    pub fn text(&self) -> String {
        join_diagnostics(&self.diagnostics)
    }
}

impl fmt::Display for CompileDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

impl std::error::Error for CompileDiagnostic {}

/// A successfully compiled voxel script.
///
/// Rhai script functions cannot touch global state, so repeated calls with the
/// same arguments return the same result.
pub struct CompiledEvaluator {
    engine: Rc<Engine>,
    ast: AST,
    source: String,
}

impl CompiledEvaluator {
    /// The user snippet this evaluator was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }
}

impl fmt::Debug for CompiledEvaluator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledEvaluator")
            .field("source_len", &self.source.len())
            .finish_non_exhaustive()
    }
}

impl VoxelScript for CompiledEvaluator {
    fn eval(
        &self,
        x: i32,
        y: i32,
        z: i32,
        t: i32,
        extent: i32,
    ) -> Result<ColorCode, ScriptDiagnostic> {
        let mut scope = Scope::new();
        let options = CallFnOptions::new().eval_ast(false).rewind_scope(true);
        let args = (x as INT, y as INT, z as INT, t as INT, extent as INT);

        let value: Dynamic = self
            .engine
            .call_fn_with_options(options, &mut scope, &self.ast, ENTRY_POINT, args)
            .map_err(|e| from_eval_error(ScriptPhase::Evaluate, &e, user_line_offset()))?;

        value.as_int().map_err(|type_name| {
            ScriptDiagnostic::misuse(
                ScriptPhase::Evaluate,
                format!("voxel script must return an integer color code, got {type_name}"),
            )
        })
    }
}

/// Number of template lines before the user snippet.
fn user_line_offset() -> usize {
    TEMPLATE_HEADER.matches('\n').count()
}

/// Wrap a user snippet into the entry-point template.
pub fn wrap_source(source: &str) -> String {
    format!("{TEMPLATE_HEADER}{source}{TEMPLATE_FOOTER}")
}

/// Compiles voxel scripts with a shared, sandboxed engine.
pub struct ScriptCompiler {
    engine: Rc<Engine>,
}

impl ScriptCompiler {
    pub fn new() -> Self {
        Self::with_limits(&ScriptLimits::default())
    }

    pub fn with_limits(limits: &ScriptLimits) -> Self {
        let mut engine = Engine::new();

        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_operations(limits.max_operations);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(limits.max_array_size);
        engine.set_max_map_size(limits.max_map_size);

        // Undeclared variables are compile errors, not runtime surprises.
        engine.set_strict_variables(true);

        register_log_api(&mut engine);

        Self {
            engine: Rc::new(engine),
        }
    }

    /// Compile a snippet into an evaluator.
    ///
    /// Parse errors, a missing entry point and any panic raised while compiling
    /// all come back as a [`CompileDiagnostic`]; no evaluator is produced.
    pub fn compile(&self, source: &str) -> Result<CompiledEvaluator, CompileDiagnostic> {
        let started = std::time::Instant::now();
        let full_script = wrap_source(source);

        let compiled = catch_unwind(AssertUnwindSafe(|| self.engine.compile(&full_script)));

        let ast = match compiled {
            Ok(Ok(ast)) => ast,
            Ok(Err(e)) => {
                let diag = from_parse_error(&e, user_line_offset());
                log::warn!("Voxel script failed to compile: {}", diag);
                return Err(CompileDiagnostic::single(diag));
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                log::error!("Script engine panicked during compile: {}", message);
                return Err(CompileDiagnostic::single(ScriptDiagnostic::host(
                    ScriptPhase::Compile,
                    message,
                )));
            }
        };

        let has_entry = ast
            .iter_functions()
            .any(|f| f.name == ENTRY_POINT && f.params.len() == ENTRY_PARAMS.len());
        if !has_entry {
            return Err(CompileDiagnostic::single(ScriptDiagnostic::host(
                ScriptPhase::Load,
                format!(
                    "compiled script does not define {}({})",
                    ENTRY_POINT,
                    ENTRY_PARAMS.join(", ")
                ),
            )));
        }

        log::info!(
            "Compiled voxel script ({} bytes) in {:.2?}",
            source.len(),
            started.elapsed()
        );

        Ok(CompiledEvaluator {
            engine: Rc::clone(&self.engine),
            ast,
            source: source.to_string(),
        })
    }
}

impl Default for ScriptCompiler {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "script engine panicked".to_string()
    }
}
