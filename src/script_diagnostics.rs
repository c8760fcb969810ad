//! Structured script diagnostics.
//!
//! Rhai reports parse and runtime errors with positions inside the wrapped
//! script. These are converted into a stable, JSON-serializable format whose
//! locations point into the user's snippet rather than the function template.

use std::fmt;

use rhai::{EvalAltResult, ParseError, Position};
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptDiagnosticKind {
    /// Syntax/parse errors (compile time).
    ParseError,
    /// Runtime errors in user code.
    RuntimeError,
    /// Script used the host API incorrectly (unknown function, wrong types, bad return value).
    HostApiMisuse,
    /// Internal/host error (e.g. the compiled template has no entry point).
    HostError,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptPhase {
    Compile,
    Load,
    Evaluate,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScriptLocation {
    /// 1-based line number in the user snippet (not the template).
    pub line: u32,
    /// 1-based column number.
    pub column: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptDiagnostic {
    pub kind: ScriptDiagnosticKind,
    pub phase: ScriptPhase,
    pub message: String,
    pub location: Option<ScriptLocation>,
    /// Raw engine error string.
    #[serde(default)]
    pub raw: Option<String>,
}

impl ScriptDiagnostic {
    /// A diagnostic raised by the host rather than the script engine.
    pub fn host(phase: ScriptPhase, message: impl Into<String>) -> Self {
        Self {
            kind: ScriptDiagnosticKind::HostError,
            phase,
            message: message.into(),
            location: None,
            raw: None,
        }
    }

    /// A diagnostic for a script value the host cannot use.
    pub fn misuse(phase: ScriptPhase, message: impl Into<String>) -> Self {
        Self {
            kind: ScriptDiagnosticKind::HostApiMisuse,
            phase,
            message: message.into(),
            location: None,
            raw: None,
        }
    }
}

impl fmt::Display for ScriptDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) => write!(f, "line {}, column {}: {}", loc.line, loc.column, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ScriptDiagnostic {}

/// Concatenate diagnostics into the single display string exposed to callers.
/// An empty slice yields an empty string, which means success.
pub fn join_diagnostics(diagnostics: &[ScriptDiagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Runtime failures raised inside the entry point come back wrapped in a
/// function-call error; the useful position and message are on the inner one.
fn innermost(err: &EvalAltResult) -> &EvalAltResult {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => innermost(inner),
        other => other,
    }
}

fn classify(err: &EvalAltResult) -> ScriptDiagnosticKind {
    match innermost(err) {
        EvalAltResult::ErrorFunctionNotFound(..)
        | EvalAltResult::ErrorVariableNotFound(..)
        | EvalAltResult::ErrorPropertyNotFound(..)
        | EvalAltResult::ErrorMismatchDataType(..)
        | EvalAltResult::ErrorMismatchOutputType(..)
        | EvalAltResult::ErrorIndexingType(..) => ScriptDiagnosticKind::HostApiMisuse,
        _ => ScriptDiagnosticKind::RuntimeError,
    }
}

/// Translate an engine position into the user's snippet.
///
/// Positions on template lines (or unknown positions) yield `None`.
fn locate(pos: Position, user_line_offset: usize) -> Option<ScriptLocation> {
    let line = pos.line()?;
    if line <= user_line_offset {
        return None;
    }
    Some(ScriptLocation {
        line: (line - user_line_offset) as u32,
        column: pos.position().unwrap_or(1).max(1) as u32,
    })
}

pub fn from_parse_error(err: &ParseError, user_line_offset: usize) -> ScriptDiagnostic {
    ScriptDiagnostic {
        kind: ScriptDiagnosticKind::ParseError,
        phase: ScriptPhase::Compile,
        message: err.err_type().to_string(),
        location: locate(err.position(), user_line_offset),
        raw: Some(err.to_string()),
    }
}

pub fn from_eval_error(
    phase: ScriptPhase,
    err: &EvalAltResult,
    user_line_offset: usize,
) -> ScriptDiagnostic {
    let cause = innermost(err);
    ScriptDiagnostic {
        kind: classify(err),
        phase,
        message: cause.to_string(),
        location: locate(cause.position(), user_line_offset),
        raw: Some(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_inside_template_is_dropped() {
        assert_eq!(locate(Position::new(1, 4), 1), None);
        assert_eq!(locate(Position::NONE, 0), None);
    }

    #[test]
    fn test_position_maps_to_user_line() {
        let loc = locate(Position::new(3, 7), 1).unwrap();
        assert_eq!(loc, ScriptLocation { line: 2, column: 7 });
    }

    #[test]
    fn test_classification() {
        let missing = EvalAltResult::ErrorFunctionNotFound("foo (i64)".into(), Position::NONE);
        assert_eq!(classify(&missing), ScriptDiagnosticKind::HostApiMisuse);

        let div = EvalAltResult::ErrorArithmetic("Division by zero".into(), Position::new(2, 5));
        assert_eq!(classify(&div), ScriptDiagnosticKind::RuntimeError);

        let wrapped = EvalAltResult::ErrorInFunctionCall(
            "voxel".into(),
            String::new(),
            Box::new(div),
            Position::NONE,
        );
        let diag = from_eval_error(ScriptPhase::Evaluate, &wrapped, 1);
        assert_eq!(diag.kind, ScriptDiagnosticKind::RuntimeError);
        assert_eq!(diag.location, Some(ScriptLocation { line: 1, column: 5 }));
        assert!(diag.message.contains("Division by zero"));
    }

    #[test]
    fn test_join_and_display() {
        let mut with_loc = ScriptDiagnostic::host(ScriptPhase::Compile, "Unexpected ';'");
        with_loc.location = Some(ScriptLocation { line: 2, column: 9 });
        let plain = ScriptDiagnostic::host(ScriptPhase::Load, "no entry point");

        assert_eq!(join_diagnostics(&[]), "");
        assert_eq!(
            join_diagnostics(&[with_loc, plain]),
            "line 2, column 9: Unexpected ';'\nno entry point"
        );
    }

    #[test]
    fn test_serializes_snake_case() {
        let diag = ScriptDiagnostic::misuse(ScriptPhase::Evaluate, "bad value");
        let json = serde_json::to_string(&diag).unwrap();
        assert!(json.contains("\"kind\":\"host_api_misuse\""));
        assert!(json.contains("\"phase\":\"evaluate\""));
    }
}
