//! Script output for voxel scripts.
//!
//! Scripts can call `print`, `debug`, `log_info`, `log_warn` and `log_error`.
//! A voxel script runs once per lattice cell, so output is capped per scan:
//! after [`MAX_LOGS_PER_SCAN`] messages the rest are dropped with a single warning.

use std::cell::Cell;

/// Maximum number of script messages allowed per lattice scan.
pub const MAX_LOGS_PER_SCAN: u32 = 100;

// Scans run on the thread that owns the evaluator, so the budget is per thread.
thread_local! {
    static LOG_COUNT: Cell<u32> = const { Cell::new(0) };
    static WARNED_LIMIT: Cell<bool> = const { Cell::new(false) };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Debug => "[DEBUG]",
            LogLevel::Info => "[INFO]",
            LogLevel::Warn => "[WARN]",
            LogLevel::Error => "[ERROR]",
        }
    }
}

/// Reset the per-scan counter. Called at the start of every scan.
pub fn reset_scan_log_count() {
    LOG_COUNT.with(|c| c.set(0));
    WARNED_LIMIT.with(|w| w.set(false));
}

fn can_log() -> bool {
    let count = LOG_COUNT.with(|c| {
        let n = c.get();
        c.set(n.saturating_add(1));
        n
    });
    if count >= MAX_LOGS_PER_SCAN {
        if !WARNED_LIMIT.with(|w| w.replace(true)) {
            emit_log(
                LogLevel::Warn,
                &format!(
                    "Script log limit exceeded ({} messages/scan). Further logs dropped.",
                    MAX_LOGS_PER_SCAN
                ),
            );
        }
        false
    } else {
        true
    }
}

/// Write a message to stdout (debug/info) or stderr (warn/error).
pub fn emit_log(level: LogLevel, message: &str) {
    match level {
        LogLevel::Debug | LogLevel::Info => println!("{} {}", level.prefix(), message),
        LogLevel::Warn | LogLevel::Error => eprintln!("{} {}", level.prefix(), message),
    }
}

/// Log a message from a script, respecting the per-scan limit.
pub fn script_log(level: LogLevel, message: &str) {
    if can_log() {
        emit_log(level, message);
    }
}

/// Convert a Rhai value to display text. Never panics.
pub fn stringify_dynamic(value: &rhai::Dynamic) -> String {
    if let Ok(s) = value.clone().into_string() {
        return s;
    }

    if let Some(arr) = value.clone().try_cast::<rhai::Array>() {
        let parts: Vec<String> = arr.iter().map(stringify_dynamic).collect();
        return parts.join(" ");
    }

    if let Some(map) = value.clone().try_cast::<rhai::Map>() {
        let parts: Vec<String> = map
            .iter()
            .map(|(k, v)| format!("{}: {}", k, stringify_dynamic(v)))
            .collect();
        return format!("{{{}}}", parts.join(", "));
    }

    if let Ok(i) = value.as_int() {
        return i.to_string();
    }
    if let Ok(f) = value.as_float() {
        return format!("{}", f);
    }
    if let Ok(b) = value.as_bool() {
        return b.to_string();
    }
    if value.is_unit() {
        return "()".to_string();
    }

    format!("{:?}", value)
}

/// Register the logging functions on an engine.
pub fn register_log_api(engine: &mut rhai::Engine) {
    engine
        .register_fn("log_info", |value: rhai::Dynamic| {
            script_log(LogLevel::Info, &stringify_dynamic(&value));
        })
        .register_fn("log_warn", |value: rhai::Dynamic| {
            script_log(LogLevel::Warn, &stringify_dynamic(&value));
        })
        .register_fn("log_error", |value: rhai::Dynamic| {
            script_log(LogLevel::Error, &stringify_dynamic(&value));
        });

    engine.on_print(|text| script_log(LogLevel::Info, text));
    engine.on_debug(|text, _source, pos| {
        let message = match pos.line() {
            Some(line) if line > 1 => format!("(line {}) {}", line - 1, text),
            _ => text.to_string(),
        };
        script_log(LogLevel::Debug, &message);
    });
}
