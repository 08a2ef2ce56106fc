//! The error/control-signal taxonomy surfaced to the embedder (§6.3/§7).

use std::fmt;

use crate::limits::Limits;
use crate::source::Source;

/// Specializes `RuntimeError`/`CompileError`'s `type` field (§7).
///
/// A string, not a closed Rust enum, because the full exception hierarchy
/// (including user-defined exception types) is owned by the external object
/// system; these five are the ones this core itself can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
pub enum ExcKind {
    NameError,
    AttributeError,
    ValueError,
    IndexError,
    TypeError,
}

/// An error raised by the compiler (label registration, block construction)
/// before any bytecode runs.
///
/// Formats as `<snapshot><type>: <message>`, matching the embedded-snapshot
/// shape rather than a bare message, so the embedder can print it directly.
#[derive(Debug, Clone)]
pub struct CompileError {
    pub kind: String,
    pub message: String,
    pub snapshot: String,
}

impl CompileError {
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>, src: &Source, line: i32) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            snapshot: src.snapshot(line, None),
        }
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}: {}", self.snapshot, self.kind, self.message)
    }
}

impl std::error::Error for CompileError {}

/// A user-visible exception propagating through the VM, accumulating a
/// traceback as it unwinds frames.
///
/// Snapshots are pushed in unwind order (innermost frame first) and rendered
/// in reverse — so the printed traceback reads outermost-first, innermost
/// last, matching a CPython-style traceback.
#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: String,
    pub message: String,
    snapshots: Vec<String>,
    max_traceback_depth: usize,
}

impl RuntimeError {
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self::with_limits(kind, message, Limits::default())
    }

    #[must_use]
    pub fn with_limits(kind: impl Into<String>, message: impl Into<String>, limits: Limits) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            snapshots: Vec::new(),
            max_traceback_depth: limits.max_traceback_depth,
        }
    }

    #[must_use]
    pub fn name_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::NameError.to_string(), message)
    }

    #[must_use]
    pub fn attribute_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::AttributeError.to_string(), message)
    }

    #[must_use]
    pub fn value_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::ValueError.to_string(), message)
    }

    #[must_use]
    pub fn index_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::IndexError.to_string(), message)
    }

    #[must_use]
    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ExcKind::TypeError.to_string(), message)
    }

    /// Appends a frame snapshot, once per unwound frame. Silently drops
    /// snapshots once `max_traceback_depth` frames have been recorded, rather
    /// than the original's literal check on the rendered snapshot's byte
    /// length.
    pub fn add_snapshot(&mut self, snapshot: String) {
        if self.snapshots.len() >= self.max_traceback_depth {
            return;
        }
        self.snapshots.push(snapshot);
    }

    #[must_use]
    pub fn matches_type(&self, kind: &str) -> bool {
        self.kind == kind
    }

    #[must_use]
    pub fn snapshots(&self) -> &[String] {
        &self.snapshots
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Traceback (most recent call last):")?;
        for snapshot in self.snapshots.iter().rev() {
            write!(f, "{snapshot}")?;
        }
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for RuntimeError {}

/// REPL control signal: the fed input is an incomplete statement and the
/// embedder should read more lines before retrying compilation. Not an
/// error — it never implements `std::error::Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NeedMoreLines {
    /// Class bodies require an indented continuation before the REPL should
    /// attempt to dispatch them; this distinguishes that case from an
    /// ordinary incomplete statement.
    pub is_class_def: bool,
}

impl NeedMoreLines {
    #[must_use]
    pub fn new(is_class_def: bool) -> Self {
        Self { is_class_def }
    }
}

/// Internal marker that a `raise` opcode fired. Not user-visible; the VM
/// dispatch loop (out of scope here) uses it to distinguish "an exception is
/// in flight" from an ordinary `Result::Err` return path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PyRaiseEvent;
