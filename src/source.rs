//! Owns source text and renders the location snapshots used by [`crate::error`].

use std::fmt;

/// The parsing/compilation mode a [`Source`] was constructed for.
///
/// Exposed to the embedder so it can choose REPL-style incremental feeding
/// (`Single`) versus whole-module compilation (`Exec`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, strum::Display)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum CompileMode {
    /// A module or script; the last expression statement's value is discarded.
    Exec,
    /// A single expression; the final stack-top is the result.
    Eval,
    /// REPL input; incomplete statements surface as [`crate::error::NeedMoreLines`].
    Single,
    /// A JSON-restricted expression subset.
    Json,
}

/// Immutable source text plus the bookkeeping needed to render diagnostics.
///
/// Constructed once by the embedder and shared (by reference) with every
/// `CodeObject` compiled from it; never mutated afterward.
#[derive(Debug, Clone)]
pub struct Source {
    text: String,
    filename: String,
    mode: CompileMode,
    /// Byte offset of the start of each 1-based line, index 0 holding line 1's start.
    line_starts: Vec<usize>,
}

impl Source {
    /// Builds a `Source`, stripping a leading UTF-8 BOM if present and
    /// indexing line-start offsets eagerly.
    #[must_use]
    pub fn new(text: impl Into<String>, filename: impl Into<String>, mode: CompileMode) -> Self {
        let mut text = text.into();
        if let Some(stripped) = text.strip_prefix('\u{feff}') {
            text = stripped.to_string();
        }

        let mut line_starts = vec![0usize];
        for (offset, ch) in text.char_indices() {
            if ch == '\n' {
                line_starts.push(offset + 1);
            }
        }

        Self {
            text,
            filename: filename.into(),
            mode,
            line_starts,
        }
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn filename(&self) -> &str {
        &self.filename
    }

    #[must_use]
    pub fn mode(&self) -> CompileMode {
        self.mode
    }

    /// Returns the substring of the `lineno`-th 1-based line, excluding its
    /// terminating newline. `lineno == -1` yields an empty span.
    ///
    /// # Panics
    /// Panics if `lineno` (after clamping negative values to line 1) is past
    /// the last indexed line — an out-of-range line number is an
    /// implementation error in the caller, not a user-facing one.
    #[must_use]
    pub fn get_line(&self, lineno: i32) -> &str {
        if lineno == -1 {
            return "";
        }
        let mut idx = lineno - 1;
        if idx < 0 {
            idx = 0;
        }
        let idx = idx as usize;
        let start = self.line_starts[idx];
        let end = self.text[start..]
            .find('\n')
            .map_or(self.text.len(), |rel| start + rel);
        &self.text[start..end]
    }

    /// Renders a three-line human-readable diagnostic for `line`, optionally
    /// pointing a caret at the byte offset `cursor` within that line.
    ///
    /// Shape:
    /// ```text
    ///   File "<filename>", line <n>
    ///     <left-trimmed source line or "<?>">
    ///     <caret line, only when cursor falls within the line>
    /// ```
    #[must_use]
    pub fn snapshot(&self, line: i32, cursor: Option<usize>) -> String {
        use fmt::Write as _;

        let mut out = String::new();
        let _ = writeln!(out, "  File \"{}\", line {line}", self.filename);

        let raw = self.get_line(line);
        let trimmed = raw.trim_start();
        let removed = raw.len() - trimmed.len();
        let rendered: &str = if trimmed.is_empty() { "<?>" } else { trimmed };
        let _ = writeln!(out, "    {rendered}");

        if rendered != "<?>" {
            if let Some(cursor) = cursor {
                let line_start = self.line_start_offset(line);
                let line_end = line_start + raw.len();
                if cursor >= line_start && cursor <= line_end {
                    let column = cursor as isize - line_start as isize - removed as isize;
                    if column >= 0 {
                        let _ = writeln!(out, "    {}^", " ".repeat(column as usize));
                    }
                }
            }
        }

        out
    }

    fn line_start_offset(&self, lineno: i32) -> usize {
        if lineno == -1 {
            return 0;
        }
        let mut idx = lineno - 1;
        if idx < 0 {
            idx = 0;
        }
        self.line_starts[idx as usize]
    }
}
