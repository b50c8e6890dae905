use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use super::ast::Span;

/// A compiler diagnostic with source location. Errors and warnings share this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{message}")]
pub struct Diagnostic {
    pub message: String,
    pub span: Span,
    pub kind: ErrorKind,
    pub severity: Severity,
    /// Originating file, stamped by the pipeline driver.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    Scan,
    Preprocess,
    Parse,
    Analyze,
    Generate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl Diagnostic {
    fn new(kind: ErrorKind, severity: Severity, message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
            kind,
            severity,
            path: None,
        }
    }

    pub fn scan(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Scan, Severity::Error, message, span)
    }

    pub fn preprocess(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Preprocess, Severity::Error, message, span)
    }

    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Parse, Severity::Error, message, span)
    }

    pub fn analyze(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Analyze, Severity::Error, message, span)
    }

    pub fn generate(message: impl Into<String>, span: Span) -> Self {
        Self::new(ErrorKind::Generate, Severity::Error, message, span)
    }

    /// Downgrade to a warning, keeping the kind.
    pub fn warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn with_path(mut self, path: &Path) -> Self {
        self.path = Some(path.to_path_buf());
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Short one-line form: `[parse] line 3:7: message`.
    pub fn format_short(&self) -> String {
        format!(
            "[{}] line {}:{}: {}",
            self.kind.label(),
            self.span.start.line,
            self.span.start.column,
            self.message,
        )
    }

    /// Render with a highlighted excerpt of the source between `span.start` and `span.end`.
    pub fn render(&self, lines: &[String]) -> String {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        let mut out = format!("{severity}[{}]: {}\n", self.kind.label(), self.message);
        let location = self
            .path
            .as_ref()
            .map_or_else(|| "<input>".to_string(), |p| p.display().to_string());
        let start = self.span.start;
        let end = self.span.end;
        let _ = writeln!(out, "  --> {location}:{}:{}", start.line, start.column);

        let last_line = end.line.max(start.line);
        let gutter = last_line.to_string().len();
        let _ = writeln!(out, "{:gutter$} |", "");
        for line_no in start.line..=last_line {
            let Some(text) = line_no.checked_sub(1).and_then(|i| lines.get(i)) else {
                break;
            };
            let _ = writeln!(out, "{line_no:>gutter$} | {text}");
            let width = text.chars().count();
            let from = if line_no == start.line { start.column.saturating_sub(1) } else { 0 };
            let to = if line_no == end.line {
                end.column.saturating_sub(1).max(from + 1)
            } else {
                width.max(from + 1)
            };
            let _ = writeln!(
                out,
                "{:gutter$} | {}{}",
                "",
                " ".repeat(from),
                "^".repeat(to - from),
            );
        }
        out
    }
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Scan => "scan",
            ErrorKind::Preprocess => "preprocess",
            ErrorKind::Parse => "parse",
            ErrorKind::Analyze => "analyze",
            ErrorKind::Generate => "generate",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::ast::Position;

    #[test]
    fn short_format_includes_kind_and_position() {
        let span = Span::new(Position::new(3, 7), Position::new(3, 9));
        let err = Diagnostic::parse("Expected ':'", span);
        assert_eq!(err.format_short(), "[parse] line 3:7: Expected ':'");
        assert!(err.is_error());
        assert!(!err.clone().warning().is_error());
    }

    #[test]
    fn render_underlines_span() {
        let lines = vec!["var x = 1 +".to_string()];
        let span = Span::new(Position::new(1, 9), Position::new(1, 12));
        let rendered = Diagnostic::analyze("bad", span)
            .with_path(Path::new("main.bot"))
            .render(&lines);
        assert!(rendered.starts_with("error[analyze]: bad\n"));
        assert!(rendered.contains("--> main.bot:1:9"));
        assert!(rendered.contains("1 | var x = 1 +"));
        assert!(rendered.contains("  |         ^^^"));
    }

    #[test]
    fn render_handles_missing_lines() {
        let span = Span::new(Position::new(40, 1), Position::new(40, 2));
        let rendered = Diagnostic::scan("gone", span).warning().render(&[]);
        assert!(rendered.starts_with("warning[scan]: gone"));
    }
}
