//! Structured diagnostics produced by the lexer and parser, and the sink
//! abstraction the compiler driver reports them through.

use std::fmt;

use crate::span::SourceLocation;

/// Phase that produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Lexer,
    Parser,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Lexer => f.write_str("Lexer"),
            Phase::Parser => f.write_str("Parser"),
        }
    }
}

/// Every kind of user-facing error the front end can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    // Lexical
    UnexpectedCharacter,
    UnterminatedBlockComment,

    // Syntax
    MissingSemicolon,
    MissingExpression,
    MissingLeftParenthesis,
    MissingRightParenthesis,
    MissingLeftBrace,
    MissingRightBrace,
    MissingScopeClosing,
    UnexpectedToken,
    NumberOutOfRange,
}

impl DiagnosticKind {
    pub fn code(self) -> &'static str {
        match self {
            DiagnosticKind::UnexpectedCharacter => "E0001",
            DiagnosticKind::UnterminatedBlockComment => "E0002",
            DiagnosticKind::MissingSemicolon => "E0100",
            DiagnosticKind::MissingExpression => "E0101",
            DiagnosticKind::MissingLeftParenthesis => "E0102",
            DiagnosticKind::MissingRightParenthesis => "E0103",
            DiagnosticKind::MissingLeftBrace => "E0104",
            DiagnosticKind::MissingRightBrace => "E0105",
            DiagnosticKind::MissingScopeClosing => "E0106",
            DiagnosticKind::UnexpectedToken => "E0107",
            DiagnosticKind::NumberOutOfRange => "E0108",
        }
    }

    pub fn phase(self) -> Phase {
        match self {
            DiagnosticKind::UnexpectedCharacter | DiagnosticKind::UnterminatedBlockComment => {
                Phase::Lexer
            }
            _ => Phase::Parser,
        }
    }
}

/// A single error record: what went wrong, where, and optionally which
/// token text was expected and which was found instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub location: SourceLocation,
    pub expected: Option<String>,
    pub found: Option<String>,
}

impl Diagnostic {
    pub fn error(kind: DiagnosticKind, location: SourceLocation) -> Self {
        Self {
            kind,
            location,
            expected: None,
            found: None,
        }
    }

    pub fn with_expected(mut self, expected: impl Into<String>) -> Self {
        self.expected = Some(expected.into());
        self
    }

    pub fn with_found(mut self, found: impl Into<String>) -> Self {
        self.found = Some(found.into());
        self
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    /// One-line human readable message.
    pub fn message(&self) -> String {
        let found = self.found.as_deref().unwrap_or("?");
        match self.kind {
            DiagnosticKind::UnexpectedCharacter => format!("unexpected character '{found}'"),
            DiagnosticKind::UnterminatedBlockComment => "unterminated block comment".to_string(),
            DiagnosticKind::MissingSemicolon => format!("expected ';', received '{found}'"),
            DiagnosticKind::MissingExpression => {
                format!("expected expression, received '{found}'")
            }
            DiagnosticKind::MissingLeftParenthesis => format!("expected '(', received '{found}'"),
            DiagnosticKind::MissingRightParenthesis => format!("expected ')', received '{found}'"),
            DiagnosticKind::MissingLeftBrace => format!("expected '{{', received '{found}'"),
            DiagnosticKind::MissingRightBrace => format!("expected '}}', received '{found}'"),
            DiagnosticKind::MissingScopeClosing => "scope not closed, expected '}'".to_string(),
            DiagnosticKind::UnexpectedToken => format!("unexpected token '{found}'"),
            DiagnosticKind::NumberOutOfRange => {
                format!("number literal '{found}' does not fit in a 32-bit integer")
            }
        }
    }

    /// Multi-line rendering with the offending source line and a caret.
    pub fn render(&self) -> String {
        let mut out = format!(
            "error[{}]: {}\n  --> {}",
            self.code(),
            self.message(),
            self.location
        );
        if let Some(line) = &self.location.code_line {
            let pad = self.location.column.saturating_sub(1) as usize;
            out.push_str(&format!("\n   | {}\n   | {}^", line, " ".repeat(pad)));
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} at {}",
            self.kind.phase(),
            self.message(),
            self.location
        )
    }
}

/// Abstract destination for diagnostics.
pub trait DiagnosticSink {
    fn report(&mut self, diagnostic: &Diagnostic);
}

impl DiagnosticSink for Vec<Diagnostic> {
    fn report(&mut self, diagnostic: &Diagnostic) {
        self.push(diagnostic.clone());
    }
}

/// Sink that logs every diagnostic at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&mut self, diagnostic: &Diagnostic) {
        tracing::error!(
            phase = %diagnostic.kind.phase(),
            "{}",
            diagnostic.render()
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    fn location() -> SourceLocation {
        SourceLocation::new(Arc::from("main.wdt"), 2, 8).with_code_line("return 1")
    }

    #[test]
    fn renders_caret_under_offending_column() {
        let diag = Diagnostic::error(DiagnosticKind::MissingSemicolon, location()).with_found("EOF");
        let rendered = diag.render();
        assert_eq!(
            rendered,
            "error[E0100]: expected ';', received 'EOF'\n  --> main.wdt:2:8\n   | return 1\n   |        ^"
        );
    }

    #[test]
    fn kinds_map_to_phases() {
        assert_eq!(DiagnosticKind::UnexpectedCharacter.phase(), Phase::Lexer);
        assert_eq!(DiagnosticKind::UnexpectedToken.phase(), Phase::Parser);
    }

    #[test]
    fn vec_sink_collects() {
        let mut sink: Vec<Diagnostic> = Vec::new();
        let diag = Diagnostic::error(DiagnosticKind::UnexpectedToken, location()).with_found("}");
        sink.report(&diag);
        assert_eq!(sink.len(), 1);
        assert_eq!(sink[0].to_string(), "[Parser] unexpected token '}' at main.wdt:2:8");
    }
}
