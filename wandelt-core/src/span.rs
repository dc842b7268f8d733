//! Source locations attached to tokens, AST nodes and diagnostics.

use std::fmt;
use std::sync::Arc;

/// Where a token or node came from.
///
/// `line` is 1-based. `column` is the column of the first character of the
/// token, counted from 1 after the preceding newline. `code_line` carries the
/// full text of the enclosing source line so diagnostics can be rendered
/// without access to the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
    pub code_line: Option<Arc<str>>,
}

impl SourceLocation {
    pub fn new(file: Arc<str>, line: u32, column: u32) -> Self {
        Self {
            file,
            line,
            column,
            code_line: None,
        }
    }

    pub fn with_code_line(mut self, code_line: impl Into<Arc<str>>) -> Self {
        self.code_line = Some(code_line.into());
        self
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_file_line_and_column() {
        let location = SourceLocation::new(Arc::from("main.wdt"), 3, 7);
        assert_eq!(location.to_string(), "main.wdt:3:7");
    }

    #[test]
    fn code_line_is_optional() {
        let location = SourceLocation::new(Arc::from("main.wdt"), 1, 1);
        assert!(location.code_line.is_none());
        let location = location.with_code_line("return 1;");
        assert_eq!(location.code_line.as_deref(), Some("return 1;"));
    }
}
