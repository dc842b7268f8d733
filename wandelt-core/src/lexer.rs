//! Lexer for the Wandelt language.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use crate::diagnostic::{Diagnostic, DiagnosticKind};
use crate::span::SourceLocation;

/// Kind of a token produced by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    // Literals
    Number,

    // Keywords
    Let,
    Return,
    If,
    Else,

    // Braces
    LeftParen,  // (
    RightParen, // )
    LeftBrace,  // {
    RightBrace, // }

    // Operators
    Equals,     // =
    Plus,       // +
    Minus,      // -
    Star,       // *
    DoubleStar, // **
    Slash,      // /
    Percent,    // %

    // Comparison
    EqualEqual,   // ==
    BangEqual,    // !=
    Less,         // <
    LessEqual,    // <=
    Greater,      // >
    GreaterEqual, // >=

    // Punctuation
    Comma,     // ,
    Dot,       // .
    Semicolon, // ;

    // Identifiers
    VariableIdentifier, // $name
    FunctionIdentifier, // name

    EndOfFile,
}

impl TokenKind {
    /// Stable upper-case name, e.g. `NUMBER`.
    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Number => "NUMBER",
            TokenKind::Let => "LET_KEYWORD",
            TokenKind::Return => "RETURN_KEYWORD",
            TokenKind::If => "IF_KEYWORD",
            TokenKind::Else => "ELSE_KEYWORD",
            TokenKind::LeftParen => "LEFT_PARENTHESES",
            TokenKind::RightParen => "RIGHT_PARENTHESES",
            TokenKind::LeftBrace => "LEFT_BRACE",
            TokenKind::RightBrace => "RIGHT_BRACE",
            TokenKind::Equals => "EQUALS",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Star => "STAR",
            TokenKind::DoubleStar => "DOUBLE_STAR",
            TokenKind::Slash => "SLASH",
            TokenKind::Percent => "PERCENT",
            TokenKind::EqualEqual => "EQUAL_EQUAL",
            TokenKind::BangEqual => "BANG_EQUAL",
            TokenKind::Less => "LESS",
            TokenKind::LessEqual => "LESS_EQUAL",
            TokenKind::Greater => "GREATER",
            TokenKind::GreaterEqual => "GREATER_EQUAL",
            TokenKind::Comma => "COMMA",
            TokenKind::Dot => "DOT",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::VariableIdentifier => "VARIABLE_IDENTIFIER",
            TokenKind::FunctionIdentifier => "FUNCTION_IDENTIFIER",
            TokenKind::EndOfFile => "END_OF_FILE",
        }
    }

    /// Source text of a fixed-text token, e.g. `**`. Lexeme-carrying kinds
    /// fall back to their name.
    pub fn representation(self) -> &'static str {
        match self {
            TokenKind::Let => "let",
            TokenKind::Return => "return",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::LeftParen => "(",
            TokenKind::RightParen => ")",
            TokenKind::LeftBrace => "{",
            TokenKind::RightBrace => "}",
            TokenKind::Equals => "=",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::DoubleStar => "**",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::EqualEqual => "==",
            TokenKind::BangEqual => "!=",
            TokenKind::Less => "<",
            TokenKind::LessEqual => "<=",
            TokenKind::Greater => ">",
            TokenKind::GreaterEqual => ">=",
            TokenKind::Comma => ",",
            TokenKind::Dot => ".",
            TokenKind::Semicolon => ";",
            TokenKind::EndOfFile => "EOF",
            TokenKind::Number | TokenKind::VariableIdentifier | TokenKind::FunctionIdentifier => {
                self.name()
            }
        }
    }
}

static KEYWORDS: Lazy<HashMap<&'static str, TokenKind>> = Lazy::new(|| {
    HashMap::from([
        ("let", TokenKind::Let),
        ("return", TokenKind::Return),
        ("if", TokenKind::If),
        ("else", TokenKind::Else),
    ])
});

/// Look up a reserved word.
pub fn keyword(text: &str) -> Option<TokenKind> {
    KEYWORDS.get(text).copied()
}

/// A single token. Only numbers and identifiers carry a lexeme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: Option<String>,
    pub location: SourceLocation,
}

impl Token {
    /// The lexeme if present, otherwise the fixed representation.
    pub fn text(&self) -> &str {
        self.lexeme
            .as_deref()
            .unwrap_or_else(|| self.kind.representation())
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token [{}]: {} at line: {} column: {}",
            self.kind.name(),
            self.text(),
            self.location.line,
            self.location.column
        )
    }
}

/// Result of lexing a source file.
#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

impl LexResult {
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Lex a source string into tokens.
///
/// Scanning stops at the first lexical error; the token list then holds
/// everything scanned before the error followed by the end-of-file sentinel.
pub fn lex(file_name: &str, source: &str) -> LexResult {
    let mut lexer = Lexer {
        file: Arc::from(file_name),
        source,
        chars: source.as_bytes(),
        index: 0,
        line: 1,
        column: 0,
        line_start: 0,
        line_text: None,
        tokens: Vec::new(),
        diagnostics: Vec::new(),
    };
    lexer.run();
    LexResult {
        tokens: lexer.tokens,
        diagnostics: lexer.diagnostics,
    }
}

struct Lexer<'src> {
    file: Arc<str>,
    source: &'src str,
    chars: &'src [u8],
    index: usize,
    line: u32,
    column: u32,
    /// Byte offset of the first character of the current line.
    line_start: usize,
    /// Cached text of the line starting at `line_start`.
    line_text: Option<Arc<str>>,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

impl<'src> Lexer<'src> {
    fn run(&mut self) {
        while let Some(ch) = self.peek_char() {
            let start = self.index;
            let location = self.location();
            self.consume_char();

            let kind = match ch {
                b' ' | b'\t' | b'\r' | b'\n' => continue,
                b',' => TokenKind::Comma,
                b'.' => TokenKind::Dot,
                b';' => TokenKind::Semicolon,
                b'(' => TokenKind::LeftParen,
                b')' => TokenKind::RightParen,
                b'{' => TokenKind::LeftBrace,
                b'}' => TokenKind::RightBrace,
                b'+' => TokenKind::Plus,
                b'-' => TokenKind::Minus,
                b'%' => TokenKind::Percent,
                b'=' => self.pick(b'=', TokenKind::EqualEqual, TokenKind::Equals),
                b'<' => self.pick(b'=', TokenKind::LessEqual, TokenKind::Less),
                b'>' => self.pick(b'=', TokenKind::GreaterEqual, TokenKind::Greater),
                b'*' => self.pick(b'*', TokenKind::DoubleStar, TokenKind::Star),
                b'!' => {
                    if self.match_next(b'=') {
                        TokenKind::BangEqual
                    } else {
                        self.unexpected_char(start, location);
                        break;
                    }
                }
                b'/' => {
                    if self.match_next(b'/') {
                        self.skip_line_comment();
                        continue;
                    }
                    if self.match_next(b'*') {
                        if self.skip_block_comment() {
                            continue;
                        }
                        self.diagnostics.push(Diagnostic::error(
                            DiagnosticKind::UnterminatedBlockComment,
                            location,
                        ));
                        break;
                    }
                    TokenKind::Slash
                }
                b'0'..=b'9' => {
                    self.lex_number(start, location);
                    continue;
                }
                _ if is_ident_start(ch) => {
                    self.lex_ident_or_keyword(start, location);
                    continue;
                }
                _ => {
                    self.unexpected_char(start, location);
                    break;
                }
            };

            self.tokens.push(Token {
                kind,
                lexeme: None,
                location,
            });
        }

        let location = self.location();
        self.tokens.push(Token {
            kind: TokenKind::EndOfFile,
            lexeme: None,
            location,
        });
    }

    fn pick(&mut self, next: u8, matched: TokenKind, otherwise: TokenKind) -> TokenKind {
        if self.match_next(next) {
            matched
        } else {
            otherwise
        }
    }

    fn unexpected_char(&mut self, start: usize, location: SourceLocation) {
        let found = self.source[start..]
            .chars()
            .next()
            .map(String::from)
            .unwrap_or_default();
        let diag = Diagnostic::error(DiagnosticKind::UnexpectedCharacter, location).with_found(found);
        self.diagnostics.push(diag);
    }

    fn skip_line_comment(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch == b'\n' {
                break;
            }
            self.consume_char();
        }
    }

    /// Returns false when the input ends before `*/`.
    fn skip_block_comment(&mut self) -> bool {
        loop {
            match (self.peek_char(), self.peek_next()) {
                (Some(b'*'), Some(b'/')) => {
                    self.consume_char();
                    self.consume_char();
                    return true;
                }
                (Some(_), _) => self.consume_char(),
                (None, _) => return false,
            }
        }
    }

    fn lex_number(&mut self, start: usize, location: SourceLocation) {
        while let Some(b'0'..=b'9') = self.peek_char() {
            self.consume_char();
        }
        let lexeme = self.source[start..self.index].to_string();
        self.tokens.push(Token {
            kind: TokenKind::Number,
            lexeme: Some(lexeme),
            location,
        });
    }

    fn lex_ident_or_keyword(&mut self, start: usize, location: SourceLocation) {
        while let Some(ch) = self.peek_char() {
            if is_ident_continue(ch) {
                self.consume_char();
            } else {
                break;
            }
        }

        let text = &self.source[start..self.index];
        let token = match keyword(text) {
            Some(kind) => Token {
                kind,
                lexeme: None,
                location,
            },
            None => {
                let kind = if text.starts_with('$') {
                    TokenKind::VariableIdentifier
                } else {
                    TokenKind::FunctionIdentifier
                };
                Token {
                    kind,
                    lexeme: Some(text.to_string()),
                    location,
                }
            }
        };
        self.tokens.push(token);
    }

    /// Location of the character about to be consumed.
    fn location(&mut self) -> SourceLocation {
        let code_line = self.current_line();
        SourceLocation::new(self.file.clone(), self.line, self.column + 1).with_code_line(code_line)
    }

    fn current_line(&mut self) -> Arc<str> {
        if let Some(text) = &self.line_text {
            return text.clone();
        }
        let rest = &self.source[self.line_start..];
        let end = rest.find('\n').unwrap_or(rest.len());
        let text: Arc<str> = Arc::from(rest[..end].trim_end_matches('\r'));
        self.line_text = Some(text.clone());
        text
    }

    fn peek_char(&self) -> Option<u8> {
        self.chars.get(self.index).copied()
    }

    fn peek_next(&self) -> Option<u8> {
        self.chars.get(self.index + 1).copied()
    }

    fn match_next(&mut self, expected: u8) -> bool {
        if self.peek_char() == Some(expected) {
            self.consume_char();
            true
        } else {
            false
        }
    }

    fn consume_char(&mut self) {
        let Some(ch) = self.peek_char() else {
            return;
        };
        self.index += 1;
        self.column += 1;
        if ch == b'\n' {
            self.line += 1;
            self.column = 0;
            self.line_start = self.index;
            self.line_text = None;
        }
    }
}

fn is_ident_start(ch: u8) -> bool {
    ch.is_ascii_alphabetic() || ch == b'$'
}

fn is_ident_continue(ch: u8) -> bool {
    is_ident_start(ch) || ch.is_ascii_digit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        lex("test.wdt", source)
            .tokens
            .iter()
            .map(|token| token.kind)
            .collect()
    }

    #[test]
    fn lexes_return_statement() {
        let result = lex("test.wdt", "return 2 ** 10;");
        assert!(result.is_valid());
        let kinds: Vec<_> = result.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Return,
                TokenKind::Number,
                TokenKind::DoubleStar,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::EndOfFile,
            ]
        );
        assert_eq!(result.tokens[1].lexeme.as_deref(), Some("2"));
        assert_eq!(result.tokens[3].lexeme.as_deref(), Some("10"));
        assert!(result.tokens[2].lexeme.is_none());
    }

    #[test]
    fn recognizes_two_character_operators() {
        assert_eq!(
            kinds("== != <= >= ** = < > *"),
            vec![
                TokenKind::EqualEqual,
                TokenKind::BangEqual,
                TokenKind::LessEqual,
                TokenKind::GreaterEqual,
                TokenKind::DoubleStar,
                TokenKind::Equals,
                TokenKind::Less,
                TokenKind::Greater,
                TokenKind::Star,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn classifies_identifiers_and_keywords() {
        let result = lex("test.wdt", "if else let return print $x $y2 elsewhere");
        let kinds: Vec<_> = result.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::If,
                TokenKind::Else,
                TokenKind::Let,
                TokenKind::Return,
                TokenKind::FunctionIdentifier,
                TokenKind::VariableIdentifier,
                TokenKind::VariableIdentifier,
                TokenKind::FunctionIdentifier,
                TokenKind::EndOfFile,
            ]
        );
        assert_eq!(result.tokens[5].lexeme.as_deref(), Some("$x"));
        assert_eq!(result.tokens[7].lexeme.as_deref(), Some("elsewhere"));
        assert!(result.tokens[0].lexeme.is_none());
    }

    #[test]
    fn tracks_lines_and_columns() {
        let result = lex("test.wdt", "return 1;\n  return 22;");
        let second_return = &result.tokens[3];
        assert_eq!(second_return.kind, TokenKind::Return);
        assert_eq!(second_return.location.line, 2);
        assert_eq!(second_return.location.column, 3);
        assert_eq!(second_return.location.code_line.as_deref(), Some("  return 22;"));

        let number = &result.tokens[4];
        assert_eq!(number.location.column, 10);
        assert_eq!(result.tokens[1].location.column, 8);
    }

    #[test]
    fn end_of_file_points_past_the_last_character() {
        let result = lex("test.wdt", "return 1");
        let eof = result.tokens.last().expect("eof token");
        assert_eq!(eof.kind, TokenKind::EndOfFile);
        assert_eq!(eof.location.line, 1);
        assert_eq!(eof.location.column, 9);
        assert_eq!(eof.location.code_line.as_deref(), Some("return 1"));

        let result = lex("test.wdt", "return 1;
");
        let eof = result.tokens.last().expect("eof token");
        assert_eq!((eof.location.line, eof.location.column), (2, 1));
    }

    #[test]
    fn skips_comments() {
        let source = "// leading comment\nreturn /* inline\n comment */ 3; // trailing";
        assert_eq!(
            kinds(source),
            vec![
                TokenKind::Return,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn unterminated_block_comment_stops_lexing() {
        let result = lex("test.wdt", "return 1; /* never closed\nreturn 2;");
        assert!(!result.is_valid());
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(
            result.diagnostics[0].kind,
            DiagnosticKind::UnterminatedBlockComment
        );
        let kinds: Vec<_> = result.tokens.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Return,
                TokenKind::Number,
                TokenKind::Semicolon,
                TokenKind::EndOfFile,
            ]
        );
    }

    #[test]
    fn unexpected_character_is_fail_fast() {
        let result = lex("test.wdt", "return 1 # 2; return 3;");
        assert!(!result.is_valid());
        assert_eq!(result.diagnostics.len(), 1);
        let diag = &result.diagnostics[0];
        assert_eq!(diag.kind, DiagnosticKind::UnexpectedCharacter);
        assert_eq!(diag.found.as_deref(), Some("#"));
        assert_eq!(diag.location.column, 10);
        assert_eq!(result.tokens.len(), 3);
        assert_eq!(result.tokens[2].kind, TokenKind::EndOfFile);
    }

    #[test]
    fn lone_bang_is_rejected() {
        let result = lex("test.wdt", "1 ! 2");
        assert!(!result.is_valid());
        assert_eq!(result.diagnostics[0].found.as_deref(), Some("!"));
    }

    #[test]
    fn lexing_is_idempotent() {
        let source = "if 1 < 2 { print(3, $a); } else { return 4 % 2; }";
        let first = lex("test.wdt", source);
        let second = lex("test.wdt", source);
        assert_eq!(first.tokens, second.tokens);
    }

    #[test]
    fn eof_only_for_empty_input() {
        assert_eq!(kinds(""), vec![TokenKind::EndOfFile]);
        assert_eq!(kinds("  \n\t "), vec![TokenKind::EndOfFile]);
    }

    #[test]
    fn displays_token_for_dumps() {
        let result = lex("test.wdt", "return 7;");
        assert_eq!(
            result.tokens[1].to_string(),
            "Token [NUMBER]: 7 at line: 1 column: 8"
        );
        assert_eq!(
            result.tokens[2].to_string(),
            "Token [SEMICOLON]: ; at line: 1 column: 9"
        );
    }
}
