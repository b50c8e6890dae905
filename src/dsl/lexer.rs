use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;

use super::ast::{Position, Span, Value};
use super::error::Diagnostic;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Literals
    Number(f64),
    Str(String),
    True,
    False,

    // Identifiers & keywords
    Ident(String),
    Var,
    Const,
    Func,
    Event,
    If,
    Elif,
    Else,
    Loop,
    While,
    Until,
    And, // and, &&
    Or,  // or, ||
    Not, // not, !

    // Type names
    NumberTy,
    StringTy,
    BooleanTy,
    ImageTy,

    // Punctuation
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Dot,
    Colon,
    At,

    // Operators
    Plus,
    PlusEq,
    Minus,
    MinusEq,
    Star,
    StarEq,
    Slash,
    SlashEq,
    Percent,
    PercentEq,
    Lt,
    Gt,
    Le, // <=
    Ge, // >=
    EqEq,
    Ne, // !=
    Eq,

    // Special
    /// `#define` and friends; holds the name without `#`.
    Directive(String),
    Newline,
    Eof,
}

impl Token {
    /// Decoded value of a literal token.
    pub fn literal(&self) -> Option<Value> {
        match self {
            Token::Number(n) => Some(Value::Number(*n)),
            Token::Str(s) => Some(Value::Str(s.clone())),
            Token::True => Some(Value::Bool(true)),
            Token::False => Some(Value::Bool(false)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedToken {
    pub token: Token,
    pub lexeme: String,
    pub span: Span,
    /// Leading whitespace count of the line the token sits on.
    pub indent: usize,
    pub path: Arc<Path>,
}

/// Output of scanning one file.
#[derive(Debug, Clone)]
pub struct Scanned {
    pub tokens: Vec<SpannedToken>,
    /// Every line read so far, for diagnostic rendering.
    pub lines: Vec<String>,
    /// Scanning stops at the first error.
    pub error: Option<Diagnostic>,
}

/// Scan a source stream line by line.
pub fn scan<R: BufRead>(reader: R, path: &Path) -> Scanned {
    let mut lexer = Lexer::new(path);
    let error = lexer.run(reader).err();
    Scanned {
        tokens: lexer.tokens,
        lines: lexer.lines,
        error,
    }
}

pub fn scan_str(source: &str, path: &Path) -> Scanned {
    scan(source.as_bytes(), path)
}

/// Token stream for an in-memory source, or the scan error.
pub fn lex(source: &str) -> Result<Vec<SpannedToken>, Diagnostic> {
    let scanned = scan_str(source, Path::new("<input>"));
    match scanned.error {
        Some(e) => Err(e),
        None => Ok(scanned.tokens),
    }
}

struct Lexer {
    path: Arc<Path>,
    tokens: Vec<SpannedToken>,
    lines: Vec<String>,
    /// Nesting depth of `/* */`, carried across lines.
    comment_depth: usize,
    comment_start: Position,
    /// Open `(`/`[` count; newlines inside brackets are not emitted.
    bracket_depth: usize,
    /// First indentation character seen in the file.
    indent_char: Option<char>,
}

/// Cursor over one source line.
struct Line<'a> {
    number: usize,
    chars: &'a [char],
    pos: usize,
    indent: usize,
    has_tokens: bool,
}

impl Line<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_next(&self) -> Option<char> {
        self.chars.get(self.pos + 1).copied()
    }

    fn position(&self, index: usize) -> Position {
        Position::new(self.number, index + 1)
    }

    fn text(&self, start: usize) -> String {
        self.chars.get(start..self.pos).unwrap_or_default().iter().collect()
    }
}

impl Lexer {
    fn new(path: &Path) -> Self {
        Self {
            path: Arc::from(path),
            tokens: Vec::new(),
            lines: Vec::new(),
            comment_depth: 0,
            comment_start: Position::default(),
            bracket_depth: 0,
            indent_char: None,
        }
    }

    fn run<R: BufRead>(&mut self, reader: R) -> Result<(), Diagnostic> {
        for (index, line) in reader.lines().enumerate() {
            let number = index + 1;
            let mut text = line.map_err(|e| {
                let at = Position::new(number, 1);
                Diagnostic::scan(format!("Could not read line {number}: {e}"), Span::new(at, at))
            })?;
            if text.ends_with('\r') {
                text.pop();
            }
            self.lines.push(text);
            let chars: Vec<char> = self.lines.last().map(|l| l.chars().collect()).unwrap_or_default();
            self.scan_line(number, &chars)?;
        }

        let eof_line = self.lines.len() + 1;
        if self.comment_depth > 0 {
            return Err(Diagnostic::scan(
                "Unterminated block comment",
                Span::new(self.comment_start, self.comment_start),
            ));
        }
        let eof = Position::new(eof_line, 1);
        if self.tokens.last().is_some_and(|t| t.token != Token::Newline) {
            self.push_raw(Token::Newline, String::new(), Span::new(eof, eof), 0);
        }
        self.push_raw(Token::Eof, String::new(), Span::new(eof, eof), 0);
        Ok(())
    }

    fn scan_line(&mut self, number: usize, chars: &[char]) -> Result<(), Diagnostic> {
        let indent = chars.iter().take_while(|c| **c == ' ' || **c == '\t').count();
        let mut line = Line { number, chars, pos: 0, indent, has_tokens: false };

        while let Some(ch) = line.peek() {
            let start = line.pos;

            if self.comment_depth > 0 {
                if ch == '/' && line.peek_next() == Some('*') {
                    self.comment_depth += 1;
                    line.pos += 2;
                } else if ch == '*' && line.peek_next() == Some('/') {
                    self.comment_depth -= 1;
                    line.pos += 2;
                } else {
                    line.pos += 1;
                }
                continue;
            }

            match ch {
                ' ' | '\t' => line.pos += 1,
                '/' if line.peek_next() == Some('/') => break,
                '/' if line.peek_next() == Some('*') => {
                    self.comment_depth = 1;
                    self.comment_start = line.position(start);
                    line.pos += 2;
                }
                '(' => { line.pos += 1; self.bracket_depth += 1; self.push(&mut line, Token::LParen, start)?; }
                ')' => { line.pos += 1; self.bracket_depth = self.bracket_depth.saturating_sub(1); self.push(&mut line, Token::RParen, start)?; }
                '[' => { line.pos += 1; self.bracket_depth += 1; self.push(&mut line, Token::LBracket, start)?; }
                ']' => { line.pos += 1; self.bracket_depth = self.bracket_depth.saturating_sub(1); self.push(&mut line, Token::RBracket, start)?; }
                ',' => { line.pos += 1; self.push(&mut line, Token::Comma, start)?; }
                '.' => { line.pos += 1; self.push(&mut line, Token::Dot, start)?; }
                ':' => { line.pos += 1; self.push(&mut line, Token::Colon, start)?; }
                '@' => { line.pos += 1; self.push(&mut line, Token::At, start)?; }
                '+' => self.one_or_eq(&mut line, Token::Plus, Token::PlusEq)?,
                '-' => self.one_or_eq(&mut line, Token::Minus, Token::MinusEq)?,
                '*' => self.one_or_eq(&mut line, Token::Star, Token::StarEq)?,
                '/' => self.one_or_eq(&mut line, Token::Slash, Token::SlashEq)?,
                '%' => self.one_or_eq(&mut line, Token::Percent, Token::PercentEq)?,
                '<' => self.one_or_eq(&mut line, Token::Lt, Token::Le)?,
                '>' => self.one_or_eq(&mut line, Token::Gt, Token::Ge)?,
                '=' => self.one_or_eq(&mut line, Token::Eq, Token::EqEq)?,
                '!' => self.one_or_eq(&mut line, Token::Not, Token::Ne)?,
                '&' | '|' => {
                    line.pos += 1;
                    if line.peek() == Some(ch) {
                        line.pos += 1;
                        let token = if ch == '&' { Token::And } else { Token::Or };
                        self.push(&mut line, token, start)?;
                    } else {
                        return Err(Diagnostic::scan(
                            format!("Expected '{ch}{ch}', got a single '{ch}'"),
                            Span::new(line.position(start), line.position(line.pos)),
                        ));
                    }
                }
                '#' => self.lex_directive(&mut line, start)?,
                '"' => self.lex_string(&mut line, start)?,
                '0'..='9' => self.lex_number(&mut line, start)?,
                c if c.is_alphabetic() || c == '_' => self.lex_ident(&mut line, start)?,
                _ => {
                    return Err(Diagnostic::scan(
                        format!("Unexpected character: '{ch}'"),
                        Span::new(line.position(start), line.position(start + 1)),
                    ));
                }
            }
        }

        if line.has_tokens && self.bracket_depth == 0 {
            let at = line.position(chars.len());
            self.push_raw(Token::Newline, String::new(), Span::new(at, at), indent);
        }
        Ok(())
    }

    /// Single-character operator, or its `=`-suffixed two-character form.
    /// Exactly one token is produced either way.
    fn one_or_eq(&mut self, line: &mut Line<'_>, single: Token, with_eq: Token) -> Result<(), Diagnostic> {
        let start = line.pos;
        line.pos += 1;
        if line.peek() == Some('=') {
            line.pos += 1;
            self.push(line, with_eq, start)
        } else {
            self.push(line, single, start)
        }
    }

    fn push(&mut self, line: &mut Line<'_>, token: Token, start: usize) -> Result<(), Diagnostic> {
        if !line.has_tokens {
            self.check_indentation(line)?;
            line.has_tokens = true;
        }
        let span = Span::new(line.position(start), line.position(line.pos));
        let lexeme = line.text(start);
        self.push_raw(token, lexeme, span, line.indent);
        Ok(())
    }

    fn push_raw(&mut self, token: Token, lexeme: String, span: Span, indent: usize) {
        self.tokens.push(SpannedToken {
            token,
            lexeme,
            span,
            indent,
            path: Arc::clone(&self.path),
        });
    }

    /// The first indented line fixes the indent character for the file.
    fn check_indentation(&mut self, line: &Line<'_>) -> Result<(), Diagnostic> {
        for (i, ch) in line.chars.iter().take(line.indent).enumerate() {
            match self.indent_char {
                None => self.indent_char = Some(*ch),
                Some(unit) if unit != *ch => {
                    return Err(Diagnostic::scan(
                        "Inconsistent use of tabs and spaces in indentation",
                        Span::new(line.position(i), line.position(i + 1)),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    fn lex_directive(&mut self, line: &mut Line<'_>, start: usize) -> Result<(), Diagnostic> {
        line.pos += 1;
        let name_start = line.pos;
        while line.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            line.pos += 1;
        }
        let name = line.text(name_start);
        if name.is_empty() {
            return Err(Diagnostic::scan(
                "Expected a directive name after '#'",
                Span::new(line.position(start), line.position(line.pos)),
            ));
        }
        self.push(line, Token::Directive(name), start)
    }

    fn lex_string(&mut self, line: &mut Line<'_>, start: usize) -> Result<(), Diagnostic> {
        line.pos += 1;
        let body_start = line.pos;
        while line.peek().is_some_and(|c| c != '"') {
            line.pos += 1;
        }
        if line.peek().is_none() {
            return Err(Diagnostic::scan(
                "Unterminated string literal",
                Span::new(line.position(start), line.position(line.pos)),
            ));
        }
        let body = line.text(body_start);
        line.pos += 1;
        self.push(line, Token::Str(body), start)
    }

    fn lex_number(&mut self, line: &mut Line<'_>, start: usize) -> Result<(), Diagnostic> {
        while line.peek().is_some_and(|c| c.is_ascii_digit()) {
            line.pos += 1;
        }
        if line.peek() == Some('.') && line.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            line.pos += 1; // skip '.'
            while line.peek().is_some_and(|c| c.is_ascii_digit()) {
                line.pos += 1;
            }
        }
        let text = line.text(start);
        let value: f64 = text.parse().map_err(|_| {
            Diagnostic::scan(
                format!("Invalid number literal '{text}'"),
                Span::new(line.position(start), line.position(line.pos)),
            )
        })?;
        self.push(line, Token::Number(value), start)
    }

    fn lex_ident(&mut self, line: &mut Line<'_>, start: usize) -> Result<(), Diagnostic> {
        while line.peek().is_some_and(|c| c.is_alphanumeric() || c == '_') {
            line.pos += 1;
        }
        let word = line.text(start);
        let token = match word.as_str() {
            "var" => Token::Var,
            "const" => Token::Const,
            "func" => Token::Func,
            "event" => Token::Event,
            "if" => Token::If,
            "elif" => Token::Elif,
            "else" => Token::Else,
            "loop" => Token::Loop,
            "while" => Token::While,
            "until" => Token::Until,
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "true" => Token::True,
            "false" => Token::False,
            "number" => Token::NumberTy,
            "string" => Token::StringTy,
            "boolean" => Token::BooleanTy,
            "image" => Token::ImageTy,
            _ => Token::Ident(word),
        };
        self.push(line, token, start)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn tok(s: &str) -> Vec<Token> {
        lex(s).unwrap().into_iter().map(|t| t.token).collect()
    }

    fn err(s: &str) -> Diagnostic {
        lex(s).unwrap_err()
    }

    #[test]
    fn simple_tokens() {
        assert_eq!(
            tok("1 + 2.5"),
            vec![Token::Number(1.0), Token::Plus, Token::Number(2.5), Token::Newline, Token::Eof],
        );
    }

    #[test]
    fn keywords_and_types() {
        assert_eq!(
            tok("var const func event if elif else loop while until number string boolean image"),
            vec![
                Token::Var, Token::Const, Token::Func, Token::Event, Token::If, Token::Elif,
                Token::Else, Token::Loop, Token::While, Token::Until, Token::NumberTy,
                Token::StringTy, Token::BooleanTy, Token::ImageTy, Token::Newline, Token::Eof,
            ],
        );
    }

    #[test]
    fn operators() {
        assert_eq!(
            tok("+ += - -= * *= / /= % %= < > <= >= == != = ! && || and or not"),
            vec![
                Token::Plus, Token::PlusEq, Token::Minus, Token::MinusEq, Token::Star,
                Token::StarEq, Token::Slash, Token::SlashEq, Token::Percent, Token::PercentEq,
                Token::Lt, Token::Gt, Token::Le, Token::Ge, Token::EqEq, Token::Ne, Token::Eq,
                Token::Not, Token::And, Token::Or, Token::And, Token::Or, Token::Not,
                Token::Newline, Token::Eof,
            ],
        );
    }

    #[test]
    fn less_equal_is_a_single_token() {
        assert_eq!(
            tok("a <= b"),
            vec![
                Token::Ident("a".into()), Token::Le, Token::Ident("b".into()),
                Token::Newline, Token::Eof,
            ],
        );
        assert_eq!(
            tok("a>=b"),
            vec![
                Token::Ident("a".into()), Token::Ge, Token::Ident("b".into()),
                Token::Newline, Token::Eof,
            ],
        );
    }

    #[test]
    fn literals_carry_values() {
        let tokens = lex("\"hi there\" 42 true").unwrap();
        assert_eq!(tokens[0].token.literal(), Some(Value::Str("hi there".into())));
        assert_eq!(tokens[0].lexeme, "\"hi there\"");
        assert_eq!(tokens[1].token.literal(), Some(Value::Number(42.0)));
        assert_eq!(tokens[2].token.literal(), Some(Value::Bool(true)));
    }

    #[test]
    fn positions_and_indentation() {
        let tokens = lex("@start:\n    audio.stop()").unwrap();
        let stop = tokens.iter().find(|t| t.token == Token::Ident("stop".into())).unwrap();
        assert_eq!(stop.span.start, Position::new(2, 11));
        assert_eq!(stop.indent, 4);
        assert_eq!(tokens[0].indent, 0);
    }

    #[test]
    fn comments_are_skipped() {
        let tokens = tok("x // trailing\n/* block /* nested */ still\ncomment */ y");
        assert_eq!(
            tokens,
            vec![
                Token::Ident("x".into()), Token::Newline,
                Token::Ident("y".into()), Token::Newline, Token::Eof,
            ],
        );
    }

    #[test]
    fn blank_lines_emit_nothing() {
        assert_eq!(tok("\n\n   \n// only a comment\n"), vec![Token::Eof]);
    }

    #[test]
    fn newlines_suppressed_inside_brackets() {
        let tokens = tok("var xs = [1,\n  2]\nx");
        assert_eq!(tokens.iter().filter(|t| **t == Token::Newline).count(), 2);
    }

    #[test]
    fn directives() {
        assert_eq!(
            tok("#define N 5"),
            vec![
                Token::Directive("define".into()), Token::Ident("N".into()), Token::Number(5.0),
                Token::Newline, Token::Eof,
            ],
        );
    }

    #[test]
    fn unterminated_string_is_fatal() {
        let e = err("var s = \"abc");
        assert!(e.message.contains("Unterminated string"));
        assert_eq!(e.span.start, Position::new(1, 9));
    }

    #[test]
    fn unterminated_block_comment() {
        assert!(err("x /* never closed").message.contains("Unterminated block comment"));
    }

    #[test]
    fn mixed_indentation_is_rejected() {
        let e = err("@start:\n    a()\n\tb()");
        assert!(e.message.contains("Inconsistent"));
        assert_eq!(e.span.start.line, 3);
    }

    #[test]
    fn unexpected_character_stops_scanning() {
        let scanned = scan_str("ok\nbad $\nnever", Path::new("main.bot"));
        assert!(scanned.error.unwrap().message.contains("'$'"));
        assert_eq!(scanned.lines.len(), 2);
    }
}
