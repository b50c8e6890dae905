//! Macro directives over the token stream: `#define`, `#undef`, `#ifdef`, `#ifndef`, `#endif`.

use indexmap::IndexMap;
use tracing::debug;

use super::ast::Span;
use super::error::Diagnostic;
use super::lexer::{lex, SpannedToken, Token};

/// An object-like macro.
#[derive(Debug, Clone, PartialEq)]
pub struct Macro {
    pub name: String,
    pub replacement: Vec<SpannedToken>,
    /// Where it was defined; `None` for macros predefined by configuration.
    pub defined_at: Option<Span>,
}

#[derive(Debug, Clone)]
pub struct Preprocessed {
    pub tokens: Vec<SpannedToken>,
    /// Macros still defined at end of input.
    pub macros: IndexMap<String, Macro>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse `NAME` or `NAME=VALUE` predefined macro specs.
pub fn predefined_macros(specs: &[String]) -> Result<IndexMap<String, Macro>, Diagnostic> {
    let mut macros = IndexMap::new();
    for spec in specs {
        let (name, value) = spec.split_once('=').unwrap_or((spec.as_str(), ""));
        let mut replacement = lex(value)?;
        replacement.retain(|t| !matches!(t.token, Token::Newline | Token::Eof));
        let name = name.trim().to_string();
        macros.insert(name.clone(), Macro { name, replacement, defined_at: None });
    }
    Ok(macros)
}

pub fn preprocess(tokens: Vec<SpannedToken>, predefined: IndexMap<String, Macro>) -> Preprocessed {
    let mut pp = Preprocessor {
        input: tokens.into_iter().peekable(),
        macros: predefined,
        output: Vec::new(),
        diagnostics: Vec::new(),
    };
    pp.run();
    debug!(tokens = pp.output.len(), macros = pp.macros.len(), "preprocessed");
    Preprocessed {
        tokens: pp.output,
        macros: pp.macros,
        diagnostics: pp.diagnostics,
    }
}

struct Preprocessor {
    input: std::iter::Peekable<std::vec::IntoIter<SpannedToken>>,
    macros: IndexMap<String, Macro>,
    output: Vec<SpannedToken>,
    diagnostics: Vec<Diagnostic>,
}

impl Preprocessor {
    fn run(&mut self) {
        while let Some(tok) = self.input.next() {
            if let Token::Directive(name) = &tok.token {
                let name = name.clone();
                self.directive(&name, &tok);
                continue;
            }
            let expansion = match &tok.token {
                Token::Ident(name) => self.macros.get(name).map(|m| m.replacement.clone()),
                _ => None,
            };
            match expansion {
                // Replacement is stamped with the usage site and never rescanned.
                Some(replacement) => {
                    self.output.extend(replacement.into_iter().map(|r| SpannedToken {
                        span: tok.span,
                        indent: tok.indent,
                        path: tok.path.clone(),
                        ..r
                    }));
                }
                None => self.output.push(tok),
            }
        }
    }

    fn directive(&mut self, name: &str, tok: &SpannedToken) {
        match name {
            "define" => {
                let Some((macro_name, span)) = self.directive_name(tok, "#define") else {
                    return;
                };
                let replacement = self.rest_of_line();
                if let Some(old) = self.macros.get(&macro_name) {
                    let previous = old
                        .defined_at
                        .map_or_else(|| "configuration".to_string(), |s| format!("line {}", s.start.line));
                    self.diagnostics.push(
                        Diagnostic::preprocess(
                            format!("Macro '{macro_name}' redefined (previously defined at {previous})"),
                            span,
                        )
                        .warning(),
                    );
                }
                self.macros.insert(
                    macro_name.clone(),
                    Macro { name: macro_name, replacement, defined_at: Some(span) },
                );
            }
            "undef" => {
                if let Some((macro_name, _)) = self.directive_name(tok, "#undef") {
                    self.macros.shift_remove(&macro_name);
                    self.skip_line();
                }
            }
            "ifdef" | "ifndef" => {
                let directive = if name == "ifdef" { "#ifdef" } else { "#ifndef" };
                let Some((macro_name, _)) = self.directive_name(tok, directive) else {
                    return;
                };
                self.skip_line();
                let defined = self.macros.contains_key(&macro_name);
                if defined != (name == "ifdef") {
                    self.skip_to_endif(tok);
                }
            }
            // Matching `#endif` of a taken branch.
            "endif" => self.skip_line(),
            other => {
                self.diagnostics.push(Diagnostic::preprocess(
                    format!("Unknown directive '#{other}'"),
                    tok.span,
                ));
                self.skip_line();
            }
        }
    }

    /// The identifier following a directive. On failure reports and skips the line.
    fn directive_name(&mut self, tok: &SpannedToken, directive: &str) -> Option<(String, Span)> {
        if let Some(SpannedToken { token: Token::Ident(name), span, .. }) = self.input.peek() {
            let result = (name.clone(), tok.span.merge(*span));
            self.input.next();
            return Some(result);
        }
        self.diagnostics.push(Diagnostic::preprocess(
            format!("Expected a macro name after {directive}"),
            tok.span,
        ));
        self.skip_line();
        None
    }

    /// Tokens up to (not including) the next newline; the newline is consumed.
    fn rest_of_line(&mut self) -> Vec<SpannedToken> {
        let mut tokens = Vec::new();
        while let Some(tok) = self.input.next_if(|t| !matches!(t.token, Token::Newline | Token::Eof)) {
            tokens.push(tok);
        }
        self.input.next_if(|t| t.token == Token::Newline);
        tokens
    }

    fn skip_line(&mut self) {
        self.rest_of_line();
    }

    fn skip_to_endif(&mut self, opener: &SpannedToken) {
        loop {
            match self.input.peek().map(|t| &t.token) {
                Some(Token::Directive(d)) if d == "endif" => {
                    self.input.next();
                    self.skip_line();
                    return;
                }
                Some(Token::Eof) | None => {
                    self.diagnostics.push(Diagnostic::preprocess(
                        format!("Missing #endif for {}", opener.lexeme),
                        opener.span,
                    ));
                    return;
                }
                Some(_) => {
                    self.input.next();
                }
            }
        }
    }
}
