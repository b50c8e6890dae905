use super::ast::*;
use super::error::Diagnostic;
use super::lexer::{SpannedToken, Token};

/// Parse a token stream. Errors are collected; statements that failed to parse are dropped.
pub fn parse(tokens: Vec<SpannedToken>) -> (Program, Vec<Diagnostic>) {
    let mut parser = Parser::new(tokens);
    let statements = parser.parse_program();
    (Program { statements, ids: parser.ids }, parser.errors)
}

struct Parser {
    tokens: Vec<SpannedToken>,
    pos: usize,
    errors: Vec<Diagnostic>,
    ids: ExprIds,
}

impl Parser {
    fn new(tokens: Vec<SpannedToken>) -> Self {
        Self {
            tokens,
            pos: 0,
            errors: Vec::new(),
            ids: ExprIds::default(),
        }
    }

    fn parse_program(&mut self) -> Vec<Stmt> {
        let mut statements = Vec::new();
        while !self.at_eof() {
            if self.eat(&Token::Newline) {
                continue;
            }
            let indent = self.indent();
            if indent > 0 {
                self.errors.push(Diagnostic::parse("Unexpected indentation", self.span()));
                self.synchronize(0);
                continue;
            }
            match self.parse_top_level() {
                Ok(stmt) => statements.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize(indent);
                }
            }
        }
        statements
    }

    fn parse_top_level(&mut self) -> Result<Stmt, Diagnostic> {
        match self.peek() {
            Token::At => self.parse_event(),
            Token::Event => self.parse_custom_event(),
            Token::Var => self.parse_var_decl(),
            Token::Const => self.parse_const_decl(),
            Token::Func => self.parse_func_decl(),
            _ => Err(Diagnostic::parse(
                format!(
                    "Only events and var/const/func declarations are allowed at top level, got {}",
                    self.describe(),
                ),
                self.span(),
            )),
        }
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn current(&self) -> Option<&SpannedToken> {
        self.tokens.get(self.pos)
    }

    fn peek(&self) -> &Token {
        self.current().map_or(&Token::Eof, |t| &t.token)
    }

    fn span(&self) -> Span {
        self.current()
            .or_else(|| self.tokens.last())
            .map_or_else(Span::default, |t| t.span)
    }

    fn indent(&self) -> usize {
        self.current().map_or(0, |t| t.indent)
    }

    /// Line of the last consumed token that is not a line break.
    fn previous_line(&self) -> usize {
        self.tokens
            .get(..self.pos)
            .unwrap_or(&[])
            .iter()
            .rev()
            .find(|t| !matches!(t.token, Token::Newline | Token::Eof))
            .map_or(0, |t| t.span.start.line)
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek(), Token::Eof)
    }

    fn describe(&self) -> String {
        match self.current() {
            Some(SpannedToken { token: Token::Newline, .. }) => "end of line".to_string(),
            Some(SpannedToken { token: Token::Eof, .. }) | None => "end of input".to_string(),
            Some(t) => format!("'{}'", t.lexeme),
        }
    }

    fn advance(&mut self) -> Span {
        let span = self.span();
        if self.pos < self.tokens.len().saturating_sub(1) {
            self.pos += 1;
        }
        span
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token, what: &str) -> Result<Span, Diagnostic> {
        if self.peek() == expected {
            Ok(self.advance())
        } else {
            Err(Diagnostic::parse(
                format!("Expected {what}, got {}", self.describe()),
                self.span(),
            ))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<(String, Span), Diagnostic> {
        if let Token::Ident(name) = self.peek().clone() {
            Ok((name, self.advance()))
        } else {
            Err(Diagnostic::parse(
                format!("Expected {what}, got {}", self.describe()),
                self.span(),
            ))
        }
    }

    /// End of a simple statement: a newline, or end of input.
    fn expect_line_end(&mut self) -> Result<(), Diagnostic> {
        if self.at_eof() || self.eat(&Token::Newline) {
            Ok(())
        } else {
            Err(Diagnostic::parse(
                format!("Expected end of line, got {}", self.describe()),
                self.span(),
            ))
        }
    }

    /// Panic-mode recovery: skip the rest of the failed line, then every line
    /// indented deeper than the failed statement (its body).
    fn synchronize(&mut self, indent: usize) {
        self.skip_line();
        while !self.at_eof() && self.indent() > indent {
            self.skip_line();
        }
    }

    fn skip_line(&mut self) {
        while !self.at_eof() {
            if matches!(self.peek(), Token::Newline) {
                self.advance();
                return;
            }
            self.advance();
        }
    }

    fn expr(&mut self, kind: ExprKind, span: Span) -> Expr {
        Expr::new(self.ids.fresh(), kind, span)
    }

    // ── Declarations ──────────────────────────────────────────────

    /// `@button "a":` followed by a body.
    fn parse_event(&mut self) -> Result<Stmt, Diagnostic> {
        let indent = self.indent();
        let start = self.expect(&Token::At, "'@'")?;
        let (name, name_span) = self.expect_ident("an event name after '@'")?;
        let param = if matches!(self.peek(), Token::Colon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        let span = start.merge(param.as_ref().map_or(name_span, |p| p.span));
        let body = self.parse_body(indent)?;
        Ok(Stmt::Event {
            kind: EventKind::Builtin,
            name,
            param,
            body,
            span,
            end_line: self.previous_line(),
        })
    }

    /// `event celebrate:` followed by a body.
    fn parse_custom_event(&mut self) -> Result<Stmt, Diagnostic> {
        let indent = self.indent();
        let start = self.expect(&Token::Event, "'event'")?;
        let (name, name_span) = self.expect_ident("an event name")?;
        let body = self.parse_body(indent)?;
        Ok(Stmt::Event {
            kind: EventKind::Custom,
            name,
            param: None,
            body,
            span: start.merge(name_span),
            end_line: self.previous_line(),
        })
    }

    /// `var x`, `var x: number`, `var x = 1`, `var xs: string[] = ["a"]`
    fn parse_var_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.expect(&Token::Var, "'var'")?;
        let (name, name_span) = self.expect_ident("a variable name")?;
        let ty = if self.eat(&Token::Colon) { Some(self.parse_type()?) } else { None };
        let value = if self.eat(&Token::Eq) { Some(self.parse_expr()?) } else { None };
        let span = start.merge(value.as_ref().map_or(name_span, |v| v.span));
        self.expect_line_end()?;
        Ok(Stmt::VarDecl { name, ty, value, hoisted: false, span })
    }

    /// `const SPEED = 50`
    fn parse_const_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let start = self.expect(&Token::Const, "'const'")?;
        let (name, _) = self.expect_ident("a constant name")?;
        let ty = if self.eat(&Token::Colon) { Some(self.parse_type()?) } else { None };
        self.expect(&Token::Eq, "'=' after constant name")?;
        let value = self.parse_expr()?;
        let span = start.merge(value.span);
        self.expect_line_end()?;
        Ok(Stmt::ConstDecl { name, ty, value, span })
    }

    /// `func blink(times: number, color: string):` followed by a body.
    fn parse_func_decl(&mut self) -> Result<Stmt, Diagnostic> {
        let indent = self.indent();
        let start = self.expect(&Token::Func, "'func'")?;
        let (name, _) = self.expect_ident("a function name")?;
        self.expect(&Token::LParen, "'(' after function name")?;
        let mut params = Vec::new();
        if !matches!(self.peek(), Token::RParen) {
            loop {
                let (param_name, param_span) = self.expect_ident("a parameter name")?;
                self.expect(&Token::Colon, "':' after parameter name")?;
                let ty = self.parse_type()?;
                params.push(Param { name: param_name, ty, span: param_span });
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(&Token::RParen, "')' after parameters")?;
        let body = self.parse_body(indent)?;
        Ok(Stmt::FuncDecl {
            name,
            params,
            body,
            span: start.merge(end),
            end_line: self.previous_line(),
        })
    }

    /// `number`, `string`, `boolean`, `image`, `number[]`, `string[]`
    fn parse_type(&mut self) -> Result<DataType, Diagnostic> {
        let span = self.span();
        let scalar = match self.peek() {
            Token::NumberTy => DataType::Number,
            Token::StringTy => DataType::String,
            Token::BooleanTy => DataType::Boolean,
            Token::ImageTy => DataType::Image,
            _ => {
                return Err(Diagnostic::parse(
                    format!("Expected a type name, got {}", self.describe()),
                    span,
                ));
            }
        };
        self.advance();
        if self.eat(&Token::LBracket) {
            let end = self.expect(&Token::RBracket, "']' in list type")?;
            return scalar.list_of().ok_or_else(|| {
                Diagnostic::parse(format!("Lists of {scalar} are not supported"), span.merge(end))
            });
        }
        Ok(scalar)
    }

    // ── Statements ────────────────────────────────────────────────

    /// Header colon, then either one inline statement or the following lines
    /// indented deeper than the header.
    fn parse_body(&mut self, header_indent: usize) -> Result<Vec<Stmt>, Diagnostic> {
        let colon = self.expect(&Token::Colon, "':'")?;
        if !matches!(self.peek(), Token::Newline | Token::Eof) {
            return Ok(vec![self.parse_stmt()?]);
        }
        self.eat(&Token::Newline);

        let mut body = Vec::new();
        let mut body_indent = None;
        while !self.at_eof() && self.indent() > header_indent {
            let indent = self.indent();
            match body_indent {
                None => body_indent = Some(indent),
                Some(expected) if expected != indent => {
                    self.errors.push(Diagnostic::parse(
                        format!("Unexpected indentation: expected {expected} columns, got {indent}"),
                        self.span(),
                    ));
                    self.synchronize(expected);
                    continue;
                }
                Some(_) => {}
            }
            match self.parse_stmt() {
                Ok(stmt) => body.push(stmt),
                Err(e) => {
                    self.errors.push(e);
                    self.synchronize(indent);
                }
            }
        }

        if body_indent.is_none() {
            self.errors.push(Diagnostic::parse("Expected an indented block after ':'", colon));
        }
        Ok(body)
    }

    fn parse_stmt(&mut self) -> Result<Stmt, Diagnostic> {
        match self.peek() {
            Token::Var => self.parse_var_decl(),
            Token::Const => self.parse_const_decl(),
            Token::If => self.parse_if(),
            Token::Loop | Token::While | Token::Until => self.parse_loop(),
            Token::Ident(_) => self.parse_call_or_assign(),
            Token::At | Token::Event | Token::Func => Err(Diagnostic::parse(
                "Events and functions can only be declared at top level",
                self.span(),
            )),
            Token::Elif | Token::Else => Err(Diagnostic::parse(
                format!("{} without a matching 'if'", self.describe()),
                self.span(),
            )),
            _ => Err(Diagnostic::parse(
                format!("Expected a statement, got {}", self.describe()),
                self.span(),
            )),
        }
    }

    /// `if`/`elif` chain; `elif` becomes a nested `if` in the else branch.
    fn parse_if(&mut self) -> Result<Stmt, Diagnostic> {
        let indent = self.indent();
        let start = self.advance(); // 'if' or 'elif'
        let condition = self.parse_expr()?;
        let span = start.merge(condition.span);
        let then_body = self.parse_body(indent)?;

        let else_body = if matches!(self.peek(), Token::Elif) && self.indent() == indent {
            vec![self.parse_if()?]
        } else if matches!(self.peek(), Token::Else) && self.indent() == indent {
            self.advance();
            self.parse_body(indent)?
        } else {
            Vec::new()
        };

        Ok(Stmt::If { condition, then_body, else_body, span })
    }

    /// `loop:`, `loop 3:`, `until done:`, `while running:`
    fn parse_loop(&mut self) -> Result<Stmt, Diagnostic> {
        let indent = self.indent();
        let keyword = self.peek().clone();
        let start = self.advance();
        let (kind, span) = match keyword {
            Token::Loop if matches!(self.peek(), Token::Colon) => (LoopKind::Forever, start),
            Token::Loop => {
                let times = self.parse_expr()?;
                let span = start.merge(times.span);
                (LoopKind::Times(times), span)
            }
            Token::Until => {
                let condition = self.parse_expr()?;
                let span = start.merge(condition.span);
                (LoopKind::Until(condition), span)
            }
            _ => {
                // The target only has repeat-until, so `while c` runs until `not c`.
                let condition = self.parse_expr()?;
                let span = start.merge(condition.span);
                (LoopKind::Until(self.negate(condition)), span)
            }
        };
        let body = self.parse_body(indent)?;
        Ok(Stmt::Loop { kind, body, span })
    }

    /// Negate a condition, stripping an existing negation instead of doubling it.
    fn negate(&mut self, condition: Expr) -> Expr {
        let Expr { id, kind, span } = condition;
        match kind {
            ExprKind::Unary { op: UnaryOp::Not, operand } => *operand,
            ExprKind::Grouping(inner)
                if matches!(inner.ungrouped().kind, ExprKind::Unary { op: UnaryOp::Not, .. }) =>
            {
                self.negate(*inner)
            }
            kind => {
                let operand = Expr::new(id, kind, span);
                self.expr(ExprKind::Unary { op: UnaryOp::Not, operand: Box::new(operand) }, span)
            }
        }
    }

    /// `audio.stop()`, `count += 1`
    fn parse_call_or_assign(&mut self) -> Result<Stmt, Diagnostic> {
        let (name, name_span) = self.parse_dotted_name()?;
        let op = match self.peek() {
            Token::LParen => {
                let (args, end) = self.parse_args()?;
                self.expect_line_end()?;
                return Ok(Stmt::Call { name, args, span: name_span.merge(end) });
            }
            Token::Eq => AssignOp::Set,
            Token::PlusEq => AssignOp::Add,
            Token::MinusEq => AssignOp::Sub,
            Token::StarEq => AssignOp::Mul,
            Token::SlashEq => AssignOp::Div,
            Token::PercentEq => AssignOp::Mod,
            _ => {
                return Err(Diagnostic::parse(
                    format!("Expected '(' or an assignment after '{name}', got {}", self.describe()),
                    self.span(),
                ));
            }
        };
        self.advance();
        let value = self.parse_expr()?;
        let span = name_span.merge(value.span);
        self.expect_line_end()?;
        Ok(Stmt::Assign { target: name, op, value, span })
    }

    /// `ident(.ident)*` joined with dots.
    fn parse_dotted_name(&mut self) -> Result<(String, Span), Diagnostic> {
        let (mut name, mut span) = self.expect_ident("a name")?;
        while matches!(self.peek(), Token::Dot) {
            self.advance();
            let (part, part_span) = self.expect_ident("a name after '.'")?;
            name.push('.');
            name.push_str(&part);
            span = span.merge(part_span);
        }
        Ok((name, span))
    }

    /// `(a, b, c)`; returns the arguments and the span of the closing paren.
    fn parse_args(&mut self) -> Result<(Vec<Expr>, Span), Diagnostic> {
        self.expect(&Token::LParen, "'('")?;
        let mut args = Vec::new();
        if !matches!(self.peek(), Token::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        let end = self.expect(&Token::RParen, "')' after arguments")?;
        Ok((args, end))
    }

    // ── Expressions ───────────────────────────────────────────────

    fn parse_expr(&mut self) -> Result<Expr, Diagnostic> {
        self.parse_or()
    }

    fn binary(&mut self, op: BinOp, left: Expr, right: Expr) -> Expr {
        let span = left.span.merge(right.span);
        self.expr(ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) }, span)
    }

    fn parse_or(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = self.binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_equality()?;
        while matches!(self.peek(), Token::And) {
            self.advance();
            let right = self.parse_equality()?;
            left = self.binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_comparison()?;
        loop {
            let negated = match self.peek() {
                Token::EqEq => false,
                Token::Ne => true,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            let eq = self.binary(BinOp::Eq, left, right);
            left = if negated {
                let span = eq.span;
                self.expr(ExprKind::Unary { op: UnaryOp::Not, operand: Box::new(eq) }, span)
            } else {
                eq
            };
        }
        Ok(left)
    }

    /// `a <= b` becomes `(a < b) or (a == b)`; `a >= b` becomes `(a > b) or (a == b)`.
    fn parse_comparison(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_term()?;
        loop {
            let (op, or_equal) = match self.peek() {
                Token::Lt => (BinOp::Lt, false),
                Token::Gt => (BinOp::Gt, false),
                Token::Le => (BinOp::Lt, true),
                Token::Ge => (BinOp::Gt, true),
                _ => break,
            };
            self.advance();
            let right = self.parse_term()?;
            left = if or_equal {
                let left_copy = left.duplicate(&mut self.ids);
                let right_copy = right.duplicate(&mut self.ids);
                let strict = self.binary(op, left, right);
                let equal = self.binary(BinOp::Eq, left_copy, right_copy);
                self.binary(BinOp::Or, strict, equal)
            } else {
                self.binary(op, left, right)
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_factor()?;
        loop {
            let op = match self.peek() {
                Token::Plus => BinOp::Add,
                Token::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_factor()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Expr, Diagnostic> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => BinOp::Mul,
                Token::Slash => BinOp::Div,
                Token::Percent => BinOp::Mod,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = self.binary(op, left, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, Diagnostic> {
        match self.peek() {
            Token::Not => {
                let start = self.advance();
                let operand = self.parse_unary()?;
                let span = start.merge(operand.span);
                Ok(self.expr(ExprKind::Unary { op: UnaryOp::Not, operand: Box::new(operand) }, span))
            }
            Token::Minus => {
                let start = self.advance();
                let operand = self.parse_unary()?;
                let span = start.merge(operand.span);
                // Negative literals are folded here so they render at the '-'.
                if let ExprKind::Literal(Value::Number(n)) = operand.kind {
                    return Ok(Expr::new(operand.id, ExprKind::Literal(Value::Number(-n)), span));
                }
                let minus_one = self.expr(ExprKind::Literal(Value::Number(-1.0)), start);
                Ok(self.binary(BinOp::Mul, minus_one, operand))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, Diagnostic> {
        let span = self.span();
        if let Some(value) = self.peek().literal() {
            self.advance();
            return Ok(self.expr(ExprKind::Literal(value), span));
        }
        match self.peek() {
            Token::Ident(_) => {
                let (name, name_span) = self.parse_dotted_name()?;
                if matches!(self.peek(), Token::LParen) {
                    let (args, end) = self.parse_args()?;
                    Ok(self.expr(ExprKind::Call { name, args }, name_span.merge(end)))
                } else {
                    Ok(self.expr(ExprKind::Identifier(name), name_span))
                }
            }
            Token::LParen => {
                self.advance();
                let inner = self.parse_expr()?;
                let end = self.expect(&Token::RParen, "')'")?;
                Ok(self.expr(ExprKind::Grouping(Box::new(inner)), span.merge(end)))
            }
            Token::LBracket => {
                self.advance();
                let mut items = Vec::new();
                if !matches!(self.peek(), Token::RBracket) {
                    loop {
                        items.push(self.parse_expr()?);
                        if !self.eat(&Token::Comma) || matches!(self.peek(), Token::RBracket) {
                            break;
                        }
                    }
                }
                let end = self.expect(&Token::RBracket, "']' after list items")?;
                Ok(self.expr(ExprKind::List(items), span.merge(end)))
            }
            Token::NumberTy | Token::StringTy | Token::BooleanTy | Token::ImageTy => {
                let target = match self.peek() {
                    Token::NumberTy => DataType::Number,
                    Token::StringTy => DataType::String,
                    Token::BooleanTy => DataType::Boolean,
                    _ => DataType::Image,
                };
                self.advance();
                self.expect(&Token::LParen, &format!("'(' after '{target}' in a cast"))?;
                let operand = self.parse_expr()?;
                let end = self.expect(&Token::RParen, "')' after cast operand")?;
                Ok(self.expr(ExprKind::Cast { target, operand: Box::new(operand) }, span.merge(end)))
            }
            _ => Err(Diagnostic::parse(
                format!("Expected an expression, got {}", self.describe()),
                span,
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::lexer::lex;

    fn parse_str(s: &str) -> Vec<Stmt> {
        let (program, errors) = parse(lex(s).unwrap());
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        program.statements
    }

    fn parse_errs(s: &str) -> (Vec<Stmt>, Vec<Diagnostic>) {
        let (program, errors) = parse(lex(s).unwrap());
        (program.statements, errors)
    }

    /// Expression of `var v = <expr>`.
    fn parse_expr(expr: &str) -> Expr {
        let mut stmts = parse_str(&format!("var v = {expr}"));
        match stmts.remove(0) {
            Stmt::VarDecl { value: Some(v), .. } => v,
            other => panic!("expected var decl, got {other:?}"),
        }
    }

    /// Compact rendering of an expression tree for structural assertions.
    fn show(e: &Expr) -> String {
        match &e.kind {
            ExprKind::Identifier(n) => n.clone(),
            ExprKind::Literal(v) => match v {
                Value::Str(s) => format!("{s:?}"),
                other => other.to_text(),
            },
            ExprKind::Call { name, args } => {
                format!("{name}({})", args.iter().map(show).collect::<Vec<_>>().join(", "))
            }
            ExprKind::Cast { target, operand } => format!("{target}({})", show(operand)),
            ExprKind::List(items) => format!("[{}]", items.iter().map(show).collect::<Vec<_>>().join(", ")),
            ExprKind::Unary { operand, .. } => format!("!{}", show(operand)),
            ExprKind::Binary { op, left, right } => format!("({} {} {})", show(left), op.symbol(), show(right)),
            ExprKind::Grouping(inner) => format!("[{}]", show(inner)),
        }
    }

    fn collect_ids(e: &Expr, out: &mut Vec<ExprId>) {
        out.push(e.id);
        match &e.kind {
            ExprKind::Call { args, .. } | ExprKind::List(args) => {
                args.iter().for_each(|a| collect_ids(a, out));
            }
            ExprKind::Cast { operand, .. } | ExprKind::Unary { operand, .. } | ExprKind::Grouping(operand) => {
                collect_ids(operand, out);
            }
            ExprKind::Binary { left, right, .. } => {
                collect_ids(left, out);
                collect_ids(right, out);
            }
            ExprKind::Identifier(_) | ExprKind::Literal(_) => {}
        }
    }

    #[test]
    fn precedence() {
        assert_eq!(show(&parse_expr("1 + 2 * 3")), "(1 + (2 * 3))");
        assert_eq!(show(&parse_expr("a or b and c")), "(a or (b and c))");
        assert_eq!(show(&parse_expr("a + 1 < b == c > 2")), "(((a + 1) < b) == (c > 2))");
        assert_eq!(show(&parse_expr("(1 + 2) * 3")), "([(1 + 2)] * 3)");
    }

    #[test]
    fn less_equal_desugars_to_or() {
        assert_eq!(show(&parse_expr("a <= b")), "((a < b) or (a == b))");
        assert_eq!(show(&parse_expr("x + 1 >= 3")), "(((x + 1) > 3) or ((x + 1) == 3))");
    }

    #[test]
    fn desugared_operands_get_distinct_ids() {
        let expr = parse_expr("a <= b");
        let mut ids = Vec::new();
        collect_ids(&expr, &mut ids);
        let unique: std::collections::HashSet<_> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());
    }

    #[test]
    fn not_equal_desugars_to_negated_equality() {
        assert_eq!(show(&parse_expr("a != 2")), "!(a == 2)");
    }

    #[test]
    fn unary_minus() {
        let lit = parse_expr("-5");
        assert_eq!(lit.kind, ExprKind::Literal(Value::Number(-5.0)));
        assert_eq!(lit.span.start.column, 9);
        assert_eq!(show(&parse_expr("- -2")), "2");
        assert_eq!(show(&parse_expr("-x")), "(-1 * x)");
        assert_eq!(show(&parse_expr("-(1 + 2)")), "(-1 * [(1 + 2)])");
    }

    #[test]
    fn calls_casts_and_lists() {
        assert_eq!(show(&parse_expr("math.random(1, 10)")), "math.random(1, 10)");
        assert_eq!(show(&parse_expr("string(count)")), "string(count)");
        assert_eq!(show(&parse_expr("[1, 2, 3]")), "[1, 2, 3]");
        assert_eq!(show(&parse_expr("[]")), "[]");
        assert_eq!(show(&parse_expr("sensor.distance")), "sensor.distance");
    }

    #[test]
    fn var_and_const_declarations() {
        let stmts = parse_str("var a\nvar b: number\nvar c: string[] = [\"x\"]\nconst N = 5");
        assert!(matches!(&stmts[0], Stmt::VarDecl { name, ty: None, value: None, .. } if name == "a"));
        assert!(matches!(&stmts[1], Stmt::VarDecl { ty: Some(DataType::Number), value: None, .. }));
        assert!(matches!(&stmts[2], Stmt::VarDecl { ty: Some(DataType::StringList), value: Some(_), .. }));
        assert!(matches!(&stmts[3], Stmt::ConstDecl { name, .. } if name == "N"));
    }

    #[test]
    fn event_with_inline_body() {
        let stmts = parse_str("@button \"a\": audio.playBuzzer(440)");
        let Stmt::Event { kind, name, param, body, .. } = &stmts[0] else {
            panic!("expected event");
        };
        assert_eq!(*kind, EventKind::Builtin);
        assert_eq!(name, "button");
        assert_eq!(param.as_ref().unwrap().as_literal(), Some(&Value::Str("a".into())));
        assert!(matches!(&body[0], Stmt::Call { name, args, .. } if name == "audio.playBuzzer" && args.len() == 1));
    }

    #[test]
    fn event_with_parenthesized_param_and_block() {
        let stmts = parse_str("@button(\"b\"):\n    count += 1\n    audio.stop()\n@start:\n  display.clear()");
        assert_eq!(stmts.len(), 2);
        let Stmt::Event { param, body, end_line, .. } = &stmts[0] else {
            panic!("expected event");
        };
        assert!(matches!(param.as_ref().unwrap().kind, ExprKind::Grouping(_)));
        assert_eq!(body.len(), 2);
        assert_eq!(*end_line, 3);
        assert!(matches!(&body[0], Stmt::Assign { op: AssignOp::Add, .. }));
    }

    #[test]
    fn custom_event_and_function() {
        let src = "event celebrate:\n  lights.off()\nfunc blink(times: number, color: string):\n  loop times:\n    lights.setColor(color)";
        let stmts = parse_str(src);
        assert!(matches!(&stmts[0], Stmt::Event { kind: EventKind::Custom, name, .. } if name == "celebrate"));
        let Stmt::FuncDecl { params, body, .. } = &stmts[1] else {
            panic!("expected func");
        };
        assert_eq!(params.len(), 2);
        assert_eq!(params[1].ty, DataType::String);
        assert!(matches!(&body[0], Stmt::Loop { kind: LoopKind::Times(_), .. }));
    }

    #[test]
    fn nested_blocks_close_on_dedent() {
        let src = "@start:\n  if a:\n    b()\n    c()\n  d()\n";
        let stmts = parse_str(src);
        let Stmt::Event { body, .. } = &stmts[0] else { panic!("expected event") };
        assert_eq!(body.len(), 2);
        let Stmt::If { then_body, else_body, .. } = &body[0] else { panic!("expected if") };
        assert_eq!(then_body.len(), 2);
        assert!(else_body.is_empty());
    }

    #[test]
    fn elif_nests_in_else() {
        let src = "@start:\n  if a:\n    x()\n  elif b:\n    y()\n  else:\n    z()";
        let stmts = parse_str(src);
        let Stmt::Event { body, .. } = &stmts[0] else { panic!("expected event") };
        let Stmt::If { else_body, .. } = &body[0] else { panic!("expected if") };
        let Stmt::If { condition, else_body: inner_else, .. } = &else_body[0] else {
            panic!("expected nested if");
        };
        assert_eq!(show(condition), "b");
        assert!(matches!(&inner_else[0], Stmt::Call { name, .. } if name == "z"));
    }

    #[test]
    fn while_negates_condition() {
        let loop_kind = |src: &str| {
            let stmts = parse_str(&format!("@start:\n  {src}:\n    a()"));
            let Stmt::Event { body, .. } = &stmts[0] else { panic!("expected event") };
            let Stmt::Loop { kind, .. } = &body[0] else { panic!("expected loop") };
            match kind {
                LoopKind::Until(c) => show(c),
                LoopKind::Forever => "forever".into(),
                LoopKind::Times(t) => format!("times {}", show(t)),
            }
        };
        assert_eq!(loop_kind("while x < 3"), "!(x < 3)");
        assert_eq!(loop_kind("while not done"), "done");
        assert_eq!(loop_kind("while (not done)"), "done");
        assert_eq!(loop_kind("until done"), "done");
        assert_eq!(loop_kind("loop"), "forever");
        assert_eq!(loop_kind("loop 4"), "times 4");
    }

    #[test]
    fn recovers_and_reports_multiple_errors() {
        let src = "@start:\n  a(1 +)\n  b()\n  c = \n  d()\nvar ok = 1\nprint()";
        let (stmts, errors) = parse_errs(src);
        assert_eq!(errors.len(), 3, "{errors:?}");
        let Stmt::Event { body, .. } = &stmts[0] else { panic!("expected event") };
        assert_eq!(body.len(), 2);
        assert!(matches!(&stmts[1], Stmt::VarDecl { name, .. } if name == "ok"));
        assert!(errors[2].message.contains("top level"));
    }

    #[test]
    fn failed_header_skips_its_body() {
        let (stmts, errors) = parse_errs("@start:\n  if a +:\n    b()\n    c()\n  d()");
        assert_eq!(errors.len(), 1);
        let Stmt::Event { body, .. } = &stmts[0] else { panic!("expected event") };
        assert!(matches!(&body[0], Stmt::Call { name, .. } if name == "d"));
    }

    #[test]
    fn indentation_errors() {
        let (_, errors) = parse_errs("@start:\n    a()\n  b()\n    c()");
        assert!(errors[0].message.contains("Unexpected indentation"));

        let (stmts, errors) = parse_errs("@start:\n\nvar x = 1");
        assert!(errors[0].message.contains("Expected an indented block"));
        assert_eq!(stmts.len(), 2);

        let (_, errors) = parse_errs("  var x = 1");
        assert!(errors[0].message.contains("Unexpected indentation"));
    }

    #[test]
    fn boolean_lists_are_rejected() {
        let (_, errors) = parse_errs("var flags: boolean[]");
        assert!(errors[0].message.contains("Lists of boolean"));
    }

    #[test]
    fn declarations_only_at_top_level() {
        let (_, errors) = parse_errs("@start:\n  func f():\n    a()");
        assert!(errors[0].message.contains("only be declared at top level"));
    }
}
