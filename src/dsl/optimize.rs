//! Constant evaluation: folds compile-time subexpressions into literals and
//! enforces that everything the generator needs as a literal is one.

use tracing::debug;

use super::ast::*;
use super::builtins::{Catalog, ParamSpec, Signature, Slot};
use super::error::Diagnostic;
use super::image::{black_image, ImageLoader};
use super::symbols::{Definitions, TypeTable};
use super::typeck::option_error;

/// Fold a program in place. Constant and list values are recorded in `defs`.
pub fn fold_constants(
    program: Program,
    defs: &mut Definitions,
    types: &TypeTable,
    catalog: &Catalog,
    images: &dyn ImageLoader,
) -> (Program, Vec<Diagnostic>) {
    let Program { statements, ids } = program;
    let mut folder = Folder { defs, types, catalog, images, params: Vec::new(), errors: Vec::new() };

    // Top-level constants first: bodies anywhere in the file may use them.
    let statements: Vec<Stmt> = statements
        .into_iter()
        .map(|stmt| match stmt {
            Stmt::ConstDecl { .. } => folder.fold_stmt(stmt),
            other => other,
        })
        .collect();
    let statements = statements
        .into_iter()
        .map(|stmt| match stmt {
            Stmt::ConstDecl { .. } => stmt,
            other => folder.fold_stmt(other),
        })
        .collect();

    debug!(errors = folder.errors.len(), "folded constants");
    (Program { statements, ids }, folder.errors)
}

struct Folder<'a> {
    defs: &'a mut Definitions,
    types: &'a TypeTable,
    catalog: &'a Catalog,
    images: &'a dyn ImageLoader,
    /// Parameters of the function being folded; they shadow constants.
    params: Vec<String>,
    errors: Vec<Diagnostic>,
}

impl Folder<'_> {
    // ── Statements ────────────────────────────────────────────────

    fn fold_body(&mut self, body: Vec<Stmt>) -> Vec<Stmt> {
        body.into_iter().map(|s| self.fold_stmt(s)).collect()
    }

    fn fold_stmt(&mut self, stmt: Stmt) -> Stmt {
        match stmt {
            Stmt::VarDecl { name, ty, value, hoisted, span } => {
                let value = value.map(|v| self.fold_expr(v));
                if let Some(ExprKind::List(items)) = value.as_ref().map(|v| &v.ungrouped().kind) {
                    let values = self.literal_items(items);
                    if let Some(list) = self.defs.lists.get_mut(&name) {
                        list.values = values;
                    }
                }
                Stmt::VarDecl { name, ty, value, hoisted, span }
            }
            Stmt::ConstDecl { name, ty, value, span } => {
                let value = self.fold_expr(value);
                match value.as_literal() {
                    Some(literal) => {
                        if let Some(constant) = self.defs.constants.get_mut(&name) {
                            constant.value = Some(literal.clone());
                        }
                    }
                    None => self.errors.push(Diagnostic::analyze(
                        format!("Constant '{name}' must have a compile-time value"),
                        value.span,
                    )),
                }
                Stmt::ConstDecl { name, ty, value, span }
            }
            Stmt::FuncDecl { name, params, body, span, end_line } => {
                self.params = params.iter().map(|p| p.name.clone()).collect();
                let body = self.fold_body(body);
                self.params.clear();
                Stmt::FuncDecl { name, params, body, span, end_line }
            }
            Stmt::Event { kind, name, param, body, span, end_line } => {
                let param = param.map(|p| self.fold_event_param(kind, &name, p));
                let body = self.fold_body(body);
                Stmt::Event { kind, name, param, body, span, end_line }
            }
            Stmt::Call { name, args, span } => {
                let args: Vec<Expr> = args.into_iter().map(|a| self.fold_expr(a)).collect();
                let user_defined = self.defs.functions.contains_key(&name) || self.defs.events.contains_key(&name);
                if !user_defined {
                    let signature = self
                        .catalog
                        .statement(&name)
                        .and_then(|b| self.arg_types(&args).and_then(|t| b.resolve(&t)));
                    if let Some(signature) = signature {
                        self.check_static_args(&name, signature, &args);
                    }
                }
                Stmt::Call { name, args, span }
            }
            Stmt::Assign { target, op, value, span } => {
                let value = self.fold_expr(value);
                Stmt::Assign { target, op, value, span }
            }
            Stmt::If { condition, then_body, else_body, span } => Stmt::If {
                condition: self.fold_expr(condition),
                then_body: self.fold_body(then_body),
                else_body: self.fold_body(else_body),
                span,
            },
            Stmt::Loop { kind, body, span } => {
                let kind = match kind {
                    LoopKind::Forever => LoopKind::Forever,
                    LoopKind::Times(count) => LoopKind::Times(self.fold_expr(count)),
                    LoopKind::Until(condition) => LoopKind::Until(self.fold_expr(condition)),
                };
                Stmt::Loop { kind, body: self.fold_body(body), span }
            }
        }
    }

    fn fold_event_param(&mut self, kind: EventKind, name: &str, param: Expr) -> Expr {
        let param = self.fold_expr(param);
        if param.as_literal().is_none() {
            self.errors.push(Diagnostic::analyze(
                format!("The parameter of '@{name}' must be a compile-time value"),
                param.span,
            ));
            return param;
        }
        let spec = match kind {
            EventKind::Custom => None,
            EventKind::Builtin | EventKind::Startup => self
                .catalog
                .event(name)
                .and_then(|e| e.signatures.first())
                .and_then(|s| s.params.first()),
        };
        if let Some(spec) = spec {
            self.recheck_options(&format!("@{name}"), spec, &param);
        }
        param
    }

    /// Literal values of folded list items; reports the first one that is not.
    fn literal_items(&mut self, items: &[Expr]) -> Vec<Value> {
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item.as_literal() {
                Some(value) => values.push(value.clone()),
                None => self.errors.push(Diagnostic::analyze(
                    "List elements must be compile-time values",
                    item.span,
                )),
            }
        }
        values
    }

    fn arg_types(&self, args: &[Expr]) -> Option<Vec<DataType>> {
        args.iter().map(|a| self.types.get(a.id)).collect()
    }

    /// Field-slot arguments become dropdown selections and must be literals.
    fn check_static_args(&mut self, callee: &str, signature: &Signature, args: &[Expr]) {
        for (spec, arg) in signature.params.iter().zip(args) {
            if let Slot::Field(_) = spec.slot {
                if arg.as_literal().is_none() {
                    self.errors.push(Diagnostic::analyze(
                        format!("Argument '{}' of {callee} must be a compile-time value", spec.name),
                        arg.span,
                    ));
                    continue;
                }
            }
            self.recheck_options(callee, spec, arg);
        }
    }

    /// Values that only became known by folding are checked here. Arguments
    /// that were literal before folding were already checked by the analyzer.
    fn recheck_options(&mut self, callee: &str, spec: &ParamSpec, arg: &Expr) {
        if let Some(error) = option_error(self.defs, callee, spec, arg) {
            let duplicate = self.errors.iter().any(|e| e.span == error.span && e.message == error.message);
            if !duplicate {
                self.errors.push(error);
            }
        }
    }

    // ── Expressions ───────────────────────────────────────────────

    /// Children first; a node folds when all of its children became literals.
    /// A folded node keeps its id, so its entry in the type table stays valid.
    fn fold_expr(&mut self, expr: Expr) -> Expr {
        let Expr { id, kind, span } = expr;
        let kind = match kind {
            ExprKind::Identifier(name) => {
                let value = if self.params.contains(&name) {
                    None
                } else {
                    self.defs.constants.get(&name).and_then(|c| c.value.clone())
                };
                value.map_or(ExprKind::Identifier(name), ExprKind::Literal)
            }
            ExprKind::Literal(value) => ExprKind::Literal(value),
            ExprKind::Call { name, args } => {
                let args: Vec<Expr> = args.into_iter().map(|a| self.fold_expr(a)).collect();
                if let Some(signature) = self
                    .catalog
                    .function(&name)
                    .and_then(|b| self.arg_types(&args).and_then(|t| b.resolve(&t)))
                {
                    self.check_static_args(&name, signature, &args);
                }
                match fold_math(&name, &args) {
                    Some(n) => ExprKind::Literal(Value::Number(n)),
                    None => ExprKind::Call { name, args },
                }
            }
            ExprKind::Cast { target, operand } => {
                let operand = self.fold_expr(*operand);
                match self.fold_cast(target, &operand) {
                    Some(value) => ExprKind::Literal(value),
                    None => ExprKind::Cast { target, operand: Box::new(operand) },
                }
            }
            ExprKind::List(items) => ExprKind::List(items.into_iter().map(|e| self.fold_expr(e)).collect()),
            ExprKind::Unary { op: UnaryOp::Not, operand } => {
                let operand = self.fold_expr(*operand);
                match operand.as_literal() {
                    Some(Value::Bool(b)) => ExprKind::Literal(Value::Bool(!b)),
                    _ => ExprKind::Unary { op: UnaryOp::Not, operand: Box::new(operand) },
                }
            }
            ExprKind::Binary { op, left, right } => {
                let left = self.fold_expr(*left);
                let right = self.fold_expr(*right);
                if let (BinOp::Div | BinOp::Mod, Some(Value::Number(d))) = (op, right.as_literal()) {
                    if *d == 0.0 {
                        let what = if op == BinOp::Div { "Division" } else { "Modulo" };
                        self.errors.push(Diagnostic::analyze(format!("{what} by zero"), span));
                    }
                }
                match (left.as_literal(), right.as_literal()) {
                    (Some(l), Some(r)) => match fold_binary(op, l, r) {
                        Some(value) => ExprKind::Literal(value),
                        None => ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) },
                    },
                    _ => ExprKind::Binary { op, left: Box::new(left), right: Box::new(right) },
                }
            }
            ExprKind::Grouping(inner) => {
                let inner = self.fold_expr(*inner);
                match inner.as_literal() {
                    Some(value) => ExprKind::Literal(value.clone()),
                    None => ExprKind::Grouping(Box::new(inner)),
                }
            }
        };
        Expr { id, kind, span }
    }

    fn fold_cast(&mut self, target: DataType, operand: &Expr) -> Option<Value> {
        let Some(value) = operand.as_literal() else {
            if target == DataType::Image {
                self.errors.push(Diagnostic::analyze(
                    "image() needs a literal path known at compile time",
                    operand.span,
                ));
            }
            return None;
        };
        match (target, value) {
            (DataType::Number, Value::Number(n)) => Some(Value::Number(*n)),
            (DataType::Number, Value::Str(s)) => match s.trim().parse::<f64>() {
                Ok(n) => Some(Value::Number(n)),
                Err(_) => {
                    self.errors.push(Diagnostic::analyze(
                        format!("Cannot convert '{s}' to a number"),
                        operand.span,
                    ));
                    None
                }
            },
            (DataType::String, value) => Some(Value::Str(value.to_text())),
            (DataType::Image, Value::Str(path)) if path.is_empty() => Some(Value::Str(black_image())),
            // Already converted.
            (DataType::Image, Value::Str(path)) if path.starts_with('#') => Some(Value::Str(path.clone())),
            (DataType::Image, Value::Str(path)) => match self.images.load(path) {
                Ok(pixels) => Some(Value::Str(pixels)),
                Err(e) => {
                    self.errors.push(Diagnostic::analyze(e.to_string(), operand.span));
                    None
                }
            },
            _ => None,
        }
    }
}

// ── Evaluation ─────────────────────────────────────────────────────

fn fold_binary(op: BinOp, left: &Value, right: &Value) -> Option<Value> {
    use Value::{Bool, Number, Str};
    let value = match (op, left, right) {
        (BinOp::Add, Number(l), Number(r)) => Number(l + r),
        (BinOp::Add, Str(_), _) | (BinOp::Add, _, Str(_)) => Str(left.to_text() + &right.to_text()),
        (BinOp::Sub, Number(l), Number(r)) => Number(l - r),
        (BinOp::Mul, Number(l), Number(r)) => Number(l * r),
        (BinOp::Div | BinOp::Mod, Number(_), Number(r)) if *r == 0.0 => return None,
        (BinOp::Div, Number(l), Number(r)) => Number(l / r),
        (BinOp::Mod, Number(l), Number(r)) => Number(floored_mod(*l, *r)),
        (BinOp::Lt, Number(l), Number(r)) => Bool(l < r),
        (BinOp::Gt, Number(l), Number(r)) => Bool(l > r),
        (BinOp::Eq, l, r) => Bool(runtime_equals(l, r)),
        (BinOp::And, Bool(l), Bool(r)) => Bool(*l && *r),
        (BinOp::Or, Bool(l), Bool(r)) => Bool(*l || *r),
        _ => return None,
    };
    Some(value)
}

/// The sign follows the divisor, as the target runtime computes it.
fn floored_mod(l: f64, r: f64) -> f64 {
    l - r * (l / r).floor()
}

/// Numeric comparison when both sides read as numbers, otherwise
/// case-insensitive text comparison.
fn runtime_equals(left: &Value, right: &Value) -> bool {
    let numeric = |v: &Value| match v {
        Value::Number(n) => Some(*n),
        Value::Str(s) if !s.trim().is_empty() => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match (numeric(left), numeric(right)) {
        (Some(l), Some(r)) => l == r,
        _ => left.to_text().to_lowercase() == right.to_text().to_lowercase(),
    }
}

/// Deterministic math builtins on literal arguments.
fn fold_math(name: &str, args: &[Expr]) -> Option<f64> {
    let [arg] = args else {
        return None;
    };
    let Some(Value::Number(x)) = arg.as_literal() else {
        return None;
    };
    let x = *x;
    let result = match name {
        "math.abs" => x.abs(),
        "math.floor" => x.floor(),
        "math.ceil" => x.ceil(),
        "math.round" => x.round(),
        "math.sqrt" if x >= 0.0 => x.sqrt(),
        "math.sin" => round_trig(x.to_radians().sin()),
        "math.cos" => round_trig(x.to_radians().cos()),
        _ => return None,
    };
    Some(result)
}

/// Trig results are rounded to 10 places so `sin(180)` is exactly 0.
fn round_trig(x: f64) -> f64 {
    (x * 1e10).round() / 1e10
}
