//! AST node types for the robot block language.

use std::fmt;

use serde::Serialize;

/// 1-based line and column of a character in the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

/// Source span for error reporting. `end` is exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Span {
    pub start: Position,
    pub end: Position,
}

impl Span {
    pub fn new(start: Position, end: Position) -> Self {
        Self { start, end }
    }

    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Value types known to the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Number,
    String,
    Boolean,
    /// 16×16 pixel literal; a string of comma-separated colors at runtime.
    Image,
    NumberList,
    StringList,
}

impl DataType {
    pub fn is_list(self) -> bool {
        matches!(self, DataType::NumberList | DataType::StringList)
    }

    /// Element type of a list type.
    pub fn element(self) -> Option<DataType> {
        match self {
            DataType::NumberList => Some(DataType::Number),
            DataType::StringList => Some(DataType::String),
            _ => None,
        }
    }

    /// List type holding elements of this type, if lists of it are allowed.
    pub fn list_of(self) -> Option<DataType> {
        match self {
            DataType::Number => Some(DataType::NumberList),
            DataType::String => Some(DataType::StringList),
            _ => None,
        }
    }

    /// Default value given to a typed declaration without an initializer.
    pub fn default_value(self) -> Option<Value> {
        match self {
            DataType::Number => Some(Value::Number(0.0)),
            DataType::String => Some(Value::Str(String::new())),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            DataType::Number => "number",
            DataType::String => "string",
            DataType::Boolean => "boolean",
            DataType::Image => "image",
            DataType::NumberList => "number[]",
            DataType::StringList => "string[]",
        })
    }
}

/// A literal value, as decoded by the scanner or produced by folding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    pub fn data_type(&self) -> DataType {
        match self {
            Value::Number(_) => DataType::Number,
            Value::Str(_) => DataType::String,
            Value::Bool(_) => DataType::Boolean,
        }
    }

    /// Runtime text form: integral numbers print without a fraction.
    pub fn to_text(&self) -> String {
        match self {
            Value::Number(n) => format_number(*n),
            Value::Str(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
        }
    }
}

pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity".to_string() } else { "-Infinity".to_string() }
    } else if n.fract() == 0.0 && n.abs() < 1e15 {
        // -0 prints as 0
        format!("{}", n + 0.0)
    } else {
        format!("{n}")
    }
}

/// Identity of an expression node; key of the analyzer's type table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

/// Hands out fresh expression ids for one compilation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExprIds {
    next: u32,
}

impl ExprIds {
    pub fn fresh(&mut self) -> ExprId {
        let id = ExprId(self.next);
        self.next += 1;
        id
    }
}

/// A parsed compilation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub statements: Vec<Stmt>,
    pub ids: ExprIds,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Variable, list, constant, parameter or builtin variable (`sensor.distance`).
    Identifier(String),
    Literal(Value),
    /// `math.random(1, 10)`
    Call { name: String, args: Vec<Expr> },
    /// `string(count)`
    Cast { target: DataType, operand: Box<Expr> },
    /// `[1, 2, 3]`
    List(Vec<Expr>),
    Unary { op: UnaryOp, operand: Box<Expr> },
    Binary { op: BinOp, left: Box<Expr>, right: Box<Expr> },
    /// `(expr)`, kept for error positions.
    Grouping(Box<Expr>),
}

impl Expr {
    pub fn new(id: ExprId, kind: ExprKind, span: Span) -> Self {
        Self { id, kind, span }
    }

    /// Strips grouping parentheses.
    pub fn ungrouped(&self) -> &Expr {
        match &self.kind {
            ExprKind::Grouping(inner) => inner.ungrouped(),
            _ => self,
        }
    }

    pub fn as_literal(&self) -> Option<&Value> {
        match &self.ungrouped().kind {
            ExprKind::Literal(v) => Some(v),
            _ => None,
        }
    }

    /// Deep copy with fresh ids, for desugarings that duplicate an operand.
    pub fn duplicate(&self, ids: &mut ExprIds) -> Expr {
        let kind = match &self.kind {
            ExprKind::Identifier(name) => ExprKind::Identifier(name.clone()),
            ExprKind::Literal(v) => ExprKind::Literal(v.clone()),
            ExprKind::Call { name, args } => ExprKind::Call {
                name: name.clone(),
                args: args.iter().map(|a| a.duplicate(ids)).collect(),
            },
            ExprKind::Cast { target, operand } => ExprKind::Cast {
                target: *target,
                operand: Box::new(operand.duplicate(ids)),
            },
            ExprKind::List(items) => ExprKind::List(items.iter().map(|e| e.duplicate(ids)).collect()),
            ExprKind::Unary { op, operand } => ExprKind::Unary {
                op: *op,
                operand: Box::new(operand.duplicate(ids)),
            },
            ExprKind::Binary { op, left, right } => ExprKind::Binary {
                op: *op,
                left: Box::new(left.duplicate(ids)),
                right: Box::new(right.duplicate(ids)),
            },
            ExprKind::Grouping(inner) => ExprKind::Grouping(Box::new(inner.duplicate(ids))),
        };
        Expr::new(ids.fresh(), kind, self.span)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

/// Binary operators left after parser desugaring: `<=`, `>=` and `!=` never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Eq,
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Mod => "%",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Eq => "==",
            BinOp::And => "and",
            BinOp::Or => "or",
        }
    }
}

/// `=`, `+=`, `-=`, `*=`, `/=`, `%=`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    Set,
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

impl AssignOp {
    /// The binary operator a compound assignment applies.
    pub fn binop(self) -> Option<BinOp> {
        match self {
            AssignOp::Set => None,
            AssignOp::Add => Some(BinOp::Add),
            AssignOp::Sub => Some(BinOp::Sub),
            AssignOp::Mul => Some(BinOp::Mul),
            AssignOp::Div => Some(BinOp::Div),
            AssignOp::Mod => Some(BinOp::Mod),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            AssignOp::Set => "=",
            AssignOp::Add => "+=",
            AssignOp::Sub => "-=",
            AssignOp::Mul => "*=",
            AssignOp::Div => "/=",
            AssignOp::Mod => "%=",
        }
    }
}

/// `name: number` in a function header.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: DataType,
    pub span: Span,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// `@button "a":`, checked against the event catalog.
    Builtin,
    /// `event celebrate:`, a user-declared broadcast.
    Custom,
    /// Startup event synthesized to run hoisted initializers.
    Startup,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoopKind {
    /// `loop:`
    Forever,
    /// `loop 3:`
    Times(Expr),
    /// `until done:`, and `while` after negation.
    Until(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `var x = 1`, `var names: string[]`
    VarDecl {
        name: String,
        ty: Option<DataType>,
        value: Option<Expr>,
        /// Set once the analyzer has moved a scalar initializer into an assignment.
        hoisted: bool,
        span: Span,
    },
    /// `const SPEED = 50`
    ConstDecl {
        name: String,
        ty: Option<DataType>,
        value: Expr,
        span: Span,
    },
    /// `func blink(times: number):`
    FuncDecl {
        name: String,
        params: Vec<Param>,
        body: Vec<Stmt>,
        span: Span,
        end_line: usize,
    },
    Event {
        kind: EventKind,
        name: String,
        param: Option<Expr>,
        body: Vec<Stmt>,
        span: Span,
        end_line: usize,
    },
    /// Call in statement position: builtin, user function or custom event broadcast.
    Call {
        name: String,
        args: Vec<Expr>,
        span: Span,
    },
    Assign {
        target: String,
        op: AssignOp,
        value: Expr,
        span: Span,
    },
    If {
        condition: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        span: Span,
    },
    Loop {
        kind: LoopKind,
        body: Vec<Stmt>,
        span: Span,
    },
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl { span, .. }
            | Stmt::ConstDecl { span, .. }
            | Stmt::FuncDecl { span, .. }
            | Stmt::Event { span, .. }
            | Stmt::Call { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::Loop { span, .. } => *span,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn number_text_drops_integral_fraction() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-0.0), "0");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(-2.25), "-2.25");
        assert_eq!(format_number(f64::INFINITY), "Infinity");
    }

    #[test]
    fn duplicate_assigns_fresh_ids() {
        let mut ids = ExprIds::default();
        let span = Span::default();
        let left = Expr::new(ids.fresh(), ExprKind::Identifier("a".into()), span);
        let right = Expr::new(ids.fresh(), ExprKind::Literal(Value::Number(1.0)), span);
        let sum = Expr::new(
            ids.fresh(),
            ExprKind::Binary { op: BinOp::Add, left: Box::new(left), right: Box::new(right) },
            span,
        );
        let copy = sum.duplicate(&mut ids);
        assert_eq!(copy.id, ExprId(5));
        let ExprKind::Binary { left, right, .. } = &copy.kind else {
            panic!("expected binary");
        };
        assert_eq!(left.id, ExprId(3));
        assert_eq!(right.id, ExprId(4));
    }

    #[test]
    fn list_types_round_trip_through_elements() {
        assert_eq!(DataType::Number.list_of(), Some(DataType::NumberList));
        assert_eq!(DataType::StringList.element(), Some(DataType::String));
        assert_eq!(DataType::Boolean.list_of(), None);
        assert_eq!(DataType::StringList.to_string(), "string[]");
    }
}
