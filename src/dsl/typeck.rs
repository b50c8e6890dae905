//! Semantic analysis: name resolution, type inference, overload resolution,
//! initializer hoisting and usage warnings.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use super::ast::*;
use super::builtins::{describe_types, Builtin, Catalog, ParamSpec, Signature, Slot};
use super::error::Diagnostic;
use super::symbols::{Definitions, TypeTable};

/// Name of the synthesized event that runs hoisted initializers.
pub const STARTUP_EVENT: &str = "start";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnalyzeOptions {
    pub warn_unused: bool,
    pub warn_unreachable: bool,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self { warn_unused: true, warn_unreachable: true }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Analysis {
    pub definitions: Definitions,
    pub types: TypeTable,
    pub warnings: Vec<Diagnostic>,
    pub errors: Vec<Diagnostic>,
}

/// Analyze a parsed program. Returns the rewritten program (initializers hoisted)
/// together with the symbol tables, the type table and all diagnostics.
pub fn analyze(program: Program, catalog: &Catalog, options: AnalyzeOptions) -> (Program, Analysis) {
    let Program { statements, ids } = program;
    let mut analyzer = Analyzer {
        catalog,
        options,
        ids,
        defs: Definitions::default(),
        types: TypeTable::default(),
        errors: Vec::new(),
        warnings: Vec::new(),
        pending: HashMap::new(),
        declaring: None,
        function: None,
        startup: Vec::new(),
    };
    let statements = analyzer.run(statements);
    debug!(
        variables = analyzer.defs.variables.len(),
        lists = analyzer.defs.lists.len(),
        functions = analyzer.defs.functions.len(),
        errors = analyzer.errors.len(),
        warnings = analyzer.warnings.len(),
        "analyzed",
    );
    (
        Program { statements, ids: analyzer.ids },
        Analysis {
            definitions: analyzer.defs,
            types: analyzer.types,
            warnings: analyzer.warnings,
            errors: analyzer.errors,
        },
    )
}

struct Analyzer<'a> {
    catalog: &'a Catalog,
    options: AnalyzeOptions,
    ids: ExprIds,
    defs: Definitions,
    types: TypeTable,
    errors: Vec<Diagnostic>,
    warnings: Vec<Diagnostic>,
    /// Top-level var/const names not registered yet, with their declaration span.
    pending: HashMap<String, Span>,
    /// Variable whose initializer is being checked.
    declaring: Option<String>,
    /// Function whose body is being visited, for parameter lookup.
    function: Option<String>,
    /// Hoisted initializer assignments, in declaration order.
    startup: Vec<Stmt>,
}

impl Analyzer<'_> {
    fn run(&mut self, statements: Vec<Stmt>) -> Vec<Stmt> {
        // Pass 0: every top-level name, so bodies may call functions declared later.
        let accepted: Vec<bool> = statements.iter().map(|s| self.collect(s)).collect();

        // Pass 1: top-level variables and constants, in order.
        let mut out = Vec::with_capacity(statements.len() + 1);
        let mut bodies = Vec::new();
        for (stmt, ok) in statements.into_iter().zip(accepted) {
            if !ok {
                out.push(stmt);
                continue;
            }
            match stmt {
                Stmt::VarDecl { name, ty, value, hoisted, span } => {
                    self.pending.remove(&name);
                    let (decl, assign) = self.var_decl(name, ty, value, hoisted, span);
                    self.startup.extend(assign);
                    out.push(decl);
                }
                Stmt::ConstDecl { name, ty, value, span } => {
                    self.pending.remove(&name);
                    self.const_decl(&name, ty, &value, span);
                    out.push(Stmt::ConstDecl { name, ty, value, span });
                }
                other => {
                    bodies.push(out.len());
                    out.push(other);
                }
            }
        }

        // Pass 2: event and function bodies.
        for index in bodies {
            if let Some(stmt) = out.get_mut(index) {
                self.visit_top_level(stmt);
            }
        }

        if !self.startup.is_empty() {
            out.insert(
                0,
                Stmt::Event {
                    kind: EventKind::Startup,
                    name: STARTUP_EVENT.to_string(),
                    param: None,
                    body: std::mem::take(&mut self.startup),
                    span: Span::default(),
                    end_line: 0,
                },
            );
        }

        // Pass 3: usage.
        if self.options.warn_unused {
            for (kind, name, span) in self.defs.unused() {
                self.warnings.push(
                    Diagnostic::analyze(format!("{kind} '{name}' is never used"), span).warning(),
                );
            }
        }
        out
    }

    fn collect(&mut self, stmt: &Stmt) -> bool {
        match stmt {
            Stmt::VarDecl { name, span, .. } | Stmt::ConstDecl { name, span, .. } => {
                if !self.check_unique(name, *span) {
                    return false;
                }
                self.pending.insert(name.clone(), *span);
                true
            }
            Stmt::FuncDecl { name, params, span, end_line, .. } => {
                if !self.check_unique(name, *span) {
                    return false;
                }
                let mut seen = HashSet::new();
                let mut typed = Vec::with_capacity(params.len());
                for param in params {
                    if param.ty.is_list() {
                        self.errors.push(Diagnostic::analyze(
                            format!("Parameter '{}' cannot be a list", param.name),
                            param.span,
                        ));
                    } else if !seen.insert(param.name.as_str()) {
                        self.errors.push(Diagnostic::analyze(
                            format!("Duplicate parameter '{}'", param.name),
                            param.span,
                        ));
                    }
                    typed.push((param.name.clone(), param.ty));
                }
                self.defs.add_function(name, &typed, *span, *end_line);
                true
            }
            Stmt::Event { kind: EventKind::Custom, name, span, end_line, .. } => {
                if !self.check_unique(name, *span) {
                    return false;
                }
                self.defs.add_event(name, *span, *end_line);
                true
            }
            _ => true,
        }
    }

    /// Reports a redeclaration and returns false when `name` is taken.
    fn check_unique(&mut self, name: &str, span: Span) -> bool {
        let owner = self
            .function
            .as_deref()
            .and_then(|f| self.defs.functions.get(f))
            .filter(|f| f.param(name).is_some())
            .map(|f| f.name.clone());
        if let Some(owner) = owner {
            self.errors.push(Diagnostic::analyze(
                format!("'{name}' is already declared as a parameter of '{owner}'"),
                span,
            ));
            return false;
        }
        let previous = self.defs.declared_at(name).or_else(|| self.pending.get(name).copied());
        match previous {
            Some(prev) => {
                self.errors.push(Diagnostic::analyze(
                    format!("'{name}' is already declared on line {}", prev.start.line),
                    span,
                ));
                false
            }
            None => true,
        }
    }

    // ── Declarations ──────────────────────────────────────────────

    /// Registers a variable or list. Scalars come back as a hoisted declaration
    /// plus the assignment that initializes them.
    fn var_decl(
        &mut self,
        name: String,
        ty: Option<DataType>,
        value: Option<Expr>,
        hoisted: bool,
        span: Span,
    ) -> (Stmt, Option<Stmt>) {
        let list_literal = value.as_ref().is_some_and(|v| matches!(v.ungrouped().kind, ExprKind::List(_)));
        if list_literal || ty.is_some_and(DataType::is_list) {
            if let Some(element) = self.list_decl(&name, ty, value.as_ref(), span) {
                self.defs.add_list(&name, element, span);
            }
            return (Stmt::VarDecl { name, ty, value, hoisted, span }, None);
        }

        if hoisted {
            if let Some(ty) = ty {
                self.defs.add_variable(&name, ty, span);
            }
            return (Stmt::VarDecl { name, ty, value, hoisted, span }, None);
        }

        match self.scalar_init(&name, ty, value, span) {
            Ok((value, data_type)) => {
                self.defs.add_variable(&name, data_type, span);
                let assign = Stmt::Assign { target: name.clone(), op: AssignOp::Set, value, span };
                let decl = Stmt::VarDecl { name, ty: Some(data_type), value: None, hoisted: true, span };
                (decl, Some(assign))
            }
            Err(e) => {
                self.errors.push(e);
                (Stmt::VarDecl { name, ty, value: None, hoisted, span }, None)
            }
        }
    }

    fn scalar_init(
        &mut self,
        name: &str,
        ty: Option<DataType>,
        value: Option<Expr>,
        span: Span,
    ) -> Result<(Expr, DataType), Diagnostic> {
        if ty == Some(DataType::Boolean) {
            return Err(Diagnostic::analyze(
                format!("Variable '{name}' cannot hold a boolean; only events, conditions and parameters can"),
                span,
            ));
        }
        let Some(value) = value else {
            let ty = ty.ok_or_else(|| {
                Diagnostic::analyze(
                    format!("Cannot infer the type of '{name}'; add a type or an initializer"),
                    span,
                )
            })?;
            let default = ty.default_value().ok_or_else(|| {
                Diagnostic::analyze(format!("Variable '{name}' of type {ty} needs an initializer"), span)
            })?;
            let literal = Expr::new(self.ids.fresh(), ExprKind::Literal(default), span);
            self.types.insert(literal.id, ty);
            return Ok((literal, ty));
        };

        let found = self.initializer_type(name, &value)?;
        if found == DataType::Boolean {
            return Err(Diagnostic::analyze(
                format!("Variable '{name}' cannot hold a boolean; only events, conditions and parameters can"),
                value.span,
            ));
        }
        if found.is_list() {
            return Err(Diagnostic::analyze(
                format!("Variable '{name}' must be initialized with a list literal to hold a list"),
                value.span,
            ));
        }
        let ty = ty.unwrap_or(found);
        if !assignable(ty, found) {
            return Err(Diagnostic::analyze(
                format!("Cannot initialize '{name}' of type {ty} with a {found}"),
                value.span,
            ));
        }
        Ok((value, ty))
    }

    /// Element type of a list declaration, or `None` after reporting an error.
    fn list_decl(&mut self, name: &str, ty: Option<DataType>, value: Option<&Expr>, span: Span) -> Option<DataType> {
        let declared = match ty {
            Some(ty) if ty.is_list() => ty.element(),
            Some(ty) => {
                self.errors.push(Diagnostic::analyze(
                    format!("'{name}' is declared as {ty} but initialized with a list"),
                    span,
                ));
                return None;
            }
            None => None,
        };
        let Some(value) = value else {
            return declared;
        };
        let ExprKind::List(items) = &value.ungrouped().kind else {
            self.errors.push(Diagnostic::analyze(
                format!("List '{name}' must be initialized with a list literal"),
                value.span,
            ));
            return None;
        };

        let mut element = declared;
        for item in items {
            let found = match self.initializer_type(name, item) {
                Ok(found) => found,
                Err(e) => {
                    self.errors.push(e);
                    continue;
                }
            };
            match element {
                Some(expected) if expected != found => self.errors.push(Diagnostic::analyze(
                    format!("List element must be {expected}, got {found}"),
                    item.span,
                )),
                Some(_) => {}
                None if matches!(found, DataType::Number | DataType::String) => element = Some(found),
                None => self.errors.push(Diagnostic::analyze(
                    format!("List elements must be numbers or strings, got {found}"),
                    item.span,
                )),
            }
        }

        match element.and_then(DataType::list_of) {
            Some(list_ty) => {
                self.types.insert(value.id, list_ty);
                self.types.insert(value.ungrouped().id, list_ty);
            }
            None if items.is_empty() => self.errors.push(Diagnostic::analyze(
                format!("Cannot infer the type of empty list '{name}'; declare it as number[] or string[]"),
                span,
            )),
            None => {}
        }
        element
    }

    fn const_decl(&mut self, name: &str, ty: Option<DataType>, value: &Expr, span: Span) {
        let found = match self.initializer_type(name, value) {
            Ok(found) => found,
            Err(e) => {
                self.errors.push(e);
                return;
            }
        };
        if found.is_list() {
            self.errors.push(Diagnostic::analyze(format!("Constant '{name}' cannot hold a list"), value.span));
            return;
        }
        let data_type = match ty {
            Some(ty) if ty != found => {
                self.errors.push(Diagnostic::analyze(
                    format!("Constant '{name}' is declared as {ty} but its value is a {found}"),
                    value.span,
                ));
                ty
            }
            _ => found,
        };
        self.defs.add_constant(name, data_type, value.as_literal().cloned(), span);
    }

    /// Type of an initializer, rejecting references to the name being declared.
    fn initializer_type(&mut self, name: &str, value: &Expr) -> Result<DataType, Diagnostic> {
        self.declaring = Some(name.to_string());
        let found = self.expr_type(value);
        self.declaring = None;
        found
    }

    // ── Statements ────────────────────────────────────────────────

    fn visit_top_level(&mut self, stmt: &mut Stmt) {
        match stmt {
            Stmt::FuncDecl { name, body, .. } => {
                self.function = Some(name.clone());
                *body = self.visit_body(std::mem::take(body));
                self.function = None;
            }
            Stmt::Event { kind, name, param, body, span, .. } => {
                if *kind != EventKind::Custom {
                    self.check_event(name, param.as_ref(), *span);
                }
                *body = self.visit_body(std::mem::take(body));
            }
            _ => {}
        }
    }

    fn check_event(&mut self, name: &str, param: Option<&Expr>, span: Span) {
        let Some(signature) = self.catalog.event(name).and_then(|e| e.signatures.first()) else {
            self.errors.push(Diagnostic::analyze(format!("Unknown event '@{name}'"), span));
            return;
        };
        match (signature.params.first(), param) {
            (None, None) => {}
            (Some(spec), None) => self.errors.push(Diagnostic::analyze(
                format!("Event '@{name}' needs a {} parameter", spec.name),
                span,
            )),
            (None, Some(arg)) => self.errors.push(Diagnostic::analyze(
                format!("Event '@{name}' does not take a parameter"),
                arg.span,
            )),
            (Some(spec), Some(arg)) => match self.expr_type(arg) {
                Ok(found) if found == spec.ty => self.check_options(&format!("@{name}"), spec, arg),
                Ok(found) => self.errors.push(Diagnostic::analyze(
                    format!("Event '@{name}' expects a {} {}, got {found}", spec.ty, spec.name),
                    arg.span,
                )),
                Err(e) => self.errors.push(e),
            },
        }
    }

    /// Visits a statement list. Statements after an unconditional stop are still
    /// analyzed but each draws a warning.
    fn visit_body(&mut self, body: Vec<Stmt>) -> Vec<Stmt> {
        let mut out = Vec::with_capacity(body.len());
        let mut unreachable = false;
        for stmt in body {
            if unreachable && self.options.warn_unreachable {
                self.warnings.push(Diagnostic::analyze("Unreachable code", stmt.span()).warning());
            }
            unreachable |= self.visit_stmt(stmt, &mut out);
        }
        out
    }

    /// Appends the (possibly rewritten) statement to `out`; returns whether
    /// control never continues past it.
    fn visit_stmt(&mut self, stmt: Stmt, out: &mut Vec<Stmt>) -> bool {
        match stmt {
            Stmt::VarDecl { name, ty, value, hoisted, span } => {
                if self.check_unique(&name, span) {
                    let (decl, assign) = self.var_decl(name, ty, value, hoisted, span);
                    out.push(decl);
                    out.extend(assign);
                }
            }
            Stmt::ConstDecl { name, ty, value, span } => {
                if self.check_unique(&name, span) {
                    self.const_decl(&name, ty, &value, span);
                }
                out.push(Stmt::ConstDecl { name, ty, value, span });
            }
            Stmt::FuncDecl { span, .. } | Stmt::Event { span, .. } => {
                self.errors.push(Diagnostic::analyze(
                    "Events and functions can only be declared at top level",
                    span,
                ));
            }
            Stmt::Call { name, args, span } => {
                let terminates = match self.call_stmt(&name, &args, span) {
                    Ok(terminates) => terminates,
                    Err(e) => {
                        self.errors.push(e);
                        false
                    }
                };
                out.push(Stmt::Call { name, args, span });
                return terminates;
            }
            Stmt::Assign { target, op, value, span } => {
                if let Err(e) = self.assign(&target, op, &value, span) {
                    self.errors.push(e);
                }
                out.push(Stmt::Assign { target, op, value, span });
            }
            Stmt::If { condition, then_body, else_body, span } => {
                self.expect_type(&condition, DataType::Boolean, "Condition");
                let then_body = self.visit_body(then_body);
                let else_body = self.visit_body(else_body);
                out.push(Stmt::If { condition, then_body, else_body, span });
            }
            Stmt::Loop { kind, body, span } => {
                match &kind {
                    LoopKind::Forever => {}
                    LoopKind::Times(count) => self.expect_type(count, DataType::Number, "Loop count"),
                    LoopKind::Until(condition) => self.expect_type(condition, DataType::Boolean, "Condition"),
                }
                let forever = matches!(kind, LoopKind::Forever);
                let body = self.visit_body(body);
                out.push(Stmt::Loop { kind, body, span });
                return forever;
            }
        }
        false
    }

    fn expect_type(&mut self, expr: &Expr, expected: DataType, what: &str) {
        match self.expr_type(expr) {
            Ok(found) if found == expected => {}
            Ok(found) => self.errors.push(Diagnostic::analyze(
                format!("{what} must be a {expected}, got {found}"),
                expr.span,
            )),
            Err(e) => self.errors.push(e),
        }
    }

    /// Resolves a call in statement position: user function, then custom event,
    /// then builtin statement. Returns whether the call never returns.
    fn call_stmt(&mut self, name: &str, args: &[Expr], span: Span) -> Result<bool, Diagnostic> {
        let types = self.arg_types(args)?;
        if let Some(function) = self.defs.functions.get_mut(name) {
            function.used = true;
            let expected = function.param_types();
            if types != expected {
                return Err(Diagnostic::analyze(
                    format!(
                        "Function '{name}' expects {}, got {}",
                        describe_types(&expected),
                        describe_types(&types),
                    ),
                    span,
                ));
            }
            return Ok(false);
        }
        if let Some(event) = self.defs.events.get_mut(name) {
            event.used = true;
            if !args.is_empty() {
                return Err(Diagnostic::analyze(format!("Event '{name}' takes no arguments"), span));
            }
            return Ok(false);
        }
        if let Some(builtin) = self.catalog.statement(name) {
            let signature = resolve(builtin, &types, span)?;
            self.check_args(name, signature, args);
            return Ok(signature.terminates);
        }
        if self.catalog.function(name).is_some() {
            return Err(Diagnostic::analyze(
                format!("'{name}' returns a value and cannot be used as a statement"),
                span,
            ));
        }
        Err(self.unknown_call(name, span))
    }

    fn assign(&mut self, target: &str, op: AssignOp, value: &Expr, span: Span) -> Result<(), Diagnostic> {
        let found = self.expr_type(value)?;
        if self.param_type(target).is_some() {
            return Err(Diagnostic::analyze(format!("Cannot assign to parameter '{target}'"), span));
        }
        if let Some(variable) = self.defs.variables.get_mut(target) {
            if op != AssignOp::Set {
                variable.used = true;
            }
            return check_assign(target, variable.data_type, op, found, value.span);
        }
        if self.defs.lists.contains_key(target) {
            return Err(Diagnostic::analyze(
                format!("Cannot assign to list '{target}'; use list.add or list.replace"),
                span,
            ));
        }
        if self.defs.constants.contains_key(target) {
            return Err(Diagnostic::analyze(format!("Cannot assign to constant '{target}'"), span));
        }
        if self.pending.contains_key(target) {
            return Err(Diagnostic::analyze(format!("'{target}' is used before its declaration"), span));
        }
        if let Some(property) = self.catalog.assignment(target) {
            check_assign(target, property.ty, op, found, value.span)?;
            let supported = match op {
                AssignOp::Set => true,
                AssignOp::Add | AssignOp::Sub if property.change().is_some() => true,
                _ => self.catalog.variable(target).is_some(),
            };
            if !supported {
                return Err(Diagnostic::analyze(
                    format!("'{target}' does not support '{}'", op.symbol()),
                    span,
                ));
            }
            return Ok(());
        }
        if self.catalog.variable(target).is_some() {
            return Err(Diagnostic::analyze(format!("'{target}' is read-only"), span));
        }
        Err(Diagnostic::analyze(format!("Undefined variable '{target}'"), span))
    }

    // ── Expressions ───────────────────────────────────────────────

    /// Infers and records the type of `expr` and everything under it.
    fn expr_type(&mut self, expr: &Expr) -> Result<DataType, Diagnostic> {
        let ty = match &expr.kind {
            ExprKind::Literal(value) => value.data_type(),
            ExprKind::Identifier(name) => self.resolve_ident(name, expr.span)?,
            ExprKind::Call { name, args } => self.call_expr(name, args, expr.span)?,
            ExprKind::Cast { target, operand } => {
                let from = self.expr_type(operand)?;
                cast_type(*target, from, expr.span)?
            }
            ExprKind::List(_) => {
                return Err(Diagnostic::analyze(
                    "List literals are only allowed in list declarations",
                    expr.span,
                ));
            }
            ExprKind::Unary { operand, .. } => match self.expr_type(operand)? {
                DataType::Boolean => DataType::Boolean,
                found => {
                    return Err(Diagnostic::analyze(
                        format!("Operator 'not' expects a boolean, got {found}"),
                        expr.span,
                    ));
                }
            },
            ExprKind::Binary { op, left, right } => {
                let left = self.expr_type(left)?;
                let right = self.expr_type(right)?;
                binary_type(*op, left, right, expr.span)?
            }
            ExprKind::Grouping(inner) => self.expr_type(inner)?,
        };
        self.types.insert(expr.id, ty);
        Ok(ty)
    }

    fn arg_types(&mut self, args: &[Expr]) -> Result<Vec<DataType>, Diagnostic> {
        args.iter().map(|a| self.expr_type(a)).collect()
    }

    /// Parameter, variable, list, constant, then builtin variable.
    fn resolve_ident(&mut self, name: &str, span: Span) -> Result<DataType, Diagnostic> {
        if let Some(ty) = self.param_type(name) {
            return Ok(ty);
        }
        if self.declaring.as_deref() == Some(name) {
            return Err(Diagnostic::analyze(
                format!("Cannot use variable '{name}' in its own initializer"),
                span,
            ));
        }
        if let Some(variable) = self.defs.variables.get_mut(name) {
            variable.used = true;
            return Ok(variable.data_type);
        }
        if let Some(list) = self.defs.lists.get_mut(name) {
            list.used = true;
            return Ok(list.data_type());
        }
        if let Some(constant) = self.defs.constants.get_mut(name) {
            constant.used = true;
            return Ok(constant.data_type);
        }
        if self.pending.contains_key(name) {
            return Err(Diagnostic::analyze(format!("'{name}' is used before its declaration"), span));
        }
        if let Some(ty) = self.catalog.variable(name).and_then(|v| v.signatures.first()).and_then(|s| s.ret) {
            return Ok(ty);
        }
        if self.defs.functions.contains_key(name) {
            return Err(Diagnostic::analyze(
                format!("'{name}' is a function; call it as a statement with {name}(...)"),
                span,
            ));
        }
        if self.defs.events.contains_key(name) {
            return Err(Diagnostic::analyze(
                format!("'{name}' is an event; broadcast it with {name}()"),
                span,
            ));
        }
        Err(Diagnostic::analyze(format!("Undefined name '{name}'"), span))
    }

    fn param_type(&self, name: &str) -> Option<DataType> {
        let function = self.defs.functions.get(self.function.as_deref()?)?;
        function.param(name).map(|p| p.data_type)
    }

    /// Calls in expression position only reach value-returning builtins.
    fn call_expr(&mut self, name: &str, args: &[Expr], span: Span) -> Result<DataType, Diagnostic> {
        let types = self.arg_types(args)?;
        if let Some(builtin) = self.catalog.function(name) {
            let signature = resolve(builtin, &types, span)?;
            self.check_args(name, signature, args);
            return signature.ret.ok_or_else(|| {
                Diagnostic::analyze(format!("'{name}' does not return a value"), span)
            });
        }
        if let Some(function) = self.defs.functions.get_mut(name) {
            function.used = true;
            return Err(Diagnostic::analyze(
                format!("Function '{name}' does not return a value"),
                span,
            ));
        }
        if self.defs.events.contains_key(name) || self.catalog.statement(name).is_some() {
            return Err(Diagnostic::analyze(format!("'{name}' does not return a value"), span));
        }
        Err(self.unknown_call(name, span))
    }

    /// A call to a name no callable category knows. Builtin events and
    /// properties get their own message.
    fn unknown_call(&self, name: &str, span: Span) -> Diagnostic {
        if self.catalog.defines(name) {
            Diagnostic::analyze(format!("'{name}' is a builtin but cannot be called"), span)
        } else {
            Diagnostic::analyze(format!("Unknown function '{name}'"), span)
        }
    }

    /// Option sets and list references of a resolved builtin call.
    fn check_args(&mut self, callee: &str, signature: &Signature, args: &[Expr]) {
        for (spec, arg) in signature.params.iter().zip(args) {
            if let Slot::List(_) = spec.slot {
                let names_list = matches!(
                    &arg.ungrouped().kind,
                    ExprKind::Identifier(n) if self.defs.lists.contains_key(n)
                );
                if !names_list {
                    self.errors.push(Diagnostic::analyze(
                        format!("Argument '{}' of {callee} must name a list", spec.name),
                        arg.span,
                    ));
                }
            }
            self.check_options(callee, spec, arg);
        }
    }

    fn check_options(&mut self, callee: &str, spec: &ParamSpec, arg: &Expr) {
        if let Some(error) = option_error(&self.defs, callee, spec, arg) {
            self.errors.push(error);
        }
    }
}

// ── Helpers ────────────────────────────────────────────────────────

/// First catalog signature that accepts `types`, or an error listing every candidate.
pub fn resolve(builtin: &Builtin, types: &[DataType], span: Span) -> Result<&'static Signature, Diagnostic> {
    builtin.resolve(types).ok_or_else(|| {
        Diagnostic::analyze(
            format!(
                "No overload of '{}' accepts {}; candidates are:\n{}",
                builtin.name,
                describe_types(types),
                builtin.candidates(),
            ),
            span,
        )
    })
}

/// Value known before run time: a literal or a constant with a literal value.
pub fn static_value(defs: &Definitions, expr: &Expr) -> Option<Value> {
    if let Some(value) = expr.as_literal() {
        return Some(value.clone());
    }
    match &expr.ungrouped().kind {
        ExprKind::Identifier(name) => defs.constants.get(name).and_then(|c| c.value.clone()),
        _ => None,
    }
}

/// Error when `arg` has a known value outside the parameter's option set.
pub fn option_error(defs: &Definitions, callee: &str, spec: &ParamSpec, arg: &Expr) -> Option<Diagnostic> {
    let options = spec.options?;
    let Some(Value::Str(value)) = static_value(defs, arg) else {
        return None;
    };
    if options.contains(&value.as_str()) {
        return None;
    }
    Some(Diagnostic::analyze(
        format!(
            "'{value}' is not a valid {} for {callee}; expected one of: {}",
            spec.name,
            options.join(", "),
        ),
        arg.span,
    ))
}

/// Numbers widen to strings; everything else must match exactly.
fn assignable(target: DataType, found: DataType) -> bool {
    target == found || (target == DataType::String && found == DataType::Number)
}

fn check_assign(name: &str, ty: DataType, op: AssignOp, found: DataType, span: Span) -> Result<(), Diagnostic> {
    let ok = match op {
        AssignOp::Set => assignable(ty, found),
        AssignOp::Add => match ty {
            DataType::String => matches!(found, DataType::String | DataType::Number),
            DataType::Number => found == DataType::Number,
            _ => false,
        },
        _ => ty == DataType::Number && found == DataType::Number,
    };
    if ok {
        return Ok(());
    }
    let message = match op {
        AssignOp::Set => format!("Cannot assign a {found} to '{name}' of type {ty}"),
        _ => format!("Operator '{}' cannot combine '{name}' ({ty}) with a {found}", op.symbol()),
    };
    Err(Diagnostic::analyze(message, span))
}

fn binary_type(op: BinOp, left: DataType, right: DataType, span: Span) -> Result<DataType, Diagnostic> {
    let scalar = |t: DataType| matches!(t, DataType::Number | DataType::String);
    let both = |t: DataType| left == t && right == t;
    let result = match op {
        BinOp::Add if scalar(left) && scalar(right) => {
            if left == DataType::String || right == DataType::String {
                DataType::String
            } else {
                DataType::Number
            }
        }
        BinOp::Eq if scalar(left) && scalar(right) => DataType::Boolean,
        BinOp::Lt | BinOp::Gt if both(DataType::Number) => DataType::Boolean,
        BinOp::And | BinOp::Or if both(DataType::Boolean) => DataType::Boolean,
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod if both(DataType::Number) => DataType::Number,
        _ => {
            let expected = match op {
                BinOp::Add | BinOp::Eq => "numbers or strings",
                BinOp::And | BinOp::Or => "booleans",
                _ => "numbers",
            };
            return Err(Diagnostic::analyze(
                format!("Operator '{}' expects {expected}, got {left} and {right}", op.symbol()),
                span,
            ));
        }
    };
    Ok(result)
}

fn cast_type(target: DataType, from: DataType, span: Span) -> Result<DataType, Diagnostic> {
    let ok = match (from, target) {
        (DataType::Boolean, _) | (_, DataType::Boolean) => false,
        (from, DataType::String) if from.is_list() => true,
        (from, _) if from.is_list() => false,
        (DataType::Number | DataType::String, DataType::Number | DataType::String) => true,
        (DataType::String | DataType::Image, DataType::Image) => true,
        (DataType::Image, DataType::String) => true,
        _ => false,
    };
    if ok {
        Ok(target)
    } else {
        Err(Diagnostic::analyze(format!("Cannot cast {from} to {target}"), span))
    }
}
