//! Lowering of the folded program to the block graph.

use std::fmt::Display;

use indexmap::IndexMap;
use serde::Serialize;
use tracing::debug;

use super::ast::*;
use super::builtins::{describe_types, Builtin, Catalog, ParamSpec, Signature, Slot};
use super::error::Diagnostic;
use super::symbols::{Definitions, Function, TypeTable, Variable};

// ── Block graph ────────────────────────────────────────────────────

/// Content of a named input slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Input {
    /// Value typed directly into the slot.
    Literal(Value),
    /// Reporter, menu shadow or first block of a substack.
    Block(String),
}

/// Dropdown selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub value: String,
    /// Variable, list or broadcast the selection refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Field {
    pub fn text(value: impl Into<String>) -> Self {
        Self { value: value.into(), id: None }
    }

    pub fn entity(value: impl Into<String>, id: impl Into<String>) -> Self {
        Self { value: value.into(), id: Some(id.into()) }
    }
}

/// Procedure signature carried by prototypes and calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    pub proccode: String,
    pub argument_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub argument_names: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub argument_defaults: Vec<String>,
    pub warp: bool,
}

impl Mutation {
    fn prototype(function: &Function) -> Self {
        Self {
            proccode: function.proccode.clone(),
            argument_ids: function.params.iter().map(|p| p.argument_id.clone()).collect(),
            argument_names: function.params.iter().map(|p| p.name.clone()).collect(),
            argument_defaults: function
                .params
                .iter()
                .map(|p| if p.data_type == DataType::Boolean { "false".into() } else { String::new() })
                .collect(),
            warp: false,
        }
    }

    fn call(function: &Function) -> Self {
        Self {
            proccode: function.proccode.clone(),
            argument_ids: function.params.iter().map(|p| p.argument_id.clone()).collect(),
            argument_names: Vec::new(),
            argument_defaults: Vec::new(),
            warp: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockNode {
    pub opcode: String,
    pub next: Option<String>,
    pub parent: Option<String>,
    pub inputs: IndexMap<String, Input>,
    pub fields: IndexMap<String, Field>,
    pub shadow: bool,
    pub top_level: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mutation: Option<Mutation>,
}

impl BlockNode {
    fn new(opcode: &str, parent: &str) -> Self {
        Self {
            opcode: opcode.to_string(),
            next: None,
            parent: Some(parent.to_string()),
            inputs: IndexMap::new(),
            fields: IndexMap::new(),
            shadow: false,
            top_level: false,
            mutation: None,
        }
    }

    fn top_level(opcode: &str) -> Self {
        Self { parent: None, top_level: true, ..Self::new(opcode, "") }
    }

    fn shadow(opcode: &str, parent: &str) -> Self {
        Self { shadow: true, ..Self::new(opcode, parent) }
    }

    /// Ids of every block referenced from an input.
    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.inputs.values().filter_map(|input| match input {
            Input::Block(id) => Some(id.as_str()),
            Input::Literal(_) => None,
        })
    }
}

/// Every emitted block by id, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct BlockGraph {
    blocks: IndexMap<String, BlockNode>,
}

impl BlockGraph {
    pub fn get(&self, id: &str) -> Option<&BlockNode> {
        self.blocks.get(id)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BlockNode)> {
        self.blocks.iter().map(|(id, node)| (id.as_str(), node))
    }

    /// Event hats and procedure definitions.
    pub fn top_level(&self) -> impl Iterator<Item = (&str, &BlockNode)> {
        self.iter().filter(|(_, node)| node.top_level)
    }
}

// ── Generator ──────────────────────────────────────────────────────

/// Lower a folded, error-free program. Errors returned here indicate a call
/// the analyzer accepted but the catalog cannot lay out.
pub fn generate(
    program: &Program,
    defs: &Definitions,
    types: &TypeTable,
    catalog: &Catalog,
) -> (BlockGraph, Vec<Diagnostic>) {
    let mut generator = Generator {
        defs,
        types,
        catalog,
        blocks: IndexMap::new(),
        next_id: 0,
        function: None,
        errors: Vec::new(),
    };
    for stmt in &program.statements {
        let result = match stmt {
            Stmt::Event { kind, name, param, body, span, .. } => {
                generator.event(*kind, name, param.as_ref(), body, *span)
            }
            Stmt::FuncDecl { name, body, span, .. } => generator.procedure(name, body, *span),
            _ => Ok(()),
        };
        if let Err(e) = result {
            generator.errors.push(e);
        }
    }
    debug!(blocks = generator.blocks.len(), errors = generator.errors.len(), "generated");
    (BlockGraph { blocks: generator.blocks }, generator.errors)
}

/// Reads the current value of a compound-assignment target.
enum Reader<'a> {
    Variable(&'a Variable),
    Property(&'static Signature),
}

struct Generator<'a> {
    defs: &'a Definitions,
    types: &'a TypeTable,
    catalog: &'a Catalog,
    blocks: IndexMap<String, BlockNode>,
    next_id: usize,
    /// Function whose body is being lowered, for parameter reporters.
    function: Option<&'a Function>,
    errors: Vec<Diagnostic>,
}

fn internal(message: impl Display, span: Span) -> Diagnostic {
    Diagnostic::generate(format!("Internal error: {message}"), span)
}

impl<'a> Generator<'a> {
    // ── Graph editing ─────────────────────────────────────────────

    fn push(&mut self, node: BlockNode) -> String {
        let id = format!("block_{}", self.next_id);
        self.next_id += 1;
        self.blocks.insert(id.clone(), node);
        id
    }

    fn set_input(&mut self, id: &str, name: &str, input: Input) {
        if let Some(node) = self.blocks.get_mut(id) {
            node.inputs.insert(name.to_string(), input);
        }
    }

    fn set_field(&mut self, id: &str, name: &str, field: Field) {
        if let Some(node) = self.blocks.get_mut(id) {
            node.fields.insert(name.to_string(), field);
        }
    }

    fn set_next(&mut self, id: &str, next: Option<String>) {
        if let Some(node) = self.blocks.get_mut(id) {
            node.next = next;
        }
    }

    fn set_substack(&mut self, id: &str, name: &str, first: Option<String>) {
        if let Some(first) = first {
            self.set_input(id, name, Input::Block(first));
        }
    }

    fn fixed_fields(&mut self, id: &str, signature: &Signature) {
        for (name, value) in signature.fields {
            self.set_field(id, name, Field::text(*value));
        }
    }

    // ── Scripts ───────────────────────────────────────────────────

    fn event(
        &mut self,
        kind: EventKind,
        name: &str,
        param: Option<&Expr>,
        body: &[Stmt],
        span: Span,
    ) -> Result<(), Diagnostic> {
        let hat = match kind {
            EventKind::Custom => {
                let defs = self.defs;
                let event = defs
                    .events
                    .get(name)
                    .ok_or_else(|| internal(format!("event '{name}' was never declared"), span))?;
                let hat = self.push(BlockNode::top_level("event_whenbroadcastreceived"));
                self.set_field(&hat, "BROADCAST_OPTION", Field::entity(name, &event.id));
                hat
            }
            EventKind::Builtin | EventKind::Startup => {
                let signature = self
                    .catalog
                    .event(name)
                    .and_then(|e| e.signatures.first())
                    .ok_or_else(|| internal(format!("no hat block for '@{name}'"), span))?;
                let hat = self.push(BlockNode::top_level(signature.opcode));
                self.fixed_fields(&hat, signature);
                if let (Some(spec), Some(arg)) = (signature.params.first(), param) {
                    self.bind(&hat, &format!("@{name}"), spec, arg)?;
                }
                hat
            }
        };
        let first = self.body(body, &hat)?;
        self.set_next(&hat, first);
        Ok(())
    }

    fn procedure(&mut self, name: &str, body: &[Stmt], span: Span) -> Result<(), Diagnostic> {
        let defs = self.defs;
        let function = defs
            .functions
            .get(name)
            .ok_or_else(|| internal(format!("function '{name}' was never declared"), span))?;

        let definition = self.push(BlockNode::top_level("procedures_definition"));
        let prototype = self.push(BlockNode::shadow("procedures_prototype", &definition));
        self.set_input(&definition, "custom_block", Input::Block(prototype.clone()));
        for param in &function.params {
            let reporter = self.push(BlockNode::shadow(reporter_opcode(param.data_type), &prototype));
            self.set_field(&reporter, "VALUE", Field::text(&param.name));
            self.set_input(&prototype, &param.argument_id, Input::Block(reporter));
        }
        if let Some(node) = self.blocks.get_mut(&prototype) {
            node.mutation = Some(Mutation::prototype(function));
        }

        self.function = Some(function);
        let first = self.body(body, &definition);
        self.function = None;
        self.set_next(&definition, first?);
        Ok(())
    }

    /// Chains a statement list under `parent` and returns its first block.
    /// Nothing after an unconditional stop is emitted.
    fn body(&mut self, body: &[Stmt], parent: &str) -> Result<Option<String>, Diagnostic> {
        let mut first = None;
        let mut previous: Option<String> = None;
        for stmt in body {
            let parent = previous.clone().unwrap_or_else(|| parent.to_string());
            let Some((id, terminates)) = self.stmt(stmt, &parent)? else {
                continue;
            };
            match &previous {
                Some(prev) => self.set_next(prev, Some(id.clone())),
                None => first = Some(id.clone()),
            }
            previous = Some(id);
            if terminates {
                break;
            }
        }
        Ok(first)
    }

    // ── Statements ────────────────────────────────────────────────

    /// The emitted block and whether control never continues past it.
    /// Declarations emit nothing.
    fn stmt(&mut self, stmt: &Stmt, parent: &str) -> Result<Option<(String, bool)>, Diagnostic> {
        let emitted = match stmt {
            Stmt::VarDecl { .. } | Stmt::ConstDecl { .. } | Stmt::FuncDecl { .. } | Stmt::Event { .. } => {
                return Ok(None);
            }
            Stmt::Call { name, args, span } => self.call_stmt(name, args, *span, parent)?,
            Stmt::Assign { target, op, value, span } => (self.assign(target, *op, value, *span, parent)?, false),
            Stmt::If { condition, then_body, else_body, .. } => {
                let opcode = if else_body.is_empty() { "control_if" } else { "control_if_else" };
                let id = self.push(BlockNode::new(opcode, parent));
                self.bind_input(&id, "CONDITION", condition)?;
                let then_first = self.body(then_body, &id)?;
                self.set_substack(&id, "SUBSTACK", then_first);
                if !else_body.is_empty() {
                    let else_first = self.body(else_body, &id)?;
                    self.set_substack(&id, "SUBSTACK2", else_first);
                }
                (id, false)
            }
            Stmt::Loop { kind, body, .. } => {
                let (opcode, header) = match kind {
                    LoopKind::Forever => ("control_forever", None),
                    LoopKind::Times(count) => ("control_repeat", Some(("TIMES", count))),
                    LoopKind::Until(condition) => ("control_repeat_until", Some(("CONDITION", condition))),
                };
                let id = self.push(BlockNode::new(opcode, parent));
                if let Some((name, expr)) = header {
                    self.bind_input(&id, name, expr)?;
                }
                let first = self.body(body, &id)?;
                self.set_substack(&id, "SUBSTACK", first);
                (id, matches!(kind, LoopKind::Forever))
            }
        };
        Ok(Some(emitted))
    }

    /// User function, then custom event broadcast, then catalog statement.
    fn call_stmt(&mut self, name: &str, args: &[Expr], span: Span, parent: &str) -> Result<(String, bool), Diagnostic> {
        let defs = self.defs;
        if let Some(function) = defs.functions.get(name) {
            let id = self.push(BlockNode::new("procedures_call", parent));
            for (param, arg) in function.params.iter().zip(args) {
                self.bind_input(&id, &param.argument_id, arg)?;
            }
            if let Some(node) = self.blocks.get_mut(&id) {
                node.mutation = Some(Mutation::call(function));
            }
            return Ok((id, false));
        }
        if let Some(event) = defs.events.get(name) {
            let id = self.push(BlockNode::new("event_broadcast", parent));
            let menu = self.push(BlockNode::shadow("event_broadcast_menu", &id));
            self.set_field(&menu, "BROADCAST_OPTION", Field::entity(name, &event.id));
            self.set_input(&id, "BROADCAST_INPUT", Input::Block(menu));
            return Ok((id, false));
        }
        let builtin = self
            .catalog
            .statement(name)
            .ok_or_else(|| internal(format!("unknown statement '{name}'"), span))?;
        let signature = self.signature(builtin, args, span)?;
        let id = self.builtin(signature, name, args, parent)?;
        Ok((id, signature.terminates))
    }

    fn assign(&mut self, target: &str, op: AssignOp, value: &Expr, span: Span, parent: &str) -> Result<String, Diagnostic> {
        let defs = self.defs;
        if let Some(variable) = defs.variables.get(target) {
            let change = op == AssignOp::Add && variable.data_type == DataType::Number;
            let opcode = if change { "data_changevariableby" } else { "data_setvariableto" };
            let id = self.push(BlockNode::new(opcode, parent));
            self.set_field(&id, "VARIABLE", Field::entity(&variable.name, &variable.id));
            if op == AssignOp::Set || change {
                self.bind_input(&id, "VALUE", value)?;
            } else {
                let combined = self.combine(op, variable.data_type, &Reader::Variable(variable), value, &id, span)?;
                self.set_input(&id, "VALUE", Input::Block(combined));
            }
            return Ok(id);
        }

        let property = self
            .catalog
            .assignment(target)
            .ok_or_else(|| internal(format!("unknown assignment target '{target}'"), span))?;
        match (op, property.change()) {
            (AssignOp::Set, _) => self.builtin(&property.set, target, std::slice::from_ref(value), parent),
            (AssignOp::Add | AssignOp::Sub, Some(change)) => {
                let id = self.push(BlockNode::new(change.opcode, parent));
                self.fixed_fields(&id, change);
                let slot = value_slot(change, span)?;
                if op == AssignOp::Sub {
                    if let Some(input) = self.negated(value, &id)? {
                        self.set_input(&id, slot, input);
                    }
                } else {
                    self.bind_input(&id, slot, value)?;
                }
                Ok(id)
            }
            _ => {
                let reader = self
                    .catalog
                    .variable(target)
                    .and_then(|v| v.signatures.first())
                    .map(Reader::Property)
                    .ok_or_else(|| internal(format!("'{target}' cannot be read back"), span))?;
                let id = self.push(BlockNode::new(property.set.opcode, parent));
                self.fixed_fields(&id, &property.set);
                let slot = value_slot(&property.set, span)?;
                let combined = self.combine(op, property.ty, &reader, value, &id, span)?;
                self.set_input(&id, slot, Input::Block(combined));
                Ok(id)
            }
        }
    }

    /// `target op value` as one reporter.
    fn combine(
        &mut self,
        op: AssignOp,
        ty: DataType,
        reader: &Reader<'_>,
        value: &Expr,
        parent: &str,
        span: Span,
    ) -> Result<String, Diagnostic> {
        let binop = op.binop().ok_or_else(|| internal("plain assignment has no operator", span))?;
        let (opcode, [left, right]) = binary_layout(binop, ty);
        let id = self.push(BlockNode::new(opcode, parent));
        let current = match reader {
            Reader::Variable(variable) => {
                let reporter = self.push(BlockNode::new("data_variable", &id));
                self.set_field(&reporter, "VARIABLE", Field::entity(&variable.name, &variable.id));
                reporter
            }
            Reader::Property(signature) => {
                let reporter = self.push(BlockNode::new(signature.opcode, &id));
                self.fixed_fields(&reporter, signature);
                reporter
            }
        };
        self.set_input(&id, left, Input::Block(current));
        self.bind_input(&id, right, value)?;
        Ok(id)
    }

    /// `-value`: a negated literal, or `-1 * value`.
    fn negated(&mut self, value: &Expr, parent: &str) -> Result<Option<Input>, Diagnostic> {
        if let Some(Value::Number(n)) = value.as_literal() {
            return Ok(Some(Input::Literal(Value::Number(-n))));
        }
        let id = self.push(BlockNode::new("operator_multiply", parent));
        self.set_input(&id, "NUM1", Input::Literal(Value::Number(-1.0)));
        self.bind_input(&id, "NUM2", value)?;
        Ok(Some(Input::Block(id)))
    }

    // ── Builtin layout ────────────────────────────────────────────

    /// Re-runs overload matching on the analyzer's types to pick the layout.
    fn signature(&self, builtin: &Builtin, args: &[Expr], span: Span) -> Result<&'static Signature, Diagnostic> {
        let types: Option<Vec<DataType>> = args.iter().map(|a| self.types.get(a.id)).collect();
        let types = types.ok_or_else(|| internal(format!("arguments of '{}' were never typed", builtin.name), span))?;
        builtin.resolve(&types).ok_or_else(|| {
            internal(format!("no overload of '{}' accepts {}", builtin.name, describe_types(&types)), span)
        })
    }

    fn builtin(&mut self, signature: &Signature, callee: &str, args: &[Expr], parent: &str) -> Result<String, Diagnostic> {
        let id = self.push(BlockNode::new(signature.opcode, parent));
        self.fixed_fields(&id, signature);
        for (spec, arg) in signature.params.iter().zip(args) {
            self.bind(&id, callee, spec, arg)?;
        }
        Ok(id)
    }

    /// Places one argument according to its slot kind.
    fn bind(&mut self, id: &str, callee: &str, spec: &ParamSpec, arg: &Expr) -> Result<(), Diagnostic> {
        match spec.slot {
            Slot::Input(input) => self.bind_input(id, input, arg)?,
            Slot::Field(field) => {
                let value = arg.as_literal().ok_or_else(|| {
                    internal(format!("argument '{}' of {callee} was not folded", spec.name), arg.span)
                })?;
                self.set_field(id, field, Field::text(value.to_text()));
            }
            Slot::Menu { input, opcode, field } => match arg.as_literal() {
                Some(value) => {
                    let menu = self.push(BlockNode::shadow(opcode, id));
                    self.set_field(&menu, field, Field::text(value.to_text()));
                    self.set_input(id, input, Input::Block(menu));
                }
                None => self.bind_input(id, input, arg)?,
            },
            Slot::List(field) => {
                let defs = self.defs;
                let list = match &arg.ungrouped().kind {
                    ExprKind::Identifier(name) => defs.lists.get(name),
                    _ => None,
                }
                .ok_or_else(|| internal(format!("argument '{}' of {callee} is not a list", spec.name), arg.span))?;
                self.set_field(id, field, Field::entity(&list.name, &list.id));
            }
        }
        Ok(())
    }

    fn bind_input(&mut self, id: &str, name: &str, expr: &Expr) -> Result<(), Diagnostic> {
        if let Some(input) = self.expr(expr, id)? {
            self.set_input(id, name, input);
        }
        Ok(())
    }

    // ── Expressions ───────────────────────────────────────────────

    /// `None` leaves the input empty, which is how `false` is written.
    fn expr(&mut self, expr: &Expr, parent: &str) -> Result<Option<Input>, Diagnostic> {
        let block = match &expr.kind {
            ExprKind::Literal(Value::Bool(true)) => self.push(BlockNode::new("operator_not", parent)),
            ExprKind::Literal(Value::Bool(false)) => return Ok(None),
            ExprKind::Literal(value) => return Ok(Some(Input::Literal(value.clone()))),
            ExprKind::Grouping(inner) => return self.expr(inner, parent),
            ExprKind::Identifier(name) => return self.identifier(name, parent, expr.span).map(Some),
            ExprKind::Call { name, args } => {
                let builtin = self
                    .catalog
                    .function(name)
                    .ok_or_else(|| internal(format!("unknown function '{name}'"), expr.span))?;
                let signature = self.signature(builtin, args, expr.span)?;
                self.builtin(signature, name, args, parent)?
            }
            ExprKind::Cast { target, operand } => return self.cast(*target, operand, parent),
            ExprKind::Unary { operand, .. } => {
                let id = self.push(BlockNode::new("operator_not", parent));
                self.bind_input(&id, "OPERAND", operand)?;
                id
            }
            ExprKind::Binary { op, left, right } => {
                let (opcode, [left_slot, right_slot]) = binary_layout(*op, self.type_of(expr)?);
                let id = self.push(BlockNode::new(opcode, parent));
                self.bind_input(&id, left_slot, left)?;
                self.bind_input(&id, right_slot, right)?;
                id
            }
            ExprKind::List(_) => return Err(internal("list literal outside a list declaration", expr.span)),
        };
        Ok(Some(Input::Block(block)))
    }

    /// Parameter, variable, list, constant, then builtin variable.
    fn identifier(&mut self, name: &str, parent: &str, span: Span) -> Result<Input, Diagnostic> {
        if let Some(param) = self.function.and_then(|f| f.param(name)) {
            let id = self.push(BlockNode::new(reporter_opcode(param.data_type), parent));
            self.set_field(&id, "VALUE", Field::text(name));
            return Ok(Input::Block(id));
        }
        let defs = self.defs;
        if let Some(variable) = defs.variables.get(name) {
            let id = self.push(BlockNode::new("data_variable", parent));
            self.set_field(&id, "VARIABLE", Field::entity(&variable.name, &variable.id));
            return Ok(Input::Block(id));
        }
        if let Some(list) = defs.lists.get(name) {
            let id = self.push(BlockNode::new("data_listcontents", parent));
            self.set_field(&id, "LIST", Field::entity(&list.name, &list.id));
            return Ok(Input::Block(id));
        }
        if let Some(value) = defs.constants.get(name).and_then(|c| c.value.clone()) {
            return Ok(Input::Literal(value));
        }
        let signature = self
            .catalog
            .variable(name)
            .and_then(|v| v.signatures.first())
            .ok_or_else(|| internal(format!("unresolved name '{name}'"), span))?;
        let id = self.push(BlockNode::new(signature.opcode, parent));
        self.fixed_fields(&id, signature);
        Ok(Input::Block(id))
    }

    /// Runtime conversions; same-representation casts pass the operand through.
    fn cast(&mut self, target: DataType, operand: &Expr, parent: &str) -> Result<Option<Input>, Diagnostic> {
        let from = self.type_of(operand)?;
        let (opcode, slots, padding) = match (from, target) {
            (DataType::String, DataType::Number) => ("operator_add", ["NUM1", "NUM2"], Value::Number(0.0)),
            (from, DataType::String) if from == DataType::Number || from.is_list() => {
                ("operator_join", ["STRING1", "STRING2"], Value::Str(String::new()))
            }
            _ => return self.expr(operand, parent),
        };
        let id = self.push(BlockNode::new(opcode, parent));
        self.bind_input(&id, slots[0], operand)?;
        self.set_input(&id, slots[1], Input::Literal(padding));
        Ok(Some(Input::Block(id)))
    }

    fn type_of(&self, expr: &Expr) -> Result<DataType, Diagnostic> {
        self.types
            .get(expr.id)
            .ok_or_else(|| internal("expression was never typed", expr.span))
    }
}

fn reporter_opcode(ty: DataType) -> &'static str {
    if ty == DataType::Boolean {
        "argument_reporter_boolean"
    } else {
        "argument_reporter_string_number"
    }
}

/// Operator opcode and operand slots. `+` joins when the result is text.
fn binary_layout(op: BinOp, result: DataType) -> (&'static str, [&'static str; 2]) {
    const NUM: [&str; 2] = ["NUM1", "NUM2"];
    const OPERAND: [&str; 2] = ["OPERAND1", "OPERAND2"];
    match op {
        BinOp::Add if result == DataType::String => ("operator_join", ["STRING1", "STRING2"]),
        BinOp::Add => ("operator_add", NUM),
        BinOp::Sub => ("operator_subtract", NUM),
        BinOp::Mul => ("operator_multiply", NUM),
        BinOp::Div => ("operator_divide", NUM),
        BinOp::Mod => ("operator_mod", NUM),
        BinOp::Lt => ("operator_lt", OPERAND),
        BinOp::Gt => ("operator_gt", OPERAND),
        BinOp::Eq => ("operator_equals", OPERAND),
        BinOp::And => ("operator_and", OPERAND),
        BinOp::Or => ("operator_or", OPERAND),
    }
}

/// Input name of a single-parameter property block.
fn value_slot(signature: &Signature, span: Span) -> Result<&'static str, Diagnostic> {
    match signature.params.first().map(|p| p.slot) {
        Some(Slot::Input(name)) => Ok(name),
        _ => Err(internal(format!("'{}' has no value input", signature.opcode), span)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::image::{black_image, FileImageLoader};
    use crate::dsl::lexer::lex;
    use crate::dsl::optimize::fold_constants;
    use crate::dsl::parser::parse;
    use crate::dsl::typeck::{analyze, AnalyzeOptions};

    fn gen(src: &str) -> BlockGraph {
        let (program, errors) = parse(lex(src).unwrap());
        assert!(errors.is_empty(), "parse errors: {errors:?}");
        let catalog = Catalog::robot();
        let (program, mut analysis) = analyze(program, &catalog, AnalyzeOptions::default());
        assert!(analysis.errors.is_empty(), "analysis errors: {:?}", analysis.errors);
        let (program, errors) = fold_constants(
            program,
            &mut analysis.definitions,
            &analysis.types,
            &catalog,
            &FileImageLoader::default(),
        );
        assert!(errors.is_empty(), "fold errors: {errors:?}");
        let (graph, errors) = generate(&program, &analysis.definitions, &analysis.types, &catalog);
        assert!(errors.is_empty(), "generate errors: {errors:?}");
        graph
    }

    fn hat<'g>(graph: &'g BlockGraph, opcode: &str) -> (&'g str, &'g BlockNode) {
        graph.top_level().find(|(_, node)| node.opcode == opcode).unwrap()
    }

    fn next<'g>(graph: &'g BlockGraph, node: &BlockNode) -> &'g BlockNode {
        graph.get(node.next.as_deref().unwrap()).unwrap()
    }

    fn input<'g>(graph: &'g BlockGraph, node: &BlockNode, name: &str) -> &'g BlockNode {
        match &node.inputs[name] {
            Input::Block(id) => graph.get(id).unwrap(),
            other => panic!("input {name} is {other:?}"),
        }
    }

    fn literal(node: &BlockNode, name: &str) -> Value {
        match &node.inputs[name] {
            Input::Literal(value) => value.clone(),
            other => panic!("input {name} is {other:?}"),
        }
    }

    /// Opcodes along a `next` chain.
    fn chain(graph: &BlockGraph, first: &BlockNode) -> Vec<String> {
        let mut out = vec![first.opcode.clone()];
        let mut node = first;
        while let Some(id) = &node.next {
            node = graph.get(id).unwrap();
            out.push(node.opcode.clone());
        }
        out
    }

    #[test]
    fn button_event_with_tone() {
        let graph = gen("@button \"a\": audio.playBuzzer(440)");
        assert_eq!(graph.len(), 2);
        let hat = graph.get("block_0").unwrap();
        assert_eq!(hat.opcode, "robot_whenbuttonpressed");
        assert!(hat.top_level && hat.parent.is_none());
        assert_eq!(hat.fields["BUTTON"], Field::text("a"));
        assert_eq!(hat.next.as_deref(), Some("block_1"));
        let tone = graph.get("block_1").unwrap();
        assert_eq!(tone.opcode, "robot_playtone");
        assert_eq!(tone.parent.as_deref(), Some("block_0"));
        assert_eq!(literal(tone, "FREQUENCY"), Value::Number(440.0));
        assert!(tone.next.is_none() && !tone.top_level);
    }

    #[test]
    fn hoisted_initializer_sets_variable() {
        let graph = gen("var x = 1 + 2");
        let (_, start) = hat(&graph, "event_whenprogramstarts");
        let set = next(&graph, start);
        assert_eq!(set.opcode, "data_setvariableto");
        assert_eq!(set.fields["VARIABLE"], Field::entity("x", "var_0"));
        assert_eq!(literal(set, "VALUE"), Value::Number(3.0));
    }

    #[test]
    fn timer_event_has_fixed_menu_and_value() {
        let graph = gen("@timer 5: audio.stop()");
        let (_, hat) = hat(&graph, "event_whengreaterthan");
        assert_eq!(hat.fields["WHENGREATERTHANMENU"], Field::text("TIMER"));
        assert_eq!(literal(hat, "VALUE"), Value::Number(5.0));
    }

    #[test]
    fn if_else_nests_substacks() {
        let src = "var n = 0\n@button \"a\":\n  if n > 1:\n    audio.stop()\n  else:\n    lights.off()\n  drive.stop()";
        let graph = gen(src);
        let (_, hat) = hat(&graph, "robot_whenbuttonpressed");
        let branch = next(&graph, hat);
        assert_eq!(branch.opcode, "control_if_else");
        let condition = input(&graph, branch, "CONDITION");
        assert_eq!(condition.opcode, "operator_gt");
        assert_eq!(input(&graph, condition, "OPERAND1").opcode, "data_variable");
        assert_eq!(literal(condition, "OPERAND2"), Value::Number(1.0));

        let then_first = input(&graph, branch, "SUBSTACK");
        assert_eq!(then_first.opcode, "sound_stopallsounds");
        assert!(then_first.next.is_none());
        assert_eq!(input(&graph, branch, "SUBSTACK2").opcode, "robot_lightsoff");

        let after = next(&graph, branch);
        assert_eq!(after.opcode, "robot_drivestop");
        assert_eq!(after.parent, hat.next);
    }

    #[test]
    fn boolean_literals() {
        let graph = gen("@button \"a\":\n  if true: audio.stop()\n  flow.waitUntil(false)");
        let (_, hat) = hat(&graph, "robot_whenbuttonpressed");
        let branch = next(&graph, hat);
        let always = input(&graph, branch, "CONDITION");
        assert_eq!(always.opcode, "operator_not");
        assert!(always.inputs.is_empty());
        let wait = next(&graph, branch);
        assert_eq!(wait.opcode, "control_wait_until");
        assert!(!wait.inputs.contains_key("CONDITION"));
    }

    #[test]
    fn variable_compound_assignments() {
        let src = "var count = 0\nvar s = \"\"\n@button \"a\":\n  count += 1\n  s += count\n  count *= 2\n  count -= 3";
        let graph = gen(src);
        let (_, hat) = hat(&graph, "robot_whenbuttonpressed");

        let add = next(&graph, hat);
        assert_eq!(add.opcode, "data_changevariableby");
        assert_eq!(literal(add, "VALUE"), Value::Number(1.0));

        let append = next(&graph, add);
        assert_eq!(append.opcode, "data_setvariableto");
        let join = input(&graph, append, "VALUE");
        assert_eq!(join.opcode, "operator_join");
        assert_eq!(input(&graph, join, "STRING1").fields["VARIABLE"].value, "s");
        assert_eq!(input(&graph, join, "STRING2").fields["VARIABLE"].value, "count");

        let scale = next(&graph, append);
        let product = input(&graph, scale, "VALUE");
        assert_eq!(product.opcode, "operator_multiply");
        assert_eq!(input(&graph, product, "NUM1").opcode, "data_variable");
        assert_eq!(literal(product, "NUM2"), Value::Number(2.0));

        let subtract = next(&graph, scale);
        assert_eq!(input(&graph, subtract, "VALUE").opcode, "operator_subtract");
    }

    #[test]
    fn property_assignments() {
        let src = "@button \"a\":\n  audio.volume += 5\n  audio.pitch -= 5\n  audio.volume -= sensor.distance\n  display.brightness *= 2\n  drive.speed = 10";
        let graph = gen(src);
        let (_, hat) = hat(&graph, "robot_whenbuttonpressed");

        let volume = next(&graph, hat);
        assert_eq!(volume.opcode, "sound_changevolumeby");
        assert_eq!(literal(volume, "VOLUME"), Value::Number(5.0));

        let pitch = next(&graph, volume);
        assert_eq!(pitch.opcode, "sound_changeeffectby");
        assert_eq!(pitch.fields["EFFECT"], Field::text("PITCH"));
        assert_eq!(literal(pitch, "VALUE"), Value::Number(-5.0));

        let quieter = next(&graph, pitch);
        let negated = input(&graph, quieter, "VOLUME");
        assert_eq!(negated.opcode, "operator_multiply");
        assert_eq!(literal(negated, "NUM1"), Value::Number(-1.0));
        assert_eq!(input(&graph, negated, "NUM2").opcode, "robot_distance");

        let brighter = next(&graph, quieter);
        assert_eq!(brighter.opcode, "robot_setbrightness");
        let product = input(&graph, brighter, "BRIGHTNESS");
        assert_eq!(input(&graph, product, "NUM1").opcode, "robot_displaybrightness");

        let speed = next(&graph, brighter);
        assert_eq!(speed.opcode, "robot_setdrivespeed");
        assert_eq!(literal(speed, "SPEED"), Value::Number(10.0));
    }

    #[test]
    fn slots_become_menus_fields_and_list_references() {
        let src = "var xs = [1, 2]\n@button \"a\":\n  motors.run(\"A\", 50)\n  display.pixel(1, 2, \"red\")\n  list.add(xs, 3)\n  lights.setColor(sensor.color)";
        let graph = gen(src);
        let (_, hat) = hat(&graph, "robot_whenbuttonpressed");

        let run = next(&graph, hat);
        let port = input(&graph, run, "PORT");
        assert_eq!(port.opcode, "robot_menu_port");
        assert!(port.shadow && !port.top_level);
        assert_eq!(port.fields["PORT"], Field::text("A"));
        assert_eq!(literal(run, "SPEED"), Value::Number(50.0));

        let pixel = next(&graph, run);
        assert_eq!(pixel.fields["COLOR"], Field::text("red"));

        let add = next(&graph, pixel);
        assert_eq!(add.fields["LIST"], Field::entity("xs", "list_0"));
        assert_eq!(literal(add, "ITEM"), Value::Number(3.0));

        let light = next(&graph, add);
        let reporter = input(&graph, light, "COLOR");
        assert_eq!(reporter.opcode, "robot_colordetected");
        assert!(!reporter.shadow);
    }

    #[test]
    fn procedures_define_and_call() {
        let src = "func blink(times: number, on: boolean):\n  if on: flow.wait(times)\n@button \"a\": blink(2, true)";
        let graph = gen(src);
        let (definition_id, definition) = hat(&graph, "procedures_definition");
        let prototype = input(&graph, definition, "custom_block");
        assert_eq!(prototype.opcode, "procedures_prototype");
        assert!(prototype.shadow);
        assert_eq!(prototype.parent.as_deref(), Some(definition_id));
        let mutation = prototype.mutation.as_ref().unwrap();
        assert_eq!(mutation.proccode, "blink %n %b");
        assert_eq!(mutation.argument_ids, ["arg_0", "arg_1"]);
        assert_eq!(mutation.argument_names, ["times", "on"]);
        assert_eq!(mutation.argument_defaults, ["", "false"]);
        assert_eq!(input(&graph, prototype, "arg_1").opcode, "argument_reporter_boolean");

        let branch = next(&graph, definition);
        let condition = input(&graph, branch, "CONDITION");
        assert_eq!(condition.opcode, "argument_reporter_boolean");
        assert_eq!(condition.fields["VALUE"], Field::text("on"));
        let wait = input(&graph, branch, "SUBSTACK");
        assert_eq!(input(&graph, wait, "DURATION").opcode, "argument_reporter_string_number");

        let (_, hat) = hat(&graph, "robot_whenbuttonpressed");
        let call = next(&graph, hat);
        assert_eq!(call.opcode, "procedures_call");
        assert_eq!(call.mutation.as_ref().unwrap().proccode, "blink %n %b");
        assert_eq!(literal(call, "arg_0"), Value::Number(2.0));
        assert_eq!(input(&graph, call, "arg_1").opcode, "operator_not");
    }

    #[test]
    fn custom_events_broadcast() {
        let graph = gen("event party: audio.stop()\n@button \"a\": party()");
        let (_, receiver) = hat(&graph, "event_whenbroadcastreceived");
        assert_eq!(receiver.fields["BROADCAST_OPTION"], Field::entity("party", "msg_0"));
        let (_, hat) = hat(&graph, "robot_whenbuttonpressed");
        let broadcast = next(&graph, hat);
        assert_eq!(broadcast.opcode, "event_broadcast");
        let menu = input(&graph, broadcast, "BROADCAST_INPUT");
        assert!(menu.shadow);
        assert_eq!(menu.fields["BROADCAST_OPTION"], Field::entity("party", "msg_0"));
    }

    #[test]
    fn loops_and_unreachable_tail() {
        let src = "var n = 0\n@button \"a\":\n  loop 3: audio.stop()\n  until n > 2: n += 1\n  loop: flow.wait(1)\n  audio.stop()";
        let graph = gen(src);
        let (_, hat) = hat(&graph, "robot_whenbuttonpressed");
        let first = next(&graph, hat);
        assert_eq!(chain(&graph, first), ["control_repeat", "control_repeat_until", "control_forever"]);
        assert_eq!(literal(first, "TIMES"), Value::Number(3.0));
        let until = next(&graph, first);
        assert_eq!(input(&graph, until, "CONDITION").opcode, "operator_gt");
        assert_eq!(input(&graph, until, "SUBSTACK").opcode, "data_changevariableby");
    }

    #[test]
    fn terminating_call_ends_the_chain() {
        let graph = gen("@button \"a\":\n  flow.stop()\n  audio.stop()");
        assert_eq!(graph.len(), 2);
        let (_, hat) = hat(&graph, "robot_whenbuttonpressed");
        let stop = next(&graph, hat);
        assert_eq!(stop.opcode, "control_stop");
        assert_eq!(stop.fields["STOP_OPTION"], Field::text("all"));
        assert!(stop.next.is_none());
    }

    #[test]
    fn runtime_casts() {
        let src = "var s = \"5\"\nvar n = 1\n@button \"a\":\n  display.show(number(s) + n)\n  display.show(string(n))";
        let graph = gen(src);
        let (_, hat) = hat(&graph, "robot_whenbuttonpressed");
        let show = next(&graph, hat);
        let sum = input(&graph, show, "TEXT");
        assert_eq!(sum.opcode, "operator_add");
        let cast = input(&graph, sum, "NUM1");
        assert_eq!(cast.opcode, "operator_add");
        assert_eq!(literal(cast, "NUM2"), Value::Number(0.0));

        let text = input(&graph, next(&graph, show), "TEXT");
        assert_eq!(text.opcode, "operator_join");
        assert_eq!(literal(text, "STRING2"), Value::Str(String::new()));
    }

    #[test]
    fn image_literal_fills_matrix_input() {
        let graph = gen("@button \"a\": display.show(image(\"\"))");
        let (_, hat) = hat(&graph, "robot_whenbuttonpressed");
        let show = next(&graph, hat);
        assert_eq!(show.opcode, "robot_displayimage");
        assert_eq!(literal(show, "MATRIX"), Value::Str(black_image()));
    }

    #[test]
    fn missing_types_are_internal_errors() {
        let (program, _) = parse(lex("@button \"a\": audio.playBuzzer(440)").unwrap());
        let catalog = Catalog::robot();
        let (program, analysis) = analyze(program, &catalog, AnalyzeOptions::default());
        let (_, errors) = generate(&program, &analysis.definitions, &TypeTable::default(), &catalog);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, crate::dsl::error::ErrorKind::Generate);
        assert!(errors[0].message.starts_with("Internal error"));
    }

    #[test]
    fn graph_serializes_by_id() {
        let graph = gen("@button \"a\": audio.stop()");
        let json = serde_json::to_value(&graph).unwrap();
        assert_eq!(json["block_0"]["opcode"], "robot_whenbuttonpressed");
        assert_eq!(json["block_0"]["topLevel"], true);
        assert_eq!(json["block_1"]["parent"], "block_0");
    }
}
