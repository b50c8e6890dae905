//! Symbol tables built by the analyzer and read by every later stage.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;

use super::ast::{DataType, ExprId, Span, Value};

/// Resolved type of each expression, keyed by node id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TypeTable {
    types: HashMap<ExprId, DataType>,
}

impl TypeTable {
    pub fn get(&self, id: ExprId) -> Option<DataType> {
        self.types.get(&id).copied()
    }

    pub fn insert(&mut self, id: ExprId, ty: DataType) {
        self.types.insert(id, ty);
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Variable {
    pub id: String,
    pub name: String,
    pub data_type: DataType,
    pub span: Span,
    pub used: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub id: String,
    pub name: String,
    pub element_type: DataType,
    /// Initial contents, filled in once the initializer has been folded.
    pub values: Vec<Value>,
    pub span: Span,
    pub used: bool,
}

impl List {
    pub fn data_type(&self) -> DataType {
        match self.element_type {
            DataType::String => DataType::StringList,
            _ => DataType::NumberList,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Constant {
    pub name: String,
    pub data_type: DataType,
    /// Known once the initializer is a literal.
    pub value: Option<Value>,
    pub span: Span,
    pub used: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionParam {
    pub name: String,
    pub data_type: DataType,
    pub argument_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Function {
    pub name: String,
    pub params: Vec<FunctionParam>,
    /// Call signature in the target vocabulary, e.g. `blink %n %s`.
    pub proccode: String,
    pub span: Span,
    pub end_line: usize,
    pub used: bool,
}

impl Function {
    pub fn param(&self, name: &str) -> Option<&FunctionParam> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn param_types(&self) -> Vec<DataType> {
        self.params.iter().map(|p| p.data_type).collect()
    }
}

/// A user-declared broadcast event.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEvent {
    pub id: String,
    pub name: String,
    pub span: Span,
    pub end_line: usize,
    pub used: bool,
}

/// Everything the program declares. A name lives in at most one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Definitions {
    pub variables: IndexMap<String, Variable>,
    pub lists: IndexMap<String, List>,
    pub constants: IndexMap<String, Constant>,
    pub functions: IndexMap<String, Function>,
    pub events: IndexMap<String, CustomEvent>,
    #[serde(skip)]
    next_id: usize,
}

impl Definitions {
    /// Deterministic id such as `var_3`.
    pub fn fresh_id(&mut self, prefix: &str) -> String {
        let id = format!("{prefix}_{}", self.next_id);
        self.next_id += 1;
        id
    }

    /// Where `name` was declared, in whichever table holds it.
    pub fn declared_at(&self, name: &str) -> Option<Span> {
        self.variables
            .get(name)
            .map(|v| v.span)
            .or_else(|| self.lists.get(name).map(|l| l.span))
            .or_else(|| self.constants.get(name).map(|c| c.span))
            .or_else(|| self.functions.get(name).map(|f| f.span))
            .or_else(|| self.events.get(name).map(|e| e.span))
    }

    pub fn add_variable(&mut self, name: &str, data_type: DataType, span: Span) {
        let id = self.fresh_id("var");
        self.variables.insert(
            name.to_string(),
            Variable { id, name: name.to_string(), data_type, span, used: false },
        );
    }

    pub fn add_list(&mut self, name: &str, element_type: DataType, span: Span) {
        let id = self.fresh_id("list");
        self.lists.insert(
            name.to_string(),
            List { id, name: name.to_string(), element_type, values: Vec::new(), span, used: false },
        );
    }

    pub fn add_constant(&mut self, name: &str, data_type: DataType, value: Option<Value>, span: Span) {
        self.constants.insert(
            name.to_string(),
            Constant { name: name.to_string(), data_type, value, span, used: false },
        );
    }

    pub fn add_function(&mut self, name: &str, params: &[(String, DataType)], span: Span, end_line: usize) {
        let mut proccode = name.to_string();
        let mut function_params = Vec::with_capacity(params.len());
        for (param, ty) in params {
            proccode.push_str(match ty {
                DataType::Number => " %n",
                DataType::Boolean => " %b",
                _ => " %s",
            });
            function_params.push(FunctionParam {
                name: param.clone(),
                data_type: *ty,
                argument_id: self.fresh_id("arg"),
            });
        }
        self.functions.insert(
            name.to_string(),
            Function { name: name.to_string(), params: function_params, proccode, span, end_line, used: false },
        );
    }

    pub fn add_event(&mut self, name: &str, span: Span, end_line: usize) {
        let id = self.fresh_id("msg");
        self.events.insert(
            name.to_string(),
            CustomEvent { id, name: name.to_string(), span, end_line, used: false },
        );
    }

    /// `(kind, name, span)` of every declaration never read or called.
    pub fn unused(&self) -> Vec<(&'static str, &str, Span)> {
        let mut out = Vec::new();
        out.extend(self.variables.values().filter(|v| !v.used).map(|v| ("Variable", v.name.as_str(), v.span)));
        out.extend(self.lists.values().filter(|l| !l.used).map(|l| ("List", l.name.as_str(), l.span)));
        out.extend(self.constants.values().filter(|c| !c.used).map(|c| ("Constant", c.name.as_str(), c.span)));
        out.extend(self.functions.values().filter(|f| !f.used).map(|f| ("Function", f.name.as_str(), f.span)));
        out.extend(self.events.values().filter(|e| !e.used).map(|e| ("Event", e.name.as_str(), e.span)));
        out.sort_by_key(|(_, _, span)| span.start);
        out
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dsl::ast::Position;

    fn at(line: usize) -> Span {
        Span::new(Position::new(line, 1), Position::new(line, 2))
    }

    #[test]
    fn ids_are_sequential_across_tables() {
        let mut defs = Definitions::default();
        defs.add_variable("x", DataType::Number, at(1));
        defs.add_list("xs", DataType::String, at(2));
        defs.add_event("go", at(3), 4);
        assert_eq!(defs.variables["x"].id, "var_0");
        assert_eq!(defs.lists["xs"].id, "list_1");
        assert_eq!(defs.events["go"].id, "msg_2");
    }

    #[test]
    fn proccode_marks_each_parameter_type() {
        let mut defs = Definitions::default();
        let params = [
            ("n".to_string(), DataType::Number),
            ("s".to_string(), DataType::String),
            ("b".to_string(), DataType::Boolean),
        ];
        defs.add_function("f", &params, at(1), 3);
        let f = &defs.functions["f"];
        assert_eq!(f.proccode, "f %n %s %b");
        assert_eq!(f.params[2].argument_id, "arg_2");
    }

    #[test]
    fn declared_at_searches_every_table() {
        let mut defs = Definitions::default();
        defs.add_constant("K", DataType::Number, None, at(5));
        defs.add_function("f", &[], at(7), 8);
        assert_eq!(defs.declared_at("K"), Some(at(5)));
        assert_eq!(defs.declared_at("f"), Some(at(7)));
        assert_eq!(defs.declared_at("nope"), None);
    }

    #[test]
    fn unused_is_in_source_order() {
        let mut defs = Definitions::default();
        defs.add_function("f", &[], at(9), 9);
        defs.add_variable("x", DataType::Number, at(2));
        defs.add_variable("y", DataType::Number, at(3));
        defs.variables["y"].used = true;
        let names: Vec<&str> = defs.unused().iter().map(|(_, n, _)| *n).collect();
        assert_eq!(names, ["x", "f"]);
    }
}
