use indexmap::IndexMap;
use serde::Serialize;

use super::ast::DataType;
use super::catalog;

/// How an argument is laid out on the emitted block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// Value input: embedded literal or a reporter block.
    Input(&'static str),
    /// Dropdown field; the argument must be a compile-time constant.
    Field(&'static str),
    /// Dropdown menu input backed by a shadow block holding `field`.
    Menu {
        input: &'static str,
        opcode: &'static str,
        field: &'static str,
    },
    /// List reference field (`LIST`); the argument must name a list.
    List(&'static str),
}

/// One parameter of a builtin signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub ty: DataType,
    pub slot: Slot,
    /// Enumerated option set for dropdown values (case-sensitive).
    pub options: Option<&'static [&'static str]>,
}

/// One overload of a builtin: ordered params, optional return type, and the block it lowers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub params: &'static [ParamSpec],
    pub ret: Option<DataType>,
    pub opcode: &'static str,
    /// Fields with fixed values, e.g. `OPERATOR: "abs"` on `operator_mathop`.
    pub fields: &'static [(&'static str, &'static str)],
    /// Control never continues past this block.
    pub terminates: bool,
}

/// Built-in event, variable or function: name plus its overloads.
#[derive(Debug, Clone, Copy)]
pub struct Builtin {
    pub name: &'static str,
    pub signatures: &'static [Signature],
    pub description: &'static str,
}

/// A writable builtin property, `audio.volume = 50`.
#[derive(Debug, Clone, Copy)]
pub struct AssignTarget {
    pub name: &'static str,
    pub ty: DataType,
    /// Single-param signature used for `=`.
    pub set: Signature,
    /// Zero or one single-param signature used for `+=`.
    pub change: &'static [Signature],
    pub description: &'static str,
}

// ── Table-building helpers ──────────────────────────────────────

pub const fn input(name: &'static str, ty: DataType, input: &'static str) -> ParamSpec {
    ParamSpec { name, ty, slot: Slot::Input(input), options: None }
}

pub const fn field(
    name: &'static str,
    field: &'static str,
    options: &'static [&'static str],
) -> ParamSpec {
    ParamSpec { name, ty: DataType::String, slot: Slot::Field(field), options: Some(options) }
}

pub const fn menu(
    name: &'static str,
    input: &'static str,
    opcode: &'static str,
    field: &'static str,
    options: Option<&'static [&'static str]>,
) -> ParamSpec {
    ParamSpec {
        name,
        ty: DataType::String,
        slot: Slot::Menu { input, opcode, field },
        options,
    }
}

pub const fn list(name: &'static str, ty: DataType) -> ParamSpec {
    ParamSpec { name, ty, slot: Slot::List("LIST"), options: None }
}

/// Builds a [`Signature`] literal: `sig!([params], ret, opcode)`, optionally
/// followed by fixed fields and a terminates flag.
macro_rules! sig {
    ([$($param:expr),* $(,)?], $ret:expr, $opcode:expr $(,)?) => {
        $crate::dsl::builtins::sig!([$($param),*], $ret, $opcode, [], false)
    };
    ([$($param:expr),* $(,)?], $ret:expr, $opcode:expr, [$($field:expr),* $(,)?] $(,)?) => {
        $crate::dsl::builtins::sig!([$($param),*], $ret, $opcode, [$($field),*], false)
    };
    ([$($param:expr),* $(,)?], $ret:expr, $opcode:expr, [$($field:expr),* $(,)?], $terminates:expr $(,)?) => {
        $crate::dsl::builtins::Signature {
            params: &[$($param),*],
            ret: $ret,
            opcode: $opcode,
            fields: &[$($field),*],
            terminates: $terminates,
        }
    };
}
pub(crate) use sig;

impl Signature {
    /// Exact arity and per-position type equality.
    pub fn accepts(&self, args: &[DataType]) -> bool {
        self.params.len() == args.len() && self.params.iter().zip(args).all(|(p, a)| p.ty == *a)
    }

    /// `audio.playBuzzer(freq: number, seconds: number)`
    pub fn describe(&self, name: &str) -> String {
        let params: Vec<String> = self.params.iter().map(|p| format!("{}: {}", p.name, p.ty)).collect();
        match self.ret {
            Some(ret) => format!("{name}({}) -> {ret}", params.join(", ")),
            None => format!("{name}({})", params.join(", ")),
        }
    }
}

impl AssignTarget {
    pub fn change(&self) -> Option<&'static Signature> {
        self.change.first()
    }
}

impl Builtin {
    /// First signature whose arity and parameter types match exactly.
    pub fn resolve(&self, args: &[DataType]) -> Option<&'static Signature> {
        self.signatures.iter().find(|s| s.accepts(args))
    }

    /// Every candidate signature, one per line, for overload errors.
    pub fn candidates(&self) -> String {
        self.signatures
            .iter()
            .map(|s| format!("  {}", s.describe(self.name)))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn describe_types(types: &[DataType]) -> String {
    let names: Vec<String> = types.iter().map(ToString::to_string).collect();
    format!("({})", names.join(", "))
}

// ── Catalog ─────────────────────────────────────────────────────

/// One line of the vocabulary listing printed by `blockc catalog`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub category: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub signatures: Vec<String>,
}

impl Entry {
    fn builtin(category: &'static str, builtin: &Builtin) -> Self {
        Self {
            category,
            name: builtin.name,
            description: builtin.description,
            signatures: builtin.signatures.iter().map(|s| s.describe(builtin.name)).collect(),
        }
    }
}

/// The builtin vocabulary, built once and shared read-only by every stage.
#[derive(Debug, Clone)]
pub struct Catalog {
    events: IndexMap<&'static str, &'static Builtin>,
    variables: IndexMap<&'static str, &'static Builtin>,
    assignments: IndexMap<&'static str, &'static AssignTarget>,
    statements: IndexMap<&'static str, &'static Builtin>,
    functions: IndexMap<&'static str, &'static Builtin>,
}

impl Catalog {
    /// The robot vocabulary from [`catalog`].
    pub fn robot() -> Self {
        Self::from_tables(
            catalog::EVENTS,
            catalog::VARIABLES,
            catalog::ASSIGNMENTS,
            catalog::STATEMENTS,
            catalog::FUNCTIONS,
        )
    }

    pub fn from_tables(
        events: &'static [Builtin],
        variables: &'static [Builtin],
        assignments: &'static [AssignTarget],
        statements: &'static [Builtin],
        functions: &'static [Builtin],
    ) -> Self {
        fn index(table: &'static [Builtin]) -> IndexMap<&'static str, &'static Builtin> {
            table.iter().map(|b| (b.name, b)).collect()
        }
        Self {
            events: index(events),
            variables: index(variables),
            assignments: assignments.iter().map(|a| (a.name, a)).collect(),
            statements: index(statements),
            functions: index(functions),
        }
    }

    pub fn event(&self, name: &str) -> Option<&'static Builtin> {
        self.events.get(name).copied()
    }

    pub fn variable(&self, name: &str) -> Option<&'static Builtin> {
        self.variables.get(name).copied()
    }

    pub fn assignment(&self, name: &str) -> Option<&'static AssignTarget> {
        self.assignments.get(name).copied()
    }

    /// Void builtin usable as a statement.
    pub fn statement(&self, name: &str) -> Option<&'static Builtin> {
        self.statements.get(name).copied()
    }

    /// Value-returning builtin usable in expressions.
    pub fn function(&self, name: &str) -> Option<&'static Builtin> {
        self.functions.get(name).copied()
    }

    /// Whether any category defines `name`.
    pub fn defines(&self, name: &str) -> bool {
        self.events.contains_key(name)
            || self.variables.contains_key(name)
            || self.assignments.contains_key(name)
            || self.statements.contains_key(name)
            || self.functions.contains_key(name)
    }

    /// Every builtin with its description, grouped by category.
    pub fn entries(&self) -> Vec<Entry> {
        let mut entries: Vec<Entry> = Vec::new();
        entries.extend(self.events.values().map(|b| Entry::builtin("event", b)));
        entries.extend(self.statements.values().map(|b| Entry::builtin("statement", b)));
        entries.extend(self.functions.values().map(|b| Entry::builtin("function", b)));
        entries.extend(self.variables.values().map(|b| Entry::builtin("variable", b)));
        entries.extend(self.assignments.values().map(|a| Entry {
            category: "property",
            name: a.name,
            description: a.description,
            signatures: vec![format!("{} = {}", a.name, a.ty)],
        }));
        entries
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::robot()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn first_matching_overload_wins() {
        let catalog = Catalog::robot();
        let buzzer = catalog.statement("audio.playBuzzer").unwrap();
        let one = buzzer.resolve(&[DataType::Number]).unwrap();
        let two = buzzer.resolve(&[DataType::Number, DataType::Number]).unwrap();
        assert_ne!(one.opcode, two.opcode);
        assert!(buzzer.resolve(&[DataType::String]).is_none());
    }

    #[test]
    fn overloads_distinguish_list_types() {
        let catalog = Catalog::robot();
        let item = catalog.function("list.item").unwrap();
        let number = item.resolve(&[DataType::NumberList, DataType::Number]).unwrap();
        let text = item.resolve(&[DataType::StringList, DataType::Number]).unwrap();
        assert_eq!(number.ret, Some(DataType::Number));
        assert_eq!(text.ret, Some(DataType::String));
    }

    #[test]
    fn describe_lists_params_and_return() {
        let catalog = Catalog::robot();
        let random = catalog.function("math.random").unwrap();
        assert_eq!(
            random.signatures[0].describe(random.name),
            "math.random(from: number, to: number) -> number",
        );
        assert_eq!(describe_types(&[DataType::String, DataType::Number]), "(string, number)");
    }

    #[test]
    fn categories_are_separate() {
        let catalog = Catalog::robot();
        assert!(catalog.event("button").is_some());
        assert!(catalog.statement("button").is_none());
        assert!(catalog.variable("sensor.distance").is_some());
        assert!(catalog.assignment("audio.volume").is_some());
        assert!(catalog.defines("math.abs"));
        assert!(!catalog.defines("nope"));
    }

    #[test]
    fn entries_carry_descriptions() {
        let catalog = Catalog::robot();
        let entries = catalog.entries();
        let buzzer = entries.iter().find(|e| e.name == "audio.playBuzzer").unwrap();
        assert_eq!(buzzer.category, "statement");
        assert_eq!(buzzer.description, "Play a tone on the buzzer");
        assert_eq!(buzzer.signatures.len(), 2);
        let volume = entries.iter().find(|e| e.category == "property" && e.name == "audio.volume").unwrap();
        assert_eq!(volume.signatures, ["audio.volume = number"]);
        assert!(entries.iter().all(|e| !e.description.is_empty()), "every builtin is described");
    }

    #[test]
    fn every_signature_is_well_formed() {
        let catalog = Catalog::robot();
        for name in catalog.functions.keys() {
            for s in catalog.functions[name].signatures {
                assert!(s.ret.is_some(), "{name} must return a value");
            }
        }
        for name in catalog.statements.keys() {
            for s in catalog.statements[name].signatures {
                assert!(s.ret.is_none(), "{name} must not return a value");
            }
        }
        for name in catalog.events.keys() {
            for s in catalog.events[name].signatures {
                assert!(s.params.len() <= 1, "{name} takes at most one parameter");
            }
        }
    }
}
