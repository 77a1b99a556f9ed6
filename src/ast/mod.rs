use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::kind::Kind;

// ---- Positions ----

/// Source position as rendered by the parser, e.g. `main.ok:3:5`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Position(pub String);

impl Position {
    pub fn new(pos: impl Into<String>) -> Self {
        Position(pos.into())
    }

    pub fn is_unknown(&self) -> bool {
        self.0.is_empty()
    }

    /// `"<pos> "` for known positions, empty otherwise. Used to prefix messages.
    pub fn prefix(&self) -> String {
        if self.is_unknown() { String::new() } else { format!("{} ", self.0) }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---- Core AST types ----

/// A parameter: `name kind`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub kind: Kind,
}

/// A function, method, object constructor or anonymous function literal.
///
/// A function whose only return kind is its own name is an object
/// constructor: its variables become the fields of the returned instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Func {
    pub name: String,
    #[serde(default)]
    pub params: Vec<Param>,
    #[serde(default)]
    pub returns: Vec<Kind>,
    #[serde(default)]
    pub statements: Vec<Stmt>,
    #[serde(default, skip_serializing_if = "Position::is_unknown")]
    pub pos: Position,
}

impl Func {
    pub fn new(name: impl Into<String>, statements: Vec<Stmt>) -> Self {
        Func { name: name.into(), statements, ..Func::default() }
    }

    pub fn kind(&self) -> Kind {
        Kind::func(
            self.params.iter().map(|p| p.kind.clone()).collect(),
            self.returns.clone(),
        )
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self.returns.as_slice(), [Kind::Named(name)] if *name == self.name)
    }
}

/// A whole compilation unit as produced by the parser.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct File {
    pub funcs: Vec<Func>,
    /// Kind name → method name → method signature.
    #[serde(default)]
    pub interfaces: BTreeMap<String, BTreeMap<String, Kind>>,
}

/// Statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    /// `a, b[i] = x, y`
    Assign {
        targets: Vec<Expr>,
        values: Vec<Expr>,
        #[serde(default, skip_serializing_if = "Position::is_unknown")]
        pos: Position,
    },

    /// Expression evaluated for its effect (calls, `i++`, `x += 1`)
    Expr(Expr),

    /// `if cond { then } else { otherwise }`
    If {
        condition: Expr,
        then: Vec<Stmt>,
        #[serde(default)]
        otherwise: Vec<Stmt>,
    },

    /// `for init; condition; next { statements }`, each part optional
    For {
        #[serde(default)]
        init: Option<Box<Stmt>>,
        #[serde(default)]
        condition: Option<Expr>,
        #[serde(default)]
        next: Option<Box<Stmt>>,
        #[serde(default)]
        statements: Vec<Stmt>,
    },

    /// `for key, value in expr { statements }`
    ForIn {
        #[serde(default)]
        key: Option<String>,
        value: String,
        expr: Expr,
        #[serde(default)]
        statements: Vec<Stmt>,
        #[serde(default, skip_serializing_if = "Position::is_unknown")]
        pos: Position,
    },

    /// `try { statements } on Type { ... } finally { ... }`
    ErrorScope {
        #[serde(default)]
        statements: Vec<Stmt>,
        #[serde(default)]
        on: Vec<On>,
        #[serde(default)]
        finally: Option<Vec<Stmt>>,
    },

    /// `return a, b`
    Return {
        #[serde(default)]
        values: Vec<Expr>,
        #[serde(default, skip_serializing_if = "Position::is_unknown")]
        pos: Position,
    },

    /// `raise SomeError("...")`
    Raise {
        value: Expr,
        #[serde(default, skip_serializing_if = "Position::is_unknown")]
        pos: Position,
    },
}

/// An error handler of an error scope. An empty `kind` catches everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct On {
    pub kind: String,
    #[serde(default)]
    pub statements: Vec<Stmt>,
    #[serde(default, skip_serializing_if = "Position::is_unknown")]
    pub pos: Position,
}

/// Primitive literal as written in source: kind plus textual payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub kind: Kind,
    pub value: String,
    #[serde(default, skip_serializing_if = "Position::is_unknown")]
    pub pos: Position,
}

/// Expressions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal),

    /// `[]number [1, 2]`; the kind may be omitted when elements exist
    Array {
        #[serde(default)]
        kind: Option<Kind>,
        elements: Vec<Expr>,
        #[serde(default, skip_serializing_if = "Position::is_unknown")]
        pos: Position,
    },

    /// `{}number {"a": 1}`
    Map {
        #[serde(default)]
        kind: Option<Kind>,
        entries: Vec<(String, Expr)>,
        #[serde(default, skip_serializing_if = "Position::is_unknown")]
        pos: Position,
    },

    /// Variable or function reference
    Identifier {
        name: String,
        #[serde(default, skip_serializing_if = "Position::is_unknown")]
        pos: Position,
    },

    Binary {
        left: Box<Expr>,
        op: BinaryOp,
        right: Box<Expr>,
        #[serde(default, skip_serializing_if = "Position::is_unknown")]
        pos: Position,
    },

    Unary {
        op: UnaryOp,
        expr: Box<Expr>,
        #[serde(default, skip_serializing_if = "Position::is_unknown")]
        pos: Position,
    },

    /// `name(args)`, `receiver.method(args)` or `pkg.func(args)`
    Call {
        function: String,
        #[serde(default)]
        arguments: Vec<Expr>,
        #[serde(default, skip_serializing_if = "Position::is_unknown")]
        pos: Position,
    },

    /// `expr[key]`
    Key {
        expr: Box<Expr>,
        key: Box<Expr>,
        #[serde(default, skip_serializing_if = "Position::is_unknown")]
        pos: Position,
    },

    /// Anonymous function literal
    Func(Func),

    /// `"a {b} c"`: string fragments and embedded expressions in order
    Interpolate {
        parts: Vec<Expr>,
        #[serde(default, skip_serializing_if = "Position::is_unknown")]
        pos: Position,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "*")]
    Multiply,
    #[serde(rename = "/")]
    Divide,
    #[serde(rename = "%")]
    Remainder,
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = ">=")]
    GreaterThanEqual,
    #[serde(rename = "<=")]
    LessThanEqual,
    #[serde(rename = "+=")]
    AddAssign,
    #[serde(rename = "-=")]
    SubtractAssign,
    #[serde(rename = "*=")]
    MultiplyAssign,
    #[serde(rename = "/=")]
    DivideAssign,
    #[serde(rename = "%=")]
    RemainderAssign,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::Remainder => "%",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::LessThan => "<",
            BinaryOp::GreaterThanEqual => ">=",
            BinaryOp::LessThanEqual => "<=",
            BinaryOp::AddAssign => "+=",
            BinaryOp::SubtractAssign => "-=",
            BinaryOp::MultiplyAssign => "*=",
            BinaryOp::DivideAssign => "/=",
            BinaryOp::RemainderAssign => "%=",
        }
    }

    /// The plain operator behind a compound assignment.
    pub fn compound_base(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::AddAssign => Some(BinaryOp::Add),
            BinaryOp::SubtractAssign => Some(BinaryOp::Subtract),
            BinaryOp::MultiplyAssign => Some(BinaryOp::Multiply),
            BinaryOp::DivideAssign => Some(BinaryOp::Divide),
            BinaryOp::RemainderAssign => Some(BinaryOp::Remainder),
            _ => None,
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    #[serde(rename = "not")]
    Not,
    #[serde(rename = "-")]
    Negate,
    #[serde(rename = "++")]
    Increment,
    #[serde(rename = "--")]
    Decrement,
}

// ---- Construction helpers for hosts and tests ----

impl Expr {
    pub fn literal(kind: Kind, value: impl Into<String>) -> Expr {
        Expr::Literal(Literal { kind, value: value.into(), pos: Position::default() })
    }

    pub fn number(value: &str) -> Expr {
        Expr::literal(Kind::NUMBER, value)
    }

    pub fn string(value: &str) -> Expr {
        Expr::literal(Kind::STRING, value)
    }

    pub fn boolean(value: bool) -> Expr {
        Expr::literal(Kind::BOOL, value.to_string())
    }

    pub fn char(value: char) -> Expr {
        Expr::literal(Kind::CHAR, value.to_string())
    }

    pub fn ident(name: &str) -> Expr {
        Expr::Identifier { name: name.to_string(), pos: Position::default() }
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        Expr::Binary { left: Box::new(left), op, right: Box::new(right), pos: Position::default() }
    }

    pub fn unary(op: UnaryOp, expr: Expr) -> Expr {
        Expr::Unary { op, expr: Box::new(expr), pos: Position::default() }
    }

    pub fn call(function: &str, arguments: Vec<Expr>) -> Expr {
        Expr::Call { function: function.to_string(), arguments, pos: Position::default() }
    }

    pub fn key(expr: Expr, key: Expr) -> Expr {
        Expr::Key { expr: Box::new(expr), key: Box::new(key), pos: Position::default() }
    }

    pub fn pos(&self) -> Position {
        match self {
            Expr::Array { pos, .. }
            | Expr::Map { pos, .. }
            | Expr::Identifier { pos, .. }
            | Expr::Binary { pos, .. }
            | Expr::Unary { pos, .. }
            | Expr::Call { pos, .. }
            | Expr::Key { pos, .. }
            | Expr::Interpolate { pos, .. } => pos.clone(),
            Expr::Func(func) => func.pos.clone(),
            Expr::Literal(lit) => lit.pos.clone(),
        }
    }
}

impl Stmt {
    pub fn assign(name: &str, value: Expr) -> Stmt {
        Stmt::Assign { targets: vec![Expr::ident(name)], values: vec![value], pos: Position::default() }
    }

    pub fn call(function: &str, arguments: Vec<Expr>) -> Stmt {
        Stmt::Expr(Expr::call(function, arguments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn position_prefix() {
        assert_eq!(Position::default().prefix(), "");
        assert_eq!(Position::new("a.ok:1:2").prefix(), "a.ok:1:2 ");
    }

    #[test]
    fn constructor_detection() {
        let mut func = Func::new("Person", vec![]);
        assert!(!func.is_constructor());
        func.returns = vec![Kind::named("Person")];
        assert!(func.is_constructor());
        func.returns = vec![Kind::named("Other")];
        assert!(!func.is_constructor());
    }

    #[test]
    fn func_kind_from_signature() {
        let func = Func {
            name: "add".to_string(),
            params: vec![
                Param { name: "a".to_string(), kind: Kind::NUMBER },
                Param { name: "b".to_string(), kind: Kind::NUMBER },
            ],
            returns: vec![Kind::NUMBER],
            ..Func::default()
        };
        assert_eq!(func.kind().to_string(), "func(number, number) number");
    }

    #[test]
    fn compound_operators_map_to_base() {
        assert_eq!(BinaryOp::AddAssign.compound_base(), Some(BinaryOp::Add));
        assert_eq!(BinaryOp::RemainderAssign.compound_base(), Some(BinaryOp::Remainder));
        assert_eq!(BinaryOp::Add.compound_base(), None);
    }

    #[test]
    fn position_not_serialized_when_unknown() {
        let json = serde_json::to_string(&Expr::ident("x")).unwrap();
        assert!(!json.contains("pos"));
    }

    #[test]
    fn file_json_round_trip() {
        let json = r#"{
            "funcs": [{
                "name": "main",
                "statements": [
                    {"Assign": {"targets": [{"Identifier": {"name": "a"}}],
                                "values": [{"Literal": {"kind": "number", "value": "1"}}]}},
                    {"Expr": {"Binary": {"left": {"Identifier": {"name": "a"}}, "op": "+=",
                              "right": {"Literal": {"kind": "number", "value": "2"}},
                              "pos": "main.ok:2:3"}}}
                ]
            }]
        }"#;
        let file: File = serde_json::from_str(json).unwrap();
        assert_eq!(file.funcs.len(), 1);
        let main = &file.funcs[0];
        assert_eq!(main.statements[0], Stmt::assign("a", Expr::number("1")));
        match &main.statements[1] {
            Stmt::Expr(Expr::Binary { op, pos, .. }) => {
                assert_eq!(*op, BinaryOp::AddAssign);
                assert_eq!(pos.0, "main.ok:2:3");
            }
            other => panic!("unexpected statement {other:?}"),
        }
        let back: File = serde_json::from_str(&serde_json::to_string(&file).unwrap()).unwrap();
        assert_eq!(back, file);
    }
}
