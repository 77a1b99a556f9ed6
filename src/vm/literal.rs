use std::collections::BTreeMap;
use std::fmt;

use bigdecimal::BigDecimal;

use crate::ast;
use crate::kind::{Kind, Primitive};
use crate::number;

use super::RuntimeError;

/// A runtime value.
///
/// Objects are maps whose kind is the object's `Named` kind; their fields are
/// the map entries.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Bool(bool),
    Char(char),
    Number(BigDecimal),
    String(String),
    Data(Vec<u8>),
    Array { kind: Kind, elements: Vec<Literal> },
    Map { kind: Kind, entries: BTreeMap<String, Literal> },
    /// Reference to a compiled or native function. Methods carry the object
    /// they were read from.
    Func { name: String, kind: Kind, receiver: Option<Box<Literal>> },
}

type Result<T> = std::result::Result<T, RuntimeError>;

impl Literal {
    pub fn kind(&self) -> Kind {
        match self {
            Literal::Bool(_) => Kind::BOOL,
            Literal::Char(_) => Kind::CHAR,
            Literal::Number(_) => Kind::NUMBER,
            Literal::String(_) => Kind::STRING,
            Literal::Data(_) => Kind::DATA,
            Literal::Array { kind, .. } | Literal::Map { kind, .. } | Literal::Func { kind, .. } => {
                kind.clone()
            }
        }
    }

    /// Converts a primitive source literal. Returns `None` when the text does
    /// not fit the kind.
    pub fn from_ast(lit: &ast::Literal) -> Option<Literal> {
        let text = lit.value.as_str();
        Some(match lit.kind.primitive()? {
            Primitive::Bool => match text {
                "true" => Literal::Bool(true),
                "false" => Literal::Bool(false),
                _ => return None,
            },
            Primitive::Char => {
                let mut chars = text.chars();
                let c = chars.next()?;
                if chars.next().is_some() {
                    return None;
                }
                Literal::Char(c)
            }
            Primitive::Number => Literal::Number(number::parse(text)?),
            Primitive::String => Literal::String(text.to_string()),
            Primitive::Data => Literal::Data(text.as_bytes().to_vec()),
            Primitive::Any => return None,
        })
    }

    pub fn int(n: i64) -> Literal {
        Literal::Number(BigDecimal::from(n))
    }

    pub fn func(name: impl Into<String>, kind: Kind) -> Literal {
        Literal::Func { name: name.into(), kind, receiver: None }
    }

    /// Placeholder value of `kind`, used to pre-size arrays.
    pub fn zero(kind: &Kind) -> Literal {
        match kind {
            Kind::Primitive(Primitive::Bool | Primitive::Any) => Literal::Bool(false),
            Kind::Primitive(Primitive::Char) => Literal::Char('\0'),
            Kind::Primitive(Primitive::Number) => Literal::int(0),
            Kind::Primitive(Primitive::String) => Literal::String(String::new()),
            Kind::Primitive(Primitive::Data) => Literal::Data(Vec::new()),
            Kind::Array(_) => Literal::array(kind.clone(), Vec::new()),
            Kind::Map(_) | Kind::Named(_) => Literal::Map { kind: kind.clone(), entries: BTreeMap::new() },
            Kind::Func { .. } => Literal::func(String::new(), kind.clone()),
        }
    }

    pub fn string(s: impl Into<String>) -> Literal {
        Literal::String(s.into())
    }

    pub fn array(kind: Kind, elements: Vec<Literal>) -> Literal {
        Literal::Array { kind, elements }
    }

    fn wrong(&self, expected: &'static str) -> RuntimeError {
        RuntimeError::WrongKind { expected, found: self.kind() }
    }

    pub fn as_bool(&self) -> Result<bool> {
        match self {
            Literal::Bool(b) => Ok(*b),
            other => Err(other.wrong("bool")),
        }
    }

    pub fn as_number(&self) -> Result<&BigDecimal> {
        match self {
            Literal::Number(n) => Ok(n),
            other => Err(other.wrong("number")),
        }
    }

    pub fn as_str(&self) -> Result<&str> {
        match self {
            Literal::String(s) => Ok(s),
            other => Err(other.wrong("string")),
        }
    }

    pub fn as_data(&self) -> Result<&[u8]> {
        match self {
            Literal::Data(d) => Ok(d),
            other => Err(other.wrong("data")),
        }
    }

    pub fn as_elements(&self) -> Result<&[Literal]> {
        match self {
            Literal::Array { elements, .. } => Ok(elements),
            other => Err(other.wrong("array")),
        }
    }

    pub fn as_entries(&self) -> Result<&BTreeMap<String, Literal>> {
        match self {
            Literal::Map { entries, .. } => Ok(entries),
            other => Err(other.wrong("map")),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&super::render::render(self, false))
    }
}
