use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Primitive kind tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Bool,
    Char,
    Number,
    String,
    Data,
    Any,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Char => "char",
            Primitive::Number => "number",
            Primitive::String => "string",
            Primitive::Data => "data",
            Primitive::Any => "any",
        }
    }

    fn from_name(name: &str) -> Option<Primitive> {
        Some(match name {
            "bool" => Primitive::Bool,
            "char" => Primitive::Char,
            "number" => Primitive::Number,
            "string" => Primitive::String,
            "data" => Primitive::Data,
            "any" => Primitive::Any,
            _ => return None,
        })
    }
}

/// Structural type descriptor.
///
/// The textual form (`[]number`, `{}string`, `func(number) bool`, `Person`)
/// is only used at the edges: diagnostics, disassembly and the serialized
/// AST. Everything inside the compiler and VM inspects kinds through the
/// predicates on this type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Kind {
    Primitive(Primitive),
    Array(Box<Kind>),
    Map(Box<Kind>),
    Func { args: Vec<Kind>, returns: Vec<Kind> },
    /// Nominal object kind, stored at runtime as a map.
    Named(String),
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid kind '{0}'")]
pub struct KindError(pub String);

impl Kind {
    pub const BOOL: Kind = Kind::Primitive(Primitive::Bool);
    pub const CHAR: Kind = Kind::Primitive(Primitive::Char);
    pub const NUMBER: Kind = Kind::Primitive(Primitive::Number);
    pub const STRING: Kind = Kind::Primitive(Primitive::String);
    pub const DATA: Kind = Kind::Primitive(Primitive::Data);
    pub const ANY: Kind = Kind::Primitive(Primitive::Any);

    pub fn array_of(element: Kind) -> Kind {
        Kind::Array(Box::new(element))
    }

    pub fn map_of(element: Kind) -> Kind {
        Kind::Map(Box::new(element))
    }

    pub fn func(args: Vec<Kind>, returns: Vec<Kind>) -> Kind {
        Kind::Func { args, returns }
    }

    pub fn named(name: impl Into<String>) -> Kind {
        Kind::Named(name.into())
    }

    pub fn primitive(&self) -> Option<Primitive> {
        match self {
            Kind::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Kind::Array(_))
    }

    pub fn is_map(&self) -> bool {
        matches!(self, Kind::Map(_))
    }

    pub fn is_func(&self) -> bool {
        matches!(self, Kind::Func { .. })
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Kind::Named(_))
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Kind::Primitive(Primitive::Any))
    }

    /// Element kind of an array or value kind of a map.
    pub fn element(&self) -> Option<&Kind> {
        match self {
            Kind::Array(element) | Kind::Map(element) => Some(element),
            _ => None,
        }
    }

    /// Whether a value of kind `other` may be stored where `self` is expected.
    pub fn accepts(&self, other: &Kind) -> bool {
        match (self, other) {
            (Kind::Primitive(Primitive::Any), _) => true,
            (Kind::Array(a), Kind::Array(b)) | (Kind::Map(a), Kind::Map(b)) => a.accepts(b),
            _ => self == other,
        }
    }
}

/// Object fields and methods starting with an uppercase letter are public.
pub fn is_public(name: &str) -> bool {
    name.chars().next().is_some_and(char::is_uppercase)
}

fn write_list(f: &mut fmt::Formatter<'_>, kinds: &[Kind]) -> fmt::Result {
    for (i, kind) in kinds.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{kind}")?;
    }
    Ok(())
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::Primitive(p) => write!(f, "{}", p.name()),
            Kind::Array(element) => write!(f, "[]{element}"),
            Kind::Map(element) => write!(f, "{{}}{element}"),
            Kind::Func { args, returns } => {
                write!(f, "func(")?;
                write_list(f, args)?;
                write!(f, ")")?;
                match returns.as_slice() {
                    [] => Ok(()),
                    [single] => write!(f, " {single}"),
                    many => {
                        write!(f, " (")?;
                        write_list(f, many)?;
                        write!(f, ")")
                    }
                }
            }
            Kind::Named(name) => write!(f, "{name}"),
        }
    }
}

struct KindParser<'a> {
    src: &'a str,
    rest: &'a str,
}

impl<'a> KindParser<'a> {
    fn error(&self) -> KindError {
        KindError(self.src.to_string())
    }

    fn eat(&mut self, prefix: &str) -> bool {
        match self.rest.strip_prefix(prefix) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn kind(&mut self) -> Result<Kind, KindError> {
        if self.eat("[]") {
            return Ok(Kind::array_of(self.kind()?));
        }
        if self.eat("{}") {
            return Ok(Kind::map_of(self.kind()?));
        }
        if self.eat("func(") {
            let args = self.list()?;
            let returns = if self.eat(" (") {
                self.list()?
            } else if self.eat(" ") {
                vec![self.kind()?]
            } else {
                Vec::new()
            };
            return Ok(Kind::func(args, returns));
        }

        let end = self
            .rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '.'))
            .unwrap_or(self.rest.len());
        if end == 0 {
            return Err(self.error());
        }
        let (name, rest) = self.rest.split_at(end);
        self.rest = rest;
        Ok(Primitive::from_name(name).map_or_else(|| Kind::named(name), Kind::Primitive))
    }

    /// Parses `a, b)` after an opening parenthesis.
    fn list(&mut self) -> Result<Vec<Kind>, KindError> {
        let mut kinds = Vec::new();
        if self.eat(")") {
            return Ok(kinds);
        }
        loop {
            kinds.push(self.kind()?);
            if self.eat(")") {
                return Ok(kinds);
            }
            if !self.eat(", ") {
                return Err(self.error());
            }
        }
    }
}

impl FromStr for Kind {
    type Err = KindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = KindParser { src: s, rest: s };
        let kind = parser.kind()?;
        if !parser.rest.is_empty() {
            return Err(parser.error());
        }
        Ok(kind)
    }
}

impl TryFrom<String> for Kind {
    type Error = KindError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Kind> for String {
    fn from(kind: Kind) -> Self {
        kind.to_string()
    }
}
