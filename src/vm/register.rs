use std::fmt;

/// A slot in a call frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Register {
    /// Compiler-minted temporary. Numbering starts at 1 and is never reused
    /// inside one function.
    Temp(u32),
    /// The stable register of a source identifier.
    Var(String),
    /// The instance under construction in an object constructor.
    State,
}

impl Register {
    pub fn var(name: impl Into<String>) -> Register {
        Register::Var(name.into())
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Register::Var(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Register::Temp(n) => write!(f, "%{n}"),
            Register::Var(name) => f.write_str(name),
            Register::State => f.write_str("^"),
        }
    }
}

/// Comma separated register list for disassembly.
pub(crate) struct Registers<'a>(pub &'a [Register]);

impl fmt::Display for Registers<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, r) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{r}")?;
        }
        Ok(())
    }
}
