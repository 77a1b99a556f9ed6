use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::kind::Kind;

use super::{Instruction, Register};

/// A handler of an error scope: the guest error type it catches (empty for
/// catch-all) and the index of its `On` instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Handler {
    pub kind: String,
    pub index: usize,
}

/// Location of a finally body: its `Finally{run: false}` instruction at
/// `start`, ending before `end`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinallyRange {
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

/// Handler table entry for one `try` block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorScope {
    pub try_start: usize,
    pub try_end: usize,
    pub handlers: Vec<Handler>,
    /// Index of the trailing `On{""}` that every path jumps to.
    pub exit: usize,
    pub finally: Option<FinallyRange>,
}

impl ErrorScope {
    pub fn in_try(&self, ip: usize) -> bool {
        (self.try_start..self.try_end).contains(&ip)
    }

    /// Whether `ip` lies anywhere inside the scope, handlers and finally
    /// included.
    pub fn contains(&self, ip: usize) -> bool {
        let end = self.finally.as_ref().map_or(self.exit + 1, |f| f.end);
        (self.try_start..end).contains(&ip)
    }

    pub fn handler_for(&self, error_type: &str) -> Option<&Handler> {
        self.handlers
            .iter()
            .find(|h| h.kind.is_empty() || h.kind == error_type)
    }
}

/// A function lowered to instructions. Immutable once the compiler is done
/// with it.
#[derive(Debug, Clone, Default)]
pub struct CompiledFunc {
    pub name: String,
    pub arguments: Vec<(String, Kind)>,
    pub returns: Vec<Kind>,
    pub instructions: Vec<Instruction>,
    /// Compile time symbol table.
    pub variables: HashMap<String, Kind>,
    /// Innermost scopes come first; a scope is recorded when it is finished.
    pub scopes: Vec<ErrorScope>,
    /// Set on function literals written inside a constructor.
    pub method_of: Option<String>,
    registers: u32,
    finally_blocks: usize,
}

impl CompiledFunc {
    pub fn new(name: impl Into<String>) -> Self {
        CompiledFunc { name: name.into(), ..Self::default() }
    }

    /// Constructors return exactly the object named after them.
    pub fn is_constructor(&self) -> bool {
        matches!(self.returns.as_slice(), [Kind::Named(name)] if *name == self.name)
    }

    pub fn kind(&self) -> Kind {
        Kind::func(
            self.arguments.iter().map(|(_, k)| k.clone()).collect(),
            self.returns.clone(),
        )
    }

    pub fn next_register(&mut self) -> Register {
        self.registers += 1;
        Register::Temp(self.registers)
    }

    pub fn register_count(&self) -> u32 {
        self.registers
    }

    /// Appends an instruction and returns its index.
    pub fn append(&mut self, ins: Instruction) -> usize {
        self.instructions.push(ins);
        self.instructions.len() - 1
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Points a previously emitted jump at `to`.
    pub fn patch_jump(&mut self, at: usize, to: usize) {
        match self.instructions.get_mut(at) {
            Some(Instruction::Jump { to: target }) | Some(Instruction::JumpUnless { to: target, .. }) => {
                *target = to;
            }
            _ => {}
        }
    }

    pub fn new_variable(&mut self, name: &str, kind: Kind) {
        self.variables.insert(name.to_string(), kind);
    }

    pub fn next_finally(&mut self) -> usize {
        let index = self.finally_blocks;
        self.finally_blocks += 1;
        index
    }

    pub fn finally_count(&self) -> usize {
        self.finally_blocks
    }
}

impl fmt::Display for CompiledFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} {}:", self.name, self.kind())?;
        for (i, ins) in self.instructions.iter().enumerate() {
            writeln!(f, "  {i:>4}  {ins}")?;
        }
        Ok(())
    }
}

/// Every compiled function of a unit plus the method table.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub funcs: Vec<CompiledFunc>,
    pub interfaces: crate::compiler::InterfaceTable,
}

impl Program {
    pub fn func(&self, name: &str) -> Option<&CompiledFunc> {
        self.funcs.iter().find(|f| f.name == name)
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, func) in self.funcs.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{func}")?;
        }
        Ok(())
    }
}
