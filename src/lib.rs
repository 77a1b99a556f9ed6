//! Register compiler and virtual machine for the `ok` scripting language.
//!
//! A parsed unit ([`ast::File`]) is lowered by [`compiler::Compiler`] into a
//! [`vm::Program`] of register instructions, which [`vm::Vm`] executes.

pub mod ast;
pub mod compiler;
pub mod diagnostic;
pub mod kind;
pub mod number;
pub mod vm;
