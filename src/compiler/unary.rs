use crate::ast::{Expr, Position, UnaryOp};
use crate::kind::Kind;
use crate::vm::{CompiledFunc, Instruction, Literal, Register};

use super::{CompileError, Compiler, Result, constant};

impl Compiler<'_> {
    pub(super) fn unary(&mut self, f: &mut CompiledFunc, op: UnaryOp, expr: &Expr, pos: &Position) -> Result<(Register, Kind)> {
        let (operand, kind) = self.single(f, expr)?;
        let invalid = |found: &Kind| CompileError::InvalidUnary {
            op: symbol(op).to_string(),
            found: found.clone(),
            pos: pos.clone(),
        };

        match op {
            UnaryOp::Not => {
                if kind != Kind::BOOL {
                    return Err(invalid(&kind));
                }
                let result = f.next_register();
                f.append(Instruction::Not { left: operand, result: result.clone() });
                Ok((result, kind))
            }
            UnaryOp::Negate => {
                if kind != Kind::NUMBER {
                    return Err(invalid(&kind));
                }
                let zero = constant(f, Literal::int(0));
                let result = f.next_register();
                f.append(Instruction::Subtract { left: zero, right: operand, result: result.clone() });
                Ok((result, kind))
            }
            UnaryOp::Increment | UnaryOp::Decrement => {
                // Only variables can be stepped; the update happens in place.
                if kind != Kind::NUMBER || operand.as_var().is_none() {
                    return Err(invalid(&kind));
                }
                let one = constant(f, Literal::int(1));
                let ins = if op == UnaryOp::Increment {
                    Instruction::Add { left: operand.clone(), right: one, result: operand.clone() }
                } else {
                    Instruction::Subtract { left: operand.clone(), right: one, result: operand.clone() }
                };
                f.append(ins);
                Ok((operand, kind))
            }
        }
    }
}

fn symbol(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Not => "not",
        UnaryOp::Negate => "-",
        UnaryOp::Increment => "++",
        UnaryOp::Decrement => "--",
    }
}
