use crate::ast::{BinaryOp, Expr, Position};
use crate::kind::{Kind, Primitive};
use crate::vm::{CompiledFunc, Instruction, Register, Source};

use super::{CompileError, Compiler, Result, describe};

/// Resolves `left op right` to an opcode and its result kind.
pub(super) fn binary_instruction(
    left_kind: &Kind,
    op: BinaryOp,
    right_kind: &Kind,
    left: Register,
    right: Register,
    result: Register,
) -> Option<(Instruction, Kind)> {
    use BinaryOp::*;
    use Primitive::{Bool, Char, Data, Number};
    use Primitive::String as Str;

    let (l, r) = (left_kind.primitive()?, right_kind.primitive()?);
    if l != r {
        return None;
    }
    Some(match (l, op) {
        (Data, Add) => (Instruction::Combine { left, right, result }, Kind::DATA),
        (Number, Add) => (Instruction::Add { left, right, result }, Kind::NUMBER),
        (Number, Subtract) => (Instruction::Subtract { left, right, result }, Kind::NUMBER),
        (Number, Multiply) => (Instruction::Multiply { left, right, result }, Kind::NUMBER),
        (Number, Divide) => (Instruction::Divide { left, right, result }, Kind::NUMBER),
        (Number, Remainder) => (Instruction::Remainder { left, right, result }, Kind::NUMBER),
        (Str, Add) => (Instruction::Concat { left, right, result }, Kind::STRING),

        (Bool, And) => (Instruction::And { left, right, result }, Kind::BOOL),
        (Bool, Or) => (Instruction::Or { left, right, result }, Kind::BOOL),

        (Bool | Char | Data | Str, Equal) => (Instruction::Equal { left, right, result }, Kind::BOOL),
        (Bool | Char | Data | Str, NotEqual) => (Instruction::NotEqual { left, right, result }, Kind::BOOL),
        (Number, Equal) => (Instruction::EqualNumber { left, right, result }, Kind::BOOL),
        (Number, NotEqual) => (Instruction::NotEqualNumber { left, right, result }, Kind::BOOL),

        (Number, GreaterThan) => (Instruction::GreaterThanNumber { left, right, result }, Kind::BOOL),
        (Str, GreaterThan) => (Instruction::GreaterThanString { left, right, result }, Kind::BOOL),
        (Number, LessThan) => (Instruction::LessThanNumber { left, right, result }, Kind::BOOL),
        (Str, LessThan) => (Instruction::LessThanString { left, right, result }, Kind::BOOL),
        (Number, GreaterThanEqual) => (Instruction::GreaterThanEqualNumber { left, right, result }, Kind::BOOL),
        (Str, GreaterThanEqual) => (Instruction::GreaterThanEqualString { left, right, result }, Kind::BOOL),
        (Number, LessThanEqual) => (Instruction::LessThanEqualNumber { left, right, result }, Kind::BOOL),
        (Str, LessThanEqual) => (Instruction::LessThanEqualString { left, right, result }, Kind::BOOL),

        _ => return None,
    })
}

impl Compiler<'_> {
    pub(super) fn binary(
        &mut self,
        f: &mut CompiledFunc,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        pos: &Position,
    ) -> Result<(Register, Kind)> {
        if let Some(base) = op.compound_base() {
            return self.compound(f, left, op, base, right, pos);
        }

        let (l, left_kind) = self.single(f, left)?;
        let (r, right_kind) = self.single(f, right)?;
        let result = f.next_register();
        let (ins, kind) = binary_instruction(&left_kind, op, &right_kind, l, r, result.clone()).ok_or_else(|| {
            CompileError::InvalidOperation { left: left_kind.clone(), op: op.to_string(), right: right_kind.clone(), pos: pos.clone() }
        })?;
        f.append(ins);
        Ok((result, kind))
    }

    /// `target op= value` for a variable or an indexed element.
    ///
    /// The right hand side must have exactly the target's kind; the plain
    /// operator then writes into a fresh register which is stored back.
    fn compound(
        &mut self,
        f: &mut CompiledFunc,
        target: &Expr,
        op: BinaryOp,
        base: BinaryOp,
        value: &Expr,
        pos: &Position,
    ) -> Result<(Register, Kind)> {
        let (right, right_kind) = self.single(f, value)?;

        match target {
            Expr::Identifier { name, pos: _ } => {
                let expected = f
                    .variables
                    .get(name)
                    .cloned()
                    .ok_or_else(|| CompileError::UndefinedVariable { name: name.clone(), pos: pos.clone() })?;
                if expected != right_kind {
                    return Err(CompileError::AssignKind {
                        name: name.clone(),
                        found: right_kind,
                        expected,
                        pos: pos.clone(),
                    });
                }
                let variable = Register::var(name.clone());
                let result = f.next_register();
                let (ins, _) = binary_instruction(&expected, base, &right_kind, variable.clone(), right, result.clone())
                    .ok_or_else(|| CompileError::InvalidOperation {
                        left: expected.clone(),
                        op: op.to_string(),
                        right: right_kind.clone(),
                        pos: pos.clone(),
                    })?;
                f.append(ins);
                f.append(Instruction::Assign { variable: variable.clone(), source: Source::Register(result) });
                Ok((variable, expected))
            }
            Expr::Key { expr, key, pos: _ } => {
                let element = self.element(f, expr, key, pos)?;
                if element.element_kind != right_kind {
                    return Err(CompileError::ElementKind {
                        container: element.container_kind,
                        found: right_kind,
                        expected: element.element_kind,
                        pos: pos.clone(),
                    });
                }
                let current = f.next_register();
                f.append(element.getter(current.clone()));
                let result = f.next_register();
                let (ins, _) = binary_instruction(&element.element_kind, base, &right_kind, current, right, result.clone())
                    .ok_or_else(|| CompileError::InvalidOperation {
                        left: element.element_kind.clone(),
                        op: op.to_string(),
                        right: right_kind.clone(),
                        pos: pos.clone(),
                    })?;
                f.append(ins);
                f.append(element.setter(result.clone()));
                Ok((result, element.element_kind))
            }
            other => Err(CompileError::NotAssignable { target: describe(other), pos: pos.clone() }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Stmt;
    use crate::compiler::testing::*;
    use crate::vm::Literal;

    fn resolve(left: &str, op: BinaryOp, right: &str) -> Option<(Instruction, Kind)> {
        binary_instruction(&left.parse().unwrap(), op, &right.parse().unwrap(), t(1), t(2), t(3))
    }

    #[test]
    fn table() {
        let cases = [
            ("number", BinaryOp::Add, "number", Instruction::Add { left: t(1), right: t(2), result: t(3) }, "number"),
            ("string", BinaryOp::Add, "string", Instruction::Concat { left: t(1), right: t(2), result: t(3) }, "string"),
            ("data", BinaryOp::Add, "data", Instruction::Combine { left: t(1), right: t(2), result: t(3) }, "data"),
            ("number", BinaryOp::Equal, "number", Instruction::EqualNumber { left: t(1), right: t(2), result: t(3) }, "bool"),
            ("char", BinaryOp::NotEqual, "char", Instruction::NotEqual { left: t(1), right: t(2), result: t(3) }, "bool"),
            ("string", BinaryOp::LessThanEqual, "string", Instruction::LessThanEqualString { left: t(1), right: t(2), result: t(3) }, "bool"),
            ("bool", BinaryOp::Or, "bool", Instruction::Or { left: t(1), right: t(2), result: t(3) }, "bool"),
            ("number", BinaryOp::Remainder, "number", Instruction::Remainder { left: t(1), right: t(2), result: t(3) }, "number"),
        ];
        for (l, op, r, ins, kind) in cases {
            assert_eq!(resolve(l, op, r), Some((ins, kind.parse().unwrap())), "{l} {op} {r}");
        }
    }

    #[test]
    fn unresolved_combinations() {
        assert_eq!(resolve("number", BinaryOp::Add, "string"), None);
        assert_eq!(resolve("bool", BinaryOp::Add, "bool"), None);
        assert_eq!(resolve("char", BinaryOp::LessThan, "char"), None);
        assert_eq!(resolve("[]number", BinaryOp::Equal, "[]number"), None);
    }

    #[test]
    fn binary_expression() {
        let f = compile(vec![Stmt::Expr(Expr::binary(Expr::number("1"), BinaryOp::Add, Expr::number("2")))]).unwrap();
        assert_eq!(
            f.instructions,
            vec![
                assign_const(t(1), num("1")),
                assign_const(t(2), num("2")),
                Instruction::Add { left: t(1), right: t(2), result: t(3) },
            ]
        );
    }

    #[test]
    fn invalid_operation_reports_kinds() {
        let err = compile(vec![Stmt::Expr(Expr::Binary {
            left: Box::new(Expr::number("1")),
            op: BinaryOp::Add,
            right: Box::new(Expr::string("a")),
            pos: Position::new("main.ok:4:7"),
        })])
        .unwrap_err();
        assert_eq!(err.to_string(), "main.ok:4:7 cannot perform number + string");
    }

    #[test]
    fn compound_string_concat() {
        let f = compile(vec![
            Stmt::assign("x", Expr::string("a")),
            Stmt::Expr(Expr::binary(Expr::ident("x"), BinaryOp::AddAssign, Expr::string("b"))),
        ])
        .unwrap();
        assert_eq!(
            &f.instructions[2..],
            &[
                assign_const(t(2), Literal::string("b")),
                Instruction::Concat { left: v("x"), right: t(2), result: t(3) },
                assign_reg(v("x"), t(3)),
            ]
        );
        assert_eq!(f.variables.get("x"), Some(&Kind::STRING));
    }

    #[test]
    fn compound_kind_mismatch_is_rejected() {
        let err = compile(vec![
            Stmt::assign("x", Expr::number("1")),
            Stmt::Expr(Expr::binary(Expr::ident("x"), BinaryOp::AddAssign, Expr::string("b"))),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "cannot assign string to variable x (expecting number)");
    }

    #[test]
    fn compound_on_unsupported_kind() {
        let err = compile(vec![
            Stmt::assign("x", Expr::boolean(true)),
            Stmt::Expr(Expr::binary(Expr::ident("x"), BinaryOp::SubtractAssign, Expr::boolean(false))),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "cannot perform bool -= bool");
    }

    #[test]
    fn compound_on_element() {
        let f = compile(vec![
            Stmt::assign("xs", Expr::Array { kind: None, elements: vec![Expr::number("1")], pos: Position::default() }),
            Stmt::Expr(Expr::binary(
                Expr::key(Expr::ident("xs"), Expr::number("0")),
                BinaryOp::MultiplyAssign,
                Expr::number("3"),
            )),
        ])
        .unwrap();
        // xs = [1] takes the first six instructions.
        assert_eq!(
            &f.instructions[6..],
            &[
                assign_const(t(5), num("3")),
                assign_const(t(6), num("0")),
                Instruction::ArrayGet { array: v("xs"), index: t(6), result: t(7) },
                Instruction::Multiply { left: t(7), right: t(5), result: t(8) },
                Instruction::ArraySet { array: v("xs"), index: t(6), value: t(8) },
            ]
        );
    }

    #[test]
    fn compound_on_literal_is_not_assignable() {
        let err = compile(vec![Stmt::Expr(Expr::binary(Expr::number("1"), BinaryOp::AddAssign, Expr::number("2")))])
            .unwrap_err();
        assert_eq!(err.to_string(), "cannot assign to number literal");
    }
}
