use crate::ast::{Expr, Position, Stmt};
use crate::kind::Kind;
use crate::vm::{CompiledFunc, Instruction, Literal, Register, Source};

use super::{CompileError, Compiler, Result, constant, declare};

impl Compiler<'_> {
    fn condition(&mut self, f: &mut CompiledFunc, condition: &Expr) -> Result<Register> {
        let (register, kind) = self.single(f, condition)?;
        if kind != Kind::BOOL {
            return Err(CompileError::Condition { found: kind, pos: condition.pos() });
        }
        Ok(register)
    }

    pub(super) fn if_stmt(&mut self, f: &mut CompiledFunc, condition: &Expr, then: &[Stmt], otherwise: &[Stmt]) -> Result<()> {
        let condition = self.condition(f, condition)?;
        let skip_then = f.append(Instruction::JumpUnless { condition, to: 0 });
        self.block(f, then)?;

        if otherwise.is_empty() {
            f.patch_jump(skip_then, f.len());
            return Ok(());
        }
        let skip_else = f.append(Instruction::Jump { to: 0 });
        f.patch_jump(skip_then, f.len());
        self.block(f, otherwise)?;
        f.patch_jump(skip_else, f.len());
        Ok(())
    }

    pub(super) fn for_stmt(
        &mut self,
        f: &mut CompiledFunc,
        init: Option<&Stmt>,
        condition: Option<&Expr>,
        next: Option<&Stmt>,
        statements: &[Stmt],
    ) -> Result<()> {
        if let Some(init) = init {
            self.statement(f, init)?;
        }

        let start = f.len();
        let exit = match condition {
            Some(condition) => {
                let condition = self.condition(f, condition)?;
                Some(f.append(Instruction::JumpUnless { condition, to: 0 }))
            }
            None => None,
        };
        self.block(f, statements)?;
        if let Some(next) = next {
            self.statement(f, next)?;
        }
        f.append(Instruction::Jump { to: start });

        if let Some(exit) = exit {
            f.patch_jump(exit, f.len());
        }
        Ok(())
    }

    /// `for key, value in expr`. Arrays yield their indexes as keys, maps
    /// their keys in sorted order.
    pub(super) fn for_in(
        &mut self,
        f: &mut CompiledFunc,
        key: Option<&str>,
        value: &str,
        expr: &Expr,
        statements: &[Stmt],
        pos: &Position,
    ) -> Result<()> {
        let (container, kind) = self.single(f, expr)?;
        let (element, key_kind) = match &kind {
            Kind::Array(element) => (element.as_ref().clone(), Kind::NUMBER),
            Kind::Map(element) => (element.as_ref().clone(), Kind::STRING),
            _ => return Err(CompileError::NotIterable { found: kind, pos: pos.clone() }),
        };
        declare(f, value, element, pos)?;
        if let Some(key) = key {
            declare(f, key, key_kind, pos)?;
        }

        // Maps are walked through their sorted key list.
        let keys = if kind.is_map() {
            let keys = f.next_register();
            f.append(Instruction::Props { object: container.clone(), result: keys.clone() });
            Some(keys)
        } else {
            None
        };
        let sequence = keys.clone().unwrap_or_else(|| container.clone());

        let cursor = constant(f, Literal::int(0));
        let one = constant(f, Literal::int(1));
        let len = f.next_register();
        f.append(Instruction::Len { argument: sequence.clone(), result: len.clone() });

        let start = f.len();
        let more = f.next_register();
        f.append(Instruction::LessThanNumber { left: cursor.clone(), right: len, result: more.clone() });
        let exit = f.append(Instruction::JumpUnless { condition: more, to: 0 });

        let value_register = Register::var(value);
        let key_source = match &keys {
            Some(keys) => {
                let current = f.next_register();
                f.append(Instruction::ArrayGet { array: keys.clone(), index: cursor.clone(), result: current.clone() });
                f.append(Instruction::MapGet { map: container, key: current.clone(), result: value_register });
                current
            }
            None => {
                f.append(Instruction::ArrayGet { array: container, index: cursor.clone(), result: value_register });
                cursor.clone()
            }
        };
        if let Some(key) = key {
            f.append(Instruction::Assign { variable: Register::var(key), source: Source::Register(key_source) });
        }

        self.block(f, statements)?;
        f.append(Instruction::Add { left: cursor.clone(), right: one, result: cursor });
        f.append(Instruction::Jump { to: start });
        f.patch_jump(exit, f.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{BinaryOp, Expr, Position, Stmt, UnaryOp};
    use crate::compiler::testing::*;
    use crate::kind::Kind;
    use crate::vm::Instruction;

    #[test]
    fn if_else_layout() {
        let f = compile(vec![Stmt::If {
            condition: Expr::boolean(true),
            then: vec![Stmt::call("print", vec![])],
            otherwise: vec![Stmt::call("print", vec![]), Stmt::call("print", vec![])],
        }])
        .unwrap();
        assert_eq!(
            f.instructions,
            vec![
                assign_const(t(1), crate::vm::Literal::Bool(true)),
                Instruction::JumpUnless { condition: t(1), to: 4 },
                Instruction::Print { arguments: vec![] },
                Instruction::Jump { to: 6 },
                Instruction::Print { arguments: vec![] },
                Instruction::Print { arguments: vec![] },
            ]
        );
    }

    #[test]
    fn if_condition_must_be_bool() {
        let err = compile(vec![Stmt::If { condition: Expr::number("1"), then: vec![], otherwise: vec![] }]).unwrap_err();
        assert_eq!(err.to_string(), "condition must be bool, got number");
    }

    #[test]
    fn counting_loop() {
        // for i = 0; i < 3; i++ { print(i) }
        let f = compile(vec![Stmt::For {
            init: Some(Box::new(Stmt::assign("i", Expr::number("0")))),
            condition: Some(Expr::binary(Expr::ident("i"), BinaryOp::LessThan, Expr::number("3"))),
            next: Some(Box::new(Stmt::Expr(Expr::unary(UnaryOp::Increment, Expr::ident("i"))))),
            statements: vec![Stmt::call("print", vec![Expr::ident("i")])],
        }])
        .unwrap();
        assert_eq!(
            f.instructions,
            vec![
                assign_const(t(1), num("0")),
                assign_reg(v("i"), t(1)),
                assign_const(t(2), num("3")),
                Instruction::LessThanNumber { left: v("i"), right: t(2), result: t(3) },
                Instruction::JumpUnless { condition: t(3), to: 9 },
                Instruction::Print { arguments: vec![v("i")] },
                assign_const(t(4), num("1")),
                Instruction::Add { left: v("i"), right: t(4), result: v("i") },
                Instruction::Jump { to: 2 },
            ]
        );
    }

    #[test]
    fn infinite_loop_has_no_exit_test() {
        let f = compile(vec![Stmt::For { init: None, condition: None, next: None, statements: vec![] }]).unwrap();
        assert_eq!(f.instructions, vec![Instruction::Jump { to: 0 }]);
    }

    #[test]
    fn for_in_array_binds_value_and_index() {
        let f = compile(vec![
            Stmt::assign("xs", Expr::Array { kind: None, elements: vec![Expr::string("a")], pos: Position::default() }),
            Stmt::ForIn {
                key: Some("i".into()),
                value: "x".into(),
                expr: Expr::ident("xs"),
                statements: vec![],
                pos: Position::default(),
            },
        ])
        .unwrap();
        assert_eq!(f.variables.get("x"), Some(&Kind::STRING));
        assert_eq!(f.variables.get("i"), Some(&Kind::NUMBER));
        assert!(f.instructions.contains(&Instruction::ArrayGet { array: v("xs"), index: t(5), result: v("x") }));
    }

    #[test]
    fn for_in_map_walks_sorted_keys() {
        let f = compile(vec![
            Stmt::assign(
                "m",
                Expr::Map { kind: Some(Kind::map_of(Kind::BOOL)), entries: vec![], pos: Position::default() },
            ),
            Stmt::ForIn { key: Some("k".into()), value: "b".into(), expr: Expr::ident("m"), statements: vec![], pos: Position::default() },
        ])
        .unwrap();
        assert_eq!(f.instructions[3], Instruction::Props { object: v("m"), result: t(3) });
        assert_eq!(f.variables.get("k"), Some(&Kind::STRING));
        assert_eq!(f.variables.get("b"), Some(&Kind::BOOL));
    }

    #[test]
    fn cannot_iterate_numbers() {
        let err = compile(vec![Stmt::ForIn {
            key: None,
            value: "x".into(),
            expr: Expr::number("3"),
            statements: vec![],
            pos: Position::default(),
        }])
        .unwrap_err();
        assert_eq!(err.to_string(), "cannot iterate over number");
    }

    #[test]
    fn for_in_keeps_variable_kinds() {
        let err = compile(vec![
            Stmt::assign("x", Expr::number("1")),
            Stmt::ForIn {
                key: None,
                value: "x".into(),
                expr: Expr::Array { kind: None, elements: vec![Expr::string("a")], pos: Position::default() },
                statements: vec![],
                pos: Position::new("a.ok:2:1"),
            },
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "a.ok:2:1 cannot assign string to variable x (expecting number)");

        let err = compile(vec![
            Stmt::assign("k", Expr::number("1")),
            Stmt::ForIn {
                key: Some("k".into()),
                value: "v".into(),
                expr: Expr::Map { kind: Some(Kind::map_of(Kind::BOOL)), entries: vec![], pos: Position::default() },
                statements: vec![],
                pos: Position::default(),
            },
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "cannot assign string to variable k (expecting number)");
    }
}
