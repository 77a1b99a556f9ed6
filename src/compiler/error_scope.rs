use crate::ast::{On, Stmt};
use crate::kind::Kind;
use crate::vm::{CompiledFunc, ErrorScope, FinallyRange, Handler, Instruction};

use super::{CompileError, Compiler, Result};

impl Compiler<'_> {
    /// Lays out `try`/`on`/`finally` as
    ///
    /// ```text
    /// Finally{i, run: true}      only with a finally block
    /// <try statements>
    /// Jump exit
    /// On{T} <handler> Jump exit  for each handler
    /// exit: On{""}
    /// Finally{i, run: false}     only with a finally block
    /// <finally statements>
    /// ```
    ///
    /// and records the same layout in the function's scope table.
    pub(super) fn error_scope(
        &mut self,
        f: &mut CompiledFunc,
        statements: &[Stmt],
        on: &[On],
        finally: Option<&[Stmt]>,
    ) -> Result<()> {
        let finally_index = finally.map(|_| f.next_finally());
        if let Some(index) = finally_index {
            f.append(Instruction::Finally { index, run: true });
        }

        let try_start = f.len();
        self.block(f, statements)?;
        let try_end = f.len();
        let mut exits = vec![f.append(Instruction::Jump { to: 0 })];

        let mut handlers = Vec::new();
        for handler in on {
            let index = f.append(Instruction::On { kind: handler.kind.clone() });
            handlers.push(Handler { kind: handler.kind.clone(), index });

            // The handler writes the error into the `err` register, so an
            // existing `err` must already have the handler's kind.
            let err_kind = if handler.kind.is_empty() { Kind::ANY } else { Kind::named(handler.kind.clone()) };
            let existing = f.variables.get("err").cloned();
            if let Some(expected) = &existing {
                if *expected != err_kind {
                    return Err(CompileError::AssignKind {
                        name: "err".to_string(),
                        found: err_kind,
                        expected: expected.clone(),
                        pos: handler.pos.clone(),
                    });
                }
            }
            f.new_variable("err", err_kind);
            self.block(f, &handler.statements)?;
            if existing.is_none() {
                f.variables.remove("err");
            }

            exits.push(f.append(Instruction::Jump { to: 0 }));
        }

        let exit = f.append(Instruction::On { kind: String::new() });
        for at in exits {
            f.patch_jump(at, exit);
        }

        let finally = match (finally_index, finally) {
            (Some(index), Some(statements)) => {
                let start = f.append(Instruction::Finally { index, run: false });
                self.block(f, statements)?;
                Some(FinallyRange { index, start, end: f.len() })
            }
            _ => None,
        };

        f.scopes.push(ErrorScope { try_start, try_end, handlers, exit, finally });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::ast::{Expr, On, Position, Stmt};
    use crate::compiler::testing::*;
    use crate::vm::{ErrorScope, FinallyRange, Handler, Instruction};

    fn scope(statements: Vec<Stmt>, on: Vec<On>, finally: Option<Vec<Stmt>>) -> Stmt {
        Stmt::ErrorScope { statements, on, finally }
    }

    fn on(kind: &str, statements: Vec<Stmt>) -> On {
        On { kind: kind.to_string(), statements, pos: Position::default() }
    }

    fn print() -> Stmt {
        Stmt::call("print", vec![])
    }

    fn exit_label() -> Instruction {
        Instruction::On { kind: String::new() }
    }

    #[test]
    fn only_empty_try() {
        let f = compile(vec![scope(vec![], vec![], None)]).unwrap();
        assert_eq!(f.instructions, vec![Instruction::Jump { to: 1 }, exit_label()]);
        assert_eq!(
            f.scopes,
            vec![ErrorScope { try_start: 0, try_end: 0, handlers: vec![], exit: 1, finally: None }]
        );
    }

    #[test]
    fn only_try() {
        let f = compile(vec![scope(vec![print()], vec![], None)]).unwrap();
        assert_eq!(
            f.instructions,
            vec![Instruction::Print { arguments: vec![] }, Instruction::Jump { to: 2 }, exit_label()]
        );
    }

    #[test]
    fn try_with_one_handler() {
        let f = compile(vec![scope(vec![print()], vec![on("SomeError", vec![])], None)]).unwrap();
        assert_eq!(
            f.instructions,
            vec![
                Instruction::Print { arguments: vec![] },
                Instruction::Jump { to: 4 },
                Instruction::On { kind: "SomeError".into() },
                Instruction::Jump { to: 4 },
                exit_label(),
            ]
        );
    }

    #[test]
    fn try_with_two_handlers() {
        let f = compile(vec![scope(
            vec![print()],
            vec![on("SomeError", vec![]), on("SomethingElse", vec![print()])],
            None,
        )])
        .unwrap();
        assert_eq!(
            f.instructions,
            vec![
                Instruction::Print { arguments: vec![] },
                Instruction::Jump { to: 7 },
                Instruction::On { kind: "SomeError".into() },
                Instruction::Jump { to: 7 },
                Instruction::On { kind: "SomethingElse".into() },
                Instruction::Print { arguments: vec![] },
                Instruction::Jump { to: 7 },
                exit_label(),
            ]
        );
        assert_eq!(
            f.scopes[0].handlers,
            vec![
                Handler { kind: "SomeError".into(), index: 2 },
                Handler { kind: "SomethingElse".into(), index: 4 },
            ]
        );
    }

    #[test]
    fn try_finally() {
        let f = compile(vec![scope(vec![print()], vec![], Some(vec![print()]))]).unwrap();
        assert_eq!(
            f.instructions,
            vec![
                Instruction::Finally { index: 0, run: true },
                Instruction::Print { arguments: vec![] },
                Instruction::Jump { to: 3 },
                exit_label(),
                Instruction::Finally { index: 0, run: false },
                Instruction::Print { arguments: vec![] },
            ]
        );
        assert_eq!(f.scopes[0].finally, Some(FinallyRange { index: 0, start: 4, end: 6 }));
        assert_eq!(f.scopes[0].try_start, 1);
    }

    #[test]
    fn nested_scopes_record_innermost_first() {
        let inner = scope(vec![print()], vec![], Some(vec![]));
        let f = compile(vec![scope(vec![inner], vec![], Some(vec![]))]).unwrap();
        assert_eq!(f.scopes.len(), 2);
        assert_eq!(f.scopes[0].finally.as_ref().map(|r| r.index), Some(1));
        assert_eq!(f.scopes[1].finally.as_ref().map(|r| r.index), Some(0));
    }

    #[test]
    fn err_is_only_bound_inside_handlers() {
        let f = compile(vec![scope(
            vec![],
            vec![on("SomeError", vec![Stmt::call("print", vec![Expr::ident("err")])])],
            None,
        )])
        .unwrap();
        assert!(!f.variables.contains_key("err"));

        let err = compile(vec![
            scope(vec![], vec![on("", vec![])], None),
            Stmt::call("print", vec![Expr::ident("err")]),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "undefined variable: err");
    }

    #[test]
    fn err_keeps_the_kind_it_already_has() {
        let err = compile(vec![
            Stmt::assign("err", Expr::string("x")),
            scope(vec![], vec![on("DivisionByZero", vec![])], None),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "cannot assign DivisionByZero to variable err (expecting string)");

        let err = compile(vec![
            Stmt::assign("err", Expr::number("1")),
            scope(vec![], vec![on("", vec![])], None),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "cannot assign any to variable err (expecting number)");
    }

    #[test]
    fn err_of_the_same_kind_stays_bound() {
        let f = compile(vec![
            scope(vec![], vec![on("", vec![])], None),
            scope(vec![], vec![on("", vec![])], None),
        ])
        .unwrap();
        assert!(!f.variables.contains_key("err"));

        let inner = on("DivisionByZero", vec![scope(vec![], vec![on("DivisionByZero", vec![])], None)]);
        let f = compile(vec![scope(vec![], vec![inner], None)]).unwrap();
        assert!(!f.variables.contains_key("err"));
    }
}
