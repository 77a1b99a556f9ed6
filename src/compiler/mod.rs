//! Lowers the AST to register instructions, checking kinds as it goes.

use std::collections::{BTreeMap, HashMap};

use tracing::debug;

use crate::ast::{self, Expr, Position, Stmt};
use crate::kind::Kind;
use crate::number;
use crate::vm::{CompiledFunc, Instruction, Literal, NativeLibrary, Program, Register, Source};

mod binary;
mod call;
mod error_scope;
mod interface;
mod loops;
mod unary;

pub use interface::derive_interfaces;

/// Kind name → method name → method signature.
pub type InterfaceTable = BTreeMap<String, BTreeMap<String, Kind>>;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CompileError {
    #[error("{}cannot perform {left} {op} {right}", .pos.prefix())]
    InvalidOperation { left: Kind, op: String, right: Kind, pos: Position },
    #[error("{}cannot perform {op} on {found}", .pos.prefix())]
    InvalidUnary { op: String, found: Kind, pos: Position },
    #[error("{}cannot assign {found} to variable {name} (expecting {expected})", .pos.prefix())]
    AssignKind { name: String, found: Kind, expected: Kind, pos: Position },
    #[error("{}cannot assign {found} to element of {container} (expecting {expected})", .pos.prefix())]
    ElementKind { container: Kind, found: Kind, expected: Kind, pos: Position },
    #[error("{}cannot assign to {target}", .pos.prefix())]
    NotAssignable { target: String, pos: Position },
    #[error("{}undefined variable: {name}", .pos.prefix())]
    UndefinedVariable { name: String, pos: Position },
    #[error("{}no such function: {name}", .pos.prefix())]
    NoSuchFunction { name: String, pos: Position },
    #[error("{}no such function {method} on {kind}", .pos.prefix())]
    NoSuchMethod { method: String, kind: Kind, pos: Position },
    #[error("{}function {name} is already defined", .pos.prefix())]
    DuplicateFunction { name: String, pos: Position },
    #[error("{}{name} expects {expected} arguments, got {found}", .pos.prefix())]
    ArgumentCount { name: String, expected: usize, found: usize, pos: Position },
    #[error("{}argument {index} of {name} must be {expected}, got {found}", .pos.prefix())]
    ArgumentKind { name: String, index: usize, expected: Kind, found: Kind, pos: Position },
    #[error("{}expected {expected} values, got {found}", .pos.prefix())]
    ValueCount { expected: usize, found: usize, pos: Position },
    #[error("{}{name} must return {expected}, got {found}", .pos.prefix())]
    ReturnKind { name: String, expected: Kind, found: Kind, pos: Position },
    #[error("{}condition must be bool, got {found}", .pos.prefix())]
    Condition { found: Kind, pos: Position },
    #[error("{}cannot index {found} with {key}", .pos.prefix())]
    NotIndexable { found: Kind, key: Kind, pos: Position },
    #[error("{}cannot iterate over {found}", .pos.prefix())]
    NotIterable { found: Kind, pos: Position },
    #[error("{}invalid {kind} literal '{value}'", .pos.prefix())]
    InvalidLiteral { kind: Kind, value: String, pos: Position },
    #[error("{}cannot infer the kind of an empty {what}", .pos.prefix())]
    UntypedLiteral { what: &'static str, pos: Position },
    #[error("{}argument {index} of {name} must be {expected}, got {found}", .pos.prefix())]
    BuiltinArgument { name: String, index: usize, expected: &'static str, found: Kind, pos: Position },
}

impl CompileError {
    pub fn pos(&self) -> &Position {
        match self {
            CompileError::InvalidOperation { pos, .. }
            | CompileError::InvalidUnary { pos, .. }
            | CompileError::AssignKind { pos, .. }
            | CompileError::ElementKind { pos, .. }
            | CompileError::NotAssignable { pos, .. }
            | CompileError::UndefinedVariable { pos, .. }
            | CompileError::NoSuchFunction { pos, .. }
            | CompileError::NoSuchMethod { pos, .. }
            | CompileError::DuplicateFunction { pos, .. }
            | CompileError::ArgumentCount { pos, .. }
            | CompileError::ArgumentKind { pos, .. }
            | CompileError::ValueCount { pos, .. }
            | CompileError::ReturnKind { pos, .. }
            | CompileError::Condition { pos, .. }
            | CompileError::NotIndexable { pos, .. }
            | CompileError::NotIterable { pos, .. }
            | CompileError::InvalidLiteral { pos, .. }
            | CompileError::UntypedLiteral { pos, .. }
            | CompileError::BuiltinArgument { pos, .. } => pos,
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;

/// Register and kind of each value an expression produced.
type Values = Vec<(Register, Kind)>;

/// Compiles one unit. The native library and interface table are handed in
/// explicitly and only read.
pub struct Compiler<'a> {
    natives: &'a NativeLibrary,
    interfaces: InterfaceTable,
    /// Signatures of every function in the unit.
    signatures: HashMap<String, Kind>,
    /// Finished functions, anonymous ones included.
    funcs: Vec<CompiledFunc>,
    anonymous: usize,
}

impl<'a> Compiler<'a> {
    pub fn new(natives: &'a NativeLibrary, interfaces: InterfaceTable) -> Self {
        Compiler { natives, interfaces, signatures: HashMap::new(), funcs: Vec::new(), anonymous: 0 }
    }

    pub fn compile_file(mut self, file: &ast::File) -> Result<Program> {
        for func in &file.funcs {
            if self.signatures.insert(func.name.clone(), func.kind()).is_some() {
                return Err(CompileError::DuplicateFunction { name: func.name.clone(), pos: func.pos.clone() });
            }
        }
        for (kind, methods) in file.interfaces.iter().chain(derive_interfaces(&file.funcs).iter()) {
            let table = self.interfaces.entry(kind.clone()).or_default();
            table.extend(methods.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        for func in &file.funcs {
            let compiled = self.compile_func(func)?;
            self.funcs.push(compiled);
        }
        Ok(Program { funcs: self.funcs, interfaces: self.interfaces })
    }

    /// Compiles a single function. Anonymous functions found inside it are
    /// kept by the compiler and returned from [`Compiler::compile_file`].
    pub fn compile_func(&mut self, func: &ast::Func) -> Result<CompiledFunc> {
        self.compile_named(func, func.name.clone(), None)
    }

    /// A function literal inside a constructor is a method: it starts out
    /// with the constructor's variables in scope.
    fn compile_named(&mut self, func: &ast::Func, name: String, constructor: Option<&CompiledFunc>) -> Result<CompiledFunc> {
        let mut f = CompiledFunc::new(name);
        f.returns = func.returns.clone();
        if let Some(owner) = constructor {
            f.variables = owner.variables.clone();
            f.method_of = Some(owner.name.clone());
        }
        for param in &func.params {
            f.arguments.push((param.name.clone(), param.kind.clone()));
            f.new_variable(&param.name, param.kind.clone());
        }

        self.block(&mut f, &func.statements)?;

        if func.is_constructor() {
            f.append(Instruction::Return { results: vec![Register::State] });
        }
        debug!(name = %f.name, instructions = f.len(), registers = f.register_count(), "compiled function");
        Ok(f)
    }

    /// Functions compiled so far, anonymous ones included.
    pub fn into_funcs(self) -> Vec<CompiledFunc> {
        self.funcs
    }

    // ── Statements ──────────────────────────────────────────────────

    fn block(&mut self, f: &mut CompiledFunc, statements: &[Stmt]) -> Result<()> {
        for stmt in statements {
            self.statement(f, stmt)?;
        }
        Ok(())
    }

    fn statement(&mut self, f: &mut CompiledFunc, stmt: &Stmt) -> Result<()> {
        match stmt {
            Stmt::Assign { targets, values, pos } => self.assign(f, targets, values, pos),
            Stmt::Expr(expr) => self.expr(f, expr).map(|_| ()),
            Stmt::If { condition, then, otherwise } => self.if_stmt(f, condition, then, otherwise),
            Stmt::For { init, condition, next, statements } => {
                self.for_stmt(f, init.as_deref(), condition.as_ref(), next.as_deref(), statements)
            }
            Stmt::ForIn { key, value, expr, statements, pos } => {
                self.for_in(f, key.as_deref(), value, expr, statements, pos)
            }
            Stmt::ErrorScope { statements, on, finally } => {
                self.error_scope(f, statements, on, finally.as_deref())
            }
            Stmt::Return { values, pos } => self.return_stmt(f, values, pos),
            Stmt::Raise { value, pos: _ } => {
                let (value, _) = self.single(f, value)?;
                f.append(Instruction::Raise { value });
                Ok(())
            }
        }
    }

    fn assign(&mut self, f: &mut CompiledFunc, targets: &[Expr], values: &[Expr], pos: &Position) -> Result<()> {
        let mut results = Vec::new();
        for value in values {
            results.extend(self.expr(f, value)?);
        }
        if results.len() != targets.len() {
            return Err(CompileError::ValueCount { expected: targets.len(), found: results.len(), pos: pos.clone() });
        }
        // Variables read on the right are copied first so `a, b = b, a` swaps.
        if targets.len() > 1 {
            for (register, _) in results.iter_mut() {
                if register.as_var().is_some() {
                    let copy = f.next_register();
                    f.append(Instruction::Assign { variable: copy.clone(), source: Source::Register(register.clone()) });
                    *register = copy;
                }
            }
        }
        for (target, (register, kind)) in targets.iter().zip(results) {
            self.store(f, target, register, kind, pos)?;
        }
        Ok(())
    }

    fn store(&mut self, f: &mut CompiledFunc, target: &Expr, value: Register, kind: Kind, pos: &Position) -> Result<()> {
        match target {
            Expr::Identifier { name, pos: _ } => {
                declare(f, name, kind, pos)?;
                f.append(Instruction::Assign { variable: Register::var(name.clone()), source: Source::Register(value) });
                Ok(())
            }
            Expr::Key { expr, key, pos: _ } => {
                let element = self.element(f, expr, key, pos)?;
                if !element.element_kind.accepts(&kind) {
                    return Err(CompileError::ElementKind {
                        container: element.container_kind,
                        found: kind,
                        expected: element.element_kind,
                        pos: pos.clone(),
                    });
                }
                f.append(element.setter(value));
                Ok(())
            }
            other => Err(CompileError::NotAssignable { target: describe(other), pos: pos.clone() }),
        }
    }

    fn return_stmt(&mut self, f: &mut CompiledFunc, values: &[Expr], pos: &Position) -> Result<()> {
        let mut results = Vec::new();
        for value in values {
            results.extend(self.expr(f, value)?);
        }
        if results.len() != f.returns.len() {
            return Err(CompileError::ValueCount { expected: f.returns.len(), found: results.len(), pos: pos.clone() });
        }
        for ((_, found), expected) in results.iter().zip(&f.returns) {
            if !expected.accepts(found) {
                return Err(CompileError::ReturnKind {
                    name: f.name.clone(),
                    expected: expected.clone(),
                    found: found.clone(),
                    pos: pos.clone(),
                });
            }
        }
        f.append(Instruction::Return { results: results.into_iter().map(|(r, _)| r).collect() });
        Ok(())
    }

    // ── Expressions ─────────────────────────────────────────────────

    /// Compiles an expression that must produce exactly one value.
    fn single(&mut self, f: &mut CompiledFunc, expr: &Expr) -> Result<(Register, Kind)> {
        let mut values = self.expr(f, expr)?;
        if values.len() != 1 {
            return Err(CompileError::ValueCount { expected: 1, found: values.len(), pos: expr.pos() });
        }
        Ok(values.remove(0))
    }

    fn expr(&mut self, f: &mut CompiledFunc, expr: &Expr) -> Result<Values> {
        match expr {
            Expr::Literal(lit) => {
                let value = Literal::from_ast(lit).ok_or_else(|| CompileError::InvalidLiteral {
                    kind: lit.kind.clone(),
                    value: lit.value.clone(),
                    pos: lit.pos.clone(),
                })?;
                Ok(vec![(constant(f, value), lit.kind.clone())])
            }
            Expr::Array { kind, elements, pos } => self.array(f, kind.as_ref(), elements, pos),
            Expr::Map { kind, entries, pos } => self.map(f, kind.as_ref(), entries, pos),
            Expr::Identifier { name, pos } => self.identifier(f, name, pos).map(|v| vec![v]),
            Expr::Binary { left, op, right, pos } => self.binary(f, left, *op, right, pos).map(|v| vec![v]),
            Expr::Unary { op, expr, pos } => self.unary(f, *op, expr, pos).map(|v| vec![v]),
            Expr::Call { function, arguments, pos } => self.call(f, function, arguments, pos),
            Expr::Key { expr, key, pos } => {
                let element = self.element(f, expr, key, pos)?;
                let result = f.next_register();
                f.append(element.getter(result.clone()));
                Ok(vec![(result, element.element_kind)])
            }
            Expr::Func(func) => {
                self.anonymous += 1;
                let name = format!("{}.{}", f.name, self.anonymous);
                let constructor = f.is_constructor().then_some(&*f);
                let compiled = self.compile_named(func, name.clone(), constructor)?;
                let kind = compiled.kind();
                self.funcs.push(compiled);
                Ok(vec![(constant(f, Literal::func(name, kind.clone())), kind)])
            }
            Expr::Interpolate { parts, pos: _ } => {
                let mut args = Vec::new();
                for part in parts {
                    args.push(self.single(f, part)?.0);
                }
                let result = f.next_register();
                f.append(Instruction::Interpolate { args, result: result.clone() });
                Ok(vec![(result, Kind::STRING)])
            }
        }
    }

    /// Variables resolve to their own register. Function names become
    /// function values.
    fn identifier(&mut self, f: &mut CompiledFunc, name: &str, pos: &Position) -> Result<(Register, Kind)> {
        if let Some(kind) = f.variables.get(name) {
            return Ok((Register::var(name), kind.clone()));
        }
        let kind = self
            .signatures
            .get(name)
            .cloned()
            .or_else(|| self.natives.get(name).map(|n| n.kind.clone()))
            .ok_or_else(|| CompileError::UndefinedVariable { name: name.to_string(), pos: pos.clone() })?;
        let value = Literal::func(name, kind.clone());
        Ok((constant(f, value), kind))
    }

    fn array(&mut self, f: &mut CompiledFunc, kind: Option<&Kind>, elements: &[Expr], pos: &Position) -> Result<Values> {
        let mut values = Vec::new();
        for element in elements {
            values.push(self.single(f, element)?);
        }
        let kind = match (kind, values.first()) {
            (Some(kind), _) => kind.clone(),
            (None, Some((_, first))) => Kind::array_of(first.clone()),
            (None, None) => return Err(CompileError::UntypedLiteral { what: "array", pos: pos.clone() }),
        };
        let element_kind = kind.element().cloned().unwrap_or(Kind::ANY);

        let size = constant(f, Literal::Number(number::from_usize(values.len())));
        let result = f.next_register();
        f.append(Instruction::ArrayAlloc { kind: kind.clone(), size, result: result.clone() });
        for (i, (value, found)) in values.into_iter().enumerate() {
            if !element_kind.accepts(&found) {
                return Err(CompileError::ElementKind {
                    container: kind,
                    found,
                    expected: element_kind,
                    pos: pos.clone(),
                });
            }
            let index = constant(f, Literal::Number(number::from_usize(i)));
            f.append(Instruction::ArraySet { array: result.clone(), index, value });
        }
        Ok(vec![(result, kind)])
    }

    fn map(&mut self, f: &mut CompiledFunc, kind: Option<&Kind>, entries: &[(String, Expr)], pos: &Position) -> Result<Values> {
        let mut values = Vec::new();
        for (key, element) in entries {
            values.push((key, self.single(f, element)?));
        }
        let kind = match (kind, values.first()) {
            (Some(kind), _) => kind.clone(),
            (None, Some((_, (_, first)))) => Kind::map_of(first.clone()),
            (None, None) => return Err(CompileError::UntypedLiteral { what: "map", pos: pos.clone() }),
        };
        let element_kind = kind.element().cloned().unwrap_or(Kind::ANY);

        let size = constant(f, Literal::Number(number::from_usize(values.len())));
        let result = f.next_register();
        f.append(Instruction::MapAlloc { kind: kind.clone(), size, result: result.clone() });
        for (key, (value, found)) in values {
            if !element_kind.accepts(&found) {
                return Err(CompileError::ElementKind {
                    container: kind,
                    found,
                    expected: element_kind,
                    pos: pos.clone(),
                });
            }
            let key = constant(f, Literal::string(key.clone()));
            f.append(Instruction::MapSet { map: result.clone(), key, value });
        }
        Ok(vec![(result, kind)])
    }

    /// Resolves `container[key]` for reads, writes and compound updates.
    fn element(&mut self, f: &mut CompiledFunc, container: &Expr, key: &Expr, pos: &Position) -> Result<Element> {
        let (container, container_kind) = self.single(f, container)?;
        let (key, key_kind) = self.single(f, key)?;
        let element_kind = match (&container_kind, &key_kind) {
            (Kind::Array(element), k) if *k == Kind::NUMBER => element.as_ref().clone(),
            (Kind::Map(element), k) if *k == Kind::STRING => element.as_ref().clone(),
            _ => {
                return Err(CompileError::NotIndexable { found: container_kind, key: key_kind, pos: pos.clone() });
            }
        };
        Ok(Element { container, container_kind, key, element_kind })
    }
}

/// An indexed element of an array or map.
struct Element {
    container: Register,
    container_kind: Kind,
    key: Register,
    element_kind: Kind,
}

impl Element {
    fn getter(&self, result: Register) -> Instruction {
        if self.container_kind.is_array() {
            Instruction::ArrayGet { array: self.container.clone(), index: self.key.clone(), result }
        } else {
            Instruction::MapGet { map: self.container.clone(), key: self.key.clone(), result }
        }
    }

    fn setter(&self, value: Register) -> Instruction {
        if self.container_kind.is_array() {
            Instruction::ArraySet { array: self.container.clone(), index: self.key.clone(), value }
        } else {
            Instruction::MapSet { map: self.container.clone(), key: self.key.clone(), value }
        }
    }
}

/// Records `name` as a variable of `kind`. A variable keeps the kind it was
/// first given.
fn declare(f: &mut CompiledFunc, name: &str, kind: Kind, pos: &Position) -> Result<()> {
    match f.variables.get(name) {
        Some(expected) if *expected != kind => Err(CompileError::AssignKind {
            name: name.to_string(),
            found: kind,
            expected: expected.clone(),
            pos: pos.clone(),
        }),
        _ => {
            f.new_variable(name, kind);
            Ok(())
        }
    }
}

/// Loads a constant into a fresh register.
fn constant(f: &mut CompiledFunc, value: Literal) -> Register {
    let register = f.next_register();
    f.append(Instruction::Assign { variable: register.clone(), source: Source::Constant(value) });
    register
}

fn describe(expr: &Expr) -> String {
    match expr {
        Expr::Literal(lit) => format!("{} literal", lit.kind),
        Expr::Call { function, .. } => format!("call to {function}"),
        Expr::Binary { op, .. } => format!("{op} expression"),
        _ => "expression".to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    pub fn compile(statements: Vec<Stmt>) -> Result<CompiledFunc> {
        let natives = NativeLibrary::standard();
        Compiler::new(&natives, InterfaceTable::new()).compile_func(&ast::Func::new("main", statements))
    }

    pub fn t(n: u32) -> Register {
        Register::Temp(n)
    }

    pub fn v(name: &str) -> Register {
        Register::var(name)
    }

    pub fn assign_const(r: Register, value: Literal) -> Instruction {
        Instruction::Assign { variable: r, source: Source::Constant(value) }
    }

    pub fn assign_reg(r: Register, from: Register) -> Instruction {
        Instruction::Assign { variable: r, source: Source::Register(from) }
    }

    pub fn num(s: &str) -> Literal {
        Literal::Number(number::parse(s).unwrap())
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::vm::CallTarget;

    #[test]
    fn empty_function_has_no_instructions() {
        assert!(compile(vec![]).unwrap().instructions.is_empty());
    }

    #[test]
    fn print_without_and_with_arguments() {
        let f = compile(vec![Stmt::call("print", vec![]), Stmt::call("print", vec![Expr::string("hello")])]).unwrap();
        assert_eq!(
            f.instructions,
            vec![
                Instruction::Print { arguments: vec![] },
                assign_const(t(1), Literal::string("hello")),
                Instruction::Print { arguments: vec![t(1)] },
            ]
        );
    }

    #[test]
    fn assignment_goes_through_a_temporary() {
        let f = compile(vec![Stmt::assign("bar", Expr::number("123"))]).unwrap();
        assert_eq!(f.instructions, vec![assign_const(t(1), num("123")), assign_reg(v("bar"), t(1))]);
        assert_eq!(f.variables.get("bar"), Some(&Kind::NUMBER));
    }

    #[test]
    fn reassigning_a_different_kind_fails() {
        let err = compile(vec![
            Stmt::assign("x", Expr::number("1")),
            Stmt::assign("x", Expr::string("a")),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "cannot assign string to variable x (expecting number)");
    }

    #[test]
    fn identifiers_emit_nothing() {
        let f = compile(vec![
            Stmt::assign("a", Expr::number("1")),
            Stmt::call("print", vec![Expr::ident("a"), Expr::ident("a")]),
        ])
        .unwrap();
        assert_eq!(f.instructions.last(), Some(&Instruction::Print { arguments: vec![v("a"), v("a")] }));
        assert_eq!(f.len(), 3);
    }

    #[test]
    fn undefined_variable() {
        let err = compile(vec![Stmt::call("print", vec![Expr::ident("nope")])]).unwrap_err();
        assert!(matches!(err, CompileError::UndefinedVariable { .. }));
    }

    #[test]
    fn object_constructor_returns_state() {
        let natives = NativeLibrary::default();
        let mut compiler = Compiler::new(&natives, InterfaceTable::new());

        let mut empty = ast::Func::new("Foo", vec![]);
        empty.returns = vec![Kind::named("Foo")];
        assert_eq!(
            compiler.compile_func(&empty).unwrap().instructions,
            vec![Instruction::Return { results: vec![Register::State] }]
        );

        let mut one = ast::Func::new("Foo", vec![Stmt::assign("bar", Expr::number("123"))]);
        one.returns = vec![Kind::named("Foo")];
        assert_eq!(
            compiler.compile_func(&one).unwrap().instructions,
            vec![
                assign_const(t(1), num("123")),
                assign_reg(v("bar"), t(1)),
                Instruction::Return { results: vec![Register::State] },
            ]
        );
    }

    #[test]
    fn array_literal() {
        let f = compile(vec![Stmt::assign(
            "xs",
            Expr::Array { kind: None, elements: vec![Expr::number("1"), Expr::number("2")], pos: Position::default() },
        )])
        .unwrap();
        assert_eq!(f.variables.get("xs"), Some(&Kind::array_of(Kind::NUMBER)));
        assert_eq!(
            f.instructions,
            vec![
                assign_const(t(1), num("1")),
                assign_const(t(2), num("2")),
                assign_const(t(3), num("2")),
                Instruction::ArrayAlloc { kind: Kind::array_of(Kind::NUMBER), size: t(3), result: t(4) },
                assign_const(t(5), num("0")),
                Instruction::ArraySet { array: t(4), index: t(5), value: t(1) },
                assign_const(t(6), num("1")),
                Instruction::ArraySet { array: t(4), index: t(6), value: t(2) },
                assign_reg(v("xs"), t(4)),
            ]
        );
    }

    #[test]
    fn mixed_array_elements_are_rejected() {
        let err = compile(vec![Stmt::Expr(Expr::Array {
            kind: None,
            elements: vec![Expr::number("1"), Expr::string("2")],
            pos: Position::new("a.ok:1:1"),
        })])
        .unwrap_err();
        assert_eq!(err.to_string(), "a.ok:1:1 cannot assign string to element of []number (expecting number)");
    }

    #[test]
    fn empty_literals_need_a_kind() {
        let err = compile(vec![Stmt::Expr(Expr::Map { kind: None, entries: vec![], pos: Position::default() })])
            .unwrap_err();
        assert!(matches!(err, CompileError::UntypedLiteral { what: "map", .. }));
    }

    #[test]
    fn indexed_assignment() {
        let f = compile(vec![
            Stmt::assign(
                "m",
                Expr::Map { kind: Some(Kind::map_of(Kind::NUMBER)), entries: vec![], pos: Position::default() },
            ),
            Stmt::Assign {
                targets: vec![Expr::key(Expr::ident("m"), Expr::string("a"))],
                values: vec![Expr::number("5")],
                pos: Position::default(),
            },
        ])
        .unwrap();
        assert_eq!(
            &f.instructions[3..],
            &[
                assign_const(t(3), num("5")),
                assign_const(t(4), Literal::string("a")),
                Instruction::MapSet { map: v("m"), key: t(4), value: t(3) },
            ]
        );
    }

    #[test]
    fn indexing_needs_matching_key_kind() {
        let err = compile(vec![
            Stmt::assign(
                "xs",
                Expr::Array { kind: Some(Kind::array_of(Kind::NUMBER)), elements: vec![], pos: Position::default() },
            ),
            Stmt::Expr(Expr::key(Expr::ident("xs"), Expr::string("a"))),
        ])
        .unwrap_err();
        assert_eq!(err.to_string(), "cannot index []number with string");
    }

    #[test]
    fn multiple_assignment_swaps() {
        let f = compile(vec![
            Stmt::assign("a", Expr::number("1")),
            Stmt::assign("b", Expr::number("2")),
            Stmt::Assign {
                targets: vec![Expr::ident("a"), Expr::ident("b")],
                values: vec![Expr::ident("b"), Expr::ident("a")],
                pos: Position::default(),
            },
        ])
        .unwrap();
        assert_eq!(
            &f.instructions[4..],
            &[
                assign_reg(t(3), v("b")),
                assign_reg(t(4), v("a")),
                assign_reg(v("a"), t(3)),
                assign_reg(v("b"), t(4)),
            ]
        );
    }

    #[test]
    fn value_count_mismatch() {
        let err = compile(vec![Stmt::Assign {
            targets: vec![Expr::ident("a"), Expr::ident("b")],
            values: vec![Expr::number("1")],
            pos: Position::default(),
        }])
        .unwrap_err();
        assert_eq!(err.to_string(), "expected 2 values, got 1");
    }

    #[test]
    fn anonymous_functions_become_values() {
        let natives = NativeLibrary::default();
        let mut compiler = Compiler::new(&natives, InterfaceTable::new());
        let main = ast::Func::new(
            "main",
            vec![
                Stmt::assign("f", Expr::Func(ast::Func::new("", vec![Stmt::call("print", vec![])]))),
                Stmt::call("f", vec![]),
            ],
        );
        let f = compiler.compile_func(&main).unwrap();
        let kind = Kind::func(vec![], vec![]);
        assert_eq!(
            f.instructions,
            vec![
                assign_const(t(1), Literal::func("main.1", kind.clone())),
                assign_reg(v("f"), t(1)),
                Instruction::Call { target: CallTarget::Dynamic(v("f")), arguments: vec![], results: vec![] },
            ]
        );
        let anon = compiler.into_funcs();
        assert_eq!(anon.len(), 1);
        assert_eq!(anon[0].name, "main.1");
    }

    #[test]
    fn return_checks_kinds() {
        let natives = NativeLibrary::default();
        let mut compiler = Compiler::new(&natives, InterfaceTable::new());
        let mut func = ast::Func::new(
            "f",
            vec![Stmt::Return { values: vec![Expr::string("x")], pos: Position::default() }],
        );
        func.returns = vec![Kind::NUMBER];
        let err = compiler.compile_func(&func).unwrap_err();
        assert_eq!(err.to_string(), "f must return number, got string");
    }

    #[test]
    fn duplicate_functions() {
        let natives = NativeLibrary::default();
        let file = ast::File { funcs: vec![ast::Func::new("a", vec![]), ast::Func::new("a", vec![])], ..Default::default() };
        let err = Compiler::new(&natives, InterfaceTable::new()).compile_file(&file).unwrap_err();
        assert!(matches!(err, CompileError::DuplicateFunction { .. }));
    }

    #[test]
    fn invalid_literal_reports_its_position() {
        let bad = ast::Literal { kind: Kind::NUMBER, value: "12x".into(), pos: Position::new("a.ok:3:7") };
        let err = compile(vec![Stmt::assign("n", Expr::Literal(bad))]).unwrap_err();
        assert_eq!(err.to_string(), "a.ok:3:7 invalid number literal '12x'");
    }

    #[test]
    fn function_literals_in_constructors_see_fields() {
        let natives = NativeLibrary::default();
        let mut compiler = Compiler::new(&natives, InterfaceTable::new());
        let mut greet = ast::Func::new(
            "",
            vec![Stmt::Return { values: vec![Expr::ident("Name")], pos: Position::default() }],
        );
        greet.returns = vec![Kind::STRING];
        let mut person = ast::Func::new(
            "Person",
            vec![Stmt::assign("Name", Expr::string("Bob")), Stmt::assign("Greet", Expr::Func(greet.clone()))],
        );
        person.returns = vec![Kind::named("Person")];
        compiler.compile_func(&person).unwrap();
        let method = &compiler.into_funcs()[0];
        assert_eq!(method.name, "Person.1");
        assert_eq!(method.method_of.as_deref(), Some("Person"));

        let mut compiler = Compiler::new(&natives, InterfaceTable::new());
        let main = ast::Func::new(
            "main",
            vec![Stmt::assign("Name", Expr::string("Bob")), Stmt::assign("f", Expr::Func(greet))],
        );
        let err = compiler.compile_func(&main).unwrap_err();
        assert!(matches!(err, CompileError::UndefinedVariable { .. }));
    }

    #[test]
    fn interpolation() {
        let f = compile(vec![Stmt::Expr(Expr::Interpolate {
            parts: vec![Expr::string("n = "), Expr::number("3")],
            pos: Position::default(),
        })])
        .unwrap();
        assert_eq!(f.instructions[2], Instruction::Interpolate { args: vec![t(1), t(2)], result: t(3) });
    }
}
