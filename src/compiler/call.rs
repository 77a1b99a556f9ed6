use crate::ast::{Expr, Position};
use crate::kind::Kind;
use crate::vm::{CallTarget, CompiledFunc, Instruction, Literal, Register};

use super::{CompileError, Compiler, Result, Values, constant};

/// Names the compiler turns straight into instructions.
pub const BUILTINS: &[&str] = &[
    "__call", "__get", "__interface", "__len", "__log", "__pow", "__props", "__set", "__type", "char", "len", "number",
    "print", "string",
];

impl Compiler<'_> {
    pub(super) fn call(&mut self, f: &mut CompiledFunc, name: &str, arguments: &[Expr], pos: &Position) -> Result<Values> {
        let mut args = Vec::new();
        for arg in arguments {
            args.extend(self.expr(f, arg)?);
        }

        if BUILTINS.contains(&name) {
            return builtin(f, name, args, pos);
        }

        let (target, kind) = self.resolve(f, name, pos)?;
        let Kind::Func { args: params, returns } = &kind else {
            return Err(CompileError::NoSuchFunction { name: name.to_string(), pos: pos.clone() });
        };
        check_arguments(name, params, &args, pos)?;

        let results: Vec<Register> = returns.iter().map(|_| f.next_register()).collect();
        f.append(Instruction::Call {
            target,
            arguments: args.into_iter().map(|(r, _)| r).collect(),
            results: results.clone(),
        });
        Ok(results.into_iter().zip(returns.iter().cloned()).collect())
    }

    /// Finds what `name` refers to, in order: a function held in a variable,
    /// a function of the unit, a native function, then a method called on an
    /// object variable.
    fn resolve(&mut self, f: &mut CompiledFunc, name: &str, pos: &Position) -> Result<(CallTarget, Kind)> {
        if let Some(kind) = f.variables.get(name) {
            if kind.is_func() {
                return Ok((CallTarget::Dynamic(Register::var(name)), kind.clone()));
            }
        }
        if let Some(kind) = self.signatures.get(name) {
            return Ok((CallTarget::Static(name.to_string()), kind.clone()));
        }
        if let Some(native) = self.natives.get(name) {
            return Ok((CallTarget::Static(name.to_string()), native.kind.clone()));
        }

        let no_such_function = || CompileError::NoSuchFunction { name: name.to_string(), pos: pos.clone() };
        let (receiver, method) = name.split_once('.').ok_or_else(no_such_function)?;
        let receiver_kind = f.variables.get(receiver).cloned().ok_or_else(no_such_function)?;
        let method_kind = match &receiver_kind {
            Kind::Named(kind_name) => self.interfaces.get(kind_name).and_then(|methods| methods.get(method)),
            _ => None,
        }
        .cloned()
        .ok_or_else(|| CompileError::NoSuchMethod {
            method: method.to_string(),
            kind: receiver_kind.clone(),
            pos: pos.clone(),
        })?;

        let key = constant(f, Literal::string(method));
        let function = f.next_register();
        f.append(Instruction::MapGet { map: Register::var(receiver), key, result: function.clone() });
        Ok((CallTarget::Dynamic(function), method_kind))
    }
}

fn check_arguments(name: &str, params: &[Kind], args: &Values, pos: &Position) -> Result<()> {
    if params.len() != args.len() {
        return Err(CompileError::ArgumentCount {
            name: name.to_string(),
            expected: params.len(),
            found: args.len(),
            pos: pos.clone(),
        });
    }
    for (i, (param, (_, found))) in params.iter().zip(args).enumerate() {
        if !param.accepts(found) {
            return Err(CompileError::ArgumentKind {
                name: name.to_string(),
                index: i + 1,
                expected: param.clone(),
                found: found.clone(),
                pos: pos.clone(),
            });
        }
    }
    Ok(())
}

/// What a builtin accepts in one argument position.
#[derive(Debug, Clone, Copy)]
enum Expect {
    Any,
    Number,
    String,
    Func,
    Array,
    /// A map or an object.
    Container,
}

impl Expect {
    /// Numbers and strings must match exactly. The others also take `any`
    /// and leave the rest to the VM.
    fn accepts(self, kind: &Kind) -> bool {
        match self {
            Expect::Any => true,
            Expect::Number => *kind == Kind::NUMBER,
            Expect::String => *kind == Kind::STRING,
            Expect::Func => kind.is_func() || kind.is_any(),
            Expect::Array => kind.is_array() || kind.is_any(),
            Expect::Container => kind.is_map() || kind.is_object() || kind.is_any(),
        }
    }

    fn describe(self) -> &'static str {
        match self {
            Expect::Any => "any",
            Expect::Number => "number",
            Expect::String => "string",
            Expect::Func => "func",
            Expect::Array => "array",
            Expect::Container => "map or object",
        }
    }
}

fn signature(name: &str) -> &'static [Expect] {
    match name {
        "__call" => &[Expect::Func, Expect::Array],
        "__get" => &[Expect::Container, Expect::String],
        "__set" => &[Expect::Container, Expect::String, Expect::Any],
        "__props" => &[Expect::Container],
        "__pow" => &[Expect::Number, Expect::Number],
        "__log" => &[Expect::Number],
        _ => &[Expect::Any],
    }
}

fn builtin(f: &mut CompiledFunc, name: &str, args: Values, pos: &Position) -> Result<Values> {
    if name == "print" {
        f.append(Instruction::Print { arguments: args.into_iter().map(|(r, _)| r).collect() });
        return Ok(Vec::new());
    }

    let params = signature(name);
    if args.len() != params.len() {
        return Err(CompileError::ArgumentCount {
            name: name.to_string(),
            expected: params.len(),
            found: args.len(),
            pos: pos.clone(),
        });
    }
    for (i, (param, (_, found))) in params.iter().zip(&args).enumerate() {
        if !param.accepts(found) {
            return Err(CompileError::BuiltinArgument {
                name: name.to_string(),
                index: i + 1,
                expected: param.describe(),
                found: found.clone(),
                pos: pos.clone(),
            });
        }
    }

    let regs: Vec<Register> = args.into_iter().map(|(r, _)| r).collect();
    let result = f.next_register();
    let r = result.clone();
    let (ins, kind) = match (name, regs.as_slice()) {
        ("len" | "__len", [x]) => (Instruction::Len { argument: x.clone(), result: r }, Kind::NUMBER),
        ("number", [x]) => (Instruction::CastNumber { x: x.clone(), result: r }, Kind::NUMBER),
        ("string", [x]) => (Instruction::CastString { x: x.clone(), result: r }, Kind::STRING),
        ("char", [x]) => (Instruction::CastChar { x: x.clone(), result: r }, Kind::CHAR),
        ("__interface", [x]) => (Instruction::Interface { value: x.clone(), result: r }, Kind::STRING),
        ("__type", [x]) => (Instruction::Type { value: x.clone(), result: r }, Kind::STRING),
        ("__props", [object]) => (Instruction::Props { object: object.clone(), result: r }, Kind::array_of(Kind::STRING)),
        ("__get", [object, prop]) => {
            (Instruction::Get { object: object.clone(), prop: prop.clone(), result: r }, Kind::ANY)
        }
        ("__set", [object, prop, value]) => (
            Instruction::Set { object: object.clone(), prop: prop.clone(), value: value.clone(), result: r },
            Kind::BOOL,
        ),
        ("__log", [x]) => (Instruction::Log { x: x.clone(), result: r }, Kind::NUMBER),
        ("__pow", [base, power]) => {
            (Instruction::Power { base: base.clone(), power: power.clone(), result: r }, Kind::NUMBER)
        }
        ("__call", [function, arguments]) => (
            Instruction::DynamicCall { function: function.clone(), arguments: arguments.clone(), result: r },
            Kind::array_of(Kind::ANY),
        ),
        _ => return Err(CompileError::NoSuchFunction { name: name.to_string(), pos: pos.clone() }),
    };
    f.append(ins);
    Ok(vec![(result, kind)])
}
