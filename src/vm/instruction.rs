use std::collections::BTreeMap;
use std::fmt;

use bigdecimal::BigDecimal;

use crate::kind::{is_public, Kind};
use crate::number::{self, NumberError};

use super::register::Registers;
use super::render::render;
use super::{Literal, Register, RuntimeError, Vm};

type Result<T> = std::result::Result<T, RuntimeError>;

/// Right hand side of an `Assign`.
#[derive(Debug, Clone, PartialEq)]
pub enum Source {
    Constant(Literal),
    Register(Register),
}

/// Function to invoke: known by name at compile time, or held in a register.
#[derive(Debug, Clone, PartialEq)]
pub enum CallTarget {
    Static(String),
    Dynamic(Register),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    // ── Assignment ──────────────────────────────────────────────────
    Assign { variable: Register, source: Source },

    // ── Arithmetic (number) ─────────────────────────────────────────
    Add { left: Register, right: Register, result: Register },
    Subtract { left: Register, right: Register, result: Register },
    Multiply { left: Register, right: Register, result: Register },
    Divide { left: Register, right: Register, result: Register },
    Remainder { left: Register, right: Register, result: Register },
    Power { base: Register, power: Register, result: Register },
    /// Natural logarithm.
    Log { x: Register, result: Register },

    // ── String and data ─────────────────────────────────────────────
    Concat { left: Register, right: Register, result: Register },
    Combine { left: Register, right: Register, result: Register },

    // ── Comparison ──────────────────────────────────────────────────
    Equal { left: Register, right: Register, result: Register },
    NotEqual { left: Register, right: Register, result: Register },
    EqualNumber { left: Register, right: Register, result: Register },
    NotEqualNumber { left: Register, right: Register, result: Register },
    GreaterThanNumber { left: Register, right: Register, result: Register },
    GreaterThanString { left: Register, right: Register, result: Register },
    LessThanNumber { left: Register, right: Register, result: Register },
    LessThanString { left: Register, right: Register, result: Register },
    GreaterThanEqualNumber { left: Register, right: Register, result: Register },
    GreaterThanEqualString { left: Register, right: Register, result: Register },
    LessThanEqualNumber { left: Register, right: Register, result: Register },
    LessThanEqualString { left: Register, right: Register, result: Register },

    // ── Logical ─────────────────────────────────────────────────────
    And { left: Register, right: Register, result: Register },
    Or { left: Register, right: Register, result: Register },
    Not { left: Register, result: Register },

    // ── Collections and reflection ──────────────────────────────────
    ArrayAlloc { kind: Kind, size: Register, result: Register },
    ArrayGet { array: Register, index: Register, result: Register },
    ArraySet { array: Register, index: Register, value: Register },
    MapAlloc { kind: Kind, size: Register, result: Register },
    MapGet { map: Register, key: Register, result: Register },
    MapSet { map: Register, key: Register, value: Register },
    Len { argument: Register, result: Register },
    Props { object: Register, result: Register },
    Get { object: Register, prop: Register, result: Register },
    Set { object: Register, prop: Register, value: Register, result: Register },
    Type { value: Register, result: Register },
    Interface { value: Register, result: Register },

    // ── Casts ───────────────────────────────────────────────────────
    CastNumber { x: Register, result: Register },
    CastString { x: Register, result: Register },
    CastChar { x: Register, result: Register },

    // ── Calls ───────────────────────────────────────────────────────
    Call { target: CallTarget, arguments: Vec<Register>, results: Vec<Register> },
    /// Calls the function in `function` with the elements of the array in
    /// `arguments`; all results are collected into a `[]any`.
    DynamicCall { function: Register, arguments: Register, result: Register },
    Return { results: Vec<Register> },

    // ── Control flow ────────────────────────────────────────────────
    Jump { to: usize },
    JumpUnless { condition: Register, to: usize },

    // ── Errors ──────────────────────────────────────────────────────
    /// Handler label. An empty kind marks the exit of an error scope.
    On { kind: String },
    /// Arms (`run: true`) or disarms the finally block `index` of the frame.
    Finally { index: usize, run: bool },
    Raise { value: Register },

    // ── Output ──────────────────────────────────────────────────────
    Print { arguments: Vec<Register> },
    Interpolate { args: Vec<Register>, result: Register },
}

type NumberOp = fn(&BigDecimal, &BigDecimal) -> std::result::Result<BigDecimal, NumberError>;

fn arithmetic(vm: &mut Vm, left: &Register, right: &Register, result: &Register, f: NumberOp) -> Result<()> {
    let value = f(vm.get(left)?.as_number()?, vm.get(right)?.as_number()?)?;
    vm.set(result, Literal::Number(value));
    Ok(())
}

fn compare_numbers(
    vm: &mut Vm,
    left: &Register,
    right: &Register,
    result: &Register,
    f: fn(&BigDecimal, &BigDecimal) -> bool,
) -> Result<()> {
    let value = f(vm.get(left)?.as_number()?, vm.get(right)?.as_number()?);
    vm.set(result, Literal::Bool(value));
    Ok(())
}

fn compare_strings(
    vm: &mut Vm,
    left: &Register,
    right: &Register,
    result: &Register,
    f: fn(&str, &str) -> bool,
) -> Result<()> {
    let value = f(vm.get(left)?.as_str()?, vm.get(right)?.as_str()?);
    vm.set(result, Literal::Bool(value));
    Ok(())
}

fn logical(vm: &mut Vm, left: &Register, right: &Register, result: &Register, f: fn(bool, bool) -> bool) -> Result<()> {
    let value = f(vm.get(left)?.as_bool()?, vm.get(right)?.as_bool()?);
    vm.set(result, Literal::Bool(value));
    Ok(())
}

fn index_of(value: &Literal, len: usize) -> Result<usize> {
    let n = value.as_number()?;
    match number::to_index(n) {
        Some(i) if i < len => Ok(i),
        _ => Err(RuntimeError::Index(format!(
            "index {} out of bounds for length {len}",
            number::format(n)
        ))),
    }
}

fn cast_number(value: &Literal) -> Result<BigDecimal> {
    let failed = || RuntimeError::Cast(format!("cannot convert {} '{}' to number", value.kind(), render(value, false)));
    match value {
        Literal::Number(n) => Ok(n.clone()),
        Literal::Char(c) => Ok(number::from_usize(u32::from(*c) as usize)),
        Literal::String(s) => number::parse(s).ok_or_else(failed),
        Literal::Data(d) => std::str::from_utf8(d).ok().and_then(number::parse).ok_or_else(failed),
        _ => Err(failed()),
    }
}

fn cast_char(value: &Literal) -> Result<char> {
    let failed = || RuntimeError::Cast(format!("cannot convert {} '{}' to char", value.kind(), render(value, false)));
    match value {
        Literal::Char(c) => Ok(*c),
        Literal::Number(n) => number::to_index(n)
            .and_then(|i| u32::try_from(i).ok())
            .and_then(char::from_u32)
            .ok_or_else(failed),
        Literal::String(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(failed()),
            }
        }
        _ => Err(failed()),
    }
}

/// `{ Name kind; ... }` for the public fields of an object.
fn interface_of(value: &Literal) -> String {
    match value {
        Literal::Map { kind, entries } if kind.is_object() => {
            let mut s = String::from("{");
            for (name, field) in entries.iter().filter(|(name, _)| is_public(name)) {
                s.push_str(&format!(" {name} {};", field.kind()));
            }
            s.push_str(" }");
            s
        }
        other => other.kind().to_string(),
    }
}

fn property_missing(object: &Literal, prop: &str) -> RuntimeError {
    RuntimeError::Property(format!("{} has no property '{prop}'", object.kind()))
}

/// Fields of a map or object reached through reflection builtins.
fn properties(value: &Literal) -> Result<&BTreeMap<String, Literal>> {
    value
        .as_entries()
        .map_err(|_| RuntimeError::Property(format!("{} has no properties", value.kind())))
}

impl Instruction {
    /// Runs the instruction against the current frame of `vm`.
    ///
    /// `ip` already points at the next instruction; jumps overwrite it.
    pub fn execute(&self, ip: &mut usize, vm: &mut Vm) -> Result<()> {
        match self {
            Instruction::Assign { variable, source } => {
                let value = match source {
                    Source::Constant(lit) => lit.clone(),
                    Source::Register(r) => vm.get(r)?.clone(),
                };
                vm.set(variable, value);
            }

            Instruction::Add { left, right, result } => arithmetic(vm, left, right, result, |a, b| Ok(a + b))?,
            Instruction::Subtract { left, right, result } => arithmetic(vm, left, right, result, |a, b| Ok(a - b))?,
            Instruction::Multiply { left, right, result } => arithmetic(vm, left, right, result, |a, b| Ok(a * b))?,
            Instruction::Divide { left, right, result } => arithmetic(vm, left, right, result, number::divide)?,
            Instruction::Remainder { left, right, result } => arithmetic(vm, left, right, result, number::remainder)?,
            Instruction::Power { base, power, result } => arithmetic(vm, base, power, result, number::power)?,
            Instruction::Log { x, result } => {
                let value = number::log(vm.get(x)?.as_number()?)?;
                vm.set(result, Literal::Number(value));
            }

            Instruction::Concat { left, right, result } => {
                let value = format!("{}{}", vm.get(left)?.as_str()?, vm.get(right)?.as_str()?);
                vm.set(result, Literal::String(value));
            }
            Instruction::Combine { left, right, result } => {
                let mut value = vm.get(left)?.as_data()?.to_vec();
                value.extend_from_slice(vm.get(right)?.as_data()?);
                vm.set(result, Literal::Data(value));
            }

            Instruction::Equal { left, right, result } => {
                let value = vm.get(left)? == vm.get(right)?;
                vm.set(result, Literal::Bool(value));
            }
            Instruction::NotEqual { left, right, result } => {
                let value = vm.get(left)? != vm.get(right)?;
                vm.set(result, Literal::Bool(value));
            }
            Instruction::EqualNumber { left, right, result } => {
                compare_numbers(vm, left, right, result, |a, b| a == b)?;
            }
            Instruction::NotEqualNumber { left, right, result } => {
                compare_numbers(vm, left, right, result, |a, b| a != b)?;
            }
            Instruction::GreaterThanNumber { left, right, result } => {
                compare_numbers(vm, left, right, result, |a, b| a > b)?;
            }
            Instruction::GreaterThanString { left, right, result } => {
                compare_strings(vm, left, right, result, |a, b| a > b)?;
            }
            Instruction::LessThanNumber { left, right, result } => {
                compare_numbers(vm, left, right, result, |a, b| a < b)?;
            }
            Instruction::LessThanString { left, right, result } => {
                compare_strings(vm, left, right, result, |a, b| a < b)?;
            }
            Instruction::GreaterThanEqualNumber { left, right, result } => {
                compare_numbers(vm, left, right, result, |a, b| a >= b)?;
            }
            Instruction::GreaterThanEqualString { left, right, result } => {
                compare_strings(vm, left, right, result, |a, b| a >= b)?;
            }
            Instruction::LessThanEqualNumber { left, right, result } => {
                compare_numbers(vm, left, right, result, |a, b| a <= b)?;
            }
            Instruction::LessThanEqualString { left, right, result } => {
                compare_strings(vm, left, right, result, |a, b| a <= b)?;
            }

            Instruction::And { left, right, result } => logical(vm, left, right, result, |a, b| a && b)?,
            Instruction::Or { left, right, result } => logical(vm, left, right, result, |a, b| a || b)?,
            Instruction::Not { left, result } => {
                let value = !vm.get(left)?.as_bool()?;
                vm.set(result, Literal::Bool(value));
            }

            Instruction::ArrayAlloc { kind, size, result } => {
                let size = vm.get(size)?.as_number()?;
                let n = number::to_index(size)
                    .ok_or_else(|| RuntimeError::Index(format!("invalid array size {}", number::format(size))))?;
                let zero = Literal::zero(kind.element().unwrap_or(&Kind::ANY));
                vm.set(result, Literal::Array { kind: kind.clone(), elements: vec![zero; n] });
            }
            Instruction::ArrayGet { array, index, result } => {
                let elements = vm.get(array)?.as_elements()?;
                let i = index_of(vm.get(index)?, elements.len())?;
                let value = elements[i].clone();
                vm.set(result, value);
            }
            Instruction::ArraySet { array, index, value } => {
                let value = vm.get(value)?.clone();
                let len = vm.get(array)?.as_elements()?.len();
                let i = index_of(vm.get(index)?, len)?;
                match vm.get_mut(array)? {
                    Literal::Array { elements, .. } => {
                        if let Some(slot) = elements.get_mut(i) {
                            *slot = value;
                        }
                    }
                    other => return Err(RuntimeError::WrongKind { expected: "array", found: other.kind() }),
                }
            }
            Instruction::MapAlloc { kind, size: _, result } => {
                vm.set(result, Literal::Map { kind: kind.clone(), entries: BTreeMap::new() });
            }
            Instruction::MapGet { map, key, result } => {
                let object = vm.get(map)?;
                let key = vm.get(key)?.as_str()?;
                let value = object
                    .as_entries()?
                    .get(key)
                    .cloned()
                    .ok_or_else(|| property_missing(object, key))?;
                vm.set(result, value);
            }
            Instruction::MapSet { map, key, value } => {
                let value = vm.get(value)?.clone();
                let key = vm.get(key)?.as_str()?.to_string();
                match vm.get_mut(map)? {
                    Literal::Map { entries, .. } => {
                        entries.insert(key, value);
                    }
                    other => return Err(RuntimeError::WrongKind { expected: "map", found: other.kind() }),
                }
            }
            Instruction::Len { argument, result } => {
                let n = match vm.get(argument)? {
                    Literal::String(s) => s.chars().count(),
                    Literal::Array { elements, .. } => elements.len(),
                    Literal::Map { entries, .. } => entries.len(),
                    Literal::Data(d) => d.len(),
                    Literal::Char(c) => c.len_utf8(),
                    other => render(other, false).len(),
                };
                vm.set(result, Literal::Number(number::from_usize(n)));
            }
            Instruction::Props { object, result } => {
                let value = vm.get(object)?;
                let object_kind = value.kind().is_object();
                let names = properties(value)?
                    .keys()
                    .filter(|k| !object_kind || is_public(k))
                    .map(|k| Literal::String(k.clone()))
                    .collect();
                vm.set(result, Literal::array(Kind::array_of(Kind::STRING), names));
            }
            Instruction::Get { object, prop, result } => {
                let value = vm.get(object)?;
                let prop = match vm.get(prop)? {
                    Literal::String(s) => s.as_str(),
                    other => {
                        return Err(RuntimeError::Property(format!(
                            "property name must be a string, got {}",
                            other.kind()
                        )));
                    }
                };
                let found = properties(value)?
                    .get(prop)
                    .cloned()
                    .ok_or_else(|| property_missing(value, prop))?;
                vm.set(result, found);
            }
            Instruction::Set { object, prop, value, result } => {
                let value = vm.get(value)?.clone();
                let prop = vm.get(prop)?.as_str().ok().map(str::to_string);
                let ok = match (prop, vm.get_mut(object)?) {
                    (Some(prop), Literal::Map { entries, .. }) => match entries.get_mut(&prop) {
                        Some(current) if current.kind() == value.kind() => {
                            *current = value;
                            true
                        }
                        _ => false,
                    },
                    _ => false,
                };
                vm.set(result, Literal::Bool(ok));
            }
            Instruction::Type { value, result } => {
                let kind = vm.get(value)?.kind().to_string();
                vm.set(result, Literal::String(kind));
            }
            Instruction::Interface { value, result } => {
                let descriptor = interface_of(vm.get(value)?);
                vm.set(result, Literal::String(descriptor));
            }

            Instruction::CastNumber { x, result } => {
                let n = cast_number(vm.get(x)?)?;
                vm.set(result, Literal::Number(n));
            }
            Instruction::CastString { x, result } => {
                let s = render(vm.get(x)?, false);
                vm.set(result, Literal::String(s));
            }
            Instruction::CastChar { x, result } => {
                let c = cast_char(vm.get(x)?)?;
                vm.set(result, Literal::Char(c));
            }

            Instruction::Call { target, arguments, results } => {
                let (name, receiver) = match target {
                    CallTarget::Static(name) => (name.clone(), None),
                    CallTarget::Dynamic(r) => vm.callee(r)?,
                };
                let args = arguments
                    .iter()
                    .map(|r| vm.get(r).cloned())
                    .collect::<Result<Vec<_>>>()?;
                let values = vm.call_with(&name, receiver, args)?;
                if values.len() < results.len() {
                    return Err(RuntimeError::Call(format!(
                        "{name} returned {} values, expected {}",
                        values.len(),
                        results.len()
                    )));
                }
                for (r, v) in results.iter().zip(values) {
                    vm.set(r, v);
                }
            }
            Instruction::DynamicCall { function, arguments, result } => {
                let (name, receiver) = vm.callee(function)?;
                let args = match vm.get(arguments)? {
                    Literal::Array { elements, .. } => elements.clone(),
                    other => {
                        return Err(RuntimeError::Call(format!(
                            "arguments of {name} must be an array, got {}",
                            other.kind()
                        )));
                    }
                };
                let values = vm.call_with(&name, receiver, args)?;
                vm.set(result, Literal::array(Kind::array_of(Kind::ANY), values));
            }
            Instruction::Return { results } => {
                let values = results
                    .iter()
                    .map(|r| match r {
                        Register::State => vm.instance(),
                        other => vm.get(other).cloned(),
                    })
                    .collect::<Result<Vec<_>>>()?;
                vm.return_values(values)?;
            }

            Instruction::Jump { to } => *ip = *to,
            Instruction::JumpUnless { condition, to } => {
                if !vm.get(condition)?.as_bool()? {
                    *ip = *to;
                }
            }

            Instruction::On { .. } => {}
            Instruction::Finally { index, run } => vm.arm_finally(*index, *run)?,
            Instruction::Raise { value } => {
                let value = vm.get(value)?.clone();
                return Err(RuntimeError::Raised { kind: value.kind().to_string(), value });
            }

            Instruction::Print { arguments } => {
                let parts = arguments
                    .iter()
                    .map(|r| vm.get(r).map(|v| render(v, false)))
                    .collect::<Result<Vec<_>>>()?;
                vm.write_stdout(&format!("{}\n", parts.join(" ")))?;
            }
            Instruction::Interpolate { args, result } => {
                let mut s = String::new();
                for r in args {
                    s.push_str(&render(vm.get(r)?, false));
                }
                vm.set(result, Literal::String(s));
            }
        }
        Ok(())
    }

    fn binary(&self) -> Option<(&Register, &'static str, &Register, &Register)> {
        Some(match self {
            Instruction::Add { left, right, result } => (left, "+", right, result),
            Instruction::Subtract { left, right, result } => (left, "-", right, result),
            Instruction::Multiply { left, right, result } => (left, "*", right, result),
            Instruction::Divide { left, right, result } => (left, "/", right, result),
            Instruction::Remainder { left, right, result } => (left, "%", right, result),
            Instruction::Power { base, power, result } => (base, "^", power, result),
            Instruction::Concat { left, right, result } => (left, "+", right, result),
            Instruction::Combine { left, right, result } => (left, "+", right, result),
            Instruction::Equal { left, right, result } => (left, "==", right, result),
            Instruction::NotEqual { left, right, result } => (left, "!=", right, result),
            Instruction::EqualNumber { left, right, result } => (left, "==", right, result),
            Instruction::NotEqualNumber { left, right, result } => (left, "!=", right, result),
            Instruction::GreaterThanNumber { left, right, result }
            | Instruction::GreaterThanString { left, right, result } => (left, ">", right, result),
            Instruction::LessThanNumber { left, right, result }
            | Instruction::LessThanString { left, right, result } => (left, "<", right, result),
            Instruction::GreaterThanEqualNumber { left, right, result }
            | Instruction::GreaterThanEqualString { left, right, result } => (left, ">=", right, result),
            Instruction::LessThanEqualNumber { left, right, result }
            | Instruction::LessThanEqualString { left, right, result } => (left, "<=", right, result),
            Instruction::And { left, right, result } => (left, "and", right, result),
            Instruction::Or { left, right, result } => (left, "or", right, result),
            _ => return None,
        })
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some((left, op, right, result)) = self.binary() {
            return write!(f, "{result} = {left} {op} {right}");
        }
        match self {
            Instruction::Assign { variable, source: Source::Constant(lit) } => {
                write!(f, "{variable} = {}", render(lit, true))
            }
            Instruction::Assign { variable, source: Source::Register(r) } => write!(f, "{variable} = {r}"),
            Instruction::Log { x, result } => write!(f, "{result} = log({x})"),
            Instruction::Not { left, result } => write!(f, "{result} = not {left}"),
            Instruction::ArrayAlloc { kind, size, result } => write!(f, "{result} = {kind} with {size} elements"),
            Instruction::ArrayGet { array, index, result } => write!(f, "{result} = {array}[{index}]"),
            Instruction::ArraySet { array, index, value } => write!(f, "{array}[{index}] = {value}"),
            Instruction::MapAlloc { kind, size, result } => write!(f, "{result} = {kind} with {size} elements"),
            Instruction::MapGet { map, key, result } => write!(f, "{result} = {map}[{key}]"),
            Instruction::MapSet { map, key, value } => write!(f, "{map}[{key}] = {value}"),
            Instruction::Len { argument, result } => write!(f, "{result} = len({argument})"),
            Instruction::Props { object, result } => write!(f, "{result} = props({object})"),
            Instruction::Get { object, prop, result } => write!(f, "{result} = get({object}, {prop})"),
            Instruction::Set { object, prop, value, result } => {
                write!(f, "{result} = set({object}, {prop}, {value})")
            }
            Instruction::Type { value, result } => write!(f, "{result} = type({value})"),
            Instruction::Interface { value, result } => write!(f, "{result} = interface({value})"),
            Instruction::CastNumber { x, result } => write!(f, "{result} = number({x})"),
            Instruction::CastString { x, result } => write!(f, "{result} = string({x})"),
            Instruction::CastChar { x, result } => write!(f, "{result} = char({x})"),
            Instruction::Call { target, arguments, results } => {
                if !results.is_empty() {
                    write!(f, "{} = ", Registers(results))?;
                }
                match target {
                    CallTarget::Static(name) => write!(f, "{name}")?,
                    CallTarget::Dynamic(r) => write!(f, "*{r}")?,
                }
                write!(f, "({})", Registers(arguments))
            }
            Instruction::DynamicCall { function, arguments, result } => {
                write!(f, "{result} = call({function}, {arguments})")
            }
            Instruction::Return { results } => write!(f, "return {}", Registers(results)),
            Instruction::Jump { to } => write!(f, "jump {to}"),
            Instruction::JumpUnless { condition, to } => write!(f, "if not {condition} jump {to}"),
            Instruction::On { kind } if kind.is_empty() => write!(f, "on *"),
            Instruction::On { kind } => write!(f, "on {kind}"),
            Instruction::Finally { index, run } => {
                write!(f, "finally {index} {}", if *run { "arm" } else { "run" })
            }
            Instruction::Raise { value } => write!(f, "raise {value}"),
            Instruction::Print { arguments } => write!(f, "print({})", Registers(arguments)),
            Instruction::Interpolate { args, result } => write!(f, "{result} = interpolate({})", Registers(args)),
            _ => Ok(()),
        }
    }
}
