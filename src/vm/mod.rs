use std::collections::{BTreeMap, HashMap};
use std::io::{self, Write};
use std::ops::Range;
use std::rc::Rc;

use tracing::{debug, trace, warn};

use crate::kind::Kind;
use crate::number::NumberError;

mod func;
mod instruction;
mod literal;
mod native;
mod register;
mod render;

pub use func::{CompiledFunc, ErrorScope, FinallyRange, Handler, Program};
pub use instruction::{CallTarget, Instruction, Source};
pub use literal::Literal;
pub use native::{NativeFn, NativeFunc, NativeLibrary};
pub use register::Register;
pub use render::render;

/// Guest recursion is backed by host recursion; this bounds it.
const MAX_CALL_DEPTH: usize = 1024;

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("{0}")]
    Cast(String),
    #[error("{0}")]
    Arithmetic(String),
    #[error("{0}")]
    Call(String),
    #[error("{0}")]
    Property(String),
    #[error("{0}")]
    Index(String),
    #[error("undefined function: {0}")]
    UndefinedFunction(String),
    #[error("{kind}: {}", raised_message(.value))]
    Raised { kind: String, value: Literal },
    #[error("expected {expected} value, found {found}")]
    WrongKind { expected: &'static str, found: Kind },
    #[error("read of unset register {0}")]
    UnsetRegister(Register),
    #[error("cannot write output: {0}")]
    Io(#[from] io::Error),
}

fn raised_message(value: &Literal) -> String {
    match value {
        Literal::Map { entries, .. } => match entries.get("Error") {
            Some(message) => render(message, false),
            None => render(value, false),
        },
        other => render(other, false),
    }
}

impl RuntimeError {
    /// The type name guest handlers match against.
    pub fn error_type(&self) -> String {
        match self {
            RuntimeError::DivisionByZero => "DivisionByZero".to_string(),
            RuntimeError::Cast(_) => "CastError".to_string(),
            RuntimeError::Arithmetic(_) => "ArithmeticError".to_string(),
            RuntimeError::Call(_) | RuntimeError::UndefinedFunction(_) => "CallError".to_string(),
            RuntimeError::Property(_) => "PropertyError".to_string(),
            RuntimeError::Index(_) => "IndexError".to_string(),
            RuntimeError::Raised { kind, .. } => kind.clone(),
            RuntimeError::WrongKind { .. } | RuntimeError::UnsetRegister(_) | RuntimeError::Io(_) => {
                "RuntimeError".to_string()
            }
        }
    }

    /// Internal failures are never visible to guest handlers.
    pub fn is_guest(&self) -> bool {
        !matches!(
            self,
            RuntimeError::WrongKind { .. } | RuntimeError::UnsetRegister(_) | RuntimeError::Io(_)
        )
    }

    /// The value bound to `err` inside a handler.
    pub fn to_literal(&self) -> Literal {
        match self {
            RuntimeError::Raised { value, .. } => value.clone(),
            other => {
                let mut entries = BTreeMap::new();
                entries.insert("Error".to_string(), Literal::String(other.to_string()));
                Literal::Map { kind: Kind::named(other.error_type()), entries }
            }
        }
    }
}

impl From<NumberError> for RuntimeError {
    fn from(err: NumberError) -> Self {
        match err {
            NumberError::DivisionByZero => RuntimeError::DivisionByZero,
            NumberError::Undefined(message) => RuntimeError::Arithmetic(message),
        }
    }
}

pub type Result<T> = std::result::Result<T, RuntimeError>;

struct Frame {
    func: Rc<CompiledFunc>,
    registers: HashMap<Register, Literal>,
    armed: Vec<bool>,
    returned: Option<Vec<Literal>>,
}

enum Flow {
    FellThrough,
    Returned(Vec<Literal>),
}

enum Recovery {
    Resume(usize),
    Returned(Vec<Literal>),
}

/// Executes compiled functions against a stack of register frames.
pub struct Vm {
    funcs: HashMap<String, Rc<CompiledFunc>>,
    natives: NativeLibrary,
    stack: Vec<Frame>,
    stdout: Box<dyn Write>,
}

impl Vm {
    pub fn new(program: Program, natives: NativeLibrary) -> Self {
        Self::with_stdout(program, natives, Box::new(io::stdout()))
    }

    pub fn with_stdout(program: Program, natives: NativeLibrary, stdout: Box<dyn Write>) -> Self {
        let funcs = program
            .funcs
            .into_iter()
            .map(|f| (f.name.clone(), Rc::new(f)))
            .collect();
        Vm { funcs, natives, stack: Vec::new(), stdout }
    }

    /// Runs `entry` to completion. An error that escapes every handler is
    /// returned here.
    pub fn run(&mut self, entry: &str, args: Vec<Literal>) -> Result<Vec<Literal>> {
        let result = self.call(entry, args);
        self.stdout.flush()?;
        if let Err(err) = &result {
            warn!(entry, error = %err, "uncaught error");
        }
        result
    }

    /// Calls a compiled or native function by name.
    pub fn call(&mut self, name: &str, args: Vec<Literal>) -> Result<Vec<Literal>> {
        self.call_with(name, None, args)
    }

    /// Like [`Vm::call`]. A method also gets the object it belongs to, whose
    /// fields become its variables.
    pub(crate) fn call_with(&mut self, name: &str, receiver: Option<Literal>, args: Vec<Literal>) -> Result<Vec<Literal>> {
        if let Some(func) = self.funcs.get(name).cloned() {
            return self.call_compiled(func, receiver, args);
        }
        if let Some(native) = self.natives.get(name) {
            check_arguments(name, native.args(), &args)?;
            debug!(name, args = args.len(), "native call");
            return (native.implementation)(&args);
        }
        Err(RuntimeError::UndefinedFunction(name.to_string()))
    }

    fn call_compiled(&mut self, func: Rc<CompiledFunc>, receiver: Option<Literal>, args: Vec<Literal>) -> Result<Vec<Literal>> {
        let params: Vec<Kind> = func.arguments.iter().map(|(_, k)| k.clone()).collect();
        check_arguments(&func.name, &params, &args)?;
        if self.stack.len() >= MAX_CALL_DEPTH {
            return Err(RuntimeError::Call(format!("call depth exceeded in {}", func.name)));
        }
        debug!(name = %func.name, depth = self.stack.len(), "call");

        let mut registers = HashMap::new();
        if let Some(object @ Literal::Map { entries, .. }) = &receiver {
            let mut fields = entries.clone();
            self.bind_methods(&mut fields, object);
            registers.extend(fields.into_iter().map(|(name, value)| (Register::var(name), value)));
        }
        registers.extend(
            func.arguments
                .iter()
                .zip(args)
                .map(|((name, _), value)| (Register::var(name.clone()), value)),
        );
        self.stack.push(Frame {
            func: Rc::clone(&func),
            registers,
            armed: vec![false; func.finally_count()],
            returned: None,
        });
        let flow = self.run_range(0..func.len());
        self.stack.pop();

        match flow? {
            Flow::Returned(values) => Ok(values),
            Flow::FellThrough if func.returns.is_empty() => Ok(Vec::new()),
            Flow::FellThrough => Err(RuntimeError::Call(format!("{} ended without returning a value", func.name))),
        }
    }

    /// Executes instructions of the current frame within `bounds`. Only error
    /// scopes lying entirely inside `bounds` take part in recovery.
    fn run_range(&mut self, bounds: Range<usize>) -> Result<Flow> {
        let func = Rc::clone(&self.frame()?.func);
        let mut ip = bounds.start;
        while ip < bounds.end {
            let Some(ins) = func.instructions.get(ip) else { break };
            trace!(func = %func.name, ip, instruction = %ins);
            let at = ip;
            ip += 1;
            match ins.execute(&mut ip, self) {
                Ok(()) => {
                    if let Some(values) = self.frame_mut()?.returned.take() {
                        return self.unwind_return(&func, at, &bounds, values);
                    }
                }
                Err(err) => match self.recover(&func, at, &bounds, err)? {
                    Recovery::Resume(to) => ip = to,
                    Recovery::Returned(values) => return Ok(Flow::Returned(values)),
                },
            }
        }
        Ok(Flow::FellThrough)
    }

    fn scopes_at<'f>(func: &'f CompiledFunc, at: usize, bounds: &Range<usize>) -> impl Iterator<Item = &'f ErrorScope> {
        let (start, end) = (bounds.start, bounds.end);
        func.scopes
            .iter()
            .filter(move |s| s.contains(at) && s.try_start >= start && s.exit < end)
    }

    /// Finds a handler for `err` raised at `at`, running armed finally
    /// blocks of the scopes it leaves on the way out.
    fn recover(&mut self, func: &CompiledFunc, at: usize, bounds: &Range<usize>, mut err: RuntimeError) -> Result<Recovery> {
        for scope in Self::scopes_at(func, at, bounds) {
            if scope.in_try(at) && err.is_guest() {
                let error_type = err.error_type();
                if let Some(handler) = scope.handler_for(&error_type) {
                    debug!(func = %func.name, error_type = %error_type, handler = handler.index, "error handled");
                    let value = err.to_literal();
                    self.set(&Register::var("err"), value);
                    return Ok(Recovery::Resume(handler.index));
                }
            }
            if let Some(finally) = &scope.finally {
                match self.run_finally(finally) {
                    Ok(None) => {}
                    Ok(Some(values)) => return Ok(Recovery::Returned(values)),
                    Err(next) => err = next,
                }
            }
        }
        Err(err)
    }

    /// Runs the armed finally blocks around a `return` before leaving.
    fn unwind_return(&mut self, func: &CompiledFunc, at: usize, bounds: &Range<usize>, mut values: Vec<Literal>) -> Result<Flow> {
        for scope in Self::scopes_at(func, at, bounds) {
            if let Some(finally) = &scope.finally {
                if let Some(replaced) = self.run_finally(finally)? {
                    values = replaced;
                }
            }
        }
        Ok(Flow::Returned(values))
    }

    /// Runs a finally body if it is still armed. The body starts with its
    /// disarming `Finally` so it never runs twice.
    fn run_finally(&mut self, finally: &FinallyRange) -> Result<Option<Vec<Literal>>> {
        if !self.frame()?.armed.get(finally.index).copied().unwrap_or(false) {
            return Ok(None);
        }
        debug!(index = finally.index, "running finally");
        match self.run_range(finally.start..finally.end)? {
            Flow::FellThrough => Ok(None),
            Flow::Returned(values) => Ok(Some(values)),
        }
    }

    // ── Frame access used by instructions ───────────────────────────

    fn frame(&self) -> Result<&Frame> {
        self.stack
            .last()
            .ok_or_else(|| RuntimeError::Call("no active call frame".to_string()))
    }

    fn frame_mut(&mut self) -> Result<&mut Frame> {
        self.stack
            .last_mut()
            .ok_or_else(|| RuntimeError::Call("no active call frame".to_string()))
    }

    pub(crate) fn get(&self, r: &Register) -> Result<&Literal> {
        self.frame()?
            .registers
            .get(r)
            .ok_or_else(|| RuntimeError::UnsetRegister(r.clone()))
    }

    pub(crate) fn get_mut(&mut self, r: &Register) -> Result<&mut Literal> {
        self.frame_mut()?
            .registers
            .get_mut(r)
            .ok_or_else(|| RuntimeError::UnsetRegister(r.clone()))
    }

    pub(crate) fn set(&mut self, r: &Register, value: Literal) {
        if let Some(frame) = self.stack.last_mut() {
            frame.registers.insert(r.clone(), value);
        }
    }

    pub(crate) fn arm_finally(&mut self, index: usize, run: bool) -> Result<()> {
        let frame = self.frame_mut()?;
        if index >= frame.armed.len() {
            frame.armed.resize(index + 1, false);
        }
        frame.armed[index] = run;
        Ok(())
    }

    pub(crate) fn return_values(&mut self, values: Vec<Literal>) -> Result<()> {
        self.frame_mut()?.returned = Some(values);
        Ok(())
    }

    /// The object under construction: every variable of the frame, typed by
    /// the constructor's name. Its methods are bound to a copy of it.
    pub(crate) fn instance(&self) -> Result<Literal> {
        let frame = self.frame()?;
        let kind = Kind::named(frame.func.name.clone());
        let mut entries: BTreeMap<String, Literal> = frame
            .registers
            .iter()
            .filter_map(|(r, v)| r.as_var().map(|name| (name.to_string(), v.clone())))
            .collect();
        let object = Literal::Map { kind: kind.clone(), entries: entries.clone() };
        self.bind_methods(&mut entries, &object);
        Ok(Literal::Map { kind, entries })
    }

    fn is_method_of(&self, name: &str, owner: &str) -> bool {
        self.funcs
            .get(name)
            .is_some_and(|f| f.method_of.as_deref() == Some(owner))
    }

    /// Gives each unbound method among `entries` the receiver `object`.
    fn bind_methods(&self, entries: &mut BTreeMap<String, Literal>, object: &Literal) {
        let Kind::Named(owner) = object.kind() else { return };
        for value in entries.values_mut() {
            if let Literal::Func { name, receiver, .. } = value {
                if receiver.is_none() && self.is_method_of(name, &owner) {
                    *receiver = Some(Box::new(object.clone()));
                }
            }
        }
    }

    /// The function held by `r` and the object it is called on. A method
    /// called inside its own constructor sees the fields set so far.
    pub(crate) fn callee(&self, r: &Register) -> Result<(String, Option<Literal>)> {
        match self.get(r)? {
            Literal::Func { name, receiver: Some(object), .. } => Ok((name.clone(), Some((**object).clone()))),
            Literal::Func { name, .. } => {
                let receiver = if self.is_method_of(name, &self.frame()?.func.name) {
                    Some(self.instance()?)
                } else {
                    None
                };
                Ok((name.clone(), receiver))
            }
            other => Err(RuntimeError::Call(format!("cannot call value of kind {}", other.kind()))),
        }
    }

    pub(crate) fn write_stdout(&mut self, s: &str) -> Result<()> {
        self.stdout.write_all(s.as_bytes())?;
        Ok(())
    }
}

fn check_arguments(name: &str, params: &[Kind], args: &[Literal]) -> Result<()> {
    if params.len() != args.len() {
        return Err(RuntimeError::Call(format!(
            "{name} expects {} arguments, got {}",
            params.len(),
            args.len()
        )));
    }
    for (i, (param, arg)) in params.iter().zip(args).enumerate() {
        let kind = arg.kind();
        if !param.accepts(&kind) {
            return Err(RuntimeError::Call(format!(
                "argument {} of {name} must be {param}, got {kind}",
                i + 1
            )));
        }
    }
    Ok(())
}
