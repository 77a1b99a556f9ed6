//! Host-implemented functions callable from guest code.
//!
//! The compiler reads signatures from the library and the VM invokes the
//! callbacks; both get the same explicitly constructed [`NativeLibrary`].

use std::collections::HashMap;

use bigdecimal::{BigDecimal, RoundingMode};

use crate::kind::Kind;

use super::{Literal, RuntimeError};

pub type NativeFn = fn(&[Literal]) -> Result<Vec<Literal>, RuntimeError>;

#[derive(Clone)]
pub struct NativeFunc {
    pub kind: Kind,
    pub implementation: NativeFn,
}

impl NativeFunc {
    pub fn returns(&self) -> &[Kind] {
        match &self.kind {
            Kind::Func { returns, .. } => returns,
            _ => &[],
        }
    }

    pub fn args(&self) -> &[Kind] {
        match &self.kind {
            Kind::Func { args, .. } => args,
            _ => &[],
        }
    }
}

#[derive(Clone, Default)]
pub struct NativeLibrary {
    funcs: HashMap<String, NativeFunc>,
}

impl NativeLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, args: Vec<Kind>, returns: Vec<Kind>, implementation: NativeFn) {
        self.funcs.insert(name.into(), NativeFunc { kind: Kind::func(args, returns), implementation });
    }

    pub fn get(&self, name: &str) -> Option<&NativeFunc> {
        self.funcs.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.funcs.keys().map(String::as_str)
    }

    /// The `math` and `strings` packages.
    pub fn standard() -> Self {
        let mut lib = Self::new();
        let n = || vec![Kind::NUMBER];
        let s = || vec![Kind::STRING];
        lib.register("math.abs", n(), n(), |args| number_fn(args, |x| x.abs()));
        lib.register("math.floor", n(), n(), |args| number_fn(args, |x| x.with_scale_round(0, RoundingMode::Floor)));
        lib.register("math.ceil", n(), n(), |args| number_fn(args, |x| x.with_scale_round(0, RoundingMode::Ceiling)));
        lib.register("strings.ToUpper", s(), s(), |args| string_fn(args, str::to_uppercase));
        lib.register("strings.ToLower", s(), s(), |args| string_fn(args, str::to_lowercase));
        lib
    }
}

fn single(args: &[Literal]) -> Result<&Literal, RuntimeError> {
    match args {
        [one] => Ok(one),
        _ => Err(RuntimeError::Call(format!("expected 1 argument, got {}", args.len()))),
    }
}

fn number_fn(args: &[Literal], f: fn(&BigDecimal) -> BigDecimal) -> Result<Vec<Literal>, RuntimeError> {
    let x = single(args)?.as_number()?;
    Ok(vec![Literal::Number(f(x))])
}

fn string_fn(args: &[Literal], f: fn(&str) -> String) -> Result<Vec<Literal>, RuntimeError> {
    let s = single(args)?.as_str()?;
    Ok(vec![Literal::String(f(s))])
}
