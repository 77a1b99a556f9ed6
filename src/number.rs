//! Canonical handling of `number` values.
//!
//! Numbers are arbitrary precision decimals. Every place that turns a number
//! into text goes through [`format`] so `1.0`, `1.00` and `1` are
//! indistinguishable once printed.

use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::{BigInt, Sign};
use num_traits::{One, ToPrimitive, Zero};

/// Largest integer exponent `power` expands exactly.
const MAX_EXPONENT: u64 = 100_000;

/// Why a number operation has no result.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NumberError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("{0}")]
    Undefined(String),
}

pub fn parse(text: &str) -> Option<BigDecimal> {
    BigDecimal::from_str(text.trim()).ok()
}

/// Plain decimal notation without trailing zeros, never an exponent.
pub fn format(n: &BigDecimal) -> String {
    let (digits, scale) = n.normalized().as_bigint_and_exponent();
    if digits.is_zero() {
        return "0".to_string();
    }
    let sign = if digits.sign() == Sign::Minus { "-" } else { "" };
    let digits = digits.magnitude().to_string();
    let body = if scale <= 0 {
        format!("{digits}{}", "0".repeat(scale.unsigned_abs() as usize))
    } else {
        let scale = scale.unsigned_abs() as usize;
        if digits.len() > scale {
            let (int, frac) = digits.split_at(digits.len() - scale);
            format!("{int}.{frac}")
        } else {
            format!("0.{}{digits}", "0".repeat(scale - digits.len()))
        }
    };
    format!("{sign}{body}")
}

/// Returns the value as an index if it is a non-negative integer.
pub fn to_index(n: &BigDecimal) -> Option<usize> {
    if !n.is_integer() || n < &BigDecimal::zero() {
        return None;
    }
    n.to_usize()
}

pub fn from_usize(n: usize) -> BigDecimal {
    BigDecimal::new(BigInt::from(n), 0)
}

/// Shortest decimal that reads back as `x`.
fn from_f64(x: f64) -> Option<BigDecimal> {
    if !x.is_finite() {
        return None;
    }
    parse(&x.to_string())
}

/// Natural logarithm of a positive number, taken from its leading digits and
/// decimal exponent so magnitudes outside `f64` still work.
fn ln_f64(n: &BigDecimal) -> f64 {
    if let Some(x) = n.to_f64().filter(|x| x.is_normal()) {
        return x.ln();
    }
    let (digits, scale) = n.as_bigint_and_exponent();
    let digits = digits.magnitude().to_string();
    let (first, rest) = digits.split_at(1);
    let rest = &rest[..rest.len().min(16)];
    let mantissa: f64 = format!("{first}.{rest}0").parse().unwrap_or(f64::NAN);
    let exponent = (digits.len() - 1) as f64 - scale as f64;
    mantissa.ln() + exponent * std::f64::consts::LN_10
}

pub fn divide(a: &BigDecimal, b: &BigDecimal) -> Result<BigDecimal, NumberError> {
    if b.is_zero() {
        return Err(NumberError::DivisionByZero);
    }
    Ok(a / b)
}

pub fn remainder(a: &BigDecimal, b: &BigDecimal) -> Result<BigDecimal, NumberError> {
    if b.is_zero() {
        return Err(NumberError::DivisionByZero);
    }
    Ok(a % b)
}

fn powi(base: &BigDecimal, mut exponent: u64) -> BigDecimal {
    let mut result = BigDecimal::one();
    let mut square = base.clone();
    while exponent > 0 {
        if exponent & 1 == 1 {
            result = &result * &square;
        }
        exponent >>= 1;
        if exponent > 0 {
            square = &square * &square;
        }
    }
    result
}

/// `base ^ exponent`. Integer exponents are exact; fractional ones go
/// through `f64`.
pub fn power(base: &BigDecimal, exponent: &BigDecimal) -> Result<BigDecimal, NumberError> {
    let out_of_range = || NumberError::Undefined(format!("{} ^ {} is out of range", format(base), format(exponent)));

    if base.is_zero() {
        return match exponent.cmp(&BigDecimal::zero()) {
            Ordering::Less => Err(NumberError::DivisionByZero),
            Ordering::Equal => Ok(BigDecimal::one()),
            Ordering::Greater => Ok(BigDecimal::zero()),
        };
    }

    if exponent.is_integer() {
        let e = exponent
            .to_i64()
            .filter(|e| e.unsigned_abs() <= MAX_EXPONENT)
            .ok_or_else(out_of_range)?;
        let value = powi(base, e.unsigned_abs());
        return Ok(if e < 0 { BigDecimal::one() / value } else { value });
    }

    if base < &BigDecimal::zero() {
        return Err(NumberError::Undefined(format!(
            "cannot raise negative number {} to non-integer power {}",
            format(base),
            format(exponent)
        )));
    }
    let e = exponent.to_f64().ok_or_else(out_of_range)?;
    let value = match base.to_f64().filter(|b| b.is_normal()) {
        Some(b) => b.powf(e),
        None => (e * ln_f64(base)).exp(),
    };
    from_f64(value).ok_or_else(out_of_range)
}

/// Natural logarithm.
pub fn log(n: &BigDecimal) -> Result<BigDecimal, NumberError> {
    if n <= &BigDecimal::zero() {
        return Err(NumberError::Undefined(format!("log of non-positive number {}", format(n))));
    }
    from_f64(ln_f64(n)).ok_or_else(|| NumberError::Undefined(format!("log of {} is out of range", format(n))))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(s: &str) -> BigDecimal {
        parse(s).unwrap()
    }

    #[test]
    fn trailing_zeros_are_dropped() {
        assert_eq!(format(&n("1.0")), "1");
        assert_eq!(format(&n("1.2300")), "1.23");
        assert_eq!(format(&n("-0.0")), "0");
        assert_eq!(format(&n("120")), "120");
        assert_eq!(format(&n("-0.05")), "-0.05");
    }

    #[test]
    fn parse_accepts_plain_and_scientific() {
        assert_eq!(parse(" 42 "), Some(BigDecimal::from(42)));
        assert_eq!(parse("1e3"), Some(BigDecimal::from(1000)));
        assert_eq!(parse("abc"), None);
        assert_eq!(parse(""), None);
    }

    #[test]
    fn equal_values_compare_equal() {
        assert_eq!(parse("1"), parse("1.000"));
    }

    #[test]
    fn precision_is_not_bounded() {
        let big = "123456789012345678901234567890123";
        assert_eq!(format(&n(big)), big);
        assert_eq!(format(&(&n("1e20") * &n("1e20"))), format!("1{}", "0".repeat(40)));
        let tiny = &n("0.1") * &n("0.00000000000000000000000000001");
        assert_eq!(format(&tiny), format!("0.{}1", "0".repeat(29)));
    }

    #[test]
    fn indexes() {
        assert_eq!(to_index(&BigDecimal::from(3)), Some(3));
        assert_eq!(to_index(&n("1.5")), None);
        assert_eq!(to_index(&BigDecimal::from(-1)), None);
        assert_eq!(to_index(&n("-0")), Some(0));
        assert_eq!(to_index(&n("2.000")), Some(2));
    }

    #[test]
    fn integer_powers_are_exact() {
        assert_eq!(power(&n("2"), &n("10")), Ok(n("1024")));
        assert_eq!(power(&n("1.5"), &n("2")), Ok(n("2.25")));
        assert_eq!(power(&n("2"), &n("-2")), Ok(n("0.25")));
        assert_eq!(power(&n("-2"), &n("3")), Ok(n("-8")));
        assert_eq!(format(&power(&n("10"), &n("30")).unwrap()), format!("1{}", "0".repeat(30)));
    }

    #[test]
    fn undefined_powers() {
        assert_eq!(power(&n("0"), &n("-1")), Err(NumberError::DivisionByZero));
        assert_eq!(power(&n("0"), &n("-0.5")), Err(NumberError::DivisionByZero));
        assert_eq!(power(&n("0"), &n("0")), Ok(n("1")));
        assert!(matches!(power(&n("-8"), &n("0.5")), Err(NumberError::Undefined(_))));
        assert!(matches!(power(&n("2"), &n("1e9")), Err(NumberError::Undefined(_))));
    }

    #[test]
    fn fractional_powers() {
        assert_eq!(power(&n("4"), &n("0.5")), Ok(n("2")));
        assert_eq!(power(&n("0.25"), &n("0.5")), Ok(n("0.5")));
    }

    #[test]
    fn division() {
        assert_eq!(divide(&n("1"), &n("0.0")), Err(NumberError::DivisionByZero));
        assert_eq!(divide(&n("7"), &n("2")), Ok(n("3.5")));
        assert_eq!(remainder(&n("7"), &n("3")), Ok(n("1")));
        assert_eq!(remainder(&n("7"), &n("0")), Err(NumberError::DivisionByZero));
    }

    #[test]
    fn logarithms() {
        assert_eq!(log(&n("1")), Ok(n("0")));
        assert!(matches!(log(&n("0")), Err(NumberError::Undefined(_))));
        assert!(matches!(log(&n("-3")), Err(NumberError::Undefined(_))));
        let huge = log(&n("1e400")).unwrap();
        assert!(huge > n("921") && huge < n("922"), "{}", format(&huge));
        let huge = log(&n("3e400")).unwrap();
        assert!(huge > n("922") && huge < n("923"), "{}", format(&huge));
    }
}
