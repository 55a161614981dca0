//! Argument evaluation helpers for builtins.
//!
//! Arguments are evaluated left to right; the first abort stops evaluation and
//! drops whatever was already produced.

use crate::errors::Abort;
use crate::expr::{evaluate, evaluate_string, Expr};
use crate::state::ExecutionState;
use crate::value::Value;

fn plural(n: usize) -> &'static str {
    if n == 1 {
        "arg"
    } else {
        "args"
    }
}

/// Abort unless exactly `expected` arguments were passed.
pub fn check_arity(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
    expected: usize,
) -> Result<(), Abort> {
    if argv.len() != expected {
        return Err(state.error_abort(format!(
            "{}() expects {} {}, got {}",
            name,
            expected,
            plural(expected),
            argv.len()
        )));
    }
    Ok(())
}

/// Evaluate exactly `N` string arguments.
pub fn read_args<const N: usize>(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<[String; N], Abort> {
    check_arity(name, state, argv, N)?;
    let mut out: [String; N] = std::array::from_fn(|_| String::new());
    for (slot, expr) in out.iter_mut().zip(argv) {
        *slot = evaluate_string(state, expr)?;
    }
    Ok(out)
}

/// Evaluate exactly `N` arguments of any kind.
pub fn read_value_args<const N: usize>(
    name: &str,
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<[Value; N], Abort> {
    check_arity(name, state, argv, N)?;
    let mut out: [Value; N] = std::array::from_fn(|_| Value::empty());
    for (slot, expr) in out.iter_mut().zip(argv) {
        *slot = evaluate(state, expr)?;
    }
    Ok(out)
}

pub fn read_var_args(state: &mut ExecutionState<'_>, argv: &[Expr]) -> Result<Vec<String>, Abort> {
    argv.iter().map(|e| evaluate_string(state, e)).collect()
}

pub fn read_value_var_args(
    state: &mut ExecutionState<'_>,
    argv: &[Expr],
) -> Result<Vec<Value>, Abort> {
    argv.iter().map(|e| evaluate(state, e)).collect()
}

/// Split an optional sign and the digits of a C-style integer after leading whitespace.
fn split_sign(s: &str) -> (bool, &str) {
    let s = s.trim_start();
    match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    }
}

fn leading_digits(s: &str, radix: u32) -> &str {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_digit(radix))
        .map_or(s.len(), |(i, _)| i);
    &s[..end]
}

/// `strtol(s, &end, 10)`: `None` when no digits were consumed. Trailing text is ignored.
pub fn parse_c_long(s: &str) -> Option<i64> {
    let (negative, rest) = split_sign(s);
    let digits = leading_digits(rest, 10);
    if digits.is_empty() {
        return None;
    }
    let magnitude = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(if negative { -magnitude } else { magnitude })
}

/// `strtol`/`atoll` with C leniency: garbage reads as 0.
pub fn c_long_or_zero(s: &str) -> i64 {
    parse_c_long(s).unwrap_or(0)
}

/// `strtod` with C leniency: the longest numeric prefix, or 0.
pub fn c_double_or_zero(s: &str) -> f64 {
    let s = s.trim_start();
    let mut end = s.len();
    while end > 0 {
        if s.is_char_boundary(end) {
            if let Ok(v) = s[..end].parse::<f64>() {
                return v;
            }
        }
        end -= 1;
    }
    0.0
}

/// `strtoul(s, &end, 0)` that must consume the whole, non-empty string:
/// `0x` prefix for hex, leading `0` for octal, decimal otherwise.
pub fn parse_c_ulong_base0(s: &str) -> Option<u64> {
    if s.is_empty() {
        return None;
    }
    let (negative, rest) = split_sign(s);
    let (radix, digits) = if let Some(hex) = rest
        .strip_prefix("0x")
        .or_else(|| rest.strip_prefix("0X"))
    {
        (16, hex)
    } else if rest.len() > 1 && rest.starts_with('0') {
        (8, &rest[1..])
    } else {
        (10, rest)
    };
    if digits.is_empty() || leading_digits(digits, radix).len() != digits.len() {
        return None;
    }
    let magnitude = u64::from_str_radix(digits, radix).ok()?;
    Some(if negative {
        magnitude.wrapping_neg()
    } else {
        magnitude
    })
}
