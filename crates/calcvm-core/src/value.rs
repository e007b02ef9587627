//! The VM's value domain (spec.md §3) and the arbitrary-precision number tower
//! (SPEC_FULL.md §4.0). Grounded in `examples/original_source/eval.go`'s upcast rules
//! and `examples/original_source/list.go`'s clone dispatcher, re-expressed over
//! `num_bigint::BigInt` / `bigdecimal::BigDecimal` instead of Go's native numeric kinds.

use std::fmt;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use num_traits::{Signed, Zero};

use crate::vm::error::RuntimeError;

/// An arbitrary-precision scalar: either an integer or a float.
///
/// Binary operations between an `Int` and a `Float` upcast the `Int` side;
/// the reverse never happens (spec.md §3, SPEC_FULL.md §4.0).
#[derive(Debug, Clone, PartialEq)]
pub enum Number {
    Int(BigInt),
    Float(BigDecimal),
}

impl Number {
    #[must_use]
    pub fn is_float(&self) -> bool {
        matches!(self, Self::Float(_))
    }

    #[must_use]
    pub fn as_float(&self) -> BigDecimal {
        match self {
            Self::Int(i) => BigDecimal::from(i.clone()),
            Self::Float(f) => f.clone(),
        }
    }

    fn upcast_pair(a: &Number, b: &Number) -> (Number, Number) {
        match (a.is_float(), b.is_float()) {
            (false, false) => (a.clone(), b.clone()),
            _ => (
                Number::Float(a.as_float()),
                Number::Float(b.as_float()),
            ),
        }
    }

    pub fn add(&self, other: &Number) -> Number {
        match Self::upcast_pair(self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a + b),
            (Number::Float(a), Number::Float(b)) => Number::Float(a + b),
            _ => unreachable!("upcast_pair always returns matching kinds"),
        }
    }

    pub fn sub(&self, other: &Number) -> Number {
        match Self::upcast_pair(self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a - b),
            (Number::Float(a), Number::Float(b)) => Number::Float(a - b),
            _ => unreachable!(),
        }
    }

    pub fn mul(&self, other: &Number) -> Number {
        match Self::upcast_pair(self, other) {
            (Number::Int(a), Number::Int(b)) => Number::Int(a * b),
            (Number::Float(a), Number::Float(b)) => Number::Float(a * b),
            _ => unreachable!(),
        }
    }

    pub fn div(&self, other: &Number) -> Result<Number, RuntimeError> {
        match Self::upcast_pair(self, other) {
            (Number::Int(a), Number::Int(b)) => {
                if b.is_zero() {
                    return Err(RuntimeError::InvalidOperandValue("division by zero".into()));
                }
                Number::Int(a.clone())
                    .checked_int_div(&b)
                    .map(Number::Int)
                    .ok_or_else(|| RuntimeError::InvalidOperandValue("division by zero".into()))
            }
            (Number::Float(a), Number::Float(b)) => {
                if b.is_zero() {
                    return Err(RuntimeError::InvalidOperandValue("division by zero".into()));
                }
                Ok(Number::Float(a / b))
            }
            _ => unreachable!(),
        }
    }

    fn checked_int_div(&self, b: &BigInt) -> Option<BigInt> {
        match self {
            Number::Int(a) => {
                if b.is_zero() {
                    None
                } else {
                    Some(a / b)
                }
            }
            Number::Float(_) => None,
        }
    }

    pub fn rem(&self, other: &Number) -> Result<Number, RuntimeError> {
        match Self::upcast_pair(self, other) {
            (Number::Int(a), Number::Int(b)) => {
                if b.is_zero() {
                    return Err(RuntimeError::InvalidOperandValue("modulo by zero".into()));
                }
                Ok(Number::Int(a % b))
            }
            (Number::Float(a), Number::Float(b)) => {
                if b.is_zero() {
                    return Err(RuntimeError::InvalidOperandValue("modulo by zero".into()));
                }
                Ok(Number::Float(a % b))
            }
            _ => unreachable!(),
        }
    }

    /// Exponentiation, integer-only per the literal scenario `^(2.0,3.0)` ⇒ runtime error.
    pub fn pow(&self, other: &Number) -> Result<Number, RuntimeError> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => {
                let exp = u32::try_from(b.clone()).map_err(|_| {
                    RuntimeError::InvalidOperandValue("exponent out of range".into())
                })?;
                Ok(Number::Int(a.pow(exp)))
            }
            _ => Err(RuntimeError::InvalidVariableType(
                "^ is only defined for integers".into(),
            )),
        }
    }

    pub fn bitand(&self, other: &Number) -> Result<Number, RuntimeError> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Ok(Number::Int(a & b)),
            _ => Err(RuntimeError::InvalidVariableType(
                "& is only defined for integers".into(),
            )),
        }
    }

    pub fn bitor(&self, other: &Number) -> Result<Number, RuntimeError> {
        match (self, other) {
            (Number::Int(a), Number::Int(b)) => Ok(Number::Int(a | b)),
            _ => Err(RuntimeError::InvalidVariableType(
                "| is only defined for integers".into(),
            )),
        }
    }

    pub fn bitnot(&self) -> Result<Number, RuntimeError> {
        match self {
            Number::Int(a) => Ok(Number::Int(!a)),
            Number::Float(_) => Err(RuntimeError::InvalidVariableType(
                "~ is only defined for integers".into(),
            )),
        }
    }

    #[must_use]
    pub fn neg(&self) -> Number {
        match self {
            Number::Int(a) => Number::Int(-a),
            Number::Float(a) => Number::Float(-a),
        }
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Number::Int(a) => !a.is_zero(),
            Number::Float(a) => !a.is_zero(),
        }
    }

    #[must_use]
    pub fn compare(&self, other: &Number) -> std::cmp::Ordering {
        match Self::upcast_pair(self, other) {
            (Number::Int(a), Number::Int(b)) => a.cmp(&b),
            (Number::Float(a), Number::Float(b)) => a.cmp(&b),
            _ => unreachable!(),
        }
    }

    #[must_use]
    pub fn abs(&self) -> Number {
        match self {
            Number::Int(a) => Number::Int(a.abs()),
            Number::Float(a) => Number::Float(a.abs()),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(i) => write!(f, "{i}"),
            Number::Float(d) => write!(f, "{d}"),
        }
    }
}

/// An offset into the VM's data segment, used both for resolved variables and for
/// closure-environment table slots. `Ref` values are data, not pointers into the
/// code vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ref(pub usize);

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "&{}", self.0)
    }
}

/// `{lambda_addr, closure_env_ref}` — spec.md §3's closure record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LambdaClosure {
    pub lambda_addr: usize,
    pub env_slot: usize,
}

/// The VM's dynamically-typed value domain (spec.md §3, §9 Design Notes).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(BigInt),
    Float(BigDecimal),
    IntList(Vec<BigInt>),
    FloatList(Vec<BigDecimal>),
    Ref(Ref),
    Closure(LambdaClosure),
    /// Ordered sequence of values, used for closure environments.
    Table(Vec<Value>),
    /// An integer used as a return address on the stack (`call` pushes `ip` as this).
    ReturnAddr(usize),
    Unit,
}

impl Value {
    #[must_use]
    pub fn from_number(n: Number) -> Value {
        match n {
            Number::Int(i) => Value::Int(i),
            Number::Float(f) => Value::Float(f),
        }
    }

    #[must_use]
    pub fn as_number(&self) -> Option<Number> {
        match self {
            Value::Int(i) => Some(Number::Int(i.clone())),
            Value::Float(f) => Some(Number::Float(f.clone())),
            _ => None,
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::IntList(_) => "int-list",
            Value::FloatList(_) => "float-list",
            Value::Ref(_) => "ref",
            Value::Closure(_) => "closure",
            Value::Table(_) => "table",
            Value::ReturnAddr(_) => "return-addr",
            Value::Unit => "unit",
        }
    }

    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(i) => !i.is_zero(),
            Value::Float(f) => !f.is_zero(),
            Value::IntList(l) => !l.is_empty(),
            Value::FloatList(l) => !l.is_empty(),
            Value::Unit => false,
            _ => true,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(d) => write!(f, "{d}"),
            Value::IntList(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::FloatList(l) => {
                write!(f, "[")?;
                for (i, v) in l.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            Value::Ref(r) => write!(f, "{r}"),
            Value::Closure(c) => write!(f, "<closure @{} env={}>", c.lambda_addr, c.env_slot),
            Value::Table(t) => write!(f, "<table len={}>", t.len()),
            Value::ReturnAddr(a) => write!(f, "<return-addr {a}>"),
            Value::Unit => write!(f, "()"),
        }
    }
}

/// The external clone primitive (spec.md §6): deep-copies numeric/list/ref values so
/// that identifier reads never alias the stored binding (invariant 2, 4 of spec.md §8).
/// Every other variant passes through unchanged.
#[must_use]
pub fn clone_value(value: &Value) -> Value {
    match value {
        Value::Int(i) => Value::Int(i.clone()),
        Value::Float(f) => Value::Float(f.clone()),
        Value::IntList(l) => Value::IntList(l.clone()),
        Value::FloatList(l) => Value::FloatList(l.clone()),
        Value::Ref(r) => Value::Ref(*r),
        other => other.clone(),
    }
}

/// Upcasts a pair of list values to a common element kind, per SPEC_FULL.md §4.0.
pub fn upcast_lists(a: Value, b: Value) -> (Value, Value) {
    match (&a, &b) {
        (Value::IntList(x), Value::FloatList(_)) => {
            let floats: Vec<BigDecimal> = x.iter().cloned().map(BigDecimal::from).collect();
            (Value::FloatList(floats), b)
        }
        (Value::FloatList(_), Value::IntList(y)) => {
            let floats: Vec<BigDecimal> = y.iter().cloned().map(BigDecimal::from).collect();
            (a, Value::FloatList(floats))
        }
        _ => (a, b),
    }
}
