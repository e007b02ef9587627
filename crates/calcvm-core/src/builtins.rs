//! The builtin registry (SPEC_FULL.md §4.7), the calculator's external collaborator
//! exposing named callables with arity (spec.md §6). Grounded in
//! `examples/original_source/builtin.go`/`help.go` for the name/arity/help set;
//! reimplemented over `Value`/`Number` rather than Go's reflection-based `Call`
//! wrapper (`examples/original_source/func.go`), which has no idiomatic Rust
//! analogue and isn't needed once arity is static per entry.

use num_bigint::BigInt;
use num_traits::Signed;

use crate::value::{clone_value, upcast_lists, Number, Value};
use crate::vm::error::RuntimeError;

pub type BuiltinFn = fn(&[Value]) -> Result<Value, RuntimeError>;

#[derive(Clone, Copy)]
pub struct BuiltinEntry {
    pub name: &'static str,
    pub arity: i32,
    pub help: &'static str,
    pub func: BuiltinFn,
}

/// Name → index lookup plus index → entry access. Indices are stable for the
/// lifetime of a `Registry` (the registry is built once at process start and
/// shared read-only thereafter — spec.md §5's single-threaded model needs no
/// interior mutability here).
pub struct Registry {
    entries: Vec<BuiltinEntry>,
}

impl Registry {
    #[must_use]
    pub fn standard() -> Self {
        Self {
            entries: ENTRIES.to_vec(),
        }
    }

    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    #[must_use]
    pub fn arity(&self, index: usize) -> Option<i32> {
        self.entries.get(index).map(|e| e.arity)
    }

    #[must_use]
    pub fn help(&self, index: usize) -> Option<&'static str> {
        self.entries.get(index).map(|e| e.help)
    }

    #[must_use]
    pub fn name(&self, index: usize) -> Option<&'static str> {
        self.entries.get(index).map(|e| e.name)
    }

    pub fn call(&self, index: usize, args: &[Value]) -> Result<Value, RuntimeError> {
        let entry = self
            .entries
            .get(index)
            .ok_or(RuntimeError::InvalidBuiltinIndex(index))?;
        if entry.arity >= 0 && entry.arity as usize != args.len() {
            return Err(RuntimeError::InvalidArgumentCount {
                expected: entry.arity,
                got: args.len(),
            });
        }
        (entry.func)(args)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::standard()
    }
}

fn binary_numeric(
    args: &[Value],
    op: impl Fn(&Number, &Number) -> Result<Number, RuntimeError>,
) -> Result<Value, RuntimeError> {
    let [a, b] = args else {
        return Err(RuntimeError::InvalidArgumentCount {
            expected: 2,
            got: args.len(),
        });
    };
    match (a, b) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let na = a.as_number().expect("checked above");
            let nb = b.as_number().expect("checked above");
            Ok(Value::from_number(op(&na, &nb)?))
        }
        (Value::IntList(_) | Value::FloatList(_), Value::IntList(_) | Value::FloatList(_)) => {
            let (ua, ub) = upcast_lists(a.clone(), b.clone());
            match (ua, ub) {
                (Value::IntList(xs), Value::IntList(ys)) => {
                    elementwise_int(&xs, &ys, |x, y| {
                        match op(&Number::Int(x.clone()), &Number::Int(y.clone()))? {
                            Number::Int(v) => Ok(v),
                            Number::Float(_) => unreachable!("int op stayed int"),
                        }
                    })
                }
                (Value::FloatList(xs), Value::FloatList(ys)) => {
                    elementwise_float(&xs, &ys, |x, y| {
                        match op(&Number::Float(x.clone()), &Number::Float(y.clone()))? {
                            Number::Float(v) => Ok(v),
                            Number::Int(_) => unreachable!("float op stayed float"),
                        }
                    })
                }
                _ => unreachable!("upcast_lists always returns matching kinds"),
            }
        }
        _ => Err(RuntimeError::InvalidOperandType(format!(
            "cannot combine {} and {}",
            a.type_name(),
            b.type_name()
        ))),
    }
}

fn elementwise_int(
    xs: &[BigInt],
    ys: &[BigInt],
    f: impl Fn(&BigInt, &BigInt) -> Result<BigInt, RuntimeError>,
) -> Result<Value, RuntimeError> {
    if xs.len() != ys.len() {
        return Err(RuntimeError::InvalidOperandValue(
            "list length mismatch".into(),
        ));
    }
    let out: Result<Vec<BigInt>, RuntimeError> =
        xs.iter().zip(ys.iter()).map(|(x, y)| f(x, y)).collect();
    Ok(Value::IntList(out?))
}

fn elementwise_float(
    xs: &[bigdecimal::BigDecimal],
    ys: &[bigdecimal::BigDecimal],
    f: impl Fn(&bigdecimal::BigDecimal, &bigdecimal::BigDecimal) -> Result<bigdecimal::BigDecimal, RuntimeError>,
) -> Result<Value, RuntimeError> {
    if xs.len() != ys.len() {
        return Err(RuntimeError::InvalidOperandValue(
            "list length mismatch".into(),
        ));
    }
    let out: Result<Vec<bigdecimal::BigDecimal>, RuntimeError> =
        xs.iter().zip(ys.iter()).map(|(x, y)| f(x, y)).collect();
    Ok(Value::FloatList(out?))
}

fn compare(args: &[Value], f: impl Fn(std::cmp::Ordering) -> bool) -> Result<Value, RuntimeError> {
    let [a, b] = args else {
        return Err(RuntimeError::InvalidArgumentCount {
            expected: 2,
            got: args.len(),
        });
    };
    let (na, nb) = (
        a.as_number()
            .ok_or_else(|| RuntimeError::InvalidOperandType(a.type_name().to_string()))?,
        b.as_number()
            .ok_or_else(|| RuntimeError::InvalidOperandType(b.type_name().to_string()))?,
    );
    let ord = na.compare(&nb);
    Ok(Value::Int(BigInt::from(i64::from(f(ord)))))
}

fn builtin_add(args: &[Value]) -> Result<Value, RuntimeError> {
    binary_numeric(args, |a, b| Ok(a.add(b)))
}
fn builtin_sub(args: &[Value]) -> Result<Value, RuntimeError> {
    binary_numeric(args, |a, b| Ok(a.sub(b)))
}
fn builtin_mul(args: &[Value]) -> Result<Value, RuntimeError> {
    binary_numeric(args, |a, b| Ok(a.mul(b)))
}
fn builtin_div(args: &[Value]) -> Result<Value, RuntimeError> {
    binary_numeric(args, Number::div)
}
fn builtin_mod(args: &[Value]) -> Result<Value, RuntimeError> {
    binary_numeric(args, Number::rem)
}
fn builtin_pow(args: &[Value]) -> Result<Value, RuntimeError> {
    binary_numeric(args, Number::pow)
}
fn builtin_bitand(args: &[Value]) -> Result<Value, RuntimeError> {
    binary_numeric(args, Number::bitand)
}
fn builtin_bitor(args: &[Value]) -> Result<Value, RuntimeError> {
    binary_numeric(args, Number::bitor)
}
fn builtin_bitnot(args: &[Value]) -> Result<Value, RuntimeError> {
    let [a] = args else {
        return Err(RuntimeError::InvalidArgumentCount {
            expected: 1,
            got: args.len(),
        });
    };
    let n = a
        .as_number()
        .ok_or_else(|| RuntimeError::InvalidOperandType(a.type_name().to_string()))?;
    Ok(Value::from_number(n.bitnot()?))
}
fn builtin_neg(args: &[Value]) -> Result<Value, RuntimeError> {
    let [a] = args else {
        return Err(RuntimeError::InvalidArgumentCount {
            expected: 1,
            got: args.len(),
        });
    };
    let n = a
        .as_number()
        .ok_or_else(|| RuntimeError::InvalidOperandType(a.type_name().to_string()))?;
    Ok(Value::from_number(n.neg()))
}
fn builtin_pos(args: &[Value]) -> Result<Value, RuntimeError> {
    let [a] = args else {
        return Err(RuntimeError::InvalidArgumentCount {
            expected: 1,
            got: args.len(),
        });
    };
    a.as_number()
        .map(Value::from_number)
        .ok_or_else(|| RuntimeError::InvalidOperandType(a.type_name().to_string()))
}
fn builtin_not(args: &[Value]) -> Result<Value, RuntimeError> {
    let [a] = args else {
        return Err(RuntimeError::InvalidArgumentCount {
            expected: 1,
            got: args.len(),
        });
    };
    Ok(Value::Int(BigInt::from(i64::from(!a.is_truthy()))))
}
fn builtin_and(args: &[Value]) -> Result<Value, RuntimeError> {
    let [a, b] = args else {
        return Err(RuntimeError::InvalidArgumentCount {
            expected: 2,
            got: args.len(),
        });
    };
    Ok(Value::Int(BigInt::from(i64::from(
        a.is_truthy() && b.is_truthy(),
    ))))
}
fn builtin_or(args: &[Value]) -> Result<Value, RuntimeError> {
    let [a, b] = args else {
        return Err(RuntimeError::InvalidArgumentCount {
            expected: 2,
            got: args.len(),
        });
    };
    Ok(Value::Int(BigInt::from(i64::from(
        a.is_truthy() || b.is_truthy(),
    ))))
}
fn builtin_eq(args: &[Value]) -> Result<Value, RuntimeError> {
    compare(args, |o| o == std::cmp::Ordering::Equal)
}
fn builtin_ne(args: &[Value]) -> Result<Value, RuntimeError> {
    compare(args, |o| o != std::cmp::Ordering::Equal)
}
fn builtin_lt(args: &[Value]) -> Result<Value, RuntimeError> {
    compare(args, |o| o == std::cmp::Ordering::Less)
}
fn builtin_le(args: &[Value]) -> Result<Value, RuntimeError> {
    compare(args, |o| o != std::cmp::Ordering::Greater)
}
fn builtin_gt(args: &[Value]) -> Result<Value, RuntimeError> {
    compare(args, |o| o == std::cmp::Ordering::Greater)
}
fn builtin_ge(args: &[Value]) -> Result<Value, RuntimeError> {
    compare(args, |o| o != std::cmp::Ordering::Less)
}

/// List constructor: `List [e…]` emits `callb(list_ctor, n)` (spec.md §4.1's
/// emission table). Homogeneous at construction; mixed-kind args upcast to float.
fn builtin_list(args: &[Value]) -> Result<Value, RuntimeError> {
    if args.iter().all(|v| matches!(v, Value::Int(_))) {
        let ints = args
            .iter()
            .map(|v| match v {
                Value::Int(i) => i.clone(),
                _ => unreachable!(),
            })
            .collect();
        return Ok(Value::IntList(ints));
    }
    let floats: Result<Vec<_>, RuntimeError> = args
        .iter()
        .map(|v| {
            v.as_number()
                .map(|n| n.as_float())
                .ok_or_else(|| RuntimeError::InvalidOperandType(v.type_name().to_string()))
        })
        .collect();
    Ok(Value::FloatList(floats?))
}

fn list_len(value: &Value) -> Result<usize, RuntimeError> {
    match value {
        Value::IntList(l) => Ok(l.len()),
        Value::FloatList(l) => Ok(l.len()),
        other => Err(RuntimeError::InvalidOperandType(other.type_name().to_string())),
    }
}

fn list_elements(value: &Value) -> Result<Vec<Value>, RuntimeError> {
    match value {
        Value::IntList(l) => Ok(l.iter().cloned().map(Value::Int).collect()),
        Value::FloatList(l) => Ok(l.iter().cloned().map(Value::Float).collect()),
        other => Err(RuntimeError::InvalidOperandType(other.type_name().to_string())),
    }
}

fn builtin_len(args: &[Value]) -> Result<Value, RuntimeError> {
    let [a] = args else {
        return Err(RuntimeError::InvalidArgumentCount {
            expected: 1,
            got: args.len(),
        });
    };
    Ok(Value::Int(BigInt::from(list_len(a)? as i64)))
}

fn builtin_if(args: &[Value]) -> Result<Value, RuntimeError> {
    let [cond, a, b] = args else {
        return Err(RuntimeError::InvalidArgumentCount {
            expected: 3,
            got: args.len(),
        });
    };
    Ok(clone_value(if cond.is_truthy() { a } else { b }))
}

fn builtin_min(args: &[Value]) -> Result<Value, RuntimeError> {
    let [a, b] = args else {
        return Err(RuntimeError::InvalidArgumentCount {
            expected: 2,
            got: args.len(),
        });
    };
    let (na, nb) = (
        a.as_number().ok_or_else(|| RuntimeError::InvalidOperandType(a.type_name().to_string()))?,
        b.as_number().ok_or_else(|| RuntimeError::InvalidOperandType(b.type_name().to_string()))?,
    );
    Ok(if na.compare(&nb) == std::cmp::Ordering::Greater {
        Value::from_number(nb)
    } else {
        Value::from_number(na)
    })
}

fn builtin_max(args: &[Value]) -> Result<Value, RuntimeError> {
    let [a, b] = args else {
        return Err(RuntimeError::InvalidArgumentCount {
            expected: 2,
            got: args.len(),
        });
    };
    let (na, nb) = (
        a.as_number().ok_or_else(|| RuntimeError::InvalidOperandType(a.type_name().to_string()))?,
        b.as_number().ok_or_else(|| RuntimeError::InvalidOperandType(b.type_name().to_string()))?,
    );
    Ok(if na.compare(&nb) == std::cmp::Ordering::Less {
        Value::from_number(nb)
    } else {
        Value::from_number(na)
    })
}

fn builtin_abs(args: &[Value]) -> Result<Value, RuntimeError> {
    let [a] = args else {
        return Err(RuntimeError::InvalidArgumentCount {
            expected: 1,
            got: args.len(),
        });
    };
    let n = a.as_number().ok_or_else(|| RuntimeError::InvalidOperandType(a.type_name().to_string()))?;
    Ok(Value::from_number(n.abs()))
}

/// `map`/`reduce`/`filter` take a callable as their second argument, but the
/// registry's `BuiltinFn` signature has no VM handle to dispatch a call back
/// through — invoking a user function from inside a builtin would need
/// reentrancy the VM doesn't support (spec.md §5: "reentry is not supported").
/// They are therefore implemented directly in the VM's `callb` handler instead
/// of here; see `vm::mod::Vm::exec_callb`'s special-cased indices.
fn builtin_unreachable_hof(_args: &[Value]) -> Result<Value, RuntimeError> {
    unreachable!("map/reduce/filter are dispatched specially by the VM, not called as plain builtins")
}

pub(crate) fn list_elements_for_vm(value: &Value) -> Result<Vec<Value>, RuntimeError> {
    list_elements(value)
}

static ENTRIES: &[BuiltinEntry] = &[
    BuiltinEntry { name: "+", arity: 2, help: "add two numbers or lists", func: builtin_add },
    BuiltinEntry { name: "-", arity: 2, help: "subtract two numbers or lists", func: builtin_sub },
    BuiltinEntry { name: "*", arity: 2, help: "multiply two numbers or lists", func: builtin_mul },
    BuiltinEntry { name: "/", arity: 2, help: "divide two numbers or lists", func: builtin_div },
    BuiltinEntry { name: "%", arity: 2, help: "modulo of two numbers", func: builtin_mod },
    BuiltinEntry { name: "^", arity: 2, help: "integer exponentiation", func: builtin_pow },
    BuiltinEntry { name: "&", arity: 2, help: "integer bitwise and", func: builtin_bitand },
    BuiltinEntry { name: "|", arity: 2, help: "integer bitwise or", func: builtin_bitor },
    BuiltinEntry { name: "~", arity: 1, help: "integer bitwise not", func: builtin_bitnot },
    BuiltinEntry { name: "neg", arity: 1, help: "unary negation", func: builtin_neg },
    BuiltinEntry { name: "pos", arity: 1, help: "unary plus", func: builtin_pos },
    BuiltinEntry { name: "not", arity: 1, help: "logical not", func: builtin_not },
    BuiltinEntry { name: "and", arity: 2, help: "logical and", func: builtin_and },
    BuiltinEntry { name: "or", arity: 2, help: "logical or", func: builtin_or },
    BuiltinEntry { name: "==", arity: 2, help: "equality", func: builtin_eq },
    BuiltinEntry { name: "!=", arity: 2, help: "inequality", func: builtin_ne },
    BuiltinEntry { name: "<", arity: 2, help: "less than", func: builtin_lt },
    BuiltinEntry { name: "<=", arity: 2, help: "less than or equal", func: builtin_le },
    BuiltinEntry { name: ">", arity: 2, help: "greater than", func: builtin_gt },
    BuiltinEntry { name: ">=", arity: 2, help: "greater than or equal", func: builtin_ge },
    BuiltinEntry { name: "list", arity: -1, help: "construct a homogeneous list", func: builtin_list },
    BuiltinEntry { name: "len", arity: 1, help: "length of a list", func: builtin_len },
    BuiltinEntry { name: "if", arity: 3, help: "if(cond, then, else)", func: builtin_if },
    BuiltinEntry { name: "min", arity: 2, help: "smaller of two numbers", func: builtin_min },
    BuiltinEntry { name: "max", arity: 2, help: "larger of two numbers", func: builtin_max },
    BuiltinEntry { name: "abs", arity: 1, help: "absolute value", func: builtin_abs },
    BuiltinEntry { name: "map", arity: 2, help: "map(list, fn) — dispatched by the VM", func: builtin_unreachable_hof },
    BuiltinEntry { name: "reduce", arity: 3, help: "reduce(list, fn, init) — dispatched by the VM", func: builtin_unreachable_hof },
    BuiltinEntry { name: "filter", arity: 2, help: "filter(list, fn) — dispatched by the VM", func: builtin_unreachable_hof },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_upcasts_mixed_lists_to_float() {
        let registry = Registry::standard();
        let idx = registry.lookup("+").unwrap();
        let a = Value::IntList(vec![BigInt::from(1)]);
        let b = Value::FloatList(vec!["2.0".parse().unwrap()]);
        let result = registry.call(idx, &[a, b]).unwrap();
        assert_eq!(result, Value::FloatList(vec!["3.0".parse().unwrap()]));
    }

    #[test]
    fn pow_rejects_float_operands() {
        let registry = Registry::standard();
        let idx = registry.lookup("^").unwrap();
        let a = Value::Float("2.0".parse().unwrap());
        let b = Value::Float("3.0".parse().unwrap());
        let err = registry.call(idx, &[a, b]).unwrap_err();
        assert!(matches!(err, RuntimeError::InvalidVariableType(_)));
    }
}
