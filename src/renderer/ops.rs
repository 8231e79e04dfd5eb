//! Operators on values: arithmetic, comparison, membership, subscripts

use std::cmp::Ordering;
use std::sync::Arc;

use crate::parser::ast::{BinaryOp, CompareOp};
use crate::value::Value;

/// Operator failure, positioned by the evaluator
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum OpError {
    Type(String),
    Arithmetic(String),
}

/// Subscript failure, positioned by the evaluator
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum LookupError {
    Index { kind: String, index: i64, len: usize },
    Key(String),
    Type(String),
}

#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn of(value: &Value) -> Option<Num> {
        match value {
            Value::Int(i) => Some(Num::Int(*i)),
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Float(f) => Some(Num::Float(*f)),
            _ => None,
        }
    }

    fn float(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }
}

fn unsupported(op: &str, left: &Value, right: &Value) -> OpError {
    OpError::Type(format!(
        "unsupported operand kinds for {}: {} and {}",
        op,
        left.kind(),
        right.kind()
    ))
}

fn overflow(op: BinaryOp) -> OpError {
    OpError::Arithmetic(format!("integer overflow in {}", op.symbol()))
}

/// Evaluate `left op right`
pub(crate) fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, OpError> {
    if let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) {
        return numeric(op, a, b);
    }

    match (op, left, right) {
        (BinaryOp::Add, Value::Str(a) | Value::Safe(a), Value::Str(b) | Value::Safe(b)) => {
            Ok(Value::Str(format!("{}{}", a, b)))
        }
        (BinaryOp::Add, Value::List(a), Value::List(b)) => {
            Ok(a.iter().chain(b.iter()).cloned().collect())
        }
        (BinaryOp::Mul, Value::Str(s) | Value::Safe(s), other)
        | (BinaryOp::Mul, other, Value::Str(s) | Value::Safe(s)) => match Num::of(other) {
            Some(Num::Int(n)) => {
                let count = repeat_count(s.len(), n)?;
                Ok(Value::Str(s.repeat(count)))
            }
            _ => Err(unsupported(op.symbol(), left, right)),
        },
        (BinaryOp::Mul, Value::List(items), other) | (BinaryOp::Mul, other, Value::List(items)) => {
            match Num::of(other) {
                Some(Num::Int(n)) => {
                    let count = repeat_count(items.len(), n)?;
                    let mut out = Vec::with_capacity(items.len() * count);
                    for _ in 0..count {
                        out.extend(items.iter().cloned());
                    }
                    Ok(Value::List(Arc::new(out)))
                }
                _ => Err(unsupported(op.symbol(), left, right)),
            }
        }
        _ => Err(unsupported(op.symbol(), left, right)),
    }
}

/// Longest string (bytes) or list (elements) a repetition may build
const MAX_REPEAT_LEN: usize = 1 << 28;

/// Repetition count for a sequence of `len`; negative counts repeat zero times
fn repeat_count(len: usize, n: i64) -> Result<usize, OpError> {
    let count = usize::try_from(n).unwrap_or(0);
    match len.checked_mul(count) {
        Some(total) if total <= MAX_REPEAT_LEN => Ok(count),
        _ => Err(OpError::Arithmetic("repeat count too large".to_string())),
    }
}

fn numeric(op: BinaryOp, a: Num, b: Num) -> Result<Value, OpError> {
    match (op, a, b) {
        (BinaryOp::Div, _, _) => {
            let divisor = b.float();
            if divisor == 0.0 {
                return Err(OpError::Arithmetic("division by zero".to_string()));
            }
            Ok(Value::Float(a.float() / divisor))
        }
        (BinaryOp::Mod, Num::Int(x), Num::Int(y)) => {
            if y == 0 {
                return Err(OpError::Arithmetic("modulo by zero".to_string()));
            }
            let r = x.checked_rem(y).ok_or_else(|| overflow(op))?;
            // Result takes the sign of the divisor
            Ok(Value::Int(if r != 0 && (r < 0) != (y < 0) { r + y } else { r }))
        }
        (BinaryOp::Mod, _, _) => {
            let (x, y) = (a.float(), b.float());
            if y == 0.0 {
                return Err(OpError::Arithmetic("modulo by zero".to_string()));
            }
            let r = x % y;
            Ok(Value::Float(if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r }))
        }
        (_, Num::Int(x), Num::Int(y)) => {
            let result = match op {
                BinaryOp::Add => x.checked_add(y),
                BinaryOp::Sub => x.checked_sub(y),
                _ => x.checked_mul(y),
            };
            result.map(Value::Int).ok_or_else(|| overflow(op))
        }
        (_, _, _) => {
            let (x, y) = (a.float(), b.float());
            Ok(Value::Float(match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                _ => x * y,
            }))
        }
    }
}

/// Evaluate `left op right` for a comparison operator
pub(crate) fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool, OpError> {
    match op {
        CompareOp::Eq => Ok(left == right),
        CompareOp::NotEq => Ok(left != right),
        CompareOp::Lt => Ok(order(op, left, right)? == Some(Ordering::Less)),
        CompareOp::LtE => Ok(matches!(
            order(op, left, right)?,
            Some(Ordering::Less | Ordering::Equal)
        )),
        CompareOp::Gt => Ok(order(op, left, right)? == Some(Ordering::Greater)),
        CompareOp::GtE => Ok(matches!(
            order(op, left, right)?,
            Some(Ordering::Greater | Ordering::Equal)
        )),
        CompareOp::In => contains(right, left),
        CompareOp::NotIn => contains(right, left).map(|found| !found),
        CompareOp::Is => Ok(identical(left, right)),
        CompareOp::IsNot => Ok(!identical(left, right)),
    }
}

/// Ordering of two values; `None` for unordered floats (NaN)
fn order(op: CompareOp, left: &Value, right: &Value) -> Result<Option<Ordering>, OpError> {
    if let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) {
        return Ok(match (a, b) {
            (Num::Int(x), Num::Int(y)) => Some(x.cmp(&y)),
            _ => a.float().partial_cmp(&b.float()),
        });
    }
    match (left, right) {
        (Value::Str(a) | Value::Safe(a), Value::Str(b) | Value::Safe(b)) => Ok(Some(a.cmp(b))),
        (Value::List(a), Value::List(b)) => {
            for (x, y) in a.iter().zip(b.iter()) {
                if x == y {
                    continue;
                }
                return order(op, x, y);
            }
            Ok(Some(a.len().cmp(&b.len())))
        }
        _ => Err(unsupported(op.symbol(), left, right)),
    }
}

/// `item in container`
fn contains(container: &Value, item: &Value) -> Result<bool, OpError> {
    match container {
        Value::Str(s) | Value::Safe(s) => match item.as_str() {
            Some(needle) => Ok(s.contains(needle)),
            None => Err(OpError::Type(format!(
                "'in <string>' requires a string on the left, not {}",
                item.kind()
            ))),
        },
        Value::List(items) => Ok(items.iter().any(|x| x == item)),
        Value::Map(map) => Ok(item.as_str().is_some_and(|key| map.contains_key(key))),
        other => match other.iterate() {
            Some(items) => Ok(items.iter().any(|x| x == item)),
            None => Err(OpError::Type(format!(
                "{} value is not a container",
                other.kind()
            ))),
        },
    }
}

/// `left is right`
fn identical(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
        (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
        (Value::Int(a), Value::Int(b)) => a == b,
        (Value::Float(a), Value::Float(b)) => a == b,
        (Value::Str(a), Value::Str(b)) | (Value::Safe(a), Value::Safe(b)) => a == b,
        (Value::None, Value::None) => true,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Callable(_), Value::Callable(_)) | (Value::Object(_), Value::Object(_)) => {
            left == right
        }
        _ => false,
    }
}

fn normalize_index(index: i64, len: usize) -> Option<usize> {
    let len_i = i64::try_from(len).ok()?;
    let i = if index < 0 { index + len_i } else { index };
    if (0..len_i).contains(&i) {
        usize::try_from(i).ok()
    } else {
        None
    }
}

/// `base[key]`
pub(crate) fn subscript(base: &Value, key: &Value) -> Result<Value, LookupError> {
    match (base, key) {
        (Value::List(items), Value::Int(i)) => normalize_index(*i, items.len())
            .map(|i| items[i].clone())
            .ok_or_else(|| LookupError::Index {
                kind: base.kind().to_string(),
                index: *i,
                len: items.len(),
            }),
        (Value::Str(s) | Value::Safe(s), Value::Int(i)) => {
            let len = s.chars().count();
            normalize_index(*i, len)
                .and_then(|i| s.chars().nth(i))
                .map(|c| Value::Str(c.to_string()))
                .ok_or_else(|| LookupError::Index {
                    kind: base.kind().to_string(),
                    index: *i,
                    len,
                })
        }
        (Value::List(_) | Value::Str(_) | Value::Safe(_), other) => Err(LookupError::Type(
            format!("{} indices must be integers, not {}", base.kind(), other.kind()),
        )),
        (Value::Map(map), key) => key
            .as_str()
            .and_then(|k| map.get(k).cloned())
            .ok_or_else(|| LookupError::Key(key.repr())),
        (Value::Object(obj), key) => obj
            .get_item(key)
            .ok_or_else(|| LookupError::Key(key.repr())),
        (other, _) => Err(LookupError::Type(format!(
            "{} value is not subscriptable",
            other.kind()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bin(op: BinaryOp, a: impl Into<Value>, b: impl Into<Value>) -> Result<Value, OpError> {
        binary(op, &a.into(), &b.into())
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(bin(BinaryOp::Add, 2, 3), Ok(Value::Int(5)));
        assert_eq!(bin(BinaryOp::Sub, 2, 3), Ok(Value::Int(-1)));
        assert_eq!(bin(BinaryOp::Mul, 4, 3), Ok(Value::Int(12)));
        assert_eq!(bin(BinaryOp::Add, true, 1), Ok(Value::Int(2)));
    }

    #[test]
    fn test_division_is_always_float() {
        assert_eq!(bin(BinaryOp::Div, 6, 3), Ok(Value::Float(2.0)));
        assert_eq!(bin(BinaryOp::Div, 7, 2), Ok(Value::Float(3.5)));
        assert!(matches!(
            bin(BinaryOp::Div, 1, 0),
            Err(OpError::Arithmetic(_))
        ));
    }

    #[test]
    fn test_modulo_sign_follows_divisor() {
        assert_eq!(bin(BinaryOp::Mod, 7, 3), Ok(Value::Int(1)));
        assert_eq!(bin(BinaryOp::Mod, -7, 3), Ok(Value::Int(2)));
        assert_eq!(bin(BinaryOp::Mod, 7, -3), Ok(Value::Int(-2)));
        assert_eq!(bin(BinaryOp::Mod, 5.5, 2), Ok(Value::Float(1.5)));
        assert!(matches!(
            bin(BinaryOp::Mod, 1, 0),
            Err(OpError::Arithmetic(_))
        ));
    }

    #[test]
    fn test_overflow_is_error() {
        assert_eq!(
            bin(BinaryOp::Add, i64::MAX, 1),
            Err(OpError::Arithmetic("integer overflow in +".to_string()))
        );
    }

    #[test]
    fn test_sequences() {
        assert_eq!(bin(BinaryOp::Add, "ab", "cd"), Ok(Value::from("abcd")));
        assert_eq!(bin(BinaryOp::Mul, "ab", 2), Ok(Value::from("abab")));
        assert_eq!(bin(BinaryOp::Mul, 2, vec![1]), Ok(Value::from(vec![1, 1])));
        assert_eq!(
            bin(BinaryOp::Add, vec![1], vec![2]),
            Ok(Value::from(vec![1, 2]))
        );
        assert!(matches!(bin(BinaryOp::Sub, "a", 1), Err(OpError::Type(_))));
    }

    #[test]
    fn test_huge_repetition_is_error() {
        let too_large = Err(OpError::Arithmetic("repeat count too large".to_string()));
        assert_eq!(bin(BinaryOp::Mul, "ab", i64::MAX), too_large);
        assert_eq!(bin(BinaryOp::Mul, i64::MAX, "ab"), too_large);
        assert_eq!(bin(BinaryOp::Mul, vec![1, 2], i64::MAX), too_large);
        assert_eq!(bin(BinaryOp::Mul, i64::MAX, vec![1, 2]), too_large);
        assert_eq!(bin(BinaryOp::Mul, "xy", 1i64 << 28), too_large);
        assert_eq!(bin(BinaryOp::Mul, "", i64::MAX), Ok(Value::from("")));
        assert_eq!(bin(BinaryOp::Mul, "ab", -3), Ok(Value::from("")));
    }

    #[test]
    fn test_comparisons() {
        let cmp = |op, a: Value, b: Value| compare(op, &a, &b);
        assert_eq!(cmp(CompareOp::Lt, 1.into(), 1.5.into()), Ok(true));
        assert_eq!(cmp(CompareOp::GtE, "b".into(), "a".into()), Ok(true));
        assert_eq!(cmp(CompareOp::Lt, vec![1, 2].into(), vec![1, 3].into()), Ok(true));
        assert_eq!(cmp(CompareOp::Eq, 1.into(), 1.0.into()), Ok(true));
        assert!(cmp(CompareOp::Lt, 1.into(), "a".into()).is_err());
        assert_eq!(cmp(CompareOp::Lt, f64::NAN.into(), 1.into()), Ok(false));
    }

    #[test]
    fn test_membership() {
        let cmp = |op, a: Value, b: Value| compare(op, &a, &b);
        assert_eq!(cmp(CompareOp::In, "ell".into(), "hello".into()), Ok(true));
        assert_eq!(cmp(CompareOp::In, 2.into(), vec![1, 2].into()), Ok(true));
        assert_eq!(cmp(CompareOp::NotIn, 3.into(), vec![1, 2].into()), Ok(true));
        let map: Value = [("k", Value::Int(1))].into_iter().collect();
        assert_eq!(cmp(CompareOp::In, "k".into(), map), Ok(true));
        assert!(cmp(CompareOp::In, 1.into(), 2.into()).is_err());
    }

    #[test]
    fn test_identity() {
        let list = Value::from(vec![1]);
        assert!(identical(&list, &list.clone()));
        assert!(!identical(&list, &Value::from(vec![1])));
        assert!(identical(&Value::None, &Value::None));
        assert!(!identical(&Value::Int(1), &Value::Float(1.0)));
    }

    #[test]
    fn test_subscript() {
        let list = Value::from(vec!["a", "b", "c"]);
        assert_eq!(subscript(&list, &Value::Int(-1)), Ok(Value::from("c")));
        assert_eq!(
            subscript(&list, &Value::Int(3)),
            Err(LookupError::Index {
                kind: "list".to_string(),
                index: 3,
                len: 3
            })
        );
        assert_eq!(subscript(&Value::from("hé"), &Value::Int(1)), Ok(Value::from("é")));

        let map: Value = [("b", Value::Int(1))].into_iter().collect();
        assert_eq!(subscript(&map, &Value::from("b")), Ok(Value::Int(1)));
        assert_eq!(
            subscript(&map, &Value::from("z")),
            Err(LookupError::Key("'z'".to_string()))
        );
        assert!(matches!(
            subscript(&Value::Int(1), &Value::Int(0)),
            Err(LookupError::Type(_))
        ));
    }
}
