// Scalar coercion for hypod
//
// Converts a raw scalar (string, number, bool, null) to a declared primitive.
// Narrowing policy: a float (or float string) is accepted by an int field only
// when it is finite, in range, and has no fractional part.

use crate::internal::error::{Error, FieldPath, Result};
use crate::schema::types::DeclaredType;
use crate::value::types::{RawValue, Value};

/// Coerces a raw scalar to a primitive declared type.
pub fn coerce_scalar(raw: &RawValue, declared: &DeclaredType) -> Result<Value> {
    if !raw.is_scalar() {
        return Err(Error::Shape {
            expected: declared.to_string(),
            found: raw.kind_name().to_string(),
            path: FieldPath::root(),
        });
    }

    match declared {
        DeclaredType::Str => to_str(raw),
        DeclaredType::Int => to_int(raw),
        DeclaredType::Float => to_float(raw),
        DeclaredType::Bool => to_bool(raw),
        DeclaredType::Null => to_null(raw),
        other => Err(Error::Shape {
            expected: other.to_string(),
            found: raw.kind_name().to_string(),
            path: FieldPath::root(),
        }),
    }
}

/// True when the raw scalar already has the primitive's runtime type.
pub fn is_native(raw: &RawValue, declared: &DeclaredType) -> bool {
    matches!(
        (raw, declared),
        (RawValue::Str(_), DeclaredType::Str)
            | (RawValue::Int(_), DeclaredType::Int)
            | (RawValue::Float(_), DeclaredType::Float)
            | (RawValue::Bool(_), DeclaredType::Bool)
            | (RawValue::Null, DeclaredType::Null)
    )
}

fn fail(raw: &RawValue, expected: &str, reason: impl Into<String>) -> Error {
    Error::Coercion {
        value: raw.describe(),
        expected: expected.to_string(),
        reason: reason.into(),
        path: FieldPath::root(),
    }
}

fn to_str(raw: &RawValue) -> Result<Value> {
    match raw {
        RawValue::Str(s) => Ok(Value::Str(s.clone())),
        RawValue::Int(i) => Ok(Value::Str(i.to_string())),
        RawValue::Float(x) => Ok(Value::Str(format!("{:?}", x))),
        RawValue::Bool(b) => Ok(Value::Str(b.to_string())),
        _ => Err(fail(raw, "str", "null is not a string")),
    }
}

fn float_to_int(raw: &RawValue, x: f64) -> Result<Value> {
    if !x.is_finite() {
        return Err(fail(raw, "int", "not a finite number"));
    }
    if x.fract() != 0.0 {
        return Err(fail(raw, "int", "fractional part would be lost"));
    }
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound
    if x < i64::MIN as f64 || x >= i64::MAX as f64 {
        return Err(fail(raw, "int", "out of range"));
    }
    Ok(Value::Int(x as i64))
}

fn to_int(raw: &RawValue) -> Result<Value> {
    match raw {
        RawValue::Int(i) => Ok(Value::Int(*i)),
        RawValue::Float(x) => float_to_int(raw, *x),
        RawValue::Str(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(Value::Int(i));
            }
            match s.parse::<f64>() {
                Ok(x) => float_to_int(raw, x),
                Err(_) => Err(fail(raw, "int", "not an integer literal")),
            }
        }
        RawValue::Bool(_) => Err(fail(raw, "int", "booleans are not integers")),
        _ => Err(fail(raw, "int", "null is not an integer")),
    }
}

fn to_float(raw: &RawValue) -> Result<Value> {
    match raw {
        RawValue::Float(x) => Ok(Value::Float(*x)),
        RawValue::Int(i) => Ok(Value::Float(*i as f64)),
        RawValue::Str(s) => s
            .trim()
            .parse::<f64>()
            .map(Value::Float)
            .map_err(|_| fail(raw, "float", "not a float literal")),
        RawValue::Bool(_) => Err(fail(raw, "float", "booleans are not floats")),
        _ => Err(fail(raw, "float", "null is not a float")),
    }
}

fn to_bool(raw: &RawValue) -> Result<Value> {
    match raw {
        RawValue::Bool(b) => Ok(Value::Bool(*b)),
        RawValue::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(Value::Bool(true)),
            "false" | "0" => Ok(Value::Bool(false)),
            _ => Err(fail(raw, "bool", "expected true/false/1/0")),
        },
        _ => Err(fail(raw, "bool", format!("{} is not a boolean", raw.kind_name()))),
    }
}

fn to_null(raw: &RawValue) -> Result<Value> {
    match raw {
        RawValue::Null => Ok(Value::Null),
        RawValue::Str(s) => match s.trim().to_ascii_lowercase().as_str() {
            "null" | "none" | "~" => Ok(Value::Null),
            _ => Err(fail(raw, "null", "expected null/none/~")),
        },
        _ => Err(fail(raw, "null", format!("{} is not null", raw.kind_name()))),
    }
}
