//! Runtime values and their operators.
//!
//! Operators return `Err(details)`; the interpreter attaches the span.

use std::cmp::Ordering;
use std::fmt;

use crate::ast::BinaryOp;

/// Largest string, in bytes, that `+` or `*` may build. Past this the
/// allocation could fail, and allocation failure aborts the process.
pub const MAX_STRING_LEN: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl Value {
    /// A line typed by the human: an integer if it parses as one, else text.
    pub fn from_input(text: &str) -> Self {
        match text.trim().parse::<i64>() {
            Ok(n) => Value::Int(n),
            Err(_) => Value::Str(text.to_string()),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Bool(_) => "bool",
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Bool(b) => *b,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn negate(&self) -> Result<Value, String> {
        match self {
            Value::Int(n) => n
                .checked_neg()
                .map(Value::Int)
                .ok_or_else(|| "Integer overflow".to_string()),
            Value::Float(n) => Ok(Value::Float(-n)),
            other => Err(format!("Illegal operation: -{}", other.type_name())),
        }
    }

    /// Arithmetic and comparison. `and`/`or` short-circuit in the
    /// interpreter and never reach here.
    pub fn binary(&self, op: BinaryOp, rhs: &Value) -> Result<Value, String> {
        use BinaryOp::*;

        match op {
            Add | Sub | Mul | Div | Mod => self.arith(op, rhs),
            Eq => Ok(Value::Bool(self.loosely_equals(rhs))),
            Ne => Ok(Value::Bool(!self.loosely_equals(rhs))),
            Lt | Le | Gt | Ge => {
                let ord = self.compare(rhs).ok_or_else(|| self.illegal(op, rhs))?;
                Ok(Value::Bool(match op {
                    Lt => ord == Ordering::Less,
                    Le => ord != Ordering::Greater,
                    Gt => ord == Ordering::Greater,
                    _ => ord != Ordering::Less,
                }))
            }
            And | Or => Err(self.illegal(op, rhs)),
        }
    }

    fn arith(&self, op: BinaryOp, rhs: &Value) -> Result<Value, String> {
        match (self, rhs) {
            (Value::Int(a), Value::Int(b)) => int_arith(op, *a, *b),
            (Value::Str(a), Value::Str(b)) if op == BinaryOp::Add => {
                string_len(a.len().checked_add(b.len()))?;
                Ok(Value::Str(format!("{a}{b}")))
            }
            (Value::Str(s), Value::Int(n)) | (Value::Int(n), Value::Str(s))
                if op == BinaryOp::Mul =>
            {
                let count = usize::try_from(*n).unwrap_or(0);
                string_len(s.len().checked_mul(count))?;
                Ok(Value::Str(s.repeat(count)))
            }
            _ => match (self.as_f64(), rhs.as_f64()) {
                (Some(a), Some(b)) => float_arith(op, a, b),
                _ => Err(self.illegal(op, rhs)),
            },
        }
    }

    fn loosely_equals(&self, rhs: &Value) -> bool {
        match (self.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => a == b,
            _ => self == rhs,
        }
    }

    fn compare(&self, rhs: &Value) -> Option<Ordering> {
        match (self, rhs) {
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&rhs.as_f64()?),
        }
    }

    fn illegal(&self, op: BinaryOp, rhs: &Value) -> String {
        format!(
            "Illegal operation: {} {} {}",
            self.type_name(),
            symbol(op),
            rhs.type_name()
        )
    }
}

fn string_len(len: Option<usize>) -> Result<usize, String> {
    len.filter(|&len| len <= MAX_STRING_LEN)
        .ok_or_else(|| "String too long".to_string())
}

fn int_arith(op: BinaryOp, a: i64, b: i64) -> Result<Value, String> {
    let result = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        // True division, like the numbers people learn with.
        BinaryOp::Div => return float_arith(op, a as f64, b as f64),
        BinaryOp::Mod => {
            if b == 0 {
                return Err("Division by 0".to_string());
            }
            // The result takes the sign of the divisor.
            a.checked_rem(b).map(|r| if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
        }
        _ => None,
    };
    result
        .map(Value::Int)
        .ok_or_else(|| "Integer overflow".to_string())
}

fn float_arith(op: BinaryOp, a: f64, b: f64) -> Result<Value, String> {
    if matches!(op, BinaryOp::Div | BinaryOp::Mod) && b == 0.0 {
        return Err("Division by 0".to_string());
    }
    Ok(Value::Float(match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div => a / b,
        _ => a - b * (a / b).floor(),
    }))
}

fn symbol(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "+",
        BinaryOp::Sub => "-",
        BinaryOp::Mul => "*",
        BinaryOp::Div => "/",
        BinaryOp::Mod => "%",
        BinaryOp::Eq => "==",
        BinaryOp::Ne => "!=",
        BinaryOp::Lt => "<",
        BinaryOp::Le => "<=",
        BinaryOp::Gt => ">",
        BinaryOp::Ge => ">=",
        BinaryOp::And => "and",
        BinaryOp::Or => "or",
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{n}"),
            Value::Float(n) if n.is_finite() && n.fract() == 0.0 => write!(f, "{n:.1}"),
            Value::Float(n) => write!(f, "{n}"),
            Value::Str(s) => f.write_str(s),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}
