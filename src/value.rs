//! Dynamically typed annotation values.
//!
//! Values are extracted from INFO fields and BED columns, passed through
//! reducers and finally rendered into the output record.

use std::fmt;

/// A single annotation value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    List(Vec<Value>),
}

impl Value {
    /// Infer the narrowest scalar type for a text token.
    ///
    /// Integers win over floats, anything else stays a string.
    pub fn infer(token: &str) -> Value {
        if let Ok(n) = token.parse::<i64>() {
            return Value::Int(n);
        }
        // "nan"/"inf" parse as f64 but are almost always labels in annotation files
        if token.bytes().any(|b| b.is_ascii_digit()) {
            if let Ok(f) = token.parse::<f64>() {
                return Value::Float(f);
            }
        }
        Value::Str(token.to_string())
    }

    /// Infer a value that may be a comma-separated list.
    pub fn infer_list(token: &str) -> Value {
        if memchr::memchr(b',', token.as_bytes()).is_some() {
            Value::List(token.split(',').map(Value::infer).collect())
        } else {
            Value::infer(token)
        }
    }

    /// Numeric view of the value, coercing numeric-looking strings.
    #[inline]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(f) => Some(*f),
            Value::Str(s) => s.trim().parse().ok(),
            Value::Bool(_) | Value::List(_) => None,
        }
    }

    /// Integer view of the value; floats and non-integral strings yield None.
    #[inline]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns true for `Value::List`.
    pub fn is_list(&self) -> bool {
        matches!(self, Value::List(_))
    }

    /// Push this value onto `out`, expanding lists one level.
    pub fn flatten_into(&self, out: &mut Vec<Value>) {
        match self {
            Value::List(items) => out.extend(items.iter().cloned()),
            other => out.push(other.clone()),
        }
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", itoa::Buffer::new().format(*n)),
            Value::Float(x) => write!(f, "{}", format_float(*x)),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{}", item)?;
                }
                Ok(())
            }
        }
    }
}

/// Shortest round-trip rendering; integral values drop the trailing ".0".
pub fn format_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        return itoa::Buffer::new().format(x as i64).to_string();
    }
    if !x.is_finite() {
        return x.to_string();
    }
    ryu::Buffer::new().format_finite(x).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_scalars() {
        assert_eq!(Value::infer("42"), Value::Int(42));
        assert_eq!(Value::infer("-3"), Value::Int(-3));
        assert_eq!(Value::infer("0.25"), Value::Float(0.25));
        assert_eq!(Value::infer("1e-5"), Value::Float(1e-5));
        assert_eq!(Value::infer("gene1"), Value::Str("gene1".to_string()));
        assert_eq!(Value::infer("nan"), Value::Str("nan".to_string()));
    }

    #[test]
    fn test_infer_list() {
        assert_eq!(
            Value::infer_list("1,2.5,x"),
            Value::List(vec![Value::Int(1), Value::Float(2.5), Value::from("x")])
        );
        assert_eq!(Value::infer_list("7"), Value::Int(7));
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::from("3.5").as_f64(), Some(3.5));
        assert_eq!(Value::from("abc").as_f64(), None);
        assert_eq!(Value::Bool(true).as_f64(), None);
        assert_eq!(Value::Float(2.5).as_i64(), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Float(3.0).to_string(), "3");
        assert_eq!(Value::Float(0.1).to_string(), "0.1");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(
            Value::List(vec![Value::from("A"), Value::Int(2)]).to_string(),
            "A,2"
        );
    }

    #[test]
    fn test_flatten_into() {
        let mut out = Vec::new();
        Value::List(vec![Value::Int(1), Value::Int(2)]).flatten_into(&mut out);
        Value::Int(3).flatten_into(&mut out);
        assert_eq!(out, vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
    }
}
