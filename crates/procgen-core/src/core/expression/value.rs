use std::fmt;

/// A numeric value produced by evaluating an expression.
///
/// Integer and real values are kept distinct so that integer arithmetic stays
/// integral (`7 / 2 == 3`) while any real operand promotes the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExpressionValue {
    Integer(i64),
    Double(f64),
}

impl ExpressionValue {
    pub fn is_integer(&self) -> bool {
        matches!(self, ExpressionValue::Integer(_))
    }

    /// Returns the value as an integer, truncating any fractional part towards zero.
    pub fn as_integer(&self) -> i64 {
        match *self {
            ExpressionValue::Integer(i) => i,
            ExpressionValue::Double(d) => d.trunc() as i64,
        }
    }

    /// Returns the value as a double, promoting integers exactly where representable.
    pub fn as_double(&self) -> f64 {
        match *self {
            ExpressionValue::Integer(i) => i as f64,
            ExpressionValue::Double(d) => d,
        }
    }

    /// Logical truth of the value: strictly positive means `true`.
    pub fn is_truthy(&self) -> bool {
        match *self {
            ExpressionValue::Integer(i) => i > 0,
            ExpressionValue::Double(d) => d > 0.0,
        }
    }

    pub fn from_bool(b: bool) -> Self {
        ExpressionValue::Integer(if b { 1 } else { 0 })
    }

    pub fn both_integers(a: &ExpressionValue, b: &ExpressionValue) -> bool {
        a.is_integer() && b.is_integer()
    }
}

impl Default for ExpressionValue {
    fn default() -> Self {
        ExpressionValue::Integer(0)
    }
}

impl From<i64> for ExpressionValue {
    fn from(value: i64) -> Self {
        ExpressionValue::Integer(value)
    }
}

impl From<f64> for ExpressionValue {
    fn from(value: f64) -> Self {
        ExpressionValue::Double(value)
    }
}

impl fmt::Display for ExpressionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpressionValue::Integer(i) => write!(f, "{}", i),
            ExpressionValue::Double(d) => write!(f, "{:?}", d),
        }
    }
}
