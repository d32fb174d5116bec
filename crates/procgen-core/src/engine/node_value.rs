use crate::core::expression::{Expression, ExpressionError, ExpressionValue, VariableSource};
use crate::core::io::line_parser::quote;
use std::fmt;

/// A numeric node field holding either a literal or a live expression.
///
/// Expressions are evaluated on demand against the variables visible at the point
/// of use, so a field such as `boxLength/100` follows later parameter changes.
#[derive(Debug, Clone)]
pub enum NodeValue {
    Integer(i64),
    Double(f64),
    Expression(Expression),
}

impl Default for NodeValue {
    fn default() -> Self {
        NodeValue::Integer(0)
    }
}

impl From<i64> for NodeValue {
    fn from(value: i64) -> Self {
        NodeValue::Integer(value)
    }
}

impl From<f64> for NodeValue {
    fn from(value: f64) -> Self {
        NodeValue::Double(value)
    }
}

fn looks_numeric(text: &str) -> bool {
    !text.is_empty()
        && text.chars().any(|c| c.is_ascii_digit())
        && text
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'))
}

impl NodeValue {
    /// Interprets `text` as an integer or real literal if it is one, otherwise as an
    /// expression whose variables must all be resolvable through `variables`.
    ///
    /// # Errors
    ///
    /// Returns the expression error if the text is neither a literal nor a valid
    /// expression. Reals that overflow to infinity are invalid numbers.
    pub fn parse(text: &str, variables: &dyn VariableSource) -> Result<Self, ExpressionError> {
        let trimmed = text.trim();
        if looks_numeric(trimmed) {
            if let Ok(i) = trimmed.parse::<i64>() {
                return Ok(NodeValue::Integer(i));
            }
            if let Ok(d) = trimmed.parse::<f64>() {
                if !d.is_finite() {
                    return Err(ExpressionError::InvalidNumber(trimmed.to_string()));
                }
                return Ok(NodeValue::Double(d));
            }
        }
        let expression = Expression::with_locals(trimmed, Vec::new(), variables)?;
        Ok(NodeValue::Expression(expression))
    }

    pub fn is_literal(&self) -> bool {
        !matches!(self, NodeValue::Expression(_))
    }

    pub fn evaluate(&self, variables: &dyn VariableSource) -> Result<ExpressionValue, ExpressionError> {
        match self {
            NodeValue::Integer(i) => Ok(ExpressionValue::Integer(*i)),
            NodeValue::Double(d) => Ok(ExpressionValue::Double(*d)),
            NodeValue::Expression(e) => e.try_evaluate(variables),
        }
    }

    /// Evaluates and truncates towards zero.
    pub fn as_integer(&self, variables: &dyn VariableSource) -> Result<i64, ExpressionError> {
        self.evaluate(variables).map(|v| v.as_integer())
    }

    pub fn as_double(&self, variables: &dyn VariableSource) -> Result<f64, ExpressionError> {
        self.evaluate(variables).map(|v| v.as_double())
    }

    /// The value as a single argument of the text format. Reals always carry a
    /// decimal point or exponent so they read back as reals; expressions are quoted.
    pub fn to_argument(&self) -> String {
        match self {
            NodeValue::Integer(i) => i.to_string(),
            NodeValue::Double(d) => format!("{:?}", d),
            NodeValue::Expression(e) => quote(e.text()),
        }
    }

    pub fn to_toml(&self) -> toml::Value {
        match self {
            NodeValue::Integer(i) => toml::Value::Integer(*i),
            NodeValue::Double(d) => toml::Value::Float(*d),
            NodeValue::Expression(e) => toml::Value::String(e.text().to_string()),
        }
    }
}

impl PartialEq for NodeValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NodeValue::Integer(a), NodeValue::Integer(b)) => a == b,
            (NodeValue::Double(a), NodeValue::Double(b)) => a == b,
            (NodeValue::Expression(a), NodeValue::Expression(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeValue::Integer(i) => write!(f, "{}", i),
            NodeValue::Double(d) => write!(f, "{:?}", d),
            NodeValue::Expression(e) => write!(f, "{}", e.text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::ExpressionVariable;
    use crate::core::expression::variable::NoVariables;

    #[test]
    fn literals_are_detected_by_their_characters() {
        assert_eq!(NodeValue::parse("42", &NoVariables).unwrap(), NodeValue::Integer(42));
        assert_eq!(NodeValue::parse("-3", &NoVariables).unwrap(), NodeValue::Integer(-3));
        assert_eq!(NodeValue::parse("1e3", &NoVariables).unwrap(), NodeValue::Double(1000.0));
        assert_eq!(NodeValue::parse(" 0.5 ", &NoVariables).unwrap(), NodeValue::Double(0.5));
        assert!(!NodeValue::parse("2*3", &NoVariables).unwrap().is_literal());
    }

    #[test]
    fn overflowing_reals_are_invalid_numbers() {
        for text in ["1e999", "-1e999", "2*1e999"] {
            let err = NodeValue::parse(text, &NoVariables).unwrap_err();
            assert!(matches!(err, ExpressionError::InvalidNumber(_)), "{text}: {err}");
        }
        assert_eq!(NodeValue::parse("1e308", &NoVariables).unwrap(), NodeValue::Double(1e308));
    }

    #[test]
    fn expressions_are_validated_against_visible_variables() {
        let vars = vec![ExpressionVariable::new("boxLength", ExpressionValue::Double(50.0))];
        let value = NodeValue::parse("boxLength/100", &vars).unwrap();
        assert_eq!(value.as_double(&vars).unwrap(), 0.5);

        let missing = NodeValue::parse("width/2", &vars);
        assert!(matches!(missing, Err(ExpressionError::UndefinedVariable(n)) if n == "width"));
    }

    #[test]
    fn evaluation_failure_is_an_error_not_zero() {
        let vars = vec![ExpressionVariable::new("n", ExpressionValue::Integer(4))];
        let value = NodeValue::parse("n*2", &vars).unwrap();
        assert!(value.as_integer(&NoVariables).is_err());
    }

    #[test]
    fn arguments_read_back_as_the_same_kind() {
        let real = NodeValue::Double(300.0);
        assert_eq!(real.to_argument(), "300.0");
        assert_eq!(NodeValue::parse(&real.to_argument(), &NoVariables).unwrap(), real);

        let expression = NodeValue::parse("1 + 2", &NoVariables).unwrap();
        assert_eq!(expression.to_argument(), "'1 + 2'");
    }
}
