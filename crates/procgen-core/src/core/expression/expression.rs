use super::ast::ExpressionNode;
use super::error::ExpressionError;
use super::parser::Parser;
use super::value::ExpressionValue;
use super::variable::{Chained, ExpressionVariable, NoVariables, VariableSource};
use std::fmt;

/// A parsed arithmetic expression together with its source text and any
/// locally declared variables.
///
/// Local variables shadow external ones of the same name.
#[derive(Debug, Clone, Default)]
pub struct Expression {
    text: String,
    root: Option<ExpressionNode>,
    locals: Vec<ExpressionVariable>,
}

impl Expression {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses `text` without checking that referenced variables exist.
    ///
    /// # Errors
    ///
    /// Returns the syntax error if the text cannot be parsed.
    pub fn parse(text: &str) -> Result<Self, ExpressionError> {
        let mut expression = Self::new();
        expression.create(text, &NoVariables, false)?;
        Ok(expression)
    }

    /// Creates a new expression with the given local variables, validating every
    /// referenced variable against the locals and `externals`.
    pub fn with_locals(
        text: &str,
        locals: Vec<ExpressionVariable>,
        externals: &dyn VariableSource,
    ) -> Result<Self, ExpressionError> {
        let mut expression = Self {
            locals,
            ..Self::default()
        };
        expression.create(text, externals, true)?;
        Ok(expression)
    }

    /// Replaces the current tree by parsing `text`.
    ///
    /// When `validate` is set, every variable referenced by the expression must be
    /// resolvable through the local variables or `externals` at this point.
    /// On any failure the previous tree is cleared, so the expression is left invalid
    /// rather than partially updated.
    ///
    /// # Arguments
    ///
    /// * `text` - The expression source.
    /// * `externals` - Variables visible at the point of use (e.g. in-scope parameters).
    /// * `validate` - Whether unresolvable variable names are an error.
    pub fn create(
        &mut self,
        text: &str,
        externals: &dyn VariableSource,
        validate: bool,
    ) -> Result<(), ExpressionError> {
        self.root = None;
        self.text.clear();

        let root = Parser::new(text)?.parse()?.ok_or(ExpressionError::Empty)?;

        if validate {
            let mut names = Vec::new();
            root.variables(&mut names);
            for name in names {
                if self.locals.variable(name).is_none() && externals.variable(name).is_none() {
                    return Err(ExpressionError::UndefinedVariable(name.to_string()));
                }
            }
        }

        self.root = Some(root);
        self.text = text.trim().to_string();
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.root.is_some()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn locals(&self) -> &[ExpressionVariable] {
        &self.locals
    }

    /// Declares a local variable, replacing the value of an existing one with the same name.
    pub fn add_local_variable(&mut self, name: &str, value: ExpressionValue) {
        match self.locals.iter_mut().find(|v| v.name() == name) {
            Some(existing) => existing.set_value(value),
            None => self.locals.push(ExpressionVariable::new(name, value)),
        }
    }

    /// Sets the value of an existing local variable. Returns `false` if it is not declared.
    pub fn set_local(&mut self, name: &str, value: ExpressionValue) -> bool {
        match self.locals.iter_mut().find(|v| v.name() == name) {
            Some(var) => {
                var.set_value(value);
                true
            }
            None => false,
        }
    }

    /// Names of all variables the expression references.
    pub fn referenced_variables(&self) -> Vec<&str> {
        let mut names = Vec::new();
        if let Some(root) = &self.root {
            root.variables(&mut names);
        }
        names
    }

    pub fn try_evaluate(
        &self,
        externals: &dyn VariableSource,
    ) -> Result<ExpressionValue, ExpressionError> {
        let root = self.root.as_ref().ok_or(ExpressionError::Empty)?;
        let scope = Chained {
            first: &self.locals,
            second: externals,
        };
        root.evaluate(&scope)
    }

    /// Evaluates the expression, returning `None` if any referenced variable is
    /// undefined or evaluation otherwise fails. Callers must treat `None` as an error.
    pub fn evaluate(&self, externals: &dyn VariableSource) -> Option<ExpressionValue> {
        self.try_evaluate(externals).ok()
    }

    /// Evaluates and truncates the result to an integer.
    pub fn as_integer(&self, externals: &dyn VariableSource) -> Result<i64, ExpressionError> {
        self.try_evaluate(externals).map(|v| v.as_integer())
    }

    /// Evaluates and promotes the result to a double.
    pub fn as_double(&self, externals: &dyn VariableSource) -> Result<f64, ExpressionError> {
        self.try_evaluate(externals).map(|v| v.as_double())
    }
}

impl PartialEq for Expression {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, ExpressionValue)]) -> Vec<ExpressionVariable> {
        pairs
            .iter()
            .map(|(name, value)| ExpressionVariable::new(name, *value))
            .collect()
    }

    #[test]
    fn evaluates_against_external_variables() {
        let externals = vars(&[
            ("a", ExpressionValue::Integer(3)),
            ("b", ExpressionValue::Integer(4)),
        ]);
        let mut expr = Expression::new();
        expr.create("a+b*2", &externals, true).unwrap();

        assert_eq!(expr.evaluate(&externals), Some(ExpressionValue::Integer(11)));
    }

    #[test]
    fn undefined_variable_at_evaluation_gives_absent_result() {
        let expr = Expression::parse("a+1").unwrap();
        assert!(expr.is_valid());
        assert_eq!(expr.evaluate(&NoVariables), None);
        assert_eq!(
            expr.try_evaluate(&NoVariables),
            Err(ExpressionError::UndefinedVariable("a".into()))
        );
    }

    #[test]
    fn validation_rejects_unknown_variables_at_creation() {
        let mut expr = Expression::new();
        let err = expr.create("x*2", &NoVariables, true).unwrap_err();
        assert_eq!(err, ExpressionError::UndefinedVariable("x".into()));
        assert!(!expr.is_valid());
    }

    #[test]
    fn failed_parse_clears_previous_tree() {
        let mut expr = Expression::parse("1+2").unwrap();
        assert!(expr.create("1+", &NoVariables, false).is_err());
        assert!(!expr.is_valid());
        assert_eq!(expr.text(), "");
        assert_eq!(expr.evaluate(&NoVariables), None);
    }

    #[test]
    fn local_variables_shadow_externals() {
        let externals = vars(&[("x", ExpressionValue::Integer(100))]);
        let expr = Expression::with_locals(
            "x+1",
            vars(&[("x", ExpressionValue::Integer(1))]),
            &externals,
        )
        .unwrap();
        assert_eq!(expr.evaluate(&externals), Some(ExpressionValue::Integer(2)));
    }

    #[test]
    fn locals_can_be_updated_between_evaluations() {
        let mut expr = Expression::with_locals(
            "x*x",
            vars(&[("x", ExpressionValue::Integer(0))]),
            &NoVariables,
        )
        .unwrap();
        assert!(expr.set_local("x", ExpressionValue::Double(1.5)));
        assert_eq!(expr.as_double(&NoVariables), Ok(2.25));
        assert!(!expr.set_local("y", ExpressionValue::Integer(1)));
    }

    #[test]
    fn integer_arithmetic_stays_integral() {
        let expr = Expression::parse("7/2").unwrap();
        assert_eq!(expr.evaluate(&NoVariables), Some(ExpressionValue::Integer(3)));
        let expr = Expression::parse("7/2.0").unwrap();
        assert_eq!(expr.evaluate(&NoVariables), Some(ExpressionValue::Double(3.5)));
    }

    #[test]
    fn division_by_zero_is_an_evaluation_failure() {
        let expr = Expression::parse("1/0").unwrap();
        assert_eq!(
            expr.try_evaluate(&NoVariables),
            Err(ExpressionError::DivisionByZero)
        );
        let expr = Expression::parse("5 % 0").unwrap();
        assert_eq!(expr.evaluate(&NoVariables), None);
    }

    #[test]
    fn conversions_truncate_and_promote_explicitly() {
        let expr = Expression::parse("2.75").unwrap();
        assert_eq!(expr.as_integer(&NoVariables), Ok(2));
        let expr = Expression::parse("3").unwrap();
        assert_eq!(expr.as_double(&NoVariables), Ok(3.0));
    }

    #[test]
    fn integer_negation_and_abs_wrap_at_the_minimum() {
        let expr = Expression::parse("-(-9223372036854775807-1)").unwrap();
        assert_eq!(expr.try_evaluate(&NoVariables), Ok(ExpressionValue::Integer(i64::MIN)));
        let expr = Expression::parse("abs(-9223372036854775807-1)").unwrap();
        assert_eq!(expr.try_evaluate(&NoVariables), Ok(ExpressionValue::Integer(i64::MIN)));
    }

    #[test]
    fn empty_text_is_not_a_valid_expression() {
        assert_eq!(Expression::parse("   ").unwrap_err(), ExpressionError::Empty);
    }
}
