use super::value::ExpressionValue;

/// A named value that expressions may reference.
///
/// The full `name` is derived from an optional prefix and the base name, joined
/// with a `.` (e.g. `S1.nSelected`), and is recomputed whenever either part changes.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionVariable {
    base_name: String,
    prefix: Option<String>,
    name: String,
    value: ExpressionValue,
}

impl ExpressionVariable {
    pub fn new(base_name: &str, value: ExpressionValue) -> Self {
        Self {
            base_name: base_name.to_string(),
            prefix: None,
            name: base_name.to_string(),
            value,
        }
    }

    pub fn with_prefix(mut self, prefix: Option<&str>) -> Self {
        self.set_prefix(prefix);
        self
    }

    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> ExpressionValue {
        self.value
    }

    pub fn set_value(&mut self, value: ExpressionValue) {
        self.value = value;
    }

    pub fn set_base_name(&mut self, base_name: &str) {
        self.base_name = base_name.to_string();
        self.update_name();
    }

    pub fn set_prefix(&mut self, prefix: Option<&str>) {
        self.prefix = prefix.filter(|p| !p.is_empty()).map(str::to_string);
        self.update_name();
    }

    fn update_name(&mut self) {
        self.name = match &self.prefix {
            Some(prefix) => format!("{}.{}", prefix, self.base_name),
            None => self.base_name.clone(),
        };
    }
}

/// Anything able to supply variable values to an evaluating expression.
pub trait VariableSource {
    fn variable(&self, name: &str) -> Option<ExpressionValue>;
}

impl VariableSource for [ExpressionVariable] {
    fn variable(&self, name: &str) -> Option<ExpressionValue> {
        self.iter().find(|v| v.name() == name).map(|v| v.value())
    }
}

impl VariableSource for Vec<ExpressionVariable> {
    fn variable(&self, name: &str) -> Option<ExpressionValue> {
        self.as_slice().variable(name)
    }
}

/// A source that defines no variables at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVariables;

impl VariableSource for NoVariables {
    fn variable(&self, _name: &str) -> Option<ExpressionValue> {
        None
    }
}

/// Searches `first`, falling back to `second`.
pub struct Chained<'a> {
    pub first: &'a dyn VariableSource,
    pub second: &'a dyn VariableSource,
}

impl VariableSource for Chained<'_> {
    fn variable(&self, name: &str) -> Option<ExpressionValue> {
        self.first
            .variable(name)
            .or_else(|| self.second.variable(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_name_tracks_prefix_and_base_name() {
        let mut var = ExpressionVariable::new("nSelected", ExpressionValue::Integer(0));
        assert_eq!(var.name(), "nSelected");

        var.set_prefix(Some("S1"));
        assert_eq!(var.name(), "S1.nSelected");

        var.set_base_name("index");
        assert_eq!(var.name(), "S1.index");

        var.set_prefix(None);
        assert_eq!(var.name(), "index");
    }

    #[test]
    fn empty_prefix_is_treated_as_absent() {
        let var = ExpressionVariable::new("a", ExpressionValue::Integer(1)).with_prefix(Some(""));
        assert_eq!(var.prefix(), None);
        assert_eq!(var.name(), "a");
    }

    #[test]
    fn chained_source_prefers_first() {
        let inner = vec![ExpressionVariable::new("a", ExpressionValue::Integer(1))];
        let outer = vec![
            ExpressionVariable::new("a", ExpressionValue::Integer(2)),
            ExpressionVariable::new("b", ExpressionValue::Integer(3)),
        ];
        let chained = Chained {
            first: &inner,
            second: &outer,
        };
        assert_eq!(chained.variable("a"), Some(ExpressionValue::Integer(1)));
        assert_eq!(chained.variable("b"), Some(ExpressionValue::Integer(3)));
        assert_eq!(chained.variable("c"), None);
    }
}
