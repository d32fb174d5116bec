use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExpressionError {
    #[error("Unexpected character '{character}' at position {position}")]
    UnexpectedCharacter { character: char, position: usize },

    #[error("Unexpected token '{token}' at position {position}")]
    UnexpectedToken { token: String, position: usize },

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Invalid numeric literal '{0}'")]
    InvalidNumber(String),

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Function '{function}' expects {expected} argument(s) but was given {found}")]
    ArgumentCount {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("Variable '{0}' is not defined")]
    UndefinedVariable(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Argument out of domain for '{0}'")]
    Domain(&'static str),

    #[error("Expression has no valid content")]
    Empty,
}

impl ExpressionError {
    /// Whether the error can only arise while evaluating (as opposed to parsing).
    pub fn is_evaluation_error(&self) -> bool {
        matches!(
            self,
            ExpressionError::UndefinedVariable(_)
                | ExpressionError::DivisionByZero
                | ExpressionError::Domain(_)
                | ExpressionError::Empty
        )
    }
}
