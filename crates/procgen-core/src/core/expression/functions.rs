use super::error::ExpressionError;
use super::value::ExpressionValue;
use phf::phf_map;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Abs,
    Acos,
    Asin,
    Atan,
    Cos,
    Exp,
    Ln,
    Log,
    Nint,
    Sin,
    Sqrt,
    Tan,
    If,
}

static FUNCTIONS: phf::Map<&'static str, Function> = phf_map! {
    "abs" => Function::Abs,
    "acos" => Function::Acos,
    "asin" => Function::Asin,
    "atan" => Function::Atan,
    "cos" => Function::Cos,
    "exp" => Function::Exp,
    "ln" => Function::Ln,
    "log" => Function::Log,
    "nint" => Function::Nint,
    "sin" => Function::Sin,
    "sqrt" => Function::Sqrt,
    "tan" => Function::Tan,
    "if" => Function::If,
};

impl Function {
    pub fn lookup(name: &str) -> Option<Function> {
        FUNCTIONS.get(name.to_ascii_lowercase().as_str()).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Acos => "acos",
            Function::Asin => "asin",
            Function::Atan => "atan",
            Function::Cos => "cos",
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Log => "log",
            Function::Nint => "nint",
            Function::Sin => "sin",
            Function::Sqrt => "sqrt",
            Function::Tan => "tan",
            Function::If => "if",
        }
    }

    /// Inclusive range of accepted argument counts.
    pub fn arity(&self) -> (usize, usize) {
        match self {
            Function::If => (2, 3),
            _ => (1, 1),
        }
    }

    pub fn check_arity(&self, found: usize) -> Result<(), ExpressionError> {
        let (min, max) = self.arity();
        if found < min || found > max {
            let expected = if min == max {
                min.to_string()
            } else {
                format!("{}-{}", min, max)
            };
            return Err(ExpressionError::ArgumentCount {
                function: self.name().to_string(),
                expected,
                found,
            });
        }
        Ok(())
    }

    /// Applies a single-argument function. Trigonometric functions work in degrees.
    pub fn apply(&self, x: ExpressionValue) -> Result<ExpressionValue, ExpressionError> {
        let d = x.as_double();
        let value = match self {
            Function::Abs => {
                return Ok(match x {
                    ExpressionValue::Integer(i) => ExpressionValue::Integer(i.wrapping_abs()),
                    ExpressionValue::Double(v) => ExpressionValue::Double(v.abs()),
                });
            }
            Function::Acos => {
                if !(-1.0..=1.0).contains(&d) {
                    return Err(ExpressionError::Domain("acos"));
                }
                d.acos().to_degrees()
            }
            Function::Asin => {
                if !(-1.0..=1.0).contains(&d) {
                    return Err(ExpressionError::Domain("asin"));
                }
                d.asin().to_degrees()
            }
            Function::Atan => d.atan().to_degrees(),
            Function::Cos => d.to_radians().cos(),
            Function::Exp => d.exp(),
            Function::Ln => {
                if d <= 0.0 {
                    return Err(ExpressionError::Domain("ln"));
                }
                d.ln()
            }
            Function::Log => {
                if d <= 0.0 {
                    return Err(ExpressionError::Domain("log"));
                }
                d.log10()
            }
            Function::Nint => return Ok(ExpressionValue::Integer((d + 0.5).floor() as i64)),
            Function::Sin => d.to_radians().sin(),
            Function::Sqrt => {
                if d < 0.0 {
                    return Err(ExpressionError::Domain("sqrt"));
                }
                d.sqrt()
            }
            Function::Tan => d.to_radians().tan(),
            Function::If => return Err(ExpressionError::Domain("if")),
        };
        Ok(ExpressionValue::Double(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        assert_eq!(Function::lookup("SQRT"), Some(Function::Sqrt));
        assert_eq!(Function::lookup("Nint"), Some(Function::Nint));
        assert_eq!(Function::lookup("floor"), None);
    }

    #[test]
    fn trigonometry_uses_degrees() {
        let v = Function::Sin.apply(ExpressionValue::Integer(90)).unwrap();
        assert!((v.as_double() - 1.0).abs() < 1e-12);
        let v = Function::Acos.apply(ExpressionValue::Double(0.0)).unwrap();
        assert!((v.as_double() - 90.0).abs() < 1e-12);
    }

    #[test]
    fn nint_rounds_half_up() {
        assert_eq!(
            Function::Nint.apply(ExpressionValue::Double(2.5)).unwrap(),
            ExpressionValue::Integer(3)
        );
        assert_eq!(
            Function::Nint.apply(ExpressionValue::Double(-2.5)).unwrap(),
            ExpressionValue::Integer(-2)
        );
    }

    #[test]
    fn abs_preserves_integer_type() {
        assert_eq!(
            Function::Abs.apply(ExpressionValue::Integer(-4)).unwrap(),
            ExpressionValue::Integer(4)
        );
    }

    #[test]
    fn domain_errors_are_reported() {
        assert_eq!(
            Function::Sqrt.apply(ExpressionValue::Integer(-1)),
            Err(ExpressionError::Domain("sqrt"))
        );
        assert_eq!(
            Function::Log.apply(ExpressionValue::Integer(0)),
            Err(ExpressionError::Domain("log"))
        );
    }
}
