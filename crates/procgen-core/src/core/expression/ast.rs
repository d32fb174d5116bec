use super::error::ExpressionError;
use super::functions::Function;
use super::value::ExpressionValue;
use super::variable::VariableSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulus,
    Power,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionNode {
    Integer(i64),
    Real(f64),
    Constant(&'static str, f64),
    Variable(String),
    Unary {
        op: UnaryOperator,
        operand: Box<ExpressionNode>,
    },
    Binary {
        op: BinaryOperator,
        lhs: Box<ExpressionNode>,
        rhs: Box<ExpressionNode>,
    },
    Call {
        function: Function,
        args: Vec<ExpressionNode>,
    },
}

impl ExpressionNode {
    pub fn evaluate(&self, vars: &dyn VariableSource) -> Result<ExpressionValue, ExpressionError> {
        match self {
            ExpressionNode::Integer(i) => Ok(ExpressionValue::Integer(*i)),
            ExpressionNode::Real(r) => Ok(ExpressionValue::Double(*r)),
            ExpressionNode::Constant(_, value) => Ok(ExpressionValue::Double(*value)),
            ExpressionNode::Variable(name) => vars
                .variable(name)
                .ok_or_else(|| ExpressionError::UndefinedVariable(name.clone())),
            ExpressionNode::Unary { op, operand } => {
                let value = operand.evaluate(vars)?;
                Ok(match op {
                    UnaryOperator::Negate => match value {
                        ExpressionValue::Integer(i) => ExpressionValue::Integer(i.wrapping_neg()),
                        ExpressionValue::Double(d) => ExpressionValue::Double(-d),
                    },
                    UnaryOperator::Not => ExpressionValue::from_bool(!value.is_truthy()),
                })
            }
            ExpressionNode::Binary { op, lhs, rhs } => {
                // Logical operators short-circuit, so an undefined variable on the
                // unevaluated side is not an error.
                match op {
                    BinaryOperator::And => {
                        let a = lhs.evaluate(vars)?;
                        if !a.is_truthy() {
                            return Ok(ExpressionValue::from_bool(false));
                        }
                        let b = rhs.evaluate(vars)?;
                        return Ok(ExpressionValue::from_bool(b.is_truthy()));
                    }
                    BinaryOperator::Or => {
                        let a = lhs.evaluate(vars)?;
                        if a.is_truthy() {
                            return Ok(ExpressionValue::from_bool(true));
                        }
                        let b = rhs.evaluate(vars)?;
                        return Ok(ExpressionValue::from_bool(b.is_truthy()));
                    }
                    _ => {}
                }
                let a = lhs.evaluate(vars)?;
                let b = rhs.evaluate(vars)?;
                apply_binary(*op, a, b)
            }
            ExpressionNode::Call { function, args } => match function {
                Function::If => {
                    let condition = args
                        .first()
                        .ok_or(ExpressionError::UnexpectedEnd)?
                        .evaluate(vars)?;
                    if condition.is_truthy() {
                        args.get(1)
                            .ok_or(ExpressionError::UnexpectedEnd)?
                            .evaluate(vars)
                    } else {
                        match args.get(2) {
                            Some(alternative) => alternative.evaluate(vars),
                            None => Ok(ExpressionValue::Integer(0)),
                        }
                    }
                }
                _ => {
                    let x = args
                        .first()
                        .ok_or(ExpressionError::UnexpectedEnd)?
                        .evaluate(vars)?;
                    function.apply(x)
                }
            },
        }
    }

    /// Collects the names of all variables referenced by this tree.
    pub fn variables<'a>(&'a self, names: &mut Vec<&'a str>) {
        match self {
            ExpressionNode::Variable(name) => {
                if !names.contains(&name.as_str()) {
                    names.push(name);
                }
            }
            ExpressionNode::Unary { operand, .. } => operand.variables(names),
            ExpressionNode::Binary { lhs, rhs, .. } => {
                lhs.variables(names);
                rhs.variables(names);
            }
            ExpressionNode::Call { args, .. } => {
                for arg in args {
                    arg.variables(names);
                }
            }
            ExpressionNode::Integer(_) | ExpressionNode::Real(_) | ExpressionNode::Constant(..) => {}
        }
    }
}

fn apply_binary(
    op: BinaryOperator,
    a: ExpressionValue,
    b: ExpressionValue,
) -> Result<ExpressionValue, ExpressionError> {
    use ExpressionValue::{Double, Integer};

    let ints = match (a, b) {
        (Integer(x), Integer(y)) => Some((x, y)),
        _ => None,
    };
    let (x, y) = (a.as_double(), b.as_double());

    let result = match op {
        BinaryOperator::Add => match ints {
            Some((i, j)) => Integer(i.wrapping_add(j)),
            None => Double(x + y),
        },
        BinaryOperator::Subtract => match ints {
            Some((i, j)) => Integer(i.wrapping_sub(j)),
            None => Double(x - y),
        },
        BinaryOperator::Multiply => match ints {
            Some((i, j)) => Integer(i.wrapping_mul(j)),
            None => Double(x * y),
        },
        BinaryOperator::Divide => match ints {
            Some((_, 0)) => return Err(ExpressionError::DivisionByZero),
            Some((i, j)) => Integer(i.wrapping_div(j)),
            None => {
                if y == 0.0 {
                    return Err(ExpressionError::DivisionByZero);
                }
                Double(x / y)
            }
        },
        BinaryOperator::Modulus => match ints {
            Some((_, 0)) => return Err(ExpressionError::DivisionByZero),
            Some((i, j)) => Integer(i.wrapping_rem(j)),
            None => {
                if y == 0.0 {
                    return Err(ExpressionError::DivisionByZero);
                }
                Double(x % y)
            }
        },
        BinaryOperator::Power => match ints {
            Some((i, j)) if (0..=u32::MAX as i64).contains(&j) => Integer(i.wrapping_pow(j as u32)),
            _ => Double(x.powf(y)),
        },
        BinaryOperator::Equal => match ints {
            Some((i, j)) => ExpressionValue::from_bool(i == j),
            None => ExpressionValue::from_bool(x == y),
        },
        BinaryOperator::NotEqual => match ints {
            Some((i, j)) => ExpressionValue::from_bool(i != j),
            None => ExpressionValue::from_bool(x != y),
        },
        BinaryOperator::Less => match ints {
            Some((i, j)) => ExpressionValue::from_bool(i < j),
            None => ExpressionValue::from_bool(x < y),
        },
        BinaryOperator::LessEqual => match ints {
            Some((i, j)) => ExpressionValue::from_bool(i <= j),
            None => ExpressionValue::from_bool(x <= y),
        },
        BinaryOperator::Greater => match ints {
            Some((i, j)) => ExpressionValue::from_bool(i > j),
            None => ExpressionValue::from_bool(x > y),
        },
        BinaryOperator::GreaterEqual => match ints {
            Some((i, j)) => ExpressionValue::from_bool(i >= j),
            None => ExpressionValue::from_bool(x >= y),
        },
        BinaryOperator::And => ExpressionValue::from_bool(a.is_truthy() && b.is_truthy()),
        BinaryOperator::Or => ExpressionValue::from_bool(a.is_truthy() || b.is_truthy()),
    };
    Ok(result)
}
