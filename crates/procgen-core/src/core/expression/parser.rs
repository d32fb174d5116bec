use super::ast::{BinaryOperator, ExpressionNode, UnaryOperator};
use super::error::ExpressionError;
use super::functions::Function;
use super::tokenizer::{Spanned, Token, tokenize};

/// Operator binding strength, lowest first.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest = 0,
    Or = 1,
    And = 2,
    Equality = 3,
    Comparison = 4,
    Additive = 5,
    Multiplicative = 6,
    Unary = 7,
    Power = 8,
}

fn binary_precedence(token: &Token) -> Option<(Precedence, BinaryOperator)> {
    match token {
        Token::Plus => Some((Precedence::Additive, BinaryOperator::Add)),
        Token::Minus => Some((Precedence::Additive, BinaryOperator::Subtract)),
        Token::Star => Some((Precedence::Multiplicative, BinaryOperator::Multiply)),
        Token::Slash => Some((Precedence::Multiplicative, BinaryOperator::Divide)),
        Token::Percent => Some((Precedence::Multiplicative, BinaryOperator::Modulus)),
        Token::Caret => Some((Precedence::Power, BinaryOperator::Power)),
        Token::Equal => Some((Precedence::Equality, BinaryOperator::Equal)),
        Token::NotEqual => Some((Precedence::Equality, BinaryOperator::NotEqual)),
        Token::Less => Some((Precedence::Comparison, BinaryOperator::Less)),
        Token::LessEqual => Some((Precedence::Comparison, BinaryOperator::LessEqual)),
        Token::Greater => Some((Precedence::Comparison, BinaryOperator::Greater)),
        Token::GreaterEqual => Some((Precedence::Comparison, BinaryOperator::GreaterEqual)),
        Token::And => Some((Precedence::And, BinaryOperator::And)),
        Token::Or => Some((Precedence::Or, BinaryOperator::Or)),
        _ => None,
    }
}

/// Pratt parser over a pre-tokenised expression.
pub struct Parser {
    tokens: Vec<Spanned>,
    position: usize,
}

impl Parser {
    pub fn new(text: &str) -> Result<Self, ExpressionError> {
        Ok(Self {
            tokens: tokenize(text)?,
            position: 0,
        })
    }

    /// Parses the whole input. An input with no tokens yields `Ok(None)`.
    pub fn parse(mut self) -> Result<Option<ExpressionNode>, ExpressionError> {
        if self.tokens.is_empty() {
            return Ok(None);
        }
        let node = self.parse_expression(Precedence::Lowest)?;
        if let Some(extra) = self.tokens.get(self.position) {
            return Err(ExpressionError::UnexpectedToken {
                token: extra.token.describe(),
                position: extra.position,
            });
        }
        Ok(Some(node))
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position).map(|s| &s.token)
    }

    fn advance(&mut self) -> Option<Spanned> {
        let token = self.tokens.get(self.position).cloned();
        if token.is_some() {
            self.position += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ExpressionError> {
        match self.advance() {
            Some(s) if s.token == expected => Ok(()),
            Some(s) => Err(ExpressionError::UnexpectedToken {
                token: s.token.describe(),
                position: s.position,
            }),
            None => Err(ExpressionError::UnexpectedEnd),
        }
    }

    fn parse_expression(&mut self, min: Precedence) -> Result<ExpressionNode, ExpressionError> {
        let mut lhs = self.parse_prefix()?;

        while let Some((precedence, op)) = self.peek().and_then(binary_precedence) {
            if precedence <= min {
                break;
            }
            self.advance();
            // `^` is right-associative: parse its rhs at one level lower.
            let rhs_min = if precedence == Precedence::Power {
                Precedence::Unary
            } else {
                precedence
            };
            let rhs = self.parse_expression(rhs_min)?;
            lhs = ExpressionNode::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn parse_prefix(&mut self) -> Result<ExpressionNode, ExpressionError> {
        let Some(spanned) = self.advance() else {
            return Err(ExpressionError::UnexpectedEnd);
        };

        match spanned.token {
            Token::Integer(i) => Ok(ExpressionNode::Integer(i)),
            Token::Real(r) => Ok(ExpressionNode::Real(r)),
            Token::Minus => {
                let operand = self.parse_expression(Precedence::Unary)?;
                Ok(ExpressionNode::Unary {
                    op: UnaryOperator::Negate,
                    operand: Box::new(operand),
                })
            }
            Token::Plus => self.parse_expression(Precedence::Unary),
            Token::Not => {
                let operand = self.parse_expression(Precedence::Unary)?;
                Ok(ExpressionNode::Unary {
                    op: UnaryOperator::Not,
                    operand: Box::new(operand),
                })
            }
            Token::LeftParen => {
                let inner = self.parse_expression(Precedence::Lowest)?;
                self.expect(Token::RightParen)?;
                Ok(inner)
            }
            Token::Identifier(name) => {
                if self.peek() == Some(&Token::LeftParen) {
                    self.advance();
                    return self.parse_call(name);
                }
                if name.eq_ignore_ascii_case("pi") {
                    return Ok(ExpressionNode::Constant("pi", std::f64::consts::PI));
                }
                Ok(ExpressionNode::Variable(name))
            }
            other => Err(ExpressionError::UnexpectedToken {
                token: other.describe(),
                position: spanned.position,
            }),
        }
    }

    fn parse_call(&mut self, name: String) -> Result<ExpressionNode, ExpressionError> {
        let function = Function::lookup(&name).ok_or(ExpressionError::UnknownFunction(name))?;

        let mut args = Vec::new();
        if self.peek() == Some(&Token::RightParen) {
            self.advance();
        } else {
            loop {
                args.push(self.parse_expression(Precedence::Lowest)?);
                match self.advance() {
                    Some(Spanned {
                        token: Token::Comma,
                        ..
                    }) => continue,
                    Some(Spanned {
                        token: Token::RightParen,
                        ..
                    }) => break,
                    Some(s) => {
                        return Err(ExpressionError::UnexpectedToken {
                            token: s.token.describe(),
                            position: s.position,
                        });
                    }
                    None => return Err(ExpressionError::UnexpectedEnd),
                }
            }
        }

        function.check_arity(args.len())?;
        Ok(ExpressionNode::Call { function, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::expression::value::ExpressionValue;
    use crate::core::expression::variable::NoVariables;

    fn eval(text: &str) -> ExpressionValue {
        Parser::new(text)
            .unwrap()
            .parse()
            .unwrap()
            .unwrap()
            .evaluate(&NoVariables)
            .unwrap()
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert_eq!(eval("3+4*2"), ExpressionValue::Integer(11));
        assert_eq!(eval("(3+4)*2"), ExpressionValue::Integer(14));
    }

    #[test]
    fn power_is_right_associative_and_binds_tighter_than_unary_minus() {
        assert_eq!(eval("2^3^2"), ExpressionValue::Integer(512));
        assert_eq!(eval("-2^2"), ExpressionValue::Integer(-4));
    }

    #[test]
    fn subtraction_is_left_associative() {
        assert_eq!(eval("10-4-3"), ExpressionValue::Integer(3));
        assert_eq!(eval("100/10/5"), ExpressionValue::Integer(2));
    }

    #[test]
    fn comparisons_and_logic_produce_integer_flags() {
        assert_eq!(eval("1 < 2 && 3 >= 3"), ExpressionValue::Integer(1));
        assert_eq!(eval("1 == 2 || !1"), ExpressionValue::Integer(0));
    }

    #[test]
    fn function_calls_check_argument_count() {
        let err = Parser::new("sqrt(1, 2)").unwrap().parse().unwrap_err();
        assert!(matches!(err, ExpressionError::ArgumentCount { .. }));
        assert_eq!(eval("if(1 > 0, 5, 6)"), ExpressionValue::Integer(5));
    }

    #[test]
    fn unknown_function_is_a_parse_error() {
        let err = Parser::new("floor(2.5)").unwrap().parse().unwrap_err();
        assert_eq!(err, ExpressionError::UnknownFunction("floor".into()));
    }

    #[test]
    fn trailing_tokens_are_rejected() {
        let err = Parser::new("1 2").unwrap().parse().unwrap_err();
        assert!(matches!(err, ExpressionError::UnexpectedToken { position: 2, .. }));
    }

    #[test]
    fn unbalanced_parenthesis_is_rejected() {
        assert_eq!(
            Parser::new("(1+2").unwrap().parse().unwrap_err(),
            ExpressionError::UnexpectedEnd
        );
    }

    #[test]
    fn pi_is_a_builtin_constant() {
        let value = eval("2*pi");
        assert!((value.as_double() - 2.0 * std::f64::consts::PI).abs() < 1e-12);
    }
}
