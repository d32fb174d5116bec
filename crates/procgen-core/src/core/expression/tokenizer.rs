use super::error::ExpressionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Integer(i64),
    Real(f64),
    Identifier(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Caret,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Not,
    LeftParen,
    RightParen,
    Comma,
}

impl Token {
    pub fn describe(&self) -> String {
        match self {
            Token::Integer(i) => i.to_string(),
            Token::Real(r) => format!("{:?}", r),
            Token::Identifier(name) => name.clone(),
            Token::Plus => "+".into(),
            Token::Minus => "-".into(),
            Token::Star => "*".into(),
            Token::Slash => "/".into(),
            Token::Percent => "%".into(),
            Token::Caret => "^".into(),
            Token::Equal => "==".into(),
            Token::NotEqual => "!=".into(),
            Token::Less => "<".into(),
            Token::LessEqual => "<=".into(),
            Token::Greater => ">".into(),
            Token::GreaterEqual => ">=".into(),
            Token::And => "&&".into(),
            Token::Or => "||".into(),
            Token::Not => "!".into(),
            Token::LeftParen => "(".into(),
            Token::RightParen => ")".into(),
            Token::Comma => ",".into(),
        }
    }
}

/// A token together with the character offset at which it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub position: usize,
}

pub fn tokenize(text: &str) -> Result<Vec<Spanned>, ExpressionError> {
    let chars: Vec<char> = text.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit()))
        {
            let (token, end) = read_number(&chars, i)?;
            tokens.push(Spanned {
                token,
                position: start,
            });
            i = end;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '.')
            {
                i += 1;
            }
            let name: String = chars[start..i].iter().collect();
            tokens.push(Spanned {
                token: Token::Identifier(name),
                position: start,
            });
            continue;
        }

        let next = chars.get(i + 1).copied();
        let (token, width) = match (c, next) {
            ('=', Some('=')) => (Token::Equal, 2),
            ('!', Some('=')) => (Token::NotEqual, 2),
            ('<', Some('=')) => (Token::LessEqual, 2),
            ('>', Some('=')) => (Token::GreaterEqual, 2),
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('<', _) => (Token::Less, 1),
            ('>', _) => (Token::Greater, 1),
            ('!', _) => (Token::Not, 1),
            ('+', _) => (Token::Plus, 1),
            ('-', _) => (Token::Minus, 1),
            ('*', _) => (Token::Star, 1),
            ('/', _) => (Token::Slash, 1),
            ('%', _) => (Token::Percent, 1),
            ('^', _) => (Token::Caret, 1),
            ('(', _) => (Token::LeftParen, 1),
            (')', _) => (Token::RightParen, 1),
            (',', _) => (Token::Comma, 1),
            _ => {
                return Err(ExpressionError::UnexpectedCharacter {
                    character: c,
                    position: start,
                });
            }
        };
        tokens.push(Spanned {
            token,
            position: start,
        });
        i += width;
    }

    Ok(tokens)
}

fn read_number(chars: &[char], start: usize) -> Result<(Token, usize), ExpressionError> {
    let mut i = start;
    let mut is_real = false;

    while i < chars.len() && chars[i].is_ascii_digit() {
        i += 1;
    }
    if i < chars.len() && chars[i] == '.' {
        is_real = true;
        i += 1;
        while i < chars.len() && chars[i].is_ascii_digit() {
            i += 1;
        }
    }
    if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
        let mut j = i + 1;
        if j < chars.len() && (chars[j] == '+' || chars[j] == '-') {
            j += 1;
        }
        if j < chars.len() && chars[j].is_ascii_digit() {
            is_real = true;
            i = j;
            while i < chars.len() && chars[i].is_ascii_digit() {
                i += 1;
            }
        }
    }

    let literal: String = chars[start..i].iter().collect();
    let token = if is_real {
        Token::Real(
            literal
                .parse::<f64>()
                .ok()
                .filter(|d| d.is_finite())
                .ok_or_else(|| ExpressionError::InvalidNumber(literal.clone()))?,
        )
    } else {
        Token::Integer(
            literal
                .parse()
                .map_err(|_| ExpressionError::InvalidNumber(literal.clone()))?,
        )
    };
    Ok((token, i))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<Token> {
        tokenize(text)
            .unwrap()
            .into_iter()
            .map(|s| s.token)
            .collect()
    }

    #[test]
    fn distinguishes_integer_and_real_literals() {
        assert_eq!(
            kinds("3 3.0 2e3 .5"),
            vec![
                Token::Integer(3),
                Token::Real(3.0),
                Token::Real(2000.0),
                Token::Real(0.5)
            ]
        );
    }

    #[test]
    fn identifiers_may_contain_dots_after_first_character() {
        assert_eq!(
            kinds("S1.nSelected*2"),
            vec![
                Token::Identifier("S1.nSelected".into()),
                Token::Star,
                Token::Integer(2)
            ]
        );
    }

    #[test]
    fn two_character_operators_are_recognised() {
        assert_eq!(
            kinds("a<=b&&c!=d||!e"),
            vec![
                Token::Identifier("a".into()),
                Token::LessEqual,
                Token::Identifier("b".into()),
                Token::And,
                Token::Identifier("c".into()),
                Token::NotEqual,
                Token::Identifier("d".into()),
                Token::Or,
                Token::Not,
                Token::Identifier("e".into()),
            ]
        );
    }

    #[test]
    fn rejects_unknown_characters_with_position() {
        let err = tokenize("a + $").unwrap_err();
        assert_eq!(
            err,
            ExpressionError::UnexpectedCharacter {
                character: '$',
                position: 4
            }
        );
    }
}
