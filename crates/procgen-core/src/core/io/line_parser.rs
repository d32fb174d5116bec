use thiserror::Error;

/// One non-empty input line split into arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine {
    /// 1-based line number in the source text.
    pub number: usize,
    pub args: Vec<String>,
}

impl ParsedLine {
    pub fn keyword(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }

    /// Arguments following the leading keyword.
    pub fn arguments(&self) -> &[String] {
        self.args.get(1..).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LineParseError {
    #[error("Unterminated quote on line {line}")]
    UnterminatedQuote { line: usize },
}

/// Splits text into whitespace-delimited arguments, line by line.
///
/// Single or double quotes group text containing whitespace into a single argument
/// and are removed. A `#` outside quotes starts a comment. Blank and comment-only
/// lines are skipped.
#[derive(Debug)]
pub struct LineParser<'a> {
    lines: std::iter::Enumerate<std::str::Lines<'a>>,
}

impl<'a> LineParser<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate(),
        }
    }

    /// Returns the next non-empty line, or `None` at the end of the input.
    pub fn next_line(&mut self) -> Result<Option<ParsedLine>, LineParseError> {
        for (index, line) in self.lines.by_ref() {
            let number = index + 1;
            let args = split_arguments(line).ok_or(LineParseError::UnterminatedQuote { line: number })?;
            if !args.is_empty() {
                return Ok(Some(ParsedLine { number, args }));
            }
        }
        Ok(None)
    }
}

fn split_arguments(line: &str) -> Option<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_arg = false;
    let mut quote: Option<char> = None;

    for c in line.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None => match c {
                '#' => break,
                '\'' | '"' => {
                    quote = Some(c);
                    in_arg = true;
                }
                c if c.is_whitespace() => {
                    if in_arg {
                        args.push(std::mem::take(&mut current));
                        in_arg = false;
                    }
                }
                c => {
                    current.push(c);
                    in_arg = true;
                }
            },
        }
    }

    if quote.is_some() {
        return None;
    }
    if in_arg {
        args.push(current);
    }
    Some(args)
}

/// Quotes `text` for output if it would not survive re-splitting as a single argument.
pub fn quote_if_needed(text: &str) -> String {
    let needs_quotes = text.is_empty()
        || text
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '#' | '\'' | '"'));
    if needs_quotes {
        quote(text)
    } else {
        text.to_string()
    }
}

/// Quotes `text` unconditionally, choosing a quote character it does not contain.
pub fn quote(text: &str) -> String {
    if text.contains('\'') {
        format!("\"{}\"", text)
    } else {
        format!("'{}'", text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_blank_and_comment_lines_and_tracks_numbers() {
        let mut parser = LineParser::new("\n# header\n  Select 'A B'  # trailing\n\nEndSelect\n");
        let first = parser.next_line().unwrap().unwrap();
        assert_eq!(first.number, 3);
        assert_eq!(first.keyword(), "Select");
        assert_eq!(first.arguments(), ["A B".to_string()]);

        let second = parser.next_line().unwrap().unwrap();
        assert_eq!(second.number, 5);
        assert!(parser.next_line().unwrap().is_none());
    }

    #[test]
    fn hash_inside_quotes_is_literal() {
        let mut parser = LineParser::new("Label \"a # b\" c");
        let line = parser.next_line().unwrap().unwrap();
        assert_eq!(line.args, vec!["Label", "a # b", "c"]);
    }

    #[test]
    fn empty_quoted_argument_is_kept() {
        let mut parser = LineParser::new("Text ''");
        let line = parser.next_line().unwrap().unwrap();
        assert_eq!(line.args, vec!["Text".to_string(), String::new()]);
    }

    #[test]
    fn unterminated_quote_reports_line() {
        let mut parser = LineParser::new("ok\nParameter a 'b+1\n");
        parser.next_line().unwrap();
        assert_eq!(
            parser.next_line(),
            Err(LineParseError::UnterminatedQuote { line: 2 })
        );
    }

    #[test]
    fn quote_if_needed_only_quotes_when_required() {
        assert_eq!(quote_if_needed("b*2"), "b*2");
        assert_eq!(quote_if_needed("b * 2"), "'b * 2'");
        assert_eq!(quote_if_needed(""), "''");
        assert_eq!(quote_if_needed("it's"), "\"it's\"");
    }
}
