// nml/src/parser.rs

//! Tokenizer and parser for Fortran namelist text.

use crate::error::{NmlError, Result};
use crate::namelist::Namelist;
use crate::value::NmlValue;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    GroupStart(String),
    GroupEnd,
    Equals,
    Comma,
    Atom(String),
    Quoted(String),
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(content: &'a str) -> Self {
        Self {
            chars: content.chars().peekable(),
            line: 1,
        }
    }

    fn tokenize(mut self) -> Result<Vec<(Token, usize)>> {
        let mut tokens = Vec::new();
        while let Some(&c) = self.chars.peek() {
            match c {
                '\n' => {
                    self.line += 1;
                    self.chars.next();
                }
                c if c.is_whitespace() => {
                    self.chars.next();
                }
                '!' => {
                    // comment runs to end of line
                    while let Some(&c) = self.chars.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.chars.next();
                    }
                }
                '&' => {
                    self.chars.next();
                    let name = self.read_atom();
                    if name.is_empty() {
                        return Err(NmlError::parse("missing group name after '&'", self.line));
                    }
                    tokens.push((Token::GroupStart(name), self.line));
                }
                '/' => {
                    self.chars.next();
                    tokens.push((Token::GroupEnd, self.line));
                }
                '=' => {
                    self.chars.next();
                    tokens.push((Token::Equals, self.line));
                }
                ',' => {
                    self.chars.next();
                    tokens.push((Token::Comma, self.line));
                }
                '\'' | '"' => {
                    let text = self.read_quoted(c)?;
                    tokens.push((Token::Quoted(text), self.line));
                }
                _ => {
                    let atom = self.read_atom();
                    tokens.push((Token::Atom(atom), self.line));
                }
            }
        }
        Ok(tokens)
    }

    fn read_atom(&mut self) -> String {
        let mut atom = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_whitespace() || matches!(c, ',' | '=' | '!' | '/' | '&' | '\'' | '"') {
                break;
            }
            atom.push(c);
            self.chars.next();
        }
        atom
    }

    fn read_quoted(&mut self, quote: char) -> Result<String> {
        let start_line = self.line;
        self.chars.next(); // opening quote
        let mut text = String::new();
        loop {
            match self.chars.next() {
                Some(c) if c == quote => {
                    // doubled quote is an escaped literal quote
                    if self.chars.peek() == Some(&quote) {
                        self.chars.next();
                        text.push(quote);
                    } else {
                        return Ok(text);
                    }
                }
                Some('\n') => {
                    return Err(NmlError::parse("unterminated string", start_line));
                }
                Some(c) => text.push(c),
                None => return Err(NmlError::parse("unterminated string", start_line)),
            }
        }
    }
}

pub(crate) fn parse(content: &str) -> Result<Namelist> {
    let tokens = Lexer::new(content).tokenize()?;
    let mut nml = Namelist::new();
    let mut pos = 0;

    while pos < tokens.len() {
        let (token, line) = &tokens[pos];
        match token {
            Token::GroupStart(name) => {
                pos = parse_group(&mut nml, name, &tokens, pos + 1)?;
            }
            _ => {
                return Err(NmlError::parse(
                    format!("expected '&group', found {:?}", token),
                    *line,
                ));
            }
        }
    }
    Ok(nml)
}

fn parse_group(
    nml: &mut Namelist,
    name: &str,
    tokens: &[(Token, usize)],
    mut pos: usize,
) -> Result<usize> {
    let group = nml.insert_group(name);

    loop {
        match tokens.get(pos) {
            Some((Token::GroupEnd, _)) => return Ok(pos + 1),
            Some((Token::Atom(var), line)) => {
                // variable names may carry an index suffix in templates; the
                // index is dropped and values are stored as a flat array
                let var_name = var.split('(').next().unwrap_or(var).to_string();
                match tokens.get(pos + 1) {
                    Some((Token::Equals, _)) => pos += 2,
                    _ => {
                        return Err(NmlError::parse(
                            format!("expected '=' after '{}'", var),
                            *line,
                        ));
                    }
                }
                let (values, next) = parse_values(tokens, pos)?;
                let value = match values.len() {
                    0 => NmlValue::Null,
                    1 => values.into_iter().next().unwrap(),
                    _ => NmlValue::Array(values),
                };
                group.insert(&var_name, value);
                pos = next;
            }
            Some((token, line)) => {
                return Err(NmlError::parse(
                    format!("unexpected token {:?} in group '{}'", token, name),
                    *line,
                ));
            }
            None => {
                return Err(NmlError::parse(
                    format!("unexpected end of input in group '{}'", name),
                    tokens.last().map(|(_, l)| *l).unwrap_or(0),
                ));
            }
        }
    }
}

fn parse_values(tokens: &[(Token, usize)], mut pos: usize) -> Result<(Vec<NmlValue>, usize)> {
    let mut values = Vec::new();
    let mut expect_value = true;

    loop {
        match tokens.get(pos) {
            Some((Token::Quoted(text), _)) => {
                values.push(NmlValue::Character(text.clone()));
                expect_value = false;
                pos += 1;
            }
            Some((Token::Atom(atom), line)) => {
                // an atom followed by '=' starts the next assignment
                if matches!(tokens.get(pos + 1), Some((Token::Equals, _))) {
                    break;
                }
                push_atom_values(atom, &mut values, *line)?;
                expect_value = false;
                pos += 1;
            }
            Some((Token::Comma, _)) => {
                if expect_value {
                    values.push(NmlValue::Null);
                }
                expect_value = true;
                pos += 1;
            }
            _ => break, // group end, next group, or end of input
        }
    }

    Ok((values, pos))
}

// Expands `N*value` repeat shorthand; everything else is a single scalar.
fn push_atom_values(atom: &str, values: &mut Vec<NmlValue>, line: usize) -> Result<()> {
    if let Some((count, rest)) = atom.split_once('*') {
        if let Ok(n) = count.parse::<usize>() {
            if n == 0 {
                return Err(NmlError::parse(format!("zero repeat count '{}'", atom), line));
            }
            let value = if rest.is_empty() {
                NmlValue::Null
            } else {
                NmlValue::parse_scalar(rest)
            };
            values.extend(std::iter::repeat(value).take(n));
            return Ok(());
        }
    }
    values.push(NmlValue::parse_scalar(atom));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_single_line_group() {
        let nml = parse("&data_nml x=1 y=2.0 z=.true. /").unwrap();
        let group = nml.get_group("data_nml").unwrap();
        assert_eq!(group.get_i64("x"), Some(1));
        assert_eq!(group.get_f64("y"), Some(2.0));
        assert_eq!(group.get_bool("z"), Some(true));
    }

    #[test]
    fn test_parse_multiline_with_comments() {
        let text = r#"
&time_control  ! header comment
 run_days = 0,
 start_year = 2000, 2000,  ! one per domain
 io_form_history = 2
/
"#;
        let nml = parse(text).unwrap();
        let tc = nml.get_group("time_control").unwrap();
        assert_eq!(tc.get_i64("run_days"), Some(0));
        assert_eq!(tc.get_i64_vec("start_year"), Some(vec![2000, 2000]));
        assert_eq!(tc.get_i64("io_form_history"), Some(2));
    }

    #[test]
    fn test_parse_repeat_shorthand() {
        let nml = parse("&d v = 3*7 /").unwrap();
        let group = nml.get_group("d").unwrap();
        assert_eq!(group.get_i64_vec("v"), Some(vec![7, 7, 7]));
    }

    #[test]
    fn test_parse_quoted_strings() {
        let nml = parse("&share wrf_core = 'ARW', start_date = '2000-01-01_00:00:00' /").unwrap();
        let share = nml.get_group("share").unwrap();
        assert_eq!(share.get_string("wrf_core"), Some("ARW"));
        assert_eq!(share.get_string("start_date"), Some("2000-01-01_00:00:00"));
    }

    #[test]
    fn test_parse_index_suffix_dropped() {
        let nml = parse("&d eta_levels(1:3) = 1.0, 0.5, 0.0 /").unwrap();
        let group = nml.get_group("d").unwrap();
        assert_eq!(group.get_f64_vec("eta_levels"), Some(vec![1.0, 0.5, 0.0]));
    }

    #[test]
    fn test_parse_error_on_bare_text() {
        assert!(parse("x = 1").is_err());
    }

    #[test]
    fn test_parse_unterminated_string() {
        assert!(parse("&d s = 'oops /").is_err());
    }
}
