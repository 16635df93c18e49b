// wrfrs/src/config/expr.rs

//! A deliberately small expression evaluator for configuration values.
//!
//! Supports integers, floats, booleans, parenthesized arithmetic with
//! `+ - * / %`, and bracketed literal lists (which may contain quoted
//! strings). Nothing else: configuration files never get access to a
//! general-purpose evaluator.

use serde_yaml::Value;

/// Evaluate an expression string into a YAML value.
///
/// Division always yields a real; the other operators stay integral when
/// both operands are integers.
pub fn eval(input: &str) -> Result<Value, String> {
    let tokens = tokenize(input)?;
    let mut parser = ExprParser { tokens, pos: 0 };
    let value = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(format!("trailing input after expression: '{}'", input));
    }
    Ok(value)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

fn tokenize(input: &str) -> Result<Vec<Tok>, String> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '+' => {
                chars.next();
                tokens.push(Tok::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Tok::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Tok::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Tok::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Tok::Percent);
            }
            '(' => {
                chars.next();
                tokens.push(Tok::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Tok::RParen);
            }
            '[' => {
                chars.next();
                tokens.push(Tok::LBracket);
            }
            ']' => {
                chars.next();
                tokens.push(Tok::RBracket);
            }
            ',' => {
                chars.next();
                tokens.push(Tok::Comma);
            }
            '\'' | '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => break,
                        Some(ch) => text.push(ch),
                        None => return Err(format!("unterminated string in '{}'", input)),
                    }
                }
                tokens.push(Tok::Str(text));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut number = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        number.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if number.contains('.') {
                    let f = number
                        .parse::<f64>()
                        .map_err(|_| format!("bad number '{}'", number))?;
                    tokens.push(Tok::Float(f));
                } else {
                    let i = number
                        .parse::<i64>()
                        .map_err(|_| format!("bad number '{}'", number))?;
                    tokens.push(Tok::Int(i));
                }
            }
            c if c.is_ascii_alphabetic() => {
                let mut word = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        word.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                match word.to_ascii_lowercase().as_str() {
                    "true" => tokens.push(Tok::Bool(true)),
                    "false" => tokens.push(Tok::Bool(false)),
                    _ => return Err(format!("unknown word '{}'", word)),
                }
            }
            other => return Err(format!("unexpected character '{}'", other)),
        }
    }
    Ok(tokens)
}

// Numbers stay integral until a float or a division shows up.
#[derive(Debug, Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    fn to_value(self) -> Value {
        match self {
            Num::Int(i) => Value::from(i),
            Num::Float(f) => Value::from(f),
        }
    }
}

struct ExprParser {
    tokens: Vec<Tok>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Tok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn parse_expr(&mut self) -> Result<Value, String> {
        match self.peek() {
            Some(Tok::LBracket) => self.parse_list(),
            Some(Tok::Bool(_)) if self.tokens.len() == 1 => {
                if let Some(Tok::Bool(b)) = self.next() {
                    Ok(Value::from(b))
                } else {
                    unreachable!()
                }
            }
            Some(Tok::Str(_)) if self.tokens.len() == 1 => {
                if let Some(Tok::Str(s)) = self.next() {
                    Ok(Value::from(s))
                } else {
                    unreachable!()
                }
            }
            _ => self.parse_sum().map(Num::to_value),
        }
    }

    fn parse_list(&mut self) -> Result<Value, String> {
        self.next(); // '['
        let mut items = Vec::new();
        if self.peek() == Some(&Tok::RBracket) {
            self.next();
            return Ok(Value::Sequence(items));
        }
        loop {
            let item = match self.peek() {
                Some(Tok::Bool(_)) | Some(Tok::Str(_)) => match self.next() {
                    Some(Tok::Bool(b)) => Value::from(b),
                    Some(Tok::Str(s)) => Value::from(s),
                    _ => unreachable!(),
                },
                Some(Tok::LBracket) => self.parse_list()?,
                _ => self.parse_sum()?.to_value(),
            };
            items.push(item);
            match self.next() {
                Some(Tok::Comma) => continue,
                Some(Tok::RBracket) => return Ok(Value::Sequence(items)),
                _ => return Err("expected ',' or ']' in list".to_string()),
            }
        }
    }

    fn parse_sum(&mut self) -> Result<Num, String> {
        let mut left = self.parse_term()?;
        while let Some(op) = self.peek() {
            let op = match op {
                Tok::Plus => true,
                Tok::Minus => false,
                _ => break,
            };
            self.next();
            let right = self.parse_term()?;
            left = match (left, right) {
                (Num::Int(a), Num::Int(b)) => {
                    Num::Int(if op { a + b } else { a - b })
                }
                (a, b) => {
                    let (a, b) = (a.as_f64(), b.as_f64());
                    Num::Float(if op { a + b } else { a - b })
                }
            };
        }
        Ok(left)
    }

    fn parse_term(&mut self) -> Result<Num, String> {
        let mut left = self.parse_factor()?;
        while let Some(op) = self.peek() {
            let op = match op {
                Tok::Star => '*',
                Tok::Slash => '/',
                Tok::Percent => '%',
                _ => break,
            };
            self.next();
            let right = self.parse_factor()?;
            left = match op {
                '/' => {
                    let b = right.as_f64();
                    if b == 0.0 {
                        return Err("division by zero".to_string());
                    }
                    Num::Float(left.as_f64() / b)
                }
                '*' => match (left, right) {
                    (Num::Int(a), Num::Int(b)) => Num::Int(a * b),
                    (a, b) => Num::Float(a.as_f64() * b.as_f64()),
                },
                '%' => match (left, right) {
                    (Num::Int(a), Num::Int(b)) => {
                        if b == 0 {
                            return Err("modulo by zero".to_string());
                        }
                        Num::Int(a % b)
                    }
                    (a, b) => {
                        let b = b.as_f64();
                        if b == 0.0 {
                            return Err("modulo by zero".to_string());
                        }
                        Num::Float(a.as_f64() % b)
                    }
                },
                _ => unreachable!(),
            };
        }
        Ok(left)
    }

    fn parse_factor(&mut self) -> Result<Num, String> {
        match self.next() {
            Some(Tok::Int(i)) => Ok(Num::Int(i)),
            Some(Tok::Float(f)) => Ok(Num::Float(f)),
            Some(Tok::Minus) => {
                let inner = self.parse_factor()?;
                Ok(match inner {
                    Num::Int(i) => Num::Int(-i),
                    Num::Float(f) => Num::Float(-f),
                })
            }
            Some(Tok::Plus) => self.parse_factor(),
            Some(Tok::LParen) => {
                let value = self.parse_sum()?;
                match self.next() {
                    Some(Tok::RParen) => Ok(value),
                    _ => Err("missing closing parenthesis".to_string()),
                }
            }
            Some(tok) => Err(format!("unexpected token {:?}", tok)),
            None => Err("unexpected end of expression".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_i64(input: &str) -> i64 {
        eval(input).unwrap().as_i64().unwrap()
    }

    fn eval_f64(input: &str) -> f64 {
        eval(input).unwrap().as_f64().unwrap()
    }

    #[test]
    fn test_integer_arithmetic() {
        assert_eq!(eval_i64("3 + 4"), 7);
        assert_eq!(eval_i64("3 * 4"), 12);
        assert_eq!(eval_i64("1-2"), -1);
        assert_eq!(eval_i64("10 % 3"), 1);
        assert_eq!(eval_i64("2 + 3 * 4"), 14);
        assert_eq!(eval_i64("(2 + 3) * 4"), 20);
    }

    #[test]
    fn test_division_is_real() {
        assert_eq!(eval_f64("8. / 2"), 4.0);
        assert_eq!(eval_f64("7 / 2"), 3.5);
    }

    #[test]
    fn test_unary_minus() {
        assert_eq!(eval_i64("-3 + 1"), -2);
        assert_eq!(eval_i64("2 * -3"), -6);
    }

    #[test]
    fn test_literals() {
        assert_eq!(eval("true").unwrap(), Value::from(true));
        assert_eq!(eval_i64("10"), 10);
        let list = eval("[1, 2, 3]").unwrap();
        assert_eq!(list.as_sequence().unwrap().len(), 3);
        let mixed = eval("['10m', '5m']").unwrap();
        assert_eq!(mixed.as_sequence().unwrap()[0], Value::from("10m"));
    }

    #[test]
    fn test_rejects_anything_else() {
        assert!(eval("__import__('os')").is_err());
        assert!(eval("'3 + 4").is_err());
        assert!(eval("3 +").is_err());
        assert!(eval("3 4").is_err());
        assert!(eval("1 / 0").is_err());
    }
}
