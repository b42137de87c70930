//! Safe parser for the list/dict literals stored in the dataset's text cells.
//!
//! Cells such as `[{'id': 16, 'name': 'Animation'}]` were written by a
//! Python tool and are not valid JSON: strings may use single quotes and
//! the constants are spelled `True`, `False` and `None`. This module reads
//! that subset into a [`serde_json::Value`] without evaluating anything.
//!
//! Supported grammar:
//! - lists `[...]` and tuples `(...)`, both mapped to arrays
//! - dicts `{key: value, ...}` with string or numeric keys
//! - single- or double-quoted strings with the usual backslash escapes
//! - integers, floats, `True`, `False`, `None`, `nan`

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message} at offset {position}")]
pub struct LiteralError {
    pub position: usize,
    pub message: String,
}

/// Parse one complete literal. Trailing non-whitespace is an error.
pub fn parse(input: &str) -> Result<Value, LiteralError> {
    let mut parser = Parser::new(input);
    parser.skip_ws();
    let value = parser.parse_value()?;
    parser.skip_ws();
    if parser.pos < parser.chars.len() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(value)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn new(input: &str) -> Self {
        Self {
            chars: input.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            position: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.pos += 1;
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), LiteralError> {
        match self.bump() {
            Some(c) if c == expected => Ok(()),
            Some(c) => {
                self.pos -= 1;
                Err(self.error(format!("expected '{}', found '{}'", expected, c)))
            }
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    fn parse_value(&mut self) -> Result<Value, LiteralError> {
        match self.peek() {
            Some('[') => self.parse_sequence('[', ']'),
            Some('(') => self.parse_sequence('(', ')'),
            Some('{') => self.parse_dict(),
            Some(q @ ('\'' | '"')) => self.parse_string(q).map(Value::String),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.parse_number(),
            Some(c) if c.is_ascii_alphabetic() => self.parse_word(),
            Some(c) => Err(self.error(format!("unexpected character '{}'", c))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_sequence(&mut self, open: char, close: char) -> Result<Value, LiteralError> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.pos += 1;
                return Ok(Value::Array(items));
            }
            items.push(self.parse_value()?);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some(c) if c == close => return Ok(Value::Array(items)),
                Some(c) => {
                    self.pos -= 1;
                    return Err(self.error(format!("expected ',' or '{}', found '{}'", close, c)));
                }
                None => return Err(self.error(format!("unterminated sequence, expected '{}'", close))),
            }
        }
    }

    fn parse_dict(&mut self) -> Result<Value, LiteralError> {
        self.expect('{')?;
        let mut map = Map::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.pos += 1;
                return Ok(Value::Object(map));
            }
            let key = match self.parse_value()? {
                Value::String(s) => s,
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return Err(self.error("dict keys must be strings or numbers")),
            };
            self.skip_ws();
            self.expect(':')?;
            self.skip_ws();
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_ws();
            match self.bump() {
                Some(',') => continue,
                Some('}') => return Ok(Value::Object(map)),
                Some(c) => {
                    self.pos -= 1;
                    return Err(self.error(format!("expected ',' or '}}', found '{}'", c)));
                }
                None => return Err(self.error("unterminated dict")),
            }
        }
    }

    fn parse_string(&mut self, quote: char) -> Result<String, LiteralError> {
        self.expect(quote)?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated string")),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => {
                    let escaped = self.bump().ok_or_else(|| self.error("dangling escape"))?;
                    match escaped {
                        'n' => out.push('\n'),
                        't' => out.push('\t'),
                        'r' => out.push('\r'),
                        '0' => out.push('\0'),
                        '\\' | '\'' | '"' => out.push(escaped),
                        'x' => out.push(self.parse_hex_escape(2)?),
                        'u' => out.push(self.parse_hex_escape(4)?),
                        'U' => out.push(self.parse_hex_escape(8)?),
                        // Unknown escapes are kept verbatim, as Python does
                        other => {
                            out.push('\\');
                            out.push(other);
                        }
                    }
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn parse_hex_escape(&mut self, digits: usize) -> Result<char, LiteralError> {
        let mut code = 0u32;
        for _ in 0..digits {
            let c = self.bump().ok_or_else(|| self.error("truncated hex escape"))?;
            let digit = c
                .to_digit(16)
                .ok_or_else(|| self.error(format!("invalid hex digit '{}'", c)))?;
            code = code * 16 + digit;
        }
        char::from_u32(code).ok_or_else(|| self.error(format!("invalid code point {:#x}", code)))
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E' | '_')) {
            self.pos += 1;
        }
        let text: String = self.chars[start..self.pos].iter().filter(|c| **c != '_').collect();
        let text = text.strip_prefix('+').unwrap_or(&text);

        if let Ok(i) = text.parse::<i64>() {
            return Ok(Value::Number(i.into()));
        }
        text.parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| LiteralError {
                position: start,
                message: format!("invalid number '{}'", text),
            })
    }

    fn parse_word(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.pos += 1;
        }
        let word: String = self.chars[start..self.pos].iter().collect();
        match word.as_str() {
            "True" | "true" => Ok(Value::Bool(true)),
            "False" | "false" => Ok(Value::Bool(false)),
            "None" | "null" | "nan" | "NaN" => Ok(Value::Null),
            _ => Err(LiteralError {
                position: start,
                message: format!("unknown identifier '{}'", word),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_single_quoted_records() {
        let value = parse("[{'id': 16, 'name': 'Animation'}, {'id': 35, 'name': 'Comedy'}]").unwrap();
        assert_eq!(
            value,
            json!([{"id": 16, "name": "Animation"}, {"id": 35, "name": "Comedy"}])
        );
    }

    #[test]
    fn test_mixed_quotes_and_embedded_apostrophes() {
        let value = parse(r#"[{'character': "Andy's Mom", 'name': 'Laurie Metcalf'}]"#).unwrap();
        assert_eq!(value[0]["character"], "Andy's Mom");

        let escaped = parse(r"['It\'s', 'tab\there']").unwrap();
        assert_eq!(escaped, json!(["It's", "tab\there"]));
    }

    #[test]
    fn test_python_constants_and_numbers() {
        let value = parse("{'a': True, 'b': False, 'c': None, 'd': -1.5, 'e': 7, 'f': (1, 2)}").unwrap();
        assert_eq!(
            value,
            json!({"a": true, "b": false, "c": null, "d": -1.5, "e": 7, "f": [1, 2]})
        );
    }

    #[test]
    fn test_unicode_content_survives() {
        let value = parse("[{'iso_639_1': 'zh', 'name': '普通话'}, {'name': 'Fran\\xe7ais'}]").unwrap();
        assert_eq!(value[0]["name"], "普通话");
        assert_eq!(value[1]["name"], "Français");
    }

    #[test]
    fn test_rejects_code_and_garbage() {
        assert!(parse("__import__('os')").is_err());
        assert!(parse("[{'name': 'x'}").is_err());
        assert!(parse("[1, 2] extra").is_err());
        assert!(parse("").is_err());
        assert!(parse("{'name' 'x'}").is_err());
    }

    #[test]
    fn test_error_reports_position() {
        let err = parse("[1, @]").unwrap_err();
        assert_eq!(err.position, 4);
    }
}
