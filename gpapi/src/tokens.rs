//! Session token discovery.
//!
//! The landing page of the photo service embeds its per-session tokens in an
//! inline script of the form `window.WIZ_global_data = { ... };`. The page is
//! untrusted, so the right-hand side is never executed: it is evaluated by a
//! small literal-only evaluator that understands objects, arrays, strings,
//! numbers and the keyword literals. Any other expression found inside the
//! literal is skipped and evaluates to `null`.

use crate::consts::{AUTH_TOKEN_KEY, USER_ID_KEY};
use crate::errors::{APIError, Result};
use derivative::Derivative;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

static SCRIPT_BODY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>(.*?)</script\s*>").expect("script pattern is valid")
});

static GLOBAL_DATA_ASSIGNMENT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\bwindow\s*\.\s*WIZ_global_data\s*=").expect("assignment pattern is valid")
});

#[derive(Derivative, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[derivative(Debug)]
pub struct SessionTokens {
    #[derivative(Debug = "ignore")]
    pub auth_token: String,
    pub user_id: String,
}

/// Extracts the anti-CSRF token and the numeric user id from a landing page.
///
/// # Errors
///
/// Returns [`APIError::TokensNotFound`] if the page has no global data
/// assignment, or if either token is missing or not a string.
pub fn extract_tokens(html: &str) -> Result<SessionTokens> {
    let data = extract_global_data(html)?;

    let token = |key: &str| {
        data.get(key)
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_owned)
            .ok_or(APIError::TokensNotFound)
    };

    Ok(SessionTokens {
        auth_token: token(AUTH_TOKEN_KEY)?,
        user_id: token(USER_ID_KEY)?,
    })
}

/// Returns the evaluated object literal assigned to `window.WIZ_global_data`.
///
/// Script bodies are joined in document order. When the page assigns the
/// global more than once, the last assignment that evaluates to an object wins.
///
/// # Errors
///
/// Returns [`APIError::TokensNotFound`] if no assignment evaluates to an object.
pub fn extract_global_data(html: &str) -> Result<Value> {
    let script = SCRIPT_BODY
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect::<Vec<_>>()
        .join(";\n");

    GLOBAL_DATA_ASSIGNMENT
        .find_iter(&script)
        .filter(|m| !script[m.end()..].starts_with('='))
        .filter_map(|m| LiteralParser::new(&script[m.end()..]).parse_value())
        .filter(Value::is_object)
        .last()
        .ok_or(APIError::TokensNotFound)
}

struct LiteralParser {
    chars: Vec<char>,
    pos: usize,
}

impl LiteralParser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_trivia();
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) {
        loop {
            match (self.peek(), self.peek_at(1)) {
                (Some(c), _) if c.is_whitespace() => self.pos += 1,
                (Some('/'), Some('/')) => {
                    while let Some(c) = self.bump() {
                        if c == '\n' {
                            break;
                        }
                    }
                }
                (Some('/'), Some('*')) => {
                    self.pos += 2;
                    while self.peek().is_some() {
                        if self.peek() == Some('*') && self.peek_at(1) == Some('/') {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    fn parse_value(&mut self) -> Option<Value> {
        self.skip_trivia();
        match self.peek()? {
            '{' => self.parse_object(),
            '[' => self.parse_array(),
            '"' | '\'' => self.parse_string().map(Value::String),
            '-' | '+' => {
                let negative = self.bump() == Some('-');
                self.skip_trivia();
                match self.parse_number()? {
                    Value::Number(n) if negative => Some(negate(&n)),
                    v => Some(v),
                }
            }
            c if c.is_ascii_digit() || c == '.' => self.parse_number(),
            c if is_identifier_start(c) => {
                let start = self.pos;
                let word = self.parse_identifier();
                match word.as_str() {
                    "true" => Some(Value::Bool(true)),
                    "false" => Some(Value::Bool(false)),
                    "null" | "undefined" => Some(Value::Null),
                    _ => {
                        self.pos = start;
                        self.skip_expression();
                        Some(Value::Null)
                    }
                }
            }
            _ => {
                self.skip_expression();
                Some(Value::Null)
            }
        }
    }

    fn parse_object(&mut self) -> Option<Value> {
        self.bump();
        let mut object = Map::new();

        loop {
            if self.eat('}') {
                return Some(Value::Object(object));
            }

            self.skip_trivia();
            let key = match self.peek()? {
                '"' | '\'' => self.parse_string()?,
                c if c.is_ascii_digit() => match self.parse_number()? {
                    Value::Number(n) => n.to_string(),
                    _ => return None,
                },
                c if is_identifier_start(c) => self.parse_identifier(),
                _ => return None,
            };

            if !self.eat(':') {
                return None;
            }
            let value = self.parse_value()?;
            object.insert(key, value);

            if self.eat(',') {
                continue;
            }
            if self.eat('}') {
                return Some(Value::Object(object));
            }
            return None;
        }
    }

    fn parse_array(&mut self) -> Option<Value> {
        self.bump();
        let mut items = Vec::new();

        loop {
            if self.eat(']') {
                return Some(Value::Array(items));
            }
            // Elisions such as `[1,,2]` leave holes.
            if self.eat(',') {
                items.push(Value::Null);
                continue;
            }

            items.push(self.parse_value()?);

            if self.eat(',') {
                continue;
            }
            if self.eat(']') {
                return Some(Value::Array(items));
            }
            return None;
        }
    }

    fn parse_identifier(&mut self) -> String {
        let mut ident = String::new();
        while let Some(c) = self.peek() {
            if is_identifier_part(c) {
                ident.push(c);
                self.pos += 1;
            } else {
                break;
            }
        }
        ident
    }

    fn parse_string(&mut self) -> Option<String> {
        let quote = self.bump()?;
        let mut out = String::new();

        loop {
            match self.bump()? {
                c if c == quote => return Some(out),
                '\n' => return None,
                '\\' => match self.bump()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    'b' => out.push('\u{8}'),
                    'f' => out.push('\u{c}'),
                    'v' => out.push('\u{b}'),
                    '0' => out.push('\0'),
                    'x' => {
                        let code = self.parse_hex(2)?;
                        out.push(char::from_u32(code)?);
                    }
                    'u' => out.push(self.parse_unicode_escape()?),
                    '\r' => {
                        if self.peek() == Some('\n') {
                            self.pos += 1;
                        }
                    }
                    '\n' | '\u{2028}' | '\u{2029}' => {}
                    other => out.push(other),
                },
                c => out.push(c),
            }
        }
    }

    fn parse_unicode_escape(&mut self) -> Option<char> {
        if self.peek() == Some('{') {
            self.pos += 1;
            let mut code = 0u32;
            loop {
                let c = self.bump()?;
                if c == '}' {
                    return char::from_u32(code);
                }
                code = code.checked_mul(16)?.checked_add(c.to_digit(16)?)?;
            }
        }

        let high = self.parse_hex(4)?;
        if (0xD800..0xDC00).contains(&high)
            && self.peek() == Some('\\')
            && self.peek_at(1) == Some('u')
        {
            let save = self.pos;
            self.pos += 2;
            if let Some(low) = self.parse_hex(4)
                && (0xDC00..0xE000).contains(&low)
            {
                return char::from_u32(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00));
            }
            self.pos = save;
        }
        Some(char::from_u32(high).unwrap_or(char::REPLACEMENT_CHARACTER))
    }

    fn parse_hex(&mut self, digits: usize) -> Option<u32> {
        let mut code = 0u32;
        for _ in 0..digits {
            code = code * 16 + self.bump()?.to_digit(16)?;
        }
        Some(code)
    }

    fn parse_number(&mut self) -> Option<Value> {
        if self.peek() == Some('0') && matches!(self.peek_at(1), Some('x' | 'X')) {
            self.pos += 2;
            let start = self.pos;
            while self.peek().is_some_and(|c| c.is_ascii_hexdigit()) {
                self.pos += 1;
            }
            let digits: String = self.chars[start..self.pos].iter().collect();
            return i64::from_str_radix(&digits, 16)
                .ok()
                .map(|n| Value::Number(n.into()));
        }

        let start = self.pos;
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    if matches!(self.peek_at(1), Some('+' | '-')) {
                        self.pos += 1;
                    }
                }
                _ => break,
            }
            self.pos += 1;
        }

        let literal: String = self.chars[start..self.pos].iter().collect();
        if !is_float && let Ok(n) = literal.parse::<i64>() {
            return Some(Value::Number(n.into()));
        }
        let n: f64 = literal.parse().ok()?;
        Some(Number::from_f64(n).map_or(Value::Null, Value::Number))
    }

    /// Consumes an unsupported expression up to the next separator at the
    /// current nesting level.
    fn skip_expression(&mut self) {
        let mut depth = 0usize;
        while let Some(c) = self.peek() {
            match c {
                '"' | '\'' | '`' => {
                    let quote = c;
                    self.pos += 1;
                    while let Some(c) = self.bump() {
                        if c == '\\' {
                            self.pos += 1;
                        } else if c == quote {
                            break;
                        }
                    }
                    continue;
                }
                '(' | '[' | '{' => depth += 1,
                ')' | ']' | '}' if depth == 0 => return,
                ')' | ']' | '}' => depth -= 1,
                ',' | ';' if depth == 0 => return,
                _ => {}
            }
            self.pos += 1;
        }
    }
}

fn negate(n: &Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::Number((-i).into())
    } else {
        n.as_f64()
            .and_then(|f| Number::from_f64(-f))
            .map_or(Value::Null, Value::Number)
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '$'
}

fn is_identifier_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}
