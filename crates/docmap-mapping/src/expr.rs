//! Constrained expression evaluator
//!
//! Replaces free-form script execution for `Script` transformations and
//! `Custom` conditions. The grammar is deliberately small: literals, the
//! `value` binding, arithmetic, string concatenation, comparisons,
//! boolean operators and a handful of builtin calls
//! (`upper`, `lower`, `trim`, `len`, `number`). There is no assignment,
//! no loops, and no access to anything outside `value`.
//!
//! ```
//! use docmap_mapping::expr;
//! use docmap_tree::Value;
//!
//! let v = expr::eval("upper(trim(value)) + '!'", &Value::string("  ok  ")).unwrap();
//! assert_eq!(v, Value::string("OK!"));
//! ```

use docmap_tree::Value;

use crate::{Error, Result};

/// Evaluate an expression against a bound `value`.
///
/// # Errors
///
/// Returns [`Error::Expression`] on a parse failure, an unknown
/// identifier, or a type-invalid operation.
pub fn eval(source: &str, value: &Value) -> Result<Value> {
    let tokens = tokenize(source)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    parser.expect_end()?;
    eval_node(&expr, value)
}

/// Evaluate an expression and coerce the result to a boolean.
///
/// Truthiness follows the value model: null, `false`, `""`, `0` and
/// empty containers are false, everything else is true.
///
/// # Errors
///
/// Same failure modes as [`eval`].
pub fn eval_bool(source: &str, value: &Value) -> Result<bool> {
    Ok(truthy(&eval(source, value)?))
}

/// Truthiness of a value.
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => *n != 0.0,
        Value::String(s) => !s.is_empty(),
        Value::List(items) => !items.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Text(String),
    Ident(String),
    Op(&'static str),
    LParen,
    RParen,
    Comma,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                i += 1;
                loop {
                    match chars.get(i) {
                        Some(&ch) if ch == quote => break,
                        Some(&ch) => {
                            text.push(ch);
                            i += 1;
                        }
                        None => {
                            return Err(Error::Expression("unterminated string literal".to_string()));
                        }
                    }
                }
                i += 1;
                tokens.push(Token::Text(text));
            }
            '0'..='9' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().collect();
                let number = literal
                    .parse::<f64>()
                    .map_err(|_| Error::Expression(format!("invalid number '{literal}'")))?;
                tokens.push(Token::Number(number));
            }
            '+' | '-' | '*' | '/' => {
                tokens.push(Token::Op(match c {
                    '+' => "+",
                    '-' => "-",
                    '*' => "*",
                    _ => "/",
                }));
                i += 1;
            }
            '=' | '!' | '<' | '>' | '&' | '|' => {
                let two: String = chars[i..(i + 2).min(chars.len())].iter().collect();
                let op = match two.as_str() {
                    "==" => Some("=="),
                    "!=" => Some("!="),
                    "<=" => Some("<="),
                    ">=" => Some(">="),
                    "&&" => Some("&&"),
                    "||" => Some("||"),
                    _ => None,
                };
                if let Some(op) = op {
                    tokens.push(Token::Op(op));
                    i += 2;
                } else {
                    let op = match c {
                        '<' => "<",
                        '>' => ">",
                        '!' => "!",
                        _ => {
                            return Err(Error::Expression(format!("unexpected character '{c}'")));
                        }
                    };
                    tokens.push(Token::Op(op));
                    i += 1;
                }
            }
            _ if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                tokens.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => {
                return Err(Error::Expression(format!("unexpected character '{other}'")));
            }
        }
    }
    Ok(tokens)
}

#[derive(Debug)]
enum Expr {
    Literal(Value),
    ValueRef,
    Unary(&'static str, Box<Expr>),
    Binary(&'static str, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn take_op(&mut self, ops: &[&'static str]) -> Option<&'static str> {
        if let Some(Token::Op(op)) = self.peek() {
            if let Some(&matched) = ops.iter().find(|&&candidate| candidate == *op) {
                self.pos += 1;
                return Some(matched);
            }
        }
        None
    }

    fn expect_end(&self) -> Result<()> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(Error::Expression("trailing input after expression".to_string()))
        }
    }

    fn parse_expr(&mut self) -> Result<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Result<Expr> {
        let mut left = self.parse_and()?;
        while self.take_op(&["||"]).is_some() {
            let right = self.parse_and()?;
            left = Expr::Binary("||", Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr> {
        let mut left = self.parse_comparison()?;
        while self.take_op(&["&&"]).is_some() {
            let right = self.parse_comparison()?;
            left = Expr::Binary("&&", Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr> {
        let left = self.parse_additive()?;
        if let Some(op) = self.take_op(&["==", "!=", "<=", ">=", "<", ">"]) {
            let right = self.parse_additive()?;
            return Ok(Expr::Binary(op, Box::new(left), Box::new(right)));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr> {
        let mut left = self.parse_multiplicative()?;
        while let Some(op) = self.take_op(&["+", "-"]) {
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr> {
        let mut left = self.parse_unary()?;
        while let Some(op) = self.take_op(&["*", "/"]) {
            let right = self.parse_unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr> {
        if let Some(op) = self.take_op(&["-", "!"]) {
            let inner = self.parse_unary()?;
            return Ok(Expr::Unary(op, Box::new(inner)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| Error::Expression("unexpected end of expression".to_string()))?;
        match token {
            Token::Number(n) => {
                self.pos += 1;
                Ok(Expr::Literal(Value::Number(n)))
            }
            Token::Text(s) => {
                self.pos += 1;
                Ok(Expr::Literal(Value::String(s)))
            }
            Token::LParen => {
                self.pos += 1;
                let inner = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Token::Ident(name) => {
                self.pos += 1;
                match name.as_str() {
                    "value" => Ok(Expr::ValueRef),
                    "true" => Ok(Expr::Literal(Value::Bool(true))),
                    "false" => Ok(Expr::Literal(Value::Bool(false))),
                    "null" => Ok(Expr::Literal(Value::Null)),
                    _ => {
                        if self.peek() == Some(&Token::LParen) {
                            self.pos += 1;
                            let mut args = Vec::new();
                            if self.peek() != Some(&Token::RParen) {
                                loop {
                                    args.push(self.parse_expr()?);
                                    if self.peek() == Some(&Token::Comma) {
                                        self.pos += 1;
                                    } else {
                                        break;
                                    }
                                }
                            }
                            self.expect(&Token::RParen)?;
                            Ok(Expr::Call(name, args))
                        } else {
                            Err(Error::Expression(format!("unknown identifier '{name}'")))
                        }
                    }
                }
            }
            other => Err(Error::Expression(format!("unexpected token {other:?}"))),
        }
    }

    fn expect(&mut self, token: &Token) -> Result<()> {
        if self.peek() == Some(token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(Error::Expression(format!("expected {token:?}")))
        }
    }
}

fn eval_node(expr: &Expr, value: &Value) -> Result<Value> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),
        Expr::ValueRef => Ok(value.clone()),
        Expr::Unary(op, inner) => {
            let v = eval_node(inner, value)?;
            match *op {
                "-" => v
                    .as_f64()
                    .map(|n| Value::Number(-n))
                    .ok_or_else(|| Error::Expression("cannot negate non-number".to_string())),
                _ => Ok(Value::Bool(!truthy(&v))),
            }
        }
        Expr::Binary(op, left, right) => {
            // short-circuit the boolean operators
            match *op {
                "&&" => {
                    let l = eval_node(left, value)?;
                    if !truthy(&l) {
                        return Ok(Value::Bool(false));
                    }
                    return Ok(Value::Bool(truthy(&eval_node(right, value)?)));
                }
                "||" => {
                    let l = eval_node(left, value)?;
                    if truthy(&l) {
                        return Ok(Value::Bool(true));
                    }
                    return Ok(Value::Bool(truthy(&eval_node(right, value)?)));
                }
                _ => {}
            }
            let l = eval_node(left, value)?;
            let r = eval_node(right, value)?;
            eval_binary(op, &l, &r)
        }
        Expr::Call(name, args) => eval_call(name, args, value),
    }
}

fn eval_binary(op: &str, left: &Value, right: &Value) -> Result<Value> {
    match op {
        "+" => {
            if let (Some(l), Some(r)) = (numeric(left), numeric(right)) {
                Ok(Value::Number(l + r))
            } else {
                Ok(Value::String(format!("{}{}", text_of(left), text_of(right))))
            }
        }
        "-" | "*" | "/" => {
            let l = numeric(left)
                .ok_or_else(|| Error::Expression(format!("'{op}' needs numeric operands")))?;
            let r = numeric(right)
                .ok_or_else(|| Error::Expression(format!("'{op}' needs numeric operands")))?;
            match op {
                "-" => Ok(Value::Number(l - r)),
                "*" => Ok(Value::Number(l * r)),
                _ => {
                    if r == 0.0 {
                        Err(Error::Expression("division by zero".to_string()))
                    } else {
                        Ok(Value::Number(l / r))
                    }
                }
            }
        }
        "==" => Ok(Value::Bool(values_equal(left, right))),
        "!=" => Ok(Value::Bool(!values_equal(left, right))),
        "<" | "<=" | ">" | ">=" => {
            let ordering = if let (Some(l), Some(r)) = (numeric(left), numeric(right)) {
                l.partial_cmp(&r)
            } else {
                Some(text_of(left).cmp(&text_of(right)))
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            let holds = match op {
                "<" => ordering.is_lt(),
                "<=" => ordering.is_le(),
                ">" => ordering.is_gt(),
                _ => ordering.is_ge(),
            };
            Ok(Value::Bool(holds))
        }
        other => Err(Error::Expression(format!("unsupported operator '{other}'"))),
    }
}

fn eval_call(name: &str, args: &[Expr], value: &Value) -> Result<Value> {
    let arity = |expected: usize| {
        if args.len() == expected {
            Ok(())
        } else {
            Err(Error::Expression(format!(
                "{name}() takes {expected} argument(s), got {}",
                args.len()
            )))
        }
    };
    match name {
        "upper" => {
            arity(1)?;
            let v = eval_node(&args[0], value)?;
            Ok(Value::String(text_of(&v).to_uppercase()))
        }
        "lower" => {
            arity(1)?;
            let v = eval_node(&args[0], value)?;
            Ok(Value::String(text_of(&v).to_lowercase()))
        }
        "trim" => {
            arity(1)?;
            let v = eval_node(&args[0], value)?;
            Ok(Value::String(text_of(&v).trim().to_string()))
        }
        "len" => {
            arity(1)?;
            let v = eval_node(&args[0], value)?;
            let length = match &v {
                Value::List(items) => items.len(),
                Value::Object(fields) => fields.len(),
                other => text_of(other).chars().count(),
            };
            #[allow(clippy::cast_precision_loss)]
            Ok(Value::Number(length as f64))
        }
        "number" => {
            arity(1)?;
            let v = eval_node(&args[0], value)?;
            v.as_f64()
                .map(Value::Number)
                .ok_or_else(|| Error::Expression("number() argument is not numeric".to_string()))
        }
        other => Err(Error::Expression(format!("unknown function '{other}'"))),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => Some(*n),
        Value::Bool(_) | Value::String(_) => value.as_f64(),
        _ => None,
    }
}

fn text_of(value: &Value) -> String {
    value.as_string().unwrap_or_default()
}

fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Some(l), Some(r)) = (numeric(left), numeric(right)) {
        return (l - r).abs() < f64::EPSILON;
    }
    text_of(left) == text_of(right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_and_precedence() {
        let v = Value::Number(10.0);
        assert_eq!(eval("value * 2 + 1", &v).unwrap(), Value::Number(21.0));
        assert_eq!(eval("(value + 2) / 4", &v).unwrap(), Value::Number(3.0));
        assert_eq!(eval("-value", &v).unwrap(), Value::Number(-10.0));
    }

    #[test]
    fn test_string_concat_and_builtins() {
        let v = Value::string("  Invoice  ");
        assert_eq!(
            eval("trim(value) + '!'", &v).unwrap(),
            Value::string("Invoice!")
        );
        assert_eq!(eval("upper(trim(value))", &v).unwrap(), Value::string("INVOICE"));
        assert_eq!(eval("len(trim(value))", &v).unwrap(), Value::Number(7.0));
    }

    #[test]
    fn test_comparisons_and_boolean_logic() {
        let v = Value::Number(15.0);
        assert!(eval_bool("value > 10 && value < 20", &v).unwrap());
        assert!(eval_bool("value == 15", &v).unwrap());
        assert!(!eval_bool("value != 15 || value >= 100", &v).unwrap());
        assert!(!eval_bool("!(value > 10)", &v).unwrap());

        let s = Value::string("DE");
        assert!(eval_bool("value == 'DE'", &s).unwrap());
    }

    #[test]
    fn test_truthiness() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&Value::string("")));
        assert!(!truthy(&Value::Number(0.0)));
        assert!(truthy(&Value::string("x")));
        assert!(truthy(&Value::Bool(true)));
    }

    #[test]
    fn test_errors_are_reported_not_panicked() {
        let v = Value::Number(1.0);
        assert!(eval("value +", &v).is_err());
        assert!(eval("unknown_fn(value)", &v).is_err());
        assert!(eval("value / 0", &v).is_err());
        assert!(eval("'unterminated", &v).is_err());
        assert!(eval("value value", &v).is_err());
    }
}
