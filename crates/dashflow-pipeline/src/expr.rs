//! Restricted expression language
//!
//! Used for script items, script merges and interaction conditions. It is
//! deliberately small: no assignment, no loops, no user functions, no I/O.
//!
//! - Literals: numbers, `'strings'`, `"strings"`, `true`, `false`, `null`,
//!   `[a, b]`, `{ key: value }`
//! - Access: `name`, `a.b`, `a[0]`, `a['k']`, `.length` on arrays and strings
//! - Operators (lowest first): `?:`, `||`, `&&`, `== !=`, `< <= > >=`, `+ -`,
//!   `* / %`, unary `! -`
//! - Calls to a fixed set of built-ins (`len`, `sum`, `avg`, `min`, `max`,
//!   `round`, `floor`, `ceil`, `abs`, `number`, `string`, `upper`, `lower`,
//!   `contains`, `startsWith`, `endsWith`, `keys`, `values`, `first`, `last`,
//!   `join`)
//!
//! A leading `return` and trailing `;` are accepted so one-line scripts
//! written as statements still evaluate.

use crate::error::ExprError;
use serde_json::{Map, Number, Value};

/// Variables visible to an expression
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    vars: Map<String, Value>,
}

impl Scope {
    /// Empty scope
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With one variable bound
    #[inline]
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.vars.insert(name.into(), value);
        self
    }

    /// Bind a variable
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Bind every key of a JSON object
    pub fn extend_from_object(&mut self, value: &Value) {
        if let Value::Object(map) = value {
            for (key, inner) in map {
                self.vars.insert(key.clone(), inner.clone());
            }
        }
    }

    /// Look up a variable
    #[inline]
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UnaryOp {
    Not,
    Neg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

impl BinaryOp {
    fn symbol(self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Self::Or => 1,
            Self::And => 2,
            Self::Eq | Self::Ne => 3,
            Self::Lt | Self::Le | Self::Gt | Self::Ge => 4,
            Self::Add | Self::Sub => 5,
            Self::Mul | Self::Div | Self::Rem => 6,
        }
    }

    fn from_punct(punct: &str) -> Option<Self> {
        Some(match punct {
            "||" => Self::Or,
            "&&" => Self::And,
            "==" => Self::Eq,
            "!=" => Self::Ne,
            "<" => Self::Lt,
            "<=" => Self::Le,
            ">" => Self::Gt,
            ">=" => Self::Ge,
            "+" => Self::Add,
            "-" => Self::Sub,
            "*" => Self::Mul,
            "/" => Self::Div,
            "%" => Self::Rem,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Ident(String),
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Unary(UnaryOp, Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Conditional(Box<Expr>, Box<Expr>, Box<Expr>),
    Array(Vec<Expr>),
    Object(Vec<(String, Expr)>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Str(String),
    Ident(String),
    Punct(&'static str),
}

const PUNCTS: [&str; 27] = [
    "===", "!==", "==", "!=", "<=", ">=", "&&", "||", "+", "-", "*", "/", "%", "<", ">", "!", "(",
    ")", "[", "]", "{", "}", ",", ".", ":", "?", ";",
];

fn tokenize(src: &str) -> Result<Vec<(Token, usize)>, ExprError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;

        if c.is_ascii_digit() || (c == '.' && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                i += 1;
            }
            if i < chars.len() && (chars[i] == 'e' || chars[i] == 'E') {
                i += 1;
                if i < chars.len() && (chars[i] == '+' || chars[i] == '-') {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let number = text.parse::<f64>().map_err(|_| ExprError::Parse {
                position: start,
                message: format!("invalid number '{text}'"),
            })?;
            tokens.push((Token::Num(number), start));
            continue;
        }

        if c == '\'' || c == '"' {
            let mut text = String::new();
            i += 1;
            loop {
                let Some(&ch) = chars.get(i) else {
                    return Err(ExprError::Parse {
                        position: start,
                        message: "unterminated string".into(),
                    });
                };
                i += 1;
                if ch == c {
                    break;
                }
                if ch == '\\' {
                    let escaped = chars.get(i).copied().ok_or(ExprError::UnexpectedEnd)?;
                    i += 1;
                    text.push(match escaped {
                        'n' => '\n',
                        't' => '\t',
                        'r' => '\r',
                        other => other,
                    });
                } else {
                    text.push(ch);
                }
            }
            tokens.push((Token::Str(text), start));
            continue;
        }

        if c.is_alphabetic() || c == '_' || c == '$' {
            while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_' || chars[i] == '$') {
                i += 1;
            }
            tokens.push((Token::Ident(chars[start..i].iter().collect()), start));
            continue;
        }

        let rest: String = chars[i..chars.len().min(i + 3)].iter().collect();
        let Some(punct) = PUNCTS.iter().find(|p| rest.starts_with(**p)) else {
            return Err(ExprError::Parse {
                position: start,
                message: format!("unexpected character '{c}'"),
            });
        };
        let normalized = match *punct {
            "===" => "==",
            "!==" => "!=",
            other => other,
        };
        i += punct.chars().count();
        tokens.push((Token::Punct(normalized), start));
    }

    Ok(tokens)
}

/// Deepest syntax tree the parser builds; evaluation recurses as deep
const MAX_DEPTH: usize = 128;

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn descend(&mut self) -> Result<(), ExprError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(ExprError::Parse {
                position: self.position(),
                message: format!("expression nested deeper than {MAX_DEPTH}"),
            });
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map_or(usize::MAX, |(_, p)| *p)
    }

    fn advance(&mut self) -> Result<Token, ExprError> {
        let token = self
            .tokens
            .get(self.pos)
            .map(|(t, _)| t.clone())
            .ok_or(ExprError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn eat(&mut self, punct: &str) -> bool {
        if matches!(self.peek(), Some(Token::Punct(p)) if *p == punct) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, punct: &str) -> Result<(), ExprError> {
        if self.eat(punct) {
            return Ok(());
        }
        if self.peek().is_none() {
            return Err(ExprError::UnexpectedEnd);
        }
        Err(ExprError::Parse {
            position: self.position(),
            message: format!("expected '{punct}'"),
        })
    }

    fn expression(&mut self) -> Result<Expr, ExprError> {
        self.descend()?;
        let expr = self.conditional()?;
        self.depth -= 1;
        Ok(expr)
    }

    fn conditional(&mut self) -> Result<Expr, ExprError> {
        let condition = self.binary(0)?;
        if self.eat("?") {
            let then = self.expression()?;
            self.expect(":")?;
            let otherwise = self.expression()?;
            return Ok(Expr::Conditional(
                Box::new(condition),
                Box::new(then),
                Box::new(otherwise),
            ));
        }
        Ok(condition)
    }

    fn binary(&mut self, min_precedence: u8) -> Result<Expr, ExprError> {
        let mut left = self.unary()?;
        let depth = self.depth;
        loop {
            let Some(Token::Punct(punct)) = self.peek() else {
                break;
            };
            let Some(op) = BinaryOp::from_punct(punct) else {
                break;
            };
            if op.precedence() <= min_precedence {
                break;
            }
            self.pos += 1;
            self.descend()?;
            let right = self.binary(op.precedence())?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        self.depth = depth;
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, ExprError> {
        let op = if self.eat("!") {
            UnaryOp::Not
        } else if self.eat("-") {
            UnaryOp::Neg
        } else {
            return self.postfix();
        };
        self.descend()?;
        let operand = self.unary()?;
        self.depth -= 1;
        Ok(Expr::Unary(op, Box::new(operand)))
    }

    fn postfix(&mut self) -> Result<Expr, ExprError> {
        let mut expr = self.primary()?;
        let depth = self.depth;
        loop {
            if matches!(self.peek(), Some(Token::Punct("." | "["))) {
                self.descend()?;
            }
            if self.eat(".") {
                let position = self.position();
                match self.advance()? {
                    Token::Ident(name) => expr = Expr::Member(Box::new(expr), name),
                    _ => {
                        return Err(ExprError::Parse {
                            position,
                            message: "expected property name".into(),
                        })
                    }
                }
            } else if self.eat("[") {
                let index = self.expression()?;
                self.expect("]")?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                self.depth = depth;
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, ExprError> {
        let position = self.position();
        match self.advance()? {
            Token::Num(n) => Ok(Expr::Literal(number(n)?)),
            Token::Str(s) => Ok(Expr::Literal(Value::String(s))),
            Token::Ident(name) => match name.as_str() {
                "true" => Ok(Expr::Literal(Value::Bool(true))),
                "false" => Ok(Expr::Literal(Value::Bool(false))),
                "null" | "undefined" => Ok(Expr::Literal(Value::Null)),
                _ if self.eat("(") => {
                    let args = self.list(")")?;
                    Ok(Expr::Call(name, args))
                }
                _ => Ok(Expr::Ident(name)),
            },
            Token::Punct("(") => {
                let inner = self.expression()?;
                self.expect(")")?;
                Ok(inner)
            }
            Token::Punct("[") => Ok(Expr::Array(self.list("]")?)),
            Token::Punct("{") => self.object(),
            Token::Punct(p) => Err(ExprError::Parse {
                position,
                message: format!("unexpected '{p}'"),
            }),
        }
    }

    fn list(&mut self, close: &str) -> Result<Vec<Expr>, ExprError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.expression()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(",")?;
        }
    }

    fn object(&mut self) -> Result<Expr, ExprError> {
        let mut entries = Vec::new();
        if self.eat("}") {
            return Ok(Expr::Object(entries));
        }
        loop {
            let position = self.position();
            let key = match self.advance()? {
                Token::Ident(key) | Token::Str(key) => key,
                _ => {
                    return Err(ExprError::Parse {
                        position,
                        message: "expected object key".into(),
                    })
                }
            };
            self.expect(":")?;
            entries.push((key, self.expression()?));
            if self.eat("}") {
                return Ok(Expr::Object(entries));
            }
            self.expect(",")?;
        }
    }
}

/// A parsed expression, reusable across evaluations
#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    source: String,
    ast: Expr,
}

impl Expression {
    /// Parse expression source
    ///
    /// # Errors
    /// Returns [`ExprError`] on syntax errors
    pub fn parse(source: &str) -> Result<Self, ExprError> {
        let mut tokens = tokenize(source)?;
        if matches!(tokens.first(), Some((Token::Ident(word), _)) if word == "return") {
            tokens.remove(0);
        }
        while matches!(tokens.last(), Some((Token::Punct(";"), _))) {
            tokens.pop();
        }
        if tokens.is_empty() {
            return Err(ExprError::UnexpectedEnd);
        }

        let mut parser = Parser {
            tokens,
            pos: 0,
            depth: 0,
        };
        let ast = parser.expression()?;
        if parser.pos < parser.tokens.len() {
            return Err(ExprError::Parse {
                position: parser.position(),
                message: "unexpected trailing input".into(),
            });
        }
        Ok(Self {
            source: source.to_string(),
            ast,
        })
    }

    /// Original source text
    #[inline]
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against a scope
    ///
    /// # Errors
    /// Returns [`ExprError`] on type errors, unknown functions or arithmetic faults
    pub fn evaluate(&self, scope: &Scope) -> Result<Value, ExprError> {
        eval(&self.ast, scope)
    }
}

/// Parse and evaluate in one step
///
/// # Errors
/// Returns [`ExprError`] if parsing or evaluation fails
pub fn evaluate(source: &str, scope: &Scope) -> Result<Value, ExprError> {
    Expression::parse(source)?.evaluate(scope)
}

/// JavaScript-style truthiness
#[must_use]
pub fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Equality that treats `1` and `1.0` as equal
#[must_use]
pub fn loose_equals(a: &Value, b: &Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
        _ => a == b,
    }
}

/// Convert an `f64` into a JSON number, keeping integral values integral
///
/// # Errors
/// Returns [`ExprError::NonFinite`] for NaN and infinities
#[allow(clippy::cast_possible_truncation)]
pub fn number(n: f64) -> Result<Value, ExprError> {
    if n.fract() == 0.0 && n.abs() < 9.007_199_254_740_992e15 {
        return Ok(Value::Number(Number::from(n as i64)));
    }
    Number::from_f64(n).map(Value::Number).ok_or(ExprError::NonFinite)
}

/// Render a value the way string concatenation does
#[must_use]
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn mismatch(op: &str, detail: String) -> ExprError {
    ExprError::TypeMismatch {
        op: op.to_string(),
        detail,
    }
}

fn eval(expr: &Expr, scope: &Scope) -> Result<Value, ExprError> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Ident(name) => Ok(scope.get(name).cloned().unwrap_or(Value::Null)),
        Expr::Member(target, name) => Ok(member(&eval(target, scope)?, name)),
        Expr::Index(target, index) => {
            let target = eval(target, scope)?;
            let index = eval(index, scope)?;
            Ok(match (&target, &index) {
                (Value::Array(items), Value::Number(n)) => n
                    .as_u64()
                    .and_then(|i| items.get(usize::try_from(i).ok()?))
                    .cloned()
                    .unwrap_or(Value::Null),
                (_, Value::String(key)) => member(&target, key),
                _ => Value::Null,
            })
        }
        Expr::Unary(UnaryOp::Not, inner) => Ok(Value::Bool(!truthy(&eval(inner, scope)?))),
        Expr::Unary(UnaryOp::Neg, inner) => {
            let value = eval(inner, scope)?;
            let n = value
                .as_f64()
                .ok_or_else(|| mismatch("-", format!("cannot negate {}", type_name(&value))))?;
            number(-n)
        }
        Expr::Binary(BinaryOp::And, left, right) => {
            Ok(Value::Bool(truthy(&eval(left, scope)?) && truthy(&eval(right, scope)?)))
        }
        Expr::Binary(BinaryOp::Or, left, right) => {
            Ok(Value::Bool(truthy(&eval(left, scope)?) || truthy(&eval(right, scope)?)))
        }
        Expr::Binary(op, left, right) => binary(*op, &eval(left, scope)?, &eval(right, scope)?),
        Expr::Conditional(condition, then, otherwise) => {
            if truthy(&eval(condition, scope)?) {
                eval(then, scope)
            } else {
                eval(otherwise, scope)
            }
        }
        Expr::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|item| eval(item, scope))
                .collect::<Result<_, _>>()?,
        )),
        Expr::Object(entries) => {
            let mut map = Map::with_capacity(entries.len());
            for (key, value) in entries {
                map.insert(key.clone(), eval(value, scope)?);
            }
            Ok(Value::Object(map))
        }
        Expr::Call(name, args) => {
            let args = args
                .iter()
                .map(|arg| eval(arg, scope))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, &args)
        }
    }
}

fn member(target: &Value, name: &str) -> Value {
    match target {
        Value::Object(map) => map.get(name).cloned().unwrap_or(Value::Null),
        Value::Array(items) if name == "length" => Value::from(items.len()),
        Value::String(s) if name == "length" => Value::from(s.chars().count()),
        Value::Array(items) => name
            .parse::<usize>()
            .ok()
            .and_then(|i| items.get(i))
            .cloned()
            .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value, ExprError> {
    match op {
        BinaryOp::Eq => return Ok(Value::Bool(loose_equals(left, right))),
        BinaryOp::Ne => return Ok(Value::Bool(!loose_equals(left, right))),
        BinaryOp::Add if left.is_string() || right.is_string() => {
            return Ok(Value::String(format!("{}{}", display(left), display(right))));
        }
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let ordering = match (left, right) {
                (Value::String(a), Value::String(b)) => a.partial_cmp(b),
                _ => match (left.as_f64(), right.as_f64()) {
                    (Some(a), Some(b)) => a.partial_cmp(&b),
                    _ => {
                        return Err(mismatch(
                            op.symbol(),
                            format!("cannot compare {} with {}", type_name(left), type_name(right)),
                        ))
                    }
                },
            };
            let Some(ordering) = ordering else {
                return Ok(Value::Bool(false));
            };
            return Ok(Value::Bool(match op {
                BinaryOp::Lt => ordering.is_lt(),
                BinaryOp::Le => ordering.is_le(),
                BinaryOp::Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }));
        }
        _ => {}
    }

    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(mismatch(
            op.symbol(),
            format!("expected numbers, got {} and {}", type_name(left), type_name(right)),
        ));
    };
    match op {
        BinaryOp::Add => number(a + b),
        BinaryOp::Sub => number(a - b),
        BinaryOp::Mul => number(a * b),
        BinaryOp::Div if b == 0.0 => Err(ExprError::DivisionByZero),
        BinaryOp::Div => number(a / b),
        BinaryOp::Rem if b == 0.0 => Err(ExprError::DivisionByZero),
        BinaryOp::Rem => number(a % b),
        _ => Err(mismatch(op.symbol(), "unsupported operator".into())),
    }
}

fn arity(name: &str, args: &[Value], expected: usize) -> Result<(), ExprError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ExprError::Arity {
            name: name.to_string(),
            expected,
            actual: args.len(),
        })
    }
}

fn numbers(name: &str, args: &[Value]) -> Result<Vec<f64>, ExprError> {
    let values: Vec<&Value> = match args {
        [Value::Array(items)] => items.iter().collect(),
        other => other.iter().collect(),
    };
    values
        .into_iter()
        .map(|v| {
            v.as_f64()
                .ok_or_else(|| mismatch(name, format!("expected number, got {}", type_name(v))))
        })
        .collect()
}

fn unary_number(name: &str, args: &[Value]) -> Result<f64, ExprError> {
    let n = args.first().and_then(Value::as_f64);
    n.ok_or_else(|| {
        let found = args.first().map_or("nothing", type_name);
        mismatch(name, format!("expected number, got {found}"))
    })
}

fn string_arg<'a>(name: &str, args: &'a [Value], index: usize) -> Result<&'a str, ExprError> {
    args.get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| mismatch(name, format!("argument {} must be a string", index + 1)))
}

fn call(name: &str, args: &[Value]) -> Result<Value, ExprError> {
    match name {
        "len" => {
            arity(name, args, 1)?;
            Ok(match &args[0] {
                Value::Array(items) => Value::from(items.len()),
                Value::Object(map) => Value::from(map.len()),
                Value::String(s) => Value::from(s.chars().count()),
                _ => Value::from(0),
            })
        }
        "sum" => number(numbers(name, args)?.iter().sum()),
        "avg" => {
            let values = numbers(name, args)?;
            if values.is_empty() {
                return Ok(Value::Null);
            }
            #[allow(clippy::cast_precision_loss)]
            let count = values.len() as f64;
            number(values.iter().sum::<f64>() / count)
        }
        "min" | "max" => {
            let values = numbers(name, args)?;
            let folded = values.into_iter().reduce(|a, b| {
                if name == "min" {
                    a.min(b)
                } else {
                    a.max(b)
                }
            });
            folded.map_or(Ok(Value::Null), number)
        }
        "round" => {
            let n = unary_number(name, args)?;
            let digits = args.get(1).and_then(Value::as_i64).unwrap_or(0);
            let factor = 10f64.powi(i32::try_from(digits).unwrap_or(0));
            number((n * factor).round() / factor)
        }
        "floor" => number(unary_number(name, args)?.floor()),
        "ceil" => number(unary_number(name, args)?.ceil()),
        "abs" => number(unary_number(name, args)?.abs()),
        "number" => {
            arity(name, args, 1)?;
            match &args[0] {
                Value::Number(_) => Ok(args[0].clone()),
                Value::String(s) => s
                    .trim()
                    .parse::<f64>()
                    .map_err(|_| mismatch(name, format!("'{s}' is not numeric")))
                    .and_then(number),
                Value::Bool(b) => Ok(Value::from(u8::from(*b))),
                other => Err(mismatch(name, format!("cannot convert {}", type_name(other)))),
            }
        }
        "string" => {
            arity(name, args, 1)?;
            Ok(Value::String(display(&args[0])))
        }
        "upper" => Ok(Value::String(string_arg(name, args, 0)?.to_uppercase())),
        "lower" => Ok(Value::String(string_arg(name, args, 0)?.to_lowercase())),
        "contains" => {
            arity(name, args, 2)?;
            Ok(Value::Bool(match &args[0] {
                Value::Array(items) => items.iter().any(|item| loose_equals(item, &args[1])),
                Value::Object(map) => args[1].as_str().is_some_and(|k| map.contains_key(k)),
                Value::String(s) => s.contains(&display(&args[1])),
                _ => false,
            }))
        }
        "startsWith" => {
            arity(name, args, 2)?;
            Ok(Value::Bool(
                string_arg(name, args, 0)?.starts_with(string_arg(name, args, 1)?),
            ))
        }
        "endsWith" => {
            arity(name, args, 2)?;
            Ok(Value::Bool(
                string_arg(name, args, 0)?.ends_with(string_arg(name, args, 1)?),
            ))
        }
        "keys" => match args.first() {
            Some(Value::Object(map)) => Ok(Value::Array(
                map.keys().cloned().map(Value::String).collect(),
            )),
            _ => Ok(Value::Array(Vec::new())),
        },
        "values" => match args.first() {
            Some(Value::Object(map)) => Ok(Value::Array(map.values().cloned().collect())),
            Some(Value::Array(items)) => Ok(Value::Array(items.clone())),
            _ => Ok(Value::Array(Vec::new())),
        },
        "first" => Ok(match args.first() {
            Some(Value::Array(items)) => items.first().cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }),
        "last" => Ok(match args.first() {
            Some(Value::Array(items)) => items.last().cloned().unwrap_or(Value::Null),
            _ => Value::Null,
        }),
        "join" => {
            let separator = args.get(1).and_then(Value::as_str).unwrap_or(",");
            match args.first() {
                Some(Value::Array(items)) => Ok(Value::String(
                    items.iter().map(display).collect::<Vec<_>>().join(separator),
                )),
                _ => Err(mismatch(name, "argument 1 must be an array".into())),
            }
        }
        other => Err(ExprError::UnknownFunction(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn eval_with(src: &str, scope: &Scope) -> Value {
        evaluate(src, scope).unwrap()
    }

    #[test]
    fn arithmetic_and_precedence() {
        let scope = Scope::new();
        assert_eq!(eval_with("1 + 2 * 3", &scope), json!(7));
        assert_eq!(eval_with("(1 + 2) * 3", &scope), json!(9));
        assert_eq!(eval_with("7 % 4 - -1", &scope), json!(4));
        assert_eq!(eval_with("1 / 4", &scope), json!(0.25));
        assert_eq!(evaluate("1 / 0", &scope), Err(ExprError::DivisionByZero));
    }

    #[test]
    fn comparisons_and_logic() {
        let scope = Scope::new().with("value", json!(42));
        assert_eq!(eval_with("value > 40 && value <= 42", &scope), json!(true));
        assert_eq!(eval_with("value == 42.0", &scope), json!(true));
        assert_eq!(eval_with("value === 41 || !true", &scope), json!(false));
        assert_eq!(eval_with("'abc' < 'abd'", &scope), json!(true));
        assert_eq!(eval_with("value > 10 ? 'hot' : 'cold'", &scope), json!("hot"));
    }

    #[test]
    fn member_and_index_access() {
        let scope = Scope::new().with("data", json!({"rows": [{"v": 3}, {"v": 4}], "name": "x"}));
        assert_eq!(eval_with("data.rows[1].v", &scope), json!(4));
        assert_eq!(eval_with("data['name']", &scope), json!("x"));
        assert_eq!(eval_with("data.rows.length", &scope), json!(2));
        assert_eq!(eval_with("data.missing.deeper", &scope), Value::Null);
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let scope = Scope::new().with("value", json!(1));
        let parens = format!("{}value{}", "(".repeat(5000), ")".repeat(5000));
        assert!(matches!(evaluate(&parens, &scope), Err(ExprError::Parse { .. })));
        let negations = format!("{}value", "!".repeat(5000));
        assert!(matches!(evaluate(&negations, &scope), Err(ExprError::Parse { .. })));
        let chain = vec!["value"; 5000].join(" + ");
        assert!(matches!(evaluate(&chain, &scope), Err(ExprError::Parse { .. })));
        let members = format!("value{}", ".a".repeat(5000));
        assert!(matches!(evaluate(&members, &scope), Err(ExprError::Parse { .. })));

        let nested = format!("{}value{}", "(".repeat(20), ")".repeat(20));
        assert_eq!(eval_with(&nested, &scope), json!(1));
        assert_eq!(eval_with("!!value", &scope), json!(true));
    }

    #[test]
    fn literals_and_builtins() {
        let scope = Scope::new().with("items", json!([1, 2, 3, 4]));
        assert_eq!(eval_with("{ total: sum(items), n: len(items) }", &scope), json!({"total": 10, "n": 4}));
        assert_eq!(eval_with("avg(items)", &scope), json!(2.5));
        assert_eq!(eval_with("max(1, 9, 3)", &scope), json!(9));
        assert_eq!(eval_with("round(3.14159, 2)", &scope), json!(3.14));
        assert_eq!(eval_with("join([1, 'a'], '-')", &scope), json!("1-a"));
        assert_eq!(eval_with("contains(items, 3)", &scope), json!(true));
        assert_eq!(eval_with("upper('ok') + 1", &scope), json!("OK1"));
    }

    #[test]
    fn statement_form_is_accepted() {
        let scope = Scope::new().with("data", json!({"value": 21}));
        assert_eq!(eval_with("return data.value * 2;", &scope), json!(42));
    }

    #[test]
    fn errors_are_reported() {
        let scope = Scope::new();
        assert!(matches!(evaluate("1 +", &scope), Err(ExprError::UnexpectedEnd)));
        assert!(matches!(evaluate("1 2", &scope), Err(ExprError::Parse { .. })));
        assert!(matches!(
            evaluate("launch()", &scope),
            Err(ExprError::UnknownFunction(name)) if name == "launch"
        ));
        assert!(matches!(
            evaluate("'a' * 2", &scope),
            Err(ExprError::TypeMismatch { .. })
        ));
        assert!(matches!(evaluate("'open", &scope), Err(ExprError::Parse { .. })));
    }

    #[test]
    fn truthiness() {
        assert!(!truthy(&Value::Null));
        assert!(!truthy(&json!(0)));
        assert!(!truthy(&json!("")));
        assert!(truthy(&json!([])));
        assert!(truthy(&json!("x")));
    }
}
