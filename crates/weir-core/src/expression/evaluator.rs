//! Expression and template evaluation over `serde_json::Value` trees.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::parser::{parse, BinaryOp, Expr, Literal, UnaryOp};
use super::{EvalScope, ExpressionError, ExpressionResult};

/// Result of evaluating one expression. `None` means *undefined*: the
/// expression named something the context does not contain. Undefined
/// coerces to null everywhere except string interpolation, which keeps the
/// original `{{…}}` literal.
pub type Evaluated = Option<Value>;

/// Stateless expression evaluator; contexts are passed in per call.
#[derive(Debug, Default)]
pub struct Evaluator;

impl Evaluator {
    pub fn new() -> Self {
        Self
    }

    /// Evaluate an expression AST against a scope.
    pub fn evaluate(&self, expr: &Expr, scope: &EvalScope) -> ExpressionResult<Evaluated> {
        match expr {
            Expr::Literal(lit) => Ok(Some(literal_value(lit))),
            Expr::Ident(name) => Ok(scope.lookup(name)),
            Expr::Member { object, property } => {
                let object = self.evaluate(object, scope)?;
                Ok(member(object, property))
            }
            Expr::Index { object, index } => {
                let object = self.evaluate(object, scope)?;
                let index = self.evaluate(index, scope)?;
                Ok(index_into(object, index))
            }
            Expr::Call { name, args } => self.call(name, args, scope),
            Expr::Binary { left, op, right } => self.binary(left, *op, right, scope),
            Expr::Unary { op, operand } => {
                let value = self.evaluate(operand, scope)?;
                match op {
                    UnaryOp::Not => Ok(Some(Value::Bool(!is_truthy_opt(&value)))),
                    UnaryOp::Neg => {
                        let n = value_to_number(&value.unwrap_or(Value::Null));
                        Ok(Some(number_value(-n)))
                    }
                }
            }
            Expr::Conditional {
                condition,
                then_expr,
                else_expr,
            } => {
                let cond = self.evaluate(condition, scope)?;
                if is_truthy_opt(&cond) {
                    self.evaluate(then_expr, scope)
                } else {
                    self.evaluate(else_expr, scope)
                }
            }
            Expr::Array(elements) => {
                let values: Vec<Value> = elements
                    .iter()
                    .map(|e| Ok(self.evaluate(e, scope)?.unwrap_or(Value::Null)))
                    .collect::<ExpressionResult<_>>()?;
                Ok(Some(Value::Array(values)))
            }
            Expr::Object(pairs) => {
                let mut map = Map::new();
                for (key, value) in pairs {
                    map.insert(
                        key.clone(),
                        self.evaluate(value, scope)?.unwrap_or(Value::Null),
                    );
                }
                Ok(Some(Value::Object(map)))
            }
        }
    }

    fn binary(
        &self,
        left: &Expr,
        op: BinaryOp,
        right: &Expr,
        scope: &EvalScope,
    ) -> ExpressionResult<Evaluated> {
        // Short-circuit forms operate on the uncoerced operand.
        match op {
            BinaryOp::And => {
                let left = self.evaluate(left, scope)?;
                if !is_truthy_opt(&left) {
                    return Ok(left);
                }
                return self.evaluate(right, scope);
            }
            BinaryOp::Or => {
                let left = self.evaluate(left, scope)?;
                if is_truthy_opt(&left) {
                    return Ok(left);
                }
                return self.evaluate(right, scope);
            }
            BinaryOp::NullishCoalesce => {
                let left = self.evaluate(left, scope)?;
                if let Some(value) = left {
                    if !value.is_null() {
                        return Ok(Some(value));
                    }
                }
                return self.evaluate(right, scope);
            }
            _ => {}
        }

        let left = self.evaluate(left, scope)?.unwrap_or(Value::Null);
        let right = self.evaluate(right, scope)?.unwrap_or(Value::Null);

        let value = match op {
            BinaryOp::Add => add(&left, &right),
            BinaryOp::Sub => numeric(&left, &right, |l, r| l - r, i64::checked_sub)?,
            BinaryOp::Mul => numeric(&left, &right, |l, r| l * r, i64::checked_mul)?,
            BinaryOp::Div => divide(&left, &right)?,
            BinaryOp::Mod => modulo(&left, &right)?,
            BinaryOp::Eq => Value::Bool(values_equal(&left, &right)),
            BinaryOp::Ne => Value::Bool(!values_equal(&left, &right)),
            BinaryOp::Lt => compare(&left, &right, |o| o.is_lt()),
            BinaryOp::Le => compare(&left, &right, |o| o.is_le()),
            BinaryOp::Gt => compare(&left, &right, |o| o.is_gt()),
            BinaryOp::Ge => compare(&left, &right, |o| o.is_ge()),
            BinaryOp::And | BinaryOp::Or | BinaryOp::NullishCoalesce => unreachable!(),
        };
        Ok(Some(value))
    }

    fn call(&self, name: &str, args: &[Expr], scope: &EvalScope) -> ExpressionResult<Evaluated> {
        match name {
            "getPath" => {
                if args.len() != 2 {
                    return Err(ExpressionError::InvalidArgument(
                        "getPath expects (obj, path)".to_string(),
                    ));
                }
                let object = self.evaluate(&args[0], scope)?.unwrap_or(Value::Null);
                let path = match self.evaluate(&args[1], scope)?.unwrap_or(Value::Null) {
                    Value::String(s) => s,
                    other => {
                        return Err(ExpressionError::InvalidArgument(format!(
                            "getPath path must be a string, got {}",
                            type_name(&other)
                        )))
                    }
                };
                Ok(Some(get_path(&object, &path).unwrap_or(Value::Null)))
            }
            "parse" => {
                if args.len() != 1 {
                    return Err(ExpressionError::InvalidArgument(
                        "parse expects a single template argument".to_string(),
                    ));
                }
                let template = self.evaluate(&args[0], scope)?.unwrap_or(Value::Null);
                Ok(Some(resolve_template(&template, scope)?))
            }
            "eval" => {
                if args.len() != 1 {
                    return Err(ExpressionError::InvalidArgument(
                        "eval expects a single expression string".to_string(),
                    ));
                }
                let source = match self.evaluate(&args[0], scope)?.unwrap_or(Value::Null) {
                    Value::String(s) => s,
                    other => {
                        return Err(ExpressionError::InvalidArgument(format!(
                            "eval expects a string, got {}",
                            type_name(&other)
                        )))
                    }
                };
                self.evaluate(&parse(&source)?, scope)
            }
            other => Err(ExpressionError::UnknownFunction(other.to_string())),
        }
    }
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => number_value(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}

fn member(object: Evaluated, property: &str) -> Evaluated {
    match object? {
        Value::Object(map) => map.get(property).cloned(),
        _ => None,
    }
}

fn index_into(object: Evaluated, index: Evaluated) -> Evaluated {
    match (object?, index?) {
        (Value::Array(items), Value::Number(n)) => {
            let i = n.as_i64().filter(|&i| i >= 0)? as usize;
            items.get(i).cloned()
        }
        (Value::Object(map), Value::String(key)) => map.get(&key).cloned(),
        (Value::Object(map), Value::Number(n)) => map.get(&n.to_string()).cloned(),
        (Value::String(s), Value::Number(n)) => {
            let i = n.as_i64().filter(|&i| i >= 0)? as usize;
            s.chars().nth(i).map(|c| Value::String(c.to_string()))
        }
        _ => None,
    }
}

/// Resolve a dotted/bracketed path string (`a.b[0].c`, `a["k"]`) against a
/// value. `None` when any intermediate segment is absent.
pub fn get_path(object: &Value, path: &str) -> Option<Value> {
    let mut current = object.clone();
    for segment in parse_path(path)? {
        current = match (&current, segment) {
            (Value::Object(map), PathSegment::Key(key)) => map.get(&key).cloned()?,
            (Value::Array(items), PathSegment::Index(i)) => items.get(i).cloned()?,
            _ => return None,
        };
    }
    Some(current)
}

enum PathSegment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Option<Vec<PathSegment>> {
    let mut segments = Vec::new();
    let mut chars = path.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            '.' => {
                chars.next();
            }
            '[' => {
                chars.next();
                let mut inner = String::new();
                for c in chars.by_ref() {
                    if c == ']' {
                        break;
                    }
                    inner.push(c);
                }
                let inner = inner.trim();
                if let Some(quoted) = inner
                    .strip_prefix('"')
                    .and_then(|s| s.strip_suffix('"'))
                    .or_else(|| inner.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')))
                {
                    segments.push(PathSegment::Key(quoted.to_string()));
                } else {
                    segments.push(PathSegment::Index(inner.parse().ok()?));
                }
            }
            _ => {
                let mut key = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '.' || c == '[' {
                        break;
                    }
                    key.push(c);
                    chars.next();
                }
                segments.push(PathSegment::Key(key));
            }
        }
    }
    Some(segments)
}

fn add(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::String(l), r) => Value::String(format!("{l}{}", value_to_string(r))),
        (l, Value::String(r)) => Value::String(format!("{}{r}", value_to_string(l))),
        (Value::Array(l), Value::Array(r)) => {
            let mut out = l.clone();
            out.extend(r.iter().cloned());
            Value::Array(out)
        }
        (l, r) => {
            if let (Some(a), Some(b)) = (l.as_i64(), r.as_i64()) {
                if let Some(sum) = a.checked_add(b) {
                    return Value::from(sum);
                }
            }
            number_value(value_to_number(l) + value_to_number(r))
        }
    }
}

fn numeric(
    left: &Value,
    right: &Value,
    float_op: fn(f64, f64) -> f64,
    int_op: fn(i64, i64) -> Option<i64>,
) -> ExpressionResult<Value> {
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        if let Some(result) = int_op(a, b) {
            return Ok(Value::from(result));
        }
    }
    Ok(number_value(float_op(
        value_to_number(left),
        value_to_number(right),
    )))
}

fn divide(left: &Value, right: &Value) -> ExpressionResult<Value> {
    let r = value_to_number(right);
    if r == 0.0 {
        return Err(ExpressionError::Evaluation("division by zero".to_string()));
    }
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        if a % b == 0 {
            return Ok(Value::from(a / b));
        }
    }
    Ok(number_value(value_to_number(left) / r))
}

fn modulo(left: &Value, right: &Value) -> ExpressionResult<Value> {
    let r = value_to_number(right);
    if r == 0.0 {
        return Err(ExpressionError::Evaluation("modulo by zero".to_string()));
    }
    if let (Some(a), Some(b)) = (left.as_i64(), right.as_i64()) {
        return Ok(Value::from(a % b));
    }
    Ok(number_value(value_to_number(left) % r))
}

fn compare(left: &Value, right: &Value, cmp: fn(std::cmp::Ordering) -> bool) -> Value {
    let result = match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            let l = l.as_f64().unwrap_or(0.0);
            let r = r.as_f64().unwrap_or(0.0);
            l.partial_cmp(&r).map(cmp).unwrap_or(false)
        }
        (Value::String(l), Value::String(r)) => cmp(l.cmp(r)),
        _ => false,
    };
    Value::Bool(result)
}

/// Loose equality: numbers compare by value, numbers and numeric strings
/// compare across types.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => {
            l.as_f64().unwrap_or(0.0) == r.as_f64().unwrap_or(0.0)
        }
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.parse::<f64>().ok() == n.as_f64()
        }
        (l, r) => l == r,
    }
}

/// Truthiness: null/false/0/""/[] are falsy, objects are truthy.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|n| n != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(_) => true,
    }
}

fn is_truthy_opt(value: &Evaluated) -> bool {
    value.as_ref().map(is_truthy).unwrap_or(false)
}

/// String coercion used by interpolation and `+` on strings.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => serde_json::to_string(value).unwrap_or_default(),
    }
}

fn value_to_number(value: &Value) -> f64 {
    match value {
        Value::Null => 0.0,
        Value::Bool(b) => *b as i64 as f64,
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.parse().unwrap_or(0.0),
        Value::Array(_) | Value::Object(_) => f64::NAN,
    }
}

fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n >= i64::MIN as f64 && n <= i64::MAX as f64 {
        Value::from(n as i64)
    } else {
        serde_json::Number::from_f64(n)
            .map(Value::Number)
            .unwrap_or(Value::Null)
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

fn full_expr_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)^\s*\{\{(.*)\}\}\s*$").unwrap())
}

fn interp_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)\{\{(.*?)\}\}").unwrap())
}

/// Recursively expand a template tree against a scope.
///
/// Arrays expand element-wise, mappings value-wise; a string that is exactly
/// one `{{ expr }}` returns the expression value with its native type;
/// other strings interpolate, coercing each value to a string and leaving
/// the literal in place when the expression is undefined.
pub fn resolve_template(template: &Value, scope: &EvalScope) -> ExpressionResult<Value> {
    match template {
        Value::String(s) => resolve_string(s, scope),
        Value::Array(items) => {
            let out: Vec<Value> = items
                .iter()
                .map(|item| resolve_template(item, scope))
                .collect::<ExpressionResult<_>>()?;
            Ok(Value::Array(out))
        }
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                out.insert(key.clone(), resolve_template(value, scope)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn resolve_string(s: &str, scope: &EvalScope) -> ExpressionResult<Value> {
    if !s.contains("{{") {
        return Ok(Value::String(s.to_string()));
    }

    let evaluator = Evaluator::new();

    if let Some(caps) = full_expr_re().captures(s) {
        let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        // A single-expression string has no further placeholder markers.
        if !inner.contains("{{") && !inner.contains("}}") {
            let expr = parse(inner.trim())?;
            return Ok(evaluator.evaluate(&expr, scope)?.unwrap_or(Value::Null));
        }
    }

    let mut out = String::new();
    let mut last = 0;
    for caps in interp_re().captures_iter(s) {
        let Some(whole) = caps.get(0) else { continue };
        out.push_str(&s[last..whole.start()]);
        let inner = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
        let expr = parse(inner.trim())?;
        match evaluator.evaluate(&expr, scope)? {
            Some(value) => out.push_str(&value_to_string(&value)),
            // Undefined keeps the original placeholder text.
            None => out.push_str(whole.as_str()),
        }
        last = whole.end();
    }
    out.push_str(&s[last..]);
    Ok(Value::String(out))
}
