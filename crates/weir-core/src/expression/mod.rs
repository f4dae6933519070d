//! Template and expression evaluation.
//!
//! Expands `{{ expr }}` placeholders and rule programs against the execution
//! context: `parameters`, `config`, `state`, `parent`, and (inside `setState`
//! rules) `output`.

pub mod evaluator;
pub mod parser;
pub mod rules;

pub use evaluator::{resolve_template, Evaluated, Evaluator};
pub use parser::{parse, Expr};
pub use rules::run_rule;

use std::collections::HashMap;

use serde_json::Value;

/// The bindings visible to one expression evaluation.
///
/// The engine owns the underlying values; a scope borrows them for the
/// duration of one template expansion or rule run. `locals` holds names
/// bound by rule assignments and shadows everything else.
#[derive(Debug, Clone, Copy)]
pub struct EvalScope<'a> {
    pub parameters: &'a Value,
    pub config: &'a Value,
    pub state: &'a Value,
    pub parent: &'a Value,
    pub output: Option<&'a Value>,
    pub locals: Option<&'a HashMap<String, Value>>,
}

impl<'a> EvalScope<'a> {
    /// Resolve a top-level name against the scope. `None` means undefined.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(locals) = self.locals {
            if let Some(value) = locals.get(name) {
                return Some(value.clone());
            }
        }
        match name {
            "parameters" => Some(self.parameters.clone()),
            "config" => Some(self.config.clone()),
            "state" => Some(self.state.clone()),
            "parent" => Some(self.parent.clone()),
            "output" => self.output.cloned(),
            _ => None,
        }
    }

    /// Same scope with rule locals attached.
    pub fn with_locals(mut self, locals: &'a HashMap<String, Value>) -> Self {
        self.locals = Some(locals);
        self
    }
}

/// Result type for expression operations.
pub type ExpressionResult<T> = Result<T, ExpressionError>;

/// Expression evaluation error.
#[derive(Debug, thiserror::Error)]
pub enum ExpressionError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No condition matched")]
    NoConditionMatched,

    #[error("Evaluation error: {0}")]
    Evaluation(String),
}
