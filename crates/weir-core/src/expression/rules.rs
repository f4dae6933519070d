//! Rule DSL interpreter.
//!
//! A rule is either a bare expression or an ordered list of steps
//! `{if?, then?, else?, return?}`. Step bodies may bind rule-local names
//! with `name = <expr>`; `return` terminates the rule. Without a `return`
//! the rule yields the value of the last executed step.
//!
//! Rules run for `setState` entries (with the node output bound as
//! `output`) and for dynamic edges (where the result selects the next
//! node).

use std::collections::HashMap;

use serde_json::Value;
use weir_workflow::{RuleSpec, RuleStep};

use super::evaluator::is_truthy;
use super::parser::parse;
use super::{Evaluated, EvalScope, Evaluator, ExpressionResult};

/// Execute a rule program against a scope.
pub fn run_rule(rule: &RuleSpec, scope: &EvalScope) -> ExpressionResult<Evaluated> {
    match rule {
        RuleSpec::Expr(src) => {
            let mut locals = HashMap::new();
            exec_body(src, scope, &mut locals)
        }
        RuleSpec::Steps(steps) => run_steps(steps, scope),
    }
}

fn run_steps(steps: &[RuleStep], scope: &EvalScope) -> ExpressionResult<Evaluated> {
    let evaluator = Evaluator::new();
    let mut locals: HashMap<String, Value> = HashMap::new();
    let mut last: Evaluated = None;

    for step in steps {
        if let Some(condition) = &step.condition {
            if !truthy(&evaluator, condition, scope, &locals)? {
                if let Some(body) = &step.otherwise {
                    last = exec_body(body, scope, &mut locals)?;
                }
                continue;
            }
        }

        if let Some(ret) = &step.ret {
            let inner = scope.with_locals(&locals);
            return evaluator.evaluate(&parse(ret)?, &inner);
        }

        if let Some(body) = &step.then {
            last = exec_body(body, scope, &mut locals)?;
        }
    }

    Ok(last)
}

fn truthy(
    evaluator: &Evaluator,
    condition: &str,
    scope: &EvalScope,
    locals: &HashMap<String, Value>,
) -> ExpressionResult<bool> {
    let inner = scope.with_locals(locals);
    let value = evaluator.evaluate(&parse(condition)?, &inner)?;
    Ok(value.as_ref().map(is_truthy).unwrap_or(false))
}

/// Execute one step body: an assignment `name = <expr>` or a bare
/// expression. Both yield the produced value.
fn exec_body(
    src: &str,
    scope: &EvalScope,
    locals: &mut HashMap<String, Value>,
) -> ExpressionResult<Evaluated> {
    let evaluator = Evaluator::new();
    if let Some((name, expr_src)) = split_assignment(src) {
        let value = {
            let inner = scope.with_locals(locals);
            evaluator
                .evaluate(&parse(expr_src)?, &inner)?
                .unwrap_or(Value::Null)
        };
        locals.insert(name.to_string(), value.clone());
        Ok(Some(value))
    } else {
        let inner = scope.with_locals(locals);
        evaluator.evaluate(&parse(src)?, &inner)
    }
}

/// Split `name = <expr>` into its parts. `==` and comparison operators do
/// not count as assignments.
fn split_assignment(src: &str) -> Option<(&str, &str)> {
    let trimmed = src.trim();
    let mut name_end = 0;
    for (i, c) in trimmed.char_indices() {
        let valid = if i == 0 {
            c.is_alphabetic() || c == '_'
        } else {
            c.is_alphanumeric() || c == '_'
        };
        if !valid {
            break;
        }
        name_end = i + c.len_utf8();
    }
    if name_end == 0 {
        return None;
    }
    let name = &trimmed[..name_end];
    let after = trimmed[name_end..].trim_start();
    let rest = after.strip_prefix('=')?;
    if rest.starts_with('=') {
        return None;
    }
    Some((name, rest.trim_start()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use weir_workflow::RuleSpec;

    fn values() -> (Value, Value, Value, Value, Value) {
        (
            json!({}),
            json!({}),
            json!({"count": 2, "score": 75}),
            json!({"A": {"a": 1}}),
            json!({"v": 10}),
        )
    }

    fn scope<'a>(v: &'a (Value, Value, Value, Value, Value)) -> EvalScope<'a> {
        EvalScope {
            parameters: &v.0,
            config: &v.1,
            state: &v.2,
            parent: &v.3,
            output: Some(&v.4),
            locals: None,
        }
    }

    fn steps(value: serde_json::Value) -> RuleSpec {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn bare_expression_rule() {
        let v = values();
        let result = run_rule(&RuleSpec::Expr("state.count + 1".into()), &scope(&v)).unwrap();
        assert_eq!(result, Some(json!(3)));
    }

    #[test]
    fn output_binding_is_visible() {
        let v = values();
        let result = run_rule(&RuleSpec::Expr("output.v * 2".into()), &scope(&v)).unwrap();
        assert_eq!(result, Some(json!(20)));
    }

    #[test]
    fn if_then_else_return() {
        let v = values();
        let rule = steps(json!([
            {"if": "state.score >= 70", "then": "grade = 'high'"},
            {"if": "state.score < 70", "then": "grade = 'low'"},
            {"return": "grade"}
        ]));
        assert_eq!(run_rule(&rule, &scope(&v)).unwrap(), Some(json!("high")));
    }

    #[test]
    fn else_branch_runs_when_condition_is_falsy() {
        let v = values();
        let rule = steps(json!([
            {"if": "state.score >= 90", "then": "tier = 'a'", "else": "tier = 'b'"},
            {"return": "tier"}
        ]));
        assert_eq!(run_rule(&rule, &scope(&v)).unwrap(), Some(json!("b")));
    }

    #[test]
    fn without_return_the_last_step_value_wins() {
        let v = values();
        let rule = steps(json!([
            {"then": "a = 1"},
            {"then": "a + state.count"}
        ]));
        assert_eq!(run_rule(&rule, &scope(&v)).unwrap(), Some(json!(3)));
    }

    #[test]
    fn conditional_return_skipped_when_falsy() {
        let v = values();
        let rule = steps(json!([
            {"if": "state.count > 10", "return": "'big'"},
            {"return": "'small'"}
        ]));
        assert_eq!(run_rule(&rule, &scope(&v)).unwrap(), Some(json!("small")));
    }

    #[test]
    fn locals_shadow_context() {
        let v = values();
        let rule = steps(json!([
            {"then": "state = 5"},
            {"return": "state"}
        ]));
        assert_eq!(run_rule(&rule, &scope(&v)).unwrap(), Some(json!(5)));
    }

    #[test]
    fn comparison_is_not_an_assignment() {
        assert!(split_assignment("a == b").is_none());
        assert!(split_assignment("a <= b").is_none());
        assert_eq!(split_assignment("a = b"), Some(("a", "b")));
        assert_eq!(
            split_assignment("count = state.count + 1"),
            Some(("count", "state.count + 1"))
        );
    }
}
