use std::collections::HashMap;

use tracing::warn;

use skein_core::types::StepStatus;

/// Evaluate a custom edge condition against context data and the source
/// node's outcome.
///
/// The grammar is deliberately small so edge conditions stay data, not code:
///
/// - `key == "value"`, `key != "value"`: equality on strings/numbers/bools
/// - `key contains "substr"`: substring match
/// - `key > 3`, `key >= 3`, `key < 3`, `key <= 3`: numeric comparison
/// - `clause && clause`, `clause || clause`: `&&` binds tighter than `||`
/// - the key `outcome.status` resolves to `"succeeded"` or `"failed"`
///
/// Unparseable expressions evaluate to false and log a warning.
pub fn evaluate(
    expr: &str,
    context: &HashMap<String, serde_json::Value>,
    status: StepStatus,
) -> bool {
    expr.split("||")
        .any(|conjunct| conjunct.split("&&").all(|c| eval_clause(c, context, status)))
}

/// Ordered longest-first so `>=` is not misparsed as `>`.
const OPERATORS: [&str; 7] = ["contains", "!=", "==", ">=", "<=", ">", "<"];

fn eval_clause(
    clause: &str,
    context: &HashMap<String, serde_json::Value>,
    status: StepStatus,
) -> bool {
    let clause = clause.trim();

    for op in OPERATORS {
        if let Some((key, literal)) = parse_operator(clause, op) {
            let Some(value) = lookup(key, context, status) else {
                return false;
            };
            return apply_operator(op, &value, &literal);
        }
    }

    warn!(clause, "Unparseable edge condition clause, evaluating to false");
    false
}

/// Parse `key OP literal`, returning (key, parsed literal).
fn parse_operator<'a>(clause: &'a str, op: &str) -> Option<(&'a str, serde_json::Value)> {
    let parts: Vec<&str> = clause.splitn(2, op).collect();
    if parts.len() != 2 {
        return None;
    }
    let key = parts[0].trim();
    if key.is_empty() {
        return None;
    }
    Some((key, parse_literal(parts[1].trim())))
}

fn parse_literal(raw: &str) -> serde_json::Value {
    if raw.len() >= 2 && raw.starts_with('"') && raw.ends_with('"') {
        return serde_json::Value::String(raw[1..raw.len() - 1].to_string());
    }
    match raw {
        "true" => return serde_json::Value::Bool(true),
        "false" => return serde_json::Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<f64>() {
        if let Some(num) = serde_json::Number::from_f64(n) {
            return serde_json::Value::Number(num);
        }
    }
    // Bare word: treat as a string literal
    serde_json::Value::String(raw.to_string())
}

fn lookup(
    key: &str,
    context: &HashMap<String, serde_json::Value>,
    status: StepStatus,
) -> Option<serde_json::Value> {
    if key == "outcome.status" {
        return Some(serde_json::Value::String(status.to_string()));
    }
    context.get(key).cloned()
}

fn apply_operator(op: &str, value: &serde_json::Value, literal: &serde_json::Value) -> bool {
    match op {
        "contains" => match (value.as_str(), literal.as_str()) {
            (Some(s), Some(sub)) => s.contains(sub),
            _ => false,
        },
        "==" => loose_eq(value, literal),
        "!=" => !loose_eq(value, literal),
        ">" | ">=" | "<" | "<=" => match (value.as_f64(), literal.as_f64()) {
            (Some(a), Some(b)) => match op {
                ">" => a > b,
                ">=" => a >= b,
                "<" => a < b,
                _ => a <= b,
            },
            _ => false,
        },
        _ => false,
    }
}

/// Equality that compares numbers numerically (so `3` matches `3.0`) and
/// everything else structurally.
fn loose_eq(a: &serde_json::Value, b: &serde_json::Value) -> bool {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x == y,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(pairs: &[(&str, serde_json::Value)]) -> HashMap<String, serde_json::Value> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_string_equality() {
        let c = ctx(&[("status", serde_json::json!("approved"))]);
        assert!(evaluate(r#"status == "approved""#, &c, StepStatus::Succeeded));
        assert!(!evaluate(r#"status == "rejected""#, &c, StepStatus::Succeeded));
        assert!(evaluate(r#"status != "rejected""#, &c, StepStatus::Succeeded));
    }

    #[test]
    fn test_contains() {
        let c = ctx(&[("summary", serde_json::json!("tests passed on retry"))]);
        assert!(evaluate(r#"summary contains "passed""#, &c, StepStatus::Succeeded));
        assert!(!evaluate(r#"summary contains "failed""#, &c, StepStatus::Succeeded));
    }

    #[test]
    fn test_numeric_comparisons() {
        let c = ctx(&[("score", serde_json::json!(0.85))]);
        assert!(evaluate("score >= 0.8", &c, StepStatus::Succeeded));
        assert!(evaluate("score > 0.5", &c, StepStatus::Succeeded));
        assert!(!evaluate("score < 0.5", &c, StepStatus::Succeeded));
        assert!(evaluate("score <= 0.85", &c, StepStatus::Succeeded));
        assert!(evaluate("score == 0.85", &c, StepStatus::Succeeded));
    }

    #[test]
    fn test_boolean_literal() {
        let c = ctx(&[("approved", serde_json::json!(true))]);
        assert!(evaluate("approved == true", &c, StepStatus::Succeeded));
        assert!(!evaluate("approved == false", &c, StepStatus::Succeeded));
    }

    #[test]
    fn test_outcome_status_lookup() {
        let c = ctx(&[]);
        assert!(evaluate(r#"outcome.status == "succeeded""#, &c, StepStatus::Succeeded));
        assert!(evaluate(r#"outcome.status == "failed""#, &c, StepStatus::Failed));
        assert!(!evaluate(r#"outcome.status == "failed""#, &c, StepStatus::Succeeded));
    }

    #[test]
    fn test_connectives() {
        let c = ctx(&[
            ("score", serde_json::json!(7)),
            ("kind", serde_json::json!("draft")),
        ]);
        assert!(evaluate(r#"score > 5 && kind == "draft""#, &c, StepStatus::Succeeded));
        assert!(!evaluate(r#"score > 5 && kind == "final""#, &c, StepStatus::Succeeded));
        assert!(evaluate(r#"kind == "final" || score > 5"#, &c, StepStatus::Succeeded));
        // && binds tighter: false || (true && true)
        assert!(evaluate(
            r#"kind == "final" || score > 5 && score < 10"#,
            &c,
            StepStatus::Succeeded
        ));
    }

    #[test]
    fn test_missing_key_is_false() {
        let c = ctx(&[]);
        assert!(!evaluate(r#"missing == "anything""#, &c, StepStatus::Succeeded));
        assert!(!evaluate("missing > 3", &c, StepStatus::Succeeded));
    }

    #[test]
    fn test_unparseable_is_false() {
        let c = ctx(&[("k", serde_json::json!(1))]);
        assert!(!evaluate("this is not a condition", &c, StepStatus::Succeeded));
        assert!(!evaluate("", &c, StepStatus::Succeeded));
    }

    #[test]
    fn test_type_mismatch_comparison_is_false() {
        let c = ctx(&[("name", serde_json::json!("alice"))]);
        assert!(!evaluate("name > 3", &c, StepStatus::Succeeded));
    }
}
