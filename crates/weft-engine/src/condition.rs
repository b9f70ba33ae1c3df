use std::collections::HashMap;

use serde_json::Value;

/// Evaluate a condition expression against the run's variables.
///
/// Supported expressions:
/// - `true` / `false`: literals
/// - `key == "value"`: exact match
/// - `key != "value"`: not equal
/// - `key contains "substr"`: substring match
///
/// Returns `false` for unparseable expressions and missing keys, so a
/// misconfigured condition node steers the run down its false branch
/// instead of failing it.
pub fn evaluate_condition(expr: &str, variables: &HashMap<String, Value>) -> bool {
    let expr = expr.trim();

    match expr {
        "true" => return true,
        "false" | "" => return false,
        _ => {}
    }

    // key contains "value"
    if let Some((key, substr)) = parse_operator(expr, "contains") {
        return variables
            .get(key)
            .and_then(|v| v.as_str())
            .is_some_and(|s| s.contains(substr));
    }

    // key != "value"
    if let Some((key, value)) = parse_operator(expr, "!=") {
        return variables
            .get(key)
            .and_then(|v| v.as_str())
            .is_some_and(|s| s != value);
    }

    // key == "value"
    if let Some((key, value)) = parse_operator(expr, "==") {
        return variables
            .get(key)
            .and_then(|v| v.as_str())
            .is_some_and(|s| s == value);
    }

    false
}

/// Parse `key OP "value"` expressions, returning (key, value).
///
/// The operator must appear before the quoted value; an occurrence inside
/// the quotes is part of the value, not a split point.
fn parse_operator<'a>(expr: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    let idx = expr.find(op)?;
    if expr[..idx].contains('"') {
        return None;
    }
    let key = expr[..idx].trim();
    let val = expr[idx + op.len()..].trim().trim_matches('"');
    Some((key, val))
}
