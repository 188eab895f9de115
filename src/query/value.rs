//! Value coercion helpers shared by the executor's filter and projection
//! stages. Node/edge properties live in a loosely-typed JSON bag
//! (§3); comparisons against a WHERE literal need a single, consistent
//! coercion so `age > 3` behaves the same whether `age` was stored as a
//! JSON number or a numeric string.

use serde_json::Value as Json;

use super::ast::ConditionValue;

/// Render a JSON property value as the string RETURN projects and
/// `CONTAINS`/`STARTS WITH`/`=~` compare against. Strings are unquoted;
/// everything else uses its JSON text form.
pub fn stringify(value: &Json) -> String {
    match value {
        Json::String(s) => s.clone(),
        Json::Null => String::new(),
        other => other.to_string(),
    }
}

/// Best-effort numeric coercion for `<`/`<=`/`>`/`>=` comparisons: JSON
/// numbers convert directly, JSON strings parse as a last resort so a
/// property stored as `"42"` still compares numerically against `42`.
pub fn as_f64(value: &Json) -> Option<f64> {
    match value {
        Json::Number(n) => n.as_f64(),
        Json::String(s) => s.parse::<f64>().ok(),
        _ => None,
    }
}

/// Compare a stored JSON value against a WHERE literal for an ordering
/// operator (`<`, `<=`, `>`, `>=`). Returns `None` if either side can't be
/// coerced to a number, which the executor treats as "condition not met"
/// rather than an error — a non-numeric property simply never satisfies
/// an ordering comparison.
pub fn compare_ordering(stored: &Json, literal: &ConditionValue) -> Option<std::cmp::Ordering> {
    let lhs = as_f64(stored)?;
    let rhs = match literal {
        ConditionValue::Integer(n) => *n as f64,
        ConditionValue::Decimal(d) => *d,
        ConditionValue::String(s) => s.parse::<f64>().ok()?,
    };
    lhs.partial_cmp(&rhs)
}

/// Render a WHERE literal the same way a stored string property would be
/// rendered, for `=`, `CONTAINS`, and `STARTS WITH` comparisons.
pub fn literal_as_string(literal: &ConditionValue) -> String {
    match literal {
        ConditionValue::String(s) => s.clone(),
        ConditionValue::Integer(n) => n.to_string(),
        ConditionValue::Decimal(d) => d.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stringify_unquotes_json_strings() {
        assert_eq!(stringify(&json!("hello")), "hello");
        assert_eq!(stringify(&json!(42)), "42");
        assert_eq!(stringify(&Json::Null), "");
    }

    #[test]
    fn as_f64_parses_numeric_strings() {
        assert_eq!(as_f64(&json!("3.5")), Some(3.5));
        assert_eq!(as_f64(&json!(3.5)), Some(3.5));
        assert_eq!(as_f64(&json!("not a number")), None);
    }

    #[test]
    fn compare_ordering_coerces_both_sides() {
        let ord = compare_ordering(&json!("10"), &ConditionValue::Integer(3)).unwrap();
        assert_eq!(ord, std::cmp::Ordering::Greater);
    }
}
