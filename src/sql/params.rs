//! Convert serde_json::Value to the text form bound to PostgreSQL.
//! Every placeholder carries a cast to the column type, so the server parses the text.

use serde_json::Value;

pub fn bind_text(v: &Value) -> Option<String> {
    match v {
        Value::Null => None,
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        Value::Array(_) | Value::Object(_) => Some(v.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_and_documents() {
        assert_eq!(bind_text(&json!(null)), None);
        assert_eq!(bind_text(&json!(true)).as_deref(), Some("true"));
        assert_eq!(bind_text(&json!(10.99)).as_deref(), Some("10.99"));
        assert_eq!(bind_text(&json!("AC/DC")).as_deref(), Some("AC/DC"));
        assert_eq!(bind_text(&json!({"a": [1, 2]})).as_deref(), Some(r#"{"a":[1,2]}"#));
    }
}
