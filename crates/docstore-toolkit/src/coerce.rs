use indexmap::IndexMap;
use serde_json::{Number, Value as JsonValue};

use crate::store::Document;

/// Convert one submitted form value to a JSON value.
///
/// Form fields always arrive as text. The first matching rule decides the
/// result:
///
/// 1. `"true"` / `"false"` become booleans (case-sensitive)
/// 2. the empty string becomes `null`
/// 3. a string that parses completely as a finite number becomes a number
/// 4. a string starting with `{` or `[` that parses as JSON becomes that value
/// 5. anything else stays a string
///
/// Note: numeric-looking identifiers such as `"007"` are turned into numbers
/// as well. No schema is consulted.
///
/// This never fails; the worst case is the original string.
pub fn coerce_value(raw: &str) -> JsonValue {
   match raw {
      "true" => JsonValue::Bool(true),
      "false" => JsonValue::Bool(false),
      "" => JsonValue::Null,
      _ => parse_number(raw)
         .or_else(|| parse_structured(raw))
         .unwrap_or_else(|| JsonValue::String(raw.to_owned())),
   }
}

/// Coerce every submitted field, keeping submission order.
pub fn coerce_fields(fields: &IndexMap<String, String>) -> Document {
   fields
      .iter()
      .map(|(name, raw)| (name.clone(), coerce_value(raw)))
      .collect()
}

fn parse_number(raw: &str) -> Option<JsonValue> {
   // Integers stay exact; everything else goes through f64
   if let Ok(v) = raw.parse::<i64>() {
      return Some(JsonValue::from(v));
   }
   if let Ok(v) = raw.parse::<u64>() {
      return Some(JsonValue::from(v));
   }

   raw.parse::<f64>()
      .ok()
      .filter(|v| v.is_finite())
      .and_then(Number::from_f64)
      .map(JsonValue::Number)
}

fn parse_structured(raw: &str) -> Option<JsonValue> {
   if !(raw.starts_with('{') || raw.starts_with('[')) {
      return None;
   }
   serde_json::from_str(raw).ok()
}

#[cfg(test)]
mod tests {
   use super::*;
   use serde_json::json;

   #[test]
   fn test_booleans_are_case_sensitive() {
      assert_eq!(coerce_value("true"), json!(true));
      assert_eq!(coerce_value("false"), json!(false));
      assert_eq!(coerce_value("FALSE"), json!("FALSE"));
      assert_eq!(coerce_value("True"), json!("True"));
   }

   #[test]
   fn test_empty_string_is_null() {
      assert_eq!(coerce_value(""), JsonValue::Null);
   }

   #[test]
   fn test_full_numeric_parse() {
      assert_eq!(coerce_value("42"), json!(42));
      assert_eq!(coerce_value("-17"), json!(-17));
      assert_eq!(coerce_value("3.25"), json!(3.25));
      assert_eq!(coerce_value("1e3"), json!(1000.0));
      assert_eq!(coerce_value("18446744073709551615"), json!(u64::MAX));
      assert_eq!(coerce_value("42abc"), json!("42abc"));
      assert_eq!(coerce_value(" 42"), json!(" 42"));
   }

   #[test]
   fn test_numeric_identifiers_lose_leading_zeros() {
      assert_eq!(coerce_value("007"), json!(7));
   }

   #[test]
   fn test_non_finite_numbers_stay_strings() {
      assert_eq!(coerce_value("inf"), json!("inf"));
      assert_eq!(coerce_value("NaN"), json!("NaN"));
      assert_eq!(coerce_value("1e400"), json!("1e400"));
   }

   #[test]
   fn test_structured_values() {
      assert_eq!(coerce_value(r#"{"a":1}"#), json!({"a": 1}));
      assert_eq!(coerce_value(r#"[1,"two",null]"#), json!([1, "two", null]));
      assert_eq!(coerce_value("{bad json"), json!("{bad json"));
      assert_eq!(coerce_value("[1,"), json!("[1,"));
   }

   #[test]
   fn test_json_scalars_without_brackets_stay_strings() {
      assert_eq!(coerce_value(r#""quoted""#), json!("\"quoted\""));
      assert_eq!(coerce_value("null"), json!("null"));
   }

   #[test]
   fn test_coerce_fields_keeps_order() {
      let mut fields = IndexMap::new();
      fields.insert("zeta".to_string(), "1".to_string());
      fields.insert("alpha".to_string(), "".to_string());
      fields.insert("mid".to_string(), "text".to_string());

      let record = coerce_fields(&fields);
      let keys: Vec<_> = record.keys().map(String::as_str).collect();
      assert_eq!(keys, ["zeta", "alpha", "mid"]);
      assert_eq!(JsonValue::Object(record), json!({"zeta": 1, "alpha": null, "mid": "text"}));
   }
}
