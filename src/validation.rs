//! Request body validation
//!
//! Bodies are parsed to `serde_json::Value` first and checked field by
//! field. Every failed rule is collected so the client sees all problems at
//! once, then the body is converted into typed values.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;

use crate::types::{FarmError, FieldError, Result};

/// Resolve a dotted path (`location.country`) inside a JSON body
pub fn lookup<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(body, |node, key| node.get(key))
        .filter(|v| !v.is_null())
}

pub fn is_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !value.chars().any(char::is_whitespace)
        && domain.contains('.')
        && domain.split('.').all(|label| !label.is_empty())
}

/// Optional leading `+`, then 7..=15 digits; spaces, dashes, dots and
/// parentheses may separate groups
pub fn is_mobile_phone(value: &str) -> bool {
    let digits_part = value.trim().strip_prefix('+').unwrap_or(value.trim());
    let mut digits = 0;
    for c in digits_part.chars() {
        match c {
            '0'..='9' => digits += 1,
            ' ' | '-' | '.' | '(' | ')' => {}
            _ => return false,
        }
    }
    (7..=15).contains(&digits)
}

/// Number, or a string holding one
pub fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Integer, or a string holding one; `4.0` counts, `4.5` does not
pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(n: f64) -> Option<i64> {
    (n.is_finite() && n.fract() == 0.0 && n.abs() < i64::MAX as f64).then_some(n as i64)
}

/// Boolean, or the strings `true`/`false`
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// RFC 3339 timestamp or a bare `YYYY-MM-DD` date (midnight UTC)
pub fn parse_iso8601(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

/// Collects field errors for one request body
pub struct Checks<'a> {
    body: &'a Value,
    errors: Vec<FieldError>,
}

impl<'a> Checks<'a> {
    pub fn new(body: &'a Value) -> Self {
        Self {
            body,
            errors: Vec::new(),
        }
    }

    pub fn fail(&mut self, path: &str, msg: &str) {
        self.errors.push(FieldError::body(path, msg));
    }

    fn get(&self, path: &str) -> Option<&'a Value> {
        lookup(self.body, path)
    }

    /// String whose trimmed length is within `min..=max`
    pub fn length(&mut self, path: &str, min: usize, max: usize, msg: &str) -> &mut Self {
        let ok = self
            .get(path)
            .and_then(Value::as_str)
            .is_some_and(|s| (min..=max).contains(&char_len(s)));
        if !ok {
            self.fail(path, msg);
        }
        self
    }

    /// Like `length`, skipped when the field is absent
    pub fn optional_length(&mut self, path: &str, min: usize, max: usize, msg: &str) -> &mut Self {
        if self.get(path).is_some() {
            self.length(path, min, max, msg);
        }
        self
    }

    /// Present, a string, and not blank
    pub fn not_empty(&mut self, path: &str, msg: &str) -> &mut Self {
        let ok = self
            .get(path)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.trim().is_empty());
        if !ok {
            self.fail(path, msg);
        }
        self
    }

    pub fn optional_not_empty(&mut self, path: &str, msg: &str) -> &mut Self {
        if self.get(path).is_some() {
            self.not_empty(path, msg);
        }
        self
    }

    pub fn email(&mut self, path: &str, msg: &str) -> &mut Self {
        let ok = self
            .get(path)
            .and_then(Value::as_str)
            .is_some_and(|s| is_email(s.trim()));
        if !ok {
            self.fail(path, msg);
        }
        self
    }

    pub fn mobile_phone(&mut self, path: &str, msg: &str) -> &mut Self {
        let ok = self
            .get(path)
            .and_then(Value::as_str)
            .is_some_and(is_mobile_phone);
        if !ok {
            self.fail(path, msg);
        }
        self
    }

    pub fn optional_mobile_phone(&mut self, path: &str, msg: &str) -> &mut Self {
        if self.get(path).is_some() {
            self.mobile_phone(path, msg);
        }
        self
    }

    pub fn number(&mut self, path: &str, msg: &str) -> &mut Self {
        if self.get(path).and_then(as_number).is_none() {
            self.fail(path, msg);
        }
        self
    }

    /// Numeric value within `min..=max`
    pub fn range(&mut self, path: &str, min: f64, max: f64, msg: &str) -> &mut Self {
        let ok = self
            .get(path)
            .and_then(as_number)
            .is_some_and(|n| (min..=max).contains(&n));
        if !ok {
            self.fail(path, msg);
        }
        self
    }

    pub fn optional_range(&mut self, path: &str, min: f64, max: f64, msg: &str) -> &mut Self {
        if self.get(path).is_some() {
            self.range(path, min, max, msg);
        }
        self
    }

    /// Integer within `min..=max`
    pub fn int_range(&mut self, path: &str, min: i64, max: i64, msg: &str) -> &mut Self {
        let ok = self
            .get(path)
            .and_then(as_int)
            .is_some_and(|n| (min..=max).contains(&n));
        if !ok {
            self.fail(path, msg);
        }
        self
    }

    pub fn optional_int_range(&mut self, path: &str, min: i64, max: i64, msg: &str) -> &mut Self {
        if self.get(path).is_some() {
            self.int_range(path, min, max, msg);
        }
        self
    }

    pub fn boolean(&mut self, path: &str, msg: &str) -> &mut Self {
        if self.get(path).and_then(as_bool).is_none() {
            self.fail(path, msg);
        }
        self
    }

    /// String that is one of `allowed` (exact match)
    pub fn one_of(&mut self, path: &str, allowed: &[&str], msg: &str) -> &mut Self {
        let ok = self
            .get(path)
            .and_then(Value::as_str)
            .is_some_and(|s| allowed.contains(&s));
        if !ok {
            self.fail(path, msg);
        }
        self
    }

    pub fn optional_one_of(&mut self, path: &str, allowed: &[&str], msg: &str) -> &mut Self {
        if self.get(path).is_some() {
            self.one_of(path, allowed, msg);
        }
        self
    }

    /// Like `one_of`, ignoring ASCII case
    pub fn one_of_ci(&mut self, path: &str, allowed: &[&str], msg: &str) -> &mut Self {
        let ok = self.get(path).and_then(Value::as_str).is_some_and(|s| {
            allowed.iter().any(|a| a.eq_ignore_ascii_case(s.trim()))
        });
        if !ok {
            self.fail(path, msg);
        }
        self
    }

    pub fn optional_one_of_ci(&mut self, path: &str, allowed: &[&str], msg: &str) -> &mut Self {
        if self.get(path).is_some() {
            self.one_of_ci(path, allowed, msg);
        }
        self
    }

    pub fn optional_date(&mut self, path: &str, msg: &str) -> &mut Self {
        let bad = self
            .get(path)
            .is_some_and(|v| v.as_str().and_then(parse_iso8601).is_none());
        if bad {
            self.fail(path, msg);
        }
        self
    }

    pub fn optional_array(&mut self, path: &str, msg: &str) -> &mut Self {
        if self.get(path).is_some_and(|v| !v.is_array()) {
            self.fail(path, msg);
        }
        self
    }

    pub fn optional_object(&mut self, path: &str, msg: &str) -> &mut Self {
        if self.get(path).is_some_and(|v| !v.is_object()) {
            self.fail(path, msg);
        }
        self
    }

    /// `Validation` error when any rule failed
    pub fn finish(&mut self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(FarmError::Validation(std::mem::take(&mut self.errors)))
        }
    }
}

/// Trimmed string at `path`, if present
pub fn trimmed(body: &Value, path: &str) -> Option<String> {
    lookup(body, path)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
}

/// Deserialize the value at `path`; a shape mismatch is reported against the field
pub fn extract<T: serde::de::DeserializeOwned>(body: &Value, path: &str) -> Result<Option<T>> {
    match lookup(body, path) {
        None => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| FarmError::Validation(vec![FieldError::body(path, e.to_string())])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lookup_dotted_paths() {
        let body = json!({ "location": { "country": "India", "city": null } });
        assert_eq!(lookup(&body, "location.country"), Some(&json!("India")));
        assert!(lookup(&body, "location.city").is_none());
        assert!(lookup(&body, "location.state").is_none());
        assert!(lookup(&body, "nope.deeper").is_none());
    }

    #[test]
    fn test_email_shapes() {
        assert!(is_email("farmer@example.com"));
        assert!(is_email("a.b+c@mail.co.in"));
        assert!(!is_email("farmer@example"));
        assert!(!is_email("farmer example@x.com"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("a@b@c.com"));
        assert!(!is_email("a@.com"));
    }

    #[test]
    fn test_mobile_phone_shapes() {
        assert!(is_mobile_phone("+919876543210"));
        assert!(is_mobile_phone("(555) 123-4567"));
        assert!(!is_mobile_phone("12345"));
        assert!(!is_mobile_phone("+1 555 CALL NOW"));
        assert!(!is_mobile_phone("1234567890123456"));
    }

    #[test]
    fn test_iso_dates() {
        assert!(parse_iso8601("2024-03-15").is_some());
        assert!(parse_iso8601("2024-03-15T08:30:00Z").is_some());
        assert!(parse_iso8601("2024-03-15T08:30:00+05:30").is_some());
        assert!(parse_iso8601("15/03/2024").is_none());
        assert!(parse_iso8601("2024-02-30").is_none());
    }

    #[test]
    fn test_lenient_scalars() {
        assert_eq!(as_number(&json!("12.5")), Some(12.5));
        assert_eq!(as_number(&json!("abc")), None);
        assert_eq!(as_int(&json!(4)), Some(4));
        assert_eq!(as_int(&json!(4.5)), None);
        assert_eq!(as_bool(&json!("true")), Some(true));
        assert_eq!(as_bool(&json!(1)), None);
    }

    #[test]
    fn test_integral_floats_count_as_ints() {
        assert_eq!(as_int(&json!(4.0)), Some(4));
        assert_eq!(as_int(&json!(-2.0)), Some(-2));
        assert_eq!(as_int(&json!("5.0")), Some(5));
        assert_eq!(as_int(&json!("4.2")), None);
        assert_eq!(as_int(&json!(1e300)), None);

        let body = json!({ "rating": 4.0, "progress": 50.0 });
        assert!(Checks::new(&body)
            .int_range("rating", 1, 5, "Rating must be between 1 and 5")
            .int_range("progress", 0, 100, "Progress must be between 0 and 100")
            .finish()
            .is_ok());
    }

    #[test]
    fn test_checks_collect_every_failure() {
        let body = json!({ "name": "A", "email": "bad", "rating": 7 });
        let err = Checks::new(&body)
            .length("name", 2, 100, "Name must be between 2 and 100 characters")
            .email("email", "Please provide a valid email")
            .int_range("rating", 1, 5, "Rating must be between 1 and 5")
            .optional_length("comments", 0, 500, "Comments cannot exceed 500 characters")
            .finish()
            .unwrap_err();

        match err {
            FarmError::Validation(errors) => {
                let paths: Vec<_> = errors.iter().map(|e| e.path.as_str()).collect();
                assert_eq!(paths, vec!["name", "email", "rating"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_case_insensitive_choice() {
        let body = json!({ "difficulty": "Beginner" });
        assert!(Checks::new(&body)
            .one_of_ci("difficulty", &["beginner", "intermediate"], "bad")
            .finish()
            .is_ok());
    }
}
