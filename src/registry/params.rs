//! Typed access to planner-bound parameters
//!
//! The oracle binds parameters as JSON, so a year may arrive as `"2024"` or
//! `2024` and a threshold as `0.12` or `"0.12"`. Accessors accept both and
//! report the offending key otherwise.

use chrono::NaiveDate;
use serde_json::{Map, Value};

use crate::error::RetrievalError;

#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    inner: &'a Map<String, Value>,
}

impl<'a> Params<'a> {
    pub fn new(inner: &'a Map<String, Value>) -> Self {
        Self { inner }
    }

    /// Keys from `required` that are absent, null, blank or empty lists
    pub fn missing(&self, required: &[&str]) -> Vec<String> {
        required
            .iter()
            .filter(|key| !self.is_present(key))
            .map(|key| key.to_string())
            .collect()
    }

    pub fn is_present(&self, key: &str) -> bool {
        match self.inner.get(key) {
            None | Some(Value::Null) => false,
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(Value::Array(items)) => !items.is_empty(),
            Some(_) => true,
        }
    }

    pub fn str(&self, key: &str) -> Result<String, RetrievalError> {
        self.opt_str(key)?.ok_or_else(|| RetrievalError::MissingParams {
            keys: vec![key.to_string()],
        })
    }

    pub fn opt_str(&self, key: &str) -> Result<Option<String>, RetrievalError> {
        if !self.is_present(key) {
            return Ok(None);
        }
        match &self.inner[key] {
            Value::String(s) => Ok(Some(s.trim().to_string())),
            Value::Number(n) => Ok(Some(n.to_string())),
            other => Err(invalid(key, format!("expected a string, got {}", other))),
        }
    }

    /// Number or numeric string. A trailing `%` divides by 100.
    pub fn opt_f64(&self, key: &str) -> Result<Option<f64>, RetrievalError> {
        if !self.is_present(key) {
            return Ok(None);
        }
        match &self.inner[key] {
            Value::Number(n) => n
                .as_f64()
                .map(Some)
                .ok_or_else(|| invalid(key, "not representable as f64")),
            Value::String(s) => {
                let s = s.trim();
                let (digits, scale) = match s.strip_suffix('%') {
                    Some(rest) => (rest.trim(), 100.0),
                    None => (s, 1.0),
                };
                digits
                    .parse::<f64>()
                    .map(|v| Some(v / scale))
                    .map_err(|_| invalid(key, format!("'{}' is not a number", s)))
            }
            other => Err(invalid(key, format!("expected a number, got {}", other))),
        }
    }

    /// Array of strings, or one comma-separated string
    pub fn str_list(&self, key: &str) -> Result<Vec<String>, RetrievalError> {
        self.opt_str_list(key)?.ok_or_else(|| RetrievalError::MissingParams {
            keys: vec![key.to_string()],
        })
    }

    pub fn opt_str_list(&self, key: &str) -> Result<Option<Vec<String>>, RetrievalError> {
        if !self.is_present(key) {
            return Ok(None);
        }
        let items: Vec<String> = match &self.inner[key] {
            Value::Array(items) => items
                .iter()
                .map(|v| match v {
                    Value::String(s) => Ok(s.trim().to_string()),
                    Value::Number(n) => Ok(n.to_string()),
                    other => Err(invalid(key, format!("list item {} is not a string", other))),
                })
                .collect::<Result<_, _>>()?,
            Value::String(s) => s.split(',').map(|p| p.trim().to_string()).collect(),
            other => return Err(invalid(key, format!("expected a list, got {}", other))),
        };
        Ok(Some(items.into_iter().filter(|s| !s.is_empty()).collect()))
    }

    /// ISO date (YYYY-MM-DD)
    pub fn opt_date(&self, key: &str) -> Result<Option<NaiveDate>, RetrievalError> {
        self.opt_str(key)?
            .map(|s| {
                NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .map_err(|_| invalid(key, format!("'{}' is not a YYYY-MM-DD date", s)))
            })
            .transpose()
    }
}

fn invalid(key: &str, reason: impl Into<String>) -> RetrievalError {
    RetrievalError::InvalidParam {
        key: key.to_string(),
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_year_as_string_or_number() {
        let m = map(json!({"a": "2024", "b": 2024}));
        let p = Params::new(&m);
        assert_eq!(p.str("a").unwrap(), "2024");
        assert_eq!(p.str("b").unwrap(), "2024");
    }

    #[test]
    fn test_threshold_forms() {
        let m = map(json!({"n": 0.12, "s": "0.12", "pct": "12%", "bad": "high"}));
        let p = Params::new(&m);
        assert_eq!(p.opt_f64("n").unwrap(), Some(0.12));
        assert_eq!(p.opt_f64("s").unwrap(), Some(0.12));
        assert_eq!(p.opt_f64("pct").unwrap(), Some(0.12));
        assert_eq!(p.opt_f64("absent").unwrap(), None);
        assert!(matches!(
            p.opt_f64("bad"),
            Err(RetrievalError::InvalidParam { .. })
        ));
    }

    #[test]
    fn test_list_forms() {
        let m = map(json!({"arr": ["P001", "P002"], "csv": "P001, P003", "empty": []}));
        let p = Params::new(&m);
        assert_eq!(p.str_list("arr").unwrap(), vec!["P001", "P002"]);
        assert_eq!(p.str_list("csv").unwrap(), vec!["P001", "P003"]);
        assert!(!p.is_present("empty"));
        assert_eq!(p.missing(&["arr", "empty", "nope"]), vec!["empty", "nope"]);
    }

    #[test]
    fn test_dates() {
        let m = map(json!({"d": "2024-02-20", "bad": "20/02/2024"}));
        let p = Params::new(&m);
        assert_eq!(
            p.opt_date("d").unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 20)
        );
        assert!(p.opt_date("bad").is_err());
    }

    #[test]
    fn test_object_is_not_a_string() {
        let m = map(json!({"o": {"x": 1}}));
        assert!(Params::new(&m).str("o").is_err());
    }
}
