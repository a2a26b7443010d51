//! Inclusion predicates (`when`) for identities.
//!
//! A predicate is evaluated against a JSON context, which usually contains the installed
//! `services` and the cluster `configurations`:
//!
//! ```
//! use serde_json::json;
//! use stackable_kerberos::predicate::Predicate;
//!
//! let when: Predicate = serde_json::from_value(json!({
//!     "and": [
//!         {"contains": ["services", "HIVE"]},
//!         {"not": {"equals": ["configurations/hive-site/hive.server2.authentication", "NONE"]}}
//!     ]
//! }))
//! .unwrap();
//!
//! let context = json!({
//!     "services": ["HDFS", "HIVE"],
//!     "configurations": {"hive-site": {"hive.server2.authentication": "KERBEROS"}}
//! });
//! assert!(when.evaluate(&context));
//! ```
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Predicate {
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),

    /// `[path, value]`: the value at `path` is an array containing `value`, an object with the
    /// key `value` or a string containing `value`.
    Contains(String, String),

    /// `[path, value]`: the scalar at `path` rendered as string equals `value`.
    Equals(String, String),
}

impl Predicate {
    pub fn evaluate(&self, context: &Value) -> bool {
        match self {
            Self::And(predicates) => predicates.iter().all(|p| p.evaluate(context)),
            Self::Or(predicates) => predicates.iter().any(|p| p.evaluate(context)),
            Self::Not(predicate) => !predicate.evaluate(context),
            Self::Contains(path, expected) => match lookup(context, path) {
                Some(Value::Array(items)) => items
                    .iter()
                    .any(|item| scalar_to_string(item).as_deref() == Some(expected)),
                Some(Value::Object(map)) => map.contains_key(expected),
                Some(Value::String(s)) => s.contains(expected.as_str()),
                _ => false,
            },
            Self::Equals(path, expected) => lookup(context, path)
                .and_then(scalar_to_string)
                .is_some_and(|actual| &actual == expected),
        }
    }
}

/// Walks `context` along the `/`-separated `path`. Array elements are addressed by index.
fn lookup<'a>(context: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .try_fold(context, |value, segment| match value {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
