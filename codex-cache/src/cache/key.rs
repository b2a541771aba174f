//! Cache key construction
//!
//! A key is `<prefix>:<digest>` where the digest is a SHA-256 over a
//! canonical JSON rendering of the operation identity and its key-relevant
//! arguments. Named arguments and nested object fields are sorted before
//! hashing, so keys are independent of insertion order and stable across
//! processes and deployments.

use crate::cache::finite::ensure_finite;
use crate::cache::types::CacheKey;
use crate::error::{CacheError, Result};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Separator between a prefix and the argument digest
pub const KEY_SEPARATOR: char = ':';

/// Arguments of one call to a cached operation
///
/// Values are captured eagerly as JSON. A value that cannot be represented,
/// including NaN and infinities, is remembered as an error and reported when
/// the key is made, so a cached call never hashes a partial or lossy
/// argument list.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Value>,
    named: BTreeMap<String, Value>,
    errors: Vec<String>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a positional argument
    pub fn arg<T: Serialize + ?Sized>(mut self, value: &T) -> Self {
        match capture(value) {
            Ok(v) => self.positional.push(v),
            Err(e) => self
                .errors
                .push(format!("positional argument {}: {}", self.positional.len(), e)),
        }
        self
    }

    /// Set a named argument, replacing any previous value under that name
    pub fn named<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        let name = name.into();
        match capture(value) {
            Ok(v) => {
                self.named.insert(name, v);
            }
            Err(e) => self.errors.push(format!("argument `{}`: {}", name, e)),
        }
        self
    }

    /// Drop named arguments that do not affect the result
    pub fn excluding<S: AsRef<str>>(mut self, names: &[S]) -> Self {
        for name in names {
            let name = name.as_ref();
            self.named.remove(name);
            self.errors
                .retain(|e| !e.starts_with(&format!("argument `{}`:", name)));
        }
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn named_args(&self) -> &BTreeMap<String, Value> {
        &self.named
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// Fail if any argument could not be captured
    pub fn check(&self) -> Result<()> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(CacheError::Key(self.errors.join("; ")))
        }
    }
}

fn capture<T: Serialize + ?Sized>(value: &T) -> std::result::Result<Value, String> {
    ensure_finite(value).map_err(|e| e.to_string())?;
    serde_json::to_value(value).map_err(|e| e.to_string())
}

/// Produces a [`CacheKey`] from an operation identity, its arguments and a prefix
pub trait KeyMaker: Send + Sync {
    fn make(&self, identity: &str, args: &CallArgs, prefix: &str) -> Result<CacheKey>;
}

/// SHA-256 key maker used unless the service is given another one
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeyMaker;

impl KeyMaker for DefaultKeyMaker {
    fn make(&self, identity: &str, args: &CallArgs, prefix: &str) -> Result<CacheKey> {
        args.check()?;

        if prefix.is_empty() {
            return Err(CacheError::Key("prefix must not be empty".to_string()));
        }

        let named: Map<String, Value> = args
            .named_args()
            .iter()
            .map(|(k, v)| (k.clone(), canonicalize(v)))
            .collect();

        let payload = serde_json::json!({
            "identity": identity,
            "args": args.positional().iter().map(canonicalize).collect::<Vec<_>>(),
            "kwargs": Value::Object(named),
        });

        let mut hasher = Sha256::new();
        hasher.update(canonical_string(&payload)?.as_bytes());
        let digest = hex::encode(hasher.finalize());

        Ok(format!("{}{}{}", prefix, KEY_SEPARATOR, digest))
    }
}

/// Pattern a prefix sweep should match: the prefix plus the separator,
/// so `lookup` never sweeps `lookups:*`
pub fn sweep_pattern(prefix: &str) -> String {
    if prefix.ends_with(KEY_SEPARATOR) {
        prefix.to_string()
    } else {
        format!("{}{}", prefix, KEY_SEPARATOR)
    }
}

/// Rebuild objects with sorted keys, recursively
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, Value> =
                map.iter().map(|(k, v)| (k, canonicalize(v))).collect();
            let mut out = Map::new();
            for (k, v) in sorted {
                out.insert(k.clone(), v);
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn canonical_string(value: &Value) -> Result<String> {
    serde_json::to_string(value).map_err(CacheError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap, HashSet};

    #[derive(Serialize)]
    struct Filter {
        section: String,
        limit: u32,
    }

    fn make(identity: &str, args: &CallArgs, prefix: &str) -> CacheKey {
        DefaultKeyMaker.make(identity, args, prefix).unwrap()
    }

    #[test]
    fn test_key_starts_with_prefix() {
        let key = make("app::lookup", &CallArgs::new().named("id", &42), "lookup");
        assert!(key.starts_with("lookup:"));
        // sha256 hex digest
        assert_eq!(key.len(), "lookup:".len() + 64);
    }

    #[test]
    fn test_same_arguments_same_key() {
        let a = CallArgs::new().arg("hooks").named("id", &42);
        let b = CallArgs::new().arg("hooks").named("id", &42);
        assert_eq!(make("app::lookup", &a, "lookup"), make("app::lookup", &b, "lookup"));
    }

    #[test]
    fn test_named_argument_order_does_not_matter() {
        let a = CallArgs::new().named("id", &42).named("lang", "en");
        let b = CallArgs::new().named("lang", "en").named("id", &42);
        assert_eq!(make("app::lookup", &a, "lookup"), make("app::lookup", &b, "lookup"));
    }

    #[test]
    fn test_nested_object_field_order_does_not_matter() {
        let mut first = HashMap::new();
        first.insert("b", 2);
        first.insert("a", 1);
        let mut second = HashMap::new();
        second.insert("a", 1);
        second.insert("b", 2);

        let a = CallArgs::new().arg(&first);
        let b = CallArgs::new().arg(&second);
        assert_eq!(make("app::f", &a, "f"), make("app::f", &b, "f"));
    }

    #[test]
    fn test_positional_order_matters() {
        let a = CallArgs::new().arg(&1).arg(&2);
        let b = CallArgs::new().arg(&2).arg(&1);
        assert_ne!(make("app::f", &a, "f"), make("app::f", &b, "f"));
    }

    #[test]
    fn test_distinct_arguments_distinct_keys() {
        let mut seen = HashSet::new();
        for id in 0..500u32 {
            let key = make("app::lookup", &CallArgs::new().named("id", &id), "lookup");
            assert!(seen.insert(key), "collision for id {}", id);
        }

        let by_struct = make(
            "app::search",
            &CallArgs::new().arg(&Filter { section: "plugin".into(), limit: 5 }),
            "search",
        );
        let by_other_struct = make(
            "app::search",
            &CallArgs::new().arg(&Filter { section: "theme".into(), limit: 5 }),
            "search",
        );
        assert_ne!(by_struct, by_other_struct);
    }

    #[test]
    fn test_type_distinguishes_keys() {
        let number = make("app::f", &CallArgs::new().arg(&42), "f");
        let string = make("app::f", &CallArgs::new().arg("42"), "f");
        assert_ne!(number, string);
    }

    #[test]
    fn test_identity_distinguishes_keys() {
        let args = CallArgs::new().named("id", &1);
        assert_ne!(make("app::a", &args, "shared"), make("app::b", &args, "shared"));
    }

    #[test]
    fn test_excluded_arguments_do_not_affect_key() {
        let a = CallArgs::new()
            .named("id", &42)
            .named("request_id", "req-1")
            .excluding(&["request_id"]);
        let b = CallArgs::new()
            .named("id", &42)
            .named("request_id", "req-2")
            .excluding(&["request_id"]);
        assert_eq!(make("app::lookup", &a, "lookup"), make("app::lookup", &b, "lookup"));
    }

    #[test]
    fn test_unsupported_argument_rejected() {
        let mut bad: BTreeMap<Vec<u8>, u32> = BTreeMap::new();
        bad.insert(vec![1, 2], 3);

        let args = CallArgs::new().named("id", &1).named("blob", &bad);
        let result = DefaultKeyMaker.make("app::f", &args, "f");
        assert!(matches!(result, Err(CacheError::Key(_))));
    }

    #[test]
    fn test_excluding_unsupported_argument_clears_error() {
        let mut bad: BTreeMap<Vec<u8>, u32> = BTreeMap::new();
        bad.insert(vec![1, 2], 3);

        let args = CallArgs::new()
            .named("id", &1)
            .named("ctx", &bad)
            .excluding(&["ctx"]);
        assert!(DefaultKeyMaker.make("app::f", &args, "f").is_ok());
    }

    #[test]
    fn test_non_finite_floats_rejected() {
        let none = make("app::f", &CallArgs::new().arg(&Option::<f64>::None), "f");

        for value in [f64::INFINITY, f64::NEG_INFINITY, f64::NAN] {
            let result = DefaultKeyMaker.make("app::f", &CallArgs::new().arg(&value), "f");
            assert!(matches!(result, Err(CacheError::Key(_))), "{} accepted", value);

            let nested = CallArgs::new().named("weights", &vec![0.5, value]);
            assert!(DefaultKeyMaker.make("app::f", &nested, "f").is_err());
        }

        assert!(none.starts_with("f:"));
        assert_ne!(none, make("app::f", &CallArgs::new().arg(&0.0f64), "f"));
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let result = DefaultKeyMaker.make("app::f", &CallArgs::new(), "");
        assert!(result.is_err());
    }

    #[test]
    fn test_sweep_pattern() {
        assert_eq!(sweep_pattern("lookup"), "lookup:");
        assert_eq!(sweep_pattern("lookup:"), "lookup:");
    }
}
