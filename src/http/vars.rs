//! Path variables.
//!
//! Named placeholders captured by the path matcher (`/users/{id}`), keyed
//! by placeholder name. Values arrive as strings from the matcher but may
//! be any JSON scalar when set by hand through [`Vars::set`].
//!
//! # Design Decisions
//! - Numeric accessors coerce strings by parsing; parse failures and
//!   out-of-range values yield `None` instead of an error
//! - Floats truncate toward zero before the range check
//! - Every accessor has an `_or` form returning an explicit default

use std::collections::HashMap;
use std::str::FromStr;

use serde_json::Value;

/// Per-request mapping of path placeholder names to values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Vars {
    values: HashMap<String, Value>,
}

impl Vars {
    /// Create an empty set of variables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous one.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Raw stored value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn int(&self, key: &str) -> Option<isize> {
        self.number(key)
    }

    pub fn int_or(&self, key: &str, default: isize) -> isize {
        self.int(key).unwrap_or(default)
    }

    pub fn int32(&self, key: &str) -> Option<i32> {
        self.number(key)
    }

    pub fn int32_or(&self, key: &str, default: i32) -> i32 {
        self.int32(key).unwrap_or(default)
    }

    pub fn int64(&self, key: &str) -> Option<i64> {
        self.number(key)
    }

    pub fn int64_or(&self, key: &str, default: i64) -> i64 {
        self.int64(key).unwrap_or(default)
    }

    pub fn uint(&self, key: &str) -> Option<usize> {
        self.number(key)
    }

    pub fn uint_or(&self, key: &str, default: usize) -> usize {
        self.uint(key).unwrap_or(default)
    }

    pub fn uint32(&self, key: &str) -> Option<u32> {
        self.number(key)
    }

    pub fn uint32_or(&self, key: &str, default: u32) -> u32 {
        self.uint32(key).unwrap_or(default)
    }

    pub fn uint64(&self, key: &str) -> Option<u64> {
        self.number(key)
    }

    pub fn uint64_or(&self, key: &str, default: u64) -> u64 {
        self.uint64(key).unwrap_or(default)
    }

    /// Textual form of the value. Strings are returned as-is, other
    /// scalars in their JSON rendering.
    pub fn string(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|value| match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    pub fn string_or(&self, key: &str, default: &str) -> String {
        self.string(key).unwrap_or_else(|| default.to_string())
    }

    fn number<T>(&self, key: &str) -> Option<T>
    where
        T: TryFrom<i64> + TryFrom<u64> + FromStr,
    {
        match self.values.get(key)? {
            Value::Number(n) => {
                if let Some(u) = n.as_u64() {
                    <T as TryFrom<u64>>::try_from(u).ok()
                } else if let Some(i) = n.as_i64() {
                    <T as TryFrom<i64>>::try_from(i).ok()
                } else {
                    n.as_f64()
                        .and_then(|f| <T as TryFrom<i64>>::try_from(f.trunc() as i64).ok())
                }
            }
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Vars {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut vars = Vars::new();
        for (k, v) in iter {
            vars.set(k, v);
        }
        vars
    }
}
