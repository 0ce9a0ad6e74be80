//! Memoization fingerprints.
//!
//! A view opts into memoization by returning its dependencies from
//! [`View::dependencies`](crate::View::dependencies). The engine folds them
//! together with the view's id into a single fingerprint and skips the rebuild
//! when it matches the previous one.

use alloc::string::String;
use core::hash::{Hash, Hasher};
use std::hash::DefaultHasher;

use serde::Serialize;
use serde_json::Value;

/// A single declared dependency value.
#[derive(Debug, Clone, PartialEq)]
pub enum Dep {
    /// Absent value, ignored when hashing.
    Null,
    /// A boolean.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// An unsigned integer.
    UInt(u64),
    /// A float, hashed by bit pattern.
    Float(f64),
    /// Text, hashed with [`stable_hash`].
    Text(String),
    /// A composite value, hashed through its JSON text.
    Json(Value),
}

impl Dep {
    /// Captures any serializable value as a composite dependency.
    ///
    /// Values that fail to serialize collapse to [`Dep::Null`].
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Self {
        serde_json::to_value(value).map_or(Self::Null, Self::Json)
    }
}

dep_from!(Int(i64): i8, i16, i32, i64);
dep_from!(UInt(u64): u8, u16, u32, u64);
dep_from!(Float(f64): f32, f64);

impl From<usize> for Dep {
    fn from(value: usize) -> Self {
        Self::UInt(value as u64)
    }
}

impl From<bool> for Dep {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for Dep {
    fn from(value: &str) -> Self {
        Self::Text(value.into())
    }
}

impl From<String> for Dep {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Value> for Dep {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

impl<T: Into<Self>> From<Option<T>> for Dep {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Java-style string hash over UTF-16 code units, stable across processes.
#[must_use]
pub fn stable_hash(text: &str) -> i32 {
    text.encode_utf16()
        .fold(23_i32, |h, c| h.wrapping_mul(31).wrapping_add(i32::from(c)))
}

/// Folds a view's id and its dependencies into one comparable fingerprint.
#[must_use]
pub fn compute_memo_hash(id: &str, deps: &[Dep]) -> u64 {
    let mut hasher = DefaultHasher::new();
    stable_hash(id).hash(&mut hasher);
    for dep in deps {
        match dep {
            Dep::Null => continue,
            Dep::Bool(value) => (0_u8, value).hash(&mut hasher),
            Dep::Int(value) => (1_u8, value).hash(&mut hasher),
            Dep::UInt(value) => (2_u8, value).hash(&mut hasher),
            Dep::Float(value) => (3_u8, value.to_bits()).hash(&mut hasher),
            Dep::Text(text) => (4_u8, stable_hash(text)).hash(&mut hasher),
            Dep::Json(value) => (5_u8, stable_hash(&value.to_string())).hash(&mut hasher),
        }
    }
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stable_hash_matches_known_values() {
        assert_eq!(stable_hash(""), 23);
        assert_eq!(stable_hash("a"), 23 * 31 + 97);
    }

    #[test]
    fn equal_dependencies_hash_equal() {
        let deps = [Dep::from(1), Dep::from("title"), Dep::json(&[1, 2, 3])];
        assert_eq!(
            compute_memo_hash("abc", &deps),
            compute_memo_hash("abc", &deps.clone())
        );
    }

    #[test]
    fn differing_dependency_changes_hash() {
        let first = [Dep::from(1_700_000_000_000_i64), Dep::from("x")];
        let second = [Dep::from(1_700_000_000_001_i64), Dep::from("x")];
        assert_ne!(
            compute_memo_hash("abc", &first),
            compute_memo_hash("abc", &second)
        );
    }

    #[test]
    fn id_participates_in_hash() {
        let deps = [Dep::from(true)];
        assert_ne!(compute_memo_hash("a", &deps), compute_memo_hash("b", &deps));
    }

    #[test]
    fn nulls_are_skipped() {
        let none: Option<i32> = None;
        assert_eq!(
            compute_memo_hash("abc", &[Dep::from(3), Dep::from(none)]),
            compute_memo_hash("abc", &[Dep::from(3)])
        );
    }

    #[test]
    fn composite_values_hash_by_content() {
        let a = Dep::json(&json!({"name": "x", "tags": ["a"]}));
        let b = Dep::json(&json!({"name": "x", "tags": ["b"]}));
        assert_ne!(
            compute_memo_hash("id", &[a.clone()]),
            compute_memo_hash("id", &[b])
        );
        assert_eq!(
            compute_memo_hash("id", &[a.clone()]),
            compute_memo_hash("id", &[a])
        );
    }
}
