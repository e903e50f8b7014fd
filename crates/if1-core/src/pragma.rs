//! Two-character pragma annotations.
//!
//! Types, nodes, graphs and both kinds of port carry a small map of
//! annotations keyed by exactly two characters (`na` = name, `sl` = source
//! line, ...). Pragmas are written after a record as ` %key=value`, sorted by
//! key.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// The reserved key for human-readable names.
pub const NAME_KEY: &str = "na";

/// A pragma value: either an integer or free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PragmaValue {
    Int(i64),
    Str(String),
}

impl PragmaValue {
    /// Interprets raw record text, preferring an integer reading.
    pub fn parse(text: &str) -> PragmaValue {
        match text.parse::<i64>() {
            Ok(n) => PragmaValue::Int(n),
            Err(_) => PragmaValue::Str(text.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            PragmaValue::Str(s) => Some(s),
            PragmaValue::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PragmaValue::Int(n) => Some(*n),
            PragmaValue::Str(_) => None,
        }
    }
}

impl fmt::Display for PragmaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PragmaValue::Int(n) => write!(f, "{}", n),
            PragmaValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for PragmaValue {
    fn from(n: i64) -> Self {
        PragmaValue::Int(n)
    }
}

impl From<i32> for PragmaValue {
    fn from(n: i32) -> Self {
        PragmaValue::Int(n as i64)
    }
}

impl From<&str> for PragmaValue {
    fn from(s: &str) -> Self {
        PragmaValue::Str(s.to_string())
    }
}

impl From<String> for PragmaValue {
    fn from(s: String) -> Self {
        PragmaValue::Str(s)
    }
}

/// An ordered map of two-character keys to [`PragmaValue`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pragmas {
    entries: BTreeMap<String, PragmaValue>,
}

fn check_key(key: &str) -> Result<(), CoreError> {
    if key.chars().count() != 2 {
        return Err(CoreError::InvalidPragmaKey {
            key: key.to_string(),
        });
    }
    Ok(())
}

impl Pragmas {
    pub fn new() -> Self {
        Pragmas::default()
    }

    pub fn get(&self, key: &str) -> Option<&PragmaValue> {
        self.entries.get(key)
    }

    /// Sets `key` to `value`, replacing any previous value.
    ///
    /// Returns [`CoreError::InvalidPragmaKey`] unless `key` is exactly two
    /// characters.
    pub fn set(&mut self, key: &str, value: impl Into<PragmaValue>) -> Result<(), CoreError> {
        check_key(key)?;
        self.entries.insert(key.to_string(), value.into());
        Ok(())
    }

    /// Removes `key`, returning its previous value if there was one.
    pub fn remove(&mut self, key: &str) -> Result<Option<PragmaValue>, CoreError> {
        check_key(key)?;
        Ok(self.entries.remove(key))
    }

    /// The `na` pragma when it holds text.
    pub fn name(&self) -> Option<&str> {
        self.entries.get(NAME_KEY).and_then(PragmaValue::as_str)
    }

    /// Sets or (with `None`) deletes the `na` pragma.
    pub fn set_name(&mut self, name: Option<&str>) {
        match name {
            Some(n) => {
                self.entries
                    .insert(NAME_KEY.to_string(), PragmaValue::Str(n.to_string()));
            }
            None => {
                self.entries.remove(NAME_KEY);
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PragmaValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Merges the pragmas of both ends of a wire.
    ///
    /// The consumer side wins on shared keys, except `na`, which is taken from
    /// the producer whenever the producer has one.
    pub fn merge_edge(src: &Pragmas, dst: &Pragmas) -> Pragmas {
        let mut entries = src.entries.clone();
        for (k, v) in &dst.entries {
            if k == NAME_KEY && src.entries.contains_key(NAME_KEY) {
                continue;
            }
            entries.insert(k.clone(), v.clone());
        }
        Pragmas { entries }
    }
}

/// Renders as ` %key=value` per entry, the suffix form used on every record.
impl fmt::Display for Pragmas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, v) in &self.entries {
            write!(f, " %{}={}", k, v)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_must_be_two_characters() {
        let mut p = Pragmas::new();
        assert!(p.set("aa", 1).is_ok());
        match p.set("aaa", 20) {
            Err(CoreError::InvalidPragmaKey { key }) => assert_eq!(key, "aaa"),
            other => panic!("expected InvalidPragmaKey, got {:?}", other),
        }
        assert!(matches!(
            p.set("a", "x"),
            Err(CoreError::InvalidPragmaKey { .. })
        ));
        assert!(p.remove("abc").is_err());
    }

    #[test]
    fn rendering_is_sorted_by_key() {
        let mut p = Pragmas::new();
        p.set("xx", 20).unwrap();
        p.set("aa", 1).unwrap();
        p.set_name(Some("integer"));
        p.set("cc", 3).unwrap();
        assert_eq!(p.to_string(), " %aa=1 %cc=3 %na=integer %xx=20");
    }

    #[test]
    fn name_tracks_na() {
        let mut p = Pragmas::new();
        assert_eq!(p.name(), None);
        p.set("na", "x").unwrap();
        assert_eq!(p.name(), Some("x"));
        p.set_name(None);
        assert!(!p.contains("na"));
    }

    #[test]
    fn parse_prefers_integers() {
        assert_eq!(PragmaValue::parse("10"), PragmaValue::Int(10));
        assert_eq!(PragmaValue::parse("-3"), PragmaValue::Int(-3));
        assert_eq!(PragmaValue::parse("bar"), PragmaValue::Str("bar".into()));
    }

    #[test]
    fn edge_merge_prefers_destination_except_name() {
        let mut src = Pragmas::new();
        src.set("mk", "Q").unwrap();
        src.set("na", "y").unwrap();
        src.set("zz", "shared").unwrap();

        let mut dst = Pragmas::new();
        dst.set("mk", "Z").unwrap();
        dst.set("na", "ignored").unwrap();

        let merged = Pragmas::merge_edge(&src, &dst);
        assert_eq!(merged.to_string(), " %mk=Z %na=y %zz=shared");

        // Without a producer name the consumer's name survives.
        let mut bare = Pragmas::new();
        bare.set("zz", 10).unwrap();
        let merged = Pragmas::merge_edge(&bare, &dst);
        assert_eq!(merged.name(), Some("ignored"));
    }
}
