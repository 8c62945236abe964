//! Tagged field values shared by desired and remote state.
//!
//! Every attribute handled by the engine is one of five shapes: string,
//! boolean, integer, nested object, or set-of-values. Sets carry structural,
//! order-insensitive equality and a canonical ordering so that serialising a
//! decoded set reproduces an equivalent wire representation.

use std::collections::BTreeMap;

use serde::de::Deserializer;
use serde::ser::{SerializeSeq, Serializer};
use serde::{Deserialize, Serialize};

/// Semantic type of a field, used by specs and codecs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    /// UTF-8 string value.
    Str,
    /// Boolean value.
    Bool,
    /// Signed 64-bit integer value.
    Int,
    /// Nested object with string keys.
    Object,
    /// Unordered, content-deduplicated collection.
    Set,
}

impl FieldKind {
    /// Human-readable name used in error messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Str => "string",
            Self::Bool => "bool",
            Self::Int => "integer",
            Self::Object => "object",
            Self::Set => "set",
        }
    }
}

/// A single attribute value in user-facing shape.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// Boolean value.
    Bool(bool),
    /// Signed integer value.
    Int(i64),
    /// String value.
    Str(String),
    /// Unordered collection with content-based identity.
    Set(FieldSet),
    /// Nested object keyed by attribute name.
    Object(BTreeMap<String, FieldValue>),
}

impl FieldValue {
    /// Returns the kind tag for this value.
    #[must_use]
    pub const fn kind(&self) -> FieldKind {
        match self {
            Self::Str(_) => FieldKind::Str,
            Self::Bool(_) => FieldKind::Bool,
            Self::Int(_) => FieldKind::Int,
            Self::Object(_) => FieldKind::Object,
            Self::Set(_) => FieldKind::Set,
        }
    }

    /// Reports whether this value is its type's zero/empty value.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        match self {
            Self::Str(s) => s.is_empty(),
            Self::Bool(b) => !b,
            Self::Int(n) => *n == 0,
            Self::Object(map) => map.is_empty(),
            Self::Set(set) => set.is_empty(),
        }
    }

    /// Returns the zero value for the given kind.
    #[must_use]
    pub fn zero(kind: FieldKind) -> Self {
        match kind {
            FieldKind::Str => Self::Str(String::new()),
            FieldKind::Bool => Self::Bool(false),
            FieldKind::Int => Self::Int(0),
            FieldKind::Object => Self::Object(BTreeMap::new()),
            FieldKind::Set => Self::Set(FieldSet::new()),
        }
    }

    /// Deterministic rendering used for set identity and canonical ordering.
    ///
    /// Objects serialise with sorted keys and sets in canonical order, so two
    /// structurally equal values always produce the same key.
    #[must_use]
    pub fn content_key(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Unordered collection of values, deduplicated by content.
///
/// Items are held in canonical order (by content key), which gives structural
/// equality regardless of insertion order and a stable serialisation.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FieldSet {
    items: Vec<FieldValue>,
}

impl FieldSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Inserts a value, returning `false` when an equal value was already
    /// present.
    pub fn insert(&mut self, value: FieldValue) -> bool {
        let key = value.content_key();
        match self
            .items
            .binary_search_by(|item| item.content_key().cmp(&key))
        {
            Ok(_) => false,
            Err(position) => {
                self.items.insert(position, value);
                true
            }
        }
    }

    /// Reports whether the set holds a structurally equal value.
    #[must_use]
    pub fn contains(&self, value: &FieldValue) -> bool {
        let key = value.content_key();
        self.items
            .binary_search_by(|item| item.content_key().cmp(&key))
            .is_ok()
    }

    /// Number of distinct values in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Reports whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates values in canonical order.
    pub fn iter(&self) -> std::slice::Iter<'_, FieldValue> {
        self.items.iter()
    }
}

impl FromIterator<FieldValue> for FieldSet {
    fn from_iter<I: IntoIterator<Item = FieldValue>>(iter: I) -> Self {
        let mut set = Self::new();
        for value in iter {
            set.insert(value);
        }
        set
    }
}

impl<'a> IntoIterator for &'a FieldSet {
    type Item = &'a FieldValue;
    type IntoIter = std::slice::Iter<'a, FieldValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl Serialize for FieldSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.items.len()))?;
        for item in &self.items {
            seq.serialize_element(item)?;
        }
        seq.end()
    }
}

impl<'de> Deserialize<'de> for FieldSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let items = Vec::<FieldValue>::deserialize(deserializer)?;
        Ok(items.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn network(url: &str) -> FieldValue {
        let mut map = BTreeMap::new();
        map.insert(String::from("network_url"), FieldValue::from(url));
        FieldValue::Object(map)
    }

    #[test]
    fn sets_compare_equal_regardless_of_insertion_order() {
        let forward: FieldSet = [network("a"), network("b"), network("c")]
            .into_iter()
            .collect();
        let reversed: FieldSet = [network("c"), network("b"), network("a")]
            .into_iter()
            .collect();
        assert_eq!(forward, reversed);
    }

    #[test]
    fn sets_deduplicate_by_content() {
        let mut set = FieldSet::new();
        assert!(set.insert(network("a")));
        assert!(!set.insert(network("a")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn set_serialisation_uses_canonical_order() {
        let set: FieldSet = [network("z"), network("a")].into_iter().collect();
        let rendered =
            serde_json::to_string(&set).unwrap_or_else(|err| panic!("serialise set: {err}"));
        let a = rendered.find("\"a\"").unwrap_or_else(|| panic!("missing a"));
        let z = rendered.find("\"z\"").unwrap_or_else(|| panic!("missing z"));
        assert!(a < z, "canonical order should sort by content: {rendered}");
    }

    #[rstest]
    #[case(FieldValue::Str(String::new()), true)]
    #[case(FieldValue::from("svc1"), false)]
    #[case(FieldValue::Bool(false), true)]
    #[case(FieldValue::Bool(true), false)]
    #[case(FieldValue::Int(0), true)]
    #[case(FieldValue::Int(10), false)]
    #[case(FieldValue::Object(BTreeMap::new()), true)]
    #[case(FieldValue::Set(FieldSet::new()), true)]
    fn zero_values_are_detected(#[case] value: FieldValue, #[case] expected: bool) {
        assert_eq!(value.is_zero(), expected);
    }

    #[test]
    fn values_round_trip_through_serde() {
        let mut object = BTreeMap::new();
        object.insert(String::from("enable_logging"), FieldValue::Bool(true));
        object.insert(String::from("timeout_sec"), FieldValue::Int(10));
        let value = FieldValue::Object(object);

        let rendered =
            serde_json::to_string(&value).unwrap_or_else(|err| panic!("serialise: {err}"));
        let parsed: FieldValue =
            serde_json::from_str(&rendered).unwrap_or_else(|err| panic!("parse: {err}"));
        assert_eq!(parsed, value);
    }
}
