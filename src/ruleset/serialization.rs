//! Order-preserving deserialization of rule set documents
//!
//! JSON and YAML maps are read into [`RawValue`] without collapsing duplicate
//! keys, so the loader can report them instead of keeping the last entry.

use serde::de::{Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};
use std::fmt;

/// Loosely typed document node, with maps kept as ordered entry lists
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Null,
    Bool(bool),
    Number(String),
    Text(String),
    Seq(Vec<RawValue>),
    Map(Vec<(String, RawValue)>),
}

impl RawValue {
    /// Short type name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Null => "null",
            RawValue::Bool(_) => "boolean",
            RawValue::Number(_) => "number",
            RawValue::Text(_) => "string",
            RawValue::Seq(_) => "sequence",
            RawValue::Map(_) => "mapping",
        }
    }

    /// Look up the first entry with the given key in a map node
    pub fn field(&self, key: &str) -> Option<&RawValue> {
        match self {
            RawValue::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for RawValue {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RawValueVisitor)
    }
}

struct RawValueVisitor;

impl<'de> Visitor<'de> for RawValueVisitor {
    type Value = RawValue;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a rule set document node")
    }

    fn visit_unit<E>(self) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Null)
    }

    fn visit_none<E>(self) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Null)
    }

    fn visit_some<D>(self, deserializer: D) -> std::result::Result<RawValue, D::Error>
    where
        D: Deserializer<'de>,
    {
        RawValue::deserialize(deserializer)
    }

    fn visit_bool<E>(self, value: bool) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Bool(value))
    }

    fn visit_i64<E>(self, value: i64) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Number(value.to_string()))
    }

    fn visit_u64<E>(self, value: u64) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Number(value.to_string()))
    }

    fn visit_f64<E>(self, value: f64) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Number(value.to_string()))
    }

    fn visit_str<E>(self, value: &str) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Text(value.to_string()))
    }

    fn visit_string<E>(self, value: String) -> std::result::Result<RawValue, E> {
        Ok(RawValue::Text(value))
    }

    fn visit_seq<A>(self, mut seq: A) -> std::result::Result<RawValue, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element::<RawValue>()? {
            items.push(item);
        }
        Ok(RawValue::Seq(items))
    }

    fn visit_map<M>(self, mut map: M) -> std::result::Result<RawValue, M::Error>
    where
        M: MapAccess<'de>,
    {
        let mut entries = Vec::new();
        while let Some(key) = map.next_key::<String>()? {
            let value = map.next_value::<RawValue>()?;
            entries.push((key, value));
        }
        Ok(RawValue::Map(entries))
    }
}
