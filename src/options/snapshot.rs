use std::collections::BTreeMap;
use std::fmt;

use serde::ser::SerializeMap;
use serde::Serialize;
use serde::Serializer;

use super::StagedConfig;

/// Typed value of one scalar option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for Value {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Value::Str(s) => write!(f, "{s}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Bool(b) => write!(f, "{b}"),
        }
    }
}

/// Members of one group option, ordered by member name
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Group {
    members: BTreeMap<String, String>,
}

impl From<BTreeMap<String, String>> for Group {
    fn from(members: BTreeMap<String, String>) -> Self {
        Self { members }
    }
}

impl Group {
    pub fn get(
        &self,
        member: &str,
    ) -> Option<&str> {
        self.members.get(member).map(String::as_str)
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.members.clone()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.members.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

/// Immutable, validated configuration snapshot.
///
/// Accessors never fail: an option that is unset or of another type reads as the zero
/// value of the requested type. Serializes as one flat JSON object, groups as nested
/// objects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Options {
    values: BTreeMap<String, Value>,
    groups: BTreeMap<String, Group>,

    /// Staged values this snapshot was applied from
    raw: StagedConfig,
}

impl Options {
    pub(crate) fn new(
        values: BTreeMap<String, Value>,
        groups: BTreeMap<String, Group>,
        raw: StagedConfig,
    ) -> Self {
        Self { values, groups, raw }
    }

    pub fn get(
        &self,
        name: &str,
    ) -> Option<&Value> {
        self.values.get(name)
    }

    pub fn is_set(
        &self,
        name: &str,
    ) -> bool {
        self.values.contains_key(name)
    }

    pub fn string(
        &self,
        name: &str,
    ) -> String {
        match self.values.get(name) {
            Some(Value::Str(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }

    pub fn int(
        &self,
        name: &str,
    ) -> i64 {
        match self.values.get(name) {
            Some(Value::Int(i)) => *i,
            _ => 0,
        }
    }

    pub fn bool(
        &self,
        name: &str,
    ) -> bool {
        matches!(self.values.get(name), Some(Value::Bool(true)))
    }

    /// Members of a group option; empty when undeclared
    pub fn group(
        &self,
        name: &str,
    ) -> Group {
        self.groups.get(name).cloned().unwrap_or_default()
    }

    /// Deep copy of the raw values, the starting point of the next staged batch
    pub fn to_staged(&self) -> StagedConfig {
        self.raw.clone()
    }
}

impl Serialize for Options {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + self.groups.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        for (name, group) in &self.groups {
            map.serialize_entry(name, group)?;
        }
        map.end()
    }
}
