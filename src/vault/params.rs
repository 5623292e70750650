//! Request parameters assembled from host configuration values.
//!
//! The host hands over attributes that may be null or not yet known. Only
//! meaningful values end up in a [`ParameterBag`]; everything else is left out
//! so the server applies its own defaults.

use serde::Serialize;
use std::collections::BTreeMap;

/// A typed configuration attribute as seen by the host framework.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ConfigValue<T> {
    #[default]
    Null,
    Unknown,
    Known(T),
}

impl<T> ConfigValue<T> {
    /// Maps an optional flag or argument: absent means null.
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(ConfigValue::Null, ConfigValue::Known)
    }

    pub fn known(&self) -> Option<&T> {
        match self {
            ConfigValue::Known(value) => Some(value),
            ConfigValue::Null | ConfigValue::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, ConfigValue::Known(_))
    }
}

impl<T> From<T> for ConfigValue<T> {
    fn from(value: T) -> Self {
        ConfigValue::Known(value)
    }
}

impl From<&str> for ConfigValue<String> {
    fn from(value: &str) -> Self {
        ConfigValue::Known(value.to_string())
    }
}

/// A single request parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    Str(String),
    Int(i64),
    Bool(bool),
    IntList(Vec<i64>),
}

impl ParamValue {
    /// Unwraps host-typed ids into a plain list, dropping null and unknown entries.
    pub fn id_list(ids: &[ConfigValue<i64>]) -> Self {
        ParamValue::IntList(ids.iter().filter_map(|id| id.known().copied()).collect())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<Vec<i64>> for ParamValue {
    fn from(value: Vec<i64>) -> Self {
        ParamValue::IntList(value)
    }
}

/// Sparse, order-irrelevant set of request inputs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParameterBag {
    entries: BTreeMap<String, ParamValue>,
}

impl ParameterBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `value` under `key` when it is known.
    ///
    /// Strings are only added when non-empty. Integers and booleans are added
    /// whenever known, zero and `false` included.
    pub fn set<T>(&mut self, key: &str, value: &ConfigValue<T>) -> &mut Self
    where
        T: Clone + Into<ParamValue>,
    {
        if let Some(known) = value.known() {
            let param: ParamValue = known.clone().into();
            let keep = match &param {
                ParamValue::Str(s) => !s.is_empty(),
                ParamValue::Int(_) | ParamValue::Bool(_) | ParamValue::IntList(_) => true,
            };
            if keep {
                self.entries.insert(key.to_string(), param);
            }
        }
        self
    }

    /// Adds a boolean only when it is known and `true`.
    pub fn set_flag(&mut self, key: &str, value: &ConfigValue<bool>) -> &mut Self {
        if let Some(true) = value.known() {
            self.entries.insert(key.to_string(), ParamValue::Bool(true));
        }
        self
    }

    /// Adds an id list, always present even when every entry was dropped.
    pub fn set_ids(&mut self, key: &str, ids: &[ConfigValue<i64>]) -> &mut Self {
        self.entries.insert(key.to_string(), ParamValue::id_list(ids));
        self
    }

    /// Inserts a value unconditionally.
    pub fn insert(&mut self, key: &str, value: impl Into<ParamValue>) -> &mut Self {
        self.entries.insert(key.to_string(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}
