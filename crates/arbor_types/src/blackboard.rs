//! Named, type-checked variable store shared by a graph and its tasks

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

use crate::value::{Variant, VariantKind};

/// Variable store a running graph reads and writes
///
/// Variables are held as [`Variant`]s. The typed accessors check the stored
/// type on every read; a present variable of the wrong type is reported and
/// treated as absent rather than coerced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Blackboard {
    /// Display name, shown in diagnostics
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    variables: HashMap<String, Variant>,
}

impl Blackboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            variables: HashMap::new(),
        }
    }

    /// Insert or overwrite a variable
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Variant>) {
        self.variables.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Variant> {
        self.variables.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Variant> {
        self.variables.get_mut(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Variant> {
        self.variables.remove(name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Variant)> {
        self.variables.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Type-checked read
    ///
    /// Returns `None` when the variable is absent or holds a different type.
    /// The mismatch case is logged with the variable name and both types.
    pub fn read<T: VariantKind>(&self, name: &str) -> Option<T> {
        let value = self.variables.get(name)?;
        match T::from_variant(value) {
            Some(v) => Some(v),
            None => {
                warn!(
                    blackboard = %self.name,
                    variable = %name,
                    stored = %value.type_name(),
                    requested = %T::KIND,
                    "type mismatch reading blackboard variable"
                );
                None
            }
        }
    }

    /// Typed write
    pub fn write<T: VariantKind>(&mut self, name: impl Into<String>, value: T) {
        self.variables.insert(name.into(), value.into_variant());
    }

    /// Serialize the whole store to pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Restore a store from JSON produced by [`Blackboard::to_json`]
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
