//! Snapshot and restore of settled state.
//!
//! [`ContainerState`] is a plain serializable mirror of a fully
//! settled tree plus the alias table. Exporting settles everything;
//! loading installs the values as already settled, so a restored
//! container behaves like the one that was exported, layering closed.
//! Objects and lazy entries have no serial form and refuse to export.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::container::Container;
use crate::entry::{Entry, EntryMap};
use crate::error::{ContainerError, Result};
use crate::value::{Value, ValueMap};

/// Serializable snapshot of a settled container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerState {
    pub entries: IndexMap<String, StateValue>,
    pub aliases: IndexMap<String, String>,
}

/// A settled value in its serial form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StateValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Map(IndexMap<String, StateValue>),
}

impl Container {
    /// Settles the whole tree and exports it with the alias table.
    pub fn export_state(&self) -> Result<ContainerState> {
        let root = self.get("")?;
        let Some(map) = root.as_map() else {
            unreachable!("the root always settles to a map");
        };
        let delimiter = self.options().delimiter.clone();
        let mut entries = IndexMap::new();
        for (key, value) in map {
            entries.insert(key.clone(), to_state(key, value, &delimiter)?);
        }
        debug!(keys = entries.len(), "export state");
        Ok(ContainerState { entries, aliases: self.aliases_snapshot() })
    }

    /// Restores an exported snapshot: aliases register, values merge
    /// in and every id is marked settled.
    pub fn load_state(&self, state: ContainerState) -> Result<()> {
        debug!(keys = state.entries.len(), "load state");
        for (alias, id) in &state.aliases {
            self.restore_alias(alias, id)?;
        }
        let mut tree = EntryMap::new();
        for (key, value) in &state.entries {
            tree.insert(key.clone(), to_entry(value));
        }
        self.extend(tree)?;
        let delimiter = self.options().delimiter.clone();
        for (key, value) in &state.entries {
            restore_settled(self, key, value, &delimiter);
        }
        Ok(())
    }
}

fn to_state(id: &str, value: &Value, delimiter: &str) -> Result<StateValue> {
    match value {
        Value::Null => Ok(StateValue::Null),
        Value::Bool(b) => Ok(StateValue::Bool(*b)),
        Value::Int(i) => Ok(StateValue::Int(*i)),
        Value::Float(f) => Ok(StateValue::Float(*f)),
        Value::Str(s) => Ok(StateValue::Str(s.clone())),
        Value::Map(map) => {
            let mut out = IndexMap::new();
            for (key, child) in map {
                let child_id = format!("{id}{delimiter}{key}");
                out.insert(key.clone(), to_state(&child_id, child, delimiter)?);
            }
            Ok(StateValue::Map(out))
        }
        Value::Object(_) => {
            Err(ContainerError::UnsupportedState { id: id.to_string(), kind: "object" })
        }
    }
}

fn to_value(state: &StateValue) -> Value {
    match state {
        StateValue::Null => Value::Null,
        StateValue::Bool(b) => Value::Bool(*b),
        StateValue::Int(i) => Value::Int(*i),
        StateValue::Float(f) => Value::Float(*f),
        StateValue::Str(s) => Value::Str(s.clone()),
        StateValue::Map(map) => {
            let mut out = ValueMap::new();
            for (key, child) in map {
                out.insert(key.clone(), to_value(child));
            }
            Value::Map(out)
        }
    }
}

fn to_entry(state: &StateValue) -> Entry {
    match state {
        StateValue::Map(map) => {
            let mut out = EntryMap::new();
            for (key, child) in map {
                out.insert(key.clone(), to_entry(child));
            }
            Entry::Map(out)
        }
        scalar => Entry::Value(to_value(scalar)),
    }
}

fn restore_settled(container: &Container, id: &str, state: &StateValue, delimiter: &str) {
    container.install_settled(id, to_value(state));
    if let StateValue::Map(map) = state {
        for (key, child) in map {
            restore_settled(container, &format!("{id}{delimiter}{key}"), child, delimiter);
        }
    }
}
