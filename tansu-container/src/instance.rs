//! Instance construction.
//!
//! Instances are built in two phases. `instance` allocates the object
//! shell immediately and registers a continuation keyed by the shell's
//! allocation id; the continuation runs the constructor later, when
//! the entry holding the object settles. This is what lets two
//! services depend on each other: both shells exist before either
//! constructor asks the container for the other.

use std::cell::RefCell;
use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::debug;

use crate::container::Container;
use crate::entry::Entry;
use crate::error::{ContainerError, Result};
use crate::resolve::{resolve_injection, Injection};
use crate::value::{ObjectRef, Value, ValueMap};

/// Explicit constructor arguments, by position and/or by name.
///
/// Values are raw entries, so an argument can itself be lazy and is
/// only evaluated when the constructor actually runs.
#[derive(Clone, Default)]
pub struct Args {
    by_pos: HashMap<usize, Entry>,
    by_name: IndexMap<String, Entry>,
}

impl Args {
    pub fn new() -> Args {
        Args::default()
    }

    /// Supplies the argument at `pos` (zero-based).
    pub fn at(mut self, pos: usize, entry: impl Into<Entry>) -> Args {
        self.by_pos.insert(pos, entry.into());
        self
    }

    /// Supplies the argument named `name`.
    pub fn named(mut self, name: impl Into<String>, entry: impl Into<Entry>) -> Args {
        self.by_name.insert(name.into(), entry.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.by_pos.is_empty() && self.by_name.is_empty()
    }

    fn get(&self, pos: usize, name: &str) -> Option<&Entry> {
        self.by_pos.get(&pos).or_else(|| self.by_name.get(name))
    }
}

/// Deferred constructor invocation for an allocated shell.
pub(crate) type Continuation = Box<dyn FnOnce(&Container, &[String]) -> Result<()>>;

/// Constructors waiting to run, keyed by allocation id.
#[derive(Default)]
pub(crate) struct PendingInstances {
    table: RefCell<HashMap<u64, Continuation>>,
}

impl PendingInstances {
    pub fn register(&self, oid: u64, continuation: Continuation) {
        self.table.borrow_mut().insert(oid, continuation);
    }

    pub fn take(&self, oid: u64) -> Option<Continuation> {
        self.table.borrow_mut().remove(&oid)
    }

    pub fn contains(&self, oid: u64) -> bool {
        self.table.borrow().contains_key(&oid)
    }
}

/// Runs the constructor on an allocated shell.
///
/// For every declared parameter, in order: an explicitly supplied
/// argument wins, then constructor injection for typed required
/// parameters, then the declared default. Parameters become
/// same-named fields. Afterwards, declared non-nullable typed
/// properties that no parameter filled are resolved the same way.
pub(crate) fn run_constructor(
    container: &Container,
    obj: &ObjectRef,
    args: &Args,
    keys: &[String],
) -> Result<()> {
    let spec = obj.class().clone();
    debug!(class = %spec.name, oid = obj.oid(), "construct");
    obj.begin_build();

    for (pos, param) in spec.params.iter().enumerate() {
        let value = if let Some(entry) = args.get(pos, &param.name) {
            materialize(container, keys, entry.clone())?
        } else if container.options().constructor_injection
            && param.required()
            && param.ty.is_some()
        {
            let injection = Injection {
                name: param.name.as_str(),
                ty: param.ty.as_ref(),
                owner: format!("{}::new", spec.name),
            };
            resolve_injection(container, &injection)?
        } else if let Some(default) = &param.default {
            default.clone()
        } else {
            return Err(ContainerError::MissingArgument {
                class: spec.name.clone(),
                param: param.name.clone(),
            });
        };
        obj.set(&param.name, value);
    }

    if container.options().property_injection {
        for prop in container.classes().collect_properties(&spec.name) {
            if obj.has_field(&prop.name) || prop.nullable {
                continue;
            }
            let Some(ty) = &prop.ty else { continue };
            let injection = Injection {
                name: prop.name.as_str(),
                ty: Some(ty),
                owner: spec.name.clone(),
            };
            obj.set(&prop.name, resolve_injection(container, &injection)?);
        }
    }

    obj.finish_build();
    Ok(())
}

/// Evaluates a raw entry into a plain value, outside the settlement
/// cache. Used for explicitly supplied constructor arguments.
pub(crate) fn materialize(container: &Container, keys: &[String], entry: Entry) -> Result<Value> {
    let (entry, _dynamic) = container.factory(keys, entry)?;
    match entry {
        Entry::Value(v) => Ok(v),
        Entry::Unset => Ok(Value::Null),
        Entry::Map(map) => {
            let mut out = ValueMap::new();
            for (k, child) in map {
                if matches!(child, Entry::Unset) {
                    continue;
                }
                out.insert(k, materialize(container, keys, child)?);
            }
            Ok(Value::Map(out))
        }
        Entry::Lazy(_) => unreachable!("factory collapses lazy entries"),
    }
}
