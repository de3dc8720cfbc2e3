//! The container.
//!
//! A [`Container`] is a hierarchical tree of raw entries, layered by
//! [`extend`](Container::extend), addressed by delimiter-joined ids,
//! and settled on demand by [`get`](Container::get). Settlement is
//! one-way: once an id has been gotten, its value is cached and the
//! raw tree below it can no longer change.
//!
//! Interior mutability is `RefCell`; the container is single-threaded
//! by design and borrows are never held across user closures.

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::class::{ClassRegistry, ClassSpec};
use crate::entry::{Binding, Entry, EntryMap, LazySpec, ReturnType};
use crate::error::{ContainerError, Result};
use crate::instance::{run_constructor, Args, PendingInstances};
use crate::introspect::describe;
use crate::merge::{self, MergeCtx};
use crate::value::{ObjectCell, ObjectRef, Value, ValueMap};

/// Behavioral switches, fixed at build time.
#[derive(Debug, Clone)]
pub struct ContainerOptions {
    /// Joins key segments into ids. `"."` by default.
    pub delimiter: String,
    /// Let `get`/`has` fall back to registered class names.
    pub autowiring: bool,
    /// Resolve typed required constructor parameters from the tree.
    pub constructor_injection: bool,
    /// Resolve typed non-nullable declared properties from the tree.
    pub property_injection: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        ContainerOptions {
            delimiter: ".".to_string(),
            autowiring: true,
            constructor_injection: true,
            property_injection: true,
        }
    }
}

#[derive(Default)]
struct Inner {
    /// Raw, merged entry tree.
    entries: EntryMap,
    /// Settled values by canonical id.
    settled: IndexMap<String, Value>,
    /// Alias -> canonical id.
    aliases: IndexMap<String, String>,
    /// Once-lazy results by closure id.
    lazy_results: HashMap<u64, Entry>,
}

/// Hierarchical, lazily-settled key-value container.
pub struct Container {
    options: ContainerOptions,
    classes: ClassRegistry,
    inner: RefCell<Inner>,
    pending: PendingInstances,
}

impl Default for Container {
    fn default() -> Self {
        Container::new()
    }
}

impl Container {
    pub fn new() -> Container {
        Container::builder().build()
    }

    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.options
    }

    pub fn classes(&self) -> &ClassRegistry {
        &self.classes
    }

    /// Registers a class for autowiring. Same as `classes().register`.
    pub fn register_class(&self, spec: ClassSpec) -> &Self {
        self.classes.register(spec);
        self
    }

    // ── layering ────────────────────────────────────────────────

    /// Merges a tree of raw entries over the current layers.
    ///
    /// Fails when it would touch an already-settled id, rebind an
    /// alias, or replace an array with a non-array. The raw tree is
    /// untouched on failure; alias registrations made before the
    /// failing key may persist.
    pub fn extend(&self, entries: EntryMap) -> Result<&Self> {
        debug!(keys = entries.len(), "extend");
        let inner = &mut *self.inner.borrow_mut();
        let mut work = inner.entries.clone();
        let mut ctx = MergeCtx {
            delimiter: &self.options.delimiter,
            settled: &inner.settled,
            aliases: &mut inner.aliases,
        };
        merge::extend_tree(&mut work, entries, &[], &mut ctx)?;
        inner.entries = work;
        Ok(self)
    }

    /// Sets one entry at a dotted id. The leaf key may carry an alias
    /// (`"real_key alias"`).
    pub fn set(&self, id: &str, entry: impl Into<Entry>) -> Result<()> {
        let mut node = entry.into();
        let segments: Vec<&str> = id.split(self.options.delimiter.as_str()).collect();
        for seg in segments.into_iter().rev() {
            let mut map = EntryMap::new();
            map.insert(seg.to_string(), node);
            node = Entry::Map(map);
        }
        match node {
            Entry::Map(map) => self.extend(map).map(|_| ()),
            _ => unreachable!("split always yields at least one segment"),
        }
    }

    /// Deletes the entry at a dotted id by merging the unset marker.
    pub fn unset(&self, id: &str) -> Result<()> {
        self.set(id, Entry::Unset)
    }

    /// The sentinel that deletes a key when merged over it.
    pub fn unset_marker(&self) -> Entry {
        Entry::Unset
    }

    // ── access ──────────────────────────────────────────────────

    /// Settles and returns the value at `id`. The empty id returns
    /// the whole tree (and settles everything).
    pub fn get(&self, id: &str) -> Result<Value> {
        let id = self.canonicalize(id);
        trace!(%id, "get");
        match self.fetch(&id) {
            Ok(entry) => self.settle(&id, entry),
            Err(e)
                if e.is_not_found() && self.options.autowiring && self.classes.contains(&id) =>
            {
                debug!(class = %id, "autowire class id");
                let obj = self.instance(&id, Args::new(), false)?;
                self.settle(&id, Entry::Value(Value::Object(obj)))
            }
            Err(e) => Err(e),
        }
    }

    /// Whether `id` exists, without settling anything.
    ///
    /// Structural errors (a non-array in the middle of the path)
    /// still propagate.
    pub fn has(&self, id: &str) -> Result<bool> {
        let id = self.canonicalize(id);
        match self.fetch(&id) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => {
                Ok(self.options.autowiring && self.classes.contains(&id))
            }
            Err(e) => Err(e),
        }
    }

    /// Builds a new, independent instance right now, ignoring the
    /// settlement cache.
    pub fn new_instance(&self, class: &str, args: Args) -> Result<ObjectRef> {
        self.instance(class, args, true)
    }

    /// Renders the settled value at `id` as an aligned text dump.
    pub fn dump(&self, id: &str) -> Result<String> {
        let value = self.get(id)?;
        Ok(tansu_support::render(&describe(&value)))
    }

    // ── entry constructors bound to this container ──────────────

    /// An entry that decorates the value the previous layers put at
    /// the same id. Captures the current raw tree; call it after the
    /// layers it should see are merged.
    pub fn parent_with<F>(&self, f: F) -> Entry
    where
        F: Fn(&Container, Entry) -> Result<Entry> + 'static,
    {
        let snapshot = self.inner.borrow().entries.clone();
        let delimiter = self.options.delimiter.clone();
        Entry::Lazy(LazySpec::new(
            Binding::Once,
            ReturnType::Unsettled,
            Rc::new(move |c, keys| {
                let parent = lookup_snapshot(&snapshot, keys, &delimiter)?;
                let (parent, _) = c.factory(keys, parent)?;
                f(c, parent)
            }),
        ))
    }

    /// An entry read from the first set environment variable, `Null`
    /// when none is set. Evaluated once, at settle time.
    pub fn env<I>(&self, names: I) -> Entry
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        Entry::once(move |_, _| {
            for name in &names {
                if let Ok(value) = std::env::var(name) {
                    return Ok(Entry::from(value.as_str()));
                }
            }
            Ok(Entry::Value(Value::Null))
        })
    }

    // ── internals ───────────────────────────────────────────────

    /// Resolves an alias to its canonical id.
    pub(crate) fn canonicalize(&self, id: &str) -> String {
        self.inner
            .borrow()
            .aliases
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    pub(crate) fn settled_value(&self, id: &str) -> Option<Value> {
        self.inner.borrow().settled.get(id).cloned()
    }

    pub(crate) fn entries_snapshot(&self) -> EntryMap {
        self.inner.borrow().entries.clone()
    }

    pub(crate) fn aliases_snapshot(&self) -> IndexMap<String, String> {
        self.inner.borrow().aliases.clone()
    }

    /// Re-registers an alias from an exported snapshot.
    pub(crate) fn restore_alias(&self, alias: &str, id: &str) -> Result<()> {
        let inner = &mut *self.inner.borrow_mut();
        merge::register_alias(&mut inner.aliases, alias, id)
    }

    /// Marks an id settled with a known value, bypassing factory and
    /// instancing. Snapshot restore only.
    pub(crate) fn install_settled(&self, id: &str, value: Value) {
        self.install(id, value);
    }

    /// Looks up the raw entry at a canonical id. Settled ids come
    /// back as plain values.
    pub(crate) fn fetch(&self, id: &str) -> Result<Entry> {
        let inner = self.inner.borrow();
        if let Some(value) = inner.settled.get(id) {
            return Ok(Entry::Value(value.clone()));
        }
        if id.is_empty() {
            return Ok(Entry::Map(inner.entries.clone()));
        }

        let delimiter = self.options.delimiter.as_str();
        let segs: Vec<&str> = id.split(delimiter).collect();
        let mut current = &inner.entries;
        let mut walked = String::new();
        for (i, seg) in segs.iter().enumerate() {
            if !walked.is_empty() {
                walked.push_str(delimiter);
            }
            walked.push_str(seg);
            let Some(entry) = current.get(*seg) else {
                return Err(ContainerError::UndefinedKey { key: seg.to_string(), id: walked });
            };
            if i == segs.len() - 1 {
                return match entry {
                    Entry::Unset => Err(ContainerError::UnsetKey { id: walked }),
                    entry => Ok(entry.clone()),
                };
            }
            match entry {
                Entry::Map(map) => current = map,
                Entry::Value(Value::Map(map)) => {
                    return fetch_in_value(map, &segs[i + 1..], walked, delimiter);
                }
                Entry::Unset => return Err(ContainerError::UnsetKey { id: walked }),
                _ => {
                    walked.push_str(delimiter);
                    walked.push_str(segs[i + 1]);
                    return Err(ContainerError::NotArray { id: walked });
                }
            }
        }
        unreachable!("split always yields at least one segment")
    }

    /// Collapses lazy entries. Returns the first non-lazy entry and
    /// whether any link in the chain was dynamic.
    pub(crate) fn factory(&self, keys: &[String], entry: Entry) -> Result<(Entry, bool)> {
        let mut entry = entry;
        let mut dynamic = false;
        while let Entry::Lazy(lazy) = entry {
            match lazy.binding {
                Binding::Once => {
                    let cached = self.inner.borrow().lazy_results.get(&lazy.id()).cloned();
                    entry = match cached {
                        Some(cached) => cached,
                        None => {
                            debug!(lazy = lazy.id(), "invoke lazy entry");
                            let result = (lazy.func)(self, keys)?;
                            self.inner
                                .borrow_mut()
                                .lazy_results
                                .insert(lazy.id(), result.clone());
                            result
                        }
                    };
                }
                Binding::Every => {
                    dynamic = true;
                    trace!(lazy = lazy.id(), "invoke dynamic entry");
                    entry = (lazy.func)(self, keys)?;
                }
            }
        }
        Ok((entry, dynamic))
    }

    /// Settles an entry under its canonical id.
    ///
    /// Maps install an empty placeholder before their children settle,
    /// so entries evaluated during the recursion observe the parent id
    /// as present (partially filled). Dynamic results evict their own
    /// id on the way out; anything their evaluation settled stays.
    pub(crate) fn settle(&self, id: &str, entry: Entry) -> Result<Value> {
        if let Some(value) = self.settled_value(id) {
            return Ok(value);
        }
        let delimiter = self.options.delimiter.as_str();
        // Leaf-first path segments, handed to every lazy closure.
        let keys: Vec<String> = if id.is_empty() {
            Vec::new()
        } else {
            let mut keys: Vec<String> = id.split(delimiter).map(String::from).collect();
            keys.reverse();
            keys
        };
        let (entry, dynamic) = self.factory(&keys, entry)?;
        match entry {
            Entry::Unset => Err(ContainerError::UnsetKey { id: id.to_string() }),
            Entry::Lazy(_) => unreachable!("factory collapses lazy entries"),
            Entry::Value(value) => {
                trace!(%id, "settle value");
                self.install(id, value.clone());
                if let Value::Object(obj) = &value {
                    if let Some(continuation) = self.pending.take(obj.oid()) {
                        if let Err(e) = continuation(self, &keys) {
                            self.evict(id);
                            return Err(e);
                        }
                    }
                }
                if dynamic {
                    self.evict(id);
                }
                Ok(value)
            }
            Entry::Map(map) => {
                trace!(%id, "settle map");
                self.install(id, Value::Map(ValueMap::new()));
                let mut acc = ValueMap::new();
                for (key, child) in map {
                    if matches!(child, Entry::Unset) {
                        continue;
                    }
                    let child_id = if id.is_empty() {
                        key.clone()
                    } else {
                        format!("{id}{delimiter}{key}")
                    };
                    match self.settle(&child_id, child) {
                        Ok(value) => {
                            acc.insert(key, value);
                            self.install(id, Value::Map(acc.clone()));
                        }
                        // A lazy child may only reveal itself as unset
                        // once invoked; it is dropped like a raw
                        // marker, not treated as a failure.
                        Err(ContainerError::UnsetKey { id: unset }) if unset == child_id => {
                            continue;
                        }
                        Err(e) => {
                            self.evict(id);
                            return Err(e);
                        }
                    }
                }
                if dynamic {
                    self.evict(id);
                }
                Ok(Value::Map(acc))
            }
        }
    }

    /// Allocates an instance of `class`. Immediate construction runs
    /// the constructor now; deferred construction registers a
    /// continuation that runs when the holding entry settles.
    pub(crate) fn instance(&self, class: &str, args: Args, immediate: bool) -> Result<ObjectRef> {
        let spec = self
            .classes
            .get(class)
            .ok_or_else(|| ContainerError::UnknownClass { class: class.to_string() })?;
        let obj = ObjectCell::allocate(spec);
        debug!(%class, oid = obj.oid(), immediate, "allocate instance");
        if immediate {
            run_constructor(self, &obj, &args, &[])?;
        } else {
            let shell = obj.clone();
            self.pending.register(
                obj.oid(),
                Box::new(move |c, keys| run_constructor(c, &shell, &args, keys)),
            );
        }
        Ok(obj)
    }

    fn install(&self, id: &str, value: Value) {
        self.inner.borrow_mut().settled.insert(id.to_string(), value);
    }

    fn evict(&self, id: &str) {
        self.inner.borrow_mut().settled.shift_remove(id);
    }
}

fn fetch_in_value(
    map: &ValueMap,
    rest: &[&str],
    mut walked: String,
    delimiter: &str,
) -> Result<Entry> {
    let mut current = map;
    for (i, seg) in rest.iter().enumerate() {
        walked.push_str(delimiter);
        walked.push_str(seg);
        let Some(value) = current.get(*seg) else {
            return Err(ContainerError::UndefinedKey { key: seg.to_string(), id: walked });
        };
        if i == rest.len() - 1 {
            return Ok(Entry::Value(value.clone()));
        }
        match value {
            Value::Map(inner) => current = inner,
            _ => {
                walked.push_str(delimiter);
                walked.push_str(rest[i + 1]);
                return Err(ContainerError::NotArray { id: walked });
            }
        }
    }
    unreachable!("callers pass a non-empty remainder")
}

fn lookup_snapshot(snapshot: &EntryMap, keys: &[String], delimiter: &str) -> Result<Entry> {
    let mut current = snapshot;
    let mut walked = String::new();
    let total = keys.len();
    for (i, key) in keys.iter().rev().enumerate() {
        if !walked.is_empty() {
            walked.push_str(delimiter);
        }
        walked.push_str(key);
        let Some(entry) = current.get(key) else {
            return Err(ContainerError::UndefinedKey { key: key.clone(), id: walked });
        };
        if i == total - 1 {
            return Ok(entry.clone());
        }
        match entry {
            Entry::Map(map) => current = map,
            _ => return Err(ContainerError::NotArray { id: walked }),
        }
    }
    Err(ContainerError::UndefinedKey { key: String::new(), id: walked })
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Container")
            .field("options", &self.options)
            .field("entries", &inner.entries.len())
            .field("settled", &inner.settled.len())
            .field("aliases", &inner.aliases.len())
            .finish()
    }
}

/// Configures and builds a [`Container`].
pub struct ContainerBuilder {
    options: ContainerOptions,
    classes: ClassRegistry,
}

impl Default for ContainerBuilder {
    fn default() -> Self {
        ContainerBuilder::new()
    }
}

impl ContainerBuilder {
    pub fn new() -> ContainerBuilder {
        ContainerBuilder { options: ContainerOptions::default(), classes: ClassRegistry::new() }
    }

    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.options.delimiter = delimiter.into();
        self
    }

    pub fn autowiring(mut self, on: bool) -> Self {
        self.options.autowiring = on;
        self
    }

    pub fn constructor_injection(mut self, on: bool) -> Self {
        self.options.constructor_injection = on;
        self
    }

    pub fn property_injection(mut self, on: bool) -> Self {
        self.options.property_injection = on;
        self
    }

    pub fn class(self, spec: ClassSpec) -> Self {
        self.classes.register(spec);
        self
    }

    pub fn build(self) -> Container {
        Container {
            options: self.options,
            classes: self.classes,
            inner: RefCell::new(Inner::default()),
            pending: PendingInstances::default(),
        }
    }
}

/// One-stop imports for container users.
pub mod prelude {
    pub use crate::class::{ClassRegistry, ClassSpec, ParamSpec, PropertySpec, TypeExpr};
    pub use crate::container::{Container, ContainerBuilder, ContainerOptions};
    pub use crate::entry::{Binding, Entry, EntryMap, ReturnType};
    pub use crate::error::{ContainerError, Result};
    pub use crate::instance::Args;
    pub use crate::source::Source;
    pub use crate::value::{ObjectCell, ObjectRef, Value, ValueMap};
}
