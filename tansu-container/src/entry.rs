//! Raw entries.
//!
//! [`Entry`] is what `extend`/`set` store: either a plain [`Value`], a
//! subtree of further entries, a lazy closure evaluated at `get` time,
//! or the unset marker that deletes whatever a previous layer merged
//! in. `get` turns entries into values; until then nothing is invoked.

use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::class::TypeExpr;
use crate::container::Container;
use crate::error::Result;
use crate::instance::Args;
use crate::value::{ObjectRef, Value, ValueMap};

/// Ordered map of raw entries.
pub type EntryMap = IndexMap<String, Entry>;

/// Closure form of a lazy entry.
///
/// Receives the container and the dotted path being settled, leaf
/// first (`get("a.b.c")` passes `["c", "b", "a"]`).
pub type LazyFn = Rc<dyn Fn(&Container, &[String]) -> Result<Entry>>;

/// How often a lazy entry is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    /// Invoked at most once; the result is memoized per closure, so
    /// the same closure merged under several ids still runs once.
    Once,
    /// Invoked on every settlement.
    Every,
}

/// What a lazy entry promises to return, before it has run.
///
/// Merging needs this to type-check array-ness without forcing the
/// closure, and autowiring needs it to match candidates structurally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnType {
    /// Nothing promised; merging treats it as non-array.
    Unknown,
    /// Deliberately opaque: exempt from the merge type check entirely.
    Unsettled,
    /// Promises a map.
    Array,
    /// Promises a value of this declared type.
    Of(TypeExpr),
}

static NEXT_LAZY_ID: AtomicU64 = AtomicU64::new(1);

/// A deferred entry: closure plus the metadata merging and resolution
/// need before it runs.
#[derive(Clone)]
pub struct LazySpec {
    id: u64,
    pub binding: Binding,
    pub return_type: ReturnType,
    pub func: LazyFn,
}

impl LazySpec {
    pub fn new(binding: Binding, return_type: ReturnType, func: LazyFn) -> LazySpec {
        LazySpec {
            id: NEXT_LAZY_ID.fetch_add(1, Ordering::Relaxed),
            binding,
            return_type,
            func,
        }
    }

    /// Identity of the closure; keys the once-memoization table.
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl fmt::Debug for LazySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySpec")
            .field("id", &self.id)
            .field("binding", &self.binding)
            .field("return_type", &self.return_type)
            .finish_non_exhaustive()
    }
}

/// A raw, not-yet-settled entry in the tree.
#[derive(Clone, Debug)]
pub enum Entry {
    /// Already a value; settling is a no-op.
    Value(Value),
    /// A subtree that merges key-wise.
    Map(EntryMap),
    /// Evaluated when its id is first gotten.
    Lazy(LazySpec),
    /// Deletes the merged entry at this position.
    Unset,
}

impl Entry {
    /// A lazy entry invoked at most once, result cached.
    pub fn once<F>(func: F) -> Entry
    where
        F: Fn(&Container, &[String]) -> Result<Entry> + 'static,
    {
        Entry::Lazy(LazySpec::new(Binding::Once, ReturnType::Unknown, Rc::new(func)))
    }

    /// A lazy entry invoked on every `get`.
    pub fn every<F>(func: F) -> Entry
    where
        F: Fn(&Container, &[String]) -> Result<Entry> + 'static,
    {
        Entry::Lazy(LazySpec::new(Binding::Every, ReturnType::Unknown, Rc::new(func)))
    }

    /// Like [`Entry::once`] with a declared return type, so the entry
    /// participates in type-based resolution before it has run.
    pub fn once_returning<F>(ty: TypeExpr, func: F) -> Entry
    where
        F: Fn(&Container, &[String]) -> Result<Entry> + 'static,
    {
        Entry::Lazy(LazySpec::new(Binding::Once, ReturnType::Of(ty), Rc::new(func)))
    }

    /// A lazy entry promising a map. Merging treats it as an array,
    /// so merging a plain value over it fails instead of silently
    /// replacing the subtree.
    pub fn array<F>(func: F) -> Entry
    where
        F: Fn(&Container, &[String]) -> Result<EntryMap> + 'static,
    {
        Entry::Lazy(LazySpec::new(
            Binding::Once,
            ReturnType::Array,
            Rc::new(move |c, keys| Ok(Entry::Map(func(c, keys)?))),
        ))
    }

    /// A shared instance of `class`: allocated on first `get`,
    /// constructed when its subtree settles, same object every time.
    pub fn shared_instance(class: impl Into<String>, args: Args) -> Entry {
        let class = class.into();
        let ty = TypeExpr::named(class.clone());
        Entry::Lazy(LazySpec::new(
            Binding::Once,
            ReturnType::Of(ty),
            Rc::new(move |c, _keys| {
                Ok(Entry::Value(Value::Object(c.instance(&class, args.clone(), false)?)))
            }),
        ))
    }

    /// A fresh instance of `class` on every `get`.
    pub fn fresh_instance(class: impl Into<String>, args: Args) -> Entry {
        let class = class.into();
        let ty = TypeExpr::named(class.clone());
        Entry::Lazy(LazySpec::new(
            Binding::Every,
            ReturnType::Of(ty),
            Rc::new(move |c, _keys| {
                Ok(Entry::Value(Value::Object(c.instance(&class, args.clone(), false)?)))
            }),
        ))
    }

    /// An alias-like entry that re-gets another id on every access.
    pub fn forward(id: impl Into<String>) -> Entry {
        let id = id.into();
        Entry::Lazy(LazySpec::new(
            Binding::Every,
            ReturnType::Unknown,
            Rc::new(move |c, _keys| Ok(Entry::Value(c.get(&id)?))),
        ))
    }

    /// A list entry keyed `"0"`, `"1"`, ...
    pub fn list<I: IntoIterator<Item = Entry>>(items: I) -> Entry {
        Entry::Map(
            items
                .into_iter()
                .enumerate()
                .map(|(i, e)| (i.to_string(), e))
                .collect(),
        )
    }

    /// `true` when merging must treat this entry as an array.
    pub(crate) fn is_array_like(&self) -> bool {
        match self {
            Entry::Map(_) => true,
            Entry::Value(Value::Map(_)) => true,
            Entry::Lazy(lazy) => lazy.return_type == ReturnType::Array,
            _ => false,
        }
    }
}

impl From<Value> for Entry {
    fn from(v: Value) -> Self {
        Entry::Value(v)
    }
}

macro_rules! entry_from {
    ($($ty:ty),* $(,)?) => {$(
        impl From<$ty> for Entry {
            fn from(v: $ty) -> Self {
                Entry::Value(Value::from(v))
            }
        }
    )*};
}

entry_from!(bool, i32, i64, f64, &str, String, ValueMap, ObjectRef);
