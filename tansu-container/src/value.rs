//! Settled values.
//!
//! [`Value`] is what `get` returns: raw entries have already been
//! merged, factored and settled. Lists are represented as maps with
//! decimal-string keys, so one ordered map type covers both shapes.
//!
//! [`ObjectCell`] is an auto-wired instance. Objects are compared by
//! identity, may exist as not-yet-constructed shells during two-phase
//! construction, and track their lifecycle with an explicit
//! `Allocated -> Building -> Ready` state machine.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;

use crate::class::ClassSpec;

/// Ordered map of settled values.
pub type ValueMap = IndexMap<String, Value>;

/// A fully-settled entry value.
#[derive(Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Map(ValueMap),
    Object(ObjectRef),
}

impl Value {
    /// Builds a list as a map keyed `"0"`, `"1"`, ...
    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Value::Map(
            items
                .into_iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v))
                .collect(),
        )
    }

    /// Scalar/structural kind name, or the class name for objects.
    pub fn type_name(&self) -> String {
        match self {
            Value::Null => "null".into(),
            Value::Bool(_) => "bool".into(),
            Value::Int(_) => "int".into(),
            Value::Float(_) => "float".into(),
            Value::Str(_) => "string".into(),
            Value::Map(_) => "array".into(),
            Value::Object(obj) => obj.class_name().to_string(),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ValueMap> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&ObjectRef> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k) == Some(v))
            }
            // Objects compare by identity, never structurally.
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(i) => write!(f, "Int({i})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::Map(m) => f.debug_map().entries(m.iter()).finish(),
            Value::Object(o) => write!(f, "{o:?}"),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<ValueMap> for Value {
    fn from(v: ValueMap) -> Self {
        Value::Map(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Object(v)
    }
}

// ═══════════════════════════════════════════
// ObjectCell — two-phase constructed instance
// ═══════════════════════════════════════════

/// Shared handle to an instance. Identity is `Rc::ptr_eq`.
pub type ObjectRef = Rc<ObjectCell>;

static NEXT_OID: AtomicU64 = AtomicU64::new(1);

/// Construction lifecycle of an instance.
#[derive(Debug)]
enum ObjectState {
    /// Shell exists, constructor has not run. Fields are unreadable.
    Allocated,
    /// Constructor/property injection in progress; fields assigned so
    /// far are visible (mutually-referencing graphs read each other
    /// mid-construction).
    Building(ValueMap),
    /// Fully constructed.
    Ready(ValueMap),
}

/// An instance of a registered class.
pub struct ObjectCell {
    oid: u64,
    class: Rc<ClassSpec>,
    state: RefCell<ObjectState>,
}

impl ObjectCell {
    /// Allocates a shell without running the constructor.
    pub(crate) fn allocate(class: Rc<ClassSpec>) -> ObjectRef {
        Rc::new(ObjectCell {
            oid: NEXT_OID.fetch_add(1, Ordering::Relaxed),
            class,
            state: RefCell::new(ObjectState::Allocated),
        })
    }

    /// Builds an already-constructed instance from explicit fields.
    ///
    /// Useful for sources and tests that seed pre-built objects into
    /// the tree.
    pub fn ready(class: Rc<ClassSpec>, fields: ValueMap) -> ObjectRef {
        Rc::new(ObjectCell {
            oid: NEXT_OID.fetch_add(1, Ordering::Relaxed),
            class,
            state: RefCell::new(ObjectState::Ready(fields)),
        })
    }

    /// Process-unique allocation id; keys the pending-continuation table.
    pub fn oid(&self) -> u64 {
        self.oid
    }

    pub fn class(&self) -> &Rc<ClassSpec> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        &self.class.name
    }

    pub fn is_ready(&self) -> bool {
        matches!(*self.state.borrow(), ObjectState::Ready(_))
    }

    /// Reads a field. `None` while allocated or for never-assigned fields.
    pub fn get(&self, field: &str) -> Option<Value> {
        match &*self.state.borrow() {
            ObjectState::Allocated => None,
            ObjectState::Building(fields) | ObjectState::Ready(fields) => {
                fields.get(field).cloned()
            }
        }
    }

    pub fn has_field(&self, field: &str) -> bool {
        match &*self.state.borrow() {
            ObjectState::Allocated => false,
            ObjectState::Building(fields) | ObjectState::Ready(fields) => {
                fields.contains_key(field)
            }
        }
    }

    /// Snapshot of the assigned fields (empty while allocated).
    pub fn fields(&self) -> ValueMap {
        match &*self.state.borrow() {
            ObjectState::Allocated => ValueMap::new(),
            ObjectState::Building(fields) | ObjectState::Ready(fields) => fields.clone(),
        }
    }

    /// `Allocated -> Building`. Constructor invocation starts here.
    pub(crate) fn begin_build(&self) {
        let mut state = self.state.borrow_mut();
        if matches!(*state, ObjectState::Allocated) {
            *state = ObjectState::Building(ValueMap::new());
        }
    }

    /// Assigns a field during `Building` (or after, for `ready` objects).
    pub(crate) fn set(&self, field: &str, value: Value) {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            ObjectState::Allocated => {
                let mut fields = ValueMap::new();
                fields.insert(field.to_string(), value);
                *state = ObjectState::Building(fields);
            }
            ObjectState::Building(fields) | ObjectState::Ready(fields) => {
                fields.insert(field.to_string(), value);
            }
        }
    }

    /// `Building -> Ready`.
    pub(crate) fn finish_build(&self) {
        let mut state = self.state.borrow_mut();
        let fields = match &mut *state {
            ObjectState::Allocated => ValueMap::new(),
            ObjectState::Building(fields) | ObjectState::Ready(fields) => std::mem::take(fields),
        };
        *state = ObjectState::Ready(fields);
    }
}

impl fmt::Debug for ObjectCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shallow on purpose: object graphs may be cyclic.
        write!(f, "{}#{}", self.class.name, self.oid)
    }
}
