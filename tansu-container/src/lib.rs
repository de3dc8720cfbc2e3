//! # Tansu Container
//!
//! A hierarchical, configuration-driven dependency container.
//!
//! Configuration and services live in one delimiter-addressed tree.
//! Layers merge with [`Container::extend`], values settle lazily on
//! [`Container::get`], and settled ids are immutable from then on.
//! Entries can be plain values, subtrees, or lazy closures; closures
//! declared with [`Entry::shared_instance`] build class instances
//! whose typed constructor parameters and properties are resolved
//! from the tree itself.
//!
//! ```
//! use tansu_container::prelude::*;
//! use indexmap::indexmap;
//!
//! let c = Container::builder()
//!     .class(ClassSpec::new("Logger"))
//!     .class(
//!         ClassSpec::new("Database")
//!             .param(ParamSpec::new("dsn").typed(TypeExpr::named("string")))
//!             .param(ParamSpec::new("logger").typed(TypeExpr::named("Logger"))),
//!     )
//!     .build();
//!
//! c.extend(indexmap! {
//!     "dsn".to_string() => Entry::from("sqlite::memory:"),
//!     "logger".to_string() => Entry::shared_instance("Logger", Args::new()),
//!     "db".to_string() => Entry::shared_instance("Database", Args::new()),
//! })
//! .unwrap();
//!
//! let db = c.get("db").unwrap();
//! assert_eq!(
//!     db.as_object().unwrap().get("dsn"),
//!     Some(Value::from("sqlite::memory:")),
//! );
//! ```

pub mod class;
pub mod container;
pub mod entry;
pub mod error;
pub mod instance;
pub mod introspect;
mod merge;
mod resolve;
pub mod source;
pub mod state;
pub mod value;

pub use class::{ClassRegistry, ClassSpec, ParamSpec, PropertySpec, TypeExpr};
pub use container::{prelude, Container, ContainerBuilder, ContainerOptions};
pub use entry::{Binding, Entry, EntryMap, LazySpec, ReturnType};
pub use error::{ContainerError, Result};
pub use instance::Args;
pub use source::{FnSource, Source};
pub use state::{ContainerState, StateValue};
pub use value::{ObjectCell, ObjectRef, Value, ValueMap};
