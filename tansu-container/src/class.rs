//! Class metadata used by autowiring.
//!
//! A [`ClassSpec`] is an explicit declaration of what reflection would
//! discover in a dynamic runtime: constructor parameters, declared
//! properties, parent class and implemented interfaces. Specs are
//! registered up front on a [`ClassRegistry`]; the container consults
//! the registry when it needs to construct an instance or decide
//! whether a candidate value satisfies a typed parameter.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use once_cell::sync::Lazy;

use crate::value::Value;

/// A declared type: a single name, or a composite of names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    /// A class, interface or builtin name.
    Named(String),
    /// Satisfied when any member matches.
    Union(Vec<TypeExpr>),
    /// Satisfied only when every member matches.
    Intersection(Vec<TypeExpr>),
}

impl TypeExpr {
    pub fn named(name: impl Into<String>) -> TypeExpr {
        TypeExpr::Named(name.into())
    }

    pub fn union<I>(members: I) -> TypeExpr
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        TypeExpr::Union(members.into_iter().map(|m| TypeExpr::Named(m.into())).collect())
    }

    pub fn intersection<I>(members: I) -> TypeExpr
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        TypeExpr::Intersection(members.into_iter().map(|m| TypeExpr::Named(m.into())).collect())
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(members: &[TypeExpr], sep: &str, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for (i, m) in members.iter().enumerate() {
                if i > 0 {
                    write!(f, "{sep}")?;
                }
                write!(f, "{m}")?;
            }
            Ok(())
        }
        match self {
            TypeExpr::Named(name) => write!(f, "{name}"),
            TypeExpr::Union(members) => join(members, "|", f),
            TypeExpr::Intersection(members) => join(members, "&", f),
        }
    }
}

static BUILTIN_TYPES: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "int", "float", "string", "bool", "array", "null", "void", "callable", "object", "mixed",
    ]
    .into_iter()
    .collect()
});

/// `true` for language-level type names that never name a class.
pub fn is_builtin(name: &str) -> bool {
    BUILTIN_TYPES.contains(name)
}

/// One constructor parameter.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub ty: Option<TypeExpr>,
    pub default: Option<Value>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>) -> ParamSpec {
        ParamSpec { name: name.into(), ty: None, default: None }
    }

    pub fn typed(mut self, ty: TypeExpr) -> ParamSpec {
        self.ty = Some(ty);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> ParamSpec {
        self.default = Some(value.into());
        self
    }

    /// A parameter without a default must be filled by the caller or
    /// by injection.
    pub fn required(&self) -> bool {
        self.default.is_none()
    }
}

/// One declared property, for property injection.
#[derive(Debug, Clone)]
pub struct PropertySpec {
    pub name: String,
    pub ty: Option<TypeExpr>,
    /// Nullable properties are never injected.
    pub nullable: bool,
}

impl PropertySpec {
    pub fn new(name: impl Into<String>) -> PropertySpec {
        PropertySpec { name: name.into(), ty: None, nullable: false }
    }

    pub fn typed(mut self, ty: TypeExpr) -> PropertySpec {
        self.ty = Some(ty);
        self
    }

    pub fn nullable(mut self) -> PropertySpec {
        self.nullable = true;
        self
    }
}

/// Declared shape of an instantiable class.
#[derive(Debug, Clone)]
pub struct ClassSpec {
    pub name: String,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub params: Vec<ParamSpec>,
    pub properties: Vec<PropertySpec>,
}

impl ClassSpec {
    pub fn new(name: impl Into<String>) -> ClassSpec {
        ClassSpec {
            name: name.into(),
            parent: None,
            interfaces: Vec::new(),
            params: Vec::new(),
            properties: Vec::new(),
        }
    }

    pub fn extends(mut self, parent: impl Into<String>) -> ClassSpec {
        self.parent = Some(parent.into());
        self
    }

    pub fn implements(mut self, interface: impl Into<String>) -> ClassSpec {
        self.interfaces.push(interface.into());
        self
    }

    pub fn param(mut self, param: ParamSpec) -> ClassSpec {
        self.params.push(param);
        self
    }

    pub fn property(mut self, property: PropertySpec) -> ClassSpec {
        self.properties.push(property);
        self
    }
}

/// Registry of declared classes.
///
/// Late registration replaces earlier specs with the same name;
/// already-built instances keep the spec they were built with.
#[derive(Default)]
pub struct ClassRegistry {
    classes: RefCell<HashMap<String, Rc<ClassSpec>>>,
}

impl ClassRegistry {
    pub fn new() -> ClassRegistry {
        ClassRegistry::default()
    }

    pub fn register(&self, spec: ClassSpec) {
        tracing::debug!(class = %spec.name, "register class");
        self.classes.borrow_mut().insert(spec.name.clone(), Rc::new(spec));
    }

    pub fn get(&self, name: &str) -> Option<Rc<ClassSpec>> {
        self.classes.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.borrow().contains_key(name)
    }

    /// `true` when `class` is `target` or reaches it through its
    /// parent chain or declared interfaces. Unregistered names only
    /// match themselves.
    pub fn is_a(&self, class: &str, target: &str) -> bool {
        if class == target {
            return true;
        }
        let Some(spec) = self.get(class) else {
            return false;
        };
        if spec.interfaces.iter().any(|i| self.is_a(i, target)) {
            return true;
        }
        match &spec.parent {
            Some(parent) => self.is_a(parent, target),
            None => false,
        }
    }

    /// Declared properties of `class` and all its ancestors,
    /// ancestors first.
    pub fn collect_properties(&self, class: &str) -> Vec<PropertySpec> {
        let mut chain = Vec::new();
        let mut current = Some(class.to_string());
        while let Some(name) = current {
            match self.get(&name) {
                Some(spec) => {
                    current = spec.parent.clone();
                    chain.push(spec);
                }
                None => break,
            }
        }
        let mut props = Vec::new();
        for spec in chain.iter().rev() {
            props.extend(spec.properties.iter().cloned());
        }
        props
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let classes = self.classes.borrow();
        let mut names: Vec<&String> = classes.keys().collect();
        names.sort();
        f.debug_struct("ClassRegistry").field("classes", &names).finish()
    }
}
