//! Type-directed resolution for injected parameters and properties.
//!
//! Resolution runs three strategies in order:
//!
//! 1. builtin-typed targets resolve by name: parameter `log_level`
//!    becomes id `log.level`;
//! 2. a class-typed target whose class name is itself an id in the
//!    tree resolves directly;
//! 3. otherwise the whole raw tree is walked for entries whose
//!    declared or settled type matches; exactly one hit resolves,
//!    more than one is ambiguous.
//!
//! Only typed candidates participate in the walk: a settled object, a
//! pre-built object value, or a lazy entry with a declared return
//! type. Scalars never match a class-typed target.

use tracing::{debug, trace};

use crate::class::{is_builtin, ClassRegistry, TypeExpr};
use crate::container::Container;
use crate::entry::{Entry, EntryMap, ReturnType};
use crate::error::{ContainerError, Result};
use crate::value::Value;

/// One injection target: a constructor parameter or a property.
pub(crate) struct Injection<'a> {
    pub name: &'a str,
    pub ty: Option<&'a TypeExpr>,
    /// `Class::new` for parameters, `Class` for properties.
    pub owner: String,
}

impl Injection<'_> {
    fn unresolved(&self) -> ContainerError {
        ContainerError::Unresolved {
            name: self.name.to_string(),
            owner: self.owner.clone(),
        }
    }
}

pub(crate) fn resolve_injection(container: &Container, injection: &Injection<'_>) -> Result<Value> {
    let Some(ty) = injection.ty else {
        return Err(injection.unresolved());
    };
    debug!(name = injection.name, %ty, owner = %injection.owner, "resolve injection");

    let mut direct: Option<String> = None;
    if let TypeExpr::Named(name) = ty {
        // Builtin types carry no class identity; the parameter name
        // is the id, underscores standing in for the delimiter.
        if is_builtin(name) {
            let id = injection.name.replace('_', container.options().delimiter.as_str());
            return container.get(&id).map_err(|e| {
                if e.is_not_found() {
                    injection.unresolved()
                } else {
                    e
                }
            });
        }

        // The class name used directly as an id. Only not-found
        // errors fall through to the walk; structural traversal
        // errors propagate.
        let id = container.canonicalize(name);
        match container.fetch(&id) {
            Ok(entry) => {
                if let Some(candidate) = detect_type(container, &id, &entry) {
                    if match_type(container.classes(), &candidate, ty) {
                        trace!(id = %id, "resolved by direct id");
                        return container.get(&id);
                    }
                }
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e),
        }
        direct = Some(id);
    }

    // Full-tree walk for a unique structural match.
    let entries = container.entries_snapshot();
    let mut found: Option<String> = None;
    walk(container, &entries, "", ty, injection, &mut found)?;

    match found {
        Some(id) => {
            trace!(%id, "resolved by tree walk");
            container.get(&id).map_err(|e| {
                if e.is_not_found() {
                    injection.unresolved()
                } else {
                    e
                }
            })
        }
        // With nothing in the tree, the class name itself may still
        // construct through autowiring.
        None => match direct {
            Some(id) => container.get(&id).map_err(|e| {
                if e.is_not_found() {
                    injection.unresolved()
                } else {
                    e
                }
            }),
            None => Err(injection.unresolved()),
        },
    }
}

fn walk(
    container: &Container,
    entries: &EntryMap,
    path: &str,
    target: &TypeExpr,
    injection: &Injection<'_>,
    found: &mut Option<String>,
) -> Result<()> {
    let delimiter = container.options().delimiter.clone();
    for (key, entry) in entries {
        let id = if path.is_empty() {
            key.clone()
        } else {
            format!("{path}{delimiter}{key}")
        };

        if let Entry::Map(sub) = entry {
            walk(container, sub, &id, target, injection, found)?;
            continue;
        }

        let Some(candidate) = detect_type(container, &id, entry) else {
            continue;
        };
        if !match_type(container.classes(), &candidate, target) {
            continue;
        }
        match found {
            None => *found = Some(id),
            Some(first) => {
                return Err(ContainerError::Ambiguous {
                    name: injection.name.to_string(),
                    owner: injection.owner.clone(),
                    first: first.clone(),
                    second: id,
                });
            }
        }
    }
    Ok(())
}

/// Declared or settled type of an entry, when it has one.
fn detect_type(container: &Container, id: &str, entry: &Entry) -> Option<TypeExpr> {
    if let Some(Value::Object(obj)) = container.settled_value(id) {
        return Some(TypeExpr::named(obj.class_name()));
    }
    match entry {
        Entry::Value(Value::Object(obj)) => Some(TypeExpr::named(obj.class_name())),
        Entry::Lazy(lazy) => match &lazy.return_type {
            ReturnType::Of(ty) => Some(ty.clone()),
            _ => None,
        },
        _ => None,
    }
}

/// Whether a candidate of declared type `candidate` satisfies the
/// target type.
pub(crate) fn match_type(registry: &ClassRegistry, candidate: &TypeExpr, target: &TypeExpr) -> bool {
    match target {
        TypeExpr::Union(members) => members.iter().any(|t| match_type(registry, candidate, t)),
        TypeExpr::Intersection(members) => {
            members.iter().all(|t| match_type(registry, candidate, t))
        }
        TypeExpr::Named(target_name) => match candidate {
            TypeExpr::Named(name) => registry.is_a(name, target_name),
            TypeExpr::Union(members) => {
                members.iter().any(|c| match_type(registry, c, target))
            }
            TypeExpr::Intersection(members) => {
                members.iter().all(|c| match_type(registry, c, target))
            }
        },
    }
}
