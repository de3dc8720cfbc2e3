//! Layered merging of raw entry trees.
//!
//! `extend` merges an incoming tree over the current one, key by key:
//! maps merge recursively, everything else replaces. Merging is where
//! aliases register (a key written `"real_key alias"` binds `alias`
//! to the dotted id of `real_key`) and where two guards fire: an id
//! that has already settled can no longer change, and an array may
//! not silently replace a non-array or vice versa.

use indexmap::IndexMap;
use tracing::trace;

use crate::entry::{Entry, EntryMap};
use crate::error::{ContainerError, Result};
use crate::value::Value;

pub(crate) struct MergeCtx<'a> {
    pub delimiter: &'a str,
    pub settled: &'a IndexMap<String, Value>,
    pub aliases: &'a mut IndexMap<String, String>,
}

/// Merges `incoming` into `current` at `path`.
///
/// On error `current` is left as merged so far; callers that need
/// atomicity merge into a clone and swap on success.
pub(crate) fn extend_tree(
    current: &mut EntryMap,
    incoming: EntryMap,
    path: &[String],
    ctx: &mut MergeCtx<'_>,
) -> Result<()> {
    for (compound_key, entry) in incoming {
        let (key, alias) = split_alias(&compound_key);
        let id = join_id(path, key, ctx.delimiter);

        if ctx.settled.contains_key(&id) {
            return Err(ContainerError::AlreadySettled { id });
        }

        if let Some(alias) = alias {
            register_alias(ctx.aliases, alias, &id)?;
        }

        let existing = current.get(key);
        if let (Some(existing), false) = (existing, matches!(entry, Entry::Unset)) {
            if !matches!(existing, Entry::Unset) && !exempt(existing) && !exempt(&entry) {
                // Exactly one side being an array is a layering bug,
                // not a legitimate override.
                if existing.is_array_like() != entry.is_array_like() {
                    return Err(ContainerError::NotArray { id });
                }
            }
        }

        match entry {
            Entry::Map(sub) => {
                trace!(%id, "merge subtree");
                let mut child_path = path.to_vec();
                child_path.push(key.to_string());
                // A map always merges into a map; a fresh subtree is
                // walked the same way so nested aliases register.
                if let Some(slot @ Entry::Value(Value::Map(_))) = current.get_mut(key) {
                    // Promote a settled-style value map so it merges
                    // key-wise instead of being replaced wholesale.
                    let Entry::Value(Value::Map(values)) =
                        std::mem::replace(slot, Entry::Map(EntryMap::new()))
                    else {
                        unreachable!()
                    };
                    *slot = Entry::Map(
                        values.into_iter().map(|(k, v)| (k, Entry::Value(v))).collect(),
                    );
                }
                let slot = match current.get_mut(key) {
                    Some(Entry::Map(m)) => m,
                    _ => {
                        current.insert(key.to_string(), Entry::Map(EntryMap::new()));
                        match current.get_mut(key) {
                            Some(Entry::Map(m)) => m,
                            _ => unreachable!(),
                        }
                    }
                };
                extend_tree(slot, sub, &child_path, ctx)?;
            }
            entry => {
                trace!(%id, "merge entry");
                current.insert(key.to_string(), entry);
            }
        }
    }
    Ok(())
}

/// Splits `"key alias"` into the real key and the optional alias.
pub(crate) fn split_alias(compound: &str) -> (&str, Option<&str>) {
    match compound.split_once(char::is_whitespace) {
        Some((key, alias)) => (key, Some(alias.trim_start())),
        None => (compound, None),
    }
}

pub(crate) fn join_id(path: &[String], key: &str, delimiter: &str) -> String {
    if path.is_empty() {
        return key.to_string();
    }
    let mut id = path.join(delimiter);
    id.push_str(delimiter);
    id.push_str(key);
    id
}

pub(crate) fn register_alias(
    aliases: &mut IndexMap<String, String>,
    alias: &str,
    id: &str,
) -> Result<()> {
    if let Some(existing) = aliases.get(alias) {
        if existing != id {
            return Err(ContainerError::AliasConflict {
                alias: alias.to_string(),
                existing: existing.clone(),
                incoming: id.to_string(),
            });
        }
        return Ok(());
    }
    trace!(%alias, %id, "register alias");
    aliases.insert(alias.to_string(), id.to_string());
    Ok(())
}

/// Entries exempt from the array/non-array check: lazies whose shape
/// is deliberately opaque until settled.
fn exempt(entry: &Entry) -> bool {
    matches!(
        entry,
        Entry::Lazy(lazy) if lazy.return_type == crate::entry::ReturnType::Unsettled
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::indexmap;

    fn merge(
        current: &mut EntryMap,
        incoming: EntryMap,
        settled: &IndexMap<String, Value>,
        aliases: &mut IndexMap<String, String>,
    ) -> Result<()> {
        let mut ctx = MergeCtx { delimiter: ".", settled, aliases };
        extend_tree(current, incoming, &[], &mut ctx)
    }

    #[test]
    fn disjoint_keys_append() {
        let mut current = indexmap! { "a".to_string() => Entry::from(1) };
        merge(
            &mut current,
            indexmap! { "b".to_string() => Entry::from(2) },
            &IndexMap::new(),
            &mut IndexMap::new(),
        )
        .unwrap();
        assert_eq!(current.keys().collect::<Vec<_>>(), ["a", "b"]);
    }

    #[test]
    fn later_layer_wins_and_keeps_position() {
        let mut current = indexmap! {
            "a".to_string() => Entry::from(1),
            "b".to_string() => Entry::from(2),
        };
        merge(
            &mut current,
            indexmap! { "a".to_string() => Entry::from(10) },
            &IndexMap::new(),
            &mut IndexMap::new(),
        )
        .unwrap();
        assert_eq!(current.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert!(matches!(current["a"], Entry::Value(Value::Int(10))));
    }

    #[test]
    fn maps_merge_recursively() {
        let mut current = indexmap! {
            "db".to_string() => Entry::Map(indexmap! {
                "host".to_string() => Entry::from("localhost"),
            }),
        };
        merge(
            &mut current,
            indexmap! {
                "db".to_string() => Entry::Map(indexmap! {
                    "port".to_string() => Entry::from(5432),
                }),
            },
            &IndexMap::new(),
            &mut IndexMap::new(),
        )
        .unwrap();
        let Entry::Map(db) = &current["db"] else { unreachable!() };
        assert_eq!(db.keys().collect::<Vec<_>>(), ["host", "port"]);
    }

    #[test]
    fn settled_id_rejects_merge() {
        let mut current = indexmap! { "a".to_string() => Entry::from(1) };
        let settled = indexmap! { "a".to_string() => Value::Int(1) };
        let err = merge(
            &mut current,
            indexmap! { "a".to_string() => Entry::from(2) },
            &settled,
            &mut IndexMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ContainerError::AlreadySettled { id } if id == "a"));
    }

    #[test]
    fn settled_nested_id_rejects_merge() {
        let mut current = indexmap! {
            "db".to_string() => Entry::Map(indexmap! {
                "host".to_string() => Entry::from("localhost"),
            }),
        };
        let settled = indexmap! { "db.host".to_string() => Value::from("localhost") };
        let err = merge(
            &mut current,
            indexmap! {
                "db".to_string() => Entry::Map(indexmap! {
                    "host".to_string() => Entry::from("remote"),
                }),
            },
            &settled,
            &mut IndexMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ContainerError::AlreadySettled { id } if id == "db.host"));
    }

    #[test]
    fn array_over_scalar_rejected() {
        let mut current = indexmap! { "a".to_string() => Entry::from(1) };
        let err = merge(
            &mut current,
            indexmap! {
                "a".to_string() => Entry::Value(Value::Map(indexmap! {
                    "x".to_string() => Value::Int(1),
                })),
            },
            &IndexMap::new(),
            &mut IndexMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ContainerError::NotArray { id } if id == "a"));
    }

    #[test]
    fn scalar_over_map_rejected() {
        let mut current = indexmap! {
            "a".to_string() => Entry::Map(indexmap! {
                "x".to_string() => Entry::from(1),
            }),
        };
        let err = merge(
            &mut current,
            indexmap! { "a".to_string() => Entry::from(2) },
            &IndexMap::new(),
            &mut IndexMap::new(),
        );
        assert!(matches!(err, Err(ContainerError::NotArray { id }) if id == "a"));
    }

    #[test]
    fn unset_marker_replaces_anything() {
        let mut current = indexmap! {
            "a".to_string() => Entry::Map(indexmap! {
                "x".to_string() => Entry::from(1),
            }),
        };
        merge(
            &mut current,
            indexmap! { "a".to_string() => Entry::Unset },
            &IndexMap::new(),
            &mut IndexMap::new(),
        )
        .unwrap();
        assert!(matches!(current["a"], Entry::Unset));
    }

    #[test]
    fn alias_registers_canonical_id() {
        let mut current = EntryMap::new();
        let mut aliases = IndexMap::new();
        merge(
            &mut current,
            indexmap! {
                "database".to_string() => Entry::Map(indexmap! {
                    "connection db".to_string() => Entry::from("dsn"),
                }),
            },
            &IndexMap::new(),
            &mut aliases,
        )
        .unwrap();
        assert_eq!(aliases.get("db").map(String::as_str), Some("database.connection"));
        // The stored key never carries the alias.
        let Entry::Map(database) = &current["database"] else { unreachable!() };
        assert!(database.contains_key("connection"));
    }

    #[test]
    fn alias_rebind_same_target_is_idempotent() {
        let mut aliases = IndexMap::new();
        let mut current = EntryMap::new();
        for _ in 0..2 {
            merge(
                &mut current,
                indexmap! { "real alias".to_string() => Entry::from(1) },
                &IndexMap::new(),
                &mut aliases,
            )
            .unwrap();
        }
        assert_eq!(aliases.len(), 1);
    }

    #[test]
    fn alias_rebind_other_target_conflicts() {
        let mut aliases = IndexMap::new();
        let mut current = EntryMap::new();
        merge(
            &mut current,
            indexmap! { "first x".to_string() => Entry::from(1) },
            &IndexMap::new(),
            &mut aliases,
        )
        .unwrap();
        let err = merge(
            &mut current,
            indexmap! { "second x".to_string() => Entry::from(2) },
            &IndexMap::new(),
            &mut aliases,
        )
        .unwrap_err();
        assert!(matches!(err, ContainerError::AliasConflict { alias, .. } if alias == "x"));
    }

    #[test]
    fn nested_alias_in_fresh_subtree_registers() {
        let mut aliases = IndexMap::new();
        let mut current = EntryMap::new();
        merge(
            &mut current,
            indexmap! {
                "outer".to_string() => Entry::Map(indexmap! {
                    "inner i".to_string() => Entry::from(1),
                }),
            },
            &IndexMap::new(),
            &mut aliases,
        )
        .unwrap();
        assert_eq!(aliases.get("i").map(String::as_str), Some("outer.inner"));
    }

    #[test]
    fn lazy_array_counts_as_array() {
        let mut current = indexmap! {
            "a".to_string() => Entry::array(|_, _| Ok(EntryMap::new())),
        };
        let err = merge(
            &mut current,
            indexmap! { "a".to_string() => Entry::from(1) },
            &IndexMap::new(),
            &mut IndexMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ContainerError::NotArray { .. }));
    }
}
