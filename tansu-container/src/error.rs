//! Error types for Tansu container operations.
//!
//! Every failure carries the dotted id or the consuming
//! parameter/property it relates to, so errors read like
//! `failed to resolve $logger in Database::new` rather than
//! an opaque type name.

/// Main error type for all container operations.
#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    /// Merge targeted an id that was already settled by a `get`.
    #[error("{id} is already settled")]
    AlreadySettled { id: String },

    /// Array/non-array clash while merging or traversing.
    #[error("{id} is not array")]
    NotArray { id: String },

    /// An alias was re-declared against a different canonical id.
    #[error("alias '{alias}' is already bound to {existing}, cannot rebind to {incoming}")]
    AliasConflict {
        alias: String,
        existing: String,
        incoming: String,
    },

    /// The dotted id does not exist in the raw tree.
    #[error("undefined config key '{key}' in {id}")]
    UndefinedKey { key: String, id: String },

    /// The dotted id was explicitly deleted with the unset marker.
    #[error("unset config key '{id}'")]
    UnsetKey { id: String },

    /// Instance construction requested for a class that was never registered.
    #[error("unknown class '{class}'")]
    UnknownClass { class: String },

    /// Autowiring found no candidate for a typed parameter/property.
    #[error("failed to resolve ${name} in {owner}")]
    Unresolved { name: String, owner: String },

    /// Autowiring found more than one structurally-matching candidate.
    #[error("ambiguous resolution for ${name} in {owner}: both '{first}' and '{second}' match")]
    Ambiguous {
        name: String,
        owner: String,
        first: String,
        second: String,
    },

    /// A required constructor argument could not be filled by any rule.
    #[error("missing argument ${param} for {class}")]
    MissingArgument { class: String, param: String },

    /// The value at `id` has no representation in the exported state format.
    #[error("{kind} value at '{id}' is not supported by the state format")]
    UnsupportedState { id: String, kind: &'static str },
}

impl ContainerError {
    /// `true` for the not-found kind of error.
    ///
    /// Only this kind triggers the autowiring fallback in `get`/`has`
    /// and the full-tree walk in the resolver; every other kind
    /// propagates immediately.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ContainerError::UndefinedKey { .. } | ContainerError::UnsetKey { .. }
        )
    }
}

/// Convenient Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn already_settled_display() {
        let err = ContainerError::AlreadySettled { id: "db.host".into() };
        assert_eq!(format!("{err}"), "db.host is already settled");
    }

    #[test]
    fn undefined_key_display() {
        let err = ContainerError::UndefinedKey {
            key: "hoge".into(),
            id: "scalar.hoge".into(),
        };
        assert_eq!(format!("{err}"), "undefined config key 'hoge' in scalar.hoge");
        assert!(err.is_not_found());
    }

    #[test]
    fn unresolved_display_names_owner() {
        let err = ContainerError::Unresolved {
            name: "logger".into(),
            owner: "Database::new".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("$logger"));
        assert!(msg.contains("Database::new"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn ambiguous_display_names_both_candidates() {
        let err = ContainerError::Ambiguous {
            name: "store".into(),
            owner: "App::new".into(),
            first: "cache.local".into(),
            second: "cache.remote".into(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("cache.local"));
        assert!(msg.contains("cache.remote"));
    }

    #[test]
    fn not_found_kinds() {
        assert!(ContainerError::UnsetKey { id: "k".into() }.is_not_found());
        assert!(!ContainerError::NotArray { id: "k".into() }.is_not_found());
        assert!(!ContainerError::UnknownClass { class: "C".into() }.is_not_found());
    }
}
