//! # Tansu — configuration-driven dependency injection for Rust
//!
//! Configuration values and service definitions live in one layered,
//! delimiter-addressed tree. Merge layers, get values, and let typed
//! class declarations wire themselves from the tree.
//!
//! This crate re-exports `tansu-container` (the container itself) and
//! `tansu-support` (value rendering).

pub use tansu_container::*;
pub use tansu_support::*;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn layered_config_round_trip() {
        let c = Container::new();
        c.set("greeting.name", "world").unwrap();
        c.set("greeting.loud", true).unwrap();
        assert_eq!(c.get("greeting.name").unwrap(), Value::from("world"));
        assert!(c.has("greeting").unwrap());
    }
}
