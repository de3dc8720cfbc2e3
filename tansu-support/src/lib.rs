//! # Tansu Support
//!
//! Shared rendering utilities for the Tansu container.
//!
//! This crate provides:
//! - A neutral render tree for settled values
//! - An aligned, var-export-style pretty printer used by diagnostics

pub mod describe;

pub use describe::{Node, render};
