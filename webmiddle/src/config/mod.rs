//! Engine configuration.
//!
//! Settings are read from a TOML file and seed the root context: the
//! `[options]` table becomes the root options, `[evaluation]` bounds the
//! evaluator and `[serialization]` sizes the lazy inspector.

pub mod types;

pub use types::*;
