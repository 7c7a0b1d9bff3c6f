//! Data set storage and compilation.
//!
//! - [`store`]: the compiled, read-only tables and their loaders
//! - [`builder`]: compiles a JSON source into those tables

pub mod builder;
pub mod store;
