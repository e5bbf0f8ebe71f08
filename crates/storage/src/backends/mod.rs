//! Concrete backend implementations.

pub mod file;
