//! Process-level helpers for embedding applications.

pub mod bootstrap;
