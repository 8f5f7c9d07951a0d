//! Adapters shipped with the crate.
//!
//! `CommandManager` lives with the rest of command resolution in
//! [`crate::commands`]; this module holds the general-purpose ones.

pub mod diagnostics;

pub use diagnostics::DiagnosticsAdapter;
