//! Cucumber step definitions for interface tests.

pub mod broker;
pub mod command_manager;
pub mod lifecycle;
