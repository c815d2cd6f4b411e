//! Subcommand implementations

pub mod modules;
pub mod settings;
pub mod sources;
