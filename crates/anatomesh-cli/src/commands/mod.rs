//! Subcommand implementations.

pub mod inspect;
pub mod profiles;
pub mod segment;
