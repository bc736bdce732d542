//! CLI subcommands

pub mod inspect;
pub mod predict;
