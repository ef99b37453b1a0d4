//! Command handlers grouped by subcommand.

pub(crate) mod plan;
pub(crate) mod provision;
