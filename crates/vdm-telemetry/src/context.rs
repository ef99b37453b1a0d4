//! Span helpers that tag a CLI invocation with its command and build.
//!
//! # Design
//! - One root span per invocation; transfer spans created underneath inherit it.
//! - The build SHA recorded at logging initialisation is attached to every root span.

use tracing::Span;

use crate::init::build_sha;

/// Root span for one CLI command.
#[must_use]
pub fn command_span(command: &str) -> Span {
    tracing::info_span!(
        "vdm",
        command = %command,
        build_sha = %build_sha(),
        outcome = tracing::field::Empty
    )
}

/// Record the final outcome (`success` / `error`) on a command span.
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("outcome", tracing::field::display(outcome));
}
