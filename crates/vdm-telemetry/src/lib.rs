#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Logging and span helpers shared by the provisioning binaries.
//!
//! Layout: `init.rs` (subscriber installation and log format selection),
//! `context.rs` (per-command root spans), `error.rs`.

pub mod context;
pub mod error;
pub mod init;

pub use context::{command_span, record_outcome};
pub use error::{Result, TelemetryError};
pub use init::{
    DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, build_sha, init_logging, level_for_verbosity,
};
