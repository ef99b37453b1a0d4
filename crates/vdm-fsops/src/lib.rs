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

//! Template walking and transport adapters for directory provisioning.
//!
//! Layout: `template.rs` (placeholder substitution and the lazy template
//! walker), `transport/` (local and Samba adapters behind `TransportAdapter`),
//! `command.rs` (external process port with timeout), `permissions.rs`
//! (ownership/mode fix-up for local entries), `error.rs`.

pub mod command;
pub mod error;
pub mod permissions;
pub mod template;
pub mod transport;

pub use command::{
    CommandOutput, CommandRunner, CommandSpec, DEFAULT_COMMAND_TIMEOUT, TokioCommandRunner,
};
pub use error::{FsOpsError, FsOpsResult};
pub use permissions::{PermissionManager, WarehousePermissions};
pub use template::{
    NodeKind, ProvisioningInstruction, Substitutions, TemplateWalk, template_subtree,
    walk_template,
};
pub use transport::{
    DirOutcome, FailureMode, LocalTransport, PutOutcome, SMBCLIENT_PROGRAM, SambaTransport,
    TransportAdapter, adapter_for,
};
