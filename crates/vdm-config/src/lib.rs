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

//! Read-only configuration gateway for cruise provisioning.
//!
//! Layout: `model.rs` (typed transfer/warehouse/cruise models), `validate.rs`
//! (resolution of loosely typed settings into closed enums), `loader.rs`
//! (file and HTTP settings sources), `service.rs` (`ConfigGateway` over an
//! immutable `ConfigSnapshot`).

mod defaults;
pub mod error;
pub mod loader;
pub mod model;
pub mod service;
pub mod validate;

pub use defaults::{DEFAULT_DIR_MODE, DEFAULT_FILE_MODE, DEFAULT_SMB_PROTOCOL};
pub use error::{ConfigError, ConfigResult};
pub use loader::{
    FileSettingsSource, HttpSettingsSource, RawTransfer, RawWarehouse, SettingsDocument,
    SettingsSource, load_snapshot,
};
pub use model::{
    CollectionSystemTransfer, ConfigSnapshot, CruiseContext, LOWERING_PLACEHOLDER,
    CRUISE_PLACEHOLDER, SambaCredentials, TransferScope, TransferType, WarehouseConfig,
};
pub use service::ConfigGateway;
