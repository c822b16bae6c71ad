//! Parsing and validation of `simbox.toml` service configuration, plus
//! one-time discovery of the host toolchain.
//!
//! Configuration is read once at startup into a [`ServiceConfig`]. The
//! toolchain section is then resolved by [`discover_toolchain`] to produce an
//! immutable [`Toolchain`] that request handling receives explicitly.

#![warn(missing_docs)]

pub mod discover;
pub mod error;
pub mod loader;
pub mod types;

pub use discover::{
    discover_toolchain, find_uvm_library, query_version, query_version_within, Toolchain,
    UvmLibrary, VERSION_TIMEOUT,
};
pub use error::ConfigError;
pub use loader::{load_config, load_config_file, load_config_from_str, CONFIG_FILE_NAME};
pub use types::*;
