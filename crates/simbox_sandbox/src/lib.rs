//! Per-request sandboxes: staging of submitted sources into a fresh,
//! uniquely named directory, and guaranteed removal of that directory.
//!
//! A [`Sandbox`] is an RAII guard. Whatever path a request takes out of the
//! pipeline (success, a failed stage, an early `?`, or a panic), dropping the
//! guard removes the directory tree exactly once.
//!
//! # Usage
//!
//! ```ignore
//! use simbox_sandbox::Sandbox;
//!
//! let sandbox = Sandbox::create(&config.sandbox)?;
//! let staged = sandbox.stage(&units)?;
//! // ... run tools with `sandbox.path()` as working directory ...
//! // directory removed when `sandbox` goes out of scope
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod id;
pub mod reaper;
pub mod sandbox;

pub use error::SandboxError;
pub use id::generate_id;
pub use reaper::remove_tree;
pub use sandbox::{Sandbox, OBJ_DIR_NAME};
