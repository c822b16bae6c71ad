//! Text-level passes over staged HDL sources.
//!
//! Both passes are best-effort pattern matching, not a grammar parse:
//!
//! - `detect` classifies the unmodified sources (UVM methodology use, clock
//!   port on the top module). It must run before `transform`.
//! - `transform` strips waveform-dump system tasks and normalises the UVM
//!   include/import preamble. It is idempotent.

#![warn(missing_docs)]

pub mod detect;
pub mod transform;

pub use detect::{
    detect_files, detect_methodology, FeatureDetector, MethodologyMarker, PatternDetector,
};
pub use transform::{transform_files, transform_source, UVM_PREAMBLE};
