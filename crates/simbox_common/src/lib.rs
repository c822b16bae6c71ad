//! Shared data model for the simbox simulation service.
//!
//! This crate provides the request, detection, stage, signal, and result
//! types exchanged between the sandbox, source rewriting, pipeline, and
//! waveform crates, plus small text helpers used during result assembly.

#![warn(missing_docs)]

pub mod detection;
pub mod request;
pub mod result;
pub mod signal;
pub mod text;

pub use detection::DetectionResult;
pub use request::{
    is_identifier, validate_file_name, RequestError, ResolveOptions, ResolvedRequest,
    SimulationRequest, SourceUnit, DEFAULT_FILE_NAME, DEFAULT_TOP,
};
pub use result::{SimulationResult, Stage};
pub use signal::{Signal, SignalMap, ValueChange};
pub use text::truncate_chars;
