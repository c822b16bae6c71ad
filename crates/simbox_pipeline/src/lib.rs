//! Simulation pipeline for simbox.
//!
//! Turns a [`SimulationRequest`](simbox_common::SimulationRequest) into a
//! [`SimulationResult`](simbox_common::SimulationResult):
//!
//! ```text
//! resolve -> admit -> sandbox + stage -> detect -> transform -> harness
//!         -> compile -> build -> run -> parse trace -> assemble -> reap
//! ```
//!
//! - [`Simulator`] owns the immutable toolchain, limits, and sandbox settings
//!   and runs the steps above for each request.
//! - [`ToolchainPipeline`] runs the three external stages with short-circuit
//!   on failure and lenient completion of the run stage.
//! - [`ToolRunner`] is the process seam; [`SystemRunner`] spawns real tools
//!   with a timeout via [`run_process`].
//! - [`AdmissionGate`] bounds concurrent pipelines.

#![warn(missing_docs)]

pub mod admission;
pub mod args;
pub mod error;
pub mod pipeline;
pub mod process;
pub mod runner;
pub mod simulate;

pub use admission::{AdmissionGate, AdmissionPermit};
pub use args::{build_args, compile_args, model_name, StagePlan};
pub use error::SimulateError;
pub use pipeline::{PipelineReport, ToolchainPipeline};
pub use process::{run_process, ExitClass, ProcessOutcome, ProcessSpec};
pub use runner::{SystemRunner, ToolRunner};
pub use simulate::{Simulator, RESERVED_NAMES};
