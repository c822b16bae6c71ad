//! Pipeline stage tags and the structured simulation result.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::signal::SignalMap;

/// The step a simulation result is attributed to.
///
/// `Compile`, `Build` and `Run` are the ordered pipeline stages; `Done` tags
/// a run that completed, whether or not it succeeded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// HDL compilation to intermediate C++.
    Compile,
    /// Native build of the compiled model and harness.
    Build,
    /// Execution of the produced binary.
    Run,
    /// The run finished; success is reconciled separately.
    Done,
}

impl Stage {
    /// Returns the lowercase tag used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Compile => "compile",
            Stage::Build => "build",
            Stage::Run => "run",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The response returned for every request that reached a sandbox.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResult {
    /// Whether the simulation completed.
    pub success: bool,
    /// The stage the result is attributed to.
    pub stage: Stage,
    /// Raw diagnostic text for failures.
    pub errors: Option<String>,
    /// Captured run output, truncated to the output cap.
    pub output: String,
    /// Parsed waveform, or `None` when no usable trace was produced.
    pub signals: Option<SignalMap>,
    /// The raw VCD text when it is under the size cap.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_trace: Option<String>,
}

impl SimulationResult {
    /// A compile or build failure: no output, no trace.
    pub fn stage_failure(stage: Stage, errors: impl Into<String>) -> Self {
        Self {
            success: false,
            stage,
            errors: Some(errors.into()),
            output: String::new(),
            signals: None,
            raw_trace: None,
        }
    }
}
