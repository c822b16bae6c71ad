//! Source feature classification shared by the detector and the pipeline.

use serde::Serialize;

/// The two source properties that shape the harness and the compiler flags.
///
/// Computed once per request from the unmodified staged sources and never
/// changed afterwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    /// Whether the sources use the UVM-style class-based testbench methodology.
    pub uses_methodology: bool,
    /// Whether the top-level module declares a `clk` input port.
    pub has_clock_port: bool,
}
