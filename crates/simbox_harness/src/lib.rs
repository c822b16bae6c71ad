//! Generation of the C++ execution driver compiled together with the design.
//!
//! The design never steps itself: the generated `main.cpp` owns the model
//! instance, opens the VCD trace before the first evaluation, optionally
//! drives a 50% duty-cycle clock on the top module's `clk` port, and runs an
//! evaluation loop until `$finish` or an iteration ceiling.
//!
//! # Usage
//!
//! ```ignore
//! use simbox_harness::{generate, HarnessSpec, HARNESS_FILE_NAME};
//!
//! let spec = HarnessSpec::new("tb_top", detection.has_clock_port);
//! sandbox.write_file(HARNESS_FILE_NAME, &generate(&spec))?;
//! ```

#![warn(missing_docs)]

/// File name the harness is written to inside the sandbox.
pub const HARNESS_FILE_NAME: &str = "main.cpp";

/// Default waveform file written by the harness, relative to its working directory.
pub const DEFAULT_TRACE_FILE: &str = "dump.vcd";

/// Default iteration ceiling of the evaluation loop.
pub const DEFAULT_MAX_STEPS: u64 = 1_000_000;

/// Default clock period in logical time units.
pub const DEFAULT_CLOCK_PERIOD: u64 = 10;

/// Parameters of the generated driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HarnessSpec {
    /// Top-level module; the model class is `V<top>`.
    pub top: String,
    /// Whether to drive `clock_port` from the loop.
    pub drive_clock: bool,
    /// Name of the clock input on the top module.
    pub clock_port: String,
    /// Clock period; the clock is high for the second half of each period.
    pub clock_period: u64,
    /// Hard ceiling on loop iterations.
    pub max_steps: u64,
    /// VCD output path.
    pub trace_file: String,
    /// Hierarchy depth passed to `trace()`.
    pub trace_depth: u32,
}

impl HarnessSpec {
    /// A spec with default clocking, ceiling, and trace settings.
    pub fn new(top: impl Into<String>, drive_clock: bool) -> Self {
        Self {
            top: top.into(),
            drive_clock,
            clock_port: "clk".to_string(),
            clock_period: DEFAULT_CLOCK_PERIOD,
            max_steps: DEFAULT_MAX_STEPS,
            trace_file: DEFAULT_TRACE_FILE.to_string(),
            trace_depth: 99,
        }
    }

    /// Overrides the iteration ceiling.
    pub fn with_max_steps(mut self, max_steps: u64) -> Self {
        self.max_steps = max_steps;
        self
    }
}

/// Renders the driver source for `spec`.
pub fn generate(spec: &HarnessSpec) -> String {
    let top = &spec.top;
    let model = format!("V{top}");
    let period = spec.clock_period.max(2);

    let mut out = format!(
        r#"#include "{model}.h"
#include "verilated.h"
#include "verilated_vcd_c.h"
#include <cstdint>

int main(int argc, char** argv) {{
    Verilated::commandArgs(argc, argv);
    {model}* dut = new {model};

    Verilated::traceEverOn(true);
    VerilatedVcdC* vcd = new VerilatedVcdC;
    dut->trace(vcd, {depth});
    vcd->open("{trace}");

    uint64_t t = 0;
    dut->eval();
    vcd->dump(t);

    while (!Verilated::gotFinish() && t < {max_steps}ULL) {{
        t++;
"#,
        depth = spec.trace_depth,
        trace = spec.trace_file,
        max_steps = spec.max_steps,
    );

    if spec.drive_clock {
        out.push_str(&format!(
            "        dut->{port} = (t % {period}) >= {half} ? 1 : 0;\n",
            port = spec.clock_port,
            half = period / 2,
        ));
    } else {
        out.push_str("        // self-clocking\n");
    }

    out.push_str(
        r#"        dut->eval();
        vcd->dump(t);
    }

    vcd->close();
    dut->final();
    delete vcd;
    delete dut;
    return 0;
}
"#,
    );
    out
}
