//! Conformance test helpers for simbox.
//!
//! Provides source and trace fixtures plus a scripted [`ToolRunner`] so the
//! whole request pipeline (resolve, stage, detect, rewrite, compile, build,
//! run, collect) can be exercised without a Verilator installation.

#![warn(missing_docs)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use simbox_common::Stage;
use simbox_config::{Limits, SandboxSettings, Toolchain, ToolchainConfig};
use simbox_harness::DEFAULT_TRACE_FILE;
use simbox_pipeline::{ExitClass, ProcessOutcome, ProcessSpec, Simulator, ToolRunner};

/// A two-signal trace: a clock and a 4-bit bus.
pub const CLK_DATA_VCD: &str = "\
$timescale 1ns $end
$scope module tb_top $end
$var wire 1 ! clk $end
$var wire 4 \" data [3:0] $end
$upscope $end
$enddefinitions $end
#0
0!
b0000 \"
#5
1!
#10
0!
b1010 \"
";

/// A methodology testbench that carries its own preamble and dump calls.
pub const UVM_TESTBENCH: &str = r#"`include "uvm_macros.svh"
import uvm_pkg::*;

class smoke_test extends uvm_test;
  `uvm_component_utils(smoke_test)
  function new(string name, uvm_component parent);
    super.new(name, parent);
  endfunction
endclass

module tb_top;
  initial begin
    $dumpfile("waves.vcd");
    $dumpvars(0, tb_top);
    run_test("smoke_test");
  end
endmodule
"#;

/// A plain clocked testbench with no methodology.
pub const PLAIN_TESTBENCH: &str = r#"module tb_top(input logic clk);
  logic [3:0] count = 0;
  always @(posedge clk) count <= count + 1;
  initial begin
    $dumpvars;
    #100 $finish;
  end
endmodule
"#;

/// A self-clocking testbench with no ports.
pub const SELF_CLOCKED_TESTBENCH: &str = r#"module tb_top;
  logic clk = 0;
  always #5 clk = ~clk;
  initial #50 $finish;
endmodule
"#;

/// One recorded tool invocation.
#[derive(Clone, Debug)]
pub struct RecordedCall {
    /// The stage the invocation belonged to.
    pub stage: Stage,
    /// What was launched.
    pub spec: ProcessSpec,
    /// Files in the working directory at launch, by name.
    pub files: HashMap<String, String>,
}

/// A [`ToolRunner`] with scripted per-stage outcomes.
///
/// Stages without a script succeed with empty output. A successful run
/// writes the configured trace into its working directory, as the
/// generated harness would.
#[derive(Default)]
pub struct FakeRunner {
    outcomes: Mutex<HashMap<Stage, ProcessOutcome>>,
    trace: Mutex<Option<String>>,
    panic_on: Mutex<Option<Stage>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl FakeRunner {
    /// A runner whose every stage succeeds and whose run emits `trace`.
    pub fn with_trace(trace: &str) -> Self {
        let runner = Self::default();
        runner.set_trace(Some(trace));
        runner
    }

    /// Scripts the outcome of `stage`.
    pub fn script(self, stage: Stage, outcome: ProcessOutcome) -> Self {
        lock(&self.outcomes).insert(stage, outcome);
        self
    }

    /// Makes `stage` panic instead of returning.
    pub fn panicking_at(self, stage: Stage) -> Self {
        *lock(&self.panic_on) = Some(stage);
        self
    }

    /// Sets or clears the trace the run stage writes.
    pub fn set_trace(&self, trace: Option<&str>) {
        *lock(&self.trace) = trace.map(str::to_string);
    }

    /// Every invocation so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        lock(&self.calls).clone()
    }

    /// The stages invoked so far, in order.
    pub fn stages(&self) -> Vec<Stage> {
        lock(&self.calls).iter().map(|c| c.stage).collect()
    }
}

impl ToolRunner for FakeRunner {
    fn run(&self, stage: Stage, spec: &ProcessSpec) -> ProcessOutcome {
        let cwd = spec.cwd.clone().unwrap_or_else(|| PathBuf::from("."));
        lock(&self.calls).push(RecordedCall {
            stage,
            spec: spec.clone(),
            files: snapshot(&cwd),
        });
        if *lock(&self.panic_on) == Some(stage) {
            panic!("scripted panic at {stage}");
        }
        let outcome = lock(&self.outcomes)
            .get(&stage)
            .cloned()
            .unwrap_or_else(|| ProcessOutcome::success(""));
        if stage == Stage::Run && !matches!(outcome.class, ExitClass::SpawnError(_)) {
            if let Some(trace) = lock(&self.trace).as_deref() {
                std::fs::write(cwd.join(DEFAULT_TRACE_FILE), trace)
                    .unwrap_or_else(|e| panic!("cannot write trace: {e}"));
            }
        }
        outcome
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|p| p.into_inner())
}

fn snapshot(dir: &Path) -> HashMap<String, String> {
    let mut files = HashMap::new();
    let Ok(entries) = std::fs::read_dir(dir) else {
        return files;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if let Ok(text) = std::fs::read_to_string(&path) {
            files.insert(entry.file_name().to_string_lossy().into_owned(), text);
        }
    }
    files
}

/// A simulator over `runner` whose sandboxes live under `root`.
///
/// The toolchain is never queried; the run is built natively and no UVM
/// library is present.
pub fn make_simulator(root: &Path, runner: Arc<FakeRunner>) -> Simulator<Arc<FakeRunner>> {
    make_simulator_with_limits(root, runner, Limits::default())
}

/// Like [`make_simulator`] with custom limits.
pub fn make_simulator_with_limits(
    root: &Path,
    runner: Arc<FakeRunner>,
    limits: Limits,
) -> Simulator<Arc<FakeRunner>> {
    let toolchain = Arc::new(Toolchain::undiscovered(&ToolchainConfig::default()));
    let sandbox = SandboxSettings {
        root: Some(root.to_path_buf()),
        ..SandboxSettings::default()
    };
    Simulator::new(toolchain, limits, sandbox, runner)
}

/// Number of entries directly under `dir` (zero when it does not exist).
pub fn sandbox_count(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}
