//! Request-to-result orchestration.

use std::path::Path;
use std::sync::Arc;

use simbox_common::{
    truncate_chars, ResolveOptions, SimulationRequest, SimulationResult, Stage,
};
use simbox_config::{Limits, RequestConfig, SandboxSettings, ServiceConfig, Toolchain};
use simbox_harness::{generate, HarnessSpec, DEFAULT_TRACE_FILE, HARNESS_FILE_NAME};
use simbox_sandbox::{Sandbox, OBJ_DIR_NAME};
use simbox_source::{detect_files, transform_files, PatternDetector};
use simbox_vcd::parse_waveform_file;

use crate::admission::{AdmissionGate, AdmissionPermit};
use crate::args::StagePlan;
use crate::error::SimulateError;
use crate::pipeline::{PipelineReport, ToolchainPipeline};
use crate::runner::{SystemRunner, ToolRunner};

/// Names the service writes into every sandbox; user sources may not use them.
pub const RESERVED_NAMES: &[&str] = &[HARNESS_FILE_NAME, OBJ_DIR_NAME, DEFAULT_TRACE_FILE];

/// Runs simulation requests end to end.
///
/// A `Simulator` is immutable once built and can be shared across threads;
/// each call to [`simulate`](Self::simulate) works in its own sandbox.
pub struct Simulator<R = SystemRunner> {
    toolchain: Arc<Toolchain>,
    limits: Limits,
    sandbox: SandboxSettings,
    request: RequestConfig,
    runner: R,
    gate: Option<Arc<AdmissionGate>>,
}

impl<R: ToolRunner> Simulator<R> {
    /// Creates a simulator. Admission control is enabled when
    /// `limits.max_concurrent` is non-zero.
    pub fn new(
        toolchain: Arc<Toolchain>,
        limits: Limits,
        sandbox: SandboxSettings,
        runner: R,
    ) -> Self {
        let gate = (limits.max_concurrent > 0).then(|| AdmissionGate::new(limits.max_concurrent));
        Self {
            toolchain,
            limits,
            sandbox,
            request: RequestConfig::default(),
            runner,
            gate,
        }
    }

    /// Creates a simulator from a loaded configuration.
    pub fn from_config(config: &ServiceConfig, toolchain: Arc<Toolchain>, runner: R) -> Self {
        Self::new(
            toolchain,
            config.limits.clone(),
            config.sandbox.clone(),
            runner,
        )
        .with_request_defaults(config.request.clone())
    }

    /// Overrides the default top module and single-blob file name.
    pub fn with_request_defaults(mut self, request: RequestConfig) -> Self {
        self.request = request;
        self
    }

    /// The toolchain this simulator drives.
    pub fn toolchain(&self) -> &Toolchain {
        &self.toolchain
    }

    /// Validates, stages, compiles, builds, and runs one request.
    ///
    /// Stage failures are reported in the returned result. The sandbox is
    /// removed on every path out of this function.
    ///
    /// # Errors
    ///
    /// [`SimulateError::Request`] for an invalid request (no sandbox is
    /// created); [`SimulateError::Sandbox`] or [`SimulateError::Io`] when the
    /// sandbox cannot be prepared.
    pub fn simulate(&self, request: &SimulationRequest) -> Result<SimulationResult, SimulateError> {
        let resolved = request.resolve(&ResolveOptions {
            default_top: &self.request.default_top,
            default_file_name: &self.request.default_file_name,
            reserved_names: RESERVED_NAMES,
        })?;

        let _permit = self.admit()?;

        let sandbox = Sandbox::create(&self.sandbox)?;
        let span = tracing::info_span!("simulate", sandbox = sandbox.id(), top = %resolved.top);
        let _enter = span.enter();

        let obj_dir = sandbox.obj_dir()?;
        let staged = sandbox.stage(&resolved.units)?;

        // Classify before rewriting: the rewrite removes evidence.
        let detection = detect_files(&PatternDetector, &staged, &resolved.top)
            .map_err(|e| SimulateError::io(sandbox.path(), e))?;
        tracing::info!(
            units = staged.len(),
            uses_methodology = detection.uses_methodology,
            has_clock_port = detection.has_clock_port,
            "sources staged"
        );
        transform_files(&staged, detection.uses_methodology)
            .map_err(|e| SimulateError::io(sandbox.path(), e))?;

        let harness = HarnessSpec::new(resolved.top.as_str(), detection.has_clock_port)
            .with_max_steps(self.limits.max_steps);
        let harness_path = sandbox.write_file(HARNESS_FILE_NAME, &generate(&harness))?;

        let plan = StagePlan {
            sandbox: sandbox.path(),
            obj_dir: &obj_dir,
            harness: &harness_path,
            units: &staged,
            top: &resolved.top,
            uses_methodology: detection.uses_methodology,
        };
        let mut pipeline = ToolchainPipeline::new(&self.runner, &self.toolchain, &self.limits);
        if self.limits.build_jobs > 0 {
            pipeline = pipeline.with_jobs(self.limits.build_jobs);
        }
        let report = pipeline.run(&plan);

        let result = if report.completed() {
            self.assemble(report, &sandbox.join(DEFAULT_TRACE_FILE))
        } else {
            let errors = report.errors.unwrap_or_default();
            let errors = truncate_chars(&errors, self.limits.output_cap_chars);
            SimulationResult::stage_failure(report.stage, errors)
        };
        tracing::info!(success = result.success, stage = %result.stage, "simulation finished");
        Ok(result)
    }

    /// Takes a pipeline slot when admission control is on.
    ///
    /// A free slot is taken immediately; otherwise the request waits, for at
    /// most `limits.admission_wait_secs` when that is set.
    fn admit(&self) -> Result<Option<AdmissionPermit>, SimulateError> {
        let Some(gate) = &self.gate else {
            return Ok(None);
        };
        if let Some(permit) = gate.try_acquire() {
            return Ok(Some(permit));
        }
        tracing::info!(capacity = gate.capacity(), "all simulation slots busy");
        match self.limits.admission_wait() {
            None => Ok(Some(gate.acquire())),
            Some(wait) => gate
                .acquire_timeout(wait)
                .map(Some)
                .ok_or(SimulateError::Busy { waited: wait }),
        }
    }

    fn assemble(&self, report: PipelineReport, trace: &Path) -> SimulationResult {
        let cap = self.limits.output_cap_chars;
        SimulationResult {
            success: report.success,
            stage: Stage::Done,
            errors: report.errors.map(|e| truncate_chars(&e, cap).to_string()),
            output: truncate_chars(&report.output, cap).to_string(),
            signals: parse_waveform_file(trace),
            raw_trace: read_raw_trace(trace, self.limits.raw_trace_cap_bytes),
        }
    }
}

/// Reads the trace text when it is strictly smaller than `cap` bytes.
fn read_raw_trace(path: &Path, cap: u64) -> Option<String> {
    let len = std::fs::metadata(path).ok()?.len();
    if len >= cap {
        tracing::debug!(bytes = len, cap, "raw trace over cap; omitted");
        return None;
    }
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            tracing::warn!(file = %path.display(), error = %e, "cannot read trace");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use simbox_common::{RequestError, SourceUnit};
    use simbox_config::ToolchainConfig;

    use crate::process::{ExitClass, ProcessOutcome, ProcessSpec};

    const VCD: &str = "\
$scope module tb_top $end
$var wire 1 ! clk $end
$upscope $end
$enddefinitions $end
#0
0!
#5
1!
";

    /// Succeeds every stage; the run writes `VCD` into its working directory.
    #[derive(Default)]
    struct FakeTools {
        calls: Mutex<Vec<(Stage, ProcessSpec)>>,
        fail: Option<Stage>,
        run_output: &'static str,
    }

    impl ToolRunner for FakeTools {
        fn run(&self, stage: Stage, spec: &ProcessSpec) -> ProcessOutcome {
            self.calls.lock().unwrap().push((stage, spec.clone()));
            if self.fail == Some(stage) {
                return ProcessOutcome::new(ExitClass::NonZero(1), "", format!("{stage} broke"));
            }
            if stage == Stage::Run {
                let cwd = spec.cwd.as_ref().unwrap();
                std::fs::write(cwd.join(DEFAULT_TRACE_FILE), VCD).unwrap();
                return ProcessOutcome::success(self.run_output);
            }
            ProcessOutcome::success("")
        }
    }

    fn simulator(root: &Path, tools: FakeTools) -> Simulator<FakeTools> {
        let toolchain = Arc::new(Toolchain::undiscovered(&ToolchainConfig::default()));
        let sandbox = SandboxSettings {
            root: Some(root.to_path_buf()),
            ..SandboxSettings::default()
        };
        Simulator::new(toolchain, Limits::default(), sandbox, tools)
    }

    fn entries(root: &Path) -> usize {
        std::fs::read_dir(root).map(|d| d.count()).unwrap_or(0)
    }

    #[test]
    fn completed_run_collects_trace_and_cleans_up() {
        let tmp = tempfile::TempDir::new().unwrap();
        let tools = FakeTools {
            run_output: "$finish\n",
            ..FakeTools::default()
        };
        let sim = simulator(tmp.path(), tools);
        let result = sim
            .simulate(&SimulationRequest::from_code("module tb_top(input clk); endmodule"))
            .unwrap();
        assert!(result.success);
        assert_eq!(result.stage, Stage::Done);
        assert_eq!(result.output, "$finish\n");
        let signals = result.signals.unwrap();
        assert_eq!(signals["clk"].values.len(), 2);
        assert_eq!(result.raw_trace.as_deref(), Some(VCD));
        assert_eq!(entries(tmp.path()), 0);
    }

    #[test]
    fn compile_failure_is_tagged_and_cleans_up() {
        let tmp = tempfile::TempDir::new().unwrap();
        let tools = FakeTools {
            fail: Some(Stage::Compile),
            ..FakeTools::default()
        };
        let sim = simulator(tmp.path(), tools);
        let result = sim.simulate(&SimulationRequest::from_code("module")).unwrap();
        assert!(!result.success);
        assert_eq!(result.stage, Stage::Compile);
        assert_eq!(result.errors.as_deref(), Some("compile broke"));
        assert!(result.signals.is_none());
        assert_eq!(sim.runner.calls.lock().unwrap().len(), 1);
        assert_eq!(entries(tmp.path()), 0);
    }

    #[test]
    fn request_errors_create_no_sandbox() {
        let tmp = tempfile::TempDir::new().unwrap();
        let root = tmp.path().join("never");
        let sim = simulator(&root, FakeTools::default());

        let err = sim.simulate(&SimulationRequest::default()).unwrap_err();
        assert!(matches!(err, SimulateError::Request(RequestError::NoSource)));

        let reserved = SimulationRequest::from_files(vec![SourceUnit::new("main.cpp", "x")]);
        let err = sim.simulate(&reserved).unwrap_err();
        assert!(matches!(err, SimulateError::Request(RequestError::ReservedFileName(_))));

        assert!(!root.exists());
        assert!(sim.runner.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn harness_and_rewritten_sources_reach_compiler() {
        let tmp = tempfile::TempDir::new().unwrap();
        struct Inspect(Mutex<Option<(String, String)>>);
        impl ToolRunner for Inspect {
            fn run(&self, stage: Stage, spec: &ProcessSpec) -> ProcessOutcome {
                if stage == Stage::Compile {
                    let cwd = spec.cwd.as_ref().unwrap();
                    let harness = std::fs::read_to_string(cwd.join(HARNESS_FILE_NAME)).unwrap();
                    let source = std::fs::read_to_string(cwd.join("tb.sv")).unwrap();
                    *self.0.lock().unwrap() = Some((harness, source));
                }
                ProcessOutcome::new(ExitClass::NonZero(1), "", "stop")
            }
        }
        let toolchain = Arc::new(Toolchain::undiscovered(&ToolchainConfig::default()));
        let sandbox = SandboxSettings {
            root: Some(tmp.path().to_path_buf()),
            ..SandboxSettings::default()
        };
        let sim = Simulator::new(toolchain, Limits::default(), sandbox, Inspect(Mutex::new(None)));
        let request = SimulationRequest::from_files(vec![SourceUnit::new(
            "tb.sv",
            "module top(input logic clk); initial $dumpvars; endmodule",
        )])
        .with_top("top");
        sim.simulate(&request).unwrap();

        let (harness, source) = sim.runner.0.lock().unwrap().take().unwrap();
        assert!(harness.contains("#include \"Vtop.h\""));
        assert!(harness.contains("dut->clk = "));
        assert!(source.contains("/* $dumpvars removed by simbox */;"));
    }

    #[test]
    fn output_truncated_to_cap() {
        let tmp = tempfile::TempDir::new().unwrap();
        let tools = FakeTools {
            run_output: "0123456789",
            ..FakeTools::default()
        };
        let mut sim = simulator(tmp.path(), tools);
        sim.limits.output_cap_chars = 4;
        let result = sim.simulate(&SimulationRequest::from_code("module tb_top; endmodule")).unwrap();
        assert!(result.success);
        assert_eq!(result.output, "0123");
    }

    #[test]
    fn raw_trace_omitted_at_cap() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut sim = simulator(tmp.path(), FakeTools::default());
        sim.limits.raw_trace_cap_bytes = VCD.len() as u64;
        let result = sim.simulate(&SimulationRequest::from_code("module tb_top; endmodule")).unwrap();
        assert!(result.raw_trace.is_none());
        assert!(result.signals.is_some());
    }

    #[test]
    fn stage_failure_errors_truncated_to_cap() {
        let tmp = tempfile::TempDir::new().unwrap();
        struct LongCompileError;
        impl ToolRunner for LongCompileError {
            fn run(&self, _stage: Stage, _spec: &ProcessSpec) -> ProcessOutcome {
                ProcessOutcome::new(ExitClass::NonZero(1), "", "E".repeat(100))
            }
        }
        let toolchain = Arc::new(Toolchain::undiscovered(&ToolchainConfig::default()));
        let sandbox = SandboxSettings {
            root: Some(tmp.path().to_path_buf()),
            ..SandboxSettings::default()
        };
        let limits = Limits {
            output_cap_chars: 10,
            ..Limits::default()
        };
        let sim = Simulator::new(toolchain, limits, sandbox, LongCompileError);
        let result = sim.simulate(&SimulationRequest::from_code("module tb_top; endmodule")).unwrap();
        assert_eq!(result.stage, Stage::Compile);
        assert_eq!(result.errors.as_deref(), Some("EEEEEEEEEE"));
    }

    #[test]
    fn configured_build_jobs_reach_make() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut sim = simulator(tmp.path(), FakeTools::default());
        sim.limits.build_jobs = 3;
        sim.simulate(&SimulationRequest::from_code("module tb_top; endmodule")).unwrap();
        let calls = sim.runner.calls.lock().unwrap();
        let (stage, build) = &calls[1];
        assert_eq!(*stage, Stage::Build);
        assert_eq!(build.args.last().map(String::as_str), Some("-j3"));
    }

    #[test]
    fn full_gate_with_bounded_wait_is_busy() {
        let tmp = tempfile::TempDir::new().unwrap();
        let mut sim = simulator(tmp.path(), FakeTools::default());
        sim.limits.admission_wait_secs = 1;
        sim.gate = Some(AdmissionGate::new(1));
        let held = sim.gate.as_ref().unwrap().try_acquire().unwrap();

        let err = sim
            .simulate(&SimulationRequest::from_code("module tb_top; endmodule"))
            .unwrap_err();
        assert!(matches!(err, SimulateError::Busy { .. }));
        assert!(sim.runner.calls.lock().unwrap().is_empty());
        assert_eq!(entries(tmp.path()), 0);

        drop(held);
        assert!(sim
            .simulate(&SimulationRequest::from_code("module tb_top; endmodule"))
            .is_ok());
    }

    #[test]
    fn admission_gate_from_limits() {
        let tmp = tempfile::TempDir::new().unwrap();
        let toolchain = Arc::new(Toolchain::undiscovered(&ToolchainConfig::default()));
        let limits = Limits {
            max_concurrent: 2,
            ..Limits::default()
        };
        let sim = Simulator::new(toolchain, limits, SandboxSettings::default(), FakeTools::default());
        assert_eq!(sim.gate.as_ref().map(|g| g.capacity()), Some(2));
        assert!(simulator(tmp.path(), FakeTools::default()).gate.is_none());
    }
}
