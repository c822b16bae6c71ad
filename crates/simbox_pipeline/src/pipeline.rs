//! The ordered compile, build, and run stages.

use simbox_common::Stage;
use simbox_config::{Limits, Toolchain};

use crate::args::{build_spec, compile_spec, default_jobs, run_spec, StagePlan};
use crate::process::ExitClass;
use crate::runner::ToolRunner;

/// What the stages produced, before result assembly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PipelineReport {
    /// `Compile`, `Build` or `Run` for a stage that failed before the design
    /// ran; `Done` once the run stage completed.
    pub stage: Stage,
    /// Success after reconciling the run against the completion marker.
    pub success: bool,
    /// Diagnostic text for a failure.
    pub errors: Option<String>,
    /// Combined run output; empty unless the run stage executed.
    pub output: String,
}

impl PipelineReport {
    fn failed(stage: Stage, errors: String) -> Self {
        Self {
            stage,
            success: false,
            errors: Some(errors),
            output: String::new(),
        }
    }

    /// Whether the run stage executed, so a trace may exist.
    pub fn completed(&self) -> bool {
        self.stage == Stage::Done
    }
}

/// Drives the stages for one request through a [`ToolRunner`].
pub struct ToolchainPipeline<'a, R: ToolRunner + ?Sized> {
    runner: &'a R,
    toolchain: &'a Toolchain,
    limits: &'a Limits,
    jobs: usize,
}

impl<'a, R: ToolRunner + ?Sized> ToolchainPipeline<'a, R> {
    /// Creates a pipeline using all available cores for the native build.
    pub fn new(runner: &'a R, toolchain: &'a Toolchain, limits: &'a Limits) -> Self {
        Self {
            runner,
            toolchain,
            limits,
            jobs: default_jobs(),
        }
    }

    /// Overrides build parallelism.
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    /// Runs the stages in order, stopping at the first compile or build failure.
    ///
    /// The run stage is lenient: a non-zero exit or a timeout still counts as
    /// success when the output contains the completion marker.
    pub fn run(&self, plan: &StagePlan<'_>) -> PipelineReport {
        let spec = compile_spec(self.toolchain, plan, self.limits.compile_timeout());
        let outcome = self.runner.run(Stage::Compile, &spec);
        if !outcome.class.is_success() {
            tracing::info!(exit = %outcome.class, "compile failed");
            return PipelineReport::failed(Stage::Compile, outcome.failure_text(&spec));
        }

        if self.toolchain.native_build {
            let spec = build_spec(self.toolchain, plan, self.jobs, self.limits.build_timeout());
            let outcome = self.runner.run(Stage::Build, &spec);
            if !outcome.class.is_success() {
                tracing::info!(exit = %outcome.class, "build failed");
                return PipelineReport::failed(Stage::Build, outcome.failure_text(&spec));
            }
        }

        let spec = run_spec(plan, self.limits.run_timeout());
        let outcome = self.runner.run(Stage::Run, &spec);
        if let ExitClass::SpawnError(_) = outcome.class {
            tracing::info!(exit = %outcome.class, "simulation binary did not start");
            return PipelineReport::failed(Stage::Run, outcome.failure_text(&spec));
        }

        let output = outcome.combined_output();
        let finished = output.contains(&self.limits.completion_marker);
        let success = outcome.class.is_success() || finished;
        tracing::info!(exit = %outcome.class, finished, success, "simulation ran");

        PipelineReport {
            stage: Stage::Done,
            success,
            errors: if success { None } else { Some(output.clone()) },
            output,
        }
    }
}
