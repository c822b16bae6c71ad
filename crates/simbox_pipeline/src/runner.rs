//! The seam between the pipeline and the operating system.

use std::sync::Arc;

use simbox_common::Stage;

use crate::process::{run_process, ProcessOutcome, ProcessSpec};

/// Executes one stage's tool invocation.
///
/// The pipeline only ever talks to tools through this trait, so tests can
/// substitute a scripted runner and count invocations per stage.
pub trait ToolRunner: Send + Sync {
    /// Runs `spec` on behalf of `stage` and reports how it ended.
    fn run(&self, stage: Stage, spec: &ProcessSpec) -> ProcessOutcome;
}

/// Runs real processes.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(&self, stage: Stage, spec: &ProcessSpec) -> ProcessOutcome {
        tracing::debug!(%stage, command = %spec.command_line(), "running tool");
        let outcome = run_process(spec);
        tracing::debug!(%stage, exit = %outcome.class, "tool finished");
        outcome
    }
}

impl<T: ToolRunner + ?Sized> ToolRunner for Arc<T> {
    fn run(&self, stage: Stage, spec: &ProcessSpec) -> ProcessOutcome {
        (**self).run(stage, spec)
    }
}

impl<T: ToolRunner + ?Sized> ToolRunner for &T {
    fn run(&self, stage: Stage, spec: &ProcessSpec) -> ProcessOutcome {
        (**self).run(stage, spec)
    }
}
