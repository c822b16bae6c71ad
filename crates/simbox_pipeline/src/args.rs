//! Argument vectors for the three pipeline stages.

use std::path::{Path, PathBuf};
use std::time::Duration;

use simbox_config::Toolchain;

use crate::process::ProcessSpec;

const OUTPUT_FLAGS: &[&str] = &["--cc", "--sv", "--trace", "--exe"];

const WARNING_FLAGS: &[&str] = &[
    "-Wno-fatal",
    "-Wno-lint",
    "-Wno-style",
    "-Wno-UNOPTFLAT",
    "-Wno-MULTIDRIVEN",
    "-Wno-TIMESCALEMOD",
    "-Wno-DEFOVERRIDE",
];

const METHODOLOGY_FLAGS: &[&str] = &[
    "--timing",
    "--assert",
    "+define+UVM_NO_DPI",
    "+define+UVM_REGEX_NO_DPI",
    "+define+UVM_OBJECT_MUST_HAVE_CONSTRUCTOR",
    "+define+UVM_NO_DEPRECATED",
];

/// Paths and choices for one request's stages.
#[derive(Clone, Debug)]
pub struct StagePlan<'a> {
    /// Sandbox directory; working directory of compile and run.
    pub sandbox: &'a Path,
    /// Compiler output directory.
    pub obj_dir: &'a Path,
    /// The generated harness source.
    pub harness: &'a Path,
    /// Staged source units in request order.
    pub units: &'a [PathBuf],
    /// Top-level module.
    pub top: &'a str,
    /// Whether the sources use the UVM methodology.
    pub uses_methodology: bool,
}

/// Name of the compiled model, also the makefile stem and binary name.
pub fn model_name(top: &str) -> String {
    format!("V{top}")
}

/// Parallelism passed to the native build.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

fn path_arg(path: &Path) -> String {
    path.display().to_string()
}

/// Compiler arguments, in order: output mode and harness, warning
/// suppressions, output directory and top, UVM include paths (whenever a
/// library is installed), methodology flags and package (only when used),
/// then the staged units.
pub fn compile_args(toolchain: &Toolchain, plan: &StagePlan<'_>) -> Vec<String> {
    let mut args: Vec<String> = OUTPUT_FLAGS.iter().map(|s| s.to_string()).collect();
    args.push(path_arg(plan.harness));
    args.extend(WARNING_FLAGS.iter().map(|s| s.to_string()));
    args.push("--Mdir".to_string());
    args.push(path_arg(plan.obj_dir));
    args.push("--top-module".to_string());
    args.push(plan.top.to_string());

    if let Some(uvm) = &toolchain.uvm {
        args.push(format!("+incdir+{}", uvm.dir.display()));
        args.push(format!("+incdir+{}", uvm.macros_dir().display()));
        args.push(format!("-I{}", uvm.dir.display()));
    }

    if plan.uses_methodology {
        args.extend(METHODOLOGY_FLAGS.iter().map(|s| s.to_string()));
        match &toolchain.uvm {
            Some(uvm) if uvm.package_exists() => args.push(path_arg(&uvm.package())),
            _ => tracing::warn!("methodology detected but no UVM package is installed"),
        }
    }

    args.extend(plan.units.iter().map(|p| path_arg(p)));
    args
}

/// Native build arguments: `-C <obj> -f V<top>.mk V<top> -j<jobs>`.
pub fn build_args(plan: &StagePlan<'_>, jobs: usize) -> Vec<String> {
    let model = model_name(plan.top);
    vec![
        "-C".to_string(),
        path_arg(plan.obj_dir),
        "-f".to_string(),
        format!("{model}.mk"),
        model,
        format!("-j{}", jobs.max(1)),
    ]
}

/// The compile invocation, run inside the sandbox.
pub fn compile_spec(toolchain: &Toolchain, plan: &StagePlan<'_>, timeout: Duration) -> ProcessSpec {
    ProcessSpec::new(&toolchain.compiler, timeout)
        .with_args(compile_args(toolchain, plan))
        .in_dir(plan.sandbox)
}

/// The native build invocation.
pub fn build_spec(
    toolchain: &Toolchain,
    plan: &StagePlan<'_>,
    jobs: usize,
    timeout: Duration,
) -> ProcessSpec {
    ProcessSpec::new(&toolchain.make, timeout)
        .with_args(build_args(plan, jobs))
        .in_dir(plan.sandbox)
}

/// The simulation binary, run inside the sandbox so its trace lands there.
pub fn run_spec(plan: &StagePlan<'_>, timeout: Duration) -> ProcessSpec {
    ProcessSpec::new(plan.obj_dir.join(model_name(plan.top)), timeout).in_dir(plan.sandbox)
}
