//! Configuration types deserialized from `simbox.toml`.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all) yields a working configuration for a stock Verilator install.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// The top-level service configuration parsed from `simbox.toml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ServiceConfig {
    /// External tool locations and UVM library search paths.
    #[serde(default)]
    pub toolchain: ToolchainConfig,
    /// Per-stage timeouts and result size caps.
    #[serde(default)]
    pub limits: Limits,
    /// Where and how request sandboxes are created.
    #[serde(default)]
    pub sandbox: SandboxSettings,
    /// Request defaults.
    #[serde(default)]
    pub request: RequestConfig,
}

/// External toolchain settings, queried once at startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    /// The HDL-to-C++ compiler (Verilator) executable.
    pub compiler: PathBuf,
    /// The `make` executable used for the native build.
    pub make: PathBuf,
    /// Whether the compiler emits C++ that needs a native build step.
    pub native_build: bool,
    /// The z3 solver, reported by health checks only.
    pub z3: PathBuf,
    /// Directories checked first for `uvm_pkg.sv`.
    pub uvm_dirs: Vec<PathBuf>,
    /// Roots searched recursively when no candidate directory matches.
    pub uvm_search_roots: Vec<PathBuf>,
}

impl Default for ToolchainConfig {
    fn default() -> Self {
        Self {
            compiler: PathBuf::from("verilator"),
            make: PathBuf::from("make"),
            native_build: true,
            z3: PathBuf::from("z3"),
            uvm_dirs: vec![
                PathBuf::from("/opt/uvm"),
                PathBuf::from("/usr/local/share/verilator/include/uvm-1.0"),
            ],
            uvm_search_roots: vec![PathBuf::from("/opt"), PathBuf::from("/usr/local")],
        }
    }
}

/// Timeouts, caps, and admission settings for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Limits {
    /// Timeout for the compile stage, in seconds.
    pub compile_timeout_secs: u64,
    /// Timeout for the native build stage, in seconds.
    pub build_timeout_secs: u64,
    /// Timeout for the run stage, in seconds.
    pub run_timeout_secs: u64,
    /// Maximum number of characters of run output returned.
    pub output_cap_chars: usize,
    /// Raw traces of this many bytes or more are not returned inline.
    pub raw_trace_cap_bytes: u64,
    /// Iteration ceiling of the generated harness loop.
    pub max_steps: u64,
    /// Maximum concurrently running pipelines; 0 disables admission control.
    pub max_concurrent: usize,
    /// Longest wait for a pipeline slot, in seconds; 0 waits indefinitely.
    pub admission_wait_secs: u64,
    /// Parallel jobs for the native build; 0 uses every available core.
    pub build_jobs: usize,
    /// Token in run output that marks a natural `$finish`.
    pub completion_marker: String,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            compile_timeout_secs: 60,
            build_timeout_secs: 120,
            run_timeout_secs: 60,
            output_cap_chars: 8000,
            raw_trace_cap_bytes: 4 * 1024 * 1024,
            max_steps: 1_000_000,
            max_concurrent: 0,
            admission_wait_secs: 0,
            build_jobs: 0,
            completion_marker: "$finish".to_string(),
        }
    }
}

impl Limits {
    /// Compile stage timeout.
    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    /// Build stage timeout.
    pub fn build_timeout(&self) -> Duration {
        Duration::from_secs(self.build_timeout_secs)
    }

    /// Run stage timeout.
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    /// Bounded admission wait, or `None` to wait until a slot frees.
    pub fn admission_wait(&self) -> Option<Duration> {
        (self.admission_wait_secs > 0).then(|| Duration::from_secs(self.admission_wait_secs))
    }
}

/// Sandbox placement and naming.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SandboxSettings {
    /// Parent directory for sandboxes; the system temp dir when unset.
    pub root: Option<PathBuf>,
    /// Prefix of every sandbox directory name.
    pub prefix: String,
    /// Identifier attempts before giving up on a collision.
    pub create_attempts: u32,
}

impl Default for SandboxSettings {
    fn default() -> Self {
        Self {
            root: None,
            prefix: "sim_".to_string(),
            create_attempts: 8,
        }
    }
}

impl SandboxSettings {
    /// Returns the configured root or the system temp directory.
    pub fn root_dir(&self) -> PathBuf {
        self.root.clone().unwrap_or_else(std::env::temp_dir)
    }
}

/// Defaults applied to incoming requests.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Top module used when a request names none.
    pub default_top: String,
    /// File name for single-blob requests.
    pub default_file_name: String,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            default_top: "tb_top".to_string(),
            default_file_name: "design.sv".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_durations() {
        let limits = Limits::default();
        assert_eq!(limits.compile_timeout(), Duration::from_secs(60));
        assert_eq!(limits.build_timeout(), Duration::from_secs(120));
        assert_eq!(limits.run_timeout(), Duration::from_secs(60));
        assert_eq!(limits.admission_wait(), None);
        let bounded = Limits {
            admission_wait_secs: 3,
            ..Limits::default()
        };
        assert_eq!(bounded.admission_wait(), Some(Duration::from_secs(3)));
    }

    #[test]
    fn sandbox_root_falls_back_to_temp() {
        let s = SandboxSettings::default();
        assert_eq!(s.root_dir(), std::env::temp_dir());
        let s = SandboxSettings {
            root: Some(PathBuf::from("/var/simbox")),
            ..SandboxSettings::default()
        };
        assert_eq!(s.root_dir(), PathBuf::from("/var/simbox"));
    }
}
