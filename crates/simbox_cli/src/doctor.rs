//! `simbox doctor`: report what the service would run with.

use std::path::PathBuf;

use serde::Serialize;
use simbox_config::{discover_toolchain, Toolchain};

use crate::context::load_service_config;
use crate::run::print_json;
use crate::{DoctorArgs, GlobalArgs};

/// Toolchain health, in the shape of the service's health route.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    /// `ok` when the compiler answered, `degraded` otherwise.
    pub status: &'static str,
    /// simbox version.
    pub version: &'static str,
    /// Configured compiler.
    pub compiler: PathBuf,
    /// First line of `<compiler> --version`.
    pub compiler_version: Option<String>,
    /// Configured build tool.
    pub make: PathBuf,
    /// First line of `<make> --version`.
    pub make_version: Option<String>,
    /// Whether the compiled model is built natively.
    pub native_build: bool,
    /// Configured z3 solver.
    pub z3: PathBuf,
    /// First line of `z3 --version`.
    pub z3_version: Option<String>,
    /// Discovered UVM library directory.
    pub uvm_dir: Option<PathBuf>,
    /// Whether `uvm_pkg.sv` exists in that directory.
    pub uvm_pkg_exists: bool,
}

impl HealthReport {
    /// Summarises a discovered toolchain.
    pub fn from_toolchain(toolchain: &Toolchain) -> Self {
        Self {
            status: if toolchain.compiler_version.is_some() {
                "ok"
            } else {
                "degraded"
            },
            version: env!("CARGO_PKG_VERSION"),
            compiler: toolchain.compiler.clone(),
            compiler_version: toolchain.compiler_version.clone(),
            make: toolchain.make.clone(),
            make_version: toolchain.make_version.clone(),
            native_build: toolchain.native_build,
            z3: toolchain.z3.clone(),
            z3_version: toolchain.z3_version.clone(),
            uvm_dir: toolchain.uvm.as_ref().map(|u| u.dir.clone()),
            uvm_pkg_exists: toolchain.uvm.as_ref().is_some_and(|u| u.package_exists()),
        }
    }

    fn render_text(&self) -> String {
        let or_missing = |v: &Option<String>| v.clone().unwrap_or_else(|| "not found".to_string());
        let mut lines = vec![
            format!("simbox {}: {}", self.version, self.status),
            format!(
                "  compiler: {} ({})",
                self.compiler.display(),
                or_missing(&self.compiler_version)
            ),
        ];
        if self.native_build {
            lines.push(format!(
                "  make: {} ({})",
                self.make.display(),
                or_missing(&self.make_version)
            ));
        }
        lines.push(format!(
            "  z3: {} ({})",
            self.z3.display(),
            or_missing(&self.z3_version)
        ));
        match &self.uvm_dir {
            Some(dir) => lines.push(format!(
                "  uvm: {} (uvm_pkg.sv {})",
                dir.display(),
                if self.uvm_pkg_exists { "present" } else { "missing" }
            )),
            None => lines.push("  uvm: not found".to_string()),
        }
        lines.join("\n")
    }
}

/// Runs the `simbox doctor` command.
///
/// Returns exit code 0 when the compiler is usable, 1 otherwise.
pub fn run(args: &DoctorArgs, global: &GlobalArgs) -> Result<i32, Box<dyn std::error::Error>> {
    let config = load_service_config(global)?;
    let report = HealthReport::from_toolchain(&discover_toolchain(&config.toolchain));
    if args.json {
        print_json(&report, true)?;
    } else {
        println!("{}", report.render_text());
    }
    Ok(if report.status == "ok" { 0 } else { 1 })
}

#[cfg(test)]
mod tests {
    use super::*;
    use simbox_config::{ToolchainConfig, UvmLibrary};

    #[test]
    fn undiscovered_toolchain_is_degraded() {
        let report = HealthReport::from_toolchain(&Toolchain::undiscovered(&ToolchainConfig::default()));
        assert_eq!(report.status, "degraded");
        assert!(report.uvm_dir.is_none());
        assert!(!report.uvm_pkg_exists);
        assert!(report.render_text().contains("uvm: not found"));
        assert!(report.render_text().contains("z3: z3 (not found)"));
    }

    #[test]
    fn json_shape() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(tmp.path().join("uvm_pkg.sv"), "").unwrap();
        let mut tc = Toolchain::undiscovered(&ToolchainConfig::default());
        tc.compiler_version = Some("Verilator 5.020 2024-01-01".into());
        tc.z3_version = Some("Z3 version 4.8.12 - 64 bit".into());
        tc.uvm = Some(UvmLibrary {
            dir: tmp.path().to_path_buf(),
        });
        let report = HealthReport::from_toolchain(&tc);
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["compilerVersion"], "Verilator 5.020 2024-01-01");
        assert_eq!(json["uvmPkgExists"], true);
        assert!(json["makeVersion"].is_null());
        assert_eq!(json["z3"], "z3");
        assert_eq!(json["z3Version"], "Z3 version 4.8.12 - 64 bit");
        assert!(report.render_text().contains("uvm_pkg.sv present"));
    }
}
