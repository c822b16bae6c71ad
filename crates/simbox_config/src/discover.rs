//! Startup-time discovery of the external toolchain.
//!
//! Discovery happens once, before any request is served. The resulting
//! [`Toolchain`] is immutable; request handling receives it explicitly
//! (typically behind an `Arc`) and never queries the host itself.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use wait_timeout::ChildExt;

use crate::types::ToolchainConfig;

/// Maximum directory depth searched under each UVM search root.
const UVM_SEARCH_DEPTH: usize = 6;

/// Longest a `--version` query may run before the tool counts as missing.
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(5);

/// A UVM library installation containing `uvm_pkg.sv`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UvmLibrary {
    /// Directory holding `uvm_pkg.sv` and the `macros/` subdirectory.
    pub dir: PathBuf,
}

impl UvmLibrary {
    /// File name of the UVM package unit.
    pub const PACKAGE_FILE: &'static str = "uvm_pkg.sv";

    /// Path of the package unit compiled alongside methodology sources.
    pub fn package(&self) -> PathBuf {
        self.dir.join(Self::PACKAGE_FILE)
    }

    /// Path of the macro include directory.
    pub fn macros_dir(&self) -> PathBuf {
        self.dir.join("macros")
    }

    /// Whether the package unit is present on disk.
    pub fn package_exists(&self) -> bool {
        self.package().is_file()
    }
}

/// The resolved host toolchain shared read-only by every request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toolchain {
    /// Compiler executable.
    pub compiler: PathBuf,
    /// First line of `<compiler> --version`, if the compiler ran.
    pub compiler_version: Option<String>,
    /// `make` executable.
    pub make: PathBuf,
    /// First line of `<make> --version`, if make ran.
    pub make_version: Option<String>,
    /// Whether a native build step follows compilation.
    pub native_build: bool,
    /// z3 solver executable.
    pub z3: PathBuf,
    /// First line of `z3 --version`, if the solver ran.
    pub z3_version: Option<String>,
    /// The UVM library, if one was found.
    pub uvm: Option<UvmLibrary>,
}

impl Toolchain {
    /// Builds a toolchain from configuration without touching the host.
    pub fn undiscovered(config: &ToolchainConfig) -> Self {
        Self {
            compiler: config.compiler.clone(),
            compiler_version: None,
            make: config.make.clone(),
            make_version: None,
            native_build: config.native_build,
            z3: config.z3.clone(),
            z3_version: None,
            uvm: None,
        }
    }
}

/// Queries tool versions and locates the UVM library.
///
/// Missing tools are not an error here: requests fail later at the stage
/// that needs them, with the spawn error as diagnostic.
pub fn discover_toolchain(config: &ToolchainConfig) -> Toolchain {
    let compiler_version = query_version(&config.compiler);
    let make_version = if config.native_build {
        query_version(&config.make)
    } else {
        None
    };
    let z3_version = query_version(&config.z3);
    let uvm = find_uvm_library(&config.uvm_dirs, &config.uvm_search_roots);

    match &compiler_version {
        Some(v) => tracing::info!(compiler = %config.compiler.display(), version = %v, "compiler found"),
        None => tracing::warn!(compiler = %config.compiler.display(), "compiler not found"),
    }
    match &uvm {
        Some(lib) => tracing::info!(dir = %lib.dir.display(), "UVM library found"),
        None => tracing::warn!("no UVM library found; methodology sources will not compile"),
    }

    Toolchain {
        compiler: config.compiler.clone(),
        compiler_version,
        make: config.make.clone(),
        make_version,
        native_build: config.native_build,
        z3: config.z3.clone(),
        z3_version,
        uvm,
    }
}

/// Runs `<program> --version` and returns the first non-empty output line.
///
/// A tool that has not exited within [`VERSION_TIMEOUT`] is killed and
/// reported as missing.
pub fn query_version(program: &Path) -> Option<String> {
    query_version_within(program, VERSION_TIMEOUT)
}

/// [`query_version`] with an explicit time limit.
pub fn query_version_within(program: &Path, timeout: Duration) -> Option<String> {
    let mut child = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .ok()?;
    let status = match child.wait_timeout(timeout) {
        Ok(Some(status)) => status,
        Ok(None) | Err(_) => {
            let _ = child.kill();
            let _ = child.wait();
            tracing::warn!(program = %program.display(), "version query did not finish; treating tool as missing");
            return None;
        }
    };
    if !status.success() {
        return None;
    }
    let mut stdout = String::new();
    child.stdout.take()?.read_to_string(&mut stdout).ok()?;
    stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

/// Locates a directory containing `uvm_pkg.sv`.
///
/// Candidate directories are checked in order first; then each search root
/// is walked (sorted, symlinks not followed, bounded depth).
pub fn find_uvm_library(candidates: &[PathBuf], search_roots: &[PathBuf]) -> Option<UvmLibrary> {
    for dir in candidates {
        if dir.join(UvmLibrary::PACKAGE_FILE).is_file() {
            return Some(UvmLibrary { dir: dir.clone() });
        }
    }
    search_roots
        .iter()
        .find_map(|root| search_package(root, UVM_SEARCH_DEPTH))
        .map(|dir| UvmLibrary { dir })
}

fn search_package(dir: &Path, depth: usize) -> Option<PathBuf> {
    if dir.join(UvmLibrary::PACKAGE_FILE).is_file() {
        return Some(dir.to_path_buf());
    }
    if depth == 0 {
        return None;
    }
    let mut subdirs: Vec<PathBuf> = std::fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .map(|e| e.path())
        .collect();
    subdirs.sort();
    subdirs
        .iter()
        .find_map(|sub| search_package(sub, depth - 1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn make_uvm(dir: &Path) {
        fs::create_dir_all(dir.join("macros")).unwrap();
        fs::write(dir.join("uvm_pkg.sv"), "package uvm_pkg; endpackage").unwrap();
    }

    #[test]
    fn candidate_dir_wins() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("a");
        let b = tmp.path().join("b");
        make_uvm(&a);
        make_uvm(&b);
        let lib = find_uvm_library(&[tmp.path().join("missing"), b.clone(), a], &[]).unwrap();
        assert_eq!(lib.dir, b);
        assert!(lib.package_exists());
        assert_eq!(lib.macros_dir(), b.join("macros"));
    }

    #[test]
    fn search_root_is_walked() {
        let tmp = TempDir::new().unwrap();
        let deep = tmp.path().join("share").join("uvm-2017").join("src");
        make_uvm(&deep);
        let lib = find_uvm_library(&[], &[tmp.path().to_path_buf()]).unwrap();
        assert_eq!(lib.dir, deep);
    }

    #[test]
    fn search_depth_is_bounded() {
        let tmp = TempDir::new().unwrap();
        let mut deep = tmp.path().to_path_buf();
        for i in 0..(UVM_SEARCH_DEPTH + 2) {
            deep = deep.join(format!("d{i}"));
        }
        make_uvm(&deep);
        assert!(find_uvm_library(&[], &[tmp.path().to_path_buf()]).is_none());
    }

    #[test]
    fn nothing_found() {
        let tmp = TempDir::new().unwrap();
        assert!(find_uvm_library(&[tmp.path().join("x")], &[tmp.path().to_path_buf()]).is_none());
    }

    #[test]
    fn version_of_missing_program() {
        assert!(query_version(Path::new("/nonexistent/simbox-no-such-tool")).is_none());
    }

    #[cfg(unix)]
    fn script(dir: &Path, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("tool");
        fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn version_is_first_output_line() {
        let tmp = TempDir::new().unwrap();
        let tool = script(tmp.path(), "echo; echo 'Verilator 5.020 2024-01-01'; echo more");
        assert_eq!(
            query_version(&tool).as_deref(),
            Some("Verilator 5.020 2024-01-01")
        );
    }

    #[cfg(unix)]
    #[test]
    fn hanging_version_query_times_out() {
        let tmp = TempDir::new().unwrap();
        let tool = script(tmp.path(), "exec sleep 30");
        let started = std::time::Instant::now();
        assert!(query_version_within(&tool, Duration::from_millis(200)).is_none());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn discover_with_missing_tools() {
        let tmp = TempDir::new().unwrap();
        make_uvm(&tmp.path().join("uvm"));
        let config = ToolchainConfig {
            compiler: PathBuf::from("/nonexistent/verilator"),
            make: PathBuf::from("/nonexistent/make"),
            native_build: true,
            z3: PathBuf::from("/nonexistent/z3"),
            uvm_dirs: vec![tmp.path().join("uvm")],
            uvm_search_roots: vec![],
        };
        let tc = discover_toolchain(&config);
        assert!(tc.compiler_version.is_none());
        assert!(tc.make_version.is_none());
        assert!(tc.z3_version.is_none());
        assert_eq!(tc.uvm.unwrap().dir, tmp.path().join("uvm"));
    }

    #[test]
    fn undiscovered_copies_config() {
        let tc = Toolchain::undiscovered(&ToolchainConfig::default());
        assert_eq!(tc.compiler, PathBuf::from("verilator"));
        assert!(tc.native_build);
        assert!(tc.uvm.is_none());
    }
}
