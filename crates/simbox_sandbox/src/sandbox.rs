//! The sandbox guard: creation, staging, and removal on drop.

use std::io;
use std::path::{Path, PathBuf};

use simbox_common::{validate_file_name, SourceUnit};
use simbox_config::SandboxSettings;

use crate::error::SandboxError;
use crate::id::generate_id;
use crate::reaper::remove_tree;

/// Name of the compiler output directory inside a sandbox.
pub const OBJ_DIR_NAME: &str = "obj";

/// An exclusively owned, uniquely named working directory for one request.
///
/// The directory is removed when the guard is dropped or [`reap`](Self::reap)ed,
/// whichever comes first, and never twice.
#[derive(Debug)]
pub struct Sandbox {
    id: String,
    path: PathBuf,
    reaped: bool,
}

impl Sandbox {
    /// Creates a fresh sandbox under the configured root.
    pub fn create(settings: &SandboxSettings) -> Result<Self, SandboxError> {
        Self::create_with(
            &settings.root_dir(),
            &settings.prefix,
            settings.create_attempts,
            generate_id,
        )
    }

    /// Creates a sandbox named `<prefix><id>` under `root`, drawing ids from `next_id`.
    ///
    /// The root is created if missing. The sandbox directory itself is created
    /// non-recursively, so an existing directory is never reused: on
    /// `AlreadyExists` a new id is drawn, up to `attempts` times.
    pub fn create_with<F>(
        root: &Path,
        prefix: &str,
        attempts: u32,
        mut next_id: F,
    ) -> Result<Self, SandboxError>
    where
        F: FnMut() -> String,
    {
        std::fs::create_dir_all(root).map_err(|e| SandboxError::io(root, e))?;

        for attempt in 1..=attempts {
            let id = format!("{prefix}{}", next_id());
            let path = root.join(&id);
            match std::fs::create_dir(&path) {
                Ok(()) => {
                    tracing::debug!(sandbox = %path.display(), "sandbox created");
                    return Ok(Self {
                        id,
                        path,
                        reaped: false,
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    tracing::debug!(sandbox = %path.display(), attempt, "sandbox id collision");
                }
                Err(e) => return Err(SandboxError::io(path, e)),
            }
        }

        Err(SandboxError::Collision {
            root: root.to_path_buf(),
            attempts,
        })
    }

    /// The sandbox identifier (its directory name).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The sandbox directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A path directly inside the sandbox.
    pub fn join(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    /// Writes each unit verbatim to `<sandbox>/<name>`, returning the paths in order.
    pub fn stage(&self, units: &[SourceUnit]) -> Result<Vec<PathBuf>, SandboxError> {
        units
            .iter()
            .map(|unit| self.write_file(&unit.name, &unit.content))
            .collect()
    }

    /// Writes `contents` to a plain file name inside the sandbox.
    pub fn write_file(&self, name: &str, contents: &str) -> Result<PathBuf, SandboxError> {
        validate_file_name(name)?;
        let path = self.join(name);
        std::fs::write(&path, contents).map_err(|e| SandboxError::io(&path, e))?;
        Ok(path)
    }

    /// Creates (if needed) a subdirectory inside the sandbox.
    pub fn ensure_dir(&self, name: &str) -> Result<PathBuf, SandboxError> {
        validate_file_name(name)?;
        let path = self.join(name);
        std::fs::create_dir_all(&path).map_err(|e| SandboxError::io(&path, e))?;
        Ok(path)
    }

    /// The compiler output directory, created on first use.
    pub fn obj_dir(&self) -> Result<PathBuf, SandboxError> {
        self.ensure_dir(OBJ_DIR_NAME)
    }

    /// Removes the sandbox now and reports the outcome.
    pub fn reap(mut self) -> Result<(), SandboxError> {
        self.reaped = true;
        remove_tree(&self.path).map_err(|e| SandboxError::io(&self.path, e))
    }
}

impl Drop for Sandbox {
    fn drop(&mut self) {
        if self.reaped {
            return;
        }
        self.reaped = true;
        match remove_tree(&self.path) {
            Ok(()) => tracing::debug!(sandbox = %self.path.display(), "sandbox removed"),
            Err(e) => {
                tracing::warn!(sandbox = %self.path.display(), error = %e, "failed to remove sandbox")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn settings(root: &Path) -> SandboxSettings {
        SandboxSettings {
            root: Some(root.to_path_buf()),
            ..SandboxSettings::default()
        }
    }

    #[test]
    fn create_makes_prefixed_dir() {
        let tmp = TempDir::new().unwrap();
        let sb = Sandbox::create(&settings(tmp.path())).unwrap();
        assert!(sb.path().is_dir());
        assert!(sb.id().starts_with("sim_"));
        assert_eq!(sb.path().parent().unwrap(), tmp.path());
    }

    #[test]
    fn drop_removes_dir() {
        let tmp = TempDir::new().unwrap();
        let path = {
            let sb = Sandbox::create(&settings(tmp.path())).unwrap();
            sb.write_file("a.sv", "module a; endmodule").unwrap();
            let obj = sb.obj_dir().unwrap();
            assert_eq!(obj, sb.join(OBJ_DIR_NAME));
            assert_eq!(sb.obj_dir().unwrap(), obj);
            sb.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn reap_removes_and_drop_is_quiet() {
        let tmp = TempDir::new().unwrap();
        let sb = Sandbox::create(&settings(tmp.path())).unwrap();
        let path = sb.path().to_path_buf();
        sb.reap().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn already_removed_dir_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let sb = Sandbox::create(&settings(tmp.path())).unwrap();
        fs::remove_dir_all(sb.path()).unwrap();
        sb.reap().unwrap();
    }

    #[test]
    fn stage_writes_verbatim_in_order() {
        let tmp = TempDir::new().unwrap();
        let sb = Sandbox::create(&settings(tmp.path())).unwrap();
        let units = vec![
            SourceUnit::new("dut.sv", "module dut(input clk);\nendmodule\n"),
            SourceUnit::new("tb.sv", "`timescale 1ns/1ps\nmodule tb; endmodule"),
        ];
        let paths = sb.stage(&units).unwrap();
        assert_eq!(paths, vec![sb.join("dut.sv"), sb.join("tb.sv")]);
        assert_eq!(fs::read_to_string(&paths[1]).unwrap(), units[1].content);
    }

    #[test]
    fn stage_rejects_escaping_names() {
        let tmp = TempDir::new().unwrap();
        let sb = Sandbox::create(&settings(tmp.path())).unwrap();
        let err = sb
            .stage(&[SourceUnit::new("../escape.sv", "x")])
            .unwrap_err();
        assert!(matches!(err, SandboxError::InvalidName(_)));
        assert!(!tmp.path().join("escape.sv").exists());
    }

    #[test]
    fn collision_retries_with_fresh_id() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sim_taken")).unwrap();
        let mut ids = vec!["fresh".to_string(), "taken".to_string()];
        let sb = Sandbox::create_with(tmp.path(), "sim_", 4, || ids.pop().unwrap()).unwrap();
        assert_eq!(sb.id(), "sim_fresh");
        assert!(tmp.path().join("sim_taken").is_dir());
    }

    #[test]
    fn collision_exhausts_attempts() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("sim_same")).unwrap();
        let err = Sandbox::create_with(tmp.path(), "sim_", 3, || "same".to_string()).unwrap_err();
        match err {
            SandboxError::Collision { attempts, .. } => assert_eq!(attempts, 3),
            other => panic!("expected Collision, got {other:?}"),
        }
        assert!(tmp.path().join("sim_same").is_dir());
    }

    #[test]
    fn missing_root_is_created() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("nested").join("root");
        let sb = Sandbox::create(&settings(&root)).unwrap();
        assert!(sb.path().starts_with(&root));
    }

    #[test]
    fn drop_during_panic_removes_dir() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().to_path_buf();
        let result = std::panic::catch_unwind(move || {
            let sb = Sandbox::create(&settings(&root)).unwrap();
            sb.write_file("x.sv", "x").unwrap();
            panic!("mid-pipeline failure");
        });
        assert!(result.is_err());
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 0);
    }
}
