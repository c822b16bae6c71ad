//! Configuration lookup and simulator construction shared by the subcommands.

use std::path::PathBuf;
use std::sync::Arc;

use simbox_config::{discover_toolchain, load_config, load_config_file, ServiceConfig};
use simbox_pipeline::Simulator;

use crate::GlobalArgs;

/// Loads configuration from `--config` (a file, or a directory holding
/// `simbox.toml`), falling back to the current directory.
pub fn load_service_config(global: &GlobalArgs) -> Result<ServiceConfig, Box<dyn std::error::Error>> {
    let config = match global.config {
        Some(ref path) => {
            let p = PathBuf::from(path);
            if p.is_file() {
                load_config_file(&p)?
            } else if p.is_dir() {
                load_config(&p)?
            } else {
                return Err(format!("config path not found: {path}").into());
            }
        }
        None => load_config(&std::env::current_dir()?)?,
    };
    tracing::debug!(
        compiler = %config.toolchain.compiler.display(),
        max_concurrent = config.limits.max_concurrent,
        "configuration loaded"
    );
    Ok(config)
}

/// Discovers the host toolchain and builds a simulator that runs real tools.
pub fn build_simulator(config: &ServiceConfig) -> Simulator {
    let toolchain = Arc::new(discover_toolchain(&config.toolchain));
    Simulator::from_config(config, toolchain, simbox_pipeline::SystemRunner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn global(config: Option<String>) -> GlobalArgs {
        GlobalArgs {
            quiet: false,
            verbose: false,
            config,
        }
    }

    #[test]
    fn config_from_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("custom.toml");
        fs::write(&path, "[limits]\nrun_timeout_secs = 5\n").unwrap();
        let config = load_service_config(&global(Some(path.display().to_string()))).unwrap();
        assert_eq!(config.limits.run_timeout_secs, 5);
    }

    #[test]
    fn config_from_dir() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("simbox.toml"), "[request]\ndefault_top = \"top\"\n").unwrap();
        let config = load_service_config(&global(Some(tmp.path().display().to_string()))).unwrap();
        assert_eq!(config.request.default_top, "top");
    }

    #[test]
    fn dir_without_file_uses_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_service_config(&global(Some(tmp.path().display().to_string()))).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn missing_config_path_is_error() {
        let err = load_service_config(&global(Some("/nonexistent/simbox.toml".into()))).unwrap_err();
        assert!(err.to_string().contains("config path not found"));
    }

    #[test]
    fn invalid_config_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.toml");
        fs::write(&path, "[limits]\nmax_steps = 0\n").unwrap();
        assert!(load_service_config(&global(Some(path.display().to_string()))).is_err());
    }
}
