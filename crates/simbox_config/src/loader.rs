//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::ServiceConfig;
use simbox_common::is_identifier;
use std::path::Path;

/// Name of the configuration file looked up in a directory.
pub const CONFIG_FILE_NAME: &str = "simbox.toml";

/// Loads `<dir>/simbox.toml`, or the defaults when the file does not exist.
pub fn load_config(dir: &Path) -> Result<ServiceConfig, ConfigError> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "no config file, using defaults");
        return Ok(ServiceConfig::default());
    }
    load_config_file(&config_path)
}

/// Loads and validates a configuration from an explicit file path.
pub fn load_config_file(path: &Path) -> Result<ServiceConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Parses and validates a `simbox.toml` configuration from a string.
///
/// Useful for testing without filesystem dependencies.
pub fn load_config_from_str(content: &str) -> Result<ServiceConfig, ConfigError> {
    let config: ServiceConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

/// Validates that configuration values are usable.
fn validate_config(config: &ServiceConfig) -> Result<(), ConfigError> {
    let limits = &config.limits;
    for (name, secs) in [
        ("limits.compile_timeout_secs", limits.compile_timeout_secs),
        ("limits.build_timeout_secs", limits.build_timeout_secs),
        ("limits.run_timeout_secs", limits.run_timeout_secs),
    ] {
        if secs == 0 {
            return Err(ConfigError::ValidationError(format!("{name} must be > 0")));
        }
    }
    if limits.max_steps == 0 {
        return Err(ConfigError::ValidationError(
            "limits.max_steps must be > 0".to_string(),
        ));
    }
    if limits.completion_marker.is_empty() {
        return Err(ConfigError::ValidationError(
            "limits.completion_marker must not be empty".to_string(),
        ));
    }
    if config.sandbox.create_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "sandbox.create_attempts must be > 0".to_string(),
        ));
    }
    if config.sandbox.prefix.contains(['/', '\\']) {
        return Err(ConfigError::ValidationError(
            "sandbox.prefix must not contain path separators".to_string(),
        ));
    }
    if !is_identifier(&config.request.default_top) {
        return Err(ConfigError::ValidationError(format!(
            "request.default_top '{}' is not a module identifier",
            config.request.default_top
        )));
    }
    if config.request.default_file_name.is_empty() {
        return Err(ConfigError::ValidationError(
            "request.default_file_name must not be empty".to_string(),
        ));
    }
    if config.toolchain.compiler.as_os_str().is_empty() {
        return Err(ConfigError::ValidationError(
            "toolchain.compiler must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn empty_config_is_all_defaults() {
        let config = load_config_from_str("").unwrap();
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.limits.output_cap_chars, 8000);
        assert_eq!(config.limits.raw_trace_cap_bytes, 4 * 1024 * 1024);
        assert_eq!(config.limits.max_steps, 1_000_000);
        assert_eq!(config.request.default_top, "tb_top");
        assert!(config.toolchain.native_build);
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
[toolchain]
compiler = "/opt/verilator/bin/verilator"
make = "gmake"
native_build = false
uvm_dirs = ["/srv/uvm"]
uvm_search_roots = []

[limits]
compile_timeout_secs = 30
build_timeout_secs = 90
run_timeout_secs = 10
output_cap_chars = 1000
raw_trace_cap_bytes = 65536
max_steps = 5000
max_concurrent = 4
completion_marker = "- done"

[sandbox]
root = "/var/tmp/simbox"
prefix = "job_"
create_attempts = 3

[request]
default_top = "top"
default_file_name = "top.sv"
"#;
        let config = load_config_from_str(toml).unwrap();
        assert_eq!(
            config.toolchain.compiler,
            PathBuf::from("/opt/verilator/bin/verilator")
        );
        assert!(!config.toolchain.native_build);
        assert_eq!(config.toolchain.uvm_dirs, vec![PathBuf::from("/srv/uvm")]);
        assert!(config.toolchain.uvm_search_roots.is_empty());
        assert_eq!(config.limits.run_timeout_secs, 10);
        assert_eq!(config.limits.max_concurrent, 4);
        assert_eq!(config.limits.completion_marker, "- done");
        assert_eq!(config.sandbox.root, Some(PathBuf::from("/var/tmp/simbox")));
        assert_eq!(config.sandbox.prefix, "job_");
        assert_eq!(config.request.default_file_name, "top.sv");
    }

    #[test]
    fn partial_section_keeps_other_defaults() {
        let config = load_config_from_str("[limits]\nrun_timeout_secs = 5\n").unwrap();
        assert_eq!(config.limits.run_timeout_secs, 5);
        assert_eq!(config.limits.compile_timeout_secs, 60);
        assert_eq!(config.sandbox.prefix, "sim_");
    }

    #[test]
    fn zero_timeout_errors() {
        let err = load_config_from_str("[limits]\ncompile_timeout_secs = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
        assert!(err.to_string().contains("compile_timeout_secs"));
    }

    #[test]
    fn prefix_with_separator_errors() {
        let err = load_config_from_str("[sandbox]\nprefix = \"../x\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = load_config_from_str("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn missing_file_in_dir_is_default() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config, ServiceConfig::default());
    }

    #[test]
    fn load_from_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join(CONFIG_FILE_NAME),
            "[request]\ndefault_top = \"my_tb\"\n",
        )
        .unwrap();
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.request.default_top, "my_tb");
    }

    #[test]
    fn default_top_must_be_identifier() {
        for top in ["", "tb top", "1tb", "tb-top"] {
            let err = load_config_from_str(&format!("[request]\ndefault_top = \"{top}\"\n"))
                .unwrap_err();
            assert!(matches!(err, ConfigError::ValidationError(_)), "top {top:?}");
        }
        assert!(load_config_from_str("[request]\ndefault_top = \"_tb1\"\n").is_ok());
    }

    #[test]
    fn io_error_from_nonexistent_file() {
        let err = load_config_file(Path::new("/nonexistent/dir/simbox.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
