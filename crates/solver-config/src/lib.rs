//! Configuration loading for the solver toolbox.
//!
//! `${VAR}` references in the file are substituted from the environment before parsing, then
//! `<PREFIX>LOG_LEVEL` and `<PREFIX>SELECTION` override the parsed values.

use regex::Regex;
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

pub mod types;

pub use types::*;

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const STORAGE_BACKENDS: [&str; 1] = ["memory"];

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<PathBuf>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "TOOLBOX_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_path_buf());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	/// Loads the configured file, or defaults when no file was given.
	pub async fn load(&self) -> Result<ToolboxConfig, ConfigError> {
		let mut config = match &self.file_path {
			Some(path) => self.load_from_file(path).await?,
			None => {
				debug!("No configuration file given, using defaults");
				ToolboxConfig::default()
			}
		};

		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;

		Ok(config)
	}

	/// Parses configuration text, applying substitution, overrides and validation.
	pub fn load_str(&self, content: &str) -> Result<ToolboxConfig, ConfigError> {
		let mut config = parse(&substitute_env_vars(content)?)?;
		self.apply_env_overrides(&mut config)?;
		validate_config(&config)?;
		Ok(config)
	}

	async fn load_from_file(&self, path: &Path) -> Result<ToolboxConfig, ConfigError> {
		let content = match tokio::fs::read_to_string(path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(ConfigError::FileNotFound(path.display().to_string()))
			}
			Err(e) => return Err(e.into()),
		};
		debug!("Loaded configuration from {}", path.display());

		parse(&substitute_env_vars(&content)?)
	}

	fn apply_env_overrides(&self, config: &mut ToolboxConfig) -> Result<(), ConfigError> {
		if let Ok(level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.logging.level = level;
		}

		if let Ok(selection) = env::var(format!("{}SELECTION", self.env_prefix)) {
			config.runtime.selection = selection.parse().map_err(|e| {
				ConfigError::ValidationError(format!("Invalid selection override: {}", e))
			})?;
		}

		Ok(())
	}
}

fn parse(content: &str) -> Result<ToolboxConfig, ConfigError> {
	toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;
	let mut result = content.to_string();

	for cap in re.captures_iter(content) {
		let full_match = &cap[0];
		let var_name = &cap[1];

		let env_value =
			env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

		result = result.replace(full_match, &env_value);
	}

	Ok(result)
}

fn validate_config(config: &ToolboxConfig) -> Result<(), ConfigError> {
	if config.runtime.event_capacity == 0 {
		return Err(ConfigError::ValidationError(
			"runtime.event_capacity must be greater than zero".to_string(),
		));
	}

	for (name, secs) in [
		("runtime.sub_routine_timeout_secs", config.runtime.sub_routine_timeout_secs),
		("runtime.top_level_timeout_secs", config.runtime.top_level_timeout_secs),
		("execution.command_timeout_secs", config.execution.command_timeout_secs),
		("storage.record_ttl_secs", config.storage.record_ttl_secs),
	] {
		if secs == Some(0) {
			return Err(ConfigError::ValidationError(format!(
				"{} must be greater than zero",
				name
			)));
		}
	}

	if !STORAGE_BACKENDS.contains(&config.storage.backend.as_str()) {
		return Err(ConfigError::ValidationError(format!(
			"Unknown storage backend '{}'",
			config.storage.backend
		)));
	}

	let level = config.logging.level.to_ascii_lowercase();
	if !LOG_LEVELS.contains(&level.as_str()) {
		return Err(ConfigError::ValidationError(format!(
			"Unknown log level '{}'",
			config.logging.level
		)));
	}

	for (solver, score) in &config.confidence.scores {
		if !(0.0..=1.0).contains(score) {
			return Err(ConfigError::ValidationError(format!(
				"Confidence score for '{}' must be within [0, 1], got {}",
				solver, score
			)));
		}
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	// Each test uses its own prefix so parallel tests never observe each other's variables.
	fn loader(prefix: &str) -> ConfigLoader {
		ConfigLoader::new().with_env_prefix(prefix)
	}

	#[test]
	fn test_empty_config_uses_defaults() {
		let config = loader("TEST_EMPTY_").load_str("").unwrap();
		assert_eq!(config, ToolboxConfig::default());
		assert_eq!(config.runtime.selection, SelectionPolicy::Suitability);
		assert_eq!(config.runtime.event_capacity, 1024);
		assert_eq!(config.logging.level, "info");
	}

	#[test]
	fn test_full_config_parses() {
		let config = loader("TEST_FULL_")
			.load_str(
				r#"
[runtime]
selection = "round-robin"
sub_routine_timeout_secs = 30
event_capacity = 16

[logging]
level = "debug"
json = true

[execution]
working_directory = "/tmp/toolbox-jobs"
command_timeout_secs = 60

[storage]
record_ttl_secs = 3600

[confidence.scores]
echo-solver = 1.0
"#,
			)
			.unwrap();

		assert_eq!(config.runtime.selection, SelectionPolicy::RoundRobin);
		assert_eq!(
			config.runtime.sub_routine_timeout(),
			Some(std::time::Duration::from_secs(30))
		);
		assert!(config.runtime.top_level_timeout().is_none());
		assert!(config.logging.json);
		assert_eq!(config.confidence.scores.get("echo-solver"), Some(&1.0));
		assert_eq!(
			config.storage.record_ttl(),
			Some(std::time::Duration::from_secs(3600))
		);
		assert_eq!(
			config.storage.to_value().unwrap().get("backend").and_then(|v| v.as_str()),
			Some("memory")
		);

		let value = config.execution.to_value().unwrap();
		assert_eq!(
			value.get("working_directory").and_then(|v| v.as_str()),
			Some("/tmp/toolbox-jobs")
		);
	}

	#[test]
	fn test_env_substitution() {
		env::set_var("TOOLBOX_TEST_JOB_DIR", "/var/jobs");
		let config = loader("TEST_SUBST_")
			.load_str("[execution]\nworking_directory = \"${TOOLBOX_TEST_JOB_DIR}\"\n")
			.unwrap();
		assert_eq!(
			config.execution.working_directory,
			PathBuf::from("/var/jobs")
		);
	}

	#[test]
	fn test_missing_env_var_is_error() {
		let result = loader("TEST_MISSING_")
			.load_str("[logging]\nlevel = \"${TOOLBOX_TEST_DEFINITELY_UNSET}\"\n");
		assert!(matches!(result, Err(ConfigError::EnvVarNotFound(name)) if name == "TOOLBOX_TEST_DEFINITELY_UNSET"));
	}

	#[test]
	fn test_env_overrides() {
		env::set_var("TEST_OVERRIDE_LOG_LEVEL", "warn");
		env::set_var("TEST_OVERRIDE_SELECTION", "random");
		let config = loader("TEST_OVERRIDE_").load_str("").unwrap();
		assert_eq!(config.logging.level, "warn");
		assert_eq!(config.runtime.selection, SelectionPolicy::Random);
	}

	#[test]
	fn test_invalid_selection_override() {
		env::set_var("TEST_BADSEL_SELECTION", "fastest");
		let result = loader("TEST_BADSEL_").load_str("");
		assert!(matches!(result, Err(ConfigError::ValidationError(_))));
	}

	#[test]
	fn test_validation_rejects_bad_values() {
		let cases = [
			"[runtime]\nevent_capacity = 0\n",
			"[runtime]\nsub_routine_timeout_secs = 0\n",
			"[logging]\nlevel = \"loud\"\n",
			"[confidence.scores]\nsolver = 1.5\n",
			"[storage]\nbackend = \"redis\"\n",
			"[storage]\nrecord_ttl_secs = 0\n",
		];
		for case in cases {
			let result = loader("TEST_INVALID_").load_str(case);
			assert!(
				matches!(result, Err(ConfigError::ValidationError(_))),
				"expected validation error for {:?}",
				case
			);
		}
	}

	#[test]
	fn test_unknown_selection_is_parse_error() {
		let result = loader("TEST_PARSE_").load_str("[runtime]\nselection = \"fastest\"\n");
		assert!(matches!(result, Err(ConfigError::ParseError(_))));
	}

	#[test]
	fn test_bundled_config_loads_without_environment() {
		let content = include_str!("../../../config/toolbox.toml");
		let config = loader("TEST_BUNDLED_").load_str(content).unwrap();
		assert_eq!(config.execution.working_directory, PathBuf::from("./jobs"));
		assert_eq!(config.storage.backend, "memory");
	}

	#[tokio::test]
	async fn test_load_from_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[runtime]\nselection = \"random\"").unwrap();

		let config = loader("TEST_FILE_").with_file(file.path()).load().await.unwrap();
		assert_eq!(config.runtime.selection, SelectionPolicy::Random);
	}

	#[tokio::test]
	async fn test_missing_file() {
		let result = loader("TEST_NOFILE_")
			.with_file("/nonexistent/toolbox.toml")
			.load()
			.await;
		assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
	}

	#[tokio::test]
	async fn test_no_file_uses_defaults() {
		let config = loader("TEST_NOPATH_").load().await.unwrap();
		assert_eq!(config.execution.working_directory, PathBuf::from("./jobs"));
	}
}
