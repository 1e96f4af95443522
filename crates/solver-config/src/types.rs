//! Configuration types for the toolbox.
//!
//! Every section has defaults, so an empty file (or no file at all) yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Complete toolbox configuration
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ToolboxConfig {
	pub runtime: RuntimeConfig,
	pub logging: LoggingConfig,
	pub execution: ExecutionConfig,
	pub storage: StorageConfig,
	pub confidence: ConfidenceConfig,
}

/// How the selector picks among admissible solvers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionPolicy {
	/// Highest suitability wins, ties go to the earliest registered solver.
	#[default]
	Suitability,
	/// Uniformly random among admissible solvers.
	Random,
	/// Rotates through admissible solvers.
	RoundRobin,
}

impl fmt::Display for SelectionPolicy {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Suitability => write!(f, "suitability"),
			Self::Random => write!(f, "random"),
			Self::RoundRobin => write!(f, "round-robin"),
		}
	}
}

impl FromStr for SelectionPolicy {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"suitability" => Ok(Self::Suitability),
			"random" => Ok(Self::Random),
			"round-robin" | "round_robin" => Ok(Self::RoundRobin),
			other => Err(format!("unknown selection policy '{}'", other)),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
	pub selection: SelectionPolicy,
	/// Deadline applied to every sub-routine invocation.
	pub sub_routine_timeout_secs: Option<u64>,
	/// Deadline applied to every top-level invocation.
	pub top_level_timeout_secs: Option<u64>,
	/// Capacity of the solution event channel.
	pub event_capacity: usize,
}

impl RuntimeConfig {
	pub fn sub_routine_timeout(&self) -> Option<Duration> {
		self.sub_routine_timeout_secs.map(Duration::from_secs)
	}

	pub fn top_level_timeout(&self) -> Option<Duration> {
		self.top_level_timeout_secs.map(Duration::from_secs)
	}
}

impl Default for RuntimeConfig {
	fn default() -> Self {
		Self {
			selection: SelectionPolicy::default(),
			sub_routine_timeout_secs: None,
			top_level_timeout_secs: None,
			event_capacity: 1024,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
	pub level: String,
	/// Emit JSON lines instead of human readable output.
	pub json: bool,
}

impl Default for LoggingConfig {
	fn default() -> Self {
		Self {
			level: "info".to_string(),
			json: false,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ExecutionConfig {
	pub working_directory: PathBuf,
	pub command_timeout_secs: Option<u64>,
}

impl ExecutionConfig {
	/// Raw table handed to executor factories.
	pub fn to_value(&self) -> Result<toml::Value, toml::ser::Error> {
		toml::Value::try_from(self)
	}
}

impl Default for ExecutionConfig {
	fn default() -> Self {
		Self {
			working_directory: PathBuf::from("./jobs"),
			command_timeout_secs: None,
		}
	}
}

/// Solution record storage.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
	/// Storage backend: "memory"
	pub backend: String,
	/// How long finished solution records stay pollable. Unset keeps them for the process lifetime.
	pub record_ttl_secs: Option<u64>,
}

impl StorageConfig {
	pub fn record_ttl(&self) -> Option<Duration> {
		self.record_ttl_secs.map(Duration::from_secs)
	}

	/// Raw table handed to storage factories.
	pub fn to_value(&self) -> Result<toml::Value, toml::ser::Error> {
		toml::Value::try_from(self)
	}
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			backend: "memory".to_string(),
			record_ttl_secs: None,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ConfidenceConfig {
	/// Static confidence per solver id, each in `[0, 1]`.
	pub scores: BTreeMap<String, f64>,
}
