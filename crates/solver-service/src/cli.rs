//! Command-line interface definitions.

use clap::{Parser, Subcommand};
use solver_types::SettingValue;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "solver-toolbox")]
#[command(about = "Runs registered solvers over problem instances", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "TOOLBOX_CONFIG")]
	pub config: Option<PathBuf>,

	/// Log level override (trace, debug, info, warn, error)
	#[arg(short, long)]
	pub log_level: Option<String>,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// List registered problem kinds
	Kinds,

	/// List the solvers registered for a problem kind
	Solvers {
		/// Problem kind id
		kind: String,
	},

	/// List the example instances bundled with a problem kind
	Examples {
		/// Problem kind id
		kind: String,
	},

	/// Solve one problem instance and print the resulting solution
	Solve(SolveArgs),

	/// Validate the configuration and the problem catalog
	Validate,
}

#[derive(clap::Args, Debug)]
pub struct SolveArgs {
	/// Problem kind id
	pub kind: String,

	/// Input as JSON. Input that is not valid JSON, or whose JSON reading the problem kind
	/// rejects, is taken as a plain string.
	pub input: Option<String>,

	/// Solve a bundled example instead of an explicit input
	#[arg(short, long, conflicts_with = "input")]
	pub example: Option<String>,

	/// Run this solver instead of letting the selector choose
	#[arg(short, long)]
	pub solver: Option<String>,

	/// Solver setting as name=value; may be repeated
	#[arg(long = "setting", value_name = "NAME=VALUE", value_parser = parse_setting)]
	pub settings: Vec<(String, SettingValue)>,

	/// JSON file holding a full solve request, including sub-routine requests
	#[arg(short, long, value_name = "FILE")]
	pub request: Option<PathBuf>,
}

/// Parses `name=value`. Values read as boolean, then integer, then real, else text.
pub fn parse_setting(raw: &str) -> Result<(String, SettingValue), String> {
	let (name, value) = raw
		.split_once('=')
		.ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
	let name = name.trim();
	if name.is_empty() {
		return Err(format!("missing setting name in '{}'", raw));
	}

	let value = if let Ok(flag) = value.parse::<bool>() {
		SettingValue::Boolean(flag)
	} else if let Ok(number) = value.parse::<i64>() {
		SettingValue::Integer(number)
	} else if let Ok(number) = value.parse::<f64>() {
		SettingValue::Real(number)
	} else {
		SettingValue::Text(value.to_string())
	};
	Ok((name.to_string(), value))
}

/// JSON readings of raw input, in the order they should be tried: the input parsed as JSON,
/// then the input as a plain string. `123` is therefore tried as a number first and as the text
/// "123" when the problem kind does not take numbers.
pub fn input_candidates(raw: &str) -> Vec<serde_json::Value> {
	let text = serde_json::Value::String(raw.to_string());
	match serde_json::from_str::<serde_json::Value>(raw) {
		Ok(parsed) if parsed != text => vec![parsed, text],
		_ => vec![text],
	}
}
