//! Solver settings: typed declarations, caller-supplied values and validation.
//!
//! Validation is a pure function of a [`SettingsSchema`] and a [`SettingsInput`]. It either yields
//! a defaulted [`Settings`] map or the full list of [`SettingViolation`]s.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use thiserror::Error;

/// A single caller-supplied or validated setting value.
///
/// Selections are carried as [`SettingValue::Text`] and checked against the declared options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
	Boolean(bool),
	Integer(i64),
	Real(f64),
	Text(String),
}

impl SettingValue {
	pub fn type_str(&self) -> &'static str {
		match self {
			Self::Boolean(_) => "boolean",
			Self::Integer(_) => "integer",
			Self::Real(_) => "real",
			Self::Text(_) => "text",
		}
	}

	pub fn as_real(&self) -> Option<f64> {
		match self {
			Self::Real(v) => Some(*v),
			_ => None,
		}
	}
}

impl fmt::Display for SettingValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Boolean(v) => write!(f, "{}", v),
			Self::Integer(v) => write!(f, "{}", v),
			Self::Real(v) => write!(f, "{}", v),
			Self::Text(v) => write!(f, "{}", v),
		}
	}
}

/// Raw settings as supplied by a caller.
pub type SettingsInput = BTreeMap<String, SettingValue>;

/// Declared type, bounds and default of a setting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SettingKind {
	Boolean {
		default: bool,
	},
	Integer {
		min: i64,
		max: i64,
		default: Option<i64>,
	},
	Real {
		min: f64,
		max: f64,
		default: Option<f64>,
	},
	Text {
		default: Option<String>,
	},
	Select {
		options: Vec<String>,
		default: Option<String>,
	},
}

impl SettingKind {
	pub fn type_str(&self) -> &'static str {
		match self {
			Self::Boolean { .. } => "boolean",
			Self::Integer { .. } => "integer",
			Self::Real { .. } => "real",
			Self::Text { .. } => "text",
			Self::Select { .. } => "select",
		}
	}

	fn default_value(&self) -> Option<SettingValue> {
		match self {
			Self::Boolean { default } => Some(SettingValue::Boolean(*default)),
			Self::Integer { default, .. } => default.map(SettingValue::Integer),
			Self::Real { default, .. } => default.map(SettingValue::Real),
			Self::Text { default } => default.clone().map(SettingValue::Text),
			Self::Select { default, .. } => default.clone().map(SettingValue::Text),
		}
	}
}

/// A named, typed setting declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingDefinition {
	pub name: String,
	pub description: String,
	pub required: bool,
	pub kind: SettingKind,
}

impl SettingDefinition {
	/// Creates an optional setting with the given name and kind.
	pub fn new(name: impl Into<String>, kind: SettingKind) -> Self {
		Self {
			name: name.into(),
			description: String::new(),
			required: false,
			kind,
		}
	}

	pub fn boolean(name: impl Into<String>, default: bool) -> Self {
		Self::new(name, SettingKind::Boolean { default })
	}

	pub fn integer(name: impl Into<String>, min: i64, max: i64, default: Option<i64>) -> Self {
		Self::new(name, SettingKind::Integer { min, max, default })
	}

	pub fn real(name: impl Into<String>, min: f64, max: f64, default: Option<f64>) -> Self {
		Self::new(name, SettingKind::Real { min, max, default })
	}

	pub fn text(name: impl Into<String>, default: Option<&str>) -> Self {
		Self::new(
			name,
			SettingKind::Text {
				default: default.map(str::to_string),
			},
		)
	}

	pub fn select<S: Into<String>>(
		name: impl Into<String>,
		options: impl IntoIterator<Item = S>,
		default: Option<&str>,
	) -> Self {
		Self::new(
			name,
			SettingKind::Select {
				options: options.into_iter().map(Into::into).collect(),
				default: default.map(str::to_string),
			},
		)
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = description.into();
		self
	}

	/// Marks this setting as required. Required settings ignore their default.
	pub fn required(mut self) -> Self {
		self.required = true;
		self
	}

	fn validate_value(&self, value: &SettingValue) -> Result<SettingValue, SettingViolation> {
		let out_of_bounds = |value: String, min: String, max: String| SettingViolation::OutOfBounds {
			name: self.name.clone(),
			value,
			min,
			max,
		};

		match (&self.kind, value) {
			(SettingKind::Boolean { .. }, SettingValue::Boolean(v)) => Ok(SettingValue::Boolean(*v)),
			(SettingKind::Integer { min, max, .. }, SettingValue::Integer(v)) => {
				if v < min || v > max {
					return Err(out_of_bounds(v.to_string(), min.to_string(), max.to_string()));
				}
				Ok(SettingValue::Integer(*v))
			}
			(SettingKind::Real { min, max, .. }, SettingValue::Real(_) | SettingValue::Integer(_)) => {
				let v = match value {
					SettingValue::Integer(i) => *i as f64,
					other => other.as_real().unwrap_or(f64::NAN),
				};
				// Also rejects NaN.
				if !(*min..=*max).contains(&v) {
					return Err(out_of_bounds(v.to_string(), min.to_string(), max.to_string()));
				}
				Ok(SettingValue::Real(v))
			}
			(SettingKind::Text { .. }, SettingValue::Text(v)) => Ok(SettingValue::Text(v.clone())),
			(SettingKind::Select { options, .. }, SettingValue::Text(v)) => {
				if !options.contains(v) {
					return Err(SettingViolation::UnknownOption {
						name: self.name.clone(),
						value: v.clone(),
						options: options.clone(),
					});
				}
				Ok(SettingValue::Text(v.clone()))
			}
			(kind, value) => Err(SettingViolation::TypeMismatch {
				name: self.name.clone(),
				expected: kind.type_str(),
				actual: value.type_str(),
			}),
		}
	}
}

/// A single reason why supplied settings were rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SettingViolation {
	#[error("Missing required setting: {0}")]
	MissingRequired(String),
	#[error("Unknown setting: {0}")]
	Unknown(String),
	#[error("Type mismatch for setting '{name}': expected {expected}, got {actual}")]
	TypeMismatch {
		name: String,
		expected: &'static str,
		actual: &'static str,
	},
	#[error("Value {value} for setting '{name}' is outside [{min}, {max}]")]
	OutOfBounds {
		name: String,
		value: String,
		min: String,
		max: String,
	},
	#[error("Option '{value}' for setting '{name}' is not one of {options:?}")]
	UnknownOption {
		name: String,
		value: String,
		options: Vec<String>,
	},
}

/// Ordered list of setting declarations for one solver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SettingsSchema {
	definitions: Vec<SettingDefinition>,
}

impl SettingsSchema {
	pub fn new(definitions: Vec<SettingDefinition>) -> Self {
		Self { definitions }
	}

	pub fn empty() -> Self {
		Self::default()
	}

	pub fn definitions(&self) -> &[SettingDefinition] {
		&self.definitions
	}

	pub fn is_empty(&self) -> bool {
		self.definitions.is_empty()
	}

	/// Validates supplied settings, filling in declared defaults.
	///
	/// Every violation is reported, declarations first (in declaration order), then unknown names.
	pub fn validate(&self, supplied: &SettingsInput) -> Result<Settings, Vec<SettingViolation>> {
		let mut values = BTreeMap::new();
		let mut violations = Vec::new();

		for definition in &self.definitions {
			match supplied.get(&definition.name) {
				Some(value) => match definition.validate_value(value) {
					Ok(value) => {
						values.insert(definition.name.clone(), value);
					}
					Err(violation) => violations.push(violation),
				},
				None if definition.required => {
					violations.push(SettingViolation::MissingRequired(definition.name.clone()));
				}
				None => {
					if let Some(default) = definition.kind.default_value() {
						values.insert(definition.name.clone(), default);
					}
				}
			}
		}

		for name in supplied.keys() {
			if !self.definitions.iter().any(|d| &d.name == name) {
				violations.push(SettingViolation::Unknown(name.clone()));
			}
		}

		if violations.is_empty() {
			Ok(Settings { values })
		} else {
			Err(violations)
		}
	}

	pub fn accepts(&self, supplied: &SettingsInput) -> bool {
		self.validate(supplied).is_ok()
	}

	/// Checks the declarations themselves: unique names, sane bounds, defaults inside bounds.
	pub fn check(&self) -> Result<(), String> {
		let mut seen = HashSet::new();
		for definition in &self.definitions {
			if !seen.insert(definition.name.as_str()) {
				return Err(format!("duplicate setting '{}'", definition.name));
			}
			let bad_default = match &definition.kind {
				SettingKind::Integer { min, max, default } => {
					if min > max {
						return Err(format!("setting '{}' has min > max", definition.name));
					}
					default.is_some_and(|d| d < *min || d > *max)
				}
				SettingKind::Real { min, max, default } => {
					if min > max || min.is_nan() || max.is_nan() {
						return Err(format!("setting '{}' has invalid bounds", definition.name));
					}
					default.is_some_and(|d| !(*min..=*max).contains(&d))
				}
				SettingKind::Select { options, default } => {
					if options.is_empty() {
						return Err(format!("setting '{}' has no options", definition.name));
					}
					default.as_ref().is_some_and(|d| !options.contains(d))
				}
				SettingKind::Boolean { .. } | SettingKind::Text { .. } => false,
			};
			if bad_default {
				return Err(format!(
					"default of setting '{}' violates its declaration",
					definition.name
				));
			}
		}
		Ok(())
	}
}

impl FromIterator<SettingDefinition> for SettingsSchema {
	fn from_iter<T: IntoIterator<Item = SettingDefinition>>(iter: T) -> Self {
		Self::new(iter.into_iter().collect())
	}
}

/// Validated, defaulted settings handed to a solver.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Settings {
	values: BTreeMap<String, SettingValue>,
}

impl Settings {
	pub fn get(&self, name: &str) -> Option<&SettingValue> {
		self.values.get(name)
	}

	pub fn boolean(&self, name: &str) -> Option<bool> {
		match self.values.get(name)? {
			SettingValue::Boolean(v) => Some(*v),
			_ => None,
		}
	}

	pub fn integer(&self, name: &str) -> Option<i64> {
		match self.values.get(name)? {
			SettingValue::Integer(v) => Some(*v),
			_ => None,
		}
	}

	pub fn real(&self, name: &str) -> Option<f64> {
		match self.values.get(name)? {
			SettingValue::Real(v) => Some(*v),
			_ => None,
		}
	}

	/// Text and selection values.
	pub fn text(&self, name: &str) -> Option<&str> {
		match self.values.get(name)? {
			SettingValue::Text(v) => Some(v),
			_ => None,
		}
	}

	pub fn len(&self) -> usize {
		self.values.len()
	}

	pub fn is_empty(&self) -> bool {
		self.values.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &SettingValue)> {
		self.values.iter()
	}
}
