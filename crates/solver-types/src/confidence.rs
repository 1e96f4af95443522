//! Advisory reliability estimates attached to solvers.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Either a numeric estimate with explanatory factors, or the unknown sentinel.
///
/// The sentinel has no score and carries a `reason` factor explaining why no estimate exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Confidence {
	pub score: Option<f64>,
	#[serde(default)]
	pub factors: BTreeMap<String, String>,
}

impl Confidence {
	pub fn known(score: f64) -> Self {
		Self {
			score: Some(score),
			factors: BTreeMap::new(),
		}
	}

	pub fn unknown(reason: impl Into<String>) -> Self {
		let mut factors = BTreeMap::new();
		factors.insert("reason".to_string(), reason.into());
		Self {
			score: None,
			factors,
		}
	}

	pub fn with_factor(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.factors.insert(name.into(), value.into());
		self
	}

	pub fn is_unknown(&self) -> bool {
		self.score.is_none()
	}

	/// Numeric view for ranking; the unknown sentinel maps to `-1`.
	pub fn numeric_or_minus_one(&self) -> f64 {
		self.score.unwrap_or(-1.0)
	}
}
