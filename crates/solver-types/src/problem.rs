//! Problem kinds, problem instances and sub-routine definitions.
//!
//! A [`ProblemKind`] is a typed, zero-sized handle: the input and output types of the kind are
//! part of the handle's type, so a solver registered for a kind and a sub-routine call against it
//! cannot disagree on the data they exchange.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// Data that can flow into or out of a solver.
///
/// Blanket-implemented for every type meeting the bounds; the serde bounds let the boundary layer
/// decode raw input and render results without the core knowing the concrete types.
pub trait ProblemData:
	Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

impl<T> ProblemData for T where
	T: Clone + fmt::Debug + Serialize + DeserializeOwned + Send + Sync + 'static
{
}

/// Typed handle for a registered category of problem.
pub struct ProblemKind<I, O> {
	id: &'static str,
	description: &'static str,
	_marker: PhantomData<fn(I) -> O>,
}

impl<I, O> ProblemKind<I, O> {
	/// Declares a problem kind. The id must be unique across the catalog.
	pub const fn new(id: &'static str, description: &'static str) -> Self {
		Self {
			id,
			description,
			_marker: PhantomData,
		}
	}

	pub fn id(&self) -> &'static str {
		self.id
	}

	pub fn description(&self) -> &'static str {
		self.description
	}
}

impl<I: ProblemData, O: ProblemData> ProblemKind<I, O> {
	/// Returns the declared input/output shape of this kind.
	pub fn descriptor(&self) -> KindDescriptor {
		KindDescriptor {
			id: self.id.to_string(),
			description: self.description.to_string(),
			input_type: std::any::type_name::<I>().to_string(),
			output_type: std::any::type_name::<O>().to_string(),
		}
	}
}

impl<I, O> Clone for ProblemKind<I, O> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<I, O> Copy for ProblemKind<I, O> {}

impl<I, O> PartialEq for ProblemKind<I, O> {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl<I, O> Eq for ProblemKind<I, O> {}

impl<I, O> fmt::Debug for ProblemKind<I, O> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ProblemKind")
			.field("id", &self.id)
			.field("input", &std::any::type_name::<I>())
			.field("output", &std::any::type_name::<O>())
			.finish()
	}
}

impl<I, O> fmt::Display for ProblemKind<I, O> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.id)
	}
}

/// Type-erased description of a problem kind, used by the boundary layer for validation and
/// rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindDescriptor {
	pub id: String,
	pub description: String,
	pub input_type: String,
	pub output_type: String,
}

/// One concrete input belonging to a problem kind.
#[derive(Debug, Clone, Serialize)]
pub struct ProblemInstance<I> {
	pub kind_id: &'static str,
	/// Human readable label. Empty for ad-hoc instances.
	pub name: String,
	pub input: I,
	/// Bundled sample input shown to callers. Never consumed by resolution.
	pub example: bool,
}

impl<I> ProblemInstance<I> {
	pub fn new<O>(kind: &ProblemKind<I, O>, input: I) -> Self {
		Self {
			kind_id: kind.id(),
			name: String::new(),
			input,
			example: false,
		}
	}

	pub fn example<O>(kind: &ProblemKind<I, O>, name: impl Into<String>, input: I) -> Self {
		Self {
			kind_id: kind.id(),
			name: name.into(),
			input,
			example: true,
		}
	}
}

/// A solver's declared dependency on another problem kind, addressable under a label.
///
/// This is metadata only; the resolver turns it into an invocation at run time.
pub struct SubRoutineDefinition<I, O> {
	kind: ProblemKind<I, O>,
	label: &'static str,
	description: &'static str,
}

impl<I, O> SubRoutineDefinition<I, O> {
	pub const fn new(
		kind: ProblemKind<I, O>,
		label: &'static str,
		description: &'static str,
	) -> Self {
		Self {
			kind,
			label,
			description,
		}
	}

	pub fn kind(&self) -> &ProblemKind<I, O> {
		&self.kind
	}

	pub fn label(&self) -> &'static str {
		self.label
	}

	pub fn description(&self) -> &'static str {
		self.description
	}

	/// Type-erased form used for declaration, listing and the declared-dependency check.
	pub fn info(&self) -> SubRoutineInfo {
		SubRoutineInfo {
			label: self.label.to_string(),
			kind_id: self.kind.id().to_string(),
			description: self.description.to_string(),
		}
	}
}

impl<I, O> Clone for SubRoutineDefinition<I, O> {
	fn clone(&self) -> Self {
		*self
	}
}

impl<I, O> Copy for SubRoutineDefinition<I, O> {}

impl<I, O> fmt::Debug for SubRoutineDefinition<I, O> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SubRoutineDefinition")
			.field("kind", &self.kind.id())
			.field("label", &self.label)
			.finish()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRoutineInfo {
	pub label: String,
	pub kind_id: String,
	pub description: String,
}

impl SubRoutineInfo {
	/// Whether this declaration refers to the same label and kind as `other`.
	pub fn matches(&self, other: &SubRoutineInfo) -> bool {
		self.label == other.label && self.kind_id == other.kind_id
	}
}
