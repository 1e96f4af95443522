//! Process-wide catalog of problem kinds.
//!
//! The catalog is assembled once by [`CatalogBuilder`] and is immutable afterwards, so it can be
//! shared between concurrent solves without synchronization. Every kind is stored twice: as its
//! typed [`ProblemRegistry`] for typed submission and sub-routine calls, and behind
//! [`ErasedRegistry`] for the boundary layer, which only knows kind names and JSON.

use crate::error::{EngineError, RegistryError};
use crate::handle::SolutionHandle;
use crate::registry::ProblemRegistry;
use crate::runtime::Runtime;
use crate::solver::{Solver, SolverInfo};
use crate::SolveRequest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solver_types::{KindDescriptor, ProblemData, ProblemKind};
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{error, info, warn};

/// A bundled example input, rendered as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleInfo {
	pub kind_id: String,
	pub name: String,
	pub input: serde_json::Value,
}

/// Kind-agnostic view of a registry.
#[async_trait]
pub(crate) trait ErasedRegistry: Send + Sync {
	fn descriptor(&self) -> KindDescriptor;

	fn solver_infos(&self) -> Vec<SolverInfo>;

	fn examples(&self) -> Vec<ExampleInfo>;

	/// Decodes `input` into the kind's input type and submits it.
	async fn submit_json(
		self: Arc<Self>,
		runtime: Arc<Runtime>,
		input: serde_json::Value,
		request: SolveRequest,
	) -> Result<SolutionHandle<serde_json::Value>, EngineError>;
}

#[async_trait]
impl<I: ProblemData, O: ProblemData> ErasedRegistry for ProblemRegistry<I, O> {
	fn descriptor(&self) -> KindDescriptor {
		self.kind().descriptor()
	}

	fn solver_infos(&self) -> Vec<SolverInfo> {
		ProblemRegistry::solver_infos(self)
	}

	fn examples(&self) -> Vec<ExampleInfo> {
		ProblemRegistry::examples(self)
			.iter()
			.filter_map(|example| match serde_json::to_value(&example.input) {
				Ok(input) => Some(ExampleInfo {
					kind_id: example.kind_id.to_string(),
					name: example.name.clone(),
					input,
				}),
				Err(e) => {
					warn!(kind = example.kind_id, "Skipping unrenderable example {}: {}", example.name, e);
					None
				}
			})
			.collect()
	}

	async fn submit_json(
		self: Arc<Self>,
		runtime: Arc<Runtime>,
		input: serde_json::Value,
		request: SolveRequest,
	) -> Result<SolutionHandle<serde_json::Value>, EngineError> {
		let input: I = serde_json::from_value(input).map_err(|e| EngineError::InvalidInput {
			kind: self.kind().id().to_string(),
			reason: e.to_string(),
		})?;
		let handle = runtime.submit(&self, input, request).await?;
		Ok(handle.into_json())
	}
}

struct KindEntry {
	descriptor: KindDescriptor,
	typed: Arc<dyn Any + Send + Sync>,
	erased: Arc<dyn ErasedRegistry>,
}

/// A registry still being filled by the builder.
trait PendingRegistry: Send {
	fn kind_id(&self) -> &'static str;

	fn as_any_mut(&mut self) -> &mut dyn Any;

	fn solver_infos(&self) -> Vec<SolverInfo>;

	fn into_entry(self: Box<Self>) -> KindEntry;
}

impl<I: ProblemData, O: ProblemData> PendingRegistry for ProblemRegistry<I, O> {
	fn kind_id(&self) -> &'static str {
		self.kind().id()
	}

	fn as_any_mut(&mut self) -> &mut dyn Any {
		self
	}

	fn solver_infos(&self) -> Vec<SolverInfo> {
		ProblemRegistry::solver_infos(self)
	}

	fn into_entry(self: Box<Self>) -> KindEntry {
		let typed: Arc<ProblemRegistry<I, O>> = Arc::from(self);
		KindEntry {
			descriptor: typed.kind().descriptor(),
			erased: typed.clone(),
			typed,
		}
	}
}

/// Collects kinds, solvers and examples, then checks them as a whole.
///
/// Registration problems are collected rather than raised one by one; [`build`](Self::build)
/// reports them and refuses to produce a catalog.
#[derive(Default)]
pub struct CatalogBuilder {
	registries: Vec<Box<dyn PendingRegistry>>,
	errors: Vec<RegistryError>,
}

impl CatalogBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_kind<I: ProblemData, O: ProblemData>(mut self, kind: ProblemKind<I, O>) -> Self {
		if self.position(kind.id()).is_some() {
			self.errors
				.push(RegistryError::DuplicateKind(kind.id().to_string()));
		} else {
			self.registries.push(Box::new(ProblemRegistry::new(kind)));
		}
		self
	}

	pub fn with_solver<I, O, S>(self, kind: &ProblemKind<I, O>, solver: S) -> Self
	where
		I: ProblemData,
		O: ProblemData,
		S: Solver<I, O> + 'static,
	{
		self.with_shared_solver(kind, Arc::new(solver))
	}

	pub fn with_shared_solver<I: ProblemData, O: ProblemData>(
		mut self,
		kind: &ProblemKind<I, O>,
		solver: Arc<dyn Solver<I, O>>,
	) -> Self {
		let result = self
			.registry_mut(kind)
			.and_then(|registry| registry.add_solver(solver));
		if let Err(e) = result {
			self.errors.push(e);
		}
		self
	}

	pub fn with_example<I: ProblemData, O: ProblemData>(
		mut self,
		kind: &ProblemKind<I, O>,
		name: impl Into<String>,
		input: I,
	) -> Self {
		match self.registry_mut(kind) {
			Ok(registry) => registry.add_example(name, input),
			Err(e) => self.errors.push(e),
		}
		self
	}

	pub fn build(self) -> Result<ProblemCatalog, RegistryError> {
		let mut errors = self.errors;
		let known: HashSet<&'static str> = self.registries.iter().map(|r| r.kind_id()).collect();

		for registry in &self.registries {
			for solver in registry.solver_infos() {
				if let Err(reason) = solver.settings.check() {
					errors.push(RegistryError::InvalidSchema {
						solver: solver.id.clone(),
						reason,
					});
				}
				for sub_routine in &solver.sub_routines {
					if !known.contains(sub_routine.kind_id.as_str()) {
						errors.push(RegistryError::UnknownSubRoutineKind {
							solver: solver.id.clone(),
							kind: sub_routine.kind_id.clone(),
						});
					}
				}
			}
		}

		if !errors.is_empty() {
			for e in &errors {
				error!("Catalog registration error: {}", e);
			}
			return Err(errors.swap_remove(0));
		}

		let mut order = Vec::with_capacity(self.registries.len());
		let mut entries = HashMap::with_capacity(self.registries.len());
		for registry in self.registries {
			let kind_id = registry.kind_id();
			order.push(kind_id);
			entries.insert(kind_id, registry.into_entry());
		}
		info!("Built problem catalog with {} kinds", order.len());

		Ok(ProblemCatalog { entries, order })
	}

	fn position(&self, kind_id: &str) -> Option<usize> {
		self.registries.iter().position(|r| r.kind_id() == kind_id)
	}

	fn registry_mut<I: ProblemData, O: ProblemData>(
		&mut self,
		kind: &ProblemKind<I, O>,
	) -> Result<&mut ProblemRegistry<I, O>, RegistryError> {
		let index = self
			.position(kind.id())
			.ok_or_else(|| RegistryError::UnknownKind(kind.id().to_string()))?;
		self.registries[index]
			.as_any_mut()
			.downcast_mut::<ProblemRegistry<I, O>>()
			.ok_or_else(|| RegistryError::KindTypeMismatch(kind.id().to_string()))
	}
}

/// Immutable set of problem kinds and their registries.
pub struct ProblemCatalog {
	entries: HashMap<&'static str, KindEntry>,
	order: Vec<&'static str>,
}

impl ProblemCatalog {
	pub fn builder() -> CatalogBuilder {
		CatalogBuilder::new()
	}

	/// Typed registry for `kind`.
	pub fn registry<I: ProblemData, O: ProblemData>(
		&self,
		kind: &ProblemKind<I, O>,
	) -> Result<Arc<ProblemRegistry<I, O>>, EngineError> {
		let entry = self.entry(kind.id())?;
		entry
			.typed
			.clone()
			.downcast::<ProblemRegistry<I, O>>()
			.map_err(|_| EngineError::KindTypeMismatch(kind.id().to_string()))
	}

	pub fn contains(&self, kind_id: &str) -> bool {
		self.entries.contains_key(kind_id)
	}

	/// Descriptors of all kinds, in registration order.
	pub fn kinds(&self) -> Vec<KindDescriptor> {
		self.order
			.iter()
			.filter_map(|id| self.entries.get(id))
			.map(|entry| entry.descriptor.clone())
			.collect()
	}

	pub fn describe(&self, kind_id: &str) -> Result<KindDescriptor, EngineError> {
		Ok(self.entry(kind_id)?.descriptor.clone())
	}

	pub fn solvers(&self, kind_id: &str) -> Result<Vec<SolverInfo>, EngineError> {
		Ok(self.entry(kind_id)?.erased.solver_infos())
	}

	pub fn solver(&self, kind_id: &str, solver_id: &str) -> Result<SolverInfo, EngineError> {
		self.solvers(kind_id)?
			.into_iter()
			.find(|info| info.id == solver_id)
			.ok_or_else(|| EngineError::UnknownSolver {
				kind: kind_id.to_string(),
				solver: solver_id.to_string(),
			})
	}

	pub fn examples(&self, kind_id: &str) -> Result<Vec<ExampleInfo>, EngineError> {
		Ok(self.entry(kind_id)?.erased.examples())
	}

	pub(crate) fn erased(&self, kind_id: &str) -> Result<Arc<dyn ErasedRegistry>, EngineError> {
		Ok(self.entry(kind_id)?.erased.clone())
	}

	fn entry(&self, kind_id: &str) -> Result<&KindEntry, EngineError> {
		self.entries
			.get(kind_id)
			.ok_or_else(|| EngineError::UnknownKind(kind_id.to_string()))
	}
}
