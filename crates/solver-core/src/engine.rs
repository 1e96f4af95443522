//! Top-level entry point: submission, polling and read-only introspection.

use crate::catalog::{ExampleInfo, ProblemCatalog};
use crate::confidence::{ConfidenceCalculator, ConfidenceService, StaticConfidence};
use crate::error::EngineError;
use crate::event_bus::{EventBus, SolutionEvent};
use crate::handle::SolutionHandle;
use crate::runtime::{Runtime, SOLUTIONS_NAMESPACE};
use crate::selector::{create_strategy, SelectionStrategy};
use crate::solver::SolverInfo;
use serde::{Deserialize, Serialize};
use solver_config::ToolboxConfig;
use solver_storage::{StorageError, StorageInterface, StorageService};
use solver_types::{
	Confidence, KindDescriptor, ProblemData, ProblemKind, SettingValue, SettingsInput, Solution,
	SolutionId, SolutionRecord,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// How to run one solve: which solver, with which settings, and recursively how to run the
/// sub-routines it calls, keyed by problem kind id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolveRequest {
	pub solver_id: Option<String>,
	pub settings: SettingsInput,
	pub sub_requests: BTreeMap<String, SolveRequest>,
}

impl SolveRequest {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_solver(mut self, solver_id: impl Into<String>) -> Self {
		self.solver_id = Some(solver_id.into());
		self
	}

	pub fn with_setting(mut self, name: impl Into<String>, value: SettingValue) -> Self {
		self.settings.insert(name.into(), value);
		self
	}

	pub fn with_sub_request(mut self, kind_id: impl Into<String>, request: SolveRequest) -> Self {
		self.sub_requests.insert(kind_id.into(), request);
		self
	}
}

pub struct SolverEngine {
	runtime: Arc<Runtime>,
	confidence: ConfidenceService,
	config: ToolboxConfig,
}

impl SolverEngine {
	/// Submits a top-level solve and returns immediately with a handle.
	///
	/// Validation and resolution problems are reported here and no solution is created for
	/// them. Everything that goes wrong after a solver was chosen is reported through the
	/// solution instead.
	pub async fn submit<I: ProblemData, O: ProblemData>(
		&self,
		kind: &ProblemKind<I, O>,
		input: I,
		request: SolveRequest,
	) -> Result<SolutionHandle<O>, EngineError> {
		let registry = self.runtime.catalog.registry(kind)?;
		self.runtime.submit(&registry, input, request).await
	}

	/// Submits and waits for the terminal solution.
	pub async fn solve<I: ProblemData, O: ProblemData>(
		&self,
		kind: &ProblemKind<I, O>,
		input: I,
		request: SolveRequest,
	) -> Result<Solution<O>, EngineError> {
		Ok(self.submit(kind, input, request).await?.wait().await)
	}

	/// Submits raw JSON input for a kind known only by name.
	pub async fn submit_json(
		&self,
		kind_id: &str,
		input: serde_json::Value,
		request: SolveRequest,
	) -> Result<SolutionHandle<serde_json::Value>, EngineError> {
		let registry = self.runtime.catalog.erased(kind_id)?;
		registry
			.submit_json(self.runtime.clone(), input, request)
			.await
	}

	/// Submits one of the kind's bundled examples.
	pub async fn submit_example(
		&self,
		kind_id: &str,
		example: &str,
		request: SolveRequest,
	) -> Result<SolutionHandle<serde_json::Value>, EngineError> {
		let input = self
			.runtime
			.catalog
			.examples(kind_id)?
			.into_iter()
			.find(|info| info.name == example)
			.map(|info| info.input)
			.ok_or_else(|| EngineError::InvalidInput {
				kind: kind_id.to_string(),
				reason: format!("no example named '{}'", example),
			})?;
		self.submit_json(kind_id, input, request).await
	}

	/// Latest record of any solution, top-level or sub-routine.
	pub async fn poll(&self, id: SolutionId) -> Result<SolutionRecord, EngineError> {
		self.runtime
			.storage
			.retrieve(SOLUTIONS_NAMESPACE, &id.to_string())
			.await
			.map_err(|e| match e {
				StorageError::NotFound => EngineError::UnknownSolution(id),
				other => EngineError::Storage(other),
			})
	}

	pub fn kinds(&self) -> Vec<KindDescriptor> {
		self.runtime.catalog.kinds()
	}

	pub fn describe(&self, kind_id: &str) -> Result<KindDescriptor, EngineError> {
		self.runtime.catalog.describe(kind_id)
	}

	pub fn solvers(&self, kind_id: &str) -> Result<Vec<SolverInfo>, EngineError> {
		self.runtime.catalog.solvers(kind_id)
	}

	pub fn examples(&self, kind_id: &str) -> Result<Vec<ExampleInfo>, EngineError> {
		self.runtime.catalog.examples(kind_id)
	}

	/// Advisory confidence for one solver.
	pub fn confidence(&self, kind_id: &str, solver_id: &str) -> Result<Confidence, EngineError> {
		let info = self.runtime.catalog.solver(kind_id, solver_id)?;
		Ok(self.confidence.score(&info))
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SolutionEvent> {
		self.runtime.events.subscribe()
	}

	pub fn catalog(&self) -> &ProblemCatalog {
		&self.runtime.catalog
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.runtime.events
	}

	pub fn config(&self) -> &ToolboxConfig {
		&self.config
	}
}

type StorageFactory = Box<dyn Fn(&toml::Value) -> Box<dyn StorageInterface> + Send>;

/// Wires the catalog, storage, selection and confidence scoring into an engine.
pub struct SolverBuilder {
	config: ToolboxConfig,
	catalog: Option<ProblemCatalog>,
	storage_factory: Option<StorageFactory>,
	strategy: Option<Box<dyn SelectionStrategy>>,
	calculators: Vec<Box<dyn ConfidenceCalculator>>,
}

impl SolverBuilder {
	pub fn new(config: ToolboxConfig) -> Self {
		Self {
			config,
			catalog: None,
			storage_factory: None,
			strategy: None,
			calculators: Vec::new(),
		}
	}

	pub fn with_catalog(mut self, catalog: ProblemCatalog) -> Self {
		self.catalog = Some(catalog);
		self
	}

	pub fn with_storage_factory<F>(mut self, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Box<dyn StorageInterface> + Send + 'static,
	{
		self.storage_factory = Some(Box::new(factory));
		self
	}

	/// Overrides the strategy named by the configuration.
	pub fn with_strategy(mut self, strategy: Box<dyn SelectionStrategy>) -> Self {
		self.strategy = Some(strategy);
		self
	}

	/// Adds a calculator after the configured static scores.
	pub fn with_confidence_calculator(mut self, calculator: Box<dyn ConfidenceCalculator>) -> Self {
		self.calculators.push(calculator);
		self
	}

	pub fn build(self) -> Result<SolverEngine, EngineError> {
		let catalog = self
			.catalog
			.ok_or_else(|| EngineError::Config("Problem catalog not provided".into()))?;

		let storage_factory = self
			.storage_factory
			.ok_or_else(|| EngineError::Config("Storage factory not provided".into()))?;
		if self.config.runtime.event_capacity == 0 {
			return Err(EngineError::Config(
				"runtime.event_capacity must be greater than zero".into(),
			));
		}
		let storage_config = self
			.config
			.storage
			.to_value()
			.map_err(|e| EngineError::Config(format!("Invalid storage section: {}", e)))?;
		let storage = StorageService::new(storage_factory(&storage_config));

		let strategy = self
			.strategy
			.unwrap_or_else(|| create_strategy(self.config.runtime.selection));

		let mut confidence = ConfidenceService::new();
		if !self.config.confidence.scores.is_empty() {
			confidence = confidence.with_calculator(Box::new(StaticConfidence::new(
				self.config.confidence.scores.clone(),
			)));
		}
		for calculator in self.calculators {
			confidence = confidence.with_calculator(calculator);
		}

		info!(
			kinds = catalog.kinds().len(),
			strategy = strategy.name(),
			"Solver engine ready"
		);

		let runtime = Arc::new(Runtime {
			catalog: Arc::new(catalog),
			strategy,
			storage,
			events: EventBus::new(self.config.runtime.event_capacity),
			sub_routine_timeout: self.config.runtime.sub_routine_timeout(),
			top_level_timeout: self.config.runtime.top_level_timeout(),
			record_ttl: self.config.storage.record_ttl(),
		});

		Ok(SolverEngine {
			runtime,
			confidence,
			config: self.config,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::catalog::CatalogBuilder;
	use crate::solver::{SolveContext, Solver};
	use async_trait::async_trait;
	use serde_json::json;
	use solver_storage::implementations::memory::create_storage;
	use solver_types::{
		SettingDefinition, SettingsSchema, SolutionStatus, SolveError, SubRoutineDefinition,
		SubRoutineInfo,
	};
	use std::collections::HashSet;
	use std::time::Duration;
	use tokio::sync::broadcast::error::TryRecvError;

	const ECHO: ProblemKind<String, String> = ProblemKind::new("echo", "Returns its input");
	const DELEGATE: ProblemKind<String, String> =
		ProblemKind::new("delegate", "Answers by asking echo");
	const EMPTY: ProblemKind<String, String> = ProblemKind::new("empty", "Nobody solves this");
	const LOOP_A: ProblemKind<String, String> = ProblemKind::new("loop-a", "Calls loop-b");
	const LOOP_B: ProblemKind<String, String> = ProblemKind::new("loop-b", "Calls loop-a");
	const RECURSE: ProblemKind<String, String> = ProblemKind::new("recurse", "Calls itself");
	const WAITS: ProblemKind<String, String> = ProblemKind::new("waits", "Waits on slow");
	const SLOW: ProblemKind<String, String> = ProblemKind::new("slow", "Takes an hour");
	const MISC: ProblemKind<String, String> = ProblemKind::new("misc", "Misbehaving solvers");
	const TUNED: ProblemKind<String, String> = ProblemKind::new("tuned", "Needs settings");
	const NOBODY: ProblemKind<String, String> =
		ProblemKind::new("nobody", "Registered without solvers");
	const IGNORES: ProblemKind<String, String> =
		ProblemKind::new("ignores", "Reports whatever nobody returned");
	const FRAGILE: ProblemKind<String, String> =
		ProblemKind::new("fragile", "Selection hooks panic");
	const NEEDS_FRAGILE: ProblemKind<String, String> =
		ProblemKind::new("needs-fragile", "Reports whatever fragile returned");

	const ECHO_CALL: SubRoutineDefinition<String, String> =
		SubRoutineDefinition::new(ECHO, "echo", "Echoes the input");
	const TO_A: SubRoutineDefinition<String, String> =
		SubRoutineDefinition::new(LOOP_A, "a", "Back to loop-a");
	const TO_B: SubRoutineDefinition<String, String> =
		SubRoutineDefinition::new(LOOP_B, "b", "On to loop-b");
	const TO_SELF: SubRoutineDefinition<String, String> =
		SubRoutineDefinition::new(RECURSE, "self", "Same kind again");
	const TO_SLOW: SubRoutineDefinition<String, String> =
		SubRoutineDefinition::new(SLOW, "slow", "The slow part");
	const TO_NOBODY: SubRoutineDefinition<String, String> =
		SubRoutineDefinition::new(NOBODY, "nobody", "Nobody answers");
	const TO_FRAGILE: SubRoutineDefinition<String, String> =
		SubRoutineDefinition::new(FRAGILE, "fragile", "Cannot be selected");

	struct Echo {
		id: &'static str,
		upper: bool,
		score: f64,
	}

	#[async_trait]
	impl Solver<String, String> for Echo {
		fn id(&self) -> &str {
			self.id
		}

		fn name(&self) -> &str {
			"Echo"
		}

		fn suitability(&self, _input: &String) -> f64 {
			self.score
		}

		async fn solve(
			&self,
			input: String,
			solution: &mut Solution<String>,
			_ctx: &SolveContext,
		) -> Result<(), SolveError> {
			let output = if self.upper {
				input.to_uppercase()
			} else {
				input
			};
			solution.complete(output)?;
			Ok(())
		}
	}

	/// Forwards its input to one sub-routine and adopts the result.
	struct Chain {
		id: &'static str,
		next: SubRoutineDefinition<String, String>,
	}

	#[async_trait]
	impl Solver<String, String> for Chain {
		fn id(&self) -> &str {
			self.id
		}

		fn name(&self) -> &str {
			"Chain"
		}

		fn sub_routines(&self) -> Vec<SubRoutineInfo> {
			vec![self.next.info()]
		}

		async fn solve(
			&self,
			input: String,
			solution: &mut Solution<String>,
			ctx: &SolveContext,
		) -> Result<(), SolveError> {
			let sub = ctx.run_sub_routine(&self.next, input).await;
			let status = sub.status();
			let debug = sub.debug().to_string();
			match sub.into_data() {
				Some(data) if status.is_success() => {
					solution.complete(data)?;
					Ok(())
				}
				_ => Err(SolveError::aborted(format!(
					"Sub-routine '{}' ended {}: {}",
					self.next.label(),
					status,
					debug
				))),
			}
		}
	}

	struct Sleeper;

	#[async_trait]
	impl Solver<String, String> for Sleeper {
		fn id(&self) -> &str {
			"sleeper"
		}

		fn name(&self) -> &str {
			"Sleeper"
		}

		async fn solve(
			&self,
			input: String,
			solution: &mut Solution<String>,
			_ctx: &SolveContext,
		) -> Result<(), SolveError> {
			tokio::time::sleep(Duration::from_secs(3600)).await;
			solution.complete(input)?;
			Ok(())
		}
	}

	/// Calls echo without declaring it and reports what came back.
	struct Sneaky;

	#[async_trait]
	impl Solver<String, String> for Sneaky {
		fn id(&self) -> &str {
			"sneaky"
		}

		fn name(&self) -> &str {
			"Sneaky"
		}

		async fn solve(
			&self,
			input: String,
			solution: &mut Solution<String>,
			ctx: &SolveContext,
		) -> Result<(), SolveError> {
			let sub = ctx.run_sub_routine(&ECHO_CALL, input).await;
			solution.complete(format!("{}|{}", sub.status(), sub.debug()))?;
			Ok(())
		}
	}

	/// Declares one sub-routine and completes with its status and diagnostic, whatever happened.
	struct Stubborn {
		id: &'static str,
		next: SubRoutineDefinition<String, String>,
	}

	#[async_trait]
	impl Solver<String, String> for Stubborn {
		fn id(&self) -> &str {
			self.id
		}

		fn name(&self) -> &str {
			"Stubborn"
		}

		fn sub_routines(&self) -> Vec<SubRoutineInfo> {
			vec![self.next.info()]
		}

		async fn solve(
			&self,
			input: String,
			solution: &mut Solution<String>,
			ctx: &SolveContext,
		) -> Result<(), SolveError> {
			let sub = ctx.run_sub_routine(&self.next, input).await;
			solution.complete(format!("{}|{}", sub.status(), sub.debug()))?;
			Ok(())
		}
	}

	struct Fragile;

	#[async_trait]
	impl Solver<String, String> for Fragile {
		fn id(&self) -> &str {
			"fragile"
		}

		fn name(&self) -> &str {
			"Fragile"
		}

		fn can_handle(&self, _input: &String) -> bool {
			panic!("hook boom")
		}

		async fn solve(
			&self,
			input: String,
			solution: &mut Solution<String>,
			_ctx: &SolveContext,
		) -> Result<(), SolveError> {
			solution.complete(input)?;
			Ok(())
		}
	}

	struct Panicker;

	#[async_trait]
	impl Solver<String, String> for Panicker {
		fn id(&self) -> &str {
			"panicker"
		}

		fn name(&self) -> &str {
			"Panicker"
		}

		async fn solve(
			&self,
			_input: String,
			_solution: &mut Solution<String>,
			_ctx: &SolveContext,
		) -> Result<(), SolveError> {
			panic!("boom")
		}
	}

	struct Forgetful;

	#[async_trait]
	impl Solver<String, String> for Forgetful {
		fn id(&self) -> &str {
			"forgetful"
		}

		fn name(&self) -> &str {
			"Forgetful"
		}

		async fn solve(
			&self,
			_input: String,
			_solution: &mut Solution<String>,
			_ctx: &SolveContext,
		) -> Result<(), SolveError> {
			Ok(())
		}
	}

	struct Refuser;

	#[async_trait]
	impl Solver<String, String> for Refuser {
		fn id(&self) -> &str {
			"refuser"
		}

		fn name(&self) -> &str {
			"Refuser"
		}

		async fn solve(
			&self,
			_input: String,
			_solution: &mut Solution<String>,
			_ctx: &SolveContext,
		) -> Result<(), SolveError> {
			Err(SolveError::aborted("unsupported input"))
		}
	}

	struct Broken;

	#[async_trait]
	impl Solver<String, String> for Broken {
		fn id(&self) -> &str {
			"broken"
		}

		fn name(&self) -> &str {
			"Broken"
		}

		async fn solve(
			&self,
			_input: String,
			_solution: &mut Solution<String>,
			_ctx: &SolveContext,
		) -> Result<(), SolveError> {
			Err(SolveError::from(anyhow::anyhow!("disk on fire")))
		}
	}

	struct Tuned;

	#[async_trait]
	impl Solver<String, String> for Tuned {
		fn id(&self) -> &str {
			"tuned"
		}

		fn name(&self) -> &str {
			"Tuned"
		}

		fn settings_schema(&self) -> SettingsSchema {
			SettingsSchema::new(vec![
				SettingDefinition::integer("repeat", 1, 5, Some(1)),
				SettingDefinition::select("mode", ["plain", "loud"], None).required(),
			])
		}

		fn can_handle(&self, input: &String) -> bool {
			!input.is_empty()
		}

		async fn solve(
			&self,
			_input: String,
			solution: &mut Solution<String>,
			ctx: &SolveContext,
		) -> Result<(), SolveError> {
			let mode = ctx.settings().text("mode").unwrap_or_default().to_string();
			let repeat = ctx.settings().integer("repeat").unwrap_or_default();
			solution.complete(format!("{}:{}", mode, repeat))?;
			Ok(())
		}
	}

	fn catalog() -> ProblemCatalog {
		CatalogBuilder::new()
			.with_kind(ECHO)
			.with_kind(DELEGATE)
			.with_kind(EMPTY)
			.with_kind(LOOP_A)
			.with_kind(LOOP_B)
			.with_kind(RECURSE)
			.with_kind(WAITS)
			.with_kind(SLOW)
			.with_kind(MISC)
			.with_kind(TUNED)
			.with_kind(NOBODY)
			.with_kind(IGNORES)
			.with_kind(FRAGILE)
			.with_kind(NEEDS_FRAGILE)
			.with_solver(
				&ECHO,
				Echo {
					id: "echo",
					upper: false,
					score: 1.0,
				},
			)
			.with_solver(
				&ECHO,
				Echo {
					id: "echo-upper",
					upper: true,
					score: 0.5,
				},
			)
			.with_solver(
				&DELEGATE,
				Chain {
					id: "delegate",
					next: ECHO_CALL,
				},
			)
			.with_solver(
				&LOOP_A,
				Chain {
					id: "loop-a",
					next: TO_B,
				},
			)
			.with_solver(
				&LOOP_B,
				Chain {
					id: "loop-b",
					next: TO_A,
				},
			)
			.with_solver(
				&RECURSE,
				Chain {
					id: "recurse",
					next: TO_SELF,
				},
			)
			.with_solver(
				&WAITS,
				Chain {
					id: "waits",
					next: TO_SLOW,
				},
			)
			.with_solver(&SLOW, Sleeper)
			.with_solver(&MISC, Sneaky)
			.with_solver(&MISC, Panicker)
			.with_solver(&MISC, Forgetful)
			.with_solver(&MISC, Refuser)
			.with_solver(&MISC, Broken)
			.with_solver(&TUNED, Tuned)
			.with_solver(
				&IGNORES,
				Stubborn {
					id: "ignores",
					next: TO_NOBODY,
				},
			)
			.with_solver(&FRAGILE, Fragile)
			.with_solver(
				&NEEDS_FRAGILE,
				Stubborn {
					id: "needs-fragile",
					next: TO_FRAGILE,
				},
			)
			.with_example(&ECHO, "greeting", "hello".to_string())
			.build()
			.unwrap()
	}

	fn engine_with(config: ToolboxConfig) -> SolverEngine {
		SolverBuilder::new(config)
			.with_catalog(catalog())
			.with_storage_factory(create_storage)
			.build()
			.unwrap()
	}

	fn engine() -> SolverEngine {
		engine_with(ToolboxConfig::default())
	}

	fn drain(events: &mut broadcast::Receiver<SolutionEvent>) -> Vec<SolutionEvent> {
		let mut seen = Vec::new();
		while let Ok(event) = events.try_recv() {
			seen.push(event);
		}
		seen
	}

	fn run(solver: &str) -> SolveRequest {
		SolveRequest::new().with_solver(solver)
	}

	#[tokio::test]
	async fn test_echo_returns_input() {
		let engine = engine();
		let solution = engine
			.solve(&ECHO, "hello".to_string(), SolveRequest::new())
			.await
			.unwrap();

		assert_eq!(solution.status(), SolutionStatus::Solved);
		assert_eq!(solution.data().map(String::as_str), Some("hello"));
		assert_eq!(solution.solver_id(), Some("echo"));
		assert!(solution.parent().is_none());
	}

	#[tokio::test]
	async fn test_delegate_returns_sub_routine_result() {
		let engine = engine();
		let mut events = engine.subscribe();

		let solution = engine
			.solve(&DELEGATE, "world".to_string(), SolveRequest::new())
			.await
			.unwrap();
		assert_eq!(solution.status(), SolutionStatus::Solved);
		assert_eq!(solution.data().map(String::as_str), Some("world"));

		let child = drain(&mut events)
			.into_iter()
			.find_map(|event| match event {
				SolutionEvent::Finished {
					id, kind, status, ..
				} if kind == "echo" => Some((id, status)),
				_ => None,
			})
			.unwrap();
		assert_eq!(child.1, SolutionStatus::Solved);

		let record = engine.poll(child.0).await.unwrap();
		assert_eq!(record.parent, Some(solution.id()));
		assert_eq!(record.solver_id.as_deref(), Some("echo"));
		assert_eq!(record.data, Some(json!("world")));
	}

	#[tokio::test]
	async fn test_sub_request_chooses_sub_solver() {
		let engine = engine();
		let request = SolveRequest::new().with_sub_request("echo", run("echo-upper"));

		let solution = engine
			.solve(&DELEGATE, "world".to_string(), request)
			.await
			.unwrap();
		assert_eq!(solution.data().map(String::as_str), Some("WORLD"));
	}

	#[tokio::test]
	async fn test_kind_without_solvers_creates_no_solution() {
		let engine = engine();
		let mut events = engine.subscribe();

		let err = engine
			.submit(&EMPTY, "anything".to_string(), SolveRequest::new())
			.await
			.err()
			.unwrap();
		assert!(matches!(err, EngineError::NoSolver(ref kind) if kind == "empty"));
		assert!(err.is_resolution());
		assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));
	}

	#[tokio::test]
	async fn test_dependency_cycle_fails_fast() {
		let engine = engine();
		let mut events = engine.subscribe();

		let solution = engine
			.solve(&LOOP_A, "x".to_string(), SolveRequest::new())
			.await
			.unwrap();
		assert_eq!(solution.status(), SolutionStatus::Aborted);
		assert!(solution
			.debug()
			.contains("Dependency cycle detected: loop-a -> loop-b -> loop-a"));

		// loop-a and loop-b ran, the repeated loop-a was refused without running a solver.
		let events = drain(&mut events);
		let started = events
			.iter()
			.filter(|event| matches!(event, SolutionEvent::Started { .. }))
			.count();
		assert_eq!(started, 2);
		assert!(events.iter().any(|event| matches!(
			event,
			SolutionEvent::Finished { kind, status: SolutionStatus::Error, .. } if kind == "loop-a"
		)));
	}

	#[tokio::test]
	async fn test_self_recursion_is_a_cycle() {
		let engine = engine();
		let solution = engine
			.solve(&RECURSE, "x".to_string(), SolveRequest::new())
			.await
			.unwrap();
		assert_eq!(solution.status(), SolutionStatus::Error);
		assert!(solution.debug().contains("recurse -> recurse"));
	}

	#[tokio::test]
	async fn test_undeclared_sub_routine_is_refused() {
		let engine = engine();
		let solution = engine
			.solve(&MISC, "x".to_string(), run("sneaky"))
			.await
			.unwrap();

		assert_eq!(solution.status(), SolutionStatus::Error);
		assert!(solution.data().is_none());
		assert!(solution
			.debug()
			.starts_with("Sub-routine 'echo' could not be resolved"));
		assert!(solution.debug().contains("was not declared"));
	}

	#[tokio::test]
	async fn test_unresolvable_sub_routine_fails_caller() {
		let engine = engine();
		let mut events = engine.subscribe();

		let solution = engine
			.solve(&IGNORES, "x".to_string(), SolveRequest::new())
			.await
			.unwrap();
		assert_eq!(solution.status(), SolutionStatus::Error);
		assert!(solution.data().is_none());
		assert!(solution
			.debug()
			.starts_with("Sub-routine 'nobody' could not be resolved"));
		assert!(solution
			.debug()
			.contains("No solver registered for problem kind 'nobody'"));
		assert_eq!(
			engine.poll(solution.id()).await.unwrap().status,
			SolutionStatus::Error
		);

		let parent = solution.id();
		assert!(drain(&mut events).iter().any(|event| matches!(
			event,
			SolutionEvent::Finished { kind, parent: Some(p), status: SolutionStatus::Error, .. }
				if kind == "nobody" && *p == parent
		)));
	}

	#[tokio::test]
	async fn test_panicking_selection_hook_is_contained() {
		let engine = engine();

		let err = engine
			.submit(&FRAGILE, "x".to_string(), SolveRequest::new())
			.await
			.err()
			.unwrap();
		assert!(matches!(err, EngineError::NoAdmissibleSolver(ref kind) if kind == "fragile"));

		let solution = engine
			.solve(&NEEDS_FRAGILE, "x".to_string(), SolveRequest::new())
			.await
			.unwrap();
		assert_eq!(solution.status(), SolutionStatus::Error);
		assert!(solution
			.debug()
			.starts_with("Sub-routine 'fragile' could not be resolved"));
		assert!(!solution.debug().contains("panicked"));
	}

	#[tokio::test]
	async fn test_cancel_aborts_solution_and_children() {
		let engine = engine();
		let mut events = engine.subscribe();

		let handle = engine
			.submit(&WAITS, "x".to_string(), SolveRequest::new())
			.await
			.unwrap();
		let child = loop {
			match events.recv().await.unwrap() {
				SolutionEvent::Started { id, kind, .. } if kind == "slow" => break id,
				_ => continue,
			}
		};

		handle.cancel();
		let solution = handle.wait().await;
		assert_eq!(solution.status(), SolutionStatus::Aborted);
		assert_eq!(solution.debug(), "Cancelled");

		let record = engine.poll(child).await.unwrap();
		assert_eq!(record.status, SolutionStatus::Aborted);
		assert_eq!(record.parent, Some(solution.id()));
	}

	#[tokio::test(start_paused = true)]
	async fn test_top_level_deadline_aborts() {
		let mut config = ToolboxConfig::default();
		config.runtime.top_level_timeout_secs = Some(1);
		let engine = engine_with(config);

		let solution = engine
			.solve(&SLOW, "x".to_string(), SolveRequest::new())
			.await
			.unwrap();
		assert_eq!(solution.status(), SolutionStatus::Aborted);
		assert!(solution.debug().contains("Deadline of 1000ms exceeded"));
	}

	#[tokio::test(start_paused = true)]
	async fn test_sub_routine_deadline_reaches_caller() {
		let mut config = ToolboxConfig::default();
		config.runtime.sub_routine_timeout_secs = Some(2);
		let engine = engine_with(config);

		let solution = engine
			.solve(&WAITS, "x".to_string(), SolveRequest::new())
			.await
			.unwrap();
		assert_eq!(solution.status(), SolutionStatus::Aborted);
		assert!(solution.debug().contains("ended ABORTED"));
		assert!(solution.debug().contains("Deadline of 2000ms exceeded"));
	}

	#[tokio::test]
	async fn test_panicking_solver_ends_in_error() {
		let engine = engine();
		let handle = engine
			.submit(&MISC, "x".to_string(), run("panicker"))
			.await
			.unwrap();
		let id = handle.id();

		let solution = handle.wait().await;
		assert_eq!(solution.id(), id);
		assert_eq!(solution.status(), SolutionStatus::Error);
		assert!(solution.debug().contains("boom"));
		assert_eq!(engine.poll(id).await.unwrap().status, SolutionStatus::Error);
	}

	#[tokio::test]
	async fn test_solver_outcomes_map_to_status() {
		let engine = engine();

		let forgetful = engine.solve(&MISC, "x".to_string(), run("forgetful")).await.unwrap();
		assert_eq!(forgetful.status(), SolutionStatus::Error);
		assert!(forgetful.debug().contains("without reporting a result"));

		let refuser = engine.solve(&MISC, "x".to_string(), run("refuser")).await.unwrap();
		assert_eq!(refuser.status(), SolutionStatus::Aborted);
		assert_eq!(refuser.debug(), "unsupported input");

		let broken = engine.solve(&MISC, "x".to_string(), run("broken")).await.unwrap();
		assert_eq!(broken.status(), SolutionStatus::Error);
		assert!(broken.debug().contains("disk on fire"));
	}

	#[tokio::test]
	async fn test_settings_are_validated_before_solving() {
		let engine = engine();
		let mut events = engine.subscribe();

		let missing = engine
			.submit(&TUNED, "x".to_string(), SolveRequest::new())
			.await
			.err()
			.unwrap();
		assert!(matches!(missing, EngineError::InvalidSettings { .. }));
		assert!(missing.is_validation());

		let out_of_bounds = engine
			.submit(
				&TUNED,
				"x".to_string(),
				run("tuned")
					.with_setting("mode", SettingValue::Text("loud".into()))
					.with_setting("repeat", SettingValue::Integer(9)),
			)
			.await
			.err()
			.unwrap();
		assert!(matches!(out_of_bounds, EngineError::InvalidSettings { .. }));
		assert!(matches!(events.try_recv(), Err(TryRecvError::Empty)));

		let solution = engine
			.solve(
				&TUNED,
				"x".to_string(),
				SolveRequest::new().with_setting("mode", SettingValue::Text("loud".into())),
			)
			.await
			.unwrap();
		assert_eq!(solution.data().map(String::as_str), Some("loud:1"));
	}

	#[tokio::test]
	async fn test_explicit_solver_must_exist_and_handle_input() {
		let engine = engine();

		let unknown = engine
			.submit(&ECHO, "x".to_string(), run("nope"))
			.await
			.err()
			.unwrap();
		assert!(matches!(unknown, EngineError::UnknownSolver { .. }));

		let request = run("tuned").with_setting("mode", SettingValue::Text("plain".into()));
		let refused = engine
			.submit(&TUNED, String::new(), request)
			.await
			.err()
			.unwrap();
		assert!(matches!(refused, EngineError::NoAdmissibleSolver(_)));
		assert!(refused.is_resolution());
	}

	#[tokio::test]
	async fn test_poll_returns_latest_record() {
		let engine = engine();
		let handle = engine
			.submit(&ECHO, "hello".to_string(), SolveRequest::new())
			.await
			.unwrap();
		let id = handle.id();
		assert!(engine.poll(id).await.is_ok());

		handle.wait().await;
		let record = engine.poll(id).await.unwrap();
		assert_eq!(record.status, SolutionStatus::Solved);
		assert_eq!(record.kind_id, "echo");
		assert_eq!(record.data, Some(json!("hello")));

		let unknown = SolutionId::next();
		assert!(matches!(
			engine.poll(unknown).await,
			Err(EngineError::UnknownSolution(id)) if id == unknown
		));
	}

	#[tokio::test]
	async fn test_status_updates_reach_terminal() {
		let engine = engine();
		let handle = engine
			.submit(&ECHO, "hello".to_string(), SolveRequest::new())
			.await
			.unwrap();
		let mut updates = handle.status_updates();

		updates.wait_for(|status| status.is_terminal()).await.unwrap();
		assert_eq!(handle.status(), SolutionStatus::Solved);
	}

	#[tokio::test]
	async fn test_submit_json_and_examples() {
		let engine = engine();

		let solution = engine
			.submit_json("echo", json!("hi"), SolveRequest::new())
			.await
			.unwrap()
			.wait()
			.await;
		assert_eq!(solution.data(), Some(&json!("hi")));

		let example = engine
			.submit_example("echo", "greeting", SolveRequest::new())
			.await
			.unwrap()
			.wait()
			.await;
		assert_eq!(example.data(), Some(&json!("hello")));

		let bad_input = engine
			.submit_json("echo", json!(5), SolveRequest::new())
			.await
			.err()
			.unwrap();
		assert!(matches!(bad_input, EngineError::InvalidInput { .. }));

		let unknown_kind = engine
			.submit_json("nope", json!("hi"), SolveRequest::new())
			.await
			.err()
			.unwrap();
		assert!(matches!(unknown_kind, EngineError::UnknownKind(_)));

		let missing = engine
			.submit_example("echo", "missing", SolveRequest::new())
			.await
			.err()
			.unwrap();
		assert!(matches!(missing, EngineError::InvalidInput { .. }));
	}

	#[tokio::test]
	async fn test_introspection_lists_catalog() {
		let engine = engine();

		let kinds: Vec<String> = engine.kinds().into_iter().map(|kind| kind.id).collect();
		assert_eq!(kinds.first().map(String::as_str), Some("echo"));
		assert_eq!(kinds.len(), 14);

		let solvers = engine.solvers("delegate").unwrap();
		assert_eq!(solvers.len(), 1);
		assert_eq!(solvers[0].sub_routines[0].kind_id, "echo");
		assert_eq!(engine.examples("echo").unwrap()[0].name, "greeting");
		assert!(matches!(
			engine.describe("nope"),
			Err(EngineError::UnknownKind(_))
		));
	}

	#[tokio::test]
	async fn test_confidence_uses_configured_scores() {
		let mut config = ToolboxConfig::default();
		config.confidence.scores.insert("echo".into(), 0.9);
		let engine = engine_with(config);

		let known = engine.confidence("echo", "echo").unwrap();
		assert_eq!(known.score, Some(0.9));

		let unknown = engine.confidence("echo", "echo-upper").unwrap();
		assert!(unknown.is_unknown());
		assert_eq!(unknown.numeric_or_minus_one(), -1.0);

		assert!(engine.confidence("echo", "nope").is_err());
	}

	#[tokio::test]
	async fn test_concurrent_solves_are_independent() {
		let engine = engine();
		let mut handles = Vec::new();
		for i in 0..16 {
			let handle = engine
				.submit(&DELEGATE, format!("job-{}", i), SolveRequest::new())
				.await
				.unwrap();
			handles.push((i, handle));
		}

		let mut ids = HashSet::new();
		for (i, handle) in handles {
			let solution = handle.wait().await;
			assert_eq!(solution.data().cloned(), Some(format!("job-{}", i)));
			assert!(ids.insert(solution.id()));
		}
	}

	#[test]
	fn test_builder_requires_catalog_and_storage() {
		let no_catalog = SolverBuilder::new(ToolboxConfig::default())
			.with_storage_factory(create_storage)
			.build();
		assert!(matches!(no_catalog, Err(EngineError::Config(_))));

		let no_storage = SolverBuilder::new(ToolboxConfig::default())
			.with_catalog(catalog())
			.build();
		assert!(matches!(no_storage, Err(EngineError::Config(_))));
	}

	#[test]
	fn test_builder_rejects_zero_event_capacity() {
		let mut config = ToolboxConfig::default();
		config.runtime.event_capacity = 0;
		let result = SolverBuilder::new(config)
			.with_catalog(catalog())
			.with_storage_factory(create_storage)
			.build();
		assert!(matches!(result, Err(EngineError::Config(ref msg)) if msg.contains("event_capacity")));
	}

	#[test]
	fn test_storage_factory_receives_storage_section() {
		let seen = Arc::new(std::sync::Mutex::new(None));
		let captured = seen.clone();
		let mut config = ToolboxConfig::default();
		config.storage.record_ttl_secs = Some(30);

		SolverBuilder::new(config)
			.with_catalog(catalog())
			.with_storage_factory(move |value: &toml::Value| {
				*captured.lock().unwrap() = Some(value.clone());
				create_storage(value)
			})
			.build()
			.unwrap();

		let value = seen.lock().unwrap().clone().unwrap();
		assert_eq!(value.get("backend").and_then(|v| v.as_str()), Some("memory"));
		assert_eq!(
			value.get("record_ttl_secs").and_then(|v| v.as_integer()),
			Some(30)
		);
	}

	#[tokio::test(start_paused = true)]
	async fn test_finished_records_expire_after_retention() {
		let mut config = ToolboxConfig::default();
		config.storage.record_ttl_secs = Some(60);
		let engine = engine_with(config);
		let mut events = engine.subscribe();

		let finished = engine
			.solve(&ECHO, "hello".to_string(), SolveRequest::new())
			.await
			.unwrap();
		let running = engine
			.submit(&SLOW, "x".to_string(), SolveRequest::new())
			.await
			.unwrap();
		loop {
			match events.recv().await.unwrap() {
				SolutionEvent::Started { id, .. } if id == running.id() => break,
				_ => continue,
			}
		}
		assert!(engine.poll(finished.id()).await.is_ok());

		tokio::time::advance(Duration::from_secs(61)).await;
		assert!(matches!(
			engine.poll(finished.id()).await,
			Err(EngineError::UnknownSolution(_))
		));
		assert_eq!(
			engine.poll(running.id()).await.unwrap().status,
			SolutionStatus::Computing
		);

		running.cancel();
		running.wait().await;
	}
}
