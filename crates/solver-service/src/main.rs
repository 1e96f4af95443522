use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use solver_config::{ConfigLoader, ToolboxConfig};
use solver_core::{
	CatalogBuilder, EngineError, SolutionEvent, SolutionHandle, SolveRequest, SolverBuilder,
	SolverEngine, SolverInfo,
};
use solver_execution::implementations::process::create_executor;
use solver_execution::ExecutionService;
use solver_plugins::register_bundled;
use solver_storage::implementations::memory::create_storage;
use solver_types::Confidence;
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

mod cli;

use cli::{Args, Command, SolveArgs};

#[derive(Serialize)]
struct SolverListing {
	#[serde(flatten)]
	info: SolverInfo,
	confidence: Confidence,
}

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	// Load configuration
	let mut loader = ConfigLoader::new();
	if let Some(path) = &args.config {
		loader = loader.with_file(path);
	}
	let config = loader.load().await.context("Failed to load configuration")?;

	let level = args
		.log_level
		.clone()
		.unwrap_or_else(|| config.logging.level.clone());
	setup_tracing(&level, config.logging.json);

	let engine = build_engine(config)?;

	match args.command {
		Command::Kinds => print_json(&engine.kinds()),
		Command::Solvers { kind } => list_solvers(&engine, &kind),
		Command::Examples { kind } => print_json(&engine.examples(&kind)?),
		Command::Solve(solve_args) => solve(&engine, solve_args).await,
		Command::Validate => {
			info!("Configuration is valid");
			info!("Selection policy: {}", engine.config().runtime.selection);
			for kind in engine.kinds() {
				let solvers = engine.solvers(&kind.id)?;
				info!("  {}: {} solver(s)", kind.id, solvers.len());
			}
			Ok(())
		}
	}
}

fn build_engine(config: ToolboxConfig) -> Result<SolverEngine> {
	let execution = config
		.execution
		.to_value()
		.context("Failed to read execution configuration")?;
	let executor = Arc::new(ExecutionService::new(create_executor(&execution)));

	let catalog = register_bundled(CatalogBuilder::new(), executor)
		.build()
		.context("Failed to build problem catalog")?;

	SolverBuilder::new(config)
		.with_catalog(catalog)
		.with_storage_factory(create_storage)
		.build()
		.context("Failed to build solver engine")
}

fn list_solvers(engine: &SolverEngine, kind: &str) -> Result<()> {
	let listings = engine
		.solvers(kind)?
		.into_iter()
		.map(|info| {
			let confidence = engine.confidence(kind, &info.id)?;
			Ok(SolverListing { info, confidence })
		})
		.collect::<Result<Vec<_>>>()?;
	print_json(&listings)
}

async fn solve(engine: &SolverEngine, args: SolveArgs) -> Result<()> {
	let mut request = match &args.request {
		Some(path) => {
			let raw = tokio::fs::read_to_string(path)
				.await
				.with_context(|| format!("Failed to read solve request {:?}", path))?;
			serde_json::from_str(&raw).context("Invalid solve request")?
		}
		None => SolveRequest::new(),
	};
	if args.solver.is_some() {
		request.solver_id = args.solver;
	}
	request.settings.extend(args.settings);

	let mut events = engine.subscribe();
	let handle = match (&args.example, &args.input) {
		(Some(example), _) => engine.submit_example(&args.kind, example, request).await?,
		(None, Some(raw)) => submit_input(engine, &args.kind, raw, request).await?,
		(None, None) => bail!("Either an input or --example is required"),
	};
	info!(
		solution_id = %handle.id(),
		solver = handle.solver_id(),
		"Solving {}",
		args.kind
	);

	let mut updates = handle.status_updates();
	tokio::select! {
		_ = updates.wait_for(|status| status.is_terminal()) => {}
		_ = shutdown_signal() => {
			warn!("Interrupted, cancelling solve");
			handle.cancel();
		}
	}
	let solution = handle.wait().await;

	while let Ok(event) = events.try_recv() {
		if let SolutionEvent::Finished {
			id,
			parent: Some(parent),
			kind,
			status,
		} = event
		{
			info!(solution_id = %id, %parent, kind = %kind, "Sub-routine ended {}", status);
		}
	}

	print_json(&solution.to_record())?;
	if !solution.is_solved() {
		bail!("Solution {} ended {}", solution.id(), solution.status());
	}
	Ok(())
}

/// Submits command-line input, trying each of its JSON readings until the kind accepts one.
async fn submit_input(
	engine: &SolverEngine,
	kind: &str,
	raw: &str,
	request: SolveRequest,
) -> Result<SolutionHandle<serde_json::Value>> {
	let mut rejected = None;
	for input in cli::input_candidates(raw) {
		match engine.submit_json(kind, input, request.clone()).await {
			Err(e @ EngineError::InvalidInput { .. }) => rejected = Some(e),
			other => return Ok(other?),
		}
	}
	Err(rejected.map_or_else(|| anyhow!("No input given"), Into::into))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
	println!(
		"{}",
		serde_json::to_string_pretty(value).context("Failed to render output")?
	);
	Ok(())
}

fn setup_tracing(log_level: &str, json: bool) {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	// Logs go to stderr so that stdout stays valid JSON.
	let fmt_layer = if json {
		tracing_subscriber::fmt::layer()
			.json()
			.with_writer(std::io::stderr)
			.boxed()
	} else {
		tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.boxed()
	};

	tracing_subscriber::registry()
		.with(fmt_layer)
		.with(env_filter)
		.init();
}

async fn shutdown_signal() {
	let ctrl_c = async {
		if let Err(e) = signal::ctrl_c().await {
			warn!("Failed to listen for Ctrl+C: {}", e);
			std::future::pending::<()>().await;
		}
	};

	#[cfg(unix)]
	let terminate = async {
		match signal::unix::signal(signal::unix::SignalKind::terminate()) {
			Ok(mut stream) => {
				stream.recv().await;
			}
			Err(e) => {
				warn!("Failed to listen for SIGTERM: {}", e);
				std::future::pending::<()>().await;
			}
		}
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}
