//! Local process executor.
//!
//! Every job runs in `<working_directory>/<kind>/<solution id>`. Working files are written there
//! before the command starts, and `INPUT_FILE_PATH` / `OUTPUT_FILE_PATH` in the arguments are
//! replaced by the absolute paths of the configured input and output files.

use crate::{
	CommandSpec, ExecutionError, ExecutionInterface, ExecutionResult, JobKey, WorkingFile,
	INPUT_FILE_PATH, OUTPUT_FILE_PATH,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::fs;
use tokio::process::Command;
use tracing::{debug, warn};

pub struct ProcessExecutor {
	working_directory: PathBuf,
	timeout: Option<Duration>,
}

impl ProcessExecutor {
	pub fn new(working_directory: impl Into<PathBuf>) -> Self {
		Self {
			working_directory: working_directory.into(),
			timeout: None,
		}
	}

	pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.timeout = timeout;
		self
	}

	/// Directory owned by one job.
	pub fn job_directory(&self, job: &JobKey) -> PathBuf {
		self.working_directory
			.join(sanitize(&job.kind_id))
			.join(job.solution_id.to_string())
	}

	async fn prepare(&self, job: &JobKey, files: &[WorkingFile]) -> Result<PathBuf, ExecutionError> {
		let dir = self.job_directory(job);
		fs::create_dir_all(&dir).await?;
		let dir = fs::canonicalize(&dir).await?;

		for file in files {
			check_file_name(&file.name)?;
			fs::write(dir.join(&file.name), &file.contents).await?;
		}
		Ok(dir)
	}
}

fn sanitize(segment: &str) -> String {
	segment.replace(['/', '\\', ':'], "_")
}

fn check_file_name(name: &str) -> Result<(), ExecutionError> {
	let plain = !name.is_empty()
		&& name != "."
		&& name != ".."
		&& !name.contains(['/', '\\']);
	if plain {
		Ok(())
	} else {
		Err(ExecutionError::InvalidFileName(name.to_string()))
	}
}

fn normalized(path: &Path) -> String {
	path.to_string_lossy().replace('\\', "/")
}

#[async_trait]
impl ExecutionInterface for ProcessExecutor {
	async fn run(
		&self,
		job: &JobKey,
		command: &CommandSpec,
		files: &[WorkingFile],
	) -> Result<ExecutionResult, ExecutionError> {
		let dir = self.prepare(job, files).await?;

		let input_path = match &command.input_file {
			Some(name) => {
				check_file_name(name)?;
				Some(normalized(&dir.join(name)))
			}
			None => None,
		};
		let output_path = match &command.output_file {
			Some(name) => {
				check_file_name(name)?;
				Some(dir.join(name))
			}
			None => None,
		};

		let args: Vec<String> = command
			.args
			.iter()
			.map(|arg| {
				let mut arg = arg.clone();
				if let Some(path) = &input_path {
					arg = arg.replace(INPUT_FILE_PATH, path);
				}
				if let Some(path) = &output_path {
					arg = arg.replace(OUTPUT_FILE_PATH, &normalized(path));
				}
				arg
			})
			.collect();

		debug!(program = %command.program, ?args, dir = %dir.display(), "Spawning process");

		let child = Command::new(&command.program)
			.args(&args)
			.envs(&command.env)
			.current_dir(&dir)
			.stdin(Stdio::null())
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true)
			.spawn()
			.map_err(|e| ExecutionError::Spawn {
				program: command.program.clone(),
				reason: e.to_string(),
			})?;

		let output = match self.timeout {
			Some(timeout) => tokio::time::timeout(timeout, child.wait_with_output())
				.await
				.map_err(|_| ExecutionError::Timeout {
					program: command.program.clone(),
					timeout,
				})??,
			None => child.wait_with_output().await?,
		};

		let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
		let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

		if !output.status.success() {
			warn!(program = %command.program, status = %output.status, "Process failed");
			let mut debug = format!("{} exited with {}", command.program, output.status);
			if !stderr.trim().is_empty() {
				debug.push('\n');
				debug.push_str(stderr.trim_end());
			}
			return Ok(ExecutionResult {
				success: false,
				output: None,
				debug,
			});
		}

		let result_output = match output_path {
			Some(path) => match fs::read_to_string(&path).await {
				Ok(contents) => Some(contents),
				Err(e) => {
					warn!(path = %path.display(), "Output file not readable: {}", e);
					None
				}
			},
			None => Some(stdout),
		};

		Ok(ExecutionResult {
			success: true,
			output: result_output,
			debug: stderr.trim_end().to_string(),
		})
	}
}

/// Factory function to create a process executor from configuration.
///
/// Configuration parameters:
/// - `working_directory`: Base directory for job directories (default: "./jobs")
/// - `command_timeout_secs`: Optional per-command timeout
pub fn create_executor(config: &toml::Value) -> Box<dyn ExecutionInterface> {
	let working_directory = config
		.get("working_directory")
		.and_then(|v| v.as_str())
		.unwrap_or("./jobs")
		.to_string();
	let timeout = config
		.get("command_timeout_secs")
		.and_then(|v| v.as_integer())
		.and_then(|secs| u64::try_from(secs).ok())
		.map(Duration::from_secs);

	Box::new(ProcessExecutor::new(working_directory).with_timeout(timeout))
}
