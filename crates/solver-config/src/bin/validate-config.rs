//! Configuration validation utility
//!
//! Usage: validate-config config/toolbox.toml

use std::env;
use std::process;

use solver_config::ConfigLoader;

#[tokio::main]
async fn main() {
	let args: Vec<String> = env::args().collect();

	if args.len() != 2 {
		eprintln!("Usage: {} <config-file>", args[0]);
		process::exit(1);
	}

	let config_path = &args[1];

	println!("Validating configuration file: {}", config_path);

	match ConfigLoader::new().with_file(config_path).load().await {
		Ok(config) => {
			println!("✅ Configuration is valid!");
			println!("Selection policy: {}", config.runtime.selection);
			println!("Log level: {}", config.logging.level);
			println!(
				"Working directory: {}",
				config.execution.working_directory.display()
			);
			println!("Storage backend: {}", config.storage.backend);
			println!("Confidence scores: {}", config.confidence.scores.len());
		}
		Err(e) => {
			eprintln!("❌ Configuration validation failed:");
			eprintln!("{}", e);
			process::exit(1);
		}
	}
}
