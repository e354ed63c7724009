mod cli;
mod daemon;
mod error;
mod export;
mod generator;
mod rpc;
mod utils;
mod wallet;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::Args;
use crate::error::GeneratorError;
use crate::generator::Generator;

#[tokio::main(flavor = "current_thread")]
async fn main() {
	let args = Args::parse();

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::builder()
				.with_default_directive(tracing::Level::INFO.into())
				.from_env_lossy(),
		)
		.with_target(false)
		.with_thread_ids(false)
		.with_thread_names(false)
		.with_file(false)
		.with_line_number(false)
		.with_timer(tracing_subscriber::fmt::time::time())
		.init();

	info!("Starting regtest fixture generator");

	let mut generator = Generator::new(
		args.generation_config(),
		args.daemon_mode(),
		args.output_base().to_path_buf(),
	)
	.with_blocks_dat(args.export_blocks_dat);

	let result = tokio::select! {
		result = generator.run() => result,
		_ = tokio::signal::ctrl_c() => Err(GeneratorError::Interrupted),
	};

	generator.shutdown().await;

	match result {
		Ok(_) => {}
		Err(GeneratorError::Interrupted) => {
			warn!("Interrupted by user");
			std::process::exit(GeneratorError::Interrupted.exit_code());
		}
		Err(e) => {
			error!("{}", e);
			std::process::exit(e.exit_code());
		}
	}
}
