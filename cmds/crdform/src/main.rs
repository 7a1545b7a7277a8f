use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use crdform::{
	commands::{
		self,
		util::{BrokenPipeGuard, GlobalArgs},
	},
	telemetry,
};

#[cfg(all(
	target_os = "linux",
	feature = "mimalloc",
	not(feature = "system-alloc")
))]
#[global_allocator]
static GLOBAL: mimallocator::Mimalloc = mimallocator::Mimalloc;

#[derive(Parser)]
#[command(name = "crdform")]
#[command(about = "Manage Kubernetes custom resources with server-side apply", long_about = None)]
#[command(version)]
struct Cli {
	#[command(flatten)]
	global: GlobalArgs,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// List resource, data source and manifest type names
	Types(commands::types::TypesArgs),

	/// Print the attribute table of a type
	Schema(commands::schema::SchemaArgs),

	/// Create or update a resource from a state file
	Apply(commands::apply::ApplyArgs),

	/// Read a live object as a data source
	Read(commands::read::ReadArgs),

	/// Refresh a state file from the cluster
	Refresh(commands::refresh::RefreshArgs),

	/// Delete the resource of a state file
	Delete(commands::delete::DeleteArgs),

	/// Import an existing object into state
	Import(commands::import::ImportArgs),

	/// Render a model as YAML without contacting a cluster
	Manifest(commands::manifest::ManifestArgs),

	/// Wait for a JSONPath condition on a live object
	Wait(commands::wait::WaitArgs),
}

fn run(cli: Cli) -> Result<()> {
	let runtime = tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.context("creating tokio runtime")?;
	// The OTLP exporter needs a runtime in scope when it is built.
	let _enter = runtime.enter();
	let _telemetry = telemetry::init(cli.global.log_level)?;

	let global = &cli.global;
	let stdout = BrokenPipeGuard::new(std::io::stdout());

	match cli.command {
		Commands::Types(args) => commands::types::run(args, global, stdout),
		Commands::Schema(args) => commands::schema::run(args, global, stdout),
		Commands::Manifest(args) => commands::manifest::run(args, global, stdout),
		Commands::Apply(args) => runtime.block_on(commands::apply::run(args, global, stdout)),
		Commands::Read(args) => runtime.block_on(commands::read::run(args, global, stdout)),
		Commands::Refresh(args) => runtime.block_on(commands::refresh::run(args, global, stdout)),
		Commands::Delete(args) => runtime.block_on(commands::delete::run(args, global, stdout)),
		Commands::Import(args) => runtime.block_on(commands::import::run(args, global, stdout)),
		Commands::Wait(args) => runtime.block_on(commands::wait::run(args, global, stdout)),
	}
}

fn main() -> ExitCode {
	let cli = Cli::parse();

	match run(cli) {
		Ok(()) => ExitCode::SUCCESS,
		Err(err) => {
			tracing::debug!(error = ?err, "command failed");
			eprintln!("{}", commands::report(&err));
			ExitCode::FAILURE
		}
	}
}
