//! `crdform refresh`: re-read a managed resource into its state.

use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::warn;

use super::util::{build_provider, cancel_on_ctrl_c, read_document, write_json, GlobalArgs};
use crate::model::ResourceState;

#[derive(Args, Debug)]
pub struct RefreshArgs {
	/// Resource type name
	pub type_name: String,

	/// State file (YAML or JSON), `-` for stdin
	#[arg(short = 'f', long = "filename")]
	pub file: PathBuf,
}

/// Prints the refreshed state, or `null` when the object is gone so the
/// caller can drop it.
pub async fn run<W: Write>(args: RefreshArgs, global: &GlobalArgs, writer: W) -> Result<()> {
	let state: ResourceState = read_document(&args.file)?;
	let config = global.load_config()?;
	let provider = build_provider(&config, cancel_on_ctrl_c()).await?;

	let refreshed = provider
		.resource(&args.type_name)?
		.read(&state)
		.await
		.with_context(|| format!("refreshing {}", args.type_name))?;

	if refreshed.is_none() {
		warn!(
			type_name = %args.type_name,
			id = ?state.id,
			"resource no longer exists"
		);
		eprintln!("Resource no longer exists; remove it from state.");
	}
	write_json(writer, &refreshed)
}
