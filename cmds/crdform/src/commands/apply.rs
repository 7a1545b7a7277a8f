//! `crdform apply`: create or update a resource from a state file.

use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;
use tracing::instrument;

use super::util::{build_provider, cancel_on_ctrl_c, read_document, write_json, GlobalArgs};
use crate::{
	k8s::client::DynamicClient,
	model::ResourceState,
	provider::Provider,
};

#[derive(Args, Debug)]
pub struct ApplyArgs {
	/// Resource type name
	pub type_name: String,

	/// State file (YAML or JSON), `-` for stdin
	#[arg(short = 'f', long = "filename")]
	pub file: PathBuf,
}

/// Create the object when the state has no id yet, update it otherwise.
#[instrument(skip_all, fields(type_name = %type_name))]
pub async fn apply<C: DynamicClient + ?Sized>(
	provider: &Provider<C>,
	type_name: &str,
	state: &ResourceState,
) -> Result<ResourceState> {
	let resource = provider.resource(type_name)?;
	let result = if state.id.is_some() {
		resource.update(state).await
	} else {
		resource.create(state).await
	};
	result.with_context(|| format!("applying {type_name}"))
}

pub async fn run<W: Write>(args: ApplyArgs, global: &GlobalArgs, writer: W) -> Result<()> {
	let state: ResourceState = read_document(&args.file)?;
	let config = global.load_config()?;
	let provider = build_provider(&config, cancel_on_ctrl_c()).await?;

	let applied = apply(&provider, &args.type_name, &state).await?;
	write_json(writer, &applied)
}
