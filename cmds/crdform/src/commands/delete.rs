//! `crdform delete`: delete a managed resource.

use std::{io::Write, path::PathBuf};

use anyhow::{Context, Result};
use clap::Args;

use super::util::{build_provider, cancel_on_ctrl_c, read_document, GlobalArgs};
use crate::model::ResourceState;

#[derive(Args, Debug)]
pub struct DeleteArgs {
	/// Resource type name
	pub type_name: String,

	/// State file (YAML or JSON), `-` for stdin
	#[arg(short = 'f', long = "filename")]
	pub file: PathBuf,
}

pub async fn run<W: Write>(args: DeleteArgs, global: &GlobalArgs, mut writer: W) -> Result<()> {
	let state: ResourceState = read_document(&args.file)?;
	let config = global.load_config()?;
	let provider = build_provider(&config, cancel_on_ctrl_c()).await?;

	let resource = provider.resource(&args.type_name)?;
	resource
		.delete(&state)
		.await
		.with_context(|| format!("deleting {}", args.type_name))?;

	let id = match &state.id {
		Some(id) => id.clone(),
		None => state.model.identity(resource.resource_type())?.to_string(),
	};
	writeln!(writer, "{} {id} deleted", args.type_name)?;
	writer.flush()?;
	Ok(())
}
