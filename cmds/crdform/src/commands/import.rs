//! `crdform import`: adopt an existing object as a managed resource.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;

use super::util::{build_provider, cancel_on_ctrl_c, write_json, GlobalArgs};

#[derive(Args, Debug)]
pub struct ImportArgs {
	/// Resource type name
	pub type_name: String,

	/// `namespace/name`, or `name` for cluster-scoped types
	pub id: String,
}

pub async fn run<W: Write>(args: ImportArgs, global: &GlobalArgs, writer: W) -> Result<()> {
	let config = global.load_config()?;
	let provider = build_provider(&config, cancel_on_ctrl_c()).await?;

	let state = provider
		.resource(&args.type_name)?
		.import(&args.id)
		.await
		.with_context(|| format!("importing {} {}", args.type_name, args.id))?;
	write_json(writer, &state)
}
