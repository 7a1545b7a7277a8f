//! `crdform read`: data source read of one live object.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;

use super::util::{build_provider, cancel_on_ctrl_c, write_json, GlobalArgs};

#[derive(Args, Debug)]
pub struct ReadArgs {
	/// Data source type name
	pub type_name: String,

	/// `namespace/name`, or `name` for cluster-scoped types
	pub id: String,
}

pub async fn run<W: Write>(args: ReadArgs, global: &GlobalArgs, writer: W) -> Result<()> {
	let config = global.load_config()?;
	let provider = build_provider(&config, cancel_on_ctrl_c()).await?;

	let resource = provider.resource(&args.type_name)?;
	let identity = resource.parse_id(&args.id)?;
	let model = resource
		.read_data_source(&identity)
		.await
		.with_context(|| format!("reading {} {}", args.type_name, args.id))?;
	write_json(writer, &model)
}
