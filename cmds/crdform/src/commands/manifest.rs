//! `crdform manifest`: render a model as YAML without contacting a cluster.

use std::{io::Write, path::PathBuf};

use anyhow::Result;
use clap::Args;

use super::util::{load_catalog, read_document, GlobalArgs};
use crate::{k8s::client::KubeDynamicClient, model::ResourceModel, provider::Provider};

#[derive(Args, Debug)]
pub struct ManifestArgs {
	/// Type name, with or without the manifest suffix
	pub type_name: String,

	/// Model file (YAML or JSON), `-` for stdin
	#[arg(short = 'f', long = "filename")]
	pub file: PathBuf,
}

pub fn run<W: Write>(args: ManifestArgs, global: &GlobalArgs, mut writer: W) -> Result<()> {
	let model: ResourceModel = read_document(&args.file)?;
	let config = global.load_config()?;
	let provider: Provider<KubeDynamicClient> =
		Provider::offline(load_catalog(&config)?, config.apply_defaults());

	let rendered = provider.render_manifest(&args.type_name, &model)?;
	writer.write_all(rendered.as_bytes())?;
	writer.flush()?;
	Ok(())
}
