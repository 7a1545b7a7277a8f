//! `crdform schema`: print the attribute table of a type.

use std::io::Write;

use anyhow::{Context, Result};
use clap::Args;

use super::util::{load_catalog, GlobalArgs};
use crate::{catalog::Catalog, yaml};

#[derive(Args, Debug)]
pub struct SchemaArgs {
	/// Type name, with or without the manifest suffix
	pub type_name: String,
}

pub fn render(catalog: &Catalog, type_name: &str) -> Result<String> {
	let (schema, _) = catalog.lookup(type_name)?;
	let value = serde_json::to_value(schema).context("serializing schema")?;
	yaml::to_yaml(&value).context("rendering schema")
}

pub fn run<W: Write>(args: SchemaArgs, global: &GlobalArgs, mut writer: W) -> Result<()> {
	let config = global.load_config()?;
	let catalog = load_catalog(&config)?;
	writer.write_all(render(&catalog, &args.type_name)?.as_bytes())?;
	writer.flush()?;
	Ok(())
}
