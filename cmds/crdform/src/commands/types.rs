//! `crdform types`: the type names the catalog exposes.

use std::io::Write;

use anyhow::Result;
use clap::Args;

use super::util::{load_catalog, GlobalArgs};
use crate::catalog::{Catalog, TypeKind};

#[derive(Args, Debug)]
pub struct TypesArgs {
	/// Only list names of this kind
	#[arg(long, value_parser = ["resource", "data-source", "manifest"])]
	pub kind: Option<String>,
}

/// One line per exposed name: the name, then what it is.
///
/// A resource type is listed twice, once as a resource and once as the data
/// source of the same name.
pub fn list<W: Write>(catalog: &Catalog, kind: Option<&str>, mut writer: W) -> Result<()> {
	for (name, type_kind) in catalog.type_names() {
		let labels: &[&str] = match type_kind {
			TypeKind::Resource => &["resource", "data-source"],
			TypeKind::Manifest => &["manifest"],
		};
		for label in labels {
			if kind.is_none_or(|k| k == *label) {
				writeln!(writer, "{name}\t{label}")?;
			}
		}
	}
	writer.flush()?;
	Ok(())
}

pub fn run<W: Write>(args: TypesArgs, global: &GlobalArgs, writer: W) -> Result<()> {
	let config = global.load_config()?;
	let catalog = load_catalog(&config)?;
	list(&catalog, args.kind.as_deref(), writer)
}
