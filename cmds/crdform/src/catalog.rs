//! The set of custom resource types crdform exposes.
//!
//! Types are described as data in YAML catalog files. The built-in catalog is
//! compiled in; more files can be added through the configuration.

use std::{collections::BTreeMap, fmt, path::Path};

use k8s::{resource_type::MANIFEST_SUFFIX, schema::TypeSchema};
use serde::Deserialize;
use tracing::debug;

use crate::error::ConfigurationError;

const BUILTIN_CATALOG: &str = include_str!("../catalog/builtin.yaml");

#[derive(Debug, Deserialize)]
struct CatalogFile {
	#[serde(default)]
	types: Vec<TypeSchema>,
}

/// How a type name is exposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TypeKind {
	/// Managed resource and data source of the same name.
	Resource,
	/// Offline manifest rendering, `<type name>_manifest`.
	Manifest,
}

impl fmt::Display for TypeKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			TypeKind::Resource => f.write_str("resource"),
			TypeKind::Manifest => f.write_str("manifest"),
		}
	}
}

#[derive(Debug, Clone, Default)]
pub struct Catalog {
	types: BTreeMap<String, TypeSchema>,
}

impl Catalog {
	pub fn builtin() -> Result<Self, ConfigurationError> {
		Self::from_yaml(BUILTIN_CATALOG, "builtin")
	}

	/// Parse one catalog file. `origin` names it in error messages.
	pub fn from_yaml(source: &str, origin: &str) -> Result<Self, ConfigurationError> {
		let file: CatalogFile = serde_yaml_with_quirks::from_str(source).map_err(|source| {
			ConfigurationError::CatalogParse {
				origin: origin.to_string(),
				source,
			}
		})?;

		let mut catalog = Catalog::default();
		for schema in file.types {
			catalog.insert(schema)?;
		}
		debug!(origin, types = catalog.types.len(), "loaded catalog");
		Ok(catalog)
	}

	pub fn from_file(path: &Path) -> Result<Self, ConfigurationError> {
		let source =
			std::fs::read_to_string(path).map_err(|source| ConfigurationError::CatalogRead {
				path: path.to_path_buf(),
				source,
			})?;
		Self::from_yaml(&source, &path.display().to_string())
	}

	pub fn insert(&mut self, schema: TypeSchema) -> Result<(), ConfigurationError> {
		schema.check()?;
		let name = schema.resource_type().type_name();
		if self.types.contains_key(&name) {
			return Err(ConfigurationError::DuplicateType(name));
		}
		self.types.insert(name, schema);
		Ok(())
	}

	/// Add every type of `other`; a type defined in both is an error.
	pub fn merge(&mut self, other: Catalog) -> Result<(), ConfigurationError> {
		for schema in other.types.into_values() {
			self.insert(schema)?;
		}
		Ok(())
	}

	/// Look up a resource or manifest type name.
	pub fn lookup(&self, type_name: &str) -> Result<(&TypeSchema, TypeKind), ConfigurationError> {
		if let Some(schema) = self.types.get(type_name) {
			return Ok((schema, TypeKind::Resource));
		}
		type_name
			.strip_suffix(MANIFEST_SUFFIX)
			.and_then(|base| self.types.get(base))
			.map(|schema| (schema, TypeKind::Manifest))
			.ok_or_else(|| ConfigurationError::UnknownType(type_name.to_string()))
	}

	/// Every exposed type name, sorted, with how it is exposed.
	pub fn type_names(&self) -> Vec<(String, TypeKind)> {
		let mut names: Vec<_> = self
			.types
			.values()
			.flat_map(|schema| {
				let rt = schema.resource_type();
				[
					(rt.type_name(), TypeKind::Resource),
					(rt.manifest_type_name(), TypeKind::Manifest),
				]
			})
			.collect();
		names.sort();
		names
	}

	pub fn len(&self) -> usize {
		self.types.len()
	}

	pub fn is_empty(&self) -> bool {
		self.types.is_empty()
	}
}
