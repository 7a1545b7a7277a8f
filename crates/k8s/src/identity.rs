//! Object identities and import id parsing.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ResourceScope;

/// Errors produced while parsing an import id.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImportIdError {
	#[error(
		"expected import identifier with format `<namespace>/<name>` for a namespaced \
		 resource, got `{0}`"
	)]
	ExpectedNamespacedId(String),

	#[error("expected import identifier with format `<name>` for a cluster-scoped resource, got `{0}`")]
	ExpectedClusterId(String),
}

/// Name and optional namespace of one object.
///
/// Together with a [`ResourceType`](crate::ResourceType) this addresses exactly one
/// object in the cluster. The namespace is absent for cluster-scoped kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentity {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub namespace: Option<String>,
	pub name: String,
}

impl ResourceIdentity {
	pub fn namespaced(namespace: impl Into<String>, name: impl Into<String>) -> Self {
		Self {
			namespace: Some(namespace.into()),
			name: name.into(),
		}
	}

	pub fn cluster(name: impl Into<String>) -> Self {
		Self {
			namespace: None,
			name: name.into(),
		}
	}

	/// Parse an import id: `namespace/name` for namespaced kinds, `name` otherwise.
	///
	/// Empty segments and extra slashes are rejected.
	pub fn parse_import_id(id: &str, scope: ResourceScope) -> Result<Self, ImportIdError> {
		let parts: Vec<&str> = id.split('/').collect();
		match (scope, parts.as_slice()) {
			(ResourceScope::Namespaced, [namespace, name])
				if !namespace.is_empty() && !name.is_empty() =>
			{
				Ok(Self::namespaced(*namespace, *name))
			}
			(ResourceScope::Namespaced, _) => Err(ImportIdError::ExpectedNamespacedId(id.into())),
			(ResourceScope::ClusterWide, [name]) if !name.is_empty() => Ok(Self::cluster(*name)),
			(ResourceScope::ClusterWide, _) => Err(ImportIdError::ExpectedClusterId(id.into())),
		}
	}

	pub fn namespace(&self) -> Option<&str> {
		self.namespace.as_deref()
	}
}

/// Formats as the Terraform `id` attribute: `namespace/name` or `name`.
impl fmt::Display for ResourceIdentity {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.namespace {
			Some(ns) => write!(f, "{ns}/{}", self.name),
			None => f.write_str(&self.name),
		}
	}
}
