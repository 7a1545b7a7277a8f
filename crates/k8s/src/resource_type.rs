//! Resource types addressed by `{group, version, kind, plural}`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kubernetes API resource scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceScope {
	/// Resource is namespaced (e.g., Certificate, ServiceMonitor).
	Namespaced,

	/// Resource is cluster-wide (e.g., ClusterIssuer).
	ClusterWide,
}

/// One kind of Kubernetes object as served by the API server.
///
/// Every resource, data source and manifest type exposed by crdform is backed by
/// exactly one `ResourceType`; the `apiVersion`/`kind` pair written into objects
/// is always taken from here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceType {
	/// API group, empty for the core group.
	#[serde(default)]
	pub group: String,
	pub version: String,
	pub kind: String,
	/// Lowercase plural resource name used in REST paths.
	pub plural: String,
	pub scope: ResourceScope,
}

/// Suffix appended to the type name of manifest-only data sources.
pub const MANIFEST_SUFFIX: &str = "_manifest";

impl ResourceType {
	pub fn new(
		group: impl Into<String>,
		version: impl Into<String>,
		kind: impl Into<String>,
		plural: impl Into<String>,
		scope: ResourceScope,
	) -> Self {
		Self {
			group: group.into(),
			version: version.into(),
			kind: kind.into(),
			plural: plural.into(),
			scope,
		}
	}

	/// Value of the `apiVersion` field for objects of this type.
	pub fn api_version(&self) -> String {
		if self.group.is_empty() {
			self.version.clone()
		} else {
			format!("{}/{}", self.group, self.version)
		}
	}

	pub fn is_namespaced(&self) -> bool {
		self.scope == ResourceScope::Namespaced
	}

	/// Name of the resource and data source exposing this type,
	/// e.g. `k8s_cert_manager_io_certificate_v1`.
	pub fn type_name(&self) -> String {
		let group = if self.group.is_empty() {
			"core".to_string()
		} else {
			self.group.replace(['.', '-'], "_")
		};
		format!(
			"k8s_{}_{}_{}",
			group,
			self.kind.to_lowercase(),
			self.version.to_lowercase()
		)
	}

	/// Name of the manifest-only data source for this type.
	pub fn manifest_type_name(&self) -> String {
		format!("{}{MANIFEST_SUFFIX}", self.type_name())
	}

	/// REST path of the collection, optionally scoped to a namespace.
	///
	/// - `/apis/cert-manager.io/v1/namespaces/default/certificates`
	/// - `/api/v1/namespaces`
	pub fn collection_path(&self, namespace: Option<&str>) -> String {
		let prefix = if self.group.is_empty() {
			format!("/api/{}", self.version)
		} else {
			format!("/apis/{}/{}", self.group, self.version)
		};
		match namespace {
			Some(ns) if self.is_namespaced() => {
				format!("{prefix}/namespaces/{ns}/{}", self.plural)
			}
			_ => format!("{prefix}/{}", self.plural),
		}
	}

	/// REST path of a single object.
	pub fn object_path(&self, namespace: Option<&str>, name: &str) -> String {
		format!("{}/{name}", self.collection_path(namespace))
	}
}

impl fmt::Display for ResourceType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}/{}", self.api_version(), self.kind)
	}
}
