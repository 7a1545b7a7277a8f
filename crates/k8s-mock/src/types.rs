//! Resource types known to the mock server out of the box.

use k8s::{ResourceScope, ResourceType};

/// A namespaced custom resource: `example.com/v1 Widget`.
pub fn widget_type() -> ResourceType {
	ResourceType::new(
		"example.com",
		"v1",
		"Widget",
		"widgets",
		ResourceScope::Namespaced,
	)
}

/// A cluster-scoped custom resource: `example.com/v1 ClusterWidget`.
pub fn cluster_widget_type() -> ResourceType {
	ResourceType::new(
		"example.com",
		"v1",
		"ClusterWidget",
		"clusterwidgets",
		ResourceScope::ClusterWide,
	)
}

/// Types used to place seeded manifests when a test does not provide its own.
pub fn default_types() -> Vec<ResourceType> {
	vec![
		widget_type(),
		cluster_widget_type(),
		ResourceType::new(
			"cert-manager.io",
			"v1",
			"Certificate",
			"certificates",
			ResourceScope::Namespaced,
		),
		ResourceType::new(
			"cert-manager.io",
			"v1",
			"ClusterIssuer",
			"clusterissuers",
			ResourceScope::ClusterWide,
		),
	]
}
