//! Mock Kubernetes API server for testing.
//!
//! Provides an HTTP server that can be used with kubeconfig-based connections
//! and serves arbitrary custom resources by path.

mod helpers;
pub mod http;
pub mod types;

pub use http::{
	HttpMockK8sServer, MockFailure, RecordedRequest, RunningHttpMockK8sServer,
	SEEDED_FIELD_MANAGER,
};
pub use types::{cluster_widget_type, default_types, widget_type};
