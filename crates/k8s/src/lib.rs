//! Shared Kubernetes utilities for crdform.
//!
//! Everything in here is plain data: resource types, object identities and the
//! attribute tables describing the payload of each custom resource. Nothing in
//! this crate talks to a cluster.

pub mod identity;
pub mod resource_type;
pub mod schema;

pub use identity::{ImportIdError, ResourceIdentity};
pub use resource_type::{ResourceScope, ResourceType};
