//! Kubernetes access for crdform.
//!
//! Every operation addresses exactly one object through the dynamic API, so no
//! compiled-in types or discovery are needed.

pub mod apply;
pub mod client;
pub mod delete;
pub mod fetch;
pub mod jsonpath;
pub mod wait;
