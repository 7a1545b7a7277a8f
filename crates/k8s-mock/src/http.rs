//! HTTP-based mock Kubernetes server using wiremock.
//!
//! This provides a real HTTP server that can be used with actual kubeconfig-based
//! connections. It understands the three verbs the dynamic client uses on custom
//! resources: GET, server-side apply PATCH and DELETE.

use std::{
	collections::HashMap,
	sync::{
		atomic::{AtomicU64, Ordering},
		Arc, RwLock,
	},
};

use bon::Builder;
use k8s::{ResourceIdentity, ResourceType};
use kube::config::{
	AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext,
};
use serde_json::{json, Value};
use tracing::{debug, trace};
use wiremock::{
	matchers::{method, path, path_regex},
	Mock, MockServer, Request, ResponseTemplate,
};

use super::{
	helpers::{
		failure_status, merge_json, populate_server_fields, spec_conflicts, CREATION_TIMESTAMP,
	},
	types::default_types,
};

/// Field manager recorded for objects that exist before the first apply.
pub const SEEDED_FIELD_MANAGER: &str = "before-first-apply";

/// An object held by the mock server.
#[derive(Clone)]
struct StoredObject {
	object: Value,
	/// Field manager of the last apply.
	manager: String,
	/// Remaining reads before a deleted object disappears.
	reads_until_gone: Option<usize>,
}

/// Objects keyed by `(collection path, name)`.
type SharedObjects = Arc<RwLock<HashMap<(String, String), StoredObject>>>;

/// Forces every request on the named object to fail with the given HTTP status.
#[derive(Clone, Debug)]
pub struct MockFailure {
	pub name: String,
	pub code: u16,
}

/// A mock Kubernetes server exposed over HTTP.
#[derive(Builder)]
pub struct HttpMockK8sServer {
	/// Resource types the server knows how to place seeded objects for.
	#[builder(default = default_types())]
	types: Vec<ResourceType>,
	/// Objects present before the test starts, as raw manifests.
	#[builder(default)]
	resources: Vec<Value>,
	/// How many reads a deleted object stays visible (with a `deletionTimestamp`)
	/// before it is gone, emulating finalizers.
	#[builder(default)]
	deletion_grace_reads: usize,
	#[builder(default)]
	failures: Vec<MockFailure>,
}

/// A running HTTP mock server instance.
pub struct RunningHttpMockK8sServer {
	server: MockServer,
	objects: SharedObjects,
}

/// A request received by the mock server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
	pub method: String,
	pub path: String,
	pub query: HashMap<String, String>,
	pub content_type: Option<String>,
	pub body: Value,
}

impl HttpMockK8sServer {
	/// Start the mock server with all configured resources.
	pub async fn start(self) -> RunningHttpMockK8sServer {
		let server = MockServer::start().await;

		debug!(uri = %server.uri(), "Started mock K8s server");

		let mut objects = HashMap::new();
		for manifest in self.resources {
			if let Some((collection, name)) = path_for_manifest(&manifest, &self.types) {
				trace!(collection = %collection, name = %name, "Registered resource");
				let mut object = manifest;
				populate_server_fields(&mut object, 1, false);
				objects.insert(
					(collection, name),
					StoredObject {
						object,
						manager: SEEDED_FIELD_MANAGER.to_string(),
						reads_until_gone: None,
					},
				);
			}
		}

		let objects = Arc::new(RwLock::new(objects));
		let failures: HashMap<String, u16> = self
			.failures
			.into_iter()
			.map(|f| (f.name, f.code))
			.collect();

		mount_version(&server).await;
		mount_resources(
			&server,
			&objects,
			Arc::new(failures),
			self.deletion_grace_reads,
		)
		.await;

		RunningHttpMockK8sServer { server, objects }
	}
}

/// Derive the collection path for a seeded manifest from its apiVersion/kind.
fn path_for_manifest(manifest: &Value, types: &[ResourceType]) -> Option<(String, String)> {
	let api_version = manifest.get("apiVersion")?.as_str()?;
	let kind = manifest.get("kind")?.as_str()?;
	let name = manifest.pointer("/metadata/name")?.as_str()?.to_string();
	let namespace = manifest
		.pointer("/metadata/namespace")
		.and_then(Value::as_str)
		.unwrap_or("default");

	let rt = types
		.iter()
		.find(|t| t.api_version() == api_version && t.kind == kind)?;
	Some((rt.collection_path(Some(namespace)), name))
}

impl RunningHttpMockK8sServer {
	/// Get the server's URI (e.g., "http://127.0.0.1:12345").
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// Create a Kubeconfig pointing to this mock server.
	pub fn kubeconfig(&self) -> Kubeconfig {
		self.kubeconfig_with_context("mock-context")
	}

	/// Create a Kubeconfig pointing to this mock server with a custom context name.
	pub fn kubeconfig_with_context(&self, context_name: &str) -> Kubeconfig {
		let cluster_name = "mock-cluster";
		let user_name = "mock-user";

		Kubeconfig {
			clusters: vec![NamedCluster {
				name: cluster_name.to_string(),
				cluster: Some(Cluster {
					server: Some(self.uri()),
					insecure_skip_tls_verify: Some(true),
					..Default::default()
				}),
			}],
			contexts: vec![NamedContext {
				name: context_name.to_string(),
				context: Some(Context {
					cluster: cluster_name.to_string(),
					user: Some(user_name.to_string()),
					namespace: Some("default".to_string()),
					..Default::default()
				}),
			}],
			auth_infos: vec![NamedAuthInfo {
				name: user_name.to_string(),
				auth_info: Some(AuthInfo::default()),
			}],
			current_context: Some(context_name.to_string()),
			..Default::default()
		}
	}

	/// Current server-side state of an object, if it exists.
	pub fn object(&self, rt: &ResourceType, id: &ResourceIdentity) -> Option<Value> {
		let key = (rt.collection_path(id.namespace()), id.name.clone());
		self.objects
			.read()
			.unwrap()
			.get(&key)
			.map(|stored| stored.object.clone())
	}

	/// Field manager of the last apply on an object.
	pub fn field_manager(&self, rt: &ResourceType, id: &ResourceIdentity) -> Option<String> {
		let key = (rt.collection_path(id.namespace()), id.name.clone());
		self.objects
			.read()
			.unwrap()
			.get(&key)
			.map(|stored| stored.manager.clone())
	}

	/// Set a field of a stored object, addressed by a JSON pointer such as
	/// `/status/phase`. Intermediate objects are created as needed.
	///
	/// Returns false if the object does not exist.
	pub fn set_field(
		&self,
		rt: &ResourceType,
		id: &ResourceIdentity,
		pointer: &str,
		value: Value,
	) -> bool {
		let key = (rt.collection_path(id.namespace()), id.name.clone());
		let mut objects = self.objects.write().unwrap();
		let Some(stored) = objects.get_mut(&key) else {
			return false;
		};

		let mut patch = value;
		for segment in pointer.trim_start_matches('/').split('/').rev() {
			let mut wrapper = serde_json::Map::new();
			wrapper.insert(segment.to_string(), patch);
			patch = Value::Object(wrapper);
		}
		stored.object = merge_json(stored.object.clone(), patch);
		true
	}

	/// All requests received so far, in order.
	pub async fn requests(&self) -> Vec<RecordedRequest> {
		self.server
			.received_requests()
			.await
			.unwrap_or_default()
			.into_iter()
			.map(|req| RecordedRequest {
				method: req.method.to_string(),
				path: req.url.path().to_string(),
				query: req
					.url
					.query_pairs()
					.map(|(k, v)| (k.into_owned(), v.into_owned()))
					.collect(),
				content_type: req
					.headers
					.get("content-type")
					.and_then(|v| v.to_str().ok())
					.map(str::to_string),
				body: serde_json::from_slice(&req.body).unwrap_or(Value::Null),
			})
			.collect()
	}

	/// Requests received with the given HTTP method.
	pub async fn requests_with_method(&self, method: &str) -> Vec<RecordedRequest> {
		self.requests()
			.await
			.into_iter()
			.filter(|r| r.method.eq_ignore_ascii_case(method))
			.collect()
	}
}

async fn mount_version(server: &MockServer) {
	Mock::given(method("GET"))
		.and(path("/version"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"major": "1",
			"minor": "31",
			"gitVersion": "v1.31.0",
			"gitCommit": "fake",
			"gitTreeState": "clean",
			"buildDate": "2024-01-01T00:00:00Z",
			"goVersion": "go1.22.0",
			"compiler": "gc",
			"platform": "linux/amd64"
		})))
		.mount(server)
		.await;
}

async fn mount_resources(
	server: &MockServer,
	objects: &SharedObjects,
	failures: Arc<HashMap<String, u16>>,
	deletion_grace_reads: usize,
) {
	let revision = Arc::new(AtomicU64::new(1));

	let patch_objects = Arc::clone(objects);
	let patch_failures = Arc::clone(&failures);
	let patch_revision = Arc::clone(&revision);

	// PATCH - server-side apply. A changed spec field last applied by another
	// manager is a conflict unless force is set.
	Mock::given(method("PATCH"))
		.and(path_regex(r"^/api(s)?/.*"))
		.respond_with(move |req: &Request| {
			let (collection, name) = parse_resource_path(req.url.path());
			if let Some(response) = injected_failure(&patch_failures, &name) {
				return response;
			}

			let query: HashMap<String, String> = req.url.query_pairs().into_owned().collect();
			let manager = query.get("fieldManager").cloned().unwrap_or_default();
			let force = query.get("force").is_some_and(|v| v == "true");

			let Ok(patch) = serde_json::from_slice::<Value>(&req.body) else {
				return ResponseTemplate::new(400).set_body_json(failure_status(
					400,
					"BadRequest",
					"error decoding patch body",
				));
			};

			let mut objects = patch_objects.write().unwrap();
			let key = (collection, name);
			let existing = objects.get(&key).cloned();

			if let Some(existing) = &existing {
				if existing.manager != manager && !force && spec_conflicts(&existing.object, &patch)
				{
					let message = format!(
						"Apply failed with 1 conflict: conflict with \"{}\": .spec",
						existing.manager
					);
					return ResponseTemplate::new(409).set_body_json(failure_status(
						409, "Conflict", &message,
					));
				}
			}

			let created = existing.is_none();
			let spec_changed = existing
				.as_ref()
				.is_some_and(|e| spec_conflicts(&e.object, &patch));
			let base = existing.map_or(Value::Null, |e| e.object);
			let mut merged = merge_json(base, patch);
			let rev = patch_revision.fetch_add(1, Ordering::SeqCst) + 1;
			populate_server_fields(&mut merged, rev, spec_changed);

			objects.insert(
				key,
				StoredObject {
					object: merged.clone(),
					manager,
					reads_until_gone: None,
				},
			);

			ResponseTemplate::new(if created { 201 } else { 200 }).set_body_json(merged)
		})
		.mount(server)
		.await;

	let get_objects = Arc::clone(objects);
	let get_failures = Arc::clone(&failures);

	Mock::given(method("GET"))
		.and(path_regex(r"^/api(s)?/.*"))
		.respond_with(move |req: &Request| {
			let (collection, name) = parse_resource_path(req.url.path());
			if let Some(response) = injected_failure(&get_failures, &name) {
				return response;
			}

			let mut objects = get_objects.write().unwrap();
			let key = (collection, name);

			let gone = objects
				.get(&key)
				.is_some_and(|stored| stored.reads_until_gone == Some(0));
			if gone {
				objects.remove(&key);
				return not_found(&key.1);
			}

			match objects.get_mut(&key) {
				Some(stored) => {
					if let Some(left) = stored.reads_until_gone.as_mut() {
						*left -= 1;
					}
					ResponseTemplate::new(200).set_body_json(stored.object.clone())
				}
				None => not_found(&key.1),
			}
		})
		.mount(server)
		.await;

	let delete_objects = Arc::clone(objects);
	let delete_failures = failures;

	// DELETE - objects disappear immediately unless a grace period in reads
	// is configured, in which case they linger with a deletionTimestamp.
	Mock::given(method("DELETE"))
		.and(path_regex(r"^/api(s)?/.*"))
		.respond_with(move |req: &Request| {
			let (collection, name) = parse_resource_path(req.url.path());
			if let Some(response) = injected_failure(&delete_failures, &name) {
				return response;
			}

			let mut objects = delete_objects.write().unwrap();
			let key = (collection, name);

			if deletion_grace_reads == 0 {
				return match objects.remove(&key) {
					Some(_) => ResponseTemplate::new(200).set_body_json(json!({
						"kind": "Status",
						"apiVersion": "v1",
						"metadata": {},
						"status": "Success",
						"details": {"name": key.1}
					})),
					None => not_found(&key.1),
				};
			}

			match objects.get_mut(&key) {
				Some(stored) => {
					if stored.reads_until_gone.is_none() {
						stored.reads_until_gone = Some(deletion_grace_reads);
						if let Some(metadata) = stored
							.object
							.get_mut("metadata")
							.and_then(Value::as_object_mut)
						{
							metadata.insert("deletionTimestamp".into(), json!(CREATION_TIMESTAMP));
						}
					}
					ResponseTemplate::new(200).set_body_json(stored.object.clone())
				}
				None => not_found(&key.1),
			}
		})
		.mount(server)
		.await;
}

fn injected_failure(failures: &HashMap<String, u16>, name: &str) -> Option<ResponseTemplate> {
	let code = *failures.get(name)?;
	Some(
		ResponseTemplate::new(code).set_body_json(failure_status(
			code,
			"InternalError",
			&format!("injected failure for {name}"),
		)),
	)
}

fn not_found(name: &str) -> ResponseTemplate {
	ResponseTemplate::new(404).set_body_json(failure_status(
		404,
		"NotFound",
		&format!("\"{name}\" not found"),
	))
}

/// Parse a Kubernetes API path into (collection_path, resource_name).
///
/// Examples:
/// - `/apis/example.com/v1/namespaces/default/widgets/w1` -> (`/apis/example.com/v1/namespaces/default/widgets`, `w1`)
/// - `/apis/example.com/v1/clusterwidgets/c1` -> (`/apis/example.com/v1/clusterwidgets`, `c1`)
fn parse_resource_path(path: &str) -> (String, String) {
	let path = path.trim_end_matches('/');
	if let Some(last_slash) = path.rfind('/') {
		let collection = &path[..last_slash];
		let name = &path[last_slash + 1..];
		(collection.to_string(), name.to_string())
	} else {
		(path.to_string(), String::new())
	}
}
