//! Kubernetes cluster connection and the dynamic object client.

use std::{path::PathBuf, time::Duration};

use async_trait::async_trait;
use k8s::{ResourceIdentity, ResourceType};
use k8s_openapi::apimachinery::pkg::version::Info;
use kube::{
	api::{
		Api, ApiResource, DeleteParams, DynamicObject, GroupVersionKind, Patch, PatchParams,
		PropagationPolicy, ValidationDirective,
	},
	config::{InferConfigError, KubeConfigOptions, Kubeconfig, KubeconfigError},
	Client, Config,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument};

use super::{apply::ResolvedApplyOptions, delete::DeletionPropagation};

/// Default timeout for Kubernetes API requests.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when connecting to a Kubernetes cluster.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("no context named `{0}` was found. Please check your $KUBECONFIG")]
	ContextNotFound(String),

	#[error(transparent)]
	Kubeconfig(#[from] KubeconfigError),

	#[error(transparent)]
	InferConfig(#[from] InferConfigError),

	#[error(transparent)]
	Kube(#[from] kube::Error),
}

/// Failure of a single API call.
#[derive(Debug, Error)]
pub enum ClientError {
	#[error("the object does not exist")]
	NotFound,

	#[error("{message} (reason: {reason}, code: {code})")]
	Api {
		code: u16,
		reason: String,
		message: String,
	},

	#[error("request failed")]
	Transport(#[source] Box<kube::Error>),

	#[error("converting the object to JSON")]
	Encode(#[source] serde_json::Error),
}

impl ClientError {
	pub fn is_not_found(&self) -> bool {
		matches!(self, ClientError::NotFound)
	}

	fn from_kube(err: kube::Error) -> Self {
		match err {
			kube::Error::Api(ref status) if status.code == 404 => ClientError::NotFound,
			kube::Error::Api(status) => ClientError::Api {
				code: status.code,
				reason: status.reason.clone(),
				message: status.message.clone(),
			},
			other => ClientError::Transport(Box::new(other)),
		}
	}
}

/// Where to find cluster credentials.
///
/// With neither field set the client configuration is inferred: in-cluster
/// service account first, then the default kubeconfig.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
	pub kubeconfig: Option<PathBuf>,
	pub context: Option<String>,
}

/// Represents a connection to a Kubernetes cluster.
#[derive(Clone)]
pub struct ClusterConnection {
	client: Client,
	server_version: Info,
	/// Human-readable identifier for the cluster (context name or API server URL).
	cluster_identifier: String,
}

impl std::fmt::Debug for ClusterConnection {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("ClusterConnection")
			.field("cluster_identifier", &self.cluster_identifier)
			.field("server_version", &self.server_version)
			.finish_non_exhaustive()
	}
}

impl ClusterConnection {
	#[instrument(skip_all)]
	pub async fn connect(settings: &ConnectionSettings) -> Result<Self, ConnectionError> {
		let kubeconfig = match (&settings.kubeconfig, &settings.context) {
			(Some(path), _) => Some(Kubeconfig::read_from(path)?),
			(None, Some(_)) => Some(Kubeconfig::read()?),
			(None, None) => None,
		};

		match kubeconfig {
			Some(kubeconfig) => {
				Self::from_kubeconfig(kubeconfig, settings.context.as_deref()).await
			}
			None => {
				let config = Config::infer().await?;
				let identifier = config.cluster_url.to_string();
				Self::from_config(config, identifier).await
			}
		}
	}

	/// Connect using a provided kubeconfig, optionally selecting a context.
	///
	/// Without a context the kubeconfig's current context is used.
	#[instrument(skip_all)]
	pub async fn from_kubeconfig(
		kubeconfig: Kubeconfig,
		context: Option<&str>,
	) -> Result<Self, ConnectionError> {
		if let Some(context) = context {
			if !kubeconfig.contexts.iter().any(|c| c.name == context) {
				return Err(ConnectionError::ContextNotFound(context.to_string()));
			}
		}

		let context_name = context
			.map(str::to_string)
			.or_else(|| kubeconfig.current_context.clone());
		debug!(context = ?context_name, "using kubeconfig context");

		let config = Config::from_custom_kubeconfig(
			kubeconfig,
			&KubeConfigOptions {
				context: context_name.clone(),
				..Default::default()
			},
		)
		.await?;

		let identifier = match context_name {
			Some(name) => format!("context:{name}"),
			None => config.cluster_url.to_string(),
		};
		Self::from_config(config, identifier).await
	}

	async fn from_config(
		mut config: Config,
		cluster_identifier: String,
	) -> Result<Self, ConnectionError> {
		config.read_timeout = Some(DEFAULT_API_TIMEOUT);
		let client = Client::try_from(config)?;

		let server_version = client.apiserver_version().await?;
		debug!(
			cluster = %cluster_identifier,
			version = %server_version.git_version,
			"connected to cluster"
		);

		Ok(Self {
			client,
			server_version,
			cluster_identifier,
		})
	}

	/// Get the server version.
	pub fn server_version(&self) -> &Info {
		&self.server_version
	}

	/// Get the cluster identifier (context name or API server URL).
	pub fn cluster_identifier(&self) -> &str {
		&self.cluster_identifier
	}

	pub fn dynamic_client(&self) -> KubeDynamicClient {
		KubeDynamicClient::new(self.client.clone())
	}
}

/// Read one object.
#[async_trait]
pub trait Gettable: Send + Sync {
	async fn get(
		&self,
		resource_type: &ResourceType,
		identity: &ResourceIdentity,
	) -> Result<Value, ClientError>;
}

/// Create or update one object with server-side apply.
#[async_trait]
pub trait Applyable: Send + Sync {
	async fn apply(
		&self,
		resource_type: &ResourceType,
		identity: &ResourceIdentity,
		body: &Value,
		options: &ResolvedApplyOptions,
	) -> Result<Value, ClientError>;
}

/// Delete one object.
#[async_trait]
pub trait Deletable: Send + Sync {
	async fn delete(
		&self,
		resource_type: &ResourceType,
		identity: &ResourceIdentity,
		propagation: Option<DeletionPropagation>,
	) -> Result<(), ClientError>;
}

/// Everything the resource lifecycle needs from a cluster.
pub trait DynamicClient: Gettable + Applyable + Deletable {}

impl<T: Gettable + Applyable + Deletable + ?Sized> DynamicClient for T {}

/// [`DynamicClient`] backed by a kube [`Client`], addressing objects by
/// group/version/kind and plural without compiled-in types.
#[derive(Clone)]
pub struct KubeDynamicClient {
	client: Client,
}

impl KubeDynamicClient {
	pub fn new(client: Client) -> Self {
		Self { client }
	}

	fn api(&self, resource_type: &ResourceType, namespace: Option<&str>) -> Api<DynamicObject> {
		let gvk = GroupVersionKind::gvk(
			&resource_type.group,
			&resource_type.version,
			&resource_type.kind,
		);
		let ar = ApiResource::from_gvk_with_plural(&gvk, &resource_type.plural);
		match namespace {
			Some(ns) if resource_type.is_namespaced() => {
				Api::namespaced_with(self.client.clone(), ns, &ar)
			}
			_ => Api::all_with(self.client.clone(), &ar),
		}
	}
}

#[async_trait]
impl Gettable for KubeDynamicClient {
	async fn get(
		&self,
		resource_type: &ResourceType,
		identity: &ResourceIdentity,
	) -> Result<Value, ClientError> {
		let object = self
			.api(resource_type, identity.namespace())
			.get(&identity.name)
			.await
			.map_err(ClientError::from_kube)?;
		serde_json::to_value(object).map_err(ClientError::Encode)
	}
}

#[async_trait]
impl Applyable for KubeDynamicClient {
	async fn apply(
		&self,
		resource_type: &ResourceType,
		identity: &ResourceIdentity,
		body: &Value,
		options: &ResolvedApplyOptions,
	) -> Result<Value, ClientError> {
		let params = PatchParams {
			field_manager: Some(options.field_manager.clone()),
			force: options.force_conflicts,
			field_validation: Some(ValidationDirective::Strict),
			..Default::default()
		};
		let object = self
			.api(resource_type, identity.namespace())
			.patch(&identity.name, &params, &Patch::Apply(body))
			.await
			.map_err(ClientError::from_kube)?;
		serde_json::to_value(object).map_err(ClientError::Encode)
	}
}

#[async_trait]
impl Deletable for KubeDynamicClient {
	async fn delete(
		&self,
		resource_type: &ResourceType,
		identity: &ResourceIdentity,
		propagation: Option<DeletionPropagation>,
	) -> Result<(), ClientError> {
		let params = DeleteParams {
			propagation_policy: propagation.map(PropagationPolicy::from),
			..Default::default()
		};
		self.api(resource_type, identity.namespace())
			.delete(&identity.name, &params)
			.await
			.map_err(ClientError::from_kube)?;
		Ok(())
	}
}
