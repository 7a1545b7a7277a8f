//! In-memory client for unit tests.

use std::sync::{
	atomic::{AtomicUsize, Ordering},
	Mutex,
};

use async_trait::async_trait;
use k8s::{ResourceIdentity, ResourceScope, ResourceType};
use serde_json::{json, Value};

use crate::{
	k8s::{
		apply::ResolvedApplyOptions,
		client::{Applyable, ClientError, Deletable, Gettable},
		delete::DeletionPropagation,
	},
	model::{ObjectMetadata, ResourceModel},
};

pub fn widget_type() -> ResourceType {
	ResourceType::new(
		"example.com",
		"v1",
		"Widget",
		"widgets",
		ResourceScope::Namespaced,
	)
}

pub fn sample_widget() -> ResourceModel {
	ResourceModel {
		api_version: "example.com/v1".into(),
		kind: "Widget".into(),
		metadata: ObjectMetadata {
			name: "w1".into(),
			namespace: Some("ns1".into()),
			..Default::default()
		},
		spec: Some(json!({"size": 3, "color": "red"})),
		..Default::default()
	}
}

/// Scripted response of the fake client.
#[derive(Debug, Clone)]
pub enum Reply {
	Object(Value),
	NotFound,
	Failure(u16),
}

impl Reply {
	fn into_result(self) -> Result<Value, ClientError> {
		match self {
			Reply::Object(value) => Ok(value),
			Reply::NotFound => Err(ClientError::NotFound),
			Reply::Failure(code) => Err(ClientError::Api {
				code,
				reason: "InjectedFailure".into(),
				message: format!("injected failure with status {code}"),
			}),
		}
	}
}

#[derive(Debug, Clone)]
pub struct ApplyCall {
	pub body: Value,
	pub options: ResolvedApplyOptions,
}

/// Fake cluster client.
///
/// Reads return the scripted replies in order, repeating the last one. Applies
/// echo the body back with server metadata unless a reply is scripted.
#[derive(Debug, Default)]
pub struct FakeClient {
	gets: Mutex<Vec<Reply>>,
	get_count: AtomicUsize,
	apply_reply: Option<Reply>,
	applies: Mutex<Vec<ApplyCall>>,
	delete_reply: Option<Reply>,
	deletes: Mutex<Vec<Option<DeletionPropagation>>>,
}

impl FakeClient {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_gets(self, replies: Vec<Reply>) -> Self {
		Self {
			gets: Mutex::new(replies),
			..self
		}
	}

	pub fn with_apply(self, reply: Reply) -> Self {
		Self {
			apply_reply: Some(reply),
			..self
		}
	}

	pub fn with_delete(self, reply: Reply) -> Self {
		Self {
			delete_reply: Some(reply),
			..self
		}
	}

	pub fn get_count(&self) -> usize {
		self.get_count.load(Ordering::SeqCst)
	}

	pub fn applies(&self) -> Vec<ApplyCall> {
		self.applies.lock().unwrap().clone()
	}

	pub fn deletes(&self) -> Vec<Option<DeletionPropagation>> {
		self.deletes.lock().unwrap().clone()
	}
}

#[async_trait]
impl Gettable for FakeClient {
	async fn get(
		&self,
		_resource_type: &ResourceType,
		_identity: &ResourceIdentity,
	) -> Result<Value, ClientError> {
		self.get_count.fetch_add(1, Ordering::SeqCst);
		let mut gets = self.gets.lock().unwrap();
		let reply = match gets.len() {
			0 => Reply::NotFound,
			1 => gets[0].clone(),
			_ => gets.remove(0),
		};
		reply.into_result()
	}
}

#[async_trait]
impl Applyable for FakeClient {
	async fn apply(
		&self,
		_resource_type: &ResourceType,
		_identity: &ResourceIdentity,
		body: &Value,
		options: &ResolvedApplyOptions,
	) -> Result<Value, ClientError> {
		self.applies.lock().unwrap().push(ApplyCall {
			body: body.clone(),
			options: options.clone(),
		});

		if let Some(reply) = &self.apply_reply {
			return reply.clone().into_result();
		}
		let mut object = body.clone();
		object["metadata"]["uid"] = json!("00000000-0000-0000-0000-000000000001");
		object["metadata"]["resourceVersion"] = json!("1");
		object["metadata"]["generation"] = json!(1);
		object["status"] = json!({"phase": "Ready"});
		Ok(object)
	}
}

#[async_trait]
impl Deletable for FakeClient {
	async fn delete(
		&self,
		_resource_type: &ResourceType,
		_identity: &ResourceIdentity,
		propagation: Option<DeletionPropagation>,
	) -> Result<(), ClientError> {
		self.deletes.lock().unwrap().push(propagation);
		match &self.delete_reply {
			Some(reply) => reply.clone().into_result().map(|_| ()),
			None => Ok(()),
		}
	}
}
