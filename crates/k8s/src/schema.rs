//! Attribute tables for custom resource payloads.
//!
//! Each custom resource type is described by a [`TypeSchema`]: its resource
//! coordinates plus a flat list of attributes addressed by dotted paths
//! (`spec.issuerRef.name`). The tables are loaded from catalog files; this module
//! only defines their shape and checks objects against them.

use std::fmt;

use phf::phf_map;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{ResourceScope, ResourceType};

/// Value type of an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AttributeType {
	String,
	Bool,
	Int64,
	Float64,
	List,
	Map,
	Object,
}

static ATTRIBUTE_TYPES: phf::Map<&'static str, AttributeType> = phf_map! {
	"string" => AttributeType::String,
	"bool" => AttributeType::Bool,
	"int64" => AttributeType::Int64,
	"float64" => AttributeType::Float64,
	"list" => AttributeType::List,
	"map" => AttributeType::Map,
	"object" => AttributeType::Object,
};

impl AttributeType {
	pub fn as_str(self) -> &'static str {
		match self {
			AttributeType::String => "string",
			AttributeType::Bool => "bool",
			AttributeType::Int64 => "int64",
			AttributeType::Float64 => "float64",
			AttributeType::List => "list",
			AttributeType::Map => "map",
			AttributeType::Object => "object",
		}
	}

	fn accepts(self, value: &Value) -> bool {
		match self {
			AttributeType::String => value.is_string(),
			AttributeType::Bool => value.is_boolean(),
			AttributeType::Int64 => value.is_i64() || value.is_u64(),
			AttributeType::Float64 => value.is_number(),
			AttributeType::List => value.is_array(),
			AttributeType::Map | AttributeType::Object => value.is_object(),
		}
	}
}

impl TryFrom<String> for AttributeType {
	type Error = String;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		ATTRIBUTE_TYPES
			.get(value.as_str())
			.copied()
			.ok_or_else(|| format!("unknown attribute type `{value}`"))
	}
}

impl From<AttributeType> for String {
	fn from(value: AttributeType) -> Self {
		value.as_str().to_string()
	}
}

/// Constraint on the value of an attribute, copied from the CRD's OpenAPI schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Validator {
	OneOf(Vec<String>),
	Pattern(String),
	LengthAtLeast(usize),
	LengthAtMost(usize),
	AtLeast(f64),
	AtMost(f64),
}

impl Validator {
	/// Returns a message describing why `value` fails this validator.
	fn check(&self, value: &Value) -> Option<String> {
		match self {
			Validator::OneOf(allowed) => {
				let s = value.as_str()?;
				(!allowed.iter().any(|a| a == s))
					.then(|| format!("value `{s}` must be one of: {}", allowed.join(", ")))
			}
			Validator::Pattern(pattern) => {
				let s = value.as_str()?;
				match Regex::new(pattern) {
					Ok(re) if re.is_match(s) => None,
					Ok(_) => Some(format!("value `{s}` must match `{pattern}`")),
					Err(e) => Some(format!("invalid pattern `{pattern}`: {e}")),
				}
			}
			Validator::LengthAtLeast(min) => {
				let len = value_len(value)?;
				(len < *min).then(|| format!("length must be at least {min}, got {len}"))
			}
			Validator::LengthAtMost(max) => {
				let len = value_len(value)?;
				(len > *max).then(|| format!("length must be at most {max}, got {len}"))
			}
			Validator::AtLeast(min) => {
				let n = value.as_f64()?;
				(n < *min).then(|| format!("value must be at least {min}, got {n}"))
			}
			Validator::AtMost(max) => {
				let n = value.as_f64()?;
				(n > *max).then(|| format!("value must be at most {max}, got {n}"))
			}
		}
	}
}

fn value_len(value: &Value) -> Option<usize> {
	match value {
		Value::String(s) => Some(s.chars().count()),
		Value::Array(a) => Some(a.len()),
		Value::Object(o) => Some(o.len()),
		_ => None,
	}
}

/// One attribute of a custom resource payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
	/// Dotted path from the object root, e.g. `spec.secretName`.
	pub path: String,
	#[serde(rename = "type")]
	pub attribute_type: AttributeType,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub required: bool,
	#[serde(default, skip_serializing_if = "std::ops::Not::not")]
	pub computed: bool,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub description: String,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub validators: Vec<Validator>,
}

impl Attribute {
	pub fn is_optional(&self) -> bool {
		!self.required && !self.computed
	}
}

/// A single problem found while checking an object against its schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
	pub path: String,
	pub message: String,
}

impl fmt::Display for Violation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}: {}", self.path, self.message)
	}
}

/// Problems in the schema table itself, detected when a catalog is loaded.
#[derive(Debug, Error)]
pub enum SchemaError {
	#[error("{type_name}: attribute `{path}` has an invalid pattern")]
	InvalidPattern {
		type_name: String,
		path: String,
		#[source]
		source: regex::Error,
	},

	#[error("{type_name}: attribute `{path}` is both required and computed")]
	RequiredAndComputed { type_name: String, path: String },
}

/// Schema of one custom resource type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSchema {
	#[serde(default)]
	pub group: String,
	pub version: String,
	pub kind: String,
	pub plural: String,
	pub namespaced: bool,
	#[serde(default, skip_serializing_if = "String::is_empty")]
	pub description: String,
	#[serde(default)]
	pub attributes: Vec<Attribute>,
}

impl TypeSchema {
	pub fn resource_type(&self) -> ResourceType {
		ResourceType::new(
			self.group.clone(),
			self.version.clone(),
			self.kind.clone(),
			self.plural.clone(),
			if self.namespaced {
				ResourceScope::Namespaced
			} else {
				ResourceScope::ClusterWide
			},
		)
	}

	/// Check the table for internal consistency.
	pub fn check(&self) -> Result<(), SchemaError> {
		let type_name = self.resource_type().type_name();
		for attr in &self.attributes {
			if attr.required && attr.computed {
				return Err(SchemaError::RequiredAndComputed {
					type_name,
					path: attr.path.clone(),
				});
			}
			for validator in &attr.validators {
				if let Validator::Pattern(pattern) = validator {
					Regex::new(pattern).map_err(|source| SchemaError::InvalidPattern {
						type_name: type_name.clone(),
						path: attr.path.clone(),
						source,
					})?;
				}
			}
		}
		Ok(())
	}

	/// Check an object against the attribute table.
	///
	/// A required attribute is only enforced when its parent object is present,
	/// so optional blocks may carry required children.
	pub fn validate(&self, object: &Value) -> Vec<Violation> {
		let mut violations = Vec::new();
		for attr in &self.attributes {
			let (parent, leaf) = match attr.path.rsplit_once('.') {
				Some((parent, leaf)) => (lookup(object, parent), leaf),
				None => (Some(object), attr.path.as_str()),
			};
			let Some(parent) = parent.and_then(Value::as_object) else {
				continue;
			};

			let value = match parent.get(leaf) {
				None | Some(Value::Null) => {
					if attr.required {
						violations.push(Violation {
							path: attr.path.clone(),
							message: "attribute is required".into(),
						});
					}
					continue;
				}
				Some(value) => value,
			};

			if attr.computed {
				violations.push(Violation {
					path: attr.path.clone(),
					message: "attribute is computed and cannot be set".into(),
				});
				continue;
			}

			if !attr.attribute_type.accepts(value) {
				violations.push(Violation {
					path: attr.path.clone(),
					message: format!("expected a value of type {}", attr.attribute_type.as_str()),
				});
				continue;
			}

			violations.extend(attr.validators.iter().filter_map(|v| {
				v.check(value).map(|message| Violation {
					path: attr.path.clone(),
					message,
				})
			}));
		}
		violations
	}
}

fn lookup<'v>(object: &'v Value, dotted: &str) -> Option<&'v Value> {
	dotted
		.split('.')
		.try_fold(object, |current, key| current.as_object()?.get(key))
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use serde_json::json;

	use super::*;

	fn schema() -> TypeSchema {
		TypeSchema {
			group: "cert-manager.io".into(),
			version: "v1".into(),
			kind: "Certificate".into(),
			plural: "certificates".into(),
			namespaced: true,
			description: String::new(),
			attributes: vec![
				Attribute {
					path: "spec".into(),
					attribute_type: AttributeType::Object,
					required: true,
					computed: false,
					description: String::new(),
					validators: vec![],
				},
				Attribute {
					path: "spec.secretName".into(),
					attribute_type: AttributeType::String,
					required: true,
					computed: false,
					description: String::new(),
					validators: vec![Validator::LengthAtLeast(1)],
				},
				Attribute {
					path: "spec.duration".into(),
					attribute_type: AttributeType::String,
					required: false,
					computed: false,
					description: String::new(),
					validators: vec![Validator::Pattern(r"^\d+(h|m|s)$".into())],
				},
				Attribute {
					path: "spec.privateKey.algorithm".into(),
					attribute_type: AttributeType::String,
					required: true,
					computed: false,
					description: String::new(),
					validators: vec![Validator::OneOf(vec![
						"RSA".into(),
						"ECDSA".into(),
						"Ed25519".into(),
					])],
				},
				Attribute {
					path: "spec.privateKey.size".into(),
					attribute_type: AttributeType::Int64,
					required: false,
					computed: false,
					description: String::new(),
					validators: vec![Validator::AtLeast(256.0), Validator::AtMost(8192.0)],
				},
				Attribute {
					path: "spec.revision".into(),
					attribute_type: AttributeType::Int64,
					required: false,
					computed: true,
					description: String::new(),
					validators: vec![],
				},
			],
		}
	}

	fn paths(violations: &[Violation]) -> Vec<&str> {
		violations.iter().map(|v| v.path.as_str()).collect()
	}

	#[test]
	fn test_valid_object_has_no_violations() {
		let object = json!({
			"spec": {
				"secretName": "web-tls",
				"duration": "2160h",
				"privateKey": {"algorithm": "ECDSA", "size": 384}
			}
		});
		assert_eq!(schema().validate(&object), vec![]);
	}

	#[test]
	fn test_missing_required_root() {
		let violations = schema().validate(&json!({}));
		assert_eq!(paths(&violations), vec!["spec"]);
	}

	#[test]
	fn test_required_child_of_absent_block_is_skipped() {
		let violations = schema().validate(&json!({"spec": {"secretName": "x"}}));
		assert_eq!(violations, vec![]);
	}

	#[test]
	fn test_required_child_of_present_block_is_enforced() {
		let violations = schema().validate(&json!({"spec": {"secretName": "x", "privateKey": {}}}));
		assert_eq!(paths(&violations), vec!["spec.privateKey.algorithm"]);
	}

	#[test]
	fn test_validators_report_all_problems() {
		let object = json!({
			"spec": {
				"secretName": "",
				"duration": "90 days",
				"privateKey": {"algorithm": "DSA", "size": 128},
				"revision": 3
			}
		});
		let violations = schema().validate(&object);
		assert_eq!(
			paths(&violations),
			vec![
				"spec.secretName",
				"spec.duration",
				"spec.privateKey.algorithm",
				"spec.privateKey.size",
				"spec.revision",
			]
		);
	}

	#[test]
	fn test_type_mismatch() {
		let violations = schema().validate(&json!({"spec": {"secretName": 5}}));
		assert_eq!(violations.len(), 1);
		assert_eq!(violations[0].message, "expected a value of type string");
	}

	#[test]
	fn test_attribute_type_parses_from_name() {
		let attr: Attribute =
			serde_json::from_value(json!({"path": "spec.replicas", "type": "int64"})).unwrap();
		assert_eq!(attr.attribute_type, AttributeType::Int64);
		assert!(attr.is_optional());
	}

	#[test]
	fn test_unknown_attribute_type_is_rejected() {
		let attr: Result<Attribute, _> =
			serde_json::from_value(json!({"path": "spec.x", "type": "uuid"}));
		assert!(attr.is_err());
	}

	#[test]
	fn test_check_rejects_invalid_pattern() {
		let mut schema = schema();
		schema.attributes[2].validators = vec![Validator::Pattern("(".into())];
		assert_matches!(schema.check(), Err(SchemaError::InvalidPattern { path, .. }) if path == "spec.duration");
	}

	#[test]
	fn test_check_rejects_required_and_computed() {
		let mut schema = schema();
		schema.attributes[5].required = true;
		assert_matches!(schema.check(), Err(SchemaError::RequiredAndComputed { .. }));
	}
}
