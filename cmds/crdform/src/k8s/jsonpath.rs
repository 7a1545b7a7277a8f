//! JSONPath expressions over Kubernetes objects.
//!
//! Expressions may be written the way kubectl accepts them (`{.status.phase}`,
//! `.status.phase`) or as plain JSONPath (`$.status.phase`).

use serde_json::{Map, Value};

use crate::error::ConfigurationError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPathExpr {
	raw: String,
	normalized: String,
}

impl JsonPathExpr {
	/// Normalize and syntax-check an expression.
	pub fn parse(raw: &str) -> Result<Self, ConfigurationError> {
		let invalid = |message: &str| ConfigurationError::InvalidJsonPath {
			expression: raw.to_string(),
			message: message.to_string(),
		};
		let normalized = normalize(raw).map_err(invalid)?;
		if normalized == "$" || normalized == "$." {
			return Err(invalid("expression selects nothing"));
		}
		jsonpath_lib::select(&Value::Object(Map::new()), &normalized).map_err(|err| {
			ConfigurationError::InvalidJsonPath {
				expression: raw.to_string(),
				message: format!("{err:?}"),
			}
		})?;

		Ok(Self {
			raw: raw.to_string(),
			normalized,
		})
	}

	pub fn as_str(&self) -> &str {
		&self.raw
	}

	pub fn select<'v>(&self, object: &'v Value) -> Vec<&'v Value> {
		jsonpath_lib::select(object, &self.normalized).unwrap_or_default()
	}

	/// Whether any non-empty match exists and, with `expected`, renders equal to it.
	///
	/// `null`, `""`, `[]` and `{}` count as empty.
	///
	/// Strings compare by content; other values by their JSON text, so `3`,
	/// `true` and `{"a":1}` are written as such.
	pub fn matches(&self, object: &Value, expected: Option<&str>) -> bool {
		self.select(object)
			.into_iter()
			.filter(|v| !is_empty(v))
			.any(|v| expected.is_none_or(|expected| render(v) == expected))
	}
}

/// Rewrite a kubectl-style expression into plain JSONPath.
///
/// Only a single `{...}` template is understood; `range`/`end` blocks and
/// concatenated templates are refused. Dots escaped as `\.` inside a field
/// name are kept, so `{.metadata.labels.app\.kubernetes\.io/name}` becomes
/// `$.metadata.labels['app.kubernetes.io/name']`.
fn normalize(raw: &str) -> Result<String, &'static str> {
	let trimmed = raw.trim();
	let inner = match trimmed.strip_prefix('{') {
		Some(rest) => rest.strip_suffix('}').ok_or("unbalanced braces")?,
		None if trimmed.ends_with('}') => return Err("unbalanced braces"),
		None => trimmed,
	}
	.trim();

	if matches!(inner.split_whitespace().next(), Some("range" | "end")) {
		return Err("range and end templates are not supported");
	}
	if inner.contains(['{', '}']) {
		return Err("only a single {} template is supported");
	}

	let inner = unescape_dots(inner);
	Ok(if inner.starts_with('$') {
		inner
	} else if inner.starts_with('.') || inner.starts_with('[') {
		format!("${inner}")
	} else {
		format!("$.{inner}")
	})
}

/// Turn `.a\.b` segments into `['a.b']`; everything inside brackets is left alone.
fn unescape_dots(path: &str) -> String {
	if !path.contains("\\.") {
		return path.to_string();
	}

	let mut out = String::with_capacity(path.len());
	let mut segment: Option<String> = None;
	let mut depth = 0usize;
	let mut chars = path.chars().peekable();
	while let Some(c) = chars.next() {
		if let Some(current) = segment.as_mut() {
			match c {
				'\\' if chars.peek() == Some(&'.') => {
					chars.next();
					current.push('.');
					continue;
				}
				'.' | '[' => push_segment(&mut out, segment.take()),
				_ => {
					current.push(c);
					continue;
				}
			}
		}
		match c {
			'[' => depth += 1,
			']' => depth = depth.saturating_sub(1),
			'.' if depth == 0 => {
				segment = Some(String::new());
				continue;
			}
			_ => {}
		}
		out.push(c);
	}
	push_segment(&mut out, segment);
	out
}

fn push_segment(out: &mut String, segment: Option<String>) {
	match segment {
		Some(name) if name.contains('.') => {
			out.push_str("['");
			out.push_str(&name);
			out.push_str("']");
		}
		Some(name) => {
			out.push('.');
			out.push_str(&name);
		}
		None => {}
	}
}

fn is_empty(value: &Value) -> bool {
	match value {
		Value::Null => true,
		Value::String(s) => s.is_empty(),
		Value::Array(items) => items.is_empty(),
		Value::Object(map) => map.is_empty(),
		_ => false,
	}
}

fn render(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		other => other.to_string(),
	}
}
