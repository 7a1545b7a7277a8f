//! Polling the live object until a condition holds, or until it is gone.

use std::{future::Future, time::Duration};

use k8s::{ResourceIdentity, ResourceType};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace};

use super::{client::Gettable, fetch::Fetcher, jsonpath::JsonPathExpr};
use crate::error::{ConfigurationError, OperationError};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// What a negative timeout stands for.
///
/// The original sign is not kept: a state written back carries `7days`.
pub const NEGATIVE_TIMEOUT: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Floor for the poll interval so a zero interval does not spin.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Parse a duration such as `30s`, `5m` or `1h30m`.
///
/// A leading `-` is accepted and yields [`NEGATIVE_TIMEOUT`].
pub fn parse_duration(value: &str) -> Result<Duration, ConfigurationError> {
	let trimmed = value.trim();
	let (negative, magnitude) = match trimmed.strip_prefix('-') {
		Some(rest) => (true, rest),
		None => (false, trimmed),
	};

	let parsed = humantime::parse_duration(magnitude).map_err(|source| {
		ConfigurationError::InvalidDuration {
			value: value.to_string(),
			source,
		}
	})?;

	if negative && !parsed.is_zero() {
		Ok(NEGATIVE_TIMEOUT)
	} else {
		Ok(parsed)
	}
}

/// Serde adapter for durations written as strings.
pub mod duration_str {
	use std::time::Duration;

	use serde::{Deserialize, Deserializer, Serializer};

	pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(&humantime::format_duration(*value))
	}

	pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
		let raw = String::deserialize(deserializer)?;
		super::parse_duration(&raw).map_err(serde::de::Error::custom)
	}
}

fn default_timeout() -> Duration {
	DEFAULT_TIMEOUT
}

fn default_poll_interval() -> Duration {
	DEFAULT_POLL_INTERVAL
}

/// A JSONPath condition on the live object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WaitCondition {
	pub jsonpath: String,
	/// Value the match must render to; without it any non-empty match satisfies.
	#[serde(default, rename = "value", skip_serializing_if = "Option::is_none")]
	pub expected_value: Option<String>,
	#[serde(default = "default_timeout", with = "duration_str")]
	pub timeout: Duration,
	#[serde(default = "default_poll_interval", with = "duration_str")]
	pub poll_interval: Duration,
}

impl WaitCondition {
	pub fn new(jsonpath: impl Into<String>) -> Self {
		Self {
			jsonpath: jsonpath.into(),
			expected_value: None,
			timeout: DEFAULT_TIMEOUT,
			poll_interval: DEFAULT_POLL_INTERVAL,
		}
	}

	fn describe(&self) -> String {
		match &self.expected_value {
			Some(value) => format!("`{}` = {value}", self.jsonpath),
			None => format!("`{}`", self.jsonpath),
		}
	}
}

/// Timing of the wait for absence after a delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AbsenceWait {
	#[serde(default = "default_timeout", with = "duration_str")]
	pub timeout: Duration,
	#[serde(default = "default_poll_interval", with = "duration_str")]
	pub poll_interval: Duration,
}

impl Default for AbsenceWait {
	fn default() -> Self {
		Self {
			timeout: DEFAULT_TIMEOUT,
			poll_interval: DEFAULT_POLL_INTERVAL,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PollOutcome {
	Satisfied,
	Unmet,
	TimedOut,
	Cancelled,
}

/// Run `check` until it returns true.
///
/// With a zero timeout `check` runs exactly once. Otherwise sleeps are clipped
/// to the time remaining, so a timeout is reported no earlier than `timeout`
/// after the start and no later than one poll interval past it.
async fn poll<F, Fut>(
	timeout: Duration,
	poll_interval: Duration,
	cancel: &CancellationToken,
	mut check: F,
) -> Result<PollOutcome, OperationError>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Result<bool, OperationError>>,
{
	let start = Instant::now();
	let poll_interval = poll_interval.max(MIN_POLL_INTERVAL);

	loop {
		if cancel.is_cancelled() {
			return Ok(PollOutcome::Cancelled);
		}
		let satisfied = tokio::select! {
			() = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
			result = check() => result?,
		};
		if satisfied {
			return Ok(PollOutcome::Satisfied);
		}
		if timeout.is_zero() {
			return Ok(PollOutcome::Unmet);
		}

		let elapsed = start.elapsed();
		if elapsed >= timeout {
			return Ok(PollOutcome::TimedOut);
		}

		let pause = poll_interval.min(timeout - elapsed);
		trace!(?pause, "condition not yet met");
		tokio::select! {
			() = cancel.cancelled() => return Ok(PollOutcome::Cancelled),
			() = tokio::time::sleep(pause) => {}
		}
	}
}

/// Waits on objects of one type.
pub struct ConditionWaiter<'a, C: ?Sized> {
	fetcher: Fetcher<'a, C>,
	resource_type: &'a ResourceType,
	cancel: CancellationToken,
}

impl<'a, C: Gettable + ?Sized> ConditionWaiter<'a, C> {
	pub fn new(client: &'a C, resource_type: &'a ResourceType, cancel: CancellationToken) -> Self {
		Self {
			fetcher: Fetcher::new(client, resource_type),
			resource_type,
			cancel,
		}
	}

	/// Wait until `condition` holds on the object.
	///
	/// A missing object counts as not yet satisfied; any other fetch failure
	/// ends the wait.
	#[instrument(skip_all, fields(
		resource_type = %self.resource_type,
		id = %identity,
		jsonpath = %condition.jsonpath,
	))]
	pub async fn wait_for(
		&self,
		identity: &ResourceIdentity,
		condition: &WaitCondition,
	) -> Result<(), OperationError> {
		let path = JsonPathExpr::parse(&condition.jsonpath)?;
		let expected = condition.expected_value.as_deref();
		let fetcher = &self.fetcher;
		let path = &path;

		let outcome = poll(condition.timeout, condition.poll_interval, &self.cancel, || async move {
			match fetcher.fetch_object(identity).await {
				Ok(object) => Ok(path.matches(&object, expected)),
				Err(err) if err.is_not_found() => Ok(false),
				Err(err) => Err(err),
			}
		})
		.await?;

		self.finish(outcome, identity, condition.describe(), condition.timeout)
	}

	/// Wait until the object no longer exists.
	#[instrument(skip_all, fields(resource_type = %self.resource_type, id = %identity))]
	pub async fn wait_for_absence(
		&self,
		identity: &ResourceIdentity,
		wait: &AbsenceWait,
	) -> Result<(), OperationError> {
		let fetcher = &self.fetcher;

		let outcome = poll(wait.timeout, wait.poll_interval, &self.cancel, || async move {
			match fetcher.fetch_object(identity).await {
				Ok(_) => Ok(false),
				Err(err) if err.is_not_found() => Ok(true),
				Err(err) => Err(err),
			}
		})
		.await?;

		self.finish(outcome, identity, "deletion".to_string(), wait.timeout)
	}

	fn finish(
		&self,
		outcome: PollOutcome,
		identity: &ResourceIdentity,
		what: String,
		timeout: Duration,
	) -> Result<(), OperationError> {
		debug!(?outcome, %what, "wait finished");

		let resource_type = self.resource_type.to_string();
		let identity = identity.clone();
		match outcome {
			PollOutcome::Satisfied => Ok(()),
			PollOutcome::Unmet => Err(OperationError::WaitConditionUnmet {
				resource_type,
				identity,
				what,
			}),
			PollOutcome::TimedOut => Err(OperationError::WaitTimeoutExceeded {
				resource_type,
				identity,
				what,
				timeout,
			}),
			PollOutcome::Cancelled => Err(OperationError::Cancelled {
				resource_type,
				identity,
				what,
			}),
		}
	}
}
