//! `crdform wait`: block until a JSONPath condition holds on a live object.

use std::{io::Write, time::Duration};

use anyhow::{Context, Result};
use clap::Args;

use super::util::{build_provider, cancel_on_ctrl_c, GlobalArgs};
use crate::k8s::wait::{parse_duration, WaitCondition};

#[derive(Args, Debug)]
pub struct WaitArgs {
	/// Resource type name
	pub type_name: String,

	/// `namespace/name`, or `name` for cluster-scoped types
	pub id: String,

	/// JSONPath, `$.status.phase` or `{.status.phase}`
	#[arg(long)]
	pub jsonpath: String,

	/// Value the match must equal; any non-empty match satisfies when unset
	#[arg(long)]
	pub value: Option<String>,

	/// How long to wait; `0s` checks once
	#[arg(long, default_value = "30s", value_parser = parse_duration)]
	pub timeout: Duration,

	#[arg(long, default_value = "5s", value_parser = parse_duration)]
	pub poll_interval: Duration,
}

impl WaitArgs {
	fn condition(&self) -> WaitCondition {
		WaitCondition {
			expected_value: self.value.clone(),
			timeout: self.timeout,
			poll_interval: self.poll_interval,
			..WaitCondition::new(self.jsonpath.clone())
		}
	}
}

pub async fn run<W: Write>(args: WaitArgs, global: &GlobalArgs, mut writer: W) -> Result<()> {
	let config = global.load_config()?;
	let provider = build_provider(&config, cancel_on_ctrl_c()).await?;

	let resource = provider.resource(&args.type_name)?;
	let identity = resource.parse_id(&args.id)?;
	resource
		.wait(&identity, &args.condition())
		.await
		.with_context(|| format!("waiting for {} {}", args.type_name, args.id))?;

	writeln!(writer, "condition met")?;
	writer.flush()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use clap::Parser;

	use super::*;

	#[derive(Parser)]
	struct Cli {
		#[command(flatten)]
		wait: WaitArgs,
	}

	#[test]
	fn test_defaults() {
		let cli = Cli::parse_from([
			"wait",
			"k8s_example_com_widget_v1",
			"ns1/w1",
			"--jsonpath",
			"{.status.phase}",
		]);
		let condition = cli.wait.condition();
		assert_eq!(condition.timeout, Duration::from_secs(30));
		assert_eq!(condition.poll_interval, Duration::from_secs(5));
		assert_eq!(condition.expected_value, None);
	}

	#[test]
	fn test_negative_timeout_waits_a_week() {
		let cli = Cli::parse_from([
			"wait",
			"k8s_example_com_widget_v1",
			"ns1/w1",
			"--jsonpath",
			"$.status.phase",
			"--value",
			"Ready",
			"--timeout=-1s",
		]);
		assert_eq!(
			cli.wait.condition().timeout,
			Duration::from_secs(7 * 24 * 60 * 60)
		);
	}

	#[test]
	fn test_bad_duration_is_rejected() {
		let result = Cli::try_parse_from([
			"wait",
			"k8s_example_com_widget_v1",
			"ns1/w1",
			"--jsonpath",
			"$.status.phase",
			"--timeout",
			"soon",
		]);
		assert!(result.is_err());
	}
}
