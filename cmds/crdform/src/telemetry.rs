//! Tracing and log output setup.

use std::io::IsTerminal;

use anyhow::Result;
use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const SERVICE_NAME: &str = "crdform";

/// Flushes exported spans when dropped; keep it alive for the whole command.
pub struct TelemetryGuard {
	_spans: Option<SpanFlush>,
}

struct SpanFlush(SdkTracerProvider);

impl Drop for SpanFlush {
	fn drop(&mut self) {
		if let Err(e) = self.0.shutdown() {
			eprintln!("failed to flush spans: {e}");
		}
	}
}

/// Wire protocol of the span exporter, from `OTEL_EXPORTER_OTLP_PROTOCOL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OtlpProtocol {
	Grpc,
	Http,
}

impl OtlpProtocol {
	fn from_env_value(value: Option<&str>) -> Self {
		match value.unwrap_or(opentelemetry_otlp::OTEL_EXPORTER_OTLP_PROTOCOL_DEFAULT) {
			"grpc" => OtlpProtocol::Grpc,
			_ => OtlpProtocol::Http,
		}
	}

	fn exporter(self) -> Result<opentelemetry_otlp::SpanExporter> {
		let builder = opentelemetry_otlp::SpanExporter::builder();
		let exporter = match self {
			OtlpProtocol::Grpc => builder.with_tonic().build()?,
			OtlpProtocol::Http => builder.with_http().build()?,
		};
		Ok(exporter)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
	Pretty,
	Json,
}

impl LogFormat {
	fn for_stderr(is_terminal: bool) -> Self {
		if is_terminal {
			LogFormat::Pretty
		} else {
			LogFormat::Json
		}
	}
}

/// Spans are exported only when an OTLP endpoint is configured.
fn otlp_configured() -> bool {
	[
		opentelemetry_otlp::OTEL_EXPORTER_OTLP_ENDPOINT,
		opentelemetry_otlp::OTEL_EXPORTER_OTLP_TRACES_ENDPOINT,
	]
	.iter()
	.any(|var| std::env::var_os(var).is_some())
}

/// Level filter: the `--log-level` flag, then `RUST_LOG`, then `warn`.
///
/// Diagnostics are printed separately, so routine runs stay quiet.
fn filter(log_level: Option<Level>) -> EnvFilter {
	match log_level {
		Some(level) => EnvFilter::new(level.as_str()),
		None => EnvFilter::builder()
			.with_default_directive(Level::WARN.into())
			.from_env_lossy(),
	}
}

/// Install the global subscriber.
///
/// Logs go to stderr, pretty on a terminal and JSON otherwise. Spans are also
/// exported over OTLP when `OTEL_EXPORTER_OTLP_ENDPOINT` or
/// `OTEL_EXPORTER_OTLP_TRACES_ENDPOINT` is set.
pub fn init(log_level: Option<Level>) -> Result<TelemetryGuard> {
	let fmt_layer = match LogFormat::for_stderr(std::io::stderr().is_terminal()) {
		LogFormat::Pretty => tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.pretty()
			.boxed(),
		LogFormat::Json => tracing_subscriber::fmt::layer()
			.with_writer(std::io::stderr)
			.json()
			.boxed(),
	};

	let registry = tracing_subscriber::registry()
		.with(filter(log_level))
		.with(fmt_layer);

	if !otlp_configured() {
		registry.init();
		return Ok(TelemetryGuard { _spans: None });
	}

	let protocol = OtlpProtocol::from_env_value(
		std::env::var(opentelemetry_otlp::OTEL_EXPORTER_OTLP_PROTOCOL)
			.ok()
			.as_deref(),
	);
	let tracer_provider = SdkTracerProvider::builder()
		.with_resource(otel_resource())
		.with_batch_exporter(protocol.exporter()?)
		.build();
	opentelemetry::global::set_tracer_provider(tracer_provider.clone());

	let otel_layer = tracing_opentelemetry::layer()
		.with_error_records_to_exceptions(true)
		.with_tracer(tracer_provider.tracer(SERVICE_NAME));
	registry.with(otel_layer).init();

	Ok(TelemetryGuard {
		_spans: Some(SpanFlush(tracer_provider)),
	})
}

/// `service.name` defaults to crdform; `OTEL_SERVICE_NAME` and
/// `OTEL_RESOURCE_ATTRIBUTES` are read by the builder itself.
fn otel_resource() -> opentelemetry_sdk::Resource {
	let builder = opentelemetry_sdk::Resource::builder();
	if std::env::var_os("OTEL_SERVICE_NAME").is_some() {
		builder.build()
	} else {
		builder.with_service_name(SERVICE_NAME).build()
	}
}
