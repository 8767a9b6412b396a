//! Logging setup and per-command correlation ids.
//!
//! Logs go to stderr so command output on stdout stays clean. Every REST call
//! carries the active trace id as `X-Request-Id`.

use std::any::type_name_of_val;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use thiserror::Error;
use tokio::task_local;
use tracing::{Instrument, info_span};
use tracing_log::LogTracer;
use tracing_subscriber::{
    EnvFilter, fmt,
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
};

use crate::config::AppConfig;

/// Transport crates that are chatty at `debug`.
const QUIET_TARGETS: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "tungstenite"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl LogFormat {
    /// Unknown values fall back to JSON.
    pub fn from_config(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            "compact" | "text" => LogFormat::Compact,
            _ => LogFormat::Json,
        }
    }
}

/// Correlation id shared by everything one command does.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
}

impl TraceContext {
    pub fn generate() -> Self {
        Self {
            trace_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

task_local! {
    static ACTIVE_TRACE_CONTEXT: TraceContext;
}

#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to install log tracer bridge: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

static TELEMETRY_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Filter used when `RUST_LOG` is unset: the configured level for this
/// crate, `warn` for transport internals.
pub fn default_filter(log_level: &str) -> String {
    let mut directives = vec![log_level.to_string()];
    directives.extend(QUIET_TARGETS.iter().map(|target| format!("{target}=warn")));
    directives.join(",")
}

/// Install the global subscriber once. Later calls are no-ops.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if TELEMETRY_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Ok(());
    }

    if let Err(err) = LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
    {
        let logger_type = type_name_of_val(log::logger());
        if !logger_type.contains("LogTracer") {
            eprintln!("Warning: `log` records will not reach tracing: {}", err);
        }
    }

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(&config.log_level)));

    let fmt_layer = match LogFormat::from_config(&config.log_format) {
        LogFormat::Pretty => fmt::layer().pretty().with_writer(std::io::stderr).boxed(),
        LogFormat::Compact => fmt::layer()
            .compact()
            .with_target(false)
            .with_writer(std::io::stderr)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed(),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        TELEMETRY_INITIALIZED.store(false, Ordering::SeqCst);
        eprintln!("Warning: tracing subscriber already set: {}", err);
    }

    Ok(())
}

/// Run `future` with `context` active and inside a span carrying its trace id.
pub async fn with_trace_context<Fut, R>(context: TraceContext, future: Fut) -> R
where
    Fut: Future<Output = R>,
{
    let span = info_span!("portal", trace_id = %context.trace_id);
    ACTIVE_TRACE_CONTEXT
        .scope(context, future.instrument(span))
        .await
}

pub fn current_trace_id() -> Option<String> {
    ACTIVE_TRACE_CONTEXT
        .try_with(|ctx| ctx.trace_id.clone())
        .ok()
}
