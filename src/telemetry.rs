//! Tracing setup and request-scoped trace IDs for the broker.
//!
//! The subscriber is installed once at startup; handlers and workers read the
//! active trace ID through a task-local so that problem+json responses and
//! structured log lines share one correlation ID per request.

use std::any::type_name_of_val;
use std::sync::atomic::{AtomicBool, Ordering};

use log::LevelFilter;
use thiserror::Error;
use tokio::task_local;
use tracing_log::LogTracer;
use tracing_subscriber::{
    layer::Layer,
    layer::SubscriberExt,
    util::{SubscriberInitExt, TryInitError},
    EnvFilter, fmt,
};

use crate::config::AppConfig;

/// Request correlation metadata carried through the task-local scope.
#[derive(Debug, Clone)]
pub struct TraceContext {
    pub trace_id: String,
}

task_local! {
    static ACTIVE_TRACE_CONTEXT: TraceContext;
}

/// Errors that can occur while installing global telemetry.
#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to install log tracer bridge: {0}")]
    LogTracer(#[from] log::SetLoggerError),
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

static TELEMETRY_INITIALIZED: AtomicBool = AtomicBool::new(false);

/// Install the global subscriber exactly once.
///
/// `BROKER_LOG_FORMAT=pretty` switches from the default JSON output to the
/// human-readable formatter for local work. `RUST_LOG` overrides the
/// configured level when set. Legacy `log::` macros (sea-orm, sqlx) are
/// bridged into the tracing pipeline.
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
        // A LogTracer registered elsewhere (tests, embedding harness) is
        // fine; any other logger means `log::` records will bypass tracing.
        let logger_type = type_name_of_val(log::logger());
        if !logger_type.contains("LogTracer") {
            eprintln!(
                "Warning: failed to install log tracer bridge: {}. `log::` macros will not emit tracing events.",
                err
            );
        }
    }

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let fmt_layer = match config.log_format.as_str() {
        "pretty" => fmt::layer().pretty().boxed(),
        _ => fmt::layer().json().boxed(),
    };

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()
    {
        TELEMETRY_INITIALIZED.store(false, Ordering::SeqCst);
        eprintln!(
            "Warning: failed to set global tracing subscriber: {}. Existing subscriber remains in effect.",
            err
        );
    }

    Ok(())
}

/// Run `future` with the given trace context active for the current task.
pub async fn with_trace_context<Fut, R>(context: TraceContext, future: Fut) -> R
where
    Fut: std::future::Future<Output = R>,
{
    ACTIVE_TRACE_CONTEXT.scope(context, future).await
}

/// The trace ID for the running task, if a request scope is active.
pub fn current_trace_id() -> Option<String> {
    ACTIVE_TRACE_CONTEXT
        .try_with(|ctx| ctx.trace_id.clone())
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trace_id_visible_only_inside_scope() {
        assert_eq!(current_trace_id(), None);

        let context = TraceContext {
            trace_id: "req-abc12345".to_string(),
        };
        let seen = with_trace_context(context, async { current_trace_id() }).await;
        assert_eq!(seen.as_deref(), Some("req-abc12345"));

        assert_eq!(current_trace_id(), None);
    }

    #[tokio::test]
    async fn nested_scopes_shadow_outer_context() {
        let outer = TraceContext {
            trace_id: "req-outer".to_string(),
        };
        let inner = TraceContext {
            trace_id: "req-inner".to_string(),
        };

        let (inner_seen, outer_seen) = with_trace_context(outer, async move {
            let inner_seen = with_trace_context(inner, async { current_trace_id() }).await;
            (inner_seen, current_trace_id())
        })
        .await;

        assert_eq!(inner_seen.as_deref(), Some("req-inner"));
        assert_eq!(outer_seen.as_deref(), Some("req-outer"));
    }
}
