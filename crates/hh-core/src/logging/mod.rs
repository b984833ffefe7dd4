//! Structured logging for hh-core.
//!
//! Two output modes, both on stderr:
//! - Human-readable console output for interactive use
//! - JSON lines for pipelines and agents
//!
//! stdout is reserved for command payloads (run summaries, reports).
//! Events carry the run id and stage so JSONL output can be correlated.

pub mod config;
pub mod events;

pub use config::{LogConfig, LogFormat, LogLevel, LogOverrides};
pub use events::{event_names, LogContext, Stage};

use std::io::IsTerminal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the logging subsystem.
///
/// Call once at startup. A second call is a no-op. Malformed `RUST_LOG`
/// directives fall back to the resolved level.
pub fn init_logging(config: &LogConfig) {
    let filter = EnvFilter::try_new(config.filter_directives())
        .unwrap_or_else(|_| EnvFilter::default().add_directive(config.level.filter().into()));

    let result = match config.format {
        LogFormat::Human => {
            let use_ansi = config.color && std::io::stderr().is_terminal();
            let fmt_layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_ansi(use_ansi);
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
        }
        LogFormat::Jsonl => {
            let json_layer = fmt::layer()
                .json()
                .flatten_event(true)
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr);
            tracing_subscriber::registry()
                .with(filter)
                .with(json_layer)
                .try_init()
        }
    };

    if result.is_err() {
        tracing::debug!("logging already initialized");
    }
}

/// Generate a unique run ID for this invocation.
pub fn generate_run_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    // First 12 hex chars of the simple form
    format!("run-{}", &uuid.simple().to_string()[..12])
}

/// Structured event logging with run context.
///
/// ```ignore
/// log_event!(ctx, INFO, event_names::INGEST_FINISHED, Stage::Ingest, "ingest complete",
///     rows_kept = 1200, rows_dropped = 3);
/// ```
#[macro_export]
macro_rules! log_event {
    ($ctx:expr, INFO, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::info!(
            event = $event,
            run_id = %$ctx.run_id,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, DEBUG, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::debug!(
            event = $event,
            run_id = %$ctx.run_id,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, WARN, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::warn!(
            event = $event,
            run_id = %$ctx.run_id,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
    ($ctx:expr, ERROR, $event:expr, $stage:expr, $msg:expr $(, $key:ident = $val:expr)*) => {
        tracing::error!(
            event = $event,
            run_id = %$ctx.run_id,
            stage = %$stage,
            $($key = $val,)*
            "{}", $msg
        )
    };
}
