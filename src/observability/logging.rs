//! Structured logging.
//!
//! # Responsibilities
//! - Initialize logging subsystem
//! - Prefix log lines with the thread's diagnostic entries
//! - Configure log level from config and environment
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - `RUST_LOG` wins over the configured level
//! - Initialization is idempotent so every test may call it

use std::fmt::Write as _;

use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{self, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;
use crate::observability::diagnostic;

/// Event formatter writing `[key=value ...] ` before the wrapped format's output.
#[derive(Debug, Clone)]
pub struct DiagnosticFormat<F> {
    inner: F,
}

impl<F> DiagnosticFormat<F> {
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<S, N, F> FormatEvent<S, N> for DiagnosticFormat<F>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
    F: FormatEvent<S, N>,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std::fmt::Result {
        let entries = diagnostic::snapshot();
        if !entries.is_empty() {
            writer.write_char('[')?;
            for (i, (key, value)) in entries.iter().enumerate() {
                if i > 0 {
                    writer.write_char(' ')?;
                }
                write!(writer, "{}={}", key, value)?;
            }
            writer.write_str("] ")?;
        }
        self.inner.format_event(ctx, writer, event)
    }
}

/// Install the global subscriber. Returns `false` if one was already installed.
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let installed = if config.log_diagnostic_context {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().event_format(DiagnosticFormat::new(fmt::format())))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .try_init()
    };

    installed.is_ok()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::DiagnosticBridge;
    use crate::trace::Traceparent;

    #[test]
    fn test_lines_carry_bound_trace_ids() {
        let tp = Traceparent::random();
        let bridge = DiagnosticBridge::new(true);
        bridge.bind(&tp);

        let line = capture::logs(|| tracing::info!("calling api"));
        bridge.unbind();

        let prefix = format!("[spanId={} traceId={}] ", tp.span_id(), tp.trace_id());
        assert!(line.starts_with(&prefix), "{line}");
        assert!(line.contains("calling api"));
    }

    #[test]
    fn test_no_prefix_without_diagnostic_entries() {
        diagnostic::clear().unwrap();

        let line = capture::logs(|| tracing::info!("calling api"));

        assert!(!line.starts_with('['), "{line}");
        assert!(line.contains("calling api"));
    }

    #[test]
    fn test_init_logging_is_idempotent() {
        let config = ObservabilityConfig::default();
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
