/*!
 * Structured Tracing
 * Subscriber setup and timed operation spans using the tracing crate
 *
 * Library code logs through the `log` facade; the subscriber installed here bridges
 * those records so host tools see allocator events alongside their own spans.
 */

use crate::core::limits::SLOW_OPERATION_MICROS;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{
    fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter,
};

static NEXT_TRACE_ID: AtomicU64 = AtomicU64::new(1);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - WORKSTATION_TRACE_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; only the first call installs a subscriber.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("WORKSTATION_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_thread_names(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
    };

    if installed.is_ok() {
        info!(json = use_json, "Structured tracing initialized");
    }
}

/// Start a timed span for an allocator operation
#[inline]
pub fn span_operation(name: &'static str) -> OperationSpan {
    OperationSpan::new(name)
}

/// Span that reports its own duration when dropped
///
/// Operations slower than `SLOW_OPERATION_MICROS` are logged at warn level since they
/// risk an audio dropout when they run on the render path.
pub struct OperationSpan {
    span: tracing::Span,
    start: Instant,
    trace_id: u64,
}

impl OperationSpan {
    pub fn new(operation: &'static str) -> Self {
        let trace_id = NEXT_TRACE_ID.fetch_add(1, Ordering::Relaxed);
        let span = span!(
            Level::DEBUG,
            "operation",
            trace_id,
            operation,
            size = tracing::field::Empty,
            victims = tracing::field::Empty,
            result = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            trace_id,
        }
    }

    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    pub fn record_size(&self, size: usize) {
        self.span.record("size", size);
    }

    pub fn record_victims(&self, victims: usize) {
        self.span.record("victims", victims);
    }

    pub fn record_result(&self, result: &str) {
        self.span.record("result", result);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for OperationSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_micros() as u64;
        self.span.record("duration_us", duration);
        let _entered = self.span.enter();
        if duration > SLOW_OPERATION_MICROS {
            warn!(trace_id = self.trace_id, duration_us = duration, "slow operation");
        } else {
            debug!(trace_id = self.trace_id, duration_us = duration, "operation completed");
        }
    }
}
