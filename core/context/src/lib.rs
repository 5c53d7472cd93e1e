//! Request scoped values for authcore operations.
//!
//! Every operation receives a [`Context`] carrying the [`Logger`] to report through and,
//! for operations that mutate state, a deadline to commit by.
//! The process creates a root context at startup and each operation derives its own
//! from it, decorating the logger with the group being operated on.
//!
//! ## Deadlines
//!
//! Store backends check the deadline before committing a transaction:
//! once the deadline elapses all pending changes are rolled back.
//! Derived contexts can narrow the deadline of their parent but never extend it.
use std::time::Duration;
use std::time::Instant;

use opentelemetry_api::trace::TraceContextExt;
use opentelemetry_api::trace::TraceId;
use opentelemetry_api::Context as OtelContext;
use slog::Logger;
use slog::OwnedKV;
use slog::SendSyncRefUnwindSafeKV;

/// Values scoped to an operation, or to the whole process for the root context.
#[derive(Clone, Debug)]
pub struct Context {
    /// Point in time after which operations in this context should not commit changes.
    ///
    /// The value of `None` indicates the context has no deadline.
    pub deadline: Option<Instant>,

    /// Logger with contextual attributes attached to it.
    pub logger: Logger,
}

impl Context {
    /// Derive a new [`Context`] by making changes to the current one.
    pub fn derive(&self) -> ContextBuilder {
        ContextBuilder {
            deadline: self.deadline,
            logger: self.logger.clone(),
        }
    }

    /// Check if the context deadline, if any, has elapsed.
    pub fn deadline_exceeded(&self) -> bool {
        match self.deadline {
            None => false,
            Some(deadline) => Instant::now() >= deadline,
        }
    }

    /// Initialise a new root context with no values attached.
    pub fn root(logger: Logger) -> ContextBuilder {
        ContextBuilder {
            deadline: None,
            logger,
        }
    }
}

/// A builder for root and derived contexts.
pub struct ContextBuilder {
    deadline: Option<Instant>,
    logger: Logger,
}

impl ContextBuilder {
    /// Finalise the build process and return a new [`Context`].
    pub fn build(self) -> Context {
        Context {
            deadline: self.deadline,
            logger: self.logger,
        }
    }

    /// Bound the [`Context`] to complete within the given timeout from now.
    ///
    /// An earlier deadline inherited from the parent context is kept.
    pub fn deadline(mut self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        self.deadline = match self.deadline {
            Some(current) if current < deadline => Some(current),
            _ => Some(deadline),
        };
        self
    }

    /// Decorate the [`Context`]'s logger with the trace ID of the current OpenTelemetry span.
    pub fn log_trace(self) -> Self {
        let context = OtelContext::current();
        let span = context.span();
        let trace_id = span.span_context().trace_id();
        if trace_id == TraceId::INVALID {
            self
        } else {
            let trace_id = trace_id.to_string();
            self.log_values(slog::o!("trace_id" => trace_id))
        }
    }

    /// Update the [`Context`] logger to attach new log key/pair values.
    pub fn log_values<T>(mut self, entries: OwnedKV<T>) -> Self
    where
        T: SendSyncRefUnwindSafeKV + 'static,
    {
        self.logger = self.logger.new(entries);
        self
    }
}

#[cfg(any(test, feature = "test-fixture"))]
impl Context {
    /// Create an empty context useful for test.
    pub fn fixture() -> Context {
        let logger = Logger::root(slog::Discard, slog::o!());
        Context {
            deadline: None,
            logger,
        }
    }
}
