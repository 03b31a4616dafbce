//! Per-operation request context: a correlation id plus a `tracing` span
//! carrying it, entered for the lifetime of one handler invocation.

use tracing::Span;
use uuid::Uuid;

/// Correlates log lines emitted while handling one turn.
#[derive(Debug, Clone)]
pub struct RequestContext {
    component: String,
    operation: Option<String>,
    correlation_id: Uuid,
}

impl RequestContext {
    /// Start a context for `component` (e.g. `"kernel"`, `"reminders"`).
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            operation: None,
            correlation_id: Uuid::new_v4(),
        }
    }

    /// Attach an operation name (e.g. `"enqueue_inbound"`, `"pump_tick"`).
    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// The correlation id assigned to this context.
    #[must_use]
    pub fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Build the `tracing` span for this context. Callers enter it around
    /// the operation they want correlated.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "request",
            component = %self.component,
            operation = self.operation.as_deref().unwrap_or(""),
            correlation_id = %self.correlation_id,
        )
    }

    /// Enter the span, returning a guard that exits it on drop.
    #[must_use]
    pub fn enter(&self) -> RequestGuard {
        RequestGuard { _entered: self.span().entered() }
    }
}

/// RAII guard keeping a [`RequestContext`]'s span entered.
pub struct RequestGuard {
    _entered: tracing::span::EnteredSpan,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_carries_operation() {
        let ctx = RequestContext::new("kernel").with_operation("pump_tick");
        assert_eq!(ctx.operation.as_deref(), Some("pump_tick"));
    }

    #[test]
    fn each_context_gets_a_distinct_correlation_id() {
        let a = RequestContext::new("kernel");
        let b = RequestContext::new("kernel");
        assert_ne!(a.correlation_id(), b.correlation_id());
    }
}
