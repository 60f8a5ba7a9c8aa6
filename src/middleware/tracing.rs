use std::cell::RefCell;
use std::time::Duration;

use tracing::{field, info, info_span, span::EnteredSpan};

use super::Middleware;
use crate::dispatcher::{HandlerRequest, HandlerResponse};

thread_local! {
    // Dispatch is synchronous, so before and after run on the same thread.
    static SPAN_GUARD: RefCell<Option<EnteredSpan>> = const { RefCell::new(None) };
}

/// Opens a `request` span in `before` and closes it in `after`, recording
/// the response status and latency.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn before(&self, req: &mut HandlerRequest) -> Option<HandlerResponse> {
        let span = info_span!(
            "request",
            request_id = %req.request_id,
            method = %req.method,
            host = req.host.as_deref().unwrap_or(""),
            path = %req.path,
            status = field::Empty,
            latency_ms = field::Empty,
        );
        let entered = span.entered();
        SPAN_GUARD.with(|g| *g.borrow_mut() = Some(entered));
        None
    }

    fn after(&self, req: &HandlerRequest, res: &mut HandlerResponse, latency: Duration) {
        let guard = SPAN_GUARD.with(|g| g.borrow_mut().take());
        if let Some(span) = guard {
            span.record("status", res.status);
            span.record("latency_ms", latency.as_millis() as u64);
            info!(
                request_id = %req.request_id,
                status = res.status,
                latency_ms = latency.as_millis() as u64,
                "Request completed"
            );
        }
    }
}
