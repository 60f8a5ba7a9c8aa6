use std::time::Duration;

use crate::dispatcher::{HandlerRequest, HandlerResponse};

/// A hook pair around handler execution.
///
/// `before` may annotate the request (through `req.extensions`) or answer it
/// early by returning a response. `after` sees every response, including
/// early ones.
pub trait Middleware: Send + Sync {
    fn before(&self, _req: &mut HandlerRequest) -> Option<HandlerResponse> {
        None
    }
    fn after(&self, _req: &HandlerRequest, _res: &mut HandlerResponse, _latency: Duration) {}
}
