//! Handler and middleware contracts.
//!
//! # Design Decisions
//! - Handlers are terminal: they get the request and response, never the continuation
//! - Middleware gets an [`Advance`] token that is consumed to continue or fault,
//!   so the continuation cannot be used twice
//! - Plain async closures implement both traits

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::http::{Request, Response};
use crate::routing::error::HandlerError;

/// A terminal request handler.
pub trait Handler: Send + Sync + 'static {
    fn call(&self, req: Request, res: Response) -> BoxFuture<'static, ()>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request, Response) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn call(&self, req: Request, res: Response) -> BoxFuture<'static, ()> {
        Box::pin(self(req, res))
    }
}

/// A middleware function sitting in front of handlers.
pub trait Middleware: Send + Sync + 'static {
    fn call(&self, req: Request, res: Response, next: Advance) -> BoxFuture<'static, Flow>;
}

impl<F, Fut> Middleware for F
where
    F: Fn(Request, Response, Advance) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Flow> + Send + 'static,
{
    fn call(&self, req: Request, res: Response, next: Advance) -> BoxFuture<'static, Flow> {
        Box::pin(self(req, res, next))
    }
}

pub type SharedHandler = Arc<dyn Handler>;
pub type SharedMiddleware = Arc<dyn Middleware>;

/// What a middleware decided to do with the rest of the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    /// Run the next entry.
    Continue,
    /// Stop here. The middleware has answered (or chose not to delegate).
    Halt,
    /// Abort the chain with an error.
    Fault(HandlerError),
}

/// Single-use continuation handed to each middleware.
#[derive(Debug)]
#[must_use = "a middleware must advance, fault or halt"]
pub struct Advance {
    _private: (),
}

impl Advance {
    pub(crate) fn new() -> Self {
        Self { _private: () }
    }

    /// Hand the request to the next entry in the chain.
    pub fn advance(self) -> Flow {
        Flow::Continue
    }

    /// Abort the chain; the dispatcher answers with a 500.
    pub fn fault(self, error: impl Into<HandlerError>) -> Flow {
        Flow::Fault(error.into())
    }

    /// Stop the chain without delegating further.
    pub fn halt(self) -> Flow {
        Flow::Halt
    }
}
