//! Per-request execution of the middleware chain.
//!
//! # State Machine
//! ```text
//! MATCHING ──(empty stack)──────────────────────────────▶ DONE (404)
//!     │
//!     ▼
//! RUNNING ──(Fault / panic)─────────────────────────────▶ DONE (500)
//!     │   ──(Continue, stack drained)───────────────────▶ DONE
//!     │   ──(Halt)──────────────────────────────────────▶ DONE
//!     └───(response finished by an entry)───────────────▶ DONE
//! ```
//!
//! # Design Decisions
//! - Entries run one at a time, in the order computed while matching
//! - The completion callback is reconciled between the explicit path and the
//!   response's finish notification, so it fires exactly once
//! - A panicking entry is caught and treated like a fault

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use futures_util::FutureExt;
use serde::Serialize;

use crate::http::{Request, Response};
use crate::manifest::RouteSpec;
use crate::observability::metrics;
use crate::routing::error::HandlerError;
use crate::routing::handler::{Advance, Flow, SharedHandler, SharedMiddleware};
use crate::routing::table::RouteTable;

use axum::http::StatusCode;

/// How a request reached DONE.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Nothing matched; a 404 was written.
    NotFound,
    /// An entry finalized the response.
    Finished,
    /// The chain ran out of entries without anyone finalizing the response.
    Drained,
    /// A middleware stopped the chain without finalizing the response.
    Halted,
    /// An entry faulted or panicked; a 500 was written.
    Faulted,
}

impl Completion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Completion::NotFound => "not_found",
            Completion::Finished => "finished",
            Completion::Drained => "drained",
            Completion::Halted => "halted",
            Completion::Faulted => "faulted",
        }
    }
}

/// Structured body for the responses the dispatcher writes itself.
#[derive(Debug, Serialize)]
struct ProblemBody<'a> {
    title: &'a str,
    detail: &'a str,
}

enum StackEntry {
    Middleware(SharedMiddleware),
    Handler(SharedHandler),
}

type CompletionCallback = Box<dyn FnOnce(Completion) + Send>;

/// Fires the caller's callback once, whichever path gets there first.
struct CompletionGuard {
    state: Mutex<GuardState>,
}

struct GuardState {
    callback: Option<CompletionCallback>,
    /// Reason to report when the response's finish notification arrives.
    pending: Option<Completion>,
    fired: Option<Completion>,
}

impl CompletionGuard {
    fn new(callback: impl FnOnce(Completion) + Send + 'static) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(GuardState {
                callback: Some(Box::new(callback)),
                pending: None,
                fired: None,
            }),
        })
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GuardState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record why the dispatcher is about to finish the response itself.
    fn expect(&self, completion: Completion) {
        self.lock().pending = Some(completion);
    }

    /// Called from the response's finish notification.
    fn finished(&self) -> bool {
        let reason = self.lock().pending.take().unwrap_or(Completion::Finished);
        self.fire(reason)
    }

    /// Returns false if the callback had already fired.
    fn fire(&self, completion: Completion) -> bool {
        let callback = {
            let mut state = self.lock();
            match state.callback.take() {
                Some(callback) => {
                    state.fired = Some(completion);
                    callback
                }
                None => return false,
            }
        };
        callback(completion);
        true
    }

    fn fired(&self) -> Option<Completion> {
        self.lock().fired
    }
}

/// Executes requests against a flat routing table.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    table: Arc<RouteTable>,
}

impl Dispatcher {
    pub fn new(table: RouteTable) -> Self {
        Self {
            table: Arc::new(table),
        }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Describe the registered handlers for the manifest.
    pub fn route_manifest(&self) -> Vec<RouteSpec> {
        self.table.route_manifest()
    }

    /// Run `req` through the matching chain.
    ///
    /// `on_complete` is invoked exactly once. The returned future resolves when
    /// the last entry has returned, which may be after `on_complete` fired if an
    /// entry keeps working after finalizing the response.
    pub async fn handle<F>(&self, req: Request, res: Response, on_complete: F) -> Completion
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let start = Instant::now();
        let method = req.method().to_string();
        let route = req.route().to_string();

        let guard = {
            let route = route.clone();
            let method = method.clone();
            CompletionGuard::new(move |completion: Completion| {
                tracing::debug!(
                    method = %method,
                    route = %route,
                    outcome = completion.as_str(),
                    "Finished handling request"
                );
                on_complete(completion);
            })
        };

        {
            let guard = guard.clone();
            res.on_finish(move || {
                guard.finished();
            });
        }

        // MATCHING
        let mut stack: Vec<StackEntry> = self
            .table
            .applicable_middleware(&route)
            .into_iter()
            .map(StackEntry::Middleware)
            .collect();
        if let Some(handler) = self.table.handler(&route, req.method()) {
            stack.push(StackEntry::Handler(handler.clone()));
        }

        let explicit = if stack.is_empty() {
            tracing::debug!(method = %method, route = %route, "No middleware or handler matched");
            guard.expect(Completion::NotFound);
            res.set_status(StatusCode::NOT_FOUND);
            res.json(&ProblemBody {
                title: "Page not found",
                detail: &route,
            });
            Completion::NotFound
        } else {
            self.run(stack, &req, &res, &guard).await
        };

        // The finish notification may already have fired (404, 500, or an entry
        // answering); in that case this is the late duplicate and is ignored.
        if !guard.fire(explicit) {
            tracing::trace!(route = %route, "Completion already signalled");
        }

        let completion = guard.fired().unwrap_or(explicit);
        metrics::record_dispatch(&method, res.status().as_u16(), completion.as_str(), start);
        completion
    }

    // RUNNING
    async fn run(
        &self,
        stack: Vec<StackEntry>,
        req: &Request,
        res: &Response,
        guard: &CompletionGuard,
    ) -> Completion {
        let total = stack.len();
        for (position, entry) in stack.into_iter().enumerate() {
            if res.is_finished() {
                tracing::debug!(
                    route = %req.route(),
                    skipped = total - position,
                    "Response already finished, ignoring late advance"
                );
                return Completion::Finished;
            }

            let flow = match entry {
                StackEntry::Handler(handler) => {
                    let call = handler.call(req.clone(), res.clone());
                    AssertUnwindSafe(call)
                        .catch_unwind()
                        .await
                        .map(|()| Flow::Continue)
                }
                StackEntry::Middleware(middleware) => {
                    let call = middleware.call(req.clone(), res.clone(), Advance::new());
                    AssertUnwindSafe(call).catch_unwind().await
                }
            };

            let flow = flow.unwrap_or_else(|panic| {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                Flow::Fault(HandlerError::Panicked(message))
            });

            match flow {
                Flow::Continue => continue,
                Flow::Halt => {
                    return if res.is_finished() {
                        Completion::Finished
                    } else {
                        Completion::Halted
                    };
                }
                Flow::Fault(error) => return self.fault(req, res, guard, error),
            }
        }

        if res.is_finished() {
            Completion::Finished
        } else {
            tracing::debug!(route = %req.route(), "Chain drained without a finished response");
            Completion::Drained
        }
    }

    fn fault(
        &self,
        req: &Request,
        res: &Response,
        guard: &CompletionGuard,
        error: HandlerError,
    ) -> Completion {
        if res.is_finished() {
            tracing::warn!(
                route = %req.route(),
                error = %error,
                "Fault raised after the response was finished, ignoring"
            );
            return Completion::Finished;
        }
        tracing::error!(
            method = %req.method(),
            route = %req.route(),
            error = %error,
            "Request handling failed"
        );
        let detail = error.to_string();
        guard.expect(Completion::Faulted);
        res.set_status(StatusCode::INTERNAL_SERVER_ERROR);
        res.json(&ProblemBody {
            title: "Internal server error",
            detail: &detail,
        });
        Completion::Faulted
    }
}
