//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Registration (before startup):
//!     Service::get / use_fn / mount
//!     → tree.rs (RouteTree per service, nested trees via mount points)
//!
//! Startup (once):
//!     RouteTree::flatten
//!     → table.rs (flat RouteTable: handlers + middleware functions)
//!     → dispatcher.rs (Dispatcher over Arc<RouteTable>)
//!
//! Per request:
//!     Dispatcher::handle
//!     → match middleware by mount route (segment boundary) + handler by (route, method)
//!     → run the chain one entry at a time
//!     → on_complete, exactly once
//! ```
//!
//! # Design Decisions
//! - Builder and table are separate types; the table is immutable
//! - No path parsing: requests arrive with their dispatch route already resolved
//! - Deterministic: insertion order everywhere

pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod route;
pub mod table;
pub mod tree;

pub use dispatcher::{Completion, Dispatcher};
pub use error::{ConfigurationError, HandlerError};
pub use handler::{Advance, Flow, Handler, Middleware, SharedHandler, SharedMiddleware};
pub use route::Route;
pub use table::{HandlerEntry, RouteTable};
pub use tree::{MiddlewareEntry, RouteTree};
