pub mod context;
pub mod error;
pub mod fault;
pub mod method;
pub mod router;
pub mod trie;

pub use context::{Params, Request, Response};
pub use error::{RouteError, RouteResult};
pub use fault::{DiagnosticFn, FaultReport, HandlerResult};
pub use method::Method;
pub use router::{DispatchOutcome, Handler, Router, RouterBuilder, handler};
