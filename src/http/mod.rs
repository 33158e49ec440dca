//! HTTP host integration.
//!
//! # Data Flow
//! ```text
//! Request
//!     → middleware.rs on_request (build RequestInfo, create logger,
//!       attach to extensions)
//!     → handler, inside context::scope
//!         → extract.rs (RequestLogger extractor) or context::log_*
//!     → middleware.rs on_response (buffer body, detect isError, finish)
//!     → Response forwarded unchanged
//! ```

pub mod extract;
pub mod middleware;

pub use extract::MissingRequestLogger;
pub use middleware::{install, on_request, on_response, request_logger_middleware, X_REQUEST_ID};
