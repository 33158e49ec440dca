//! Per-request log aggregation.
//!
//! # Responsibilities
//! - Capture request metadata once, at request start
//! - Accumulate fields and errors without ever overwriting a key
//! - Seal the record with the response and hand it to a sink
//!
//! # Design Decisions
//! - Values are converted to JSON on append, through a depth-bounded
//!   serializer, so the record itself is always serializable
//! - Appends and finish never return errors; failures go to local output
//! - A second finish is ignored

pub mod bounded;
pub mod envelope;
pub mod logger;
pub mod payload;
pub mod record;
pub mod request;

pub use bounded::{to_bounded_value, SerializeError, CIRCULAR_MARKER};
pub use logger::{LoggerSettings, RequestLogger};
pub use payload::ResponsePayload;
pub use record::LogRecord;
pub use request::RequestInfo;
