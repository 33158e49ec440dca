//! Ambient request context.
//!
//! # Responsibilities
//! - Bind a request's logger to the async call tree handling it
//! - Let code without a handle find "the current request's logger"
//! - Carry the binding into subtasks spawned with [`spawn`]
//!
//! # Design Decisions
//! - Backed by a tokio task-local: the binding lives in the future, so it
//!   follows the chain across every `.await` and worker-thread migration,
//!   and interleaved requests never observe each other's logger
//! - `tokio::spawn` does not inherit task-locals; [`spawn`] re-binds
//! - `log_*` helpers are no-ops outside a request; `require_current` is the
//!   only loud failure

use std::future::Future;

use serde::Serialize;
use thiserror::Error;
use tokio::task::JoinHandle;

use crate::aggregator::RequestLogger;

tokio::task_local! {
    static CURRENT: RequestLogger;
}

/// Errors from context lookups.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContextError {
    /// No logger is bound to the calling task.
    #[error("no request logger in context; make sure you are inside a request scope")]
    NoActiveContext,
}

/// Run `future` with `logger` bound as the current logger.
pub async fn scope<F: Future>(logger: RequestLogger, future: F) -> F::Output {
    CURRENT.scope(logger, future).await
}

/// Run `f` with `logger` bound as the current logger.
pub fn sync_scope<R>(logger: RequestLogger, f: impl FnOnce() -> R) -> R {
    CURRENT.sync_scope(logger, f)
}

/// The logger bound to the calling task, if any.
pub fn current() -> Option<RequestLogger> {
    CURRENT.try_with(RequestLogger::clone).ok()
}

/// The logger bound to the calling task.
pub fn require_current() -> Result<RequestLogger, ContextError> {
    current().ok_or(ContextError::NoActiveContext)
}

/// Append a field to the current request's record; no-op outside a request.
pub fn log_field<T: Serialize + ?Sized>(key: &str, value: &T) {
    let _ = CURRENT.try_with(|logger| logger.append_field(key, value));
}

/// Append an error to the current request's record; no-op outside a request.
pub fn log_error<T: Serialize + ?Sized>(key: &str, value: &T, code: Option<&str>) {
    let _ = CURRENT.try_with(|logger| logger.append_error(key, value, code));
}

/// Append an error and its source chain; no-op outside a request.
pub fn log_failure(key: &str, error: &(dyn std::error::Error + 'static), code: Option<&str>) {
    let _ = CURRENT.try_with(|logger| logger.append_failure(key, error, code));
}

/// Spawn a task that inherits the caller's logger binding.
pub fn spawn<F>(future: F) -> JoinHandle<F::Output>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    match current() {
        Some(logger) => tokio::spawn(CURRENT.scope(logger, future)),
        None => tokio::spawn(future),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::{LoggerSettings, RequestInfo};
    use crate::config::LoggerConfig;
    use serde_json::json;

    fn logger(id: &str) -> RequestLogger {
        let settings = LoggerSettings::new(LoggerConfig::default());
        RequestLogger::new(RequestInfo::new("GET", "/").with_id(id), &settings)
    }

    async fn nested_helper(depth: u32) {
        if depth > 0 {
            tokio::task::yield_now().await;
            Box::pin(nested_helper(depth - 1)).await;
        } else {
            log_field("deepest", &true);
        }
    }

    #[test]
    fn test_nothing_bound_outside_scope() {
        assert!(current().is_none());
        assert_eq!(require_current().unwrap_err(), ContextError::NoActiveContext);
        log_field("ignored", &1);
        log_error("ignored", &1, None);
    }

    #[test]
    fn test_sync_scope() {
        let logger = logger("sync");
        sync_scope(logger.clone(), || {
            assert_eq!(require_current().unwrap().request_id(), Some("sync"));
            log_field("inside", "sync");
        });
        assert!(current().is_none());
        assert_eq!(logger.snapshot().unwrap().fields["inside"], json!("sync"));
    }

    #[tokio::test]
    async fn test_binding_survives_awaits() {
        let logger = logger("async");
        scope(logger.clone(), async {
            log_field("before", &1);
            nested_helper(5).await;
            log_error("after", "oops", Some("E1"));
        })
        .await;

        let record = logger.snapshot().unwrap();
        assert_eq!(record.fields["before"], 1);
        assert_eq!(record.fields["deepest"], true);
        assert_eq!(record.errors.unwrap()["after"]["code"], "E1");
    }

    #[tokio::test]
    async fn test_spawn_inherits_binding() {
        let logger = logger("parent");
        scope(logger.clone(), async {
            spawn(async { log_field("from-child", &true) }).await.unwrap();
            tokio::spawn(async { assert!(current().is_none()) }).await.unwrap();
        })
        .await;

        assert_eq!(logger.snapshot().unwrap().fields["from-child"], true);
    }

    #[tokio::test]
    async fn test_spawn_outside_scope() {
        let bound = spawn(async { current().is_some() }).await.unwrap();
        assert!(!bound);
    }

    #[tokio::test]
    async fn test_scope_returns_body_output() {
        let value = scope(logger("ret"), async { 42 }).await;
        assert_eq!(value, 42);
    }
}
