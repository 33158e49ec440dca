//! Request logger middleware.
//!
//! Wires the two host hooks around every request:
//! `on_request` builds and attaches the logger before the handler runs,
//! `on_response` finishes it when the response is ready. The handler runs
//! inside `context::scope`, so `context::log_field` works anywhere below it.

use std::sync::Arc;

use axum::{
    body::{Body, Bytes, HttpBody},
    extract::{FromRequestParts, RawPathParams, Request, State},
    middleware::{self, Next},
    response::Response,
    Router,
};
use futures_util::{stream, StreamExt};
use serde_json::{Map, Value};

use crate::aggregator::{LoggerSettings, RequestInfo, RequestLogger, ResponsePayload};
use crate::context;

/// Header carrying an upstream correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

const NOT_CAPTURED: &str = "[body not captured]";

/// Attach the request logger middleware to every route of `router`.
///
/// Uses `route_layer` so path parameters are available to the logger; add
/// routes before calling this. Requests that match no route (the 404
/// fallback) bypass the layer and produce no record.
pub fn install<S>(router: Router<S>, settings: Arc<LoggerSettings>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.route_layer(middleware::from_fn_with_state(
        settings,
        request_logger_middleware,
    ))
}

/// Middleware function: pre-handling hook, scoped handler, response hook.
pub async fn request_logger_middleware(
    State(settings): State<Arc<LoggerSettings>>,
    request: Request,
    next: Next,
) -> Response {
    let (request, logger) = on_request(request, &settings).await;
    let response = context::scope(logger.clone(), next.run(request)).await;
    on_response(
        Some(&logger),
        response,
        settings.config().capture.max_body_bytes,
    )
    .await
}

/// Pre-handling hook: build the logger and attach it to the request.
///
/// Skip methods (pre-flight requests by default) get a disabled logger.
pub async fn on_request(request: Request, settings: &LoggerSettings) -> (Request, RequestLogger) {
    let capture = &settings.config().capture;

    if capture.skips(request.method().as_str()) {
        let mut request = request;
        let logger = RequestLogger::disabled();
        request.extensions_mut().insert(logger.clone());
        return (request, logger);
    }

    let (mut parts, body) = request.into_parts();

    let mut info = RequestInfo::new(parts.method.as_str(), parts.uri.to_string());
    if let Some(id) = parts
        .headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
    {
        info = info.with_id(id);
    }

    let params = match RawPathParams::from_request_parts(&mut parts, &()).await {
        Ok(raw) => raw
            .iter()
            .map(|(name, value)| (name.to_string(), Value::String(value.to_string())))
            .collect::<Map<String, Value>>(),
        Err(_) => Map::new(),
    };
    info = info.with_params(Value::Object(params));

    let (body, captured) = capture_body(body, capture.max_body_bytes).await;
    info = info.with_body(captured.map(|bytes| parse_body(&bytes)).unwrap_or(Value::Null));

    let logger = RequestLogger::new(info, settings);
    parts.extensions.insert(logger.clone());
    (Request::from_parts(parts, body), logger)
}

/// Response hook: finish the logger with the outgoing payload.
///
/// The response is returned with the same status, headers and bytes.
/// Hosts driving the hooks by hand pass `None` when no logger was created
/// for the request; the response is then forwarded with a warning.
pub async fn on_response(
    logger: Option<&RequestLogger>,
    response: Response,
    max_body_bytes: usize,
) -> Response {
    let status = response.status().as_u16();

    let Some(logger) = logger else {
        tracing::warn!(status, "Request logger is not installed for this request");
        return response;
    };
    if !logger.is_enabled() {
        return response;
    }

    let (parts, body) = response.into_parts();
    let (body, captured) = capture_body(body, max_body_bytes).await;

    let payload = match captured {
        Some(bytes) => ResponsePayload::from_bytes(&bytes),
        None => ResponsePayload::Json(Value::String(NOT_CAPTURED.to_string())),
    };
    let is_error = payload.is_error_marked();
    logger.finish(payload, is_error, status);

    Response::from_parts(parts, body)
}

/// Buffer `body` when its size is known and within `limit`.
///
/// Returns the body to forward and the captured bytes, if any. Bodies of
/// unknown or excessive size are forwarded untouched. A stream error is
/// replayed to the receiver after the chunks read so far.
async fn capture_body(body: Body, limit: usize) -> (Body, Option<Bytes>) {
    let within_limit = body
        .size_hint()
        .upper()
        .is_some_and(|upper| upper <= limit as u64);
    if !within_limit {
        return (body, None);
    }

    let mut data = body.into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut len = 0usize;

    while let Some(frame) = data.next().await {
        match frame {
            Ok(chunk) => {
                len += chunk.len();
                chunks.push(chunk);
                if len > limit {
                    // The size hint lied; pass the rest through unbuffered.
                    let head = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>));
                    return (Body::from_stream(head.chain(data)), None);
                }
            }
            Err(error) => {
                tracing::warn!(error = %error, "Failed to buffer body for request log");
                let replay = chunks
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(error)));
                return (Body::from_stream(stream::iter(replay)), None);
            }
        }
    }

    let bytes = match chunks.len() {
        0 => Bytes::new(),
        1 => chunks.swap_remove(0),
        _ => {
            let mut buf = Vec::with_capacity(len);
            for chunk in &chunks {
                buf.extend_from_slice(chunk);
            }
            Bytes::from(buf)
        }
    };
    (Body::from(bytes.clone()), Some(bytes))
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())),
        Err(_) => Value::String(format!("[binary: {} bytes]", bytes.len())),
    }
}
