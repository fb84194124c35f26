//! Request middleware: access logging, CORS, panic recovery, and bearer
//! authentication.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Once};
use std::time::Instant;

use axum::extract::{Request, State};
use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    AUTHORIZATION,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures::FutureExt;

use super::error::{ApiError, INTERNAL_ERROR_MESSAGE};
use crate::auth::{AuthError, TokenAuthority};

const ALLOWED_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const ALLOWED_HEADERS: &str = "Accept, Authorization, Content-Type, X-CSRF-Token";

/// Log method, path, status, and latency of every request.
pub async fn access_log(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();

    let response = next.run(req).await;

    tracing::info!(
        %method,
        %path,
        status = response.status().as_u16(),
        latency_ms = started.elapsed().as_millis(),
        "request"
    );
    response
}

/// Permissive CORS. Preflight requests are answered here with 204 and never
/// reach routing or authentication.
pub async fn cors(req: Request, next: Next) -> Response {
    let mut response = if req.method() == Method::OPTIONS {
        StatusCode::NO_CONTENT.into_response()
    } else {
        next.run(req).await
    };
    allow_cross_origin(response.headers_mut());
    response
}

fn allow_cross_origin(headers: &mut HeaderMap) {
    headers.insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static(ALLOWED_METHODS),
    );
    headers.insert(
        ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static(ALLOWED_HEADERS),
    );
}

thread_local! {
    static PANIC_STACK: RefCell<Option<String>> = const { RefCell::new(None) };
}

/// Record the stack of every panic on the panicking thread, then defer to
/// the previously installed hook. `catch_panic` picks the stack up once the
/// unwind reaches it. Installing more than once is a no-op.
pub fn install_panic_hook() {
    static INSTALL: Once = Once::new();
    INSTALL.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let stack = Backtrace::force_capture().to_string();
            // Thread-locals are gone while a thread shuts down.
            PANIC_STACK.try_with(|slot| *slot.borrow_mut() = Some(stack)).ok();
            previous(info);
        }));
    });
}

/// Take the stack recorded for the most recent panic on this thread.
#[must_use]
pub fn take_panic_stack() -> Option<String> {
    PANIC_STACK.with(|slot| slot.borrow_mut().take())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// The log line for a panic recovered while handling `method path`.
fn panic_report(method: &Method, path: &str, message: &str, stack: Option<&str>) -> String {
    format!(
        "panic while handling {method} {path}: {message}\nstack:\n{}",
        stack.unwrap_or("<not captured; panic hook not installed>")
    )
}

/// Turn a panic anywhere below this layer into a 500 envelope carrying the
/// CORS headers. The connection and every other request carry on.
pub async fn catch_panic(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    match AssertUnwindSafe(next.run(req)).catch_unwind().await {
        Ok(response) => response,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            let stack = take_panic_stack();
            tracing::error!("{}", panic_report(&method, &path, &message, stack.as_deref()));
            let mut response = ApiError::Internal(INTERNAL_ERROR_MESSAGE).into_response();
            allow_cross_origin(response.headers_mut());
            response
        }
    }
}

/// Verify the bearer token and attach the caller's `Principal` to the
/// request. Any failure ends the request with 401.
pub async fn authenticate(
    State(tokens): State<Arc<TokenAuthority>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let verified = match req.headers().get(AUTHORIZATION) {
        None => Err(AuthError::MissingCredential),
        Some(value) => value
            .to_str()
            .map_err(|_| AuthError::MalformedCredential)
            .and_then(|header| tokens.verify_header(Some(header))),
    };

    let principal = verified.inspect_err(|err| {
        tracing::debug!(
            "rejected credentials for {} {}: {err}",
            req.method(),
            req.uri().path()
        );
    })?;

    let subject = principal.subject_id;
    if !principal.attach(req.extensions_mut()) {
        tracing::warn!("principal already attached, keeping the first (subject {subject})");
    }
    Ok(next.run(req).await)
}
