//! HTML forms can only `GET` and `POST`. A `POST` with `_method=PUT`,
//! `_method=PATCH` or `_method=DELETE` in its query string is rewritten to that
//! method before routing, so the edit and delete forms reach their routes.

use axum::extract::Request;
use axum::http::Method;

/// Query parameter naming the intended method.
pub const METHOD_PARAM: &str = "_method";

/// Rewrite the request method if the query string asks for it.
///
/// Must run before the router (see `routes::app`) because routing is decided
/// by the method.
pub fn override_method(mut request: Request) -> Request {
    if request.method() != Method::POST {
        return request;
    }

    if let Some(method) = request.uri().query().and_then(requested_method) {
        tracing::debug!(%method, "Method override");
        *request.method_mut() = method;
    }
    request
}

fn requested_method(query: &str) -> Option<Method> {
    let (_, value) = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == METHOD_PARAM)?;

    match value.to_ascii_uppercase().as_str() {
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        _ => None,
    }
}
