use axum::http::HeaderValue;
use tracing::Instrument;

/// Middleware: injects a unique X-Request-Id into every response.
/// This allows clients to correlate errors with server logs.
pub async fn request_id(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let req_id = uuid::Uuid::new_v4().to_string();
    let mut resp = next
        .run(req)
        .instrument(tracing::info_span!("request", req_id = %req_id))
        .await;
    if let Ok(val) = HeaderValue::from_str(&req_id) {
        resp.headers_mut().insert("x-request-id", val);
    }
    resp
}

/// Middleware: injects security headers into every response.
pub async fn security_headers(
    req: axum::extract::Request,
    next: axum::middleware::Next,
) -> axum::response::Response {
    let mut resp = next.run(req).await;
    let headers = resp.headers_mut();

    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));

    // Attendance and roster data must not be cached by shared browsers.
    headers.insert("Cache-Control", HeaderValue::from_static("no-store"));

    // Pass tokens can ride in the query string; keep them out of Referer.
    headers.insert("Referrer-Policy", HeaderValue::from_static("no-referrer"));

    headers.remove("Server");

    resp
}
