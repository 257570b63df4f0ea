use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::Response};

/// Logs every request with its status and how long the handler took to
/// produce headers. Streamed bodies keep flowing after this returns.
pub async fn log_requests(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    log::debug!("→ {method} {path}");

    let response = next.run(req).await;

    log::info!(
        "{method} {path} {} ({}ms)",
        response.status().as_u16(),
        start.elapsed().as_millis()
    );

    response
}
