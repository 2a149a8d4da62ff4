//! A `request_id` span on every HTTP request (§6.2), the axum equivalent of
//! the `submission_id`/`worker_name` fields the worker loop attaches to its
//! own `tracing` spans.

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::Instrument;
use uuid::Uuid;

pub async fn request_id_span(request: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!(
        "http_request",
        %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        tracing::info!("request started");
        let response = next.run(request).await;
        tracing::info!(status = %response.status(), "request finished");
        response
    }
    .instrument(span)
    .await
}
