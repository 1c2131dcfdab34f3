//! Webhook endpoint.
//!
//! `POST /webhook` takes the service hook JSON as the raw request body and
//! answers with the dispatcher's status code and JSON body.

use axum::{
    extract::State,
    http::{header::CONTENT_TYPE, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Router,
};
use bytes::Bytes;

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::event::{WebhookRequest, WebhookResponse};
use crate::state::AppState;

/// Create webhook routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/webhook", post(receive))
}

async fn receive(State(state): State<AppState>, body: Bytes) -> WebhookResponse {
    match std::str::from_utf8(&body) {
        Ok(text) => state.dispatcher().handle(&WebhookRequest::json(text)).await,
        Err(e) => Dispatcher::respond(Err(DispatchError::BodyEncoding(format!(
            "body is not UTF-8: {e}"
        )))),
    }
}

impl IntoResponse for WebhookResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}
