use axum::{
    body::Body,
    http::{Response as HttpResponse, StatusCode},
    response::Response,
};
use notelens_protocol::serialize_json;
use serde::{Deserialize, Serialize};

/// Query parameters of `POST /api/run`.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RunParams {
    pub preset: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub profile: Option<String>,
}

/// Body of a 400 reply. Report outcomes, failures included, are always 200.
#[derive(Debug, Serialize)]
pub(crate) struct BadRequest {
    status: &'static str,
    #[serde(rename = "type")]
    category: &'static str,
    message: String,
}

impl BadRequest {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error",
            category: "bad_request",
            message: message.into(),
        }
    }
}

pub(crate) fn bad_request(message: impl Into<String>) -> Result<Response, StatusCode> {
    build_response(StatusCode::BAD_REQUEST, &BadRequest::new(message))
}

pub(crate) fn build_response<T: Serialize>(
    status: StatusCode,
    payload: &T,
) -> Result<Response, StatusCode> {
    let bytes = serialize_json(payload)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .into_bytes();

    HttpResponse::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Body::from(bytes))
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
