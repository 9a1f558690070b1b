//! HTTP gateway over the action layer.
//!
//! | Route | Action |
//! |---|---|
//! | `GET /healthz` | liveness, answers `ok` |
//! | `GET /metadata?source=URL` | `metadata({url})` as JSON |
//! | `GET /stats?source=URL` | `stats({url})` as JSON |
//! | `POST /process?source=URL` | body `{"steps": [...]}`; file info JSON or the encoded image |
//!
//! Failures become a JSON body `{name, message, code, type, data}` with the
//! error's code as HTTP status.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::error::ServiceError;
use crate::fetch::Fetch;
use crate::imaging::ImageEngine;
use crate::pipeline::ProcessOutcome;
use crate::service::{ActionRequest, ActionResponse, ImageService};

#[derive(Debug, Deserialize)]
struct SourceQuery {
    source: Option<String>,
}

impl SourceQuery {
    fn params(self) -> Result<Value, GatewayError> {
        match self.source {
            Some(url) => Ok(json!({ "url": url })),
            None => Err(GatewayError(ServiceError::Validation(
                "missing source query parameter".to_string(),
            ))),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    name: &'a str,
    message: String,
    code: u16,
    #[serde(rename = "type")]
    kind: &'a str,
    data: Map<String, Value>,
}

/// A [`ServiceError`] on its way to an HTTP client.
pub struct GatewayError(pub ServiceError);

impl From<ServiceError> for GatewayError {
    fn from(error: ServiceError) -> Self {
        GatewayError(error)
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let error = self.0;
        let code = error.code();
        let status = StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        warn!(status = code, kind = error.kind(), error = %error, "request failed");
        let body = ErrorBody {
            name: error.name(),
            message: error.to_string(),
            code,
            kind: error.kind(),
            data: error.data(),
        };
        (status, Json(body)).into_response()
    }
}

/// Turn an action result into a response.
///
/// Stream output is polled once before the headers go out, so a failed encode
/// still reaches the client as an error body instead of a truncated 200.
async fn respond(response: ActionResponse) -> Result<Response, GatewayError> {
    Ok(match response {
        ActionResponse::Metadata(metadata) => Json(metadata).into_response(),
        ActionResponse::Stats(stats) => Json(stats).into_response(),
        ActionResponse::Process(ProcessOutcome::File(info)) => Json(info).into_response(),
        ActionResponse::Process(ProcessOutcome::Stream(output)) => {
            let content_type = output
                .format
                .map(|f| f.mime_type())
                .unwrap_or("application/octet-stream");
            let mut chunks = output.stream;
            let first = match chunks.next().await {
                Some(Err(error)) => return Err(ServiceError::from_stream_error(error).into()),
                first => first,
            };
            (
                [(header::CONTENT_TYPE, content_type)],
                Body::from_stream(stream::iter(first).chain(chunks)),
            )
                .into_response()
        }
    })
}

type SharedService<E, F> = Arc<ImageService<E, F>>;

async fn dispatch<E: ImageEngine, F: Fetch>(
    service: &ImageService<E, F>,
    request: ActionRequest,
) -> Result<Response, GatewayError> {
    let response = service.call(request).await?;
    respond(response).await
}

async fn metadata<E: ImageEngine, F: Fetch>(
    State(service): State<SharedService<E, F>>,
    Query(query): Query<SourceQuery>,
) -> Result<Response, GatewayError> {
    let request = ActionRequest {
        action: "metadata".to_string(),
        params: query.params()?,
        meta: Map::new(),
    };
    dispatch(&service, request).await
}

async fn stats<E: ImageEngine, F: Fetch>(
    State(service): State<SharedService<E, F>>,
    Query(query): Query<SourceQuery>,
) -> Result<Response, GatewayError> {
    let request = ActionRequest {
        action: "stats".to_string(),
        params: query.params()?,
        meta: Map::new(),
    };
    dispatch(&service, request).await
}

async fn process<E: ImageEngine, F: Fetch>(
    State(service): State<SharedService<E, F>>,
    Query(query): Query<SourceQuery>,
    Json(meta): Json<Map<String, Value>>,
) -> Result<Response, GatewayError> {
    let request = ActionRequest {
        action: "process".to_string(),
        params: query.params()?,
        meta,
    };
    dispatch(&service, request).await
}

/// Build the gateway routes around a shared service.
pub fn router<E: ImageEngine, F: Fetch>(service: SharedService<E, F>) -> Router {
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/metadata", get(metadata::<E, F>))
        .route("/stats", get(stats::<E, F>))
        .route("/process", post(process::<E, F>))
        .with_state(service)
}

/// Serve the gateway until the listener fails.
pub async fn serve<E: ImageEngine, F: Fetch>(
    listener: TcpListener,
    service: SharedService<E, F>,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "gateway listening");
    }
    axum::serve(listener, router(service)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AcquisitionError;
    use crate::imaging::{EngineError, OutputFormat};
    use crate::pipeline::ProcessedStream;
    use crate::test_helpers::chunked_stream;
    use axum::body::to_bytes;
    use bytes::Bytes;

    async fn body_json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn acquisition_error_body() {
        let response = GatewayError(AcquisitionError::default().into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["name"], "AcquisitionError");
        assert_eq!(body["message"], "Stream could not be acquired");
        assert_eq!(body["code"], 500);
        assert_eq!(body["type"], "STREAM_ACQUISITION_ERROR");
        assert_eq!(body["data"], json!({}));
    }

    #[tokio::test]
    async fn engine_error_is_unprocessable() {
        let error = ServiceError::Engine(EngineError::UnknownOperation("sparkle".into()));
        let response = GatewayError(error).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = body_json(response).await;
        assert_eq!(body["type"], "ENGINE_ERROR");
        assert!(body["message"].as_str().unwrap().contains("sparkle"));
    }

    #[tokio::test]
    async fn failed_encode_becomes_error_response() {
        let output = ProcessedStream {
            format: Some(OutputFormat::Png),
            stream: Box::pin(stream::once(async {
                Err::<Bytes, _>(std::io::Error::other(EngineError::UnsupportedFormat(
                    "unrecognised input".into(),
                )))
            })),
        };
        let err = respond(ActionResponse::Process(ProcessOutcome::Stream(output)))
            .await
            .err()
            .expect("failed encode must not answer 200");
        assert!(matches!(err.0, ServiceError::Engine(EngineError::UnsupportedFormat(_))));
    }

    #[tokio::test]
    async fn streamed_body_keeps_every_chunk() {
        let output = ProcessedStream {
            format: None,
            stream: chunked_stream(b"encoded image bytes", 4),
        };
        let response = respond(ActionResponse::Process(ProcessOutcome::Stream(output)))
            .await
            .ok()
            .expect("stream output answers 200");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(bytes.as_ref(), b"encoded image bytes");
    }

    #[test]
    fn missing_source_is_validation_error() {
        let err = SourceQuery { source: None }.params().err().unwrap();
        assert!(matches!(err.0, ServiceError::Validation(_)));
    }
}
