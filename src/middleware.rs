use crate::errors::ServerError;
use anyhow::{Result, anyhow};
use axum::{
    extract::{Request, State},
    http::{
        HeaderMap, StatusCode,
        header::{CONTENT_LENGTH, CONTENT_TYPE},
    },
    middleware::Next,
    response::Response,
};

/// Largest accepted request body, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct BodyLimit(pub usize);

fn reject(status: StatusCode, message: &'static str) -> Result<Response, ServerError> {
    Ok(Response::builder()
        .status(status)
        .body(message.into())
        .map_err(|e| anyhow!("could not create response: {}", e))?)
}

pub async fn validate_content_type(
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let content_type = match headers.get(CONTENT_TYPE) {
        Some(ct) => ct,
        None => return reject(StatusCode::BAD_REQUEST, "Missing Content-Type header"),
    };

    let content_type = content_type
        .to_str()
        .map_err(|e| anyhow!("could not convert Content-Type header to string: {}", e))?;

    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if media_type != "application/json" {
        return reject(StatusCode::BAD_REQUEST, "Invalid Content-Type header");
    }

    Ok(next.run(request).await)
}

/// Rejects requests whose declared length exceeds the limit before the body is read.
pub async fn validate_body_length(
    State(BodyLimit(limit)): State<BodyLimit>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let declared = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());

    match declared {
        Some(length) if length > limit => {
            reject(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
        }
        _ => Ok(next.run(request).await),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Router,
        body::Body,
        http::Request,
        middleware::{from_fn, from_fn_with_state},
        routing::post,
    };
    use tower::ServiceExt;

    fn content_type_app() -> Router {
        Router::new()
            .route("/", post("OK"))
            .layer(from_fn(validate_content_type))
    }

    fn body_length_app(limit: usize) -> Router {
        Router::new()
            .route("/", post("OK"))
            .layer(from_fn_with_state(BodyLimit(limit), validate_body_length))
    }

    #[tokio::test]
    async fn test_missing_content_type_header_returns_400() {
        let request = Request::builder()
            .uri("/")
            .method("POST")
            .body(Body::empty())
            .unwrap();

        let response = content_type_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_content_type_text_plain_returns_400() {
        let request = Request::builder()
            .uri("/")
            .method("POST")
            .header(CONTENT_TYPE, "text/plain")
            .body(Body::empty())
            .unwrap();

        let response = content_type_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), 400);
    }

    #[tokio::test]
    async fn test_content_type_json_with_charset_passes() {
        let request = Request::builder()
            .uri("/")
            .method("POST")
            .header(CONTENT_TYPE, "application/json; charset=utf-8")
            .body(Body::empty())
            .unwrap();

        let response = content_type_app().oneshot(request).await.unwrap();
        assert_eq!(response.status(), 200);
    }

    #[tokio::test]
    async fn test_declared_length_over_limit_returns_413() {
        let request = Request::builder()
            .uri("/")
            .method("POST")
            .header(CONTENT_LENGTH, "2048")
            .body(Body::from(vec![b'a'; 2048]))
            .unwrap();

        let response = body_length_app(1024).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_declared_length_within_limit_passes() {
        let request = Request::builder()
            .uri("/")
            .method("POST")
            .header(CONTENT_LENGTH, "2")
            .body(Body::from("{}"))
            .unwrap();

        let response = body_length_app(1024).oneshot(request).await.unwrap();
        assert_eq!(response.status(), 200);
    }
}
