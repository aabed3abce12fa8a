//! Request-id propagation.

use http::HeaderValue;
use uuid::Uuid;

use super::{BoxFuture, Next, Outcome, Stage};
use crate::request::Request;

const X_REQUEST_ID: &str = "x-request-id";

/// Keeps an incoming `x-request-id` or generates a UUID v4, sets it on the
/// request for inner stages and copies it onto the response.
pub struct RequestId;

impl Stage for RequestId {
    fn name(&self) -> &'static str {
        "request-id"
    }

    fn handle<'a>(&'a self, mut req: Request, next: Next) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let id = match req.headers().get(X_REQUEST_ID) {
                Some(v) if !v.is_empty() => v.clone(),
                _ => HeaderValue::try_from(Uuid::new_v4().to_string())
                    .unwrap_or_else(|_| HeaderValue::from_static("unknown")),
            };
            req.headers_mut().insert(X_REQUEST_ID, id.clone());

            let outcome = next.run(req).await;
            outcome.map(|mut res| {
                res.headers_mut().insert(X_REQUEST_ID, id);
                res
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use http::Method;

    use super::*;
    use crate::middleware::Pipeline;
    use crate::response::Response;

    async fn echo_id(req: Request) -> Response {
        Response::text(req.header("x-request-id").unwrap_or_default().to_owned())
    }

    #[tokio::test]
    async fn incoming_id_is_kept() {
        let req = Request::new(Method::GET, "/").with_header("x-request-id", "abc-123");
        let res = Pipeline::new().stage(RequestId).run(req, echo_id).await.unwrap();
        assert_eq!(res.body(), b"abc-123");
        assert_eq!(res.header("x-request-id"), Some("abc-123"));
    }

    #[tokio::test]
    async fn missing_id_is_generated_and_echoed() {
        let res = Pipeline::new()
            .stage(RequestId)
            .run(Request::new(Method::GET, "/"), echo_id)
            .await
            .unwrap();
        let header = res.header("x-request-id").unwrap();
        assert!(Uuid::parse_str(header).is_ok());
        assert_eq!(res.body(), header.as_bytes());
    }
}
