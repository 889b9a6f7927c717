use std::time::Duration;

use crux_http::protocol::{HttpRequest, HttpResponse, HttpResult};
use tracing::{debug, warn};

use crate::{Result, ShellError};

/// Executes the core's HTTP effects with reqwest.
#[derive(Clone)]
pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub async fn execute(&self, request: &HttpRequest) -> HttpResult {
        match self.send(request).await {
            Ok(response) => HttpResult::Ok(response),
            Err(e) => {
                warn!(url = %request.url, error = %e, "HTTP request failed");
                HttpResult::Err(into_http_error(e))
            }
        }
    }

    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| ShellError::Method(request.method.clone()))?;

        let mut builder = self.client.request(method, &request.url);
        for header in &request.headers {
            builder = builder.header(&header.name, &header.value);
        }

        debug!(method = %request.method, url = %request.url, body_bytes = request.body.len(), "sending request");
        let response = builder.body(request.body.clone()).send().await?;

        let status = response.status().as_u16();
        let mut converted = HttpResponse::status(status);
        for (name, value) in response.headers() {
            // Non-UTF-8 header values are dropped.
            if let Ok(value) = value.to_str() {
                converted.header(name.as_str(), value);
            }
        }

        let body = response.bytes().await?;
        debug!(status, body_bytes = body.len(), "received response");

        Ok(converted.body(body.to_vec()).build())
    }
}

fn into_http_error(error: ShellError) -> crux_http::Error {
    match error {
        ShellError::Network(e) if e.is_timeout() => crux_http::Error::Timeout,
        other => crux_http::Error::Io(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crux_http::protocol::HttpHeader;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn post(url: String, body: &[u8]) -> HttpRequest {
        HttpRequest {
            method: "POST".into(),
            url,
            headers: vec![HttpHeader {
                name: "Content-Type".into(),
                value: "multipart/form-data; boundary=xyz".into(),
            }],
            body: body.to_vec(),
        }
    }

    #[tokio::test]
    async fn forwards_method_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process-image"))
            .and(header("content-type", "multipart/form-data; boundary=xyz"))
            .respond_with(
                ResponseTemplate::new(201)
                    .insert_header("x-model", "bnn")
                    .set_body_bytes(b"out".to_vec()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let executor = ReqwestExecutor::new(Duration::from_secs(5)).unwrap();
        let result = executor
            .execute(&post(format!("{}/process-image", server.uri()), b"payload"))
            .await;

        let HttpResult::Ok(response) = result else {
            panic!("expected a response");
        };
        assert_eq!(response.status, 201);
        assert_eq!(response.body, b"out".to_vec());
        assert!(response
            .headers
            .iter()
            .any(|h| h.name == "x-model" && h.value == "bnn"));

        let received = server.received_requests().await.unwrap();
        assert_eq!(received[0].body, b"payload".to_vec());
    }

    #[tokio::test]
    async fn error_statuses_are_responses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let executor = ReqwestExecutor::new(Duration::from_secs(5)).unwrap();
        let result = executor.execute(&post(server.uri(), b"x")).await;

        assert!(matches!(result, HttpResult::Ok(ref r) if r.status == 500));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let executor = ReqwestExecutor::new(Duration::from_millis(50)).unwrap();
        let result = executor.execute(&post(server.uri(), b"x")).await;

        assert!(matches!(result, HttpResult::Err(crux_http::Error::Timeout)));
    }

    #[tokio::test]
    async fn unreachable_backend_is_an_io_error() {
        let executor = ReqwestExecutor::new(Duration::from_secs(1)).unwrap();
        let result = executor
            .execute(&post("http://127.0.0.1:9/process-image".into(), b"x"))
            .await;

        assert!(matches!(result, HttpResult::Err(crux_http::Error::Io(_))));
    }
}
