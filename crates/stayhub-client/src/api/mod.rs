//! REST client for the marketplace API.
//!
//! Every response body is a `{ code, message, data }` envelope; anything
//! other than `code == 200` surfaces as [`ApiError::Rejected`]. Endpoint
//! groups live in submodules as inherent methods on [`ApiClient`].

mod bookings;
mod chats;
mod listings;
mod payments;
mod users;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use stayhub_core::config::ApiConfig;
use stayhub_core::models::ApiEnvelope;

/// Errors returned by REST calls.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized: sign in again")]
    Unauthorized,

    #[error("Request rejected ({code}): {message}")]
    Rejected { code: i64, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("Response carried no data")]
    MissingData,
}

/// HTTP client for marketplace REST endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    /// Create a client rooted at `base_url` (e.g. `http://localhost:8080/api`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
        })
    }

    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(
            config.base_url.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    /// Attach a bearer token to every subsequent request.
    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token;
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.http.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Send and unwrap the envelope, returning its (possibly absent) data.
    async fn execute<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<Option<T>, ApiError> {
        let response = builder.send().await?;
        let status = response.status();
        debug!(status = %status, url = %response.url(), "API response received");

        if status == StatusCode::UNAUTHORIZED {
            return Err(ApiError::Unauthorized);
        }

        let body = response.text().await?;
        let envelope: ApiEnvelope<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => return Err(ApiError::Decode(e.to_string())),
            Err(_) => {
                return Err(ApiError::Rejected {
                    code: i64::from(status.as_u16()),
                    message: body,
                });
            }
        };

        if !envelope.is_success() {
            warn!(code = envelope.code, message = envelope.message_or_default(), "API rejected request");
            return Err(ApiError::Rejected {
                code: envelope.code,
                message: envelope.message_or_default().to_string(),
            });
        }
        Ok(envelope.data)
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        self.execute(builder).await?.ok_or(ApiError::MissingData)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.fetch(self.request(Method::GET, path)).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.fetch(self.request(method, path).json(body)).await
    }

    /// Send a body to an endpoint whose `data` is irrelevant.
    async fn send_json_unit<B>(&self, method: Method, path: &str, body: &B) -> Result<(), ApiError>
    where
        B: Serialize + ?Sized,
    {
        self.execute::<serde_json::Value>(self.request(method, path).json(body))
            .await
            .map(|_| ())
    }
}

/// Render `key=value` pairs as a query string, skipping absent values.
fn query_string(pairs: &[(&str, Option<String>)]) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in pairs {
        if let Some(value) = value {
            serializer.append_pair(key, value);
        }
    }
    let query = serializer.finish();
    if query.is_empty() {
        query
    } else {
        format!("?{query}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(super) fn test_client(base_url: &str) -> ApiClient {
        ApiClient::new(format!("{base_url}/api"), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn query_string_skips_missing() {
        let q = query_string(&[
            ("checkIn", Some("2025-05-01".into())),
            ("checkOut", None),
            ("q", Some("a b&c".into())),
        ]);
        assert_eq!(q, "?checkIn=2025-05-01&q=a+b%26c");
        assert_eq!(query_string(&[("x", None)]), "");
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client = ApiClient::new("http://h/api/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.base_url(), "http://h/api");
    }

    #[tokio::test]
    async fn rejected_envelope_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings/9"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"code": 404, "message": "no such listing"})),
            )
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).listing(9).await.unwrap_err();
        match err {
            ApiError::Rejected { code, message } => {
                assert_eq!(code, 404);
                assert_eq!(message, "no such listing");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unauthorized_status_maps_to_unauthorized() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings/1"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).listing(1).await.unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized));
    }

    #[tokio::test]
    async fn non_json_error_body_is_rejected_with_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings/1"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).listing(1).await.unwrap_err();
        assert!(matches!(err, ApiError::Rejected { code: 502, .. }));
    }

    #[tokio::test]
    async fn bearer_token_is_sent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/chats/4"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"code": 200, "message": "ok", "data": []})),
            )
            .mount(&server)
            .await;

        let client = test_client(&server.uri()).with_token("secret");
        let chats = client
            .chats(4, stayhub_core::models::RoleType::Guest)
            .await
            .unwrap();
        assert!(chats.is_empty());
    }

    #[tokio::test]
    async fn success_without_data_is_missing_data() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/listings/2"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"code": 200})),
            )
            .mount(&server)
            .await;

        let err = test_client(&server.uri()).listing(2).await.unwrap_err();
        assert!(matches!(err, ApiError::MissingData));
    }
}
