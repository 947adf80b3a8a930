use std::time::Duration;

use reqwest::Url;
use thiserror::Error;
use wormhole_generator::GeneratedCode;

use crate::model::IdResponse;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum IdClientError {
    #[error("invalid id service endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },
    #[error("request to id service failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("id service responded with status {0}")]
    Status(u16),
    #[error("failed to decode id service response: {0}")]
    Decode(String),
}

/// HTTP client for the ID service.
///
/// A failed call is reported to the caller as is; there is no retry.
#[derive(Debug, Clone)]
pub struct IdClient {
    client: reqwest::Client,
    new_id_url: Url,
}

impl IdClient {
    pub fn new(endpoint: &str) -> Result<Self, IdClientError> {
        Self::with_timeout(endpoint, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self, IdClientError> {
        let invalid = |reason: String| IdClientError::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            reason,
        };

        let base = Url::parse(endpoint.trim_end_matches('/')).map_err(|e| invalid(e.to_string()))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
        }
        let new_id_url = Url::parse(&format!("{}/new-id", base.as_str().trim_end_matches('/')))
            .map_err(|e| invalid(e.to_string()))?;

        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, new_id_url })
    }

    /// Fetches one identifier from `GET /new-id`.
    pub async fn next_id(&self) -> Result<u64, IdClientError> {
        let response = self.client.get(self.new_id_url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(IdClientError::Status(status.as_u16()));
        }

        let body = response.bytes().await?;
        let parsed: IdResponse =
            serde_json::from_slice(&body).map_err(|e| IdClientError::Decode(e.to_string()))?;
        Ok(parsed.id)
    }

    /// Fetches one identifier and encodes it as a short code.
    pub async fn next_code(&self) -> Result<GeneratedCode, IdClientError> {
        self.next_id().await.map(GeneratedCode::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::App;
    use crate::state::AppState;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use wormhole_core::ShortCodeBase58;
    use wormhole_snowflake::{Snowflake, SnowflakeSettings};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn id_service() -> Router {
        let settings = SnowflakeSettings::builder().node_id(7).build();
        App::router(AppState::new(Snowflake::new(settings).unwrap()))
    }

    #[tokio::test]
    async fn fetches_ids_from_the_service() {
        let endpoint = serve(id_service()).await;
        let client = IdClient::new(&endpoint).unwrap();

        let first = client.next_id().await.unwrap();
        let second = client.next_id().await.unwrap();
        assert!(second > first);
        assert_eq!((first >> 12) & 0x3FF, 7);
    }

    #[tokio::test]
    async fn next_code_matches_the_id() {
        let endpoint = serve(id_service()).await;
        let client = IdClient::new(&format!("{endpoint}/")).unwrap();

        let generated = client.next_code().await.unwrap();
        assert_eq!(
            ShortCodeBase58::decode(generated.short_code.as_str()),
            Ok(generated.id)
        );
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let router = Router::new().route(
            "/new-id",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "busy") }),
        );
        let endpoint = serve(router).await;
        let client = IdClient::new(&endpoint).unwrap();

        assert!(matches!(
            client.next_id().await,
            Err(IdClientError::Status(503))
        ));
    }

    #[tokio::test]
    async fn unexpected_body_is_a_decode_error() {
        let router = Router::new().route("/new-id", get(|| async { "{\"identifier\": 1}" }));
        let endpoint = serve(router).await;
        let client = IdClient::new(&endpoint).unwrap();

        assert!(matches!(
            client.next_id().await,
            Err(IdClientError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_service_is_a_request_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client =
            IdClient::with_timeout(&format!("http://{addr}"), Duration::from_millis(500)).unwrap();
        assert!(matches!(
            client.next_id().await,
            Err(IdClientError::Request(_))
        ));
    }

    #[test]
    fn rejects_malformed_endpoints() {
        assert!(matches!(
            IdClient::new("not a url"),
            Err(IdClientError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            IdClient::new("ftp://ids.internal"),
            Err(IdClientError::InvalidEndpoint { .. })
        ));
    }
}
