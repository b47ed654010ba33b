use log::debug;
use serde_json::Value;
use std::sync::Arc;

use super::retry::{with_retries, AttemptFailure, RetryPolicy};
use super::transport::{endpoint_url, LapiTransport, RawResponse};
use crate::clock::Clock;
use crate::error_handling::types::{DecodeError, FetchError};
use crate::models::{Alert, DecisionDelta};
use crate::normalization::{normalize_alerts, normalize_decision_delta, DurationStrategy};
use crate::session_management::SessionManager;

/// Authenticated, retrying reader of the local API.
///
/// Authentication happens once per call and is never retried; only the data
/// request itself is. Records come back normalized.
pub struct UpstreamClient {
    transport: LapiTransport,
    session: Arc<SessionManager>,
    clock: Arc<dyn Clock>,
    retry: RetryPolicy,
    strategy: DurationStrategy,
}

impl UpstreamClient {
    pub fn new(
        transport: LapiTransport,
        session: Arc<SessionManager>,
        clock: Arc<dyn Clock>,
        retry: RetryPolicy,
        strategy: DurationStrategy,
    ) -> Self {
        Self {
            transport,
            session,
            clock,
            retry,
            strategy,
        }
    }

    pub fn strategy(&self) -> DurationStrategy {
        self.strategy
    }

    /// Lists alerts raised by the local engine (`origin=crowdsec`).
    pub async fn fetch_alerts(&self, limit: usize, max_retries: u32) -> Result<Vec<Alert>, FetchError> {
        let path = format!("/v1/alerts?limit={}&origin=crowdsec", limit);
        let body = self.get_json(&path, max_retries).await?;
        let (alerts, stats) = normalize_alerts(&body, self.strategy, self.clock.now())?;
        debug!(
            "fetched {} alerts with {} decisions ({} malformed entries skipped)",
            stats.alerts, stats.decisions, stats.skipped
        );
        Ok(alerts)
    }

    /// Reads the decision delta. With `startup` set the upstream returns
    /// every active decision instead of the changes since the last call.
    pub async fn fetch_decision_delta(
        &self,
        startup: bool,
        max_retries: u32,
    ) -> Result<DecisionDelta, FetchError> {
        let path = format!("/v1/decisions/stream?startup={}", startup);
        let body = self.get_json(&path, max_retries).await?;
        let (delta, stats) = normalize_decision_delta(&body, self.strategy, self.clock.now())?;
        debug!(
            "fetched decision delta: {} new, {} deleted ({} malformed entries skipped)",
            delta.new.len(),
            delta.deleted.len(),
            stats.skipped
        );
        Ok(delta)
    }

    async fn get_json(&self, path: &str, max_retries: u32) -> Result<Value, FetchError> {
        self.session.ensure_authenticated().await?;
        let token = self.session.current_token().await;
        let url = endpoint_url(&self.session.endpoint().await, path);

        let transport = &self.transport;
        let (url, token) = (url.as_str(), token.as_str());
        let response = with_retries(&self.retry, max_retries, move |_| async move {
            let response = transport
                .get(url, Some(token))
                .await
                .map_err(AttemptFailure::transport)?;
            accept(response)
        })
        .await
        .map_err(|failure| FetchError::Upstream {
            status: failure.status,
            message: failure.message,
        })?;

        decode_body(&response.body)
    }
}

fn accept(response: RawResponse) -> Result<RawResponse, AttemptFailure> {
    if response.status >= 300 {
        return Err(AttemptFailure::status(response.status, response.status_line));
    }
    Ok(response)
}

/// An empty body is treated like a JSON `null`.
fn decode_body(body: &str) -> Result<Value, FetchError> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| FetchError::Decode(DecodeError::InvalidJson(e.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::error_handling::types::AuthError;
    use crate::session_management::SessionConfig;
    use chrono::{TimeZone, Utc};
    use httpmock::prelude::*;
    use serde_json::json;
    use tokio_test::assert_ok;

    async fn client(server: &MockServer) -> UpstreamClient {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2025, 1, 1, 0, 10, 0).unwrap(),
        ));
        let transport = LapiTransport::new();
        let session = Arc::new(SessionManager::new(transport.clone(), clock.clone()));
        session
            .configure(SessionConfig {
                endpoint: server.base_url(),
                machine_id: "m1".to_string(),
                machine_secret: "secret".to_string(),
                registration_token: None,
                deregister_on_exit: false,
            })
            .await;
        UpstreamClient::new(
            transport,
            session,
            clock,
            RetryPolicy::immediate(),
            DurationStrategy::Remaining,
        )
    }

    async fn mock_login(server: &MockServer) {
        server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/watchers/login");
                then.status(200)
                    .json_body(json!({"token": "tok", "expire": "2025-01-01T01:00:00Z"}));
            })
            .await;
    }

    #[tokio::test]
    async fn fetches_and_normalizes_alerts() {
        let server = MockServer::start_async().await;
        mock_login(&server).await;
        let alerts_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/alerts")
                    .query_param("limit", "1000")
                    .query_param("origin", "crowdsec")
                    .header("Authorization", "Bearer tok");
                then.status(200).json_body(json!([{
                    "id": 1,
                    "created_at": "2025-01-01T00:00:00Z",
                    "source": {"cn": "FR", "range": "10.0.0.0/8"},
                    "decisions": [{"uuid": "a", "value": "10.0.0.1", "duration": "50m", "type": "ban"}]
                }]));
            })
            .await;

        let client = client(&server).await;
        let alerts = assert_ok!(client.fetch_alerts(1000, 5).await);

        alerts_mock.assert_hits_async(1).await;
        assert_eq!(alerts.len(), 1);
        let decision = &alerts[0].decisions[0];
        assert_eq!(decision.country, "FR");
        assert_eq!(decision.ip_range, "10.0.0.0/8");
        assert_eq!(decision.duration, "1h");
    }

    #[tokio::test]
    async fn permanent_failure_uses_every_attempt() {
        let server = MockServer::start_async().await;
        mock_login(&server).await;
        let alerts_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/alerts");
                then.status(503).body("down");
            })
            .await;

        let client = client(&server).await;
        let err = client.fetch_alerts(10, 3).await.unwrap_err();

        alerts_mock.assert_hits_async(4).await;
        assert_eq!(
            err,
            FetchError::Upstream {
                status: Some(503),
                message: "503 Service Unavailable".to_string()
            }
        );
    }

    #[tokio::test]
    async fn auth_failure_skips_the_fetch() {
        let server = MockServer::start_async().await;
        let login = server
            .mock_async(|when, then| {
                when.method(POST).path("/v1/watchers/login");
                then.status(403);
            })
            .await;
        let alerts_mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/alerts");
                then.status(200).json_body(json!([]));
            })
            .await;

        let client = client(&server).await;
        let err = client.fetch_alerts(10, 5).await.unwrap_err();

        assert!(matches!(
            err,
            FetchError::Auth(AuthError::LoginRejected { status: 403, .. })
        ));
        login.assert_hits_async(1).await;
        alerts_mock.assert_hits_async(0).await;
    }

    #[tokio::test]
    async fn null_body_is_an_empty_listing() {
        let server = MockServer::start_async().await;
        mock_login(&server).await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/v1/alerts");
                then.status(200).body("null");
            })
            .await;

        let client = client(&server).await;
        assert_eq!(assert_ok!(client.fetch_alerts(10, 0).await), Vec::new());
    }

    #[tokio::test]
    async fn undecodable_bodies_are_decode_errors() {
        for body in ["{\"message\":\"nope\"}", "<html>"] {
            let server = MockServer::start_async().await;
            mock_login(&server).await;
            server
                .mock_async(|when, then| {
                    when.method(GET).path("/v1/alerts");
                    then.status(200).body(body);
                })
                .await;

            let client = client(&server).await;
            let err = client.fetch_alerts(10, 0).await.unwrap_err();
            assert!(matches!(err, FetchError::Decode(_)), "body {:?}", body);
        }
    }

    #[tokio::test]
    async fn fetches_decision_delta_with_startup_flag() {
        let server = MockServer::start_async().await;
        mock_login(&server).await;
        let stream = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/v1/decisions/stream")
                    .query_param("startup", "true")
                    .header("Authorization", "Bearer tok");
                then.status(200).json_body(json!({
                    "new": [{"uuid": "n1", "value": "1.1.1.1", "created_at": "2025-01-01T00:00:00Z", "duration": "20m"}],
                    "deleted": null
                }));
            })
            .await;

        let client = client(&server).await;
        let delta = assert_ok!(client.fetch_decision_delta(true, 0).await);

        stream.assert_hits_async(1).await;
        assert_eq!(delta.new.len(), 1);
        assert_eq!(delta.new[0].duration, "30m");
        assert!(delta.deleted.is_empty());
    }
}
