use log::trace;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, Method, RequestBuilder};
use serde::Serialize;

/// Status and body of a completed HTTP exchange, whatever the status.
#[derive(Debug, Clone, PartialEq)]
pub struct RawResponse {
    pub status: u16,
    /// e.g. `503 Service Unavailable`
    pub status_line: String,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// JSON transport shared by the session manager and the upstream client.
///
/// Every request carries `Content-Type: application/json`; the bearer token is
/// attached only when one is supplied. Cloning is cheap (the inner client is
/// reference counted).
#[derive(Debug, Clone, Default)]
pub struct LapiTransport {
    client: Client,
}

impl LapiTransport {
    pub fn new() -> Self {
        Self::with_client(Client::new())
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, url: &str, bearer: Option<&str>) -> Result<RawResponse, reqwest::Error> {
        self.send(self.request(Method::GET, url, bearer)).await
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        payload: &T,
        bearer: Option<&str>,
    ) -> Result<RawResponse, reqwest::Error> {
        self.send(self.request(Method::POST, url, bearer).json(payload))
            .await
    }

    pub async fn delete(&self, url: &str, bearer: Option<&str>) -> Result<RawResponse, reqwest::Error> {
        self.send(self.request(Method::DELETE, url, bearer)).await
    }

    fn request(&self, method: Method, url: &str, bearer: Option<&str>) -> RequestBuilder {
        trace!("{} {}", method, url);
        let builder = self
            .client
            .request(method, url)
            .header(CONTENT_TYPE, "application/json");
        match bearer {
            Some(token) if !token.is_empty() => builder.header(AUTHORIZATION, format!("Bearer {}", token)),
            _ => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<RawResponse, reqwest::Error> {
        let response = builder.send().await?;
        let status = response.status();
        let status_line = match status.canonical_reason() {
            Some(reason) => format!("{} {}", status.as_u16(), reason),
            None => status.as_u16().to_string(),
        };
        let body = response.text().await?;
        Ok(RawResponse {
            status: status.as_u16(),
            status_line,
            body,
        })
    }
}

/// Joins the configured endpoint and an API path, tolerating a trailing slash.
pub fn endpoint_url(endpoint: &str, path: &str) -> String {
    format!("{}{}", endpoint.trim_end_matches('/'), path)
}
