use log::info;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use warp::{Filter, Rejection, Reply};

use super::routes::{index_route, metrics_route};
use crate::error_handling::types::WebError;
use crate::metrics::SnapshotCollector;

/// HTTP server exposing the metrics endpoint and a small index page.
pub struct WebServer {
    collector: Arc<SnapshotCollector>,
    metrics_path: String,
    scrape_timeout: Duration,
}

impl WebServer {
    pub fn new(collector: Arc<SnapshotCollector>, metrics_path: String, scrape_timeout: Duration) -> Self {
        Self {
            collector,
            metrics_path,
            scrape_timeout,
        }
    }

    pub fn routes(&self) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
        index_route(self.metrics_path.clone()).or(metrics_route(
            self.metrics_path.clone(),
            self.collector.clone(),
            self.scrape_timeout,
        ))
    }

    /// Binds `addr` and returns the bound address with the server future,
    /// which completes once `shutdown` resolves and in-flight requests finish.
    pub fn bind(
        &self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(SocketAddr, impl Future<Output = ()>), WebError> {
        warp::serve(self.routes())
            .try_bind_with_graceful_shutdown(addr, shutdown)
            .map_err(|e| WebError::BindFailed(format!("{}: {}", addr, e)))
    }

    /// Serves until `shutdown` resolves.
    pub async fn start(
        &self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), WebError> {
        let (bound, server) = self.bind(addr, shutdown)?;
        info!("serving metrics on http://{}{}", bound, self.metrics_path);
        server.await;
        info!("web server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::lapi::{LapiTransport, RetryPolicy, UpstreamClient};
    use crate::metrics::CollectorSettings;
    use crate::normalization::DurationStrategy;
    use crate::session_management::SessionManager;
    use crate::storage::DecisionStore;
    use tokio::sync::oneshot;

    fn server() -> WebServer {
        let clock = Arc::new(SystemClock);
        let transport = LapiTransport::new();
        let session = Arc::new(SessionManager::new(transport.clone(), clock.clone()));
        let client = UpstreamClient::new(
            transport,
            session,
            clock,
            RetryPolicy::immediate(),
            DurationStrategy::Remaining,
        );
        let collector = SnapshotCollector::new(
            client,
            Arc::new(DecisionStore::new()),
            CollectorSettings::default(),
        );
        WebServer::new(Arc::new(collector), "/metrics".to_string(), Duration::from_secs(1))
    }

    #[tokio::test]
    async fn serves_until_shutdown() {
        let (tx, rx) = oneshot::channel::<()>();
        let web = server();
        let (bound, running) = web
            .bind("127.0.0.1:0".parse().unwrap(), async {
                let _ = rx.await;
            })
            .unwrap();
        let handle = tokio::spawn(running);

        let index = reqwest::get(format!("http://{}/", bound)).await.unwrap();
        assert_eq!(index.status(), 200);
        assert!(index.text().await.unwrap().contains("/metrics"));

        // Unconfigured session: the scrape fails and an empty page is served.
        let metrics = reqwest::get(format!("http://{}/metrics", bound)).await.unwrap();
        assert_eq!(metrics.status(), 200);
        assert_eq!(metrics.text().await.unwrap(), "");

        tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn occupied_port_is_a_bind_error() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();

        let result = server().bind(addr, async {});
        assert!(matches!(result, Err(WebError::BindFailed(_))));
    }
}
