use log::{info, warn};
use std::future::Future;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::configuration::config::Config;
use crate::error_handling::types::*;
use crate::lapi::{LapiTransport, UpstreamClient};
use crate::metrics::SnapshotCollector;
use crate::session_management::SessionManager;
use crate::storage::DecisionStore;
use crate::web_interface::WebServer;

/// Wires the session, client, collector and web server from one [`Config`]
/// and drives their lifecycle.
pub struct Controller {
    pub config: Config,
    session: Arc<SessionManager>,
    collector: Arc<SnapshotCollector>,
    web: WebServer,
}

impl Controller {
    pub fn new(config: Config) -> Result<Self, ControllerError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Result<Self, ControllerError> {
        let http = reqwest::Client::builder()
            .timeout(config.server.scrape_timeout)
            .build()
            .map_err(|e| ControllerError::HttpClient(e.to_string()))?;
        let transport = LapiTransport::with_client(http);

        let session = Arc::new(SessionManager::new(transport.clone(), clock.clone()));
        let client = UpstreamClient::new(
            transport,
            session.clone(),
            clock,
            config.exporter.retry.clone(),
            config.exporter.duration_strategy,
        );
        let collector = Arc::new(SnapshotCollector::new(
            client,
            Arc::new(DecisionStore::new()),
            config.collector_settings(),
        ));
        let web = WebServer::new(
            collector.clone(),
            config.server.metrics_path.clone(),
            config.server.scrape_timeout,
        );

        Ok(Self {
            config,
            session,
            collector,
            web,
        })
    }

    pub fn collector(&self) -> Arc<SnapshotCollector> {
        self.collector.clone()
    }

    pub fn session(&self) -> Arc<SessionManager> {
        self.session.clone()
    }

    /// Serves metrics until `shutdown` resolves, then releases the session.
    pub async fn run(&self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<(), ControllerError> {
        self.session.configure(self.config.session_config()).await;
        info!(
            "exporting decisions from {} as machine {} ({:?} mode)",
            self.config.crowdsec.url, self.config.crowdsec.login, self.config.exporter.mode
        );

        let served = self.web.start(self.config.server.listen_address, shutdown).await;
        self.shutdown().await;
        served.map_err(ControllerError::from)
    }

    pub async fn shutdown(&self) {
        info!("shutting down");
        if let Err(e) = self.session.release().await {
            warn!("unable to release machine registration: {}", e);
        }
    }
}
