use log::{error, warn};
use std::sync::Arc;
use std::time::Duration;
use warp::filters::path::FullPath;
use warp::{http::StatusCode, reply, Filter, Rejection, Reply};

use super::types::ApiError;
use crate::metrics::{render, SnapshotCollector};

/// Prometheus text exposition format.
pub const METRICS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET /
pub fn index_route(metrics_path: String) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let html = format!(
        r#"<html><head><title>CrowdSec Exporter</title></head>
<body><h1>CrowdSec Exporter</h1><p><a href="{0}">{0}</a></p></body></html>"#,
        metrics_path
    );
    warp::path::end()
        .and(warp::get())
        .map(move || reply::html(html.clone()))
}

/// GET <metrics_path>
pub fn metrics_route(
    metrics_path: String,
    collector: Arc<SnapshotCollector>,
    scrape_timeout: Duration,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    exact_path(metrics_path)
        .and(warp::get())
        .and_then(move || {
            let collector = collector.clone();
            async move { Ok::<_, Rejection>(serve_metrics(&collector, scrape_timeout).await) }
        })
}

/// Matches a full request path, which may span several segments.
fn exact_path(expected: String) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::path::full()
        .and_then(move |full: FullPath| {
            let matches = full.as_str() == expected;
            async move {
                if matches {
                    Ok(())
                } else {
                    Err(warp::reject::not_found())
                }
            }
        })
        .untuple_one()
}

async fn serve_metrics(collector: &SnapshotCollector, scrape_timeout: Duration) -> reply::Response {
    let samples = match tokio::time::timeout(scrape_timeout, collector.collect()).await {
        Ok(samples) => samples,
        Err(_) => {
            warn!(
                "scrape exceeded {:?}, serving previous snapshot",
                scrape_timeout
            );
            collector.last_snapshot()
        }
    };

    match render(&samples, collector.strategy()) {
        Ok(body) => reply::with_header(body, "Content-Type", METRICS_CONTENT_TYPE).into_response(),
        Err(e) => {
            error!("{}", e);
            reply::with_status(
                reply::json(&ApiError {
                    message: e.to_string(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
            .into_response()
        }
    }
}
