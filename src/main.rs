use clap::Parser;
use crowdsec_exporter::configuration::config::{Args, Config};
use crowdsec_exporter::controller::Controller;
use log::{error, info, LevelFilter};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let config = Config::load(args);

    // https://docs.rs/env_logger/latest/env_logger/
    let level = config
        .as_ref()
        .map(|c| c.log_level.to_filter())
        .unwrap_or(LevelFilter::Info);
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .format_target(false)
        .init();

    info!("crowdsec-exporter v{}", env!("CARGO_PKG_VERSION"));

    let config = config.unwrap_or_else(|e| {
        error!("Unable to load configuration: {}", e);
        std::process::exit(1);
    });

    let controller = Controller::new(config).unwrap_or_else(|e| {
        error!("Unable to create a controller instance: {}, exiting...", e);
        std::process::exit(1);
    });

    if let Err(e) = controller.run(shutdown_signal()).await {
        error!("Exporter stopped with an error: {}", e);
        std::process::exit(1);
    }
}

/// Resolves on Ctrl+C, or SIGTERM on unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Unable to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Unable to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
