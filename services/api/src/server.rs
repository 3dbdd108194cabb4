use crate::cli::ServeArgs;
use crate::infra::AppState;
use crate::routes::build_router;
use axum_prometheus::PrometheusMetricLayer;
use staff_tracker::admin::StaffDirectory;
use staff_tracker::auth::{TokenIssuer, UserDirectory};
use staff_tracker::config::AppConfig;
use staff_tracker::error::AppError;
use staff_tracker::reporting::ReportService;
use staff_tracker::store::TrackerBackend;
use staff_tracker::telemetry;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::signal;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(AtomicBool::new(false));

    let backend = Arc::new(TrackerBackend::connect(&config.store));
    let source = backend.source();
    let users = Arc::new(UserDirectory::seeded(config.auth.bcrypt_cost).await?);
    let tokens = Arc::new(TokenIssuer::from_config(&config.auth));

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        environment: config.environment,
        source,
        users: users.clone(),
        tokens,
        reports: Arc::new(ReportService::new(backend.clone(), source)),
        bcrypt_cost: config.auth.bcrypt_cost,
    };
    let directory = Arc::new(StaffDirectory::new(backend, users));

    let app = build_router(app_state, directory).layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, mode = source.mode_label(), "staff tracker api ready");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server shut down");
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("received ctrl-c, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("received terminate signal, shutting down");
            }
            Err(err) => {
                warn!(error = %err, "failed to install terminate handler");
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
}
