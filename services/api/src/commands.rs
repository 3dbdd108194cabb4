use crate::cli::{HashPasswordArgs, KeepAliveArgs, ReportArgs, TrackAction, TrackArgs};
use crate::server::shutdown_signal;
use chrono::Local;
use staff_tracker::auth::hash_password;
use staff_tracker::config::AppConfig;
use staff_tracker::domain::StaffId;
use staff_tracker::error::AppError;
use staff_tracker::keepalive::{status_router, KeepAlive};
use staff_tracker::reporting::{ReportRequest, ReportService};
use staff_tracker::store::TrackerBackend;
use staff_tracker::telemetry;
use staff_tracker::tracking::{
    FixedLocationProvider, LocationCaptureWorker, PeriodicCaptureScheduler, StaffTracker,
    TrackingState,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub(crate) async fn run_report(args: ReportArgs) -> Result<(), AppError> {
    let ReportArgs {
        staff_id,
        period,
        start_date,
        end_date,
        output_dir,
    } = args;

    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let backend = Arc::new(TrackerBackend::connect(&config.store));
    let source = backend.source();
    let service = ReportService::new(backend, source);
    let request = ReportRequest {
        period,
        start_date,
        end_date,
    };

    let report = service
        .generate(&StaffId(staff_id), &request, &Local::now())
        .await?;
    let bytes = report.to_xlsx()?;

    let output_dir = output_dir.unwrap_or(config.reports.output_dir);
    std::fs::create_dir_all(&output_dir)?;
    let path = output_dir.join(&report.file_name);
    std::fs::write(&path, &bytes)?;

    println!("Report for {} ({})", report.staff.name, source.mode_label());
    match &report.window {
        Some(window) => println!("  Window:    {} to {}", window.start, window.end),
        None => println!("  Window:    all recorded history"),
    }
    println!("  Sessions:  {}", report.sessions.len());
    println!("  Locations: {}", report.locations.len());
    println!("  Written:   {}", path.display());
    Ok(())
}

pub(crate) async fn run_track(args: TrackArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let store = Arc::new(TrackerBackend::connect(&config.store));
    let provider = Arc::new(FixedLocationProvider::new(args.lat, args.lng).with_provider("cli"));
    let worker = Arc::new(LocationCaptureWorker::new(store.clone(), provider.clone()));
    let scheduler = PeriodicCaptureScheduler::from_config(worker, &config.tracking);
    let mut tracker = StaffTracker::new(StaffId(args.staff_id), store, provider, scheduler);

    let state = tracker.load().await?.clone();
    match args.action {
        TrackAction::Status => {
            print_state(tracker.staff_id(), &state);
            Ok(())
        }
        TrackAction::CheckOut => {
            let session_id = tracker.check_out().await?;
            println!("Checked out of session {session_id}");
            Ok(())
        }
        TrackAction::CheckIn => {
            if tracker.resume() {
                info!(staff_id = %tracker.staff_id(), "resuming open session");
            } else {
                let session = tracker.check_in().await?;
                println!("Checked in, session {}", session.id);
            }
            print_state(tracker.staff_id(), tracker.state());
            println!(
                "Capturing location every {:?}; press Ctrl+C to stop",
                config.tracking.capture_interval
            );

            shutdown_signal().await;
            // the session stays open; the next check-in resumes it
            info!(staff_id = %tracker.staff_id(), "tracking agent stopped");
            Ok(())
        }
    }
}

fn print_state(staff_id: &StaffId, state: &TrackingState) {
    match state {
        TrackingState::Tracking { session_id, since } => {
            println!("{staff_id} is checked in (session {session_id} since {since})")
        }
        TrackingState::NotTracking | TrackingState::Idle => {
            println!("{staff_id} is not checked in")
        }
    }
}

pub(crate) async fn run_keepalive(args: KeepAliveArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(target) = args.target {
        config.keepalive.target_url = target;
    }
    if let Some(minutes) = args.interval_minutes {
        config.keepalive.interval = Duration::from_secs(minutes.max(1) * 60);
    }
    if let Some(port) = args.port {
        config.keepalive.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let keepalive = Arc::new(KeepAlive::new(&config.keepalive)?);
    let pinger = tokio::spawn(keepalive.clone().run());

    let addr = SocketAddr::new(IpAddr::from([0, 0, 0, 0]), config.keepalive.port);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        url = %config.keepalive.target_url,
        interval = ?config.keepalive.interval,
        "keep-alive service started"
    );

    axum::serve(listener, status_router(keepalive))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pinger.abort();
    Ok(())
}

pub(crate) async fn run_hash_password(args: HashPasswordArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let hash = hash_password(&args.password, config.auth.bcrypt_cost).await?;
    println!("{hash}");
    Ok(())
}
