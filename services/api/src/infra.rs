use metrics_exporter_prometheus::PrometheusHandle;
use staff_tracker::auth::{TokenIssuer, UserDirectory};
use staff_tracker::config::AppEnvironment;
use staff_tracker::reporting::ReportService;
use staff_tracker::store::{DataSource, TrackerBackend};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) environment: AppEnvironment,
    pub(crate) source: DataSource,
    pub(crate) users: Arc<UserDirectory>,
    pub(crate) tokens: Arc<TokenIssuer>,
    pub(crate) reports: Arc<ReportService<TrackerBackend>>,
    pub(crate) bcrypt_cost: u32,
}
