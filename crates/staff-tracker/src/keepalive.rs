//! Periodic pinger that keeps a sleeping free-tier deployment awake.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use axum::{extract::State, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use reqwest::{header, StatusCode, Url};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::KeepAliveConfig;

const USER_AGENT: &str = "StaffTracker-KeepAlive";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum KeepAliveError {
    #[error("invalid target url '{url}': {reason}")]
    InvalidTarget { url: String, reason: String },
    #[error("ping failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Snapshot served by the status endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeepAliveStatus {
    pub status: &'static str,
    pub target: String,
    pub interval: String,
    pub last_ping: Option<DateTime<Utc>>,
    pub last_status: Option<u16>,
}

pub struct KeepAlive {
    client: reqwest::Client,
    target: String,
    ping_url: Url,
    interval: Duration,
    last_ping: Mutex<Option<(DateTime<Utc>, Option<u16>)>>,
}

impl KeepAlive {
    pub fn new(config: &KeepAliveConfig) -> Result<Self, KeepAliveError> {
        let ping_url = Url::parse(&config.target_url)
            .and_then(|url| url.join("/"))
            .map_err(|err| KeepAliveError::InvalidTarget {
                url: config.target_url.clone(),
                reason: err.to_string(),
            })?;
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            target: config.target_url.clone(),
            ping_url,
            interval: config.interval,
            last_ping: Mutex::new(None),
        })
    }

    pub fn ping_url(&self) -> &Url {
        &self.ping_url
    }

    /// One `GET /` against the target. Non-2xx answers are returned, not treated as errors.
    pub async fn ping(&self) -> Result<StatusCode, KeepAliveError> {
        let result = self
            .client
            .get(self.ping_url.clone())
            .header(header::USER_AGENT, USER_AGENT)
            .send()
            .await;

        let status = result.as_ref().ok().map(|response| response.status().as_u16());
        *self.last_ping.lock().unwrap_or_else(PoisonError::into_inner) = Some((Utc::now(), status));

        let status = result?.status();
        if status == StatusCode::OK {
            info!(url = %self.target, %status, "service is running");
        } else {
            warn!(url = %self.target, %status, "service returned unexpected status");
        }
        Ok(status)
    }

    /// Ping now and then every interval, forever.
    pub async fn run(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            if let Err(err) = self.ping().await {
                warn!(url = %self.target, error = %err, "error pinging service");
            }
        }
    }

    pub fn status(&self) -> KeepAliveStatus {
        let last = *self.last_ping.lock().unwrap_or_else(PoisonError::into_inner);
        KeepAliveStatus {
            status: "running",
            target: self.target.clone(),
            interval: format!("{} minutes", self.interval.as_secs() / 60),
            last_ping: last.map(|(at, _)| at),
            last_status: last.and_then(|(_, status)| status),
        }
    }
}

/// Answers every path with the pinger's status.
pub fn status_router(keepalive: Arc<KeepAlive>) -> Router {
    Router::new()
        .route("/", get(status_handler))
        .fallback(status_handler)
        .with_state(keepalive)
}

async fn status_handler(State(keepalive): State<Arc<KeepAlive>>) -> Json<KeepAliveStatus> {
    Json(keepalive.status())
}
