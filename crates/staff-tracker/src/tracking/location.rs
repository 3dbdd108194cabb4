use async_trait::async_trait;
use chrono::Utc;

use crate::domain::LocationFix;

#[derive(Debug, Clone, thiserror::Error)]
pub enum LocationError {
    #[error("location permission denied")]
    PermissionDenied,
    #[error("location provider failed: {0}")]
    Provider(String),
}

/// Source of high-accuracy position fixes.
#[async_trait]
pub trait LocationProvider: Send + Sync {
    /// The current position, or `None` when the provider has no fix yet.
    async fn current_fix(&self) -> Result<Option<LocationFix>, LocationError>;
}

/// Reports the same coordinate on every request, stamped with the current time.
#[derive(Debug, Clone)]
pub struct FixedLocationProvider {
    latitude: f64,
    longitude: f64,
    accuracy: f32,
    provider: String,
}

impl FixedLocationProvider {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            accuracy: 5.0,
            provider: "fixed".to_string(),
        }
    }

    pub fn with_accuracy(mut self, accuracy: f32) -> Self {
        self.accuracy = accuracy;
        self
    }

    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }
}

#[async_trait]
impl LocationProvider for FixedLocationProvider {
    async fn current_fix(&self) -> Result<Option<LocationFix>, LocationError> {
        Ok(Some(LocationFix {
            latitude: self.latitude,
            longitude: self.longitude,
            accuracy: self.accuracy,
            provider: self.provider.clone(),
            captured_at: Utc::now(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_provider_reports_configured_coordinate() {
        let provider = FixedLocationProvider::new(40.7128, -74.006)
            .with_accuracy(3.5)
            .with_provider("gps");
        let fix = provider
            .current_fix()
            .await
            .expect("provider answers")
            .expect("fix available");
        assert_eq!(fix.latitude, 40.7128);
        assert_eq!(fix.accuracy, 3.5);
        assert_eq!(fix.provider, "gps");
    }
}
