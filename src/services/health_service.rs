use crate::config::HealthConfig;
use crate::storage::MessageStorage;
use opentelemetry::{KeyValue, global, metrics::Gauge};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Clone, Debug)]
pub struct Metrics {
    pub status: Gauge<i64>,
}

impl Metrics {
    #[must_use]
    pub(crate) fn new() -> Self {
        let meter = global::meter("msgdrop-server");
        Self {
            status: meter
                .i64_gauge("msgdrop_health_status")
                .with_description("Status of health checks (1 for ok, 0 for error)")
                .build(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Debug)]
pub struct HealthService {
    storage: Arc<dyn MessageStorage>,
    config: HealthConfig,
    metrics: Metrics,
}

impl HealthService {
    #[must_use]
    pub fn new(storage: Arc<dyn MessageStorage>, config: HealthConfig) -> Self {
        Self { storage, config, metrics: Metrics::new() }
    }

    /// Checks that the message storage answers within the configured timeout.
    ///
    /// # Errors
    /// Returns a string describing the failure if storage is unreachable.
    pub async fn check_storage(&self) -> Result<(), String> {
        let storage_timeout = Duration::from_millis(self.config.storage_timeout_ms);
        let attrs = [KeyValue::new("component", "storage"), KeyValue::new("backend", self.storage.backend())];

        match timeout(storage_timeout, self.storage.ping()).await {
            Ok(Ok(())) => {
                self.metrics.status.record(1, &attrs);
                Ok(())
            }
            Ok(Err(e)) => {
                self.metrics.status.record(0, &attrs);
                Err(format!("Storage check failed: {e}"))
            }
            Err(_) => {
                self.metrics.status.record(0, &attrs);
                Err("Storage check timed out".to_string())
            }
        }
    }
}
