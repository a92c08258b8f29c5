//! Liveness and readiness reporting.
//!
//! - `GET /health` always answers 200 while the process runs.
//! - `GET /ready` answers 200 until shutdown begins, then 503.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// Body of the `/health` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthReport {
    /// Always `"healthy"` while serving.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service version.
    pub version: String,
    /// Seconds since the server was created.
    pub uptime_seconds: u64,
}

/// Body of the `/ready` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadinessReport {
    /// Whether new traffic is accepted.
    pub ready: bool,
}

/// Shared health state of a running server.
#[derive(Debug, Clone)]
pub struct Health {
    service: String,
    version: String,
    started_at: Instant,
    ready: Arc<AtomicBool>,
}

impl Health {
    /// Creates a ready health tracker.
    #[must_use]
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            started_at: Instant::now(),
            ready: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Current liveness report.
    #[must_use]
    pub fn report(&self) -> HealthReport {
        HealthReport {
            status: "healthy".to_string(),
            service: self.service.clone(),
            version: self.version.clone(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }

    /// Marks the server ready or draining.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Returns `true` while the server accepts traffic.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Current readiness report.
    #[must_use]
    pub fn readiness(&self) -> ReadinessReport {
        ReadinessReport {
            ready: self.is_ready(),
        }
    }
}
