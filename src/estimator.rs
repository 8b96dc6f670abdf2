//! # Wait-Time Estimator Interface
//!
//! The engine consumes predictions, it never produces them. An external
//! orchestrator decides when to call the estimator (on disruptions such as
//! absences, cancellations, and reorders, not on every schedule read) and
//! stores the result through `QueueEngine::record_estimate`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::error::Result;
use crate::models::PredictionMode;

/// A wait-time prediction for one appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitEstimate {
    pub minutes: i32,
    pub mode: PredictionMode,
    pub confidence: f32,
    /// Model features snapshot, opaque to the engine.
    pub features: Value,
}

#[async_trait]
pub trait WaitTimeEstimator: Send + Sync {
    async fn estimate(&self, appointment_id: Uuid) -> Result<WaitEstimate>;
}

/// Fallback estimator for clinics running without a model: reports the
/// disabled mode and no confidence rather than inventing numbers.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledEstimator;

#[async_trait]
impl WaitTimeEstimator for DisabledEstimator {
    async fn estimate(&self, _appointment_id: Uuid) -> Result<WaitEstimate> {
        Ok(WaitEstimate {
            minutes: 0,
            mode: PredictionMode::Disabled,
            confidence: 0.0,
            features: Value::Null,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_estimator_reports_disabled_mode() {
        let estimate = DisabledEstimator.estimate(Uuid::new_v4()).await.unwrap();
        assert_eq!(estimate.mode, PredictionMode::Disabled);
        assert_eq!(estimate.confidence, 0.0);
    }
}
