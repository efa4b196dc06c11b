//! Metrics for the VM auto-restart handler
//!
//! Recorded as structured log events; there is no exporter.

use crate::decision::Decision;
use tracing::{info, warn};

/// Metrics collector for the VM auto-restart handler
#[derive(Clone, Default)]
pub struct Metrics;

impl Metrics {
    /// Record the decision an invocation reached
    pub fn record_decision(&self, decision: &Decision, instance: &str) {
        info!(
            decision = decision.label(),
            instance = %instance,
            "Recorded restart decision"
        );
    }

    /// Record a start command sent to the compute API
    pub fn record_restart(&self, instance: &str) {
        info!(instance = %instance, "Recorded instance restart");
    }

    /// Record an invocation that failed
    pub fn record_error(&self, error_type: &str, instance: &str) {
        warn!(
            error_type = %error_type,
            instance = %instance,
            "Recorded error"
        );
    }
}
