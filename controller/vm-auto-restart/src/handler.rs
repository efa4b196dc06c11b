//! Restart decision handler
//!
//! Runs the ordered, short-circuiting checks for one trigger:
//!
//! 1. acquire a bearer token
//! 2. fetch the instance descriptor
//! 3. status gate (only TERMINATED, STOPPED, SUSPENDED continue)
//! 4. `auto-restart=true` metadata gate
//! 5. preemption-history gate over the most recent operations
//! 6. start the instance
//!
//! Step 6 is the only mutation. Any remote failure aborts the invocation.

use crate::auth::TokenProvider;
use crate::compute::ComputeApi;
use crate::config::Config;
use crate::decision::{self, Decision, PreemptionScan};
use crate::error::HandlerError;
use crate::metrics::Metrics;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a successful invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvocationOutcome {
    pub decision: Decision,
    pub message: String,
}

impl InvocationOutcome {
    pub fn restarted(&self) -> bool {
        self.decision == Decision::Restarted
    }
}

/// Restart decision handler for a single configured instance
pub struct RestartHandler<T: TokenProvider, C: ComputeApi> {
    config: Config,
    token_provider: Arc<T>,
    compute: Arc<C>,
    metrics: Metrics,
}

impl<T: TokenProvider, C: ComputeApi> RestartHandler<T, C> {
    pub fn new(config: Config, token_provider: Arc<T>, compute: Arc<C>, metrics: Metrics) -> Self {
        Self {
            config,
            token_provider,
            compute,
            metrics,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one invocation
    pub async fn handle(&self) -> Result<InvocationOutcome, HandlerError> {
        let instance = &self.config.instance;

        match self.evaluate().await {
            Ok(decision) => {
                self.metrics.record_decision(&decision, instance);
                let message = decision.message(instance);
                info!(
                    instance = %instance,
                    decision = decision.label(),
                    "{}",
                    message
                );
                Ok(InvocationOutcome { decision, message })
            }
            Err(e) => {
                self.metrics.record_error(e.kind(), instance);
                Err(e)
            }
        }
    }

    async fn evaluate(&self) -> Result<Decision, HandlerError> {
        let instance = &self.config.instance;

        let token = self.token_provider.fetch_token().await?;

        let descriptor = self.compute.get_instance(&token).await?;
        debug!(
            instance = %instance,
            status = %descriptor.status,
            metadata_items = descriptor.metadata.items.len(),
            "Fetched instance descriptor"
        );

        if !descriptor.status.is_restartable() {
            return Ok(Decision::NoActionNeeded {
                status: descriptor.status,
            });
        }

        if !decision::auto_restart_enabled(&descriptor.metadata.items) {
            return Ok(Decision::AutoRestartDisabled);
        }

        let max_operations = self.config.max_operations;
        let mut operations = self.compute.list_operations(&token, max_operations).await?;
        operations.truncate(max_operations as usize);

        if !decision::is_most_recent_first(&operations) {
            warn!(
                instance = %instance,
                "Operations list is not ordered most-recent-first by insertTime; scanning in API order"
            );
        }

        match decision::scan_preemption(&operations) {
            PreemptionScan::Preempted { position } => {
                debug!(instance = %instance, position = position, "Found preemption");
            }
            PreemptionScan::ManualStop { operation_type } => {
                debug!(
                    instance = %instance,
                    operation_type = %operation_type,
                    "Manual stop is more recent than any preemption"
                );
                return Ok(Decision::NotPreempted);
            }
            PreemptionScan::NoMatch => {
                debug!(
                    instance = %instance,
                    inspected = operations.len(),
                    "No preemption in recent operations"
                );
                return Ok(Decision::NotPreempted);
            }
        }

        if self.config.dry_run {
            return Ok(Decision::DryRun);
        }

        self.compute.start_instance(&token).await?;
        self.metrics.record_restart(instance);
        Ok(Decision::Restarted)
    }
}
