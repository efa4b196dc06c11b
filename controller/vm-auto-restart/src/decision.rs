//! Pure decision gates
//!
//! Nothing here performs I/O. The handler feeds in what it fetched and acts
//! on the result.

use crate::compute::{InstanceStatus, MetadataItem, OperationRecord};
use chrono::{DateTime, FixedOffset};

pub const AUTO_RESTART_KEY: &str = "auto-restart";
pub const AUTO_RESTART_ENABLED: &str = "true";
pub const PREEMPTED_OPERATION: &str = "compute.instances.preempted";
pub const MANUAL_STOP_OPERATIONS: [&str; 2] = ["stop", "suspend"];

/// Outcome of a single evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Instance is running or in transition
    NoActionNeeded { status: InstanceStatus },
    /// `auto-restart` metadata is missing or not exactly `"true"`
    AutoRestartDisabled,
    /// Last relevant operation was not a preemption
    NotPreempted,
    /// Start command issued
    Restarted,
    /// Would have restarted, but dry-run is enabled
    DryRun,
}

impl Decision {
    /// Message returned to the trigger
    pub fn message(&self, instance: &str) -> String {
        match self {
            Decision::NoActionNeeded { status } => {
                format!("VM is {}, no action needed", status)
            }
            Decision::AutoRestartDisabled => {
                "auto-restart metadata is not 'true', skipping".to_string()
            }
            Decision::NotPreempted => {
                "VM was not preempted (likely manual stop), skipping".to_string()
            }
            Decision::Restarted => format!("VM was preempted, restarting {}", instance),
            Decision::DryRun => format!(
                "VM was preempted, dry-run enabled, not restarting {}",
                instance
            ),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Decision::NoActionNeeded { .. } => "no_action_needed",
            Decision::AutoRestartDisabled => "auto_restart_disabled",
            Decision::NotPreempted => "not_preempted",
            Decision::Restarted => "restarted",
            Decision::DryRun => "dry_run",
        }
    }
}

/// Result of walking the operation history
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreemptionScan {
    /// A preemption was found before any manual stop
    Preempted { position: usize },
    /// A manual stop or suspend is more recent than any preemption
    ManualStop { operation_type: String },
    /// Neither appeared in the inspected records
    NoMatch,
}

impl PreemptionScan {
    pub fn was_preempted(&self) -> bool {
        matches!(self, PreemptionScan::Preempted { .. })
    }
}

/// Exact, case-sensitive match on `auto-restart=true`
pub fn auto_restart_enabled(items: &[MetadataItem]) -> bool {
    items
        .iter()
        .any(|item| item.key == AUTO_RESTART_KEY && item.value == AUTO_RESTART_ENABLED)
}

/// Walk operations in the order given (most recent first) and stop at the
/// first preemption or manual stop/suspend.
pub fn scan_preemption(operations: &[OperationRecord]) -> PreemptionScan {
    for (position, op) in operations.iter().enumerate() {
        if op.operation_type == PREEMPTED_OPERATION {
            return PreemptionScan::Preempted { position };
        }
        if MANUAL_STOP_OPERATIONS.contains(&op.operation_type.as_str()) {
            return PreemptionScan::ManualStop {
                operation_type: op.operation_type.clone(),
            };
        }
    }
    PreemptionScan::NoMatch
}

/// Check the most-recent-first contract against `insertTime`. Records with a
/// missing or unparsable timestamp are skipped.
pub fn is_most_recent_first(operations: &[OperationRecord]) -> bool {
    let times: Vec<DateTime<FixedOffset>> = operations
        .iter()
        .filter_map(|op| op.insert_time.as_deref())
        .filter_map(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .collect();

    times.windows(2).all(|pair| pair[0] >= pair[1])
}
