//! VM Auto-Restart - restarts a compute instance after it has been preempted
//!
//! Each trigger runs one evaluation: fetch the instance descriptor, check its
//! status and `auto-restart` metadata flag, look through the recent operation
//! history for a preemption, and only then issue a start command. Every remote
//! failure is fatal to the invocation; retry policy belongs to whatever hosts
//! the trigger.

pub mod auth;
pub mod compute;
pub mod config;
pub mod decision;
pub mod error;
pub mod handler;
pub mod metrics;
pub mod server;

pub use auth::{AuthToken, MetadataServerTokenProvider, StaticTokenProvider, TokenProvider};
pub use compute::{ComputeApi, HttpComputeClient};
pub use config::Config;
pub use decision::Decision;
pub use error::HandlerError;
pub use handler::{InvocationOutcome, RestartHandler};
pub use metrics::Metrics;
