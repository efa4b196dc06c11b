//! Configuration for the VM auto-restart handler

use crate::error::HandlerError;
use clap::Parser;

pub const DEFAULT_PROJECT: &str = "onix-ai-oneuptime-production";
pub const DEFAULT_ZONE: &str = "northamerica-northeast1-a";
pub const DEFAULT_INSTANCE: &str = "oneuptime-production";
pub const DEFAULT_COMPUTE_BASE_URL: &str = "https://compute.googleapis.com/compute/v1";
/// Operations record their targetLink under www.googleapis.com, not the
/// compute.googleapis.com host the API is queried on.
pub const DEFAULT_TARGET_LINK_BASE_URL: &str = "https://www.googleapis.com/compute/v1";
pub const DEFAULT_METADATA_SERVER_URL: &str = "http://metadata.google.internal";

/// Configuration for the VM auto-restart handler
#[derive(Debug, Clone, Parser)]
#[command(name = "vm-auto-restart")]
#[command(about = "Restarts a compute instance when its last stop was a preemption")]
pub struct Config {
    /// Project that owns the instance
    #[arg(long, env, default_value = DEFAULT_PROJECT)]
    pub project: String,

    /// Zone the instance runs in
    #[arg(long, env, default_value = DEFAULT_ZONE)]
    pub zone: String,

    /// Instance name
    #[arg(long, env, default_value = DEFAULT_INSTANCE)]
    pub instance: String,

    /// Compute API base URL used for every request
    #[arg(long, env, default_value = DEFAULT_COMPUTE_BASE_URL)]
    pub compute_base_url: String,

    /// Base URL used to build the targetLink in the operations filter
    #[arg(long, env, default_value = DEFAULT_TARGET_LINK_BASE_URL)]
    pub target_link_base_url: String,

    /// Metadata server used to obtain default service account tokens
    #[arg(long, env, default_value = DEFAULT_METADATA_SERVER_URL)]
    pub metadata_server_url: String,

    /// Static bearer token (skips the metadata server when set)
    #[arg(long, env, hide_env_values = true)]
    pub access_token: Option<String>,

    /// Number of most recent operations to inspect for a preemption
    #[arg(long, env, default_value_t = 10)]
    pub max_operations: u32,

    /// Compute API and metadata server timeout in seconds
    #[arg(long, env, default_value_t = 30)]
    pub http_timeout_secs: u64,

    /// Dry-run mode (evaluate, but never issue the start command)
    #[arg(long, env)]
    pub dry_run: bool,

    /// Run a single invocation and exit instead of serving HTTP triggers
    #[arg(long, env)]
    pub once: bool,

    /// HTTP trigger port
    #[arg(long, env, default_value_t = 8080)]
    pub port: u16,

    /// Output logs in JSON format
    #[arg(long, env)]
    pub log_json: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            project: DEFAULT_PROJECT.to_string(),
            zone: DEFAULT_ZONE.to_string(),
            instance: DEFAULT_INSTANCE.to_string(),
            compute_base_url: DEFAULT_COMPUTE_BASE_URL.to_string(),
            target_link_base_url: DEFAULT_TARGET_LINK_BASE_URL.to_string(),
            metadata_server_url: DEFAULT_METADATA_SERVER_URL.to_string(),
            access_token: None,
            max_operations: 10,
            http_timeout_secs: 30,
            dry_run: false,
            once: false,
            port: 8080,
            log_json: false,
        }
    }
}

impl Config {
    /// Parse configuration from command-line args and environment variables
    pub fn parse_config() -> Self {
        Config::parse()
    }

    /// Check identifiers and URLs before any remote call is made
    pub fn validate(&self) -> Result<(), HandlerError> {
        for (name, value) in [
            ("project", &self.project),
            ("zone", &self.zone),
            ("instance", &self.instance),
        ] {
            if value.trim().is_empty() {
                return Err(HandlerError::Config {
                    message: format!("{} must not be empty", name),
                });
            }
        }

        for (name, url) in [
            ("compute_base_url", &self.compute_base_url),
            ("target_link_base_url", &self.target_link_base_url),
            ("metadata_server_url", &self.metadata_server_url),
        ] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(HandlerError::Config {
                    message: format!(
                        "Invalid {} format: {}. Must start with http:// or https://",
                        name, url
                    ),
                });
            }
        }

        if self.max_operations == 0 {
            return Err(HandlerError::Config {
                message: "max_operations must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    /// Zone-scoped API prefix, e.g. `{base}/projects/{project}/zones/{zone}`
    pub fn zone_url(&self) -> String {
        format!(
            "{}/projects/{}/zones/{}",
            self.compute_base_url.trim_end_matches('/'),
            self.project,
            self.zone
        )
    }

    pub fn instance_url(&self) -> String {
        format!("{}/instances/{}", self.zone_url(), self.instance)
    }

    pub fn start_url(&self) -> String {
        format!("{}/start", self.instance_url())
    }

    pub fn operations_url(&self) -> String {
        format!("{}/operations", self.zone_url())
    }

    /// targetLink the operations API stores for this instance
    pub fn target_link(&self) -> String {
        format!(
            "{}/projects/{}/zones/{}/instances/{}",
            self.target_link_base_url.trim_end_matches('/'),
            self.project,
            self.zone,
            self.instance
        )
    }

    pub fn operations_filter(&self) -> String {
        format!("targetLink=\"{}\"", self.target_link())
    }
}
