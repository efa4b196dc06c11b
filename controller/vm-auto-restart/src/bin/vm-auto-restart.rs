//! VM auto-restart binary - serves HTTP triggers or runs a single evaluation

use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use vm_auto_restart::{
    server, ComputeApi, Config, HttpComputeClient, MetadataServerTokenProvider, Metrics,
    RestartHandler, StaticTokenProvider, TokenProvider,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse configuration
    let config = Config::parse_config();

    // Initialize logging
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "vm_auto_restart=info,tower_http=info".into());
    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    config.validate()?;

    info!("Starting VM auto-restart handler");
    info!("Configuration:");
    info!("  Project: {}", config.project);
    info!("  Zone: {}", config.zone);
    info!("  Instance: {}", config.instance);
    info!("  Compute API: {}", config.compute_base_url);
    info!("  Target link: {}", config.target_link());
    info!("  Max operations: {}", config.max_operations);
    info!("  Dry-run: {}", config.dry_run);

    let compute = Arc::new(HttpComputeClient::new(&config)?);

    // Pick the credential source
    if let Some(token) = config.access_token.clone() {
        info!("Using static access token from configuration");
        let token_provider = Arc::new(StaticTokenProvider::new(token));
        run(config, token_provider, compute).await
    } else {
        info!(
            "Using metadata server credentials at {}",
            config.metadata_server_url
        );
        let token_provider = Arc::new(MetadataServerTokenProvider::new(&config)?);
        run(config, token_provider, compute).await
    }
}

/// Run the handler with the selected token provider
async fn run<T, C>(config: Config, token_provider: Arc<T>, compute: Arc<C>) -> anyhow::Result<()>
where
    T: TokenProvider + 'static,
    C: ComputeApi + 'static,
{
    let once = config.once;
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let handler = Arc::new(RestartHandler::new(
        config,
        token_provider,
        compute,
        Metrics,
    ));

    if once {
        return match handler.handle().await {
            Ok(outcome) => {
                println!("{}", outcome.message);
                Ok(())
            }
            Err(e) => {
                error!("Invocation failed: {}", e);
                Err(e.into())
            }
        };
    }

    match server::serve(addr, handler).await {
        Ok(()) => {
            info!("Trigger server exited normally");
            Ok(())
        }
        Err(e) => {
            error!("Trigger server failed: {}", e);
            Err(e)
        }
    }
}
