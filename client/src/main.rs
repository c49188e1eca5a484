//! Headless entry point for the Timekeeper client runtime.
//!
//! Initializes logging and configuration, restores any persisted session,
//! connects both state-sync services and keeps their caches live until
//! interrupted. It orchestrates the same startup the UI shell performs.

use std::sync::Arc;
use std::time::Duration;

use timekeeper_client::auth::service::SessionService;
use timekeeper_client::auth::store::FileTokenStore;
use timekeeper_client::config::Config;
use timekeeper_client::http::ApiClient;
use timekeeper_client::sync::{BrokerSettings, ClientSyncService, JobSyncService};
use tracing::{info, warn};
use tracing_subscriber::fmt::init;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init();

    let config = Config::from_env()?;
    info!("starting Timekeeper client against {}", config.api_base_url);

    let store = Arc::new(FileTokenStore::new(&config.token_store_path));
    let api = Arc::new(ApiClient::new(config.api_base_url.clone(), store)?);
    let session = SessionService::new(api.clone());

    match session.initialize().await {
        Ok(Some(user)) => info!(
            "session restored for {} (staff {:?})",
            user.username.as_deref().unwrap_or("<unknown>"),
            user.staff_uuid()
        ),
        Ok(None) => info!("no stored session, starting unauthenticated"),
        Err(e) => warn!("stored session could not be restored: {}", e),
    }

    let settings = BrokerSettings::from_config(&config);
    let jobs = JobSyncService::connect(&settings);
    let clients = ClientSyncService::connect(&settings);

    let mut forced_logout = api.forced_logout();
    let mut ticker = tokio::time::interval(Duration::from_secs(30));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                break;
            }
            changed = forced_logout.changed() => {
                if changed.is_ok() && *forced_logout.borrow() {
                    warn!("session expired, re-login required");
                }
            }
            _ = ticker.tick() => {
                info!(
                    "jobs: {} cached (connected: {}), clients: {} cached (connected: {})",
                    jobs.all_jobs().await.len(),
                    jobs.is_connected(),
                    clients.clients().await.len(),
                    clients.is_connected(),
                );
            }
        }
    }

    jobs.disconnect().await;
    clients.disconnect().await;
    Ok(())
}
