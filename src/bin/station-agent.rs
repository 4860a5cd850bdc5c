use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use reqwest::Client;
use tracing::{info, warn};

use station_agent::login::build_login_provider;
use station_agent::refresh::SingleFlightRefresher;
use station_agent::resilience::ResilientCaller;
use station_agent::server;
use station_agent::stations::StationCommandDispatcher;
use station_agent::store::{MemoryTokenStore, SqlTokenStore, TokenStore};
use station_agent::utils::config_loader;
use station_agent::utils::logging;
use station_agent::utils::logging::LogLevel;
use station_agent::vendor::VendorClient;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, env = "CONFIG", default_value = "station-agent.yaml")]
    config: String,
    #[arg(long, env = "LOG_LEVEL", value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // -------------------------------
    // 1. Load YAML config, start logging
    // -------------------------------

    let args = Args::parse();
    let service_config = config_loader::run(&args.config).await?;
    logging::run(&service_config, args.log_level).await?;

    // -------------------------------
    // 2. Token store
    // -------------------------------

    let store: Arc<dyn TokenStore> = match &service_config.database {
        Some(database) => Arc::new(
            SqlTokenStore::connect(database)
                .await
                .context("cannot open token store")?,
        ),
        None => {
            warn!("no database configured, tokens are kept in memory only");
            Arc::new(MemoryTokenStore::new())
        }
    };

    // -------------------------------
    // 3. Login, refresh, resilient caller
    // -------------------------------

    let client = Client::builder()
        .build()
        .context("cannot build http client")?;
    let refresh = service_config.settings.refresh.clone().unwrap_or_default();

    let login = build_login_provider(&service_config.login, &client);
    let refresher = SingleFlightRefresher::new(login, store.clone(), refresh.grace_window(), refresh.login_timeout());
    let caller = ResilientCaller::new(store, refresher, service_config.vendor.timeout());

    // -------------------------------
    // 4. Station commands over the vendor API
    // -------------------------------

    let vendor = VendorClient::new(client, service_config.vendor.clone());
    let dispatcher = StationCommandDispatcher::new(caller, vendor);

    // -------------------------------
    // 5. Serve
    // -------------------------------

    info!("Service starting...");
    server::server::start(&service_config.settings, dispatcher).await
}
