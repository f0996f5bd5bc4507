//! `dnh run`: serve until Ctrl-C.

use std::sync::Arc;

use tracing::{debug, info, warn};

use dnh_config::load_config;
use dnh_core::TracingSink;
use dnh_net::{HubAddrs, HubServer};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;
use crate::logging::init_tracing;

use super::{apply_overrides, is_local};

pub async fn handle(args: &RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let loaded = load_config(global.config.as_deref())?;
    let mut config = loaded.config;
    apply_overrides(&mut config, args);
    config.validate()?;

    let _guard = init_tracing(
        global.verbose,
        config.verbose,
        global.log_json,
        config.log_file.as_deref(),
    );

    match &loaded.source {
        Some(path) => info!(path = %path.display(), "loaded configuration"),
        None => info!("no configuration file found, using defaults"),
    }
    if !is_local(config.bind) {
        debug!(bind = %config.bind, "binding to a specific interface");
    }

    let server = HubServer::new(Arc::new(TracingSink), config.outbound_queue);
    let coordinator = server.coordinator();
    coordinator.apply_configuration(&config.to_hub_settings());

    server
        .start(HubAddrs {
            http: config.http_addr(),
            ws: config.ws_addr(),
        })
        .await?;

    let started = coordinator.finalize_initialization();
    debug!(count = started, "startup commands launched");
    server.spawn_pinger(config.ping_interval());

    let interrupted = tokio::signal::ctrl_c().await;
    if let Err(e) = &interrupted {
        warn!(error = %e, "could not listen for Ctrl-C, shutting down");
    }
    info!("shutting down");

    server.shutdown().await;
    let ended = coordinator.finalize_shutdown();
    debug!(count = ended, "end commands launched");

    interrupted.map_err(CliError::from)
}
