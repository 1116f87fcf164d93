//! Process bootstrap: parse configuration, load and verify the expression
//! bundle, open the store and the chain RPC client, then run the indexer
//! as a background task alongside the Call/Stream HTTP service — matching
//! `causality-cli`'s `#[tokio::main]` + spawned-task shape.

mod bundle;
mod config;

use animagus_indexer::Indexer;
use animagus_rpc::HttpChainRpc;
use animagus_service::{ServiceConfig, ServiceState, Server};
use animagus_store::RocksStore;
use anyhow::Context;
use clap::Parser;
use config::{Cli, Config};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(&cli)?;

    let loaded = bundle::load(&config.bundle)?;

    let store: Arc<dyn animagus_store::Store> = Arc::new(
        RocksStore::open(&config.store_path)
            .with_context(|| format!("opening store at {}", config.store_path.display()))?,
    );
    let rpc: Arc<dyn animagus_rpc::ChainRpc> = Arc::new(HttpChainRpc::new(config.rpc_url.clone()));

    let indexer = Indexer::new(&loaded.bytes, loaded.root.clone(), store.clone(), rpc.clone())
        .context("starting indexer: bundle/store integrity check failed")?;

    let indexer_task = tokio::spawn(async move {
        if let Err(err) = indexer.run().await {
            tracing::error!(error = %err, "indexer loop exited fatally");
        }
    });

    let service_state = Arc::new(ServiceState::new(loaded.root, store, rpc));
    let service_config = ServiceConfig { host: host_of(&config.listen), port: port_of(&config.listen) };
    let server = Server::new(service_config, service_state);

    tokio::select! {
        result = server.start() => {
            result.context("call/stream service exited")?;
        }
        _ = indexer_task => {
            tracing::error!("indexer task ended before the service did; shutting down");
        }
    }

    Ok(())
}

fn host_of(listen: &str) -> String {
    listen.rsplit_once(':').map(|(host, _)| host.to_string()).unwrap_or_else(|| listen.to_string())
}

fn port_of(listen: &str) -> u16 {
    listen
        .rsplit_once(':')
        .and_then(|(_, port)| port.parse().ok())
        .unwrap_or_else(|| ServiceConfig::default().port)
}
