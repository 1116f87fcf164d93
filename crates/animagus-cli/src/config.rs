//! Process configuration: bundle path, store path, chain RPC URL, and
//! service listen address, loaded from a TOML file and overridable by
//! `clap`-parsed CLI flags, following `causality-cli`'s `clap::Parser`
//! style and `causality-api::config::ApiConfig`'s plain-struct-with-
//! `Default` shape.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Run the indexer and the Call/Stream service against a loaded bundle.
#[derive(Parser, Debug)]
#[command(name = "animagus")]
#[command(about = "Query-and-stream engine over a UTXO-style chain")]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file. Values there are overridden by any flag
    /// below that is also set.
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Path to the binary-serialized expression bundle (a `bincode`-encoded
    /// `Root`).
    #[arg(long)]
    pub bundle: Option<PathBuf>,

    /// Path to the RocksDB data directory.
    #[arg(long)]
    pub store_path: Option<PathBuf>,

    /// Chain JSON-RPC endpoint, e.g. `http://127.0.0.1:8114`.
    #[arg(long)]
    pub rpc_url: Option<String>,

    /// Address the Call/Stream HTTP service listens on.
    #[arg(long)]
    pub listen: Option<String>,
}

/// The resolved configuration the binary runs with, after merging the TOML
/// file (if any) with CLI overrides.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bundle: PathBuf,
    pub store_path: PathBuf,
    pub rpc_url: String,
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "127.0.0.1:8080".to_string()
}

impl Config {
    /// Build the effective config: start from the TOML file at `cli.config`
    /// (if given), then let any flag present on `cli` override the
    /// corresponding field.
    pub fn resolve(cli: &Cli) -> anyhow::Result<Self> {
        let mut config = match &cli.config {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .map_err(|e| anyhow::anyhow!("reading config file {}: {e}", path.display()))?;
                toml::from_str(&raw)
                    .map_err(|e| anyhow::anyhow!("parsing config file {}: {e}", path.display()))?
            }
            None => PartialConfig::default(),
        };

        if let Some(bundle) = &cli.bundle {
            config.bundle = Some(bundle.clone());
        }
        if let Some(store_path) = &cli.store_path {
            config.store_path = Some(store_path.clone());
        }
        if let Some(rpc_url) = &cli.rpc_url {
            config.rpc_url = Some(rpc_url.clone());
        }
        if let Some(listen) = &cli.listen {
            config.listen = Some(listen.clone());
        }

        Ok(Config {
            bundle: config.bundle.ok_or_else(|| anyhow::anyhow!("missing `bundle` (set in config file or --bundle)"))?,
            store_path: config
                .store_path
                .ok_or_else(|| anyhow::anyhow!("missing `store_path` (set in config file or --store-path)"))?,
            rpc_url: config.rpc_url.ok_or_else(|| anyhow::anyhow!("missing `rpc_url` (set in config file or --rpc-url)"))?,
            listen: config.listen.unwrap_or_else(default_listen),
        })
    }

    pub fn socket_addr(&self) -> std::net::SocketAddr {
        self.listen
            .parse()
            .unwrap_or_else(|e| panic!("invalid listen address {}: {e}", self.listen))
    }
}

/// Mirrors [`Config`] with every field optional, so a TOML file may omit
/// anything a CLI flag is going to supply instead.
#[derive(Debug, Clone, Default, Deserialize)]
struct PartialConfig {
    bundle: Option<PathBuf>,
    store_path: Option<PathBuf>,
    rpc_url: Option<String>,
    listen: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_flags_override_toml_file() {
        let dir = std::env::temp_dir().join(format!("animagus-cfg-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let config_path = dir.join("config.toml");
        std::fs::write(
            &config_path,
            "bundle = \"bundle.bin\"\nstore_path = \"./store\"\nrpc_url = \"http://node:8114\"\n",
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path.clone()),
            bundle: None,
            store_path: None,
            rpc_url: Some("http://override:8114".to_string()),
            listen: None,
        };
        let resolved = Config::resolve(&cli).unwrap();
        assert_eq!(resolved.bundle, PathBuf::from("bundle.bin"));
        assert_eq!(resolved.rpc_url, "http://override:8114");
        assert_eq!(resolved.listen, "127.0.0.1:8080");

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn missing_required_field_is_an_error() {
        let cli = Cli { config: None, bundle: None, store_path: Some("x".into()), rpc_url: Some("y".into()), listen: None };
        assert!(Config::resolve(&cli).is_err());
    }
}
