// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tunnel_probe::config::Config;
use tunnel_probe::config_store::ConfigStore;
use tunnel_probe::engine::{direct::DirectEngine, xray::XrayEngine, TunnelEngine};
use tunnel_probe::probe::Prober;
use tunnel_probe::{client, serde_helpers, server};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum EngineKind {
    /// Run an xray-core subprocess per probe
    Xray,
    /// Dial targets directly, bypassing any tunnel
    Direct,
}

#[derive(Parser, Debug)]
#[command(name = "tunnel-probe", version)]
struct Args {
    /// Listen address, e.g. 0.0.0.0:9116
    #[arg(long, default_value = "0.0.0.0:9116")]
    listen: String,

    /// Optional TOML config path with probe scopes
    #[arg(long)]
    config: Option<String>,

    /// Tunnel engine used to reach targets
    #[arg(long, value_enum, default_value_t = EngineKind::Xray)]
    engine: EngineKind,

    /// Path to the xray binary
    #[arg(long, default_value = "xray")]
    xray_bin: String,

    /// Forward engine output to the log
    #[arg(long)]
    engine_debug: bool,

    /// How long to wait for the engine's local inbound to accept connections
    #[arg(long, default_value = "10s", value_parser = serde_helpers::duration::parse)]
    engine_startup_timeout: Duration,
}

impl Args {
    fn engine(&self) -> Arc<dyn TunnelEngine> {
        match self.engine {
            EngineKind::Xray => Arc::new(XrayEngine::new(
                &self.xray_bin,
                self.engine_startup_timeout,
                self.engine_debug,
            )),
            EngineKind::Direct => Arc::new(DirectEngine),
        }
    }

    async fn config_store(&self) -> anyhow::Result<ConfigStore> {
        match self.config {
            Some(ref p) => ConfigStore::load(p).await,
            None => Ok(ConfigStore::new(Config::default())),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let addr: SocketAddr = args.listen.parse()?;

    let store = Arc::new(args.config_store().await?);
    #[cfg(unix)]
    let _reloader = store.clone().watch_sighup()?;

    let engine = args.engine();
    info!(engine = engine.name(), "tunnel engine selected");

    let prober = Arc::new(Prober::new(store, engine, client::tls_config()?));
    let server = server::run_server(addr, prober);

    tokio::select! {
        res = server => {
            if let Err(e) = res {
                error!(%e, "server error");
            }
        }
        _ = signal::ctrl_c() => {
            info!("shutting down");
        }
    }

    Ok(())
}
