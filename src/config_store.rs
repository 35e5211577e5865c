// SPDX-FileCopyrightText: 2025 Alexandre Gomes Gaigalas <alganet@gmail.com>
//
// SPDX-License-Identifier: ISC

//! Process-wide configuration snapshot, swapped whole on reload.
//!
//! Readers take an `Arc` to the current snapshot and keep it for the lifetime
//! of one probe, so a reload mid-probe never mixes old and new scope fields.

use crate::config::Config;
use arc_swap::ArcSwap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info};

pub struct ConfigStore {
    current: ArcSwap<Config>,
    path: Option<PathBuf>,
}

impl ConfigStore {
    /// Store with a fixed snapshot and no backing file.
    pub fn new(config: Config) -> Self {
        Self {
            current: ArcSwap::from_pointee(config),
            path: None,
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let config = Config::load_from_path(&path).await?;
        info!(path = %path.display(), scopes = config.scopes.len(), "configuration loaded");
        Ok(Self {
            current: ArcSwap::from_pointee(config),
            path: Some(path),
        })
    }

    pub fn snapshot(&self) -> Arc<Config> {
        self.current.load_full()
    }

    pub fn replace(&self, config: Config) {
        self.current.store(Arc::new(config));
    }

    /// Re-read the backing file. On failure the current snapshot stays active.
    pub async fn reload(&self) -> anyhow::Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        match Config::load_from_path(path).await {
            Ok(config) => {
                let scopes = config.scopes.len();
                self.replace(config);
                info!(path = %path.display(), scopes, "configuration reloaded");
                Ok(())
            }
            Err(e) => {
                error!(path = %path.display(), %e, "configuration reload failed, keeping previous");
                Err(e)
            }
        }
    }

    /// Reload on every SIGHUP until the process exits.
    #[cfg(unix)]
    pub fn watch_sighup(self: Arc<Self>) -> anyhow::Result<tokio::task::JoinHandle<()>> {
        use tokio::signal::unix::{signal, SignalKind};

        let mut hangups = signal(SignalKind::hangup())?;
        Ok(tokio::spawn(async move {
            while hangups.recv().await.is_some() {
                info!("SIGHUP received");
                let _ = self.reload().await;
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::fs;
    use uuid::Uuid;

    fn scope_toml(timeout_secs: u64, code: u16) -> String {
        format!(
            "[scopes.default]\ntimeout = {timeout_secs}\n\n[[scopes.default.http.fail_if]]\nmodule = \"status_code_set\"\nvalue = \"{code}\"\n"
        )
    }

    #[tokio::test]
    async fn reload_swaps_snapshot() -> anyhow::Result<()> {
        let tmp = std::env::temp_dir().join(format!("tunnel-probe_store_{}.toml", Uuid::new_v4()));
        fs::write(&tmp, scope_toml(1, 500)).await?;
        let store = ConfigStore::load(&tmp).await?;
        let before = store.snapshot();

        fs::write(&tmp, scope_toml(2, 404)).await?;
        store.reload().await?;

        let after = store.snapshot();
        assert_eq!(
            before.scope(None).map(|s| s.timeout),
            Some(Duration::from_secs(1))
        );
        assert_eq!(
            after.scope(None).map(|s| s.timeout),
            Some(Duration::from_secs(2))
        );
        fs::remove_file(&tmp).await?;
        Ok(())
    }

    #[tokio::test]
    async fn failed_reload_keeps_previous() -> anyhow::Result<()> {
        let tmp = std::env::temp_dir().join(format!("tunnel-probe_store_{}.toml", Uuid::new_v4()));
        fs::write(&tmp, scope_toml(3, 500)).await?;
        let store = ConfigStore::load(&tmp).await?;

        fs::write(&tmp, "[[scopes.default.http.fail_if]]\nmodule = \"body_regex\"\nvalue = \"(\"\n")
            .await?;
        assert!(store.reload().await.is_err());
        assert_eq!(
            store.snapshot().scope(None).map(|s| s.timeout),
            Some(Duration::from_secs(3))
        );
        fs::remove_file(&tmp).await?;
        Ok(())
    }

    #[tokio::test]
    async fn reload_without_path_is_noop() {
        let store = ConfigStore::new(Config::default());
        store.reload().await.expect("noop");
        assert!(store.snapshot().scope(None).is_some());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn readers_never_observe_mixed_snapshots() {
        let cfg_a = Config::from_toml_str(&scope_toml(1, 500)).expect("a");
        let cfg_b = Config::from_toml_str(&scope_toml(2, 404)).expect("b");
        let store = Arc::new(ConfigStore::new(cfg_a.clone()));

        let writer = {
            let store = store.clone();
            tokio::spawn(async move {
                for i in 0..500 {
                    let next = if i % 2 == 0 { cfg_b.clone() } else { cfg_a.clone() };
                    store.replace(next);
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut readers = Vec::new();
        for _ in 0..4 {
            let store = store.clone();
            readers.push(tokio::spawn(async move {
                for _ in 0..500 {
                    let snap = store.snapshot();
                    let scope = snap.scope(None).expect("scope");
                    let pair = (scope.timeout.as_secs(), scope.http.fail_if[0].value.as_str());
                    assert!(pair == (1, "500") || pair == (2, "404"), "{pair:?}");
                    tokio::task::yield_now().await;
                }
            }));
        }

        writer.await.expect("writer");
        for r in readers {
            r.await.expect("reader");
        }
    }
}
