//! Hot reload of the access lists, allowed origins and audit switch.
//!
//! Everything else in the file is read once at startup; edits to it are
//! reported but not forwarded.

use std::path::{Path, PathBuf};
use std::time::Duration;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use crate::config::loader::load_config;
use crate::config::schema::GatewayConfig;

/// Watches the configuration file and forwards reloadable edits.
pub struct ConfigWatcher {
    path: PathBuf,
    current: GatewayConfig,
    update_tx: mpsc::UnboundedSender<GatewayConfig>,
}

impl ConfigWatcher {
    /// `current` is the configuration the server started with.
    pub fn new(path: &Path, current: GatewayConfig) -> (Self, mpsc::UnboundedReceiver<GatewayConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (
            Self {
                path: path.to_path_buf(),
                current,
                update_tx,
            },
            update_rx,
        )
    }

    /// Start watching in a background thread.
    ///
    /// The returned watcher must be kept alive for as long as reloads are wanted.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self { path, mut current, update_tx } = self;
        let watched = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    let next = match load_config(&path) {
                        Ok(next) => next,
                        Err(e) => {
                            tracing::error!(path = ?path, error = %e, "Rejected config edit, keeping current configuration");
                            return;
                        }
                    };
                    let changed = reloadable_changes(&current, &next);
                    if changed.is_empty() {
                        if restart_required(&current, &next) {
                            tracing::warn!(path = ?path, "Config edit touches settings that only apply after a restart");
                        } else {
                            tracing::debug!(path = ?path, "Config file touched without changes");
                        }
                        return;
                    }
                    tracing::info!(path = ?path, sections = ?changed, "Reloading configuration");
                    if update_tx.send(next.clone()).is_ok() {
                        current = next;
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::error!(error = ?e, "Config watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&watched, RecursiveMode::NonRecursive)?;
        tracing::info!(path = ?watched, "Config watcher started");
        Ok(watcher)
    }
}

/// Names of the hot-reloadable settings that differ between `old` and `new`.
pub fn reloadable_changes(old: &GatewayConfig, new: &GatewayConfig) -> Vec<&'static str> {
    let mut changed = Vec::new();
    if old.ip_guard.whitelist != new.ip_guard.whitelist {
        changed.push("ip_guard.whitelist");
    }
    if old.ip_guard.blacklist != new.ip_guard.blacklist {
        changed.push("ip_guard.blacklist");
    }
    if old.csrf.allowed_origins != new.csrf.allowed_origins {
        changed.push("csrf.allowed_origins");
    }
    if old.audit.enabled != new.audit.enabled {
        changed.push("audit.enabled");
    }
    changed
}

fn restart_required(old: &GatewayConfig, new: &GatewayConfig) -> bool {
    match (serde_json::to_value(old), serde_json::to_value(new)) {
        (Ok(a), Ok(b)) => a != b,
        _ => true,
    }
}
