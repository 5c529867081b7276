//! Server context: the single value threaded through dispatch so no
//! handler ever reaches for a global.

use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::Config;
use crate::events::EventBus;
use crate::files;
use crate::store::{Store, UidGen};

/// What an oper asked the process to do with itself (DIE/RESTART). The
/// core loop checks this after every command and tears down accordingly;
/// `main` turns `Restart` into a re-exec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShutdownKind {
    /// Exit cleanly with status 0.
    Die,
    /// Re-exec the current binary with the original arguments.
    Restart,
}

/// Everything a command handler needs: entity store, config snapshot,
/// event bus, and the UID generator. Owned outright by the single core
/// loop; no interior mutability beyond the config snapshot, which is
/// read far more often than it is replaced (on `REHASH`).
pub struct Server {
    /// Process-wide user/channel indices.
    pub store: Store,
    /// Read-mostly configuration snapshot, swapped wholesale on REHASH.
    pub config: RwLock<Arc<Config>>,
    /// Typed event/hook bus.
    pub events: EventBus,
    /// Per-session UID allocator.
    pub uid_gen: UidGen,
    /// Unix seconds at startup, for LUSERS-style uptime reporting.
    pub start_time: i64,
    /// Path the config was loaded from, for REHASH. `None` in unit tests
    /// that build a config in memory; REHASH reports an error then.
    pub config_path: Option<String>,
    /// MOTD lines, pre-wrapped to the numeric budget. `None` means reply
    /// `ERR_NOMOTD`.
    pub motd: Option<Vec<String>>,
    /// RULES lines, same shape as the MOTD.
    pub rules: Option<Vec<String>>,
    /// Set by DIE/RESTART; the core loop exits when it sees this.
    pub shutdown: Option<ShutdownKind>,
}

impl Server {
    /// Build a fresh server context from a validated configuration.
    pub fn new(config: Config) -> Self {
        let config = Arc::new(config);
        let casemap = config.casemap();
        let sid = config.server.sid.clone();
        Server {
            store: Store::new(casemap),
            config: RwLock::new(config),
            events: EventBus::new(),
            uid_gen: UidGen::new(sid),
            start_time: unix_now(),
            config_path: None,
            motd: None,
            rules: None,
            shutdown: None,
        }
    }

    /// Record where the config came from, for later REHASH reloads.
    pub fn with_config_path(mut self, path: impl Into<String>) -> Self {
        self.config_path = Some(path.into());
        self
    }

    /// A cloned handle to the current config snapshot.
    pub fn config(&self) -> Arc<Config> {
        self.config.read().clone()
    }

    /// Replace the config snapshot wholesale (REHASH), rebuilding the
    /// entity store's indices if the casemap changed and re-reading the
    /// MOTD/RULES files.
    pub fn rehash(&mut self, new_config: Config) {
        let new_casemap = new_config.casemap();
        let casemap_changed = new_casemap != self.store.casemap();
        *self.config.write() = Arc::new(new_config);
        if casemap_changed {
            self.store.rebuild_indices(new_casemap);
        }
        self.reload_text_files();
    }

    /// (Re)load the MOTD and RULES files named in `[files]`, wrapping each
    /// line to fit the numeric reply budget.
    pub fn reload_text_files(&mut self) {
        let config = self.config();
        let width = motd_width(&config);
        self.motd = config
            .files
            .motd_path
            .as_deref()
            .and_then(|p| files::load_text_file(p, width));
        self.rules = config
            .files
            .rules_path
            .as_deref()
            .and_then(|p| files::load_text_file(p, width));
    }
}

/// Usable trailing width for one MOTD line: the wire budget minus the
/// `:<server> 372 <nick> :- ` framing (nick length estimated at the
/// configured maximum).
fn motd_width(config: &Config) -> usize {
    let overhead = config.server.name.len() + config.limits.nick_max + 12;
    config.limits.max_line_length.saturating_sub(overhead).max(32)
}

fn unix_now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
