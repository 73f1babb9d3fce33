//! TOML snapshots of a hats forest.
//!
//! This crate provides tools for:
//! - Parsing snapshot files describing trees, wearers and links
//! - Replaying them into a [`MemoryLedger`]
//! - Rejecting snapshots whose link table contains a cycle
//!
//! # Usage
//!
//! ```ignore
//! let snapshot = hats_tree_snapshot::load("forest.toml")?;
//! let level = snapshot.resolver().global_level(hat)?;
//! let transition = snapshot.linkage().request(caller, domain, admin)?;
//! ```
//!
//! # File Format
//!
//! ```toml
//! captured_at = "2026-10-18T12:00:00Z"   # optional, RFC 3339
//!
//! [policy]                               # optional, validator tunables
//! max_string_len = 7000
//! hop_budget = 16
//!
//! [hats]                                 # ancestors are added automatically
//! paths = ["1.1.2", "2.1", "0x00000003..."]
//!
//! [[wearers]]
//! address = "0x0101010101010101010101010101010101010101"
//! hats = ["1", "2.1"]
//!
//! [[links]]
//! domain = 2
//! admin = "1.1"
//! status = "approved"                    # or "requested"; default approved
//! pending = "1.2"                        # optional: approved link with a move request
//! ```

mod toml_parser;

pub use toml_parser::{
    dotted, parse_hat_ref, HatDef, LinkEntry, SnapshotConfig, SnapshotConfigError, WearerEntry,
};

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use hats_tree::{
    root_id, HatsError, HatsReader, LedgerError, LinkageMachine, MemoryLedger, Resolver,
    ValidatorConfig,
};
use thiserror::Error;
use tracing::{debug, info};

/// Read a snapshot file and replay it into a fresh ledger.
pub fn load(path: impl AsRef<Path>) -> Result<Snapshot, SnapshotError> {
    let path = path.as_ref();
    let config = SnapshotConfig::from_file(path)?;
    let snapshot = Snapshot::from_config(config)?;
    info!(
        path = %path.display(),
        hats = snapshot.ledger.len(),
        "loaded hats snapshot"
    );
    Ok(snapshot)
}

/// A replayed snapshot: the ledger plus the policy it was captured under.
#[derive(Debug, Clone)]
pub struct Snapshot {
    ledger: MemoryLedger,
    policy: ValidatorConfig,
    captured_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    /// Replay a parsed snapshot.
    ///
    /// Hats go in parents first, then wearers, then links. Every linked
    /// domain must reach an unlinked tippy top within the hop budget.
    pub fn from_config(config: SnapshotConfig) -> Result<Self, SnapshotError> {
        let mut ledger = MemoryLedger::new();

        for hat in config.hats() {
            ledger.insert_hat(hat.id)?;
        }

        for wearer in &config.wearers {
            for &hat in &wearer.hats {
                ledger.mint(hat, wearer.address)?;
            }
        }

        for link in &config.links {
            let top = root_id(link.domain);
            if !ledger.contains(top) {
                return Err(LedgerError::HatNotFound(top).into());
            }
            let admins = [link.record.approved_admin(), link.record.requested_admin()];
            if let Some(missing) = admins.into_iter().flatten().find(|&a| !ledger.contains(a)) {
                return Err(LedgerError::HatNotFound(missing).into());
            }
            ledger.set_link(link.domain, link.record);
        }

        let snapshot = Self {
            ledger,
            policy: config.policy,
            captured_at: config.captured_at,
        };

        let resolver = snapshot.resolver();
        for link in &config.links {
            let top = resolver
                .tippy_top_domain(link.domain)
                .map_err(SnapshotError::Inconsistent)?;
            debug!(domain = link.domain, tippy_top = top, "link replayed");
        }

        Ok(snapshot)
    }

    pub fn ledger(&self) -> &MemoryLedger {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut MemoryLedger {
        &mut self.ledger
    }

    pub fn into_ledger(self) -> MemoryLedger {
        self.ledger
    }

    pub fn policy(&self) -> &ValidatorConfig {
        &self.policy
    }

    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.captured_at
    }

    /// Time elapsed since capture, if the snapshot is timestamped.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.captured_at.map(|at| now - at)
    }

    /// Untimestamped snapshots are always stale.
    pub fn is_stale(&self, now: DateTime<Utc>, max_age: Duration) -> bool {
        self.age(now).is_none_or(|age| age > max_age)
    }

    /// Resolver bounded by the policy's hop budget.
    pub fn resolver(&self) -> Resolver<'_, MemoryLedger> {
        let budget = self
            .policy
            .hop_budget
            .unwrap_or_else(|| self.ledger.known_root_count());
        Resolver::with_hop_budget(&self.ledger, budget)
    }

    /// Linkage machine reading this snapshot under its policy.
    pub fn linkage(&self) -> LinkageMachine<'_, MemoryLedger> {
        LinkageMachine::new(&self.ledger, &self.policy)
    }
}

/// Errors from loading a snapshot.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("Config error: {0}")]
    Config(#[from] SnapshotConfigError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    /// The link table does not form a forest.
    #[error("Inconsistent links: {0}")]
    Inconsistent(HatsError),
}
