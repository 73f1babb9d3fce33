//! TOML parser for hats snapshot files.

use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Utc};
use hats_tree::{
    layout, Address, Domain, HatId, LinkRecord, ValidatorConfig, MAX_LEVELS,
};
use serde::Deserialize;
use thiserror::Error;

/// Parsed snapshot description.
#[derive(Debug, Clone)]
pub struct SnapshotConfig {
    /// When the described state was read from the ledger, if known.
    pub captured_at: Option<DateTime<Utc>>,
    /// Validator tunables (`[policy]`).
    pub policy: ValidatorConfig,
    pub wearers: Vec<WearerEntry>,
    pub links: Vec<LinkEntry>,
    /// All hats, including auto-generated ancestors, parents first.
    hats: Vec<HatDef>,
}

/// A single hat with computed properties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HatDef {
    pub id: HatId,
    /// Dotted form: domain followed by child indices (e.g. "1.2.3").
    pub path: String,
    /// Local level (0 = top hat).
    pub depth: u8,
    pub parent: Option<HatId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WearerEntry {
    pub address: Address,
    pub hats: Vec<HatId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub domain: Domain,
    pub record: LinkRecord,
}

/// Raw TOML structure.
#[derive(Debug, Deserialize)]
struct RawSnapshot {
    /// RFC 3339 timestamp.
    captured_at: Option<String>,
    #[serde(default)]
    policy: ValidatorConfig,
    hats: RawHats,
    #[serde(default)]
    wearers: Vec<RawWearer>,
    #[serde(default)]
    links: Vec<RawLink>,
}

#[derive(Debug, Deserialize)]
struct RawHats {
    /// Dotted paths or 0x-prefixed ids
    paths: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawWearer {
    address: Address,
    hats: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawLink {
    domain: Domain,
    admin: String,
    /// "approved" (default) or "requested"
    status: Option<String>,
    /// Move request waiting on top of an approved link
    pending: Option<String>,
}

impl SnapshotConfig {
    /// Parse from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SnapshotConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            SnapshotConfigError::Io(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_str(&content)
    }

    /// Parse from a TOML string.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, SnapshotConfigError> {
        let raw: RawSnapshot =
            toml::from_str(content).map_err(|e| SnapshotConfigError::Parse(e.to_string()))?;

        let captured_at = raw
            .captured_at
            .as_deref()
            .map(|ts| {
                DateTime::parse_from_rfc3339(ts)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| {
                        SnapshotConfigError::Validation(format!(
                            "Invalid captured_at '{}': {}",
                            ts, e
                        ))
                    })
            })
            .transpose()?;

        let hats = Self::expand_paths(&raw.hats.paths)?;

        let wearers = raw
            .wearers
            .into_iter()
            .map(|w| {
                let hats = w
                    .hats
                    .iter()
                    .map(|h| parse_hat_ref(h))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(WearerEntry {
                    address: w.address,
                    hats,
                })
            })
            .collect::<Result<Vec<_>, SnapshotConfigError>>()?;

        let mut seen_domains = HashSet::new();
        let mut links = Vec::with_capacity(raw.links.len());
        for link in raw.links {
            if !seen_domains.insert(link.domain) {
                return Err(SnapshotConfigError::Validation(format!(
                    "Domain {} is linked more than once",
                    link.domain
                )));
            }
            let admin = parse_hat_ref(&link.admin)?;
            let pending = link.pending.as_deref().map(parse_hat_ref).transpose()?;
            let record = match (link.status.as_deref(), pending) {
                (None | Some("approved"), None) => LinkRecord::Approved(admin),
                (None | Some("approved"), Some(requested)) => LinkRecord::Relinking {
                    linked: admin,
                    requested,
                },
                (Some("requested"), None) => LinkRecord::Requested(admin),
                (Some("requested"), Some(_)) => {
                    return Err(SnapshotConfigError::Validation(format!(
                        "Domain {} has a pending move but no approved link",
                        link.domain
                    )));
                }
                (Some(other), _) => {
                    return Err(SnapshotConfigError::Validation(format!(
                        "Invalid link status '{}': expected 'approved' or 'requested'",
                        other
                    )));
                }
            };
            links.push(LinkEntry {
                domain: link.domain,
                record,
            });
        }

        Ok(Self {
            captured_at,
            policy: raw.policy,
            wearers,
            links,
            hats,
        })
    }

    /// Get all hats, parents before children.
    pub fn hats(&self) -> impl Iterator<Item = &HatDef> {
        self.hats.iter()
    }

    /// Get hat count.
    pub fn len(&self) -> usize {
        self.hats.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.hats.is_empty()
    }

    /// Expand paths to include all ancestor hats.
    ///
    /// e.g., "1.2.3" expands to ["1", "1.2", "1.2.3"]
    fn expand_paths(paths: &[String]) -> Result<Vec<HatDef>, SnapshotConfigError> {
        let mut seen: HashSet<HatId> = HashSet::new();
        let mut hats: Vec<HatDef> = Vec::new();

        for path in paths {
            let id = parse_hat_ref(path)?;
            let depth = layout::local_level(id);

            for level in 0..=depth {
                let ancestor = layout::admin_at_local_level(id, level);
                if seen.insert(ancestor) {
                    let parent = (level > 0).then(|| layout::admin_at_local_level(id, level - 1));
                    hats.push(HatDef {
                        id: ancestor,
                        path: dotted(ancestor),
                        depth: level as u8,
                        parent,
                    });
                }
            }
        }

        // Id order puts every parent before its children
        hats.sort_by_key(|h| h.id);

        Ok(hats)
    }
}

/// Parse a hat reference: a dotted path ("2.1.4") or a 0x-prefixed id.
pub fn parse_hat_ref(s: &str) -> Result<HatId, SnapshotConfigError> {
    if s.starts_with("0x") || s.starts_with("0X") {
        let id: HatId = s
            .parse()
            .map_err(|e: hats_tree::HatsError| SnapshotConfigError::Validation(e.to_string()))?;
        if !id.is_well_formed() {
            return Err(SnapshotConfigError::Validation(format!(
                "Invalid hat '{}': zero domain or gap in path",
                s
            )));
        }
        return Ok(id);
    }

    if s.is_empty() {
        return Err(SnapshotConfigError::Validation("Empty path not allowed".into()));
    }

    let mut parts = s.split('.');
    let domain: Domain = parts
        .next()
        .and_then(|d| d.parse().ok())
        .filter(|&d| d != 0)
        .ok_or_else(|| {
            SnapshotConfigError::Validation(format!(
                "Invalid path '{}': domain must be a nonzero 32-bit integer",
                s
            ))
        })?;

    let mut indices = Vec::new();
    for part in parts {
        let index: u16 = part.parse().ok().filter(|&i| i != 0).ok_or_else(|| {
            SnapshotConfigError::Validation(format!(
                "Invalid path '{}': segment '{}' must be an integer in 1..=65535",
                s, part
            ))
        })?;
        indices.push(index);
    }
    if indices.len() > MAX_LEVELS {
        return Err(SnapshotConfigError::Validation(format!(
            "Invalid path '{}': deeper than {} levels",
            s, MAX_LEVELS
        )));
    }

    HatId::from_path(domain, &indices).map_err(|e| SnapshotConfigError::Validation(e.to_string()))
}

/// Dotted form of a hat id, the inverse of [`parse_hat_ref`] for paths.
pub fn dotted(id: HatId) -> String {
    let depth = layout::local_level(id) as usize;
    let mut out = id.domain().to_string();
    for level in 0..depth {
        out.push('.');
        out.push_str(&id.segment_at(level).to_string());
    }
    out
}

/// Errors during snapshot parsing.
#[derive(Debug, Error)]
pub enum SnapshotConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Validation error: {0}")]
    Validation(String),
}
