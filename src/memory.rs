//! In-memory hats ledger: a fabricated graph for tests, demos and snapshots.
//!
//! Implements [`HatsReader`] and models the part of the real ledger this crate
//! cares about: hats and their child counts, wearers, and the link table.
//! [`MemoryLedger::submit`] re-validates a [`Transition`] against the current
//! state before applying it, so a stale transition surfaces as a ledger
//! rejection rather than a validation failure.

use std::collections::{HashMap, HashSet};

use thiserror::Error;
use tracing::{debug, warn};

use crate::error::HatsError;
use crate::id::{Address, HatId};
use crate::layout::{self, local_level, parent_in_tree, root_id};
use crate::linkage::Transition;
use crate::reader::{HatsReader, LinkRecord};
use crate::resolver::Resolver;
use crate::validator::{LinkageValidator, ValidatorConfig};
use crate::Domain;

/// Errors from building or updating a [`MemoryLedger`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The ledger's own re-validation refused the transition.
    #[error("ledger rejected the transition: {0}")]
    Rejected(HatsError),

    /// The link record changed between validation and submission.
    #[error("link record of domain {domain} changed: expected {expected:?}, found {found:?}")]
    Stale {
        domain: Domain,
        expected: LinkRecord,
        found: LinkRecord,
    },

    #[error("transition for domain {domain} is missing its target or wearer")]
    Incomplete { domain: Domain },

    #[error("hat {0} does not exist")]
    HatNotFound(HatId),

    #[error("hat {0} already exists")]
    AlreadyExists(HatId),

    /// Domain `u32::MAX` is taken, so no higher domain is left to mint.
    #[error("no top-hat domain left after {last}")]
    DomainsExhausted { last: Domain },

    #[error(transparent)]
    Codec(#[from] HatsError),
}

/// Runtime entry for one hat.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HatEntry {
    pub id: HatId,
    /// Children ever created; the next child gets index `children + 1`.
    pub children: u16,
    pub details: String,
    pub image_uri: String,
    pub eligibility: Option<Address>,
    pub toggle: Option<Address>,
}

impl HatEntry {
    fn new(id: HatId) -> Self {
        Self {
            id,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct MemoryLedger {
    /// Highest top-hat domain issued so far.
    last_top_hat: u32,
    /// Number of top hats, which need not be contiguous.
    roots: u32,
    hats: HashMap<HatId, HatEntry>,
    wearers: HashMap<HatId, HashSet<Address>>,
    links: HashMap<Domain, LinkRecord>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the next top hat and give it to `wearer`.
    pub fn mint_top_hat(&mut self, wearer: Address) -> Result<HatId, LedgerError> {
        let domain = self
            .last_top_hat
            .checked_add(1)
            .ok_or(LedgerError::DomainsExhausted {
                last: self.last_top_hat,
            })?;
        self.last_top_hat = domain;
        self.roots += 1;
        let id = root_id(domain);
        self.hats.insert(id, HatEntry::new(id));
        self.wearers.entry(id).or_default().insert(wearer);
        Ok(id)
    }

    /// Create the next child of `admin`.
    pub fn create_hat(&mut self, admin: HatId) -> Result<HatId, LedgerError> {
        let parent = self
            .hats
            .get_mut(&admin)
            .ok_or(LedgerError::HatNotFound(admin))?;
        let id = layout::child_id(admin, u32::from(parent.children) + 1)?;
        parent.children += 1;
        self.hats.insert(id, HatEntry::new(id));
        Ok(id)
    }

    /// Insert a hat with a known identifier. Its parent must already exist.
    ///
    /// Used when replaying a snapshot; child counters grow to cover `id`.
    pub fn insert_hat(&mut self, id: HatId) -> Result<(), LedgerError> {
        if !id.is_well_formed() {
            return Err(HatsError::MalformedIdentifier {
                id,
                reason: "zero domain or gap in path",
            }
            .into());
        }
        if self.hats.contains_key(&id) {
            return Err(LedgerError::AlreadyExists(id));
        }
        let level = local_level(id);
        if level == 0 {
            self.last_top_hat = self.last_top_hat.max(id.domain());
            self.roots += 1;
        } else {
            let parent_id = parent_in_tree(id)?;
            let parent = self
                .hats
                .get_mut(&parent_id)
                .ok_or(LedgerError::HatNotFound(parent_id))?;
            let index = id.segment_at(level as usize - 1);
            parent.children = parent.children.max(index);
        }
        self.hats.insert(id, HatEntry::new(id));
        Ok(())
    }

    /// Give `hat` to `wearer`.
    pub fn mint(&mut self, hat: HatId, wearer: Address) -> Result<(), LedgerError> {
        if !self.hats.contains_key(&hat) {
            return Err(LedgerError::HatNotFound(hat));
        }
        self.wearers.entry(hat).or_default().insert(wearer);
        Ok(())
    }

    /// Take `hat` away from `wearer`. Returns `true` if they wore it.
    pub fn remove_wearer(&mut self, hat: HatId, wearer: Address) -> bool {
        self.wearers
            .get_mut(&hat)
            .is_some_and(|set| set.remove(&wearer))
    }

    /// Overwrite a link record without any checks.
    ///
    /// Lets tests fabricate any graph, including corrupted (cyclic) ones.
    pub fn set_link(&mut self, domain: Domain, record: LinkRecord) {
        if record.is_none() {
            self.links.remove(&domain);
        } else {
            self.links.insert(domain, record);
        }
    }

    pub fn hat(&self, id: HatId) -> Option<&HatEntry> {
        self.hats.get(&id)
    }

    pub fn contains(&self, id: HatId) -> bool {
        self.hats.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.hats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hats.is_empty()
    }

    /// All hats, sorted by identifier (a depth-first walk of each tree).
    pub fn hats(&self) -> Vec<HatId> {
        let mut ids: Vec<HatId> = self.hats.keys().copied().collect();
        ids.sort();
        ids
    }

    /// Domains with a pending or approved link.
    pub fn links(&self) -> impl Iterator<Item = (Domain, LinkRecord)> + '_ {
        self.links.iter().map(|(&domain, &record)| (domain, record))
    }

    /// Apply `transition` on behalf of `caller`, re-validating it first.
    pub fn submit(
        &mut self,
        caller: Address,
        transition: &Transition,
        config: &ValidatorConfig,
    ) -> Result<(), LedgerError> {
        let domain = transition.domain;
        let found = self.link_record(domain);
        if found != transition.observed {
            warn!(domain, ?found, expected = ?transition.observed, "stale link transition");
            return Err(LedgerError::Stale {
                domain,
                expected: transition.observed,
                found,
            });
        }
        let mutation = transition
            .mutation()
            .ok_or(LedgerError::Incomplete { domain })?;
        LinkageValidator::new(&*self, config)
            .validate(caller, domain, &mutation)
            .map_err(LedgerError::Rejected)?;

        let record = transition.resulting_record();
        self.set_link(domain, record);
        if let Some(top) = self.hats.get_mut(&root_id(domain)) {
            let options = &transition.options;
            if let Some(details) = options.details.as_ref().filter(|d| !d.is_empty()) {
                top.details.clone_from(details);
            }
            if let Some(image_uri) = options.image_uri.as_ref().filter(|u| !u.is_empty()) {
                top.image_uri.clone_from(image_uri);
            }
            if options.eligibility.is_some() {
                top.eligibility = options.eligibility;
            }
            if options.toggle.is_some() {
                top.toggle = options.toggle;
            }
        }
        debug!(domain, kind = ?transition.kind, ?record, "link transition applied");
        Ok(())
    }
}

impl HatsReader for MemoryLedger {
    fn children_count(&self, hat: HatId) -> u16 {
        self.hats.get(&hat).map_or(0, |entry| entry.children)
    }

    fn is_root(&self, hat: HatId) -> bool {
        layout::is_local_root(hat) && self.hats.contains_key(&hat)
    }

    fn link_record(&self, domain: Domain) -> LinkRecord {
        self.links.get(&domain).copied().unwrap_or_default()
    }

    fn wears(&self, account: Address, hat: HatId) -> bool {
        self.wearers
            .get(&hat)
            .is_some_and(|set| set.contains(&account))
    }

    fn is_admin(&self, account: Address, hat: HatId) -> bool {
        Resolver::new(self)
            .is_admin_by_ancestry(account, hat)
            .unwrap_or_else(|err| {
                warn!(%account, %hat, %err, "admin check failed");
                false
            })
    }

    fn known_root_count(&self) -> u32 {
        self.roots
    }
}
