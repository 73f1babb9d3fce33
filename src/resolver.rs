//! Link-aware ancestry and level queries.
//!
//! Inside one tree everything follows from the identifier bits. Crossing from
//! a top hat into the tree above it goes through the link table, so every
//! such walk here counts its hops and gives up with
//! [`HatsError::LinkCycleDetected`] once it exceeds the hop budget.

use tracing::{trace, warn};

use crate::error::HatsError;
use crate::id::{Address, HatId};
use crate::layout::{self, admin_at_local_level, local_level, parent_in_tree, root_id};
use crate::reader::HatsReader;
use crate::Domain;

/// Read-only view over a [`HatsReader`] answering hierarchy questions.
pub struct Resolver<'a, R: ?Sized> {
    reader: &'a R,
    hop_budget: u32,
}

impl<R: ?Sized> Clone for Resolver<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R: ?Sized> Copy for Resolver<'_, R> {}

impl<'a, R: HatsReader + ?Sized> Resolver<'a, R> {
    /// A resolver whose hop budget is the reader's known root count.
    pub fn new(reader: &'a R) -> Self {
        Self::with_hop_budget(reader, reader.known_root_count())
    }

    pub fn with_hop_budget(reader: &'a R, hop_budget: u32) -> Self {
        Self { reader, hop_budget }
    }

    pub fn reader(&self) -> &'a R {
        self.reader
    }

    pub fn hop_budget(&self) -> u32 {
        self.hop_budget
    }

    #[inline]
    pub fn local_level(&self, id: HatId) -> u32 {
        local_level(id)
    }

    #[inline]
    pub fn domain_of_root(&self, id: HatId) -> Domain {
        layout::domain_of(id)
    }

    /// The hat `domain`'s top hat is grafted under, if its link is approved.
    #[inline]
    pub fn linked_admin(&self, domain: Domain) -> Option<HatId> {
        self.reader.link_record(domain).approved_admin()
    }

    /// Count one more link hop in a walk that started at `origin`.
    pub(crate) fn spend_hop(&self, origin: Domain, hops: &mut u32) -> Result<(), HatsError> {
        if *hops >= self.hop_budget {
            warn!(
                domain = origin,
                budget = self.hop_budget,
                "hop budget exhausted while following links"
            );
            return Err(HatsError::LinkCycleDetected {
                domain: origin,
                budget: self.hop_budget,
            });
        }
        *hops += 1;
        Ok(())
    }

    /// Depth of `id` across linked trees.
    ///
    /// Equals the local level for unlinked trees; a linked tree adds
    /// `1 + global_level(linked_admin)`.
    pub fn global_level(&self, id: HatId) -> Result<u32, HatsError> {
        let origin = id.domain();
        let mut level = local_level(id);
        let mut domain = origin;
        let mut hops = 0;
        while let Some(admin) = self.linked_admin(domain) {
            self.spend_hop(origin, &mut hops)?;
            trace!(domain, %admin, "crossing link");
            // Only a cyclic table can push a level past u32 within the budget.
            level = level
                .checked_add(1 + local_level(admin))
                .ok_or(HatsError::LinkCycleDetected {
                    domain: origin,
                    budget: self.hop_budget,
                })?;
            domain = admin.domain();
        }
        Ok(level)
    }

    /// The admin of `id` at global `level`.
    ///
    /// Levels inside `id`'s own tree truncate its path; lower levels are
    /// answered in the trees it is linked beneath. A level at or below `id`'s
    /// own global level yields `id` itself.
    pub fn admin_at_level(&self, id: HatId, level: u32) -> Result<HatId, HatsError> {
        let mut current = id;
        // Global level of `current`'s local top hat.
        let mut top = self.global_level(root_id(id.domain()))?;
        loop {
            if level >= top {
                return Ok(admin_at_local_level(current, level - top));
            }
            match self.linked_admin(current.domain()) {
                Some(admin) => {
                    top = top.saturating_sub(1 + local_level(admin));
                    current = admin;
                }
                // The link seen while measuring `top` has gone.
                None => {
                    warn!(domain = current.domain(), "link table changed during admin lookup");
                    return Err(HatsError::MalformedIdentifier {
                        id,
                        reason: "link table changed while resolving its admins",
                    });
                }
            }
        }
    }

    /// The direct admin of `id`.
    ///
    /// An unlinked top hat is its own admin and a linked one answers to the
    /// hat it is linked under. Any other hat's admin is the hat one global
    /// level above it.
    pub fn admin_of(&self, id: HatId) -> Result<HatId, HatsError> {
        if local_level(id) == 0 {
            return Ok(self.linked_admin(id.domain()).unwrap_or(id));
        }
        let level = self.global_level(id)?;
        self.admin_at_level(id, level - 1)
    }

    /// The domain at the top of `domain`'s global tree.
    pub fn tippy_top_domain(&self, domain: Domain) -> Result<Domain, HatsError> {
        let mut current = domain;
        let mut hops = 0;
        while let Some(admin) = self.linked_admin(current) {
            self.spend_hop(domain, &mut hops)?;
            trace!(from = current, to = admin.domain(), "following link upward");
            current = admin.domain();
        }
        Ok(current)
    }

    /// Every admin of `id`, nearest first, ending at the tippy-top hat.
    ///
    /// Empty for an unlinked top hat.
    pub fn ancestors(&self, id: HatId) -> Result<Vec<HatId>, HatsError> {
        let mut chain = Vec::new();
        let mut current = id;
        let mut hops = 0;
        loop {
            if local_level(current) > 0 {
                current = parent_in_tree(current)?;
                chain.push(current);
                continue;
            }
            match self.linked_admin(current.domain()) {
                Some(admin) => {
                    self.spend_hop(id.domain(), &mut hops)?;
                    chain.push(admin);
                    current = admin;
                }
                None => return Ok(chain),
            }
        }
    }

    /// The ledger's admin rule derived from wearers alone.
    ///
    /// An unlinked top hat is administered by its own wearer. Any other hat
    /// is administered by the wearer of any hat above it, across links.
    pub fn is_admin_by_ancestry(&self, account: Address, id: HatId) -> Result<bool, HatsError> {
        if local_level(id) == 0 && self.linked_admin(id.domain()).is_none() {
            return Ok(self.reader.wears(account, id));
        }
        Ok(self
            .ancestors(id)?
            .into_iter()
            .any(|admin| self.reader.wears(account, admin)))
    }

    /// Identifiers the next `n` children of `parent` will receive.
    pub fn predict_children(&self, parent: HatId, n: u32) -> Result<Vec<HatId>, HatsError> {
        let existing = u32::from(self.reader.children_count(parent));
        layout::build_children(parent, existing, n)
    }

    /// Identifier the next child of `parent` will receive.
    pub fn next_child_id(&self, parent: HatId) -> Result<HatId, HatsError> {
        let existing = u32::from(self.reader.children_count(parent));
        layout::child_id(parent, existing + 1)
    }
}
