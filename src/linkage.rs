//! Link lifecycle of one tree.
//!
//! ```text
//! unlinked ──request(A)──▶ requested(A) ──approve──▶ linked(A) ──relink(A')──▶ linked(A')
//!     ▲                         │ request(B) overwrites    │          ▲
//!     │                                             request(B)   approve(B)
//!     │                                                    ▼          │
//!     │                                        relinking(A → B) ──────┘
//!     └──────────────────── unlink (any linked state) ◀────┘
//! ```
//!
//! A request made while linked leaves the approved link in effect until the
//! request is approved.
//!
//! [`LinkageMachine`] reads the current record, validates, and hands back a
//! [`Transition`] for the caller to submit. It never submits anything itself.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::HatsError;
use crate::id::{Address, HatId};
use crate::reader::{HatsReader, LinkRecord};
use crate::validator::{LinkOptions, LinkageValidator, Mutation, ValidatorConfig};
use crate::Domain;

/// Where a tree stands in its link lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LinkState {
    Unlinked,
    Requested(HatId),
    Linked(HatId),
    Relinking { linked: HatId, requested: HatId },
}

impl LinkState {
    /// Pending requests are transient: they resolve by approval or a newer request.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Requested(_) | Self::Relinking { .. })
    }
}

impl From<LinkRecord> for LinkState {
    fn from(record: LinkRecord) -> Self {
        match record {
            LinkRecord::None => Self::Unlinked,
            LinkRecord::Requested(admin) => Self::Requested(admin),
            LinkRecord::Approved(admin) => Self::Linked(admin),
            LinkRecord::Relinking { linked, requested } => Self::Relinking { linked, requested },
        }
    }
}

impl From<LinkState> for LinkRecord {
    fn from(state: LinkState) -> Self {
        match state {
            LinkState::Unlinked => Self::None,
            LinkState::Requested(admin) => Self::Requested(admin),
            LinkState::Linked(admin) => Self::Approved(admin),
            LinkState::Relinking { linked, requested } => Self::Relinking { linked, requested },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    Request,
    Approve,
    Relink,
    Unlink,
}

/// A validated change to one tree's link record, ready for the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub domain: Domain,
    pub kind: TransitionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<HatId>,
    /// The record observed when the transition was validated.
    pub observed: LinkRecord,
    #[serde(default, skip_serializing_if = "LinkOptions::is_empty")]
    pub options: LinkOptions,
    /// Current wearer of the tree's top hat, for unlinks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wearer: Option<Address>,
}

impl Transition {
    fn new(domain: Domain, observed: LinkRecord, mutation: Mutation) -> Self {
        let target = mutation.target();
        let (kind, options, wearer) = match mutation {
            Mutation::Request { .. } => (TransitionKind::Request, LinkOptions::default(), None),
            Mutation::Approve { options, .. } => (TransitionKind::Approve, options, None),
            Mutation::Relink { options, .. } => (TransitionKind::Relink, options, None),
            Mutation::Unlink { wearer } => (TransitionKind::Unlink, LinkOptions::default(), Some(wearer)),
        };
        Self {
            domain,
            kind,
            target,
            observed,
            options,
            wearer,
        }
    }

    /// The mutation this transition performs, for re-validation at submission.
    ///
    /// Returns `None` if the descriptor lacks the target or wearer its kind needs.
    pub fn mutation(&self) -> Option<Mutation> {
        let options = self.options.clone();
        Some(match self.kind {
            TransitionKind::Request => Mutation::Request { admin: self.target? },
            TransitionKind::Approve => Mutation::Approve {
                admin: self.target?,
                options,
            },
            TransitionKind::Relink => Mutation::Relink {
                admin: self.target?,
                options,
            },
            TransitionKind::Unlink => Mutation::Unlink { wearer: self.wearer? },
        })
    }

    /// The link record once the ledger has applied this transition.
    pub fn resulting_record(&self) -> LinkRecord {
        match (self.kind, self.target) {
            (TransitionKind::Request, Some(admin)) => self.observed.with_request(admin),
            (TransitionKind::Approve | TransitionKind::Relink, Some(admin)) => LinkRecord::Approved(admin),
            (TransitionKind::Unlink, _) => LinkRecord::None,
            (_, None) => self.observed,
        }
    }

    pub fn resulting_state(&self) -> LinkState {
        self.resulting_record().into()
    }
}

/// Sequences read → validate → describe for link mutations.
pub struct LinkageMachine<'a, R: ?Sized> {
    validator: LinkageValidator<'a, R>,
}

impl<'a, R: HatsReader + ?Sized> LinkageMachine<'a, R> {
    pub fn new(reader: &'a R, config: &ValidatorConfig) -> Self {
        Self {
            validator: LinkageValidator::new(reader, config),
        }
    }

    pub fn validator(&self) -> &LinkageValidator<'a, R> {
        &self.validator
    }

    pub fn state(&self, domain: Domain) -> LinkState {
        self.validator.resolver().reader().link_record(domain).into()
    }

    /// Ask for `domain`'s tree to be placed under `admin`. Replaces any pending
    /// request; an approved link stays in effect until this one is approved.
    pub fn request(&self, caller: Address, domain: Domain, admin: HatId) -> Result<Transition, HatsError> {
        self.propose(caller, domain, Mutation::Request { admin })
    }

    /// Accept a pending request to place `domain`'s tree under `admin`.
    pub fn approve(
        &self,
        caller: Address,
        domain: Domain,
        admin: HatId,
        options: LinkOptions,
    ) -> Result<Transition, HatsError> {
        self.propose(caller, domain, Mutation::Approve { admin, options })
    }

    /// Move `domain`'s tree to a new admin without a request round trip.
    pub fn relink(
        &self,
        caller: Address,
        domain: Domain,
        admin: HatId,
        options: LinkOptions,
    ) -> Result<Transition, HatsError> {
        self.propose(caller, domain, Mutation::Relink { admin, options })
    }

    /// Detach `domain`'s tree; its top hat becomes its own admin again.
    pub fn unlink(&self, caller: Address, domain: Domain, wearer: Address) -> Result<Transition, HatsError> {
        self.propose(caller, domain, Mutation::Unlink { wearer })
    }

    pub fn propose(&self, caller: Address, domain: Domain, mutation: Mutation) -> Result<Transition, HatsError> {
        let observed = self.validator.resolver().reader().link_record(domain);
        self.validator.validate(caller, domain, &mutation)?;
        let transition = Transition::new(domain, observed, mutation);
        debug!(
            domain,
            kind = ?transition.kind,
            target = ?transition.target,
            from = ?LinkState::from(observed),
            to = ?transition.resulting_state(),
            "link transition ready"
        );
        Ok(transition)
    }
}
