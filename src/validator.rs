//! Linkage validation: may a tree be requested into, approved under, moved
//! within, or removed from another tree?
//!
//! Rules run in a fixed order and the first failure wins:
//!
//! 1. the tree's top hat exists;
//! 2. the caller has authority (and, for approvals, a matching request is pending);
//! 3. the new link keeps the global graph acyclic;
//! 4. a tree already linked somewhere only moves within its current tree or
//!    to the tippy top, unless the caller wears the tippy-top hat;
//! 5. descriptive payload stays within the configured length.
//!
//! Nothing here mutates. A pass means the ledger *should* accept the change,
//! not that it will: its state may move on between validation and submission.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::error::HatsError;
use crate::id::{Address, HatId};
use crate::layout::root_id;
use crate::reader::{HatsReader, LinkRecord};
use crate::resolver::Resolver;
use crate::Domain;

/// Longest accepted `details` / `image_uri` payload, in characters.
pub const MAX_STRING_LEN: usize = 7000;

/// Tunables for [`LinkageValidator`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidatorConfig {
    pub max_string_len: usize,
    /// Overrides the reader's known root count as the link-walk bound.
    pub hop_budget: Option<u32>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            max_string_len: MAX_STRING_LEN,
            hop_budget: None,
        }
    }
}

/// Optional payload carried by approve and relink.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_uri: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eligibility: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub toggle: Option<Address>,
}

impl LinkOptions {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_image_uri(mut self, image_uri: impl Into<String>) -> Self {
        self.image_uri = Some(image_uri.into());
        self
    }
}

/// A proposed change to one tree's link record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    Request { admin: HatId },
    Approve { admin: HatId, options: LinkOptions },
    Relink { admin: HatId, options: LinkOptions },
    /// `wearer` must currently wear the tree's top hat.
    Unlink { wearer: Address },
}

impl Mutation {
    /// The admin hat the tree would be linked under.
    pub fn target(&self) -> Option<HatId> {
        match self {
            Self::Request { admin } | Self::Approve { admin, .. } | Self::Relink { admin, .. } => {
                Some(*admin)
            }
            Self::Unlink { .. } => None,
        }
    }
}

/// Checks proposed link mutations against the current ledger state.
pub struct LinkageValidator<'a, R: ?Sized> {
    resolver: Resolver<'a, R>,
    max_string_len: usize,
}

impl<'a, R: HatsReader + ?Sized> LinkageValidator<'a, R> {
    pub fn new(reader: &'a R, config: &ValidatorConfig) -> Self {
        let hop_budget = config
            .hop_budget
            .unwrap_or_else(|| reader.known_root_count());
        Self {
            resolver: Resolver::with_hop_budget(reader, hop_budget),
            max_string_len: config.max_string_len,
        }
    }

    pub fn resolver(&self) -> Resolver<'a, R> {
        self.resolver
    }

    fn reader(&self) -> &'a R {
        self.resolver.reader()
    }

    /// Run every rule that applies to `mutation` of `domain` by `caller`.
    pub fn validate(&self, caller: Address, domain: Domain, mutation: &Mutation) -> Result<(), HatsError> {
        let result = match mutation {
            Mutation::Request { admin } => self.check_request(caller, domain, *admin),
            Mutation::Approve { admin, options } => self.check_approve(caller, domain, *admin, options),
            Mutation::Relink { admin, options } => self.check_relink(caller, domain, *admin, options),
            Mutation::Unlink { wearer } => self.check_unlink(caller, domain, *wearer),
        };
        match &result {
            Ok(()) => debug!(domain, %caller, ?mutation, "link mutation accepted"),
            Err(err) => debug!(domain, %caller, ?mutation, %err, "link mutation rejected"),
        }
        result
    }

    pub fn check_request(&self, caller: Address, domain: Domain, admin: HatId) -> Result<(), HatsError> {
        self.ensure_root_exists(domain)?;
        self.ensure_admin_of_root(caller, domain)?;
        self.ensure_acyclic(domain, admin)
    }

    pub fn check_approve(
        &self,
        caller: Address,
        domain: Domain,
        admin: HatId,
        options: &LinkOptions,
    ) -> Result<(), HatsError> {
        self.ensure_root_exists(domain)?;
        self.ensure_admin_or_wearer(caller, admin)?;
        if self.reader().link_record(domain).requested_admin() != Some(admin) {
            return Err(HatsError::NoLinkageRequest { domain, admin });
        }
        self.ensure_acyclic(domain, admin)?;
        self.ensure_within_global_tree(caller, domain, admin)?;
        self.ensure_payload(options)
    }

    pub fn check_relink(
        &self,
        caller: Address,
        domain: Domain,
        admin: HatId,
        options: &LinkOptions,
    ) -> Result<(), HatsError> {
        self.ensure_root_exists(domain)?;
        self.ensure_admin_of_root(caller, domain)?;
        self.ensure_admin_or_wearer(caller, admin)?;
        self.ensure_acyclic(domain, admin)?;
        self.ensure_within_global_tree(caller, domain, admin)?;
        self.ensure_payload(options)
    }

    pub fn check_unlink(&self, caller: Address, domain: Domain, wearer: Address) -> Result<(), HatsError> {
        self.ensure_root_exists(domain)?;
        self.ensure_admin_of_root(caller, domain)?;
        if !self.reader().wears(wearer, root_id(domain)) {
            return Err(HatsError::InvalidUnlink { domain, wearer });
        }
        if self.resolver.linked_admin(domain).is_none() {
            return Err(HatsError::NotLinked { domain });
        }
        Ok(())
    }

    fn ensure_root_exists(&self, domain: Domain) -> Result<(), HatsError> {
        if self.reader().is_root(root_id(domain)) {
            Ok(())
        } else {
            Err(HatsError::UnknownRoot { domain })
        }
    }

    fn ensure_admin_of_root(&self, caller: Address, domain: Domain) -> Result<(), HatsError> {
        let hat = root_id(domain);
        if self.reader().is_admin(caller, hat) {
            Ok(())
        } else {
            Err(HatsError::NotAdmin { caller, hat })
        }
    }

    fn ensure_admin_or_wearer(&self, caller: Address, hat: HatId) -> Result<(), HatsError> {
        let reader = self.reader();
        if reader.is_admin(caller, hat) || reader.wears(caller, hat) {
            Ok(())
        } else {
            Err(HatsError::NotAdminOrWearer { caller, hat })
        }
    }

    /// Walk up from `admin`'s tree through approved links. Meeting `domain`
    /// on the way means the new link would close a loop.
    pub fn ensure_acyclic(&self, domain: Domain, admin: HatId) -> Result<(), HatsError> {
        let mut current = admin.domain();
        let mut hops = 0;
        loop {
            if current == domain {
                return Err(HatsError::CircularLinkage { domain, admin });
            }
            match self.resolver.linked_admin(current) {
                Some(next) => {
                    self.resolver.spend_hop(domain, &mut hops)?;
                    trace!(from = current, to = next.domain(), "acyclicity walk");
                    current = next.domain();
                }
                None => return Ok(()),
            }
        }
    }

    /// Only trees already linked somewhere are constrained.
    ///
    /// Wearers of the tippy-top hat may move the tree anywhere. Everyone else
    /// may keep it inside the local tree of its current admin, or hang it
    /// directly under the tippy-top tree.
    pub fn ensure_within_global_tree(&self, caller: Address, domain: Domain, admin: HatId) -> Result<(), HatsError> {
        let Some(current_admin) = self.resolver.linked_admin(domain) else {
            return Ok(());
        };
        let tippy_top = self.resolver.tippy_top_domain(domain)?;
        if self.reader().wears(caller, root_id(tippy_top)) {
            return Ok(());
        }
        let destination = admin.domain();
        if destination == current_admin.domain() || destination == tippy_top {
            Ok(())
        } else {
            Err(HatsError::CrossLinkage {
                domain,
                admin,
                tippy_top,
            })
        }
    }

    fn ensure_payload(&self, options: &LinkOptions) -> Result<(), HatsError> {
        let fields = [
            ("details", options.details.as_deref()),
            ("image_uri", options.image_uri.as_deref()),
        ];
        for (field, value) in fields {
            let len = value.map_or(0, |v| v.chars().count());
            if len > self.max_string_len {
                return Err(HatsError::StringTooLong {
                    field,
                    len,
                    max: self.max_string_len,
                });
            }
        }
        Ok(())
    }
}
