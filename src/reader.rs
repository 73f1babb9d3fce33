//! The read accessor through which the core sees the external hats ledger.

use serde::{Deserialize, Serialize};

use crate::id::{Address, HatId};
use crate::Domain;

/// Link-table entry of one tree, keyed by its domain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "admin", rename_all = "snake_case")]
pub enum LinkRecord {
    /// The top hat is its own admin.
    #[default]
    None,
    /// The top hat asked to be placed under this admin; not yet effective.
    Requested(HatId),
    /// The tree is grafted: the top hat's admin is this hat.
    Approved(HatId),
    /// Still grafted under `linked`, with a request to move under
    /// `requested` awaiting approval.
    Relinking { linked: HatId, requested: HatId },
}

impl LinkRecord {
    /// The admin the tree is currently grafted under, if any.
    #[inline]
    pub fn approved_admin(&self) -> Option<HatId> {
        match *self {
            Self::Approved(admin) | Self::Relinking { linked: admin, .. } => Some(admin),
            _ => None,
        }
    }

    /// The admin named by the pending request, if any.
    #[inline]
    pub fn requested_admin(&self) -> Option<HatId> {
        match *self {
            Self::Requested(admin) | Self::Relinking { requested: admin, .. } => Some(admin),
            _ => None,
        }
    }

    /// This record after a request to move under `admin`.
    ///
    /// The approved link, if any, stays in effect; an older request is replaced.
    pub fn with_request(self, admin: HatId) -> Self {
        match self.approved_admin() {
            Some(linked) => Self::Relinking {
                linked,
                requested: admin,
            },
            None => Self::Requested(admin),
        }
    }

    #[inline]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

/// Point queries against the ledger's tree-shape and link state.
///
/// Implementations decide how fresh their answers are. The core only reads;
/// every walk over links is bounded by [`HatsReader::known_root_count`].
pub trait HatsReader {
    /// Number of children ever created under `hat`.
    fn children_count(&self, hat: HatId) -> u16;

    /// True if `hat` is an existing top hat.
    fn is_root(&self, hat: HatId) -> bool;

    fn link_record(&self, domain: Domain) -> LinkRecord;

    fn wears(&self, account: Address, hat: HatId) -> bool;

    /// Delegated to the ledger's own admin semantics.
    fn is_admin(&self, account: Address, hat: HatId) -> bool;

    /// Number of top hats, however sparse their domains. Upper bound on the
    /// length of any acyclic chain of links.
    fn known_root_count(&self) -> u32;
}

impl<R: HatsReader + ?Sized> HatsReader for &R {
    fn children_count(&self, hat: HatId) -> u16 {
        (**self).children_count(hat)
    }

    fn is_root(&self, hat: HatId) -> bool {
        (**self).is_root(hat)
    }

    fn link_record(&self, domain: Domain) -> LinkRecord {
        (**self).link_record(domain)
    }

    fn wears(&self, account: Address, hat: HatId) -> bool {
        (**self).wears(account, hat)
    }

    fn is_admin(&self, account: Address, hat: HatId) -> bool {
        (**self).is_admin(account, hat)
    }

    fn known_root_count(&self) -> u32 {
        (**self).known_root_count()
    }
}
