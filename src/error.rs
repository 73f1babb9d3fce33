//! Errors raised by the codec, the resolver and the linkage validator.
//!
//! Every variant is terminal for the attempted operation. None of them are
//! retried internally; the caller must supply corrected input or fresh state.

use thiserror::Error;

use crate::id::{Address, HatId};
use crate::layout::{MAX_LEVELS, MAX_LEVEL_HATS};
use crate::Domain;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HatsError {
    // Codec: caller input.
    #[error("malformed hat id {id}: {reason}")]
    MalformedIdentifier { id: HatId, reason: &'static str },

    #[error("hat {parent} is already at the maximum depth of {max} levels", max = MAX_LEVELS)]
    LevelOverflow { parent: HatId },

    #[error("child index {index} is outside 1..={max}", max = MAX_LEVEL_HATS)]
    IndexOverflow { index: u32 },

    #[error(
        "hat {parent} has {existing} children; {requested} more would exceed {max}",
        max = MAX_LEVEL_HATS
    )]
    ChildCountExceeded {
        parent: HatId,
        existing: u32,
        requested: u32,
    },

    #[error("invalid hex value {input:?}")]
    InvalidHex { input: String },

    // Structure.
    #[error("following links from domain {domain} took more than {budget} hops; the link table has a cycle")]
    LinkCycleDetected { domain: Domain, budget: u32 },

    #[error("linking domain {domain} under {admin} would create a cycle")]
    CircularLinkage { domain: Domain, admin: HatId },

    #[error("domain {domain} cannot move to {admin}: outside its current tree and not the tippy top {tippy_top}")]
    CrossLinkage {
        domain: Domain,
        admin: HatId,
        tippy_top: Domain,
    },

    // Lifecycle.
    #[error("domain {domain} has no pending request to link under {admin}")]
    NoLinkageRequest { domain: Domain, admin: HatId },

    #[error("domain {domain} is not linked to another tree")]
    NotLinked { domain: Domain },

    #[error("domain {domain} has no top hat")]
    UnknownRoot { domain: Domain },

    #[error("{wearer} does not wear the top hat of domain {domain}")]
    InvalidUnlink { domain: Domain, wearer: Address },

    // Authorization.
    #[error("{caller} is not an admin of {hat}")]
    NotAdmin { caller: Address, hat: HatId },

    #[error("{caller} is neither an admin nor a wearer of {hat}")]
    NotAdminOrWearer { caller: Address, hat: HatId },

    // Payload.
    #[error("{field} is {len} characters long; the limit is {max}")]
    StringTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },
}

impl HatsError {
    /// The domain this error is about, when it concerns one.
    pub fn domain(&self) -> Option<Domain> {
        match self {
            Self::LinkCycleDetected { domain, .. }
            | Self::CircularLinkage { domain, .. }
            | Self::CrossLinkage { domain, .. }
            | Self::NoLinkageRequest { domain, .. }
            | Self::NotLinked { domain }
            | Self::UnknownRoot { domain }
            | Self::InvalidUnlink { domain, .. } => Some(*domain),
            Self::MalformedIdentifier { id, .. } => Some(id.domain()),
            Self::LevelOverflow { parent } | Self::ChildCountExceeded { parent, .. } => {
                Some(parent.domain())
            }
            Self::NotAdmin { hat, .. } | Self::NotAdminOrWearer { hat, .. } => Some(hat.domain()),
            Self::IndexOverflow { .. } | Self::InvalidHex { .. } | Self::StringTooLong { .. } => None,
        }
    }

    /// True for errors about the shape of the link graph rather than the caller's input.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::LinkCycleDetected { .. } | Self::CircularLinkage { .. } | Self::CrossLinkage { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offender() {
        let err = HatsError::CircularLinkage {
            domain: 3,
            admin: HatId::top_hat(3),
        };
        let msg = err.to_string();
        assert!(msg.contains("domain 3"));
        assert!(msg.contains(&HatId::top_hat(3).to_string()));

        let err = HatsError::IndexOverflow { index: 0 };
        assert_eq!(err.to_string(), "child index 0 is outside 1..=65535");
    }

    #[test]
    fn domain_context() {
        let err = HatsError::NotAdmin {
            caller: Address::ZERO,
            hat: HatId::from_path(7, &[1]).unwrap(),
        };
        assert_eq!(err.domain(), Some(7));
        assert!(!err.is_structural());
        assert!(HatsError::LinkCycleDetected { domain: 1, budget: 4 }.is_structural());
    }
}
