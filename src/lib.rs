//! # Hierarchical Hat Identifiers and Tree Linkage (hats-tree)
//!
//! Provides fixed-width, position-encoding identifiers for role ("hat")
//! hierarchies, link-aware ancestry queries, and validation of the protocol
//! that grafts independently rooted trees into one another.
//!
//! ## Design
//!
//! A [`HatId`] is a 256-bit big-endian integer: a 32-bit tree domain followed
//! by 14 levels of 16-bit child indices.
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬─────┬──────────┐
//! │ Domain   │ Level 1  │ Level 2  │ ... │ Level 14 │
//! │ 32 bits  │ 16 bits  │ 16 bits  │     │ 16 bits  │
//! └──────────┴──────────┴──────────┴─────┴──────────┘
//! ```
//!
//! Within one tree the identifier alone answers level, parent and subtree
//! questions. A top hat can additionally be *linked* under a hat of another
//! tree; that edge lives only in the ledger's link table, which the core
//! reads through [`HatsReader`] and never mutates:
//!
//! ```ignore
//! use hats_tree::{LinkageMachine, Resolver, ValidatorConfig};
//!
//! let level = Resolver::new(&reader).global_level(hat)?;
//!
//! let transition = LinkageMachine::new(&reader, &ValidatorConfig::default())
//!     .request(caller, my_domain, target_admin)?;
//! // hand `transition` to whatever submits to the ledger
//! ```

pub mod error;
pub mod id;
pub mod layout;
pub mod linkage;
pub mod memory;
pub mod reader;
pub mod resolver;
pub mod validator;

pub use error::HatsError;
pub use id::{Address, HatId};
pub use layout::{
    admin_at_local_level, build_children, child_id, domain_of, is_in_local_subtree, is_local_root,
    is_sibling, local_level, parent_in_tree, root_id, segment, DOMAIN_BITS, MAX_LEVELS,
    MAX_LEVEL_HATS, SEGMENT_BITS,
};
pub use linkage::{LinkState, LinkageMachine, Transition, TransitionKind};
pub use memory::{HatEntry, LedgerError, MemoryLedger};
pub use reader::{HatsReader, LinkRecord};
pub use resolver::Resolver;
pub use validator::{LinkOptions, LinkageValidator, Mutation, ValidatorConfig, MAX_STRING_LEN};

/// Tree domain: the top 32 bits of every hat id in one tree.
pub type Domain = u32;
