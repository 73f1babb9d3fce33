//! Level layout: fixed bit allocation of a 256-bit hat identifier.
//!
//! The identifier is self-describing. Its domain names the tree and the
//! populated segments spell the path from the top hat, so local level,
//! in-tree parent and local subtree membership need no lookups.
//!
//! ## HatId Layout (256 bits, big-endian)
//!
//! ```text
//! ┌──────────┬──────────┬──────────┬─────┬──────────┐
//! │ Domain   │ Level 1  │ Level 2  │ ... │ Level 14 │
//! │ 32 bits  │ 16 bits  │ 16 bits  │     │ 16 bits  │
//! │[255:224] │[223:208] │[207:192] │     │ [15:0]   │
//! └──────────┴──────────┴──────────┴─────┴──────────┘
//! ```
//!
//! Total: 32 + 14 × 16 = 256 bits

use crate::error::HatsError;
use crate::id::HatId;
use crate::Domain;

/// Maximum number of levels below a top hat.
pub const MAX_LEVELS: usize = 14;

/// Maximum number of direct children of any hat (segment 0 is reserved).
pub const MAX_LEVEL_HATS: u16 = u16::MAX;

/// Bits reserved for the tree domain.
pub const DOMAIN_BITS: u32 = 32;

/// Bits per level segment.
pub const SEGMENT_BITS: u32 = 16;

/// Static assertion: the layout must fill the identifier exactly.
const _: () = {
    assert!(
        DOMAIN_BITS as usize + MAX_LEVELS * SEGMENT_BITS as usize == 256,
        "domain + segments must sum to exactly 256 bits"
    );
};

/// Number of leading bytes that identify a hat at `level` (domain + path).
#[inline]
const fn prefix_len(level: usize) -> usize {
    (DOMAIN_BITS / 8) as usize + level * (SEGMENT_BITS / 8) as usize
}

// =============================================================================
// Standalone codec operations (no reader needed)
// =============================================================================

/// The domain of the tree `id` belongs to.
#[inline]
pub fn domain_of(id: HatId) -> Domain {
    id.domain()
}

/// Depth of `id` inside its own tree, ignoring links. Top hats are level 0.
///
/// Counts up to the last populated segment, so a (malformed) gapped path
/// still reports the position of its deepest node.
pub fn local_level(id: HatId) -> u32 {
    (0..MAX_LEVELS)
        .rev()
        .find(|&level| id.segment_at(level) != 0)
        .map_or(0, |level| level as u32 + 1)
}

/// The 1-based child index stored at `level` (0 = the top hat's children).
///
/// Returns `None` if `level` is outside the layout.
pub fn segment(id: HatId, level: usize) -> Option<u16> {
    (level < MAX_LEVELS).then(|| id.segment_at(level))
}

/// The top hat of `domain`.
#[inline]
pub fn root_id(domain: Domain) -> HatId {
    HatId::top_hat(domain)
}

#[inline]
pub fn is_local_root(id: HatId) -> bool {
    local_level(id) == 0
}

/// The in-tree parent of `id`.
///
/// Top hats have no parent inside their tree; callers must handle level 0
/// themselves (a linked top hat's admin lives in another tree).
pub fn parent_in_tree(id: HatId) -> Result<HatId, HatsError> {
    match local_level(id) {
        0 => Err(HatsError::MalformedIdentifier {
            id,
            reason: "a top hat has no parent in its own tree",
        }),
        level => Ok(id.with_segment(level as usize - 1, 0)),
    }
}

/// The identifier of child number `index` (1-based) of `parent`.
pub fn child_id(parent: HatId, index: u32) -> Result<HatId, HatsError> {
    let level = local_level(parent) as usize;
    if level >= MAX_LEVELS {
        return Err(HatsError::LevelOverflow { parent });
    }
    let index = u16::try_from(index)
        .ok()
        .filter(|&i| i != 0)
        .ok_or(HatsError::IndexOverflow { index })?;
    Ok(parent.with_segment(level, index))
}

/// Predict the identifiers of the next `n` children of `parent`, given that it
/// already has `existing_count` of them. Nothing is mutated.
///
/// Either all `n` identifiers are returned or none are.
pub fn build_children(parent: HatId, existing_count: u32, n: u32) -> Result<Vec<HatId>, HatsError> {
    if local_level(parent) as usize >= MAX_LEVELS {
        return Err(HatsError::LevelOverflow { parent });
    }
    if u64::from(existing_count) + u64::from(n) > u64::from(MAX_LEVEL_HATS) {
        return Err(HatsError::ChildCountExceeded {
            parent,
            existing: existing_count,
            requested: n,
        });
    }
    (existing_count + 1..=existing_count + n)
        .map(|index| child_id(parent, index))
        .collect()
}

/// Truncate `id` to its first `level` segments: its admin at that local level.
///
/// Level 0 yields the top hat; a level at or below `id`'s own yields `id`.
pub fn admin_at_local_level(id: HatId, level: u32) -> HatId {
    (level as usize..MAX_LEVELS).fold(id, |acc, l| acc.with_segment(l, 0))
}

/// Is `candidate` inside the local subtree rooted at `ancestor` (or equal to it)?
///
/// A single prefix comparison; links are not followed.
///
/// ```text
/// is_in_local_subtree(1.2.3, 1.2) → true
/// is_in_local_subtree(1.3,   1.2) → false
/// is_in_local_subtree(2.1,   1)   → false
/// ```
pub fn is_in_local_subtree(candidate: HatId, ancestor: HatId) -> bool {
    use zerocopy::IntoBytes;

    let prefix = prefix_len(local_level(ancestor) as usize);
    candidate.as_bytes()[..prefix] == ancestor.as_bytes()[..prefix]
}

/// Do two hats share the same in-tree parent?
///
/// Top hats are never siblings of anything: their parents, if any, come from links.
pub fn is_sibling(a: HatId, b: HatId) -> bool {
    match (parent_in_tree(a), parent_in_tree(b)) {
        (Ok(pa), Ok(pb)) => pa == pb && local_level(a) == local_level(b),
        _ => false,
    }
}
