//! Integration tests for hats-tree-snapshot.

use hats_tree::{
    Address, HatId, HatsError, HatsReader, LinkOptions, LinkRecord, root_id,
};
use hats_tree_snapshot::{load, SnapshotError};
use std::fs;
use tempfile::TempDir;

const TOP: Address = Address::repeat_byte(0x01);
const BEE: Address = Address::repeat_byte(0x02);

/// Create a temp directory holding `forest.toml`.
fn setup_snapshot(content: &str) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("forest.toml");
    fs::write(&path, content).unwrap();
    (dir, path)
}

fn hat(domain: u32, path: &[u16]) -> HatId {
    HatId::from_path(domain, path).unwrap()
}

const FOREST: &str = r#"
captured_at = "2026-10-18T12:00:00Z"

[policy]
hop_budget = 4

[hats]
paths = ["1.1", "1.2", "2.1", "3"]

[[wearers]]
address = "0x0101010101010101010101010101010101010101"
hats = ["1"]

[[wearers]]
address = "0x0202020202020202020202020202020202020202"
hats = ["2"]

[[links]]
domain = 2
admin = "1.1"

[[links]]
domain = 3
admin = "2.1"
status = "requested"
"#;

#[test]
fn load_replays_file() {
    let (_dir, path) = setup_snapshot(FOREST);
    let snapshot = load(&path).unwrap();

    assert_eq!(snapshot.ledger().len(), 6);
    assert_eq!(snapshot.policy().hop_budget, Some(4));
    assert_eq!(snapshot.resolver().hop_budget(), 4);
    assert!(snapshot.ledger().wears(TOP, root_id(1)));
    assert_eq!(snapshot.ledger().link_record(3), LinkRecord::Requested(hat(2, &[1])));

    let resolver = snapshot.resolver();
    assert_eq!(resolver.global_level(hat(2, &[1])).unwrap(), 3);
    // A request does not move tree 3.
    assert_eq!(resolver.global_level(root_id(3)).unwrap(), 0);
    assert_eq!(resolver.tippy_top_domain(2).unwrap(), 1);
}

#[test]
fn linkage_runs_against_loaded_state() {
    let (_dir, path) = setup_snapshot(FOREST);
    let mut snapshot = load(&path).unwrap();

    // TOP wears 1, which sits above 2.1 through the approved link 2 → 1.1.
    let approve = snapshot
        .linkage()
        .approve(TOP, 3, hat(2, &[1]), LinkOptions::default())
        .unwrap();
    let policy = snapshot.policy().clone();
    snapshot.ledger_mut().submit(TOP, &approve, &policy).unwrap();

    assert_eq!(snapshot.ledger().link_record(3), LinkRecord::Approved(hat(2, &[1])));
    assert_eq!(snapshot.resolver().tippy_top_domain(3).unwrap(), 1);
    // BEE wears top hat 2, but tree 2 is administered from tree 1 now.
    assert!(matches!(
        snapshot.linkage().request(BEE, 2, hat(1, &[2])),
        Err(HatsError::NotAdmin { .. })
    ));
}

#[test]
fn missing_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    let err = load(dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, SnapshotError::Config(_)));
    assert!(err.to_string().contains("absent.toml"));
}

#[test]
fn malformed_toml_is_config_error() {
    let (_dir, path) = setup_snapshot("[hats\npaths = 1");
    assert!(matches!(load(&path), Err(SnapshotError::Config(_))));
}

#[test]
fn self_link_is_inconsistent() {
    let (_dir, path) = setup_snapshot(
        r#"
[hats]
paths = ["1.1"]

[[links]]
domain = 1
admin = "1.1"
"#,
    );
    assert!(matches!(
        load(&path),
        Err(SnapshotError::Inconsistent(HatsError::LinkCycleDetected { domain: 1, .. }))
    ));
}

#[test]
fn hop_budget_limits_deep_chains() {
    let (_dir, path) = setup_snapshot(
        r#"
[policy]
hop_budget = 1

[hats]
paths = ["1.1", "2.1", "3"]

[[links]]
domain = 2
admin = "1.1"

[[links]]
domain = 3
admin = "2.1"
"#,
    );
    assert!(matches!(
        load(&path),
        Err(SnapshotError::Inconsistent(HatsError::LinkCycleDetected { budget: 1, .. }))
    ));
}
