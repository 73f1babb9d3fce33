//! End-to-end linkage scenarios against the in-memory ledger.

use hats_tree::*;

const TOP: Address = Address::repeat_byte(0x01);
const BEE: Address = Address::repeat_byte(0x02);
const CAT: Address = Address::repeat_byte(0x03);
const DOT: Address = Address::repeat_byte(0x04);
const CARL: Address = Address::repeat_byte(0x05);

fn hat(domain: Domain, path: &[u16]) -> HatId {
    HatId::from_path(domain, path).unwrap()
}

fn submit(ledger: &mut MemoryLedger, caller: Address, transition: Transition) {
    ledger
        .submit(caller, &transition, &ValidatorConfig::default())
        .unwrap();
}

#[test]
fn request_approve_unlink_round_trip() {
    let mut ledger = MemoryLedger::new();
    let t1 = ledger.mint_top_hat(BEE).unwrap();
    let t2 = ledger.mint_top_hat(TOP).unwrap();
    assert_eq!(t1.domain(), 1);

    // T1: 1 → 1.1 → 1.1.1
    let t1_child = ledger.create_hat(t1).unwrap();
    let t1_grandchild = ledger.create_hat(t1_child).unwrap();
    // T2: 2 → 2.1 → 2.1.1 (= H), worn by CAT.
    let h_parent = ledger.create_hat(t2).unwrap();
    let h = ledger.create_hat(h_parent).unwrap();
    ledger.mint(h, CAT).unwrap();

    let config = ValidatorConfig::default();

    let request = LinkageMachine::new(&ledger, &config)
        .request(BEE, t1.domain(), h)
        .unwrap();
    submit(&mut ledger, BEE, request);
    // Still only a request: nothing moved.
    assert_eq!(Resolver::new(&ledger).global_level(t1_child).unwrap(), 1);

    // TOP administers H through 2 → 2.1.
    let approve = LinkageMachine::new(&ledger, &config)
        .approve(TOP, t1.domain(), h, LinkOptions::default())
        .unwrap();
    submit(&mut ledger, TOP, approve);

    let resolver = Resolver::new(&ledger);
    let h_level = resolver.global_level(h).unwrap();
    assert_eq!(h_level, 2);
    for id in [t1, t1_child, t1_grandchild] {
        assert_eq!(
            resolver.global_level(id).unwrap(),
            local_level(id) + 1 + h_level
        );
    }
    assert_eq!(resolver.admin_of(t1).unwrap(), h);
    assert_eq!(resolver.tippy_top_domain(t1.domain()).unwrap(), t2.domain());
    // BEE no longer administers their own top hat; H's wearer does.
    assert!(!ledger.is_admin(BEE, t1));
    assert!(ledger.is_admin(CAT, t1));

    let unlink = LinkageMachine::new(&ledger, &config)
        .unlink(CAT, t1.domain(), BEE)
        .unwrap();
    submit(&mut ledger, CAT, unlink);

    let resolver = Resolver::new(&ledger);
    for id in [t1, t1_child, t1_grandchild] {
        assert_eq!(resolver.global_level(id).unwrap(), local_level(id));
    }
    assert_eq!(resolver.admin_of(t1).unwrap(), t1);
    assert!(ledger.is_admin(BEE, t1));
}

#[test]
fn approving_a_stale_request_fails() {
    let mut ledger = MemoryLedger::new();
    let t1 = ledger.mint_top_hat(BEE).unwrap();
    let t2 = ledger.mint_top_hat(TOP).unwrap();
    let first = ledger.create_hat(t2).unwrap();
    let second = ledger.create_hat(t2).unwrap();
    let config = ValidatorConfig::default();

    for target in [first, second] {
        let request = LinkageMachine::new(&ledger, &config)
            .request(BEE, t1.domain(), target)
            .unwrap();
        submit(&mut ledger, BEE, request);
    }

    let machine = LinkageMachine::new(&ledger, &config);
    assert_eq!(
        machine.approve(TOP, t1.domain(), first, LinkOptions::default()),
        Err(HatsError::NoLinkageRequest {
            domain: t1.domain(),
            admin: first
        })
    );
    assert!(machine
        .approve(TOP, t1.domain(), second, LinkOptions::default())
        .is_ok());
}

/// Global tree:
///
/// ```text
/// 1 (TOP)
/// ├── 1.1
/// │   └── 2 (BEE)
/// │       ├── 2.1 (CARL)
/// │       │   └── 3 (CAT)
/// │       │       └── 3.1
/// │       └── 2.2
/// └── 1.2 (CARL)
///     └── 4 (DOT)
///         └── 4.1 (BEE)
/// ```
fn global_tree() -> MemoryLedger {
    let mut ledger = MemoryLedger::new();
    let one = ledger.mint_top_hat(TOP).unwrap();
    let two = ledger.mint_top_hat(BEE).unwrap();
    let three = ledger.mint_top_hat(CAT).unwrap();
    let four = ledger.mint_top_hat(DOT).unwrap();

    let one_one = ledger.create_hat(one).unwrap();
    let one_two = ledger.create_hat(one).unwrap();
    let two_one = ledger.create_hat(two).unwrap();
    ledger.create_hat(two).unwrap();
    ledger.create_hat(three).unwrap();
    let four_one = ledger.create_hat(four).unwrap();

    ledger.mint(two_one, CARL).unwrap();
    ledger.mint(one_two, CARL).unwrap();
    ledger.mint(four_one, BEE).unwrap();

    ledger.set_link(2, LinkRecord::Approved(one_one));
    ledger.set_link(3, LinkRecord::Approved(two_one));
    ledger.set_link(4, LinkRecord::Approved(one_two));
    ledger
}

#[test]
fn global_tree_shape() {
    let ledger = global_tree();
    let resolver = Resolver::new(&ledger);
    assert_eq!(resolver.global_level(hat(3, &[1])).unwrap(), 5);
    assert_eq!(resolver.global_level(hat(4, &[1])).unwrap(), 3);
    for domain in 1..=4 {
        assert_eq!(resolver.tippy_top_domain(domain).unwrap(), 1);
    }
}

#[test]
fn local_admin_may_move_within_current_tree() {
    let ledger = global_tree();
    let machine = LinkageMachine::new(&ledger, &ValidatorConfig::default());
    let transition = machine
        .relink(BEE, 3, hat(2, &[2]), LinkOptions::default())
        .unwrap();
    assert_eq!(transition.resulting_record(), LinkRecord::Approved(hat(2, &[2])));
}

#[test]
fn local_admin_may_promote_to_tippy_top_but_not_a_sibling_branch() {
    let ledger = global_tree();
    let machine = LinkageMachine::new(&ledger, &ValidatorConfig::default());

    // CARL wears 2.1 (admin of tree 3) and 1.2 (admin of tree 4).
    assert!(machine
        .relink(CARL, 3, hat(1, &[2]), LinkOptions::default())
        .is_ok());
    assert_eq!(
        machine.relink(CARL, 3, hat(4, &[1]), LinkOptions::default()),
        Err(HatsError::CrossLinkage {
            domain: 3,
            admin: hat(4, &[1]),
            tippy_top: 1,
        })
    );
    // BEE wears 4.1 outright; still a cross-tree move.
    assert!(matches!(
        machine.relink(BEE, 3, hat(4, &[1]), LinkOptions::default()),
        Err(HatsError::CrossLinkage { .. })
    ));
}

#[test]
fn tippy_top_wearer_may_relink_anywhere_acyclic() {
    let ledger = global_tree();
    let machine = LinkageMachine::new(&ledger, &ValidatorConfig::default());
    assert!(machine
        .relink(TOP, 3, hat(4, &[1]), LinkOptions::default())
        .is_ok());
    assert!(machine
        .relink(TOP, 2, hat(4, &[1]), LinkOptions::default())
        .is_ok());
}

#[test]
fn relinking_under_own_descendant_is_circular() {
    let ledger = global_tree();
    let machine = LinkageMachine::new(&ledger, &ValidatorConfig::default());
    // Tree 3 hangs below tree 2, so 2 under 3.1 would loop.
    assert_eq!(
        machine.relink(TOP, 2, hat(3, &[1]), LinkOptions::default()),
        Err(HatsError::CircularLinkage {
            domain: 2,
            admin: hat(3, &[1]),
        })
    );
    // So would tree 1 under anything in its global tree.
    assert!(matches!(
        machine.request(TOP, 1, hat(4, &[1])),
        Err(HatsError::CircularLinkage { domain: 1, .. })
    ));
}

#[test]
fn relink_requires_both_authorities() {
    let ledger = global_tree();
    let machine = LinkageMachine::new(&ledger, &ValidatorConfig::default());
    // DOT wears top hat 4 but administers nothing above tree 3.
    assert_eq!(
        machine.relink(DOT, 3, hat(4, &[1]), LinkOptions::default()),
        Err(HatsError::NotAdmin {
            caller: DOT,
            hat: root_id(3),
        })
    );
    // CAT wears top hat 3, but a linked top hat is administered from above.
    assert!(matches!(
        machine.relink(CAT, 3, hat(2, &[2]), LinkOptions::default()),
        Err(HatsError::NotAdmin { .. })
    ));
}

#[test]
fn validation_and_ledger_errors_stay_distinct() {
    let mut ledger = global_tree();
    let config = ValidatorConfig::default();
    let transition = LinkageMachine::new(&ledger, &config)
        .relink(BEE, 3, hat(2, &[2]), LinkOptions::default())
        .unwrap();

    // Someone moves tree 3 first.
    ledger.set_link(3, LinkRecord::Approved(hat(1, &[2])));
    assert!(matches!(
        ledger.submit(BEE, &transition, &config),
        Err(LedgerError::Stale { domain: 3, .. })
    ));
}

const EVE: Address = Address::repeat_byte(0x06);

#[test]
fn linked_tree_cannot_leave_its_global_tree_by_request() {
    let mut ledger = global_tree();
    let five = ledger.mint_top_hat(EVE).unwrap();
    let elsewhere = ledger.create_hat(five).unwrap();
    let config = ValidatorConfig::default();

    // CARL administers tree 3 through 2.1 and asks to move it into tree 5.
    let request = LinkageMachine::new(&ledger, &config)
        .request(CARL, 3, elsewhere)
        .unwrap();
    submit(&mut ledger, CARL, request);
    assert_eq!(
        ledger.link_record(3),
        LinkRecord::Relinking {
            linked: hat(2, &[1]),
            requested: elsewhere,
        }
    );

    // The approved link still holds until the request is approved.
    let resolver = Resolver::new(&ledger);
    assert_eq!(resolver.tippy_top_domain(3).unwrap(), 1);
    assert_eq!(resolver.global_level(hat(3, &[1])).unwrap(), 5);
    assert!(ledger.is_admin(CARL, root_id(3)));

    // EVE runs tree 5 but not the tippy top, so the move crosses global trees.
    assert_eq!(
        LinkageMachine::new(&ledger, &config).approve(EVE, 3, elsewhere, LinkOptions::default()),
        Err(HatsError::CrossLinkage {
            domain: 3,
            admin: elsewhere,
            tippy_top: 1,
        })
    );

    // The tippy-top wearer may approve it once they can act for the target.
    ledger.mint(elsewhere, TOP).unwrap();
    let approve = LinkageMachine::new(&ledger, &config)
        .approve(TOP, 3, elsewhere, LinkOptions::default())
        .unwrap();
    submit(&mut ledger, TOP, approve);
    assert_eq!(ledger.link_record(3), LinkRecord::Approved(elsewhere));
    assert_eq!(Resolver::new(&ledger).tippy_top_domain(3).unwrap(), 5);
}

#[test]
fn sparse_domains_bound_link_walks_by_root_count() {
    let mut ledger = MemoryLedger::new();
    ledger.insert_hat(root_id(7)).unwrap();
    ledger.insert_hat(root_id(3_000_000_000)).unwrap();
    let newest = ledger.mint_top_hat(CAT).unwrap();
    assert_eq!(newest, root_id(3_000_000_001));
    assert_eq!(ledger.known_root_count(), 3);

    // A corrupted two-tree loop is reported after three hops at most.
    ledger.set_link(7, LinkRecord::Approved(root_id(3_000_000_000)));
    ledger.set_link(3_000_000_000, LinkRecord::Approved(root_id(7)));
    let machine = LinkageMachine::new(&ledger, &ValidatorConfig::default());
    assert_eq!(
        machine.request(CAT, newest.domain(), root_id(7)),
        Err(HatsError::LinkCycleDetected {
            domain: newest.domain(),
            budget: 3,
        })
    );
}
