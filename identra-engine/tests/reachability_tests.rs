//! Resource reachability over the membership graph, including the fail-fast
//! rejection of group-shaped member rows.

use identra_engine::{EngineError, ReachabilityCalculator};
use identra_model::{Directory, Entity, Group, Membership};
use identra_store::SqliteDirectory;
use identra_types::EntityKey;
use pretty_assertions::assert_eq;
use std::collections::BTreeSet;
use std::sync::Arc;

fn setup() -> (Arc<SqliteDirectory>, ReachabilityCalculator) {
    let dir = Arc::new(SqliteDirectory::open_in_memory().unwrap());
    let calc = ReachabilityCalculator::new(dir.clone());
    (dir, calc)
}

#[test]
fn reachability_is_the_union_of_direct_and_membership_grants() {
    let (dir, calc) = setup();
    let mut alice = Entity::user("/");
    alice.resources.insert("scim".into());
    dir.save_entity(&alice).unwrap();

    let mut devs = Group::new("devs", "/");
    devs.resources.insert("ldap".into());
    dir.save_group(&devs).unwrap();
    dir.add_membership(&Membership::new_static(alice.key, devs.key))
        .unwrap();

    let expected: BTreeSet<_> = ["scim".into(), "ldap".into()].into();
    assert_eq!(calc.reachable(&alice.key).unwrap(), expected);
}

#[test]
fn excluding_a_group_keeps_grants_from_other_paths() {
    let (dir, calc) = setup();
    let alice = Entity::user("/");
    dir.save_entity(&alice).unwrap();

    let mut devs = Group::new("devs", "/");
    devs.resources.insert("ldap".into());
    let mut ops = Group::new("ops", "/");
    ops.resources.insert("ldap".into());
    dir.save_group(&devs).unwrap();
    dir.save_group(&ops).unwrap();
    dir.add_membership(&Membership::new_static(alice.key, devs.key))
        .unwrap();
    dir.add_membership(&Membership::new_static(alice.key, ops.key))
        .unwrap();

    let still = calc.reachable_excluding(&alice.key, &devs.key).unwrap();
    assert!(still.contains(&"ldap".into()));
}

#[test]
fn unknown_entity_reaches_nothing() {
    let (_dir, calc) = setup();
    assert!(calc.reachable(&EntityKey::new()).unwrap().is_empty());
}

#[test]
fn group_as_member_of_a_group_fails_fast() {
    let (dir, calc) = setup();
    let alice = Entity::user("/");
    dir.save_entity(&alice).unwrap();

    let inner = Group::new("inner", "/");
    let outer = Group::new("outer", "/");
    dir.save_group(&inner).unwrap();
    dir.save_group(&outer).unwrap();

    dir.add_membership(&Membership::new_static(alice.key, inner.key))
        .unwrap();
    // the forbidden row: a group on the member end of a membership
    dir.add_membership(&Membership::new_static(inner.key, outer.key))
        .unwrap();

    let err = calc.reachable(&alice.key).unwrap_err();
    assert!(matches!(err, EngineError::InvariantViolation(_)), "{err}");
}

#[test]
fn membership_to_an_unknown_group_fails_fast() {
    let (dir, calc) = setup();
    let alice = Entity::user("/");
    dir.save_entity(&alice).unwrap();
    dir.add_membership(&Membership::new_static(alice.key, EntityKey::new()))
        .unwrap();

    let err = calc.reachable(&alice.key).unwrap_err();
    assert!(matches!(err, EngineError::InvariantViolation(_)), "{err}");
}
