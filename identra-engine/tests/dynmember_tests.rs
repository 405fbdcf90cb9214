//! Dynamic-membership reconciliation against an in-memory directory.

use identra_engine::{DynMembershipManager, EngineError};
use identra_model::{
    AttrField, AttrValue, Directory, Entity, Group, KindSchema, Membership, SchemaRegistry,
};
use identra_store::SqliteDirectory;
use identra_types::{EntityKind, RealmPath};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn setup() -> (Arc<SqliteDirectory>, DynMembershipManager) {
    let dir = Arc::new(SqliteDirectory::open_in_memory().unwrap());
    dir.add_realm(&RealmPath::from("/")).unwrap();

    let mut schemas = SchemaRegistry::new();
    schemas.register_user(KindSchema::user(vec![
        AttrField::text("department"),
        AttrField::number("age"),
    ]));
    schemas.register_any_object(KindSchema::any_object(
        "printer",
        vec![AttrField::text("location")],
    ));
    let manager = DynMembershipManager::new(dir.clone(), Arc::new(schemas));
    (dir, manager)
}

fn user_in_department(dir: &SqliteDirectory, department: &str) -> Entity {
    let mut user = Entity::user("/");
    user.set_attr("department", vec![AttrValue::Text(department.into())]);
    dir.save_entity(&user).unwrap();
    user
}

fn group(dir: &SqliteDirectory, name: &str) -> Group {
    let group = Group::new(name, "/");
    dir.save_group(&group).unwrap();
    group
}

#[test]
fn refresh_without_entity_changes_is_idempotent() {
    let (dir, manager) = setup();
    user_in_department(&dir, "eng");
    let mut devs = group(&dir, "devs");
    manager
        .set_condition(&mut devs, EntityKind::User, None, "department == 'eng'")
        .unwrap();
    dir.save_group(&devs).unwrap();

    let first = manager.refresh(&devs).unwrap();
    assert_eq!(first.added.len(), 1);

    let second = manager.refresh(&devs).unwrap();
    assert!(second.is_empty());
}

#[test]
fn membership_follows_attribute_changes() {
    let (dir, manager) = setup();
    let mut alice = user_in_department(&dir, "eng");
    let mut devs = group(&dir, "devs");
    manager
        .set_condition(&mut devs, EntityKind::User, None, "department == 'eng'")
        .unwrap();
    dir.save_group(&devs).unwrap();

    assert_eq!(manager.refresh(&devs).unwrap().added.len(), 1);

    alice.set_attr("department", vec![AttrValue::Text("sales".into())]);
    dir.save_entity(&alice).unwrap();

    let delta = manager.refresh(&devs).unwrap();
    assert_eq!(delta.removed.len(), 1);
    assert_eq!(delta.removed[0].member, alice.key);
    assert!(dir.members_of(&devs.key).unwrap().is_empty());
}

#[test]
fn refresh_never_touches_static_memberships() {
    let (dir, manager) = setup();
    let alice = user_in_department(&dir, "sales");
    let mut devs = group(&dir, "devs");
    dir.add_membership(&Membership::new_static(alice.key, devs.key))
        .unwrap();
    manager
        .set_condition(&mut devs, EntityKind::User, None, "department == 'eng'")
        .unwrap();
    dir.save_group(&devs).unwrap();

    let delta = manager.refresh(&devs).unwrap();
    assert!(delta.is_empty());

    let remaining = dir.members_of(&devs.key).unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(!remaining[0].is_dynamic());
}

#[test]
fn static_and_dynamic_membership_to_one_group_coexist() {
    let (dir, manager) = setup();
    let alice = user_in_department(&dir, "eng");
    let mut devs = group(&dir, "devs");
    dir.add_membership(&Membership::new_static(alice.key, devs.key))
        .unwrap();
    manager
        .set_condition(&mut devs, EntityKind::User, None, "department == 'eng'")
        .unwrap();
    dir.save_group(&devs).unwrap();
    manager.refresh(&devs).unwrap();

    let rows = dir.members_of(&devs.key).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows.iter().filter(|m| m.is_dynamic()).count(), 1);
}

#[test]
fn latest_condition_wins_per_slot() {
    let (dir, manager) = setup();
    let mut devs = group(&dir, "devs");
    manager
        .set_condition(&mut devs, EntityKind::User, None, "department == 'eng'")
        .unwrap();
    manager
        .set_condition(&mut devs, EntityKind::User, None, "age >= 21")
        .unwrap();

    assert_eq!(devs.dyn_conditions.len(), 1);
    let condition = devs.dyn_conditions.values().next().unwrap();
    assert_eq!(condition.text, "age >= 21");
}

#[test]
fn user_and_any_object_slots_are_independent() {
    let (dir, manager) = setup();
    let alice = user_in_department(&dir, "eng");
    let mut printer = Entity::any_object("printer", "/");
    printer.set_attr("location", vec![AttrValue::Text("lab".into())]);
    dir.save_entity(&printer).unwrap();

    let mut devs = group(&dir, "devs");
    manager
        .set_condition(&mut devs, EntityKind::User, None, "department == 'eng'")
        .unwrap();
    manager
        .set_condition(
            &mut devs,
            EntityKind::AnyObject,
            Some(&"printer".into()),
            "location == 'lab'",
        )
        .unwrap();
    dir.save_group(&devs).unwrap();

    let delta = manager.refresh(&devs).unwrap();
    assert_eq!(delta.added.len(), 2);
    let members: Vec<_> = delta.added.iter().map(|m| m.member).collect();
    assert!(members.contains(&alice.key));
    assert!(members.contains(&printer.key));
}

#[test]
fn clear_removes_condition_and_materialized_members() {
    let (dir, manager) = setup();
    user_in_department(&dir, "eng");
    let mut devs = group(&dir, "devs");
    manager
        .set_condition(&mut devs, EntityKind::User, None, "department == 'eng'")
        .unwrap();
    dir.save_group(&devs).unwrap();
    manager.refresh(&devs).unwrap();
    assert_eq!(dir.members_of(&devs.key).unwrap().len(), 1);

    manager.clear(&mut devs, EntityKind::User, None).unwrap();
    dir.save_group(&devs).unwrap();

    assert!(devs.dyn_conditions.is_empty());
    assert!(dir.members_of(&devs.key).unwrap().is_empty());
}

#[test]
fn group_kind_is_rejected_as_condition_target() {
    let (dir, manager) = setup();
    let mut devs = group(&dir, "devs");
    let err = manager
        .set_condition(&mut devs, EntityKind::Group, None, "department == 'eng'")
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAnyType(_)));
}

#[test]
fn unknown_any_object_type_is_rejected() {
    let (dir, manager) = setup();
    let mut devs = group(&dir, "devs");
    let err = manager
        .set_condition(
            &mut devs,
            EntityKind::AnyObject,
            Some(&"nosuch".into()),
            "location == 'lab'",
        )
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAnyType(_)));
}

#[test]
fn malformed_condition_text_is_rejected() {
    let (dir, manager) = setup();
    let mut devs = group(&dir, "devs");
    let err = manager
        .set_condition(&mut devs, EntityKind::User, None, "department == ")
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidSearchParameters(_)));
}

#[test]
fn condition_on_undeclared_attribute_is_rejected() {
    let (dir, manager) = setup();
    let mut devs = group(&dir, "devs");
    let err = manager
        .set_condition(&mut devs, EntityKind::User, None, "shoe_size == 43")
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidAnyType(_)));
}
