//! Model-level behavior: attribute access, schema lookups, membership
//! constructors and the wire shape of attribute values.

use identra_model::{
    AttrField, AttrValue, DynSlot, Entity, Group, GroupSpec, KindSchema, Membership,
    MembershipOrigin, SchemaRegistry,
};
use identra_types::EntityKind;
use pretty_assertions::assert_eq;

#[test]
fn multi_valued_attribute_access() {
    let mut alice = Entity::user("/");
    alice.set_attr(
        "department",
        vec![AttrValue::Text("eng".into()), AttrValue::Text("ops".into())],
    );
    alice.set_attr("age", vec![AttrValue::Int(34)]);

    assert_eq!(alice.attr_values("department").len(), 2);
    assert_eq!(alice.attr_str("department"), Some("eng"));
    assert_eq!(alice.attr_int("age"), Some(34));
    assert!(alice.has_attr("age"));
    assert!(!alice.has_attr("shoe_size"));
    assert_eq!(alice.attr_str("shoe_size"), None);
}

#[test]
fn set_attr_replaces_all_values() {
    let mut alice = Entity::user("/");
    alice.set_attr("department", vec![AttrValue::Text("eng".into())]);
    alice.set_attr("department", vec![AttrValue::Text("sales".into())]);
    assert_eq!(alice.attr_values("department").len(), 1);
    assert_eq!(alice.attr_str("department"), Some("sales"));
}

#[test]
fn attr_value_wire_shape_is_tagged() {
    let value = AttrValue::Date("2024-01-31".into());
    let json = serde_json::to_value(&value).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "type": "date", "value": "2024-01-31" })
    );
    let back: AttrValue = serde_json::from_value(json).unwrap();
    assert_eq!(back, value);
}

#[test]
fn entity_constructors_set_kind_and_type() {
    let user = Entity::user("/");
    assert_eq!(user.kind, EntityKind::User);
    assert_eq!(user.any_type, None);

    let printer = Entity::any_object("printer", "/lab");
    assert_eq!(printer.kind, EntityKind::AnyObject);
    assert_eq!(printer.any_type, Some("printer".into()));
    assert_eq!(printer.realm.as_str(), "/lab");
}

#[test]
fn schema_registry_lookups() {
    let mut schemas = SchemaRegistry::new();
    schemas.register_user(KindSchema::user(vec![AttrField::text("department")]));
    schemas.register_any_object(KindSchema::any_object(
        "printer",
        vec![AttrField::text("location"), AttrField::bool("color")],
    ));
    schemas.register_aux_class("csv");

    assert!(schemas.user_schema().is_some());
    assert!(schemas.has_any_type(&"printer".into()));
    assert!(!schemas.has_any_type(&"camera".into()));
    assert!(schemas.has_aux_class(&"csv".into()));
    assert!(!schemas.has_aux_class(&"geo".into()));

    let printer = schemas.any_object_schema(&"printer".into()).unwrap();
    assert!(printer.field("location").is_some());
    assert!(printer.field("nosuch").is_none());
}

#[test]
fn dyn_slot_wire_form_is_a_plain_string() {
    assert_eq!(
        serde_json::to_value(DynSlot::Users).unwrap(),
        serde_json::json!("users")
    );

    let slot = DynSlot::AnyObjects("printer".into());
    let json = serde_json::to_value(&slot).unwrap();
    assert_eq!(json, serde_json::json!("any_objects:printer"));
    let back: DynSlot = serde_json::from_value(json).unwrap();
    assert_eq!(back, slot);

    assert!(serde_json::from_value::<DynSlot>(serde_json::json!("any_objects:")).is_err());
    assert!(serde_json::from_value::<DynSlot>(serde_json::json!("groups")).is_err());
}

#[test]
fn membership_origin_accessors() {
    let alice = Entity::user("/");
    let devs = Group::new("devs", "/");

    let fixed = Membership::new_static(alice.key, devs.key);
    assert!(!fixed.is_dynamic());
    assert_eq!(fixed.dyn_slot(), None);

    let derived = Membership::new_dynamic(alice.key, devs.key, DynSlot::Users);
    assert!(derived.is_dynamic());
    assert_eq!(derived.dyn_slot(), Some(&DynSlot::Users));
    assert_eq!(derived.origin, MembershipOrigin::Dynamic(DynSlot::Users));
}

#[test]
fn type_extension_lookup_by_any_type() {
    let mut devs = Group::new("devs", "/");
    devs.type_extensions.push(identra_model::TypeExtension {
        any_type: "printer".into(),
        aux_classes: ["csv".into()].into(),
    });

    assert!(devs.type_extension(&"printer".into()).is_some());
    assert!(devs.type_extension(&"camera".into()).is_none());
}

#[test]
fn group_spec_default_describes_no_changes() {
    let spec = GroupSpec::default();
    assert_eq!(spec.name, None);
    assert_eq!(spec.realm, None);
    assert!(spec.attrs.is_empty());
    assert!(spec.resources.is_empty());
    assert_eq!(spec.udyn_condition, None);
    assert!(spec.adyn_conditions.is_empty());
    assert!(spec.type_extensions.is_empty());
}
