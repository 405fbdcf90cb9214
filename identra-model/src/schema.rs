use identra_types::{AnyTypeKey, AuxClassKey, EntityKind};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// The data type of a plain attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Text,
    Number,
    Bool,
    Date,
}

/// One attribute declared by a kind's schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttrField {
    pub name: String,
    pub field_type: FieldType,
}

impl AttrField {
    fn simple(name: &str, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }

    /// Shorthand for a text field.
    pub fn text(name: &str) -> Self {
        Self::simple(name, FieldType::Text)
    }

    /// Shorthand for a numeric field.
    pub fn number(name: &str) -> Self {
        Self::simple(name, FieldType::Number)
    }

    /// Shorthand for a boolean field.
    pub fn bool(name: &str) -> Self {
        Self::simple(name, FieldType::Bool)
    }

    /// Shorthand for an ISO-8601 date field.
    pub fn date(name: &str) -> Self {
        Self::simple(name, FieldType::Date)
    }
}

/// Declares the plain attributes available to one entity kind (and, for
/// any-objects, one specific type). Predicate compilation validates attribute
/// references against this.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindSchema {
    pub kind: EntityKind,
    /// Set for any-object schemas only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_type: Option<AnyTypeKey>,
    pub fields: Vec<AttrField>,
}

impl KindSchema {
    /// Creates the schema for user entities.
    #[must_use]
    pub fn user(fields: Vec<AttrField>) -> Self {
        Self {
            kind: EntityKind::User,
            any_type: None,
            fields,
        }
    }

    /// Creates the schema for one any-object type.
    #[must_use]
    pub fn any_object(any_type: impl Into<AnyTypeKey>, fields: Vec<AttrField>) -> Self {
        Self {
            kind: EntityKind::AnyObject,
            any_type: Some(any_type.into()),
            fields,
        }
    }

    /// Looks up a declared field by attribute name.
    pub fn field(&self, name: &str) -> Option<&AttrField> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// The schema knowledge the engine validates against: per-kind attribute
/// schemas, the known any-object types and the known auxiliary attribute
/// classes.
///
/// Stands in for the type/schema lookup a full deployment would back with its
/// persistence layer; within one engine call its content is assumed stable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaRegistry {
    user: Option<KindSchema>,
    any_objects: BTreeMap<AnyTypeKey, KindSchema>,
    aux_classes: BTreeSet<AuxClassKey>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the user schema, replacing any previous one.
    pub fn register_user(&mut self, schema: KindSchema) {
        self.user = Some(schema);
    }

    /// Installs the schema for one any-object type, replacing any previous one.
    pub fn register_any_object(&mut self, schema: KindSchema) {
        if let Some(any_type) = schema.any_type.clone() {
            self.any_objects.insert(any_type, schema);
        }
    }

    /// Declares an auxiliary attribute class.
    pub fn register_aux_class(&mut self, key: impl Into<AuxClassKey>) {
        self.aux_classes.insert(key.into());
    }

    /// Returns the user schema, if one is registered.
    pub fn user_schema(&self) -> Option<&KindSchema> {
        self.user.as_ref()
    }

    /// Returns the schema for one any-object type.
    pub fn any_object_schema(&self, any_type: &AnyTypeKey) -> Option<&KindSchema> {
        self.any_objects.get(any_type)
    }

    /// True when the any-object type is known.
    pub fn has_any_type(&self, any_type: &AnyTypeKey) -> bool {
        self.any_objects.contains_key(any_type)
    }

    /// True when the auxiliary class is known.
    pub fn has_aux_class(&self, key: &AuxClassKey) -> bool {
        self.aux_classes.contains(key)
    }
}
