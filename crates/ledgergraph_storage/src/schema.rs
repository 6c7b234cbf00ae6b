//! Entity schemas and the schema registry.
//!
//! Every entity type declares an ordered list of properties. The order is the
//! constructor order: materializing an object walks the properties by
//! ordinal and computes one value per property.
//!
//! Properties are identified by [`PropertyId`] constants, declared next to
//! the entity type they belong to:
//!
//! ```rust
//! use ledgergraph_storage::{EntityTypeId, PropertyId};
//!
//! pub const ACCOUNT: EntityTypeId = EntityTypeId::new(2);
//! pub const ACCOUNT_NAME: PropertyId = PropertyId::new(ACCOUNT, 0);
//! pub const ACCOUNT_ENTRIES: PropertyId = PropertyId::new(ACCOUNT, 1);
//! ```

use crate::error::{StorageError, StorageResult};
use crate::value::{Value, ValueType};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Identifier for an entity type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityTypeId(u32);

impl EntityTypeId {
    /// Creates a new entity type ID.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl fmt::Display for EntityTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type:{}", self.0)
    }
}

/// Identifier for a property: the owning entity type plus the property's
/// ordinal in that type's constructor order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PropertyId {
    entity: EntityTypeId,
    ordinal: u16,
}

impl PropertyId {
    /// Creates a property ID.
    #[must_use]
    pub const fn new(entity: EntityTypeId, ordinal: u16) -> Self {
        Self { entity, ordinal }
    }

    /// Returns the entity type that declares this property.
    #[must_use]
    pub const fn entity(self) -> EntityTypeId {
        self.entity
    }

    /// Returns the constructor ordinal.
    #[must_use]
    pub const fn ordinal(self) -> u16 {
        self.ordinal
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.entity, self.ordinal)
    }
}

/// What a property holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    /// A plain value with a default used for freshly created objects.
    Scalar {
        /// Declared value type.
        value_type: ValueType,
        /// Value of the property on a new object.
        default: Value,
    },
    /// A reference to another entity; defaults to `Null`.
    Reference {
        /// Entity type the reference must point at.
        target: EntityTypeId,
    },
    /// An owned list of child entities.
    List {
        /// Entity type of the list members.
        member: EntityTypeId,
    },
}

/// A single property declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyDescriptor {
    /// Property identity.
    pub id: PropertyId,
    /// Human readable name.
    pub name: &'static str,
    /// Property kind.
    pub kind: PropertyKind,
}

impl PropertyDescriptor {
    /// Returns true for scalar and reference properties.
    #[must_use]
    pub fn is_value(&self) -> bool {
        !self.is_list()
    }

    /// Returns true for list properties.
    #[must_use]
    pub fn is_list(&self) -> bool {
        matches!(self.kind, PropertyKind::List { .. })
    }

    /// Returns the reference target, for reference properties.
    #[must_use]
    pub fn reference_target(&self) -> Option<EntityTypeId> {
        match self.kind {
            PropertyKind::Reference { target } => Some(target),
            _ => None,
        }
    }

    /// Returns the member type, for list properties.
    #[must_use]
    pub fn list_member(&self) -> Option<EntityTypeId> {
        match self.kind {
            PropertyKind::List { member } => Some(member),
            _ => None,
        }
    }

    /// Returns the value a new object starts with.
    ///
    /// List properties have no value and return `Null`.
    #[must_use]
    pub fn default_value(&self) -> Value {
        match &self.kind {
            PropertyKind::Scalar { default, .. } => default.clone(),
            PropertyKind::Reference { .. } | PropertyKind::List { .. } => Value::Null,
        }
    }

    /// Checks that `value` may be written to this property.
    ///
    /// Reference targets are not checked here because the value only carries
    /// the key; stores check the target type when they resolve it.
    pub fn check_value(&self, value: &Value) -> StorageResult<()> {
        let expected = match &self.kind {
            PropertyKind::Scalar { value_type, .. } => *value_type,
            PropertyKind::Reference { .. } => ValueType::Reference,
            PropertyKind::List { .. } => {
                return Err(StorageError::WrongPropertyKind {
                    property: self.id,
                    expected: "value",
                })
            }
        };
        if value.conforms_to(expected) {
            Ok(())
        } else {
            Err(StorageError::TypeMismatch {
                property: self.id,
                expected,
                actual: value.value_type(),
            })
        }
    }
}

/// Schema for one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    id: EntityTypeId,
    name: &'static str,
    properties: Vec<PropertyDescriptor>,
}

impl EntitySchema {
    /// Starts a schema with no properties.
    #[must_use]
    pub fn new(id: EntityTypeId, name: &'static str) -> Self {
        Self {
            id,
            name,
            properties: Vec::new(),
        }
    }

    /// Declares a scalar property with the type's natural default.
    #[must_use]
    pub fn scalar(self, id: PropertyId, name: &'static str, value_type: ValueType) -> Self {
        let default = match value_type {
            ValueType::Bool => Value::Bool(false),
            ValueType::Integer => Value::Integer(0),
            ValueType::Text => Value::Text(String::new()),
            ValueType::Null | ValueType::Reference => Value::Null,
        };
        self.scalar_with_default(id, name, value_type, default)
    }

    /// Declares a scalar property with an explicit default.
    #[must_use]
    pub fn scalar_with_default(
        mut self,
        id: PropertyId,
        name: &'static str,
        value_type: ValueType,
        default: Value,
    ) -> Self {
        self.properties.push(PropertyDescriptor {
            id,
            name,
            kind: PropertyKind::Scalar {
                value_type,
                default,
            },
        });
        self
    }

    /// Declares a reference property.
    #[must_use]
    pub fn reference(mut self, id: PropertyId, name: &'static str, target: EntityTypeId) -> Self {
        self.properties.push(PropertyDescriptor {
            id,
            name,
            kind: PropertyKind::Reference { target },
        });
        self
    }

    /// Declares a list property.
    #[must_use]
    pub fn list(mut self, id: PropertyId, name: &'static str, member: EntityTypeId) -> Self {
        self.properties.push(PropertyDescriptor {
            id,
            name,
            kind: PropertyKind::List { member },
        });
        self
    }

    /// Returns the entity type ID.
    #[must_use]
    pub fn id(&self) -> EntityTypeId {
        self.id
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns all properties in constructor order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Looks up a property declared by this entity type.
    pub fn property(&self, id: PropertyId) -> StorageResult<&PropertyDescriptor> {
        if id.entity() != self.id {
            return Err(StorageError::UnknownProperty {
                entity: self.id,
                property: id,
            });
        }
        self.properties
            .get(usize::from(id.ordinal()))
            .ok_or(StorageError::UnknownProperty {
                entity: self.id,
                property: id,
            })
    }

    /// Looks up a list property declared by this entity type.
    pub fn list_property(&self, id: PropertyId) -> StorageResult<&PropertyDescriptor> {
        let descriptor = self.property(id)?;
        if descriptor.is_list() {
            Ok(descriptor)
        } else {
            Err(StorageError::WrongPropertyKind {
                property: id,
                expected: "list",
            })
        }
    }

    /// Looks up a scalar or reference property declared by this entity type.
    pub fn value_property(&self, id: PropertyId) -> StorageResult<&PropertyDescriptor> {
        let descriptor = self.property(id)?;
        if descriptor.is_value() {
            Ok(descriptor)
        } else {
            Err(StorageError::WrongPropertyKind {
                property: id,
                expected: "value",
            })
        }
    }

    /// Iterates over the list properties in constructor order.
    pub fn lists(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.is_list())
    }

    /// Iterates over the reference properties in constructor order.
    pub fn references(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties
            .iter()
            .filter(|p| p.reference_target().is_some())
    }

    fn validate(&self, known: &HashSet<EntityTypeId>) -> StorageResult<()> {
        let mut names = HashSet::new();
        for (index, property) in self.properties.iter().enumerate() {
            if property.id.entity() != self.id {
                return Err(StorageError::invalid_schema(format!(
                    "{}.{} is declared with owner {}",
                    self.name,
                    property.name,
                    property.id.entity()
                )));
            }
            if usize::from(property.id.ordinal()) != index {
                return Err(StorageError::invalid_schema(format!(
                    "{}.{} has ordinal {}, expected {index}",
                    self.name,
                    property.name,
                    property.id.ordinal()
                )));
            }
            if !names.insert(property.name) {
                return Err(StorageError::invalid_schema(format!(
                    "{} declares {} twice",
                    self.name, property.name
                )));
            }
            match &property.kind {
                PropertyKind::Scalar {
                    value_type,
                    default,
                } => {
                    if matches!(value_type, ValueType::Null | ValueType::Reference) {
                        return Err(StorageError::invalid_schema(format!(
                            "{}.{} cannot be a scalar of type {value_type}",
                            self.name, property.name
                        )));
                    }
                    property.check_value(default)?;
                }
                PropertyKind::Reference { target: other } | PropertyKind::List { member: other } => {
                    if !known.contains(other) {
                        return Err(StorageError::invalid_schema(format!(
                            "{}.{} points at unregistered {other}",
                            self.name, property.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

/// The set of entity schemas known to a store.
///
/// The registry is immutable once built and is shared (`Arc`) between the
/// store and every transaction manager opened against it.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    entities: BTreeMap<EntityTypeId, EntitySchema>,
}

impl SchemaRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> SchemaRegistryBuilder {
        SchemaRegistryBuilder::default()
    }

    /// Returns the schema for an entity type.
    pub fn schema_for(&self, entity: EntityTypeId) -> StorageResult<&EntitySchema> {
        self.entities
            .get(&entity)
            .ok_or(StorageError::UnknownEntityType { entity })
    }

    /// Looks up a property descriptor by ID.
    pub fn property(&self, id: PropertyId) -> StorageResult<&PropertyDescriptor> {
        self.schema_for(id.entity())?.property(id)
    }

    /// Iterates over all registered schemas in entity ID order.
    pub fn entities(&self) -> impl Iterator<Item = &EntitySchema> {
        self.entities.values()
    }

    /// Returns the number of registered entity types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if no entity types are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Builder for [`SchemaRegistry`].
#[derive(Debug, Default)]
pub struct SchemaRegistryBuilder {
    entities: Vec<EntitySchema>,
}

impl SchemaRegistryBuilder {
    /// Adds an entity schema.
    #[must_use]
    pub fn entity(mut self, schema: EntitySchema) -> Self {
        self.entities.push(schema);
        self
    }

    /// Validates the declarations and builds the registry.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidSchema`] if:
    /// - Two schemas share an entity ID
    /// - A property is declared under the wrong owner or out of order
    /// - A reference or list points at an unregistered entity type
    /// - A scalar default does not match its declared type
    pub fn build(self) -> StorageResult<SchemaRegistry> {
        let mut known = HashSet::new();
        for schema in &self.entities {
            if !known.insert(schema.id) {
                return Err(StorageError::invalid_schema(format!(
                    "entity type {} registered twice",
                    schema.id
                )));
            }
        }
        for schema in &self.entities {
            schema.validate(&known)?;
        }
        Ok(SchemaRegistry {
            entities: self.entities.into_iter().map(|s| (s.id, s)).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FOLDER: EntityTypeId = EntityTypeId::new(1);
    const FOLDER_NAME: PropertyId = PropertyId::new(FOLDER, 0);
    const FOLDER_FILES: PropertyId = PropertyId::new(FOLDER, 1);
    const FILE: EntityTypeId = EntityTypeId::new(2);
    const FILE_SIZE: PropertyId = PropertyId::new(FILE, 0);
    const FILE_LINK: PropertyId = PropertyId::new(FILE, 1);

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .entity(
                EntitySchema::new(FOLDER, "Folder")
                    .scalar(FOLDER_NAME, "name", ValueType::Text)
                    .list(FOLDER_FILES, "files", FILE),
            )
            .entity(
                EntitySchema::new(FILE, "File")
                    .scalar_with_default(FILE_SIZE, "size", ValueType::Integer, Value::Integer(4))
                    .reference(FILE_LINK, "link", FILE),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn lookup_properties() {
        let registry = registry();
        let folder = registry.schema_for(FOLDER).unwrap();
        assert_eq!(folder.name(), "Folder");
        assert_eq!(folder.property(FOLDER_NAME).unwrap().name, "name");
        assert!(folder.list_property(FOLDER_FILES).is_ok());
        assert!(folder.list_property(FOLDER_NAME).is_err());
        assert_eq!(registry.property(FILE_LINK).unwrap().reference_target(), Some(FILE));
    }

    #[test]
    fn foreign_property_is_unknown() {
        let registry = registry();
        let folder = registry.schema_for(FOLDER).unwrap();
        assert!(matches!(
            folder.property(FILE_SIZE),
            Err(StorageError::UnknownProperty { .. })
        ));
    }

    #[test]
    fn defaults() {
        let registry = registry();
        assert_eq!(registry.property(FILE_SIZE).unwrap().default_value(), Value::Integer(4));
        assert_eq!(
            registry.property(FOLDER_NAME).unwrap().default_value(),
            Value::text("")
        );
        assert_eq!(registry.property(FILE_LINK).unwrap().default_value(), Value::Null);
    }

    #[test]
    fn check_value_rejects_wrong_type() {
        let registry = registry();
        let size = registry.property(FILE_SIZE).unwrap();
        assert!(size.check_value(&Value::Integer(1)).is_ok());
        assert!(size.check_value(&Value::Null).is_ok());
        assert!(matches!(
            size.check_value(&Value::text("big")),
            Err(StorageError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn unregistered_target_is_rejected() {
        let result = SchemaRegistry::builder()
            .entity(EntitySchema::new(FOLDER, "Folder").list(
                PropertyId::new(FOLDER, 0),
                "files",
                FILE,
            ))
            .build();
        assert!(matches!(result, Err(StorageError::InvalidSchema(_))));
    }

    #[test]
    fn out_of_order_ordinal_is_rejected() {
        let result = SchemaRegistry::builder()
            .entity(EntitySchema::new(FOLDER, "Folder").scalar(
                PropertyId::new(FOLDER, 3),
                "name",
                ValueType::Text,
            ))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn duplicate_entity_is_rejected() {
        let result = SchemaRegistry::builder()
            .entity(EntitySchema::new(FOLDER, "Folder"))
            .entity(EntitySchema::new(FOLDER, "Again"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn bad_default_is_rejected() {
        let result = SchemaRegistry::builder()
            .entity(EntitySchema::new(FOLDER, "Folder").scalar_with_default(
                FOLDER_NAME,
                "name",
                ValueType::Text,
                Value::Integer(1),
            ))
            .build();
        assert!(result.is_err());
    }
}
