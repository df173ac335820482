//! # Entity Schemas
//!
//! The query engine never reflects over concrete entity types. Every entity it
//! can paginate is described by an [`EntitySchema`] value: its table, its key,
//! the scalar fields clients may reference and the relations they may traverse
//! with dot-notation (e.g. `department.name`).
//!
//! Schemas are grouped in a [`SchemaRegistry`], which is validated once when it
//! is built. After that, every identifier that can reach generated SQL (tables,
//! columns, junction keys) is known to be a plain identifier declared by the
//! application, never something taken from a request.
//!
//! ```rust,ignore
//! let registry = SchemaRegistry::new([
//!     EntitySchema::new("Department", "ms_departments", FieldDef::new("id", "id", FieldKind::Int))
//!         .with_column("name", FieldKind::Text),
//!     EntitySchema::new("User", "users", FieldDef::new("id", "id", FieldKind::Int))
//!         .with_field("firstName", "first_name", FieldKind::Text)
//!         .with_relation(RelationDef::belongs_to("department", "Department", "department_id", "id")),
//! ])?;
//! ```

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::FilterValue;

/// Storage type of a scalar field.
///
/// Drives coercion of untyped filter values, text casts in search clauses and
/// decoding of result rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldKind {
    Text,
    Int,
    BigInt,
    Double,
    Bool,
    Uuid,
    DateTime,
}

impl FieldKind {
    #[must_use]
    pub const fn is_text(self) -> bool {
        matches!(self, Self::Text)
    }
}

/// A scalar field: the name clients use and the column it is stored in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDef {
    pub property: String,
    pub column: String,
    pub kind: FieldKind,
}

impl FieldDef {
    pub fn new(property: impl Into<String>, column: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            property: property.into(),
            column: column.into(),
            kind,
        }
    }

    /// Fields answer to their property name and to their column name, so
    /// `firstName` and `first_name` both resolve.
    #[must_use]
    pub fn answers_to(&self, name: &str) -> bool {
        self.property == name || self.column == name
    }
}

/// Cardinality of a relation as seen from the owning entity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RelationKind {
    ToOne,
    ToMany,
}

/// Junction table of a many-to-many relation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Junction {
    pub table: String,
    /// Junction column referencing the owning entity.
    pub source_key: String,
    /// Junction column referencing the target entity.
    pub target_key: String,
}

impl Junction {
    pub fn new(
        table: impl Into<String>,
        source_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            table: table.into(),
            source_key: source_key.into(),
            target_key: target_key.into(),
        }
    }
}

/// A declared relation.
///
/// `local_column` lives on the owning entity and `remote_column` on the
/// target. Without a junction the join condition is
/// `target.remote_column = owner.local_column`; with one, both sides are
/// matched against the junction keys.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationDef {
    pub name: String,
    pub target: String,
    pub kind: RelationKind,
    pub local_column: String,
    pub remote_column: String,
    pub via: Option<Junction>,
}

impl RelationDef {
    /// The owner holds the foreign key (`users.department_id -> ms_departments.id`).
    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
        target_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: RelationKind::ToOne,
            local_column: foreign_key.into(),
            remote_column: target_key.into(),
            via: None,
        }
    }

    /// The target holds a unique foreign key back to the owner.
    pub fn has_one(
        name: impl Into<String>,
        target: impl Into<String>,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            kind: RelationKind::ToOne,
            ..Self::has_many(name, target, local_key, foreign_key)
        }
    }

    /// The target holds a foreign key back to the owner.
    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        local_key: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: RelationKind::ToMany,
            local_column: local_key.into(),
            remote_column: foreign_key.into(),
            via: None,
        }
    }

    /// Owner and target are linked through `junction`. Both sides are matched
    /// on their `id` column unless overridden with [`RelationDef::with_keys`].
    pub fn many_to_many(name: impl Into<String>, target: impl Into<String>, junction: Junction) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind: RelationKind::ToMany,
            local_column: "id".to_string(),
            remote_column: "id".to_string(),
            via: Some(junction),
        }
    }

    #[must_use]
    pub fn with_keys(mut self, local_column: impl Into<String>, remote_column: impl Into<String>) -> Self {
        self.local_column = local_column.into();
        self.remote_column = remote_column.into();
        self
    }
}

/// Equality condition that marks a row as active (e.g. `isActive = 1`).
#[derive(Clone, Debug, PartialEq)]
pub struct ActiveFlag {
    pub field: String,
    pub value: FilterValue,
}

/// Declarative description of one entity.
#[derive(Clone, Debug, PartialEq)]
pub struct EntitySchema {
    name: String,
    table: String,
    key: FieldDef,
    fields: Vec<FieldDef>,
    relations: Vec<RelationDef>,
    default_sort: Option<String>,
    active_flag: Option<ActiveFlag>,
}

impl EntitySchema {
    pub fn new(name: impl Into<String>, table: impl Into<String>, key: FieldDef) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            key,
            fields: Vec::new(),
            relations: Vec::new(),
            default_sort: None,
            active_flag: None,
        }
    }

    #[must_use]
    pub fn with_field(
        mut self,
        property: impl Into<String>,
        column: impl Into<String>,
        kind: FieldKind,
    ) -> Self {
        self.fields.push(FieldDef::new(property, column, kind));
        self
    }

    /// Field whose property name equals its column name.
    #[must_use]
    pub fn with_column(self, name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        self.with_field(name.clone(), name, kind)
    }

    #[must_use]
    pub fn with_relation(mut self, relation: RelationDef) -> Self {
        self.relations.push(relation);
        self
    }

    /// Field used when a request names no sort column, or one that cannot be
    /// resolved. Defaults to the key.
    #[must_use]
    pub fn with_default_sort(mut self, field: impl Into<String>) -> Self {
        self.default_sort = Some(field.into());
        self
    }

    #[must_use]
    pub fn with_active_flag(mut self, field: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.active_flag = Some(ActiveFlag {
            field: field.into(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    #[must_use]
    pub fn key(&self) -> &FieldDef {
        &self.key
    }

    /// All scalar fields, key first.
    pub fn fields(&self) -> impl Iterator<Item = &FieldDef> {
        std::iter::once(&self.key).chain(self.fields.iter())
    }

    #[must_use]
    pub fn relations(&self) -> &[RelationDef] {
        &self.relations
    }

    #[must_use]
    pub fn active_flag(&self) -> Option<&ActiveFlag> {
        self.active_flag.as_ref()
    }

    #[must_use]
    pub fn find_field(&self, name: &str) -> Option<&FieldDef> {
        self.fields().find(|field| field.answers_to(name))
    }

    #[must_use]
    pub fn find_relation(&self, name: &str) -> Option<&RelationDef> {
        self.relations.iter().find(|relation| relation.name == name)
    }

    #[must_use]
    pub fn default_sort_field(&self) -> &FieldDef {
        self.default_sort
            .as_deref()
            .and_then(|name| self.find_field(name))
            .unwrap_or(&self.key)
    }

    fn has_column(&self, column: &str) -> bool {
        self.fields().any(|field| field.column == column)
    }
}

/// Configuration errors found while validating a [`SchemaRegistry`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("schema `{0}` is registered twice")]
    DuplicateSchema(String),

    #[error("schema `{schema}`: `{name}` is not a valid identifier")]
    InvalidIdentifier { schema: String, name: String },

    #[error("schema `{schema}`: `{name}` is declared more than once")]
    DuplicateName { schema: String, name: String },

    #[error("schema `{schema}`: `{field}` is not a declared field")]
    UnknownField { schema: String, field: String },

    #[error("schema `{schema}`: relation `{relation}` targets unknown schema `{target}`")]
    UnknownTarget {
        schema: String,
        relation: String,
        target: String,
    },

    #[error("schema `{schema}`: relation `{relation}` joins on undeclared column `{column}`")]
    UnknownJoinColumn {
        schema: String,
        relation: String,
        column: String,
    },

    #[error("unknown schema `{0}`")]
    UnknownSchema(String),
}

/// Plain SQL identifier: an ASCII letter followed by letters, digits or `_`.
///
/// Relation names are restricted the same way, which is what keeps `$` free
/// for use as the alias separator.
#[must_use]
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|first| first.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Validated set of schemas, keyed by schema name.
#[derive(Clone, Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, EntitySchema>,
}

impl SchemaRegistry {
    /// Registers and validates `schemas`.
    ///
    /// # Errors
    ///
    /// Returns the first [`SchemaError`] found: duplicate or malformed names,
    /// a default sort or active flag naming an undeclared field, a relation
    /// targeting an unregistered schema or joining on an undeclared column.
    pub fn new(schemas: impl IntoIterator<Item = EntitySchema>) -> Result<Self, SchemaError> {
        let mut registry = Self::default();
        for schema in schemas {
            if registry.schemas.contains_key(schema.name()) {
                return Err(SchemaError::DuplicateSchema(schema.name.clone()));
            }
            registry.schemas.insert(schema.name.clone(), schema);
        }
        for schema in registry.schemas.values() {
            registry.validate(schema)?;
        }
        Ok(registry)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntitySchema> {
        self.schemas.get(name)
    }

    /// Relations declared by schema `name` (empty for unknown schemas).
    pub fn relations_of(&self, name: &str) -> impl Iterator<Item = &RelationDef> {
        self.get(name).into_iter().flat_map(|schema| schema.relations().iter())
    }

    fn validate(&self, schema: &EntitySchema) -> Result<(), SchemaError> {
        let invalid = |name: &str| SchemaError::InvalidIdentifier {
            schema: schema.name.clone(),
            name: name.to_string(),
        };

        if !is_identifier(&schema.table) {
            return Err(invalid(&schema.table));
        }

        let mut seen = HashSet::new();
        for field in schema.fields() {
            for name in [&field.property, &field.column] {
                if !is_identifier(name) {
                    return Err(invalid(name));
                }
            }
            if !seen.insert(field.property.as_str()) {
                return Err(SchemaError::DuplicateName {
                    schema: schema.name.clone(),
                    name: field.property.clone(),
                });
            }
        }

        // a field answers to its property and its column; each name must
        // lead to one field only
        let mut owners: HashMap<&str, &str> = HashMap::new();
        for field in schema.fields() {
            for name in [field.property.as_str(), field.column.as_str()] {
                match owners.insert(name, field.property.as_str()) {
                    Some(owner) if owner != field.property => {
                        return Err(SchemaError::DuplicateName {
                            schema: schema.name.clone(),
                            name: name.to_string(),
                        });
                    }
                    _ => {}
                }
            }
        }

        for relation in &schema.relations {
            if !is_identifier(&relation.name) {
                return Err(invalid(&relation.name));
            }
            if !seen.insert(relation.name.as_str()) {
                return Err(SchemaError::DuplicateName {
                    schema: schema.name.clone(),
                    name: relation.name.clone(),
                });
            }
            self.validate_relation(schema, relation)?;
        }

        let declared = |field: &str| {
            if schema.find_field(field).is_some() {
                Ok(())
            } else {
                Err(SchemaError::UnknownField {
                    schema: schema.name.clone(),
                    field: field.to_string(),
                })
            }
        };
        if let Some(sort) = &schema.default_sort {
            declared(sort)?;
        }
        if let Some(flag) = &schema.active_flag {
            declared(&flag.field)?;
        }

        Ok(())
    }

    fn validate_relation(&self, schema: &EntitySchema, relation: &RelationDef) -> Result<(), SchemaError> {
        let target = self.get(&relation.target).ok_or_else(|| SchemaError::UnknownTarget {
            schema: schema.name.clone(),
            relation: relation.name.clone(),
            target: relation.target.clone(),
        })?;

        let unknown_column = |column: &str| SchemaError::UnknownJoinColumn {
            schema: schema.name.clone(),
            relation: relation.name.clone(),
            column: column.to_string(),
        };
        if !schema.has_column(&relation.local_column) {
            return Err(unknown_column(&relation.local_column));
        }
        if !target.has_column(&relation.remote_column) {
            return Err(unknown_column(&relation.remote_column));
        }

        if let Some(junction) = &relation.via {
            for name in [&junction.table, &junction.source_key, &junction.target_key] {
                if !is_identifier(name) {
                    return Err(SchemaError::InvalidIdentifier {
                        schema: schema.name.clone(),
                        name: name.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}
