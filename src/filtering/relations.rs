//! Relation path resolution.
//!
//! Clients reference related data with dot-notation: `department.name`,
//! `roles.permissions.value`. Every segment but the last must be a relation
//! declared on the schema reached so far; the last must be a declared field.
//! Anything else is rejected here, so only schema identifiers and the aliases
//! produced by [`relation_alias`] ever reach generated SQL.

use sea_orm::sea_query::{Alias, Expr, SimpleExpr};

use crate::errors::{QueryWarning, WarningOrigin};
use crate::schema::{EntitySchema, FieldDef, RelationDef, SchemaRegistry};

/// Alias of the root entity in every generated statement.
pub const ROOT_ALIAS: &str = "entity";

/// Joins relation segments inside an alias. Never valid in an identifier.
pub const ALIAS_SEPARATOR: char = '$';

/// Alias of the join for relation `path`.
///
/// `department` becomes `entity$department` and `department.manager` becomes
/// `entity$department$manager`. Relation names are identifiers, so the
/// mapping is injective and never yields [`ROOT_ALIAS`].
#[must_use]
pub fn relation_alias(path: &str) -> String {
    let mut alias = String::with_capacity(ROOT_ALIAS.len() + path.len() + 1);
    alias.push_str(ROOT_ALIAS);
    for segment in path.split('.') {
        alias.push(ALIAS_SEPARATOR);
        alias.push_str(segment);
    }
    alias
}

/// Splits `department.manager.name` into `(Some("department.manager"), "name")`.
#[must_use]
pub fn split_field_path(path: &str) -> (Option<&str>, &str) {
    match path.rsplit_once('.') {
        Some((relation, field)) => (Some(relation), field),
        None => (None, path),
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathError {
    /// `segment` is not a relation of the schema reached before it.
    InvalidRelation { path: String, segment: String },
    /// The relation part resolved, the field did not.
    UnknownField { path: String },
}

impl PathError {
    #[must_use]
    pub fn into_warning(self, origin: WarningOrigin) -> QueryWarning {
        match self {
            Self::InvalidRelation { path, segment } => QueryWarning::InvalidRelationPath { path, segment, origin },
            Self::UnknownField { path } => QueryWarning::UnknownField { path, origin },
        }
    }
}

/// One relation traversed by a path.
#[derive(Clone, Debug)]
pub struct RelationStep<'a> {
    /// Dotted path up to and including this relation.
    pub path: String,
    /// Path of the owning relation, `None` for relations of the root.
    pub parent: Option<String>,
    pub relation: &'a RelationDef,
    pub target: &'a EntitySchema,
}

/// A field path resolved to a qualified column.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedColumn {
    pub path: String,
    /// Relation part of the path, `None` for root fields.
    pub relation: Option<String>,
    pub alias: String,
    pub field: FieldDef,
}

impl ResolvedColumn {
    /// A field of the root entity.
    #[must_use]
    pub fn root(field: &FieldDef) -> Self {
        Self {
            path: field.property.clone(),
            relation: None,
            alias: ROOT_ALIAS.to_string(),
            field: field.clone(),
        }
    }

    /// `alias.column` as a sea-query expression.
    #[must_use]
    pub fn expr(&self) -> SimpleExpr {
        Expr::col((Alias::new(&self.alias), Alias::new(&self.field.column))).into()
    }
}

/// Resolves paths starting at `root`.
#[derive(Clone, Copy, Debug)]
pub struct RelationResolver<'a> {
    registry: &'a SchemaRegistry,
    root: &'a EntitySchema,
}

impl<'a> RelationResolver<'a> {
    #[must_use]
    pub const fn new(registry: &'a SchemaRegistry, root: &'a EntitySchema) -> Self {
        Self { registry, root }
    }

    #[must_use]
    pub const fn root(&self) -> &'a EntitySchema {
        self.root
    }

    /// Walks every segment of a relation path.
    ///
    /// # Errors
    ///
    /// [`PathError::InvalidRelation`] naming the first segment that is not a
    /// declared relation. An empty path (or empty segment) is invalid.
    pub fn walk(&self, path: &str) -> Result<Vec<RelationStep<'a>>, PathError> {
        let mut schema = self.root;
        let mut steps: Vec<RelationStep<'a>> = Vec::new();

        for segment in path.split('.') {
            let invalid = || PathError::InvalidRelation {
                path: path.to_string(),
                segment: segment.to_string(),
            };
            let relation = schema.find_relation(segment).ok_or_else(invalid)?;
            let target = self.registry.get(&relation.target).ok_or_else(invalid)?;

            let parent = steps.last().map(|step| step.path.clone());
            let step_path = parent
                .as_deref()
                .map_or_else(|| segment.to_string(), |parent| format!("{parent}.{segment}"));
            steps.push(RelationStep {
                path: step_path,
                parent,
                relation,
                target,
            });
            schema = target;
        }

        Ok(steps)
    }

    #[must_use]
    pub fn is_valid_relation(&self, path: &str) -> bool {
        self.walk(path).is_ok()
    }

    /// Schema reached at the end of a relation path.
    ///
    /// # Errors
    ///
    /// See [`RelationResolver::walk`].
    pub fn target_schema(&self, path: &str) -> Result<&'a EntitySchema, PathError> {
        let steps = self.walk(path)?;
        Ok(steps.last().map_or(self.root, |step| step.target))
    }

    /// Resolves `field` or `relation.path.field` to a qualified column.
    ///
    /// # Errors
    ///
    /// [`PathError::InvalidRelation`] for a bad relation prefix,
    /// [`PathError::UnknownField`] when the last segment is not a field of the
    /// schema it ends on.
    pub fn resolve_field_path(&self, path: &str) -> Result<ResolvedColumn, PathError> {
        let (relation, name) = split_field_path(path);
        let schema = match relation {
            Some(relation) => self.target_schema(relation)?,
            None => self.root,
        };
        let field = schema.find_field(name).ok_or_else(|| PathError::UnknownField {
            path: path.to_string(),
        })?;

        Ok(ResolvedColumn {
            path: path.to_string(),
            relation: relation.map(str::to_string),
            alias: relation.map_or_else(|| ROOT_ALIAS.to_string(), relation_alias),
            field: field.clone(),
        })
    }
}
