//! Join planning.
//!
//! Every relation path referenced by a request (includes, search fields,
//! conditions, filters) is joined once, under its [`relation_alias`], chained
//! off the alias of its parent relation. The registry is the only place that
//! decides whether a join already exists, so asking for `department.manager`
//! after `department` only adds the `manager` join.

use std::collections::HashSet;

use sea_orm::{
    JoinType,
    sea_query::{Alias, Expr, SelectStatement},
};

use super::relations::{PathError, ROOT_ALIAS, RelationResolver, RelationStep, relation_alias};
use crate::schema::{FieldDef, Junction, RelationKind};

const JUNCTION_SUFFIX: &str = "$_via";

/// A planned LEFT JOIN and what is needed to read its columns back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinClause {
    pub path: String,
    /// Last segment of the path: the property the related data is nested under.
    pub property: String,
    pub alias: String,
    pub parent_alias: String,
    pub table: String,
    pub kind: RelationKind,
    pub local_column: String,
    pub remote_column: String,
    pub via: Option<Junction>,
    pub key: FieldDef,
    pub fields: Vec<FieldDef>,
}

impl JoinClause {
    fn from_step(step: &RelationStep<'_>) -> Self {
        let relation = step.relation;
        Self {
            path: step.path.clone(),
            property: relation.name.clone(),
            alias: relation_alias(&step.path),
            parent_alias: step
                .parent
                .as_deref()
                .map_or_else(|| ROOT_ALIAS.to_string(), relation_alias),
            table: step.target.table().to_string(),
            kind: relation.kind,
            local_column: relation.local_column.clone(),
            remote_column: relation.remote_column.clone(),
            via: relation.via.clone(),
            key: step.target.key().clone(),
            fields: step.target.fields().cloned().collect(),
        }
    }

    /// Alias of the junction table of a many-to-many join.
    #[must_use]
    pub fn junction_alias(&self) -> String {
        format!("{}{JUNCTION_SUFFIX}", self.alias)
    }

    /// Adds the join (and its junction join, if any) to `query`.
    pub fn apply(&self, query: &mut SelectStatement) {
        let parent = Alias::new(&self.parent_alias);
        let alias = Alias::new(&self.alias);

        match &self.via {
            None => {
                query.join_as(
                    JoinType::LeftJoin,
                    Alias::new(&self.table),
                    alias.clone(),
                    Expr::col((alias, Alias::new(&self.remote_column)))
                        .equals((parent, Alias::new(&self.local_column))),
                );
            }
            Some(junction) => {
                let via = Alias::new(self.junction_alias());
                query.join_as(
                    JoinType::LeftJoin,
                    Alias::new(&junction.table),
                    via.clone(),
                    Expr::col((via.clone(), Alias::new(&junction.source_key)))
                        .equals((parent, Alias::new(&self.local_column))),
                );
                query.join_as(
                    JoinType::LeftJoin,
                    Alias::new(&self.table),
                    alias.clone(),
                    Expr::col((alias, Alias::new(&self.remote_column)))
                        .equals((via, Alias::new(&junction.target_key))),
                );
            }
        }
    }
}

/// Relation paths joined so far for one query, in join order.
#[derive(Clone, Debug, Default)]
pub struct JoinRegistry {
    joins: Vec<JoinClause>,
    joined: HashSet<String>,
}

impl JoinRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.joined.contains(path)
    }

    #[must_use]
    pub fn alias_of(&self, path: &str) -> Option<&str> {
        self.joins
            .iter()
            .find(|join| join.path == path)
            .map(|join| join.alias.as_str())
    }

    #[must_use]
    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    #[must_use]
    pub fn into_joins(self) -> Vec<JoinClause> {
        self.joins
    }

    /// Joins every not yet joined relation along `path` and returns the alias
    /// of the last one.
    ///
    /// An invalid path joins nothing.
    ///
    /// # Errors
    ///
    /// The [`PathError`] of [`RelationResolver::walk`].
    pub fn ensure_joined(&mut self, resolver: &RelationResolver<'_>, path: &str) -> Result<String, PathError> {
        let steps = resolver.walk(path)?;
        for step in &steps {
            if self.joined.insert(step.path.clone()) {
                tracing::trace!(path = %step.path, "Joining relation");
                self.joins.push(JoinClause::from_step(step));
            }
        }
        Ok(relation_alias(path))
    }

    /// Applies every join to `query`, parents before children.
    pub fn apply(&self, query: &mut SelectStatement) {
        for join in &self.joins {
            join.apply(query);
        }
    }
}
