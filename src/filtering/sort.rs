use super::joins::JoinRegistry;
use super::relations::{RelationResolver, ResolvedColumn, split_field_path};
use crate::errors::QueryWarning;
use crate::models::{SortDirection, SortSpec};

/// Resolved ordering of a query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortTarget {
    pub column: ResolvedColumn,
    pub direction: SortDirection,
}

/// Resolves the requested sort column.
///
/// A relation path is only usable when its relation is already joined by the
/// rest of the request; sorting never adds a join. Otherwise the whole string
/// is looked up as a root field. When both fail the schema's default sort
/// field is used and a [`QueryWarning::SortFallback`] is returned.
#[must_use]
pub fn resolve_sort(
    resolver: &RelationResolver<'_>,
    joins: &JoinRegistry,
    spec: &SortSpec,
) -> (SortTarget, Option<QueryWarning>) {
    let default_column = || ResolvedColumn::root(resolver.root().default_sort_field());
    let target = |column| SortTarget {
        column,
        direction: spec.direction,
    };

    let Some(requested) = spec.column.as_deref().map(str::trim).filter(|column| !column.is_empty()) else {
        return (target(default_column()), None);
    };

    let joined = match split_field_path(requested) {
        (Some(relation), _) if joins.contains(relation) => resolver.resolve_field_path(requested).ok(),
        _ => None,
    };
    let resolved = joined.or_else(|| resolver.root().find_field(requested).map(ResolvedColumn::root));

    match resolved {
        Some(column) => (target(column), None),
        None => {
            let fallback = default_column();
            let warning = QueryWarning::SortFallback {
                requested: requested.to_string(),
                applied: fallback.path.clone(),
            };
            (target(fallback), Some(warning))
        }
    }
}
