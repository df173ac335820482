//! Query execution and hydration.
//!
//! The engine only needs "run these statements, give me rows", which is what
//! [`QueryExecutor`] captures. Every sea-orm connection and transaction
//! implements it, and tests can substitute their own.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{ConnectionTrait, DatabaseBackend, DbErr, QueryResult, Value};
use serde_json::{Map, Value as JsonValue};
use uuid::Uuid;

use crate::filtering::{JoinClause, ROOT_ALIAS};
use crate::query::{KEY_LABEL, PageQuery, Selection, TOTAL_LABEL};
use crate::schema::{FieldKind, RelationKind};

/// Runs composed page queries.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Backend the statements are rendered for.
    fn backend(&self) -> DatabaseBackend;

    /// Returns the hydrated items of the requested page and the total number
    /// of matching entities.
    async fn execute_and_count(&self, query: &PageQuery) -> Result<(Vec<JsonValue>, u64), DbErr>;
}

#[async_trait]
impl<C> QueryExecutor for C
where
    C: ConnectionTrait + Send + Sync,
{
    fn backend(&self) -> DatabaseBackend {
        self.get_database_backend()
    }

    async fn execute_and_count(&self, query: &PageQuery) -> Result<(Vec<JsonValue>, u64), DbErr> {
        let backend = self.get_database_backend();

        let statement = backend.build(&query.count_statement());
        tracing::debug!(sql = %statement.sql, "Counting matches");
        let total: i64 = match self.query_one(statement).await? {
            Some(row) => row.try_get("", TOTAL_LABEL)?,
            None => 0,
        };
        let total = u64::try_from(total).unwrap_or(0);
        if total == 0 {
            return Ok((Vec::new(), 0));
        }

        let statement = backend.build(&query.ids_statement());
        tracing::debug!(sql = %statement.sql, "Selecting page keys");
        let ids = self
            .query_all(statement)
            .await?
            .iter()
            .map(|row| read_column(row, KEY_LABEL, query.key.kind).map(|(_, value)| value))
            .collect::<Result<Vec<_>, _>>()?;
        if ids.is_empty() {
            return Ok((Vec::new(), total));
        }

        let statement = backend.build(&query.rows_statement(ids.clone()));
        tracing::debug!(sql = %statement.sql, "Loading page rows");
        let rows = self.query_all(statement).await?;

        let items = hydrate(query, &ids, &rows)?;
        Ok((items, total))
    }
}

/// Reads one labelled column as JSON and as a bindable value.
fn read_column(row: &QueryResult, label: &str, kind: FieldKind) -> Result<(JsonValue, Value), DbErr> {
    let read = match kind {
        FieldKind::Text => {
            let value: Option<String> = row.try_get("", label)?;
            (value.clone().map_or(JsonValue::Null, JsonValue::String), value.into())
        }
        FieldKind::Int => {
            let value: Option<i32> = row.try_get("", label)?;
            (value.map_or(JsonValue::Null, JsonValue::from), value.into())
        }
        FieldKind::BigInt => {
            let value: Option<i64> = row.try_get("", label)?;
            (value.map_or(JsonValue::Null, JsonValue::from), value.into())
        }
        FieldKind::Double => {
            let value: Option<f64> = row.try_get("", label)?;
            (value.map_or(JsonValue::Null, JsonValue::from), value.into())
        }
        FieldKind::Bool => {
            let value: Option<bool> = row.try_get("", label)?;
            (value.map_or(JsonValue::Null, JsonValue::Bool), value.into())
        }
        FieldKind::Uuid => {
            let value: Option<Uuid> = row.try_get("", label)?;
            (value.map_or(JsonValue::Null, |id| JsonValue::String(id.to_string())), value.into())
        }
        FieldKind::DateTime => {
            let value: Option<DateTime<Utc>> = row.try_get("", label)?;
            (value.map_or(JsonValue::Null, |moment| JsonValue::String(moment.to_rfc3339())), value.into())
        }
    };
    Ok(read)
}

/// A root entity or a related entity being assembled from join rows.
#[derive(Debug)]
struct Node {
    fields: Map<String, JsonValue>,
    /// Child nodes per join index, in first-seen order.
    children: HashMap<usize, Vec<usize>>,
}

/// Parent of every join: `None` for the root, otherwise the join index.
fn join_parents(joins: &[JoinClause]) -> Vec<Option<usize>> {
    joins
        .iter()
        .map(|join| {
            if join.parent_alias == ROOT_ALIAS {
                None
            } else {
                joins.iter().position(|parent| parent.alias == join.parent_alias)
            }
        })
        .collect()
}

/// Folds flat join rows into one JSON object per root, in `ids` order.
///
/// To-one relations become an object (or `null` when nothing matched),
/// to-many relations an array without duplicates.
fn hydrate(query: &PageQuery, ids: &[Value], rows: &[QueryResult]) -> Result<Vec<JsonValue>, DbErr> {
    let selections = query.selections();
    let (root_selections, join_selections) = selections.split_at(query.fields.len());
    let mut per_join: Vec<&[Selection]> = Vec::with_capacity(query.joins.len());
    let mut rest = join_selections;
    for join in &query.joins {
        let (own, tail) = rest.split_at(join.fields.len());
        per_join.push(own);
        rest = tail;
    }
    let parents = join_parents(&query.joins);

    let mut nodes: Vec<Node> = Vec::new();
    let mut roots: HashMap<String, usize> = HashMap::new();
    let mut related: HashMap<(usize, usize, String), usize> = HashMap::new();

    for row in rows {
        let (root_fields, root_key) = read_fields(row, root_selections, &query.key.property)?;
        let root = *roots.entry(root_key).or_insert_with(|| {
            nodes.push(Node {
                fields: root_fields,
                children: HashMap::new(),
            });
            nodes.len() - 1
        });

        let mut row_nodes: Vec<Option<usize>> = Vec::with_capacity(query.joins.len());
        for (index, join) in query.joins.iter().enumerate() {
            let parent = match parents[index] {
                None => Some(root),
                Some(parent) => row_nodes[parent],
            };
            let Some(parent) = parent else {
                row_nodes.push(None);
                continue;
            };

            let (fields, key) = read_fields(row, per_join[index], &join.key.property)?;
            if fields.get(&join.key.property).is_none_or(JsonValue::is_null) {
                row_nodes.push(None);
                continue;
            }

            let child = match related.get(&(parent, index, key.clone())) {
                Some(child) => *child,
                None => {
                    nodes.push(Node {
                        fields,
                        children: HashMap::new(),
                    });
                    let child = nodes.len() - 1;
                    nodes[parent].children.entry(index).or_default().push(child);
                    related.insert((parent, index, key), child);
                    child
                }
            };
            row_nodes.push(Some(child));
        }
    }

    let mut items = Vec::with_capacity(ids.len());
    for id in ids {
        let key = value_key(id);
        if let Some(root) = roots.get(&key) {
            items.push(render(&nodes, *root, None, &query.joins, &parents));
        }
    }
    Ok(items)
}

/// Reads a group of selections into an object, returning it with the string
/// form of its key.
fn read_fields(
    row: &QueryResult,
    selections: &[Selection],
    key_property: &str,
) -> Result<(Map<String, JsonValue>, String), DbErr> {
    let mut fields = Map::with_capacity(selections.len());
    let mut key = String::new();
    for selection in selections {
        let (json, value) = read_column(row, &selection.label, selection.kind)?;
        if selection.property == key_property {
            key = value_key(&value);
        }
        fields.insert(selection.property.clone(), json);
    }
    Ok((fields, key))
}

fn value_key(value: &Value) -> String {
    format!("{value:?}")
}

fn render(nodes: &[Node], node: usize, scope: Option<usize>, joins: &[JoinClause], parents: &[Option<usize>]) -> JsonValue {
    let mut object = nodes[node].fields.clone();
    for (index, join) in joins.iter().enumerate() {
        if parents[index] != scope {
            continue;
        }
        let children = nodes[node].children.get(&index).map(Vec::as_slice).unwrap_or_default();
        let mut rendered = children
            .iter()
            .map(|child| render(nodes, *child, Some(index), joins, parents));
        let value = match join.kind {
            RelationKind::ToOne => rendered.next().unwrap_or(JsonValue::Null),
            RelationKind::ToMany => JsonValue::Array(rendered.collect()),
        };
        object.insert(join.property.clone(), value);
    }
    JsonValue::Object(object)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldDef;

    fn join(path: &str, parent_alias: &str, kind: RelationKind) -> JoinClause {
        JoinClause {
            path: path.to_string(),
            property: path.rsplit('.').next().unwrap_or(path).to_string(),
            alias: crate::filtering::relation_alias(path),
            parent_alias: parent_alias.to_string(),
            table: "t".to_string(),
            kind,
            local_column: "id".to_string(),
            remote_column: "id".to_string(),
            via: None,
            key: FieldDef::new("id", "id", FieldKind::Int),
            fields: vec![FieldDef::new("id", "id", FieldKind::Int)],
        }
    }

    #[test]
    fn test_join_parents() {
        let joins = vec![
            join("roles", ROOT_ALIAS, RelationKind::ToMany),
            join("department", ROOT_ALIAS, RelationKind::ToOne),
            join("roles.permissions", "entity$roles", RelationKind::ToMany),
        ];
        assert_eq!(join_parents(&joins), vec![None, None, Some(0)]);
    }

    #[test]
    fn test_render_nests_children_by_kind() {
        let joins = vec![
            join("roles", ROOT_ALIAS, RelationKind::ToMany),
            join("department", ROOT_ALIAS, RelationKind::ToOne),
        ];
        let parents = join_parents(&joins);
        let object = |id: i64| {
            let mut fields = Map::new();
            fields.insert("id".to_string(), JsonValue::from(id));
            fields
        };
        let nodes = vec![
            Node {
                fields: object(1),
                children: HashMap::from([(0, vec![1, 2])]),
            },
            Node {
                fields: object(10),
                children: HashMap::new(),
            },
            Node {
                fields: object(11),
                children: HashMap::new(),
            },
        ];

        let rendered = render(&nodes, 0, None, &joins, &parents);
        assert_eq!(
            rendered,
            serde_json::json!({"id": 1, "roles": [{"id": 10}, {"id": 11}], "department": null})
        );
    }

    #[test]
    fn test_value_key_distinguishes_values() {
        assert_eq!(value_key(&Value::from(1)), value_key(&Value::from(1)));
        assert_ne!(value_key(&Value::from(1)), value_key(&Value::from(2)));
    }
}
