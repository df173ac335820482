//! # querycrate
//!
//! Schema-driven filtering, searching, joining and pagination for Axum and
//! Sea-ORM services.
//!
//! Entities are described once as [`EntitySchema`]s in a [`SchemaRegistry`].
//! A [`Repository`] then turns untyped list parameters ([`PaginateParams`])
//! into three parameterized statements and returns a [`Page`] of nested JSON
//! objects, with every ignored part of the request reported as a
//! [`QueryWarning`].

pub mod config;
pub mod errors;
pub mod executor;
pub mod filtering;
pub mod models;
pub mod query;
pub mod repository;
pub mod schema;

#[cfg(test)]
mod fixtures;

pub use config::PaginateConfig;
pub use errors::{QueryError, QueryWarning, WarningOrigin};
pub use executor::QueryExecutor;
pub use filtering::{FilterOperator, Page, PageLinks, PageMeta, PaginationOptions};
pub use models::{
    AdvancedSearch, FilterValue, GlobalSearch, Logic, PaginateParams, PaginateRequest, SearchFilter, SortDirection,
    SortSpec, TextSearch, WhereConditions, WhereValue,
};
pub use query::PageQuery;
pub use repository::{ComposedQuery, Repository};
pub use schema::{
    ActiveFlag, EntitySchema, FieldDef, FieldKind, Junction, RelationDef, RelationKind, SchemaError, SchemaRegistry,
};
pub use serde_with;
