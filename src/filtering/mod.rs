//! # Dynamic Filtering, Joining & Pagination
//!
//! Translates untyped request parameters into parameterized sea-query
//! statements, driven entirely by [`EntitySchema`](crate::schema::EntitySchema)
//! metadata.
//!
//! ## Main Components
//!
//! - **[`relations`]**: validates dotted relation paths and derives join aliases
//! - **[`joins`]**: joins each relation path at most once per query
//! - **[`conditions`]**: field + operator + value to a bound predicate
//! - **[`search`]**: legacy concatenated text search and advanced global search
//! - **[`sort`]**: sort column resolution with fallback
//! - **[`pagination`]**: page coercion, page metadata, links and `Content-Range`
//!
//! ## Query Parameter Examples
//!
//! ```rust,ignore
//! // Legacy text search over several columns, including a related one
//! GET /users?textSearch=jane&searchFields=firstName,lastName,department.name
//!
//! // Legacy equality conditions; an array ORs its objects
//! GET /users?where=[{"firstName":"Jane"},{"department":{"name":"Sales"}}]
//!
//! // Structured filters
//! GET /users?filters=[{"field":"id","operator":"between","value":[10,20]},
//!                     {"field":"email","operator":"endsWith","value":"@example.com","logic":"OR"}]
//!
//! // Sorting by a joined relation
//! GET /users?includes=department&sortColumn=department.name&sortDirection=ascend
//! ```
//!
//! ## Security
//!
//! Field and relation names are never interpolated. Paths are resolved
//! against the schema; unknown ones are dropped with a warning. Values are
//! always bound parameters, and LIKE wildcards in user input are escaped.

pub mod conditions;
pub mod joins;
pub mod pagination;
pub mod relations;
pub mod search;
pub mod sort;

pub use conditions::{BoundParam, Clause, ClauseBuilder, FilterOperator, ParamCounter};
pub use joins::{JoinClause, JoinRegistry};
pub use pagination::{Page, PageLinks, PageMeta, PaginationOptions, calculate_content_range};
pub use relations::{PathError, ROOT_ALIAS, RelationResolver, ResolvedColumn, relation_alias};
pub use search::escape_like_wildcards;
pub use sort::{SortTarget, resolve_sort};
