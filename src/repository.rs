//! # Generic Repository
//!
//! [`Repository`] is the entry point of the engine: one per entity, built
//! from a [`SchemaRegistry`] and the name of its root schema, shareable across
//! requests.
//!
//! ```rust,ignore
//! let users = Repository::new(registry.clone(), "User")?;
//!
//! async fn list_users(
//!     State(state): State<AppState>,
//!     Query(params): Query<PaginateParams>,
//! ) -> Result<Page<serde_json::Value>, QueryError> {
//!     let request = params
//!         .into_request(&state.config)
//!         .search_fields(["firstName", "lastName", "email"])
//!         .with_links("/users");
//!     state.users.paginate(&state.db, &request).await
//! }
//! ```

use std::sync::Arc;

use sea_orm::{
    Condition, DatabaseBackend,
    sea_query::SimpleExpr,
};
use serde_json::Value as JsonValue;

use crate::errors::{QueryError, QueryWarning, WarningOrigin};
use crate::executor::QueryExecutor;
use crate::filtering::{
    BoundParam, Clause, ClauseBuilder, FilterOperator, JoinRegistry, Page, PaginationOptions, RelationResolver,
    ResolvedColumn, conditions::check_shape, resolve_sort,
    search::{concat_search_clause, global_search_condition},
};
use crate::models::{AdvancedSearch, Logic, PaginateRequest, TextSearch, WhereConditions};
use crate::query::PageQuery;
use crate::schema::{EntitySchema, SchemaError, SchemaRegistry};

/// A composed query and the warnings raised while composing it.
#[derive(Clone, Debug)]
pub struct ComposedQuery {
    pub query: PageQuery,
    pub warnings: Vec<QueryWarning>,
}

/// Paginated, filtered access to one entity.
#[derive(Clone, Debug)]
pub struct Repository {
    registry: Arc<SchemaRegistry>,
    root: EntitySchema,
}

impl Repository {
    /// # Errors
    ///
    /// [`SchemaError::UnknownSchema`] when `root` is not registered.
    pub fn new(registry: Arc<SchemaRegistry>, root: &str) -> Result<Self, SchemaError> {
        let root = registry
            .get(root)
            .cloned()
            .ok_or_else(|| SchemaError::UnknownSchema(root.to_string()))?;
        Ok(Self { registry, root })
    }

    #[must_use]
    pub fn schema(&self) -> &EntitySchema {
        &self.root
    }

    /// Composes the query for `request` without executing it.
    ///
    /// # Errors
    ///
    /// [`QueryError::UnsupportedOperator`] and [`QueryError::InvalidFilterValue`]
    /// for malformed filters. Unknown paths are not errors; they are dropped
    /// and reported in [`ComposedQuery::warnings`].
    pub fn build_query(&self, backend: DatabaseBackend, request: &PaginateRequest) -> Result<ComposedQuery, QueryError> {
        let mut ctx = QueryContext::new(RelationResolver::new(&self.registry, &self.root), backend);

        for path in &request.includes {
            ctx.include(path);
        }
        if let Some(search) = &request.text_search {
            ctx.text_search(search);
        }
        if let Some(conditions) = &request.where_conditions {
            ctx.legacy_where(conditions)?;
        }
        if let Some(search) = &request.advanced_search {
            ctx.advanced_search(search)?;
        }

        let (sort, warning) = resolve_sort(&ctx.resolver, &ctx.joins, &request.sort);
        if let Some(warning) = warning {
            ctx.warn(warning);
        }

        tracing::debug!(
            entity = %self.root.name(),
            joins = ctx.joins.joins().len(),
            params = ctx.params.len(),
            warnings = ctx.warnings.len(),
            "Composed page query"
        );

        let query = PageQuery {
            table: self.root.table().to_string(),
            key: self.root.key().clone(),
            fields: self.root.fields().cloned().collect(),
            joins: ctx.joins.into_joins(),
            condition: ctx.condition,
            params: ctx.params,
            sort,
            options: request.options,
        };
        Ok(ComposedQuery {
            query,
            warnings: ctx.warnings,
        })
    }

    /// Runs `request` and returns one page of entities as JSON objects, with
    /// included relations nested under their property names.
    ///
    /// # Errors
    ///
    /// Filter errors from [`Repository::build_query`], and
    /// [`QueryError::Storage`] for database failures (never retried).
    pub async fn paginate<E>(&self, executor: &E, request: &PaginateRequest) -> Result<Page<JsonValue>, QueryError>
    where
        E: QueryExecutor + ?Sized,
    {
        let ComposedQuery { query, warnings } = self.build_query(executor.backend(), request)?;
        let (items, total) = executor.execute_and_count(&query).await?;

        let mut page = Page::new(items, total, request.options).with_warnings(warnings);
        if let Some(route) = &request.links_route {
            page = page.with_links(route);
        }
        Ok(page)
    }

    /// First entity matching `conditions` that is also active according to
    /// the schema's active flag (when it declares one).
    ///
    /// Unlike listing, a lookup does not drop unknown condition paths: the
    /// remaining conditions could match an unrelated entity.
    ///
    /// # Errors
    ///
    /// [`QueryError::UnknownLookupField`] when a condition path does not
    /// resolve, otherwise as [`Repository::paginate`].
    pub async fn find_one_active<E>(
        &self,
        executor: &E,
        conditions: Option<WhereConditions>,
        includes: &[String],
    ) -> Result<Option<JsonValue>, QueryError>
    where
        E: QueryExecutor + ?Sized,
    {
        let mut conditions = conditions.unwrap_or_default();
        if let Some(flag) = self.root.active_flag() {
            conditions.and(flag.field.clone(), flag.value.clone());
        }

        let request = PaginateRequest {
            options: PaginationOptions::new(1, 1),
            where_conditions: Some(conditions),
            includes: includes.to_vec(),
            ..PaginateRequest::default()
        };
        let ComposedQuery { query, warnings } = self.build_query(executor.backend(), &request)?;
        for warning in &warnings {
            if let QueryWarning::InvalidRelationPath {
                path,
                origin: WarningOrigin::Where,
                ..
            }
            | QueryWarning::UnknownField {
                path,
                origin: WarningOrigin::Where,
            } = warning
            {
                return Err(QueryError::UnknownLookupField(path.clone()));
            }
        }

        let (items, _) = executor.execute_and_count(&query).await?;
        Ok(items.into_iter().next())
    }
}

/// Per-call state: joins, parameter names, warnings and the condition tree.
struct QueryContext<'a> {
    resolver: RelationResolver<'a>,
    joins: JoinRegistry,
    clauses: ClauseBuilder,
    params: Vec<BoundParam>,
    warnings: Vec<QueryWarning>,
    condition: Condition,
}

impl<'a> QueryContext<'a> {
    fn new(resolver: RelationResolver<'a>, backend: DatabaseBackend) -> Self {
        Self {
            resolver,
            joins: JoinRegistry::new(),
            clauses: ClauseBuilder::new(backend),
            params: Vec::new(),
            warnings: Vec::new(),
            condition: Condition::all(),
        }
    }

    fn warn(&mut self, warning: QueryWarning) {
        warning.log();
        self.warnings.push(warning);
    }

    /// Records the clause parameters and hands back its expression.
    fn bind(&mut self, clause: Clause) -> SimpleExpr {
        self.params.extend(clause.params);
        clause.expr
    }

    fn include(&mut self, path: &str) {
        let path = path.trim();
        if path.is_empty() {
            return;
        }
        if let Err(err) = self.joins.ensure_joined(&self.resolver, path) {
            self.warn(err.into_warning(WarningOrigin::Include));
        }
    }

    /// Resolves the field, then joins its relation. Nothing is joined for
    /// paths that do not resolve.
    fn resolve(&mut self, path: &str, origin: WarningOrigin) -> Option<ResolvedColumn> {
        let joined = self.resolver.resolve_field_path(path.trim()).and_then(|column| {
            if let Some(relation) = &column.relation {
                self.joins.ensure_joined(&self.resolver, relation)?;
            }
            Ok(column)
        });
        match joined {
            Ok(column) => Some(column),
            Err(err) => {
                self.warn(err.into_warning(origin));
                None
            }
        }
    }

    fn resolve_all(&mut self, paths: &[String], origin: WarningOrigin) -> Vec<ResolvedColumn> {
        paths
            .iter()
            .filter(|path| !path.trim().is_empty())
            .filter_map(|path| self.resolve(path, origin))
            .collect()
    }

    fn text_search(&mut self, search: &TextSearch) {
        if search.term.trim().is_empty() || search.fields.is_empty() {
            return;
        }
        let columns = self.resolve_all(&search.fields, WarningOrigin::TextSearch);
        if let Some(clause) = concat_search_clause(&mut self.clauses, &columns, &search.term) {
            let expr = self.bind(clause);
            self.condition = std::mem::replace(&mut self.condition, Condition::all()).add(expr);
        }
    }

    fn legacy_where(&mut self, conditions: &WhereConditions) -> Result<(), QueryError> {
        let mut any = Condition::any();
        for group in conditions.groups() {
            let mut all = Condition::all();
            for (path, value) in group {
                let Some(column) = self.resolve(&path, WarningOrigin::Where) else {
                    continue;
                };
                let clause = self.clauses.equals(&column, &value)?;
                all = all.add(self.bind(clause));
            }
            // a group whose every path was dropped must not match everything
            if !all.is_empty() {
                any = any.add(all);
            }
        }
        if !any.is_empty() {
            self.and(any);
        }
        Ok(())
    }

    fn advanced_search(&mut self, search: &AdvancedSearch) -> Result<(), QueryError> {
        if let Some(global) = &search.global_search {
            let columns = self.resolve_all(&global.fields, WarningOrigin::GlobalSearch);
            if let Some((condition, params)) = global_search_condition(&mut self.clauses, &columns, &global.term) {
                self.params.extend(params);
                self.and(condition);
            }
        }

        // AND binds tighter than OR: collect runs of AND-ed filters, OR the runs.
        let mut groups: Vec<Condition> = Vec::new();
        let mut current = Condition::all();
        for filter in &search.filters {
            let operator: FilterOperator = filter.operator.parse()?;
            check_shape(&filter.field, operator, &filter.value)?;
            let Some(column) = self.resolve(&filter.field, WarningOrigin::Filter) else {
                continue;
            };
            let clause = self.clauses.build(&column, operator, &filter.value)?;
            let expr = self.bind(clause);

            let logic = filter.logic.unwrap_or(search.group_logic);
            if logic == Logic::Or && !current.is_empty() {
                groups.push(std::mem::replace(&mut current, Condition::all()));
            }
            current = current.add(expr);
        }
        if !current.is_empty() {
            groups.push(current);
        }

        if !groups.is_empty() {
            let combined = groups.into_iter().fold(Condition::any(), Condition::add);
            self.and(combined);
        }
        Ok(())
    }

    fn and(&mut self, condition: Condition) {
        self.condition = std::mem::replace(&mut self.condition, Condition::all()).add(condition);
    }
}
