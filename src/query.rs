//! Composed page queries.
//!
//! A [`PageQuery`] is backend independent. Execution issues three statements
//! built from it:
//!
//! 1. [`PageQuery::count_statement`]: number of matching root rows.
//! 2. [`PageQuery::ids_statement`]: keys of the root rows on the requested
//!    page. Grouping by the root key keeps to-many joins from multiplying rows,
//!    so `LIMIT`/`OFFSET` count entities, not join rows.
//! 3. [`PageQuery::rows_statement`]: every selected column of those roots and
//!    their joined relations, ready to be hydrated into nested objects.

use sea_orm::{
    Condition, Order, Value,
    sea_query::{Alias, Expr, Func, Query, SelectStatement, SimpleExpr},
};

use crate::filtering::{BoundParam, JoinClause, PaginationOptions, ROOT_ALIAS, SortTarget};
use crate::models::SortDirection;
use crate::schema::{FieldDef, FieldKind};

pub(crate) const TOTAL_LABEL: &str = "total";
pub(crate) const KEY_LABEL: &str = "pk";
const MATCHED_ALIAS: &str = "matched";

/// A selected column and the label it is read back under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub label: String,
    pub alias: String,
    pub column: String,
    pub property: String,
    pub kind: FieldKind,
}

/// Everything needed to run one paginate call.
#[derive(Clone, Debug)]
pub struct PageQuery {
    pub table: String,
    pub key: FieldDef,
    pub fields: Vec<FieldDef>,
    pub joins: Vec<JoinClause>,
    pub condition: Condition,
    /// Parameters bound inside `condition`, by name.
    pub params: Vec<BoundParam>,
    pub sort: SortTarget,
    pub options: PaginationOptions,
}

impl PageQuery {
    /// `FROM table AS entity`, all joins and the filter condition.
    fn base(&self) -> SelectStatement {
        let mut query = Query::select();
        query.from_as(Alias::new(&self.table), Alias::new(ROOT_ALIAS));
        for join in &self.joins {
            join.apply(&mut query);
        }
        query.cond_where(self.condition.clone());
        query
    }

    fn key_column(&self) -> (Alias, Alias) {
        (Alias::new(ROOT_ALIAS), Alias::new(&self.key.column))
    }

    /// `SELECT COUNT(*) AS total FROM (SELECT entity.key ... GROUP BY entity.key) AS matched`
    #[must_use]
    pub fn count_statement(&self) -> SelectStatement {
        let mut matched = self.base();
        matched.column(self.key_column()).group_by_col(self.key_column());

        let mut query = Query::select();
        query
            .expr_as(Expr::cust("COUNT(*)"), Alias::new(TOTAL_LABEL))
            .from_subquery(matched, Alias::new(MATCHED_ALIAS));
        query
    }

    /// Root keys of the requested page, in page order.
    ///
    /// Each root is ordered by the smallest (ascending) or largest
    /// (descending) value of the sort column among its rows, then by key.
    #[must_use]
    pub fn ids_statement(&self) -> SelectStatement {
        let sort_column = self.sort.column.expr();
        let sort_expr: SimpleExpr = match self.sort.direction {
            SortDirection::Asc => Func::min(sort_column).into(),
            SortDirection::Desc => Func::max(sort_column).into(),
        };

        let mut query = self.base();
        query
            .expr_as(Expr::col(self.key_column()), Alias::new(KEY_LABEL))
            .group_by_col(self.key_column())
            .order_by_expr(sort_expr, self.sort.direction.into())
            .order_by(self.key_column(), Order::Asc)
            .limit(self.options.limit())
            .offset(self.options.offset());
        query
    }

    /// Columns selected by [`PageQuery::rows_statement`], root fields first.
    #[must_use]
    pub fn selections(&self) -> Vec<Selection> {
        let root = self.fields.iter().map(|field| (ROOT_ALIAS, field));
        let joined = self
            .joins
            .iter()
            .flat_map(|join| join.fields.iter().map(move |field| (join.alias.as_str(), field)));

        root.chain(joined)
            .enumerate()
            .map(|(index, (alias, field))| Selection {
                label: format!("c{index}"),
                alias: alias.to_string(),
                column: field.column.clone(),
                property: field.property.clone(),
                kind: field.kind,
            })
            .collect()
    }

    /// All selected columns of the roots with the given keys.
    ///
    /// The filter condition still applies, so conditions on to-many relations
    /// also narrow the related rows that are returned.
    #[must_use]
    pub fn rows_statement(&self, ids: Vec<Value>) -> SelectStatement {
        let mut query = self.base();
        for selection in self.selections() {
            query.expr_as(
                Expr::col((Alias::new(&selection.alias), Alias::new(&selection.column))),
                Alias::new(&selection.label),
            );
        }
        query.and_where(Expr::col(self.key_column()).is_in(ids));
        query.order_by(self.key_column(), Order::Asc);
        for join in &self.joins {
            query.order_by((Alias::new(&join.alias), Alias::new(&join.key.column)), Order::Asc);
        }
        query
    }
}
