use sea_orm::{
    Condition,
    sea_query::{Alias, Expr, Func, SimpleExpr},
};

use super::conditions::{BoundParam, Clause, ClauseBuilder, GLOBAL_PARAM, TEXT_SEARCH_PARAM};
use super::relations::ResolvedColumn;

// Basic safety limits
const MAX_SEARCH_QUERY_LENGTH: usize = 10_000;

/// Escape LIKE wildcards so user input matches literally.
/// Escapes: `\` (the escape character itself), `%` (match any) and `_` (match single char)
#[must_use]
pub fn escape_like_wildcards(input: &str) -> String {
    input
        .replace('\\', "\\\\") // Escape backslash first
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Trims the term and caps its length. `None` for blank terms.
fn sanitize_term(term: &str) -> Option<&str> {
    let term = term.trim();
    if term.is_empty() {
        return None;
    }
    let end = term
        .char_indices()
        .map(|(index, c)| index + c.len_utf8())
        .take_while(|end| *end <= MAX_SEARCH_QUERY_LENGTH)
        .last()
        .unwrap_or(0);
    Some(&term[..end])
}

/// Legacy free-text search: all `columns` concatenated with spaces, matched
/// case-insensitively against `%term%` as a single bound parameter.
///
/// ```sql
/// UPPER(CONCAT_WS(' ', COALESCE(CAST(c1 AS TEXT), ''), ...)) LIKE UPPER(:textSearch_N) ESCAPE '\'
/// ```
pub fn concat_search_clause(builder: &mut ClauseBuilder, columns: &[ResolvedColumn], term: &str) -> Option<Clause> {
    let term = sanitize_term(term)?;
    if columns.is_empty() {
        return None;
    }

    // `args` replaces the argument list, so the separator goes in first
    let mut args: Vec<SimpleExpr> = Vec::with_capacity(columns.len() + 1);
    args.push(Expr::cust("' '"));
    args.extend(
        columns
            .iter()
            .map(|column| SimpleExpr::from(Func::coalesce([builder.text_expr(column), Expr::cust("''")]))),
    );
    let concatenated: SimpleExpr = Func::cust(Alias::new("CONCAT_WS")).args(args).into();

    let pattern = format!("%{}%", escape_like_wildcards(term));
    Some(builder.case_insensitive_like(TEXT_SEARCH_PARAM, concatenated, pattern))
}

/// Advanced global search: any of `columns` containing `term`
/// (case-insensitive), one bound parameter per column.
pub fn global_search_condition(
    builder: &mut ClauseBuilder,
    columns: &[ResolvedColumn],
    term: &str,
) -> Option<(Condition, Vec<BoundParam>)> {
    let term = sanitize_term(term)?;
    if columns.is_empty() {
        return None;
    }

    let pattern = format!("%{}%", escape_like_wildcards(term));
    let mut params = Vec::with_capacity(columns.len());
    let mut condition = Condition::any();
    for column in columns {
        let text = builder.text_expr(column);
        let clause = builder.case_insensitive_like(GLOBAL_PARAM, text, pattern.clone());
        params.extend(clause.params);
        condition = condition.add(clause.expr);
    }
    Some((condition, params))
}
