use std::{fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    DatabaseBackend, Value,
    sea_query::{Alias, BinOper, Expr, Func, LikeExpr, Query, SimpleExpr},
};
use uuid::Uuid;

use super::relations::ResolvedColumn;
use super::search::escape_like_wildcards;
use crate::errors::QueryError;
use crate::models::FilterValue;
use crate::schema::FieldKind;

// Basic safety limits
const MAX_FIELD_VALUE_LENGTH: usize = 10_000;

pub const FILTER_PARAM: &str = "filter";
pub const GLOBAL_PARAM: &str = "global";
pub const LEGACY_PARAM: &str = "legacy";
pub const TEXT_SEARCH_PARAM: &str = "textSearch";

/// Comparison operators of structured filters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// Substring match, case as the database compares it
    Like,
    /// Case-insensitive substring match
    ILike,
    /// Case-insensitive prefix match
    StartsWith,
    /// Case-insensitive suffix match
    EndsWith,
    In,
    NotIn,
    /// Inclusive range, value must be a two-element list
    Between,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    pub const ALL: [Self; 15] = [
        Self::Eq,
        Self::Ne,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Like,
        Self::ILike,
        Self::StartsWith,
        Self::EndsWith,
        Self::In,
        Self::NotIn,
        Self::Between,
        Self::IsNull,
        Self::IsNotNull,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Like => "like",
            Self::ILike => "ilike",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
            Self::In => "in",
            Self::NotIn => "notin",
            Self::Between => "between",
            Self::IsNull => "isNull",
            Self::IsNotNull => "isNotNull",
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterOperator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|operator| operator.as_str() == s)
            .ok_or_else(|| QueryError::UnsupportedOperator(s.to_string()))
    }
}

/// A named, bound query parameter.
#[derive(Clone, Debug, PartialEq)]
pub struct BoundParam {
    pub name: String,
    pub value: Value,
}

impl BoundParam {
    fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// A predicate fragment and the parameters bound into it.
#[derive(Clone, Debug, PartialEq)]
pub struct Clause {
    pub expr: SimpleExpr,
    pub params: Vec<BoundParam>,
}

impl Clause {
    fn new(expr: SimpleExpr, params: Vec<BoundParam>) -> Self {
        Self { expr, params }
    }

    /// Renders the fragment for `backend`, with its placeholders and values.
    #[must_use]
    pub fn to_sql(&self, backend: DatabaseBackend) -> (String, Vec<Value>) {
        let mut query = Query::select();
        query.expr(Expr::cust("1")).and_where(self.expr.clone());
        let statement = backend.build(&query);
        let sql = statement
            .sql
            .split_once(" WHERE ")
            .map_or_else(|| statement.sql.clone(), |(_, predicate)| predicate.to_string());
        (sql, statement.values.map(|values| values.0).unwrap_or_default())
    }
}

/// Issues parameter names that are unique within one query.
#[derive(Clone, Debug, Default)]
pub struct ParamCounter {
    issued: u32,
}

impl ParamCounter {
    pub fn next(&mut self, prefix: &str) -> String {
        self.issued += 1;
        format!("{prefix}_{}", self.issued)
    }
}

/// Builds parameterized predicate fragments against resolved columns.
#[derive(Clone, Debug)]
pub struct ClauseBuilder {
    backend: DatabaseBackend,
    params: ParamCounter,
}

impl ClauseBuilder {
    #[must_use]
    pub fn new(backend: DatabaseBackend) -> Self {
        Self {
            backend,
            params: ParamCounter::default(),
        }
    }

    #[must_use]
    pub const fn backend(&self) -> DatabaseBackend {
        self.backend
    }

    /// Builds `column <operator> value`.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidFilterValue`] when the value does not fit the
    /// operator (a list for a comparison, a `between` without exactly two
    /// bounds) or cannot be coerced to the column kind.
    pub fn build(
        &mut self,
        column: &ResolvedColumn,
        operator: FilterOperator,
        value: &FilterValue,
    ) -> Result<Clause, QueryError> {
        check_shape(&column.path, operator, value)?;
        let col = Expr::expr(column.expr());
        let clause = match operator {
            FilterOperator::Eq
            | FilterOperator::Ne
            | FilterOperator::Gt
            | FilterOperator::Gte
            | FilterOperator::Lt
            | FilterOperator::Lte => {
                let value = coerce(column, value)?;
                let name = self.params.next(FILTER_PARAM);
                let expr = match operator {
                    FilterOperator::Ne => col.ne(value.clone()),
                    FilterOperator::Gt => col.gt(value.clone()),
                    FilterOperator::Gte => col.gte(value.clone()),
                    FilterOperator::Lt => col.lt(value.clone()),
                    FilterOperator::Lte => col.lte(value.clone()),
                    _ => col.eq(value.clone()),
                };
                Clause::new(expr, vec![BoundParam::new(name, value)])
            }
            FilterOperator::Like => {
                let pattern = format!("%{}%", escape_like_wildcards(&pattern_text(column, value)?));
                let name = self.params.next(FILTER_PARAM);
                let expr = Expr::expr(self.text_expr(column)).like(LikeExpr::new(pattern.clone()).escape('\\'));
                Clause::new(expr, vec![BoundParam::new(name, pattern.into())])
            }
            FilterOperator::ILike | FilterOperator::StartsWith | FilterOperator::EndsWith => {
                let term = escape_like_wildcards(&pattern_text(column, value)?);
                let pattern = match operator {
                    FilterOperator::StartsWith => format!("{term}%"),
                    FilterOperator::EndsWith => format!("%{term}"),
                    _ => format!("%{term}%"),
                };
                self.case_insensitive_like(FILTER_PARAM, self.text_expr(column), pattern)
            }
            FilterOperator::In | FilterOperator::NotIn => {
                let values = coerce_list(column, value)?;
                let name = self.params.next(FILTER_PARAM);
                let expr = if operator == FilterOperator::In {
                    col.is_in(values.clone())
                } else {
                    col.is_not_in(values.clone())
                };
                Clause::new(expr, indexed_params(&name, values))
            }
            FilterOperator::Between => {
                let (start, end) = match value {
                    FilterValue::List(bounds) if bounds.len() == 2 => (coerce(column, &bounds[0])?, coerce(column, &bounds[1])?),
                    other => {
                        return Err(QueryError::invalid_value(
                            &column.path,
                            format!("between requires a list of exactly two values, got {}", describe_shape(other)),
                        ));
                    }
                };
                let name = self.params.next(FILTER_PARAM);
                Clause::new(
                    col.between(start.clone(), end.clone()),
                    vec![
                        BoundParam::new(format!("{name}Start"), start),
                        BoundParam::new(format!("{name}End"), end),
                    ],
                )
            }
            FilterOperator::IsNull => Clause::new(col.is_null(), Vec::new()),
            FilterOperator::IsNotNull => Clause::new(col.is_not_null(), Vec::new()),
        };
        Ok(clause)
    }

    /// Legacy condition: `null` is `IS NULL`, a list is `IN`, anything else `=`.
    ///
    /// # Errors
    ///
    /// [`QueryError::InvalidFilterValue`] for values the column kind rejects.
    pub fn equals(&mut self, column: &ResolvedColumn, value: &FilterValue) -> Result<Clause, QueryError> {
        let col = Expr::expr(column.expr());
        match value {
            FilterValue::Null => Ok(Clause::new(col.is_null(), Vec::new())),
            FilterValue::List(_) => {
                let values = coerce_list(column, value)?;
                let name = self.params.next(LEGACY_PARAM);
                Ok(Clause::new(col.is_in(values.clone()), indexed_params(&name, values)))
            }
            scalar => {
                let value = coerce(column, scalar)?;
                let name = self.params.next(LEGACY_PARAM);
                Ok(Clause::new(col.eq(value.clone()), vec![BoundParam::new(name, value)]))
            }
        }
    }

    /// `UPPER(expr) LIKE UPPER(pattern)`. Both sides fold in the database so
    /// they agree on which characters have a case. Callers escape user input;
    /// `pattern` keeps its wildcards.
    pub fn case_insensitive_like(&mut self, prefix: &str, expr: SimpleExpr, pattern: String) -> Clause {
        let name = self.params.next(prefix);
        let escaped = SimpleExpr::Binary(
            Box::new(Func::upper(Expr::val(pattern.clone())).into()),
            BinOper::Escape,
            Box::new(SimpleExpr::Constant('\\'.into())),
        );
        let expr = Expr::expr(Func::upper(expr)).binary(BinOper::Like, escaped);
        Clause::new(expr, vec![BoundParam::new(name, pattern.into())])
    }

    /// The column as text: cast unless it already is.
    #[must_use]
    pub fn text_expr(&self, column: &ResolvedColumn) -> SimpleExpr {
        if column.field.kind.is_text() {
            column.expr()
        } else {
            let target = match self.backend {
                DatabaseBackend::MySql => "CHAR",
                _ => "TEXT",
            };
            Expr::expr(column.expr()).cast_as(Alias::new(target))
        }
    }
}

/// Checks that `value` has the shape `operator` needs. Runs before the field
/// is resolved, so a malformed filter fails even on an unknown field.
///
/// # Errors
///
/// [`QueryError::InvalidFilterValue`] naming `field`.
pub fn check_shape(field: &str, operator: FilterOperator, value: &FilterValue) -> Result<(), QueryError> {
    let problem = match (operator, value) {
        (FilterOperator::IsNull | FilterOperator::IsNotNull, _) => None,
        (FilterOperator::Between, FilterValue::List(bounds)) if bounds.len() == 2 => None,
        (FilterOperator::Between, other) => Some(format!(
            "between requires a list of exactly two values, got {}",
            describe_shape(other)
        )),
        (FilterOperator::In | FilterOperator::NotIn, FilterValue::Null) => {
            Some("expected a list of values, got null".to_string())
        }
        (FilterOperator::In | FilterOperator::NotIn, _) => None,
        (_, FilterValue::Null | FilterValue::List(_)) => {
            Some(format!("{operator} needs a single value, got {}", value.describe()))
        }
        _ => None,
    };
    problem.map_or(Ok(()), |reason| Err(QueryError::invalid_value(field, reason)))
}

fn indexed_params(name: &str, values: Vec<Value>) -> Vec<BoundParam> {
    values
        .into_iter()
        .enumerate()
        .map(|(index, value)| BoundParam::new(format!("{name}_{index}"), value))
        .collect()
}

fn describe_shape(value: &FilterValue) -> String {
    match value {
        FilterValue::List(items) => format!("a list of {}", items.len()),
        other => other.describe().to_string(),
    }
}

fn pattern_text(column: &ResolvedColumn, value: &FilterValue) -> Result<String, QueryError> {
    let text = match value {
        FilterValue::Text(text) => text.clone(),
        FilterValue::Int(number) => number.to_string(),
        FilterValue::Float(number) => number.to_string(),
        FilterValue::Bool(flag) => flag.to_string(),
        FilterValue::DateTime(moment) => moment.to_rfc3339(),
        FilterValue::Null | FilterValue::List(_) => {
            return Err(QueryError::invalid_value(
                &column.path,
                format!("pattern operators need a single value, got {}", value.describe()),
            ));
        }
    };
    check_length(column, text)
}

fn check_length(column: &ResolvedColumn, text: String) -> Result<String, QueryError> {
    if text.len() > MAX_FIELD_VALUE_LENGTH {
        return Err(QueryError::invalid_value(&column.path, "value is too long"));
    }
    Ok(text)
}

/// `in`/`notin` operands: a list, or a scalar taken as a one-element list.
fn coerce_list(column: &ResolvedColumn, value: &FilterValue) -> Result<Vec<Value>, QueryError> {
    match value {
        FilterValue::List(items) => items.iter().map(|item| coerce(column, item)).collect(),
        FilterValue::Null => Err(QueryError::invalid_value(&column.path, "expected a list of values, got null")),
        scalar => Ok(vec![coerce(column, scalar)?]),
    }
}

/// Converts an untyped scalar to a value of the column's kind.
pub(crate) fn coerce(column: &ResolvedColumn, value: &FilterValue) -> Result<Value, QueryError> {
    coerce_scalar(column.field.kind, value)
        .and_then(|value| match value {
            Value::String(Some(ref text)) if text.len() > MAX_FIELD_VALUE_LENGTH => Err("value is too long".to_string()),
            value => Ok(value),
        })
        .map_err(|reason| QueryError::invalid_value(&column.path, reason))
}

fn mismatch(kind: FieldKind, value: &FilterValue) -> String {
    format!("cannot use {} as {kind:?}", value.describe())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
pub(crate) fn coerce_scalar(kind: FieldKind, value: &FilterValue) -> Result<Value, String> {
    if matches!(value, FilterValue::Null | FilterValue::List(_)) {
        return Err(format!("expected a single value, got {}", value.describe()));
    }

    match (kind, value) {
        (FieldKind::Text, FilterValue::Text(text)) => Ok(text.clone().into()),
        (FieldKind::Text, FilterValue::Int(number)) => Ok(number.to_string().into()),
        (FieldKind::Text, FilterValue::Float(number)) => Ok(number.to_string().into()),
        (FieldKind::Text, FilterValue::Bool(flag)) => Ok(flag.to_string().into()),
        (FieldKind::Text, FilterValue::DateTime(moment)) => Ok(moment.to_rfc3339().into()),

        (FieldKind::Int | FieldKind::BigInt, _) => {
            let number = match value {
                FilterValue::Int(number) => *number,
                FilterValue::Bool(flag) => i64::from(*flag),
                FilterValue::Float(number) if number.fract() == 0.0 && number.abs() < 9.0e15 => *number as i64,
                FilterValue::Text(text) => text.trim().parse::<i64>().map_err(|_| mismatch(kind, value))?,
                _ => return Err(mismatch(kind, value)),
            };
            if kind == FieldKind::Int {
                i32::try_from(number)
                    .map(Value::from)
                    .map_err(|_| format!("{number} is out of range for Int"))
            } else {
                Ok(number.into())
            }
        }

        (FieldKind::Double, FilterValue::Float(number)) => Ok((*number).into()),
        (FieldKind::Double, FilterValue::Int(number)) => Ok((*number as f64).into()),
        (FieldKind::Double, FilterValue::Text(text)) => text
            .trim()
            .parse::<f64>()
            .map(Value::from)
            .map_err(|_| mismatch(kind, value)),

        (FieldKind::Bool, FilterValue::Bool(flag)) => Ok((*flag).into()),
        (FieldKind::Bool, FilterValue::Int(0)) => Ok(false.into()),
        (FieldKind::Bool, FilterValue::Int(1)) => Ok(true.into()),
        (FieldKind::Bool, FilterValue::Text(text)) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true.into()),
            "false" | "0" => Ok(false.into()),
            _ => Err(mismatch(kind, value)),
        },

        (FieldKind::Uuid, FilterValue::Text(text)) => Uuid::parse_str(text.trim())
            .map(Value::from)
            .map_err(|_| mismatch(kind, value)),

        (FieldKind::DateTime, FilterValue::DateTime(moment)) => Ok((*moment).into()),
        (FieldKind::DateTime, FilterValue::Text(text)) => parse_datetime(text.trim())
            .map(Value::from)
            .ok_or_else(|| mismatch(kind, value)),

        _ => Err(mismatch(kind, value)),
    }
}

/// RFC 3339 timestamps, or plain dates taken as midnight UTC.
fn parse_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(moment) = DateTime::parse_from_rfc3339(text) {
        return Some(moment.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|moment| moment.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filtering::relations::{ROOT_ALIAS, relation_alias, split_field_path};
    use crate::schema::FieldDef;

    fn column(path: &str, column: &str, kind: FieldKind) -> ResolvedColumn {
        let (relation, property) = split_field_path(path);
        ResolvedColumn {
            path: path.to_string(),
            relation: relation.map(str::to_string),
            alias: relation.map_or_else(|| ROOT_ALIAS.to_string(), relation_alias),
            field: FieldDef::new(property, column, kind),
        }
    }

    fn id() -> ResolvedColumn {
        column("id", "id", FieldKind::Int)
    }

    fn first_name() -> ResolvedColumn {
        column("firstName", "first_name", FieldKind::Text)
    }

    #[test]
    fn test_operator_parsing() {
        for operator in FilterOperator::ALL {
            assert_eq!(operator.as_str().parse::<FilterOperator>().unwrap(), operator);
        }
        let err = "regex".parse::<FilterOperator>().unwrap_err();
        assert!(matches!(err, QueryError::UnsupportedOperator(ref op) if op == "regex"));
        // operators are case-sensitive, as sent by clients
        assert!("EQ".parse::<FilterOperator>().is_err());
    }

    #[test]
    fn test_comparisons_bind_one_param() {
        let cases = [
            (FilterOperator::Eq, "="),
            (FilterOperator::Ne, "<>"),
            (FilterOperator::Gt, ">"),
            (FilterOperator::Gte, ">="),
            (FilterOperator::Lt, "<"),
            (FilterOperator::Lte, "<="),
        ];
        for (operator, symbol) in cases {
            let mut builder = ClauseBuilder::new(DatabaseBackend::Postgres);
            let clause = builder.build(&id(), operator, &FilterValue::Int(5)).unwrap();
            assert_eq!(clause.params, vec![BoundParam::new("filter_1", Value::from(5i32))]);
            let (sql, values) = clause.to_sql(DatabaseBackend::Postgres);
            assert_eq!(sql, format!(r#""entity"."id" {symbol} $1"#), "{operator}");
            assert_eq!(values.len(), 1);
        }
    }

    #[test]
    fn test_param_names_are_unique_per_builder() {
        let mut builder = ClauseBuilder::new(DatabaseBackend::Sqlite);
        let a = builder.build(&id(), FilterOperator::Eq, &1.into()).unwrap();
        let b = builder.equals(&first_name(), &"Jane".into()).unwrap();
        let c = builder.case_insensitive_like(GLOBAL_PARAM, first_name().expr(), "%J%".into());
        assert_eq!(a.params[0].name, "filter_1");
        assert_eq!(b.params[0].name, "legacy_2");
        assert_eq!(c.params[0].name, "global_3");
    }

    #[test]
    fn test_between() {
        let mut builder = ClauseBuilder::new(DatabaseBackend::Postgres);
        let clause = builder
            .build(&id(), FilterOperator::Between, &FilterValue::from(vec![18, 30]))
            .unwrap();
        let names: Vec<_> = clause.params.iter().map(|param| param.name.as_str()).collect();
        assert_eq!(names, vec!["filter_1Start", "filter_1End"]);
        let (sql, values) = clause.to_sql(DatabaseBackend::Postgres);
        assert_eq!(sql, r#""entity"."id" BETWEEN $1 AND $2"#);
        assert_eq!(values, vec![Value::from(18i32), Value::from(30i32)]);

        for bad in [FilterValue::from(vec![1]), FilterValue::from(vec![1, 2, 3]), FilterValue::Int(4), FilterValue::Null] {
            let err = builder.build(&id(), FilterOperator::Between, &bad).unwrap_err();
            assert!(matches!(err, QueryError::InvalidFilterValue { .. }), "{bad:?}");
        }
    }

    #[test]
    fn test_in_scalar_matches_one_element_list() {
        let mut scalar = ClauseBuilder::new(DatabaseBackend::Sqlite);
        let mut list = ClauseBuilder::new(DatabaseBackend::Sqlite);
        for operator in [FilterOperator::In, FilterOperator::NotIn] {
            let a = scalar.build(&id(), operator, &FilterValue::Int(3)).unwrap();
            let b = list.build(&id(), operator, &FilterValue::from(vec![3])).unwrap();
            assert_eq!(a, b);
        }
        let clause = ClauseBuilder::new(DatabaseBackend::Sqlite)
            .build(&id(), FilterOperator::NotIn, &FilterValue::from(vec![1, 2]))
            .unwrap();
        assert_eq!(clause.to_sql(DatabaseBackend::Sqlite).0, r#""entity"."id" NOT IN (?, ?)"#);
        assert_eq!(clause.params[1].name, "filter_1_1");
    }

    #[test]
    fn test_null_operators_bind_nothing() {
        let mut builder = ClauseBuilder::new(DatabaseBackend::Sqlite);
        let clause = builder.build(&first_name(), FilterOperator::IsNull, &FilterValue::Null).unwrap();
        assert!(clause.params.is_empty());
        assert_eq!(clause.to_sql(DatabaseBackend::Sqlite).0, r#""entity"."first_name" IS NULL"#);
        let clause = builder.build(&first_name(), FilterOperator::IsNotNull, &"ignored".into()).unwrap();
        assert_eq!(clause.to_sql(DatabaseBackend::Sqlite).0, r#""entity"."first_name" IS NOT NULL"#);
    }

    #[test]
    fn test_pattern_operators_escape_and_upper_case() {
        let mut builder = ClauseBuilder::new(DatabaseBackend::Postgres);
        let clause = builder.build(&first_name(), FilterOperator::StartsWith, &"ja_%".into()).unwrap();
        assert_eq!(clause.params[0].value, Value::from(r"ja\_\%%".to_string()));
        let (sql, _) = clause.to_sql(DatabaseBackend::Postgres);
        assert!(sql.starts_with(r#"UPPER("entity"."first_name") LIKE UPPER($1)"#), "{sql}");
        assert!(sql.contains("ESCAPE"), "{sql}");

        let clause = builder.build(&first_name(), FilterOperator::EndsWith, &"ne".into()).unwrap();
        assert_eq!(clause.params[0].value, Value::from("%ne".to_string()));

        let clause = builder.build(&first_name(), FilterOperator::Like, &"Ja".into()).unwrap();
        assert_eq!(clause.params[0].value, Value::from("%Ja%".to_string()));

        let err = builder.build(&first_name(), FilterOperator::ILike, &FilterValue::Null).unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilterValue { .. }));
    }

    #[test]
    fn test_pattern_on_numeric_column_casts_to_text() {
        let mut builder = ClauseBuilder::new(DatabaseBackend::Sqlite);
        let clause = builder.build(&id(), FilterOperator::ILike, &"12".into()).unwrap();
        let (sql, _) = clause.to_sql(DatabaseBackend::Sqlite);
        assert!(sql.contains("CAST"), "{sql}");
    }

    #[test]
    fn test_legacy_equality_shapes() {
        let mut builder = ClauseBuilder::new(DatabaseBackend::Sqlite);
        let null = builder.equals(&first_name(), &FilterValue::Null).unwrap();
        assert!(null.params.is_empty());
        let list = builder.equals(&id(), &FilterValue::from(vec![1, 2, 3])).unwrap();
        assert_eq!(list.params.len(), 3);
        assert_eq!(list.to_sql(DatabaseBackend::Sqlite).0, r#""entity"."id" IN (?, ?, ?)"#);
    }

    #[test]
    fn test_coercion() {
        assert_eq!(coerce_scalar(FieldKind::Int, &"42".into()), Ok(Value::from(42i32)));
        assert_eq!(coerce_scalar(FieldKind::Int, &FilterValue::Float(3.0)), Ok(Value::from(3i32)));
        assert!(coerce_scalar(FieldKind::Int, &FilterValue::Float(3.5)).is_err());
        assert!(coerce_scalar(FieldKind::Int, &FilterValue::Int(i64::MAX)).is_err());
        assert_eq!(coerce_scalar(FieldKind::BigInt, &FilterValue::Int(i64::MAX)), Ok(Value::from(i64::MAX)));
        assert_eq!(coerce_scalar(FieldKind::Bool, &"TRUE".into()), Ok(Value::from(true)));
        assert_eq!(coerce_scalar(FieldKind::Bool, &FilterValue::Int(0)), Ok(Value::from(false)));
        assert!(coerce_scalar(FieldKind::Bool, &FilterValue::Int(2)).is_err());
        assert_eq!(coerce_scalar(FieldKind::Text, &FilterValue::Int(7)), Ok(Value::from("7".to_string())));
        assert!(coerce_scalar(FieldKind::Uuid, &"not-a-uuid".into()).is_err());
        assert!(coerce_scalar(FieldKind::Uuid, &"550e8400-e29b-41d4-a716-446655440000".into()).is_ok());
        assert!(coerce_scalar(FieldKind::DateTime, &"2024-01-31".into()).is_ok());
        assert!(coerce_scalar(FieldKind::DateTime, &"2024-01-31T10:00:00+02:00".into()).is_ok());
        assert!(coerce_scalar(FieldKind::DateTime, &"yesterday".into()).is_err());
        assert!(coerce_scalar(FieldKind::Text, &FilterValue::Null).is_err());
    }

    #[test]
    fn test_timestamp_like_text_stays_verbatim() {
        let value: FilterValue = serde_json::from_str(r#""2024-01-01T00:00:00Z""#).unwrap();
        let mut builder = ClauseBuilder::new(DatabaseBackend::Sqlite);

        let clause = builder.build(&first_name(), FilterOperator::Eq, &value).unwrap();
        assert_eq!(clause.params[0].value, Value::from("2024-01-01T00:00:00Z".to_string()));
        let clause = builder.build(&first_name(), FilterOperator::ILike, &value).unwrap();
        assert_eq!(clause.params[0].value, Value::from("%2024-01-01T00:00:00Z%".to_string()));

        assert!(matches!(coerce_scalar(FieldKind::DateTime, &value), Ok(Value::ChronoDateTimeUtc(_))));
    }

    #[test]
    fn test_check_shape() {
        assert!(check_shape("id", FilterOperator::IsNull, &FilterValue::from(vec![1])).is_ok());
        assert!(check_shape("id", FilterOperator::In, &FilterValue::Int(1)).is_ok());
        assert!(check_shape("id", FilterOperator::In, &FilterValue::Null).is_err());
        assert!(check_shape("id", FilterOperator::Between, &FilterValue::from(vec![1, 2])).is_ok());
        assert!(check_shape("id", FilterOperator::Between, &FilterValue::from(vec![1])).is_err());
        assert!(check_shape("id", FilterOperator::Eq, &FilterValue::Null).is_err());
        assert!(check_shape("id", FilterOperator::Like, &FilterValue::from(vec!["a"])).is_err());
    }

    #[test]
    fn test_comparison_rejects_list_values() {
        let mut builder = ClauseBuilder::new(DatabaseBackend::Sqlite);
        let err = builder.build(&id(), FilterOperator::Gt, &FilterValue::from(vec![1, 2])).unwrap_err();
        assert!(matches!(err, QueryError::InvalidFilterValue { ref field, .. } if field == "id"));
    }

    #[test]
    fn test_overlong_values_rejected() {
        let mut builder = ClauseBuilder::new(DatabaseBackend::Sqlite);
        let long = "x".repeat(MAX_FIELD_VALUE_LENGTH + 1);
        assert!(builder.build(&first_name(), FilterOperator::Eq, &long.clone().into()).is_err());
        assert!(builder.build(&first_name(), FilterOperator::ILike, &long.into()).is_err());
    }
}
