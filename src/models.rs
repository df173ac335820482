use std::{collections::BTreeMap, convert::Infallible, fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{
    DefaultOnError, DeserializeFromStr, DisplayFromStr, PickFirst, SerializeDisplay, StringWithSeparator,
    formats::CommaSeparator, json::JsonString, serde_as,
};
use utoipa::IntoParams;

use crate::config::PaginateConfig;
use crate::filtering::{conditions::FilterOperator, pagination::PaginationOptions};

/// Untyped value of a filter or condition, as decoded from a request.
///
/// Values are coerced to the kind of the column they are compared with when
/// the clause is built. Strings always decode as [`FilterValue::Text`]; they
/// are parsed as datetimes only when compared with a datetime column.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    #[serde(skip_deserializing)]
    DateTime(DateTime<Utc>),
    Text(String),
    List(Vec<FilterValue>),
}

impl FilterValue {
    /// Short name of the variant, used in error messages.
    #[must_use]
    pub const fn describe(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::DateTime(_) => "datetime",
            Self::Text(_) => "text",
            Self::List(_) => "list",
        }
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for FilterValue {
    fn from(value: i32) -> Self {
        Self::Int(value.into())
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for FilterValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::DateTime(value)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// How a filter joins the filters before it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, SerializeDisplay, DeserializeFromStr)]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::And => "AND",
            Self::Or => "OR",
        })
    }
}

impl FromStr for Logic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("and") {
            Ok(Self::And)
        } else if s.eq_ignore_ascii_case("or") {
            Ok(Self::Or)
        } else {
            Err(format!("unknown logic `{s}`, expected AND or OR"))
        }
    }
}

/// Sort direction. Parsing never fails: `asc` and `ascend` (any case) mean
/// ascending, everything else descending.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        })
    }
}

impl FromStr for SortDirection {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("asc") || s.eq_ignore_ascii_case("ascend") {
            Ok(Self::Asc)
        } else {
            Ok(Self::Desc)
        }
    }
}

impl From<SortDirection> for sea_orm::Order {
    fn from(direction: SortDirection) -> Self {
        match direction {
            SortDirection::Asc => Self::Asc,
            SortDirection::Desc => Self::Desc,
        }
    }
}

/// Requested ordering. A missing column means the schema's default sort field.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SortSpec {
    pub column: Option<String>,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn new(column: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            column: Some(column.into()),
            direction,
        }
    }
}

/// Legacy free-text search: `fields` are concatenated and matched as one string.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextSearch {
    pub term: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl TextSearch {
    pub fn new<I, S>(term: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            term: term.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// Advanced global search: any of `fields` containing `term` matches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSearch {
    pub term: String,
    #[serde(default)]
    pub fields: Vec<String>,
}

impl GlobalSearch {
    pub fn new<I, S>(term: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            term: term.into(),
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

/// One structured filter.
///
/// The operator is kept as received so an unknown operator is reported when
/// the clause is built rather than when the request is decoded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub field: String,
    pub operator: String,
    #[serde(default)]
    pub value: FilterValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logic: Option<Logic>,
}

impl SearchFilter {
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: impl Into<FilterValue>) -> Self {
        Self {
            field: field.into(),
            operator: operator.as_str().to_string(),
            value: value.into(),
            logic: None,
        }
    }

    /// Overrides the group logic for the join with the previous filter.
    #[must_use]
    pub const fn with_logic(mut self, logic: Logic) -> Self {
        self.logic = Some(logic);
        self
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvancedSearch {
    #[serde(default)]
    pub filters: Vec<SearchFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub global_search: Option<GlobalSearch>,
    #[serde(default)]
    pub group_logic: Logic,
}

/// Value of a legacy where key: a plain value, or one level of relation
/// nesting (`{"department": {"name": "Sales"}}`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhereValue {
    Value(FilterValue),
    Nested(BTreeMap<String, FilterValue>),
}

pub type WhereCondition = BTreeMap<String, WhereValue>;

/// Legacy equality conditions. A map is a conjunction; a list of maps is a
/// disjunction of conjunctions.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WhereConditions {
    All(WhereCondition),
    Any(Vec<WhereCondition>),
}

impl WhereConditions {
    /// Flattens into OR-groups of AND-ed `(path, value)` pairs, expanding nested
    /// relation objects to dotted paths.
    #[must_use]
    pub fn groups(&self) -> Vec<Vec<(String, FilterValue)>> {
        match self {
            Self::All(condition) => vec![flatten(condition)],
            Self::Any(conditions) => conditions.iter().map(flatten).collect(),
        }
    }

    /// Adds `key = value` to every group.
    pub fn and(&mut self, key: impl Into<String>, value: impl Into<FilterValue>) {
        let key = key.into();
        let value = WhereValue::Value(value.into());
        if matches!(self, Self::Any(conditions) if conditions.is_empty()) {
            *self = Self::default();
        }
        match self {
            Self::All(condition) => {
                condition.insert(key, value);
            }
            Self::Any(conditions) => {
                for condition in conditions {
                    condition.insert(key.clone(), value.clone());
                }
            }
        }
    }
}

impl Default for WhereConditions {
    fn default() -> Self {
        Self::All(BTreeMap::new())
    }
}

fn flatten(condition: &WhereCondition) -> Vec<(String, FilterValue)> {
    let mut pairs = Vec::with_capacity(condition.len());
    for (key, value) in condition {
        match value {
            WhereValue::Value(value) => pairs.push((key.clone(), value.clone())),
            WhereValue::Nested(fields) => {
                for (field, value) in fields {
                    pairs.push((format!("{key}.{field}"), value.clone()));
                }
            }
        }
    }
    pairs
}

/// Everything one paginate call needs, already decoded and coerced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PaginateRequest {
    pub options: PaginationOptions,
    pub sort: SortSpec,
    pub text_search: Option<TextSearch>,
    pub where_conditions: Option<WhereConditions>,
    pub advanced_search: Option<AdvancedSearch>,
    pub includes: Vec<String>,
    /// Route used to build page links; no links are produced without it.
    pub links_route: Option<String>,
}

impl PaginateRequest {
    #[must_use]
    pub fn new(options: PaginationOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sort_by(mut self, column: impl Into<String>, direction: SortDirection) -> Self {
        self.sort = SortSpec::new(column, direction);
        self
    }

    #[must_use]
    pub fn search(mut self, search: TextSearch) -> Self {
        self.text_search = Some(search);
        self
    }

    /// Sets the legacy search fields, keeping any term already decoded.
    /// Services use this to pin the searchable columns of an endpoint.
    #[must_use]
    pub fn search_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if let Some(search) = &mut self.text_search {
            search.fields = fields.into_iter().map(Into::into).collect();
        }
        self
    }

    #[must_use]
    pub fn filter_where(mut self, conditions: WhereConditions) -> Self {
        self.where_conditions = Some(conditions);
        self
    }

    #[must_use]
    pub fn advanced(mut self, search: AdvancedSearch) -> Self {
        self.advanced_search = Some(search);
        self
    }

    #[must_use]
    pub fn include(mut self, path: impl Into<String>) -> Self {
        self.includes.push(path.into());
        self
    }

    #[must_use]
    pub fn with_links(mut self, route: impl Into<String>) -> Self {
        self.links_route = Some(route.into());
        self
    }
}

/// Query-string parameters of a paginated list endpoint.
///
/// # Example
/// ```text
/// GET /users?page=2&perPage=20&sortColumn=department.name&sortDirection=ascend
///     &textSearch=jane&searchFields=firstName,lastName,email
///     &includes=department,roles
///     &where={"department":{"name":"Sales"}}
///     &filters=[{"field":"age","operator":"between","value":[18,30]}]
///     &globalSearch=ops&globalSearchFields=email,department.name&groupLogic=OR
/// ```
///
/// Non-numeric `page`/`perPage` decode as absent and fall back to the defaults.
#[serde_as]
#[derive(Clone, Debug, Default, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct PaginateParams {
    /// Page number (1-based).
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(DisplayFromStr, _)>>>")]
    #[serde(default)]
    #[param(value_type = Option<i64>, example = 1)]
    pub page: Option<i64>,
    /// Items per page, clamped to the configured maximum.
    #[serde_as(as = "DefaultOnError<Option<PickFirst<(DisplayFromStr, _)>>>")]
    #[serde(default, alias = "limit")]
    #[param(value_type = Option<i64>, example = 10)]
    pub per_page: Option<i64>,
    /// Field path to sort by, e.g. `firstName` or `department.name`.
    #[param(example = "firstName")]
    pub sort_column: Option<String>,
    /// `asc`/`ascend` for ascending, anything else for descending.
    #[param(value_type = Option<String>, example = "ascend")]
    pub sort_direction: Option<SortDirection>,
    /// Legacy free-text term.
    pub text_search: Option<String>,
    /// Comma separated field paths the legacy term is matched against.
    #[serde_as(as = "Option<StringWithSeparator<CommaSeparator, String>>")]
    #[param(value_type = Option<String>, example = "firstName,lastName,email")]
    pub search_fields: Option<Vec<String>>,
    /// Comma separated relation paths to load.
    #[serde_as(as = "Option<StringWithSeparator<CommaSeparator, String>>")]
    #[param(value_type = Option<String>, example = "department,roles")]
    pub includes: Option<Vec<String>>,
    /// JSON equality conditions: an object, or an array of objects to OR.
    #[serde_as(as = "Option<JsonString>")]
    #[serde(rename = "where")]
    #[param(value_type = Option<String>, example = r#"{"department":{"name":"Sales"}}"#)]
    pub where_conditions: Option<WhereConditions>,
    /// JSON array of `{field, operator, value, logic?}` filters.
    #[serde_as(as = "Option<JsonString>")]
    #[param(value_type = Option<String>, example = r#"[{"field":"age","operator":"gte","value":18}]"#)]
    pub filters: Option<Vec<SearchFilter>>,
    /// Term matched against any of `globalSearchFields`.
    pub global_search: Option<String>,
    #[serde_as(as = "Option<StringWithSeparator<CommaSeparator, String>>")]
    #[param(value_type = Option<String>, example = "email,department.name")]
    pub global_search_fields: Option<Vec<String>>,
    /// `AND` (default) or `OR` between filters without their own logic.
    #[param(value_type = Option<String>, example = "AND")]
    pub group_logic: Option<Logic>,
}

impl PaginateParams {
    /// Coerces the raw parameters into a [`PaginateRequest`].
    #[must_use]
    pub fn into_request(self, config: &PaginateConfig) -> PaginateRequest {
        let options = PaginationOptions::coerce(self.page, self.per_page, config);
        let sort = SortSpec {
            column: self.sort_column.filter(|column| !column.trim().is_empty()),
            direction: self.sort_direction.unwrap_or(config.default_sort_direction),
        };

        let text_search = self
            .text_search
            .filter(|term| !term.is_empty())
            .map(|term| TextSearch::new(term, self.search_fields.unwrap_or_default()));

        let global_search = self
            .global_search
            .filter(|term| !term.is_empty())
            .map(|term| GlobalSearch::new(term, self.global_search_fields.unwrap_or_default()));
        let advanced_search = if self.filters.is_some() || global_search.is_some() {
            Some(AdvancedSearch {
                filters: self.filters.unwrap_or_default(),
                global_search,
                group_logic: self.group_logic.unwrap_or_default(),
            })
        } else {
            None
        };

        PaginateRequest {
            options,
            sort,
            text_search,
            where_conditions: self.where_conditions,
            advanced_search,
            includes: self.includes.unwrap_or_default(),
            links_route: None,
        }
    }
}
