//! Search query builder
//!
//! Composes filters and ordering into a parameterized SQL query over the
//! `links` table. Column names only ever come from the enumerations in this
//! module; user-supplied values are always bound parameters.
//!
//! ```
//! use fslinks_core::query::{QueryBuilder, SortDirection, SortField, TagMatch};
//!
//! let mut builder = QueryBuilder::new();
//! builder
//!     .simple_search("report")
//!     .filter_by_tags(&["work", "urgent"], TagMatch::All)
//!     .set_order(SortField::Name, SortDirection::Asc);
//! let query = builder.build();
//! assert_eq!(query.params.len(), 5);
//! ```

use std::fmt;
use std::str::FromStr;

use rusqlite::functions::FunctionFlags;
use rusqlite::Connection;
use thiserror::Error;

/// Columns selected for every link query, in `LinkRecord` field order
pub const LINK_COLUMNS: &str = "id, name, path, tags, custom_icon, position, added_at";

/// Column list for databases created before `custom_icon` existed
pub const LEGACY_LINK_COLUMNS: &str = "id, name, path, tags, '' AS custom_icon, position, added_at";

/// SQL function applying [`fold_case`] to a column
pub const CASEFOLD_FUNCTION: &str = "casefold";

/// Errors raised while interpreting query parameters given as text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("Unknown search field '{0}'. Valid fields: name, path, tags, all")]
    UnknownField(String),

    #[error("Unknown search operator '{0}'. Valid operators: contains, equals, starts_with, ends_with")]
    UnknownOperator(String),

    #[error("Unknown sort field '{0}'. Valid fields: position, name, path, added_at, id")]
    UnknownSortField(String),

    #[error("Unknown sort direction '{0}'. Use 'asc' or 'desc'")]
    UnknownDirection(String),
}

/// Field a filter applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SearchField {
    Name,
    Path,
    Tags,
    /// Name, path or tags
    All,
}

impl SearchField {
    /// Concrete columns this field expands to
    fn columns(self) -> &'static [&'static str] {
        match self {
            SearchField::Name => &["name"],
            SearchField::Path => &["path"],
            SearchField::Tags => &["tags"],
            SearchField::All => &["name", "path", "tags"],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchField::Name => "name",
            SearchField::Path => "path",
            SearchField::Tags => "tags",
            SearchField::All => "all",
        }
    }
}

impl FromStr for SearchField {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SearchField::Name),
            "path" => Ok(SearchField::Path),
            "tags" | "tag" => Ok(SearchField::Tags),
            "all" => Ok(SearchField::All),
            _ => Err(QueryError::UnknownField(s.to_string())),
        }
    }
}

impl fmt::Display for SearchField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a filter value is compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SearchOperator {
    #[default]
    Contains,
    Equals,
    StartsWith,
    EndsWith,
}

impl SearchOperator {
    pub fn as_str(self) -> &'static str {
        match self {
            SearchOperator::Contains => "contains",
            SearchOperator::Equals => "equals",
            SearchOperator::StartsWith => "starts_with",
            SearchOperator::EndsWith => "ends_with",
        }
    }
}

impl FromStr for SearchOperator {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "contains" => Ok(SearchOperator::Contains),
            "equals" | "eq" => Ok(SearchOperator::Equals),
            "starts_with" | "prefix" => Ok(SearchOperator::StartsWith),
            "ends_with" | "suffix" => Ok(SearchOperator::EndsWith),
            _ => Err(QueryError::UnknownOperator(s.to_string())),
        }
    }
}

impl fmt::Display for SearchOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sortable columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortField {
    #[default]
    Position,
    Name,
    Path,
    AddedAt,
    Id,
}

impl SortField {
    fn column(self) -> &'static str {
        match self {
            SortField::Position => "position",
            SortField::Name => "name",
            SortField::Path => "path",
            SortField::AddedAt => "added_at",
            SortField::Id => "id",
        }
    }
}

impl FromStr for SortField {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "position" => Ok(SortField::Position),
            "name" => Ok(SortField::Name),
            "path" => Ok(SortField::Path),
            "added_at" | "added" => Ok(SortField::AddedAt),
            "id" => Ok(SortField::Id),
            _ => Err(QueryError::UnknownSortField(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

impl FromStr for SortDirection {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            _ => Err(QueryError::UnknownDirection(s.to_string())),
        }
    }
}

/// How multiple tags passed to [`QueryBuilder::filter_by_tags`] combine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TagMatch {
    /// A link matches if it carries any of the tags
    #[default]
    Any,
    /// A link matches only if it carries every tag
    All,
}

/// A single filter condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub field: SearchField,
    pub operator: SearchOperator,
    pub value: String,
    pub case_sensitive: bool,
}

impl Filter {
    pub fn new(field: SearchField, value: impl Into<String>) -> Self {
        Self {
            field,
            operator: SearchOperator::Contains,
            value: value.into(),
            case_sensitive: false,
        }
    }

    pub fn operator(mut self, operator: SearchOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    /// SQL fragment and parameters for this filter
    ///
    /// Multi-column fields are OR-ed together.
    fn to_sql(&self) -> (String, Vec<String>) {
        let (predicate, param) = self.predicate();
        let columns = self.field.columns();

        let conditions: Vec<String> = columns
            .iter()
            .map(|column| {
                if self.case_sensitive {
                    format!("{} {}", column, predicate)
                } else {
                    format!("{}({}) {}", CASEFOLD_FUNCTION, column, predicate)
                }
            })
            .collect();
        let params = vec![param; columns.len()];

        (conditions.join(" OR "), params)
    }

    /// Comparison (without the column) and the bound value
    ///
    /// Case-insensitive values are folded the same way as the column.
    fn predicate(&self) -> (&'static str, String) {
        match (self.operator, self.case_sensitive) {
            (SearchOperator::Equals, true) => ("= ?", self.value.clone()),
            (SearchOperator::Equals, false) => ("= ?", fold_case(&self.value)),
            (op, false) => {
                let v = escape_like(&fold_case(&self.value));
                let pattern = match op {
                    SearchOperator::StartsWith => format!("{}%", v),
                    SearchOperator::EndsWith => format!("%{}", v),
                    _ => format!("%{}%", v),
                };
                ("LIKE ? ESCAPE '\\'", pattern)
            }
            (op, true) => {
                let v = escape_glob(&self.value);
                let pattern = match op {
                    SearchOperator::StartsWith => format!("{}*", v),
                    SearchOperator::EndsWith => format!("*{}", v),
                    _ => format!("*{}*", v),
                };
                ("GLOB ?", pattern)
            }
        }
    }
}

/// Fold text for case-insensitive comparison (Unicode lowercase)
pub fn fold_case(value: &str) -> String {
    value.to_lowercase()
}

/// Register the SQL functions used by built queries on `conn`
///
/// Must run on every connection that executes a [`BuiltQuery`].
pub fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        CASEFOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|v| fold_case(&v)))
        },
    )
}

/// Escape LIKE wildcards so the value matches literally (escape char `\`)
fn escape_like(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Escape GLOB metacharacters by wrapping each in a character class
fn escape_glob(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '*' | '?' | '[' => {
                out.push('[');
                out.push(c);
                out.push(']');
            }
            _ => out.push(c),
        }
    }
    out
}

/// One AND-ed condition: a single filter or a group of OR-ed filters
#[derive(Debug, Clone, PartialEq, Eq)]
enum Condition {
    Single(Filter),
    AnyOf(Vec<Filter>),
}

impl Condition {
    fn to_sql(&self) -> (String, Vec<String>) {
        match self {
            Condition::Single(filter) => filter.to_sql(),
            Condition::AnyOf(filters) => {
                let mut parts = Vec::with_capacity(filters.len());
                let mut params = Vec::new();
                for filter in filters {
                    let (sql, p) = filter.to_sql();
                    parts.push(if filters.len() > 1 {
                        format!("({})", sql)
                    } else {
                        sql
                    });
                    params.extend(p);
                }
                (parts.join(" OR "), params)
            }
        }
    }

    fn filters(&self) -> Vec<&Filter> {
        match self {
            Condition::Single(filter) => vec![filter],
            Condition::AnyOf(filters) => filters.iter().collect(),
        }
    }
}

/// Which column list a query selects
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LinkColumns {
    #[default]
    Full,
    /// Pre-migration layout without `custom_icon`
    Legacy,
}

impl LinkColumns {
    pub(crate) fn select_list(self) -> &'static str {
        match self {
            LinkColumns::Full => LINK_COLUMNS,
            LinkColumns::Legacy => LEGACY_LINK_COLUMNS,
        }
    }
}

/// SQL text and positional parameters produced by [`QueryBuilder::build`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltQuery {
    pub sql: String,
    pub params: Vec<String>,
}

/// Builder for link search queries
///
/// Conditions are AND-ed; a filter on [`SearchField::All`] matches if any
/// of name, path or tags matches. Results are ordered by position unless
/// [`set_order`](Self::set_order) says otherwise.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryBuilder {
    conditions: Vec<Condition>,
    order_by: SortField,
    direction: SortDirection,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter condition
    pub fn add_filter(
        &mut self,
        field: SearchField,
        value: impl Into<String>,
        operator: SearchOperator,
        case_sensitive: bool,
    ) -> &mut Self {
        self.add_filter_with(Filter {
            field,
            operator,
            value: value.into(),
            case_sensitive,
        })
    }

    /// Add a prepared filter
    pub fn add_filter_with(&mut self, filter: Filter) -> &mut Self {
        self.conditions.push(Condition::Single(filter));
        self
    }

    /// Free-text search across name, path and tags
    ///
    /// Blank input adds nothing.
    pub fn simple_search(&mut self, text: &str) -> &mut Self {
        let text = text.trim();
        if !text.is_empty() {
            self.add_filter(SearchField::All, text, SearchOperator::Contains, false);
        }
        self
    }

    /// Restrict results to links whose tags contain the given tags
    ///
    /// Each tag is a case-insensitive substring match on the raw tags
    /// column, so `work` also matches a link tagged `homework`.
    pub fn filter_by_tags<S: AsRef<str>>(&mut self, tags: &[S], mode: TagMatch) -> &mut Self {
        let filters: Vec<Filter> = tags
            .iter()
            .map(|t| t.as_ref().trim())
            .filter(|t| !t.is_empty())
            .map(|t| Filter::new(SearchField::Tags, t))
            .collect();

        if filters.is_empty() {
            return self;
        }

        match mode {
            TagMatch::All => {
                self.conditions
                    .extend(filters.into_iter().map(Condition::Single));
            }
            TagMatch::Any => self.conditions.push(Condition::AnyOf(filters)),
        }
        self
    }

    /// Set the result ordering
    pub fn set_order(&mut self, field: SortField, direction: SortDirection) -> &mut Self {
        self.order_by = field;
        self.direction = direction;
        self
    }

    /// Remove all filter conditions, keeping the ordering
    pub fn clear(&mut self) -> &mut Self {
        self.conditions.clear();
        self
    }

    /// True when no filter has been added
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// All filters in insertion order (grouped filters flattened)
    pub fn filters(&self) -> Vec<&Filter> {
        self.conditions.iter().flat_map(Condition::filters).collect()
    }

    pub fn order(&self) -> (SortField, SortDirection) {
        (self.order_by, self.direction)
    }

    /// Build the query selecting the full column list
    pub fn build(&self) -> BuiltQuery {
        self.build_for(LinkColumns::Full)
    }

    /// Build the query for a specific column layout
    pub fn build_for(&self, columns: LinkColumns) -> BuiltQuery {
        let mut sql = format!("SELECT {} FROM links", columns.select_list());
        let mut params = Vec::new();

        if !self.conditions.is_empty() {
            let wrap = self.conditions.len() > 1;
            let mut clauses = Vec::with_capacity(self.conditions.len());
            for condition in &self.conditions {
                let (clause, p) = condition.to_sql();
                clauses.push(if wrap { format!("({})", clause) } else { clause });
                params.extend(p);
            }
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        sql.push_str(&format!(
            " ORDER BY {} {}",
            self.order_by.column(),
            self.direction.keyword()
        ));
        if self.order_by != SortField::Id {
            sql.push_str(", id ASC");
        }

        BuiltQuery { sql, params }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_builder_lists_by_position() {
        let query = QueryBuilder::new().build();
        assert_eq!(
            query.sql,
            "SELECT id, name, path, tags, custom_icon, position, added_at FROM links \
             ORDER BY position ASC, id ASC"
        );
        assert!(query.params.is_empty());
    }

    #[test]
    fn test_simple_search_expands_to_all_fields() {
        let mut builder = QueryBuilder::new();
        builder.simple_search("  report ");
        let query = builder.build();

        assert!(query.sql.contains(
            "WHERE casefold(name) LIKE ? ESCAPE '\\' OR casefold(path) LIKE ? ESCAPE '\\' OR casefold(tags) LIKE ? ESCAPE '\\'"
        ));
        assert_eq!(query.params, vec!["%report%"; 3]);
    }

    #[test]
    fn test_blank_simple_search_is_noop() {
        let mut builder = QueryBuilder::new();
        builder.simple_search("   ").simple_search("");
        assert!(builder.is_empty());
        assert!(!builder.build().sql.contains("WHERE"));
    }

    #[test]
    fn test_multiple_filters_are_parenthesized_and_anded() {
        let mut builder = QueryBuilder::new();
        builder
            .simple_search("doc")
            .add_filter(SearchField::Path, "/home", SearchOperator::StartsWith, false);
        let query = builder.build();

        assert!(query.sql.contains(
            "WHERE (casefold(name) LIKE ? ESCAPE '\\' OR casefold(path) LIKE ? ESCAPE '\\' OR casefold(tags) LIKE ? ESCAPE '\\') \
             AND (casefold(path) LIKE ? ESCAPE '\\')"
        ));
        assert_eq!(query.params, vec!["%doc%", "%doc%", "%doc%", "/home%"]);
    }

    #[test]
    fn test_operator_patterns() {
        let cases = [
            (SearchOperator::Contains, "LIKE ? ESCAPE '\\'", "%abc%"),
            (SearchOperator::StartsWith, "LIKE ? ESCAPE '\\'", "abc%"),
            (SearchOperator::EndsWith, "LIKE ? ESCAPE '\\'", "%abc"),
            (SearchOperator::Equals, "= ?", "abc"),
        ];
        for (op, predicate, param) in cases {
            let mut builder = QueryBuilder::new();
            builder.add_filter(SearchField::Name, "abc", op, false);
            let query = builder.build();
            assert!(
                query.sql.contains(&format!("WHERE casefold(name) {}", predicate)),
                "{:?}: {}",
                op,
                query.sql
            );
            assert_eq!(query.params, vec![param]);
        }
    }

    #[test]
    fn test_case_sensitive_uses_glob() {
        let mut builder = QueryBuilder::new();
        builder.add_filter(SearchField::Name, "Rep*ort", SearchOperator::StartsWith, true);
        let query = builder.build();
        assert!(query.sql.contains("WHERE name GLOB ?"));
        assert_eq!(query.params, vec!["Rep[*]ort*"]);

        let mut builder = QueryBuilder::new();
        builder.add_filter(SearchField::Name, "Abc", SearchOperator::Equals, true);
        let query = builder.build();
        assert!(query.sql.contains("WHERE name = ? ORDER BY"));
    }

    #[test]
    fn test_like_wildcards_are_escaped() {
        let mut builder = QueryBuilder::new();
        builder.add_filter(SearchField::Name, r"100%_a\b", SearchOperator::Contains, false);
        assert_eq!(builder.build().params, vec![r"%100\%\_a\\b%"]);
    }

    #[test]
    fn test_case_insensitive_values_are_folded() {
        let mut builder = QueryBuilder::new();
        builder
            .add_filter(SearchField::Path, "ÉTÉ", SearchOperator::Contains, false)
            .add_filter(SearchField::Name, "Café", SearchOperator::Equals, false)
            .add_filter(SearchField::Name, "Café", SearchOperator::Equals, true);
        let query = builder.build();

        assert!(query.sql.contains("(casefold(name) = ?) AND (name = ?)"));
        assert_eq!(query.params, vec!["%été%", "café", "Café"]);
    }

    #[test]
    fn test_casefold_function() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();

        let folded: String = conn
            .query_row("SELECT casefold('Ärger ÜBER Straße')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, "ärger über straße");

        let null: Option<String> = conn
            .query_row("SELECT casefold(NULL)", [], |row| row.get(0))
            .unwrap();
        assert!(null.is_none());
    }

    #[test]
    fn test_values_never_appear_in_sql() {
        let evil = "x'; DROP TABLE links; --";
        let mut builder = QueryBuilder::new();
        builder
            .simple_search(evil)
            .add_filter(SearchField::Tags, evil, SearchOperator::Equals, true);
        let query = builder.build();
        assert!(!query.sql.contains("DROP"));
        assert_eq!(query.params.len(), 4);
    }

    #[test]
    fn test_filter_by_tags_all_adds_one_condition_per_tag() {
        let mut builder = QueryBuilder::new();
        builder.filter_by_tags(&["work", " urgent ", ""], TagMatch::All);
        let query = builder.build();
        assert!(query
            .sql
            .contains("WHERE (casefold(tags) LIKE ? ESCAPE '\\') AND (casefold(tags) LIKE ? ESCAPE '\\')"));
        assert_eq!(query.params, vec!["%work%", "%urgent%"]);
    }

    #[test]
    fn test_filter_by_tags_any_ors_tags() {
        let mut builder = QueryBuilder::new();
        builder.filter_by_tags(&["work", "urgent"], TagMatch::Any);
        let query = builder.build();
        assert!(query
            .sql
            .contains("WHERE (casefold(tags) LIKE ? ESCAPE '\\') OR (casefold(tags) LIKE ? ESCAPE '\\') ORDER BY"));
        assert_eq!(builder.filters().len(), 2);
    }

    #[test]
    fn test_filter_by_tags_any_combined_with_search() {
        let mut builder = QueryBuilder::new();
        builder
            .simple_search("doc")
            .filter_by_tags(&["a", "b"], TagMatch::Any);
        let query = builder.build();
        assert!(query.sql.contains(
            "AND ((casefold(tags) LIKE ? ESCAPE '\\') OR (casefold(tags) LIKE ? ESCAPE '\\'))"
        ));
    }

    #[test]
    fn test_filter_by_tags_empty_is_noop() {
        let mut builder = QueryBuilder::new();
        let none: [&str; 0] = [];
        builder
            .filter_by_tags(&none, TagMatch::Any)
            .filter_by_tags(&["  "], TagMatch::All);
        assert!(builder.is_empty());
    }

    #[test]
    fn test_set_order() {
        let mut builder = QueryBuilder::new();
        builder.set_order(SortField::AddedAt, SortDirection::Desc);
        assert!(builder
            .build()
            .sql
            .ends_with("ORDER BY added_at DESC, id ASC"));

        builder.set_order(SortField::Id, SortDirection::Desc);
        assert!(builder.build().sql.ends_with("ORDER BY id DESC"));
    }

    #[test]
    fn test_clear_keeps_order() {
        let mut builder = QueryBuilder::new();
        builder
            .simple_search("x")
            .set_order(SortField::Name, SortDirection::Desc)
            .clear();
        assert!(builder.is_empty());
        assert_eq!(builder.order(), (SortField::Name, SortDirection::Desc));
    }

    #[test]
    fn test_legacy_columns() {
        let query = QueryBuilder::new().build_for(LinkColumns::Legacy);
        assert!(query.sql.starts_with(
            "SELECT id, name, path, tags, '' AS custom_icon, position, added_at FROM links"
        ));
    }

    #[test]
    fn test_parse_enumerations() {
        assert_eq!("Name".parse::<SearchField>().unwrap(), SearchField::Name);
        assert_eq!(
            "starts-with".parse::<SearchOperator>().unwrap(),
            SearchOperator::StartsWith
        );
        assert_eq!("added_at".parse::<SortField>().unwrap(), SortField::AddedAt);
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
    }

    #[test]
    fn test_parse_rejects_unknown_identifiers() {
        assert_eq!(
            "position; DROP TABLE links".parse::<SortField>(),
            Err(QueryError::UnknownSortField(
                "position; DROP TABLE links".to_string()
            ))
        );
        assert!("size".parse::<SearchField>().is_err());
        assert!("regex".parse::<SearchOperator>().is_err());
        assert!("sideways".parse::<SortDirection>().is_err());
    }
}
