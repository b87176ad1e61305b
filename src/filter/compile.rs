//! Rendering filters as parameterized SQL conditions.

use std::fmt;

use rusqlite::types::ToSqlOutput;
use rusqlite::ToSql;

use super::Filter;
use crate::error::ValidationError;

/// `known_state` value of files found in a known-good hash set.
const KNOWN_STATE_KNOWN: i64 = 1;

/// Column a leaf filter tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterColumn {
    /// Tested by [`Filter::HashSet`].
    HashSetName,
    /// Tested by [`Filter::TagName`].
    TagNameId,
    /// Tested by [`Filter::DataSource`].
    DataSourceId,
    /// Tested by [`Filter::Text`].
    Description,
    /// Tested by [`Filter::HideKnown`].
    KnownState,
}

/// Column names supplied by the query that embeds the predicate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileContext {
    hash_set_name: String,
    tag_name_id: String,
    data_source_id: String,
    description: String,
    known_state: String,
}

impl Default for CompileContext {
    fn default() -> Self {
        Self {
            hash_set_name: "hash_set_name".to_string(),
            tag_name_id: "tag_name_id".to_string(),
            data_source_id: "data_source_obj_id".to_string(),
            description: "full_description".to_string(),
            known_state: "known_state".to_string(),
        }
    }
}

impl CompileContext {
    /// Maps `column` to the identifier `name`, e.g. `"events.known_state"`.
    ///
    /// # Errors
    /// `ValidationError::InvalidIdentifier` unless `name` matches
    /// `[A-Za-z_][A-Za-z0-9_.]*`.
    pub fn with_column(
        mut self,
        column: FilterColumn,
        name: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let name = name.into();
        if !is_identifier(&name) {
            return Err(ValidationError::InvalidIdentifier { identifier: name });
        }
        *self.slot(column) = name;
        Ok(self)
    }

    /// The identifier `column` is mapped to.
    #[must_use]
    pub fn column(&self, column: FilterColumn) -> &str {
        match column {
            FilterColumn::HashSetName => &self.hash_set_name,
            FilterColumn::TagNameId => &self.tag_name_id,
            FilterColumn::DataSourceId => &self.data_source_id,
            FilterColumn::Description => &self.description,
            FilterColumn::KnownState => &self.known_state,
        }
    }

    fn slot(&mut self, column: FilterColumn) -> &mut String {
        match column {
            FilterColumn::HashSetName => &mut self.hash_set_name,
            FilterColumn::TagNameId => &mut self.tag_name_id,
            FilterColumn::DataSourceId => &mut self.data_source_id,
            FilterColumn::Description => &mut self.description,
            FilterColumn::KnownState => &mut self.known_state,
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// A value bound to one `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoundValue {
    /// Integer parameter.
    Integer(i64),
    /// Text parameter.
    Text(String),
}

impl ToSql for BoundValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Self::Integer(v) => v.to_sql(),
            Self::Text(s) => s.to_sql(),
        }
    }
}

/// A compiled condition: SQL with `?` placeholders plus their values in order.
///
/// ```ignore
/// let predicate = filter.compile(&CompileContext::default());
/// let sql = format!("SELECT event_id FROM events WHERE {}", predicate.sql());
/// stmt.query(rusqlite::params_from_iter(predicate.params()))?;
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Predicate {
    sql: String,
    params: Vec<BoundValue>,
}

impl Predicate {
    /// The condition text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Values for the placeholders, in order.
    #[must_use]
    pub fn params(&self) -> &[BoundValue] {
        &self.params
    }

    /// Splits into SQL and parameters.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<BoundValue>) {
        (self.sql, self.params)
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}

impl Filter {
    /// Renders the filter as a condition over the columns in `ctx`.
    ///
    /// Caller-supplied values are always bound as parameters.
    #[must_use]
    pub fn compile(&self, ctx: &CompileContext) -> Predicate {
        let mut params = Vec::new();
        let sql = self.render(ctx, &mut params);
        Predicate { sql, params }
    }

    fn render(&self, ctx: &CompileContext, params: &mut Vec<BoundValue>) -> String {
        match self {
            Self::HashSet { hash_set_name } => {
                params.push(BoundValue::Text(hash_set_name.clone()));
                format!("({} = ?)", ctx.column(FilterColumn::HashSetName))
            }
            Self::TagName { tag_name_id, .. } => {
                params.push(BoundValue::Integer(*tag_name_id));
                format!("({} = ?)", ctx.column(FilterColumn::TagNameId))
            }
            Self::DataSource { data_source_id, .. } => {
                params.push(BoundValue::Integer(*data_source_id));
                format!("({} = ?)", ctx.column(FilterColumn::DataSourceId))
            }
            Self::Text { substring } if substring.is_empty() => "1".to_string(),
            Self::Text { substring } => {
                params.push(BoundValue::Text(format!("%{}%", escape_like(substring))));
                format!("({} LIKE ? ESCAPE '\\')", ctx.column(FilterColumn::Description))
            }
            Self::HideKnown => {
                params.push(BoundValue::Integer(KNOWN_STATE_KNOWN));
                format!("({} IS NOT ?)", ctx.column(FilterColumn::KnownState))
            }
            Self::And(children) => join(children, " AND ", "1", ctx, params),
            Self::Or(children) => join(children, " OR ", "0", ctx, params),
            Self::Not(child) => format!("(NOT {})", child.render(ctx, params)),
        }
    }
}

fn join(
    children: &[Filter],
    connective: &str,
    empty: &str,
    ctx: &CompileContext,
    params: &mut Vec<BoundValue>,
) -> String {
    if children.is_empty() {
        return empty.to_string();
    }
    let parts: Vec<String> = children.iter().map(|c| c.render(ctx, params)).collect();
    format!("({})", parts.join(connective))
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
