//! Dynamic SQL for table-scoped CRUD.
//!
//! Table and column names are caller-provided strings, so every identifier is
//! double-quoted. Values travel as bind parameters, except `NULL` which is
//! written inline; Postgres cannot infer a type for an untyped null parameter
//! compared against, or assigned to, a non-text column. Text parameters aimed
//! at columns listed in a `ColumnCasts` map carry an explicit `::type` cast.

use std::collections::BTreeMap;

use crate::models::{ Filter, Row, Value };

/// Bind parameter syntax of the target database
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placeholder {
    /// `$1, $2, ...` (Postgres)
    Numbered,
    /// `?` (SQLite)
    Question,
}

/// Column name -> SQL type that text parameters for that column are cast to
pub type ColumnCasts = BTreeMap<String, String>;

/// SQL text plus its bind parameters in order
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

struct Builder<'a> {
    sql: String,
    params: Vec<Value>,
    style: Placeholder,
    casts: Option<&'a ColumnCasts>,
}

impl<'a> Builder<'a> {
    fn new(style: Placeholder, casts: Option<&'a ColumnCasts>) -> Self {
        Self {
            sql: String::new(),
            params: Vec::new(),
            style,
            casts,
        }
    }

    fn push(&mut self, text: &str) -> &mut Self {
        self.sql.push_str(text);
        self
    }

    fn push_ident(&mut self, ident: &str) -> &mut Self {
        self.sql.push_str(&quote_ident(ident));
        self
    }

    fn push_value(&mut self, column: &str, value: &Value) -> &mut Self {
        let value = value.clone().into_scalar();
        if value.is_null() {
            return self.push("NULL");
        }
        let cast = match value {
            Value::Text(_) => self.casts.and_then(|casts| casts.get(column)).cloned(),
            _ => None,
        };
        self.params.push(value);
        match self.style {
            Placeholder::Numbered => {
                let marker = format!("${}", self.params.len());
                self.sql.push_str(&marker);
            }
            Placeholder::Question => self.sql.push('?'),
        }
        if let Some(cast) = cast {
            self.sql.push_str("::");
            self.sql.push_str(&cast);
        }
        self
    }

    fn push_where(&mut self, filter: &Filter) -> &mut Self {
        for (idx, (field, expected)) in filter.iter().enumerate() {
            self.push(if idx == 0 { " WHERE " } else { " AND " });
            self.push_ident(field);
            if expected.is_null() {
                self.push(" IS NULL");
            } else {
                self.push(" = ");
                self.push_value(field, expected);
            }
        }
        self
    }

    fn finish(self) -> Statement {
        Statement {
            sql: self.sql,
            params: self.params,
        }
    }
}

/// Quote an identifier, doubling any embedded quote characters
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// `SELECT` over `table`; an empty `columns` list selects everything
pub fn select(
    table: &str,
    columns: &[String],
    filter: &Filter,
    limit: Option<u32>,
    style: Placeholder,
    casts: Option<&ColumnCasts>
) -> Statement {
    let mut b = Builder::new(style, casts);
    b.push("SELECT ");
    if columns.is_empty() {
        b.push("*");
    } else {
        for (idx, column) in columns.iter().enumerate() {
            if idx > 0 {
                b.push(", ");
            }
            b.push_ident(column);
        }
    }
    b.push(" FROM ").push_ident(table);
    b.push_where(filter);
    if let Some(limit) = limit {
        b.push(&format!(" LIMIT {}", limit));
    }
    b.finish()
}

pub fn insert(
    table: &str,
    row: &Row,
    style: Placeholder,
    casts: Option<&ColumnCasts>
) -> Statement {
    let mut b = Builder::new(style, casts);
    b.push("INSERT INTO ").push_ident(table);
    push_values_clause(&mut b, row);
    b.finish()
}

/// `UPDATE` of the fields in `row`; callers must not pass an empty row
pub fn update(
    table: &str,
    row: &Row,
    filter: &Filter,
    style: Placeholder,
    casts: Option<&ColumnCasts>
) -> Statement {
    let mut b = Builder::new(style, casts);
    b.push("UPDATE ").push_ident(table).push(" SET ");
    for (idx, (field, value)) in row.iter().enumerate() {
        if idx > 0 {
            b.push(", ");
        }
        b.push_ident(field).push(" = ");
        b.push_value(field, value);
    }
    b.push_where(filter);
    b.finish()
}

pub fn delete(
    table: &str,
    filter: &Filter,
    style: Placeholder,
    casts: Option<&ColumnCasts>
) -> Statement {
    let mut b = Builder::new(style, casts);
    b.push("DELETE FROM ").push_ident(table);
    b.push_where(filter);
    b.finish()
}

/// Insert-on-conflict-update keyed on `primary_key`, understood by both
/// Postgres and SQLite (3.24+)
pub fn upsert(
    table: &str,
    primary_key: &str,
    row: &Row,
    style: Placeholder,
    casts: Option<&ColumnCasts>
) -> Statement {
    let mut b = Builder::new(style, casts);
    b.push("INSERT INTO ").push_ident(table);
    push_values_clause(&mut b, row);
    b.push(" ON CONFLICT (").push_ident(primary_key).push(")");

    let updates: Vec<&String> = row
        .fields()
        .filter(|field| field.as_str() != primary_key)
        .collect();
    if updates.is_empty() {
        b.push(" DO NOTHING");
    } else {
        b.push(" DO UPDATE SET ");
        for (idx, field) in updates.into_iter().enumerate() {
            if idx > 0 {
                b.push(", ");
            }
            b.push_ident(field).push(" = excluded.").push_ident(field);
        }
    }
    b.finish()
}

fn push_values_clause(b: &mut Builder<'_>, row: &Row) {
    b.push(" (");
    for (idx, field) in row.fields().enumerate() {
        if idx > 0 {
            b.push(", ");
        }
        b.push_ident(field);
    }
    b.push(") VALUES (");
    for (idx, (field, value)) in row.iter().enumerate() {
        if idx > 0 {
            b.push(", ");
        }
        b.push_value(field, value);
    }
    b.push(")");
}

/// Split a script into statements on `;`.
///
/// Semicolons inside single-quoted literals, quoted identifiers and
/// `$$` / `$tag$` dollar-quoted bodies do not split. `--` and `/* */`
/// comments are dropped.
pub fn split_statements(script: &str) -> Vec<String> {
    let chars: Vec<char> = script.chars().collect();
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            quote @ ('\'' | '"') => {
                let end = closing_quote(&chars, i + 1, quote);
                current.extend(&chars[i..end]);
                i = end;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                i = find(&chars, i + 2, &['\n']).unwrap_or(chars.len());
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i = find(&chars, i + 2, &['*', '/']).map_or(chars.len(), |end| end + 2);
                current.push(' ');
            }
            '$' =>
                match dollar_tag(&chars, i) {
                    Some(tag) => {
                        let body = i + tag.len();
                        let end = find(&chars, body, &tag).map_or(chars.len(), |end| end + tag.len());
                        current.extend(&chars[i..end]);
                        i = end;
                    }
                    None => {
                        current.push('$');
                        i += 1;
                    }
                }
            ';' => {
                push_statement(&mut statements, &current);
                current.clear();
                i += 1;
            }
            c => {
                current.push(c);
                i += 1;
            }
        }
    }
    push_statement(&mut statements, &current);

    statements
}

fn push_statement(statements: &mut Vec<String>, text: &str) {
    let stmt = text.trim();
    if !stmt.is_empty() {
        statements.push(stmt.to_string());
    }
}

/// Index just past the quote closing a literal that opened before `from`;
/// doubled quotes are escapes
fn closing_quote(chars: &[char], from: usize, quote: char) -> usize {
    let mut i = from;
    while i < chars.len() {
        if chars[i] == quote {
            if chars.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    chars.len()
}

/// `$$` or `$tag$` starting at `start`; `$1` style parameters are not tags
fn dollar_tag(chars: &[char], start: usize) -> Option<Vec<char>> {
    let mut end = start + 1;
    while end < chars.len() && (chars[end].is_alphanumeric() || chars[end] == '_') {
        end += 1;
    }
    if chars.get(end) != Some(&'$') {
        return None;
    }
    if chars.get(start + 1).map_or(false, |c| c.is_ascii_digit()) {
        return None;
    }
    Some(chars[start..=end].to_vec())
}

fn find(chars: &[char], from: usize, pattern: &[char]) -> Option<usize> {
    if from >= chars.len() {
        return None;
    }
    chars[from..]
        .windows(pattern.len())
        .position(|window| window == pattern)
        .map(|pos| from + pos)
}
