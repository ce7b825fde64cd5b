//! Query constraints and their translation to SQL.
//!
//! Constraints are an ordered list forwarded untouched by the access
//! layer; only this module knows how they map onto the `documents`
//! table. Data fields live in a JSON column and are addressed through
//! `json_extract`, metadata (`__id__`, `createdAt`, `updatedAt`) maps to
//! real columns.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::DateTime;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite};
use std::fmt;
use std::str::FromStr;

use super::store::RawDocument;
use crate::error::StoreError;

/// Field path addressing a document's id.
pub const ID_FIELD: &str = "__id__";
/// Field path addressing the server-assigned creation time.
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Field path addressing the server-assigned update time.
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Comparison operator of a `Where` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
}

impl FilterOp {
    fn sql(&self) -> &'static str {
        match self {
            FilterOp::Eq => " = ",
            FilterOp::NotEq => " != ",
            FilterOp::Lt => " < ",
            FilterOp::Lte => " <= ",
            FilterOp::Gt => " > ",
            FilterOp::Gte => " >= ",
        }
    }
}

/// Sort direction of an `OrderBy` constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    fn sql(&self) -> &'static str {
        match self {
            Direction::Asc => " ASC",
            Direction::Desc => " DESC",
        }
    }

    /// Operator selecting rows that sort after a cursor value.
    fn after(&self) -> &'static str {
        match self {
            Direction::Asc => " > ",
            Direction::Desc => " < ",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => write!(f, "asc"),
            Direction::Desc => write!(f, "desc"),
        }
    }
}

/// A filter, sort or pagination directive applied to a collection query.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    Where {
        field: String,
        op: FilterOp,
        value: Value,
    },
    OrderBy {
        field: String,
        direction: Direction,
    },
    Limit(usize),
    StartAfter(Cursor),
}

impl Constraint {
    pub fn filter(field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        Constraint::Where {
            field: field.into(),
            op,
            value: value.into(),
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::filter(field, FilterOp::Eq, value)
    }

    pub fn order_by(field: impl Into<String>, direction: Direction) -> Self {
        Constraint::OrderBy {
            field: field.into(),
            direction,
        }
    }

    pub fn limit(n: usize) -> Self {
        Constraint::Limit(n)
    }

    pub fn start_after(cursor: Cursor) -> Self {
        Constraint::StartAfter(cursor)
    }
}

/// Validates a dotted field path and returns its JSON path form (`$.a.b`).
pub fn json_path(field: &str) -> Result<String, StoreError> {
    let valid = !field.is_empty()
        && field.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        });

    if !valid {
        return Err(StoreError::validation(format!(
            "Invalid field path: {:?}",
            field
        )));
    }
    Ok(format!("$.{}", field))
}

/// A resolved field reference.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Key {
    Id,
    CreatedAt,
    UpdatedAt,
    /// Data field: (field name as given, JSON path)
    Field(String, String),
}

impl Key {
    fn parse(field: &str) -> Result<Self, StoreError> {
        match field {
            ID_FIELD => Ok(Key::Id),
            CREATED_AT_FIELD => Ok(Key::CreatedAt),
            UPDATED_AT_FIELD => Ok(Key::UpdatedAt),
            _ => Ok(Key::Field(field.to_string(), json_path(field)?)),
        }
    }

    fn name(&self) -> &str {
        match self {
            Key::Id => ID_FIELD,
            Key::CreatedAt => CREATED_AT_FIELD,
            Key::UpdatedAt => UPDATED_AT_FIELD,
            Key::Field(name, _) => name,
        }
    }

    fn push_expr(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Key::Id => {
                qb.push("id");
            }
            Key::CreatedAt => {
                qb.push("created_at");
            }
            Key::UpdatedAt => {
                qb.push("updated_at");
            }
            Key::Field(_, path) => {
                qb.push("json_extract(data, ");
                qb.push_bind(path.clone());
                qb.push(")");
            }
        }
    }

    /// Pushes a comparison operand typed the way `push_expr` yields it.
    fn push_value(&self, qb: &mut QueryBuilder<'_, Sqlite>, value: &Value) -> Result<(), StoreError> {
        match self {
            Key::Id => {
                let id = value.as_str().ok_or_else(|| {
                    StoreError::validation("Document id comparisons require a string")
                })?;
                qb.push_bind(id.to_string());
            }
            Key::CreatedAt | Key::UpdatedAt => {
                qb.push_bind(timestamp_micros(value)?);
            }
            Key::Field(_, _) => {
                qb.push("json_extract(");
                qb.push_bind(value.to_string());
                qb.push(", '$')");
            }
        }
        Ok(())
    }

    /// The key's value in a document, as carried by cursors.
    fn value_of(&self, doc: &RawDocument) -> Value {
        match self {
            Key::Id => Value::String(doc.id.clone()),
            Key::CreatedAt => Value::from(doc.created_at.timestamp_micros()),
            Key::UpdatedAt => Value::from(doc.updated_at.timestamp_micros()),
            Key::Field(name, _) => {
                let mut segments = name.split('.');
                let mut current = segments.next().and_then(|s| doc.fields.get(s));
                for segment in segments {
                    current = current.and_then(|v| v.get(segment));
                }
                current.cloned().unwrap_or(Value::Null)
            }
        }
    }
}

/// Accepts microseconds since the epoch or an RFC 3339 string.
fn timestamp_micros(value: &Value) -> Result<i64, StoreError> {
    if let Some(micros) = value.as_i64() {
        return Ok(micros);
    }
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.timestamp_micros())
        .ok_or_else(|| {
            StoreError::validation(format!(
                "Timestamp comparisons require microseconds or RFC 3339, got {}",
                value
            ))
        })
}

/// Opaque position in an ordered result set.
///
/// Carries the ordering it was produced under together with the last
/// document's key values, so it can only resume the same query shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    #[serde(rename = "o")]
    order: Vec<String>,
    #[serde(rename = "v")]
    values: Vec<Value>,
}

impl Cursor {
    /// Encodes the cursor as a URL-safe token.
    pub fn token(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Decodes a token produced by [`Cursor::token`].
    pub fn parse(token: &str) -> Result<Self, StoreError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| StoreError::validation("Malformed pagination cursor"))?;
        serde_json::from_slice(&bytes)
            .map_err(|_| StoreError::validation("Malformed pagination cursor"))
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.token())
    }
}

impl FromStr for Cursor {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Cursor::parse(s)
    }
}

/// Cursors travel as their token string in JSON and query strings.
pub mod cursor_token {
    use super::*;

    pub fn serialize<S: Serializer>(cursor: &Option<Cursor>, s: S) -> Result<S::Ok, S::Error> {
        match cursor {
            Some(c) => s.serialize_some(&c.token()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Cursor>, D::Error> {
        let token: Option<String> = Option::deserialize(d)?;
        token
            .filter(|t| !t.is_empty())
            .map(|t| Cursor::parse(&t).map_err(serde::de::Error::custom))
            .transpose()
    }
}

/// A compiled constraint list, ready to run against one collection.
#[derive(Debug, Clone, Default)]
pub struct Query {
    filters: Vec<(Key, FilterOp, Value)>,
    orderings: Vec<(Key, Direction)>,
    limit: Option<usize>,
    start_after: Option<Cursor>,
}

impl Query {
    /// Resolves field paths and operands. A later `Limit` or
    /// `StartAfter` replaces an earlier one.
    pub fn compile(constraints: &[Constraint]) -> Result<Self, StoreError> {
        let mut query = Query::default();

        for constraint in constraints {
            match constraint {
                Constraint::Where { field, op, value } => {
                    let key = Key::parse(field)?;
                    if value.is_null() {
                        if !matches!(op, FilterOp::Eq | FilterOp::NotEq) {
                            return Err(StoreError::validation(format!(
                                "Only == and != may compare {} with null",
                                field
                            )));
                        }
                        if !matches!(key, Key::Field(..)) {
                            return Err(StoreError::validation(format!(
                                "{} is never null",
                                field
                            )));
                        }
                    } else {
                        match &key {
                            Key::Id if !value.is_string() => {
                                return Err(StoreError::validation(
                                    "Document id comparisons require a string",
                                ))
                            }
                            Key::CreatedAt | Key::UpdatedAt => {
                                timestamp_micros(value)?;
                            }
                            _ => {}
                        }
                    }
                    query.filters.push((key, *op, value.clone()));
                }
                Constraint::OrderBy { field, direction } => {
                    query.orderings.push((Key::parse(field)?, *direction));
                }
                Constraint::Limit(n) => query.limit = Some(*n),
                Constraint::StartAfter(cursor) => query.start_after = Some(cursor.clone()),
            }
        }

        // Ties always resolve by id so positions are stable
        if !query.orderings.iter().any(|(key, _)| *key == Key::Id) {
            query.orderings.push((Key::Id, Direction::Asc));
        }

        Ok(query)
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_start_after(mut self, cursor: Option<Cursor>) -> Self {
        if cursor.is_some() {
            self.start_after = cursor;
        }
        self
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    fn signature(&self) -> Vec<String> {
        self.orderings
            .iter()
            .map(|(key, direction)| format!("{} {}", key.name(), direction))
            .collect()
    }

    /// Cursor positioned just after `doc` under this query's ordering.
    pub fn cursor_after(&self, doc: &RawDocument) -> Cursor {
        Cursor {
            order: self.signature(),
            values: self
                .orderings
                .iter()
                .map(|(key, _)| key.value_of(doc))
                .collect(),
        }
    }

    /// Appends the WHERE tail, ORDER BY and LIMIT clauses.
    ///
    /// Expects `qb` to end inside a WHERE clause (conditions are joined
    /// with AND).
    pub fn push_sql(&self, qb: &mut QueryBuilder<'_, Sqlite>) -> Result<(), StoreError> {
        for (key, op, value) in &self.filters {
            qb.push(" AND ");
            match (key, value) {
                (Key::Field(_, path), Value::Null) => {
                    qb.push("json_type(data, ");
                    qb.push_bind(path.clone());
                    if *op == FilterOp::Eq {
                        qb.push(") = 'null'");
                    } else {
                        qb.push(") IS NOT NULL AND json_type(data, ");
                        qb.push_bind(path.clone());
                        qb.push(") != 'null'");
                    }
                }
                _ => {
                    key.push_expr(qb);
                    qb.push(op.sql());
                    key.push_value(qb, value)?;
                }
            }
        }

        // Ordering by a field drops documents without it
        for (key, _) in &self.orderings {
            if let Key::Field(..) = key {
                qb.push(" AND ");
                key.push_expr(qb);
                qb.push(" IS NOT NULL");
            }
        }

        if let Some(cursor) = &self.start_after {
            self.push_cursor(qb, cursor)?;
        }

        qb.push(" ORDER BY ");
        for (i, (key, direction)) in self.orderings.iter().enumerate() {
            if i > 0 {
                qb.push(", ");
            }
            key.push_expr(qb);
            qb.push(direction.sql());
        }

        if let Some(limit) = self.limit {
            qb.push(" LIMIT ");
            qb.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        Ok(())
    }

    /// Keyset predicate: (k1 > v1) OR (k1 = v1 AND k2 > v2) OR ...
    fn push_cursor(&self, qb: &mut QueryBuilder<'_, Sqlite>, cursor: &Cursor) -> Result<(), StoreError> {
        if cursor.order != self.signature() || cursor.values.len() != self.orderings.len() {
            return Err(StoreError::validation(
                "Cursor was produced by a query with a different ordering",
            ));
        }

        qb.push(" AND (");
        for i in 0..self.orderings.len() {
            if i > 0 {
                qb.push(" OR ");
            }
            qb.push("(");
            for j in 0..i {
                let (key, _) = &self.orderings[j];
                key.push_expr(qb);
                qb.push(" = ");
                key.push_value(qb, &cursor.values[j])?;
                qb.push(" AND ");
            }
            let (key, direction) = &self.orderings[i];
            key.push_expr(qb);
            qb.push(direction.after());
            key.push_value(qb, &cursor.values[i])?;
            qb.push(")");
        }
        qb.push(")");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn doc(id: &str, fields: Value) -> RawDocument {
        RawDocument {
            id: id.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            fields: fields.as_object().cloned().unwrap_or_default(),
        }
    }

    #[test]
    fn test_json_path_validation() {
        assert_eq!(json_path("userId").unwrap(), "$.userId");
        assert_eq!(json_path("address.city").unwrap(), "$.address.city");
        assert!(json_path("").is_err());
        assert!(json_path("a..b").is_err());
        assert!(json_path("name') OR 1=1 --").is_err());
    }

    #[test]
    fn test_compile_appends_id_tiebreak() {
        let query = Query::compile(&[Constraint::order_by("createdAt", Direction::Desc)]).unwrap();
        assert_eq!(query.signature(), vec!["createdAt desc", "__id__ asc"]);
    }

    #[test]
    fn test_compile_last_limit_wins() {
        let query = Query::compile(&[Constraint::limit(5), Constraint::limit(2)]).unwrap();
        assert_eq!(query.limit(), Some(2));
    }

    #[test]
    fn test_compile_rejects_null_range() {
        let err = Query::compile(&[Constraint::filter("x", FilterOp::Lt, Value::Null)]).unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }

    #[test]
    fn test_compile_rejects_bad_timestamp() {
        let result = Query::compile(&[Constraint::filter("createdAt", FilterOp::Gt, "yesterday")]);
        assert!(result.is_err());

        let result = Query::compile(&[Constraint::filter(
            "createdAt",
            FilterOp::Gt,
            "2024-01-01T00:00:00Z",
        )]);
        assert!(result.is_ok());
    }

    #[test]
    fn test_sql_shape() {
        let query = Query::compile(&[
            Constraint::eq("userId", "u1"),
            Constraint::order_by("title", Direction::Asc),
            Constraint::limit(10),
        ])
        .unwrap();

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM documents WHERE collection = ");
        qb.push_bind("todos");
        query.push_sql(&mut qb).unwrap();

        let sql = qb.sql();
        assert!(sql.contains("json_extract(data, ?) = json_extract(?, '$')"));
        assert!(sql.contains("IS NOT NULL"));
        assert!(sql.contains("ORDER BY json_extract(data, ?) ASC, id ASC"));
        assert!(sql.ends_with("LIMIT ?"));
    }

    #[test]
    fn test_cursor_token_round_trip_and_values() {
        let query = Query::compile(&[Constraint::order_by("rank", Direction::Desc)]).unwrap();
        let cursor = query.cursor_after(&doc("d1", json!({"rank": 3})));

        assert_eq!(cursor.values, vec![json!(3), json!("d1")]);
        let parsed: Cursor = cursor.token().parse().unwrap();
        assert_eq!(parsed, cursor);
    }

    #[test]
    fn test_cursor_nested_field_value() {
        let query = Query::compile(&[Constraint::order_by("meta.rank", Direction::Asc)]).unwrap();
        let cursor = query.cursor_after(&doc("d1", json!({"meta": {"rank": 7}})));
        assert_eq!(cursor.values[0], json!(7));
    }

    #[test]
    fn test_cursor_from_other_ordering_rejected() {
        let by_title = Query::compile(&[Constraint::order_by("title", Direction::Asc)]).unwrap();
        let cursor = by_title.cursor_after(&doc("d1", json!({"title": "a"})));

        let by_rank = Query::compile(&[
            Constraint::order_by("rank", Direction::Asc),
            Constraint::start_after(cursor),
        ])
        .unwrap();

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id FROM documents WHERE 1 = 1");
        assert!(by_rank.push_sql(&mut qb).is_err());
    }

    #[test]
    fn test_malformed_cursor_token() {
        assert!(Cursor::parse("not a cursor!").is_err());
        assert!(Cursor::parse(&URL_SAFE_NO_PAD.encode(b"[1,2]")).is_err());
    }
}
