//! In-process table store with PostgREST filter semantics.
//!
//! Backs the unit and router tests, and can stand in for Supabase when
//! running the service offline.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use super::query::{render_value, Filter, Order};
use super::{TableClient, TableQuery};
use crate::error::{ApiError, ApiResult};

#[derive(Clone, Default)]
pub struct InMemoryTables {
    tables: Arc<RwLock<HashMap<String, Vec<Value>>>>,
    expired_tokens: Arc<RwLock<HashSet<String>>>,
    token: Option<String>,
}

impl InMemoryTables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        self.tables
            .write()
            .entry(table.to_string())
            .or_default()
            .extend(rows);
    }

    /// Raw contents of a table, ignoring every filter.
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables.read().get(table).cloned().unwrap_or_default()
    }

    pub fn find_by_id(&self, table: &str, id: &str) -> Option<Value> {
        self.rows(table)
            .into_iter()
            .find(|row| row.get("id").and_then(Value::as_str) == Some(id))
    }

    /// Requests bound to `token` fail as PostgREST does for an expired JWT.
    pub fn expire_token(&self, token: &str) {
        self.expired_tokens.write().insert(token.to_string());
    }

    fn check_session(&self) -> ApiResult<()> {
        match &self.token {
            Some(token) if self.expired_tokens.read().contains(token) => {
                Err(ApiError::SessionExpired("JWT expired".to_string()))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl TableClient for InMemoryTables {
    async fn select(&self, query: &TableQuery) -> ApiResult<Vec<Value>> {
        self.check_session()?;

        let mut rows: Vec<Value> = self
            .rows(&query.table)
            .into_iter()
            .filter(|row| query.filters.iter().all(|f| matches_filter(row, f)))
            .collect();

        sort_rows(&mut rows, &query.orders);

        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }

        if query.single && rows.len() != 1 {
            return Err(ApiError::NotFound(format!(
                "JSON object requested, multiple (or no) rows returned ({})",
                rows.len()
            )));
        }

        Ok(rows
            .into_iter()
            .map(|row| project_columns(row, &query.columns))
            .collect())
    }

    async fn insert(&self, table: &str, rows: Vec<Value>) -> ApiResult<Vec<Value>> {
        self.check_session()?;

        let now = Value::String(Utc::now().to_rfc3339());
        let mut inserted = Vec::with_capacity(rows.len());

        for row in rows {
            let mut obj = match row {
                Value::Object(obj) => obj,
                _ => return Err(ApiError::bad_request("Rows must be JSON objects")),
            };
            if !obj.get("id").map_or(false, |v| !v.is_null()) {
                obj.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
            }
            obj.entry("created_at").or_insert_with(|| now.clone());
            obj.entry("updated_at").or_insert_with(|| now.clone());
            inserted.push(Value::Object(obj));
        }

        self.seed(table, inserted.clone());
        Ok(inserted)
    }

    async fn update(&self, query: &TableQuery, patch: Value) -> ApiResult<Vec<Value>> {
        self.check_session()?;

        let patch = match patch {
            Value::Object(obj) => obj,
            _ => return Err(ApiError::bad_request("Patch must be a JSON object")),
        };

        let mut tables = self.tables.write();
        let rows = tables.entry(query.table.clone()).or_default();
        let mut updated = Vec::new();

        for row in rows.iter_mut() {
            if query.filters.iter().all(|f| matches_filter(row, f)) {
                if let Value::Object(obj) = &mut *row {
                    for (k, v) in &patch {
                        obj.insert(k.clone(), v.clone());
                    }
                }
                updated.push(row.clone());
            }
        }

        Ok(updated)
    }

    async fn delete(&self, query: &TableQuery) -> ApiResult<Vec<Value>> {
        self.check_session()?;

        let mut tables = self.tables.write();
        let rows = tables.entry(query.table.clone()).or_default();
        let (removed, kept): (Vec<Value>, Vec<Value>) = rows
            .drain(..)
            .partition(|row| query.filters.iter().all(|f| matches_filter(row, f)));
        *rows = kept;

        Ok(removed)
    }

    fn with_token(&self, token: &str) -> Arc<dyn TableClient> {
        let mut client = self.clone();
        client.token = Some(token.to_string());
        Arc::new(client)
    }
}

static NULL: Value = Value::Null;

fn field<'a>(row: &'a Value, column: &str) -> &'a Value {
    row.get(column).unwrap_or(&NULL)
}

fn matches_filter(row: &Value, filter: &Filter) -> bool {
    match filter {
        Filter::Eq(col, v) => {
            let actual = field(row, col);
            !actual.is_null() && render_value(actual) == render_value(v)
        }
        Filter::Neq(col, v) => {
            let actual = field(row, col);
            !actual.is_null() && render_value(actual) != render_value(v)
        }
        Filter::In(col, values) => {
            let actual = field(row, col);
            !actual.is_null() && values.iter().any(|v| render_value(v) == render_value(actual))
        }
        Filter::Overlaps(col, values) => match field(row, col) {
            Value::Array(items) => items
                .iter()
                .any(|item| values.iter().any(|v| render_value(item) == *v)),
            _ => false,
        },
        Filter::ILike(col, pattern) => match field(row, col) {
            Value::String(s) => ilike(s, pattern),
            _ => false,
        },
        Filter::OrILike(terms) => terms.iter().any(|(col, pattern)| match field(row, col) {
            Value::String(s) => ilike(s, pattern),
            _ => false,
        }),
        Filter::IsNull(col) => field(row, col).is_null(),
        Filter::NotNull(col) => !field(row, col).is_null(),
    }
}

/// SQL ILIKE with `%` wildcards.
fn ilike(text: &str, pattern: &str) -> bool {
    let text = text.to_lowercase();
    let pattern = pattern.to_lowercase();
    let parts: Vec<&str> = pattern.split('%').collect();

    if parts.len() == 1 {
        return text == pattern;
    }

    let first = parts[0];
    let last = parts[parts.len() - 1];
    if !text.starts_with(first) || !text[first.len()..].ends_with(last) {
        return false;
    }

    let mut rest = &text[first.len()..text.len() - last.len()];
    for part in &parts[1..parts.len() - 1] {
        match rest.find(part) {
            Some(pos) => rest = &rest[pos + part.len()..],
            None => return false,
        }
    }
    true
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        // nulls sort last
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => render_value(a).cmp(&render_value(b)),
    }
}

fn sort_rows(rows: &mut [Value], orders: &[Order]) {
    if orders.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for order in orders {
            let (x, y) = (field(a, &order.column), field(b, &order.column));
            let ord = match (x.is_null(), y.is_null()) {
                (false, false) if !order.ascending => compare_values(y, x),
                _ => compare_values(x, y),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn project_columns(row: Value, columns: &str) -> Value {
    if columns.trim() == "*" {
        return row;
    }
    let mut projected = Map::new();
    for col in columns.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        projected.insert(col.to_string(), field(&row, col).clone());
    }
    Value::Object(projected)
}
