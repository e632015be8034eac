//! PostgREST query builder
//!
//! Builds filter chains in the shape used throughout the data services and
//! renders them to the PostgREST URL grammar. The same structure is
//! interpreted directly by [`InMemoryTables`](super::InMemoryTables).

use serde_json::Value;

/// A single filter clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(String, Value),
    Neq(String, Value),
    In(String, Vec<Value>),
    /// Array column shares at least one element with the list.
    Overlaps(String, Vec<String>),
    /// Case-insensitive LIKE; `%` is the wildcard.
    ILike(String, String),
    /// Any of the (column, pattern) ILIKE terms matches.
    OrILike(Vec<(String, String)>),
    IsNull(String),
    NotNull(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub column: String,
    pub ascending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    pub table: String,
    pub columns: String,
    pub filters: Vec<Filter>,
    pub orders: Vec<Order>,
    pub limit: Option<usize>,
    /// Expect exactly one row (PostgREST object response).
    pub single: bool,
}

impl TableQuery {
    pub fn table(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: "*".to_string(),
            filters: Vec::new(),
            orders: Vec::new(),
            limit: None,
            single: false,
        }
    }

    pub fn select(mut self, columns: impl Into<String>) -> Self {
        self.columns = columns.into();
        self
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Eq(column.into(), value.into()));
        self
    }

    pub fn neq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::Neq(column.into(), value.into()));
        self
    }

    pub fn in_list<V: Into<Value>>(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.filters.push(Filter::In(
            column.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn overlaps<S: Into<String>>(
        mut self,
        column: impl Into<String>,
        values: impl IntoIterator<Item = S>,
    ) -> Self {
        self.filters.push(Filter::Overlaps(
            column.into(),
            values.into_iter().map(Into::into).collect(),
        ));
        self
    }

    pub fn ilike(mut self, column: impl Into<String>, pattern: impl Into<String>) -> Self {
        self.filters.push(Filter::ILike(column.into(), pattern.into()));
        self
    }

    /// `or` over `column ILIKE %term%` for every listed column.
    pub fn or_ilike_contains(mut self, columns: &[&str], term: &str) -> Self {
        let pattern = format!("%{}%", term);
        self.filters.push(Filter::OrILike(
            columns
                .iter()
                .map(|c| (c.to_string(), pattern.clone()))
                .collect(),
        ));
        self
    }

    pub fn is_null(mut self, column: impl Into<String>) -> Self {
        self.filters.push(Filter::IsNull(column.into()));
        self
    }

    pub fn not_null(mut self, column: impl Into<String>) -> Self {
        self.filters.push(Filter::NotNull(column.into()));
        self
    }

    pub fn order(mut self, column: impl Into<String>, ascending: bool) -> Self {
        self.orders.push(Order {
            column: column.into(),
            ascending,
        });
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn single(mut self) -> Self {
        self.single = true;
        self
    }

    /// Query-string pairs (unencoded) in PostgREST grammar.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("select".to_string(), self.columns.clone())];

        for filter in &self.filters {
            params.push(render_filter(filter));
        }

        if !self.orders.is_empty() {
            let order = self
                .orders
                .iter()
                .map(|o| format!("{}.{}", o.column, if o.ascending { "asc" } else { "desc" }))
                .collect::<Vec<_>>()
                .join(",");
            params.push(("order".to_string(), order));
        }

        if let Some(limit) = self.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        params
    }

    /// Filter-only pairs, used for PATCH and DELETE where `select` is implied.
    pub fn filter_params(&self) -> Vec<(String, String)> {
        self.filters.iter().map(render_filter).collect()
    }

    /// Human-readable form for logs and assertions.
    pub fn to_query_string(&self) -> String {
        self.to_params()
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    }
}

fn render_filter(filter: &Filter) -> (String, String) {
    match filter {
        Filter::Eq(col, v) => (col.clone(), format!("eq.{}", render_value(v))),
        Filter::Neq(col, v) => (col.clone(), format!("neq.{}", render_value(v))),
        Filter::In(col, values) => {
            let list = values
                .iter()
                .map(|v| quote_list_item(&render_value(v)))
                .collect::<Vec<_>>()
                .join(",");
            (col.clone(), format!("in.({})", list))
        }
        Filter::Overlaps(col, values) => {
            let list = values
                .iter()
                .map(|v| quote_list_item(v))
                .collect::<Vec<_>>()
                .join(",");
            (col.clone(), format!("ov.{{{}}}", list))
        }
        Filter::ILike(col, pattern) => (col.clone(), format!("ilike.{}", url_wildcards(pattern))),
        Filter::OrILike(terms) => {
            let inner = terms
                .iter()
                .map(|(col, pattern)| {
                    format!("{}.ilike.{}", col, quote_list_item(&url_wildcards(pattern)))
                })
                .collect::<Vec<_>>()
                .join(",");
            ("or".to_string(), format!("({})", inner))
        }
        Filter::IsNull(col) => (col.clone(), "is.null".to_string()),
        Filter::NotNull(col) => (col.clone(), "not.is.null".to_string()),
    }
}

/// Scalar JSON rendered the way PostgREST expects it in a filter.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

// PostgREST accepts `*` in place of `%`, which avoids percent-encoding noise
fn url_wildcards(pattern: &str) -> String {
    pattern.replace('%', "*")
}

fn quote_list_item(item: &str) -> String {
    if item.contains([',', '(', ')', '{', '}', '"', ' ']) {
        format!("\"{}\"", item.replace('"', "\\\""))
    } else {
        item.to_string()
    }
}
