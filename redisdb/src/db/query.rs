//! Database queries and in-memory evaluation
//!
//! Redis has no secondary indexes, so queries are evaluated in memory over
//! records loaded from a table. Records are compared through their JSON form.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Filter operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    /// Field equals value
    Eq,
    /// Field differs from value
    Ne,
    /// Field is less than value
    Lt,
    /// Field is less than or equal to value
    Lte,
    /// Field is greater than value
    Gt,
    /// Field is greater than or equal to value
    Gte,
    /// Field equals one of the values of an array
    In,
    /// Field equals none of the values of an array
    NotIn,
    /// Field is an array containing value
    ArrayContains,
}

/// Single field filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    /// Field name; dots address nested fields (`address.city`)
    pub field: String,
    /// Operator
    pub op: FilterOp,
    /// Value to compare against
    pub value: Value,
}

/// Sort order on a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Field name
    pub field: String,
    /// Sort descending
    pub descending: bool,
}

/// Query over a single table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbQuery {
    /// Table name
    pub table: String,
    /// Filters, all of which must match
    pub filters: Vec<Filter>,
    /// Sort orders, applied in sequence
    pub orders: Vec<Order>,
    /// Maximum number of results, zero meaning unlimited
    pub limit: Option<usize>,
    /// Number of leading results to skip
    pub offset: usize,
}

impl DbQuery {
    /// Query matching every record of a table
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            filters: Vec::new(),
            orders: Vec::new(),
            limit: None,
            offset: 0,
        }
    }

    /// Add a filter
    #[must_use]
    pub fn filter(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.into(),
            op,
            value: value.into(),
        });
        self
    }

    /// Add an equality filter
    #[must_use]
    pub fn filter_eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, FilterOp::Eq, value)
    }

    /// Add a sort order
    #[must_use]
    pub fn order(mut self, field: impl Into<String>, descending: bool) -> Self {
        self.orders.push(Order {
            field: field.into(),
            descending,
        });
        self
    }

    /// Limit the number of results (zero means no limit)
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Skip leading results
    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Whether the query orders or pages its results
    pub fn has_paging(&self) -> bool {
        !self.orders.is_empty() || self.limit.is_some_and(|limit| limit > 0) || self.offset > 0
    }

    /// Check the query is well formed
    pub fn validate(&self) -> Result<()> {
        for filter in &self.filters {
            if matches!(filter.op, FilterOp::In | FilterOp::NotIn) && !filter.value.is_array() {
                return Err(Error::Validation(format!(
                    "Filter {:?} on '{}' needs an array value",
                    filter.op, filter.field
                )));
            }
        }
        Ok(())
    }

    fn matches(&self, row: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(row))
    }
}

impl Filter {
    fn matches(&self, row: &Value) -> bool {
        let field = lookup(row, &self.field);
        match self.op {
            FilterOp::Eq => values_equal(field, &self.value),
            FilterOp::Ne => !values_equal(field, &self.value),
            FilterOp::Lt => compare(field, &self.value) == Some(Ordering::Less),
            FilterOp::Lte => matches!(compare(field, &self.value), Some(Ordering::Less | Ordering::Equal)),
            FilterOp::Gt => compare(field, &self.value) == Some(Ordering::Greater),
            FilterOp::Gte => matches!(compare(field, &self.value), Some(Ordering::Greater | Ordering::Equal)),
            FilterOp::In => self
                .value
                .as_array()
                .is_some_and(|values| values.iter().any(|v| values_equal(field, v))),
            FilterOp::NotIn => self
                .value
                .as_array()
                .is_some_and(|values| !values.iter().any(|v| values_equal(field, v))),
            FilterOp::ArrayContains => field
                .as_array()
                .is_some_and(|items| items.iter().any(|v| values_equal(v, &self.value))),
        }
    }
}

/// Apply only the filters of a query
pub fn filter_in_memory<T: Serialize>(q: &DbQuery, rows: Vec<T>) -> Result<Vec<T>> {
    q.validate()?;
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        if q.matches(&serde_json::to_value(&row)?) {
            out.push(row);
        }
    }
    Ok(out)
}

/// Apply filters, orders, offset and limit of a query
pub fn query_in_memory<T: Serialize>(q: &DbQuery, rows: Vec<T>) -> Result<Vec<T>> {
    q.validate()?;

    let mut matched = Vec::with_capacity(rows.len());
    for row in rows {
        let json = serde_json::to_value(&row)?;
        if q.matches(&json) {
            matched.push((json, row));
        }
    }

    if !q.orders.is_empty() {
        matched.sort_by(|(a, _), (b, _)| {
            q.orders
                .iter()
                .map(|order| {
                    let ord = total_order(lookup(a, &order.field), lookup(b, &order.field));
                    if order.descending {
                        ord.reverse()
                    } else {
                        ord
                    }
                })
                .find(|ord| *ord != Ordering::Equal)
                .unwrap_or(Ordering::Equal)
        });
    }

    Ok(matched
        .into_iter()
        .skip(q.offset)
        .take(q.limit.filter(|limit| *limit > 0).unwrap_or(usize::MAX))
        .map(|(_, row)| row)
        .collect())
}

static NULL: Value = Value::Null;

fn lookup<'a>(row: &'a Value, field: &str) -> &'a Value {
    field
        .split('.')
        .try_fold(row, |value, part| value.get(part))
        .unwrap_or(&NULL)
}

fn values_equal(a: &Value, b: &Value) -> bool {
    a == b || compare(a, b) == Some(Ordering::Equal)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

fn type_rank(v: &Value) -> u8 {
    match v {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

// Missing fields read as null and sort first.
fn total_order(a: &Value, b: &Value) -> Ordering {
    compare(a, b).unwrap_or_else(|| type_rank(a).cmp(&type_rank(b)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Clone, PartialEq, Serialize)]
    struct Item {
        id: String,
        k1: String,
        even: bool,
        n: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        score: Option<f64>,
        tags: Vec<String>,
    }

    fn items() -> Vec<Item> {
        (1..=5)
            .map(|i| Item {
                id: format!("id{}", i),
                k1: format!("v{}", i),
                even: i % 2 == 0,
                n: i,
                score: (i != 3).then(|| i as f64 / 2.0),
                tags: if i % 2 == 0 { vec!["even".into()] } else { vec![] },
            })
            .collect()
    }

    fn ids(rows: &[Item]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_empty_query_returns_everything() {
        let rows = query_in_memory(&DbQuery::new("t"), items()).unwrap();
        assert_eq!(rows, items());
        assert!(!DbQuery::new("t").has_paging());
    }

    #[test]
    fn test_filters() {
        let q = DbQuery::new("t").filter_eq("even", true);
        assert_eq!(ids(&query_in_memory(&q, items()).unwrap()), vec!["id2", "id4"]);

        let q = DbQuery::new("t").filter("n", FilterOp::Gte, 3).filter("n", FilterOp::Lt, 5);
        assert_eq!(ids(&query_in_memory(&q, items()).unwrap()), vec!["id3", "id4"]);

        let q = DbQuery::new("t").filter("k1", FilterOp::In, json!(["v1", "v5", "nope"]));
        assert_eq!(ids(&query_in_memory(&q, items()).unwrap()), vec!["id1", "id5"]);

        let q = DbQuery::new("t").filter("k1", FilterOp::NotIn, json!(["v1", "v5"]));
        assert_eq!(ids(&query_in_memory(&q, items()).unwrap()), vec!["id2", "id3", "id4"]);

        let q = DbQuery::new("t").filter("tags", FilterOp::ArrayContains, "even");
        assert_eq!(ids(&query_in_memory(&q, items()).unwrap()), vec!["id2", "id4"]);

        let q = DbQuery::new("t").filter("k1", FilterOp::Ne, "v2");
        assert_eq!(query_in_memory(&q, items()).unwrap().len(), 4);
    }

    #[test]
    fn test_numbers_compare_across_representations() {
        let q = DbQuery::new("t").filter_eq("n", 2.0);
        assert_eq!(ids(&query_in_memory(&q, items()).unwrap()), vec!["id2"]);
    }

    #[test]
    fn test_missing_field_matches_null_only() {
        let q = DbQuery::new("t").filter_eq("score", Value::Null);
        assert_eq!(ids(&query_in_memory(&q, items()).unwrap()), vec!["id3"]);

        let q = DbQuery::new("t").filter("score", FilterOp::Gt, 0);
        assert_eq!(query_in_memory(&q, items()).unwrap().len(), 4);
    }

    #[test]
    fn test_nested_field() {
        let rows = vec![
            json!({"id": "a", "address": {"city": "Oslo"}}),
            json!({"id": "b", "address": {"city": "Rome"}}),
            json!({"id": "c"}),
        ];
        let q = DbQuery::new("t").filter_eq("address.city", "Rome");
        let out = query_in_memory(&q, rows).unwrap();
        assert_eq!(out, vec![json!({"id": "b", "address": {"city": "Rome"}})]);
    }

    #[test]
    fn test_order_offset_limit() {
        let q = DbQuery::new("t").order("n", true).offset(1).limit(2);
        assert!(q.has_paging());
        assert_eq!(ids(&query_in_memory(&q, items()).unwrap()), vec!["id4", "id3"]);

        let q = DbQuery::new("t").order("score", false);
        assert_eq!(
            ids(&query_in_memory(&q, items()).unwrap()),
            vec!["id3", "id1", "id2", "id4", "id5"]
        );

        let q = DbQuery::new("t").order("even", false).order("n", true);
        assert_eq!(
            ids(&query_in_memory(&q, items()).unwrap()),
            vec!["id5", "id3", "id1", "id4", "id2"]
        );
    }

    #[test]
    fn test_zero_limit_is_unlimited() {
        let q = DbQuery::new("t").limit(0);
        assert!(!q.has_paging());
        assert_eq!(query_in_memory(&q, items()).unwrap().len(), 5);

        let q = DbQuery::new("t").order("n", false).offset(3).limit(0);
        assert_eq!(ids(&query_in_memory(&q, items()).unwrap()), vec!["id4", "id5"]);
    }

    #[test]
    fn test_filter_in_memory_ignores_paging() {
        let q = DbQuery::new("t").filter_eq("even", false).order("n", true).limit(1);
        assert_eq!(ids(&filter_in_memory(&q, items()).unwrap()), vec!["id1", "id3", "id5"]);
    }

    #[test]
    fn test_in_needs_array() {
        let q = DbQuery::new("t").filter("k1", FilterOp::In, "v1");
        assert!(matches!(query_in_memory(&q, items()), Err(Error::Validation(_))));
        assert!(matches!(filter_in_memory(&q, items()), Err(Error::Validation(_))));
    }
}
