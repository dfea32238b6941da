//! Query evaluation over content tables.
//!
//! Filters use a key-suffix grammar: `views_gt: 10` keeps records whose
//! `views` field is greater than 10. Supported suffixes are `_gt`, `_gte`,
//! `_lt`, `_lte`, `_not`, `_like` and `_ilike`; a key without suffix tests
//! equality. Dotted field names address nested objects (`author.name`).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Options accepted by [`ContentStore::query`](crate::ContentStore::query).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryOptions {
    /// Field filters, AND-combined.
    #[serde(rename = "where")]
    pub filter: Map<String, Value>,

    /// Comma or space separated sort fields and modifiers.
    pub order_by: Option<String>,

    pub limit: Option<usize>,

    pub offset: usize,

    /// Return the number of matching rows instead of the rows.
    pub count: bool,
}

impl QueryOptions {
    /// Create empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter.
    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn order_by(mut self, order: impl Into<String>) -> Self {
        self.order_by = Some(order.into());
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn count(mut self) -> Self {
        self.count = true;
        self
    }
}

/// Result of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    Rows(Vec<Value>),
    Count(usize),
}

/// Comparison operator selected by a filter key suffix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
    Not,
    Like,
    ILike,
}

impl Operator {
    /// Split a filter key into the field name and its operator.
    pub fn parse_key(key: &str) -> (&str, Self) {
        // Longer suffixes first so `_gte` is not read as `_gt`.
        const SUFFIXES: [(&str, Operator); 7] = [
            ("_gte", Operator::Gte),
            ("_lte", Operator::Lte),
            ("_gt", Operator::Gt),
            ("_lt", Operator::Lt),
            ("_not", Operator::Not),
            ("_ilike", Operator::ILike),
            ("_like", Operator::Like),
        ];

        for (suffix, op) in SUFFIXES {
            if let Some(field) = key.strip_suffix(suffix)
                && !field.is_empty()
            {
                return (field, op);
            }
        }
        (key, Operator::Eq)
    }

    /// Test a record field against the filter value. Missing or null fields
    /// never match.
    pub fn matches(&self, field: Option<&Value>, expected: &Value) -> bool {
        let Some(field) = field.filter(|v| !v.is_null()) else {
            return false;
        };
        if expected.is_null() {
            return false;
        }

        match self {
            Self::Like => like(&pattern_text(expected), &pattern_text(field), false),
            Self::ILike => like(&pattern_text(expected), &pattern_text(field), true),
            Self::Eq => compare_values(field, expected) == Ordering::Equal,
            Self::Not => compare_values(field, expected) != Ordering::Equal,
            Self::Gt => compare_values(field, expected) == Ordering::Greater,
            Self::Gte => compare_values(field, expected) != Ordering::Less,
            Self::Lt => compare_values(field, expected) == Ordering::Less,
            Self::Lte => compare_values(field, expected) != Ordering::Greater,
        }
    }
}

/// Look up a dotted field path in a record.
pub fn field<'a>(record: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(record, |value, key| match value {
            Value::Object(map) => map.get(key),
            Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

/// A single sort key parsed from `order_by`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
    /// `None` keeps the default: nulls first ascending, last descending.
    pub nulls_first: Option<bool>,
}

/// Parse an `order_by` string.
///
/// `asc`, `desc`, `nulls`, `first` and `last` modify the preceding field;
/// every other token names a field.
pub fn parse_order_by(order_by: &str) -> Vec<SortKey> {
    let mut keys: Vec<SortKey> = Vec::new();
    let mut pending_nulls = false;

    for token in order_by
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let lower = token.to_ascii_lowercase();
        let is_modifier = matches!(lower.as_str(), "asc" | "desc" | "nulls" | "first" | "last");

        match keys.last_mut() {
            Some(key) if is_modifier => match lower.as_str() {
                "asc" => key.descending = false,
                "desc" => key.descending = true,
                "nulls" => pending_nulls = true,
                "first" if pending_nulls => key.nulls_first = Some(true),
                "last" if pending_nulls => key.nulls_first = Some(false),
                _ => {}
            },
            // A modifier before any field has nothing to apply to.
            None if is_modifier => {}
            _ => {
                pending_nulls = false;
                keys.push(SortKey {
                    field: token.to_string(),
                    descending: false,
                    nulls_first: None,
                });
            }
        }
    }

    keys
}

/// Run filters, ordering and pagination over a table's rows.
pub fn execute(rows: &[Value], options: &QueryOptions) -> QueryResult {
    let predicates: Vec<(&str, Operator, &Value)> = options
        .filter
        .iter()
        .map(|(key, expected)| {
            let (name, op) = Operator::parse_key(key);
            (name, op, expected)
        })
        .collect();

    let mut matched: Vec<&Value> = rows
        .iter()
        .filter(|row| {
            predicates
                .iter()
                .all(|(name, op, expected)| op.matches(field(row, name), expected))
        })
        .collect();

    if options.count {
        let total = matched.len().saturating_sub(options.offset);
        return QueryResult::Count(options.limit.map_or(total, |l| total.min(l)));
    }

    if let Some(order_by) = options.order_by.as_deref() {
        let keys = parse_order_by(order_by);
        if !keys.is_empty() {
            matched.sort_by(|a, b| compare_rows(a, b, &keys));
        }
    }

    let rows = matched
        .into_iter()
        .skip(options.offset)
        .take(options.limit.unwrap_or(usize::MAX))
        .cloned()
        .collect();

    QueryResult::Rows(rows)
}

fn compare_rows(a: &Value, b: &Value, keys: &[SortKey]) -> Ordering {
    for key in keys {
        let left = field(a, &key.field).filter(|v| !v.is_null());
        let right = field(b, &key.field).filter(|v| !v.is_null());
        let nulls_first = key.nulls_first.unwrap_or(!key.descending);

        let ordering = match (left, right) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) if nulls_first => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) if nulls_first => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(l), Some(r)) => {
                let ordering = compare_values(l, r);
                if key.descending {
                    ordering.reverse()
                } else {
                    ordering
                }
            }
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Total order over JSON values: numbers (booleans as 0/1) sort before
/// strings, strings before composite values compared by their JSON text.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (numeric(a), numeric(b)) {
        (Some(x), Some(y)) => return x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => return Ordering::Less,
        (None, Some(_)) => return Ordering::Greater,
        (None, None) => {}
    }

    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::String(_), _) => Ordering::Less,
        (_, Value::String(_)) => Ordering::Greater,
        _ => a.to_string().cmp(&b.to_string()),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn pattern_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// SQL `LIKE`: `%` matches any run of characters, `_` exactly one.
pub fn like(pattern: &str, text: &str, case_insensitive: bool) -> bool {
    let (pattern, text) = if case_insensitive {
        (pattern.to_lowercase(), text.to_lowercase())
    } else {
        (pattern.to_string(), text.to_string())
    };
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if let Some((star, matched)) = backtrack {
            pi = star + 1;
            ti = matched + 1;
            backtrack = Some((star, matched + 1));
        } else {
            return false;
        }
    }

    p[pi..].iter().all(|&c| c == '%')
}
