use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::{QueryError, Result};
use crate::types::CompositePrimaryKey;

/// Sort key condition for queries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortCondition {
    Eq(String),
    Lt(String),
    Le(String),
    Gt(String),
    Ge(String),
    /// Inclusive on both ends.
    Between(String, String),
    BeginsWith(String),
}

impl SortCondition {
    /// Test `sort_key` using plain byte order.
    pub fn matches(&self, sort_key: &str) -> bool {
        self.matches_with(sort_key, &|a: &str, b: &str| a.cmp(b))
    }

    /// Test `sort_key` using the table's sort comparator. `BeginsWith` is
    /// always a plain string prefix test.
    pub fn matches_with(&self, sort_key: &str, cmp: &dyn Fn(&str, &str) -> Ordering) -> bool {
        match self {
            SortCondition::Eq(v) => cmp(sort_key, v) == Ordering::Equal,
            SortCondition::Lt(v) => cmp(sort_key, v) == Ordering::Less,
            SortCondition::Le(v) => cmp(sort_key, v) != Ordering::Greater,
            SortCondition::Gt(v) => cmp(sort_key, v) == Ordering::Greater,
            SortCondition::Ge(v) => cmp(sort_key, v) != Ordering::Less,
            SortCondition::Between(lo, hi) => {
                cmp(sort_key, lo) != Ordering::Less && cmp(sort_key, hi) != Ordering::Greater
            }
            SortCondition::BeginsWith(prefix) => sort_key.starts_with(prefix.as_str()),
        }
    }
}

/// Parameters of a single-partition query.
///
/// ```
/// use optidyn_core::api::QueryInput;
///
/// let input = QueryInput::new("orders#42")
///     .sort_key_begins_with("20")
///     .scan_forward(false)
///     .limit(1);
/// assert_eq!(input.limit_value(), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInput {
    partition_key: String,
    sort_condition: Option<SortCondition>,
    limit: Option<usize>,
    scan_forward: bool,
    exclusive_start_key: Option<String>,
}

impl QueryInput {
    pub fn new(partition_key: impl Into<String>) -> Self {
        Self {
            partition_key: partition_key.into(),
            sort_condition: None,
            limit: None,
            scan_forward: true,
            exclusive_start_key: None,
        }
    }

    pub fn sort_key_eq(self, value: impl Into<String>) -> Self {
        self.sort_condition(SortCondition::Eq(value.into()))
    }

    pub fn sort_key_lt(self, value: impl Into<String>) -> Self {
        self.sort_condition(SortCondition::Lt(value.into()))
    }

    pub fn sort_key_le(self, value: impl Into<String>) -> Self {
        self.sort_condition(SortCondition::Le(value.into()))
    }

    pub fn sort_key_gt(self, value: impl Into<String>) -> Self {
        self.sort_condition(SortCondition::Gt(value.into()))
    }

    pub fn sort_key_ge(self, value: impl Into<String>) -> Self {
        self.sort_condition(SortCondition::Ge(value.into()))
    }

    pub fn sort_key_between(self, low: impl Into<String>, high: impl Into<String>) -> Self {
        self.sort_condition(SortCondition::Between(low.into(), high.into()))
    }

    pub fn sort_key_begins_with(self, prefix: impl Into<String>) -> Self {
        self.sort_condition(SortCondition::BeginsWith(prefix.into()))
    }

    pub fn sort_condition(mut self, condition: SortCondition) -> Self {
        self.sort_condition = Some(condition);
        self
    }

    /// Maximum number of items per page. Zero is rejected when the query runs.
    pub fn limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    /// Ascending when true (the default), descending otherwise.
    pub fn scan_forward(mut self, forward: bool) -> Self {
        self.scan_forward = forward;
        self
    }

    /// Resume after the position named by a previous page's `last_evaluated_key`.
    pub fn exclusive_start_key(mut self, cursor: impl Into<String>) -> Self {
        self.exclusive_start_key = Some(cursor.into());
        self
    }

    pub fn partition_key(&self) -> &str {
        &self.partition_key
    }

    pub fn condition(&self) -> Option<&SortCondition> {
        self.sort_condition.as_ref()
    }

    pub fn limit_value(&self) -> Option<usize> {
        self.limit
    }

    pub fn is_forward(&self) -> bool {
        self.scan_forward
    }

    pub fn cursor(&self) -> Option<&str> {
        self.exclusive_start_key.as_deref()
    }

    /// Same query, resumed from `cursor` (or from the start when `None`).
    pub(crate) fn resume_from(&self, cursor: Option<String>) -> Self {
        Self {
            exclusive_start_key: cursor,
            ..self.clone()
        }
    }

    /// Rejects a zero limit and decodes the cursor, checking it belongs to
    /// this partition.
    pub fn validate(&self) -> Result<Option<CompositePrimaryKey>> {
        if self.limit == Some(0) {
            return Err(QueryError::InvalidLimit.into());
        }
        let Some(raw) = &self.exclusive_start_key else {
            return Ok(None);
        };
        let key = decode_cursor(raw)?;
        if key.partition_key != self.partition_key {
            return Err(QueryError::InvalidCursor(format!(
                "cursor belongs to partition '{}', query is for '{}'",
                key.partition_key, self.partition_key
            ))
            .into());
        }
        Ok(Some(key))
    }
}

/// One page of query results.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPage<T> {
    pub items: Vec<T>,
    /// Present only when more matching items remain.
    pub last_evaluated_key: Option<String>,
}

impl<T> QueryPage<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            last_evaluated_key: None,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> QueryPage<U> {
        QueryPage {
            items: self.items.into_iter().map(f).collect(),
            last_evaluated_key: self.last_evaluated_key,
        }
    }

    pub fn try_map<U>(self, f: impl FnMut(T) -> Result<U>) -> Result<QueryPage<U>> {
        Ok(QueryPage {
            items: self.items.into_iter().map(f).collect::<Result<_>>()?,
            last_evaluated_key: self.last_evaluated_key,
        })
    }
}

// ---------------------------------------------------------------------------
// Cursor encoding
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct CursorKey {
    #[serde(rename = "PK")]
    partition_key: String,
    #[serde(rename = "SK")]
    sort_key: String,
}

/// `{"PK": .., "SK": ..}` as a JSON string.
pub fn encode_cursor(key: &CompositePrimaryKey) -> Result<String> {
    serde_json::to_string(&CursorKey {
        partition_key: key.partition_key.clone(),
        sort_key: key.sort_key.clone(),
    })
    .map_err(|e| QueryError::InvalidCursor(e.to_string()).into())
}

pub fn decode_cursor(raw: &str) -> Result<CompositePrimaryKey> {
    let key: CursorKey =
        serde_json::from_str(raw).map_err(|e| QueryError::InvalidCursor(e.to_string()))?;
    Ok(CompositePrimaryKey::new(key.partition_key, key.sort_key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_sort_conditions() {
        assert!(SortCondition::Eq("b".into()).matches("b"));
        assert!(SortCondition::Lt("b".into()).matches("a"));
        assert!(!SortCondition::Lt("b".into()).matches("b"));
        assert!(SortCondition::Le("b".into()).matches("b"));
        assert!(SortCondition::Gt("b".into()).matches("c"));
        assert!(SortCondition::Ge("b".into()).matches("b"));
        assert!(SortCondition::BeginsWith("20".into()).matches("2023"));
        assert!(!SortCondition::BeginsWith("20".into()).matches("1999"));
    }

    #[test]
    fn test_between_is_inclusive() {
        let cond = SortCondition::Between("2021".into(), "2023".into());
        assert!(cond.matches("2021"));
        assert!(cond.matches("2022"));
        assert!(cond.matches("2023"));
        assert!(!cond.matches("2024"));
    }

    #[test]
    fn test_matches_with_custom_comparator() {
        let numeric = |a: &str, b: &str| {
            a.parse::<u64>()
                .unwrap_or(0)
                .cmp(&b.parse::<u64>().unwrap_or(0))
        };
        // Byte order would put "10" before "9".
        assert!(SortCondition::Gt("9".into()).matches_with("10", &numeric));
        assert!(!SortCondition::Gt("9".into()).matches("10"));
    }

    #[test]
    fn test_cursor_format() {
        let key = CompositePrimaryKey::new("orders#42", "2023");
        let raw = encode_cursor(&key).unwrap();
        assert_eq!(raw, r#"{"PK":"orders#42","SK":"2023"}"#);
        assert_eq!(decode_cursor(&raw).unwrap(), key);
    }

    #[test]
    fn test_malformed_cursor() {
        let err = decode_cursor("not json").unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::InvalidCursor(_))));
    }

    #[test]
    fn test_validate_rejects_zero_limit() {
        let err = QueryInput::new("p").limit(0).validate().unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::InvalidLimit)));
    }

    #[test]
    fn test_validate_rejects_foreign_cursor() {
        let cursor = encode_cursor(&CompositePrimaryKey::new("other", "x")).unwrap();
        let err = QueryInput::new("p")
            .exclusive_start_key(cursor)
            .validate()
            .unwrap_err();
        assert!(matches!(err, Error::Query(QueryError::InvalidCursor(_))));
    }

    #[test]
    fn test_resume_keeps_other_parameters() {
        let input = QueryInput::new("p").scan_forward(false).limit(3);
        let resumed = input.resume_from(Some("c".to_string()));
        assert!(!resumed.is_forward());
        assert_eq!(resumed.limit_value(), Some(3));
        assert_eq!(resumed.cursor(), Some("c"));
    }
}
