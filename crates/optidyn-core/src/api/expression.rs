//! Condition expressions evaluated against stored documents.
//!
//! Write preconditions are built as `ConditionExpr` trees, shipped inside
//! [`WriteRequest`](super::operation::WriteRequest)s and re-checked by the
//! storage engine at apply time. A missing item is evaluated as `{}`.
//!
//! Attribute names are looked up literally, never split into paths: a key
//! attribute named `user.id` is the top-level attribute `"user.id"`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::FilterError;

/// A boolean expression over a JSON document.
///
/// Serializable so it can travel with a batch to the network primitive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ConditionExpr {
    /// Reference to a top-level document attribute.
    Attr(String),
    Literal(Value),

    Eq(Box<ConditionExpr>, Box<ConditionExpr>),
    AttributeNotExists(String),
    And(Vec<ConditionExpr>),
}

const MAX_EXPRESSION_DEPTH: usize = 16;

impl ConditionExpr {
    /// Evaluate against `doc`, or against `{}` when the item does not exist.
    pub fn eval_existing(&self, doc: Option<&Value>) -> Result<bool, FilterError> {
        match doc {
            Some(doc) => self.eval(doc),
            None => self.eval(&Value::Object(serde_json::Map::new())),
        }
    }

    pub fn eval(&self, doc: &Value) -> Result<bool, FilterError> {
        self.eval_inner(doc, 0)
    }

    fn eval_inner(&self, doc: &Value, depth: usize) -> Result<bool, FilterError> {
        if depth > MAX_EXPRESSION_DEPTH {
            return Err(FilterError::InvalidExpression(format!(
                "expression depth exceeds maximum of {MAX_EXPRESSION_DEPTH}"
            )));
        }

        match self {
            ConditionExpr::Attr(_) | ConditionExpr::Literal(_) => Err(
                FilterError::InvalidExpression("leaf node is not a condition".to_string()),
            ),
            ConditionExpr::Eq(l, r) => {
                let (l, r) = (operand(l, doc)?, operand(r, doc)?);
                // A missing attribute equals nothing.
                Ok(!l.is_null() && l == r)
            }
            ConditionExpr::AttributeNotExists(name) => Ok(doc.get(name).is_none_or(Value::is_null)),
            ConditionExpr::And(exprs) => {
                for expr in exprs {
                    if !expr.eval_inner(doc, depth + 1)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
        }
    }
}

fn operand<'a>(expr: &'a ConditionExpr, doc: &'a Value) -> Result<&'a Value, FilterError> {
    match expr {
        ConditionExpr::Attr(name) => Ok(doc.get(name).unwrap_or(&Value::Null)),
        ConditionExpr::Literal(val) => Ok(val),
        _ => Err(FilterError::InvalidExpression(
            "expected attribute or literal in comparison position".to_string(),
        )),
    }
}

impl ConditionExpr {
    pub fn attr(name: impl Into<String>) -> Self {
        ConditionExpr::Attr(name.into())
    }

    pub fn literal(val: impl Into<Value>) -> Self {
        ConditionExpr::Literal(val.into())
    }

    /// `left = right`
    pub fn eq(left: ConditionExpr, right: ConditionExpr) -> Self {
        ConditionExpr::Eq(Box::new(left), Box::new(right))
    }

    pub fn attribute_not_exists(name: impl Into<String>) -> Self {
        ConditionExpr::AttributeNotExists(name.into())
    }

    pub fn and(exprs: Vec<ConditionExpr>) -> Self {
        ConditionExpr::And(exprs)
    }
}

/// Renders the DynamoDB-style expression text, e.g.
/// `attribute_not_exists (PK) AND attribute_not_exists (SK)`.
impl fmt::Display for ConditionExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConditionExpr::Attr(name) => write!(f, "{name}"),
            ConditionExpr::Literal(val) => write!(f, "{val}"),
            ConditionExpr::Eq(l, r) => write!(f, "{l} = {r}"),
            ConditionExpr::AttributeNotExists(name) => write!(f, "attribute_not_exists ({name})"),
            ConditionExpr::And(exprs) => {
                for (i, expr) in exprs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" AND ")?;
                    }
                    match expr {
                        ConditionExpr::And(_) => write!(f, "({expr})")?,
                        _ => write!(f, "{expr}")?,
                    }
                }
                Ok(())
            }
        }
    }
}
