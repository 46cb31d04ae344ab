// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conditions selecting rows of a table.
use doclife_core::row::{PARENT, PARENTFIELD, PARENTTYPE};
use doclife_core::{Row, Value};

/// Condition on the value of one column. Missing columns are compared as `Null`.
#[derive(Clone, Debug, PartialEq)]
pub enum Condition {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
}

impl Condition {
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            Condition::Eq(expected) => value == expected,
            Condition::Ne(expected) => value != expected,
            Condition::In(candidates) => candidates.contains(value),
            Condition::NotIn(candidates) => !candidates.contains(value),
        }
    }
}

/// Conjunction of column conditions, an empty filter matches every row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<(String, Condition)>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of one child table of a parent document.
    pub fn children_of(parenttype: &str, parent: &str, parentfield: &str) -> Self {
        Self::new()
            .eq(PARENTTYPE, parenttype)
            .eq(PARENT, parent)
            .eq(PARENTFIELD, parentfield)
    }

    pub fn eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Eq(value.into()))
    }

    pub fn ne(self, column: &str, value: impl Into<Value>) -> Self {
        self.with(column, Condition::Ne(value.into()))
    }

    pub fn is_in(self, column: &str, values: Vec<Value>) -> Self {
        self.with(column, Condition::In(values))
    }

    pub fn not_in(self, column: &str, values: Vec<Value>) -> Self {
        self.with(column, Condition::NotIn(values))
    }

    pub fn with(mut self, column: &str, condition: Condition) -> Self {
        self.conditions.push((column.to_owned(), condition));
        self
    }

    pub fn conditions(&self) -> &[(String, Condition)] {
        &self.conditions
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|(column, condition)| {
            let value = row.get(column).cloned().unwrap_or_default();
            condition.matches(&value)
        })
    }
}

#[cfg(test)]
mod tests {
    use doclife_core::{Row, Value};

    use super::Filter;

    #[test]
    fn match_rows() {
        let row: Row = [
            ("parent", Value::from("SO-0001")),
            ("parenttype", Value::from("Sales Order")),
            ("parentfield", Value::from("items")),
            ("docstatus", Value::Int(1)),
        ]
        .into_iter()
        .collect();

        assert!(Filter::new().matches(&row));
        assert!(Filter::children_of("Sales Order", "SO-0001", "items").matches(&row));
        assert!(!Filter::children_of("Sales Order", "SO-0002", "items").matches(&row));
        assert!(Filter::new().ne("docstatus", 2).matches(&row));
        assert!(!Filter::new().not_in("docstatus", vec![1.into(), 2.into()]).matches(&row));
        assert!(Filter::new().eq("missing", Value::Null).matches(&row));
        assert!(Filter::new().is_in("docstatus", vec![0.into(), 1.into()]).matches(&row));
    }
}
