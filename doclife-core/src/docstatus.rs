// SPDX-License-Identifier: MIT OR Apache-2.0

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::DocStatusError;

/// Lifecycle flag of a document.
///
/// Legal transitions are `Draft -> Draft`, `Draft -> Submitted`, `Submitted -> Submitted` and
/// `Submitted -> Cancelled`. Cancelled documents never change again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum DocStatus {
    #[default]
    Draft,
    Submitted,
    Cancelled,
}

impl DocStatus {
    pub fn as_i64(&self) -> i64 {
        match self {
            DocStatus::Draft => 0,
            DocStatus::Submitted => 1,
            DocStatus::Cancelled => 2,
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(self, DocStatus::Draft)
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, DocStatus::Submitted)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, DocStatus::Cancelled)
    }
}

impl TryFrom<i64> for DocStatus {
    type Error = DocStatusError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DocStatus::Draft),
            1 => Ok(DocStatus::Submitted),
            2 => Ok(DocStatus::Cancelled),
            other => Err(DocStatusError(other)),
        }
    }
}

impl From<DocStatus> for i64 {
    fn from(value: DocStatus) -> Self {
        value.as_i64()
    }
}

impl fmt::Display for DocStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DocStatus::Draft => "Draft",
            DocStatus::Submitted => "Submitted",
            DocStatus::Cancelled => "Cancelled",
        };
        write!(f, "{} ({})", self.as_i64(), label)
    }
}

#[cfg(test)]
mod tests {
    use super::DocStatus;

    #[test]
    fn integer_representation() {
        for status in [DocStatus::Draft, DocStatus::Submitted, DocStatus::Cancelled] {
            assert_eq!(DocStatus::try_from(status.as_i64()).unwrap(), status);
        }
        assert!(DocStatus::try_from(3).is_err());
        assert_eq!(DocStatus::Submitted.to_string(), "1 (Submitted)");
    }
}
