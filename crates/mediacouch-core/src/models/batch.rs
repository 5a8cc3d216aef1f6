use serde::{Deserialize, Serialize};

use super::Revision;
use crate::error::AppError;

/// Per-document outcome of a bulk write, in the shape the database reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<Revision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BulkItemResult {
    pub fn success(id: impl Into<String>, rev: Revision) -> Self {
        Self {
            id: id.into(),
            rev: Some(rev),
            error: None,
            reason: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: &str, reason: &str) -> Self {
        Self {
            id: id.into(),
            rev: None,
            error: Some(error.to_string()),
            reason: Some(reason.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none() && self.rev.is_some()
    }

    pub fn is_conflict(&self) -> bool {
        self.error.as_deref() == Some("conflict")
    }
}

/// One item of a batch that was not applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFailure {
    pub id: String,
    pub error: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSuccess {
    pub id: String,
    pub rev: Revision,
}

/// Split view of a bulk write: a conflict on one item never hides the
/// successes of its siblings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub succeeded: Vec<BatchSuccess>,
    pub failed: Vec<ItemFailure>,
}

impl BatchOutcome {
    pub fn from_results(results: Vec<BulkItemResult>) -> Self {
        let mut outcome = BatchOutcome::default();
        for item in results {
            match (item.rev, item.error) {
                (Some(rev), None) => outcome.succeeded.push(BatchSuccess { id: item.id, rev }),
                (_, error) => outcome.failed.push(ItemFailure {
                    id: item.id,
                    error: error.unwrap_or_else(|| "unknown_error".to_string()),
                    reason: item.reason,
                }),
            }
        }
        outcome
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn len(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All-or-error view: any failed item turns the batch into `PartialFailure`.
    pub fn into_result(self) -> Result<Vec<BatchSuccess>, AppError> {
        if self.failed.is_empty() {
            return Ok(self.succeeded);
        }
        Err(AppError::PartialFailure {
            succeeded: self.succeeded.into_iter().map(|s| s.id).collect(),
            failures: self.failed,
        })
    }
}
