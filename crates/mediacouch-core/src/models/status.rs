use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::AppError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VideoStatus {
    pub total: Option<u64>,
    pub to_be_analyzed: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImageStatus {
    pub total: Option<u64>,
    pub to_be_analyzed: Option<u64>,
    pub total_by_video_id: Option<BTreeMap<String, u64>>,
    pub processed_by_video_id: Option<BTreeMap<String, u64>>,
}

/// Aggregate counters. A figure is `None` when its query failed; the name of
/// every failed query is listed in `failed_queries` and the first failure is
/// kept in `error`.
#[derive(Debug, Default, Serialize)]
pub struct StatusReport {
    pub videos: VideoStatus,
    pub images: ImageStatus,
    pub failed_queries: Vec<String>,
    #[serde(skip)]
    pub error: Option<AppError>,
}

impl StatusReport {
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }

    /// Records a failed sub-query, keeping only the first error.
    pub fn record_failure(&mut self, query: &str, err: AppError) {
        self.failed_queries.push(query.to_string());
        if self.error.is_none() {
            self.error = Some(err);
        }
    }
}
