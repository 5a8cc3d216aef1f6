//! Aggregate counters over the media collection.

use mediacouch_core::models::{ImageStatus, StatusReport, VideoStatus};
use mediacouch_core::AppError;
use std::collections::BTreeMap;

use super::media::MediaRepository;
use crate::db::store::{ViewIndex, ViewQuery};
use crate::db::views::{self, IMAGES, VIDEOS};

const VIDEOS_TOTAL: &str = "videos/all";
const VIDEOS_TO_BE_ANALYZED: &str = "videos/to_be_analyzed";
const IMAGES_TOTAL: &str = "images/all";
const IMAGES_TO_BE_ANALYZED: &str = "images/to_be_analyzed";
const IMAGES_TOTAL_BY_VIDEO_ID: &str = "images/total_by_video_id";
const IMAGES_PROCESSED_BY_VIDEO_ID: &str = "images/processed_by_video_id";

fn settle<T>(report: &mut StatusReport, query: &str, result: Result<T, AppError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, query = %query, "Status query failed");
            report.record_failure(query, e);
            None
        }
    }
}

impl MediaRepository {
    /// Run the six status queries concurrently.
    ///
    /// Every query that succeeds contributes its figure even when others
    /// fail. Failures are settled in a fixed order (videos before images,
    /// totals before breakdowns), so `error` is the first failure in that
    /// order rather than the first to complete.
    #[tracing::instrument(skip(self), fields(db.operation = "status"))]
    pub async fn status(&self) -> StatusReport {
        let (videos_total, videos_pending, images_total, images_pending, by_video, processed) =
            tokio::join!(
                self.count(VIDEOS, views::ALL),
                self.count(VIDEOS, views::TO_BE_ANALYZED),
                self.count(IMAGES, views::ALL),
                self.count(IMAGES, views::TO_BE_ANALYZED),
                self.count_by_key(IMAGES, views::TOTAL_BY_VIDEO_ID),
                self.count_by_key(IMAGES, views::PROCESSED_BY_VIDEO_ID),
            );

        let mut report = StatusReport::default();
        let videos = VideoStatus {
            total: settle(&mut report, VIDEOS_TOTAL, videos_total),
            to_be_analyzed: settle(&mut report, VIDEOS_TO_BE_ANALYZED, videos_pending),
        };
        let images = ImageStatus {
            total: settle(&mut report, IMAGES_TOTAL, images_total),
            to_be_analyzed: settle(&mut report, IMAGES_TO_BE_ANALYZED, images_pending),
            total_by_video_id: settle(&mut report, IMAGES_TOTAL_BY_VIDEO_ID, by_video),
            processed_by_video_id: settle(&mut report, IMAGES_PROCESSED_BY_VIDEO_ID, processed),
        };
        report.videos = videos;
        report.images = images;

        report
    }

    /// Reduced `_count` over a whole view; an empty view counts 0.
    async fn count(&self, design: &str, view: &str) -> Result<u64, AppError> {
        let rows = self.database().view(design, view, &ViewQuery::count()).await?;
        Ok(rows.first().and_then(|row| row.value.as_u64()).unwrap_or(0))
    }

    async fn count_by_key(
        &self,
        design: &str,
        view: &str,
    ) -> Result<BTreeMap<String, u64>, AppError> {
        let rows = self
            .database()
            .view(design, view, &ViewQuery::grouped())
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let key = row
                    .key
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| row.key.to_string());
                (key, row.value.as_u64().unwrap_or(0))
            })
            .collect())
    }
}
