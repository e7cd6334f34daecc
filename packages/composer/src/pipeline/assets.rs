//! Stage 4: asset upload, and the compensating delete.
//!
//! Uploads run in parallel over the sections that produced local image
//! bytes. A failing upload leaves that one section without an uploaded
//! image; it never aborts the batch.

use futures::future::join_all;
use tracing::{info, warn};
use uuid::Uuid;

use crate::traits::{AssetStore, JobLogSink, PlatformPublisher};
use crate::types::{LogLevel, Section};

/// Key for a section image inside the job's prefix.
fn image_key(job_id: Uuid, index: usize) -> String {
    format!("{job_id}/section-{index}.png")
}

/// Upload every generated section image under the job's prefix, then
/// pass each stored URL through the platform's image re-host (a no-op
/// for platforms without that capability). Returns whether at least one
/// object now exists under the prefix, which is what decides if
/// compensation is needed later.
pub(crate) async fn upload_section_images(
    assets: &dyn AssetStore,
    publisher: &dyn PlatformPublisher,
    logs: &dyn JobLogSink,
    job_id: Uuid,
    sections: &mut [Section],
) -> bool {
    let results = {
        let pending: Vec<(usize, &[u8])> = sections
            .iter()
            .filter_map(|s| s.image_bytes.as_deref().map(|b| (s.index, b)))
            .collect();

        join_all(pending.into_iter().map(|(index, bytes)| async move {
            let stored = match assets.upload(bytes, &image_key(job_id, index)).await {
                Ok(url) => url,
                Err(e) => return (index, Err(e)),
            };
            // Re-hosting is optional; if the platform rejects it, the
            // stored copy is still usable.
            let url = match publisher.upload_image(&stored).await {
                Ok(hosted) => hosted,
                Err(e) => {
                    warn!(section = index, error = %e, "platform re-host failed, using stored URL");
                    stored
                }
            };
            (index, Ok(url))
        }))
        .await
    };

    let mut any_uploaded = false;
    for (index, result) in results {
        match result {
            Ok(url) => {
                any_uploaded = true;
                if let Some(section) = sections.iter_mut().find(|s| s.index == index) {
                    section.uploaded_image_url = Some(url);
                }
            }
            Err(e) => {
                logs.append(
                    job_id,
                    LogLevel::Error,
                    &format!("section {index}: image upload degraded: {e}"),
                )
                .await;
            }
        }
    }
    any_uploaded
}

/// Saga-style compensation: remove every asset uploaded under this
/// job's prefix. Called when a later stage fails; the job is still
/// reported failed afterwards.
pub(crate) async fn compensate(assets: &dyn AssetStore, logs: &dyn JobLogSink, job_id: Uuid) {
    let prefix = format!("{job_id}/");
    match assets.delete_by_prefix(&prefix).await {
        Ok(()) => {
            info!(job_id = %job_id, "deleted uploaded assets after failure");
            logs.append(
                job_id,
                LogLevel::Warn,
                &format!("removed uploaded assets under {prefix} after failure"),
            )
            .await;
        }
        Err(e) => {
            // Compensation is best effort; the failure that got us here
            // is the one worth surfacing.
            warn!(job_id = %job_id, error = %e, "asset compensation failed");
            logs.append(
                job_id,
                LogLevel::Error,
                &format!("asset compensation failed: {e}"),
            )
            .await;
        }
    }
}
