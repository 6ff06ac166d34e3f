use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::info;
use uuid::Uuid;

use crate::backend::{PocketsBackend, ProgressFn};
use crate::error::user_message;
use crate::media::SelectedFile;

use super::tracker::UploadEvent;
use super::uploader::upload_object;

/// Starts an independent upload for every file, right away.
///
/// Each task reports through `report`; a failing file only ever reports its
/// own failure. The returned handles let the owner abort uploads when the
/// selection is discarded.
pub fn spawn_uploads<F>(
    runtime: &Handle,
    backend: Arc<dyn PocketsBackend>,
    files: Vec<(Uuid, SelectedFile)>,
    report: F,
) -> Vec<JoinHandle<()>>
where
    F: Fn(Uuid, UploadEvent) + Send + Sync + Clone + 'static,
{
    files
        .into_iter()
        .map(|(file_id, file)| {
            let backend = backend.clone();
            let report = report.clone();
            runtime.spawn(async move {
                report(file_id, UploadEvent::Started);
                let progress_report = report.clone();
                let progress: ProgressFn =
                    Arc::new(move |pct: u8| progress_report(file_id, UploadEvent::Progress(pct)));
                let result = upload_object(backend.as_ref(), &file, progress)
                    .await
                    .map_err(|err| user_message(&err));
                if result.is_ok() {
                    info!(file = %file.name, %file_id, "file uploaded");
                }
                report(file_id, UploadEvent::Finished(result));
            })
        })
        .collect()
}
