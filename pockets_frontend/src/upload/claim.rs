use tracing::info;
use uuid::Uuid;

use crate::backend::PocketsBackend;
use crate::cache::QueryCache;
use crate::error::ClaimError;
use crate::models::{ClaimPhotosInput, ClaimedFile, Photo};

use super::tracker::UploadTracker;

/// A validated batch: one entry per selected file, every one keyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimRequest {
    input: ClaimPhotosInput,
    file_ids: Vec<Uuid>,
}

impl ClaimRequest {
    /// Builds the batch, refusing locally while anything is unfinished. A
    /// partial batch is never produced.
    pub fn from_tracker(event_id: &str, tracker: &UploadTracker) -> Result<Self, ClaimError> {
        if tracker.is_empty() {
            return Err(ClaimError::NothingSelected);
        }
        let pending = tracker.pending_count();
        if pending > 0 {
            return Err(ClaimError::UploadsPending { pending });
        }

        let mut photos = Vec::with_capacity(tracker.len());
        let mut file_ids = Vec::with_capacity(tracker.len());
        for upload in tracker.files() {
            let Some(object_key) = upload.object_key.clone() else {
                return Err(ClaimError::UploadsPending { pending: 1 });
            };
            let info = &upload.file.info;
            photos.push(ClaimedFile {
                object_key,
                file_name: upload.file.name.clone(),
                mime: info.mime.clone(),
                size_bytes: info.size_bytes,
                kind: info.kind,
                width: info.width,
                height: info.height,
                taken_at: info.exif.taken_at,
                orientation: info.exif.orientation,
            });
            file_ids.push(upload.id);
        }

        Ok(Self {
            input: ClaimPhotosInput {
                event_id: event_id.to_string(),
                photos,
            },
            file_ids,
        })
    }

    pub fn event_id(&self) -> &str {
        &self.input.event_id
    }

    pub fn input(&self) -> &ClaimPhotosInput {
        &self.input
    }

    pub fn file_ids(&self) -> &[Uuid] {
        &self.file_ids
    }

    pub fn object_keys(&self) -> impl Iterator<Item = &str> {
        self.input.photos.iter().map(|photo| photo.object_key.as_str())
    }
}

/// The single network call that turns stored objects into event photos.
pub async fn submit_claim(
    backend: &dyn PocketsBackend,
    request: &ClaimRequest,
) -> Result<Vec<Photo>, ClaimError> {
    let response = backend.claim_photos(request.input()).await?;
    info!(
        event_id = request.event_id(),
        claimed = request.input().photos.len(),
        "photos claimed"
    );
    Ok(response.photos)
}

/// Callback run once after a successful claim so dependent views refetch.
pub type ClaimCallback = Box<dyn FnOnce(&[Photo]) + Send>;

/// Post-success bookkeeping: stale caches, cleared selection, callback.
pub fn complete_claim(
    tracker: &mut UploadTracker,
    cache: &mut QueryCache,
    event_id: &str,
    pocket_id: Option<&str>,
    photos: &[Photo],
    on_claimed: Option<ClaimCallback>,
) {
    cache.invalidate_after_claim(event_id, pocket_id);
    tracker.clear();
    if let Some(callback) = on_claimed {
        callback(photos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{png_bytes, PreviewStore, SelectedFile};
    use crate::testing::FakeBackend;
    use crate::upload::tracker::UploadEvent;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeSet;

    fn keyed_tracker(names: &[&str]) -> (UploadTracker, PreviewStore) {
        let previews = PreviewStore::new();
        let mut tracker = UploadTracker::new(previews.clone());
        let files = names
            .iter()
            .map(|name| SelectedFile::from_bytes(*name, png_bytes(3, 2)))
            .collect();
        for (id, file) in tracker.add_files(files) {
            tracker.apply(id, UploadEvent::Started);
            tracker.apply(id, UploadEvent::Finished(Ok(format!("objects/{}", file.name))));
        }
        (tracker, previews)
    }

    #[test]
    fn payload_keys_match_uploaded_files_one_to_one() {
        let (tracker, _) = keyed_tracker(&["a.png", "b.png", "c.png"]);
        let request = ClaimRequest::from_tracker("E1", &tracker).unwrap();

        let produced: BTreeSet<String> = tracker
            .files()
            .iter()
            .filter_map(|file| file.object_key.clone())
            .collect();
        let claimed: BTreeSet<String> = request.object_keys().map(str::to_string).collect();
        assert_eq!(claimed, produced);
        assert_eq!(request.input().photos.len(), 3);
        for (photo, upload) in request.input().photos.iter().zip(tracker.files()) {
            assert_eq!(Some(&photo.object_key), upload.object_key.as_ref());
            assert_eq!(photo.file_name, upload.file.name);
            assert_eq!((photo.width, photo.height), (Some(3), Some(2)));
        }
        assert_eq!(request.file_ids().len(), 3);
    }

    #[test]
    fn unfinished_uploads_block_the_claim() {
        let previews = PreviewStore::new();
        let mut tracker = UploadTracker::new(previews);
        assert_eq!(
            ClaimRequest::from_tracker("E1", &tracker),
            Err(ClaimError::NothingSelected)
        );

        let added = tracker.add_files(vec![
            SelectedFile::from_bytes("a.png", png_bytes(1, 1)),
            SelectedFile::from_bytes("b.png", png_bytes(1, 1)),
        ]);
        tracker.apply(added[0].0, UploadEvent::Finished(Ok("k".into())));
        tracker.apply(added[1].0, UploadEvent::Started);
        assert_eq!(
            ClaimRequest::from_tracker("E1", &tracker),
            Err(ClaimError::UploadsPending { pending: 1 })
        );
    }

    #[tokio::test]
    async fn successful_claim_clears_selection_and_fires_callback_once() {
        let backend = FakeBackend::new();
        let (mut tracker, previews) = keyed_tracker(&["a.png", "b.png", "c.png"]);
        let mut cache = QueryCache::default();
        cache.set(crate::cache::QueryKey::event_photos("E1"), &Vec::<String>::new());

        let request = ClaimRequest::from_tracker("E1", &tracker).unwrap();
        let photos = submit_claim(&backend, &request).await.unwrap();
        assert_eq!(photos.len(), 3);

        let calls = std::sync::Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let counter = calls.clone();
        complete_claim(
            &mut tracker,
            &mut cache,
            "E1",
            Some("P1"),
            &photos,
            Some(Box::new(move |_| {
                counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            })),
        );

        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert!(tracker.is_empty());
        assert_eq!(previews.live_count(), 0);
        assert!(cache.is_stale(&crate::cache::QueryKey::event_photos("E1")));
        assert_eq!(backend.claims().len(), 1);
        assert_eq!(backend.claims()[0].event_id, "E1");
    }

    #[tokio::test]
    async fn failed_claim_keeps_everything() {
        let backend = FakeBackend::new();
        backend.fail_claims();
        let (tracker, previews) = keyed_tracker(&["a.png"]);
        let request = ClaimRequest::from_tracker("E1", &tracker).unwrap();
        let result = submit_claim(&backend, &request).await;
        assert!(matches!(result, Err(ClaimError::Api(_))));
        assert_eq!(tracker.len(), 1);
        assert_eq!(previews.live_count(), 1);
    }
}
