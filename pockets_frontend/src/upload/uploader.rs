use tracing::{debug, warn};

use crate::backend::{PocketsBackend, ProgressFn};
use crate::error::{ApiError, UploadError};
use crate::media::SelectedFile;
use crate::models::PresignRequest;

/// Uploads one file straight to object storage and returns its object key.
///
/// Two steps: ask the backend for a single-use destination, then push the
/// bytes to it. Nothing is retried; the caller marks the file failed.
pub async fn upload_object(
    backend: &dyn PocketsBackend,
    file: &SelectedFile,
    progress: ProgressFn,
) -> Result<String, UploadError> {
    let file_name = file.name.trim();
    if file_name.is_empty() {
        return Err(UploadError::EmptyFileName);
    }

    let request = PresignRequest {
        file_name: file_name.to_string(),
        content_type: Some(file.info.mime.clone()),
    };
    let destination = backend
        .request_upload_destination(&request)
        .await
        .map_err(UploadError::Destination)?;
    if destination.object_key.trim().is_empty() {
        return Err(UploadError::Destination(ApiError::decode(
            "upload destination",
            "object key is empty",
        )));
    }
    debug!(file = file_name, key = %destination.object_key, "upload destination issued");

    backend
        .transfer_object(&destination, file.bytes.clone(), &file.info.mime, progress)
        .await
        .map_err(|err| {
            warn!(file = file_name, error = %err, "object transfer failed");
            UploadError::Transfer(err)
        })?;
    Ok(destination.object_key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeBackend;
    use std::sync::{Arc, Mutex};

    fn recorder() -> (ProgressFn, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (Arc::new(move |pct: u8| sink.lock().unwrap().push(pct)), seen)
    }

    #[tokio::test]
    async fn returns_issued_key_after_transfer() {
        let backend = FakeBackend::new();
        let file = SelectedFile::from_bytes("sunset.jpg", vec![1u8; 10]);
        let (progress, seen) = recorder();
        let key = upload_object(&backend, &file, progress).await.unwrap();
        assert_eq!(key, "objects/sunset.jpg");
        assert_eq!(backend.transferred(), vec![("objects/sunset.jpg".to_string(), 10)]);
        assert_eq!(seen.lock().unwrap().last(), Some(&100));
    }

    #[tokio::test]
    async fn empty_name_is_rejected_before_any_request() {
        let backend = FakeBackend::new();
        let file = SelectedFile::from_bytes("  ", vec![1u8; 3]);
        let (progress, _) = recorder();
        let result = upload_object(&backend, &file, progress).await;
        assert_eq!(result, Err(UploadError::EmptyFileName));
        assert_eq!(backend.presign_calls(), 0);
    }

    #[tokio::test]
    async fn destination_and_transfer_failures_are_distinguished() {
        let backend = FakeBackend::new();
        backend.fail_presign_for("bad.jpg");
        backend.fail_transfer_for("worse.jpg");
        let (progress, _) = recorder();

        let bad = SelectedFile::from_bytes("bad.jpg", vec![0u8; 2]);
        assert!(matches!(
            upload_object(&backend, &bad, progress.clone()).await,
            Err(UploadError::Destination(_))
        ));
        let worse = SelectedFile::from_bytes("worse.jpg", vec![0u8; 2]);
        assert!(matches!(
            upload_object(&backend, &worse, progress).await,
            Err(UploadError::Transfer(_))
        ));
    }
}
