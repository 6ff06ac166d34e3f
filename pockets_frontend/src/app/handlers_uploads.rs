use std::path::PathBuf;

use tracing::info;
use uuid::Uuid;

use crate::media::SelectedFile;
use crate::upload::{ClaimCallback, UploadStatus};

use super::spawners::CLAIM_IN_PROGRESS;
use super::state::{UploadSession, UploadTarget};
use super::tasks;
use super::PocketsApp;

impl PocketsApp {
    /// Opens the "add photos" dialog for an existing event, replacing any
    /// dialog already open. `on_claimed` runs once after a successful claim.
    pub fn open_upload(
        &mut self,
        event_id: &str,
        pocket_id: Option<&str>,
        on_claimed: Option<ClaimCallback>,
    ) -> Uuid {
        let mut session = UploadSession::new(
            self.previews.clone(),
            Some(UploadTarget {
                event_id: event_id.to_string(),
                pocket_id: pocket_id.map(str::to_string),
            }),
        );
        session.on_claimed = on_claimed;
        let id = session.id;
        self.upload = Some(session);
        id
    }

    /// Discards the dialog: in-flight uploads are aborted and previews freed.
    pub fn close_upload(&mut self) {
        if let Some(session) = self.upload.take() {
            info!(session = %session.id, files = session.tracker.len(), "upload dialog closed");
        }
    }

    /// Adds files and starts uploading them. Refused while the selection is
    /// being claimed.
    pub fn add_files(&mut self, session: Uuid, files: Vec<SelectedFile>) {
        self.start_uploads(session, files);
    }

    /// Reads files from disk in the background, then uploads them.
    pub fn select_paths(&mut self, session: Uuid, paths: Vec<PathBuf>) {
        let Some(upload) = self.upload_session_mut(session) else {
            return;
        };
        if upload.submitting {
            upload.error = Some(CLAIM_IN_PROGRESS.into());
            return;
        }
        if paths.is_empty() {
            return;
        }
        tasks::open_files(&self.runtime, self.tx.clone(), session, paths);
    }

    /// Drops a file from the selection. Refused while the selection is
    /// being claimed.
    pub fn remove_file(&mut self, session: Uuid, file_id: Uuid) {
        if let Some(upload) = self.upload_session_mut(session) {
            if upload.submitting {
                upload.error = Some(CLAIM_IN_PROGRESS.into());
                return;
            }
            upload.abort_file(file_id);
            upload.tracker.remove(file_id);
            if upload.tracker.can_submit() {
                upload.error = None;
            }
        }
    }

    /// Uploads a failed file again.
    pub fn retry_file(&mut self, session: Uuid, file_id: Uuid) {
        let Some(upload) = self.upload_session_mut(session).filter(|u| !u.submitting) else {
            return;
        };
        let Some(file) = upload
            .tracker
            .get(file_id)
            .filter(|file| matches!(file.status(), UploadStatus::Failed(_)))
            .map(|file| file.file.clone())
        else {
            return;
        };
        self.launch_uploads(session, vec![(file_id, file)]);
    }

    /// Claims the dialog's files into its event.
    pub fn submit_upload(&mut self) {
        if let Some(session) = self.upload.as_ref().map(|upload| upload.id) {
            self.spawn_claim(session);
        }
    }

    pub fn can_submit_upload(&self) -> bool {
        self.upload
            .as_ref()
            .is_some_and(|upload| !upload.submitting && upload.tracker.can_submit())
    }
}
