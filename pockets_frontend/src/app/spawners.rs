use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{user_message, ClaimError};
use crate::media::SelectedFile;
use crate::requests::RequestScope;
use crate::upload::{spawn_uploads, ClaimRequest};

use super::messages::AppMessage;
use super::tasks;
use super::PocketsApp;

pub(super) const CLAIM_IN_PROGRESS: &str = "Photos are being added, try again in a moment";

impl PocketsApp {
    pub fn spawn_load_pockets(&mut self) {
        let ticket = self.requests.begin(RequestScope::PocketList);
        self.pockets.loading = true;
        self.pockets.error = None;
        tasks::load_pockets(&self.runtime, self.backend.clone(), self.tx.clone(), ticket);
    }

    /// Shows the events of `pocket_id`, superseding any list still loading.
    pub fn spawn_load_events(&mut self, pocket_id: &str) {
        let ticket = self.requests.begin(RequestScope::EventList);
        if self.events.pocket_id.as_deref() != Some(pocket_id) {
            self.events.events.clear();
        }
        self.events.pocket_id = Some(pocket_id.to_string());
        self.events.loading = true;
        self.events.error = None;
        tasks::load_events(
            &self.runtime,
            self.backend.clone(),
            self.tx.clone(),
            ticket,
            pocket_id.to_string(),
        );
    }

    /// Shows the photos of `event_id`, superseding any grid load in flight.
    pub fn spawn_load_event_photos(&mut self, event_id: String, pocket_id: Option<String>) {
        let ticket = self.requests.begin(RequestScope::EventPhotos);
        if self.photos.event_id.as_deref() != Some(event_id.as_str()) {
            self.photos.photos.clear();
            self.photos.busy.clear();
        }
        self.photos.event_id = Some(event_id.clone());
        self.photos.pocket_id = pocket_id;
        self.photos.loading = true;
        self.photos.error = None;
        tasks::load_event_photos(
            &self.runtime,
            self.backend.clone(),
            self.tx.clone(),
            ticket,
            event_id,
        );
    }

    pub fn spawn_load_contacts(&mut self) {
        if self.contacts.loading {
            return;
        }
        self.contacts.loading = true;
        self.contacts.error = None;
        tasks::load_contacts(&self.runtime, self.backend.clone(), self.tx.clone());
    }

    /// Adds files to an upload session and starts uploading each right away.
    pub(super) fn start_uploads(&mut self, session: Uuid, files: Vec<SelectedFile>) {
        if files.is_empty() {
            return;
        }
        let Some(upload) = self.upload_session_mut(session) else {
            debug!(%session, "files arrived for a closed session");
            return;
        };
        if upload.submitting {
            debug!(%session, count = files.len(), "files refused while claiming");
            upload.error = Some(CLAIM_IN_PROGRESS.into());
            return;
        }
        let added = upload.tracker.add_files(files);
        self.launch_uploads(session, added);
    }

    pub(super) fn launch_uploads(&mut self, session: Uuid, added: Vec<(Uuid, SelectedFile)>) {
        let runtime = self.runtime.clone();
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        let Some(upload) = self.upload_session_mut(session) else {
            return;
        };
        let ids: Vec<Uuid> = added.iter().map(|(id, _)| *id).collect();
        info!(%session, count = ids.len(), "starting uploads");
        let handles = spawn_uploads(&runtime, backend, added, move |file_id, event| {
            let _ = tx.send(AppMessage::Upload {
                session,
                file_id,
                event,
            });
        });
        upload.tasks.extend(ids.into_iter().zip(handles));
    }

    /// Builds the claim for a session and sends it. Refused locally while
    /// any file is still unfinished.
    pub(super) fn spawn_claim(&mut self, session: Uuid) {
        let runtime = self.runtime.clone();
        let backend = self.backend.clone();
        let tx = self.tx.clone();
        let Some(upload) = self.upload_session_mut(session) else {
            return;
        };
        if upload.submitting {
            debug!(%session, error = %ClaimError::AlreadySubmitting, "claim refused");
            return;
        }
        let outcome = match &upload.target {
            Some(target) => ClaimRequest::from_tracker(&target.event_id, &upload.tracker),
            None => Err(ClaimError::NothingSelected),
        };
        match outcome {
            Ok(request) => {
                upload.submitting = true;
                upload.error = None;
                tasks::claim_photos(&runtime, backend, tx, session, request);
            }
            Err(err) => {
                debug!(%session, error = %err, "claim refused");
                upload.error = Some(user_message(&err));
                if let Some(wizard) = self.create_event.as_mut().filter(|w| w.uploads.id == session) {
                    wizard.submitting = false;
                }
            }
        }
    }
}
