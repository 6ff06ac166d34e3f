use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::runtime::Handle;
use tracing::{error, warn};
use uuid::Uuid;

use crate::audio::resolve_duration;
use crate::backend::PocketsBackend;
use crate::error::user_message;
use crate::media::{PreviewHandle, SelectedFile};
use crate::models::{
    AddContactInput, ChangePasswordInput, CreateEventInput, CreatePocketInput, UpdateProfileInput,
};
use crate::requests::{cancellable, RequestTicket};
use crate::upload::{submit_claim, upload_object, ClaimRequest};

use super::messages::AppMessage;

type Backend = Arc<dyn PocketsBackend>;

fn deliver(tx: &Sender<AppMessage>, message: AppMessage) {
    if tx.send(message).is_err() {
        error!("app message channel closed");
    }
}

pub fn login(runtime: &Handle, backend: Backend, tx: Sender<AppMessage>, email: String, password: String) {
    runtime.spawn(async move {
        let result = backend.login(&email, &password).await;
        deliver(&tx, AppMessage::LoggedIn(result));
    });
}

pub fn load_profile(runtime: &Handle, backend: Backend, tx: Sender<AppMessage>) {
    runtime.spawn(async move {
        let result = backend.current_user().await;
        deliver(&tx, AppMessage::ProfileLoaded(result));
    });
}

pub fn update_profile(runtime: &Handle, backend: Backend, tx: Sender<AppMessage>, input: UpdateProfileInput) {
    runtime.spawn(async move {
        let result = backend.update_profile(&input).await;
        deliver(&tx, AppMessage::ProfileUpdated(result));
    });
}

pub fn change_password(runtime: &Handle, backend: Backend, tx: Sender<AppMessage>, input: ChangePasswordInput) {
    runtime.spawn(async move {
        let result = backend.change_password(&input).await;
        deliver(&tx, AppMessage::PasswordChanged(result));
    });
}

pub fn load_pockets(runtime: &Handle, backend: Backend, tx: Sender<AppMessage>, ticket: RequestTicket) {
    runtime.spawn(async move {
        let result = cancellable(ticket.cancel, backend.list_pockets()).await;
        deliver(
            &tx,
            AppMessage::PocketsLoaded {
                request_id: ticket.id,
                result,
            },
        );
    });
}

pub fn load_events(
    runtime: &Handle,
    backend: Backend,
    tx: Sender<AppMessage>,
    ticket: RequestTicket,
    pocket_id: String,
) {
    runtime.spawn(async move {
        let result = cancellable(ticket.cancel, backend.list_events(&pocket_id)).await;
        deliver(
            &tx,
            AppMessage::EventsLoaded {
                request_id: ticket.id,
                pocket_id,
                result,
            },
        );
    });
}

pub fn load_event_photos(
    runtime: &Handle,
    backend: Backend,
    tx: Sender<AppMessage>,
    ticket: RequestTicket,
    event_id: String,
) {
    runtime.spawn(async move {
        let result = cancellable(ticket.cancel, backend.list_event_photos(&event_id)).await;
        deliver(
            &tx,
            AppMessage::PhotosLoaded {
                request_id: ticket.id,
                event_id,
                result,
            },
        );
    });
}

pub fn load_contacts(runtime: &Handle, backend: Backend, tx: Sender<AppMessage>) {
    runtime.spawn(async move {
        let result = backend.list_contacts().await;
        deliver(&tx, AppMessage::ContactsLoaded(result));
    });
}

pub fn search_contacts(
    runtime: &Handle,
    backend: Backend,
    tx: Sender<AppMessage>,
    ticket: RequestTicket,
    query: String,
) {
    runtime.spawn(async move {
        let result = cancellable(ticket.cancel, backend.search_contacts(&query)).await;
        deliver(
            &tx,
            AppMessage::ContactsSearched {
                request_id: ticket.id,
                result,
            },
        );
    });
}

pub fn add_contact(runtime: &Handle, backend: Backend, tx: Sender<AppMessage>, input: AddContactInput) {
    runtime.spawn(async move {
        let result = backend.add_contact(&input).await;
        deliver(&tx, AppMessage::ContactAdded(result));
    });
}

pub fn remove_contact(runtime: &Handle, backend: Backend, tx: Sender<AppMessage>, contact_id: String) {
    runtime.spawn(async move {
        let result = backend.remove_contact(&contact_id).await;
        deliver(&tx, AppMessage::ContactRemoved { contact_id, result });
    });
}

pub fn search_members(
    runtime: &Handle,
    backend: Backend,
    tx: Sender<AppMessage>,
    ticket: RequestTicket,
    event_id: String,
    query: String,
) {
    runtime.spawn(async move {
        let result = cancellable(ticket.cancel, backend.search_event_members(&event_id, &query)).await;
        deliver(
            &tx,
            AppMessage::MembersSearched {
                request_id: ticket.id,
                event_id,
                result,
            },
        );
    });
}

pub fn add_members(
    runtime: &Handle,
    backend: Backend,
    tx: Sender<AppMessage>,
    event_id: String,
    user_ids: Vec<String>,
) {
    runtime.spawn(async move {
        let result = backend.add_event_members(&event_id, &user_ids).await;
        deliver(&tx, AppMessage::MembersAdded { event_id, result });
    });
}

pub fn create_pocket(runtime: &Handle, backend: Backend, tx: Sender<AppMessage>, input: CreatePocketInput) {
    runtime.spawn(async move {
        let result = backend.create_pocket(&input).await;
        deliver(&tx, AppMessage::PocketCreated(result));
    });
}

pub fn create_event(
    runtime: &Handle,
    backend: Backend,
    tx: Sender<AppMessage>,
    session: Uuid,
    input: CreateEventInput,
) {
    runtime.spawn(async move {
        let result = backend.create_event(&input).await;
        deliver(&tx, AppMessage::EventCreated { session, result });
    });
}

/// Reads picked files from disk. Unreadable files are reported by name and
/// the rest still go through.
pub fn open_files(runtime: &Handle, tx: Sender<AppMessage>, session: Uuid, paths: Vec<PathBuf>) {
    runtime.spawn(async move {
        let mut files = Vec::with_capacity(paths.len());
        let mut errors = Vec::new();
        for path in paths {
            match SelectedFile::open(&path).await {
                Ok(file) => files.push(file),
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "could not read file");
                    errors.push(format!("{}: {}", path.display(), user_message(&err)));
                }
            }
        }
        deliver(
            &tx,
            AppMessage::FilesOpened {
                session,
                files,
                errors,
            },
        );
    });
}

pub fn claim_photos(
    runtime: &Handle,
    backend: Backend,
    tx: Sender<AppMessage>,
    session: Uuid,
    request: ClaimRequest,
) {
    runtime.spawn(async move {
        let result = submit_claim(backend.as_ref(), &request).await;
        deliver(&tx, AppMessage::PhotosClaimed { session, result });
    });
}

pub fn set_favorite(
    runtime: &Handle,
    backend: Backend,
    tx: Sender<AppMessage>,
    event_id: String,
    photo_id: String,
    favorite: bool,
) {
    runtime.spawn(async move {
        let result = backend.set_favorite(&photo_id, favorite).await;
        deliver(
            &tx,
            AppMessage::FavoriteSet {
                event_id,
                photo_id,
                favorite,
                result,
            },
        );
    });
}

pub fn delete_photo(
    runtime: &Handle,
    backend: Backend,
    tx: Sender<AppMessage>,
    event_id: String,
    photo_id: String,
) {
    runtime.spawn(async move {
        let result = backend.delete_photo(&photo_id).await;
        deliver(
            &tx,
            AppMessage::PhotoDeleted {
                event_id,
                photo_id,
                result,
            },
        );
    });
}

pub fn resolve_voice_note_duration(
    runtime: &Handle,
    tx: Sender<AppMessage>,
    preview: PreviewHandle,
    bytes: Bytes,
    budget: Duration,
) {
    runtime.spawn(async move {
        let duration = resolve_duration(bytes, budget).await;
        deliver(&tx, AppMessage::VoiceNoteDuration { preview, duration });
    });
}

pub fn upload_voice_note(runtime: &Handle, backend: Backend, tx: Sender<AppMessage>, file: SelectedFile) {
    runtime.spawn(async move {
        let result = upload_object(backend.as_ref(), &file, Arc::new(|_: u8| {}))
            .await
            .map_err(|err| user_message(&err));
        deliver(&tx, AppMessage::VoiceNoteUploaded(result));
    });
}
