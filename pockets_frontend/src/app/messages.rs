use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::audio::DurationState;
use crate::cache::QueryKey;
use crate::error::{user_message, ApiError, ClaimError};
use crate::media::{PreviewHandle, SelectedFile};
use crate::models::{Contact, Event, LoginResponse, Member, Photo, Pocket, User};
use crate::requests::RequestScope;
use crate::upload::{complete_claim, UploadEvent};

use super::state::{sort_events, sort_pockets, UploadTarget};
use super::PocketsApp;

pub enum AppMessage {
    LoggedIn(Result<LoginResponse, ApiError>),
    ProfileLoaded(Result<User, ApiError>),
    ProfileUpdated(Result<User, ApiError>),
    PasswordChanged(Result<(), ApiError>),
    PocketsLoaded {
        request_id: u64,
        result: Result<Vec<Pocket>, ApiError>,
    },
    EventsLoaded {
        request_id: u64,
        pocket_id: String,
        result: Result<Vec<Event>, ApiError>,
    },
    PhotosLoaded {
        request_id: u64,
        event_id: String,
        result: Result<Vec<Photo>, ApiError>,
    },
    ContactsLoaded(Result<Vec<Contact>, ApiError>),
    ContactsSearched {
        request_id: u64,
        result: Result<Vec<Contact>, ApiError>,
    },
    ContactAdded(Result<Contact, ApiError>),
    ContactRemoved {
        contact_id: String,
        result: Result<(), ApiError>,
    },
    MembersSearched {
        request_id: u64,
        event_id: String,
        result: Result<Vec<Member>, ApiError>,
    },
    MembersAdded {
        event_id: String,
        result: Result<Vec<Member>, ApiError>,
    },
    PocketCreated(Result<Pocket, ApiError>),
    EventCreated {
        session: Uuid,
        result: Result<Event, ApiError>,
    },
    FilesOpened {
        session: Uuid,
        files: Vec<SelectedFile>,
        errors: Vec<String>,
    },
    Upload {
        session: Uuid,
        file_id: Uuid,
        event: UploadEvent,
    },
    PhotosClaimed {
        session: Uuid,
        result: Result<Vec<Photo>, ClaimError>,
    },
    FavoriteSet {
        event_id: String,
        photo_id: String,
        favorite: bool,
        result: Result<(), ApiError>,
    },
    PhotoDeleted {
        event_id: String,
        photo_id: String,
        result: Result<(), ApiError>,
    },
    VoiceNoteDuration {
        preview: PreviewHandle,
        duration: DurationState,
    },
    VoiceNoteUploaded(Result<String, String>),
}

impl PocketsApp {
    /// Folds every pending background result into state. Call once per frame.
    pub fn process_messages(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            self.handle_message(message);
        }
    }

    fn handle_message(&mut self, message: AppMessage) {
        match message {
            AppMessage::LoggedIn(result) => {
                self.identity.logging_in = false;
                match result {
                    Ok(response) => {
                        info!(user_id = %response.user.id, "signed in");
                        self.session.set_tokens(response.tokens);
                        self.remember_user(&response.user);
                        self.identity.user = Some(response.user);
                        self.identity.error = None;
                    }
                    Err(err) => {
                        warn!(error = %err, "sign in failed");
                        self.identity.error = Some(user_message(&err));
                    }
                }
            }
            AppMessage::ProfileLoaded(result) => {
                self.settings.loading = false;
                match result {
                    Ok(user) => {
                        self.settings.display_name_input =
                            user.display_name.clone().unwrap_or_default();
                        self.remember_user(&user);
                        self.identity.user = Some(user);
                    }
                    Err(err) => {
                        error!(error = %err, "failed to load profile");
                        self.settings.error = Some(user_message(&err));
                    }
                }
            }
            AppMessage::ProfileUpdated(result) => {
                self.settings.saving = false;
                match result {
                    Ok(user) => {
                        self.settings.notice = Some("Profile saved".into());
                        self.remember_user(&user);
                        self.identity.user = Some(user);
                    }
                    Err(err) => self.settings.error = Some(user_message(&err)),
                }
            }
            AppMessage::PasswordChanged(result) => {
                self.settings.saving = false;
                match result {
                    Ok(()) => {
                        self.settings.current_password.clear();
                        self.settings.new_password.clear();
                        self.settings.notice = Some("Password changed".into());
                    }
                    Err(err) => self.settings.error = Some(user_message(&err)),
                }
            }
            AppMessage::PocketsLoaded { request_id, result } => {
                if !self.accept(RequestScope::PocketList, request_id, &result) {
                    return;
                }
                self.pockets.loading = false;
                match result {
                    Ok(mut pockets) => {
                        self.cache.set(QueryKey::pockets_list(), &pockets);
                        sort_pockets(&mut pockets, self.pockets.sort);
                        self.pockets.pockets = pockets;
                        self.pockets.error = None;
                    }
                    Err(err) => {
                        error!(error = %err, "failed to load pockets");
                        self.pockets.error = Some(user_message(&err));
                    }
                }
            }
            AppMessage::EventsLoaded {
                request_id,
                pocket_id,
                result,
            } => {
                if !self.accept(RequestScope::EventList, request_id, &result) {
                    return;
                }
                self.events.loading = false;
                match result {
                    Ok(mut events) => {
                        self.cache.set(QueryKey::events_for_pocket(&pocket_id), &events);
                        sort_events(&mut events);
                        self.events.events = events;
                        self.events.error = None;
                    }
                    Err(err) => {
                        error!(pocket_id = %pocket_id, error = %err, "failed to load events");
                        self.events.error = Some(user_message(&err));
                    }
                }
            }
            AppMessage::PhotosLoaded {
                request_id,
                event_id,
                result,
            } => {
                if !self.accept(RequestScope::EventPhotos, request_id, &result) {
                    return;
                }
                if self.photos.event_id.as_deref() != Some(event_id.as_str()) {
                    debug!(event_id = %event_id, "dropping photos for a closed grid");
                    return;
                }
                self.photos.loading = false;
                match result {
                    Ok(photos) => {
                        self.cache.set(QueryKey::event_photos(&event_id), &photos);
                        self.photos.photos = photos;
                        self.photos.error = None;
                    }
                    Err(err) => self.photos.error = Some(user_message(&err)),
                }
            }
            AppMessage::ContactsLoaded(result) => {
                self.contacts.loading = false;
                match result {
                    Ok(contacts) => {
                        self.cache.set(QueryKey::contacts_list(), &contacts);
                        self.contacts.contacts = contacts;
                        self.contacts.error = None;
                    }
                    Err(err) => self.contacts.error = Some(user_message(&err)),
                }
            }
            AppMessage::ContactsSearched { request_id, result } => {
                if !self.accept(RequestScope::ContactSearch, request_id, &result) {
                    return;
                }
                let search = &mut self.contacts.search;
                search.loading = false;
                match result {
                    Ok(results) => {
                        search.results = results;
                        search.error = None;
                    }
                    Err(err) => search.error = Some(user_message(&err)),
                }
            }
            AppMessage::ContactAdded(result) => {
                self.contacts.adding = false;
                match result {
                    Ok(contact) => {
                        info!(contact_id = %contact.id, "contact added");
                        self.contacts.add_input.clear();
                        self.contacts.contacts.push(contact);
                        self.cache.invalidate_contacts();
                    }
                    Err(err) => self.contacts.error = Some(user_message(&err)),
                }
            }
            AppMessage::ContactRemoved { contact_id, result } => match result {
                Ok(()) => {
                    self.contacts.contacts.retain(|c| c.id != contact_id);
                    self.contacts.search.results.retain(|c| c.id != contact_id);
                    self.cache.invalidate_contacts();
                }
                Err(err) => self.contacts.error = Some(user_message(&err)),
            },
            AppMessage::MembersSearched {
                request_id,
                event_id,
                result,
            } => {
                if !self.accept(RequestScope::MemberSearch, request_id, &result) {
                    return;
                }
                if self.members.event_id.as_deref() != Some(event_id.as_str()) {
                    return;
                }
                self.members.loading = false;
                match result {
                    Ok(results) => {
                        self.members.results = results;
                        self.members.error = None;
                    }
                    Err(err) => self.members.error = Some(user_message(&err)),
                }
            }
            AppMessage::MembersAdded { event_id, result } => {
                self.members.adding = false;
                match result {
                    Ok(added) => {
                        info!(event_id = %event_id, added = added.len(), "members added");
                        self.members.selected.clear();
                        self.cache.invalidate(&QueryKey::event_members(&event_id));
                        self.cache.invalidate_exact(&QueryKey::event_detail(&event_id));
                    }
                    Err(err) => self.members.error = Some(user_message(&err)),
                }
            }
            AppMessage::PocketCreated(result) => {
                let Some(wizard) = self.create_pocket.as_mut() else {
                    return;
                };
                wizard.submitting = false;
                match result {
                    Ok(pocket) => {
                        info!(pocket_id = %pocket.id, "pocket created");
                        self.create_pocket = None;
                        self.cache.invalidate_after_pocket_change(None);
                        self.info_banner = Some(format!("Created {}", pocket.name));
                        self.spawn_load_pockets();
                    }
                    Err(err) => wizard.error = Some(user_message(&err)),
                }
            }
            AppMessage::EventCreated { session, result } => {
                self.handle_event_created(session, result);
            }
            AppMessage::FilesOpened {
                session,
                files,
                errors,
            } => {
                if let Some(upload) = self.upload_session_mut(session) {
                    if !errors.is_empty() {
                        upload.error = Some(errors.join("\n"));
                    }
                }
                self.start_uploads(session, files);
            }
            AppMessage::Upload {
                session,
                file_id,
                event,
            } => {
                let Some(upload) = self.upload_session_mut(session) else {
                    debug!(%session, %file_id, "upload report for a closed session");
                    return;
                };
                if matches!(event, UploadEvent::Finished(_)) {
                    upload.tasks.remove(&file_id);
                }
                if let UploadEvent::Finished(Err(message)) = &event {
                    warn!(%file_id, error = %message, "upload failed");
                }
                upload.tracker.apply(file_id, event);
            }
            AppMessage::PhotosClaimed { session, result } => {
                self.handle_photos_claimed(session, result);
            }
            AppMessage::FavoriteSet {
                event_id,
                photo_id,
                favorite,
                result,
            } => {
                self.photos.busy.remove(&photo_id);
                match result {
                    Ok(()) => {
                        if let Some(photo) = self.photos.photos.iter_mut().find(|p| p.id == photo_id) {
                            photo.is_favorite = favorite;
                        }
                        let pocket_id = self.photos.pocket_id.clone();
                        self.cache
                            .invalidate_after_photo_mutation(&event_id, pocket_id.as_deref());
                    }
                    Err(err) => self.photos.error = Some(user_message(&err)),
                }
            }
            AppMessage::PhotoDeleted {
                event_id,
                photo_id,
                result,
            } => {
                self.photos.busy.remove(&photo_id);
                match result {
                    Ok(()) => {
                        info!(photo_id = %photo_id, "photo deleted");
                        self.photos.photos.retain(|p| p.id != photo_id);
                        let pocket_id = self.photos.pocket_id.clone();
                        self.cache
                            .invalidate_after_photo_mutation(&event_id, pocket_id.as_deref());
                    }
                    Err(err) => self.photos.error = Some(user_message(&err)),
                }
            }
            AppMessage::VoiceNoteDuration { preview, duration } => {
                if self.voice_note.recorder.preview() == Some(preview) {
                    self.voice_note.player.set_duration(duration);
                }
            }
            AppMessage::VoiceNoteUploaded(result) => {
                let recorder = &mut self.voice_note.recorder;
                let outcome = match result {
                    Ok(key) => recorder.finish_upload(key.clone()).map(|()| Some(key)),
                    Err(message) => recorder.fail_upload(message).map(|()| None),
                };
                match outcome {
                    Ok(Some(key)) => {
                        info!(object_key = %key, "voice note posted");
                        if let Some(notify) = self.voice_note.on_posted.take() {
                            notify(&key);
                        }
                    }
                    Ok(None) => {}
                    Err(err) => debug!(error = %err, "voice note upload result ignored"),
                }
            }
        }
    }

    /// Applies a superseding response only if it is still the newest one.
    /// Cancelled requests are dropped silently.
    fn accept<T>(&mut self, scope: RequestScope, request_id: u64, result: &Result<T, ApiError>) -> bool {
        if matches!(result, Err(err) if err.is_cancelled()) {
            return false;
        }
        if !self.requests.finish(scope, request_id) {
            debug!(?scope, request_id, "dropping superseded response");
            return false;
        }
        true
    }

    fn handle_event_created(&mut self, session: Uuid, result: Result<Event, ApiError>) {
        let Some(wizard) = self.create_event.as_mut() else {
            return;
        };
        if wizard.uploads.id != session {
            return;
        }
        match result {
            Ok(event) => {
                info!(event_id = %event.id, "event created");
                self.cache
                    .invalidate_after_event_change(&event.id, &wizard.pocket_id);
                wizard.uploads.target = Some(UploadTarget {
                    event_id: event.id.clone(),
                    pocket_id: Some(wizard.pocket_id.clone()),
                });
                let name = event.name.clone();
                wizard.created = Some(event);
                if wizard.uploads.tracker.is_empty() {
                    self.finish_event_wizard(&name);
                } else {
                    self.spawn_claim(session);
                }
            }
            Err(err) => {
                wizard.submitting = false;
                wizard.error = Some(user_message(&err));
            }
        }
    }

    fn handle_photos_claimed(&mut self, session: Uuid, result: Result<Vec<Photo>, ClaimError>) {
        let in_wizard = self
            .create_event
            .as_ref()
            .is_some_and(|wizard| wizard.uploads.id == session);
        let cache = &mut self.cache;
        let upload = if in_wizard {
            self.create_event.as_mut().map(|wizard| &mut wizard.uploads)
        } else {
            self.upload.as_mut().filter(|upload| upload.id == session)
        };
        let Some(upload) = upload else {
            debug!(%session, "claim finished for a closed session");
            return;
        };
        upload.submitting = false;

        let photos = match result {
            Ok(photos) => photos,
            Err(err) => {
                warn!(%session, error = %err, "claim failed");
                let message = user_message(&err);
                upload.error = Some(message.clone());
                if let Some(wizard) = self.create_event.as_mut().filter(|_| in_wizard) {
                    wizard.submitting = false;
                    wizard.error = Some(message);
                }
                return;
            }
        };
        let Some(target) = upload.target.clone() else {
            return;
        };
        let on_claimed = upload.on_claimed.take();
        complete_claim(
            &mut upload.tracker,
            cache,
            &target.event_id,
            target.pocket_id.as_deref(),
            &photos,
            on_claimed,
        );

        if in_wizard {
            let name = self
                .create_event
                .as_ref()
                .and_then(|wizard| wizard.created.as_ref())
                .map(|event| event.name.clone())
                .unwrap_or_default();
            self.finish_event_wizard(&name);
        } else {
            self.upload = None;
            self.info_banner = Some(format!("Added {} photos", photos.len()));
        }

        if self.photos.event_id.as_deref() == Some(target.event_id.as_str()) {
            self.spawn_load_event_photos(target.event_id.clone(), target.pocket_id.clone());
        }
    }

    pub(super) fn finish_event_wizard(&mut self, name: &str) {
        self.create_event = None;
        self.info_banner = Some(format!("Created {name}"));
        if let Some(pocket_id) = self.events.pocket_id.clone() {
            self.spawn_load_events(&pocket_id);
        }
    }
}
