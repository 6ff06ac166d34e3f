use bytes::Bytes;
use tracing::{info, warn};

use crate::error::RecorderError;
use crate::local_store::{SortOrder, ViewMode};
use crate::models::{AddContactInput, ChangePasswordInput, UpdateProfileInput};
use crate::requests::RequestScope;

use super::state::{
    sort_pockets, EventsViewState, MemberSearchState, PocketsViewState, VoiceNotePosted,
    VoiceNoteState,
};
use super::tasks;
use super::PocketsApp;

const MIN_PASSWORD_LEN: usize = 8;

impl PocketsApp {
    // Account

    pub fn login(&mut self, email: &str, password: &str) {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            self.identity.error = Some("Enter your email and password".into());
            return;
        }
        if self.identity.logging_in {
            return;
        }
        self.identity.logging_in = true;
        self.identity.error = None;
        tasks::login(
            &self.runtime,
            self.backend.clone(),
            self.tx.clone(),
            email.to_string(),
            password.to_string(),
        );
    }

    /// Forgets the session, the cached identity and everything fetched for it.
    pub fn logout(&mut self) {
        self.session.clear();
        if let Err(err) = self.prefs.set_cached_user(None) {
            warn!(error = ?err, "failed to clear cached user");
        }
        self.cache.clear();
        for scope in [
            RequestScope::ContactSearch,
            RequestScope::MemberSearch,
            RequestScope::PocketList,
            RequestScope::EventList,
            RequestScope::EventPhotos,
        ] {
            self.requests.cancel(scope);
        }
        self.identity = Default::default();
        self.settings = Default::default();
        self.pockets = PocketsViewState {
            sort: self.pockets.sort,
            ..Default::default()
        };
        self.events = EventsViewState {
            view_mode: self.events.view_mode,
            ..Default::default()
        };
        self.photos = Default::default();
        self.contacts = Default::default();
        self.members = Default::default();
        self.upload = None;
        self.create_pocket = None;
        self.create_event = None;
        self.voice_note = VoiceNoteState::new(self.previews.clone());
        info!("signed out");
    }

    pub fn load_profile(&mut self) {
        self.settings.loading = true;
        self.settings.error = None;
        tasks::load_profile(&self.runtime, self.backend.clone(), self.tx.clone());
    }

    pub fn save_display_name(&mut self) {
        let name = self.settings.display_name_input.trim().to_string();
        if name.is_empty() {
            self.settings.error = Some("Display name cannot be empty".into());
            return;
        }
        self.settings.saving = true;
        self.settings.error = None;
        self.settings.notice = None;
        let input = UpdateProfileInput {
            display_name: Some(name),
            ..Default::default()
        };
        tasks::update_profile(&self.runtime, self.backend.clone(), self.tx.clone(), input);
    }

    pub fn change_password(&mut self) {
        let settings = &mut self.settings;
        settings.notice = None;
        if settings.current_password.is_empty() {
            settings.error = Some("Enter your current password".into());
            return;
        }
        if settings.new_password.chars().count() < MIN_PASSWORD_LEN {
            settings.error = Some(format!(
                "New password must be at least {MIN_PASSWORD_LEN} characters"
            ));
            return;
        }
        settings.saving = true;
        settings.error = None;
        let input = ChangePasswordInput {
            current_password: settings.current_password.clone(),
            new_password: settings.new_password.clone(),
        };
        tasks::change_password(&self.runtime, self.backend.clone(), self.tx.clone(), input);
    }

    // Preferences

    pub fn set_events_view_mode(&mut self, mode: ViewMode) {
        self.events.view_mode = mode;
        if let Err(err) = self.prefs.set_events_view_mode(mode) {
            warn!(error = ?err, "failed to save view mode");
        }
    }

    pub fn set_pockets_sort(&mut self, order: SortOrder) {
        self.pockets.sort = order;
        sort_pockets(&mut self.pockets.pockets, order);
        if let Err(err) = self.prefs.set_pockets_sort(order) {
            warn!(error = ?err, "failed to save sort order");
        }
    }

    pub fn last_selected_card(&self) -> Option<String> {
        self.prefs.last_selected_card()
    }

    pub fn select_card(&mut self, card_id: Option<&str>) {
        if let Err(err) = self.prefs.set_last_selected_card(card_id) {
            warn!(error = ?err, "failed to save selected card");
        }
    }

    // Contacts

    /// Runs a contact search, superseding the previous one. An empty query
    /// clears the results.
    pub fn search_contacts(&mut self, query: &str) {
        let search = &mut self.contacts.search;
        search.query = query.to_string();
        search.error = None;
        let query = query.trim();
        if query.is_empty() {
            self.requests.cancel(RequestScope::ContactSearch);
            search.results.clear();
            search.loading = false;
            return;
        }
        search.loading = true;
        let ticket = self.requests.begin(RequestScope::ContactSearch);
        tasks::search_contacts(
            &self.runtime,
            self.backend.clone(),
            self.tx.clone(),
            ticket,
            query.to_string(),
        );
    }

    /// Adds a contact by email, or by phone number when there is no `@`.
    pub fn add_contact(&mut self) {
        let raw = self.contacts.add_input.trim().to_string();
        if raw.is_empty() {
            self.contacts.error = Some("Enter an email or phone number".into());
            return;
        }
        let input = if raw.contains('@') {
            AddContactInput {
                email: Some(raw),
                phone: None,
            }
        } else if raw.chars().all(|c| c.is_ascii_digit() || "+-() ".contains(c)) {
            AddContactInput {
                email: None,
                phone: Some(raw),
            }
        } else {
            self.contacts.error = Some("That is not an email or phone number".into());
            return;
        };
        self.contacts.adding = true;
        self.contacts.error = None;
        tasks::add_contact(&self.runtime, self.backend.clone(), self.tx.clone(), input);
    }

    pub fn set_contact_input(&mut self, text: &str) {
        self.contacts.add_input = text.to_string();
    }

    pub fn remove_contact(&mut self, contact_id: &str) {
        tasks::remove_contact(
            &self.runtime,
            self.backend.clone(),
            self.tx.clone(),
            contact_id.to_string(),
        );
    }

    // Event members

    pub fn open_member_search(&mut self, event_id: &str) {
        self.requests.cancel(RequestScope::MemberSearch);
        self.members = MemberSearchState {
            event_id: Some(event_id.to_string()),
            ..Default::default()
        };
    }

    pub fn search_members(&mut self, query: &str) {
        let Some(event_id) = self.members.event_id.clone() else {
            return;
        };
        self.members.query = query.to_string();
        self.members.error = None;
        let query = query.trim();
        if query.is_empty() {
            self.requests.cancel(RequestScope::MemberSearch);
            self.members.results.clear();
            self.members.loading = false;
            return;
        }
        self.members.loading = true;
        let ticket = self.requests.begin(RequestScope::MemberSearch);
        tasks::search_members(
            &self.runtime,
            self.backend.clone(),
            self.tx.clone(),
            ticket,
            event_id,
            query.to_string(),
        );
    }

    pub fn toggle_member_selection(&mut self, user_id: &str) {
        if !self.members.selected.remove(user_id) {
            self.members.selected.insert(user_id.to_string());
        }
    }

    pub fn add_selected_members(&mut self) {
        let Some(event_id) = self.members.event_id.clone() else {
            return;
        };
        if self.members.selected.is_empty() {
            self.members.error = Some("Select at least one person".into());
            return;
        }
        if self.members.adding {
            return;
        }
        self.members.adding = true;
        self.members.error = None;
        let user_ids = self.members.selected.iter().cloned().collect();
        tasks::add_members(&self.runtime, self.backend.clone(), self.tx.clone(), event_id, user_ids);
    }

    // Photo grid

    pub fn toggle_favorite(&mut self, photo_id: &str) {
        let Some(event_id) = self.photos.event_id.clone() else {
            return;
        };
        let Some(photo) = self.photos.photos.iter().find(|p| p.id == photo_id) else {
            return;
        };
        let favorite = !photo.is_favorite;
        if !self.photos.busy.insert(photo_id.to_string()) {
            return;
        }
        tasks::set_favorite(
            &self.runtime,
            self.backend.clone(),
            self.tx.clone(),
            event_id,
            photo_id.to_string(),
            favorite,
        );
    }

    pub fn delete_photo(&mut self, photo_id: &str) {
        let Some(event_id) = self.photos.event_id.clone() else {
            return;
        };
        if !self.photos.photos.iter().any(|p| p.id == photo_id) {
            return;
        }
        if !self.photos.busy.insert(photo_id.to_string()) {
            return;
        }
        tasks::delete_photo(
            &self.runtime,
            self.backend.clone(),
            self.tx.clone(),
            event_id,
            photo_id.to_string(),
        );
    }

    // Voice notes

    pub fn start_voice_note(&mut self, mime: &str) -> Result<(), RecorderError> {
        self.voice_note.player.stop();
        self.voice_note.recorder.start(mime)
    }

    pub fn push_voice_chunk(&mut self, chunk: Bytes) -> Result<(), RecorderError> {
        self.voice_note.recorder.push_chunk(chunk)
    }

    /// Ends the capture and starts working out how long the take is.
    pub fn stop_voice_note(&mut self) -> Result<(), RecorderError> {
        let preview = self.voice_note.recorder.stop()?;
        let Some(bytes) = self.voice_note.recorder.recording().cloned() else {
            return Err(RecorderError::EmptyRecording);
        };
        self.voice_note.player = Default::default();
        tasks::resolve_voice_note_duration(
            &self.runtime,
            self.tx.clone(),
            preview,
            bytes,
            self.config.media.audio_probe_budget,
        );
        Ok(())
    }

    pub fn rerecord_voice_note(&mut self) -> Result<(), RecorderError> {
        self.voice_note.player = Default::default();
        self.voice_note.recorder.rerecord()
    }

    pub fn cancel_voice_note(&mut self) -> Result<(), RecorderError> {
        self.voice_note.recorder.cancel()?;
        self.voice_note.player = Default::default();
        self.voice_note.on_posted = None;
        Ok(())
    }

    /// Uploads the take. `on_posted` receives the object key once stored.
    pub fn post_voice_note(&mut self, on_posted: Option<VoiceNotePosted>) -> Result<(), RecorderError> {
        let file = self.voice_note.recorder.begin_upload()?;
        self.voice_note.on_posted = on_posted;
        tasks::upload_voice_note(&self.runtime, self.backend.clone(), self.tx.clone(), file);
        Ok(())
    }

    pub fn play_voice_note(&mut self) {
        let Some(bytes) = self.voice_note.recorder.recording().cloned() else {
            return;
        };
        self.voice_note.player.play(bytes);
    }

    pub fn pause_voice_note(&mut self) {
        self.voice_note.player.toggle_pause();
    }
}
