//! Headless application state: what a UI renders from and calls into.
//!
//! Every backend call runs on the tokio runtime and reports back through an
//! `AppMessage`; `process_messages` folds those results into state on the
//! caller's thread, so state is only ever mutated there.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

use anyhow::Result;
use tokio::runtime::Handle;
use tracing::warn;
use uuid::Uuid;

use crate::api::ApiClient;
use crate::backend::PocketsBackend;
use crate::cache::{QueryCache, QueryKey};
use crate::config::FrontendConfig;
use crate::local_store::LocalStore;
use crate::media::PreviewStore;
use crate::models::User;
use crate::requests::RequestTracker;
use crate::session::Session;

mod handlers_misc;
mod handlers_uploads;
mod handlers_wizards;
mod messages;
mod spawners;
pub mod state;
mod tasks;


pub use messages::AppMessage;
use state::{
    ContactsState, CreateEventWizard, CreatePocketWizard, EventsViewState, IdentityState,
    MemberSearchState, PhotoGridState, PocketsViewState, SettingsState, UploadSession,
    VoiceNoteState,
};

pub struct PocketsApp {
    config: FrontendConfig,
    backend: Arc<dyn PocketsBackend>,
    session: Session,
    runtime: Handle,
    tx: Sender<AppMessage>,
    rx: Receiver<AppMessage>,
    cache: QueryCache,
    prefs: LocalStore,
    previews: PreviewStore,
    requests: RequestTracker,
    identity: IdentityState,
    settings: SettingsState,
    pockets: PocketsViewState,
    events: EventsViewState,
    photos: PhotoGridState,
    contacts: ContactsState,
    members: MemberSearchState,
    upload: Option<UploadSession>,
    create_pocket: Option<CreatePocketWizard>,
    create_event: Option<CreateEventWizard>,
    voice_note: VoiceNoteState,
    info_banner: Option<String>,
}

impl PocketsApp {
    /// Wires the HTTP client and the on-disk preferences from `config`.
    pub fn new(config: FrontendConfig, runtime: Handle) -> Result<Self> {
        let session = Session::new();
        let client = ApiClient::from_config(&config, session.clone())?;
        let prefs = LocalStore::open(config.local_store_path())?;
        Ok(Self::with_backend(config, Arc::new(client), session, prefs, runtime))
    }

    pub fn with_backend(
        config: FrontendConfig,
        backend: Arc<dyn PocketsBackend>,
        session: Session,
        prefs: LocalStore,
        runtime: Handle,
    ) -> Self {
        let (tx, rx) = mpsc::channel();
        let previews = PreviewStore::new();
        let mut cache = QueryCache::new(config.cache.stale_after);
        let cached_user = prefs.cached_user();
        if let Some(user) = &cached_user {
            cache.set(QueryKey::me(), user);
        }
        let pockets = PocketsViewState {
            sort: prefs.pockets_sort(),
            ..Default::default()
        };
        let events = EventsViewState {
            view_mode: prefs.events_view_mode(),
            ..Default::default()
        };
        Self {
            config,
            backend,
            session,
            runtime,
            tx,
            rx,
            cache,
            prefs,
            previews: previews.clone(),
            requests: RequestTracker::new(),
            identity: IdentityState {
                user: cached_user,
                ..Default::default()
            },
            settings: SettingsState::default(),
            pockets,
            events,
            photos: PhotoGridState::default(),
            contacts: ContactsState::default(),
            members: MemberSearchState::default(),
            upload: None,
            create_pocket: None,
            create_event: None,
            voice_note: VoiceNoteState::new(previews),
            info_banner: None,
        }
    }

    pub fn config(&self) -> &FrontendConfig {
        &self.config
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn prefs(&self) -> &LocalStore {
        &self.prefs
    }

    pub fn previews(&self) -> &PreviewStore {
        &self.previews
    }

    pub fn identity(&self) -> &IdentityState {
        &self.identity
    }

    pub fn settings(&self) -> &SettingsState {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut SettingsState {
        &mut self.settings
    }

    pub fn pockets(&self) -> &PocketsViewState {
        &self.pockets
    }

    pub fn events(&self) -> &EventsViewState {
        &self.events
    }

    pub fn photos(&self) -> &PhotoGridState {
        &self.photos
    }

    pub fn contacts(&self) -> &ContactsState {
        &self.contacts
    }

    pub fn members(&self) -> &MemberSearchState {
        &self.members
    }

    pub fn upload_session(&self) -> Option<&UploadSession> {
        self.upload.as_ref()
    }

    pub fn pocket_wizard(&self) -> Option<&CreatePocketWizard> {
        self.create_pocket.as_ref()
    }

    pub fn pocket_wizard_mut(&mut self) -> Option<&mut CreatePocketWizard> {
        self.create_pocket.as_mut()
    }

    pub fn event_wizard(&self) -> Option<&CreateEventWizard> {
        self.create_event.as_ref()
    }

    pub fn event_wizard_mut(&mut self) -> Option<&mut CreateEventWizard> {
        self.create_event.as_mut()
    }

    pub fn voice_note(&self) -> &VoiceNoteState {
        &self.voice_note
    }

    pub fn info_banner(&self) -> Option<&str> {
        self.info_banner.as_deref()
    }

    pub fn dismiss_banner(&mut self) {
        self.info_banner = None;
    }

    /// The upload session with `id`, whether it is the standalone dialog or
    /// the event wizard's photos step.
    fn upload_session_mut(&mut self, id: Uuid) -> Option<&mut UploadSession> {
        if self.upload.as_ref().is_some_and(|upload| upload.id == id) {
            return self.upload.as_mut();
        }
        self.create_event
            .as_mut()
            .map(|wizard| &mut wizard.uploads)
            .filter(|upload| upload.id == id)
    }

    fn remember_user(&mut self, user: &User) {
        self.cache.set(QueryKey::me(), user);
        if let Err(err) = self.prefs.set_cached_user(Some(user)) {
            warn!(error = ?err, "failed to cache user");
        }
    }
}
