use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::audio::{VoiceNotePlayer, VoiceNoteRecorder};
use crate::local_store::{SortOrder, ViewMode};
use crate::media::PreviewStore;
use crate::models::{Contact, Event, Member, Photo, Pocket, User};
use crate::upload::{ClaimCallback, UploadTracker};

/// Where a batch of uploads is claimed into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    pub event_id: String,
    pub pocket_id: Option<String>,
}

/// One selection of files being uploaded and later claimed. Used by the
/// "add photos" dialog and by the photos step of the event wizard.
pub struct UploadSession {
    pub id: Uuid,
    pub target: Option<UploadTarget>,
    pub tracker: UploadTracker,
    pub submitting: bool,
    pub error: Option<String>,
    pub(crate) on_claimed: Option<ClaimCallback>,
    pub(crate) tasks: HashMap<Uuid, JoinHandle<()>>,
}

impl UploadSession {
    pub fn new(previews: PreviewStore, target: Option<UploadTarget>) -> Self {
        Self {
            id: Uuid::new_v4(),
            target,
            tracker: UploadTracker::new(previews),
            submitting: false,
            error: None,
            on_claimed: None,
            tasks: HashMap::new(),
        }
    }

    pub(crate) fn abort_file(&mut self, file_id: Uuid) {
        if let Some(task) = self.tasks.remove(&file_id) {
            task.abort();
        }
    }
}

impl Drop for UploadSession {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

#[derive(Default)]
pub struct IdentityState {
    pub user: Option<User>,
    pub logging_in: bool,
    pub error: Option<String>,
}

#[derive(Default)]
pub struct SettingsState {
    pub display_name_input: String,
    pub current_password: String,
    pub new_password: String,
    pub loading: bool,
    pub saving: bool,
    pub error: Option<String>,
    pub notice: Option<String>,
}

#[derive(Default)]
pub struct PocketsViewState {
    pub pockets: Vec<Pocket>,
    pub sort: SortOrder,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Default)]
pub struct EventsViewState {
    pub pocket_id: Option<String>,
    pub events: Vec<Event>,
    pub view_mode: ViewMode,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Default)]
pub struct PhotoGridState {
    pub event_id: Option<String>,
    pub pocket_id: Option<String>,
    pub photos: Vec<Photo>,
    pub loading: bool,
    pub error: Option<String>,
    /// Photo ids with a favorite or delete request in flight.
    pub busy: BTreeSet<String>,
}

#[derive(Default)]
pub struct ContactSearchState {
    pub query: String,
    pub results: Vec<Contact>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Default)]
pub struct ContactsState {
    pub contacts: Vec<Contact>,
    pub loading: bool,
    pub error: Option<String>,
    pub add_input: String,
    pub adding: bool,
    pub search: ContactSearchState,
}

#[derive(Default)]
pub struct MemberSearchState {
    pub event_id: Option<String>,
    pub query: String,
    pub results: Vec<Member>,
    pub selected: BTreeSet<String>,
    pub loading: bool,
    pub adding: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PocketWizardStep {
    #[default]
    Details,
    Members,
    Review,
}

#[derive(Default)]
pub struct CreatePocketWizard {
    pub step: PocketWizardStep,
    pub name: String,
    pub description: String,
    pub member_ids: BTreeSet<String>,
    pub submitting: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventWizardStep {
    #[default]
    Details,
    Members,
    Photos,
    Review,
}

pub struct CreateEventWizard {
    pub pocket_id: String,
    pub step: EventWizardStep,
    pub name: String,
    pub date: Option<NaiveDate>,
    pub member_ids: BTreeSet<String>,
    pub uploads: UploadSession,
    pub submitting: bool,
    pub error: Option<String>,
    /// Set once the event exists, so a failed claim is retried without
    /// creating the event twice.
    pub created: Option<Event>,
}

impl CreateEventWizard {
    pub fn new(pocket_id: String, previews: PreviewStore) -> Self {
        Self {
            pocket_id,
            step: EventWizardStep::Details,
            name: String::new(),
            date: None,
            member_ids: BTreeSet::new(),
            uploads: UploadSession::new(previews, None),
            submitting: false,
            error: None,
            created: None,
        }
    }
}

pub type VoiceNotePosted = Box<dyn FnOnce(&str) + Send>;

pub struct VoiceNoteState {
    pub recorder: VoiceNoteRecorder,
    pub player: VoiceNotePlayer,
    pub(crate) on_posted: Option<VoiceNotePosted>,
}

impl VoiceNoteState {
    pub fn new(previews: PreviewStore) -> Self {
        Self {
            recorder: VoiceNoteRecorder::new(previews),
            player: VoiceNotePlayer::new(),
            on_posted: None,
        }
    }
}

/// Pockets in display order for the chosen sort.
pub fn sort_pockets(pockets: &mut [Pocket], order: SortOrder) {
    match order {
        SortOrder::Newest => pockets.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        SortOrder::Oldest => pockets.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        SortOrder::Name => pockets.sort_by_key(|pocket| pocket.name.to_lowercase()),
    }
}

/// Newest event first; undated events after dated ones.
pub fn sort_events(events: &mut [Event]) {
    events.sort_by(|a, b| match (a.date, b.date) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => b.created_at.cmp(&a.created_at),
    });
}
