//! Scripted in-memory backend for orchestration tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{TimeZone, Utc};

use crate::backend::{PocketsBackend, ProgressFn};
use crate::error::ApiError;
use crate::models::{
    AddContactInput, AuthTokens, ChangePasswordInput, ClaimPhotosInput, ClaimPhotosResponse,
    Contact, CreateEventInput, CreatePocketInput, Event, LoginResponse, Member, MemberRole, Photo,
    Pocket, PresignRequest, UpdateProfileInput, UploadDestination, User,
};

#[derive(Default)]
struct FakeState {
    failing_ops: HashSet<&'static str>,
    presign_failures: HashSet<String>,
    transfer_failures: HashSet<String>,
    transfer_delays: HashMap<String, Duration>,
    presign_calls: usize,
    transferred: Vec<(String, usize)>,
    claims: Vec<ClaimPhotosInput>,
    claim_delay: Option<Duration>,
    contact_searches: HashMap<String, (Duration, Vec<Contact>)>,
    member_searches: HashMap<String, (Duration, Vec<Member>)>,
    pockets: Vec<Pocket>,
    events: HashMap<String, Vec<Event>>,
    event_delays: HashMap<String, Duration>,
    photos: HashMap<String, Vec<Photo>>,
    photo_load_delays: VecDeque<Duration>,
    contacts: Vec<Contact>,
    created_pockets: Vec<CreatePocketInput>,
    created_events: Vec<CreateEventInput>,
    favorites: Vec<(String, bool)>,
    deleted_photos: Vec<String>,
    user: Option<User>,
    password_changes: usize,
    calls: Vec<&'static str>,
}

#[derive(Default)]
pub struct FakeBackend {
    state: Mutex<FakeState>,
}

pub fn timestamp() -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

pub fn pocket(id: &str, name: &str) -> Pocket {
    Pocket {
        id: id.into(),
        name: name.into(),
        description: None,
        created_at: timestamp(),
        event_count: 0,
        photo_count: 0,
        cover_url: None,
        members: Vec::new(),
    }
}

pub fn event(id: &str, pocket_id: &str, name: &str) -> Event {
    Event {
        id: id.into(),
        pocket_id: pocket_id.into(),
        name: name.into(),
        date: None,
        created_at: timestamp(),
        photo_count: 0,
        cover_url: None,
        members: Vec::new(),
    }
}

pub fn photo(id: &str, event_id: &str) -> Photo {
    Photo {
        id: id.into(),
        event_id: event_id.into(),
        url: format!("https://cdn.test/{id}"),
        thumbnail_url: None,
        kind: crate::models::MediaKind::Image,
        is_favorite: false,
        uploaded_by: None,
        created_at: timestamp(),
        width: None,
        height: None,
    }
}

pub fn contact(id: &str, name: &str) -> Contact {
    Contact {
        id: id.into(),
        user_id: format!("user-{id}"),
        name: name.into(),
        email: None,
        phone: None,
    }
}

pub fn member(user_id: &str, name: &str) -> Member {
    Member {
        user_id: user_id.into(),
        display_name: Some(name.into()),
        role: MemberRole::Member,
    }
}

pub fn user() -> User {
    User {
        id: "u1".into(),
        email: "me@example.com".into(),
        display_name: Some("Me".into()),
        phone: None,
        avatar_url: None,
    }
}

fn boom(op: &str) -> ApiError {
    ApiError::Status {
        status: 500,
        message: format!("{op} failed"),
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    fn enter(&self, op: &'static str) -> Result<(), ApiError> {
        self.with(|state| {
            state.calls.push(op);
            if state.failing_ops.contains(op) {
                Err(boom(op))
            } else {
                Ok(())
            }
        })
    }

    pub fn fail(&self, op: &'static str) {
        self.with(|state| state.failing_ops.insert(op));
    }

    pub fn fail_presign_for(&self, file_name: &str) {
        self.with(|state| state.presign_failures.insert(file_name.to_string()));
    }

    pub fn fail_transfer_for(&self, file_name: &str) {
        self.with(|state| state.transfer_failures.insert(file_name.to_string()));
    }

    pub fn delay_transfer_for(&self, file_name: &str, delay: Duration) {
        self.with(|state| state.transfer_delays.insert(file_name.to_string(), delay));
    }

    pub fn fail_claims(&self) {
        self.fail("claim_photos");
    }

    pub fn delay_claims(&self, delay: Duration) {
        self.with(|state| state.claim_delay = Some(delay));
    }

    pub fn script_contact_search(&self, query: &str, delay: Duration, results: Vec<Contact>) {
        self.with(|state| state.contact_searches.insert(query.to_string(), (delay, results)));
    }

    pub fn script_member_search(&self, query: &str, delay: Duration, results: Vec<Member>) {
        self.with(|state| state.member_searches.insert(query.to_string(), (delay, results)));
    }

    pub fn set_pockets(&self, pockets: Vec<Pocket>) {
        self.with(|state| state.pockets = pockets);
    }

    pub fn set_events(&self, pocket_id: &str, events: Vec<Event>) {
        self.with(|state| state.events.insert(pocket_id.to_string(), events));
    }

    pub fn delay_events_for(&self, pocket_id: &str, delay: Duration) {
        self.with(|state| state.event_delays.insert(pocket_id.to_string(), delay));
    }

    /// The next photo listing answers with the photos as they are now, but
    /// only after `delay`.
    pub fn delay_next_photo_load(&self, delay: Duration) {
        self.with(|state| state.photo_load_delays.push_back(delay));
    }

    pub fn set_photos(&self, event_id: &str, photos: Vec<Photo>) {
        self.with(|state| state.photos.insert(event_id.to_string(), photos));
    }

    pub fn set_contacts(&self, contacts: Vec<Contact>) {
        self.with(|state| state.contacts = contacts);
    }

    pub fn presign_calls(&self) -> usize {
        self.with(|state| state.presign_calls)
    }

    pub fn transferred(&self) -> Vec<(String, usize)> {
        self.with(|state| state.transferred.clone())
    }

    pub fn claims(&self) -> Vec<ClaimPhotosInput> {
        self.with(|state| state.claims.clone())
    }

    pub fn created_pockets(&self) -> Vec<CreatePocketInput> {
        self.with(|state| state.created_pockets.clone())
    }

    pub fn created_events(&self) -> Vec<CreateEventInput> {
        self.with(|state| state.created_events.clone())
    }

    pub fn favorites(&self) -> Vec<(String, bool)> {
        self.with(|state| state.favorites.clone())
    }

    pub fn deleted_photos(&self) -> Vec<String> {
        self.with(|state| state.deleted_photos.clone())
    }

    pub fn password_changes(&self) -> usize {
        self.with(|state| state.password_changes)
    }

    pub fn call_count(&self, op: &str) -> usize {
        self.with(|state| state.calls.iter().filter(|call| **call == op).count())
    }
}

#[async_trait]
impl PocketsBackend for FakeBackend {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        self.enter("login")?;
        if password.is_empty() {
            return Err(ApiError::Unauthorized);
        }
        let mut user = user();
        user.email = email.to_string();
        self.with(|state| state.user = Some(user.clone()));
        Ok(LoginResponse {
            tokens: AuthTokens {
                access_token: "access".into(),
                refresh_token: "refresh".into(),
            },
            user,
        })
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        self.enter("current_user")?;
        Ok(self.with(|state| state.user.clone()).unwrap_or_else(user))
    }

    async fn update_profile(&self, input: &UpdateProfileInput) -> Result<User, ApiError> {
        self.enter("update_profile")?;
        Ok(self.with(|state| {
            let mut current = state.user.clone().unwrap_or_else(user);
            if let Some(name) = &input.display_name {
                current.display_name = Some(name.clone());
            }
            if let Some(phone) = &input.phone {
                current.phone = Some(phone.clone());
            }
            state.user = Some(current.clone());
            current
        }))
    }

    async fn change_password(&self, _input: &ChangePasswordInput) -> Result<(), ApiError> {
        self.enter("change_password")?;
        self.with(|state| state.password_changes += 1);
        Ok(())
    }

    async fn list_pockets(&self) -> Result<Vec<Pocket>, ApiError> {
        self.enter("list_pockets")?;
        Ok(self.with(|state| state.pockets.clone()))
    }

    async fn get_pocket(&self, pocket_id: &str) -> Result<Pocket, ApiError> {
        self.enter("get_pocket")?;
        self.with(|state| state.pockets.iter().find(|p| p.id == pocket_id).cloned())
            .ok_or_else(|| ApiError::Status {
                status: 404,
                message: "pocket not found".into(),
            })
    }

    async fn create_pocket(&self, input: &CreatePocketInput) -> Result<Pocket, ApiError> {
        self.enter("create_pocket")?;
        Ok(self.with(|state| {
            state.created_pockets.push(input.clone());
            let mut created = pocket(&format!("pk{}", state.created_pockets.len()), &input.name);
            created.description = input.description.clone();
            state.pockets.push(created.clone());
            created
        }))
    }

    async fn list_events(&self, pocket_id: &str) -> Result<Vec<Event>, ApiError> {
        self.enter("list_events")?;
        if let Some(delay) = self.with(|state| state.event_delays.get(pocket_id).copied()) {
            tokio::time::sleep(delay).await;
        }
        Ok(self.with(|state| state.events.get(pocket_id).cloned().unwrap_or_default()))
    }

    async fn get_event(&self, event_id: &str) -> Result<Event, ApiError> {
        self.enter("get_event")?;
        self.with(|state| {
            state
                .events
                .values()
                .flatten()
                .find(|e| e.id == event_id)
                .cloned()
        })
        .ok_or_else(|| ApiError::Status {
            status: 404,
            message: "event not found".into(),
        })
    }

    async fn create_event(&self, input: &CreateEventInput) -> Result<Event, ApiError> {
        self.enter("create_event")?;
        Ok(self.with(|state| {
            state.created_events.push(input.clone());
            let mut created = event(
                &format!("ev{}", state.created_events.len()),
                &input.pocket_id,
                &input.name,
            );
            created.date = input.date;
            state
                .events
                .entry(input.pocket_id.clone())
                .or_default()
                .push(created.clone());
            created
        }))
    }

    async fn list_event_photos(&self, event_id: &str) -> Result<Vec<Photo>, ApiError> {
        self.enter("list_event_photos")?;
        let (photos, delay) = self.with(|state| {
            (
                state.photos.get(event_id).cloned().unwrap_or_default(),
                state.photo_load_delays.pop_front(),
            )
        });
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(photos)
    }

    async fn search_event_members(&self, _event_id: &str, query: &str) -> Result<Vec<Member>, ApiError> {
        self.enter("search_event_members")?;
        let scripted = self.with(|state| state.member_searches.get(query).cloned());
        let Some((delay, results)) = scripted else {
            return Ok(Vec::new());
        };
        tokio::time::sleep(delay).await;
        Ok(results)
    }

    async fn add_event_members(&self, _event_id: &str, user_ids: &[String]) -> Result<Vec<Member>, ApiError> {
        self.enter("add_event_members")?;
        Ok(user_ids
            .iter()
            .map(|id| Member {
                user_id: id.clone(),
                display_name: None,
                role: MemberRole::Member,
            })
            .collect())
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, ApiError> {
        self.enter("list_contacts")?;
        Ok(self.with(|state| state.contacts.clone()))
    }

    async fn search_contacts(&self, query: &str) -> Result<Vec<Contact>, ApiError> {
        self.enter("search_contacts")?;
        let scripted = self.with(|state| state.contact_searches.get(query).cloned());
        let Some((delay, results)) = scripted else {
            return Ok(Vec::new());
        };
        tokio::time::sleep(delay).await;
        Ok(results)
    }

    async fn add_contact(&self, input: &AddContactInput) -> Result<Contact, ApiError> {
        self.enter("add_contact")?;
        Ok(self.with(|state| {
            let id = format!("c{}", state.contacts.len() + 1);
            let name = input
                .email
                .clone()
                .or_else(|| input.phone.clone())
                .unwrap_or_default();
            let mut added = contact(&id, &name);
            added.email = input.email.clone();
            added.phone = input.phone.clone();
            state.contacts.push(added.clone());
            added
        }))
    }

    async fn remove_contact(&self, contact_id: &str) -> Result<(), ApiError> {
        self.enter("remove_contact")?;
        self.with(|state| state.contacts.retain(|c| c.id != contact_id));
        Ok(())
    }

    async fn request_upload_destination(&self, request: &PresignRequest) -> Result<UploadDestination, ApiError> {
        self.enter("request_upload_destination")?;
        let refused = self.with(|state| {
            state.presign_calls += 1;
            state.presign_failures.contains(&request.file_name)
        });
        if refused {
            return Err(ApiError::Status {
                status: 403,
                message: "uploads disabled".into(),
            });
        }
        Ok(UploadDestination {
            upload_url: format!("https://storage.test/{}", request.file_name),
            object_key: format!("objects/{}", request.file_name),
        })
    }

    async fn transfer_object(
        &self,
        destination: &UploadDestination,
        bytes: Bytes,
        _content_type: &str,
        progress: ProgressFn,
    ) -> Result<(), ApiError> {
        self.enter("transfer_object")?;
        let file_name = destination
            .upload_url
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let (delay, fails) = self.with(|state| {
            (
                state.transfer_delays.get(&file_name).copied(),
                state.transfer_failures.contains(&file_name),
            )
        });
        progress(50);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fails {
            return Err(ApiError::Transport("connection reset".into()));
        }
        self.with(|state| {
            state
                .transferred
                .push((destination.object_key.clone(), bytes.len()))
        });
        progress(100);
        Ok(())
    }

    async fn claim_photos(&self, input: &ClaimPhotosInput) -> Result<ClaimPhotosResponse, ApiError> {
        self.enter("claim_photos")?;
        if let Some(delay) = self.with(|state| state.claim_delay) {
            tokio::time::sleep(delay).await;
        }
        let photos = self.with(|state| {
            state.claims.push(input.clone());
            let photos: Vec<Photo> = input
                .photos
                .iter()
                .enumerate()
                .map(|(i, claimed)| {
                    let mut created = photo(&format!("ph-{}-{i}", input.event_id), &input.event_id);
                    created.width = claimed.width;
                    created.height = claimed.height;
                    created
                })
                .collect();
            state
                .photos
                .entry(input.event_id.clone())
                .or_default()
                .extend(photos.iter().cloned());
            photos
        });
        Ok(ClaimPhotosResponse { photos })
    }

    async fn set_favorite(&self, photo_id: &str, favorite: bool) -> Result<(), ApiError> {
        self.enter("set_favorite")?;
        self.with(|state| state.favorites.push((photo_id.to_string(), favorite)));
        Ok(())
    }

    async fn delete_photo(&self, photo_id: &str) -> Result<(), ApiError> {
        self.enter("delete_photo")?;
        self.with(|state| state.deleted_photos.push(photo_id.to_string()));
        Ok(())
    }
}
