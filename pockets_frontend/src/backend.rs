use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ApiError;
use crate::models::{
    AddContactInput, ChangePasswordInput, ClaimPhotosInput, ClaimPhotosResponse, Contact,
    CreateEventInput, CreatePocketInput, Event, LoginResponse, Member, Photo, Pocket,
    PresignRequest, UpdateProfileInput, UploadDestination, User,
};

/// Receives transfer progress as a whole percentage, 0 to 100.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Everything the front end asks of the REST backend and object storage.
///
/// `ApiClient` is the HTTP implementation; orchestration code only sees this
/// trait so flows can run against a scripted backend.
#[async_trait]
pub trait PocketsBackend: Send + Sync {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError>;
    async fn current_user(&self) -> Result<User, ApiError>;
    async fn update_profile(&self, input: &UpdateProfileInput) -> Result<User, ApiError>;
    async fn change_password(&self, input: &ChangePasswordInput) -> Result<(), ApiError>;

    async fn list_pockets(&self) -> Result<Vec<Pocket>, ApiError>;
    async fn get_pocket(&self, pocket_id: &str) -> Result<Pocket, ApiError>;
    async fn create_pocket(&self, input: &CreatePocketInput) -> Result<Pocket, ApiError>;

    async fn list_events(&self, pocket_id: &str) -> Result<Vec<Event>, ApiError>;
    async fn get_event(&self, event_id: &str) -> Result<Event, ApiError>;
    async fn create_event(&self, input: &CreateEventInput) -> Result<Event, ApiError>;
    async fn list_event_photos(&self, event_id: &str) -> Result<Vec<Photo>, ApiError>;
    async fn search_event_members(&self, event_id: &str, query: &str)
        -> Result<Vec<Member>, ApiError>;
    async fn add_event_members(&self, event_id: &str, user_ids: &[String])
        -> Result<Vec<Member>, ApiError>;

    async fn list_contacts(&self) -> Result<Vec<Contact>, ApiError>;
    async fn search_contacts(&self, query: &str) -> Result<Vec<Contact>, ApiError>;
    async fn add_contact(&self, input: &AddContactInput) -> Result<Contact, ApiError>;
    async fn remove_contact(&self, contact_id: &str) -> Result<(), ApiError>;

    async fn request_upload_destination(
        &self,
        request: &PresignRequest,
    ) -> Result<UploadDestination, ApiError>;
    async fn transfer_object(
        &self,
        destination: &UploadDestination,
        bytes: Bytes,
        content_type: &str,
        progress: ProgressFn,
    ) -> Result<(), ApiError>;
    async fn claim_photos(&self, input: &ClaimPhotosInput) -> Result<ClaimPhotosResponse, ApiError>;

    async fn set_favorite(&self, photo_id: &str, favorite: bool) -> Result<(), ApiError>;
    async fn delete_photo(&self, photo_id: &str) -> Result<(), ApiError>;
}
