use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{PocketsBackend, ProgressFn};
use crate::config::{sanitize_base_url, FrontendConfig};
use crate::error::ApiError;
use crate::models::{
    AddContactInput, AddMembersInput, AuthTokens, ChangePasswordInput, ClaimPhotosInput,
    ClaimPhotosResponse, Contact, CreateEventInput, CreatePocketInput, ErrorResponse, Event,
    LoginInput, LoginResponse, Member, Photo, Pocket, PresignRequest, UpdateProfileInput,
    UploadDestination, User,
};
use crate::session::Session;

const DEFAULT_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    client: Client,
    session: Session,
    chunk_bytes: usize,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, session: Session) -> Result<Self> {
        Self::build(
            base_url.into(),
            session,
            Duration::from_secs(15),
            DEFAULT_CHUNK_BYTES,
        )
    }

    pub fn from_config(config: &FrontendConfig, session: Session) -> Result<Self> {
        Self::build(
            config.api_url.clone(),
            session,
            config.http_timeout,
            config.media.upload_chunk_bytes,
        )
    }

    fn build(base_url: String, session: Session, timeout: Duration, chunk_bytes: usize) -> Result<Self> {
        let base_url = sanitize_base_url(base_url)?;
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url,
            client,
            session,
            chunk_bytes: chunk_bytes.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_base_url(&mut self, base_url: impl Into<String>) -> Result<()> {
        self.base_url = sanitize_base_url(base_url.into())?;
        Ok(())
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    fn url(&self, path: &str) -> Result<Url, ApiError> {
        let raw = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&raw).map_err(|err| ApiError::InvalidUrl(format!("{raw}: {err}")))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        Ok(self.client.request(method, self.url(path)?))
    }

    async fn refresh_tokens(&self, refresh_token: &str) -> Result<AuthTokens, ApiError> {
        let response = self
            .request(Method::POST, "/auth/refresh")?
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;
        let response = check_status(response).await?;
        decode(response, "token refresh").await
    }

    /// Sends with the session's bearer token, refreshing once on a 401.
    async fn send_authed(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.session.access_token().ok_or(ApiError::Unauthorized)?;
        let retry = builder.try_clone();
        let response = builder.bearer_auth(&token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check_status(response).await;
        }

        let Some(retry) = retry else {
            return Err(ApiError::Unauthorized);
        };
        debug!("access token rejected, refreshing");
        let client = self.clone();
        let tokens = self
            .session
            .refresh_after(&token, move |refresh_token| async move {
                client.refresh_tokens(&refresh_token).await
            })
            .await?;
        let response = retry.bearer_auth(&tokens.access_token).send().await?;
        check_status(response).await
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, context: &str) -> Result<T, ApiError> {
        let response = self.send_authed(self.request(Method::GET, path)?).await?;
        decode(response, context).await
    }

    async fn send_json<B, T>(&self, method: Method, path: &str, body: &B, context: &str) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let builder = self.request(method, path)?.json(body);
        let response = self.send_authed(builder).await?;
        decode(response, context).await
    }

    async fn send_empty(&self, method: Method, path: &str) -> Result<(), ApiError> {
        self.send_authed(self.request(method, path)?).await?;
        Ok(())
    }
}

async fn check_status(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::UNAUTHORIZED {
        return Err(ApiError::Unauthorized);
    }
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorResponse>(&body)
        .map(|err| err.message)
        .unwrap_or_else(|_| {
            if body.trim().is_empty() {
                status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string()
            } else {
                body
            }
        });
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

async fn decode<T: DeserializeOwned>(response: Response, context: &str) -> Result<T, ApiError> {
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|err| {
        warn!(context, error = %err, "response failed validation");
        ApiError::decode(context, err)
    })
}

fn percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((sent.min(total) * 100) / total) as u8
}

#[async_trait]
impl PocketsBackend for ApiClient {
    async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let input = LoginInput {
            email: email.to_string(),
            password: password.to_string(),
        };
        let response = self
            .request(Method::POST, "/auth/login")?
            .json(&input)
            .send()
            .await?;
        let response = check_status(response).await?;
        let login: LoginResponse = decode(response, "login").await?;
        self.session.set_tokens(login.tokens.clone());
        Ok(login)
    }

    async fn current_user(&self) -> Result<User, ApiError> {
        self.get_json("/me", "current user").await
    }

    async fn update_profile(&self, input: &UpdateProfileInput) -> Result<User, ApiError> {
        self.send_json(Method::PATCH, "/me", input, "profile update").await
    }

    async fn change_password(&self, input: &ChangePasswordInput) -> Result<(), ApiError> {
        let builder = self.request(Method::POST, "/me/password")?.json(input);
        self.send_authed(builder).await?;
        Ok(())
    }

    async fn list_pockets(&self) -> Result<Vec<Pocket>, ApiError> {
        self.get_json("/pockets", "pocket list").await
    }

    async fn get_pocket(&self, pocket_id: &str) -> Result<Pocket, ApiError> {
        self.get_json(&format!("/pockets/{pocket_id}"), "pocket").await
    }

    async fn create_pocket(&self, input: &CreatePocketInput) -> Result<Pocket, ApiError> {
        self.send_json(Method::POST, "/pockets", input, "created pocket").await
    }

    async fn list_events(&self, pocket_id: &str) -> Result<Vec<Event>, ApiError> {
        self.get_json(&format!("/pockets/{pocket_id}/events"), "event list")
            .await
    }

    async fn get_event(&self, event_id: &str) -> Result<Event, ApiError> {
        self.get_json(&format!("/events/{event_id}"), "event").await
    }

    async fn create_event(&self, input: &CreateEventInput) -> Result<Event, ApiError> {
        self.send_json(Method::POST, "/events", input, "created event").await
    }

    async fn list_event_photos(&self, event_id: &str) -> Result<Vec<Photo>, ApiError> {
        self.get_json(&format!("/events/{event_id}/photos"), "event photos")
            .await
    }

    async fn search_event_members(&self, event_id: &str, query: &str) -> Result<Vec<Member>, ApiError> {
        let builder = self
            .request(Method::GET, &format!("/events/{event_id}/members"))?
            .query(&[("q", query)]);
        let response = self.send_authed(builder).await?;
        decode(response, "event members").await
    }

    async fn add_event_members(&self, event_id: &str, user_ids: &[String]) -> Result<Vec<Member>, ApiError> {
        let input = AddMembersInput {
            user_ids: user_ids.to_vec(),
        };
        self.send_json(
            Method::POST,
            &format!("/events/{event_id}/members"),
            &input,
            "event members",
        )
        .await
    }

    async fn list_contacts(&self) -> Result<Vec<Contact>, ApiError> {
        self.get_json("/contacts", "contacts").await
    }

    async fn search_contacts(&self, query: &str) -> Result<Vec<Contact>, ApiError> {
        let builder = self
            .request(Method::GET, "/contacts/search")?
            .query(&[("q", query)]);
        let response = self.send_authed(builder).await?;
        decode(response, "contact search").await
    }

    async fn add_contact(&self, input: &AddContactInput) -> Result<Contact, ApiError> {
        self.send_json(Method::POST, "/contacts", input, "added contact").await
    }

    async fn remove_contact(&self, contact_id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &format!("/contacts/{contact_id}"))
            .await
    }

    async fn request_upload_destination(&self, request: &PresignRequest) -> Result<UploadDestination, ApiError> {
        self.send_json(Method::POST, "/uploads/presign", request, "upload destination")
            .await
    }

    async fn transfer_object(
        &self,
        destination: &UploadDestination,
        bytes: Bytes,
        content_type: &str,
        progress: ProgressFn,
    ) -> Result<(), ApiError> {
        let url = Url::parse(&destination.upload_url)
            .map_err(|err| ApiError::InvalidUrl(format!("{}: {err}", destination.upload_url)))?;
        let total = bytes.len();
        let chunks: Vec<Bytes> = (0..total)
            .step_by(self.chunk_bytes)
            .map(|start| bytes.slice(start..(start + self.chunk_bytes).min(total)))
            .collect();

        let reporter = progress.clone();
        let mut sent = 0usize;
        let body = Body::wrap_stream(stream::iter(chunks.into_iter().map(move |chunk| {
            sent += chunk.len();
            reporter(percent(sent, total));
            Ok::<Bytes, std::io::Error>(chunk)
        })));

        // Destination URLs carry their own authorization; no bearer token here.
        let response = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, total)
            .body(body)
            .send()
            .await?;
        check_status(response).await?;
        progress(100);
        Ok(())
    }

    async fn claim_photos(&self, input: &ClaimPhotosInput) -> Result<ClaimPhotosResponse, ApiError> {
        self.send_json(
            Method::POST,
            &format!("/events/{}/photos/claim", input.event_id),
            input,
            "claimed photos",
        )
        .await
    }

    async fn set_favorite(&self, photo_id: &str, favorite: bool) -> Result<(), ApiError> {
        let method = if favorite { Method::POST } else { Method::DELETE };
        self.send_empty(method, &format!("/photos/{photo_id}/favorite"))
            .await
    }

    async fn delete_photo(&self, photo_id: &str) -> Result<(), ApiError> {
        self.send_empty(Method::DELETE, &format!("/photos/{photo_id}"))
            .await
    }
}
