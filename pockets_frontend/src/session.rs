use std::future::Future;
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::error::ApiError;
use crate::models::AuthTokens;
use crate::single_flight::SingleFlight;

const REFRESH_KEY: &str = "refresh";

/// Authentication context shared by everything that talks to the backend.
#[derive(Clone, Default)]
pub struct Session {
    inner: Arc<SessionInner>,
}

#[derive(Default)]
struct SessionInner {
    tokens: RwLock<Option<AuthTokens>>,
    refresh: SingleFlight<&'static str, AuthTokens>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tokens(tokens: AuthTokens) -> Self {
        let session = Self::new();
        session.set_tokens(tokens);
        session
    }

    pub fn tokens(&self) -> Option<AuthTokens> {
        self.inner
            .tokens
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens().map(|tokens| tokens.access_token)
    }

    pub fn is_authenticated(&self) -> bool {
        self.tokens().is_some()
    }

    pub fn set_tokens(&self, tokens: AuthTokens) {
        *self
            .inner
            .tokens
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(tokens);
    }

    pub fn clear(&self) {
        *self
            .inner
            .tokens
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
    }

    /// Refreshes the token pair after `stale_access` was rejected.
    ///
    /// If another caller already swapped in a newer access token, that pair is
    /// returned without a network call. Concurrent refreshes share one flight.
    pub async fn refresh_after<F, Fut>(
        &self,
        stale_access: &str,
        refresher: F,
    ) -> Result<AuthTokens, ApiError>
    where
        F: FnOnce(String) -> Fut + Send + 'static,
        Fut: Future<Output = Result<AuthTokens, ApiError>> + Send + 'static,
    {
        match self.tokens() {
            None => return Err(ApiError::Unauthorized),
            Some(current) if current.access_token != stale_access => return Ok(current),
            Some(_) => {}
        }

        let session = self.clone();
        self.inner
            .refresh
            .run(REFRESH_KEY, move || async move {
                let Some(current) = session.tokens() else {
                    return Err(ApiError::Unauthorized);
                };
                match refresher(current.refresh_token).await {
                    Ok(tokens) => {
                        info!("access token refreshed");
                        session.set_tokens(tokens.clone());
                        Ok(tokens)
                    }
                    Err(err) => {
                        warn!(error = %err, "token refresh failed");
                        if matches!(err, ApiError::Unauthorized | ApiError::Status { status: 400..=403, .. }) {
                            session.clear();
                        }
                        Err(err)
                    }
                }
            })
            .await
    }
}
