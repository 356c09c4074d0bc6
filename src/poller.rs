//! One poll of the remote playback state.
//!
//! A [`Poller`] is cheap to clone: clones share the credential manager and
//! the API client, so concurrent polls renew the credential at most once.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use tokio::{sync::Mutex, time::Instant};

use crate::{
    config::Timing,
    credentials::Manager,
    error::Result,
    protocol::playback::Response,
    track::PlaybackSnapshot,
};

/// The playback API, as far as polling needs it.
#[async_trait]
pub trait PlaybackApi: Send + Sync {
    /// Fetches what is currently playing.
    ///
    /// # Errors
    ///
    /// Implementations return `Unauthenticated` when the access token was
    /// rejected, and `Unavailable` for any other non-success status.
    async fn current_playback(&self, access_token: &str) -> Result<Response>;
}

/// What one poll observed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    /// The playback state, `None` when nothing is playing.
    Playback(Option<PlaybackSnapshot>),

    /// No usable credential; polling should stop until the user logs in.
    Unauthenticated,

    /// A transient failure. Polling carries on.
    Failed(String),
}

/// How often to poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cadence {
    /// Full-screen player.
    Live,
    /// Player embedded in another view.
    Background,
}

impl Cadence {
    #[must_use]
    pub fn period(self, timing: &Timing) -> Duration {
        match self {
            Self::Live => timing.live_poll,
            Self::Background => timing.background_poll,
        }
    }
}

#[derive(Clone)]
pub struct Poller {
    credentials: Arc<Mutex<Manager>>,
    api: Arc<dyn PlaybackApi>,
}

impl Poller {
    #[must_use]
    pub fn new(credentials: Arc<Mutex<Manager>>, api: Arc<dyn PlaybackApi>) -> Self {
        Self { credentials, api }
    }

    #[must_use]
    pub fn credentials(&self) -> &Arc<Mutex<Manager>> {
        &self.credentials
    }

    /// Obtains a token, renewing it if needed, and fetches the playback
    /// state with it.
    pub async fn poll(&self) -> PollOutcome {
        let token = self.credentials.lock().await.access_token().await;
        let token = match token {
            Ok(token) => token,
            Err(e) if e.is_auth_required() => {
                debug!("{e}");
                return PollOutcome::Unauthenticated;
            }
            Err(e) => return PollOutcome::Failed(e.to_string()),
        };

        match self.api.current_playback(&token).await {
            Ok(Response::NoContent) => PollOutcome::Playback(None),
            Ok(Response::Playing(payload)) => {
                PollOutcome::Playback(PlaybackSnapshot::from_payload(&payload, Instant::now()))
            }
            Err(e) => {
                if e.is_auth_required() {
                    // The token may have been revoked before it expired.
                    // Renew on the next poll instead of giving up.
                    self.credentials.lock().await.expire();
                }
                warn!("fetching playback state failed: {e}");
                PollOutcome::Failed(e.to_string())
            }
        }
    }
}
