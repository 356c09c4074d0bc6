//! Client of the Spotify accounts and playback APIs.
//!
//! Implements both collaborators of the engine:
//! * [`CredentialExchange`] against the accounts token endpoint, with the
//!   client id and secret as Basic credentials
//! * [`PlaybackApi`] against the currently-playing endpoint, with the access
//!   token as Bearer credential
//!
//! Also builds the URL the user visits to start the authorization code flow.

use std::time::SystemTime;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::{
    header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    StatusCode,
};
use url::{form_urlencoded, Url};

use crate::{
    config::Config,
    credentials::{Credential, CredentialExchange, Renewal},
    error::{Error, Result},
    http::Client as HttpClient,
    poller::PlaybackApi,
    protocol::{self, auth::Token, playback::Response},
};

pub struct Spotify {
    http_client: HttpClient,
    client_id: String,
    client_secret: String,
    redirect_uri: Url,
}

impl Spotify {
    const AUTHORIZE_URL: &'static str = "https://accounts.spotify.com/authorize";
    const TOKEN_URL: &'static str = "https://accounts.spotify.com/api/token";
    const CURRENTLY_PLAYING_URL: &'static str =
        "https://api.spotify.com/v1/me/player/currently-playing";

    /// Permissions requested from the user: read-only access to playback.
    const SCOPES: &'static str = "user-read-currently-playing user-read-playback-state";

    const FORM_CONTENT: HeaderValue = HeaderValue::from_static("application/x-www-form-urlencoded");

    /// # Errors
    ///
    /// Will return `Err` if the HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            http_client: HttpClient::new(config)?,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        })
    }

    /// The URL to send the user to for authorization. The accounts service
    /// redirects back to the configured redirect URI with a `code` parameter.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the URL cannot be built.
    pub fn authorize_url(&self) -> Result<Url> {
        let url = Url::parse_with_params(
            Self::AUTHORIZE_URL,
            &[
                ("client_id", self.client_id.as_str()),
                ("response_type", "code"),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("scope", Self::SCOPES),
                ("show_dialog", "false"),
            ],
        )?;
        Ok(url)
    }

    fn basic_auth(&self) -> Result<HeaderValue> {
        let credentials = BASE64.encode(format!("{}:{}", self.client_id, self.client_secret));
        let mut value = HeaderValue::from_str(&format!("Basic {credentials}"))?;
        value.set_sensitive(true);
        Ok(value)
    }

    async fn token(&self, params: &[(&str, &str)]) -> Result<Token> {
        let body = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(params)
            .finish();

        let url = Self::TOKEN_URL.parse::<Url>()?;
        let mut request = self.http_client.post(url, body);
        let headers = request.headers_mut();
        headers.insert(CONTENT_TYPE, Self::FORM_CONTENT);
        headers.insert(AUTHORIZATION, self.basic_auth()?);

        let response = self.http_client.execute(request).await?;
        let status = response.status();
        let body = response.text().await?;

        match status {
            status if status.is_success() => protocol::json(&body, "token"),
            // Invalid or revoked refresh token, or a bad authorization code.
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
                trace!("{body}");
                Err(Error::unauthenticated(format!("token request: {status}")))
            }
            _ => Err(Error::unavailable(format!("token request: {status}"))),
        }
    }
}

#[async_trait]
impl CredentialExchange for Spotify {
    async fn exchange_code(&self, code: &str) -> Result<Credential> {
        let redirect_uri = self.redirect_uri.as_str();
        let token = self
            .token(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", redirect_uri),
            ])
            .await?;

        Ok(Credential {
            access_token: Some(token.access_token),
            refresh_token: token.refresh_token,
            expires_at: SystemTime::now() + token.expires_in,
        })
    }

    async fn renew(&self, refresh_token: &str) -> Result<Renewal> {
        let token = self
            .token(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .await?;

        Ok(Renewal {
            access_token: token.access_token,
            expires_in: token.expires_in,
            refresh_token: token.refresh_token,
        })
    }
}

#[async_trait]
impl PlaybackApi for Spotify {
    async fn current_playback(&self, access_token: &str) -> Result<Response> {
        let url = Self::CURRENTLY_PLAYING_URL.parse::<Url>()?;
        let mut request = self.http_client.get(url);

        let mut bearer = HeaderValue::from_str(&format!("Bearer {access_token}"))?;
        bearer.set_sensitive(true);
        request.headers_mut().insert(AUTHORIZATION, bearer);

        let response = self.http_client.execute(request).await?;
        match response.status() {
            StatusCode::NO_CONTENT | StatusCode::ACCEPTED => Ok(Response::NoContent),
            StatusCode::UNAUTHORIZED => Err(Error::unauthenticated("access token rejected")),
            status if !status.is_success() => Err(Error::unavailable(status.to_string())),
            _ => {
                let body = response.text().await?;
                if body.trim().is_empty() {
                    return Ok(Response::NoContent);
                }
                protocol::json(&body, "currently playing").map(Response::Playing)
            }
        }
    }
}
