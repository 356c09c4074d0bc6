use std::time::Duration;

use url::Url;
use veil::Redact;

use crate::{error::Result, secrets::Secrets};

/// Timing constants of the presentation engine.
///
/// All timers in the player and slideshow are derived from these values, so
/// tests can shrink or stretch them without touching the state machines.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Timing {
    /// Duration of the crossfade between two tracks.
    pub track_crossfade: Duration,

    /// Duration of the crossfade between two slides.
    pub slide_crossfade: Duration,

    /// Period of the progress interpolation timer.
    pub progress_tick: Duration,

    /// Poll period of the full-screen player.
    pub live_poll: Duration,

    /// Poll period of a player embedded in the slideshow.
    pub background_poll: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            track_crossfade: Duration::from_millis(800),
            slide_crossfade: Duration::from_millis(1000),
            progress_tick: Duration::from_millis(50),
            live_poll: Duration::from_millis(1000),
            background_poll: Duration::from_millis(5000),
        }
    }
}

#[derive(Clone, Redact, PartialEq, Eq)]
pub struct Config {
    pub app_name: String,
    pub app_version: String,

    pub user_agent: String,

    pub client_id: String,
    #[redact]
    pub client_secret: String,
    pub redirect_uri: Url,

    pub timing: Timing,
}

impl Config {
    /// Redirect URI used when the secrets file does not specify one.
    const DEFAULT_REDIRECT_URI: &'static str = "http://127.0.0.1:8888/api/auth/callback";

    /// Builds the application configuration from the secrets file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - the redirect URI is not a valid URL
    /// - the application name and version cannot form a `User-Agent`
    pub fn with_secrets(secrets: &Secrets) -> Result<Self> {
        let app_name = env!("CARGO_PKG_NAME").to_owned();
        let app_version = env!("CARGO_PKG_VERSION").to_owned();

        let illegal_chars = |chr| chr == '/' || chr == ';';
        if app_name.is_empty()
            || app_name.contains(illegal_chars)
            || app_version.is_empty()
            || app_version.contains(illegal_chars)
        {
            return Err(crate::error::Error::internal(format!(
                "application name and/or version invalid (\"{app_name}\"; \"{app_version}\")"
            )));
        }

        let os_name = match std::env::consts::OS {
            "macos" => "osx",
            other => other,
        };
        let os_version = sysinfo::System::os_version()
            .filter(|version| !version.is_empty() && !version.contains(illegal_chars))
            .unwrap_or_else(|| String::from("0"));

        let user_agent = format!("{app_name}/{app_version} (Rust; {os_name}/{os_version})");
        trace!("user agent: {user_agent}");

        let redirect_uri = secrets
            .redirect_uri
            .as_deref()
            .unwrap_or(Self::DEFAULT_REDIRECT_URI)
            .parse::<Url>()?;

        Ok(Self {
            app_name,
            app_version,
            user_agent,
            client_id: secrets.client_id.clone(),
            client_secret: secrets.client_secret.clone(),
            redirect_uri,
            timing: Timing::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_redirect_uri_is_used() {
        let secrets: Secrets = toml::from_str(
            r#"
            client_id = "abc"
            client_secret = "def"
            "#,
        )
        .unwrap();

        let config = Config::with_secrets(&secrets).unwrap();
        assert_eq!(config.redirect_uri.path(), "/api/auth/callback");
        assert!(config.user_agent.starts_with("nowshowing/"));
        assert_eq!(config.timing.track_crossfade, Duration::from_millis(800));
        assert!(!format!("{config:?}").contains("def"));
    }
}
