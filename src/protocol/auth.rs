//! Token endpoint response types.
//!
//! Both the authorization code exchange and the refresh token exchange
//! answer with the same shape. The refresh exchange usually omits
//! `refresh_token`, in which case the previous one stays valid.
//!
//! # Example Response
//!
//! ```json
//! {
//!     "access_token": "BQD...",
//!     "token_type": "Bearer",
//!     "scope": "user-read-currently-playing user-read-playback-state",
//!     "expires_in": 3600,
//!     "refresh_token": "AQC..."
//! }
//! ```

use std::time::Duration;

use serde::Deserialize;
use serde_with::{formats::Flexible, serde_as, DurationSeconds};
use veil::Redact;

/// Access token grant from the accounts service.
#[serde_as]
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Deserialize, Redact, Hash)]
pub struct Token {
    /// Bearer token for API access
    #[redact]
    pub access_token: String,

    /// How long the access token remains valid
    #[serde_as(as = "DurationSeconds<u64, Flexible>")]
    pub expires_in: Duration,

    /// Present on authorization code exchanges, and on refreshes that rotate
    /// the refresh token
    #[redact]
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_response_without_refresh_token() {
        let token: Token = serde_json::from_str(
            r#"{"access_token":"abc","token_type":"Bearer","expires_in":3600}"#,
        )
        .unwrap();

        assert_eq!(token.expires_in, Duration::from_secs(3600));
        assert!(token.refresh_token.is_none());
    }
}
