//! Secrets file handling.
//!
//! The secrets file is a small TOML document with the API client
//! credentials, optionally a refresh token obtained through the authorization
//! code flow, and the identity that may edit the display configuration:
//!
//! ```toml
//! client_id = "..."
//! client_secret = "..."
//! refresh_token = "..."
//! config_identity = "admin"
//! config_secret = "..."
//! ```

use std::fs;

use serde::Deserialize;
use veil::Redact;

use crate::error::{Error, Result};

#[derive(Clone, Redact, Deserialize, PartialEq, Eq)]
pub struct Secrets {
    pub client_id: String,

    #[redact]
    pub client_secret: String,

    #[serde(default)]
    pub redirect_uri: Option<String>,

    #[redact]
    #[serde(default)]
    pub refresh_token: Option<String>,

    #[serde(default)]
    pub config_identity: Option<String>,

    #[redact]
    #[serde(default)]
    pub config_secret: Option<String>,
}

impl Secrets {
    /// Upper bound on the size of the secrets file.
    const MAX_FILE_SIZE: u64 = 4096;

    /// Loads the secrets from a TOML file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if:
    /// - the file cannot be read
    /// - the file is larger than 4 KiB
    /// - the file is not valid TOML or misses `client_id` or `client_secret`
    pub fn from_file(secrets_file: &str) -> Result<Self> {
        // Prevent out-of-memory condition: secrets file should be small.
        let file_size = fs::metadata(secrets_file)?.len();
        if file_size > Self::MAX_FILE_SIZE {
            return Err(Error::invalid_argument(format!(
                "{secrets_file} is too large ({file_size} bytes)"
            )));
        }

        let contents = fs::read_to_string(secrets_file)?;
        contents.parse()
    }
}

impl std::str::FromStr for Secrets {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let secrets: Self = toml::from_str(s)?;
        if secrets.client_id.is_empty() || secrets.client_secret.is_empty() {
            return Err(Error::invalid_argument(
                "client_id and client_secret must not be empty",
            ));
        }

        Ok(secrets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_optional_fields() {
        let secrets: Secrets = r#"
            client_id = "id"
            client_secret = "secret"
            refresh_token = "refresh"
        "#
        .parse()
        .unwrap();

        assert_eq!(secrets.refresh_token.as_deref(), Some("refresh"));
        assert!(secrets.config_identity.is_none());
        assert!(!format!("{secrets:?}").contains("refresh\""));
    }

    #[test]
    fn rejects_empty_client_id() {
        let result = r#"
            client_id = ""
            client_secret = "secret"
        "#
        .parse::<Secrets>();

        assert!(result.is_err());
    }
}
