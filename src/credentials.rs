//! Access credential lifecycle.
//!
//! The [`Manager`] holds the one credential of a session and hands out access
//! tokens. Before every use it checks whether the token is missing or
//! expired, and if so renews it through a [`CredentialExchange`] with the
//! refresh token. A failed renewal is reported as
//! [`ErrorKind::Unauthenticated`](crate::error::ErrorKind::Unauthenticated)
//! and is not retried: the next poll cycle is the retry.
//!
//! The manager never persists anything. Every credential change is published
//! on a watch channel, see [`Manager::subscribe`].

use std::{
    sync::Arc,
    time::{Duration, SystemTime},
};

use async_trait::async_trait;
use tokio::sync::watch;
use veil::Redact;

use crate::error::{Error, Result};

#[derive(Clone, Redact, PartialEq, Eq, Hash)]
pub struct Credential {
    #[redact]
    pub access_token: Option<String>,
    #[redact]
    pub refresh_token: Option<String>,
    pub expires_at: SystemTime,
}

impl Credential {
    /// A credential that only holds a refresh token, as loaded from storage.
    /// It is renewed on first use.
    #[must_use]
    pub fn from_refresh_token(refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: None,
            refresh_token: Some(refresh_token.into()),
            expires_at: SystemTime::UNIX_EPOCH,
        }
    }

    #[must_use]
    pub fn time_to_live(&self) -> Duration {
        self.expires_at
            .duration_since(SystemTime::now())
            .unwrap_or(Duration::ZERO)
    }

    /// Whether the access token must be renewed before use.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.access_token.is_none() || SystemTime::now() >= self.expires_at
    }

    /// The refresh token, if it differs from `previous`. The accounts service
    /// may rotate refresh tokens on renewal, invalidating stored copies.
    #[must_use]
    pub fn rotated_refresh_token(&self, previous: Option<&str>) -> Option<&str> {
        self.refresh_token
            .as_deref()
            .filter(|token| Some(*token) != previous)
    }

    /// Whether this credential can produce an access token, now or after
    /// renewal.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        self.access_token.is_some() || self.refresh_token.is_some()
    }
}

/// Result of a refresh token exchange.
#[derive(Clone, Redact, PartialEq, Eq)]
pub struct Renewal {
    #[redact]
    pub access_token: String,
    pub expires_in: Duration,
    /// Set when the accounts service rotated the refresh token.
    #[redact]
    pub refresh_token: Option<String>,
}

/// The accounts service, as far as the credential lifecycle needs it.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    /// Trades an authorization code for a full credential.
    async fn exchange_code(&self, code: &str) -> Result<Credential>;

    /// Trades a refresh token for a fresh access token.
    async fn renew(&self, refresh_token: &str) -> Result<Renewal>;
}

pub struct Manager {
    credential: Option<Credential>,
    exchange: Arc<dyn CredentialExchange>,
    tx: watch::Sender<Option<Credential>>,
}

impl Manager {
    #[must_use]
    pub fn new(exchange: Arc<dyn CredentialExchange>, credential: Option<Credential>) -> Self {
        let (tx, _) = watch::channel(credential.clone());
        Self {
            credential,
            exchange,
            tx,
        }
    }

    /// Returns a valid access token, renewing the credential first if needed.
    ///
    /// # Errors
    ///
    /// Returns an `Unauthenticated` error when:
    /// - there is no credential at all
    /// - the access token is expired and there is no refresh token
    /// - the refresh token was rejected
    ///
    /// Any other renewal failure, such as an unreachable accounts service,
    /// is passed through with its own kind.
    pub async fn access_token(&mut self) -> Result<String> {
        let credential = self
            .credential
            .as_ref()
            .ok_or_else(|| Error::unauthenticated("not logged in"))?;

        if !credential.is_expired() {
            if let Some(ref token) = credential.access_token {
                return Ok(token.clone());
            }
        }

        let refresh_token = credential
            .refresh_token
            .clone()
            .ok_or_else(|| Error::unauthenticated("access token expired and no refresh token"))?;

        debug!("renewing access token");
        let renewal = self.exchange.renew(&refresh_token).await.map_err(|e| {
            warn!("renewing access token failed: {e}");
            if e.is_auth_required() {
                Error::unauthenticated(format!("renewing access token failed: {e}"))
            } else {
                // Network or server trouble; the next poll retries.
                e
            }
        })?;

        let renewed = Credential {
            access_token: Some(renewal.access_token.clone()),
            refresh_token: renewal.refresh_token.or(Some(refresh_token)),
            expires_at: SystemTime::now() + renewal.expires_in,
        };
        debug!(
            "access token time to live: {} seconds",
            renewed.time_to_live().as_secs()
        );
        self.replace(renewed);

        Ok(renewal.access_token)
    }

    /// Completes an authorization code flow, replacing any credential.
    ///
    /// # Errors
    ///
    /// Returns an `Unauthenticated` error when the exchange fails.
    pub async fn authorize(&mut self, code: &str) -> Result<()> {
        let credential = self
            .exchange
            .exchange_code(code)
            .await
            .map_err(|e| Error::unauthenticated(format!("authorization failed: {e}")))?;
        info!("authorized");
        self.replace(credential);
        Ok(())
    }

    /// Installs a credential obtained elsewhere, such as a fresh login.
    pub fn set_credential(&mut self, credential: Credential) {
        self.replace(credential);
    }

    /// Forces renewal on next use, keeping the refresh token.
    ///
    /// Used when the playback API rejects an access token that had not
    /// expired yet, for example because it was revoked.
    pub fn expire(&mut self) {
        if let Some(ref mut credential) = self.credential {
            credential.expires_at = SystemTime::UNIX_EPOCH;
        }
    }

    #[must_use]
    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Whether an access or refresh token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.credential.as_ref().is_some_and(Credential::is_usable)
    }

    /// Subscribes to credential changes. The current credential is available
    /// immediately through the receiver.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<Credential>> {
        self.tx.subscribe()
    }

    fn replace(&mut self, credential: Credential) {
        self.credential = Some(credential.clone());
        self.tx.send_replace(Some(credential));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    /// Exchange that hands out numbered tokens, or fails when told to.
    #[derive(Default)]
    pub(crate) struct MockExchange {
        pub renewals: AtomicUsize,
        pub fail: bool,
        pub unavailable: AtomicBool,
        pub rotate: bool,
    }

    #[async_trait]
    impl CredentialExchange for MockExchange {
        async fn exchange_code(&self, code: &str) -> Result<Credential> {
            if self.fail {
                return Err(Error::unauthenticated("invalid_grant"));
            }
            Ok(Credential {
                access_token: Some(format!("access-{code}")),
                refresh_token: Some(format!("refresh-{code}")),
                expires_at: SystemTime::now() + Duration::from_secs(3600),
            })
        }

        async fn renew(&self, _refresh_token: &str) -> Result<Renewal> {
            if self.fail {
                return Err(Error::unauthenticated("invalid_grant"));
            }
            if self.unavailable.load(Ordering::SeqCst) {
                return Err(Error::unavailable("503 Service Unavailable"));
            }
            let n = self.renewals.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(Renewal {
                access_token: format!("renewed-{n}"),
                expires_in: Duration::from_secs(3600),
                refresh_token: self.rotate.then(|| format!("rotated-{n}")),
            })
        }
    }

    fn expired() -> Credential {
        Credential {
            access_token: Some("stale".to_owned()),
            refresh_token: Some("refresh".to_owned()),
            expires_at: SystemTime::now() - Duration::from_secs(1),
        }
    }

    #[tokio::test]
    async fn valid_token_is_not_renewed() {
        let exchange = Arc::new(MockExchange::default());
        let credential = Credential {
            expires_at: SystemTime::now() + Duration::from_secs(60),
            ..expired()
        };
        let mut manager = Manager::new(exchange.clone(), Some(credential));

        assert_eq!(manager.access_token().await.unwrap(), "stale");
        assert_eq!(exchange.renewals.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn expired_token_is_renewed_transparently() {
        let exchange = Arc::new(MockExchange::default());
        let mut manager = Manager::new(exchange.clone(), Some(expired()));
        let mut rx = manager.subscribe();
        rx.borrow_and_update();

        assert_eq!(manager.access_token().await.unwrap(), "renewed-1");
        assert_eq!(manager.access_token().await.unwrap(), "renewed-1");
        assert_eq!(exchange.renewals.load(Ordering::SeqCst), 1);

        let credential = manager.credential().unwrap();
        assert_eq!(credential.refresh_token.as_deref(), Some("refresh"));
        assert!(credential.time_to_live() > Duration::from_secs(3500));
        assert!(rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn rotated_refresh_token_is_kept() {
        let exchange = Arc::new(MockExchange {
            rotate: true,
            ..MockExchange::default()
        });
        let mut manager = Manager::new(exchange, Some(Credential::from_refresh_token("old")));

        let mut rx = manager.subscribe();
        manager.access_token().await.unwrap();
        assert_eq!(
            manager.credential().unwrap().refresh_token.as_deref(),
            Some("rotated-1")
        );

        assert!(rx.has_changed().unwrap());
        let published = rx.borrow_and_update().clone().unwrap();
        assert_eq!(published.rotated_refresh_token(Some("old")), Some("rotated-1"));
        assert_eq!(published.rotated_refresh_token(Some("rotated-1")), None);
    }

    #[tokio::test]
    async fn missing_credentials_require_auth() {
        let exchange = Arc::new(MockExchange::default());

        let mut manager = Manager::new(exchange.clone(), None);
        assert!(!manager.is_authenticated());
        assert!(manager.access_token().await.unwrap_err().is_auth_required());

        let no_refresh = Credential {
            refresh_token: None,
            ..expired()
        };
        let mut manager = Manager::new(exchange, Some(no_refresh));
        assert!(manager.is_authenticated());
        assert!(manager.access_token().await.unwrap_err().is_auth_required());
    }

    #[tokio::test]
    async fn failed_renewal_requires_auth_and_keeps_credential() {
        let exchange = Arc::new(MockExchange {
            fail: true,
            ..MockExchange::default()
        });
        let mut manager = Manager::new(exchange, Some(expired()));

        assert!(manager.access_token().await.unwrap_err().is_auth_required());
        assert_eq!(
            manager.credential().unwrap().access_token.as_deref(),
            Some("stale")
        );
    }

    #[tokio::test]
    async fn unreachable_accounts_service_is_not_auth_failure() {
        let exchange = Arc::new(MockExchange {
            unavailable: AtomicBool::new(true),
            ..MockExchange::default()
        });
        let mut manager = Manager::new(exchange, Some(expired()));

        let error = manager.access_token().await.unwrap_err();
        assert!(!error.is_auth_required());
        assert_eq!(error.kind, crate::error::ErrorKind::Unavailable);
        assert!(manager.is_authenticated());
    }

    #[tokio::test]
    async fn expire_forces_renewal() {
        let exchange = Arc::new(MockExchange::default());
        let mut manager = Manager::new(exchange.clone(), None);
        manager.authorize("code").await.unwrap();
        assert_eq!(manager.access_token().await.unwrap(), "access-code");

        manager.expire();
        assert_eq!(manager.access_token().await.unwrap(), "renewed-1");
    }
}
