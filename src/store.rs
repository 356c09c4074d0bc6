//! Display configuration store, its login gate, and the editor on top.
//!
//! The [`ConfigStore`] owns the configuration and pushes every change as a
//! full value. Editing goes through a [`ConfigEditor`], which applies each
//! change locally before persisting it; a failed save keeps the local value
//! so the user can retry.

use std::{
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use tokio::{fs, sync::watch};
use veil::Redact;

use crate::{
    display::{BackgroundMode, DisplayConfig, DisplayMode},
    error::{Error, Result},
};

#[async_trait]
pub trait ConfigStore: Send + Sync {
    /// Subscribes to configuration changes. The current configuration is
    /// available immediately through the receiver.
    fn subscribe(&self) -> watch::Receiver<DisplayConfig>;

    /// Stores `config` and pushes it to all subscribers.
    async fn persist(&self, config: &DisplayConfig) -> Result<()>;
}

/// Configuration stored as a TOML file.
pub struct FileStore {
    path: PathBuf,
    tx: watch::Sender<DisplayConfig>,
}

impl FileStore {
    /// Loads the configuration at `path`. A missing file yields the defaults;
    /// it is created on the first save.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file exists but cannot be read or parsed.
    pub async fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let config = Self::read(&path).await?;
        let (tx, _) = watch::channel(config);
        Ok(Self { path, tx })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file and pushes the result if it changed.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file cannot be read or parsed. Subscribers
    /// keep the previous configuration.
    pub async fn reload(&self) -> Result<()> {
        let config = Self::read(&self.path).await?;
        let changed = self.tx.send_if_modified(|current| {
            if *current == config {
                false
            } else {
                *current = config;
                true
            }
        });

        if changed {
            info!("reloaded {}", self.path.display());
        } else {
            debug!("{} unchanged", self.path.display());
        }
        Ok(())
    }

    async fn read(path: &Path) -> Result<DisplayConfig> {
        match fs::read_to_string(path).await {
            Ok(contents) => {
                let config: DisplayConfig = toml::from_str(&contents)?;
                Ok(config.normalized())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                info!("{} not found; using defaults", path.display());
                Ok(DisplayConfig::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ConfigStore for FileStore {
    fn subscribe(&self) -> watch::Receiver<DisplayConfig> {
        self.tx.subscribe()
    }

    async fn persist(&self, config: &DisplayConfig) -> Result<()> {
        let config = config.normalized();
        let contents = toml::to_string(&config)?;

        // Write and rename, so readers never see a partial file.
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);
        fs::write(&temp, contents).await?;
        fs::rename(&temp, &self.path).await?;

        debug!("saved {}", self.path.display());
        self.tx.send_replace(config);
        Ok(())
    }
}

pub trait AuthGate: Send + Sync {
    /// Subscribes to the logged in identity, `None` when logged out.
    fn current_user(&self) -> watch::Receiver<Option<String>>;

    /// # Errors
    ///
    /// Returns an `Unauthenticated` error when the identity or secret is
    /// wrong.
    fn login(&self, identity: &str, secret: &str) -> Result<()>;

    fn logout(&self);
}

/// Gate that admits a single identity.
#[derive(Redact)]
pub struct StaticGate {
    identity: String,
    #[redact]
    secret: String,
    user: watch::Sender<Option<String>>,
}

impl StaticGate {
    #[must_use]
    pub fn new(identity: impl Into<String>, secret: impl Into<String>) -> Self {
        let (user, _) = watch::channel(None);
        Self {
            identity: identity.into(),
            secret: secret.into(),
            user,
        }
    }
}

impl AuthGate for StaticGate {
    fn current_user(&self) -> watch::Receiver<Option<String>> {
        self.user.subscribe()
    }

    fn login(&self, identity: &str, secret: &str) -> Result<()> {
        if identity != self.identity || secret != self.secret {
            warn!("login as {identity} refused");
            return Err(Error::unauthenticated("invalid identity or secret"));
        }

        info!("logged in as {identity}");
        self.user.send_replace(Some(identity.to_owned()));
        Ok(())
    }

    fn logout(&self) {
        if let Some(identity) = self.user.send_replace(None) {
            info!("{identity} logged out");
        }
    }
}

/// Outcome of the last save.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Failed(String),
}

pub struct ConfigEditor {
    store: Arc<dyn ConfigStore>,
    stored: watch::Receiver<DisplayConfig>,
    gate: Arc<dyn AuthGate>,
    /// Edited configuration that failed to save.
    pending: Option<DisplayConfig>,
    status: watch::Sender<SaveStatus>,
}

impl ConfigEditor {
    #[must_use]
    pub fn new(store: Arc<dyn ConfigStore>, gate: Arc<dyn AuthGate>) -> Self {
        let stored = store.subscribe();
        let (status, _) = watch::channel(SaveStatus::Idle);
        Self {
            store,
            stored,
            gate,
            pending: None,
            status,
        }
    }

    /// The configuration as edited: the latest stored configuration, or the
    /// unsaved edit after a failed save.
    #[must_use]
    pub fn config(&self) -> DisplayConfig {
        self.pending
            .clone()
            .unwrap_or_else(|| self.stored.borrow().clone())
    }

    #[must_use]
    pub fn status(&self) -> watch::Receiver<SaveStatus> {
        self.status.subscribe()
    }

    /// Persists the unsaved edit again, after a failed save. Does nothing
    /// when there is none.
    ///
    /// # Errors
    ///
    /// Will return `Err` if no one is logged in or the save failed again.
    pub async fn retry(&mut self) -> Result<()> {
        self.require_login()?;
        match self.pending.clone() {
            Some(config) => self.save(config).await,
            None => Ok(()),
        }
    }

    pub async fn set_scale(&mut self, scale: f64) -> Result<()> {
        self.edit(|config| config.scale = scale).await
    }

    pub async fn set_background_mode(&mut self, mode: BackgroundMode) -> Result<()> {
        self.edit(|config| config.background_mode = mode).await
    }

    pub async fn set_show_progress_bar(&mut self, show: bool) -> Result<()> {
        self.edit(|config| config.show_progress_bar = show).await
    }

    pub async fn set_display_mode(&mut self, mode: DisplayMode) -> Result<()> {
        self.edit(|config| config.display_mode = mode).await
    }

    pub async fn set_slide_interval(&mut self, seconds: u32) -> Result<()> {
        self.edit(|config| config.slide_interval_sec = seconds).await
    }

    /// Appends a slide; adding a slide that exists already changes nothing.
    pub async fn add_slide(&mut self, slide: &str) -> Result<()> {
        self.edit(|config| {
            if !config.slides.iter().any(|s| s == slide) {
                config.slides.push(slide.to_owned());
            }
        })
        .await
    }

    /// Removes a slide everywhere it is referenced, unfreezing if needed.
    pub async fn remove_slide(&mut self, slide: &str) -> Result<()> {
        self.edit(|config| {
            config.slides.retain(|s| s != slide);
            config.enabled_slides.retain(|s| s != slide);
            if config.frozen_slide.as_deref() == Some(slide) {
                config.frozen_slide = None;
            }
        })
        .await
    }

    /// Enables a disabled slide or disables an enabled one.
    pub async fn toggle_slide(&mut self, slide: &str) -> Result<()> {
        self.edit(|config| {
            if config.is_enabled(slide) {
                config.enabled_slides.retain(|s| s != slide);
            } else {
                config.enabled_slides.push(slide.to_owned());
            }
        })
        .await
    }

    pub async fn freeze(&mut self, slide: &str) -> Result<()> {
        self.edit(|config| config.frozen_slide = Some(slide.to_owned()))
            .await
    }

    pub async fn unfreeze(&mut self) -> Result<()> {
        self.edit(|config| config.frozen_slide = None).await
    }

    /// Applies `change` locally, then persists.
    ///
    /// # Errors
    ///
    /// Will return `Err` if no one is logged in, in which case nothing
    /// changes, or if the save failed, in which case the local change is
    /// kept.
    async fn edit<F>(&mut self, change: F) -> Result<()>
    where
        F: FnOnce(&mut DisplayConfig) + Send,
    {
        self.require_login()?;

        // Edits apply on top of whatever the store pushed last, unless an
        // earlier edit is still unsaved.
        let mut config = self.config();
        change(&mut config);

        self.save(config.normalized()).await
    }

    fn require_login(&self) -> Result<()> {
        if self.gate.current_user().borrow().is_none() {
            return Err(Error::permission_denied(
                "log in to change the display configuration",
            ));
        }
        Ok(())
    }

    async fn save(&mut self, config: DisplayConfig) -> Result<()> {
        self.status.send_replace(SaveStatus::Saving);
        let result = self.store.persist(&config).await;

        match result {
            Ok(()) => {
                self.pending = None;
                self.status.send_replace(SaveStatus::Saved);
                Ok(())
            }
            Err(e) => {
                warn!("saving display configuration failed: {e}");
                self.pending = Some(config);
                self.status.send_replace(SaveStatus::Failed(e.to_string()));
                Err(e)
            }
        }
    }
}
