//! Display configuration.
//!
//! The configuration is owned by an external store and delivered as a whole
//! on every change. Fields that are absent from the stored document take
//! their default values, so a partial document is always a valid
//! configuration.
//!
//! Older documents name the slide fields after images (`availableImages`,
//! `enabledImages`, `frozenImage`, `imageInterval`); these names are accepted
//! on read and written back under the current names.

use serde::{Deserialize, Serialize};

/// Slide id of the embedded live player.
pub const EMBEDDED_PLAYER: &str = "embedded-player";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackgroundMode {
    /// Blurred album art.
    #[default]
    Cover,
    Black,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    /// Full-screen now playing view.
    #[default]
    Player,
    /// Slideshow, which may include the player as one of its slides.
    Images,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DisplayConfig {
    pub scale: f64,
    pub background_mode: BackgroundMode,
    pub show_progress_bar: bool,
    pub display_mode: DisplayMode,

    /// All slides in presentation order.
    #[serde(alias = "availableImages")]
    pub slides: Vec<String>,

    /// Slides to cycle through; all slides when empty.
    #[serde(alias = "enabledImages")]
    pub enabled_slides: Vec<String>,

    /// Pins the slideshow to this slide.
    #[serde(alias = "frozenImage", skip_serializing_if = "Option::is_none")]
    pub frozen_slide: Option<String>,

    #[serde(alias = "imageInterval")]
    pub slide_interval_sec: u32,
}

impl DisplayConfig {
    pub const MIN_SCALE: f64 = 0.25;
    pub const MAX_SCALE: f64 = 2.0;

    pub const MIN_SLIDE_INTERVAL_SEC: u32 = 3;
    pub const MAX_SLIDE_INTERVAL_SEC: u32 = 60;

    /// Returns a copy with every field in its valid range.
    ///
    /// * `scale` is clamped to `[0.25, 2.0]`, which covers both the current
    ///   `[0.25, 0.75]` and the legacy `[0.5, 2.0]` ranges
    /// * `slide_interval_sec` is clamped to `[3, 60]`
    /// * duplicate slide ids are removed, keeping the first occurrence
    /// * an empty frozen slide means "not frozen"
    #[must_use]
    pub fn normalized(&self) -> Self {
        let scale = if self.scale.is_finite() {
            self.scale.clamp(Self::MIN_SCALE, Self::MAX_SCALE)
        } else {
            Self::default().scale
        };

        Self {
            scale,
            slides: dedup(&self.slides),
            enabled_slides: dedup(&self.enabled_slides),
            frozen_slide: self.frozen_slide.clone().filter(|slide| !slide.is_empty()),
            slide_interval_sec: self
                .slide_interval_sec
                .clamp(Self::MIN_SLIDE_INTERVAL_SEC, Self::MAX_SLIDE_INTERVAL_SEC),
            ..self.clone()
        }
    }

    /// Whether `slide` is in the enabled set.
    #[must_use]
    pub fn is_enabled(&self, slide: &str) -> bool {
        self.enabled_slides.iter().any(|enabled| enabled == slide)
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            scale: 1.0,
            background_mode: BackgroundMode::default(),
            show_progress_bar: true,
            display_mode: DisplayMode::default(),
            slides: Vec::new(),
            enabled_slides: Vec::new(),
            frozen_slide: None,
            slide_interval_sec: 10,
        }
    }
}

fn dedup(slides: &[String]) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(slides.len());
    for slide in slides {
        if !unique.contains(slide) {
            unique.push(slide.clone());
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_fields_take_defaults() {
        let config: DisplayConfig = toml::from_str(r#"backgroundMode = "black""#).unwrap();

        assert_eq!(config.background_mode, BackgroundMode::Black);
        assert_eq!(config.scale, 1.0);
        assert!(config.show_progress_bar);
        assert_eq!(config.slide_interval_sec, 10);
    }

    #[test]
    fn legacy_names_are_accepted() {
        let config: DisplayConfig = toml::from_str(
            r#"
            displayMode = "images"
            availableImages = ["a.jpg", "b.jpg"]
            enabledImages = ["b.jpg"]
            frozenImage = "a.jpg"
            imageInterval = 15
            "#,
        )
        .unwrap();

        assert_eq!(config.display_mode, DisplayMode::Images);
        assert_eq!(config.slides, ["a.jpg", "b.jpg"]);
        assert_eq!(config.enabled_slides, ["b.jpg"]);
        assert_eq!(config.frozen_slide.as_deref(), Some("a.jpg"));
        assert_eq!(config.slide_interval_sec, 15);

        let written = toml::to_string(&config).unwrap();
        assert!(written.contains("frozenSlide"));
        assert!(!written.contains("frozenImage"));
    }

    #[test]
    fn normalization_clamps_and_dedups() {
        let config = DisplayConfig {
            scale: 5.0,
            slides: vec!["a".into(), "b".into(), "a".into()],
            frozen_slide: Some(String::new()),
            slide_interval_sec: 1,
            ..DisplayConfig::default()
        }
        .normalized();

        assert_eq!(config.scale, DisplayConfig::MAX_SCALE);
        assert_eq!(config.slides, ["a", "b"]);
        assert_eq!(config.frozen_slide, None);
        assert_eq!(config.slide_interval_sec, 3);
        assert_eq!(config.normalized(), config);
    }
}
