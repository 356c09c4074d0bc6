//! View states emitted for rendering.
//!
//! These are the only values that cross from the engine to a renderer:
//!
//! Player:
//! * [`PlayerView::Unauthenticated`] - show a login prompt
//! * [`PlayerView::Error`] - show a transient error message
//! * [`PlayerView::NoActiveTrack`] - nothing is playing
//! * [`PlayerView::Displaying`] - a track, its progress and crossfade phase
//!
//! Slideshow:
//! * [`SlideView::NoSlides`] - nothing configured
//! * [`SlideView::ShowingSlide`] - a slide and its crossfade phase
//!
//! Renderers also read the [`DisplayConfig`] for styling; [`Layout`] derives
//! the scaled sizes from it.

use crate::{
    display::DisplayConfig,
    slides::Slide,
    track::{PlaybackSnapshot, Percentage},
};

/// Crossfade phase of a displayed value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Phase<T> {
    Idle,
    /// Fading out the displayed value in favour of `incoming`.
    Transitioning { incoming: T },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum PlayerView {
    #[default]
    Unauthenticated,
    Error(String),
    NoActiveTrack,
    Displaying {
        track: PlaybackSnapshot,
        progress: Percentage,
        phase: Phase<Option<PlaybackSnapshot>>,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SlideView {
    #[default]
    NoSlides,
    ShowingSlide { slide: Slide, phase: Phase<Slide> },
}

/// Scaled sizes for a now playing view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Layout {
    /// Album art edge length in pixels.
    pub cover_size: u32,
    /// Track name font size in rem.
    pub title_size: f64,
    /// Artist line font size in rem.
    pub artist_size: f64,
    /// Gap between album art and text in pixels.
    pub gap: u32,
}

impl Layout {
    const COVER_SIZE: f64 = 500.0;
    const TITLE_SIZE: f64 = 7.0;
    const ARTIST_SIZE: f64 = 3.5;
    const GAP: f64 = 100.0;

    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn from_config(config: &DisplayConfig) -> Self {
        // Normalized scales are positive and small, so the casts are exact.
        let scale = config.normalized().scale;
        Self {
            cover_size: (Self::COVER_SIZE * scale).round() as u32,
            title_size: Self::TITLE_SIZE * scale,
            artist_size: Self::ARTIST_SIZE * scale,
            gap: (Self::GAP * scale).round() as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_scales() {
        let config = DisplayConfig {
            scale: 0.5,
            ..DisplayConfig::default()
        };
        let layout = Layout::from_config(&config);

        assert_eq!(layout.cover_size, 250);
        assert_eq!(layout.gap, 50);
        assert!((layout.title_size - 3.5).abs() < f64::EPSILON);
        assert!((layout.artist_size - 1.75).abs() < f64::EPSILON);
    }
}
