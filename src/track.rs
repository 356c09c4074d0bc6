//! Playback snapshots.
//!
//! A [`PlaybackSnapshot`] is one point-in-time read of the remote playback
//! state. Snapshots are immutable: every poll produces a new one that
//! replaces the previous snapshot as a whole.

use std::{fmt, time::Duration};

use tokio::time::Instant;
use url::Url;

use crate::protocol::playback::{CurrentlyPlaying, Image};

/// Identity of a track for the purpose of "is this the same track".
///
/// Two snapshots show the same track if and only if both the name and the
/// album art URL are equal. The same song on a different album is therefore a
/// different track, and so is a re-release with new artwork.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TrackIdentity {
    pub name: String,
    pub album_art: Option<Url>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PlaybackSnapshot {
    pub identity: TrackIdentity,
    pub artists: Vec<String>,
    pub is_playing: bool,
    pub progress: Duration,
    pub duration: Duration,
    pub observed_at: Instant,
}

impl PlaybackSnapshot {
    /// Builds a snapshot from a currently-playing response.
    ///
    /// Returns `None` when nothing playable is in the response: no item, or
    /// an item without a duration.
    #[must_use]
    pub fn from_payload(payload: &CurrentlyPlaying, observed_at: Instant) -> Option<Self> {
        let item = payload.item.as_ref()?;
        if item.duration_ms == 0 {
            warn!("ignoring \"{}\" without duration", item.name);
            return None;
        }

        let album_art = item
            .album
            .as_ref()
            .and_then(|album| largest_image(&album.images))
            .map(|image| image.url.clone());

        Some(Self {
            identity: TrackIdentity {
                name: item.name.clone(),
                album_art,
            },
            artists: item.artists.iter().map(|artist| artist.name.clone()).collect(),
            is_playing: payload.is_playing,
            progress: Duration::from_millis(payload.progress_ms.unwrap_or_default()),
            duration: Duration::from_millis(item.duration_ms),
            observed_at,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.identity.name
    }

    #[must_use]
    pub fn album_art(&self) -> Option<&Url> {
        self.identity.album_art.as_ref()
    }

    /// Artists joined for display.
    #[must_use]
    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }

    #[must_use]
    pub fn is_same_track(&self, other: &Self) -> bool {
        self.identity == other.identity
    }
}

impl fmt::Display for PlaybackSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.artists.is_empty() {
            write!(f, "{}", self.identity.name)
        } else {
            write!(f, "{} - {}", self.artist_line(), self.identity.name)
        }
    }
}

/// Picks the widest image; among equally wide images the first one wins.
/// Images without a width count as zero wide.
fn largest_image(images: &[Image]) -> Option<&Image> {
    images.iter().fold(None, |widest: Option<&Image>, image| match widest {
        Some(widest) if image.width.unwrap_or(0) <= widest.width.unwrap_or(0) => Some(widest),
        _ => Some(image),
    })
}

/// Playback progress, clamped to `[0, 100]` percent.
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd)]
pub struct Percentage(f64);

impl Percentage {
    pub const ZERO: Self = Self(0.0);
    pub const FULL: Self = Self(1.0);

    /// Creates a percentage out of a ratio, clamping it to `[0.0, 1.0]`.
    /// `NaN` becomes zero.
    #[must_use]
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio.is_nan() {
            return Self::ZERO;
        }
        Self(ratio.clamp(0.0, 1.0))
    }

    /// Progress of `position` into a track of length `duration`.
    #[must_use]
    pub fn of(position: Duration, duration: Duration) -> Self {
        if duration.is_zero() {
            return Self::ZERO;
        }
        Self::from_ratio(position.as_secs_f64() / duration.as_secs_f64())
    }

    #[must_use]
    pub fn as_ratio(&self) -> f64 {
        self.0
    }

    #[must_use]
    pub fn as_percent(&self) -> f64 {
        self.0 * 100.0
    }
}

impl fmt::Display for Percentage {
    /// Formats a `Percentage` for display with a `%` sign.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}%", self.as_percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: &str) -> CurrentlyPlaying {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn picks_widest_album_art() {
        let payload = payload(
            r#"{
                "is_playing": true,
                "progress_ms": 1000,
                "item": {
                    "name": "Song",
                    "duration_ms": 200000,
                    "artists": [{"name": "A"}, {"name": "B"}],
                    "album": {"images": [
                        {"url": "https://img.test/300", "width": 300, "height": 300},
                        {"url": "https://img.test/640a", "width": 640, "height": 640},
                        {"url": "https://img.test/640b", "width": 640, "height": 640},
                        {"url": "https://img.test/64", "width": 64, "height": 64}
                    ]}
                }
            }"#,
        );

        let snapshot = PlaybackSnapshot::from_payload(&payload, Instant::now()).unwrap();
        assert_eq!(
            snapshot.album_art().map(Url::as_str),
            Some("https://img.test/640a")
        );
        assert_eq!(snapshot.artist_line(), "A, B");
        assert_eq!(snapshot.progress, Duration::from_secs(1));
        assert_eq!(snapshot.to_string(), "A, B - Song");
    }

    #[test]
    fn no_item_is_no_snapshot() {
        let payload = payload(r#"{"is_playing": false, "item": null}"#);
        assert!(PlaybackSnapshot::from_payload(&payload, Instant::now()).is_none());
    }

    #[test]
    fn identity_needs_name_and_art() {
        let now = Instant::now();
        let first = payload(
            r#"{"is_playing": true, "progress_ms": 0, "item": {"name": "Song", "duration_ms": 1000,
                "album": {"images": [{"url": "https://img.test/a", "width": 10}]}}}"#,
        );
        let other_album = payload(
            r#"{"is_playing": true, "progress_ms": 500, "item": {"name": "Song", "duration_ms": 1000,
                "album": {"images": [{"url": "https://img.test/b", "width": 10}]}}}"#,
        );

        let a = PlaybackSnapshot::from_payload(&first, now).unwrap();
        let b = PlaybackSnapshot::from_payload(&other_album, now).unwrap();
        let a_later = PlaybackSnapshot::from_payload(&first, now + Duration::from_secs(1)).unwrap();

        assert!(!a.is_same_track(&b));
        assert!(a.is_same_track(&a_later));
    }

    #[test]
    fn percentage_is_clamped() {
        let duration = Duration::from_secs(10);
        assert_eq!(Percentage::of(Duration::from_secs(20), duration), Percentage::FULL);
        assert_eq!(Percentage::of(Duration::ZERO, Duration::ZERO), Percentage::ZERO);
        assert_eq!(Percentage::from_ratio(f64::NAN), Percentage::ZERO);
        assert_eq!(Percentage::of(Duration::from_secs(5), duration).to_string(), "50.0%");
    }
}
