//! Sub-poll playback progress.
//!
//! Polls arrive once a second at best, with varying latency. Showing the
//! polled progress directly makes the progress bar jump. Instead the
//! interpolator keeps an *anchor*, the progress of one accepted snapshot and
//! the instant it was observed, and extrapolates from there with the wall
//! clock.
//!
//! The anchor moves only when a different snapshot is accepted for display,
//! or when playback pauses or resumes. Polls of the same track that keep
//! playing do not re-anchor, because their latency jitter would show.

use std::time::Duration;

use tokio::time::Instant;

use crate::track::{PlaybackSnapshot, Percentage};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Progress {
    base: Duration,
    anchored_at: Instant,
    duration: Duration,
    playing: bool,
}

impl Progress {
    #[must_use]
    pub fn anchor(snapshot: &PlaybackSnapshot) -> Self {
        Self {
            base: snapshot.progress,
            anchored_at: snapshot.observed_at,
            duration: snapshot.duration,
            playing: snapshot.is_playing,
        }
    }

    /// Follows a newer snapshot of the same track.
    ///
    /// Re-anchors only when the play state is not "still playing", so that a
    /// pause shows its exact position and a resume starts from there.
    pub fn follow(&mut self, snapshot: &PlaybackSnapshot) {
        if self.playing && snapshot.is_playing {
            return;
        }
        *self = Self::anchor(snapshot);
    }

    /// Whether the progress tick timer should be running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.playing
    }

    /// Estimated progress at `now`, clamped to `[0, 100]` percent.
    #[must_use]
    pub fn at(&self, now: Instant) -> Percentage {
        let position = if self.playing {
            self.base + now.saturating_duration_since(self.anchored_at)
        } else {
            self.base
        };
        Percentage::of(position, self.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackIdentity;

    fn snapshot(progress_ms: u64, is_playing: bool, observed_at: Instant) -> PlaybackSnapshot {
        PlaybackSnapshot {
            identity: TrackIdentity {
                name: "Song".to_owned(),
                album_art: None,
            },
            artists: vec![],
            is_playing,
            progress: Duration::from_millis(progress_ms),
            duration: Duration::from_secs(10),
            observed_at,
        }
    }

    #[test]
    fn extrapolates_and_clamps() {
        let start = Instant::now();
        let progress = Progress::anchor(&snapshot(9_000, true, start));

        assert_eq!(progress.at(start), Percentage::from_ratio(0.9));
        assert_eq!(
            progress.at(start + Duration::from_millis(500)),
            Percentage::from_ratio(0.95)
        );
        assert_eq!(progress.at(start + Duration::from_secs(1)), Percentage::FULL);
        assert_eq!(progress.at(start + Duration::from_secs(60)), Percentage::FULL);
    }

    #[test]
    fn monotonic_within_anchor() {
        let start = Instant::now();
        let progress = Progress::anchor(&snapshot(1_000, true, start));

        let mut last = Percentage::ZERO;
        for ms in (0..12_000).step_by(50) {
            let now = progress.at(start + Duration::from_millis(ms));
            assert!(now >= last);
            last = now;
        }
        assert_eq!(last, Percentage::FULL);
    }

    #[test]
    fn same_track_polls_do_not_reanchor() {
        let start = Instant::now();
        let mut progress = Progress::anchor(&snapshot(1_000, true, start));

        // A late poll reporting less progress than extrapolated.
        progress.follow(&snapshot(1_900, true, start + Duration::from_secs(1)));
        assert_eq!(
            progress.at(start + Duration::from_secs(1)),
            Percentage::from_ratio(0.2)
        );
    }

    #[test]
    fn pause_freezes_and_resume_reanchors() {
        let start = Instant::now();
        let mut progress = Progress::anchor(&snapshot(1_000, true, start));

        progress.follow(&snapshot(3_000, false, start + Duration::from_secs(2)));
        assert!(!progress.is_running());
        assert_eq!(
            progress.at(start + Duration::from_secs(30)),
            Percentage::from_ratio(0.3)
        );

        let resumed = start + Duration::from_secs(40);
        progress.follow(&snapshot(3_000, true, resumed));
        assert!(progress.is_running());
        assert_eq!(
            progress.at(resumed + Duration::from_secs(1)),
            Percentage::from_ratio(0.4)
        );
    }
}
