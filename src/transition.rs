//! Track transition state machine.
//!
//! Decides, for every snapshot that comes in, whether the displayed track is
//! updated in place, replaced directly, or crossfaded to something else:
//!
//! | displayed | incoming            | result                         |
//! |-----------|---------------------|--------------------------------|
//! | none      | none                | nothing                        |
//! | none      | some                | displayed directly             |
//! | some      | none                | crossfade to "nothing playing" |
//! | some      | different identity  | crossfade to the new track     |
//! | some      | same identity       | updated in place               |
//!
//! Only one crossfade can be in flight. Snapshots that arrive during a
//! crossfade are dropped rather than queued: the first poll after the
//! crossfade picks up the latest state anyway.

use std::time::Duration;

use tokio::time::Instant;

use crate::track::PlaybackSnapshot;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackState {
    /// Showing one track, or nothing.
    Idle(Option<PlaybackSnapshot>),

    /// Crossfading away from `outgoing`.
    Transitioning {
        outgoing: PlaybackSnapshot,
        incoming: Option<PlaybackSnapshot>,
        deadline: Instant,
    },
}

/// How a snapshot was handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Observation {
    /// Nothing was displayed; the snapshot is now displayed without a
    /// crossfade.
    Displayed,

    /// Same track as displayed; its progress and play state were updated.
    Updated,

    /// A crossfade started.
    Started,

    /// A crossfade is in flight; the snapshot was discarded.
    Dropped,

    /// Nothing displayed, nothing playing.
    Unchanged,
}

#[derive(Clone, Debug)]
pub struct TrackTransition {
    state: TrackState,
    crossfade: Duration,
}

impl TrackTransition {
    #[must_use]
    pub fn new(crossfade: Duration) -> Self {
        Self {
            state: TrackState::Idle(None),
            crossfade,
        }
    }

    #[must_use]
    pub fn state(&self) -> &TrackState {
        &self.state
    }

    /// The track currently on screen. During a crossfade this is the
    /// outgoing track.
    #[must_use]
    pub fn displayed(&self) -> Option<&PlaybackSnapshot> {
        match &self.state {
            TrackState::Idle(displayed) => displayed.as_ref(),
            TrackState::Transitioning { outgoing, .. } => Some(outgoing),
        }
    }

    #[must_use]
    pub fn is_transitioning(&self) -> bool {
        matches!(self.state, TrackState::Transitioning { .. })
    }

    /// When the crossfade in flight completes.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            TrackState::Idle(_) => None,
            TrackState::Transitioning { deadline, .. } => Some(deadline),
        }
    }

    /// Feeds a new snapshot, `None` meaning nothing is playing.
    pub fn observe(&mut self, snapshot: Option<PlaybackSnapshot>, now: Instant) -> Observation {
        let TrackState::Idle(displayed) = &mut self.state else {
            trace!("crossfade in flight; dropping snapshot");
            return Observation::Dropped;
        };

        match (displayed.take(), snapshot) {
            (None, None) => Observation::Unchanged,
            (None, Some(snapshot)) => {
                debug!("displaying {snapshot}");
                *displayed = Some(snapshot);
                Observation::Displayed
            }
            (Some(current), Some(snapshot)) if current.is_same_track(&snapshot) => {
                *displayed = Some(snapshot);
                Observation::Updated
            }
            (Some(outgoing), incoming) => {
                match incoming {
                    Some(ref incoming) => debug!("crossfading from {outgoing} to {incoming}"),
                    None => debug!("crossfading from {outgoing} to nothing"),
                }
                self.state = TrackState::Transitioning {
                    outgoing,
                    incoming,
                    deadline: now + self.crossfade,
                };
                Observation::Started
            }
        }
    }

    /// Completes the crossfade if its deadline has passed, and returns the
    /// promoted snapshot (`Some(None)` when promoting "nothing playing").
    ///
    /// Returns `None` if there is no crossfade or it is still running.
    pub fn complete(&mut self, now: Instant) -> Option<Option<&PlaybackSnapshot>> {
        match self.deadline() {
            Some(deadline) if now >= deadline => {}
            _ => return None,
        }

        let state = std::mem::replace(&mut self.state, TrackState::Idle(None));
        if let TrackState::Transitioning { incoming, .. } = state {
            self.state = TrackState::Idle(incoming);
        }

        trace!("crossfade completed");
        Some(self.displayed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackIdentity;

    const CROSSFADE: Duration = Duration::from_millis(800);

    fn snapshot(name: &str, progress_ms: u64, observed_at: Instant) -> PlaybackSnapshot {
        PlaybackSnapshot {
            identity: TrackIdentity {
                name: name.to_owned(),
                album_art: None,
            },
            artists: vec!["Artist".to_owned()],
            is_playing: true,
            progress: Duration::from_millis(progress_ms),
            duration: Duration::from_secs(180),
            observed_at,
        }
    }

    #[test]
    fn same_identity_never_transitions() {
        let start = Instant::now();
        let mut machine = TrackTransition::new(CROSSFADE);

        assert_eq!(
            machine.observe(Some(snapshot("A", 0, start)), start),
            Observation::Displayed
        );
        for second in 1..20 {
            let now = start + Duration::from_secs(second);
            assert_eq!(
                machine.observe(Some(snapshot("A", second * 1000, now)), now),
                Observation::Updated
            );
            assert!(!machine.is_transitioning());
        }
        assert_eq!(machine.displayed().unwrap().progress, Duration::from_secs(19));
    }

    #[test]
    fn change_produces_one_crossfade_and_drops_overlaps() {
        let start = Instant::now();
        let mut machine = TrackTransition::new(CROSSFADE);
        machine.observe(Some(snapshot("A", 0, start)), start);

        let t1 = start + Duration::from_secs(1);
        assert_eq!(
            machine.observe(Some(snapshot("B", 0, t1)), t1),
            Observation::Started
        );
        assert_eq!(machine.deadline(), Some(t1 + CROSSFADE));
        assert_eq!(machine.displayed().unwrap().name(), "A");

        let t2 = t1 + Duration::from_millis(400);
        assert_eq!(
            machine.observe(Some(snapshot("C", 0, t2)), t2),
            Observation::Dropped
        );
        assert!(machine.complete(t2).is_none());

        let promoted = machine.complete(t1 + CROSSFADE).unwrap();
        assert_eq!(promoted.unwrap().name(), "B");
        assert!(!machine.is_transitioning());
        assert!(machine.complete(t1 + CROSSFADE * 2).is_none());
    }

    #[test]
    fn nothing_playing_twice_transitions_once() {
        let start = Instant::now();
        let mut machine = TrackTransition::new(CROSSFADE);
        machine.observe(Some(snapshot("A", 0, start)), start);

        let t1 = start + Duration::from_secs(1);
        assert_eq!(machine.observe(None, t1), Observation::Started);
        assert_eq!(machine.complete(t1 + CROSSFADE), Some(None));
        assert_eq!(machine.state(), &TrackState::Idle(None));

        let t2 = t1 + Duration::from_secs(1);
        assert_eq!(machine.observe(None, t2), Observation::Unchanged);
        assert!(!machine.is_transitioning());
    }

    #[test]
    fn first_track_is_displayed_directly() {
        let start = Instant::now();
        let mut machine = TrackTransition::new(CROSSFADE);

        assert_eq!(machine.observe(None, start), Observation::Unchanged);
        assert_eq!(
            machine.observe(Some(snapshot("A", 0, start)), start),
            Observation::Displayed
        );
        assert!(machine.deadline().is_none());
    }
}
