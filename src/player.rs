//! Live now playing pipeline.
//!
//! A [`Player`] ties together the [`Poller`], the [`TrackTransition`] state
//! machine and the [`Progress`] interpolator, and publishes a [`PlayerView`]
//! whenever what should be on screen changes.
//!
//! Everything runs in one task:
//! * the poll timer starts a poll; polls run concurrently and are handled in
//!   the order they complete, so a slow response cannot hold up a fast one
//! * the progress timer re-renders the interpolated progress while a track
//!   is playing
//! * the crossfade deadline promotes the incoming track
//! * credential changes resume polling after the user authenticated again
//!
//! Cancelling the token stops all timers and drops polls that are still in
//! flight. The view is then left at "nothing playing".

use futures_util::{
    future::{BoxFuture, FutureExt},
    stream::{FuturesUnordered, StreamExt},
};
use tokio::{
    sync::watch,
    time::{self, Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Timing,
    credentials::Credential,
    poller::{Cadence, PollOutcome, Poller},
    progress::Progress,
    track::Percentage,
    transition::{Observation, TrackState, TrackTransition},
    view::{Phase, PlayerView},
};

pub struct Player {
    poller: Poller,
    cadence: Cadence,
    timing: Timing,

    transition: TrackTransition,
    progress: Option<Progress>,
    authenticated: bool,
    error: Option<String>,

    view: watch::Sender<PlayerView>,
}

impl Player {
    /// Upper bound on concurrent polls. Poll ticks beyond it are skipped.
    const MAX_POLLS_IN_FLIGHT: usize = 3;

    #[must_use]
    pub fn new(
        poller: Poller,
        cadence: Cadence,
        timing: Timing,
        view: watch::Sender<PlayerView>,
    ) -> Self {
        Self {
            poller,
            cadence,
            timing,
            transition: TrackTransition::new(timing.track_crossfade),
            progress: None,
            authenticated: false,
            error: None,
            view,
        }
    }

    /// Runs until `cancel` is cancelled, then publishes
    /// [`PlayerView::NoActiveTrack`].
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut credentials = self.poller.credentials().lock().await.subscribe();
        self.authenticated = credentials
            .borrow_and_update()
            .as_ref()
            .is_some_and(Credential::is_usable);
        let mut credentials_open = true;
        self.publish(Instant::now());

        let period = self.cadence.period(&self.timing);
        debug!("polling every {period:?}");
        let mut poll = time::interval(period);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut progress_tick = time::interval(self.timing.progress_tick);
        progress_tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let mut in_flight: FuturesUnordered<BoxFuture<'static, PollOutcome>> =
            FuturesUnordered::new();

        loop {
            let deadline = self.transition.deadline();

            tokio::select! {
                biased;

                () = cancel.cancelled() => break,

                () = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    self.on_deadline(Instant::now());
                }

                Some(outcome) = in_flight.next(), if !in_flight.is_empty() => {
                    self.on_outcome(outcome);
                }

                _ = poll.tick(), if self.authenticated => {
                    if in_flight.len() < Self::MAX_POLLS_IN_FLIGHT {
                        let poller = self.poller.clone();
                        in_flight.push(async move { poller.poll().await }.boxed());
                    } else {
                        debug!("{} polls in flight; skipping poll", in_flight.len());
                    }
                }

                _ = progress_tick.tick(), if self.is_progressing() => {
                    self.publish(Instant::now());
                }

                changed = credentials.changed(), if credentials_open => {
                    if changed.is_err() {
                        credentials_open = false;
                        continue;
                    }

                    let usable = credentials
                        .borrow_and_update()
                        .as_ref()
                        .is_some_and(Credential::is_usable);
                    if usable && !self.authenticated {
                        info!("authenticated; resuming polling");
                        self.authenticated = true;
                        poll.reset_immediately();
                        self.publish(Instant::now());
                    }
                }
            }
        }

        // Nothing is on screen once stopped.
        self.view.send_replace(PlayerView::NoActiveTrack);
        debug!("player stopped with {} polls in flight", in_flight.len());
    }

    fn on_outcome(&mut self, outcome: PollOutcome) {
        let now = Instant::now();
        match outcome {
            PollOutcome::Unauthenticated => {
                if self.authenticated {
                    info!("authentication required; polling suspended");
                }
                self.authenticated = false;
            }
            PollOutcome::Failed(message) => {
                self.error = Some(message);
            }
            PollOutcome::Playback(snapshot) => {
                self.error = None;
                match self.transition.observe(snapshot, now) {
                    Observation::Displayed => {
                        self.progress = self.transition.displayed().map(Progress::anchor);
                    }
                    Observation::Updated => {
                        if let (Some(progress), Some(displayed)) =
                            (self.progress.as_mut(), self.transition.displayed())
                        {
                            progress.follow(displayed);
                        }
                    }
                    Observation::Started | Observation::Dropped | Observation::Unchanged => {}
                }
            }
        }

        self.publish(now);
    }

    fn on_deadline(&mut self, now: Instant) {
        if let Some(promoted) = self.transition.complete(now) {
            self.progress = promoted.map(Progress::anchor);
            self.publish(now);
        }
    }

    /// Whether the progress timer should run: a track is on screen and
    /// playing.
    fn is_progressing(&self) -> bool {
        self.transition.displayed().is_some() && self.progress.is_some_and(|p| p.is_running())
    }

    fn view(&self, now: Instant) -> PlayerView {
        if !self.authenticated {
            return PlayerView::Unauthenticated;
        }
        if let Some(ref message) = self.error {
            return PlayerView::Error(message.clone());
        }

        let progress = self.progress.map_or(Percentage::ZERO, |p| p.at(now));
        match self.transition.state() {
            TrackState::Idle(None) => PlayerView::NoActiveTrack,
            TrackState::Idle(Some(track)) => PlayerView::Displaying {
                track: track.clone(),
                progress,
                phase: Phase::Idle,
            },
            TrackState::Transitioning {
                outgoing, incoming, ..
            } => PlayerView::Displaying {
                track: outgoing.clone(),
                progress,
                phase: Phase::Transitioning {
                    incoming: incoming.clone(),
                },
            },
        }
    }

    fn publish(&self, now: Instant) {
        let view = self.view(now);
        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                *current = view;
                true
            }
        });
    }
}
