//! Slideshow pipeline.
//!
//! Drives a [`SlideCycle`] from the display configuration and publishes a
//! [`SlideView`]. While the embedded player slide is on screen, or fading in,
//! a nested [`Player`] runs at background cadence and publishes to the player
//! view; it is stopped as soon as the slide is gone, which leaves the player
//! view at [`PlayerView::NoActiveTrack`].

use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{self, Instant, Interval, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Timing,
    display::DisplayConfig,
    player::Player,
    poller::{Cadence, Poller},
    slides::{Slide, SlideCycle, SlideState},
    view::{Phase, PlayerView, SlideView},
};

pub struct Slideshow {
    config: watch::Receiver<DisplayConfig>,
    cycle: SlideCycle,
    timing: Timing,

    poller: Poller,
    player_view: watch::Sender<PlayerView>,
    embedded: Option<(CancellationToken, JoinHandle<()>)>,

    view: watch::Sender<SlideView>,
}

impl Slideshow {
    #[must_use]
    pub fn new(
        mut config: watch::Receiver<DisplayConfig>,
        poller: Poller,
        timing: Timing,
        view: watch::Sender<SlideView>,
        player_view: watch::Sender<PlayerView>,
    ) -> Self {
        let cycle = SlideCycle::new(
            &config.borrow_and_update().normalized(),
            timing.slide_crossfade,
        );

        Self {
            config,
            cycle,
            timing,
            poller,
            player_view,
            embedded: None,
            view,
        }
    }

    /// Runs until `cancel` is cancelled, then stops the embedded player.
    pub async fn run(mut self, cancel: CancellationToken) {
        debug!(
            "slideshow of {} slides every {:?}",
            self.cycle.slides().len(),
            self.cycle.interval()
        );
        self.publish();

        let mut interval = Self::interval_timer(&self.cycle);
        let mut config_open = true;

        loop {
            self.sync_embedded(&cancel);
            let deadline = self.cycle.deadline();

            tokio::select! {
                biased;

                () = cancel.cancelled() => break,

                () = time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    if self.cycle.complete(Instant::now()) {
                        self.publish();
                    }
                }

                _ = interval.tick(), if self.cycle.is_cycling() => {
                    if self.cycle.tick(Instant::now()) {
                        self.publish();
                    }
                }

                changed = self.config.changed(), if config_open => {
                    if changed.is_err() {
                        warn!("display configuration closed; keeping last slides");
                        config_open = false;
                        continue;
                    }

                    let config = self.config.borrow_and_update().normalized();
                    let reconfigured = self.cycle.reconfigure(&config);
                    if reconfigured.restarted || reconfigured.interval_changed {
                        interval = Self::interval_timer(&self.cycle);
                    }
                    self.publish();
                }
            }
        }

        if let Some((token, handle)) = self.embedded.take() {
            token.cancel();
            if let Err(e) = handle.await {
                error!("embedded player failed: {e}");
            }
        }
    }

    /// An interval timer whose first tick is one full interval away.
    fn interval_timer(cycle: &SlideCycle) -> Interval {
        let period = cycle.interval();
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }

    fn wants_player(&self) -> bool {
        self.cycle.current() == Some(&Slide::Player)
            || matches!(
                self.cycle.state(),
                SlideState::Transitioning {
                    incoming: Slide::Player,
                    ..
                }
            )
    }

    fn sync_embedded(&mut self, cancel: &CancellationToken) {
        match (self.wants_player(), self.embedded.is_some()) {
            (true, false) => {
                debug!("starting embedded player");
                let token = cancel.child_token();
                let player = Player::new(
                    self.poller.clone(),
                    Cadence::Background,
                    self.timing,
                    self.player_view.clone(),
                );
                let handle = tokio::spawn(player.run(token.clone()));
                self.embedded = Some((token, handle));
            }
            (false, true) => {
                debug!("stopping embedded player");
                if let Some((token, _)) = self.embedded.take() {
                    token.cancel();
                }
            }
            _ => {}
        }
    }

    fn view(&self) -> SlideView {
        let Some(slide) = self.cycle.current() else {
            return SlideView::NoSlides;
        };

        let phase = match self.cycle.state() {
            SlideState::Idle => Phase::Idle,
            SlideState::Transitioning { incoming, .. } => Phase::Transitioning {
                incoming: incoming.clone(),
            },
        };
        SlideView::ShowingSlide {
            slide: slide.clone(),
            phase,
        }
    }

    fn publish(&self) {
        let view = self.view();
        self.view.send_if_modified(|current| {
            if *current == view {
                false
            } else {
                trace!("slide view: {view:?}");
                *current = view;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{atomic::Ordering, Arc},
        time::Duration,
    };

    use super::*;
    use crate::{
        display::EMBEDDED_PLAYER,
        poller::tests::{playing, poller, valid_credential, ScriptedApi},
    };

    struct Harness {
        config: watch::Sender<DisplayConfig>,
        slides: watch::Receiver<SlideView>,
        player: watch::Receiver<PlayerView>,
        api: Arc<ScriptedApi>,
        cancel: CancellationToken,
        start: Instant,
    }

    impl Harness {
        fn spawn(slides: &[&str]) -> Self {
            let config = DisplayConfig {
                slides: slides.iter().map(ToString::to_string).collect(),
                slide_interval_sec: 3,
                ..DisplayConfig::default()
            };
            let (config_tx, config_rx) = watch::channel(config);
            let (slide_tx, slide_rx) = watch::channel(SlideView::default());
            let (player_tx, player_rx) = watch::channel(PlayerView::default());
            let api = Arc::new(ScriptedApi::new(vec![Ok(playing("A", "a", 0))]));
            let cancel = CancellationToken::new();

            let slideshow = Slideshow::new(
                config_rx,
                poller(api.clone(), Some(valid_credential())),
                Timing::default(),
                slide_tx,
                player_tx,
            );
            tokio::spawn(slideshow.run(cancel.clone()));

            Self {
                config: config_tx,
                slides: slide_rx,
                player: player_rx,
                api,
                cancel,
                start: Instant::now(),
            }
        }

        async fn at_ms(&self, ms: u64) {
            time::sleep_until(self.start + Duration::from_millis(ms)).await;
        }

        fn slide(&self) -> SlideView {
            self.slides.borrow().clone()
        }
    }

    fn showing(id: &str) -> SlideView {
        SlideView::ShowingSlide {
            slide: Slide::from(id),
            phase: Phase::Idle,
        }
    }

    fn fading(id: &str, incoming: &str) -> SlideView {
        SlideView::ShowingSlide {
            slide: Slide::from(id),
            phase: Phase::Transitioning {
                incoming: Slide::from(incoming),
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cycles_with_crossfade() {
        let harness = Harness::spawn(&["a.jpg", "b.jpg"]);

        harness.at_ms(100).await;
        assert_eq!(harness.slide(), showing("a.jpg"));

        harness.at_ms(3100).await;
        assert_eq!(harness.slide(), fading("a.jpg", "b.jpg"));

        harness.at_ms(4100).await;
        assert_eq!(harness.slide(), showing("b.jpg"));

        harness.at_ms(7100).await;
        assert_eq!(harness.slide(), showing("a.jpg"));

        harness.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn freezing_pins_one_slide() {
        let harness = Harness::spawn(&["a.jpg", "b.jpg", "c.jpg"]);

        harness.at_ms(100).await;
        harness.config.send_modify(|config| {
            config.frozen_slide = Some("c.jpg".to_owned());
        });

        harness.at_ms(200).await;
        assert_eq!(harness.slide(), showing("c.jpg"));

        harness.at_ms(20_000).await;
        assert_eq!(harness.slide(), showing("c.jpg"));

        harness.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn unfreezing_resumes_cycling_from_first_slide() {
        let harness = Harness::spawn(&["a.jpg", "b.jpg", "c.jpg"]);

        harness.at_ms(100).await;
        harness.config.send_modify(|config| {
            config.frozen_slide = Some("c.jpg".to_owned());
        });

        harness.at_ms(10_000).await;
        assert_eq!(harness.slide(), showing("c.jpg"));
        harness.config.send_modify(|config| config.frozen_slide = None);

        harness.at_ms(10_100).await;
        assert_eq!(harness.slide(), showing("a.jpg"));

        // The interval restarts on unfreeze.
        harness.at_ms(12_900).await;
        assert_eq!(harness.slide(), showing("a.jpg"));
        harness.at_ms(13_100).await;
        assert_eq!(harness.slide(), fading("a.jpg", "b.jpg"));
        harness.at_ms(14_100).await;
        assert_eq!(harness.slide(), showing("b.jpg"));

        harness.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn empty_list_shows_nothing() {
        let harness = Harness::spawn(&[]);

        harness.at_ms(100).await;
        assert_eq!(harness.slide(), SlideView::NoSlides);

        harness.config.send_modify(|config| {
            config.slides = vec!["a.jpg".to_owned()];
        });
        harness.at_ms(200).await;
        assert_eq!(harness.slide(), showing("a.jpg"));

        harness.cancel.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn embedded_player_runs_only_while_visible() {
        let harness = Harness::spawn(&["a.jpg", EMBEDDED_PLAYER]);

        harness.at_ms(2900).await;
        assert_eq!(harness.api.calls.load(Ordering::SeqCst), 0);

        // Started as the slide fades in.
        harness.at_ms(3100).await;
        assert_eq!(harness.slide(), fading("a.jpg", EMBEDDED_PLAYER));
        assert_eq!(harness.api.calls.load(Ordering::SeqCst), 1);
        assert!(matches!(
            *harness.player.borrow(),
            PlayerView::Displaying { .. }
        ));

        // Stopped once the next slide has faded in, before its next poll.
        harness.at_ms(7100).await;
        assert_eq!(harness.slide(), showing("a.jpg"));
        assert_eq!(*harness.player.borrow(), PlayerView::NoActiveTrack);
        harness.at_ms(8900).await;
        assert_eq!(harness.api.calls.load(Ordering::SeqCst), 1);

        harness.cancel.cancel();
    }
}
