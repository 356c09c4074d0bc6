//! Top level of the presentation engine.
//!
//! The [`Presenter`] follows the configured display mode and runs exactly one
//! pipeline at a time: the full-screen [`Player`] or the [`Slideshow`]. On a
//! mode change the running pipeline is cancelled and awaited before the next
//! one starts, so no timer of the old view outlives it.
//!
//! Renderers subscribe to the view channels and the display configuration;
//! nothing else crosses from the engine to a renderer.

use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::{
    config::Timing,
    display::{DisplayConfig, DisplayMode},
    player::Player,
    poller::{Cadence, Poller},
    slideshow::Slideshow,
    view::{PlayerView, SlideView},
};

pub struct Presenter {
    config: watch::Receiver<DisplayConfig>,
    poller: Poller,
    timing: Timing,

    player_view: watch::Sender<PlayerView>,
    slide_view: watch::Sender<SlideView>,
}

impl Presenter {
    #[must_use]
    pub fn new(config: watch::Receiver<DisplayConfig>, poller: Poller, timing: Timing) -> Self {
        let (player_view, _) = watch::channel(PlayerView::default());
        let (slide_view, _) = watch::channel(SlideView::default());

        Self {
            config,
            poller,
            timing,
            player_view,
            slide_view,
        }
    }

    #[must_use]
    pub fn player_view(&self) -> watch::Receiver<PlayerView> {
        self.player_view.subscribe()
    }

    #[must_use]
    pub fn slide_view(&self) -> watch::Receiver<SlideView> {
        self.slide_view.subscribe()
    }

    /// The display configuration, for styling.
    #[must_use]
    pub fn config(&self) -> watch::Receiver<DisplayConfig> {
        self.config.clone()
    }

    /// Runs until `cancel` is cancelled, then tears down the active pipeline.
    pub async fn run(mut self, cancel: CancellationToken) {
        let mut mode = None;
        let mut active = None;
        let mut config_open = true;

        loop {
            let wanted = self.config.borrow_and_update().display_mode;
            if mode != Some(wanted) {
                Self::stop(active.take()).await;

                info!("presenting {wanted:?}");
                active = Some(self.start(wanted, &cancel));
                mode = Some(wanted);
            }

            tokio::select! {
                biased;

                () = cancel.cancelled() => break,

                changed = self.config.changed(), if config_open => {
                    if changed.is_err() {
                        warn!("display configuration closed; keeping {wanted:?}");
                        config_open = false;
                    }
                }
            }
        }

        Self::stop(active.take()).await;
        debug!("presenter stopped");
    }

    fn start(
        &self,
        mode: DisplayMode,
        cancel: &CancellationToken,
    ) -> (CancellationToken, JoinHandle<()>) {
        let token = cancel.child_token();
        let handle = match mode {
            DisplayMode::Player => {
                let player = Player::new(
                    self.poller.clone(),
                    Cadence::Live,
                    self.timing,
                    self.player_view.clone(),
                );
                tokio::spawn(player.run(token.clone()))
            }
            DisplayMode::Images => {
                let slideshow = Slideshow::new(
                    self.config.clone(),
                    self.poller.clone(),
                    self.timing,
                    self.slide_view.clone(),
                    self.player_view.clone(),
                );
                tokio::spawn(slideshow.run(token.clone()))
            }
        };

        (token, handle)
    }

    async fn stop(active: Option<(CancellationToken, JoinHandle<()>)>) {
        if let Some((token, handle)) = active {
            token.cancel();
            if let Err(e) = handle.await {
                error!("view task failed: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{atomic::Ordering, Arc},
        time::Duration,
    };

    use tokio::time::{self, Instant};

    use super::*;
    use crate::{
        poller::tests::{playing, poller, valid_credential, ScriptedApi},
        slides::Slide,
        view::Phase,
    };

    #[tokio::test(start_paused = true)]
    async fn switches_pipeline_with_display_mode() {
        let api = Arc::new(ScriptedApi::new(vec![Ok(playing("A", "a", 0))]));
        let (config_tx, config_rx) = watch::channel(DisplayConfig {
            slides: vec!["a.jpg".to_owned(), "b.jpg".to_owned()],
            ..DisplayConfig::default()
        });
        let presenter = Presenter::new(
            config_rx,
            poller(api.clone(), Some(valid_credential())),
            Timing::default(),
        );
        let player = presenter.player_view();
        let slides = presenter.slide_view();
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(presenter.run(cancel.clone()));
        let start = Instant::now();

        // Live cadence: one poll per second.
        time::sleep_until(start + Duration::from_millis(2500)).await;
        assert!(matches!(*player.borrow(), PlayerView::Displaying { .. }));
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);
        assert_eq!(*slides.borrow(), SlideView::NoSlides);

        config_tx.send_modify(|config| config.display_mode = DisplayMode::Images);
        time::sleep_until(start + Duration::from_millis(2600)).await;
        assert_eq!(
            *slides.borrow(),
            SlideView::ShowingSlide {
                slide: Slide::from("a.jpg"),
                phase: Phase::Idle,
            }
        );

        // The live player is gone and no slide shows the player.
        time::sleep_until(start + Duration::from_secs(10)).await;
        assert_eq!(api.calls.load(Ordering::SeqCst), 3);

        cancel.cancel();
        handle.await.unwrap();
    }
}
