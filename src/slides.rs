//! Slide cycle state machine.
//!
//! The slide list is derived from the display configuration:
//!
//! 1. a frozen slide, on its own;
//! 2. otherwise the enabled slides, if any;
//! 3. otherwise all slides.
//!
//! With more than one slide, every interval tick crossfades to the next slide,
//! wrapping around at the end. Reconfiguring while a crossfade is in flight
//! lets that crossfade finish against the index it was aiming for; the next
//! tick works with the new list.

use std::{fmt, time::Duration};

use tokio::time::Instant;

use crate::display::{DisplayConfig, EMBEDDED_PLAYER};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Slide {
    /// Static image, by file name.
    Image(String),
    /// The live player.
    Player,
}

impl From<&str> for Slide {
    fn from(id: &str) -> Self {
        if id == EMBEDDED_PLAYER {
            Self::Player
        } else {
            Self::Image(id.to_owned())
        }
    }
}

impl fmt::Display for Slide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image(name) => write!(f, "{name}"),
            Self::Player => write!(f, "{EMBEDDED_PLAYER}"),
        }
    }
}

/// Derives the slides to cycle through.
#[must_use]
pub fn slide_list(config: &DisplayConfig) -> Vec<Slide> {
    if let Some(ref frozen) = config.frozen_slide {
        return vec![Slide::from(frozen.as_str())];
    }

    let ids = if config.enabled_slides.is_empty() {
        &config.slides
    } else {
        &config.enabled_slides
    };
    ids.iter().map(|id| Slide::from(id.as_str())).collect()
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SlideState {
    Idle,
    Transitioning {
        incoming: Slide,
        next_index: usize,
        deadline: Instant,
    },
}

/// Effect of applying a new configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Reconfigured {
    /// The list length changed: the cycle restarted from the first slide and
    /// its interval timer must be restarted as well.
    pub restarted: bool,
    /// The interval changed; the timer must be restarted.
    pub interval_changed: bool,
}

#[derive(Clone, Debug)]
pub struct SlideCycle {
    slides: Vec<Slide>,
    frozen: bool,
    interval: Duration,
    active_index: usize,
    state: SlideState,
    crossfade: Duration,
}

impl SlideCycle {
    #[must_use]
    pub fn new(config: &DisplayConfig, crossfade: Duration) -> Self {
        Self {
            slides: slide_list(config),
            frozen: config.frozen_slide.is_some(),
            interval: Duration::from_secs(config.slide_interval_sec.into()),
            active_index: 0,
            state: SlideState::Idle,
            crossfade,
        }
    }

    /// Re-derives the slide list from a new configuration.
    pub fn reconfigure(&mut self, config: &DisplayConfig) -> Reconfigured {
        let slides = slide_list(config);
        let interval = Duration::from_secs(config.slide_interval_sec.into());

        let restarted = slides.len() != self.slides.len();
        if restarted {
            debug!("slide list now has {} slides; restarting", slides.len());
            self.active_index = 0;
        }
        let interval_changed = interval != self.interval;

        self.slides = slides;
        self.frozen = config.frozen_slide.is_some();
        self.interval = interval;

        Reconfigured {
            restarted,
            interval_changed,
        }
    }

    #[must_use]
    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active_index
    }

    /// The slide on screen, `None` when there are no slides.
    #[must_use]
    pub fn current(&self) -> Option<&Slide> {
        self.slides.get(self.active_index)
    }

    #[must_use]
    pub fn state(&self) -> &SlideState {
        &self.state
    }

    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Whether the interval timer should be armed.
    #[must_use]
    pub fn is_cycling(&self) -> bool {
        !self.frozen && self.slides.len() > 1
    }

    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match self.state {
            SlideState::Idle => None,
            SlideState::Transitioning { deadline, .. } => Some(deadline),
        }
    }

    /// Handles an interval tick. Returns whether a crossfade started.
    pub fn tick(&mut self, now: Instant) -> bool {
        if !self.is_cycling() || self.state != SlideState::Idle {
            return false;
        }

        let next_index = (self.active_index + 1) % self.slides.len();
        let incoming = self.slides[next_index].clone();
        trace!("crossfading to slide {next_index} ({incoming})");

        self.state = SlideState::Transitioning {
            incoming,
            next_index,
            deadline: now + self.crossfade,
        };
        true
    }

    /// Commits the crossfade if its deadline has passed. Returns whether it
    /// did.
    pub fn complete(&mut self, now: Instant) -> bool {
        let SlideState::Transitioning {
            next_index,
            deadline,
            ..
        } = self.state
        else {
            return false;
        };
        if now < deadline {
            return false;
        }

        // The list may have shrunk since the crossfade started.
        self.active_index = if next_index < self.slides.len() {
            next_index
        } else {
            0
        };
        self.state = SlideState::Idle;
        true
    }
}
