//! Now playing display engine.
//!
//! Keeps a Spotify access credential valid, polls what is currently playing,
//! interpolates playback progress between polls, crossfades between tracks,
//! and alternates the player with a slideshow of static images. Renderers
//! subscribe to the views published by the [`presenter::Presenter`].
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

#[macro_use]
extern crate log;

pub mod config;
pub mod credentials;
pub mod display;
pub mod error;
pub mod http;
pub mod player;
pub mod poller;
pub mod presenter;
pub mod progress;
pub mod protocol;
pub mod secrets;
pub mod signal;
pub mod slides;
pub mod slideshow;
pub mod spotify;
pub mod store;
pub mod track;
pub mod transition;
pub mod view;
