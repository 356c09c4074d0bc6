//! Currently-playing response types.
//!
//! # Wire Format
//!
//! ```json
//! {
//!     "is_playing": true,
//!     "progress_ms": 43021,
//!     "currently_playing_type": "track",
//!     "item": {
//!         "name": "Song",
//!         "duration_ms": 215000,
//!         "artists": [{ "name": "Artist" }],
//!         "album": {
//!             "images": [
//!                 { "url": "https://i.scdn.co/image/640", "width": 640, "height": 640 },
//!                 { "url": "https://i.scdn.co/image/300", "width": 300, "height": 300 }
//!             ]
//!         }
//!     }
//! }
//! ```
//!
//! `item` is `null` for ads and while switching devices. Image dimensions are
//! `null` for some user-uploaded artwork.

use serde::Deserialize;
use url::Url;

/// Response body of the currently-playing endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct CurrentlyPlaying {
    #[serde(default)]
    pub is_playing: bool,

    #[serde(default)]
    pub progress_ms: Option<u64>,

    #[serde(default)]
    pub item: Option<Item>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Item {
    pub name: String,

    #[serde(default)]
    pub duration_ms: u64,

    #[serde(default)]
    pub artists: Vec<Artist>,

    #[serde(default)]
    pub album: Option<Album>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Artist {
    pub name: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct Album {
    #[serde(default)]
    pub images: Vec<Image>,
}

/// One size variant of the album art.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Image {
    pub url: Url,

    #[serde(default)]
    pub width: Option<u32>,

    #[serde(default)]
    pub height: Option<u32>,
}

/// Outcome of one currently-playing request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// Nothing is playing, or playback is on a private session.
    NoContent,

    /// Something is (or was) playing.
    Playing(CurrentlyPlaying),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_item_and_dimensions() {
        let playing: CurrentlyPlaying = serde_json::from_str(
            r#"{"is_playing":false,"progress_ms":null,"item":null}"#,
        )
        .unwrap();
        assert!(playing.item.is_none());
        assert!(playing.progress_ms.is_none());

        let image: Image =
            serde_json::from_str(r#"{"url":"https://example.com/a.jpg","width":null,"height":null}"#)
                .unwrap();
        assert_eq!(image.width, None);
    }
}
