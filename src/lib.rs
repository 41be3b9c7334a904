//! Now-playing state synchronization and caching for a music player host
//!
//! This crate mirrors an external host player's playback state into a local
//! aggregate, enriches the active song with track details and lyrics through
//! expiring on-disk caches, and fires a signal for every observable change.
//! It is an adapter, not a standalone application: the host player, its
//! session credential and the lyrics transform are supplied by the embedder
//! through the trait seams in [`host`] and [`api`].
//!
//! ```no_run
//! # use std::sync::Arc;
//! # async fn wire(
//! #     host: Arc<dyn nowplaying::host::HostPlayer>,
//! #     session: Arc<dyn nowplaying::host::Session>,
//! #     transformer: Arc<dyn nowplaying::api::LyricsTransformer>,
//! #     events: tokio::sync::mpsc::UnboundedReceiver<nowplaying::host::HostEvent>,
//! # ) {
//! use nowplaying::api::{LyricsApi, TrackApi};
//! use nowplaying::player::Player;
//!
//! let player = Player::new(
//!     host,
//!     Arc::new(TrackApi::new(session.clone())),
//!     Arc::new(LyricsApi::new(session)),
//!     transformer,
//! );
//! let _song_changed = player.signals().song_changed.subscribe();
//! player.start(events);
//! # }
//! ```

pub mod api;
pub mod cache;
pub mod host;
pub mod logging;
pub mod player;
pub mod signal;

pub use player::Player;
pub use signal::{PlayerSignals, Signal, TimeStep};
