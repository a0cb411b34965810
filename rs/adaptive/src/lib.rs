//! The core of an HTTP Adaptive Streaming client, shared by DASH, HLS and Smooth Streaming.
//!
//! The crate answers one question for each moment of playback: which byte range, from which
//! URL, on which quality level, do we fetch next?  Three pieces cooperate:
//!
//! - A hierarchical [playlist] model (Playlist → Period → AdaptationSet → Representation)
//!   where addressing attributes (timescale, duration, templates, timelines, ...) are
//!   inherited at runtime across the tree.
//! - Three interchangeable segment addressing schemes ([playlist::SegmentBase],
//!   [playlist::SegmentList], [playlist::SegmentTemplate]) behind one uniform surface.
//! - A per-track [tracker::SegmentTracker] that advances a fetch cursor, dispatches
//!   init/index/media requests, probes container formats, and emits events.
//!
//! Manifest parsing, HTTP connections, demuxing, DRM and ABR heuristics all live outside;
//! they reach the core through the traits in [http], [logic] and [playlist].

mod chunk;
mod encryption;
mod error;
mod format;
mod resources;
mod time;

pub mod http;
pub mod logic;
pub mod playlist;
pub mod tracker;

pub use chunk::*;
pub use encryption::*;
pub use error::*;
pub use format::*;
pub use resources::*;
pub use time::*;
