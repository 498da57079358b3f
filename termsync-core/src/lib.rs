//! Core synchronization engine for termsync.
//!
//! Replaces a fixed future window of destination-calendar events with the
//! entries of a schedule feed on every run:
//! - `term` computes the replacement window from the current month
//! - `feed` parses the portal's ICS export into entries
//! - `engine` purges the window and fills it back up
//!
//! All remote I/O goes through the [`CalendarSink`] capability; this crate
//! knows nothing about Google Calendar or the portal that serves the feed.

pub mod engine;
pub mod error;
pub mod event;
pub mod feed;
pub mod sink;
pub mod term;

pub use engine::{SyncReport, WindowSyncEngine};
pub use error::{FetchError, SinkError, SyncError, SyncResult};
pub use event::{EventDraft, FeedEntry, RemoteEvent};
pub use feed::parse_feed;
pub use sink::CalendarSink;
pub use term::SyncWindow;
