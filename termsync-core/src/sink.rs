//! Destination-calendar capability.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::event::{EventDraft, RemoteEvent};
use crate::term::SyncWindow;

/// A destination calendar the engine can replace a window of events in.
///
/// Implementations own all remote identity: ids on returned events are
/// service-assigned, and the engine never mints or reuses one.
#[async_trait]
pub trait CalendarSink {
    /// List events whose start falls inside the window, inclusive on both
    /// ends, in the destination's listing order.
    async fn list_events(&self, window: &SyncWindow) -> Result<Vec<RemoteEvent>, SinkError>;

    /// Delete a single event by service-assigned id.
    async fn delete_event(&self, id: &str) -> Result<(), SinkError>;

    /// Insert a new event and return it with its assigned id.
    async fn insert_event(&self, draft: &EventDraft) -> Result<RemoteEvent, SinkError>;
}
