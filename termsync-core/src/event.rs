//! Provider-neutral event types.
//!
//! A `FeedEntry` is what the portal publishes, an `EventDraft` is what we
//! ask the destination calendar to create, and a `RemoteEvent` is what the
//! destination reports back. The engine maps between them field for field.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single appointment parsed from the portal's schedule feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FeedEntry {
    /// Map the entry to an insertion request, field for field.
    pub fn to_draft(&self) -> EventDraft {
        EventDraft {
            summary: self.summary.clone(),
            location: self.location.clone(),
            description: self.description.clone(),
            start: self.start,
            end: self.end,
        }
    }
}

/// Fields for a new destination event. The calendar service assigns the id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// An event as it exists in the destination calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteEvent {
    /// Service-assigned identifier; never minted locally.
    pub id: String,
    /// Link to the event in the calendar UI, if the service provides one.
    pub html_link: Option<String>,
    pub summary: String,
    pub location: String,
    pub description: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}
