//! The replace-window reconciliation engine.

use chrono::{DateTime, TimeZone};

use crate::error::{SyncError, SyncResult};
use crate::event::FeedEntry;
use crate::feed;
use crate::sink::CalendarSink;
use crate::term::SyncWindow;

/// Aggregate counts from one sync run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncReport {
    /// Events removed from the destination window.
    pub deleted: usize,
    /// Feed entries outside the window, not synced.
    pub skipped: usize,
    /// Feed entries inserted into the destination.
    pub inserted: usize,
}

/// Replaces all destination events inside a window with the feed entries
/// that fall inside it.
///
/// Stateless between runs: the destination calendar's contents are the only
/// state that carries over, which is what makes re-running after an
/// interruption safe — the next purge re-lists and re-deletes whatever is
/// still there.
pub struct WindowSyncEngine<S> {
    sink: S,
}

impl<S: CalendarSink> WindowSyncEngine<S> {
    pub fn new(sink: S) -> Self {
        WindowSyncEngine { sink }
    }

    /// Remove every destination event whose start lies inside the window.
    /// Returns the number actually deleted.
    ///
    /// A failing list aborts the run: inserting into a window that could
    /// not be enumerated would duplicate whatever is still in it. A failing
    /// individual delete is only a warning; the stale event stays behind
    /// and the next run's purge picks it up again.
    pub async fn purge(&self, window: &SyncWindow) -> SyncResult<usize> {
        let existing = self
            .sink
            .list_events(window)
            .await
            .map_err(SyncError::List)?;

        if existing.is_empty() {
            println!("No deletable events found.");
            return Ok(0);
        }

        let mut deleted = 0;
        for event in &existing {
            match self.sink.delete_event(&event.id).await {
                Ok(()) => {
                    println!("  del {} {}", event.id, event.summary);
                    deleted += 1;
                }
                Err(e) => {
                    eprintln!("warning: could not delete event {}: {}", event.id, e);
                }
            }
        }

        Ok(deleted)
    }

    /// Insert every entry whose start lies inside the window (inclusive on
    /// both ends), in feed order. Returns `(inserted, skipped)`.
    ///
    /// The first insert failure aborts the run. Swallowing it would leave
    /// the window silently half-populated — unlike a failed delete, which
    /// the next purge retries.
    pub async fn reconcile(
        &self,
        window: &SyncWindow,
        entries: &[FeedEntry],
    ) -> SyncResult<(usize, usize)> {
        let mut inserted = 0;
        let mut skipped = 0;

        for entry in entries {
            if !window.contains(&entry.start) {
                skipped += 1;
                continue;
            }

            let created = self
                .sink
                .insert_event(&entry.to_draft())
                .await
                .map_err(|source| SyncError::Insert {
                    summary: entry.summary.clone(),
                    source,
                })?;

            match &created.html_link {
                Some(link) => println!("  new {} ({link})", created.summary),
                None => println!("  new {}", created.summary),
            }
            inserted += 1;
        }

        Ok((inserted, skipped))
    }

    /// One full run: compute the window, purge it, parse the feed, and fill
    /// the window back up.
    pub async fn run<Tz: TimeZone>(
        &self,
        now: &DateTime<Tz>,
        months: u32,
        feed: &str,
    ) -> SyncResult<SyncReport> {
        let window = SyncWindow::compute(now, months)?;
        self.run_in_window(&window, feed).await
    }

    /// Like [`WindowSyncEngine::run`], with a precomputed window.
    pub async fn run_in_window(&self, window: &SyncWindow, feed: &str) -> SyncResult<SyncReport> {
        let deleted = self.purge(window).await?;

        // Parsing after the purge is deliberate: a malformed feed leaves
        // the window empty rather than stale, and the deletes are not
        // rolled back.
        let entries = feed::parse_feed(feed)?;

        let (inserted, skipped) = self.reconcile(window, &entries).await?;

        Ok(SyncReport {
            deleted,
            skipped,
            inserted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::event::{EventDraft, RemoteEvent};
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::Mutex;

    /// In-memory sink with switchable failure modes.
    #[derive(Default)]
    struct MockSink {
        events: Mutex<Vec<RemoteEvent>>,
        next_id: Mutex<u32>,
        fail_list: bool,
        fail_delete_ids: Vec<String>,
        fail_insert_summary: Option<String>,
    }

    #[async_trait]
    impl CalendarSink for MockSink {
        async fn list_events(&self, window: &SyncWindow) -> Result<Vec<RemoteEvent>, SinkError> {
            if self.fail_list {
                return Err(SinkError::Network("connection reset".into()));
            }
            Ok(self
                .events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| window.contains(&e.start))
                .cloned()
                .collect())
        }

        async fn delete_event(&self, id: &str) -> Result<(), SinkError> {
            if self.fail_delete_ids.iter().any(|f| f == id) {
                return Err(SinkError::Network(format!("timeout deleting {id}")));
            }
            let mut events = self.events.lock().unwrap();
            let before = events.len();
            events.retain(|e| e.id != id);
            if events.len() == before {
                return Err(SinkError::NotFound(id.to_string()));
            }
            Ok(())
        }

        async fn insert_event(&self, draft: &EventDraft) -> Result<RemoteEvent, SinkError> {
            if self.fail_insert_summary.as_deref() == Some(draft.summary.as_str()) {
                return Err(SinkError::Validation("start time out of range".into()));
            }
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            let event = RemoteEvent {
                id: format!("evt-{}", *next),
                html_link: Some(format!("https://calendar.example/evt-{}", *next)),
                summary: draft.summary.clone(),
                location: draft.location.clone(),
                description: draft.description.clone(),
                start: draft.start,
                end: draft.end,
            };
            self.events.lock().unwrap().push(event.clone());
            Ok(event)
        }
    }

    fn window() -> SyncWindow {
        // November 2024 through January 2025, computed in UTC
        let now = Utc.with_ymd_and_hms(2024, 11, 15, 12, 0, 0).unwrap();
        SyncWindow::compute(&now, 3).unwrap()
    }

    fn entry(summary: &str, start: chrono::DateTime<Utc>) -> FeedEntry {
        FeedEntry {
            summary: summary.to_string(),
            location: "Room 3".to_string(),
            description: String::new(),
            start,
            end: start + Duration::hours(1),
        }
    }

    async fn seed(sink: &MockSink, summaries: &[&str]) {
        for (i, summary) in summaries.iter().enumerate() {
            let start = Utc.with_ymd_and_hms(2024, 11, 4 + i as u32, 9, 0, 0).unwrap();
            sink.insert_event(&entry(summary, start).to_draft()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn entry_at_window_end_included_one_second_later_excluded() {
        let window = window();
        let engine = WindowSyncEngine::new(MockSink::default());

        let entries = vec![
            entry("at the boundary", window.end),
            entry("just past it", window.end + Duration::seconds(1)),
        ];

        let (inserted, skipped) = engine.reconcile(&window, &entries).await.unwrap();
        assert_eq!(inserted, 1);
        assert_eq!(skipped, 1);

        let remaining = engine.sink.events.lock().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].summary, "at the boundary");
    }

    #[tokio::test]
    async fn purge_continues_past_a_failed_delete() {
        let sink = MockSink {
            fail_delete_ids: vec!["evt-2".to_string()],
            ..Default::default()
        };
        seed(&sink, &["a", "b", "c"]).await;

        let engine = WindowSyncEngine::new(sink);
        let deleted = engine.purge(&window()).await.unwrap();

        assert_eq!(deleted, 2);
        let remaining = engine.sink.events.lock().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "evt-2");
    }

    #[tokio::test]
    async fn list_failure_aborts_the_run() {
        let sink = MockSink {
            fail_list: true,
            ..Default::default()
        };
        let engine = WindowSyncEngine::new(sink);

        let err = engine.purge(&window()).await.unwrap_err();
        assert!(matches!(err, SyncError::List(SinkError::Network(_))));
    }

    #[tokio::test]
    async fn insert_failure_aborts_remaining_inserts() {
        let window = window();
        let sink = MockSink {
            fail_insert_summary: Some("second".to_string()),
            ..Default::default()
        };
        let engine = WindowSyncEngine::new(sink);

        let entries = vec![
            entry("first", Utc.with_ymd_and_hms(2024, 11, 4, 9, 0, 0).unwrap()),
            entry("second", Utc.with_ymd_and_hms(2024, 11, 5, 9, 0, 0).unwrap()),
            entry("third", Utc.with_ymd_and_hms(2024, 11, 6, 9, 0, 0).unwrap()),
        ];

        let err = engine.reconcile(&window, &entries).await.unwrap_err();
        assert!(matches!(
            err,
            SyncError::Insert { ref summary, .. } if summary == "second"
        ));

        // The first insert stays, the third was never attempted
        let remaining = engine.sink.events.lock().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].summary, "first");
    }

    #[tokio::test]
    async fn run_twice_with_unchanged_feed_is_idempotent() {
        let feed = "BEGIN:VCALENDAR\n\
            VERSION:2.0\n\
            BEGIN:VEVENT\n\
            UID:1@portal\n\
            SUMMARY:Shift A\n\
            DTSTART:20241104T000000Z\n\
            DTEND:20241104T080000Z\n\
            END:VEVENT\n\
            BEGIN:VEVENT\n\
            UID:2@portal\n\
            SUMMARY:Shift B\n\
            DTSTART:20241212T000000Z\n\
            DTEND:20241212T080000Z\n\
            END:VEVENT\n\
            END:VCALENDAR\n";

        let now = Utc.with_ymd_and_hms(2024, 11, 15, 12, 0, 0).unwrap();
        let engine = WindowSyncEngine::new(MockSink::default());

        let first = engine.run(&now, 3, feed).await.unwrap();
        assert_eq!(first, SyncReport { deleted: 0, skipped: 0, inserted: 2 });

        let second = engine.run(&now, 3, feed).await.unwrap();
        assert_eq!(second, SyncReport { deleted: 2, skipped: 0, inserted: 2 });

        let events = engine.sink.events.lock().unwrap();
        assert_eq!(events.len(), 2);
        let mut summaries: Vec<_> = events.iter().map(|e| e.summary.as_str()).collect();
        summaries.sort_unstable();
        assert_eq!(summaries, ["Shift A", "Shift B"]);
    }

    #[tokio::test]
    async fn malformed_feed_leaves_the_window_empty() {
        let sink = MockSink::default();
        seed(&sink, &["stale"]).await;

        let engine = WindowSyncEngine::new(sink);
        let err = engine
            .run_in_window(&window(), "<html>session expired</html>")
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::MalformedFeed(_)));
        // The purge already happened; nothing was reinserted.
        assert!(engine.sink.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn round_trip_preserves_all_display_fields() {
        let window = window();
        let engine = WindowSyncEngine::new(MockSink::default());

        let original = FeedEntry {
            summary: "On-site training".to_string(),
            location: "Annex B, floor 2".to_string(),
            description: "Bring safety gear\nand a badge".to_string(),
            start: Utc.with_ymd_and_hms(2024, 12, 2, 0, 30, 0).unwrap(),
            end: Utc.with_ymd_and_hms(2024, 12, 2, 9, 0, 0).unwrap(),
        };

        engine.reconcile(&window, &[original.clone()]).await.unwrap();
        let listed = engine.sink.list_events(&window).await.unwrap();

        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].summary, original.summary);
        assert_eq!(listed[0].location, original.location);
        assert_eq!(listed[0].description, original.description);
        assert_eq!(listed[0].start, original.start);
        assert_eq!(listed[0].end, original.end);
        assert!(!listed[0].id.is_empty());
    }
}
