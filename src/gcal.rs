//! Google Calendar: OAuth flow and the `CalendarSink` implementation.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use google_calendar::Client;
use google_calendar::types::{EventDateTime, OrderBy, SendUpdates};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

use termsync_core::{CalendarSink, EventDraft, RemoteEvent, SinkError, SyncWindow};

use crate::config::{AccountTokens, GoogleConfig};

const REDIRECT_PORT: u16 = 8085;
const REDIRECT_URI: &str = "http://localhost:8085/callback";

// This tool writes events, so it needs the full calendar scope.
const SCOPES: &[&str] = &["https://www.googleapis.com/auth/calendar"];

/// Create a Google Calendar client from stored tokens
fn create_client(config: &GoogleConfig, tokens: &AccountTokens) -> Client {
    Client::new(
        config.client_id.clone(),
        config.client_secret.clone(),
        REDIRECT_URI.to_string(),
        tokens.access_token.clone(),
        tokens.refresh_token.clone(),
    )
}

/// Create a new client for initial authentication (no tokens yet)
fn create_auth_client(config: &GoogleConfig) -> Client {
    Client::new(
        config.client_id.clone(),
        config.client_secret.clone(),
        REDIRECT_URI.to_string(),
        String::new(),
        String::new(),
    )
}

/// Start a local HTTP server to receive the OAuth callback.
/// Returns (code, state).
fn wait_for_callback() -> Result<(String, String)> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", REDIRECT_PORT))
        .with_context(|| format!("Failed to bind to port {}", REDIRECT_PORT))?;

    println!("Waiting for OAuth callback on port {}...", REDIRECT_PORT);

    let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    // Request line looks like: GET /callback?code=xxx&state=yyy HTTP/1.1
    let url_part = request_line
        .split_whitespace()
        .nth(1)
        .context("Invalid request")?;

    let url = url::Url::parse(&format!("http://localhost{}", url_part))?;

    let code = url
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
        .context("No code in callback")?;

    let state = url
        .query_pairs()
        .find(|(k, _)| k == "state")
        .map(|(_, v)| v.to_string())
        .context("No state in callback")?;

    // Send a response to the browser
    let response = "HTTP/1.1 200 OK\r\n\
        Content-Type: text/html\r\n\
        Connection: close\r\n\
        \r\n\
        <html><body>\
        <h1>Authentication successful!</h1>\
        <p>You can close this window and return to the terminal.</p>\
        </body></html>";

    stream.write_all(response.as_bytes())?;
    stream.flush()?;

    Ok((code, state))
}

/// Run the full OAuth authentication flow
pub async fn authenticate(config: &GoogleConfig) -> Result<AccountTokens> {
    let mut client = create_auth_client(config);

    let scopes: Vec<String> = SCOPES.iter().map(|s| s.to_string()).collect();
    let auth_url = client.user_consent_url(&scopes);

    println!("\nOpen this URL in your browser to authenticate:\n");
    println!("{}\n", auth_url);

    // Try to open the browser automatically
    if open::that(&auth_url).is_err() {
        println!("(Could not open browser automatically, please copy the URL above)");
    }

    let (code, state) = wait_for_callback()?;

    println!("\nReceived authorization code, exchanging for tokens...");

    let access_token = client
        .get_access_token(&code, &state)
        .await
        .context("Failed to exchange code for tokens")?;

    println!("Authentication successful!");

    // Calculate expires_at from expires_in
    let expires_at = if access_token.expires_in > 0 {
        Some(Utc::now() + chrono::Duration::seconds(access_token.expires_in))
    } else {
        None
    };

    Ok(AccountTokens {
        access_token: access_token.access_token,
        refresh_token: access_token.refresh_token,
        expires_at,
    })
}

/// Refresh the access token when it is expired or about to expire.
/// The caller is responsible for persisting the returned tokens.
pub async fn ensure_fresh_tokens(
    config: &GoogleConfig,
    tokens: AccountTokens,
) -> Result<AccountTokens> {
    let expired = match tokens.expires_at {
        Some(at) => at <= Utc::now() + chrono::Duration::seconds(60),
        None => false,
    };
    if !expired {
        return Ok(tokens);
    }

    println!("Access token expired, refreshing...");

    let client = create_client(config, &tokens);
    let access_token = client
        .refresh_access_token()
        .await
        .context("Failed to refresh access token")?;

    let expires_at = if access_token.expires_in > 0 {
        Some(Utc::now() + chrono::Duration::seconds(access_token.expires_in))
    } else {
        None
    };

    // Google typically doesn't return a new refresh_token on refresh
    let refresh_token = if access_token.refresh_token.is_empty() {
        tokens.refresh_token.clone()
    } else {
        access_token.refresh_token
    };

    Ok(AccountTokens {
        access_token: access_token.access_token,
        refresh_token,
        expires_at,
    })
}

/// The destination-calendar capability backed by the Google Calendar API.
pub struct GoogleCalendarSink {
    client: Client,
    calendar_id: String,
}

impl GoogleCalendarSink {
    pub fn new(config: &GoogleConfig, tokens: &AccountTokens) -> Self {
        GoogleCalendarSink {
            client: create_client(config, tokens),
            calendar_id: config.calendar_id.clone(),
        }
    }
}

#[async_trait]
impl CalendarSink for GoogleCalendarSink {
    async fn list_events(&self, window: &SyncWindow) -> Result<Vec<RemoteEvent>, SinkError> {
        let response = self
            .client
            .events()
            .list_all(
                &self.calendar_id,
                "",                 // i_cal_uid
                0,                  // max_attendees
                OrderBy::StartTime, // order_by
                &[],                // private_extended_property
                "",                 // q (search query)
                &[],                // shared_extended_property
                false,              // show_deleted
                false,              // show_hidden_invitations
                true,               // single_events
                &window.end_rfc3339(),
                &window.start_rfc3339(),
                "", // time_zone
                "", // updated_min
            )
            .await
            .map_err(classify)?;

        Ok(response.body.into_iter().filter_map(from_google_event).collect())
    }

    async fn delete_event(&self, id: &str) -> Result<(), SinkError> {
        self.client
            .events()
            .delete(&self.calendar_id, id, false, SendUpdates::None)
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn insert_event(&self, draft: &EventDraft) -> Result<RemoteEvent, SinkError> {
        let event = google_calendar::types::Event {
            summary: draft.summary.clone(),
            location: draft.location.clone(),
            description: draft.description.clone(),
            start: Some(to_event_date_time(&draft.start)),
            end: Some(to_event_date_time(&draft.end)),
            ..Default::default()
        };

        let response = self
            .client
            .events()
            .insert(&self.calendar_id, 0, 0, false, SendUpdates::None, false, &event)
            .await
            .map_err(classify)?;

        from_google_event(response.body).ok_or_else(|| {
            SinkError::Validation("calendar service returned an event without id or times".to_string())
        })
    }
}

/// Map an API client error onto the sink error taxonomy. The client
/// stringifies HTTP failures, so classification goes by status text.
fn classify(err: google_calendar::ClientError) -> SinkError {
    let msg = err.to_string();
    if msg.contains("404") || msg.contains("Not Found") {
        SinkError::NotFound(msg)
    } else if msg.contains("401") || msg.contains("403") {
        SinkError::Auth(msg)
    } else if msg.contains("400") {
        SinkError::Validation(msg)
    } else {
        SinkError::Network(msg)
    }
}

fn to_event_date_time(dt: &DateTime<Utc>) -> EventDateTime {
    EventDateTime {
        date: None,
        date_time: Some(*dt),
        time_zone: String::new(),
    }
}

/// Convert an API event. Events without an id or without usable times are
/// dropped (cancelled placeholders show up like this in list responses).
fn from_google_event(event: google_calendar::types::Event) -> Option<RemoteEvent> {
    if event.id.is_empty() {
        return None;
    }

    let start = google_time(event.start.as_ref()?)?;
    let end = google_time(event.end.as_ref()?)?;

    Some(RemoteEvent {
        id: event.id,
        html_link: if event.html_link.is_empty() {
            None
        } else {
            Some(event.html_link)
        },
        summary: event.summary,
        location: event.location,
        description: event.description,
        start,
        end,
    })
}

/// Timed events carry date_time; all-day events only a date, taken as
/// midnight UTC so they still fall inside the window they belong to.
fn google_time(edt: &EventDateTime) -> Option<DateTime<Utc>> {
    if let Some(dt) = edt.date_time {
        return Some(dt);
    }
    edt.date.map(|d| d.and_hms_opt(0, 0, 0).unwrap().and_utc())
}
