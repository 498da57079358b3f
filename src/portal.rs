//! Staff-portal login and schedule download.

use reqwest::StatusCode;
use termsync_core::FetchError;

use crate::config::PortalConfig;

/// Log in to the portal and download the user's schedule as ICS text.
///
/// The portal answers the export URL with its login page (HTTP 200) when
/// the session is not accepted, so the body is checked for actual calendar
/// data rather than trusting the status code alone.
pub async fn fetch_schedule(config: &PortalConfig) -> Result<String, FetchError> {
    let client = reqwest::Client::builder()
        .cookie_store(true)
        .build()
        .map_err(network)?;

    let base = config.base_url.trim_end_matches('/');

    // The login form posts back to the portal root
    let login = client
        .post(format!("{base}/"))
        .form(&[
            ("loginName", config.user_name.as_str()),
            ("password", config.password.as_str()),
        ])
        .send()
        .await
        .map_err(network)?;

    match login.status() {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(FetchError::Auth(
                "portal rejected the login credentials".to_string(),
            ));
        }
        status if !status.is_success() => {
            return Err(FetchError::Network(format!(
                "portal login failed with status {status}"
            )));
        }
        _ => {}
    }

    let export_url = format!(
        "{base}/{}/schedule/view?aqua_format=ical&exa=ical",
        config.user_id
    );

    let response = client.get(&export_url).send().await.map_err(network)?;

    match response.status() {
        StatusCode::NOT_FOUND => return Err(FetchError::NotFound(export_url)),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            return Err(FetchError::Auth(
                "portal session was not accepted for the schedule export".to_string(),
            ));
        }
        status if !status.is_success() => {
            return Err(FetchError::Network(format!(
                "schedule download failed with status {status}"
            )));
        }
        _ => {}
    }

    let body = response.text().await.map_err(network)?;

    if !body.trim_start().starts_with("BEGIN:VCALENDAR") {
        return Err(FetchError::Auth(
            "portal returned a login page instead of calendar data".to_string(),
        ));
    }

    Ok(body)
}

fn network(err: reqwest::Error) -> FetchError {
    FetchError::Network(err.to_string())
}
