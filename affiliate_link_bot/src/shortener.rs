//! Best-effort shortening through the `fkrt.it` redirector.
//!
//! The service has no real API: you GET `https://fkrt.it/?url=<link>` and,
//! if it likes the link, it redirects you to a short code. If it doesn't,
//! or it's slow, or it's down, we just keep the long link. Shortening is
//! cosmetic and must never fail a reply.

use std::time::Duration;

use reqwest::Client;
use url::Url;

/// The shortener either answers fast or it's not worth waiting for.
const SHORTEN_TIMEOUT: Duration = Duration::from_secs(3);

/// The service answers differently to things that don't look like browsers.
const USER_AGENT: &str = "Mozilla/5.0";

/// Build the HTTP client used for shortening calls.
///
/// # Errors
///
/// Errors if the TLS backend cannot be initialized.
pub fn client() -> reqwest::Result<Client> {
    Client::builder()
        .timeout(SHORTEN_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
}

/// True if `url` is a finished short link: `fkrt.it` host, a single short
/// code path segment, nothing else. The service redirects failed requests
/// back to itself with the original link still in the query, which must
/// not be mistaken for success.
fn is_short_link(url: &Url) -> bool {
    url.host_str() == Some("fkrt.it")
        && url.query().is_none()
        && url
            .path()
            .strip_prefix('/')
            .is_some_and(|code| !code.is_empty() && !code.contains('/'))
}

/// Try to shorten `link`. On any failure whatsoever (timeout, transport
/// error, the service refusing) the original link is returned unchanged.
pub async fn shorten(client: &Client, link: &str) -> String {
    let mut request_url = match Url::parse("https://fkrt.it/") {
        Ok(url) => url,
        Err(_) => return link.to_string(),
    };
    request_url.query_pairs_mut().append_pair("url", link);

    match client.get(request_url).send().await {
        Ok(response) if is_short_link(response.url()) => response.url().to_string(),
        Ok(_) => link.to_string(),
        Err(error) => {
            log::debug!("Shortening failed, keeping the long link: {error}");
            link.to_string()
        }
    }
}
