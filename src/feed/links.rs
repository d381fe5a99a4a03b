use serde::Serialize;

use super::FEED_PATH;

/// Shareable URLs for a calendar feed: a plain download link and a
/// `webcal://` link that calendar clients subscribe to and poll.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarLinks {
    pub download: String,
    pub subscribe: String,
}

impl CalendarLinks {
    pub fn new(public_base_url: &str, session_id: Option<&str>) -> Self {
        let base = public_base_url.trim().trim_end_matches('/');
        let (scheme, authority) = match base.split_once("://") {
            Some((scheme, rest)) => (scheme, rest),
            None => ("http", base),
        };

        let location = match session_id {
            Some(id) => format!("{}{}?session_id={}", authority, FEED_PATH, id),
            None => format!("{}{}", authority, FEED_PATH),
        };

        Self {
            download: format!("{}://{}", scheme, location),
            subscribe: format!("webcal://{}", location),
        }
    }
}
