//! iCalendar feed generation.
//!
//! One VEVENT per assignment, in the order given. Calendar-level metadata is
//! appended to the VCALENDAR before any event is pushed.

pub mod event;
pub mod links;

use chrono::TimeZone;
use icalendar::parser::{Component as ParsedComponent, read_calendar, unfold};
use icalendar::{Calendar, Property};
use thiserror::Error;
use tracing::debug;

use crate::config::AppConfig;
use crate::models::AssignmentWithCourse;

pub use event::{CalendarEvent, EventStatus, FloatingTime, uid_for};
pub use links::CalendarLinks;

pub const FEED_PATH: &str = "/calendar";
pub const CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("assignment {id} cannot be encoded: {reason}")]
    InvalidEvent { id: i64, reason: String },

    #[error("generated calendar is malformed: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone)]
pub struct FeedOptions {
    pub calendar_name: String,
    pub site_url: Option<String>,
}

impl FeedOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            calendar_name: config.calendar_name.clone(),
            site_url: config.site_url.clone(),
        }
    }

    /// The origin marker is only written for a non-blank site URL.
    pub fn origin_url(&self) -> Option<&str> {
        self.site_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Builds the complete feed document, or fails without producing any output.
pub fn build_feed<Tz: TimeZone>(
    assignments: &[AssignmentWithCourse],
    options: &FeedOptions,
    tz: &Tz,
) -> Result<String, FeedError> {
    let events = assignments
        .iter()
        .map(|entry| CalendarEvent::from_assignment(entry, tz))
        .collect::<Result<Vec<_>, _>>()?;

    let mut calendar = Calendar::new();
    calendar.append_property(Property::new("METHOD", "PUBLISH"));
    calendar.append_property(Property::new("X-WR-CALNAME", options.calendar_name.as_str()));
    if let Some(url) = options.origin_url() {
        calendar.append_property(Property::new("X-ORIGINAL-URL", url));
    }

    for event in &events {
        calendar.push(event.to_ics_event());
    }

    let document = calendar.done().to_string();
    verify_document(&document, events.len())?;

    debug!("built calendar feed with {} events", events.len());
    Ok(document)
}

fn verify_document(document: &str, expected_events: usize) -> Result<(), FeedError> {
    let unfolded = unfold(document);
    let parsed = read_calendar(&unfolded).map_err(|e| FeedError::Malformed(e.to_string()))?;

    let found = count_events(&parsed.components);
    if found != expected_events {
        return Err(FeedError::Malformed(format!(
            "expected {} events, found {}",
            expected_events, found
        )));
    }

    Ok(())
}

fn count_events(components: &[ParsedComponent<'_>]) -> usize {
    components
        .iter()
        .map(|c| {
            if c.name == "VEVENT" {
                1
            } else {
                count_events(&c.components)
            }
        })
        .sum()
}
