use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use icalendar::Component;

use super::FeedError;
use crate::models::AssignmentWithCourse;

/// Some calendar clients reject UIDs that start with a digit.
pub const UID_PREFIX: char = 'X';
pub const EVENT_DURATION_MINUTES: i64 = 15;
pub const EVENT_CATEGORY: &str = "event";

/// Control characters the text encoder cannot carry. Line feeds are escaped
/// as `\n` and HTAB is legal TEXT; anything else (notably CR) would corrupt
/// the line structure.
pub fn is_unencodable(c: char) -> bool {
    c.is_control() && c != '\n' && c != '\t'
}

/// Wall-clock time with no zone attached, emitted as a floating DATE-TIME.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FloatingTime {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl FloatingTime {
    pub fn from_instant<Tz: TimeZone>(instant: DateTime<Utc>, tz: &Tz) -> Self {
        let local = instant.with_timezone(tz);
        Self {
            year: local.year(),
            month: local.month(),
            day: local.day(),
            hour: local.hour(),
            minute: local.minute(),
        }
    }

    pub fn to_ics(&self) -> String {
        format!(
            "{:04}{:02}{:02}T{:02}{:02}00",
            self.year, self.month, self.day, self.hour, self.minute
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventStatus {
    Confirmed,
}

impl EventStatus {
    pub fn as_ics_str(&self) -> &'static str {
        match self {
            EventStatus::Confirmed => "CONFIRMED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub uid: String,
    pub summary: String,
    pub start: FloatingTime,
    pub created: FloatingTime,
    pub stamp: DateTime<Utc>,
    pub duration_minutes: i64,
    pub status: EventStatus,
    pub sequence: u32,
}

impl CalendarEvent {
    pub fn from_assignment<Tz: TimeZone>(
        entry: &AssignmentWithCourse,
        tz: &Tz,
    ) -> Result<Self, FeedError> {
        let assignment = &entry.assignment;
        let invalid = |reason: &str| FeedError::InvalidEvent {
            id: assignment.id,
            reason: reason.to_string(),
        };

        let summary = format!("{} - {}", assignment.course_code, assignment.title);
        if summary.chars().any(is_unencodable) {
            return Err(invalid("summary contains unencodable control characters"));
        }

        let start = FloatingTime::from_instant(assignment.due_date, tz);
        let created = FloatingTime::from_instant(assignment.created_at, tz);
        for time in [&start, &created] {
            if !(0..=9999).contains(&time.year) {
                return Err(invalid("year is outside the iCalendar range"));
            }
        }

        Ok(Self {
            uid: uid_for(assignment.id),
            summary,
            start,
            created,
            stamp: assignment.updated_at,
            duration_minutes: EVENT_DURATION_MINUTES,
            status: EventStatus::Confirmed,
            sequence: 0,
        })
    }

    pub fn to_ics_event(&self) -> icalendar::Event {
        let mut event = icalendar::Event::new();
        event.uid(&self.uid);
        event.summary(&self.summary);
        event.description("");
        event.add_property("CATEGORIES", EVENT_CATEGORY);
        event.add_property("DTSTAMP", self.stamp.format("%Y%m%dT%H%M%SZ").to_string());
        event.add_property("DTSTART", self.start.to_ics());
        event.add_property("CREATED", self.created.to_ics());
        event.add_property("DURATION", format!("PT{}M", self.duration_minutes));
        event.add_property("STATUS", self.status.as_ics_str());
        event.add_property("SEQUENCE", self.sequence.to_string());
        event.done()
    }
}

pub fn uid_for(assignment_id: i64) -> String {
    format!("{}{}", UID_PREFIX, assignment_id)
}
