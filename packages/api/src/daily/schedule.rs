//! Today's schedule: events and reminders in time-of-day order.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use store::{Event, Reminder};

/// Display format for schedule times, e.g. `9:15 AM`.
pub const TIME_FORMAT: &str = "%-I:%M %p";

/// Category given to every reminder entry.
pub const REMINDER_CATEGORY: &str = "reminder";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleEntry {
    pub id: String,
    /// Formatted with [`TIME_FORMAT`].
    pub time: String,
    pub label: String,
    pub category: Option<String>,
    pub location: Option<String>,
}

impl ScheduleEntry {
    fn from_event(event: &Event) -> Self {
        Self {
            id: event.id.clone(),
            time: event.start_time.format(TIME_FORMAT).to_string(),
            label: event.title.clone(),
            category: event.category.clone(),
            location: event.location.clone(),
        }
    }

    fn from_reminder(reminder: &Reminder) -> Self {
        Self {
            id: reminder.id.clone(),
            time: reminder.reminder_time.format(TIME_FORMAT).to_string(),
            label: reminder.title.clone(),
            category: Some(REMINDER_CATEGORY.to_string()),
            location: None,
        }
    }

    /// The entry's time on the fixed reference day 2000-01-01. `None` when
    /// the time string does not parse.
    pub fn sort_key(&self) -> Option<NaiveDateTime> {
        let time = NaiveTime::parse_from_str(self.time.trim(), "%I:%M %p").ok()?;
        NaiveDate::from_ymd_opt(2000, 1, 1).map(|day| day.and_time(time))
    }
}

/// Events and reminders falling on `today`, sorted by time of day. Ties keep
/// events before reminders and otherwise input order; unparseable times go
/// last.
pub fn build_today_schedule(
    events: &[Event],
    reminders: &[Reminder],
    today: NaiveDate,
) -> Vec<ScheduleEntry> {
    let mut entries: Vec<ScheduleEntry> = events
        .iter()
        .filter(|e| e.occurs_on(today))
        .map(ScheduleEntry::from_event)
        .chain(
            reminders
                .iter()
                .filter(|r| r.is_due_on(today))
                .map(ScheduleEntry::from_reminder),
        )
        .collect();
    entries.sort_by_key(|entry| {
        let key = entry.sort_key();
        (key.is_none(), key)
    });
    entries
}
