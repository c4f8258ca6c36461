/// Calendar events shown next to the board.
///
/// Events are not ordered by key like cards; they are listed by date and
/// start time. Archived events are hidden (soft delete). Anonymous
/// placeholder events created by the quick-add gesture are the only ones
/// that get hard-deleted.
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::identity::EditorIdentity;
use crate::types::{Card, ColumnId};

/// Title given to events created by clicking a day.
pub const PLACEHOLDER_TITLE: &str = "unnamed event";
/// Author recorded on placeholder events.
pub const ANONYMOUS_EDITOR: &str = "Anonymous";
/// A day click removes placeholders once the day holds this many events.
pub const DAY_CLICK_LIMIT: usize = 3;

static DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex"));
static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01]\d|2[0-3]):[0-5]\d$").expect("valid time regex"));

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CalendarError {
    #[error("Event title must not be empty")]
    EmptyTitle,

    #[error("Not a calendar day (expected YYYY-MM-DD): {0}")]
    InvalidDate(String),

    #[error("Not a time of day (expected HH:MM): {0}")]
    InvalidTime(String),

    #[error("Event ends ({end}) before it starts ({start})")]
    EndBeforeStart { start: String, end: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    #[serde(default)]
    pub title: String,
    /// Calendar day, `YYYY-MM-DD`.
    #[serde(default)]
    pub date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_all_day: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_edited_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub is_archived: bool,
}

impl CalendarEvent {
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        date: impl Into<String>,
        editor: &EditorIdentity,
        now: i64,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            date: date.into(),
            start_time: None,
            end_time: None,
            is_all_day: None,
            created_at: Some(now),
            created_by: Some(editor.name().to_string()),
            last_edited_by: Some(editor.name().to_string()),
            last_updated: Some(now),
            is_archived: false,
        }
    }

    /// Anonymous event added by clicking a day.
    pub fn placeholder(id: impl Into<String>, date: impl Into<String>, now: i64) -> Self {
        Self {
            id: id.into(),
            title: PLACEHOLDER_TITLE.to_string(),
            date: date.into(),
            start_time: None,
            end_time: None,
            is_all_day: None,
            created_at: Some(now),
            created_by: Some(ANONYMOUS_EDITOR.to_string()),
            last_edited_by: Some(ANONYMOUS_EDITOR.to_string()),
            last_updated: Some(now),
            is_archived: false,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.title == PLACEHOLDER_TITLE
    }

    pub fn validate(&self) -> Result<(), CalendarError> {
        if self.title.trim().is_empty() {
            return Err(CalendarError::EmptyTitle);
        }
        parse_day(&self.date)?;
        for time in [&self.start_time, &self.end_time].into_iter().flatten() {
            if !TIME_RE.is_match(time) {
                return Err(CalendarError::InvalidTime(time.clone()));
            }
        }
        if let (Some(start), Some(end)) = (&self.start_time, &self.end_time) {
            // HH:MM compares correctly as text
            if end < start {
                return Err(CalendarError::EndBeforeStart {
                    start: start.clone(),
                    end: end.clone(),
                });
            }
        }
        Ok(())
    }

    /// Stamp an edit.
    pub fn touch(&mut self, editor: &EditorIdentity, now: i64) {
        self.last_edited_by = Some(editor.name().to_string());
        self.last_updated = Some(now);
    }

    /// Soft delete.
    pub fn archive(&mut self, now: i64) {
        self.is_archived = true;
        self.last_updated = Some(now);
    }

    /// Copy of this event as a board card. Column and order are chosen by
    /// the caller.
    pub fn to_card(
        &self,
        id: impl Into<String>,
        column: ColumnId,
        order: f64,
        editor: &EditorIdentity,
        now: i64,
    ) -> Card {
        Card::new(id, self.title.trim(), column, order, editor, now)
    }
}

/// Parse a `YYYY-MM-DD` string into a real calendar day.
pub fn parse_day(date: &str) -> Result<NaiveDate, CalendarError> {
    if !DATE_RE.is_match(date) {
        return Err(CalendarError::InvalidDate(date.to_string()));
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|_| CalendarError::InvalidDate(date.to_string()))
}

/// Date first, then start time. Events without a start time (all-day)
/// come first on their day.
fn compare_events(a: &CalendarEvent, b: &CalendarEvent) -> Ordering {
    a.date
        .cmp(&b.date)
        .then_with(|| a.start_time.cmp(&b.start_time))
}

/// Non-archived events in display order.
pub fn visible_events(events: &[CalendarEvent]) -> Vec<CalendarEvent> {
    let mut out: Vec<CalendarEvent> = events.iter().filter(|e| !e.is_archived).cloned().collect();
    out.sort_by(compare_events);
    out
}

/// Number of visible events per day.
pub fn event_counts(events: &[CalendarEvent]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for event in events.iter().filter(|e| !e.is_archived) {
        *counts.entry(event.date.clone()).or_insert(0) += 1;
    }
    counts
}

/// Outcome of clicking a day in the calendar grid.
#[derive(Debug, Clone, PartialEq)]
pub enum DateClickAction {
    /// Store this new placeholder.
    AddPlaceholder(CalendarEvent),
    /// Hard-delete these placeholder events.
    RemovePlaceholders(Vec<String>),
}

/// Decide what a click on `date` does: add a placeholder, or clear the
/// day's placeholders once it is full.
pub fn plan_date_click(
    events: &[CalendarEvent],
    date: &str,
    new_id: impl Into<String>,
    now: i64,
) -> Result<DateClickAction, CalendarError> {
    parse_day(date)?;
    let count = events
        .iter()
        .filter(|e| !e.is_archived && e.date == date)
        .count();
    if count >= DAY_CLICK_LIMIT {
        let ids = events
            .iter()
            .filter(|e| e.date == date && e.is_placeholder())
            .map(|e| e.id.clone())
            .collect();
        return Ok(DateClickAction::RemovePlaceholders(ids));
    }
    Ok(DateClickAction::AddPlaceholder(CalendarEvent::placeholder(
        new_id, date, now,
    )))
}
