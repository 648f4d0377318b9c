//! Event records, the plain data the generator consumes and produces.
//!
//! An [`EventRecord`] models only the fields the generator reads or rewrites
//! (`_id`, `startDate`, `endDate`, `recurrence`). Every other field of the
//! source JSON object (title, owner, reminders, ...) is kept in
//! [`EventRecord::fields`] in its original order and copied verbatim into each
//! generated occurrence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{EngineError, Result};
use crate::instant::{epoch_millis, format_instant};

/// A calendar event as exchanged with the project-management service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    /// Opaque identifier of the event (or of one generated occurrence).
    #[serde(rename = "_id")]
    pub id: String,
    /// ISO-8601 start of the (first) occurrence.
    pub start_date: String,
    /// ISO-8601 end of the (first) occurrence.
    pub end_date: String,
    /// Recurrence rule lines (`RRULE:...`, `EXDATE:...`, ...). Absent or
    /// empty means the event happens once.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Vec<String>>,
    /// All remaining fields, untouched.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl EventRecord {
    /// Parse an event record from a JSON object string.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidEvent`] if the JSON is malformed or lacks
    /// one of `_id`, `startDate`, `endDate`.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::InvalidEvent(e.to_string()))
    }

    /// Convert an already-parsed JSON value into an event record.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidEvent`] if the value is not an event object.
    pub fn from_value(value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| EngineError::InvalidEvent(e.to_string()))
    }

    /// The record as a JSON value, with the same shape it was read from.
    pub fn to_value(&self) -> Value {
        // A struct of strings and a JSON map always serializes.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// The recurrence lines joined into one rule-set text, or `None` when the
    /// event does not recur. Blank lines are dropped.
    pub fn rule_text(&self) -> Option<String> {
        let lines: Vec<&str> = self
            .recurrence
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|line| line.trim())
            .filter(|line| !line.is_empty())
            .collect();
        if lines.is_empty() {
            None
        } else {
            Some(lines.join("\n"))
        }
    }

    /// Copy of this record placed at `[start, end)`, identified as
    /// `<_id>_<start epoch millis>`.
    pub(crate) fn materialize(&self, start: &DateTime<Utc>, end: &DateTime<Utc>) -> EventRecord {
        let mut target = self.clone();
        target.id = format!("{}_{}", self.id, epoch_millis(start));
        target.start_date = format_instant(start);
        target.end_date = format_instant(end);
        target
    }
}

/// Whether the event carries at least one non-empty recurrence line.
pub fn is_recurring(event: &EventRecord) -> bool {
    event
        .recurrence
        .as_ref()
        .is_some_and(|lines| lines.iter().any(|line| !line.trim().is_empty()))
}
