//! # occurrence-engine
//!
//! Occurrence generation for calendar events in the project-management SDK.
//!
//! Given an event record that may carry RFC 5545 recurrence lines, the engine
//! produces its concrete occurrences: one at a time through a forward cursor,
//! as a "next occurrence at or after" lookup, or as every occurrence inside a
//! date window. A non-recurring event is the single-occurrence case of the
//! same API.
//!
//! ## Modules
//!
//! - [`generator`] — [`OccurrenceGenerator`]: advance, take_until, take_from, after
//! - [`evaluator`] — Recurrence-rule evaluation behind the [`RecurrenceEvaluator`] seam
//! - [`event`] — The event record data model
//! - [`instant`] — ISO-8601 parsing and formatting
//! - [`error`] — Error types

pub mod error;
pub mod evaluator;
pub mod event;
pub mod generator;
pub mod instant;

pub use error::EngineError;
pub use evaluator::{RecurrenceEvaluator, RuleSetEvaluator};
pub use event::{is_recurring, EventRecord};
pub use generator::{OccurrenceGenerator, Step, EVENT_KIND};
pub use instant::{format_instant, parse_instant};
