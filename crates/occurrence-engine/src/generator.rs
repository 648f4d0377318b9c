//! Occurrence generation for one calendar event.
//!
//! An [`OccurrenceGenerator`] wraps a single [`EventRecord`] and turns it into
//! concrete occurrences. A non-recurring event is the degenerate case: it has
//! exactly one occurrence, the record itself. A recurring event produces one
//! occurrence per qualifying instant of its rule set, each spanning the same
//! interval as the source record's first span.
//!
//! # Operations
//!
//! - [`OccurrenceGenerator::advance`] — one-shot forward cursor, one occurrence per call
//! - [`OccurrenceGenerator::take_until`] — every occurrence from the series start up to a cutoff
//! - [`OccurrenceGenerator::take_from`] — every occurrence overlapping `[from, cutoff]`
//! - [`OccurrenceGenerator::after`] — the first occurrence starting at or after an instant
//!
//! Only `advance` moves the cursor. The other three are read-only and may be
//! called in any order, any number of times.
//!
//! # Occurrence identity
//!
//! Occurrences of a recurring series are identified as
//! `<source _id>_<start epoch millis>` and carry ISO-8601 `startDate`/`endDate`
//! with millisecond precision. All other fields are copied from the source.

use std::iter::FusedIterator;

use chrono::{DateTime, Duration, Utc};

use crate::error::Result;
use crate::evaluator::{RecurrenceEvaluator, RuleSetEvaluator};
use crate::event::EventRecord;
use crate::instant::parse_instant;

/// Type tag carried by every generator, matching the SDK's event schema name.
pub const EVENT_KIND: &str = "event";

// ── Step ────────────────────────────────────────────────────────────────────

/// The result of one [`OccurrenceGenerator::advance`] call.
///
/// For a recurring series the final occurrence arrives together with
/// `done = true`; callers that stop at `done` must still consume `value`.
#[derive(Debug, Clone, PartialEq)]
pub struct Step {
    /// The occurrence produced by this call, if any.
    pub value: Option<EventRecord>,
    /// Whether the cursor has nothing further to produce.
    pub done: bool,
}

impl Step {
    fn finished() -> Self {
        Self {
            value: None,
            done: true,
        }
    }
}

// ── Internal span bookkeeping ───────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Span {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

/// Which edge of a span a window bound is compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Start,
    End,
}

impl Span {
    fn edge(&self, edge: Edge) -> DateTime<Utc> {
        match edge {
            Edge::Start => self.start,
            Edge::End => self.end,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    At(DateTime<Utc>),
    Exhausted,
}

// ── OccurrenceGenerator ─────────────────────────────────────────────────────

/// Lazily expands one event record into its occurrences.
///
/// The cursor driven by [`advance`](Self::advance) is forward-only and cannot
/// be rewound; construct a new generator to start over.
#[derive(Debug, Clone)]
pub struct OccurrenceGenerator<E = RuleSetEvaluator> {
    event: EventRecord,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    interval: Duration,
    evaluator: Option<E>,
    cursor: Cursor,
}

impl OccurrenceGenerator<RuleSetEvaluator> {
    /// Build a generator for `event`.
    ///
    /// The event recurs if it has at least one non-empty `recurrence` line;
    /// the joined lines are parsed as an RFC 5545 rule set anchored at the
    /// event's `startDate` unless they carry their own `DTSTART`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::InvalidDatetime`] if `startDate` or `endDate`
    /// cannot be parsed, or [`crate::EngineError::InvalidRule`] if the recurrence
    /// lines are rejected by the rule-set parser.
    ///
    /// # Examples
    ///
    /// ```
    /// use occurrence_engine::{EventRecord, OccurrenceGenerator};
    ///
    /// let event = EventRecord::from_json(r#"{
    ///     "_id": "standup",
    ///     "startDate": "2017-01-02T09:00:00.000Z",
    ///     "endDate": "2017-01-02T09:15:00.000Z",
    ///     "recurrence": ["RRULE:FREQ=DAILY;COUNT=3"]
    /// }"#).unwrap();
    ///
    /// let generator = OccurrenceGenerator::new(event).unwrap();
    /// let starts: Vec<String> = generator.map(|o| o.start_date).collect();
    /// assert_eq!(starts, [
    ///     "2017-01-02T09:00:00.000Z",
    ///     "2017-01-03T09:00:00.000Z",
    ///     "2017-01-04T09:00:00.000Z",
    /// ]);
    /// ```
    pub fn new(event: EventRecord) -> Result<Self> {
        let start = parse_instant(&event.start_date)?;
        let evaluator = match event.rule_text() {
            Some(text) => Some(RuleSetEvaluator::parse(&text, start)?),
            None => None,
        };
        Self::build(event, start, evaluator)
    }
}

impl<E: RecurrenceEvaluator> OccurrenceGenerator<E> {
    /// Build a recurring generator whose instants come from `evaluator`.
    ///
    /// The event's own `recurrence` lines are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EngineError::InvalidDatetime`] if `startDate` or `endDate`
    /// cannot be parsed.
    pub fn with_evaluator(event: EventRecord, evaluator: E) -> Result<Self> {
        let start = parse_instant(&event.start_date)?;
        Self::build(event, start, Some(evaluator))
    }

    fn build(event: EventRecord, start: DateTime<Utc>, evaluator: Option<E>) -> Result<Self> {
        let end = parse_instant(&event.end_date)?;
        let interval = end - start;
        tracing::debug!(
            event_id = %event.id,
            recurring = evaluator.is_some(),
            interval_ms = interval.num_milliseconds(),
            "created occurrence generator"
        );
        Ok(Self {
            event,
            start,
            end,
            interval,
            evaluator,
            cursor: Cursor::At(start),
        })
    }

    /// Identifier of the source event.
    pub fn id(&self) -> &str {
        &self.event.id
    }

    /// Always [`EVENT_KIND`].
    pub fn kind(&self) -> &'static str {
        EVENT_KIND
    }

    /// The source event record.
    pub fn event(&self) -> &EventRecord {
        &self.event
    }

    /// Whether occurrences come from a recurrence rule.
    pub fn is_recurring(&self) -> bool {
        self.evaluator.is_some()
    }

    /// Span length shared by every occurrence (`endDate - startDate` of the source).
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Produce the next occurrence and move the cursor past it.
    ///
    /// A non-recurring event yields itself once with `done = false`, then
    /// `done = true` forever. A recurring series yields its occurrences in
    /// increasing start order; the last one is returned with `done = true`.
    /// An occurrence starting inside the previous one's span is skipped, since
    /// the cursor resumes at the previous occurrence's end.
    pub fn advance(&mut self) -> Step {
        let Cursor::At(cursor) = self.cursor else {
            return Step::finished();
        };

        let Some(evaluator) = &self.evaluator else {
            self.cursor = Cursor::Exhausted;
            return Step {
                value: Some(self.event.clone()),
                done: false,
            };
        };

        let Some(start) = evaluator.next_after(cursor, true) else {
            self.cursor = Cursor::Exhausted;
            return Step::finished();
        };
        let end = start + self.interval;

        // A zero-length (or inverted) span would find `start` again.
        let following = if end > start {
            evaluator.next_after(end, true)
        } else {
            evaluator.next_after(start, false)
        };
        debug_assert!(following.is_none_or(|next| next > start));

        self.cursor = following.map_or(Cursor::Exhausted, Cursor::At);
        Step {
            value: Some(self.event.materialize(&start, &end)),
            done: following.is_none(),
        }
    }

    /// Every occurrence whose start lies between the series start and a cutoff.
    ///
    /// The cutoff is `start_until`, tightened to `end_until - interval` when
    /// `end_until` is given so that no returned occurrence ends after it. Both
    /// bounds are inclusive.
    pub fn take_until(
        &self,
        start_until: DateTime<Utc>,
        end_until: Option<DateTime<Utc>>,
    ) -> Vec<EventRecord> {
        let cutoff = self.cutoff(start_until, end_until);
        self.slice(self.start, Edge::Start, cutoff, Edge::Start)
            .into_iter()
            .map(|span| self.occurrence_at(span))
            .collect()
    }

    /// Every occurrence that overlaps the window `[from, cutoff]`.
    ///
    /// An occurrence is kept when it ends at or after `from` and starts at or
    /// before the cutoff, which is derived from `start_to`/`end_to` as in
    /// [`take_until`](Self::take_until).
    pub fn take_from(
        &self,
        from: DateTime<Utc>,
        start_to: DateTime<Utc>,
        end_to: Option<DateTime<Utc>>,
    ) -> Vec<EventRecord> {
        let cutoff = self.cutoff(start_to, end_to);
        self.slice(from, Edge::End, cutoff, Edge::Start)
            .into_iter()
            .map(|span| self.occurrence_at(span))
            .collect()
    }

    /// The first occurrence starting at or after `date`, without touching the cursor.
    ///
    /// For a non-recurring event this is the source record itself when its
    /// start is not before `date`.
    pub fn after(&self, date: DateTime<Utc>) -> Option<EventRecord> {
        let Some(evaluator) = &self.evaluator else {
            return (self.start >= date).then(|| self.event.clone());
        };
        let start = evaluator.next_after(date, true)?;
        Some(self.event.materialize(&start, &(start + self.interval)))
    }

    fn cutoff(&self, start_bound: DateTime<Utc>, end_bound: Option<DateTime<Utc>>) -> DateTime<Utc> {
        match end_bound {
            Some(end_bound) => start_bound.min(end_bound - self.interval),
            None => start_bound,
        }
    }

    fn occurrence_at(&self, span: Span) -> EventRecord {
        if self.evaluator.is_some() {
            self.event.materialize(&span.start, &span.end)
        } else {
            self.event.clone()
        }
    }

    /// Walk occurrences from the series start, dropping those whose `from_edge`
    /// is before `from` and stopping at the first whose `to_edge` is after `to`.
    fn slice(&self, from: DateTime<Utc>, from_edge: Edge, to: DateTime<Utc>, to_edge: Edge) -> Vec<Span> {
        let skip = |span: &Span| span.edge(from_edge) < from;
        let stop = |span: &Span| span.edge(to_edge) > to;

        let Some(evaluator) = &self.evaluator else {
            let span = Span {
                start: self.start,
                end: self.end,
            };
            return if skip(&span) || stop(&span) {
                Vec::new()
            } else {
                vec![span]
            };
        };

        let mut spans = Vec::new();
        let mut previous: Option<DateTime<Utc>> = None;
        for start in evaluator.instants_from(self.start, true) {
            debug_assert!(previous.is_none_or(|p| start > p));
            previous = Some(start);

            let span = Span {
                start,
                end: start + self.interval,
            };
            if stop(&span) {
                break;
            }
            if !skip(&span) {
                spans.push(span);
            }
        }

        tracing::trace!(
            event_id = %self.event.id,
            %from,
            %to,
            count = spans.len(),
            "sliced occurrences"
        );
        spans
    }
}

impl<E: RecurrenceEvaluator> Iterator for OccurrenceGenerator<E> {
    type Item = EventRecord;

    fn next(&mut self) -> Option<EventRecord> {
        self.advance().value
    }
}

impl<E: RecurrenceEvaluator> FusedIterator for OccurrenceGenerator<E> {}
