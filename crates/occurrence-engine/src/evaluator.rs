//! Recurrence-rule evaluation.
//!
//! The generator never walks a rule itself. It asks one question of a
//! [`RecurrenceEvaluator`]: "what is the earliest qualifying instant at (or
//! strictly after) this reference?". [`RuleSetEvaluator`] answers it for
//! RFC 5545 rule sets via the `rrule` crate, honoring `EXDATE`/`EXRULE`
//! exclusions and `RDATE` inclusions.

use chrono::{DateTime, Duration, Utc};
use rrule::{RRuleSet, Tz};

use crate::error::{EngineError, Result};
use crate::instant::dtstart_line;

/// Answers "next qualifying instant" queries against one recurrence rule.
///
/// Implementations must return strictly increasing instants for strictly
/// increasing exclusive queries; the generator derives occurrence identities
/// from start instants and relies on them never repeating.
pub trait RecurrenceEvaluator {
    /// Earliest qualifying instant `>= reference` (`inclusive`) or
    /// `> reference` (exclusive), or `None` once the rule is exhausted.
    fn next_after(&self, reference: DateTime<Utc>, inclusive: bool) -> Option<DateTime<Utc>>;

    /// Every qualifying instant from `reference` onward, in increasing order.
    ///
    /// The default chains [`next_after`](Self::next_after) queries;
    /// implementations that can walk their rule in one pass should override it.
    fn instants_from(
        &self,
        reference: DateTime<Utc>,
        inclusive: bool,
    ) -> Box<dyn Iterator<Item = DateTime<Utc>> + '_> {
        Box::new(std::iter::successors(
            self.next_after(reference, inclusive),
            move |previous| self.next_after(*previous, false),
        ))
    }
}

/// [`RecurrenceEvaluator`] backed by an [`rrule::RRuleSet`].
#[derive(Debug, Clone)]
pub struct RuleSetEvaluator {
    set: RRuleSet,
    /// Sub-second part of an implicit anchor, which `DTSTART` cannot carry.
    offset: Duration,
}

impl RuleSetEvaluator {
    /// Parse newline-separated rule lines (`RRULE:`, `EXDATE:`, `RDATE:`,
    /// `EXRULE:`, optionally `DTSTART:`).
    ///
    /// Text without a `DTSTART` line is anchored at `anchor`. Rule sets work
    /// at second resolution, so the anchor's fraction of a second is carried
    /// separately and added to every instant the rule produces.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidRule`] if the rule set cannot be parsed
    /// or fails validation.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::{TimeZone, Utc};
    /// use occurrence_engine::evaluator::{RecurrenceEvaluator, RuleSetEvaluator};
    ///
    /// let anchor = Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap();
    /// let eval = RuleSetEvaluator::parse("RRULE:FREQ=MONTHLY", anchor).unwrap();
    /// let next = eval.next_after(anchor, false).unwrap();
    /// assert_eq!(next, Utc.with_ymd_and_hms(2017, 2, 1, 0, 0, 0).unwrap());
    /// ```
    pub fn parse(rule_text: &str, anchor: DateTime<Utc>) -> Result<Self> {
        let has_dtstart = rule_text
            .lines()
            .any(|line| line.trim_start().to_ascii_uppercase().starts_with("DTSTART"));
        let (text, offset) = if has_dtstart {
            (rule_text.to_string(), Duration::zero())
        } else {
            let fraction = Duration::nanoseconds(i64::from(anchor.timestamp_subsec_nanos()));
            (format!("{}\n{}", dtstart_line(&anchor), rule_text), fraction)
        };

        let set = text
            .parse::<RRuleSet>()
            .map_err(|e| EngineError::InvalidRule(format!("'{}': {}", rule_text, e)))?;
        tracing::debug!(
            rule = %rule_text,
            offset_ms = offset.num_milliseconds(),
            "parsed recurrence rule set"
        );
        Ok(Self { set, offset })
    }

    fn to_utc(&self, dt: DateTime<Tz>) -> DateTime<Utc> {
        dt.with_timezone(&Utc) + self.offset
    }
}

impl RecurrenceEvaluator for RuleSetEvaluator {
    fn next_after(&self, reference: DateTime<Utc>, inclusive: bool) -> Option<DateTime<Utc>> {
        // Start one second early so the reference itself is seen whether or
        // not the crate's bound is inclusive.
        let lower = (reference - self.offset - Duration::seconds(1)).with_timezone(&Tz::UTC);
        let found = self
            .set
            .clone()
            .after(lower)
            .into_iter()
            .map(|dt| self.to_utc(dt))
            .find(|dt| if inclusive { *dt >= reference } else { *dt > reference });
        tracing::trace!(%reference, inclusive, found = ?found, "evaluated next instant");
        found
    }

    fn instants_from(
        &self,
        reference: DateTime<Utc>,
        inclusive: bool,
    ) -> Box<dyn Iterator<Item = DateTime<Utc>> + '_> {
        Box::new(
            (&self.set)
                .into_iter()
                .map(move |dt| self.to_utc(dt))
                .skip_while(move |dt| if inclusive { *dt < reference } else { *dt <= reference }),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn test_inclusive_returns_reference_when_it_qualifies() {
        let eval = RuleSetEvaluator::parse("RRULE:FREQ=MONTHLY", utc(2017, 1, 1, 0)).unwrap();
        assert_eq!(eval.next_after(utc(2017, 1, 1, 0), true), Some(utc(2017, 1, 1, 0)));
    }

    #[test]
    fn test_exclusive_skips_reference() {
        let eval = RuleSetEvaluator::parse("RRULE:FREQ=MONTHLY", utc(2017, 1, 1, 0)).unwrap();
        assert_eq!(eval.next_after(utc(2017, 1, 1, 0), false), Some(utc(2017, 2, 1, 0)));
    }

    #[test]
    fn test_reference_between_instants() {
        let eval = RuleSetEvaluator::parse("RRULE:FREQ=MONTHLY", utc(2017, 1, 1, 0)).unwrap();
        assert_eq!(eval.next_after(utc(2017, 3, 15, 12), true), Some(utc(2017, 4, 1, 0)));
        assert_eq!(eval.next_after(utc(2017, 3, 15, 12), false), Some(utc(2017, 4, 1, 0)));
    }

    #[test]
    fn test_reference_before_anchor_returns_first_instant() {
        let eval = RuleSetEvaluator::parse("RRULE:FREQ=WEEKLY", utc(2017, 6, 7, 9)).unwrap();
        assert_eq!(eval.next_after(utc(2000, 1, 1, 0), true), Some(utc(2017, 6, 7, 9)));
    }

    #[test]
    fn test_exdate_never_qualifies() {
        let eval = RuleSetEvaluator::parse(
            "RRULE:FREQ=WEEKLY\nEXDATE:20170607T090000Z",
            utc(2017, 6, 7, 9),
        )
        .unwrap();
        assert_eq!(eval.next_after(utc(2017, 6, 7, 9), true), Some(utc(2017, 6, 14, 9)));
    }

    #[test]
    fn test_until_exhausts_rule() {
        let eval = RuleSetEvaluator::parse(
            "RRULE:FREQ=MONTHLY;UNTIL=20170401T000000Z",
            utc(2017, 1, 1, 0),
        )
        .unwrap();
        assert_eq!(eval.next_after(utc(2017, 4, 1, 0), true), Some(utc(2017, 4, 1, 0)));
        assert_eq!(eval.next_after(utc(2017, 4, 1, 0), false), None);
    }

    #[test]
    fn test_count_exhausts_rule() {
        let eval =
            RuleSetEvaluator::parse("RRULE:FREQ=DAILY;COUNT=3", utc(2017, 1, 1, 8)).unwrap();
        assert_eq!(eval.next_after(utc(2017, 1, 3, 8), true), Some(utc(2017, 1, 3, 8)));
        assert_eq!(eval.next_after(utc(2017, 1, 3, 8), false), None);
    }

    #[test]
    fn test_explicit_dtstart_is_respected() {
        let eval = RuleSetEvaluator::parse(
            "DTSTART:20200101T120000Z\nRRULE:FREQ=YEARLY",
            utc(2017, 1, 1, 0),
        )
        .unwrap();
        assert_eq!(eval.next_after(utc(2017, 1, 1, 0), true), Some(utc(2020, 1, 1, 12)));
    }

    #[test]
    fn test_sub_second_anchor_is_kept() {
        let anchor = utc(2017, 1, 1, 0) + Duration::milliseconds(250);
        let eval = RuleSetEvaluator::parse("RRULE:FREQ=MONTHLY", anchor).unwrap();
        assert_eq!(eval.next_after(anchor, true), Some(anchor));
        assert_eq!(
            eval.next_after(anchor, false),
            Some(utc(2017, 2, 1, 0) + Duration::milliseconds(250))
        );
        assert_eq!(
            eval.next_after(utc(2017, 2, 1, 0), true),
            Some(utc(2017, 2, 1, 0) + Duration::milliseconds(250))
        );
    }

    #[test]
    fn test_instants_from_walks_in_order() {
        let eval = RuleSetEvaluator::parse(
            "RRULE:FREQ=WEEKLY\nEXDATE:20170614T090000Z",
            utc(2017, 6, 7, 9),
        )
        .unwrap();
        let inclusive: Vec<_> = eval.instants_from(utc(2017, 6, 7, 9), true).take(3).collect();
        assert_eq!(
            inclusive,
            [utc(2017, 6, 7, 9), utc(2017, 6, 21, 9), utc(2017, 6, 28, 9)]
        );
        let exclusive: Vec<_> = eval.instants_from(utc(2017, 6, 7, 9), false).take(2).collect();
        assert_eq!(exclusive, [utc(2017, 6, 21, 9), utc(2017, 6, 28, 9)]);
    }

    #[test]
    fn test_instants_from_agrees_with_next_after() {
        let eval = RuleSetEvaluator::parse(
            "RRULE:FREQ=DAILY;COUNT=5",
            utc(2017, 1, 1, 8) + Duration::milliseconds(500),
        )
        .unwrap();
        let walked: Vec<_> = eval.instants_from(utc(2017, 1, 2, 12), true).collect();
        let mut chained = Vec::new();
        let mut next = eval.next_after(utc(2017, 1, 2, 12), true);
        while let Some(dt) = next {
            chained.push(dt);
            next = eval.next_after(dt, false);
        }
        assert_eq!(walked.len(), 3);
        assert_eq!(walked, chained);
    }

    #[test]
    fn test_invalid_rule_returns_error() {
        let err = RuleSetEvaluator::parse("RRULE:FREQ=SOMETIMES", utc(2017, 1, 1, 0)).unwrap_err();
        assert!(matches!(err, EngineError::InvalidRule(_)));
    }
}
