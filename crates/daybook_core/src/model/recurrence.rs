//! Recurrence rules and next-occurrence calculation.
//!
//! # Responsibility
//! - Parse the JSON rule stored on items.
//! - Compute the next occurrence date as a pure function.
//!
//! # Invariants
//! - Any unparseable or unsupported rule yields no next date, never an error.
//! - Month/year arithmetic clamps to the last valid day of the target month.

use chrono::{Datelike, Days, Months, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    Daily,
    EveryWeekday,
    EveryNDays,
    Weekly,
    Monthly,
    Yearly,
    #[serde(other)]
    Unsupported,
}

/// Stored as `{"frequency": "...", "interval"?: n, "days_of_week"?: [0..6]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceRule {
    pub frequency: Frequency,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    /// 0 = Sunday .. 6 = Saturday.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub days_of_week: Option<Vec<i64>>,
}

impl RecurrenceRule {
    pub fn new(frequency: Frequency) -> Self {
        Self {
            frequency,
            interval: None,
            days_of_week: None,
        }
    }

    /// Parses rule JSON. Malformed text or a missing frequency gives `None`.
    pub fn parse(json: &str) -> Option<Self> {
        serde_json::from_str(json).ok()
    }

    /// Returns the first occurrence strictly after `from`.
    pub fn next_date(&self, from: NaiveDate) -> Option<NaiveDate> {
        match self.frequency {
            Frequency::Daily => from.checked_add_days(Days::new(1)),
            Frequency::EveryWeekday => next_weekday(from),
            Frequency::EveryNDays => {
                let interval = self.interval.filter(|value| *value > 0)?;
                from.checked_add_days(Days::new(u64::try_from(interval).ok()?))
            }
            Frequency::Weekly => self.next_weekly(from),
            Frequency::Monthly => from.checked_add_months(Months::new(1)),
            Frequency::Yearly => from.checked_add_months(Months::new(12)),
            Frequency::Unsupported => None,
        }
    }

    /// Whether this rule can ever produce a next date.
    pub fn is_schedulable(&self) -> bool {
        match self.frequency {
            Frequency::EveryNDays => self.interval.is_some_and(|value| value > 0),
            Frequency::Weekly => !self.weekdays().is_empty(),
            Frequency::Unsupported => false,
            _ => true,
        }
    }

    fn weekdays(&self) -> Vec<u32> {
        let mut days: Vec<u32> = self
            .days_of_week
            .iter()
            .flatten()
            .filter_map(|day| u32::try_from(*day).ok())
            .filter(|day| *day <= 6)
            .collect();
        days.sort_unstable();
        days.dedup();
        days
    }

    fn next_weekly(&self, from: NaiveDate) -> Option<NaiveDate> {
        let days = self.weekdays();
        let current = from.weekday().num_days_from_sunday();
        let offset = days
            .iter()
            .map(|day| (day + 7 - current) % 7)
            .map(|delta| if delta == 0 { 7 } else { delta })
            .min()?;
        from.checked_add_days(Days::new(u64::from(offset)))
    }
}

/// Computes the next date for a raw stored rule.
///
/// `None` rule text, malformed JSON and unsupported frequencies all give `None`.
pub fn next_date(rule: Option<&str>, from: NaiveDate) -> Option<NaiveDate> {
    RecurrenceRule::parse(rule?)?.next_date(from)
}

fn next_weekday(from: NaiveDate) -> Option<NaiveDate> {
    let delta = match from.weekday() {
        Weekday::Fri => 3,
        Weekday::Sat => 2,
        _ => 1,
    };
    from.checked_add_days(Days::new(delta))
}

#[cfg(test)]
mod tests {
    use super::{next_date, Frequency, RecurrenceRule};
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn daily_adds_one_day() {
        assert_eq!(
            next_date(Some(r#"{"frequency":"daily"}"#), date(2025, 1, 15)),
            Some(date(2025, 1, 16))
        );
        assert_eq!(
            next_date(Some(r#"{"frequency":"daily"}"#), date(2024, 12, 31)),
            Some(date(2025, 1, 1))
        );
    }

    #[test]
    fn every_weekday_skips_weekend() {
        let rule = Some(r#"{"frequency":"every_weekday"}"#);
        // 2025-01-17 is a Friday.
        assert_eq!(next_date(rule, date(2025, 1, 17)), Some(date(2025, 1, 20)));
        assert_eq!(next_date(rule, date(2025, 1, 18)), Some(date(2025, 1, 20)));
        assert_eq!(next_date(rule, date(2025, 1, 19)), Some(date(2025, 1, 20)));
        assert_eq!(next_date(rule, date(2025, 1, 14)), Some(date(2025, 1, 15)));
    }

    #[test]
    fn every_n_days_requires_positive_interval() {
        assert_eq!(
            next_date(
                Some(r#"{"frequency":"every_n_days","interval":3}"#),
                date(2025, 1, 30)
            ),
            Some(date(2025, 2, 2))
        );
        assert_eq!(
            next_date(
                Some(r#"{"frequency":"every_n_days","interval":0}"#),
                date(2025, 1, 30)
            ),
            None
        );
        assert_eq!(
            next_date(
                Some(r#"{"frequency":"every_n_days","interval":-2}"#),
                date(2025, 1, 30)
            ),
            None
        );
        assert_eq!(
            next_date(Some(r#"{"frequency":"every_n_days"}"#), date(2025, 1, 30)),
            None
        );
    }

    #[test]
    fn weekly_picks_earliest_configured_day_strictly_after() {
        // 2025-01-15 is a Wednesday (3).
        let rule = Some(r#"{"frequency":"weekly","days_of_week":[1,3,5]}"#);
        assert_eq!(next_date(rule, date(2025, 1, 15)), Some(date(2025, 1, 17)));

        // Saturday wraps to next Monday.
        assert_eq!(next_date(rule, date(2025, 1, 18)), Some(date(2025, 1, 20)));

        // Only the same weekday configured: one week later.
        let same_day = Some(r#"{"frequency":"weekly","days_of_week":[3]}"#);
        assert_eq!(
            next_date(same_day, date(2025, 1, 15)),
            Some(date(2025, 1, 22))
        );
    }

    #[test]
    fn weekly_without_valid_days_is_none() {
        assert_eq!(
            next_date(
                Some(r#"{"frequency":"weekly","days_of_week":[]}"#),
                date(2025, 1, 15)
            ),
            None
        );
        assert_eq!(
            next_date(
                Some(r#"{"frequency":"weekly","days_of_week":[7,-1]}"#),
                date(2025, 1, 15)
            ),
            None
        );
        assert_eq!(
            next_date(Some(r#"{"frequency":"weekly"}"#), date(2025, 1, 15)),
            None
        );
    }

    #[test]
    fn monthly_clamps_to_month_end() {
        let rule = Some(r#"{"frequency":"monthly"}"#);
        assert_eq!(next_date(rule, date(2025, 1, 31)), Some(date(2025, 2, 28)));
        assert_eq!(next_date(rule, date(2024, 1, 31)), Some(date(2024, 2, 29)));
        assert_eq!(next_date(rule, date(2025, 3, 15)), Some(date(2025, 4, 15)));
        assert_eq!(next_date(rule, date(2025, 12, 10)), Some(date(2026, 1, 10)));
    }

    #[test]
    fn yearly_clamps_leap_day() {
        let rule = Some(r#"{"frequency":"yearly"}"#);
        assert_eq!(next_date(rule, date(2024, 2, 29)), Some(date(2025, 2, 28)));
        assert_eq!(next_date(rule, date(2025, 7, 4)), Some(date(2026, 7, 4)));
    }

    #[test]
    fn unknown_or_malformed_rules_have_no_next_date() {
        let from = date(2025, 1, 15);
        assert_eq!(next_date(None, from), None);
        assert_eq!(next_date(Some(r#"{"frequency":"hourly"}"#), from), None);
        assert_eq!(next_date(Some(r#"{"interval":2}"#), from), None);
        assert_eq!(next_date(Some("{not json"), from), None);
        assert_eq!(next_date(Some("null"), from), None);
    }

    #[test]
    fn schedulable_reflects_rule_completeness() {
        assert!(RecurrenceRule::new(Frequency::Daily).is_schedulable());
        assert!(!RecurrenceRule::new(Frequency::Weekly).is_schedulable());
        assert!(!RecurrenceRule::new(Frequency::EveryNDays).is_schedulable());
        assert!(!RecurrenceRule::new(Frequency::Unsupported).is_schedulable());
    }
}
