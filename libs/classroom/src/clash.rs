//! Time-interval clash detection
//!
//! Two sessions clash when they start on the same calendar date (in the
//! configured calendar zone) and their half-open `[start, end)` intervals
//! overlap. Back-to-back sessions do not clash. Nothing in this module
//! touches storage.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

use crate::models::Session;

/// Half-open time interval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl Interval {
    /// Returns `None` unless `end` is strictly after `start`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<Self> {
        (end > start).then_some(Self { start, end })
    }

    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Calendar date of the start instant in `zone`
    pub fn date(&self, zone: &FixedOffset) -> NaiveDate {
        self.start.with_timezone(zone).date_naive()
    }
}

pub fn same_calendar_date(a: DateTime<Utc>, b: DateTime<Utc>, zone: &FixedOffset) -> bool {
    a.with_timezone(zone).date_naive() == b.with_timezone(zone).date_naive()
}

/// Date-gated overlap: intervals on different dates never clash
pub fn clashes(a: &Interval, b: &Interval, zone: &FixedOffset) -> bool {
    same_calendar_date(a.start, b.start, zone) && a.overlaps(b)
}

/// First existing session that clashes with `candidate`, skipping the session
/// with id `exclude` so an edited session never clashes with itself
pub fn find_clash<'a>(
    candidate: &Interval,
    existing: &'a [Session],
    exclude: Option<uuid::Uuid>,
    zone: &FixedOffset,
) -> Option<&'a Session> {
    existing
        .iter()
        .filter(|s| Some(s.id) != exclude)
        .find(|s| clashes(candidate, &s.interval(), zone))
}

/// First pair `(ours, theirs)` of clashing sessions between two sets
pub fn first_clashing_pair<'a>(
    ours: &'a [Session],
    theirs: &'a [Session],
    zone: &FixedOffset,
) -> Option<(&'a Session, &'a Session)> {
    ours.iter().find_map(|a| {
        theirs
            .iter()
            .find(|b| clashes(&a.interval(), &b.interval(), zone))
            .map(|b| (a, b))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use uuid::Uuid;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).unwrap()
    }

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, day, hour, minute, 0).unwrap()
    }

    fn interval(day: u32, from: (u32, u32), to: (u32, u32)) -> Interval {
        Interval::new(at(day, from.0, from.1), at(day, to.0, to.1)).unwrap()
    }

    fn session(day: u32, from: (u32, u32), to: (u32, u32)) -> Session {
        let i = interval(day, from, to);
        Session {
            id: Uuid::new_v4(),
            class_id: Uuid::new_v4(),
            start_time: i.start,
            end_time: i.end,
            label: None,
            venue: None,
            repeat_weekly: false,
            weekday: None,
            created_at: i.start,
        }
    }

    #[test]
    fn test_overlap_is_symmetric() {
        let a = interval(1, (10, 0), (12, 0));
        let b = interval(1, (11, 0), (13, 0));
        let c = interval(1, (13, 0), (14, 0));
        assert!(clashes(&a, &b, &utc()));
        assert!(clashes(&b, &a, &utc()));
        assert_eq!(clashes(&a, &c, &utc()), clashes(&c, &a, &utc()));
    }

    #[test]
    fn test_interval_clashes_with_itself() {
        let a = interval(1, (10, 0), (10, 1));
        assert!(clashes(&a, &a, &utc()));
    }

    #[test]
    fn test_back_to_back_does_not_clash() {
        let a = interval(1, (10, 0), (12, 0));
        let b = interval(1, (12, 0), (13, 0));
        assert!(!clashes(&a, &b, &utc()));
        assert!(!clashes(&b, &a, &utc()));
    }

    #[test]
    fn test_containment_clashes() {
        let outer = interval(1, (10, 0), (12, 0));
        let inner = interval(1, (10, 30), (11, 30));
        assert!(clashes(&outer, &inner, &utc()));
    }

    #[test]
    fn test_different_dates_never_clash() {
        // Same time of day one week apart
        let a = interval(1, (10, 0), (12, 0));
        let b = interval(8, (10, 0), (12, 0));
        assert!(!clashes(&a, &b, &utc()));

        // An interval running past midnight is still gated on its start date
        let late = Interval::new(at(1, 23, 0), at(1, 23, 0) + Duration::hours(3)).unwrap();
        let early = interval(2, (0, 30), (1, 30));
        assert!(late.overlaps(&early));
        assert!(!clashes(&late, &early, &utc()));
    }

    #[test]
    fn test_calendar_date_uses_zone() {
        // 23:00 and 01:00 UTC on consecutive days share a date at UTC+03:00
        let a = Interval::new(at(1, 23, 0), at(1, 23, 45)).unwrap();
        let b = Interval::new(at(2, 1, 0), at(2, 2, 0)).unwrap();
        let plus_three = FixedOffset::east_opt(3 * 3600).unwrap();
        assert!(!same_calendar_date(a.start, b.start, &utc()));
        assert!(same_calendar_date(a.start, b.start, &plus_three));
        assert_eq!(a.date(&plus_three), b.date(&plus_three));
    }

    #[test]
    fn test_empty_interval_is_rejected() {
        assert!(Interval::new(at(1, 10, 0), at(1, 10, 0)).is_none());
        assert!(Interval::new(at(1, 11, 0), at(1, 10, 0)).is_none());
    }

    #[test]
    fn test_find_clash_skips_excluded_session() {
        let existing = vec![session(1, (10, 0), (12, 0))];
        let candidate = interval(1, (11, 0), (12, 30));
        assert!(find_clash(&candidate, &existing, None, &utc()).is_some());
        assert!(find_clash(&candidate, &existing, Some(existing[0].id), &utc()).is_none());
    }

    #[test]
    fn test_first_clashing_pair_reports_both_sides() {
        let ours = vec![session(1, (10, 0), (12, 0)), session(8, (10, 0), (12, 0))];
        let theirs = vec![session(1, (10, 30), (11, 30))];
        let (a, b) = first_clashing_pair(&ours, &theirs, &utc()).unwrap();
        assert_eq!(a.id, ours[0].id);
        assert_eq!(b.id, theirs[0].id);

        let theirs = vec![session(2, (10, 30), (11, 30))];
        assert!(first_clashing_pair(&ours, &theirs, &utc()).is_none());
    }
}
