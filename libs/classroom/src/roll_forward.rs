//! Weekly roll-forward of recurring sessions
//!
//! For every recurring session that has already ended, create the occurrence
//! one week later unless the class already has a session starting at the same
//! hour and minute on that date. The new occurrence is a continuation of an
//! already validated slot, so no clash check runs. The insert is conditional
//! on the exact start instant, so overlapping passes create it once.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::actor::{Actor, Role};
use crate::error::{CoreError, CoreResult};
use crate::events::DomainEvent;
use crate::models::{Session, weekday_number};
use crate::service::Classroom;

/// Outcome counts of one roll-forward pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RollForwardReport {
    pub created: usize,
    pub skipped_existing: usize,
    pub skipped_cutoff: usize,
    pub failed: usize,
}

enum Step {
    Created,
    Existing,
    PastCutoff,
}

impl Classroom {
    /// Roll forward as of the current clock
    pub async fn roll_forward_weekly_sessions(&self) -> CoreResult<RollForwardReport> {
        self.roll_forward_at(self.now()).await
    }

    /// Admin-triggered run of the scheduled job
    pub async fn trigger_roll_forward(&self, actor: &Actor) -> CoreResult<RollForwardReport> {
        actor.require(Role::Admin)?;
        self.roll_forward_weekly_sessions().await
    }

    /// Roll forward as of `now`
    ///
    /// A failure on one session is logged and counted; the pass continues
    /// with the rest.
    pub async fn roll_forward_at(&self, now: DateTime<Utc>) -> CoreResult<RollForwardReport> {
        let recurring = self.store().recurring_sessions().await?;
        let mut report = RollForwardReport::default();

        for session in recurring.iter().filter(|s| s.end_time <= now) {
            match self.roll_forward_one(session, now).await {
                Ok(Step::Created) => report.created += 1,
                Ok(Step::Existing) => report.skipped_existing += 1,
                Ok(Step::PastCutoff) => report.skipped_cutoff += 1,
                Err(e) => {
                    error!(session_id = %session.id, "Failed to roll session forward: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            created = report.created,
            skipped_existing = report.skipped_existing,
            skipped_cutoff = report.skipped_cutoff,
            failed = report.failed,
            "Weekly roll-forward finished"
        );
        Ok(report)
    }

    async fn roll_forward_one(&self, source: &Session, now: DateTime<Utc>) -> CoreResult<Step> {
        let zone = *self.zone();
        let start = source.start_time + Duration::days(7);
        let end = source.end_time + Duration::days(7);

        let local_start = start.with_timezone(&zone);
        if local_start.year() > now.with_timezone(&zone).year() {
            debug!(session_id = %source.id, "Next occurrence falls past the year cutoff");
            return Ok(Step::PastCutoff);
        }

        let (day_start, day_end) = self.local_day_bounds(local_start.date_naive())?;
        let same_day = self
            .store()
            .sessions_starting_between(source.class_id, day_start, day_end)
            .await?;
        let taken = same_day.iter().any(|s| {
            let existing = s.start_time.with_timezone(&zone);
            existing.hour() == local_start.hour() && existing.minute() == local_start.minute()
        });
        if taken {
            return Ok(Step::Existing);
        }

        let next = Session {
            id: Uuid::new_v4(),
            class_id: source.class_id,
            start_time: start,
            end_time: end,
            label: source.label.clone(),
            venue: source.venue.clone(),
            repeat_weekly: true,
            weekday: source.weekday.or(Some(weekday_number(start, &zone))),
            created_at: now,
        };
        // A concurrent pass may have written the slot since the check above
        if !self.store().insert_session_if_absent(&next).await? {
            return Ok(Step::Existing);
        }

        info!(
            class_id = %next.class_id,
            source_session_id = %source.id,
            session_id = %next.id,
            "Recurring session rolled forward"
        );
        self.emit(DomainEvent::SessionRolledForward {
            class_id: next.class_id,
            source_session_id: source.id,
            session_id: next.id,
            timestamp: now,
        });

        Ok(Step::Created)
    }

    /// `[midnight, next midnight)` of a calendar date in the calendar zone
    fn local_day_bounds(&self, date: NaiveDate) -> CoreResult<(DateTime<Utc>, DateTime<Utc>)> {
        let midnight = self
            .zone()
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .single()
            .ok_or_else(|| CoreError::Internal(format!("No local midnight on {}", date)))?
            .with_timezone(&Utc);
        Ok((midnight, midnight + Duration::days(1)))
    }
}
