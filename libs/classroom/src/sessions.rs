//! Session scheduling
//!
//! Every write is clash-checked against all sessions of all classes owned by
//! the same tutor, drafts included, so that a later publish can never fail
//! on a clash introduced here.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::actor::Actor;
use crate::clash::{Interval, find_clash};
use crate::error::{CoreError, CoreResult};
use crate::events::DomainEvent;
use crate::models::{Session, SessionRequest};
use crate::service::Classroom;

fn invalid_time() -> CoreError {
    CoreError::InvalidArgument("Invalid start/end time".into())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Classroom {
    /// Resolve an instant from epoch milliseconds or text; milliseconds win.
    /// Text without an offset is read in the calendar zone.
    fn parse_instant(&self, ms: Option<i64>, text: Option<&str>) -> CoreResult<DateTime<Utc>> {
        if let Some(ms) = ms {
            return DateTime::from_timestamp_millis(ms).ok_or_else(invalid_time);
        }

        let text = text.map(str::trim).ok_or_else(invalid_time)?;
        if let Ok(at) = DateTime::parse_from_rfc3339(text) {
            return Ok(at.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
            .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
            .ok()
            .and_then(|naive| self.zone().from_local_datetime(&naive).single())
            .map(|at| at.with_timezone(&Utc))
            .ok_or_else(invalid_time)
    }

    /// Create a session, or merge into an existing one when `session_id` is
    /// given. Returns the session id.
    pub async fn upsert_session(&self, actor: &Actor, request: SessionRequest) -> CoreResult<Uuid> {
        let has_start = request.start_ms.is_some() || request.start_time.is_some();
        let has_end = request.end_ms.is_some() || request.end_time.is_some();
        let class_id = match request.class_id {
            Some(id) if has_start && has_end => id,
            _ => {
                return Err(CoreError::InvalidArgument(
                    "class_id and start/end time required".into(),
                ));
            }
        };

        let start = self.parse_instant(request.start_ms, request.start_time.as_deref())?;
        let end = self.parse_instant(request.end_ms, request.end_time.as_deref())?;
        let candidate = Interval::new(start, end)
            .ok_or_else(|| CoreError::InvalidArgument("End must be after start".into()))?;

        if request.weekday.is_some_and(|w| !(0..=6).contains(&w)) {
            return Err(CoreError::InvalidArgument(
                "weekday must be between 0 (Sunday) and 6".into(),
            ));
        }

        let class = self.load_class(class_id).await?;
        self.authorize_class_owner(actor, &class).await?;

        let existing = match request.session_id {
            Some(session_id) => Some(
                self.store()
                    .session(class.id, session_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("Session"))?,
            ),
            None => None,
        };

        let tutor_classes = self.store().classes_for_tutor(class.tutor_id, None).await?;
        let calendar = self.sessions_of(&tutor_classes).await?;
        if let Some(other) = find_clash(&candidate, &calendar, request.session_id, self.zone()) {
            warn!(
                class_id = %class.id,
                other_session_id = %other.id,
                "Session rejected: time clash"
            );
            return Err(CoreError::FailedPrecondition(
                "Session time clash detected".into(),
            ));
        }

        let label = non_blank(request.label);
        let venue = non_blank(request.venue);

        let (session, created) = match existing {
            Some(current) => {
                let repeat_weekly = request.repeat_weekly.unwrap_or(current.repeat_weekly);
                let weekday = if repeat_weekly {
                    request.weekday.or(current.weekday)
                } else {
                    None
                };
                let merged = Session {
                    start_time: candidate.start,
                    end_time: candidate.end,
                    label: label.or(current.label),
                    venue: venue.or(current.venue),
                    repeat_weekly,
                    weekday,
                    ..current
                };
                self.store().update_session(&merged).await?;
                (merged, false)
            }
            None => {
                let repeat_weekly = request.repeat_weekly.unwrap_or(false);
                let session = Session {
                    id: Uuid::new_v4(),
                    class_id: class.id,
                    start_time: candidate.start,
                    end_time: candidate.end,
                    label,
                    venue,
                    repeat_weekly,
                    weekday: if repeat_weekly { request.weekday } else { None },
                    created_at: self.now(),
                };
                self.store().insert_session(&session).await?;
                (session, true)
            }
        };

        info!(
            class_id = %class.id,
            session_id = %session.id,
            created,
            "Session scheduled"
        );
        self.emit(DomainEvent::SessionScheduled {
            class_id: class.id,
            session_id: session.id,
            created,
            timestamp: self.now(),
        });

        Ok(session.id)
    }
}
