//! Admin review of tutor profiles

use tracing::info;
use uuid::Uuid;

use crate::actor::{Actor, Role};
use crate::error::CoreResult;
use crate::events::DomainEvent;
use crate::models::{TutorProfile, TutorStatus};
use crate::service::Classroom;

impl Classroom {
    /// Allow a tutor to publish classes and schedule sessions
    pub async fn approve_tutor(&self, actor: &Actor, tutor_id: Uuid) -> CoreResult<TutorProfile> {
        self.review_tutor(actor, tutor_id, TutorStatus::Approved).await
    }

    /// Withdraw a tutor's approval
    pub async fn revoke_tutor(&self, actor: &Actor, tutor_id: Uuid) -> CoreResult<TutorProfile> {
        self.review_tutor(actor, tutor_id, TutorStatus::Rejected).await
    }

    async fn review_tutor(
        &self,
        actor: &Actor,
        tutor_id: Uuid,
        status: TutorStatus,
    ) -> CoreResult<TutorProfile> {
        actor.require(Role::Admin)?;

        let now = self.now();
        let profile = self
            .store()
            .set_tutor_status(tutor_id, status, actor.id, now)
            .await?;

        info!(tutor_id = %tutor_id, status = %status, "Tutor reviewed");
        self.emit(DomainEvent::TutorReviewed {
            tutor_id,
            status,
            reviewer: actor.id,
            timestamp: now,
        });

        Ok(profile)
    }
}
