//! Class creation and publishing

use tracing::{info, warn};
use uuid::Uuid;

use crate::actor::{Actor, Role};
use crate::clash::first_clashing_pair;
use crate::error::{CoreError, CoreResult};
use crate::events::DomainEvent;
use crate::models::{Class, ClassStatus, NewClass};
use crate::service::Classroom;

impl Classroom {
    /// Create a draft class
    ///
    /// Tutors create classes for themselves; admins must name the owning
    /// tutor. Drafts carry no sessions, so no clash check runs here.
    pub async fn create_class(&self, actor: &Actor, new_class: NewClass) -> CoreResult<Class> {
        let tutor_id = match actor.role {
            Role::Admin => new_class
                .tutor_id
                .ok_or_else(|| CoreError::InvalidArgument("tutor_id is required".into()))?,
            Role::Tutor => {
                if new_class.tutor_id.is_some_and(|id| id != actor.id) {
                    return Err(CoreError::denied("Not allowed"));
                }
                actor.id
            }
            Role::Student => return Err(CoreError::denied("Tutor role required")),
        };

        if new_class.subject.trim().is_empty() {
            return Err(CoreError::InvalidArgument("subject is required".into()));
        }
        if new_class.capacity_seats <= 0 {
            return Err(CoreError::InvalidArgument(
                "capacity_seats must be positive".into(),
            ));
        }
        if new_class.fee < 0 {
            return Err(CoreError::InvalidArgument("fee must not be negative".into()));
        }

        let class = Class {
            id: Uuid::new_v4(),
            tutor_id,
            subject: new_class.subject,
            grade: new_class.grade,
            area: new_class.area,
            mode: new_class.mode,
            fee: new_class.fee,
            capacity_seats: new_class.capacity_seats,
            status: ClassStatus::Draft,
            created_at: self.now(),
            published_at: None,
        };
        self.store().insert_class(&class).await?;

        info!(class_id = %class.id, tutor_id = %tutor_id, "Draft class created");
        Ok(class)
    }

    /// Promote a draft class to published
    ///
    /// Publishing an already-published class succeeds without side effects.
    /// Fails `FailedPrecondition` when any session of this class clashes with
    /// a session of another published class of the same tutor.
    pub async fn publish_class(&self, actor: &Actor, class_id: Uuid) -> CoreResult<ClassStatus> {
        let class = self.load_class(class_id).await?;
        self.authorize_class_owner(actor, &class).await?;

        if class.status == ClassStatus::Published {
            return Ok(ClassStatus::Published);
        }

        let ours = self.store().sessions_for_class(class.id).await?;
        if !ours.is_empty() {
            let others: Vec<Class> = self
                .store()
                .classes_for_tutor(class.tutor_id, Some(ClassStatus::Published))
                .await?
                .into_iter()
                .filter(|c| c.id != class.id)
                .collect();
            let theirs = self.sessions_of(&others).await?;

            if let Some((a, b)) = first_clashing_pair(&ours, &theirs, self.zone()) {
                warn!(
                    class_id = %class.id,
                    session_id = %a.id,
                    other_session_id = %b.id,
                    "Publish rejected: session clash"
                );
                return Err(CoreError::FailedPrecondition(
                    "Session time clash detected".into(),
                ));
            }
        }

        let at = self.now();
        // A concurrent publish that won the race leaves the class published too
        if self.store().mark_published(class.id, at).await? {
            info!(class_id = %class.id, "Class published");
            self.emit(DomainEvent::ClassPublished {
                class_id: class.id,
                tutor_id: class.tutor_id,
                timestamp: at,
            });
        }

        Ok(ClassStatus::Published)
    }
}
