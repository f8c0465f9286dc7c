//! Entry point for the core operations
//!
//! [`Classroom`] bundles the store, the event bus, the calendar zone used for
//! "same calendar date" decisions, and a clock. The operations themselves
//! live in `publisher`, `sessions`, `enrollment`, `billing`, `roll_forward`
//! and `tutors` as `impl Classroom` blocks.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use futures::future::try_join_all;
use std::sync::Arc;

use crate::actor::{Actor, Role};
use crate::error::{CoreError, CoreResult};
use crate::events::{DomainEvent, EventBus};
use crate::models::{Class, Session};
use crate::store::Store;

pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone)]
pub struct Classroom {
    store: Arc<dyn Store>,
    events: EventBus,
    zone: FixedOffset,
    clock: Clock,
}

impl Classroom {
    /// Core over `store`, using UTC as the calendar zone and the system clock
    pub fn new(store: Arc<dyn Store>, events: EventBus) -> Self {
        Self {
            store,
            events,
            zone: Utc.fix(),
            clock: Arc::new(Utc::now),
        }
    }

    pub fn with_zone(mut self, zone: FixedOffset) -> Self {
        self.zone = zone;
        self
    }

    pub fn with_clock<F>(mut self, clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        self.clock = Arc::new(clock);
        self
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn zone(&self) -> &FixedOffset {
        &self.zone
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.clock)()
    }

    pub(crate) fn emit(&self, event: DomainEvent) {
        self.events.emit(event);
    }

    pub(crate) async fn load_class(&self, class_id: uuid::Uuid) -> CoreResult<Class> {
        self.store
            .class(class_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Class"))
    }

    /// Admins pass. Otherwise the actor must be the approved tutor owning
    /// `class`; approval is read from the tutor profile, not the token.
    pub(crate) async fn authorize_class_owner(&self, actor: &Actor, class: &Class) -> CoreResult<()> {
        if actor.is_admin() {
            return Ok(());
        }
        if actor.role != Role::Tutor || class.tutor_id != actor.id {
            return Err(CoreError::denied("Not allowed"));
        }

        let approved = self
            .store
            .tutor_profile(actor.id)
            .await?
            .is_some_and(|p| p.is_approved());
        if !approved {
            return Err(CoreError::denied("Tutor not approved"));
        }
        Ok(())
    }

    /// Sessions of every class in `classes`, read concurrently
    pub(crate) async fn sessions_of(&self, classes: &[Class]) -> CoreResult<Vec<Session>> {
        let reads = classes.iter().map(|c| self.store.sessions_for_class(c.id));
        let sets = try_join_all(reads).await?;
        Ok(sets.into_iter().flatten().collect())
    }
}
