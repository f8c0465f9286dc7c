//! Shared fixtures for the classroom integration tests
#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use classroom::models::{Class, NewClass, SessionRequest, StudentProfile};
use classroom::{Actor, Classroom, DomainEvent, EventBus, MemoryStore, Store};
use std::sync::Arc;
use tokio::sync::broadcast;
use uuid::Uuid;

pub struct Fixture {
    pub core: Classroom,
    pub store: MemoryStore,
    pub admin: Actor,
}

impl Fixture {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let core = Classroom::new(Arc::new(store.clone()), EventBus::new(64));
        Self {
            core,
            store,
            admin: Actor::admin(Uuid::new_v4()),
        }
    }

    /// Fixture whose clock is frozen at `now`
    pub fn at(now: DateTime<Utc>) -> Self {
        let mut fixture = Self::new();
        fixture.core = fixture.core.with_clock(move || now);
        fixture
    }

    pub fn events(&self) -> broadcast::Receiver<DomainEvent> {
        self.core.events().subscribe()
    }

    pub async fn approved_tutor(&self) -> Actor {
        let tutor = Actor::tutor(Uuid::new_v4());
        self.core
            .approve_tutor(&self.admin, tutor.id)
            .await
            .expect("approve tutor");
        tutor
    }

    pub async fn student(&self, name: &str, grade: &str) -> Actor {
        let student = Actor::student(Uuid::new_v4());
        let mut profile = StudentProfile::new(student.id);
        profile.full_name = Some(name.to_string());
        profile.grade = Some(grade.to_string());
        self.store
            .save_student_profile(&profile)
            .await
            .expect("save student profile");
        student
    }

    pub async fn draft_class(&self, tutor: &Actor, capacity_seats: i32, fee: i64) -> Class {
        self.core
            .create_class(
                tutor,
                NewClass {
                    tutor_id: None,
                    subject: "Mathematics".to_string(),
                    grade: Some("Form 2".to_string()),
                    area: Some("Accra".to_string()),
                    mode: Some("in_person".to_string()),
                    fee,
                    capacity_seats,
                },
            )
            .await
            .expect("create class")
    }

    pub async fn published_class(&self, tutor: &Actor, capacity_seats: i32, fee: i64) -> Class {
        let class = self.draft_class(tutor, capacity_seats, fee).await;
        self.core
            .publish_class(tutor, class.id)
            .await
            .expect("publish class");
        self.store.class(class.id).await.unwrap().unwrap()
    }

    pub async fn schedule(
        &self,
        tutor: &Actor,
        class_id: Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> classroom::CoreResult<Uuid> {
        self.core
            .upsert_session(tutor, session_request(class_id, start, end))
            .await
    }
}

pub fn session_request(class_id: Uuid, start: DateTime<Utc>, end: DateTime<Utc>) -> SessionRequest {
    SessionRequest {
        class_id: Some(class_id),
        start_time: Some(start.to_rfc3339()),
        end_time: Some(end.to_rfc3339()),
        ..Default::default()
    }
}

/// Instant in June 2026; the 1st is a Monday
pub fn june(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 6, day, hour, minute, 0).unwrap()
}

pub fn drain(rx: &mut broadcast::Receiver<DomainEvent>) -> Vec<DomainEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
