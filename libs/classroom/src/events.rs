//! Domain events
//!
//! Operations emit an event after their state change is stored. Delivery
//! (push notifications, analytics) belongs to subscribers; a slow or absent
//! subscriber never blocks or fails the operation that emitted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{InvoiceStatus, TutorStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DomainEvent {
    ClassPublished {
        class_id: Uuid,
        tutor_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    SessionScheduled {
        class_id: Uuid,
        session_id: Uuid,
        /// `false` when an existing session was edited
        created: bool,
        timestamp: DateTime<Utc>,
    },
    EnrollmentCreated {
        enrollment_id: Uuid,
        class_id: Uuid,
        student_id: Uuid,
        invoice_id: String,
        timestamp: DateTime<Utc>,
    },
    EnrollmentCancelled {
        enrollment_id: Uuid,
        class_id: Uuid,
        student_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    PaymentProofSubmitted {
        payment_id: Uuid,
        invoice_id: String,
        student_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    PaymentReviewed {
        payment_id: Uuid,
        invoice_id: String,
        outcome: InvoiceStatus,
        reviewer: Uuid,
        timestamp: DateTime<Utc>,
    },
    SessionRolledForward {
        class_id: Uuid,
        source_session_id: Uuid,
        session_id: Uuid,
        timestamp: DateTime<Utc>,
    },
    TutorReviewed {
        tutor_id: Uuid,
        status: TutorStatus,
        reviewer: Uuid,
        timestamp: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            DomainEvent::ClassPublished { .. } => "ClassPublished",
            DomainEvent::SessionScheduled { .. } => "SessionScheduled",
            DomainEvent::EnrollmentCreated { .. } => "EnrollmentCreated",
            DomainEvent::EnrollmentCancelled { .. } => "EnrollmentCancelled",
            DomainEvent::PaymentProofSubmitted { .. } => "PaymentProofSubmitted",
            DomainEvent::PaymentReviewed { .. } => "PaymentReviewed",
            DomainEvent::SessionRolledForward { .. } => "SessionRolledForward",
            DomainEvent::TutorReviewed { .. } => "TutorReviewed",
        }
    }
}

/// In-process broadcast bus for [`DomainEvent`]s
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Receiver for events emitted after this call
    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers; having none is not an error
    pub fn emit(&self, event: DomainEvent) {
        if self.tx.send(event).is_err() {
            debug!("Domain event dropped: no subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Log every event until the bus is dropped
pub fn spawn_event_logger(bus: &EventBus) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(payload) => info!(event = event.event_type(), %payload, "Domain event"),
                    Err(e) => warn!("Failed to serialize domain event: {}", e),
                },
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("Event logger lagged, skipped {} events", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
