//! Enrollment transactor
//!
//! Capacity check, enrollment write, tutor grant and invoice write commit
//! together inside one [`Store::transaction`](crate::store::Store::transaction).
//! The class row is locked first, so concurrent attempts on the same class
//! see each other's seats.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::actor::{Actor, Role};
use crate::error::{CoreError, CoreResult};
use crate::events::DomainEvent;
use crate::models::{ClassStatus, Enrollment, EnrollmentStatus, Invoice, InvoiceStatus};
use crate::service::Classroom;
use crate::store::{Transaction, tx_fn};

/// Days between invoice creation and its due date
pub const INVOICE_DUE_DAYS: i64 = 7;

pub(crate) fn due_date_from(now: DateTime<Utc>) -> NaiveDate {
    (now + Duration::days(INVOICE_DUE_DAYS)).date_naive()
}

/// Identifiers written by a successful enrollment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentReceipt {
    pub enrollment_id: Uuid,
    pub invoice_id: String,
}

struct EnrollmentPlan {
    class_id: Uuid,
    student_id: Uuid,
    enrollment_id: Uuid,
    invoice_id: String,
    now: DateTime<Utc>,
}

async fn enroll_in_tx(tx: &mut dyn Transaction, plan: EnrollmentPlan) -> CoreResult<()> {
    let class = tx
        .class_for_update(plan.class_id)
        .await?
        .ok_or_else(|| CoreError::not_found("Class"))?;
    if class.status != ClassStatus::Published {
        return Err(CoreError::FailedPrecondition("Class not published".into()));
    }

    let taken = tx.count_seated_enrollments(class.id).await?;
    if taken >= i64::from(class.capacity_seats) {
        return Err(CoreError::ResourceExhausted("No seats available".into()));
    }

    let profile = tx.student_profile(plan.student_id).await?;
    let (student_name, student_grade) = profile
        .map(|p| (p.full_name, p.grade))
        .unwrap_or_default();

    tx.insert_enrollment(&Enrollment {
        id: plan.enrollment_id,
        class_id: class.id,
        student_id: plan.student_id,
        status: EnrollmentStatus::Active,
        enrolled_at: plan.now,
        cancelled_at: None,
        student_name,
        student_grade,
    })
    .await?;

    tx.grant_tutor(plan.student_id, class.tutor_id).await?;

    tx.insert_invoice(&Invoice {
        id: plan.invoice_id,
        enrollment_id: plan.enrollment_id,
        student_id: plan.student_id,
        amount_due: class.fee,
        status: InvoiceStatus::AwaitingProof,
        due_date: due_date_from(plan.now),
        period: None,
        created_at: plan.now,
        reviewed_by: None,
        reviewed_at: None,
    })
    .await
}

impl Classroom {
    /// Claim a seat in a published class and open its invoice
    pub async fn enroll(&self, actor: &Actor, class_id: Uuid) -> CoreResult<EnrollmentReceipt> {
        actor.require(Role::Student)?;

        let now = self.now();
        let receipt = EnrollmentReceipt {
            enrollment_id: Uuid::new_v4(),
            invoice_id: Uuid::new_v4().to_string(),
        };
        let plan = EnrollmentPlan {
            class_id,
            student_id: actor.id,
            enrollment_id: receipt.enrollment_id,
            invoice_id: receipt.invoice_id.clone(),
            now,
        };

        self.store()
            .transaction(tx_fn(move |tx| Box::pin(enroll_in_tx(tx, plan))))
            .await?;

        info!(
            class_id = %class_id,
            enrollment_id = %receipt.enrollment_id,
            invoice_id = %receipt.invoice_id,
            "Student enrolled"
        );
        self.emit(DomainEvent::EnrollmentCreated {
            enrollment_id: receipt.enrollment_id,
            class_id,
            student_id: actor.id,
            invoice_id: receipt.invoice_id.clone(),
            timestamp: now,
        });

        Ok(receipt)
    }

    /// Cancel the caller's own enrollment; cancelling twice is a no-op
    ///
    /// The tutor grant is revoked best-effort and without checking for other
    /// enrollments the student holds with the same tutor.
    pub async fn unenroll(&self, actor: &Actor, enrollment_id: Uuid) -> CoreResult<EnrollmentStatus> {
        actor.require(Role::Student)?;

        let enrollment = self
            .store()
            .enrollment(enrollment_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Enrollment"))?;
        if enrollment.student_id != actor.id {
            return Err(CoreError::denied("Not your enrollment"));
        }
        if enrollment.status == EnrollmentStatus::Cancelled {
            return Ok(EnrollmentStatus::Cancelled);
        }

        let now = self.now();
        if !self.store().cancel_enrollment(enrollment.id, now).await? {
            return Ok(EnrollmentStatus::Cancelled);
        }

        if let Err(e) = self.revoke_grant(&enrollment).await {
            warn!(
                enrollment_id = %enrollment.id,
                "Failed to revoke tutor access: {}", e
            );
        }

        info!(enrollment_id = %enrollment.id, "Enrollment cancelled");
        self.emit(DomainEvent::EnrollmentCancelled {
            enrollment_id: enrollment.id,
            class_id: enrollment.class_id,
            student_id: enrollment.student_id,
            timestamp: now,
        });

        Ok(EnrollmentStatus::Cancelled)
    }

    async fn revoke_grant(&self, enrollment: &Enrollment) -> CoreResult<()> {
        if let Some(class) = self.store().class(enrollment.class_id).await? {
            self.store()
                .revoke_tutor_grant(enrollment.student_id, class.tutor_id)
                .await?;
        }
        Ok(())
    }
}
