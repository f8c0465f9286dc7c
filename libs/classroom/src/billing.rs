//! Invoice and payment lifecycle
//!
//! ```text
//! awaiting_proof --submit_proof--> under_review --approve--> approved
//!                                               \--reject---> rejected
//! ```
//!
//! Approved and rejected are terminal. Each transition is a conditional write
//! on the expected prior status, so of two racing writers only one succeeds.

use tracing::{error, info, warn};
use uuid::Uuid;

use crate::actor::{Actor, Role};
use crate::enrollment::due_date_from;
use crate::error::{CoreError, CoreResult};
use crate::events::DomainEvent;
use crate::models::{Enrollment, Invoice, InvoiceStatus, Payment, VerifyStatus};
use crate::service::Classroom;
use crate::store::{Transaction, tx_fn};

/// Payment method recorded when the student names none
pub const DEFAULT_PAYMENT_METHOD: &str = "bank_transfer";

/// Collapse the statuses of an enrollment's invoices into one: any approved
/// invoice wins, then under review, then rejected, else awaiting proof.
pub fn rollup_status<I>(statuses: I) -> InvoiceStatus
where
    I: IntoIterator<Item = InvoiceStatus>,
{
    let mut under_review = false;
    let mut rejected = false;
    for status in statuses {
        match status {
            InvoiceStatus::Approved => return InvoiceStatus::Approved,
            InvoiceStatus::UnderReview => under_review = true,
            InvoiceStatus::Rejected => rejected = true,
            InvoiceStatus::AwaitingProof => {}
        }
    }

    if under_review {
        InvoiceStatus::UnderReview
    } else if rejected {
        InvoiceStatus::Rejected
    } else {
        InvoiceStatus::AwaitingProof
    }
}

/// `YYYY-MM` billing period of an instant, in UTC
pub fn billing_period(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m").to_string()
}

/// Deterministic id of an enrollment's invoice for one billing period
pub fn period_invoice_id(enrollment_id: Uuid, period: &str) -> String {
    format!("{}_{}", enrollment_id, period)
}

/// Move the invoice to review and record its payment as one unit
async fn record_proof_in_tx(tx: &mut dyn Transaction, payment: Payment) -> CoreResult<()> {
    let moved = tx
        .transition_invoice(
            &payment.invoice_id,
            InvoiceStatus::AwaitingProof,
            InvoiceStatus::UnderReview,
        )
        .await?;
    if !moved {
        return Err(CoreError::FailedPrecondition(
            "Invoice is not awaiting proof".into(),
        ));
    }

    tx.insert_payment(&payment).await
}

impl Classroom {
    async fn load_enrollment(&self, enrollment_id: Uuid) -> CoreResult<Enrollment> {
        self.store()
            .enrollment(enrollment_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Enrollment"))
    }

    async fn load_invoice(&self, invoice_id: &str) -> CoreResult<Invoice> {
        self.store()
            .invoice(invoice_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Invoice"))
    }

    /// Attach a proof of payment to the caller's invoice and move the
    /// invoice to review
    pub async fn submit_proof(
        &self,
        actor: &Actor,
        invoice_id: &str,
        proof_url: &str,
        method: Option<&str>,
    ) -> CoreResult<Payment> {
        actor.require(Role::Student)?;

        if invoice_id.trim().is_empty() || proof_url.trim().is_empty() {
            return Err(CoreError::InvalidArgument(
                "invoice_id and proof_url are required".into(),
            ));
        }

        let invoice = self.load_invoice(invoice_id).await?;
        if invoice.student_id != actor.id {
            return Err(CoreError::denied("Not your invoice"));
        }
        if invoice.status.is_terminal() {
            return Err(CoreError::FailedPrecondition(
                "Invoice already reviewed".into(),
            ));
        }
        if invoice.status != InvoiceStatus::AwaitingProof {
            return Err(CoreError::FailedPrecondition(
                "Invoice is not awaiting proof".into(),
            ));
        }

        let now = self.now();
        let payment = Payment {
            id: Uuid::new_v4(),
            invoice_id: invoice.id.clone(),
            student_id: actor.id,
            paid_amount: invoice.amount_due,
            paid_at: now,
            method: method
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_PAYMENT_METHOD)
                .to_string(),
            proof_url: proof_url.trim().to_string(),
            verify_status: VerifyStatus::Pending,
            reviewed_by: None,
            reviewed_at: None,
            rejection_reason: None,
        };

        let staged = payment.clone();
        self.store()
            .transaction(tx_fn(move |tx| Box::pin(record_proof_in_tx(tx, staged))))
            .await?;

        info!(invoice_id = %invoice.id, payment_id = %payment.id, "Payment proof submitted");
        self.emit(DomainEvent::PaymentProofSubmitted {
            payment_id: payment.id,
            invoice_id: invoice.id,
            student_id: actor.id,
            timestamp: now,
        });

        Ok(payment)
    }

    /// Approve or reject a pending payment; the invoice takes the same outcome.
    /// `reason` is stored only on rejection.
    pub async fn review_payment(
        &self,
        actor: &Actor,
        payment_id: Uuid,
        approve: bool,
        reason: Option<&str>,
    ) -> CoreResult<InvoiceStatus> {
        actor.require(Role::Admin)?;

        let payment = self
            .store()
            .payment(payment_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Payment"))?;
        if payment.verify_status != VerifyStatus::Pending {
            return Err(CoreError::FailedPrecondition(
                "Payment already reviewed".into(),
            ));
        }

        let invoice = self.load_invoice(&payment.invoice_id).await?;
        if invoice.status != InvoiceStatus::UnderReview {
            return Err(CoreError::FailedPrecondition(
                "Invoice is not under review".into(),
            ));
        }

        let outcome = if approve {
            VerifyStatus::Approved
        } else {
            VerifyStatus::Rejected
        };
        let reason = reason
            .map(str::trim)
            .filter(|r| !approve && !r.is_empty());

        let now = self.now();
        if !self
            .store()
            .review_payment(payment.id, outcome, actor.id, now, reason)
            .await?
        {
            return Err(CoreError::FailedPrecondition(
                "Payment already reviewed".into(),
            ));
        }

        let status = outcome.invoice_status();
        let moved = self
            .store()
            .transition_invoice(
                &invoice.id,
                InvoiceStatus::UnderReview,
                status,
                Some(actor.id),
                now,
            )
            .await?;
        if !moved {
            error!(
                invoice_id = %invoice.id,
                payment_id = %payment.id,
                "Invoice left review before its payment was settled"
            );
            return Err(CoreError::FailedPrecondition(
                "Invoice is not under review".into(),
            ));
        }

        info!(
            invoice_id = %invoice.id,
            payment_id = %payment.id,
            status = %status,
            "Payment reviewed"
        );
        self.emit(DomainEvent::PaymentReviewed {
            payment_id: payment.id,
            invoice_id: invoice.id,
            outcome: status,
            reviewer: actor.id,
            timestamp: now,
        });

        Ok(status)
    }

    /// Invoice for the current UTC month, created on first request
    pub async fn current_month_invoice(
        &self,
        actor: &Actor,
        enrollment_id: Uuid,
    ) -> CoreResult<Invoice> {
        actor.require(Role::Student)?;

        let enrollment = self.load_enrollment(enrollment_id).await?;
        if enrollment.student_id != actor.id {
            return Err(CoreError::denied("Not your enrollment"));
        }

        let now = self.now();
        let period = billing_period(now);
        let invoice_id = period_invoice_id(enrollment.id, &period);

        if let Some(invoice) = self.store().invoice(&invoice_id).await? {
            return Ok(invoice);
        }

        let class = self.load_class(enrollment.class_id).await?;
        let invoice = Invoice {
            id: invoice_id.clone(),
            enrollment_id: enrollment.id,
            student_id: enrollment.student_id,
            amount_due: class.fee,
            status: InvoiceStatus::AwaitingProof,
            due_date: due_date_from(now),
            period: Some(period),
            created_at: now,
            reviewed_by: None,
            reviewed_at: None,
        };

        if self.store().insert_invoice_if_absent(&invoice).await? {
            info!(invoice_id = %invoice.id, "Monthly invoice created");
            return Ok(invoice);
        }

        // Lost a race with another request for the same period
        self.store().invoice(&invoice_id).await?.ok_or_else(|| {
            warn!(invoice_id = %invoice_id, "Monthly invoice vanished after insert conflict");
            CoreError::Internal("Monthly invoice could not be read back".into())
        })
    }

    /// Rollup payment status of an enrollment, for admins and the owning tutor
    pub async fn enrollment_payment_status(
        &self,
        actor: &Actor,
        enrollment_id: Uuid,
    ) -> CoreResult<InvoiceStatus> {
        let enrollment = self.load_enrollment(enrollment_id).await?;
        let class = self.load_class(enrollment.class_id).await?;

        let owns_class = actor.role == Role::Tutor && class.tutor_id == actor.id;
        if !actor.is_admin() && !owns_class {
            return Err(CoreError::denied("Not allowed"));
        }

        let invoices = self.store().invoices_for_enrollment(enrollment.id).await?;
        Ok(rollup_status(invoices.iter().map(|i| i.status)))
    }
}
